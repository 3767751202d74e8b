//! Ad state machine
//!
//! Sequences ad breaks against asynchronously arriving signals:
//!
//! ```text
//!                 play (no inventory)           adsready
//! content-playback ──────────────────► ads-ready? ────────► preroll?
//!   │  ▲   │ play (inventory ready)                 ▲          │
//!   │  │   └───────────────────────────────────────┘          │ adstart
//!   │  │                                                       ▼
//!   │  └──────────── adend (source unchanged / post-roll) ── ad-playback
//!   │  ▲                                                       │ adend (source changed)
//!   │  └──────────── loadedmetadata ──── content-resuming ◄────┘
//!   │ ended (inventory ready)
//!   ▼
//! postroll? ── adstart ──► ad-playback
//! ```
//!
//! `adtimeout` from a waiting state (or from content playback) lands in
//! `ad-timeout-playback` when the content source changed since the last
//! break, and in `content-playback` otherwise. Signals that do not apply
//! to the current state are ignored.

use crate::{
    snapshot::{PlaybackSnapshot, RestoreOutcome},
    surface::PlaybackSurface,
    timer::{Timer, TimerKind, TimerToken},
    types::*,
    waiter::SeekableWaiter,
};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Per-break bookkeeping, alive from `adstart` to `adend`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdBreakContext {
    pub kind: BreakKind,
    /// Content had ended when the break started; makes the break a
    /// post-roll for its whole lifetime
    pub content_ended_at_entry: bool,
    /// Surface source diverged from the snapshot during the break
    pub source_changed: bool,
}

/// Collaborators a transition may act on
pub struct SessionContext<'a, S: ?Sized, T: ?Sized> {
    pub surface: &'a mut S,
    pub timer: &'a mut T,
}

impl<'a, S: ?Sized, T: ?Sized> SessionContext<'a, S, T> {
    pub fn new(surface: &'a mut S, timer: &'a mut T) -> Self {
        Self { surface, timer }
    }
}

/// State before and after handling one input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: AdState,
    pub to: AdState,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Ad break lifecycle for one playback session
#[derive(Debug)]
pub struct AdStateMachine {
    config: AdsConfig,
    state: AdState,
    /// `adsready` has been seen
    inventory_ready: bool,
    /// Content playback has been requested for the current content
    play_requested: bool,
    /// `ended` has been seen for the current content
    content_ended: bool,
    /// Source of the content currently considered authoritative
    content_src: Option<String>,
    /// Content source captured by the most recent break
    last_break_src: Option<String>,
    active_break: Option<AdBreakContext>,
    snapshot: Option<PlaybackSnapshot>,
    waiter: SeekableWaiter,
    /// Grace period or ad provider deadline currently armed
    awaiting: Option<TimerToken>,
    next_token_id: u64,
    breaks_started: u64,
}

impl AdStateMachine {
    pub fn new(config: AdsConfig) -> Self {
        let waiter = SeekableWaiter::new(&config);
        Self {
            config,
            state: AdState::ContentPlayback,
            inventory_ready: false,
            play_requested: false,
            content_ended: false,
            content_src: None,
            last_break_src: None,
            active_break: None,
            snapshot: None,
            waiter,
            awaiting: None,
            next_token_id: 0,
            breaks_started: 0,
        }
    }

    pub fn state(&self) -> AdState {
        self.state
    }

    pub fn config(&self) -> &AdsConfig {
        &self.config
    }

    pub fn inventory_ready(&self) -> bool {
        self.inventory_ready
    }

    pub fn active_break(&self) -> Option<&AdBreakContext> {
        self.active_break.as_ref()
    }

    /// Snapshot held for the current break or pending resumption
    pub fn snapshot(&self) -> Option<&PlaybackSnapshot> {
        self.snapshot.as_ref()
    }

    /// True while a time restoration waits for the surface to become seekable
    pub fn is_restoring(&self) -> bool {
        self.waiter.is_pending()
    }

    /// Seekable re-checks spent on the current restoration
    pub fn retry_attempts(&self) -> u32 {
        self.waiter.attempts()
    }

    pub fn breaks_started(&self) -> u64 {
        self.breaks_started
    }

    /// Apply one inbound signal
    #[instrument(skip(self, cx), fields(state = %self.state))]
    pub fn handle<S, T>(&mut self, signal: Signal, cx: &mut SessionContext<'_, S, T>) -> Transition
    where
        S: PlaybackSurface + ?Sized,
        T: Timer + ?Sized,
    {
        use AdState::*;

        let from = self.state;
        let to = match (from, signal) {
            (_, Signal::AdsReady) => self.on_ads_ready(cx),

            (ContentPlayback, Signal::Play) => self.on_play(cx),

            (ContentPlayback | AdTimeoutPlayback | AdsReadyWait | PrerollWait | PostrollWait
            | ContentResuming, Signal::AdStart) => self.begin_break(cx),

            (AdPlayback, Signal::LoadStart) => {
                self.note_source_change(cx);
                AdPlayback
            }
            (AdPlayback, Signal::AdEnd) => self.end_break(cx),

            (ContentResuming, Signal::LoadedMetadata) => self.resume_content(cx),

            (ContentPlayback | AdTimeoutPlayback | AdsReadyWait | PrerollWait | PostrollWait,
            Signal::AdTimeout) => self.on_ad_timeout(cx),

            (AdsReadyWait | PrerollWait | PostrollWait, Signal::AdSkip) => {
                self.awaiting = None;
                info!("Pending ad break skipped");
                ContentPlayback
            }

            (ContentPlayback | AdTimeoutPlayback, Signal::Ended) => self.on_content_ended(cx),
            (AdsReadyWait | PrerollWait, Signal::Ended) => {
                self.content_ended = true;
                from
            }

            (ContentPlayback | AdTimeoutPlayback, Signal::LoadStart) => self.on_content_update(cx),
            (AdsReadyWait | PrerollWait | PostrollWait, Signal::LoadStart) => {
                self.content_src = cx.surface.current_src();
                from
            }

            (state, signal) => {
                debug!(%state, %signal, "Signal does not apply, ignoring");
                state
            }
        };

        self.transition(from, to, signal.name())
    }

    /// Handle a timer firing handed back by the host
    #[instrument(skip(self, cx), fields(state = %self.state))]
    pub fn on_timer<S, T>(&mut self, token: TimerToken, cx: &mut SessionContext<'_, S, T>) -> Transition
    where
        S: PlaybackSurface + ?Sized,
        T: Timer + ?Sized,
    {
        let from = self.state;

        if token.kind == TimerKind::SeekRetry {
            self.waiter.on_timer(token, &mut *cx.surface, &mut *cx.timer);
            return Transition { from, to: from };
        }

        if self.awaiting != Some(token) {
            debug!(id = token.id, kind = ?token.kind, "Ignoring stale timer");
            return Transition { from, to: from };
        }
        self.awaiting = None;

        let to = match token.kind {
            TimerKind::AdsReady | TimerKind::Preroll => {
                info!(kind = ?token.kind, "Ad provider did not respond in time");
                self.on_ad_timeout(cx)
            }
            TimerKind::Postroll => {
                info!("No post-roll started in time");
                AdState::ContentPlayback
            }
            TimerKind::SeekRetry => from,
        };

        self.transition(from, to, "timeout")
    }

    fn transition(&mut self, from: AdState, to: AdState, cause: &str) -> Transition {
        self.state = to;
        if from != to {
            info!(%from, %to, cause, "Ad state transition");
        }
        Transition { from, to }
    }

    fn arm<S, T>(&mut self, kind: TimerKind, delay: Duration, cx: &mut SessionContext<'_, S, T>)
    where
        S: PlaybackSurface + ?Sized,
        T: Timer + ?Sized,
    {
        self.next_token_id += 1;
        let token = TimerToken {
            id: self.next_token_id,
            kind,
        };
        self.awaiting = Some(token);
        cx.timer.schedule(token, delay);
    }

    fn on_ads_ready<S, T>(&mut self, cx: &mut SessionContext<'_, S, T>) -> AdState
    where
        S: PlaybackSurface + ?Sized,
        T: Timer + ?Sized,
    {
        let first = !self.inventory_ready;
        self.inventory_ready = true;
        match self.state {
            AdState::AdsReadyWait => {
                self.arm(TimerKind::Preroll, self.config.preroll_timeout(), cx);
                AdState::PrerollWait
            }
            // Play already went through before inventory arrived and no
            // content has rendered yet: a pre-roll can still go first
            AdState::ContentPlayback
                if first
                    && self.play_requested
                    && !self.content_ended
                    && cx.surface.current_time() <= 0.0 =>
            {
                self.arm(TimerKind::Preroll, self.config.preroll_timeout(), cx);
                AdState::PrerollWait
            }
            state => state,
        }
    }

    fn on_play<S, T>(&mut self, cx: &mut SessionContext<'_, S, T>) -> AdState
    where
        S: PlaybackSurface + ?Sized,
        T: Timer + ?Sized,
    {
        // Replay after the end: later breaks are no longer post-rolls
        if self.content_ended && !cx.surface.is_ended() {
            debug!("Content replayed after ending");
            self.content_ended = false;
        }
        if self.play_requested {
            return AdState::ContentPlayback;
        }
        self.play_requested = true;

        if self.inventory_ready {
            self.arm(TimerKind::Preroll, self.config.preroll_timeout(), cx);
            AdState::PrerollWait
        } else {
            self.arm(TimerKind::AdsReady, self.config.ads_ready_timeout(), cx);
            AdState::AdsReadyWait
        }
    }

    fn on_content_ended<S, T>(&mut self, cx: &mut SessionContext<'_, S, T>) -> AdState
    where
        S: PlaybackSurface + ?Sized,
        T: Timer + ?Sized,
    {
        self.content_ended = true;
        if self.inventory_ready {
            self.arm(TimerKind::Postroll, self.config.postroll_timeout(), cx);
            AdState::PostrollWait
        } else {
            self.state
        }
    }

    /// `loadstart` outside an ad break: new content, or ended content
    /// reloaded, resets the per-content flags
    fn on_content_update<S, T>(&mut self, cx: &mut SessionContext<'_, S, T>) -> AdState
    where
        S: PlaybackSurface + ?Sized,
        T: Timer + ?Sized,
    {
        let src = cx.surface.current_src();
        if src == self.content_src {
            // Same content reloaded after it ended starts over
            if self.content_ended {
                debug!(src = ?src, "Ended content reloaded");
                self.content_ended = false;
                self.play_requested = false;
            }
            return self.state;
        }

        debug!(src = ?src, "Content source changed");
        self.content_src = src;
        self.play_requested = false;
        self.content_ended = false;
        AdState::ContentPlayback
    }

    fn on_ad_timeout<S, T>(&mut self, cx: &mut SessionContext<'_, S, T>) -> AdState
    where
        S: PlaybackSurface + ?Sized,
        T: Timer + ?Sized,
    {
        self.awaiting = None;

        let current = cx.surface.current_src();
        let source_moved_on = self.last_break_src.is_some() && current != self.last_break_src;
        if source_moved_on {
            // The new content is authoritative; the old snapshot is stale
            info!(src = ?current, "Ads timed out after a content change");
            AdState::AdTimeoutPlayback
        } else {
            AdState::ContentPlayback
        }
    }

    fn begin_break<S, T>(&mut self, cx: &mut SessionContext<'_, S, T>) -> AdState
    where
        S: PlaybackSurface + ?Sized,
        T: Timer + ?Sized,
    {
        self.awaiting = None;
        // A restoration from the previous break must not land in this one
        self.waiter.cancel();
        if self.snapshot.take().is_some() {
            debug!("Discarding unconsumed snapshot from previous break");
        }

        let content_ended_at_entry = cx.surface.is_ended() || self.content_ended;
        let kind = if content_ended_at_entry {
            BreakKind::PostRoll
        } else if matches!(self.state, AdState::AdsReadyWait | AdState::PrerollWait)
            || cx.surface.current_time() <= 0.0
        {
            BreakKind::PreRoll
        } else {
            BreakKind::MidRoll
        };

        let snapshot = PlaybackSnapshot::capture(&mut *cx.surface, self.play_requested);
        self.last_break_src = snapshot.src().map(str::to_string);
        self.content_src = self.last_break_src.clone();

        info!(
            %kind,
            src = ?snapshot.src(),
            time = snapshot.current_time,
            "Ad break started"
        );

        self.snapshot = Some(snapshot);
        self.active_break = Some(AdBreakContext {
            kind,
            content_ended_at_entry,
            source_changed: false,
        });
        self.breaks_started += 1;

        AdState::AdPlayback
    }

    fn note_source_change<S, T>(&mut self, cx: &mut SessionContext<'_, S, T>)
    where
        S: PlaybackSurface + ?Sized,
        T: Timer + ?Sized,
    {
        let (Some(snapshot), Some(context)) = (&self.snapshot, &mut self.active_break) else {
            return;
        };
        if !context.source_changed && snapshot.source_diverged(&*cx.surface) {
            debug!(src = ?cx.surface.current_src(), "Ad replaced the content source");
            context.source_changed = true;
        }
    }

    fn end_break<S, T>(&mut self, cx: &mut SessionContext<'_, S, T>) -> AdState
    where
        S: PlaybackSurface + ?Sized,
        T: Timer + ?Sized,
    {
        self.note_source_change(cx);

        let (Some(context), Some(snapshot)) = (self.active_break.take(), self.snapshot.take())
        else {
            return AdState::ContentPlayback;
        };

        info!(
            kind = %context.kind,
            source_changed = context.source_changed,
            "Ad break ended"
        );

        match snapshot.restore(&mut *cx.surface, &context) {
            RestoreOutcome::PostRoll => {
                debug!("Post-roll finished, content stays ended");
                AdState::ContentPlayback
            }
            RestoreOutcome::Unchanged => {
                if snapshot.should_resume(&*cx.surface) {
                    cx.surface.play();
                }
                AdState::ContentPlayback
            }
            RestoreOutcome::NoContent => AdState::ContentPlayback,
            RestoreOutcome::SourceRestored => {
                // Time can only be restored once the content metadata is in
                self.snapshot = Some(snapshot);
                AdState::ContentResuming
            }
        }
    }

    fn resume_content<S, T>(&mut self, cx: &mut SessionContext<'_, S, T>) -> AdState
    where
        S: PlaybackSurface + ?Sized,
        T: Timer + ?Sized,
    {
        let Some(snapshot) = self.snapshot.take() else {
            return AdState::ContentPlayback;
        };

        let resume = snapshot.should_resume(&*cx.surface);
        self.waiter.restore_time(
            snapshot.current_time,
            resume,
            &mut *cx.surface,
            &mut *cx.timer,
        );

        AdState::ContentPlayback
    }
}
