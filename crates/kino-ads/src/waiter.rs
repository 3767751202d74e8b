//! Seekable waiter
//!
//! Media surfaces often report an empty seekable range for a while after
//! a source swap, and a seek issued in that window is silently dropped.
//! The waiter re-checks on a fixed delay until the target time is
//! seekable, then writes it. The retry budget is bounded; running out is
//! not an error, the position is simply left where the surface put it.

use crate::{
    surface::PlaybackSurface,
    timer::{Timer, TimerKind, TimerToken},
    types::AdsConfig,
};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Bounded attempt counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryCounter {
    attempts: u32,
    limit: u32,
}

impl RetryCounter {
    pub fn new(limit: u32) -> Self {
        Self { attempts: 0, limit }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.limit
    }

    /// Count one more attempt; false once the budget is spent
    pub fn try_increment(&mut self) -> bool {
        if self.is_exhausted() {
            return false;
        }
        self.attempts += 1;
        true
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

/// How a seekable check ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Target was seekable and has been written
    Restored,
    /// Not seekable yet; a re-check is scheduled
    Retrying(TimerToken),
    /// Budget spent; the target was dropped
    Exhausted,
}

#[derive(Debug, Clone, Copy)]
struct PendingRestore {
    target: f64,
    resume: bool,
}

/// Defers a time restoration until the surface can seek to it
#[derive(Debug)]
pub struct SeekableWaiter {
    counter: RetryCounter,
    delay: Duration,
    pending: Option<PendingRestore>,
    awaiting: Option<TimerToken>,
    next_token_id: u64,
}

impl SeekableWaiter {
    pub fn new(config: &AdsConfig) -> Self {
        Self {
            counter: RetryCounter::new(config.seek_retry_limit),
            delay: config.seek_retry_delay(),
            pending: None,
            awaiting: None,
            next_token_id: 0,
        }
    }

    /// True while a restoration is waiting on a re-check
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Re-checks scheduled for the current restoration
    pub fn attempts(&self) -> u32 {
        self.counter.attempts()
    }

    /// Start restoring `target`, resuming playback afterwards if `resume`
    ///
    /// The first check runs immediately and is not counted against the
    /// budget. Any restoration already in flight is replaced.
    pub fn restore_time<S, T>(
        &mut self,
        target: f64,
        resume: bool,
        surface: &mut S,
        timer: &mut T,
    ) -> WaitOutcome
    where
        S: PlaybackSurface + ?Sized,
        T: Timer + ?Sized,
    {
        self.cancel();
        self.pending = Some(PendingRestore { target, resume });
        self.check(surface, timer)
    }

    /// Handle a re-check firing. Returns `None` for stale tokens.
    pub fn on_timer<S, T>(
        &mut self,
        token: TimerToken,
        surface: &mut S,
        timer: &mut T,
    ) -> Option<WaitOutcome>
    where
        S: PlaybackSurface + ?Sized,
        T: Timer + ?Sized,
    {
        if self.awaiting != Some(token) {
            debug!(id = token.id, "Ignoring stale seekable re-check");
            return None;
        }
        self.awaiting = None;
        Some(self.check(surface, timer))
    }

    /// Abandon any restoration in flight and reset the budget
    pub fn cancel(&mut self) {
        if self.pending.take().is_some() {
            debug!(attempts = self.counter.attempts(), "Abandoning pending time restoration");
        }
        self.awaiting = None;
        self.counter.reset();
    }

    fn check<S, T>(&mut self, surface: &mut S, timer: &mut T) -> WaitOutcome
    where
        S: PlaybackSurface + ?Sized,
        T: Timer + ?Sized,
    {
        let Some(PendingRestore { target, resume }) = self.pending else {
            return WaitOutcome::Exhausted;
        };

        let seekable = surface.seekable().iter().any(|range| range.contains(target));
        if seekable {
            surface.set_current_time(target);
            info!(time = target, attempts = self.counter.attempts(), "Content position restored");
            self.finish(resume, surface);
            return WaitOutcome::Restored;
        }

        if self.counter.try_increment() {
            self.next_token_id += 1;
            let token = TimerToken {
                id: self.next_token_id,
                kind: TimerKind::SeekRetry,
            };
            debug!(
                time = target,
                attempt = self.counter.attempts(),
                delay_ms = self.delay.as_millis() as u64,
                "Target not seekable yet, retrying"
            );
            self.awaiting = Some(token);
            timer.schedule(token, self.delay);
            return WaitOutcome::Retrying(token);
        }

        warn!(
            time = target,
            attempts = self.counter.attempts(),
            "Surface never became seekable, giving up on position restore"
        );
        self.finish(resume, surface);
        WaitOutcome::Exhausted
    }

    fn finish<S>(&mut self, resume: bool, surface: &mut S)
    where
        S: PlaybackSurface + ?Sized,
    {
        self.pending = None;
        self.awaiting = None;
        self.counter.reset();
        if resume && !surface.is_ended() {
            surface.play();
        }
    }
}
