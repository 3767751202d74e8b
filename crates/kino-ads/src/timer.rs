//! Deferred work for the ad state machine
//!
//! The machine never sleeps or spawns by itself. Anything that must happen
//! later (grace periods, ad provider timeouts, seekable re-checks) is
//! handed to a [`Timer`] as a [`TimerToken`]; the host fires the token
//! back into the session when the delay elapses. Tokens the machine is no
//! longer waiting on are ignored, so a timer never needs cancelling.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::trace;

/// What a scheduled firing is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// Grace period for `adsready` after an early play request
    AdsReady,
    /// Pre-roll start deadline
    Preroll,
    /// Post-roll start deadline
    Postroll,
    /// Seekable re-check
    SeekRetry,
}

/// Identifies one scheduled firing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TimerToken {
    pub id: u64,
    pub kind: TimerKind,
}

/// Scheduler for deferred firings
pub trait Timer {
    /// Arrange for `token` to be fired back after `delay`
    fn schedule(&mut self, token: TimerToken, delay: Duration);
}

impl<T: Timer + ?Sized> Timer for Box<T> {
    fn schedule(&mut self, token: TimerToken, delay: Duration) {
        (**self).schedule(token, delay)
    }
}

/// Timer that only queues firings; the host decides when they happen
///
/// Useful for deterministic tests and for hosts that own their event loop.
#[derive(Debug, Default)]
pub struct ManualTimer {
    pending: VecDeque<Pending>,
    /// Firings ever scheduled, per kind
    scheduled: HashMap<TimerKind, usize>,
    /// Virtual clock, only moved by [`ManualTimer::pop_due`] and [`ManualTimer::advance_to`]
    now: Duration,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    token: TimerToken,
    delay: Duration,
    due: Duration,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the oldest pending firing
    pub fn pop(&mut self) -> Option<TimerToken> {
        self.pending.pop_front().map(|pending| pending.token)
    }

    /// Take the oldest pending firing of one kind
    pub fn pop_kind(&mut self, kind: TimerKind) -> Option<TimerToken> {
        let index = self.pending.iter().position(|pending| pending.token.kind == kind)?;
        self.pending.remove(index).map(|pending| pending.token)
    }

    /// Take the earliest firing due at or before `until` on the virtual
    /// clock, moving the clock to its due time
    pub fn pop_due(&mut self, until: Duration) -> Option<TimerToken> {
        let (index, due) = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, pending)| pending.due <= until)
            .min_by_key(|(index, pending)| (pending.due, *index))
            .map(|(index, pending)| (index, pending.due))?;
        self.now = self.now.max(due);
        self.pending.remove(index).map(|pending| pending.token)
    }

    /// Move the virtual clock forward without firing anything
    pub fn advance_to(&mut self, at: Duration) {
        self.now = self.now.max(at);
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Delay requested for the oldest pending firing
    pub fn next_delay(&self) -> Option<Duration> {
        self.pending.front().map(|pending| pending.delay)
    }

    /// Total firings ever scheduled for a kind
    pub fn scheduled_count(&self, kind: TimerKind) -> usize {
        self.scheduled.get(&kind).copied().unwrap_or(0)
    }

    /// Drop pending firings without firing them
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

impl Timer for ManualTimer {
    fn schedule(&mut self, token: TimerToken, delay: Duration) {
        trace!(id = token.id, kind = ?token.kind, delay_ms = delay.as_millis() as u64, "Timer queued");
        self.pending.push_back(Pending {
            token,
            delay,
            due: self.now + delay,
        });
        *self.scheduled.entry(token.kind).or_insert(0) += 1;
    }
}

/// Timer backed by tokio sleeps
///
/// Each firing is a spawned sleep that sends its token on the channel
/// returned by [`TokioTimer::new`]. Must be used from inside a tokio
/// runtime.
#[derive(Debug, Clone)]
pub struct TokioTimer {
    tx: mpsc::UnboundedSender<TimerToken>,
}

impl TokioTimer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerToken>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Timer for TokioTimer {
    fn schedule(&mut self, token: TimerToken, delay: Duration) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the session loop has shut down
            let _ = tx.send(token);
        });
    }
}
