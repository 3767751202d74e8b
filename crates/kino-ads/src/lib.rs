//! Kino Ads - Linear ad break handling for Kino
//!
//! This crate moves a playback session into and out of "ad mode" while
//! keeping the viewer's content experience continuous:
//! - Ad state machine for pre-roll, mid-roll and post-roll breaks
//! - Playback snapshots taken at ad start and restored at ad end
//! - Seekable waiting before the content position is written back
//! - Caption suppression while ads play
//! - Observable ad state for UI and analytics
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Kino Ads                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   signals ──►  ┌──────────────┐  ──► watch<AdState>             │
//! │   timers  ──►  │  Ad Session  │                                 │
//! │                └──────┬───────┘                                 │
//! │                       │                                         │
//! │                ┌──────┴───────┐                                 │
//! │                │ State Machine│                                 │
//! │                └──┬────────┬──┘                                 │
//! │                   │        │                                    │
//! │        ┌──────────┴──┐  ┌──┴───────────┐                        │
//! │        │  Snapshot   │  │   Seekable   │                        │
//! │        │    Store    │  │    Waiter    │                        │
//! │        └──────┬──────┘  └──────┬───────┘                        │
//! │               └───────┬────────┘                                │
//! │                ┌──────┴───────┐                                 │
//! │                │   Playback   │                                 │
//! │                │   Surface    │                                 │
//! │                └──────────────┘                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod surface;
pub mod snapshot;
pub mod waiter;
pub mod timer;
pub mod machine;
pub mod session;

pub use error::{Error, Result};
pub use types::*;
pub use surface::{PlaybackSurface, SimulatedSurface, SurfaceCalls};
pub use snapshot::{PlaybackSnapshot, RestoreOutcome, SuppressedTrack};
pub use waiter::{RetryCounter, SeekableWaiter, WaitOutcome};
pub use timer::{ManualTimer, Timer, TimerKind, TimerToken, TokioTimer};
pub use machine::{AdBreakContext, AdStateMachine, SessionContext, Transition};
pub use session::{run, AdSession, SessionCommand};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the ad library
pub fn init() {
    tracing::info!(version = VERSION, "Kino Ads initialized");
}
