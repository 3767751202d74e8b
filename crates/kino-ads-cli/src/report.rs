//! Reports produced by the scenario commands

use chrono::{DateTime, Utc};
use kino_ads::{
    AdSession, AdState, AdsConfig, PlaybackSurface, SessionId, SimulatedSurface, SurfaceCalls,
    Timer,
};
use serde::Serialize;
use tabled::Tabled;

use crate::scenario::Step;

/// Outcome of one replayed step
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct StepRecord {
    #[tabled(rename = "#")]
    pub index: usize,
    pub step: String,
    pub from: AdState,
    pub to: AdState,
    #[tabled(rename = "time")]
    pub current_time: f64,
    #[tabled(display_with = "display_src")]
    pub src: Option<String>,
}

fn display_src(src: &Option<String>) -> String {
    src.clone().unwrap_or_else(|| "-".to_string())
}

impl StepRecord {
    pub fn new<T: Timer>(
        index: usize,
        step: &Step,
        from: AdState,
        session: &AdSession<SimulatedSurface, T>,
    ) -> Self {
        Self {
            index,
            step: step.to_string(),
            from,
            to: session.state(),
            current_time: session.surface().current_time(),
            src: session.surface().current_src(),
        }
    }
}

/// Where the session ended up
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub final_state: AdState,
    pub src: Option<String>,
    pub current_time: f64,
    pub paused: bool,
    pub enabled_tracks: usize,
    pub breaks_started: u64,
    pub calls: SurfaceCalls,
}

impl SessionSummary {
    pub fn from_session<T: Timer>(session: &AdSession<SimulatedSurface, T>) -> Self {
        let surface = session.surface();
        Self {
            session_id: session.id(),
            final_state: session.state(),
            src: surface.current_src(),
            current_time: surface.current_time(),
            paused: surface.is_paused(),
            enabled_tracks: surface.enabled_track_count(),
            breaks_started: session.machine().breaks_started(),
            calls: surface.calls(),
        }
    }
}

/// Result of `simulate`
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub scenario: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub config: AdsConfig,
    pub steps: Vec<StepRecord>,
    /// Timer firings still queued when the script ended
    pub pending_timers: usize,
    pub summary: SessionSummary,
}

/// State observed on the watch channel during `run`
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StateChange {
    pub at: DateTime<Utc>,
    pub state: AdState,
}

/// Result of `run`
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub scenario: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub config: AdsConfig,
    pub timeline: Vec<StateChange>,
    pub summary: SessionSummary,
}
