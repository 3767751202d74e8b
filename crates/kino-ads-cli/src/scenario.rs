//! Scenario files
//!
//! A scenario sets up a simulated playback surface and lists the steps to
//! replay against an ad session: signals, surface changes made by the host
//! or ad provider, and the passage of time.
//!
//! ```json
//! {
//!   "name": "mid-roll with source swap",
//!   "surface": { "src": "content.mp4", "type": "video/mp4", "tracks": [{ "kind": "captions" }] },
//!   "steps": [
//!     { "signal": "adsready" },
//!     { "signal": "play" },
//!     { "advance": 312.0 },
//!     { "signal": "adstart" },
//!     { "set_source": { "src": "ad.mp4" } },
//!     { "signal": "adend" },
//!     { "signal": "loadedmetadata" }
//!   ]
//! }
//! ```

use anyhow::Context;
use kino_ads::{
    AdsConfig, Error, MediaSource, PlaybackSurface, Signal, SimulatedSurface, TimeRange, TimerKind,
    TrackKind, TrackMode,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// A scripted playback session
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    pub surface: SurfaceSetup,
    /// Configuration used unless one is given on the command line
    #[serde(default)]
    pub config: Option<AdsConfig>,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("parsing scenario {}", path.display()))
    }

    pub fn from_json(json: &str) -> kino_ads::Result<Self> {
        let scenario: Scenario =
            serde_json::from_str(json).map_err(|e| Error::scenario(e.to_string()))?;
        if scenario.steps.is_empty() {
            return Err(Error::scenario("scenario has no steps"));
        }
        if let Some(config) = &scenario.config {
            config.validate()?;
        }
        Ok(scenario)
    }
}

/// Initial state of the simulated surface
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SurfaceSetup {
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default, rename = "type")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub seekable: Option<Vec<TimeRange>>,
    #[serde(default)]
    pub tracks: Vec<TrackSetup>,
}

impl SurfaceSetup {
    pub fn build(&self) -> SimulatedSurface {
        let mut surface = match &self.src {
            Some(src) => SimulatedSurface::new(src.clone()),
            None => SimulatedSurface::empty(),
        };
        if let Some(mime_type) = &self.mime_type {
            surface = surface.with_type(mime_type.clone());
        }
        if let Some(duration) = self.duration {
            surface = surface.with_duration(duration);
        }
        if let Some(ranges) = &self.seekable {
            surface.set_seekable(ranges.clone());
        }
        for track in &self.tracks {
            surface.add_track(track.kind, track.mode);
        }
        surface
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackSetup {
    pub kind: TrackKind,
    #[serde(default = "default_track_mode")]
    pub mode: TrackMode,
}

fn default_track_mode() -> TrackMode {
    TrackMode::Enabled
}

/// One scripted step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Dispatch a lifecycle signal
    Signal(Signal),
    /// Load a different source, as an ad provider does
    SetSource(MediaSource),
    /// Override the reported src attribute
    SrcAttribute(Option<String>),
    /// Playback reaches a position, in seconds
    Advance(f64),
    Seekable(Vec<TimeRange>),
    Ended(bool),
    Paused(bool),
    /// Fire the oldest pending timer of a kind regardless of its delay.
    /// Only meaningful with simulated timers.
    Fire(TimerKind),
    /// Let time pass, in milliseconds
    Wait(u64),
}

impl Step {
    /// Apply a surface change; other steps leave the surface alone
    pub fn apply_to_surface(&self, surface: &mut SimulatedSurface) {
        match self {
            Step::SetSource(source) => surface.set_source(source),
            Step::SrcAttribute(src) => surface.set_src_attribute(src.clone()),
            Step::Advance(time) => surface.advance_to(*time),
            Step::Seekable(ranges) => surface.set_seekable(ranges.clone()),
            Step::Ended(ended) => surface.set_ended(*ended),
            Step::Paused(paused) => surface.set_paused(*paused),
            Step::Signal(_) | Step::Fire(_) | Step::Wait(_) => {}
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Signal(signal) => write!(f, "signal {}", signal),
            Step::SetSource(source) => write!(f, "set_source {}", source.src),
            Step::SrcAttribute(Some(src)) => write!(f, "src_attribute {}", src),
            Step::SrcAttribute(None) => write!(f, "src_attribute (none)"),
            Step::Advance(time) => write!(f, "advance {:.1}s", time),
            Step::Seekable(ranges) if ranges.is_empty() => write!(f, "seekable (none)"),
            Step::Seekable(ranges) => {
                let ranges: Vec<String> = ranges
                    .iter()
                    .map(|r| format!("{:.1}-{:.1}", r.start, r.end))
                    .collect();
                write!(f, "seekable {}", ranges.join(","))
            }
            Step::Ended(ended) => write!(f, "ended {}", ended),
            Step::Paused(paused) => write!(f, "paused {}", paused),
            Step::Fire(kind) => write!(f, "fire {:?}", kind),
            Step::Wait(ms) => write!(f, "wait {}ms", ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_steps() {
        let scenario = Scenario::from_json(
            r#"{
                "surface": { "src": "content.mp4", "tracks": [{ "kind": "captions" }] },
                "steps": [
                    { "signal": "adstart" },
                    { "set_source": { "src": "ad.mp4", "type": "video/mp4" } },
                    { "src_attribute": null },
                    { "seekable": [{ "start": 0.0, "end": 60.0 }] },
                    { "fire": "seek_retry" },
                    { "wait": 50 }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(scenario.steps.len(), 6);
        assert_eq!(scenario.steps[0], Step::Signal(Signal::AdStart));
        assert_eq!(
            scenario.steps[1],
            Step::SetSource(MediaSource::new("ad.mp4").with_type("video/mp4"))
        );
        assert_eq!(scenario.steps[2], Step::SrcAttribute(None));
        assert_eq!(scenario.steps[4], Step::Fire(TimerKind::SeekRetry));
        assert_eq!(scenario.surface.tracks[0].mode, TrackMode::Enabled);
    }

    #[test]
    fn test_unknown_signal_rejected() {
        let result = Scenario::from_json(
            r#"{ "surface": {}, "steps": [{ "signal": "adpause" }] }"#,
        );
        assert_eq!(result.unwrap_err().error_code(), "SCENARIO");
    }

    #[test]
    fn test_invalid_embedded_config_rejected() {
        let result = Scenario::from_json(
            r#"{ "surface": {}, "config": { "seek_retry_delay_ms": 0 }, "steps": [{ "signal": "play" }] }"#,
        );
        assert_eq!(result.unwrap_err().error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_empty_scenario_rejected() {
        let result = Scenario::from_json(r#"{ "surface": {}, "steps": [] }"#);
        assert_eq!(result.unwrap_err().error_code(), "SCENARIO");
    }

    #[test]
    fn test_surface_setup() {
        let setup = SurfaceSetup {
            src: Some("content.mp4".to_string()),
            mime_type: Some("video/mp4".to_string()),
            duration: Some(120.0),
            seekable: Some(Vec::new()),
            tracks: vec![TrackSetup {
                kind: TrackKind::Subtitles,
                mode: TrackMode::Enabled,
            }],
        };
        let surface = setup.build();

        assert_eq!(surface.current_src().as_deref(), Some("content.mp4"));
        assert_eq!(surface.current_type().as_deref(), Some("video/mp4"));
        assert_eq!(surface.duration(), 120.0);
        assert!(surface.seekable().is_empty());
        assert_eq!(surface.enabled_track_count(), 1);
    }

    #[test]
    fn test_step_display() {
        assert_eq!(Step::Signal(Signal::AdEnd).to_string(), "signal adend");
        assert_eq!(Step::Wait(50).to_string(), "wait 50ms");
        assert_eq!(
            Step::Seekable(vec![TimeRange::new(0.0, 60.0)]).to_string(),
            "seekable 0.0-60.0"
        );
    }
}
