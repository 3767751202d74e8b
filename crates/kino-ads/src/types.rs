//! Core types for Kino Ads

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier for an ad session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ad state machine states
///
/// There is no terminal state: the machine cycles back to
/// `ContentPlayback` for as long as the surrounding session lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdState {
    /// Content is playing (or loaded and idle); initial state
    #[serde(rename = "content-playback")]
    ContentPlayback,
    /// Play was requested before ad inventory arrived
    #[serde(rename = "ads-ready?")]
    AdsReadyWait,
    /// Waiting for the ad provider to start a pre-roll
    #[serde(rename = "preroll?")]
    PrerollWait,
    /// A linear ad occupies the playback surface
    #[serde(rename = "ad-playback")]
    AdPlayback,
    /// Content source restored, waiting for metadata before seeking back
    #[serde(rename = "content-resuming")]
    ContentResuming,
    /// Ads timed out after the content source changed underneath them
    #[serde(rename = "ad-timeout-playback")]
    AdTimeoutPlayback,
    /// Content ended, waiting for the ad provider to start a post-roll
    #[serde(rename = "postroll?")]
    PostrollWait,
}

impl AdState {
    pub const ALL: [AdState; 7] = [
        AdState::ContentPlayback,
        AdState::AdsReadyWait,
        AdState::PrerollWait,
        AdState::AdPlayback,
        AdState::ContentResuming,
        AdState::AdTimeoutPlayback,
        AdState::PostrollWait,
    ];

    /// Wire name used by external consumers
    pub fn name(&self) -> &'static str {
        match self {
            AdState::ContentPlayback => "content-playback",
            AdState::AdsReadyWait => "ads-ready?",
            AdState::PrerollWait => "preroll?",
            AdState::AdPlayback => "ad-playback",
            AdState::ContentResuming => "content-resuming",
            AdState::AdTimeoutPlayback => "ad-timeout-playback",
            AdState::PostrollWait => "postroll?",
        }
    }

    /// True while an ad owns the playback surface
    pub fn is_ad_mode(&self) -> bool {
        matches!(self, AdState::AdPlayback)
    }

    /// True for the states that wait on the ad provider
    pub fn is_waiting(&self) -> bool {
        matches!(
            self,
            AdState::AdsReadyWait | AdState::PrerollWait | AdState::PostrollWait
        )
    }
}

impl std::fmt::Display for AdState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AdState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        AdState::ALL
            .iter()
            .copied()
            .find(|state| state.name() == s)
            .ok_or_else(|| Error::UnknownState(s.to_string()))
    }
}

/// Inbound lifecycle signals from the playback surface and ad provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    /// Ad inventory is available
    AdsReady,
    /// Content playback was requested
    Play,
    /// The ad provider is taking over the surface
    AdStart,
    /// The ad provider is handing the surface back
    AdEnd,
    /// The ad provider gave up or never answered
    AdTimeout,
    /// The ad provider skipped the pending pre/post-roll
    AdSkip,
    /// The surface finished loading metadata for its source
    LoadedMetadata,
    /// The surface started loading a (possibly new) source
    LoadStart,
    /// The surface reached the end of its source
    Ended,
}

impl Signal {
    pub const ALL: [Signal; 9] = [
        Signal::AdsReady,
        Signal::Play,
        Signal::AdStart,
        Signal::AdEnd,
        Signal::AdTimeout,
        Signal::AdSkip,
        Signal::LoadedMetadata,
        Signal::LoadStart,
        Signal::Ended,
    ];

    /// Event name as emitted by the player
    pub fn name(&self) -> &'static str {
        match self {
            Signal::AdsReady => "adsready",
            Signal::Play => "play",
            Signal::AdStart => "adstart",
            Signal::AdEnd => "adend",
            Signal::AdTimeout => "adtimeout",
            Signal::AdSkip => "adskip",
            Signal::LoadedMetadata => "loadedmetadata",
            Signal::LoadStart => "loadstart",
            Signal::Ended => "ended",
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Signal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        Signal::ALL
            .iter()
            .copied()
            .find(|signal| signal.name() == lower)
            .ok_or_else(|| Error::UnknownSignal(s.to_string()))
    }
}

/// Position of an ad break relative to the content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BreakKind {
    PreRoll,
    MidRoll,
    PostRoll,
}

impl std::fmt::Display for BreakKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakKind::PreRoll => write!(f, "pre-roll"),
            BreakKind::MidRoll => write!(f, "mid-roll"),
            BreakKind::PostRoll => write!(f, "post-roll"),
        }
    }
}

/// A source assignment for the playback surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSource {
    /// Source URL
    pub src: String,
    /// MIME type, if known
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl MediaSource {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            mime_type: None,
        }
    }

    pub fn with_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// A seekable (or buffered) time interval in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Inclusive containment check
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time <= self.end
    }
}

/// Non-owning handle to a text track held by the playback surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(pub u32);

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "track-{}", self.0)
    }
}

/// Text track kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Captions,
    Subtitles,
    Descriptions,
    Chapters,
    Metadata,
}

impl TrackKind {
    /// Kinds that render over the picture and must be hidden during ads
    pub fn is_suppressible(&self) -> bool {
        matches!(
            self,
            TrackKind::Captions | TrackKind::Subtitles | TrackKind::Descriptions
        )
    }
}

/// Text track visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackMode {
    Enabled,
    Disabled,
}

/// Text track as listed by the playback surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextTrackInfo {
    pub id: TrackId,
    pub kind: TrackKind,
    pub mode: TrackMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Ad framework configuration
///
/// The retry limit and delays are empirically tuned policy values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdsConfig {
    /// Maximum seekable re-checks before giving up on time restoration
    pub seek_retry_limit: u32,
    /// Delay between seekable re-checks in milliseconds
    pub seek_retry_delay_ms: u64,
    /// Grace period for `adsready` after an early play request
    pub ads_ready_timeout_ms: u64,
    /// How long to wait for a pre-roll to start
    pub preroll_timeout_ms: u64,
    /// How long to wait for a post-roll to start
    pub postroll_timeout_ms: u64,
}

impl AdsConfig {
    /// Upper bound accepted for `seek_retry_limit`
    pub const MAX_SEEK_RETRY_LIMIT: u32 = 1000;

    pub fn seek_retry_delay(&self) -> Duration {
        Duration::from_millis(self.seek_retry_delay_ms)
    }

    pub fn ads_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ads_ready_timeout_ms)
    }

    pub fn preroll_timeout(&self) -> Duration {
        Duration::from_millis(self.preroll_timeout_ms)
    }

    pub fn postroll_timeout(&self) -> Duration {
        Duration::from_millis(self.postroll_timeout_ms)
    }

    /// Check the configuration for values the waiter cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.seek_retry_delay_ms == 0 {
            return Err(Error::InvalidConfig(
                "seek_retry_delay_ms must be greater than zero".to_string(),
            ));
        }
        if self.seek_retry_limit > Self::MAX_SEEK_RETRY_LIMIT {
            return Err(Error::InvalidConfig(format!(
                "seek_retry_limit {} exceeds {}",
                self.seek_retry_limit,
                Self::MAX_SEEK_RETRY_LIMIT
            )));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: AdsConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for AdsConfig {
    fn default() -> Self {
        Self {
            seek_retry_limit: 20,
            seek_retry_delay_ms: 50,
            ads_ready_timeout_ms: 5000,
            preroll_timeout_ms: 5000,
            postroll_timeout_ms: 5000,
        }
    }
}
