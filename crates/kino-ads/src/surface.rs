//! Playback surface contract
//!
//! The ad framework never owns the media element. It drives whatever
//! implements [`PlaybackSurface`]: a browser video element behind a
//! binding, a GStreamer pipeline, or the in-memory [`SimulatedSurface`]
//! used by tests and the CLI.

use crate::types::*;
use serde::Serialize;

/// Capabilities the ad framework needs from the playback surface
pub trait PlaybackSurface {
    /// Currently loaded source (`currentSrc`)
    fn current_src(&self) -> Option<String>;

    /// Raw source attribute; can diverge from `current_src` when a load
    /// is intercepted before the element picks it up
    fn src_attribute(&self) -> Option<String> {
        self.current_src()
    }

    /// MIME type of the current source, if known
    fn current_type(&self) -> Option<String>;

    /// Assign a new source
    fn set_source(&mut self, source: &MediaSource);

    /// Playback position in seconds
    fn current_time(&self) -> f64;

    /// Seek to a position in seconds
    fn set_current_time(&mut self, time: f64);

    /// Duration of the current source in seconds (NaN when unknown)
    fn duration(&self) -> f64;

    fn is_ended(&self) -> bool;

    fn is_paused(&self) -> bool;

    /// Ranges the surface currently accepts seeks into
    fn seekable(&self) -> Vec<TimeRange>;

    fn play(&mut self);

    fn load(&mut self);

    /// Text tracks currently attached to the surface
    fn text_tracks(&self) -> Vec<TextTrackInfo>;

    /// Mode of a single track; `None` once the surface dropped it
    fn track_mode(&self, id: TrackId) -> Option<TrackMode> {
        self.text_tracks()
            .into_iter()
            .find(|track| track.id == id)
            .map(|track| track.mode)
    }

    /// Change a track's mode. Returns false if the track is gone.
    fn set_track_mode(&mut self, id: TrackId, mode: TrackMode) -> bool;
}

/// Counters for the side-effecting calls made on a [`SimulatedSurface`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SurfaceCalls {
    pub play: u32,
    pub load: u32,
    pub set_source: u32,
    pub set_current_time: u32,
}

/// In-memory playback surface
///
/// Behaves like a media element closely enough to exercise the ad
/// framework: assigning a source resets time and pauses, `play` clears
/// the ended flag, and seekable ranges are whatever the host says they
/// are.
#[derive(Debug, Clone)]
pub struct SimulatedSurface {
    src: Option<String>,
    src_attribute: Option<String>,
    mime_type: Option<String>,
    current_time: f64,
    duration: f64,
    ended: bool,
    paused: bool,
    seekable: Vec<TimeRange>,
    tracks: Vec<TextTrackInfo>,
    next_track_id: u32,
    calls: SurfaceCalls,
}

impl SimulatedSurface {
    /// Create a paused surface with `src` loaded and fully seekable
    pub fn new(src: impl Into<String>) -> Self {
        let duration = 600.0;
        Self {
            src: Some(src.into()),
            src_attribute: None,
            mime_type: None,
            current_time: 0.0,
            duration,
            ended: false,
            paused: true,
            seekable: vec![TimeRange::new(0.0, duration)],
            tracks: Vec::new(),
            next_track_id: 1,
            calls: SurfaceCalls::default(),
        }
    }

    /// Create a surface with nothing loaded
    pub fn empty() -> Self {
        Self {
            src: None,
            seekable: Vec::new(),
            ..Self::new("")
        }
    }

    pub fn with_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self.seekable = vec![TimeRange::new(0.0, duration)];
        self
    }

    pub fn with_track(mut self, kind: TrackKind, mode: TrackMode) -> Self {
        self.add_track(kind, mode);
        self
    }

    /// Attach a text track, returning its handle
    pub fn add_track(&mut self, kind: TrackKind, mode: TrackMode) -> TrackId {
        let id = TrackId(self.next_track_id);
        self.next_track_id += 1;
        self.tracks.push(TextTrackInfo {
            id,
            kind,
            mode,
            label: None,
            language: None,
        });
        id
    }

    /// Detach a text track (the surface owns track lifetimes)
    pub fn remove_track(&mut self, id: TrackId) {
        self.tracks.retain(|track| track.id != id);
    }

    /// Number of caption/subtitle/description tracks currently enabled
    pub fn enabled_track_count(&self) -> usize {
        self.tracks
            .iter()
            .filter(|track| track.kind.is_suppressible() && track.mode == TrackMode::Enabled)
            .count()
    }

    /// Override the raw source attribute without touching `current_src`
    pub fn set_src_attribute(&mut self, src: Option<String>) {
        self.src_attribute = src;
    }

    pub fn set_seekable(&mut self, ranges: Vec<TimeRange>) {
        self.seekable = ranges;
    }

    pub fn set_ended(&mut self, ended: bool) {
        self.ended = ended;
        if ended {
            self.paused = true;
        }
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Move the playhead without counting it as a seek
    pub fn advance_to(&mut self, time: f64) {
        self.current_time = time;
    }

    pub fn calls(&self) -> SurfaceCalls {
        self.calls
    }

    pub fn reset_calls(&mut self) {
        self.calls = SurfaceCalls::default();
    }
}

impl PlaybackSurface for SimulatedSurface {
    fn current_src(&self) -> Option<String> {
        self.src.clone()
    }

    fn src_attribute(&self) -> Option<String> {
        self.src_attribute.clone().or_else(|| self.src.clone())
    }

    fn current_type(&self) -> Option<String> {
        self.mime_type.clone()
    }

    fn set_source(&mut self, source: &MediaSource) {
        self.calls.set_source += 1;
        self.src = Some(source.src.clone());
        self.src_attribute = None;
        self.mime_type = source.mime_type.clone();
        self.current_time = 0.0;
        self.ended = false;
        self.paused = true;
    }

    fn current_time(&self) -> f64 {
        self.current_time
    }

    fn set_current_time(&mut self, time: f64) {
        self.calls.set_current_time += 1;
        self.current_time = time;
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn is_ended(&self) -> bool {
        self.ended
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn seekable(&self) -> Vec<TimeRange> {
        self.seekable.clone()
    }

    fn play(&mut self) {
        self.calls.play += 1;
        self.paused = false;
        self.ended = false;
    }

    fn load(&mut self) {
        self.calls.load += 1;
    }

    fn text_tracks(&self) -> Vec<TextTrackInfo> {
        self.tracks.clone()
    }

    fn set_track_mode(&mut self, id: TrackId, mode: TrackMode) -> bool {
        match self.tracks.iter_mut().find(|track| track.id == id) {
            Some(track) => {
                track.mode = mode;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_source_resets_playback() {
        let mut surface = SimulatedSurface::new("content.mp4");
        surface.play();
        surface.advance_to(42.0);

        surface.set_source(&MediaSource::new("ad.mp4").with_type("video/mp4"));

        assert_eq!(surface.current_src().as_deref(), Some("ad.mp4"));
        assert_eq!(surface.current_type().as_deref(), Some("video/mp4"));
        assert_eq!(surface.current_time(), 0.0);
        assert!(surface.is_paused());
        assert_eq!(surface.calls().set_source, 1);
    }

    #[test]
    fn test_src_attribute_can_diverge() {
        let mut surface = SimulatedSurface::new("content.mp4");
        assert_eq!(surface.src_attribute().as_deref(), Some("content.mp4"));

        surface.set_src_attribute(Some("ad.mp4".to_string()));
        assert_eq!(surface.current_src().as_deref(), Some("content.mp4"));
        assert_eq!(surface.src_attribute().as_deref(), Some("ad.mp4"));
    }

    #[test]
    fn test_track_modes() {
        let mut surface = SimulatedSurface::new("content.mp4")
            .with_track(TrackKind::Captions, TrackMode::Enabled)
            .with_track(TrackKind::Metadata, TrackMode::Enabled);
        assert_eq!(surface.enabled_track_count(), 1);

        assert!(surface.set_track_mode(TrackId(1), TrackMode::Disabled));
        assert_eq!(surface.track_mode(TrackId(1)), Some(TrackMode::Disabled));
        assert_eq!(surface.enabled_track_count(), 0);

        surface.remove_track(TrackId(1));
        assert!(!surface.set_track_mode(TrackId(1), TrackMode::Enabled));
        assert_eq!(surface.track_mode(TrackId(1)), None);
    }
}
