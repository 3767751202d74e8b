//! Playback snapshot store
//!
//! Captures what the viewer was watching immediately before an ad takes
//! over the surface, and puts it back afterwards:
//! - Source URL, raw source attribute and MIME type
//! - Playback position, duration and play/ended flags
//! - Caption, subtitle and description track modes

use crate::{
    machine::AdBreakContext,
    surface::PlaybackSurface,
    types::*,
};
use serde::Serialize;
use tracing::debug;

/// A text track hidden for the duration of an ad break
///
/// Only the handle and prior mode are kept; the surface owns the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SuppressedTrack {
    pub id: TrackId,
    pub prior_mode: TrackMode,
}

/// Result of restoring a snapshot after an ad break
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Source never changed; nothing to undo beyond the tracks
    Unchanged,
    /// Content source was written back; time restoration must wait for
    /// metadata
    SourceRestored,
    /// Post-roll: content already ended, restoration stops at the tracks
    PostRoll,
    /// The ad replaced the source but nothing was loaded before the break;
    /// the surface is left as the ad left it
    NoContent,
}

/// Playback state captured at ad start
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackSnapshot {
    /// Content source, if the surface had one
    pub source: Option<MediaSource>,
    /// Raw source attribute at capture time
    pub src_attribute: Option<String>,
    pub current_time: f64,
    pub duration: f64,
    /// Content was playing or about to play
    pub playing: bool,
    /// Surface reported end of stream at capture time
    pub ended: bool,
    pub suppressed_tracks: Vec<SuppressedTrack>,
}

impl PlaybackSnapshot {
    /// Capture the surface state and hide overlay tracks
    ///
    /// `play_requested` covers pre-rolls, where the surface is still
    /// paused because the ad framework intercepted the play request.
    pub fn capture<S>(surface: &mut S, play_requested: bool) -> Self
    where
        S: PlaybackSurface + ?Sized,
    {
        let source = surface.current_src().map(|src| MediaSource {
            src,
            mime_type: surface.current_type(),
        });

        let mut suppressed_tracks = Vec::new();
        for track in surface.text_tracks() {
            if !track.kind.is_suppressible() {
                continue;
            }
            suppressed_tracks.push(SuppressedTrack {
                id: track.id,
                prior_mode: track.mode,
            });
            if track.mode != TrackMode::Disabled {
                surface.set_track_mode(track.id, TrackMode::Disabled);
            }
        }

        let snapshot = Self {
            source,
            src_attribute: surface.src_attribute(),
            current_time: surface.current_time(),
            duration: surface.duration(),
            playing: play_requested || !surface.is_paused(),
            ended: surface.is_ended(),
            suppressed_tracks,
        };

        debug!(
            src = ?snapshot.source.as_ref().map(|s| s.src.as_str()),
            time = snapshot.current_time,
            playing = snapshot.playing,
            ended = snapshot.ended,
            tracks = snapshot.suppressed_tracks.len(),
            "Playback snapshot captured"
        );

        snapshot
    }

    /// Source URL at capture time
    pub fn src(&self) -> Option<&str> {
        self.source.as_ref().map(|source| source.src.as_str())
    }

    /// True when the surface no longer shows the captured source
    ///
    /// Both `currentSrc` and the raw attribute are compared: an
    /// intercepted load changes the attribute without updating
    /// `currentSrc`.
    pub fn source_diverged<S>(&self, surface: &S) -> bool
    where
        S: PlaybackSurface + ?Sized,
    {
        surface.current_src().as_deref() != self.src()
            || surface.src_attribute() != self.src_attribute
    }

    /// Put the suppressed tracks back to their prior modes
    ///
    /// Tracks the surface dropped in the meantime are skipped.
    pub fn restore_tracks<S>(&self, surface: &mut S)
    where
        S: PlaybackSurface + ?Sized,
    {
        for track in &self.suppressed_tracks {
            if !surface.set_track_mode(track.id, track.prior_mode) {
                debug!(track = %track.id, "Suppressed track no longer attached");
            }
        }
    }

    /// Undo the ad break on the surface, as far as the break allows
    pub fn restore<S>(&self, surface: &mut S, context: &AdBreakContext) -> RestoreOutcome
    where
        S: PlaybackSurface + ?Sized,
    {
        self.restore_tracks(surface);

        if context.kind == BreakKind::PostRoll {
            return RestoreOutcome::PostRoll;
        }
        if !context.source_changed {
            return RestoreOutcome::Unchanged;
        }

        match &self.source {
            Some(source) => {
                debug!(src = %source.src, "Restoring content source");
                surface.set_source(source);
                surface.load();
                RestoreOutcome::SourceRestored
            }
            None => {
                debug!("No content source captured, leaving surface alone");
                RestoreOutcome::NoContent
            }
        }
    }

    /// Whether content playback should resume after restoration
    pub fn should_resume<S>(&self, surface: &S) -> bool
    where
        S: PlaybackSurface + ?Sized,
    {
        self.playing && !self.ended && !surface.is_ended()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::SimulatedSurface;

    fn captioned_surface() -> SimulatedSurface {
        SimulatedSurface::new("content.mp4")
            .with_type("video/mp4")
            .with_track(TrackKind::Captions, TrackMode::Enabled)
            .with_track(TrackKind::Subtitles, TrackMode::Disabled)
            .with_track(TrackKind::Metadata, TrackMode::Enabled)
    }

    fn context(kind: BreakKind, source_changed: bool) -> AdBreakContext {
        AdBreakContext {
            kind,
            content_ended_at_entry: kind == BreakKind::PostRoll,
            source_changed,
        }
    }

    #[test]
    fn test_capture_suppresses_overlay_tracks() {
        let mut surface = captioned_surface();
        surface.advance_to(100.0);

        let snapshot = PlaybackSnapshot::capture(&mut surface, true);

        assert_eq!(snapshot.src(), Some("content.mp4"));
        assert_eq!(snapshot.current_time, 100.0);
        assert!(snapshot.playing);
        assert_eq!(snapshot.suppressed_tracks.len(), 2);
        assert_eq!(surface.enabled_track_count(), 0);
        // metadata tracks are left alone
        assert_eq!(surface.track_mode(TrackId(3)), Some(TrackMode::Enabled));
    }

    #[test]
    fn test_capture_without_tracks() {
        let mut surface = SimulatedSurface::new("content.mp4");
        let snapshot = PlaybackSnapshot::capture(&mut surface, false);
        assert!(snapshot.suppressed_tracks.is_empty());
        assert!(!snapshot.playing);
    }

    #[test]
    fn test_restore_unchanged_source_touches_only_tracks() {
        let mut surface = captioned_surface();
        let snapshot = PlaybackSnapshot::capture(&mut surface, true);

        let outcome = snapshot.restore(&mut surface, &context(BreakKind::MidRoll, false));

        assert_eq!(outcome, RestoreOutcome::Unchanged);
        assert_eq!(surface.enabled_track_count(), 1);
        assert_eq!(surface.track_mode(TrackId(2)), Some(TrackMode::Disabled));
        assert_eq!(surface.calls().set_source, 0);
        assert_eq!(surface.calls().set_current_time, 0);
        assert_eq!(surface.calls().play, 0);
    }

    #[test]
    fn test_restore_changed_source_writes_source_and_type() {
        let mut surface = captioned_surface();
        let snapshot = PlaybackSnapshot::capture(&mut surface, true);
        surface.set_source(&MediaSource::new("ad.mp4"));
        assert!(snapshot.source_diverged(&surface));

        let outcome = snapshot.restore(&mut surface, &context(BreakKind::PreRoll, true));

        assert_eq!(outcome, RestoreOutcome::SourceRestored);
        assert_eq!(surface.current_src().as_deref(), Some("content.mp4"));
        assert_eq!(surface.current_type().as_deref(), Some("video/mp4"));
        assert_eq!(surface.calls().load, 1);
    }

    #[test]
    fn test_restore_post_roll_leaves_source_alone() {
        let mut surface = captioned_surface();
        surface.set_ended(true);
        let snapshot = PlaybackSnapshot::capture(&mut surface, true);
        surface.set_source(&MediaSource::new("ad.mp4"));

        let outcome = snapshot.restore(&mut surface, &context(BreakKind::PostRoll, true));

        assert_eq!(outcome, RestoreOutcome::PostRoll);
        assert_eq!(surface.current_src().as_deref(), Some("ad.mp4"));
        assert_eq!(surface.calls().load, 0);
        assert!(!snapshot.should_resume(&surface));
    }

    #[test]
    fn test_restore_without_captured_source_leaves_ad_loaded() {
        let mut surface = SimulatedSurface::empty();
        let snapshot = PlaybackSnapshot::capture(&mut surface, true);
        surface.set_source(&MediaSource::new("ad.mp4"));
        assert!(snapshot.source_diverged(&surface));

        let outcome = snapshot.restore(&mut surface, &context(BreakKind::PreRoll, true));

        assert_eq!(outcome, RestoreOutcome::NoContent);
        assert_eq!(surface.current_src().as_deref(), Some("ad.mp4"));
        assert_eq!(surface.calls().set_source, 1);
        assert_eq!(surface.calls().load, 0);
    }

    #[test]
    fn test_attribute_divergence_counts_as_source_change() {
        let mut surface = SimulatedSurface::new("content.mp4");
        let snapshot = PlaybackSnapshot::capture(&mut surface, true);
        assert!(!snapshot.source_diverged(&surface));

        surface.set_src_attribute(Some("ad.mp4".to_string()));
        assert!(snapshot.source_diverged(&surface));
    }

    #[test]
    fn test_dropped_track_is_skipped_on_restore() {
        let mut surface = captioned_surface();
        let snapshot = PlaybackSnapshot::capture(&mut surface, false);
        surface.remove_track(TrackId(1));

        snapshot.restore_tracks(&mut surface);
        assert_eq!(surface.enabled_track_count(), 0);
        assert_eq!(surface.text_tracks().len(), 2);
    }
}
