//! Benchmark tests for kino-ads operations
//!
//! Run with: cargo bench -p kino-ads

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use kino_ads::{
    AdSession, AdsConfig, ManualTimer, MediaSource, PlaybackSnapshot, Signal, SimulatedSurface,
    TimerKind, TrackKind, TrackMode,
};

// ============================================================================
// Helpers
// ============================================================================

fn create_surface(track_count: usize) -> SimulatedSurface {
    let mut surface = SimulatedSurface::new("https://cdn.example.com/content.mp4")
        .with_type("video/mp4")
        .with_duration(3600.0);
    for i in 0..track_count {
        let kind = if i % 2 == 0 {
            TrackKind::Captions
        } else {
            TrackKind::Subtitles
        };
        surface.add_track(kind, TrackMode::Enabled);
    }
    surface.advance_to(1200.0);
    surface
}

fn create_session(track_count: usize) -> AdSession<SimulatedSurface, ManualTimer> {
    AdSession::new(
        create_surface(track_count),
        ManualTimer::new(),
        AdsConfig::default(),
    )
}

// ============================================================================
// Snapshot Benchmarks
// ============================================================================

fn bench_snapshot_capture(c: &mut Criterion) {
    let mut group = c.benchmark_group("Snapshot Capture");

    for &tracks in &[0, 4, 16, 64] {
        group.bench_with_input(
            BenchmarkId::new("capture_and_restore", tracks),
            &tracks,
            |b, &count| {
                let mut surface = create_surface(count);
                b.iter(|| {
                    let snapshot = PlaybackSnapshot::capture(&mut surface, true);
                    snapshot.restore_tracks(&mut surface);
                    black_box(snapshot)
                });
            },
        );
    }

    group.finish();
}

// ============================================================================
// Ad Break Benchmarks
// ============================================================================

fn bench_ad_break(c: &mut Criterion) {
    let mut group = c.benchmark_group("Ad Break");

    group.bench_function("in_stream_break", |b| {
        b.iter(|| {
            let mut session = create_session(2);
            for signal in [Signal::AdsReady, Signal::Play, Signal::AdStart, Signal::AdEnd] {
                session.dispatch(signal);
            }
            black_box(session.state())
        });
    });

    group.bench_function("source_swap_break", |b| {
        b.iter(|| {
            let mut session = create_session(2);
            session.dispatch(Signal::AdsReady);
            session.dispatch(Signal::Play);
            session.dispatch(Signal::AdStart);
            session
                .surface_mut()
                .set_source(&MediaSource::new("https://ads.example.com/ad.mp4"));
            session.dispatch(Signal::LoadStart);
            session.dispatch(Signal::AdEnd);
            session.dispatch(Signal::LoadedMetadata);
            black_box(session.state())
        });
    });

    group.bench_function("exhausted_seekable_wait", |b| {
        b.iter(|| {
            let mut session = create_session(0);
            session.surface_mut().set_seekable(Vec::new());
            session.dispatch(Signal::AdStart);
            session
                .surface_mut()
                .set_source(&MediaSource::new("https://ads.example.com/ad.mp4"));
            session.dispatch(Signal::AdEnd);
            session.dispatch(Signal::LoadedMetadata);
            while let Some(token) = session.timer_mut().pop_kind(TimerKind::SeekRetry) {
                session.fire_timer(token);
            }
            black_box(session.machine().retry_attempts())
        });
    });

    group.finish();
}

// ============================================================================
// Signal Parsing Benchmarks
// ============================================================================

fn bench_signal_parsing(c: &mut Criterion) {
    let names = [
        "adsready", "play", "adstart", "adend", "adtimeout", "loadedmetadata", "loadstart", "ended",
    ];

    c.bench_function("parse_signal_names", |b| {
        b.iter(|| {
            for name in names {
                black_box(name.parse::<Signal>().ok());
            }
        });
    });
}

criterion_group!(
    snapshot_benches,
    bench_snapshot_capture,
);

criterion_group!(
    break_benches,
    bench_ad_break,
);

criterion_group!(
    signal_benches,
    bench_signal_parsing,
);

criterion_main!(
    snapshot_benches,
    break_benches,
    signal_benches,
);
