//! Ad break example
//!
//! Walks a simulated player through a pre-roll, a mid-roll that swaps the
//! source, and a post-roll, printing each state change.
//!
//! Run with: cargo run -p kino-ads --example ad_break

use kino_ads::{
    AdSession, AdsConfig, ManualTimer, MediaSource, PlaybackSurface, Signal, SimulatedSurface,
    TrackKind, TrackMode,
};

fn main() {
    println!("Kino Ads - Ad Break Example");
    println!("==========================================\n");

    let surface = SimulatedSurface::new("https://cdn.example.com/feature.mp4")
        .with_type("video/mp4")
        .with_track(TrackKind::Captions, TrackMode::Enabled);
    let mut session = AdSession::new(surface, ManualTimer::new(), AdsConfig::default());

    let step = |session: &mut AdSession<SimulatedSurface, ManualTimer>, signal: Signal| {
        let transition = session.dispatch(signal);
        println!(
            "  {:<16} {:>20} -> {:<20} time={:>6.1} captions={}",
            signal.to_string(),
            transition.from.to_string(),
            transition.to.to_string(),
            session.surface().current_time(),
            session.surface().enabled_track_count(),
        );
    };

    println!("Pre-roll (in-stream, source never changes):");
    step(&mut session, Signal::AdsReady);
    step(&mut session, Signal::Play);
    step(&mut session, Signal::AdStart);
    step(&mut session, Signal::AdEnd);

    println!("\nMid-roll at 312s (ad swaps the source):");
    session.surface_mut().advance_to(312.0);
    step(&mut session, Signal::AdStart);
    session
        .surface_mut()
        .set_source(&MediaSource::new("https://ads.example.com/spot-30s.mp4"));
    step(&mut session, Signal::LoadStart);
    step(&mut session, Signal::AdEnd);
    step(&mut session, Signal::LoadedMetadata);

    println!("\nPost-roll:");
    session.surface_mut().set_ended(true);
    step(&mut session, Signal::Ended);
    step(&mut session, Signal::AdStart);
    step(&mut session, Signal::AdEnd);

    let calls = session.surface().calls();
    println!(
        "\nSurface calls: play={} load={} set_source={} set_current_time={}",
        calls.play, calls.load, calls.set_source, calls.set_current_time
    );
    println!(
        "Final source: {}",
        session.surface().current_src().unwrap_or_default()
    );
}
