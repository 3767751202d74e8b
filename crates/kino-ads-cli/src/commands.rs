//! CLI command implementations

use anyhow::Context;
use chrono::Utc;
use kino_ads::{
    AdSession, AdsConfig, ManualTimer, SessionCommand, Signal, SimulatedSurface, TimerKind,
    TokioTimer,
};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::output;
use crate::report::{RunReport, SessionSummary, SimulationReport, StateChange, StepRecord};
use crate::scenario::{Scenario, Step};

const COMMAND_BUFFER: usize = 64;

/// Replay a scenario with simulated timers
pub fn simulate(
    path: &Path,
    config_path: Option<&Path>,
    immediate_timers: bool,
    format: &str,
) -> anyhow::Result<()> {
    let scenario = Scenario::load(path)?;
    let config = resolve_config(&scenario, config_path)?;

    info!(scenario = %path.display(), steps = scenario.steps.len(), "Simulating scenario");
    let report = simulate_scenario(&scenario, config, immediate_timers);

    output::print_simulation(&report, format);
    Ok(())
}

/// Replay a scenario through the async session loop with real timers
pub async fn run(path: &Path, config_path: Option<&Path>, format: &str) -> anyhow::Result<()> {
    let scenario = Scenario::load(path)?;
    let config = resolve_config(&scenario, config_path)?;

    info!(scenario = %path.display(), steps = scenario.steps.len(), "Running scenario");
    let report = run_scenario(&scenario, config).await?;

    output::print_run(&report, format);
    Ok(())
}

/// List recognized signal names
pub fn signals(format: &str) -> anyhow::Result<()> {
    let rows: Vec<serde_json::Value> = Signal::ALL
        .iter()
        .map(|signal| {
            serde_json::json!({
                "name": signal.name(),
                "description": describe(*signal),
            })
        })
        .collect();

    match output::OutputFormat::from(format) {
        output::OutputFormat::Json => println!("{}", output::format_json(&rows)),
        _ => {
            println!("Signals:");
            for signal in Signal::ALL {
                println!("  {:<16} {}", signal.name(), describe(signal));
            }
        }
    }
    Ok(())
}

/// Print the default configuration, or validate a configuration file
pub fn config(check: Option<&Path>) -> anyhow::Result<()> {
    match check {
        Some(path) => {
            let config = load_config(path)?;
            println!("{} is valid", path.display());
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        None => println!("{}", serde_json::to_string_pretty(&AdsConfig::default())?),
    }
    Ok(())
}

pub fn simulate_scenario(
    scenario: &Scenario,
    config: AdsConfig,
    immediate_timers: bool,
) -> SimulationReport {
    let mut session = AdSession::new(scenario.surface.build(), ManualTimer::new(), config.clone());
    let mut steps = Vec::with_capacity(scenario.steps.len());

    for (index, step) in scenario.steps.iter().enumerate() {
        let from = session.state();

        match step {
            Step::Signal(signal) => {
                session.dispatch(*signal);
            }
            Step::Fire(kind) => match session.timer_mut().pop_kind(*kind) {
                Some(token) => {
                    session.fire_timer(token);
                }
                None => warn!(step = index + 1, kind = ?kind, "No pending timer to fire"),
            },
            Step::Wait(ms) => wait(&mut session, Duration::from_millis(*ms)),
            change => change.apply_to_surface(session.surface_mut()),
        }

        if immediate_timers {
            fire_seek_retries(&mut session);
        }

        steps.push(StepRecord::new(index + 1, step, from, &session));
    }

    SimulationReport {
        scenario: scenario.name.clone(),
        generated_at: Utc::now(),
        config,
        steps,
        pending_timers: session.timer().pending(),
        summary: SessionSummary::from_session(&session),
    }
}

pub async fn run_scenario(scenario: &Scenario, config: AdsConfig) -> anyhow::Result<RunReport> {
    let started_at = Utc::now();
    let (timer, firings) = TokioTimer::new();
    let session = AdSession::new(scenario.surface.build(), timer, config.clone());
    let mut states = session.subscribe_state();
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);

    // Ends once the session, and with it the state sender, is dropped
    let observer = tokio::spawn(async move {
        let mut timeline = Vec::new();
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            timeline.push(StateChange {
                at: Utc::now(),
                state,
            });
        }
        timeline
    });
    let driver = tokio::spawn(kino_ads::run(session, rx, firings));

    for (index, step) in scenario.steps.iter().enumerate() {
        let command = match step {
            Step::Signal(signal) => SessionCommand::Signal(*signal),
            Step::Wait(ms) => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                continue;
            }
            Step::Fire(kind) => {
                warn!(step = index + 1, kind = ?kind, "Timers are real in run mode; skipping fire step");
                continue;
            }
            change => {
                let change = change.clone();
                SessionCommand::surface(move |surface: &mut SimulatedSurface| {
                    change.apply_to_surface(surface)
                })
            }
        };
        debug!(step = index + 1, ?command, "Sending command");
        tx.send(command)
            .await
            .map_err(|_| anyhow::anyhow!("session loop stopped early"))?;
    }
    drop(tx);

    let session = driver.await?;
    let summary = SessionSummary::from_session(&session);
    drop(session);
    let timeline = observer.await?;

    Ok(RunReport {
        scenario: scenario.name.clone(),
        started_at,
        finished_at: Utc::now(),
        config,
        timeline,
        summary,
    })
}

/// Fire every firing that comes due within `elapsed` on the virtual clock
fn wait(session: &mut AdSession<SimulatedSurface, ManualTimer>, elapsed: Duration) {
    let until = session.timer().now() + elapsed;
    while let Some(token) = session.timer_mut().pop_due(until) {
        session.fire_timer(token);
    }
    session.timer_mut().advance_to(until);
}

fn fire_seek_retries(session: &mut AdSession<SimulatedSurface, ManualTimer>) {
    while let Some(token) = session.timer_mut().pop_kind(TimerKind::SeekRetry) {
        session.fire_timer(token);
    }
}

fn resolve_config(scenario: &Scenario, config_path: Option<&Path>) -> anyhow::Result<AdsConfig> {
    match config_path {
        Some(path) => load_config(path),
        None => Ok(scenario.config.clone().unwrap_or_default()),
    }
}

fn load_config(path: &Path) -> anyhow::Result<AdsConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = AdsConfig::from_json(&json)
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(config)
}

fn describe(signal: Signal) -> &'static str {
    match signal {
        Signal::AdsReady => "ad inventory is available",
        Signal::Play => "viewer requested playback",
        Signal::AdStart => "an ad break started",
        Signal::AdEnd => "the ad break finished",
        Signal::AdTimeout => "the ad provider gave up",
        Signal::AdSkip => "the ad provider declined the pending break",
        Signal::LoadedMetadata => "metadata for the current source loaded",
        Signal::LoadStart => "the surface began loading a source",
        Signal::Ended => "content reached its end",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kino_ads::AdState;

    const MIDROLL: &str = include_str!("../scenarios/midroll-source-swap.json");
    const POSTROLL: &str = include_str!("../scenarios/postroll.json");
    const TIMEOUT: &str = include_str!("../scenarios/preroll-timeout.json");
    const SEEKABLE: &str = include_str!("../scenarios/seekable-wait.json");

    fn simulate_json(json: &str, immediate_timers: bool) -> SimulationReport {
        let scenario = Scenario::from_json(json).unwrap();
        let config = scenario.config.clone().unwrap_or_default();
        simulate_scenario(&scenario, config, immediate_timers)
    }

    #[test]
    fn test_midroll_scenario_restores_content() {
        let report = simulate_json(MIDROLL, false);
        let summary = &report.summary;

        assert_eq!(summary.final_state, AdState::ContentPlayback);
        assert_eq!(summary.src.as_deref(), Some("https://cdn.example.com/feature.mp4"));
        assert_eq!(summary.current_time, 312.0);
        assert_eq!(summary.enabled_tracks, 1);
        assert!(!summary.paused);
        assert_eq!(summary.calls.set_current_time, 1);
        assert_eq!(summary.breaks_started, 2);
    }

    #[test]
    fn test_immediate_timers_drain_retries() {
        let json = r#"{
            "surface": { "src": "content.mp4" },
            "steps": [
                { "advance": 100.0 },
                { "signal": "adstart" },
                { "set_source": { "src": "ad.mp4" } },
                { "signal": "adend" },
                { "seekable": [] },
                { "signal": "loadedmetadata" }
            ]
        }"#;

        let report = simulate_json(json, true);
        assert_eq!(report.pending_timers, 0);
        assert_eq!(report.summary.calls.set_current_time, 0);
        assert_eq!(report.summary.src.as_deref(), Some("content.mp4"));

        let report = simulate_json(json, false);
        assert_eq!(report.pending_timers, 1);
    }

    #[test]
    fn test_postroll_scenario() {
        let report = simulate_json(POSTROLL, false);

        assert_eq!(report.summary.final_state, AdState::ContentPlayback);
        assert_eq!(report.summary.breaks_started, 2);
        assert!(report
            .steps
            .iter()
            .any(|step| step.to == AdState::PostrollWait));
    }

    #[test]
    fn test_preroll_timeout_scenario_waits_out_deadline() {
        let report = simulate_json(TIMEOUT, false);

        assert_eq!(report.summary.final_state, AdState::ContentPlayback);
        assert_eq!(report.summary.breaks_started, 0);
        assert!(report.steps.iter().any(|step| step.to == AdState::PrerollWait));
    }

    #[test]
    fn test_seekable_wait_scenario_uses_virtual_clock() {
        let report = simulate_json(SEEKABLE, false);

        assert_eq!(report.summary.current_time, 100.0);
        assert_eq!(report.summary.calls.set_current_time, 1);
        assert!(!report.summary.paused);
        assert_eq!(report.pending_timers, 0);
    }

    #[test]
    fn test_step_records_track_transitions() {
        let report = simulate_json(MIDROLL, false);
        let adstart = report
            .steps
            .iter()
            .find(|step| step.step == "signal adstart")
            .unwrap();

        assert_eq!(adstart.to, AdState::AdPlayback);
    }

    #[tokio::test]
    async fn test_run_scenario_with_real_timers() {
        let scenario = Scenario::from_json(MIDROLL).unwrap();
        let config = AdsConfig {
            seek_retry_delay_ms: 1,
            ..Default::default()
        };

        let report = run_scenario(&scenario, config).await.unwrap();

        assert_eq!(report.summary.final_state, AdState::ContentPlayback);
        assert_eq!(report.summary.current_time, 312.0);
        assert_eq!(
            report.timeline.last().map(|change| change.state),
            Some(AdState::ContentPlayback)
        );
    }
}
