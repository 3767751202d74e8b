//! Output formatting for CLI

use console::style;
use kino_ads::AdState;
use serde::Serialize;
use tabled::Table;

use crate::report::{RunReport, SessionSummary, SimulationReport};

/// Output format options
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "table" => OutputFormat::Table,
            _ => OutputFormat::Text,
        }
    }
}

/// Render a report for `--format json`; text and table are printed per report
pub fn format_json<T: Serialize>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
}

pub fn print_simulation(report: &SimulationReport, format: &str) {
    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", format_json(report)),
        OutputFormat::Table => {
            print_title(report.scenario.as_deref());
            println!("{}", Table::new(&report.steps));
            print_summary(&report.summary);
        }
        OutputFormat::Text => {
            print_title(report.scenario.as_deref());
            for step in &report.steps {
                let marker = if step.from != step.to { "->" } else { "  " };
                println!(
                    "  {:>3}. {:<44} {} {:<20} t={:>8.1}",
                    step.index,
                    step.step,
                    marker,
                    styled_state(step.to),
                    step.current_time,
                );
            }
            if report.pending_timers > 0 {
                println!("\n  {} timer firing(s) still pending", report.pending_timers);
            }
            print_summary(&report.summary);
        }
    }
}

pub fn print_run(report: &RunReport, format: &str) {
    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", format_json(report)),
        OutputFormat::Table | OutputFormat::Text => {
            print_title(report.scenario.as_deref());
            for change in &report.timeline {
                let offset = change.at - report.started_at;
                println!(
                    "  [{}] +{:>6}ms {}",
                    change.at.format("%H:%M:%S%.3f"),
                    offset.num_milliseconds(),
                    styled_state(change.state),
                );
            }
            let elapsed = report.finished_at - report.started_at;
            println!("\n  Finished in {}ms", elapsed.num_milliseconds());
            print_summary(&report.summary);
        }
    }
}

fn print_title(name: Option<&str>) {
    match name {
        Some(name) => println!("Scenario: {}\n", style(name).bold()),
        None => println!("Scenario\n"),
    }
}

fn print_summary(summary: &SessionSummary) {
    println!("\nSummary:");
    println!("  Session: {}", summary.session_id);
    println!("  Final state: {}", styled_state(summary.final_state));
    println!("  Source: {}", summary.src.as_deref().unwrap_or("-"));
    println!("  Time: {:.1}s ({})", summary.current_time, if summary.paused { "paused" } else { "playing" });
    println!("  Enabled tracks: {}", summary.enabled_tracks);
    println!("  Breaks started: {}", summary.breaks_started);
    println!(
        "  Surface calls: play={} load={} set_source={} set_current_time={}",
        summary.calls.play,
        summary.calls.load,
        summary.calls.set_source,
        summary.calls.set_current_time,
    );
}

fn styled_state(state: AdState) -> String {
    let name = state.name();
    if state.is_ad_mode() {
        style(name).yellow().to_string()
    } else if state.is_waiting() {
        style(name).cyan().to_string()
    } else {
        style(name).green().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parsing() {
        assert!(matches!(OutputFormat::from("JSON"), OutputFormat::Json));
        assert!(matches!(OutputFormat::from("table"), OutputFormat::Table));
        assert!(matches!(OutputFormat::from("anything"), OutputFormat::Text));
    }

    #[test]
    fn test_format_json_is_pretty_printed() {
        let json = format_json(&serde_json::json!({ "state": AdState::PrerollWait }));
        assert_eq!(json, "{\n  \"state\": \"preroll?\"\n}");
    }
}
