//! Terminal rendering of pipeline telemetry

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use super::{Stage, TelemetryCollector};
use crate::cli::Verbosity;

/// Tagged console output for a run
#[derive(Clone)]
pub struct TelemetryDisplay {
    collector: TelemetryCollector,
    verbosity: Verbosity,
}

impl TelemetryDisplay {
    pub fn new(collector: TelemetryCollector, verbosity: Verbosity) -> Self {
        Self {
            collector,
            verbosity,
        }
    }

    pub fn collector(&self) -> &TelemetryCollector {
        &self.collector
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Stage progress line, shown unless quiet
    pub fn stage(&self, stage: Stage, message: &str) {
        if self.verbosity.show_progress() {
            println!("{} {}", stage.tag().cyan().bold(), message);
        }
    }

    /// Extra detail, shown with -v
    pub fn detail(&self, stage: Stage, message: &str) {
        if self.verbosity.show_events() {
            println!("{} {}", stage.tag().dimmed(), message.dimmed());
        }
    }

    /// Large payloads (prompts, raw model output), shown with -vv
    pub fn trace(&self, stage: Stage, label: &str, body: &str) {
        if self.verbosity.show_tokens() {
            println!("{} {}:\n{}", stage.tag().dimmed(), label, body);
        }
    }

    /// Degraded stage warning; always written to stderr, quiet included
    pub fn warn(&self, stage: Stage, message: &str) {
        eprintln!("{} {}: {}", stage.tag().yellow().bold(), "Warning".yellow(), message);
    }

    /// Raw model output after a parse failure; always written to stderr
    pub fn raw_output(&self, raw: &str) {
        eprintln!("{}\n{}", "Raw model output:".yellow(), raw);
    }

    /// Spinner while waiting on a slow stage; hidden when quiet
    pub fn spinner(&self, message: &str) -> ProgressBar {
        if !self.verbosity.show_progress() {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.cyan} {msg} [{elapsed}]")
        {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Display summary statistics
    pub fn display_summary(&self) {
        if !self.verbosity.show_progress() {
            return;
        }

        let stats = self.collector.get_stats();
        let elapsed = self.collector.elapsed();

        println!("\n{}", "Run Summary".bold());
        println!("─────────────────────────────────────");
        println!("Duration:          {:.1}s", elapsed.as_secs_f64());
        println!("Stages completed:  {}", stats.stages_completed);
        if stats.stages_degraded == 0 {
            println!("Stages degraded:   {}", "0".green());
        } else {
            println!(
                "Stages degraded:   {}",
                stats.stages_degraded.to_string().yellow()
            );
            for (stage, error) in self.collector.degraded_stages() {
                println!("  {} {}", stage.tag().yellow(), error);
            }
        }
        println!();
    }
}
