//! Telemetry for pipeline runs
//!
//! Records stage start/finish/degradation events and renders tagged console
//! output gated by [`Verbosity`].

mod display;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

pub use display::TelemetryDisplay;

use crate::cli::Verbosity;

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Extract,
    Chunk,
    Embed,
    Store,
    Index,
    Prompt,
    Generate,
    Parse,
    Export,
}

impl Stage {
    /// Console tag, e.g. `[EXTRACT]`
    pub fn tag(&self) -> &'static str {
        match self {
            Stage::Extract => "[EXTRACT]",
            Stage::Chunk => "[CHUNK]",
            Stage::Embed => "[EMBED]",
            Stage::Store => "[STORE]",
            Stage::Index => "[INDEX]",
            Stage::Prompt => "[PROMPT]",
            Stage::Generate => "[GENERATE]",
            Stage::Parse => "[PARSE]",
            Stage::Export => "[EXPORT]",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Chunk => "chunk",
            Stage::Embed => "embed",
            Stage::Store => "store",
            Stage::Index => "index",
            Stage::Prompt => "prompt",
            Stage::Generate => "generate",
            Stage::Parse => "parse",
            Stage::Export => "export",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Telemetry event types
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    StageStarted {
        stage: Stage,
        timestamp: Instant,
    },
    StageCompleted {
        stage: Stage,
        duration_ms: u64,
        detail: String,
        timestamp: Instant,
    },
    /// Stage failed and the run continued without its output
    StageDegraded {
        stage: Stage,
        error: String,
        timestamp: Instant,
    },
}

/// Telemetry statistics
#[derive(Debug, Clone, Default)]
pub struct TelemetryStats {
    pub stages_started: usize,
    pub stages_completed: usize,
    pub stages_degraded: usize,
}

/// Telemetry collector
#[derive(Clone)]
pub struct TelemetryCollector {
    events: Arc<Mutex<Vec<TelemetryEvent>>>,
    stats: Arc<Mutex<TelemetryStats>>,
    start_time: Instant,
}

// A panic while holding the lock cannot leave the event log inconsistent
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl TelemetryCollector {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            stats: Arc::new(Mutex::new(TelemetryStats::default())),
            start_time: Instant::now(),
        }
    }

    /// Record an event
    pub fn record(&self, event: TelemetryEvent) {
        {
            let mut stats = lock(&self.stats);
            match &event {
                TelemetryEvent::StageStarted { .. } => stats.stages_started += 1,
                TelemetryEvent::StageCompleted { .. } => stats.stages_completed += 1,
                TelemetryEvent::StageDegraded { .. } => stats.stages_degraded += 1,
            }
        }

        lock(&self.events).push(event);
    }

    pub fn get_stats(&self) -> TelemetryStats {
        lock(&self.stats).clone()
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    pub fn event_count(&self) -> usize {
        lock(&self.events).len()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        lock(&self.events).clone()
    }

    /// Stages that degraded, in order, with their error text
    pub fn degraded_stages(&self) -> Vec<(Stage, String)> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                TelemetryEvent::StageDegraded { stage, error, .. } => {
                    Some((*stage, error.clone()))
                }
                _ => None,
            })
            .collect()
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Times one stage and reports it to a collector and display
pub struct StageTimer<'a> {
    display: &'a TelemetryDisplay,
    stage: Stage,
    started: Instant,
}

impl<'a> StageTimer<'a> {
    pub fn start(display: &'a TelemetryDisplay, stage: Stage) -> Self {
        display.collector().record(TelemetryEvent::StageStarted {
            stage,
            timestamp: Instant::now(),
        });
        Self {
            display,
            stage,
            started: Instant::now(),
        }
    }

    /// Mark the stage finished and print `detail`
    pub fn complete(self, detail: impl Into<String>) {
        let detail = detail.into();
        self.display.stage(self.stage, &detail);
        self.display.collector().record(TelemetryEvent::StageCompleted {
            stage: self.stage,
            duration_ms: self.started.elapsed().as_millis() as u64,
            detail,
            timestamp: Instant::now(),
        });
    }

    /// Mark the stage degraded; the run goes on without it
    pub fn degrade(self, error: impl fmt::Display) {
        let error = error.to_string();
        self.display.warn(self.stage, &error);
        self.display.collector().record(TelemetryEvent::StageDegraded {
            stage: self.stage,
            error,
            timestamp: Instant::now(),
        });
    }
}

/// Convenience for a quiet collector/display pair (tests, library use)
pub fn silent() -> TelemetryDisplay {
    TelemetryDisplay::new(TelemetryCollector::new(), Verbosity::Quiet)
}
