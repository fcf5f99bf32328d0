//! Session statistics and the shutdown report

use crate::error::Diagnostic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Running counters for one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Ticks completed
    pub ticks: u64,
    /// Debounced key transitions processed
    pub key_events: u64,
    /// Encoder pulses processed
    pub encoder_pulses: u64,
    /// Key events that resolved to nothing
    pub unresolved_keys: u64,
    /// Feedback events handled by the notifier
    pub feedback_events: u64,
    pub scan_overruns: u32,
    pub queue_overflows: u32,
    pub layer_stack_mismatches: u32,
    pub layer_stack_full: u32,
    pub sink_failures: u32,
}

impl SessionStats {
    /// Count one diagnostic under its kind
    pub fn record(&mut self, diagnostic: &Diagnostic) {
        match diagnostic {
            Diagnostic::ScanOverrun { .. } => self.scan_overruns += 1,
            Diagnostic::QueueOverflow { .. } => self.queue_overflows += 1,
            Diagnostic::LayerStackMismatch { .. } => self.layer_stack_mismatches += 1,
            Diagnostic::LayerStackFull { .. } => self.layer_stack_full += 1,
            Diagnostic::SinkUnavailable { .. } => self.sink_failures += 1,
        }
    }

    /// Total diagnostics of every kind
    pub fn issues(&self) -> u32 {
        self.scan_overruns
            + self.queue_overflows
            + self.layer_stack_mismatches
            + self.layer_stack_full
            + self.sink_failures
    }
}

/// Complete session report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    /// Report metadata
    pub metadata: ReportMetadata,
    /// Counters at the time of the report
    pub summary: SessionStats,
    /// Active layer when the report was taken
    pub active_layer: usize,
    /// Last host context, if any
    pub context: Option<String>,
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Report generation timestamp
    pub generated_at: String,
    /// Application version
    pub version: String,
    /// Session duration in seconds
    pub duration_secs: f64,
}

impl SessionReport {
    pub fn new(
        start_time: Instant,
        stats: &SessionStats,
        active_layer: usize,
        context: Option<&str>,
    ) -> Self {
        let now: DateTime<Utc> = Utc::now();
        Self {
            metadata: ReportMetadata {
                generated_at: now.to_rfc3339(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                duration_secs: start_time.elapsed().as_secs_f64(),
            },
            summary: stats.clone(),
            active_layer,
            context: context.map(str::to_string),
        }
    }

    /// Export report to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
