//! Line-delimited JSON telemetry sent to the host
//!
//! Wire shape: `{"type": "...", "data": {...}, "timestamp": <seconds>}`.

use serde::Serialize;

/// Payload of a telemetry message, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TelemetryData {
    LayerChange { layer: usize },
    KeyAction { key: String },
}

/// One telemetry line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryMessage {
    #[serde(flatten)]
    pub data: TelemetryData,
    /// Seconds since the feedback notifier started
    pub timestamp: f64,
}

impl TelemetryMessage {
    pub fn layer_change(layer: usize, timestamp: f64) -> Self {
        Self {
            data: TelemetryData::LayerChange { layer },
            timestamp,
        }
    }

    pub fn key_action(key: impl Into<String>, timestamp: f64) -> Self {
        Self {
            data: TelemetryData::KeyAction { key: key.into() },
            timestamp,
        }
    }

    /// Single-line JSON, no trailing newline
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
