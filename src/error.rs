//! Recoverable pipeline diagnostics and sink errors
//!
//! Nothing in here halts the tick loop. Components record a [`Diagnostic`]
//! (which also logs it) and carry on; the pipeline collects them into the
//! session statistics. Fatal configuration problems live in
//! [`ConfigError`](crate::config::ConfigError) instead.

use std::fmt;
use std::io;
use thiserror::Error;

/// Which external sink a failure refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Display,
    HostLink,
    Hid,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkKind::Display => write!(f, "display"),
            SinkKind::HostLink => write!(f, "host link"),
            SinkKind::Hid => write!(f, "HID sink"),
        }
    }
}

/// Recoverable per-tick conditions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// More transitions than the scanner could take this tick
    #[error("scan overrun: {deferred} transition(s) deferred to the next tick")]
    ScanOverrun { deferred: usize },

    /// The event queue was full and started evicting events
    #[error("event queue overflow: capacity of {capacity} exceeded, oldest events dropped")]
    QueueOverflow { capacity: usize },

    /// Release of a momentary-layer key whose layer is not on top of the stack
    #[error("layer stack mismatch: release expected layer {expected} on top, found {top}")]
    LayerStackMismatch { expected: usize, top: usize },

    /// Momentary push refused because the stack is at its bound
    #[error("layer stack full: cannot push layer {layer} at depth {depth}")]
    LayerStackFull { layer: usize, depth: usize },

    /// A display, host link or HID sink failed or is absent
    #[error("{sink} unavailable: {reason}")]
    SinkUnavailable { sink: SinkKind, reason: String },
}

impl Diagnostic {
    /// Log the diagnostic and append it to `list`
    pub(crate) fn report(self, list: &mut Vec<Diagnostic>) {
        log::warn!("{}", self);
        list.push(self);
    }
}

/// Failure reported by an external sink
#[derive(Error, Debug)]
pub enum SinkError {
    /// The sink is absent or gone for good; it gets disabled
    #[error("{0}")]
    Unavailable(String),

    /// Transient IO failure; only the current message is skipped
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Telemetry could not be encoded
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Outbound backlog is full; the message was dropped instead of waiting
    #[error("outbound backlog full, message dropped")]
    Backlogged,
}

impl SinkError {
    /// Whether this failure should disable the sink for the rest of the session
    pub fn is_fatal_for_sink(&self) -> bool {
        match self {
            SinkError::Unavailable(_) => true,
            SinkError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe | io::ErrorKind::NotConnected
            ),
            SinkError::Encode(_) | SinkError::Backlogged => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_display() {
        let d = Diagnostic::ScanOverrun { deferred: 1 };
        assert_eq!(d.to_string(), "scan overrun: 1 transition(s) deferred to the next tick");

        let d = Diagnostic::SinkUnavailable {
            sink: SinkKind::HostLink,
            reason: "not connected".to_string(),
        };
        assert_eq!(d.to_string(), "host link unavailable: not connected");
    }

    #[test]
    fn report_appends() {
        let mut list = Vec::new();
        Diagnostic::QueueOverflow { capacity: 64 }.report(&mut list);
        assert_eq!(list, vec![Diagnostic::QueueOverflow { capacity: 64 }]);
    }

    #[test]
    fn broken_pipe_disables_sink() {
        let err = SinkError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert!(err.is_fatal_for_sink());

        let err = SinkError::Io(io::Error::new(io::ErrorKind::WouldBlock, "busy"));
        assert!(!err.is_fatal_for_sink());

        assert!(SinkError::Unavailable("absent".into()).is_fatal_for_sink());
        assert!(!SinkError::Backlogged.is_fatal_for_sink());
    }
}
