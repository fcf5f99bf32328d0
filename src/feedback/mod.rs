//! Visual feedback and host telemetry

pub mod display;
pub mod events;
pub mod host;
pub mod notifier;
pub mod telemetry;

pub use display::{DisplaySink, TerminalDisplay};
pub use events::{ActionDispatched, ActionSource, FeedbackEvent, FeedbackSender, LayerChanged};
pub use host::{HostLink, SerialHostLink};
pub use notifier::FeedbackNotifier;
pub use telemetry::TelemetryMessage;
