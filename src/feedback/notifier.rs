//! Feedback notifier
//!
//! Owns the receiving end of the observer channel. Once per tick it drains
//! everything the layer state machine, the dispatcher and the host link
//! produced and turns it into display updates and telemetry lines. Both
//! sinks are optional and best-effort: a failure skips that one update, and
//! a sink that is gone for good gets disabled.

use super::display::DisplaySink;
use super::events::{FeedbackEvent, FeedbackSender};
use super::host::HostLink;
use super::telemetry::TelemetryMessage;
use crate::config::TelemetryConfig;
use crate::error::{Diagnostic, SinkError, SinkKind};
use crate::keyboard::Keymap;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::Instant;

/// Inbound host lines consumed per tick
pub const MAX_HOST_LINES_PER_TICK: usize = 8;

/// Run `call` against an optional sink, converting failure into a diagnostic
fn deliver<S: ?Sized>(
    slot: &mut Option<Box<S>>,
    kind: SinkKind,
    diagnostics: &mut Vec<Diagnostic>,
    call: impl FnOnce(&mut S) -> Result<(), SinkError>,
) -> bool {
    let Some(sink) = slot.as_deref_mut() else {
        return false;
    };
    match call(sink) {
        Ok(()) => true,
        Err(e) => {
            let fatal = e.is_fatal_for_sink();
            Diagnostic::SinkUnavailable {
                sink: kind,
                reason: e.to_string(),
            }
            .report(diagnostics);
            if fatal {
                log::warn!("disabling {} for the rest of the session", kind);
                *slot = None;
            }
            false
        }
    }
}

/// Translates feedback events into display and host updates
pub struct FeedbackNotifier {
    tx: FeedbackSender,
    rx: Receiver<FeedbackEvent>,
    display: Option<Box<dyn DisplaySink>>,
    host: Option<Box<dyn HostLink>>,
    keymap: Arc<Keymap>,
    telemetry: TelemetryConfig,
    /// Last context label pushed by the host
    context: Option<String>,
    started: Instant,
    display_updates: u64,
    telemetry_sent: u64,
    diagnostics: Vec<Diagnostic>,
}

impl FeedbackNotifier {
    pub fn new(
        keymap: Arc<Keymap>,
        telemetry: TelemetryConfig,
        display: Option<Box<dyn DisplaySink>>,
        host: Option<Box<dyn HostLink>>,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        if host.is_none() {
            log::info!("no host link connected, telemetry disabled");
        }
        Self {
            tx,
            rx,
            display,
            host,
            keymap,
            telemetry,
            context: None,
            started: Instant::now(),
            display_updates: 0,
            telemetry_sent: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Sender handed to producers at initialization
    pub fn sender(&self) -> FeedbackSender {
        self.tx.clone()
    }

    /// Pull pending host lines without waiting and queue them as context updates
    pub fn poll_host(&mut self) {
        for _ in 0..MAX_HOST_LINES_PER_TICK {
            let Some(host) = self.host.as_mut() else {
                return;
            };
            match host.poll_line() {
                Ok(Some(line)) => {
                    let text = line.trim();
                    if !text.is_empty() {
                        // Own receiver is alive as long as self is
                        let _ = self.tx.send(FeedbackEvent::ContextUpdated(text.to_string()));
                    }
                }
                Ok(None) => return,
                Err(e) => {
                    let fatal = e.is_fatal_for_sink();
                    Diagnostic::SinkUnavailable {
                        sink: SinkKind::HostLink,
                        reason: e.to_string(),
                    }
                    .report(&mut self.diagnostics);
                    if fatal {
                        self.host = None;
                    }
                    return;
                }
            }
        }
    }

    /// Handle every queued event in arrival order
    pub fn process_pending(&mut self) -> usize {
        let events: Vec<FeedbackEvent> = self.rx.try_iter().collect();
        let count = events.len();
        for event in events {
            self.handle(event);
        }
        count
    }

    /// Paint the given layer without sending telemetry, used at startup
    pub fn show_layer(&mut self, layer: usize) {
        self.render_layer(layer);
    }

    fn handle(&mut self, event: FeedbackEvent) {
        match event {
            FeedbackEvent::LayerChanged(change) => {
                self.render_layer(change.layer);
                if self.telemetry.enabled {
                    self.send_telemetry(TelemetryMessage::layer_change(
                        change.layer,
                        self.elapsed(),
                    ));
                }
            }
            FeedbackEvent::ActionDispatched(dispatched) => {
                if !dispatched.is_feedback_worthy() {
                    return;
                }
                let label = dispatched.label(self.keymap.cols());
                if deliver(&mut self.display, SinkKind::Display, &mut self.diagnostics, |d| {
                    d.show_action(&label)
                }) {
                    self.display_updates += 1;
                }
                if self.telemetry.enabled && self.telemetry.key_actions {
                    self.send_telemetry(TelemetryMessage::key_action(label, self.elapsed()));
                }
            }
            FeedbackEvent::ContextUpdated(text) => {
                log::info!("host context: {}", text);
                if deliver(&mut self.display, SinkKind::Display, &mut self.diagnostics, |d| {
                    d.show_context(&text)
                }) {
                    self.display_updates += 1;
                }
                self.context = Some(text);
            }
        }
    }

    fn render_layer(&mut self, index: usize) {
        let Some(layer) = self.keymap.layer(index) else {
            log::debug!("layer {} not in keymap, nothing to show", index);
            return;
        };
        let (name, color) = (layer.name.clone(), layer.color);
        if deliver(&mut self.display, SinkKind::Display, &mut self.diagnostics, |d| {
            d.show_layer(index, &name, color)
        }) {
            self.display_updates += 1;
        }
    }

    fn send_telemetry(&mut self, message: TelemetryMessage) {
        if self.host.is_none() {
            return;
        }
        let line = match message.to_line() {
            Ok(line) => line,
            Err(e) => {
                Diagnostic::SinkUnavailable {
                    sink: SinkKind::HostLink,
                    reason: SinkError::from(e).to_string(),
                }
                .report(&mut self.diagnostics);
                return;
            }
        };
        if deliver(&mut self.host, SinkKind::HostLink, &mut self.diagnostics, |h| {
            h.send_line(&line)
        }) {
            self.telemetry_sent += 1;
        }
    }

    fn elapsed(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Current host context label
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn has_display(&self) -> bool {
        self.display.is_some()
    }

    pub fn has_host(&self) -> bool {
        self.host.is_some()
    }

    pub fn display_updates(&self) -> u64 {
        self.display_updates
    }

    pub fn telemetry_sent(&self) -> u64 {
        self.telemetry_sent
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}
