//! Action dispatcher
//!
//! Executes resolved actions against the logical HID sink and tells the
//! feedback notifier about every dispatch, in arrival order.

use crate::error::{Diagnostic, SinkError, SinkKind};
use crate::feedback::events::{
    ActionDispatched, ActionSource, FeedbackEvent, FeedbackSender, Subscribers,
};
use crate::keyboard::{EncoderDirection, KeyCode, KeyCombo, LogicalAction, Transition};
use crate::layers::Resolved;

/// One report sent to the host as a keyboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HidOutput {
    Press(KeyCode),
    Release(KeyCode),
    /// Discrete tap of a whole combo, used for encoder detents
    Pulse(KeyCombo),
}

/// Logical HID output; framing is the sink's business
pub trait HidSink {
    fn send(&mut self, output: HidOutput) -> Result<(), SinkError>;
}

/// HID sink that only logs what would be sent
#[derive(Debug, Default)]
pub struct LoggingHidSink;

impl HidSink for LoggingHidSink {
    fn send(&mut self, output: HidOutput) -> Result<(), SinkError> {
        match output {
            HidOutput::Press(code) => log::trace!("hid press {}", code.label()),
            HidOutput::Release(code) => log::trace!("hid release {}", code.label()),
            HidOutput::Pulse(combo) => log::trace!("hid pulse {}", combo.label()),
        }
        Ok(())
    }
}

/// Turns resolved actions into HID output and notifications
pub struct Dispatcher {
    hid: Option<Box<dyn HidSink>>,
    subscribers: Subscribers,
    diagnostics: Vec<Diagnostic>,
}

impl Dispatcher {
    pub fn new(hid: Option<Box<dyn HidSink>>) -> Self {
        if hid.is_none() {
            log::info!("no HID sink attached, actions will only be reported");
        }
        Self {
            hid,
            subscribers: Subscribers::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Register an observer for [`ActionDispatched`] notifications
    pub fn subscribe(&mut self, sender: FeedbackSender) {
        self.subscribers.add(sender);
    }

    /// Dispatch a key press or release
    ///
    /// Combos press modifiers in declared order then the base key, and
    /// release in exactly the reverse order. Layer actions produce no HID
    /// output; the layer state machine has already applied them.
    pub fn dispatch_key(&mut self, resolved: &Resolved) {
        if let LogicalAction::EmitCombo(combo) = &resolved.action {
            let outputs: Vec<HidOutput> = match resolved.transition {
                Transition::Press => combo.press_order().map(HidOutput::Press).collect(),
                Transition::Release => combo.release_order().map(HidOutput::Release).collect(),
            };
            self.send_all(outputs);
        }

        log::debug!(
            "dispatched {} ({:?} {})",
            resolved.action,
            resolved.transition,
            resolved.key
        );
        self.publish(
            resolved.action.clone(),
            ActionSource::Key {
                key: resolved.key,
                transition: resolved.transition,
            },
        );
    }

    /// Dispatch one encoder detent
    ///
    /// Anything other than an [`LogicalAction::EncoderAction`] is ignored.
    pub fn dispatch_encoder(&mut self, action: &LogicalAction, direction: EncoderDirection) {
        let LogicalAction::EncoderAction(binding) = action else {
            log::debug!("encoder {} has no binding", direction.label());
            return;
        };

        self.send_all(vec![HidOutput::Pulse(binding.combo(direction).clone())]);
        log::debug!("dispatched {} {}", direction.label(), binding.combo(direction));
        self.publish(action.clone(), ActionSource::Encoder(direction));
    }

    fn send_all(&mut self, outputs: Vec<HidOutput>) {
        for output in outputs {
            let Some(hid) = self.hid.as_mut() else {
                return;
            };
            if let Err(e) = hid.send(output) {
                let fatal = e.is_fatal_for_sink();
                Diagnostic::SinkUnavailable {
                    sink: SinkKind::Hid,
                    reason: e.to_string(),
                }
                .report(&mut self.diagnostics);
                if fatal {
                    log::warn!("disabling HID sink for the rest of the session");
                    self.hid = None;
                }
            }
        }
    }

    fn publish(&mut self, action: LogicalAction, source: ActionSource) {
        self.subscribers
            .publish(FeedbackEvent::ActionDispatched(ActionDispatched { action, source }));
    }

    pub fn has_hid(&self) -> bool {
        self.hid.is_some()
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}
