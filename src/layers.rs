//! Layer state machine
//!
//! Holds the stack of active layers and resolves key events into actions
//! against the top of the stack. Layer 0 is the base and is never removed.
//!
//! The action a switch resolved to on press is remembered until its release,
//! so a release always undoes exactly what its press did even when the
//! active layer changed in between.

use crate::error::Diagnostic;
use crate::feedback::events::{FeedbackEvent, FeedbackSender, LayerChanged, Subscribers};
use crate::keyboard::{KeyEvent, Keymap, LogicalAction, PhysicalKey, Transition};
use std::collections::HashMap;
use std::sync::Arc;

/// Ordered stack of active layers, base layer 0 at the bottom
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerStack {
    layers: Vec<usize>,
    bound: usize,
}

impl LayerStack {
    /// Fresh `[0]` stack that may grow to `bound` entries
    pub fn new(bound: usize) -> Self {
        Self {
            layers: vec![0],
            bound: bound.max(1),
        }
    }

    pub fn top(&self) -> usize {
        self.layers.last().copied().unwrap_or(0)
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.layers
    }

    /// Push a momentary layer; `false` if the stack is at its bound
    fn push(&mut self, layer: usize) -> bool {
        if self.layers.len() >= self.bound {
            return false;
        }
        self.layers.push(layer);
        true
    }

    /// Pop `expected` off the top; the base layer never pops
    fn pop(&mut self, expected: usize) -> Result<(), usize> {
        let top = self.top();
        if self.layers.len() <= 1 || top != expected {
            return Err(top);
        }
        self.layers.pop();
        Ok(())
    }

    /// Drop everything above the base and make `layer` the top
    fn replace(&mut self, layer: usize) {
        self.layers.truncate(1);
        if layer != 0 {
            self.layers.push(layer);
        }
    }
}

/// Press-time resolution of a held switch
#[derive(Debug, Clone)]
struct Held {
    action: LogicalAction,
    /// Whether a momentary press actually pushed its layer
    pushed: bool,
}

/// A key event paired with the action it resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub key: PhysicalKey,
    pub transition: Transition,
    pub action: LogicalAction,
}

/// Owns the layer stack and resolves key events
pub struct LayerStateMachine {
    keymap: Arc<Keymap>,
    stack: LayerStack,
    held: HashMap<PhysicalKey, Held>,
    subscribers: Subscribers,
    diagnostics: Vec<Diagnostic>,
}

impl LayerStateMachine {
    pub fn new(keymap: Arc<Keymap>, num_layers: usize) -> Self {
        Self {
            keymap,
            stack: LayerStack::new(num_layers),
            held: HashMap::new(),
            subscribers: Subscribers::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Register an observer for [`LayerChanged`] notifications
    pub fn subscribe(&mut self, sender: FeedbackSender) {
        self.subscribers.add(sender);
    }

    pub fn active_layer(&self) -> usize {
        self.stack.top()
    }

    pub fn stack(&self) -> &LayerStack {
        &self.stack
    }

    /// Apply a key event; `None` means the event was a no-op
    pub fn handle_key(&mut self, event: &KeyEvent) -> Option<Resolved> {
        let action = match event.transition {
            Transition::Press => self.press(event.key)?,
            Transition::Release => self.release(event.key)?,
        };
        Some(Resolved {
            key: event.key,
            transition: event.transition,
            action,
        })
    }

    /// Encoder behaviour of the active layer
    pub fn resolve_encoder(&self) -> Option<LogicalAction> {
        self.keymap.encoder_action(self.stack.top())
    }

    fn press(&mut self, key: PhysicalKey) -> Option<LogicalAction> {
        let top = self.stack.top();
        let Some(action) = self.keymap.resolve(top, key).cloned() else {
            log::debug!("no action for {} on layer {}", key, top);
            return None;
        };

        let mut pushed = false;
        match action {
            LogicalAction::MomentaryLayer(layer) => {
                if self.stack.push(layer) {
                    pushed = true;
                    self.layer_changed();
                } else {
                    Diagnostic::LayerStackFull {
                        layer,
                        depth: self.stack.depth(),
                    }
                    .report(&mut self.diagnostics);
                }
            }
            LogicalAction::ActivateLayer(layer) | LogicalAction::ReturnToLayer(layer) => {
                self.stack.replace(layer);
                self.layer_changed();
            }
            LogicalAction::EmitCombo(_) | LogicalAction::EncoderAction(_) => {}
        }

        self.held.insert(
            key,
            Held {
                action: action.clone(),
                pushed,
            },
        );
        Some(action)
    }

    fn release(&mut self, key: PhysicalKey) -> Option<LogicalAction> {
        let Some(held) = self.held.remove(&key) else {
            log::debug!("release of {} without a resolved press", key);
            return None;
        };

        if let (LogicalAction::MomentaryLayer(layer), true) = (&held.action, held.pushed) {
            match self.stack.pop(*layer) {
                Ok(()) => self.layer_changed(),
                Err(top) => Diagnostic::LayerStackMismatch {
                    expected: *layer,
                    top,
                }
                .report(&mut self.diagnostics),
            }
        }
        Some(held.action)
    }

    fn layer_changed(&mut self) {
        let layer = self.stack.top();
        log::info!("layer {} active (stack {:?})", layer, self.stack.as_slice());
        self.subscribers
            .publish(FeedbackEvent::LayerChanged(LayerChanged { layer }));
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}
