//! Notifications flowing from the layer state machine and dispatcher to the
//! feedback notifier
//!
//! Producers keep a [`Subscribers`] list of channel senders registered at
//! initialization. Sends never block; a subscriber whose receiver is gone is
//! dropped from the list.

use crate::keyboard::{EncoderDirection, LogicalAction, PhysicalKey, Transition};
use std::sync::mpsc;

/// Active layer changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerChanged {
    /// New top of the layer stack
    pub layer: usize,
}

/// What triggered a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionSource {
    Key {
        key: PhysicalKey,
        transition: Transition,
    },
    Encoder(EncoderDirection),
}

/// An action was executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDispatched {
    pub action: LogicalAction,
    pub source: ActionSource,
}

impl ActionDispatched {
    /// Presses and encoder pulses get visible feedback; releases do not
    pub fn is_feedback_worthy(&self) -> bool {
        match self.source {
            ActionSource::Key { transition, .. } => transition == Transition::Press,
            ActionSource::Encoder(_) => true,
        }
    }

    /// `SW<n>` for switches, `ENC_CW` / `ENC_CCW` for the encoder
    pub fn label(&self, cols: u8) -> String {
        match self.source {
            ActionSource::Key { key, .. } => key.label(cols),
            ActionSource::Encoder(direction) => direction.label().to_string(),
        }
    }
}

/// Everything the feedback notifier reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackEvent {
    LayerChanged(LayerChanged),
    ActionDispatched(ActionDispatched),
    /// Context label pushed by the host
    ContextUpdated(String),
}

pub type FeedbackSender = mpsc::Sender<FeedbackEvent>;

/// Registered observers of one producer
#[derive(Debug, Default)]
pub struct Subscribers {
    senders: Vec<FeedbackSender>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sender: FeedbackSender) {
        self.senders.push(sender);
    }

    /// Deliver to every live subscriber
    pub fn publish(&mut self, event: FeedbackEvent) {
        self.senders.retain(|tx| {
            let delivered = tx.send(event.clone()).is_ok();
            if !delivered {
                log::debug!("dropping disconnected feedback subscriber");
            }
            delivered
        });
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}
