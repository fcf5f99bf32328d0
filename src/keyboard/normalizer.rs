//! Debounce and event normalization
//!
//! Turns raw [`ScanSnapshot`]s into clean [`InputEvent`]s. A key transition
//! is committed only once the two most recent samples agree and differ from
//! the debounced state, so a glitch lasting one scan interval never produces
//! an event. Committed events wait in a bounded queue until the pipeline
//! drains them.

use super::encoder::QuadratureDecoder;
use super::event::{EncoderEvent, InputEvent, KeyEvent, PhysicalKey, Transition};
use super::queue::{EventQueue, PushOutcome};
use super::scanner::{DiodeDirection, ScanSnapshot};
use crate::config::DeviceConfig;
use crate::error::Diagnostic;

/// Consecutive agreeing samples needed to commit a transition
const STABLE_SAMPLES: u8 = 2;

/// Debounce state of one switch
#[derive(Debug, Clone, Copy, Default)]
struct SwitchState {
    /// Last raw level sampled
    raw: bool,
    /// How many consecutive samples have read `raw`
    stable: u8,
    /// Level last reported downstream
    debounced: bool,
}

impl SwitchState {
    fn sample(&mut self, closed: bool) {
        if closed == self.raw {
            self.stable = self.stable.saturating_add(1);
        } else {
            self.raw = closed;
            self.stable = 1;
        }
    }

    fn pending(&self) -> Option<Transition> {
        if self.stable >= STABLE_SAMPLES && self.raw != self.debounced {
            Some(if self.raw {
                Transition::Press
            } else {
                Transition::Release
            })
        } else {
            None
        }
    }
}

/// Debouncer, encoder decoder and event queue for one board
pub struct Normalizer {
    rows: u8,
    cols: u8,
    direction: DiodeDirection,
    /// Row-major switch states
    switches: Vec<SwitchState>,
    encoder: QuadratureDecoder,
    queue: EventQueue<InputEvent>,
    diagnostics: Vec<Diagnostic>,
}

impl Normalizer {
    pub fn new(device: &DeviceConfig) -> Self {
        Self {
            rows: device.rows,
            cols: device.cols,
            direction: device.diode_direction,
            switches: vec![SwitchState::default(); device.key_count()],
            encoder: QuadratureDecoder::new(device.encoder_divisor),
            queue: EventQueue::new(device.max_events),
            diagnostics: Vec::new(),
        }
    }

    /// Process one scan sample taken on tick `timestamp`
    ///
    /// Key transitions beyond the queue's free space are not committed; they
    /// stay pending and are picked up again by the next sample. An encoder
    /// pulse from the same sample claims its slot first.
    pub fn ingest(&mut self, timestamp: u64, snapshot: &ScanSnapshot) {
        let mut pending = Vec::new();
        for row in 0..self.rows {
            for col in 0..self.cols {
                let key = PhysicalKey::new(row, col);
                let switch = &mut self.switches[key.index(self.cols)];
                switch.sample(snapshot.is_closed(self.direction, row, col));
                if let Some(transition) = switch.pending() {
                    pending.push(KeyEvent::new(key, transition, timestamp));
                }
            }
        }

        // Decode first so a pulse never evicts a key transition committed below
        let pulse = snapshot
            .encoder
            .and_then(|phase| self.encoder.update(phase))
            .map(|direction| EncoderEvent {
                direction,
                timestamp,
            });

        let room = self
            .queue
            .remaining()
            .saturating_sub(usize::from(pulse.is_some()));
        if pending.len() > room {
            Diagnostic::ScanOverrun {
                deferred: pending.len() - room,
            }
            .report(&mut self.diagnostics);
        }

        for event in pending.into_iter().take(room) {
            let switch = &mut self.switches[event.key.index(self.cols)];
            switch.debounced = event.is_press();
            self.enqueue(InputEvent::Key(event));
        }

        if let Some(pulse) = pulse {
            self.enqueue(InputEvent::Encoder(pulse));
        }
    }

    fn enqueue(&mut self, event: InputEvent) {
        if let PushOutcome::EvictedOldest { episode_start: true } = self.queue.push(event) {
            Diagnostic::QueueOverflow {
                capacity: self.queue.capacity(),
            }
            .report(&mut self.diagnostics);
        }
    }

    /// Next queued event, oldest first
    pub fn next_event(&mut self) -> Option<InputEvent> {
        self.queue.pop()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Debounced state of a switch
    pub fn is_pressed(&self, key: PhysicalKey) -> bool {
        if key.row >= self.rows || key.col >= self.cols {
            return false;
        }
        self.switches[key.index(self.cols)].debounced
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}
