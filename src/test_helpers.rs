//! Shared test utilities
//!
//! Event builders, a scripted scan source and recording doubles for the
//! display, host link and HID sinks. The doubles share their logs through
//! `Rc<RefCell<..>>`, so a test keeps a clone and inspects it after handing
//! the other clone to the pipeline.

use crate::dispatch::{HidOutput, HidSink};
use crate::error::SinkError;
use crate::feedback::{DisplaySink, HostLink};
use crate::keyboard::{
    DiodeDirection, EncoderDirection, KeyEvent, PhysicalKey, QuadraturePhase, Rgb, ScanSnapshot,
    ScanSource, Transition,
};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

/// Clockwise gray sequence starting from phase `00`
const CW_STEPS: [u8; 4] = [0b01, 0b11, 0b10, 0b00];
/// Counter-clockwise gray sequence starting from phase `00`
const CCW_STEPS: [u8; 4] = [0b10, 0b11, 0b01, 0b00];

/// Creates a key press event at tick 0.
pub fn press(key: PhysicalKey) -> KeyEvent {
    KeyEvent::new(key, Transition::Press, 0)
}

/// Creates a key release event at tick 0.
pub fn release(key: PhysicalKey) -> KeyEvent {
    KeyEvent::new(key, Transition::Release, 0)
}

// ---------------------------------------------------------------------------
// Scan source
// ---------------------------------------------------------------------------

struct Script {
    rows: u8,
    cols: u8,
    direction: DiodeDirection,
    held: Vec<(u8, u8)>,
    phase: u8,
    pending: VecDeque<ScanSnapshot>,
    last: ScanSnapshot,
}

impl Script {
    fn snapshot(&self) -> ScanSnapshot {
        ScanSnapshot::with_keys(self.rows, self.cols, self.direction, &self.held)
            .encoder(QuadraturePhase::from_bits(self.phase))
    }
}

/// Scan source replaying queued snapshots, then repeating the last one
#[derive(Clone)]
pub struct ScriptedScanSource {
    script: Rc<RefCell<Script>>,
}

impl ScriptedScanSource {
    pub fn new(rows: u8, cols: u8, direction: DiodeDirection) -> Self {
        let mut script = Script {
            rows,
            cols,
            direction,
            held: Vec::new(),
            phase: 0,
            pending: VecDeque::new(),
            last: ScanSnapshot::default(),
        };
        script.last = script.snapshot();
        Self {
            script: Rc::new(RefCell::new(script)),
        }
    }

    /// Hold exactly `keys` closed for `ticks` samples
    pub fn hold(&self, keys: &[(u8, u8)], ticks: usize) {
        let mut script = self.script.borrow_mut();
        script.held = keys.to_vec();
        for _ in 0..ticks {
            let snapshot = script.snapshot();
            script.pending.push_back(snapshot);
        }
    }

    /// Nothing closed for `ticks` samples
    pub fn idle(&self, ticks: usize) {
        self.hold(&[], ticks);
    }

    /// Turn the encoder by whole detents, one quarter step per sample
    pub fn turn(&self, direction: EncoderDirection, detents: usize) {
        let steps = match direction {
            EncoderDirection::Clockwise => CW_STEPS,
            EncoderDirection::CounterClockwise => CCW_STEPS,
        };
        let mut script = self.script.borrow_mut();
        for _ in 0..detents {
            for bits in steps {
                script.phase = bits;
                let snapshot = script.snapshot();
                script.pending.push_back(snapshot);
            }
        }
    }

    /// Queue an arbitrary snapshot
    pub fn push(&self, snapshot: ScanSnapshot) {
        self.script.borrow_mut().pending.push_back(snapshot);
    }

    /// Samples not yet polled
    pub fn remaining(&self) -> usize {
        self.script.borrow().pending.len()
    }
}

impl ScanSource for ScriptedScanSource {
    fn poll(&mut self) -> ScanSnapshot {
        let mut script = self.script.borrow_mut();
        if let Some(next) = script.pending.pop_front() {
            script.last = next;
        }
        script.last.clone()
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

/// One recorded display request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayCall {
    Layer(usize, String, Rgb),
    Action(String),
    Context(String),
}

/// Display sink that records every request
#[derive(Clone, Default)]
pub struct RecordingDisplay {
    calls: Rc<RefCell<Vec<DisplayCall>>>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<DisplayCall> {
        self.calls.borrow().clone()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}

impl DisplaySink for RecordingDisplay {
    fn show_layer(&mut self, index: usize, name: &str, color: Rgb) -> Result<(), SinkError> {
        self.calls
            .borrow_mut()
            .push(DisplayCall::Layer(index, name.to_string(), color));
        Ok(())
    }

    fn show_action(&mut self, label: &str) -> Result<(), SinkError> {
        self.calls
            .borrow_mut()
            .push(DisplayCall::Action(label.to_string()));
        Ok(())
    }

    fn show_context(&mut self, text: &str) -> Result<(), SinkError> {
        self.calls
            .borrow_mut()
            .push(DisplayCall::Context(text.to_string()));
        Ok(())
    }
}

/// Display sink whose hardware is missing
pub struct FailingDisplay;

impl DisplaySink for FailingDisplay {
    fn show_layer(&mut self, _: usize, _: &str, _: Rgb) -> Result<(), SinkError> {
        Err(SinkError::Unavailable("panel not detected".into()))
    }

    fn show_action(&mut self, _: &str) -> Result<(), SinkError> {
        Err(SinkError::Unavailable("panel not detected".into()))
    }

    fn show_context(&mut self, _: &str) -> Result<(), SinkError> {
        Err(SinkError::Unavailable("panel not detected".into()))
    }
}

// ---------------------------------------------------------------------------
// Host link
// ---------------------------------------------------------------------------

/// Host link recording outbound lines and serving scripted inbound lines
#[derive(Clone, Default)]
pub struct RecordingHostLink {
    sent: Rc<RefCell<Vec<String>>>,
    inbound: Rc<RefCell<VecDeque<String>>>,
    fail_next: Rc<Cell<bool>>,
}

impl RecordingHostLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines sent so far
    pub fn sent(&self) -> Vec<String> {
        self.sent.borrow().clone()
    }

    /// Make a line available to the next poll
    pub fn push_inbound(&self, line: &str) {
        self.inbound.borrow_mut().push_back(line.to_string());
    }

    /// The next send fails with a transient IO error
    pub fn fail_next_send(&self) {
        self.fail_next.set(true);
    }
}

impl HostLink for RecordingHostLink {
    fn send_line(&mut self, line: &str) -> Result<(), SinkError> {
        if self.fail_next.replace(false) {
            return Err(io::Error::new(io::ErrorKind::WouldBlock, "host busy").into());
        }
        self.sent.borrow_mut().push(line.to_string());
        Ok(())
    }

    fn poll_line(&mut self) -> Result<Option<String>, SinkError> {
        Ok(self.inbound.borrow_mut().pop_front())
    }
}

// ---------------------------------------------------------------------------
// HID
// ---------------------------------------------------------------------------

/// HID sink recording every output
#[derive(Clone, Default)]
pub struct RecordingHid {
    outputs: Rc<RefCell<Vec<HidOutput>>>,
    unavailable: Rc<Cell<bool>>,
}

impl RecordingHid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outputs(&self) -> Vec<HidOutput> {
        self.outputs.borrow().clone()
    }

    pub fn clear(&self) {
        self.outputs.borrow_mut().clear();
    }

    /// Every send fails as if the USB host went away
    pub fn fail_with_unavailable(&self) {
        self.unavailable.set(true);
    }
}

impl HidSink for RecordingHid {
    fn send(&mut self, output: HidOutput) -> Result<(), SinkError> {
        if self.unavailable.get() {
            return Err(SinkError::Unavailable("USB host not enumerated".into()));
        }
        self.outputs.borrow_mut().push(output);
        Ok(())
    }
}
