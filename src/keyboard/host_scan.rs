//! Scan source that emulates the pad with the host keyboard
//!
//! Digit keys `1`..`9` stand in for the switches, row-major from the top
//! left. Holding `Right` or `Left` turns the encoder one quarter step per
//! sample, clockwise or counter-clockwise.

use super::scanner::{DiodeDirection, QuadraturePhase, ScanSnapshot, ScanSource};
use crate::config::DeviceConfig;
use device_query::{DeviceQuery, DeviceState, Keycode};

/// Quadrature phases in clockwise order
const GRAY: [u8; 4] = [0b00, 0b01, 0b11, 0b10];

const DIGITS: [Keycode; 9] = [
    Keycode::Key1,
    Keycode::Key2,
    Keycode::Key3,
    Keycode::Key4,
    Keycode::Key5,
    Keycode::Key6,
    Keycode::Key7,
    Keycode::Key8,
    Keycode::Key9,
];

/// Turns a set of held host keys into matrix samples
#[derive(Debug, Clone)]
struct MatrixEmulator {
    rows: u8,
    cols: u8,
    direction: DiodeDirection,
    /// Position in [`GRAY`]
    phase: usize,
}

impl MatrixEmulator {
    fn new(device: &DeviceConfig) -> Self {
        Self {
            rows: device.rows,
            cols: device.cols,
            direction: device.diode_direction,
            phase: 0,
        }
    }

    fn sample(&mut self, held: &[Keycode]) -> ScanSnapshot {
        let key_count = self.rows as usize * self.cols as usize;
        let closed: Vec<(u8, u8)> = DIGITS
            .iter()
            .enumerate()
            .filter(|(index, code)| *index < key_count && held.contains(*code))
            .map(|(index, _)| (index / self.cols as usize, index % self.cols as usize))
            .map(|(row, col)| (row as u8, col as u8))
            .collect();

        let right = held.contains(&Keycode::Right);
        let left = held.contains(&Keycode::Left);
        if right && !left {
            self.phase = (self.phase + 1) % GRAY.len();
        } else if left && !right {
            self.phase = (self.phase + GRAY.len() - 1) % GRAY.len();
        }

        ScanSnapshot::with_keys(self.rows, self.cols, self.direction, &closed)
            .encoder(QuadraturePhase::from_bits(GRAY[self.phase]))
    }
}

/// Desktop stand-in for the switch matrix
pub struct HostKeyboardScanSource {
    device_state: DeviceState,
    emulator: MatrixEmulator,
}

impl HostKeyboardScanSource {
    pub fn new(device: &DeviceConfig) -> Self {
        Self {
            device_state: DeviceState::new(),
            emulator: MatrixEmulator::new(device),
        }
    }
}

impl ScanSource for HostKeyboardScanSource {
    fn poll(&mut self) -> ScanSnapshot {
        let held = self.device_state.get_keys();
        self.emulator.sample(&held)
    }
}
