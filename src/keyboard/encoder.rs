//! Quadrature decoding for the rotary encoder

use super::event::EncoderDirection;
use super::scanner::QuadraturePhase;

/// Step contribution indexed by `previous << 2 | current`.
///
/// Clockwise is the gray sequence 00 -> 01 -> 11 -> 10. Double steps are
/// ambiguous and count as zero.
const STEP: [i8; 16] = [0, 1, -1, 0, -1, 0, 0, 1, 1, 0, 0, -1, 0, -1, 1, 0];

/// Turns successive phase samples into whole detent pulses
#[derive(Debug, Clone)]
pub struct QuadratureDecoder {
    /// Last phase seen, `None` until the first sample
    last: Option<QuadraturePhase>,
    /// Quarter steps accumulated towards the next pulse
    position: i8,
    /// Quarter steps per pulse
    divisor: i8,
}

impl QuadratureDecoder {
    pub fn new(divisor: u8) -> Self {
        Self {
            last: None,
            position: 0,
            divisor: divisor.clamp(1, i8::MAX as u8) as i8,
        }
    }

    /// Feed one sample, returning a pulse when a full detent completes
    pub fn update(&mut self, phase: QuadraturePhase) -> Option<EncoderDirection> {
        let Some(last) = self.last.replace(phase) else {
            return None;
        };

        let step = STEP[((last.bits() << 2) | phase.bits()) as usize];
        self.position += step;

        if self.position >= self.divisor {
            self.position = 0;
            Some(EncoderDirection::Clockwise)
        } else if self.position <= -self.divisor {
            self.position = 0;
            Some(EncoderDirection::CounterClockwise)
        } else {
            None
        }
    }

    pub fn last_phase(&self) -> Option<QuadraturePhase> {
        self.last
    }
}

impl Default for QuadratureDecoder {
    fn default() -> Self {
        Self::new(4)
    }
}
