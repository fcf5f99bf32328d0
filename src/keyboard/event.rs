//! Normalized input events

use std::fmt;

/// A switch position in the key matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhysicalKey {
    pub row: u8,
    pub col: u8,
}

impl PhysicalKey {
    pub const fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    /// Row-major index into a matrix with `cols` columns
    pub fn index(&self, cols: u8) -> usize {
        self.row as usize * cols as usize + self.col as usize
    }

    /// Inverse of [`PhysicalKey::index`]
    pub fn from_index(index: usize, cols: u8) -> Self {
        let cols = cols.max(1) as usize;
        Self::new((index / cols) as u8, (index % cols) as u8)
    }

    /// Silkscreen label, `SW1` being the top-left switch
    pub fn label(&self, cols: u8) -> String {
        format!("SW{}", self.index(cols) + 1)
    }
}

impl fmt::Display for PhysicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Direction of a key transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Key went down
    Press,
    /// Key came back up
    Release,
}

/// A debounced key transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// The switch that changed
    pub key: PhysicalKey,
    /// Press or release
    pub transition: Transition,
    /// Tick number the transition was committed on
    pub timestamp: u64,
}

impl KeyEvent {
    pub fn new(key: PhysicalKey, transition: Transition, timestamp: u64) -> Self {
        Self {
            key,
            transition,
            timestamp,
        }
    }

    pub fn is_press(&self) -> bool {
        self.transition == Transition::Press
    }
}

/// Rotation direction of one encoder detent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderDirection {
    Clockwise,
    CounterClockwise,
}

impl EncoderDirection {
    pub fn label(&self) -> &'static str {
        match self {
            EncoderDirection::Clockwise => "ENC_CW",
            EncoderDirection::CounterClockwise => "ENC_CCW",
        }
    }
}

/// One encoder pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderEvent {
    pub direction: EncoderDirection,
    pub timestamp: u64,
}

/// Anything the normalizer can queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Key(KeyEvent),
    Encoder(EncoderEvent),
}
