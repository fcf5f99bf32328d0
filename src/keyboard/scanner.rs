//! Raw scan samples and the scan source seam

use serde::{Deserialize, Serialize};

/// Which way the matrix diodes point
///
/// With `COL2ROW` the rows are the strobed lines, so a snapshot is laid out
/// `[row][col]`; with `ROW2COL` the columns are strobed and it is `[col][row]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DiodeDirection {
    #[default]
    #[serde(rename = "COL2ROW")]
    Col2Row,
    #[serde(rename = "ROW2COL")]
    Row2Col,
}

/// Raw A/B levels of a quadrature encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuadraturePhase {
    pub a: bool,
    pub b: bool,
}

impl QuadraturePhase {
    pub const fn new(a: bool, b: bool) -> Self {
        Self { a, b }
    }

    /// Two-bit gray code value, `a` as the high bit
    pub fn bits(&self) -> u8 {
        ((self.a as u8) << 1) | self.b as u8
    }

    pub fn from_bits(bits: u8) -> Self {
        Self::new(bits & 0b10 != 0, bits & 0b01 != 0)
    }
}

/// One electrical sample of the whole board
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanSnapshot {
    /// Closed intersections, indexed `[strobe][sense]`
    pub lines: Vec<Vec<bool>>,
    /// Encoder pins, if the board has an encoder
    pub encoder: Option<QuadraturePhase>,
}

impl ScanSnapshot {
    /// All-open snapshot with `strobes x senses` intersections
    pub fn open(strobes: usize, senses: usize) -> Self {
        Self {
            lines: vec![vec![false; senses]; strobes],
            encoder: None,
        }
    }

    /// Snapshot laid out for `direction` with the given keys closed
    pub fn with_keys(
        rows: u8,
        cols: u8,
        direction: DiodeDirection,
        closed: &[(u8, u8)],
    ) -> Self {
        let mut snapshot = match direction {
            DiodeDirection::Col2Row => Self::open(rows as usize, cols as usize),
            DiodeDirection::Row2Col => Self::open(cols as usize, rows as usize),
        };
        for &(row, col) in closed {
            snapshot.set(direction, row, col, true);
        }
        snapshot
    }

    pub fn encoder(mut self, phase: QuadraturePhase) -> Self {
        self.encoder = Some(phase);
        self
    }

    /// Electrical state of a switch; intersections missing from the sample
    /// read as open
    pub fn is_closed(&self, direction: DiodeDirection, row: u8, col: u8) -> bool {
        let (strobe, sense) = Self::coords(direction, row, col);
        self.lines
            .get(strobe)
            .and_then(|line| line.get(sense))
            .copied()
            .unwrap_or(false)
    }

    pub fn set(&mut self, direction: DiodeDirection, row: u8, col: u8, closed: bool) {
        let (strobe, sense) = Self::coords(direction, row, col);
        if let Some(cell) = self.lines.get_mut(strobe).and_then(|line| line.get_mut(sense)) {
            *cell = closed;
        }
    }

    fn coords(direction: DiodeDirection, row: u8, col: u8) -> (usize, usize) {
        match direction {
            DiodeDirection::Col2Row => (row as usize, col as usize),
            DiodeDirection::Row2Col => (col as usize, row as usize),
        }
    }
}

/// Anything that can sample the board once per tick
pub trait ScanSource {
    /// Take one sample; must not block
    fn poll(&mut self) -> ScanSnapshot;
}
