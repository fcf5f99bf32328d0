//! Matrix scanning, debouncing and the keymap

mod encoder;
mod event;
pub mod host_scan;
pub mod keycode;
pub mod keymap;
mod normalizer;
mod queue;
pub mod scanner;

pub use encoder::QuadratureDecoder;
pub use event::{
    EncoderDirection, EncoderEvent, InputEvent, KeyEvent, PhysicalKey, Transition,
};
pub use host_scan::HostKeyboardScanSource;
pub use keycode::{get_key_info, KeyCode, KeyCombo, KeyInfo, KEYCODES};
pub use keymap::{EncoderBinding, Keymap, Layer, LogicalAction, Rgb, RgbParseError};
pub use normalizer::Normalizer;
pub use queue::{EventQueue, PushOutcome};
pub use scanner::{DiodeDirection, QuadraturePhase, ScanSnapshot, ScanSource};
