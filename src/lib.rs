//! CTRL Macro Pad - input-to-feedback event pipeline
//!
//! Turns raw switch matrix and rotary encoder samples into debounced key
//! events, resolves them through a layered keymap, dispatches the resulting
//! actions and reports feedback to a display and a host link.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod feedback;
pub mod keyboard;
pub mod layers;
pub mod pipeline;
pub mod stats;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use config::Config;
pub use pipeline::Keypad;
