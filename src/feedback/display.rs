//! Display sink seam and a terminal rendition of the panel

use crate::error::SinkError;
use crate::keyboard::Rgb;
use crossterm::{
    queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
};
use std::io::Write;

/// Colour of the transient key label
pub const ACTION_COLOR: Rgb = Rgb::from_u32(0xFFFF00);
/// Colour of the host context panel
pub const CONTEXT_COLOR: Rgb = Rgb::from_u32(0xFF8800);

/// Render requests understood by the feedback panel
///
/// Each call replaces the previous content of its panel and must return
/// quickly; slow or broken sinks report an error instead of waiting.
pub trait DisplaySink {
    fn show_layer(&mut self, index: usize, name: &str, color: Rgb) -> Result<(), SinkError>;
    fn show_action(&mut self, label: &str) -> Result<(), SinkError>;
    fn show_context(&mut self, text: &str) -> Result<(), SinkError>;
}

fn term_color(color: Rgb) -> Color {
    Color::Rgb {
        r: color.r,
        g: color.g,
        b: color.b,
    }
}

/// One coloured line per update on any writer, usually stderr
pub struct TerminalDisplay<W: Write> {
    out: W,
}

impl<W: Write> TerminalDisplay<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn line(&mut self, tag: &str, text: &str, color: Rgb) -> Result<(), SinkError> {
        queue!(
            self.out,
            SetAttribute(Attribute::Bold),
            Print(format!("[{:<7}] ", tag)),
            SetAttribute(Attribute::Reset),
            SetForegroundColor(term_color(color)),
            Print(text),
            ResetColor,
            Print("\r\n")
        )?;
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> DisplaySink for TerminalDisplay<W> {
    fn show_layer(&mut self, index: usize, name: &str, color: Rgb) -> Result<(), SinkError> {
        self.line("layer", &format!("{} {} {}", index, name, color), color)
    }

    fn show_action(&mut self, label: &str) -> Result<(), SinkError> {
        self.line("action", label, ACTION_COLOR)
    }

    fn show_context(&mut self, text: &str) -> Result<(), SinkError> {
        self.line("context", text, CONTEXT_COLOR)
    }
}
