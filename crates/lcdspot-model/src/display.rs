//! Character display abstraction.
//!
//! The loop only ever talks to a display through [`CharacterDisplay`], so the
//! HD44780 driver and the logging display are interchangeable.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Horizontal placement of text within a fixed-width line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("display bus error: {0}")]
    Bus(String),
    #[error("line {index} out of range for a {rows}-row display")]
    InvalidLine { index: usize, rows: usize },
    #[error("display not supported on this host: {0}")]
    Unsupported(String),
}

pub trait CharacterDisplay {
    fn width(&self) -> usize;

    fn rows(&self) -> usize;

    /// Writes one full line. `text` is fitted to the display width with
    /// `align` before it reaches the device.
    fn write_line(&mut self, index: usize, text: &str, align: Align) -> Result<(), DeviceError>;

    fn set_backlight(&mut self, on: bool) -> Result<(), DeviceError>;

    fn clear(&mut self) -> Result<(), DeviceError>;
}

impl<D: CharacterDisplay + ?Sized> CharacterDisplay for Box<D> {
    fn width(&self) -> usize {
        (**self).width()
    }

    fn rows(&self) -> usize {
        (**self).rows()
    }

    fn write_line(&mut self, index: usize, text: &str, align: Align) -> Result<(), DeviceError> {
        (**self).write_line(index, text, align)
    }

    fn set_backlight(&mut self, on: bool) -> Result<(), DeviceError> {
        (**self).set_backlight(on)
    }

    fn clear(&mut self) -> Result<(), DeviceError> {
        (**self).clear()
    }
}
