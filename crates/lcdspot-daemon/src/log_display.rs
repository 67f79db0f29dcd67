use lcdspot_model::display::{Align, CharacterDisplay, DeviceError};
use lcdspot_model::frame::{fit_line, HEART};
use tracing::info;

/// Display stand-in that logs what an LCD would show. Used with
/// `display.driver = "log"` on machines without an I2C bus.
pub struct LogDisplay {
    width: usize,
    lines: Vec<String>,
    backlight: bool,
}

impl LogDisplay {
    pub fn new(width: usize, rows: usize) -> Self {
        Self {
            width,
            lines: vec![" ".repeat(width); rows],
            backlight: false,
        }
    }
}

impl CharacterDisplay for LogDisplay {
    fn width(&self) -> usize {
        self.width
    }

    fn rows(&self) -> usize {
        self.lines.len()
    }

    fn write_line(&mut self, index: usize, text: &str, align: Align) -> Result<(), DeviceError> {
        let rows = self.lines.len();
        let line = self
            .lines
            .get_mut(index)
            .ok_or(DeviceError::InvalidLine { index, rows })?;
        *line = fit_line(text, self.width, align).replace(HEART, "♥");
        info!(target: "lcd", "[{}] |{}|", index, line);
        Ok(())
    }

    fn set_backlight(&mut self, on: bool) -> Result<(), DeviceError> {
        if self.backlight != on {
            info!(target: "lcd", "backlight {}", if on { "on" } else { "off" });
        }
        self.backlight = on;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), DeviceError> {
        for line in &mut self.lines {
            *line = " ".repeat(self.width);
        }
        Ok(())
    }
}
