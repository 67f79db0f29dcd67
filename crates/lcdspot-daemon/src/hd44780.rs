//! HD44780 character LCD behind a PCF8574 I2C backpack, driven in 4-bit mode.
//!
//! Expander pin mapping (the common "LCM1602 IIC" board):
//!
//! ```text
//!   P7 P6 P5 P4 | P3        | P2 | P1 | P0
//!   D7 D6 D5 D4 | backlight | EN | RW | RS
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, I2c};
use lcdspot_model::config::{DisplayConfig, MAX_ROWS, MAX_WIDTH};
use lcdspot_model::display::{Align, CharacterDisplay, DeviceError};
use lcdspot_model::frame::fit_line;
use tracing::debug;

const RS: u8 = 0b0000_0001;
const ENABLE: u8 = 0b0000_0100;
const BACKLIGHT: u8 = 0b0000_1000;

const CMD_CLEAR: u8 = 0x01;
const CMD_ENTRY_MODE: u8 = 0x06;
const CMD_DISPLAY_ON: u8 = 0x0C;
const CMD_FUNCTION_SET: u8 = 0x28;
const CMD_SET_CGRAM: u8 = 0x40;

const CMD_SET_DDRAM: u8 = 0x80;
/// DDRAM offset of the second row. Rows three and four continue rows one
/// and two, `width` characters further on.
const SECOND_ROW: u8 = 0x40;

/// CGRAM slot 0.
pub const HEART_GLYPH: [u8; 8] = [
    0b00000, 0b01010, 0b11111, 0b11111, 0b01110, 0b00100, 0b00000, 0b00000,
];

pub struct Hd44780<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    width: usize,
    rows: usize,
    backlight: bool,
}

impl<I2C: I2c, D: DelayNs> Hd44780<I2C, D> {
    /// Initializes the controller, clears it and loads the custom glyphs.
    pub fn new(
        i2c: I2C,
        delay: D,
        address: u8,
        width: usize,
        rows: usize,
    ) -> Result<Self, DeviceError> {
        if rows == 0 || rows > MAX_ROWS {
            return Err(DeviceError::Unsupported(format!(
                "{} rows (HD44780 addresses 1 to {})",
                rows, MAX_ROWS
            )));
        }
        if width == 0 || width > MAX_WIDTH {
            return Err(DeviceError::Unsupported(format!(
                "{} columns (HD44780 addresses 1 to {})",
                width, MAX_WIDTH
            )));
        }

        let mut lcd = Self {
            i2c,
            delay,
            address,
            width,
            rows,
            backlight: false,
        };
        lcd.init()?;
        lcd.load_glyph(0, &HEART_GLYPH)?;
        debug!("HD44780 {}x{} ready at {:#04x}", width, rows, address);
        Ok(lcd)
    }

    fn init(&mut self) -> Result<(), DeviceError> {
        self.delay.delay_ms(50);
        // 0x33, 0x32 walks the controller from 8-bit into 4-bit mode.
        for command in [0x33, 0x32, CMD_FUNCTION_SET, CMD_DISPLAY_ON, CMD_ENTRY_MODE] {
            self.command(command)?;
        }
        self.clear()
    }

    /// Stores a 5x8 glyph in CGRAM; slot `n` is then printed as char code `n`.
    pub fn load_glyph(&mut self, slot: u8, pattern: &[u8; 8]) -> Result<(), DeviceError> {
        if slot > 7 {
            return Err(DeviceError::Bus(format!("CGRAM slot {} out of range", slot)));
        }
        self.command(CMD_SET_CGRAM | (slot << 3))?;
        for row in pattern {
            self.data(*row)?;
        }
        // Back to DDRAM so following data lands on screen.
        self.command(CMD_SET_DDRAM)
    }

    /// Set-DDRAM command for the first column of `row`.
    fn row_address(&self, row: usize) -> u8 {
        let base = if row % 2 == 0 { 0 } else { SECOND_ROW };
        let offset = if row >= 2 { self.width as u8 } else { 0 };
        CMD_SET_DDRAM | (base + offset)
    }

    fn expander(&mut self, bits: u8) -> Result<(), DeviceError> {
        let bits = if self.backlight { bits | BACKLIGHT } else { bits };
        self.i2c
            .write(self.address, &[bits])
            .map_err(|e| DeviceError::Bus(format!("{:?}", e.kind())))
    }

    fn pulse(&mut self, bits: u8) -> Result<(), DeviceError> {
        self.expander(bits | ENABLE)?;
        self.delay.delay_us(1);
        self.expander(bits & !ENABLE)?;
        self.delay.delay_us(50);
        Ok(())
    }

    fn send(&mut self, value: u8, mode: u8) -> Result<(), DeviceError> {
        self.pulse((value & 0xF0) | mode)?;
        self.pulse(((value << 4) & 0xF0) | mode)
    }

    fn command(&mut self, value: u8) -> Result<(), DeviceError> {
        self.send(value, 0)
    }

    fn data(&mut self, value: u8) -> Result<(), DeviceError> {
        self.send(value, RS)
    }
}

impl<I2C: I2c, D: DelayNs> CharacterDisplay for Hd44780<I2C, D> {
    fn width(&self) -> usize {
        self.width
    }

    fn rows(&self) -> usize {
        self.rows
    }

    fn write_line(&mut self, index: usize, text: &str, align: Align) -> Result<(), DeviceError> {
        if index >= self.rows {
            return Err(DeviceError::InvalidLine { index, rows: self.rows });
        }
        self.command(self.row_address(index))?;
        for c in fit_line(text, self.width, align).chars() {
            self.data(rom_code(c))?;
        }
        Ok(())
    }

    fn set_backlight(&mut self, on: bool) -> Result<(), DeviceError> {
        self.backlight = on;
        self.expander(0)
    }

    fn clear(&mut self) -> Result<(), DeviceError> {
        self.command(CMD_CLEAR)?;
        self.delay.delay_ms(2);
        Ok(())
    }
}

/// Maps a char to the A00 character ROM. CGRAM codes and printable ASCII
/// pass through, the few Latin-1 letters the ROM carries are mapped, other
/// accented letters lose their accent, and everything else becomes `?`.
pub fn rom_code(c: char) -> u8 {
    match c {
        '\u{0}'..='\u{7}' => c as u8,
        // 0x5C is a yen sign and 0x7E an arrow in the A00 ROM.
        '\\' => b'/',
        '~' => b'-',
        ' '..='}' => c as u8,
        '¥' => 0x5C,
        '°' => 0xDF,
        'ä' => 0xE1,
        'ß' => 0xE2,
        'µ' => 0xE4,
        'ñ' => 0xEE,
        'ö' => 0xEF,
        'ü' => 0xF5,
        '’' | '‘' | '´' | '`' => b'\'',
        '“' | '”' | '„' => b'"',
        '–' | '—' => b'-',
        '…' => b'.',
        _ => fold_latin(c).unwrap_or(b'?'),
    }
}

fn fold_latin(c: char) -> Option<u8> {
    let base = match c {
        'à' | 'á' | 'â' | 'ã' | 'å' | 'ā' | 'ą' => 'a',
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'Ā' | 'Ą' => 'A',
        'ç' | 'ć' | 'č' => 'c',
        'Ç' | 'Ć' | 'Č' => 'C',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ę' | 'ě' => 'e',
        'È' | 'É' | 'Ê' | 'Ë' | 'Ē' | 'Ę' | 'Ě' => 'E',
        'ì' | 'í' | 'î' | 'ï' | 'ı' => 'i',
        'Ì' | 'Í' | 'Î' | 'Ï' | 'İ' => 'I',
        'ł' => 'l',
        'Ł' => 'L',
        'ń' | 'ň' => 'n',
        'Ñ' | 'Ń' | 'Ň' => 'N',
        'ò' | 'ó' | 'ô' | 'õ' | 'ø' | 'ō' | 'ő' => 'o',
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' | 'Ō' | 'Ő' => 'O',
        'ř' => 'r',
        'Ř' => 'R',
        'ś' | 'š' | 'ş' => 's',
        'Ś' | 'Š' | 'Ş' => 'S',
        'ť' | 'ţ' => 't',
        'Ť' | 'Ţ' => 'T',
        'ù' | 'ú' | 'û' | 'ū' | 'ů' | 'ű' => 'u',
        'Ù' | 'Ú' | 'Û' | 'Ü' | 'Ū' | 'Ů' | 'Ű' => 'U',
        'ý' | 'ÿ' => 'y',
        'Ý' | 'Ÿ' => 'Y',
        'ź' | 'ż' | 'ž' => 'z',
        'Ź' | 'Ż' | 'Ž' => 'Z',
        _ => return None,
    };
    Some(base as u8)
}

/// Opens the configured I2C bus and initializes the display.
#[cfg(target_os = "linux")]
pub fn open(config: &DisplayConfig) -> Result<Box<dyn CharacterDisplay>, DeviceError> {
    let path = lcdspot_model::platform::i2c_device_path(config.i2c_bus);
    let i2c = linux_embedded_hal::I2cdev::new(&path)
        .map_err(|e| DeviceError::Bus(format!("{}: {}", path.display(), e)))?;
    let lcd = Hd44780::new(
        i2c,
        linux_embedded_hal::Delay,
        config.address,
        config.width,
        config.rows,
    )?;
    Ok(Box::new(lcd))
}

#[cfg(not(target_os = "linux"))]
pub fn open(_config: &DisplayConfig) -> Result<Box<dyn CharacterDisplay>, DeviceError> {
    Err(DeviceError::Unsupported(
        "I2C character displays need Linux i2c-dev; use display.driver = \"log\"".to_string(),
    ))
}
