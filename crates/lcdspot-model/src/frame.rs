//! Fixed-width display frames: rendering from playback state and applying
//! the difference between two frames to a display.

use crate::display::{Align, CharacterDisplay, DeviceError};
use crate::playback::PlaybackState;

/// Character code of the heart glyph, loaded into CGRAM slot 0 by the
/// HD44780 driver.
pub const HEART: char = '\u{0}';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLine {
    pub text: String,
    pub align: Align,
}

impl FrameLine {
    /// Builds a line already fitted to `width`.
    pub fn new(text: &str, width: usize, align: Align) -> Self {
        Self {
            text: fit_line(text, width, align),
            align,
        }
    }

    pub fn blank(width: usize) -> Self {
        Self::new("", width, Align::Left)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayFrame {
    pub lines: Vec<FrameLine>,
    pub backlight: bool,
}

impl DisplayFrame {
    /// All lines blank, backlight off.
    pub fn blank(width: usize, rows: usize) -> Self {
        Self {
            lines: vec![FrameLine::blank(width); rows],
            backlight: false,
        }
    }

    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(|l| l.text.as_str())
    }
}

/// Truncates or pads `text` to exactly `width` characters.
///
/// Truncation keeps the leading characters and never adds an ellipsis.
/// Centering puts the odd padding column on the right.
pub fn fit_line(text: &str, width: usize, align: Align) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.chars().take(width).collect();
    }

    let pad = width - len;
    let (left, right) = match align {
        Align::Left => (0, pad),
        Align::Right => (pad, 0),
        Align::Center => (pad / 2, pad - pad / 2),
    };

    let mut line = String::with_capacity(text.len() + pad);
    line.extend(std::iter::repeat(' ').take(left));
    line.push_str(text);
    line.extend(std::iter::repeat(' ').take(right));
    line
}

/// Renders a playback state into a frame of `rows` lines of `width` chars.
///
/// Playing shows the title on the first line and the artist on the second,
/// centered, with the backlight on. Paused shows the same text with the
/// backlight off. Stopped and Unknown are blank with the backlight off.
pub fn render_frame(state: &PlaybackState, width: usize, rows: usize) -> DisplayFrame {
    let mut frame = DisplayFrame::blank(width, rows);

    let Some(track) = state.track() else {
        return frame;
    };

    if let Some(line) = frame.lines.get_mut(0) {
        *line = FrameLine::new(&track.title, width, Align::Center);
    }
    if let Some(line) = frame.lines.get_mut(1) {
        let artist = if track.is_liked {
            format!("{}{}", HEART, track.artist)
        } else {
            track.artist.clone()
        };
        *line = FrameLine::new(&artist, width, Align::Center);
    }
    frame.backlight = state.is_playing();
    frame
}

/// Host information screen shown after start-up.
pub fn splash_frame(hostname: &str, address: &str, width: usize, rows: usize) -> DisplayFrame {
    let mut frame = DisplayFrame::blank(width, rows);
    let texts = [format!("HOST: {}", hostname), format!("IP: {}", address)];
    for (line, text) in frame.lines.iter_mut().zip(texts.iter()) {
        *line = FrameLine::new(text, width, Align::Left);
    }
    frame.backlight = true;
    frame
}

/// Writes the lines of `next` that differ from `previous`, and the backlight
/// if it changed. Returns the number of display calls made; identical frames
/// make none.
pub fn apply_frame<D>(
    previous: &DisplayFrame,
    next: &DisplayFrame,
    display: &mut D,
) -> Result<usize, DeviceError>
where
    D: CharacterDisplay + ?Sized,
{
    let mut writes = 0;

    for (index, line) in next.lines.iter().enumerate() {
        if previous.lines.get(index) == Some(line) {
            continue;
        }
        display.write_line(index, &line.text, line.align)?;
        writes += 1;
    }

    if previous.backlight != next.backlight {
        display.set_backlight(next.backlight)?;
        writes += 1;
    }

    Ok(writes)
}

/// Writes every line of `frame` and its backlight state, regardless of what
/// the display currently shows.
pub fn apply_full<D>(frame: &DisplayFrame, display: &mut D) -> Result<usize, DeviceError>
where
    D: CharacterDisplay + ?Sized,
{
    for (index, line) in frame.lines.iter().enumerate() {
        display.write_line(index, &line.text, line.align)?;
    }
    display.set_backlight(frame.backlight)?;
    Ok(frame.lines.len() + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::Track;

    #[test]
    fn test_fit_line_center_puts_extra_space_right() {
        assert_eq!(fit_line("Queen", 16, Align::Center), "     Queen      ");
        assert_eq!(fit_line("ab", 5, Align::Right), "   ab");
        assert_eq!(fit_line("ab", 5, Align::Left), "ab   ");
    }

    #[test]
    fn test_fit_line_truncates_by_char() {
        assert_eq!(fit_line("Bohemian Rhapsody", 16, Align::Center), "Bohemian Rhapsod");
        let fitted = fit_line("Sigur Rós — Hoppípolla", 10, Align::Left);
        assert_eq!(fitted.chars().count(), 10);
        assert_eq!(fitted, "Sigur Rós ");
    }

    #[test]
    fn test_fit_line_zero_width() {
        assert_eq!(fit_line("anything", 0, Align::Center), "");
    }

    #[test]
    fn test_render_playing_example() {
        let state = PlaybackState::Playing(Track::new("Bohemian Rhapsody", "Queen"));
        let frame = render_frame(&state, 16, 2);
        assert_eq!(frame.line(0), Some("Bohemian Rhapsod"));
        assert_eq!(frame.line(1), Some("     Queen      "));
        assert!(frame.backlight);
    }

    #[test]
    fn test_render_paused_keeps_text_backlight_off() {
        let track = Track::new("Bohemian Rhapsody", "Queen");
        let playing = render_frame(&PlaybackState::Playing(track.clone()), 16, 2);
        let paused = render_frame(&PlaybackState::Paused(track), 16, 2);
        assert_eq!(playing.lines, paused.lines);
        assert!(!paused.backlight);
    }

    #[test]
    fn test_render_stopped_and_unknown_are_blank() {
        for state in [PlaybackState::Stopped, PlaybackState::Unknown] {
            let frame = render_frame(&state, 16, 2);
            assert_eq!(frame, DisplayFrame::blank(16, 2));
            assert_eq!(frame.line(0), Some("                "));
            assert!(!frame.backlight);
        }
    }

    #[test]
    fn test_render_four_rows_leaves_rest_blank() {
        let state = PlaybackState::Playing(Track::new("Title", "Artist"));
        let frame = render_frame(&state, 20, 4);
        assert_eq!(frame.lines.len(), 4);
        assert_eq!(frame.line(2), Some(" ".repeat(20).as_str()));
        assert_eq!(frame.line(3), Some(" ".repeat(20).as_str()));
    }

    #[test]
    fn test_render_liked_prefixes_heart() {
        let track = Track {
            is_liked: true,
            ..Track::new("Title", "Abba")
        };
        let frame = render_frame(&PlaybackState::Playing(track), 8, 2);
        assert_eq!(frame.line(1), Some(" \u{0}Abba  "));
    }

    #[test]
    fn test_splash_frame() {
        let frame = splash_frame("raspberrypi", "192.168.1.20", 16, 2);
        assert_eq!(frame.line(0), Some("HOST: raspberryp"));
        assert_eq!(frame.line(1), Some("IP: 192.168.1.20"));
        assert!(frame.backlight);
    }
}
