use lcdspot_model::display::{Align, CharacterDisplay, DeviceError};
use lcdspot_model::frame::{apply_frame, apply_full, render_frame, DisplayFrame};
use lcdspot_model::playback::{PlaybackState, Track};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Write(usize, String, Align),
    Backlight(bool),
    Clear,
}

#[derive(Default)]
struct RecordingDisplay {
    calls: Vec<Call>,
    fail_writes: bool,
}

impl CharacterDisplay for RecordingDisplay {
    fn width(&self) -> usize {
        16
    }

    fn rows(&self) -> usize {
        2
    }

    fn write_line(&mut self, index: usize, text: &str, align: Align) -> Result<(), DeviceError> {
        if self.fail_writes {
            return Err(DeviceError::Bus("nack".into()));
        }
        self.calls.push(Call::Write(index, text.to_string(), align));
        Ok(())
    }

    fn set_backlight(&mut self, on: bool) -> Result<(), DeviceError> {
        self.calls.push(Call::Backlight(on));
        Ok(())
    }

    fn clear(&mut self) -> Result<(), DeviceError> {
        self.calls.push(Call::Clear);
        Ok(())
    }
}

fn sample_states() -> Vec<PlaybackState> {
    let long = Track::new(
        "A Very Long Track Title That Never Fits On Any Display",
        "An Equally Long Artist Name, Featuring Somebody Else",
    );
    let liked = Track {
        is_liked: true,
        ..Track::new("Hoppípolla", "Sigur Rós")
    };
    vec![
        PlaybackState::Playing(Track::new("Bohemian Rhapsody", "Queen")),
        PlaybackState::Playing(long.clone()),
        PlaybackState::Playing(liked),
        PlaybackState::Playing(Track::new("", "")),
        PlaybackState::Paused(long),
        PlaybackState::Stopped,
        PlaybackState::Unknown,
    ]
}

#[test]
fn every_rendered_line_has_display_width() {
    for state in sample_states() {
        for (width, rows) in [(16, 1), (16, 2), (20, 4), (8, 2), (40, 2)] {
            let frame = render_frame(&state, width, rows);
            assert_eq!(frame.lines.len(), rows, "{:?} {}x{}", state, width, rows);
            for line in &frame.lines {
                assert_eq!(line.text.chars().count(), width, "{:?}", line);
            }
        }
    }
}

#[test]
fn identical_frames_make_no_calls() {
    for state in sample_states() {
        let frame = render_frame(&state, 16, 2);
        let mut display = RecordingDisplay::default();
        let writes = apply_frame(&frame, &frame, &mut display).unwrap();
        assert_eq!(writes, 0);
        assert!(display.calls.is_empty());
    }
}

#[test]
fn only_changed_lines_are_written() {
    let prev = render_frame(
        &PlaybackState::Playing(Track::new("Bohemian Rhapsody", "Queen")),
        16,
        2,
    );
    let next = render_frame(
        &PlaybackState::Playing(Track::new("Under Pressure", "Queen")),
        16,
        2,
    );
    let mut display = RecordingDisplay::default();
    let writes = apply_frame(&prev, &next, &mut display).unwrap();

    assert_eq!(writes, 1);
    assert_eq!(
        display.calls,
        vec![Call::Write(0, " Under Pressure ".into(), Align::Center)]
    );
}

#[test]
fn pausing_only_switches_backlight() {
    let track = Track::new("Bohemian Rhapsody", "Queen");
    let prev = render_frame(&PlaybackState::Playing(track.clone()), 16, 2);
    let next = render_frame(&PlaybackState::Paused(track), 16, 2);
    let mut display = RecordingDisplay::default();
    apply_frame(&prev, &next, &mut display).unwrap();
    assert_eq!(display.calls, vec![Call::Backlight(false)]);
}

#[test]
fn stopping_blanks_both_lines() {
    let prev = render_frame(
        &PlaybackState::Playing(Track::new("Bohemian Rhapsody", "Queen")),
        16,
        2,
    );
    let next = render_frame(&PlaybackState::Stopped, 16, 2);
    let mut display = RecordingDisplay::default();
    apply_frame(&prev, &next, &mut display).unwrap();
    assert_eq!(
        display.calls,
        vec![
            Call::Write(0, " ".repeat(16), Align::Left),
            Call::Write(1, " ".repeat(16), Align::Left),
            Call::Backlight(false),
        ]
    );
}

#[test]
fn apply_full_writes_everything() {
    let frame = DisplayFrame::blank(16, 2);
    let mut display = RecordingDisplay::default();
    assert_eq!(apply_full(&frame, &mut display).unwrap(), 3);
    assert_eq!(display.calls.len(), 3);
    assert!(!display.calls.contains(&Call::Clear));
}

#[test]
fn write_failure_is_reported() {
    let prev = DisplayFrame::blank(16, 2);
    let next = render_frame(&PlaybackState::Playing(Track::new("x", "y")), 16, 2);
    let mut display = RecordingDisplay {
        fail_writes: true,
        ..Default::default()
    };
    assert!(matches!(
        apply_frame(&prev, &next, &mut display),
        Err(DeviceError::Bus(_))
    ));
}
