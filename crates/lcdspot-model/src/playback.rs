//! Playback state as reported by the streaming service, and the traits the
//! display loop uses to talk to it.

use thiserror::Error;

/// Metadata of the item currently loaded in the player.
///
/// For podcast episodes `artist` holds the show publisher and `album` the
/// show name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Track {
    /// Service id, absent for local files.
    pub id: Option<String>,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub is_liked: bool,
}

impl Track {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            ..Self::default()
        }
    }

    /// Same item, ignoring the liked flag.
    pub fn same_item(&self, other: &Track) -> bool {
        self.id == other.id
            && self.title == other.title
            && self.artist == other.artist
            && self.album == other.album
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlaybackState {
    Playing(Track),
    Paused(Track),
    Stopped,
    /// The service could not be asked, or answered with something we
    /// cannot show (ads, unsupported item types).
    #[default]
    Unknown,
}

impl PlaybackState {
    pub fn track(&self) -> Option<&Track> {
        match self {
            PlaybackState::Playing(track) | PlaybackState::Paused(track) => Some(track),
            PlaybackState::Stopped | PlaybackState::Unknown => None,
        }
    }

    pub fn track_mut(&mut self) -> Option<&mut Track> {
        match self {
            PlaybackState::Playing(track) | PlaybackState::Paused(track) => Some(track),
            PlaybackState::Stopped | PlaybackState::Unknown => None,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing(_))
    }

    /// Short label for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            PlaybackState::Playing(_) => "playing",
            PlaybackState::Paused(_) => "paused",
            PlaybackState::Stopped => "stopped",
            PlaybackState::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    /// Credentials are invalid or expired and could not be refreshed.
    #[error("authorization failed: {0}")]
    Auth(String),
    /// Network failure, timeout, rate limit or a server-side error. The next
    /// poll may succeed.
    #[error("transient playback source failure: {0}")]
    Transient(String),
}

impl SourceError {
    pub fn is_auth(&self) -> bool {
        matches!(self, SourceError::Auth(_))
    }
}

/// Answers "what is playing now".
#[allow(async_fn_in_trait)]
pub trait PlaybackSource {
    async fn current_playback(&mut self) -> Result<PlaybackState, SourceError>;
}

/// Player actions triggered by control signals.
#[allow(async_fn_in_trait)]
pub trait PlaybackControl: PlaybackSource {
    /// Adds the track to, or removes it from, the user's saved tracks.
    async fn set_liked(&mut self, track_id: &str, liked: bool) -> Result<(), SourceError>;

    async fn next_track(&mut self) -> Result<(), SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_item_ignores_liked() {
        let a = Track {
            id: Some("4u7EnebtmKWzUH433cf5Qv".into()),
            is_liked: false,
            ..Track::new("Bohemian Rhapsody", "Queen")
        };
        let b = Track {
            is_liked: true,
            ..a.clone()
        };
        assert!(a.same_item(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_track_accessors() {
        let paused = PlaybackState::Paused(Track::new("Song", "Band"));
        assert_eq!(paused.track().map(|t| t.title.as_str()), Some("Song"));
        assert!(!paused.is_playing());
        assert!(PlaybackState::Stopped.track().is_none());
        assert_eq!(PlaybackState::default(), PlaybackState::Unknown);
    }
}
