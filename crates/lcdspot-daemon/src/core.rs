/// Track display loop.
///
/// One task owns the playback source, the display and all loop state:
///
/// ```text
///   shutdown token ──┐
///   ControlEvent rx ─┼── select! ──► handle_event / poll_cycle
///   poll interval ───┘                     │
///                                          ├── render_frame / splash_frame
///                                          └── apply_frame (changed lines only)
/// ```
///
/// Source failures degrade to a blank display; display failures are logged
/// and the next cycle rewrites every line.
use lcdspot_model::config::Config;
use lcdspot_model::display::CharacterDisplay;
use lcdspot_model::frame::{apply_frame, apply_full, render_frame, splash_frame, DisplayFrame};
use lcdspot_model::playback::{PlaybackControl, PlaybackState, SourceError};
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Inputs from outside the poll schedule, delivered as POSIX signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    ToggleBacklight,
    ToggleLiked,
    NextTrack,
    ShowSplash,
}

/// Contents of the host information screen.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostInfo {
    pub hostname: String,
    pub address: String,
}

/// Requests a single source call may chain: the call itself, a token
/// refresh, the retry after it, and the saved-track lookup.
const REQUESTS_PER_CALL: u32 = 4;

#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub poll_interval: Duration,
    /// Upper bound for one call to the playback source. Individual HTTP
    /// requests carry their own, shorter timeout.
    pub call_budget: Duration,
    pub splash: Duration,
    pub backlight: bool,
}

impl LoopSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            call_budget: config.request_timeout() * REQUESTS_PER_CALL,
            splash: config.splash_duration(),
            backlight: config.display.backlight,
        }
    }
}

/// Owns the display for the lifetime of the loop and blanks it on drop,
/// whether the loop ended normally, was cancelled, or is unwinding.
pub struct DisplayGuard<D: CharacterDisplay> {
    display: D,
}

impl<D: CharacterDisplay> DisplayGuard<D> {
    pub fn new(display: D) -> Self {
        Self { display }
    }
}

impl<D: CharacterDisplay> Deref for DisplayGuard<D> {
    type Target = D;

    fn deref(&self) -> &D {
        &self.display
    }
}

impl<D: CharacterDisplay> DerefMut for DisplayGuard<D> {
    fn deref_mut(&mut self) -> &mut D {
        &mut self.display
    }
}

impl<D: CharacterDisplay> Drop for DisplayGuard<D> {
    fn drop(&mut self) {
        if let Err(e) = self.display.clear() {
            warn!("Failed to clear display on release: {}", e);
        }
        if let Err(e) = self.display.set_backlight(false) {
            warn!("Failed to switch backlight off on release: {}", e);
        }
        debug!("Display released");
    }
}

struct LoopState {
    /// What the display is known to show. `None` after a failed write, so
    /// the next frame is written in full.
    shown: Option<DisplayFrame>,
    playback: PlaybackState,
    last_poll: Option<Instant>,
    backlight: bool,
    splash_until: Option<Instant>,
}

pub struct DisplayLoop<S, D: CharacterDisplay> {
    source: S,
    display: DisplayGuard<D>,
    settings: LoopSettings,
    host_info: fn() -> HostInfo,
    state: LoopState,
}

impl<S, D> DisplayLoop<S, D>
where
    S: PlaybackControl,
    D: CharacterDisplay,
{
    pub fn new(source: S, display: D, settings: LoopSettings, host_info: fn() -> HostInfo) -> Self {
        let state = LoopState {
            shown: None,
            playback: PlaybackState::Unknown,
            last_poll: None,
            backlight: settings.backlight,
            splash_until: None,
        };
        Self {
            source,
            display: DisplayGuard::new(display),
            settings,
            host_info,
            state,
        }
    }

    /// Polls and renders until `shutdown` is cancelled. The display is
    /// blanked when the loop is dropped.
    pub async fn run(mut self, mut events: mpsc::Receiver<ControlEvent>, shutdown: CancellationToken) {
        self.start();

        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, leaving display loop");
                    break;
                }

                Some(event) = events.recv() => {
                    self.handle_event(event).await;
                }

                _ = ticker.tick() => {
                    self.poll_cycle().await;
                }
            }
        }
    }

    fn start(&mut self) {
        let width = self.display.width();
        let rows = self.display.rows();
        let blank = DisplayFrame::blank(width, rows);

        let reset = self
            .display
            .clear()
            .and_then(|_| self.display.set_backlight(blank.backlight));
        match reset {
            Ok(()) => self.state.shown = Some(blank),
            Err(e) => error!("Failed to reset display: {}", e),
        }

        self.open_splash();
        info!(
            "Display loop started ({}x{}, polling every {:?})",
            width, rows, self.settings.poll_interval
        );
    }

    async fn poll_cycle(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.state.last_poll {
            let gap = now - last;
            if gap > self.settings.poll_interval.saturating_mul(2) {
                warn!("Poll cycle late: {:?} since previous poll", gap);
            }
        }
        self.state.last_poll = Some(now);

        let result = bounded(self.settings.call_budget, self.source.current_playback()).await;

        let playback = match result {
            Ok(playback) => playback,
            Err(e @ SourceError::Auth(_)) => {
                error!("Playback source rejected credentials: {}", e);
                PlaybackState::Unknown
            }
            Err(e) => {
                warn!("Playback source unavailable: {}", e);
                PlaybackState::Unknown
            }
        };

        self.update_playback(playback);
        self.refresh_display();
    }

    fn update_playback(&mut self, playback: PlaybackState) {
        let previous = &self.state.playback;

        match (previous.track(), playback.track()) {
            (Some(old), Some(new)) if old.same_item(new) => {}
            (_, Some(new)) => info!("{}::{}::{}", new.artist, new.title, new.album),
            _ => {}
        }
        if previous.label() != playback.label() {
            debug!("Playback {} -> {}", previous.label(), playback.label());
        }

        self.state.playback = playback;
    }

    fn splash_active(&self) -> bool {
        self.state
            .splash_until
            .is_some_and(|until| Instant::now() < until)
    }

    fn open_splash(&mut self) {
        if self.settings.splash.is_zero() {
            return;
        }
        self.state.splash_until = Some(Instant::now() + self.settings.splash);
    }

    fn next_frame(&self) -> DisplayFrame {
        let width = self.display.width();
        let rows = self.display.rows();

        let mut frame = if self.splash_active() {
            let host = (self.host_info)();
            splash_frame(&host.hostname, &host.address, width, rows)
        } else {
            render_frame(&self.state.playback, width, rows)
        };
        frame.backlight &= self.state.backlight;
        frame
    }

    fn refresh_display(&mut self) {
        let next = self.next_frame();

        let result = match &self.state.shown {
            Some(previous) => apply_frame(previous, &next, &mut *self.display),
            None => apply_full(&next, &mut *self.display),
        };

        match result {
            Ok(0) => {}
            Ok(writes) => {
                debug!("Display updated ({} writes)", writes);
                self.state.shown = Some(next);
            }
            Err(e) => {
                error!("Display write failed: {}", e);
                self.state.shown = None;
            }
        }
    }

    async fn handle_event(&mut self, event: ControlEvent) {
        debug!("Control event: {:?}", event);

        match event {
            ControlEvent::ToggleBacklight => {
                self.state.backlight = !self.state.backlight;
                info!(
                    "Backlight {}",
                    if self.state.backlight { "enabled" } else { "disabled" }
                );
                self.refresh_display();
            }

            ControlEvent::ShowSplash => {
                self.open_splash();
                self.refresh_display();
            }

            ControlEvent::ToggleLiked => {
                let Some((id, liked)) = self.playing_track_id() else {
                    debug!("Nothing playing, ignoring like toggle");
                    return;
                };
                let timeout = self.settings.call_budget;
                match bounded(timeout, self.source.set_liked(&id, liked)).await {
                    Ok(()) => {
                        info!("Track {} {}", id, if liked { "liked" } else { "unliked" });
                        if let Some(track) = self.state.playback.track_mut() {
                            track.is_liked = liked;
                        }
                        self.refresh_display();
                    }
                    Err(e) => warn!("Failed to toggle liked state: {}", e),
                }
            }

            ControlEvent::NextTrack => {
                if !self.state.playback.is_playing() {
                    debug!("Nothing playing, ignoring next track");
                    return;
                }
                let timeout = self.settings.call_budget;
                if let Err(e) = bounded(timeout, self.source.next_track()).await {
                    warn!("Failed to skip to next track: {}", e);
                }
            }
        }
    }

    /// Id and the liked state to switch to, for a playing track with an id.
    fn playing_track_id(&self) -> Option<(String, bool)> {
        match &self.state.playback {
            PlaybackState::Playing(track) => track.id.clone().map(|id| (id, !track.is_liked)),
            _ => None,
        }
    }
}

async fn bounded<T, F>(timeout: Duration, fut: F) -> Result<T, SourceError>
where
    F: Future<Output = Result<T, SourceError>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| SourceError::Transient(format!("no answer within {:?}", timeout)))?
}
