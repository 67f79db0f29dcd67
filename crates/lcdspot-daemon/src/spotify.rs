//! Spotify Web API client: currently playing item, saved-track flag and
//! player skip, with OAuth token refresh against a spotipy-compatible token
//! cache.

use lcdspot_model::config::{SpotifyConfig, SpotifyCredentials};
use lcdspot_model::playback::{PlaybackControl, PlaybackSource, PlaybackState, SourceError, Track};
use reqwest::{Method, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

pub const SCOPES: &str =
    "user-read-playback-state user-modify-playback-state user-library-read user-library-modify";

/// Tokens this close to expiry are refreshed before use.
const EXPIRY_MARGIN_SECS: u64 = 60;

/// Token cache entry. Field names follow the spotipy cache file so an
/// existing `.cache-spotipy` can be reused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub expires_at: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenInfo {
    fn is_expired(&self, now: u64) -> bool {
        self.expires_at <= now + EXPIRY_MARGIN_SECS
    }
}

// ── currently-playing response ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CurrentlyPlaying {
    #[serde(default)]
    is_playing: bool,
    #[serde(default)]
    currently_playing_type: Option<String>,
    #[serde(default)]
    item: Option<PlayingItem>,
}

#[derive(Debug, Deserialize)]
struct PlayingItem {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    artists: Vec<NamedObject>,
    #[serde(default)]
    album: Option<NamedObject>,
    #[serde(default)]
    show: Option<Show>,
}

#[derive(Debug, Deserialize)]
struct NamedObject {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Show {
    #[serde(default)]
    name: String,
    #[serde(default)]
    publisher: String,
}

impl CurrentlyPlaying {
    /// Maps the item to a track. Episodes carry no id because the saved
    /// tracks endpoints only accept track ids.
    fn into_track(self) -> Option<Track> {
        let item = self.item?;
        let kind = self
            .currently_playing_type
            .as_deref()
            .unwrap_or(if item.show.is_some() { "episode" } else { "track" });

        match kind {
            "track" => Some(Track {
                id: item.id,
                artist: item
                    .artists
                    .iter()
                    .map(|a| a.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                album: item.album.map(|a| a.name).unwrap_or_default(),
                title: item.name,
                is_liked: false,
            }),
            "episode" => {
                let show = item.show.unwrap_or(Show {
                    name: String::new(),
                    publisher: String::new(),
                });
                Some(Track {
                    id: None,
                    title: item.name,
                    artist: show.publisher,
                    album: show.name,
                    is_liked: false,
                })
            }
            other => {
                debug!("Unsupported item type {:?}", other);
                None
            }
        }
    }
}

// ── client ────────────────────────────────────────────────────────────────────

pub struct SpotifyClient {
    http: reqwest::Client,
    credentials: SpotifyCredentials,
    api_base: String,
    accounts_base: String,
    token_cache: PathBuf,
    token: Option<TokenInfo>,
    /// Saved-track flag of the last track asked about.
    liked: Option<(String, bool)>,
}

impl SpotifyClient {
    pub fn new(config: &SpotifyConfig, credentials: SpotifyCredentials) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("lcdspot/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs_f64(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            credentials,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            accounts_base: config.accounts_base.trim_end_matches('/').to_string(),
            token_cache: config.token_cache.clone(),
            token: None,
            liked: None,
        })
    }

    pub fn token_cache(&self) -> &Path {
        &self.token_cache
    }

    /// URL the user opens to grant access.
    pub fn authorize_url(&self) -> anyhow::Result<Url> {
        let url = Url::parse_with_params(
            &format!("{}/authorize", self.accounts_base),
            &[
                ("client_id", self.credentials.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.credentials.redirect_uri.as_str()),
                ("scope", SCOPES),
            ],
        )?;
        Ok(url)
    }

    /// Trades an authorization code for tokens and writes the token cache.
    pub async fn exchange_code(&mut self, code: &str) -> Result<(), SourceError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.credentials.redirect_uri.as_str()),
        ];
        let token = self.request_token(&form, None).await?;
        self.store_token(token).await;
        Ok(())
    }

    async fn ensure_token(&mut self) -> Result<String, SourceError> {
        if self.token.is_none() {
            self.token = Some(read_token_cache(&self.token_cache).await?);
        }
        let expired = self
            .token
            .as_ref()
            .is_some_and(|t| t.is_expired(unix_now()));
        if expired {
            debug!("Access token expired, refreshing");
            self.refresh().await?;
        }
        self.token
            .as_ref()
            .map(|t| t.access_token.clone())
            .ok_or_else(|| SourceError::Auth("no access token".to_string()))
    }

    async fn refresh(&mut self) -> Result<(), SourceError> {
        let refresh_token = self
            .token
            .as_ref()
            .and_then(|t| t.refresh_token.clone())
            .ok_or_else(|| SourceError::Auth("token cache has no refresh token".to_string()))?;

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
        ];
        let token = self.request_token(&form, Some(&refresh_token)).await?;
        info!("Refreshed Spotify access token");
        self.store_token(token).await;
        Ok(())
    }

    async fn request_token(
        &self,
        form: &[(&str, &str)],
        previous_refresh: Option<&str>,
    ) -> Result<TokenInfo, SourceError> {
        let response = self
            .http
            .post(format!("{}/api/token", self.accounts_base))
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.client_secret))
            .form(form)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Auth(format!(
                "token request rejected ({}): {}",
                status, body
            )));
        }
        let response = check_status(response)?;

        let mut token: TokenInfo = response.json().await.map_err(transport_error)?;
        token.expires_at = unix_now() + token.expires_in;
        if token.refresh_token.is_none() {
            token.refresh_token = previous_refresh.map(str::to_string);
        }
        Ok(token)
    }

    async fn store_token(&mut self, token: TokenInfo) {
        if let Err(e) = write_token_cache(&self.token_cache, &token).await {
            warn!("Failed to write token cache {:?}: {}", self.token_cache, e);
        }
        self.token = Some(token);
    }

    /// Sends an authorized API request. A 401 triggers one token refresh
    /// and retry.
    async fn send(
        &mut self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Response, SourceError> {
        let url = format!("{}{}", self.api_base, path);
        let mut retried = false;

        loop {
            let access_token = self.ensure_token().await?;
            let mut request = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(access_token)
                .query(query);
            if method != Method::GET {
                // Spotify answers 411 to body-less writes without a length.
                request = request.body("");
            }

            let response = request.send().await.map_err(transport_error)?;
            if response.status() == StatusCode::UNAUTHORIZED && !retried {
                debug!("{} {} answered 401, refreshing token", method, path);
                retried = true;
                self.refresh().await?;
                continue;
            }
            return check_status(response);
        }
    }

    async fn is_liked(&mut self, track_id: &str) -> bool {
        if let Some((id, liked)) = &self.liked {
            if id == track_id {
                return *liked;
            }
        }

        match self.fetch_liked(track_id).await {
            Ok(liked) => {
                self.liked = Some((track_id.to_string(), liked));
                liked
            }
            Err(e) => {
                warn!("Could not fetch saved state of {}: {}", track_id, e);
                false
            }
        }
    }

    async fn fetch_liked(&mut self, track_id: &str) -> Result<bool, SourceError> {
        let response = self
            .send(Method::GET, "/v1/me/tracks/contains", &[("ids", track_id)])
            .await?;
        let flags: Vec<bool> = response.json().await.map_err(transport_error)?;
        Ok(flags.first().copied().unwrap_or(false))
    }

    fn cached_liked(&self, track_id: &str) -> bool {
        matches!(&self.liked, Some((id, true)) if id == track_id)
    }
}

impl PlaybackSource for SpotifyClient {
    async fn current_playback(&mut self) -> Result<PlaybackState, SourceError> {
        let response = self
            .send(
                Method::GET,
                "/v1/me/player/currently-playing",
                &[("additional_types", "episode")],
            )
            .await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(PlaybackState::Stopped);
        }
        let body = response.bytes().await.map_err(transport_error)?;
        if body.is_empty() {
            return Ok(PlaybackState::Stopped);
        }

        let current: CurrentlyPlaying = serde_json::from_slice(&body)
            .map_err(|e| SourceError::Transient(format!("unexpected response: {}", e)))?;
        let is_playing = current.is_playing;
        let Some(mut track) = current.into_track() else {
            return Ok(PlaybackState::Unknown);
        };

        if let Some(id) = track.id.clone() {
            track.is_liked = if is_playing {
                self.is_liked(&id).await
            } else {
                self.cached_liked(&id)
            };
        }

        Ok(if is_playing {
            PlaybackState::Playing(track)
        } else {
            PlaybackState::Paused(track)
        })
    }
}

impl PlaybackControl for SpotifyClient {
    async fn set_liked(&mut self, track_id: &str, liked: bool) -> Result<(), SourceError> {
        let method = if liked { Method::PUT } else { Method::DELETE };
        self.send(method, "/v1/me/tracks", &[("ids", track_id)]).await?;
        self.liked = Some((track_id.to_string(), liked));
        Ok(())
    }

    async fn next_track(&mut self) -> Result<(), SourceError> {
        self.send(Method::POST, "/v1/me/player/next", &[]).await?;
        Ok(())
    }
}

// ── helpers ───────────────────────────────────────────────────────────────────

/// Extracts the authorization code from the URL the browser was redirected
/// to, or accepts a bare code.
pub fn parse_authorization_response(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    match Url::parse(input) {
        Ok(url) => url
            .query_pairs()
            .find(|(key, _)| key == "code")
            .map(|(_, value)| value.into_owned()),
        Err(_) if !input.contains(char::is_whitespace) => Some(input.to_string()),
        Err(_) => None,
    }
}

fn check_status(response: Response) -> Result<Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(SourceError::Auth("access token rejected".to_string()));
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("?")
            .to_string();
        return Err(SourceError::Transient(format!(
            "rate limited, retry after {}s",
            retry_after
        )));
    }
    Err(SourceError::Transient(format!(
        "{} {}",
        response.url().path(),
        status
    )))
}

fn transport_error(e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Transient("request timed out".to_string())
    } else {
        SourceError::Transient(e.to_string())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

async fn read_token_cache(path: &Path) -> Result<TokenInfo, SourceError> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        SourceError::Auth(format!(
            "cannot read token cache {:?} ({}); run `lcdspot authorize`",
            path, e
        ))
    })?;
    serde_json::from_str(&content)
        .map_err(|e| SourceError::Auth(format!("corrupt token cache {:?}: {}", path, e)))
}

async fn write_token_cache(path: &Path, token: &TokenInfo) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(token)?;
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        // Sibling temp file, created 0600 on unix, renamed over the cache.
        let mut file = tempfile::NamedTempFile::new_in(&dir)?;
        file.write_all(json.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&path)?;
        Ok(())
    })
    .await?
}
