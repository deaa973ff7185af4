//! Music streaming adapter: Spotify Web API playback control.
//!
//! The authorized session is created on the first streaming command and then
//! reused for the rest of the run; the [`oauth::Authorizer`] inside it keeps
//! the bearer token fresh. A `401` from the API invalidates the token and the
//! request is retried once with a refreshed one.

mod oauth;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::SpotifyConfig;

use super::{DummyMode, Outcome, ServiceError, build_http_client, check_status, unknown_provider};

use oauth::{Authorizer, Credentials};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub name: String,
    pub artist: String,
    pub uri: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackAction {
    Pause,
    Next,
    Previous,
}

impl PlaybackAction {
    fn request(self) -> (Method, &'static str) {
        match self {
            PlaybackAction::Pause => (Method::PUT, "/me/player/pause"),
            PlaybackAction::Next => (Method::POST, "/me/player/next"),
            PlaybackAction::Previous => (Method::POST, "/me/player/previous"),
        }
    }
}

pub enum Streaming {
    Spotify {
        config: SpotifyConfig,
        session: Option<SpotifySession>,
    },
    Dummy(DummyMode),
}

impl Streaming {
    pub fn build(config: &SpotifyConfig) -> Result<Self, String> {
        match config.provider.as_str() {
            "spotify" => Ok(Streaming::Spotify { config: config.clone(), session: None }),
            "dummy" => Ok(Streaming::Dummy(DummyMode::Echo)),
            other => Err(unknown_provider("spotify", other)),
        }
    }

    /// Search for `query` and start playing the best matching track.
    pub async fn play(&mut self, query: &str) -> Outcome<Track> {
        let query = query.trim();
        if query.is_empty() {
            return Outcome::NotFound;
        }
        match self {
            Streaming::Spotify { config, session } => match ensure_session(config, session) {
                Ok(s) => s.play(query).await.into(),
                Err(e) => Outcome::Failed(e),
            },
            Streaming::Dummy(mode) => mode.outcome(|| Track {
                name: query.to_string(),
                artist: "Dummy Artist".to_string(),
                uri: "spotify:track:dummy".to_string(),
            }),
        }
    }

    pub async fn control(&mut self, action: PlaybackAction) -> Outcome<()> {
        match self {
            Streaming::Spotify { config, session } => match ensure_session(config, session) {
                Ok(s) => s.control(action).await.map(Some).into(),
                Err(e) => Outcome::Failed(e),
            },
            Streaming::Dummy(mode) => mode.outcome(|| ()),
        }
    }
}

fn ensure_session<'a>(
    config: &SpotifyConfig,
    session: &'a mut Option<SpotifySession>,
) -> Result<&'a mut SpotifySession, ServiceError> {
    if session.is_none() {
        info!("spotify: creating session");
        *session = Some(SpotifySession::new(config)?);
    }
    session
        .as_mut()
        .ok_or_else(|| ServiceError::Unavailable("spotify session unavailable".into()))
}

/// HTTP client + credential holder, alive from first use until exit.
pub struct SpotifySession {
    client: Client,
    api_base_url: String,
    auth: Authorizer,
}

impl SpotifySession {
    fn new(config: &SpotifyConfig) -> Result<Self, ServiceError> {
        let creds = Credentials {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            accounts_base_url: config.accounts_base_url.clone(),
        };
        Ok(Self {
            client: build_http_client(config.timeout_seconds)?,
            api_base_url: config.api_base_url.clone(),
            auth: Authorizer::new(creds, config.token_cache.clone()),
        })
    }

    async fn play(&mut self, query: &str) -> Result<Option<Track>, ServiceError> {
        let Some(track) = self.search_track(query).await? else {
            return Ok(None);
        };
        debug!(uri = %track.uri, "spotify: starting playback");
        let body = serde_json::json!({ "uris": [track.uri] });
        let res = self
            .send(|c, url| c.put(url).json(&body), "/me/player/play")
            .await?;
        check_status(res).await?;
        Ok(Some(track))
    }

    async fn control(&mut self, action: PlaybackAction) -> Result<(), ServiceError> {
        let (method, path) = action.request();
        let res = self
            .send(
                |c, url| {
                    c.request(method.clone(), url)
                        .header(reqwest::header::CONTENT_LENGTH, "0")
                },
                path,
            )
            .await?;
        check_status(res).await?;
        debug!(?action, "spotify: transport command accepted");
        Ok(())
    }

    async fn search_track(&mut self, query: &str) -> Result<Option<Track>, ServiceError> {
        let res = self
            .send(
                |c, url| c.get(url).query(&[("q", query), ("type", "track"), ("limit", "1")]),
                "/search",
            )
            .await?;
        let body: SearchResponse = check_status(res).await?.json().await?;
        Ok(first_track(body))
    }

    /// Send an authorized request; on `401` refresh the token and retry once.
    async fn send<F>(&mut self, build: F, path: &str) -> Result<reqwest::Response, ServiceError>
    where
        F: Fn(&Client, String) -> RequestBuilder,
    {
        let url = format!("{}{path}", self.api_base_url);
        let token = self.auth.access_token(&self.client).await?;
        let res = build(&self.client, url.clone()).bearer_auth(&token).send().await?;
        if res.status() != StatusCode::UNAUTHORIZED {
            return Ok(res);
        }

        debug!(%path, "spotify: token rejected, refreshing");
        self.auth.invalidate();
        let token = self.auth.access_token(&self.client).await?;
        Ok(build(&self.client, url).bearer_auth(&token).send().await?)
    }
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Option<TrackPage>,
}

#[derive(Debug, Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<TrackItem>,
}

#[derive(Debug, Deserialize)]
struct TrackItem {
    name: String,
    uri: String,
    #[serde(default)]
    artists: Vec<ArtistItem>,
}

#[derive(Debug, Deserialize)]
struct ArtistItem {
    name: String,
}

fn first_track(body: SearchResponse) -> Option<Track> {
    let item = body.tracks?.items.into_iter().next()?;
    let artist = item
        .artists
        .into_iter()
        .next()
        .map(|a| a.name)
        .unwrap_or_else(|| "an unknown artist".to_string());
    Some(Track { name: item.name, artist, uri: item.uri })
}
