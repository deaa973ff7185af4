//! Service adapters: one module per external collaborator.
//!
//! Every adapter is an enum over its backends (a real HTTP/process backend
//! plus `Dummy`), selected by the `provider` key of its config section.
//! Enum dispatch keeps the async methods plain `async fn` with no trait
//! objects; adding a backend = new variant + new match arm.
//!
//! Adapters never return `Err` to the caller: every call ends in an
//! [`Outcome`], and the dispatcher renders it through the console sink.

pub mod browser;
pub mod jokes;
pub mod news;
pub mod search;
pub mod spotify;
pub mod video;
pub mod wiki;

use std::time::Duration;

use thiserror::Error;

use crate::config::Config;

// ── Error / Outcome ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Connection refused, DNS failure, timeout…
    #[error("request failed: {0}")]
    Transport(String),
    /// Backend answered with a non-success status.
    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("authorization failed: {0}")]
    Auth(String),
    /// Backend not configured or not installed.
    #[error("{0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ServiceError::Decode(e.to_string())
        } else {
            ServiceError::Transport(e.to_string())
        }
    }
}

/// Result of one adapter call.
///
/// `NotFound` is a valid, empty answer from the backend; `Failed` is a
/// transport/auth/decode problem. The two render as different messages.
#[derive(Debug)]
pub enum Outcome<T> {
    Found(T),
    NotFound,
    Failed(ServiceError),
}

impl<T> From<Result<Option<T>, ServiceError>> for Outcome<T> {
    fn from(r: Result<Option<T>, ServiceError>) -> Self {
        match r {
            Ok(Some(v)) => Outcome::Found(v),
            Ok(None) => Outcome::NotFound,
            Err(e) => Outcome::Failed(e),
        }
    }
}

/// Canned behaviour for `Dummy` backends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DummyMode {
    /// Answer with a result derived from the input.
    #[default]
    Echo,
    /// Answer with an empty result.
    Empty,
    /// Fail with `ServiceError::Transport(msg)`.
    Fail(String),
}

impl DummyMode {
    fn outcome<T>(&self, found: impl FnOnce() -> T) -> Outcome<T> {
        match self {
            DummyMode::Echo => Outcome::Found(found()),
            DummyMode::Empty => Outcome::NotFound,
            DummyMode::Fail(msg) => Outcome::Failed(ServiceError::Transport(msg.clone())),
        }
    }
}

// ── HTTP helpers ──────────────────────────────────────────────────────────────

const USER_AGENT: &str = concat!("deskmate/", env!("CARGO_PKG_VERSION"));

pub(crate) fn build_http_client(timeout_seconds: u64) -> Result<reqwest::Client, ServiceError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ServiceError::Unavailable(format!("failed building HTTP client: {e}")))
}

/// Turn a non-2xx response into [`ServiceError::Status`] with the body text.
pub(crate) async fn check_status(
    res: reqwest::Response,
) -> Result<reqwest::Response, ServiceError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(ServiceError::Status {
        code: status.as_u16(),
        body: body.chars().take(300).collect(),
    })
}

// ── Bundle ────────────────────────────────────────────────────────────────────

/// All adapters the dispatcher can call, built once at startup.
pub struct Services {
    pub search: search::WebSearch,
    pub wiki: wiki::Encyclopedia,
    pub jokes: jokes::Jokes,
    pub news: news::News,
    pub video: video::VideoDownloader,
    pub spotify: spotify::Streaming,
    pub browser: browser::Opener,
}

impl Services {
    /// Construct every adapter from config.
    ///
    /// Unknown provider names fail startup; network problems never do; they
    /// surface on first use.
    pub fn build(config: &Config) -> Result<Self, String> {
        Ok(Self {
            search: search::WebSearch::build(&config.search)?,
            wiki: wiki::Encyclopedia::build(&config.encyclopedia)?,
            jokes: jokes::Jokes::build(&config.jokes)?,
            news: news::News::build(&config.news)?,
            video: video::VideoDownloader::build(&config.download)?,
            spotify: spotify::Streaming::build(&config.spotify)?,
            browser: browser::Opener::build(&config.browser)?,
        })
    }

    /// Every adapter on a `Dummy` backend with the given mode.
    pub fn dummy(mode: DummyMode) -> Self {
        Self {
            search: search::WebSearch::Dummy(mode.clone()),
            wiki: wiki::Encyclopedia::Dummy(mode.clone()),
            jokes: jokes::Jokes::Dummy(mode.clone()),
            news: news::News::Dummy(mode.clone()),
            video: video::VideoDownloader::Dummy(mode.clone()),
            spotify: spotify::Streaming::Dummy(mode.clone()),
            browser: browser::Opener::Dummy(mode),
        }
    }
}

pub(crate) fn unknown_provider(section: &str, provider: &str) -> String {
    format!("unknown {section} provider: {provider}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_from_result() {
        let found: Outcome<u8> = Ok(Some(1)).into();
        assert!(matches!(found, Outcome::Found(1)));
        let empty: Outcome<u8> = Ok(None).into();
        assert!(matches!(empty, Outcome::NotFound));
        let failed: Outcome<u8> = Err(ServiceError::Auth("expired".into())).into();
        assert!(matches!(failed, Outcome::Failed(ServiceError::Auth(_))));
    }

    #[test]
    fn dummy_mode_outcomes() {
        assert!(matches!(DummyMode::Echo.outcome(|| 1), Outcome::Found(1)));
        assert!(matches!(DummyMode::Empty.outcome(|| 1), Outcome::NotFound));
        match DummyMode::Fail("down".into()).outcome(|| 1) {
            Outcome::Failed(e) => assert!(e.to_string().contains("down")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn unknown_provider_rejected_at_build() {
        let mut cfg = Config::offline("Ada", "Jarvis", std::path::Path::new("/tmp")).unwrap();
        cfg.news.provider = "carrier-pigeon".into();
        let err = Services::build(&cfg).err().expect("build must fail");
        assert!(err.contains("carrier-pigeon"));
    }

    #[test]
    fn status_error_display() {
        let e = ServiceError::Status { code: 401, body: "bad token".into() };
        assert_eq!(e.to_string(), "HTTP 401: bad token");
    }
}
