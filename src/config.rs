//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` (or `$DESKMATE_CONFIG`) relative to the current
//! working directory, then applies environment overrides. Secrets
//! (`NEWS_API_KEY`, `SPOTIFY_CLIENT_SECRET`) are only ever taken from the
//! environment, never from TOML.
//!
//! The resolved [`Config`] is immutable and handed to the dispatcher at
//! construction time.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;
use crate::logger;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Web search adapter configuration (`[search]`).
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// `"duckduckgo"` or `"dummy"`.
    pub provider: String,
    pub api_base_url: String,
    pub timeout_seconds: u64,
}

/// Encyclopedia adapter configuration (`[encyclopedia]`).
#[derive(Debug, Clone)]
pub struct EncyclopediaConfig {
    /// `"wikipedia"` or `"dummy"`.
    pub provider: String,
    /// MediaWiki Action API endpoint.
    pub api_base_url: String,
    /// Sentences of the page intro to return.
    pub sentences: u32,
    /// Alternatives listed when a title is ambiguous.
    pub max_options: usize,
    pub timeout_seconds: u64,
}

/// Joke adapter configuration (`[jokes]`).
#[derive(Debug, Clone)]
pub struct JokesConfig {
    /// `"builtin"`, `"jokeapi"` or `"dummy"`.
    pub provider: String,
    pub api_base_url: String,
    pub timeout_seconds: u64,
}

/// News adapter configuration (`[news]`).
#[derive(Debug, Clone)]
pub struct NewsConfig {
    /// `"newsapi"` or `"dummy"`.
    pub provider: String,
    pub api_base_url: String,
    /// Two-letter language filter passed to the headline endpoint.
    pub language: String,
    pub max_articles: usize,
    pub timeout_seconds: u64,
    /// From `NEWS_API_KEY`. `None` makes every news request fail with an
    /// auth error instead of aborting startup.
    pub api_key: Option<String>,
}

/// Music streaming adapter configuration (`[spotify]`).
#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    /// `"spotify"` or `"dummy"`.
    pub provider: String,
    pub client_id: String,
    /// From `SPOTIFY_CLIENT_SECRET`. Without it the PKCE flow is used.
    pub client_secret: Option<String>,
    /// Loopback URI registered with the Spotify app.
    pub redirect_uri: String,
    pub api_base_url: String,
    pub accounts_base_url: String,
    pub timeout_seconds: u64,
    /// Token cache file (always under `work_dir`).
    pub token_cache: PathBuf,
}

/// Video download adapter configuration (`[download]`).
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// `"yt-dlp"` or `"dummy"`.
    pub provider: String,
    /// Downloader executable, looked up on `PATH` when not absolute.
    pub program: String,
    pub output_dir: PathBuf,
}

/// Resource opener configuration (`[browser]`).
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// `"system"` or `"dummy"`.
    pub provider: String,
}

/// Fully-resolved assistant configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub user_name: String,
    pub assistant_name: String,
    /// Working directory for persistent data (already expanded, no `~`).
    pub work_dir: PathBuf,
    pub log_level: String,
    /// Append logs here instead of stderr.
    pub log_file: Option<PathBuf>,
    pub search: SearchConfig,
    pub encyclopedia: EncyclopediaConfig,
    pub jokes: JokesConfig,
    pub news: NewsConfig,
    pub spotify: SpotifyConfig,
    pub download: DownloadConfig,
    pub browser: BrowserConfig,
}

/// Values taken from the environment. Tests build this directly instead of
/// mutating process env vars.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub work_dir: Option<String>,
    pub log_level: Option<String>,
    pub news_api_key: Option<String>,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub spotify_redirect_uri: Option<String>,
}

impl Overrides {
    pub fn from_env() -> Self {
        Self {
            work_dir: env::var("DESKMATE_WORK_DIR").ok(),
            log_level: env::var("DESKMATE_LOG_LEVEL").ok(),
            news_api_key: non_empty_var("NEWS_API_KEY"),
            spotify_client_id: non_empty_var("SPOTIFY_CLIENT_ID"),
            spotify_client_secret: non_empty_var("SPOTIFY_CLIENT_SECRET"),
            spotify_redirect_uri: non_empty_var("SPOTIFY_REDIRECT_URI"),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

// ── raw TOML shape ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawConfig {
    assistant: RawAssistant,
    #[serde(default)]
    search: RawSearch,
    #[serde(default)]
    encyclopedia: RawEncyclopedia,
    #[serde(default)]
    jokes: RawJokes,
    #[serde(default)]
    news: RawNews,
    #[serde(default)]
    spotify: RawSpotify,
    #[serde(default)]
    download: RawDownload,
    #[serde(default)]
    browser: RawBrowser,
}

#[derive(Deserialize)]
struct RawAssistant {
    user_name: String,
    assistant_name: String,
    #[serde(default = "default_work_dir")]
    work_dir: String,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default)]
    log_file: Option<String>,
}

#[derive(Deserialize)]
#[serde(default)]
struct RawSearch {
    provider: String,
    api_base_url: String,
    timeout_seconds: u64,
}

impl Default for RawSearch {
    fn default() -> Self {
        Self {
            provider: "duckduckgo".into(),
            api_base_url: "https://html.duckduckgo.com/html/".into(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct RawEncyclopedia {
    provider: String,
    api_base_url: String,
    sentences: u32,
    max_options: usize,
    timeout_seconds: u64,
}

impl Default for RawEncyclopedia {
    fn default() -> Self {
        Self {
            provider: "wikipedia".into(),
            api_base_url: "https://en.wikipedia.org/w/api.php".into(),
            sentences: 2,
            max_options: 5,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct RawJokes {
    provider: String,
    api_base_url: String,
    timeout_seconds: u64,
}

impl Default for RawJokes {
    fn default() -> Self {
        Self {
            provider: "builtin".into(),
            api_base_url: "https://v2.jokeapi.dev/joke/Programming".into(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct RawNews {
    provider: String,
    api_base_url: String,
    language: String,
    max_articles: usize,
    timeout_seconds: u64,
}

impl Default for RawNews {
    fn default() -> Self {
        Self {
            provider: "newsapi".into(),
            api_base_url: "https://newsapi.org/v2/top-headlines".into(),
            language: "en".into(),
            max_articles: 5,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct RawSpotify {
    provider: String,
    client_id: String,
    redirect_uri: String,
    api_base_url: String,
    accounts_base_url: String,
    timeout_seconds: u64,
    token_cache: String,
}

impl Default for RawSpotify {
    fn default() -> Self {
        Self {
            provider: "spotify".into(),
            client_id: String::new(),
            redirect_uri: "http://127.0.0.1:8888/callback".into(),
            api_base_url: "https://api.spotify.com/v1".into(),
            accounts_base_url: "https://accounts.spotify.com".into(),
            timeout_seconds: default_timeout_seconds(),
            token_cache: "spotify_token.json".into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct RawDownload {
    provider: String,
    program: String,
    output_dir: String,
}

impl Default for RawDownload {
    fn default() -> Self {
        Self {
            provider: "yt-dlp".into(),
            program: "yt-dlp".into(),
            output_dir: ".".into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct RawBrowser {
    provider: String,
}

impl Default for RawBrowser {
    fn default() -> Self {
        Self { provider: "system".into() }
    }
}

fn default_work_dir() -> String {
    "~/.deskmate".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_timeout_seconds() -> u64 {
    15
}

// ── loading ───────────────────────────────────────────────────────────────────

/// Load config from `$DESKMATE_CONFIG` (default `config/default.toml`), then
/// apply env-var overrides.
pub fn load() -> Result<Config, AppError> {
    let path = env::var("DESKMATE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_from(Path::new(&path), &Overrides::from_env())
}

/// Load from an explicit path and overrides.
pub fn load_from(path: &Path, overrides: &Overrides) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
    parse(&raw, overrides)
        .map_err(|e| AppError::Config(format!("{} in {}", e, path.display())))
}

/// Resolve a TOML document into a [`Config`].
pub fn parse(toml_text: &str, overrides: &Overrides) -> Result<Config, String> {
    let parsed: RawConfig = toml::from_str(toml_text).map_err(|e| format!("parse error: {e}"))?;
    resolve(parsed, overrides)
}

fn resolve(parsed: RawConfig, overrides: &Overrides) -> Result<Config, String> {
    let a = parsed.assistant;
    let user_name = a.user_name.trim().to_string();
    let assistant_name = a.assistant_name.trim().to_string();
    if user_name.is_empty() {
        return Err("assistant.user_name must not be empty".into());
    }
    // An empty wake word would match every line.
    if assistant_name.is_empty() {
        return Err("assistant.assistant_name must not be empty".into());
    }

    let work_dir = expand_home(overrides.work_dir.as_deref().unwrap_or(&a.work_dir));
    let log_level = overrides
        .log_level
        .clone()
        .unwrap_or(a.log_level)
        .to_ascii_lowercase();
    logger::parse_level(&log_level).map_err(|e| e.to_string())?;
    let log_file = a.log_file.map(|p| resolve_under(&work_dir, &p));

    let sp = parsed.spotify;
    let spotify = SpotifyConfig {
        provider: sp.provider,
        client_id: overrides.spotify_client_id.clone().unwrap_or(sp.client_id),
        client_secret: overrides.spotify_client_secret.clone(),
        redirect_uri: overrides
            .spotify_redirect_uri
            .clone()
            .unwrap_or(sp.redirect_uri),
        api_base_url: trim_slash(sp.api_base_url),
        accounts_base_url: trim_slash(sp.accounts_base_url),
        timeout_seconds: sp.timeout_seconds,
        token_cache: resolve_under(&work_dir, &sp.token_cache),
    };

    let n = parsed.news;
    let news = NewsConfig {
        provider: n.provider,
        api_base_url: n.api_base_url,
        language: n.language,
        max_articles: n.max_articles.max(1),
        timeout_seconds: n.timeout_seconds,
        api_key: overrides.news_api_key.clone(),
    };

    let e = parsed.encyclopedia;
    let encyclopedia = EncyclopediaConfig {
        provider: e.provider,
        api_base_url: e.api_base_url,
        sentences: e.sentences.clamp(1, 10),
        max_options: e.max_options.max(1),
        timeout_seconds: e.timeout_seconds,
    };

    Ok(Config {
        user_name,
        assistant_name,
        log_level,
        log_file,
        search: SearchConfig {
            provider: parsed.search.provider,
            api_base_url: parsed.search.api_base_url,
            timeout_seconds: parsed.search.timeout_seconds,
        },
        encyclopedia,
        jokes: JokesConfig {
            provider: parsed.jokes.provider,
            api_base_url: parsed.jokes.api_base_url,
            timeout_seconds: parsed.jokes.timeout_seconds,
        },
        news,
        spotify,
        download: DownloadConfig {
            provider: parsed.download.provider,
            program: parsed.download.program,
            output_dir: expand_home(&parsed.download.output_dir),
        },
        browser: BrowserConfig {
            provider: parsed.browser.provider,
        },
        work_dir,
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

fn resolve_under(work_dir: &Path, path: &str) -> PathBuf {
    let p = expand_home(path);
    if p.is_absolute() { p } else { work_dir.join(p) }
}

fn trim_slash(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

// ── offline construction ──────────────────────────────────────────────────────────────

impl Config {
    /// Offline `Config`: every adapter on its `dummy` provider, no secrets.
    pub fn offline(
        user_name: &str,
        assistant_name: &str,
        work_dir: &Path,
    ) -> Result<Self, AppError> {
        let raw = RawConfig {
            assistant: RawAssistant {
                user_name: user_name.to_string(),
                assistant_name: assistant_name.to_string(),
                work_dir: work_dir.display().to_string(),
                log_level: default_log_level(),
                log_file: None,
            },
            search: RawSearch { provider: "dummy".into(), ..RawSearch::default() },
            encyclopedia: RawEncyclopedia {
                provider: "dummy".into(),
                ..RawEncyclopedia::default()
            },
            jokes: RawJokes { provider: "dummy".into(), ..RawJokes::default() },
            news: RawNews { provider: "dummy".into(), ..RawNews::default() },
            spotify: RawSpotify { provider: "dummy".into(), ..RawSpotify::default() },
            download: RawDownload { provider: "dummy".into(), ..RawDownload::default() },
            browser: RawBrowser { provider: "dummy".into() },
        };
        resolve(raw, &Overrides::default()).map_err(AppError::Config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL_TOML: &str = r#"
[assistant]
user_name = "Ada"
assistant_name = "Jarvis"
"#;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parse_minimal_config_fills_defaults() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), &Overrides::default()).unwrap();
        assert_eq!(cfg.user_name, "Ada");
        assert_eq!(cfg.assistant_name, "Jarvis");
        assert_eq!(cfg.log_level, "warn");
        assert_eq!(cfg.news.language, "en");
        assert_eq!(cfg.news.max_articles, 5);
        assert_eq!(cfg.encyclopedia.sentences, 2);
        assert_eq!(cfg.encyclopedia.max_options, 5);
        assert_eq!(cfg.jokes.provider, "builtin");
        assert!(cfg.news.api_key.is_none());
        assert!(cfg.spotify.client_secret.is_none());
    }

    #[test]
    fn secrets_come_from_overrides_only() {
        let toml = format!("{MINIMAL_TOML}\n[spotify]\nclient_id = \"abc\"\nclient_secret = \"ignored\"\n");
        let overrides = Overrides {
            news_api_key: Some("news-key".into()),
            spotify_client_secret: Some("shh".into()),
            ..Overrides::default()
        };
        let cfg = parse(&toml, &overrides).unwrap();
        assert_eq!(cfg.spotify.client_id, "abc");
        assert_eq!(cfg.spotify.client_secret.as_deref(), Some("shh"));
        assert_eq!(cfg.news.api_key.as_deref(), Some("news-key"));
    }

    #[test]
    fn empty_assistant_name_rejected() {
        let toml = "[assistant]\nuser_name = \"Ada\"\nassistant_name = \"  \"\n";
        let err = parse(toml, &Overrides::default()).unwrap_err();
        assert!(err.contains("assistant_name"));
    }

    #[test]
    fn invalid_log_level_rejected() {
        let overrides = Overrides {
            log_level: Some("chatty".into()),
            ..Overrides::default()
        };
        assert!(parse(MINIMAL_TOML, &overrides).is_err());
    }

    #[test]
    fn token_cache_lives_under_work_dir() {
        let overrides = Overrides {
            work_dir: Some("/tmp/deskmate-test".into()),
            ..Overrides::default()
        };
        let cfg = parse(MINIMAL_TOML, &overrides).unwrap();
        assert_eq!(cfg.work_dir, PathBuf::from("/tmp/deskmate-test"));
        assert_eq!(
            cfg.spotify.token_cache,
            PathBuf::from("/tmp/deskmate-test/spotify_token.json")
        );
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = dirs::home_dir().expect("home dir must exist in test env");
        let expanded = expand_home("~/.deskmate");
        assert!(expanded.starts_with(&home));
        assert!(expanded.ends_with(".deskmate"));
    }

    #[test]
    fn absolute_and_relative_paths_unchanged() {
        assert_eq!(expand_home("/absolute/path"), PathBuf::from("/absolute/path"));
        assert_eq!(expand_home("relative/path"), PathBuf::from("relative/path"));
    }

    #[test]
    fn missing_file_errors() {
        let result = load_from(Path::new("/nonexistent/config.toml"), &Overrides::default());
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("config error"));
    }

    #[test]
    fn missing_assistant_section_errors() {
        let f = write_toml("[news]\nlanguage = \"de\"\n");
        assert!(load_from(f.path(), &Overrides::default()).is_err());
    }

    #[test]
    fn offline_config_uses_dummy_providers() {
        let cfg = Config::offline("Ada", "Jarvis", Path::new("/tmp")).unwrap();
        assert_eq!(cfg.search.provider, "dummy");
        assert_eq!(cfg.spotify.provider, "dummy");
        assert_eq!(cfg.download.provider, "dummy");
    }
}
