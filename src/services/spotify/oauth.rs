//! Spotify authorization-code flow and token cache.
//!
//! The token cache is a JSON file under `work_dir`. An access token is reused
//! until 60 s before expiry, then refreshed with the stored refresh token.
//! Only when neither works does the interactive flow run: the authorize URL
//! is opened in the browser and a one-shot loopback listener on the redirect
//! URI catches the code.
//!
//! With a client secret the token endpoint is called with HTTP Basic auth;
//! without one the flow uses PKCE (S256) and sends only the client id.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::services::{ServiceError, browser};

pub const SCOPE: &str = "user-read-playback-state user-modify-playback-state";
const EXPIRY_MARGIN_SECS: u64 = 60;
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct TokenCache {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: u64,
}

impl TokenCache {
    fn is_fresh(&self, now: u64) -> bool {
        self.expires_at > now + EXPIRY_MARGIN_SECS
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
    refresh_token: Option<String>,
}

/// Client registration used by the flow.
#[derive(Debug, Clone)]
pub(crate) struct Credentials {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub accounts_base_url: String,
}

/// Holds the bearer credential for the lifetime of the session.
pub(crate) struct Authorizer {
    creds: Credentials,
    cache_path: PathBuf,
    token: Option<TokenCache>,
}

impl Authorizer {
    pub fn new(creds: Credentials, cache_path: PathBuf) -> Self {
        Self { creds, cache_path, token: None }
    }

    /// Forget the in-memory token's remaining lifetime so the next
    /// [`Authorizer::access_token`] call refreshes it.
    pub fn invalidate(&mut self) {
        if let Some(token) = self.token.as_mut() {
            token.expires_at = 0;
        }
    }

    /// Return a usable access token, refreshing or re-authorizing as needed.
    pub async fn access_token(&mut self, client: &Client) -> Result<String, ServiceError> {
        if self.creds.client_id.trim().is_empty() {
            return Err(ServiceError::Auth(
                "spotify.client_id is not configured (or set SPOTIFY_CLIENT_ID)".into(),
            ));
        }

        if self.token.is_none() {
            self.token = load_cache(&self.cache_path);
        }

        let now = now_unix();
        if let Some(token) = &self.token {
            if token.is_fresh(now) {
                return Ok(token.access_token.clone());
            }
        }

        if let Some(refresh) = self.token.as_ref().and_then(|t| t.refresh_token.clone()) {
            match refresh_token(client, &self.creds, &refresh).await {
                Ok(refreshed) => {
                    debug!("spotify: access token refreshed");
                    let merged = TokenCache {
                        access_token: refreshed.access_token,
                        refresh_token: refreshed.refresh_token.or(Some(refresh)),
                        expires_at: now_unix() + refreshed.expires_in.unwrap_or(3600),
                    };
                    return self.store(merged);
                }
                // A revoked refresh token falls through to a fresh authorization.
                Err(e) => warn!(error = %e, "spotify: token refresh failed"),
            }
        }

        let token = self.authorize(client).await?;
        self.store(token)
    }

    fn store(&mut self, token: TokenCache) -> Result<String, ServiceError> {
        if let Err(e) = save_cache(&self.cache_path, &token) {
            warn!(
                error = %e,
                path = %self.cache_path.display(),
                "spotify: failed to persist token cache"
            );
        }
        let access = token.access_token.clone();
        self.token = Some(token);
        Ok(access)
    }

    async fn authorize(&self, client: &Client) -> Result<TokenCache, ServiceError> {
        let (port, path) = parse_loopback_redirect_uri(&self.creds.redirect_uri)?;
        let listener = TcpListener::bind(("127.0.0.1", port)).await.map_err(|e| {
            ServiceError::Auth(format!("failed to bind callback server on 127.0.0.1:{port}: {e}"))
        })?;

        let state = Uuid::new_v4().to_string();
        let verifier = self.creds.client_secret.is_none().then(random_verifier);
        let challenge = verifier.as_deref().map(code_challenge_s256);
        let auth_url = build_auth_url(&self.creds, &state, challenge.as_deref())?;

        info!("spotify: authorization required");
        eprintln!("Spotify authorization required; opening your browser.");
        eprintln!("If it does not open, visit: {auth_url}");
        if let Err(e) = browser::launch(&auth_url) {
            warn!(error = %e, "spotify: could not launch browser");
        }

        let callback = receive_auth_code(&listener, &state, &path);
        let code = tokio::time::timeout(CALLBACK_TIMEOUT, callback)
            .await
            .map_err(|_| {
                ServiceError::Auth("timed out waiting for the authorization callback".into())
            })??;

        let token = exchange_code(client, &self.creds, &code, verifier.as_deref()).await?;
        Ok(TokenCache {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: now_unix() + token.expires_in.unwrap_or(3600),
        })
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}

fn random_verifier() -> String {
    format!("{}{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn code_challenge_s256(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn build_auth_url(
    creds: &Credentials,
    state: &str,
    challenge: Option<&str>,
) -> Result<String, ServiceError> {
    let mut url = Url::parse(&format!("{}/authorize", creds.accounts_base_url))
        .map_err(|e| ServiceError::Auth(format!("invalid accounts URL: {e}")))?;
    {
        let mut q = url.query_pairs_mut();
        q.append_pair("client_id", &creds.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &creds.redirect_uri)
            .append_pair("scope", SCOPE)
            .append_pair("state", state);
        if let Some(challenge) = challenge {
            q.append_pair("code_challenge_method", "S256")
                .append_pair("code_challenge", challenge);
        }
    }
    Ok(url.into())
}

pub(crate) fn parse_loopback_redirect_uri(uri: &str) -> Result<(u16, String), ServiceError> {
    let parsed = Url::parse(uri)
        .map_err(|e| ServiceError::Auth(format!("invalid redirect URI: {e}")))?;
    if parsed.scheme() != "http" {
        return Err(ServiceError::Auth("redirect URI must use http loopback".into()));
    }
    let host = parsed.host_str().unwrap_or_default();
    if host != "127.0.0.1" && host != "localhost" {
        return Err(ServiceError::Auth("redirect URI host must be 127.0.0.1 or localhost".into()));
    }
    let port = parsed
        .port_or_known_default()
        .ok_or_else(|| ServiceError::Auth("redirect URI must include port".into()))?;
    let path = if parsed.path().is_empty() { "/".to_string() } else { parsed.path().to_string() };
    Ok((port, path))
}

async fn write_http_ok(stream: &mut TcpStream, body: &str) {
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        debug!(error = %e, "spotify: failed writing callback response");
    }
}

/// Accept connections until one arrives on `expected_path`, then validate it.
async fn receive_auth_code(
    listener: &TcpListener,
    expected_state: &str,
    expected_path: &str,
) -> Result<String, ServiceError> {
    loop {
        let (mut stream, _) = listener
            .accept()
            .await
            .map_err(|e| ServiceError::Auth(format!("failed accepting callback connection: {e}")))?;

        let mut buf = vec![0_u8; 8192];
        let n = stream
            .read(&mut buf)
            .await
            .map_err(|e| ServiceError::Auth(format!("read callback request failed: {e}")))?;
        let raw = String::from_utf8_lossy(&buf[..n]);

        match parse_callback(&raw, expected_state, expected_path) {
            // Browsers also ask for /favicon.ico and the like.
            Callback::OtherPath => {
                write_http_ok(&mut stream, "").await;
                continue;
            }
            Callback::Code(code) => {
                write_http_ok(
                    &mut stream,
                    "<html><body><h1>Spotify connected</h1><p>You can close this tab and return to the terminal.</p></body></html>",
                )
                .await;
                return Ok(code);
            }
            Callback::Rejected(reason) => {
                write_http_ok(
                    &mut stream,
                    "<html><body><h1>Authorization failed</h1><p>Return to the terminal.</p></body></html>",
                )
                .await;
                return Err(ServiceError::Auth(reason));
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Callback {
    Code(String),
    OtherPath,
    Rejected(String),
}

fn parse_callback(raw: &str, expected_state: &str, expected_path: &str) -> Callback {
    let Some(target) = raw.lines().next().and_then(|l| l.split_whitespace().nth(1)) else {
        return Callback::Rejected("invalid callback request line".into());
    };
    let Ok(parsed) = Url::parse(&format!("http://127.0.0.1{target}")) else {
        return Callback::Rejected("failed to parse callback URI".into());
    };
    if parsed.path() != expected_path {
        return Callback::OtherPath;
    }

    let mut code = None;
    let mut state = None;
    let mut err = None;
    for (k, v) in parsed.query_pairs() {
        match k.as_ref() {
            "code" => code = Some(v.into_owned()),
            "state" => state = Some(v.into_owned()),
            "error" => err = Some(v.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = err {
        return Callback::Rejected(format!("authorization denied: {error}"));
    }
    if state.as_deref() != Some(expected_state) {
        return Callback::Rejected("callback state mismatch".into());
    }
    match code {
        Some(code) => Callback::Code(code),
        None => Callback::Rejected("callback did not include code".into()),
    }
}

async fn exchange_code(
    client: &Client,
    creds: &Credentials,
    code: &str,
    code_verifier: Option<&str>,
) -> Result<TokenResponse, ServiceError> {
    let mut form: Vec<(&str, String)> = vec![
        ("grant_type", "authorization_code".to_string()),
        ("code", code.to_string()),
        ("redirect_uri", creds.redirect_uri.clone()),
    ];
    if let Some(verifier) = code_verifier {
        form.push(("code_verifier", verifier.to_string()));
    }
    token_request(client, creds, form).await
}

async fn refresh_token(
    client: &Client,
    creds: &Credentials,
    refresh_token: &str,
) -> Result<TokenResponse, ServiceError> {
    let form: Vec<(&str, String)> = vec![
        ("grant_type", "refresh_token".to_string()),
        ("refresh_token", refresh_token.to_string()),
    ];
    token_request(client, creds, form).await
}

async fn token_request(
    client: &Client,
    creds: &Credentials,
    mut form: Vec<(&str, String)>,
) -> Result<TokenResponse, ServiceError> {
    let url = format!("{}/api/token", creds.accounts_base_url);
    let mut req = client.post(url);
    match &creds.client_secret {
        Some(secret) => req = req.basic_auth(&creds.client_id, Some(secret)),
        None => form.push(("client_id", creds.client_id.clone())),
    }

    let res = req.form(&form).send().await?;
    if !res.status().is_success() {
        let code = res.status().as_u16();
        let body = res.text().await.unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(ServiceError::Auth(format!("token endpoint returned {code}: {body}")));
    }
    res.json::<TokenResponse>()
        .await
        .map_err(|e| ServiceError::Decode(format!("token parse failed: {e}")))
}

pub(crate) fn load_cache(path: &Path) -> Option<TokenCache> {
    let bytes = fs::read(path).ok()?;
    serde_json::from_slice::<TokenCache>(&bytes).ok()
}

pub(crate) fn save_cache(path: &Path, cache: &TokenCache) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("failed creating token dir: {e}"))?;
    }
    let data =
        serde_json::to_vec_pretty(cache).map_err(|e| format!("token serialize failed: {e}"))?;
    fs::write(path, data).map_err(|e| format!("token write failed: {e}"))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .map_err(|e| format!("token chmod failed: {e}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(secret: Option<&str>) -> Credentials {
        Credentials {
            client_id: "cid".into(),
            client_secret: secret.map(str::to_string),
            redirect_uri: "http://127.0.0.1:8888/callback".into(),
            accounts_base_url: "https://accounts.spotify.com".into(),
        }
    }

    #[test]
    fn loopback_redirect_parsed() {
        let (port, path) = parse_loopback_redirect_uri("http://localhost:8888/callback").unwrap();
        assert_eq!(port, 8888);
        assert_eq!(path, "/callback");
    }

    #[test]
    fn non_loopback_redirect_rejected() {
        assert!(parse_loopback_redirect_uri("https://example.com/callback").is_err());
        assert!(parse_loopback_redirect_uri("http://example.com:8888/callback").is_err());
    }

    #[test]
    fn auth_url_carries_scope_and_pkce_only_without_secret() {
        let with_secret = build_auth_url(&creds(Some("s")), "st", None).unwrap();
        assert!(with_secret.starts_with("https://accounts.spotify.com/authorize?"));
        assert!(with_secret.contains("scope=user-read-playback-state+user-modify-playback-state"));
        assert!(with_secret.contains("state=st"));
        assert!(!with_secret.contains("code_challenge"));

        let pkce = build_auth_url(&creds(None), "st", Some("abc")).unwrap();
        assert!(pkce.contains("code_challenge=abc"));
        assert!(pkce.contains("code_challenge_method=S256"));
    }

    #[test]
    fn challenge_is_unpadded_sha256() {
        // RFC 7636 appendix B test vector.
        assert_eq!(
            code_challenge_s256("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn callback_accepts_matching_state() {
        let raw = "GET /callback?code=xyz&state=s1 HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n";
        assert_eq!(parse_callback(raw, "s1", "/callback"), Callback::Code("xyz".into()));
    }

    #[test]
    fn callback_rejects_state_mismatch_and_denial() {
        let raw = "GET /callback?code=xyz&state=other HTTP/1.1\r\n\r\n";
        assert!(matches!(parse_callback(raw, "s1", "/callback"), Callback::Rejected(_)));
        let denied = "GET /callback?error=access_denied&state=s1 HTTP/1.1\r\n\r\n";
        match parse_callback(denied, "s1", "/callback") {
            Callback::Rejected(msg) => assert!(msg.contains("access_denied")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn callback_ignores_other_paths() {
        let raw = "GET /favicon.ico HTTP/1.1\r\n\r\n";
        assert_eq!(parse_callback(raw, "s1", "/callback"), Callback::OtherPath);
    }

    #[test]
    fn token_cache_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("token.json");
        let token = TokenCache {
            access_token: "a".into(),
            refresh_token: Some("r".into()),
            expires_at: 42,
        };
        save_cache(&path, &token).unwrap();
        assert_eq!(load_cache(&path), Some(token));
    }

    #[test]
    fn freshness_respects_margin() {
        let token = TokenCache { access_token: "a".into(), refresh_token: None, expires_at: 1_000 };
        assert!(token.is_fresh(900));
        assert!(!token.is_fresh(950));
    }

    #[tokio::test]
    async fn fresh_cached_token_is_reused_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        let token = TokenCache {
            access_token: "cached".into(),
            refresh_token: None,
            expires_at: now_unix() + 3600,
        };
        save_cache(&path, &token).unwrap();

        let mut auth = Authorizer::new(creds(Some("s")), path);
        let client = Client::new();
        assert_eq!(auth.access_token(&client).await.unwrap(), "cached");
        // Second call hits the in-memory copy.
        assert_eq!(auth.access_token(&client).await.unwrap(), "cached");
    }

    #[tokio::test]
    async fn missing_client_id_is_auth_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = creds(None);
        c.client_id = String::new();
        let mut auth = Authorizer::new(c, dir.path().join("token.json"));
        assert!(matches!(
            auth.access_token(&Client::new()).await,
            Err(ServiceError::Auth(_))
        ));
    }
}
