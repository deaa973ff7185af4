//! Tests for the shipped config/default.toml

use std::fs;

use deskmate::config::{self, Overrides};
use deskmate::services::Services;

#[test]
fn test_default_config_file_exists() {
    assert!(fs::metadata(config::DEFAULT_CONFIG_PATH).is_ok(), "config/default.toml missing");
}

#[test]
fn test_default_config_parses() {
    let text = fs::read_to_string(config::DEFAULT_CONFIG_PATH).unwrap();
    let cfg = config::parse(&text, &Overrides::default()).unwrap();
    assert_eq!(cfg.assistant_name, "Jarvis");
    assert_eq!(cfg.news.max_articles, 5);
    assert_eq!(cfg.encyclopedia.max_options, 5);
    assert!(cfg.spotify.token_cache.ends_with("spotify_token.json"));
}

#[test]
fn test_default_config_holds_no_secrets() {
    let text = fs::read_to_string(config::DEFAULT_CONFIG_PATH).unwrap();
    assert!(!text.contains("client_secret ="), "secrets belong in the environment");
    assert!(!text.contains("api_key ="), "secrets belong in the environment");
    let cfg = config::parse(&text, &Overrides::default()).unwrap();
    assert!(cfg.news.api_key.is_none());
    assert!(cfg.spotify.client_secret.is_none());
}

#[test]
fn test_default_providers_build() {
    let text = fs::read_to_string(config::DEFAULT_CONFIG_PATH).unwrap();
    let cfg = config::parse(&text, &Overrides::default()).unwrap();
    assert!(Services::build(&cfg).is_ok());
}
