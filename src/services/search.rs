//! Web search adapter: first organic result for a free-text query.
//!
//! The real backend scrapes DuckDuckGo's HTML endpoint (no API key needed)
//! and returns the first `result__a` link. DuckDuckGo wraps outbound links in
//! `//duckduckgo.com/l/?uddg=<target>`; the target is unwrapped here. Ad
//! links never carry `uddg` and are skipped.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::{Client, Url};
use tracing::debug;

use crate::config::SearchConfig;

use super::{DummyMode, Outcome, ServiceError, build_http_client, check_status, unknown_provider};

static RESULT_ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a\b[^>]*\bclass="[^"]*\bresult__a\b[^"]*"[^>]*>(?s)(.*?)</a>"#)
        .expect("result anchor regex is valid")
});
static HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bhref="([^"]+)""#).expect("href regex is valid"));
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag regex is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
}

pub enum WebSearch {
    DuckDuckGo { client: Client, endpoint: String },
    Dummy(DummyMode),
}

impl WebSearch {
    pub fn build(config: &SearchConfig) -> Result<Self, String> {
        match config.provider.as_str() {
            "duckduckgo" => Ok(WebSearch::DuckDuckGo {
                client: build_http_client(config.timeout_seconds).map_err(|e| e.to_string())?,
                endpoint: config.api_base_url.clone(),
            }),
            "dummy" => Ok(WebSearch::Dummy(DummyMode::Echo)),
            other => Err(unknown_provider("search", other)),
        }
    }

    /// Return the first result for `query`. An empty query finds nothing.
    pub async fn first_result(&self, query: &str) -> Outcome<SearchHit> {
        if query.trim().is_empty() {
            return Outcome::NotFound;
        }
        match self {
            WebSearch::DuckDuckGo { client, endpoint } => {
                fetch_first(client, endpoint, query).await.into()
            }
            WebSearch::Dummy(mode) => mode.outcome(|| SearchHit {
                url: format!("https://example.com/search?q={}", query.replace(' ', "+")),
                title: query.to_string(),
            }),
        }
    }
}

async fn fetch_first(
    client: &Client,
    endpoint: &str,
    query: &str,
) -> Result<Option<SearchHit>, ServiceError> {
    let res = client.get(endpoint).query(&[("q", query)]).send().await?;
    let html = check_status(res).await?.text().await?;
    let hit = parse_first_result(&html);
    debug!(
        query,
        title = hit.as_ref().map(|h| h.title.as_str()),
        "search: parsed result page"
    );
    Ok(hit)
}

/// Extract the first organic result from a DuckDuckGo HTML result page.
pub(crate) fn parse_first_result(html: &str) -> Option<SearchHit> {
    RESULT_ANCHOR.captures_iter(html).find_map(|caps| {
        let tag = caps.get(0)?.as_str();
        let href = HREF.captures(tag)?.get(1)?.as_str();
        let url = unwrap_redirect(&html_unescape(href))?;
        let title = html_unescape(TAG.replace_all(caps.get(1)?.as_str(), "").trim());
        Some(SearchHit { url, title })
    })
}

fn unwrap_redirect(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    let parsed = Url::parse(&absolute).ok()?;
    let is_ddg = parsed
        .host_str()
        .is_some_and(|h| h == "duckduckgo.com" || h.ends_with(".duckduckgo.com"));
    if !is_ddg {
        return Some(absolute);
    }
    parsed
        .query_pairs()
        .find(|(k, _)| k == "uddg")
        .map(|(_, v)| v.into_owned())
}

fn html_unescape(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<div class="result results_links">
  <h2 class="result__title">
    <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.rust-lang.org%2F&amp;rut=abc">Rust <b>Programming</b> Language</a>
  </h2>
</div>
<div class="result">
  <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fdoc.rust-lang.org%2Fbook%2F&amp;rut=def">The Book</a>
</div>
"#;

    #[test]
    fn parses_first_result_and_unwraps_redirect() {
        let hit = parse_first_result(PAGE).unwrap();
        assert_eq!(hit.url, "https://www.rust-lang.org/");
        assert_eq!(hit.title, "Rust Programming Language");
    }

    #[test]
    fn skips_ad_links_without_target() {
        let page = r#"
<a class="result__a" href="https://duckduckgo.com/y.js?ad_domain=shop.example&amp;ad_provider=x">Ad</a>
<a class="result__a" href="https://plain.example.org/page">Plain</a>
"#;
        let hit = parse_first_result(page).unwrap();
        assert_eq!(hit.url, "https://plain.example.org/page");
        assert_eq!(hit.title, "Plain");
    }

    #[test]
    fn empty_page_has_no_result() {
        assert!(parse_first_result("<html><body>No results.</body></html>").is_none());
    }

    #[tokio::test]
    async fn empty_query_is_not_found_without_backend_call() {
        let search = WebSearch::Dummy(DummyMode::Fail("should not be called".into()));
        assert!(matches!(search.first_result("   ").await, Outcome::NotFound));
    }

    #[tokio::test]
    async fn dummy_modes_map_to_outcomes() {
        let found = WebSearch::Dummy(DummyMode::Echo).first_result("rust").await;
        match found {
            Outcome::Found(hit) => assert!(hit.url.contains("rust")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        let empty = WebSearch::Dummy(DummyMode::Empty).first_result("rust").await;
        assert!(matches!(empty, Outcome::NotFound));
        let failed = WebSearch::Dummy(DummyMode::Fail("offline".into())).first_result("rust").await;
        assert!(matches!(failed, Outcome::Failed(_)));
    }
}
