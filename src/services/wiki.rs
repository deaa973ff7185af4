//! Encyclopedia adapter: MediaWiki Action API.
//!
//! Lookup is two round-trips: a full-text search picks the best title, then
//! the intro extract of that page is fetched. Disambiguation pages cost a
//! third request for their outgoing links, which become the suggestions.

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::EncyclopediaConfig;

use super::{DummyMode, Outcome, ServiceError, build_http_client, check_status, unknown_provider};

/// A resolved lookup. "No search hits at all" is `Outcome::NotFound`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Article {
    Summary { title: String, text: String },
    /// Title is a disambiguation page; `options` are candidate titles.
    Ambiguous { options: Vec<String> },
    /// Search returned a title but the page itself does not exist.
    MissingPage,
}

pub struct WikiClient {
    client: Client,
    endpoint: String,
    sentences: u32,
    max_options: usize,
}

pub enum Encyclopedia {
    Wikipedia(WikiClient),
    Dummy(DummyMode),
}

impl Encyclopedia {
    pub fn build(config: &EncyclopediaConfig) -> Result<Self, String> {
        match config.provider.as_str() {
            "wikipedia" => Ok(Encyclopedia::Wikipedia(WikiClient {
                client: build_http_client(config.timeout_seconds).map_err(|e| e.to_string())?,
                endpoint: config.api_base_url.clone(),
                sentences: config.sentences,
                max_options: config.max_options,
            })),
            "dummy" => Ok(Encyclopedia::Dummy(DummyMode::Echo)),
            other => Err(unknown_provider("encyclopedia", other)),
        }
    }

    pub async fn lookup(&self, query: &str) -> Outcome<Article> {
        if query.trim().is_empty() {
            return Outcome::NotFound;
        }
        match self {
            Encyclopedia::Wikipedia(w) => w.lookup(query).await.into(),
            Encyclopedia::Dummy(mode) => mode.outcome(|| Article::Summary {
                title: query.to_string(),
                text: format!("{query} is a dummy article."),
            }),
        }
    }
}

impl WikiClient {
    async fn lookup(&self, query: &str) -> Result<Option<Article>, ServiceError> {
        let Some(title) = self.search(query).await? else {
            return Ok(None);
        };
        debug!(query, %title, "wiki: search picked title");

        let page = self.page(&title).await?;
        if page.missing {
            return Ok(Some(Article::MissingPage));
        }
        if page.is_disambiguation() {
            let options = self.links(&page.title).await?;
            debug!(title = %page.title, options = options.len(), "wiki: disambiguation page");
            return Ok(Some(Article::Ambiguous { options }));
        }
        let text = page.extract.unwrap_or_default().trim().to_string();
        Ok(Some(Article::Summary { title: page.title, text }))
    }

    async fn search(&self, query: &str) -> Result<Option<String>, ServiceError> {
        let res = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", "10"),
                ("srprop", ""),
                ("format", "json"),
                ("formatversion", "2"),
            ])
            .send()
            .await?;
        let body: SearchResponse = check_status(res).await?.json().await?;
        Ok(first_title(body))
    }

    async fn page(&self, title: &str) -> Result<Page, ServiceError> {
        let sentences = self.sentences.to_string();
        let res = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("action", "query"),
                ("prop", "extracts|pageprops"),
                ("ppprop", "disambiguation"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("exsentences", sentences.as_str()),
                ("redirects", "1"),
                ("titles", title),
                ("format", "json"),
                ("formatversion", "2"),
            ])
            .send()
            .await?;
        let body: PagesResponse = check_status(res).await?.json().await?;
        body.query
            .and_then(|q| q.pages.into_iter().next())
            .ok_or_else(|| ServiceError::Decode(format!("no page entry for '{title}'")))
    }

    async fn links(&self, title: &str) -> Result<Vec<String>, ServiceError> {
        let res = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("action", "query"),
                ("prop", "links"),
                ("plnamespace", "0"),
                ("pllimit", "max"),
                ("titles", title),
                ("format", "json"),
                ("formatversion", "2"),
            ])
            .send()
            .await?;
        let body: PagesResponse = check_status(res).await?.json().await?;
        Ok(disambiguation_options(body, self.max_options))
    }
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SearchResponse {
    query: Option<SearchQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchEntry>,
}

#[derive(Debug, Deserialize)]
struct SearchEntry {
    title: String,
}

#[derive(Debug, Deserialize)]
struct PagesResponse {
    query: Option<PagesQuery>,
}

#[derive(Debug, Deserialize)]
struct PagesQuery {
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    title: String,
    #[serde(default)]
    missing: bool,
    extract: Option<String>,
    pageprops: Option<serde_json::Value>,
    #[serde(default)]
    links: Vec<Link>,
}

impl Page {
    fn is_disambiguation(&self) -> bool {
        self.pageprops
            .as_ref()
            .is_some_and(|p| p.get("disambiguation").is_some())
    }
}

#[derive(Debug, Deserialize)]
struct Link {
    title: String,
}

fn first_title(body: SearchResponse) -> Option<String> {
    body.query?.search.into_iter().next().map(|e| e.title)
}

fn disambiguation_options(body: PagesResponse, max: usize) -> Vec<String> {
    body.query
        .and_then(|q| q.pages.into_iter().next())
        .map(|p| p.links.into_iter().take(max).map(|l| l.title).collect())
        .unwrap_or_default()
}
