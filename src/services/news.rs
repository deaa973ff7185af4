//! News adapter: NewsAPI top headlines filtered by topic and language.

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::NewsConfig;

use super::{DummyMode, Outcome, ServiceError, build_http_client, unknown_provider};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headline {
    pub title: String,
    pub description: Option<String>,
}

pub struct NewsApi {
    client: Client,
    endpoint: String,
    language: String,
    max_articles: usize,
    api_key: Option<String>,
}

pub enum News {
    NewsApi(NewsApi),
    Dummy(DummyMode),
}

impl News {
    pub fn build(config: &NewsConfig) -> Result<Self, String> {
        match config.provider.as_str() {
            "newsapi" => Ok(News::NewsApi(NewsApi {
                client: build_http_client(config.timeout_seconds).map_err(|e| e.to_string())?,
                endpoint: config.api_base_url.clone(),
                language: config.language.clone(),
                max_articles: config.max_articles,
                api_key: config.api_key.clone(),
            })),
            "dummy" => Ok(News::Dummy(DummyMode::Echo)),
            other => Err(unknown_provider("news", other)),
        }
    }

    /// Up to `max_articles` headlines about `topic`.
    pub async fn headlines(&self, topic: &str) -> Outcome<Vec<Headline>> {
        match self {
            News::NewsApi(api) => api.headlines(topic).await.into(),
            News::Dummy(mode) => mode.outcome(|| {
                vec![Headline {
                    title: format!("Dummy headline about {topic}"),
                    description: None,
                }]
            }),
        }
    }
}

impl NewsApi {
    async fn headlines(&self, topic: &str) -> Result<Option<Vec<Headline>>, ServiceError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ServiceError::Auth("NEWS_API_KEY is not set".into()))?;

        let page_size = self.max_articles.to_string();
        let res = self
            .client
            .get(&self.endpoint)
            .header("X-Api-Key", key)
            .query(&[
                ("q", topic),
                ("language", self.language.as_str()),
                ("pageSize", page_size.as_str()),
            ])
            .send()
            .await?;
        // NewsAPI reports key and quota problems as JSON bodies on 4xx responses.
        let status = res.status();
        let text = res.text().await?;
        let body: HeadlinesResponse = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(_) if !status.is_success() => {
                return Err(ServiceError::Status {
                    code: status.as_u16(),
                    body: text.chars().take(300).collect(),
                });
            }
            Err(e) => return Err(ServiceError::Decode(e.to_string())),
        };
        let headlines = into_headlines(body, self.max_articles)?;
        debug!(topic, count = headlines.len(), "news: headlines received");
        Ok((!headlines.is_empty()).then_some(headlines))
    }
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct HeadlinesResponse {
    status: String,
    #[serde(default)]
    articles: Vec<Article>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Article {
    title: Option<String>,
    description: Option<String>,
}

fn into_headlines(body: HeadlinesResponse, max: usize) -> Result<Vec<Headline>, ServiceError> {
    if body.status != "ok" {
        let code = body.code.unwrap_or_else(|| "unknown".into());
        let message = body.message.unwrap_or_default();
        return Err(match code.as_str() {
            "apiKeyInvalid" | "apiKeyMissing" | "apiKeyDisabled" | "apiKeyExhausted" => {
                ServiceError::Auth(message)
            }
            _ => ServiceError::Decode(format!("{code}: {message}")),
        });
    }
    Ok(body
        .articles
        .into_iter()
        .filter_map(|a| {
            let title = a.title.filter(|t| !t.trim().is_empty())?;
            Some(Headline {
                title,
                description: a.description.filter(|d| !d.trim().is_empty()),
            })
        })
        .take(max)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> HeadlinesResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn caps_articles_and_keeps_missing_descriptions() {
        let body = parse(
            r#"{"status":"ok","totalResults":7,"articles":[
                {"title":"A","description":"a"},{"title":"B","description":null},
                {"title":"C","description":"c"},{"title":"D","description":"d"},
                {"title":"E","description":"e"},{"title":"F","description":"f"},
                {"title":"G","description":"g"}]}"#,
        );
        let headlines = into_headlines(body, 5).unwrap();
        assert_eq!(headlines.len(), 5);
        assert_eq!(headlines[1].title, "B");
        assert!(headlines[1].description.is_none());
    }

    #[test]
    fn zero_articles_is_empty() {
        let body = parse(r#"{"status":"ok","totalResults":0,"articles":[]}"#);
        assert!(into_headlines(body, 5).unwrap().is_empty());
    }

    #[test]
    fn invalid_key_maps_to_auth_error() {
        let body = parse(r#"{"status":"error","code":"apiKeyInvalid","message":"Your API key is invalid."}"#);
        match into_headlines(body, 5) {
            Err(ServiceError::Auth(msg)) => assert!(msg.contains("invalid")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_key_fails_before_request() {
        let news = News::NewsApi(NewsApi {
            client: build_http_client(1).unwrap(),
            endpoint: "http://127.0.0.1:9/unreachable".into(),
            language: "en".into(),
            max_articles: 5,
            api_key: None,
        });
        match news.headlines("rust").await {
            Outcome::Failed(ServiceError::Auth(msg)) => assert!(msg.contains("NEWS_API_KEY")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
