//! Headline types and the content source that supplies them.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Deserializer};
use url::Url;

use crate::config::NewsConfig;

/// A cached headline as shown in the news tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlineItem {
    pub headline: String,
    pub summary: String,
    pub link: String,
}

/// An article as returned by a content source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Article {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub url: String,
}

/// NewsAPI sends `null` for fields it has no value for.
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl From<Article> for HeadlineItem {
    fn from(article: Article) -> Self {
        Self {
            headline: article.title,
            summary: article.description.unwrap_or_default(),
            link: article.url,
        }
    }
}

/// Remote supplier of headlines. Only the refresher calls this.
pub trait ContentSource: Send + Sync {
    fn fetch_headlines(&self, region: &str) -> impl Future<Output = Result<Vec<Article>>> + Send;
}

#[derive(Debug, Deserialize)]
struct TopHeadlinesResponse {
    status: String,
    #[serde(default)]
    articles: Vec<Article>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

const TOP_HEADLINES_PATH: &str = "v2/top-headlines";

/// NewsAPI `top-headlines` client.
#[derive(Debug, Clone)]
pub struct NewsApiClient {
    http: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl NewsApiClient {
    /// Builds a client whose requests time out after `timeout`.
    pub fn new(base_url: &str, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url)
            .with_context(|| format!("Invalid news base URL: {base_url}"))?;
        let endpoint = base
            .join(TOP_HEADLINES_PATH)
            .with_context(|| format!("Invalid news base URL: {base_url}"))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("newschat/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            endpoint,
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &NewsConfig) -> Result<Self> {
        let api_key = config
            .resolved_api_key()
            .ok_or_else(|| anyhow!("news.api_key or NEWS_API_KEY is required"))?;
        Self::new(&config.base_url, api_key, config.request_timeout())
    }
}

impl ContentSource for NewsApiClient {
    async fn fetch_headlines(&self, region: &str) -> Result<Vec<Article>> {
        let response = self
            .http
            .get(self.endpoint.clone())
            .query(&[("country", region), ("apiKey", self.api_key.as_str())])
            .send()
            .await
            .context("News request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("News request failed with status {status}");
        }

        let payload: TopHeadlinesResponse = response
            .json()
            .await
            .context("Failed to decode news response")?;

        if payload.status != "ok" {
            let code = payload.code.as_deref().unwrap_or("unknown");
            let message = payload.message.as_deref().unwrap_or("no message");
            bail!(
                "News source reported status '{}' ({code}): {message}",
                payload.status
            );
        }

        Ok(payload.articles)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer) -> NewsApiClient {
        NewsApiClient::new(&server.uri(), "test-key", Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn test_article_without_description_maps_to_empty_summary() {
        let item = HeadlineItem::from(Article {
            title: "Title".to_string(),
            description: None,
            url: "https://example.com".to_string(),
        });
        assert_eq!(item.headline, "Title");
        assert_eq!(item.summary, "");
        assert_eq!(item.link, "https://example.com");
    }

    #[test]
    fn test_article_null_fields_decode_as_empty() {
        let article: Article =
            serde_json::from_value(json!({"title": null, "description": null, "url": null}))
                .unwrap();
        assert_eq!(article.title, "");
        assert_eq!(article.description, None);
        assert_eq!(article.url, "");
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(NewsApiClient::new("not a url", "key", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_fetch_returns_articles_in_source_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/top-headlines"))
            .and(query_param("country", "us"))
            .and(query_param("apiKey", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "totalResults": 2,
                "articles": [
                    {"title": "First", "description": "one", "url": "https://a.example"},
                    {"title": "Second", "description": null, "url": "https://b.example"}
                ]
            })))
            .mount(&server)
            .await;

        let articles = client(&server).fetch_headlines("us").await.unwrap();

        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "First");
        assert_eq!(articles[1].title, "Second");
        assert_eq!(articles[1].description, None);
    }

    #[tokio::test]
    async fn test_fetch_fails_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client(&server).fetch_headlines("us").await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_fetch_fails_on_source_reported_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "error",
                "code": "apiKeyInvalid",
                "message": "Your API key is invalid."
            })))
            .mount(&server)
            .await;

        let err = client(&server).fetch_headlines("us").await.unwrap_err();
        assert!(err.to_string().contains("apiKeyInvalid"));
    }

    #[tokio::test]
    async fn test_fetch_fails_on_malformed_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
            .mount(&server)
            .await;

        assert!(client(&server).fetch_headlines("us").await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "ok", "articles": []}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client =
            NewsApiClient::new(&server.uri(), "test-key", Duration::from_millis(200)).unwrap();
        assert!(client.fetch_headlines("us").await.is_err());
    }
}
