use crate::types::{Category, EngineConfig, EngineError, FeedPage, FetchCursor, RawRecord, Result};
use async_trait::async_trait;
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Source of raw category pages. The engine only ever talks to the upstream
/// through this trait, so tests can substitute a scripted source.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch one page of one category. `cursor` is `None` for the first page.
    async fn fetch_page(&self, category: Category, cursor: Option<&FetchCursor>) -> Result<FeedPage>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    data: Option<EnvelopeData>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    #[serde(default)]
    news_list: Vec<EnvelopeEntry>,
    #[serde(default)]
    min_news_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeEntry {
    news_obj: Option<RawRecord>,
}

/// HTTP-backed feed source. Stateless across calls apart from the cursor
/// parameter; the inner reqwest client pools connections internally.
pub struct HttpFeedClient {
    client: Client,
    config: EngineConfig,
}

impl HttpFeedClient {
    pub fn new(config: EngineConfig) -> Self {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .build()
            .expect("failed to build HTTP client");

        Self { client, config }
    }

    async fn request_page(&self, category: Category, cursor: Option<&FetchCursor>) -> Result<FeedPage> {
        let url = format!(
            "{}/search/trending_topics/{}",
            self.config.base_url,
            category.feed_slug()
        );

        let page_size = self.config.page_size.to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("category", "top_stories"),
            ("max_limit", page_size.as_str()),
            ("include_card_data", "true"),
        ];
        if let Some(cursor) = cursor {
            params.push(("news_offset", cursor.as_str()));
        }

        let response = self.client.get(&url).query(&params).send().await?;
        let status = response.status();

        if cursor.is_some() && (status == StatusCode::BAD_REQUEST || status == StatusCode::NOT_FOUND) {
            return Err(EngineError::CursorRejected);
        }
        if !status.is_success() {
            return Err(EngineError::UpstreamUnavailable(format!(
                "HTTP {} from {}",
                status, url
            )));
        }

        let envelope: Envelope = response.json().await?;
        let data = envelope
            .data
            .ok_or_else(|| EngineError::UpstreamFormat("missing data envelope".to_string()))?;

        let records: Vec<RawRecord> = data
            .news_list
            .into_iter()
            .filter_map(|entry| entry.news_obj)
            .collect();

        let next_cursor = data
            .min_news_id
            .filter(|token| !token.is_empty())
            .map(FetchCursor::new);

        // An empty page or a missing continuation id both mean the category
        // has nothing further to serve.
        let exhausted = records.is_empty() || next_cursor.is_none();

        debug!(
            "fetched page for {}: {} records, exhausted={}",
            category,
            records.len(),
            exhausted
        );

        Ok(FeedPage {
            records,
            next_cursor,
            exhausted,
        })
    }
}

#[async_trait]
impl FeedSource for HttpFeedClient {
    async fn fetch_page(&self, category: Category, cursor: Option<&FetchCursor>) -> Result<FeedPage> {
        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_millis(self.config.retry_delay_ms),
            initial_interval: Duration::from_millis(self.config.retry_delay_ms),
            max_interval: Duration::from_millis(self.config.retry_delay_ms * 16),
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        };

        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match self.request_page(category, cursor).await {
                Ok(page) => return Ok(page),
                Err(err) => {
                    // Only transport-level failures are worth retrying; a
                    // rejected cursor or a garbled body will not improve.
                    let retryable = matches!(err, EngineError::UpstreamUnavailable(_));
                    last_error = Some(err);

                    if !retryable {
                        break;
                    }
                    if attempt < self.config.max_retries {
                        if let Some(delay) = backoff.next_backoff() {
                            warn!(
                                "attempt {} for {} failed, retrying in {:?}",
                                attempt + 1,
                                category,
                                delay
                            );
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            EngineError::UpstreamUnavailable("exhausted retry budget".to_string())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_parses_upstream_shape() {
        let body = r#"{
            "data": {
                "news_list": [
                    {"news_obj": {"hash_id": "abc", "title": "t", "shortened_url": "u", "content": "c"}},
                    {"other_card": {}}
                ],
                "min_news_id": "abc-123"
            }
        }"#;

        let envelope: Envelope = serde_json::from_str(body).expect("envelope should parse");
        let data = envelope.data.expect("data present");
        assert_eq!(data.news_list.len(), 2);
        assert_eq!(data.min_news_id.as_deref(), Some("abc-123"));

        let records: Vec<RawRecord> = data.news_list.into_iter().filter_map(|e| e.news_obj).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].hash_id.as_deref(), Some("abc"));
    }

    #[test]
    fn envelope_tolerates_missing_fields() {
        let envelope: Envelope = serde_json::from_str(r#"{"data": {}}"#).expect("parses");
        let data = envelope.data.expect("data present");
        assert!(data.news_list.is_empty());
        assert!(data.min_news_id.is_none());
    }
}
