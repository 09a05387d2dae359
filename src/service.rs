use crate::aggregator::NewsAggregator;
use crate::fetcher::{FeedSource, HttpFeedClient};
use crate::normalizer;
use crate::pager::Pager;
use crate::progress::ProgressBroker;
use crate::types::{Category, EngineConfig, EngineError, NewsItem, ProgressEvent, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;
use uuid::Uuid;

/// Boundary facade the transport layer talks to.
///
/// Routing: `all` goes to the aggregator, every other known category to a
/// pager, unknown names are rejected. Each call owns an isolated session.
pub struct NewsService {
    source: Arc<dyn FeedSource>,
    config: EngineConfig,
    progress: Arc<ProgressBroker>,
}

/// Identity plus cancellation for one fetch session. Cloneable so the
/// transport layer can keep one half and hand the other to the fetch call.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    cancel: Arc<AtomicBool>,
}

impl SessionHandle {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Ask the session to stop. Takes effect at the next page boundary.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }
}

impl NewsService {
    pub fn new(config: EngineConfig) -> Self {
        let source = Arc::new(HttpFeedClient::new(config.clone()));
        Self::with_source(config, source)
    }

    /// Build the service over any feed source. This is the seam tests use to
    /// swap in scripted upstreams.
    pub fn with_source(config: EngineConfig, source: Arc<dyn FeedSource>) -> Self {
        Self {
            source,
            config,
            progress: Arc::new(ProgressBroker::new()),
        }
    }

    /// Create a session up front so progress subscribers can attach before
    /// the fetch starts.
    pub fn open_session(&self) -> SessionHandle {
        let session = SessionHandle::new();
        self.progress.register(session.id);
        session
    }

    /// The fixed category set, `all` first, stable across calls.
    pub fn list_categories(&self) -> Vec<&'static str> {
        Category::NAMES.to_vec()
    }

    /// Attach to a session's progress stream. `None` once the session has
    /// finished or was never opened.
    pub fn subscribe_progress(&self, session_id: Uuid) -> Option<BroadcastStream<ProgressEvent>> {
        self.progress.subscribe(session_id)
    }

    /// Fetch news for `category`, creating a throwaway session.
    pub async fn get_news(&self, category: &str, limit: Option<usize>) -> Result<NewsResponse> {
        let session = self.open_session();
        self.get_news_session(category, limit, &session).await
    }

    /// Fetch news within a caller-managed session, so progress subscription
    /// and cancellation can be wired up by the transport layer.
    pub async fn get_news_session(
        &self,
        category: &str,
        limit: Option<usize>,
        session: &SessionHandle,
    ) -> Result<NewsResponse> {
        let requested = category.trim().to_lowercase();
        let limit = limit
            .unwrap_or(self.config.default_limit)
            .clamp(1, self.config.max_limit.max(1));

        // The publisher opens before validation so that even a rejected
        // request ends its session with a terminal event.
        let publisher = self.progress.open_session(session.id, requested.clone(), limit);

        let category: Category = match requested.parse() {
            Ok(category) => category,
            Err(err) => {
                publisher.finish(0);
                return Err(err);
            }
        };
        info!(
            "session {} fetching up to {} items from {}",
            session.id, limit, category
        );

        let outcome = if category.is_virtual() {
            NewsAggregator::new(
                Arc::clone(&self.source),
                self.config.clone(),
                Arc::clone(&publisher),
                Arc::clone(&session.cancel),
            )
            .fetch_all(limit)
            .await
        } else {
            Pager::new(
                Arc::clone(&self.source),
                self.config.clone(),
                Arc::clone(&publisher),
                Arc::clone(&session.cancel),
            )
            .fetch(category, limit)
            .await
        };

        match outcome {
            Ok(items) => {
                publisher.finish(items.len());
                Ok(NewsResponse::new(category, items))
            }
            Err(err) => {
                publisher.finish(0);
                Err(err)
            }
        }
    }
}

/// Successful response body, in the exact wire schema callers consume.
#[derive(Debug, Serialize)]
pub struct NewsResponse {
    pub success: bool,
    pub category: Category,
    pub data: Vec<Article>,
}

impl NewsResponse {
    pub fn new(category: Category, items: Vec<NewsItem>) -> Self {
        Self {
            success: true,
            category,
            data: items.into_iter().map(Article::from_item).collect(),
        }
    }
}

/// One article as serialized to callers. `date` and `time` are the
/// upstream's locale rendering (IST), empty when the timestamp is unknown.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub image_url: Option<String>,
    pub url: String,
    pub content: String,
    pub author: Option<String>,
    pub date: String,
    pub time: String,
    pub read_more_url: Option<String>,
}

impl Article {
    fn from_item(item: NewsItem) -> Self {
        let (date, time) = match item.published_at {
            Some(instant) => format_locale(instant),
            None => (String::new(), String::new()),
        };
        Self {
            id: item.id,
            title: item.title,
            image_url: item.image_url,
            url: item.url,
            content: item.content,
            author: item.author,
            date,
            time,
            read_more_url: item.read_more_url,
        }
    }
}

fn format_locale(instant: DateTime<Utc>) -> (String, String) {
    let local = instant.with_timezone(&normalizer::ist());
    (
        local.format("%A, %d %B, %Y").to_string(),
        local.format("%I:%M %p").to_string().to_lowercase(),
    )
}

/// Failure body handed to callers when a session fails outright.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: &'static str,
}

impl From<&EngineError> for ErrorResponse {
    fn from(err: &EngineError) -> Self {
        Self {
            error: err.to_string(),
            status: "error",
        }
    }
}
