#![allow(dead_code)]

use async_trait::async_trait;
use news_aggregator::fetcher::FeedSource;
use news_aggregator::types::{
    Category, EngineConfig, EngineError, FeedPage, FetchCursor, RawRecord, Result,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Engine config tuned for tests: no real upstream, no long retries.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        default_limit: 30,
        max_limit: 100,
        timeout_seconds: 1,
        max_retries: 0,
        retry_delay_ms: 1,
        max_pages: 10,
        page_size: 10,
        base_url: "http://upstream.invalid".to_string(),
        user_agent: "news-aggregator-tests/0.1".to_string(),
    }
}

/// Build one well-formed raw record with a unique id.
pub fn record(id: &str) -> RawRecord {
    RawRecord {
        hash_id: Some(id.to_string()),
        title: Some(format!("Story {}", id)),
        image_url: Some(format!("https://img.example/{}.jpg", id)),
        shortened_url: Some(format!("https://short.example/{}", id)),
        content: Some(format!("Body of story {}", id)),
        author_name: Some("Newsroom".to_string()),
        created_at: Some(1_582_957_800_000),
        date: None,
        time: None,
        source_url: Some(format!("https://full.example/{}", id)),
    }
}

/// `count` unique records whose ids share `prefix`.
pub fn records(prefix: &str, count: usize) -> Vec<RawRecord> {
    (0..count).map(|i| record(&format!("{}-{}", prefix, i))).collect()
}

/// One scripted upstream page outcome.
pub enum ScriptedPage {
    Records(Vec<RawRecord>),
    /// Transport failure for this page.
    Unavailable,
    /// Unparsable body for this page.
    Garbled,
    /// Reject the cursor once, then serve these records on the retry path.
    RejectCursorThen(Vec<RawRecord>),
}

/// Scripted feed source. Cursors are page indices rendered as strings, which
/// keeps the pager's cursor handling honest without a real upstream.
pub struct MockFeedSource {
    pages: Mutex<HashMap<Category, Vec<ScriptedPage>>>,
    calls: AtomicUsize,
}

impl MockFeedSource {
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_pages(self, category: Category, pages: Vec<ScriptedPage>) -> Self {
        self.pages
            .lock()
            .expect("mock script poisoned")
            .insert(category, pages);
        self
    }

    /// Every real category gets `pages` pages of `per_page` unique records.
    pub fn uniform(pages: usize, per_page: usize) -> Self {
        let mut source = Self::new();
        for category in Category::REAL {
            let script = (0..pages)
                .map(|page| {
                    ScriptedPage::Records(records(
                        &format!("{}-p{}", category.as_str(), page),
                        per_page,
                    ))
                })
                .collect();
            source = source.with_pages(category, script);
        }
        source
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for MockFeedSource {
    async fn fetch_page(&self, category: Category, cursor: Option<&FetchCursor>) -> Result<FeedPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let index = cursor
            .map(|c| c.as_str().parse::<usize>().unwrap_or(0))
            .unwrap_or(0);

        let mut scripts = self.pages.lock().expect("mock script poisoned");
        let Some(pages) = scripts.get_mut(&category) else {
            return Ok(FeedPage {
                records: Vec::new(),
                next_cursor: None,
                exhausted: true,
            });
        };

        let total = pages.len();
        if index >= total {
            return Ok(FeedPage {
                records: Vec::new(),
                next_cursor: None,
                exhausted: true,
            });
        }

        match &pages[index] {
            ScriptedPage::Unavailable => {
                Err(EngineError::UpstreamUnavailable("scripted outage".to_string()))
            }
            ScriptedPage::Garbled => {
                Err(EngineError::UpstreamFormat("scripted garbage".to_string()))
            }
            ScriptedPage::RejectCursorThen(replacement) => {
                let replacement = replacement.clone();
                pages[index] = ScriptedPage::Records(replacement);
                Err(EngineError::CursorRejected)
            }
            ScriptedPage::Records(page_records) => {
                let last = index + 1 >= total;
                Ok(FeedPage {
                    records: page_records.clone(),
                    next_cursor: if last {
                        None
                    } else {
                        Some(FetchCursor::new((index + 1).to_string()))
                    },
                    exhausted: last,
                })
            }
        }
    }
}

/// Source that serves the same page forever with a fresh cursor every time.
/// Exercises the page-count safety bound.
pub struct LoopingSource {
    page: Vec<RawRecord>,
    calls: AtomicUsize,
}

impl LoopingSource {
    pub fn new(page: Vec<RawRecord>) -> Self {
        Self {
            page,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for LoopingSource {
    async fn fetch_page(&self, _category: Category, _cursor: Option<&FetchCursor>) -> Result<FeedPage> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(FeedPage {
            records: self.page.clone(),
            next_cursor: Some(FetchCursor::new((call + 1).to_string())),
            exhausted: false,
        })
    }
}
