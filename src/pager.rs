use crate::dedup::Deduplicator;
use crate::fetcher::FeedSource;
use crate::normalizer;
use crate::progress::ProgressPublisher;
use crate::types::{Category, EngineConfig, EngineError, FetchCursor, NewsItem, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Drives repeated page fetches against one real category until the requested
/// count is met, the upstream is exhausted, or the page budget runs out.
///
/// Owns nothing shared: each pager gets its own deduplicator and cursor, so
/// concurrent pagers never coordinate.
pub struct Pager {
    source: Arc<dyn FeedSource>,
    config: EngineConfig,
    progress: Arc<ProgressPublisher>,
    cancel: Arc<AtomicBool>,
}

impl Pager {
    pub fn new(
        source: Arc<dyn FeedSource>,
        config: EngineConfig,
        progress: Arc<ProgressPublisher>,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            source,
            config,
            progress,
            cancel,
        }
    }

    /// Collect up to `limit` unique items for `category`.
    ///
    /// Failures after the first successful page degrade to the partial
    /// accumulator; a failure on the very first page propagates.
    pub async fn fetch(&self, category: Category, limit: usize) -> Result<Vec<NewsItem>> {
        if category.is_virtual() {
            return Err(EngineError::InvalidCategory(category.to_string()));
        }
        let limit = limit.clamp(1, self.config.max_limit.max(1));

        let mut dedup = Deduplicator::new();
        let mut items: Vec<NewsItem> = Vec::with_capacity(limit);
        let mut cursor: Option<FetchCursor> = None;
        let mut pages_fetched: u32 = 0;

        while items.len() < limit && pages_fetched < self.config.max_pages {
            // Cancellation checkpoint: pages are not resumable mid-parse, so
            // a canceled session stops between pages, not inside one.
            if self.cancel.load(Ordering::SeqCst) {
                debug!(
                    "session canceled, returning {} partial items for {}",
                    items.len(),
                    category
                );
                break;
            }

            let page = match self.source.fetch_page(category, cursor.as_ref()).await {
                Ok(page) => page,
                Err(EngineError::CursorRejected) if cursor.is_some() => {
                    warn!("upstream rejected cursor for {}, restarting without it", category);
                    cursor = None;
                    pages_fetched += 1;
                    continue;
                }
                Err(err) => {
                    if items.is_empty() {
                        return Err(err);
                    }
                    warn!(
                        "page fetch for {} failed after {} items, keeping partial results: {}",
                        category,
                        items.len(),
                        err
                    );
                    break;
                }
            };
            pages_fetched += 1;

            for record in &page.records {
                if items.len() >= limit {
                    break;
                }
                let item = match normalizer::normalize(record) {
                    Ok(item) => item,
                    Err(err) => {
                        debug!("dropping record in {}: {}", category, err);
                        continue;
                    }
                };
                if dedup.seen(&item.id) {
                    debug!("skipping duplicate item {} in {}", item.id, category);
                    continue;
                }
                dedup.mark_seen(&item.id);
                items.push(item);
            }

            self.progress.publish(category, items.len(), limit);

            if page.exhausted {
                debug!("{} exhausted after {} pages", category, pages_fetched);
                break;
            }
            cursor = page.next_cursor;
        }

        items.truncate(limit);
        Ok(items)
    }
}
