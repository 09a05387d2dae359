use crate::fetcher::FeedSource;
use crate::pager::Pager;
use crate::progress::ProgressPublisher;
use crate::types::{Category, EngineConfig, NewsItem, Result};
use futures::future::join_all;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

/// Computes the `all` pseudo-category by fanning out one pager per real
/// category and concatenating the results in enumeration order.
pub struct NewsAggregator {
    source: Arc<dyn FeedSource>,
    config: EngineConfig,
    progress: Arc<ProgressPublisher>,
    cancel: Arc<AtomicBool>,
}

impl NewsAggregator {
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

    /// Fetch up to `limit` items spread across every real category.
    ///
    /// Each category runs as its own task with private state; the join is the
    /// only synchronization point. A category that fails outright is logged
    /// and skipped, so single-feed outages never sink the aggregate.
    pub async fn fetch_all(&self, limit: usize) -> Result<Vec<NewsItem>> {
        let limit = limit.clamp(1, self.config.max_limit.max(1));
        let targets = split_limit(limit, Category::REAL.len());

        let mut handles = Vec::with_capacity(Category::REAL.len());
        for (category, target) in Category::REAL.into_iter().zip(targets) {
            if target == 0 {
                continue;
            }
            let pager = Pager::new(
                Arc::clone(&self.source),
                self.config.clone(),
                Arc::clone(&self.progress),
                Arc::clone(&self.cancel),
            );
            handles.push(tokio::spawn(async move {
                (category, pager.fetch(category, target).await)
            }));
        }

        // join_all preserves spawn order, which is enumeration order, so the
        // merge needs no sorting.
        let mut merged = Vec::with_capacity(limit);
        let mut failed_categories = 0usize;
        for joined in join_all(handles).await {
            let (category, outcome) = match joined {
                Ok(pair) => pair,
                Err(err) => {
                    warn!("category task failed to join: {}", err);
                    failed_categories += 1;
                    continue;
                }
            };
            match outcome {
                Ok(items) => merged.extend(items),
                Err(err) => {
                    warn!("skipping {} in aggregate: {}", category, err);
                    failed_categories += 1;
                }
            }
        }

        info!(
            "aggregated {} items across {} categories ({} unavailable)",
            merged.len(),
            Category::REAL.len(),
            failed_categories
        );
        Ok(merged)
    }
}

/// Even split of `limit` across `buckets`, remainder going to the first
/// buckets in order. Totals always sum to `limit`.
pub(crate) fn split_limit(limit: usize, buckets: usize) -> Vec<usize> {
    if buckets == 0 {
        return Vec::new();
    }
    let base = limit / buckets;
    let remainder = limit % buckets;
    (0..buckets)
        .map(|index| base + usize::from(index < remainder))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_is_exact_when_divisible() {
        assert_eq!(split_limit(120, 12), vec![10; 12]);
    }

    #[test]
    fn remainder_goes_to_the_first_buckets() {
        let targets = split_limit(100, 12);
        assert_eq!(targets[..4], [9, 9, 9, 9]);
        assert_eq!(targets[4..], [8, 8, 8, 8, 8, 8, 8, 8]);
        assert_eq!(targets.iter().sum::<usize>(), 100);
    }

    #[test]
    fn tiny_limits_leave_trailing_buckets_empty() {
        let targets = split_limit(5, 12);
        assert_eq!(targets.iter().sum::<usize>(), 5);
        assert_eq!(targets.iter().filter(|&&t| t == 1).count(), 5);
        assert_eq!(targets.iter().filter(|&&t| t == 0).count(), 7);
    }

    #[test]
    fn zero_buckets_is_empty() {
        assert!(split_limit(10, 0).is_empty());
    }
}
