use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical news article returned to callers.
///
/// `id` is stable across pages and unique within one response set; two items
/// with the same `id` are the same article no matter which page produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: String,
    pub title: String,
    pub image_url: Option<String>,
    pub url: String,
    pub content: String,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub read_more_url: Option<String>,
}

/// One article as the upstream wire delivers it. Everything is optional at
/// this level; the normalizer decides which fields are required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecord {
    pub hash_id: Option<String>,
    pub title: Option<String>,
    pub image_url: Option<String>,
    pub shortened_url: Option<String>,
    pub content: Option<String>,
    pub author_name: Option<String>,
    /// Publication instant in epoch milliseconds, when the upstream sends one.
    pub created_at: Option<i64>,
    /// Pre-rendered date string, e.g. "Saturday, 29 February, 2020".
    pub date: Option<String>,
    /// Pre-rendered time-of-day string, e.g. "12:00 pm".
    pub time: Option<String>,
    pub source_url: Option<String>,
}

/// Opaque pagination token handed back by the upstream. Echoed on the next
/// page request; never inspected beyond equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCursor(String);

impl FetchCursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of raw upstream records plus resume information.
#[derive(Debug, Clone, Default)]
pub struct FeedPage {
    pub records: Vec<RawRecord>,
    pub next_cursor: Option<FetchCursor>,
    /// The upstream has no further pages for this category.
    pub exhausted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    All,
    National,
    Business,
    Sports,
    World,
    Politics,
    Technology,
    Startup,
    Entertainment,
    Miscellaneous,
    Hatke,
    Science,
    Automobile,
}

impl Category {
    /// Every category name, in the stable order `list_categories` reports.
    pub const NAMES: [&'static str; 13] = [
        "all",
        "national",
        "business",
        "sports",
        "world",
        "politics",
        "technology",
        "startup",
        "entertainment",
        "miscellaneous",
        "hatke",
        "science",
        "automobile",
    ];

    /// Categories with a real upstream feed, i.e. everything but `all`.
    pub const REAL: [Category; 12] = [
        Category::National,
        Category::Business,
        Category::Sports,
        Category::World,
        Category::Politics,
        Category::Technology,
        Category::Startup,
        Category::Entertainment,
        Category::Miscellaneous,
        Category::Hatke,
        Category::Science,
        Category::Automobile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::All => "all",
            Category::National => "national",
            Category::Business => "business",
            Category::Sports => "sports",
            Category::World => "world",
            Category::Politics => "politics",
            Category::Technology => "technology",
            Category::Startup => "startup",
            Category::Entertainment => "entertainment",
            Category::Miscellaneous => "miscellaneous",
            Category::Hatke => "hatke",
            Category::Science => "science",
            Category::Automobile => "automobile",
        }
    }

    /// Path segment the upstream expects for this category. Diverges from the
    /// public name where the upstream kept an older plural form.
    pub fn feed_slug(&self) -> &'static str {
        match self {
            Category::All => "all_news",
            Category::Startup => "startups",
            other => other.as_str(),
        }
    }

    /// `all` has no upstream feed of its own; it is computed by fanning out
    /// over the real categories.
    pub fn is_virtual(&self) -> bool {
        matches!(self, Category::All)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Category::All),
            "national" => Ok(Category::National),
            "business" => Ok(Category::Business),
            "sports" => Ok(Category::Sports),
            "world" => Ok(Category::World),
            "politics" => Ok(Category::Politics),
            "technology" => Ok(Category::Technology),
            "startup" => Ok(Category::Startup),
            "entertainment" => Ok(Category::Entertainment),
            "miscellaneous" => Ok(Category::Miscellaneous),
            "hatke" => Ok(Category::Hatke),
            "science" => Ok(Category::Science),
            "automobile" => Ok(Category::Automobile),
            other => Err(EngineError::InvalidCategory(other.to_string())),
        }
    }
}

/// Incremental fetch progress for one session. The final event of a session
/// carries `done = true` and is delivered exactly once.
///
/// `category` is the plain name rather than the enum so terminal events can
/// echo whatever the caller asked for, including names that failed to parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub category: String,
    pub items_fetched: usize,
    pub target: usize,
    pub done: bool,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Item count used when the caller does not supply a limit.
    pub default_limit: usize,
    /// Hard ceiling; requested limits are clamped here, not rejected.
    pub max_limit: usize,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Safety bound on pages fetched per category session.
    pub max_pages: u32,
    /// Records requested per upstream page.
    pub page_size: usize,
    pub base_url: String,
    pub user_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_limit: 30,
            max_limit: 100,
            timeout_seconds: 10,
            max_retries: 2,
            retry_delay_ms: 250,
            max_pages: 20,
            page_size: 10,
            base_url: "https://inshorts.com/api/en".to_string(),
            user_agent: "news-aggregator/0.1".to_string(),
        }
    }
}

impl EngineConfig {
    /// Defaults with environment overrides applied. Unparsable values are
    /// ignored rather than fatal.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_parse("DEFAULT_NEWS_LIMIT") {
            config.default_limit = v;
        }
        if let Some(v) = env_parse("MAX_NEWS_LIMIT") {
            config.max_limit = v;
        }
        if let Some(v) = env_parse("NEWS_FETCH_TIMEOUT_SECONDS") {
            config.timeout_seconds = v;
        }
        if let Some(v) = env_parse("NEWS_FETCH_RETRIES") {
            config.max_retries = v;
        }
        if let Some(v) = env_parse("NEWS_FETCH_RETRY_DELAY_MS") {
            config.retry_delay_ms = v;
        }
        if let Some(v) = env_parse("NEWS_MAX_PAGES") {
            config.max_pages = v;
        }
        if let Some(v) = env_parse("NEWS_PAGE_SIZE") {
            config.page_size = v;
        }
        if let Ok(v) = std::env::var("NEWS_BASE_URL") {
            if !v.trim().is_empty() {
                config.base_url = v;
            }
        }
        config
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid category: {0}")]
    InvalidCategory(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("unexpected upstream response: {0}")]
    UpstreamFormat(String),

    #[error("upstream rejected the pagination cursor")]
    CursorRejected,

    #[error("malformed record: {0}")]
    MalformedRecord(String),
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            EngineError::UpstreamFormat(err.to_string())
        } else {
            EngineError::UpstreamUnavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::UpstreamFormat(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_names_round_trip() {
        for name in Category::NAMES {
            let parsed: Category = name.parse().expect("listed name must parse");
            assert_eq!(parsed.as_str(), name);
        }
    }

    #[test]
    fn category_parse_is_case_insensitive() {
        assert_eq!("Sports".parse::<Category>().unwrap(), Category::Sports);
        assert_eq!("  TECHNOLOGY ".parse::<Category>().unwrap(), Category::Technology);
    }

    #[test]
    fn unknown_category_is_rejected() {
        let err = "gardening".parse::<Category>().unwrap_err();
        assert!(matches!(err, EngineError::InvalidCategory(ref name) if name == "gardening"));
    }

    #[test]
    fn real_categories_exclude_the_virtual_one() {
        assert_eq!(Category::REAL.len(), Category::NAMES.len() - 1);
        assert!(Category::REAL.iter().all(|c| !c.is_virtual()));
    }

    #[test]
    fn default_config_is_sane() {
        let config = EngineConfig::default();
        assert!(config.default_limit <= config.max_limit);
        assert!(config.max_pages > 0);
        assert!(config.page_size > 0);
    }
}
