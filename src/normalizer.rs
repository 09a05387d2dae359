use crate::types::{EngineError, NewsItem, RawRecord, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

const IST_OFFSET_SECONDS: i32 = 5 * 3600 + 30 * 60;

/// Offset the upstream renders its human-readable dates in.
pub(crate) fn ist() -> FixedOffset {
    FixedOffset::east_opt(IST_OFFSET_SECONDS).expect("IST offset is within range")
}

/// Map one raw upstream record into the canonical item shape.
///
/// Title, link, content, and the id source are required; a record missing any
/// of them is malformed and gets dropped by the caller. An unparsable
/// timestamp only clears `published_at`, because the text is still usable.
pub fn normalize(record: &RawRecord) -> Result<NewsItem> {
    let id = required(record.hash_id.as_deref(), "hash_id")?;
    let title = required(record.title.as_deref(), "title")?;
    let url = required(record.shortened_url.as_deref(), "shortened_url")?;
    let content = required(record.content.as_deref(), "content")?;

    Ok(NewsItem {
        id: id.to_string(),
        title: title.to_string(),
        image_url: clean_optional(record.image_url.as_deref()),
        url: url.to_string(),
        content: content.to_string(),
        author: clean_optional(record.author_name.as_deref()),
        published_at: resolve_timestamp(record),
        read_more_url: clean_optional(record.source_url.as_deref()),
    })
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(EngineError::MalformedRecord(format!("missing {}", field))),
    }
}

fn clean_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn resolve_timestamp(record: &RawRecord) -> Option<DateTime<Utc>> {
    if let Some(millis) = record.created_at {
        if let Some(instant) = Utc.timestamp_millis_opt(millis).single() {
            return Some(instant);
        }
    }
    match (record.date.as_deref(), record.time.as_deref()) {
        (Some(date), Some(time)) => combine_date_time(date, time),
        _ => None,
    }
}

/// Combine the upstream's separate locale-formatted date and time strings
/// into one absolute instant. The strings are rendered in IST.
pub(crate) fn combine_date_time(date: &str, time: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(date.trim(), "%A, %d %B, %Y").ok()?;
    let time = NaiveTime::parse_from_str(&time.trim().to_uppercase(), "%I:%M %p").ok()?;
    ist()
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|instant| instant.with_timezone(&Utc))
}
