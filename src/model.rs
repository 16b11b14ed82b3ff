//! Core data types shared by the parsers, the aggregation store and the view layer.
//!
//! Everything here is plain data: [`CanonicalItem`] is the dialect-independent
//! entry shape, [`FeedSource`] is one operator-configured feed, [`ErrorRecord`]
//! is one diagnostic fetch failure and [`ViewFilter`] is the sticky
//! recency/sort request applied to the visible view.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Canonical Item
// ============================================================================

/// One feed entry, normalized from RSS, RDF or Atom.
///
/// `pub_date` is always a real instant: entries whose date cannot be parsed
/// never become a `CanonicalItem`. `channel_link` is the grouping key used by
/// the unique-channel view and is always populated by the fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalItem {
    pub title: String,
    /// HTML-stripped summary.
    pub description: String,
    /// Raw body markup; may equal the unstripped description.
    pub content: String,
    pub item_link: String,
    pub channel_link: String,
    pub channel_title: String,
    /// Operator-assigned topic of the source feed.
    pub category: String,
    pub pub_date: DateTime<Utc>,
    pub creator: Option<String>,
    pub comments: Option<String>,
    pub guid: Option<String>,
    #[serde(rename = "mediaURL")]
    pub media_url: Option<String>,
    pub favicon: Option<String>,
}

// ============================================================================
// Feed Source
// ============================================================================

/// One configured feed: where to fetch it and which topic to stamp on its items.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedSource {
    pub url: String,
    #[serde(default)]
    pub category: String,
}

impl FeedSource {
    pub fn new(url: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            category: category.into(),
        }
    }
}

// ============================================================================
// Error Record
// ============================================================================

/// A failed fetch, kept for diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub url: String,
    /// HTTP status line (e.g. `404 Not Found`) or transport error text.
    pub error: String,
    pub at: DateTime<Utc>,
}

// ============================================================================
// View Filter
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown sort direction '{0}' (expected 'asc' or 'desc')")]
pub struct SortDirectionError(pub String);

/// Ordering of the visible view by publish date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = SortDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(SortDirectionError(s.to_owned())),
        }
    }
}

/// The recency window and sort order applied to produce the visible view.
///
/// Sticky: the store keeps the last filter across refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ViewFilter {
    #[serde(rename = "maxAgeHours", serialize_with = "serialize_hours")]
    pub max_age: TimeDelta,
    #[serde(rename = "sort")]
    pub direction: SortDirection,
}

fn serialize_hours<S: serde::Serializer>(age: &TimeDelta, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_i64(age.num_hours())
}

impl Default for ViewFilter {
    fn default() -> Self {
        Self::hours(Self::DEFAULT_MAX_AGE_HOURS, SortDirection::Desc)
    }
}

impl ViewFilter {
    pub const DEFAULT_MAX_AGE_HOURS: i64 = 24;
    /// Upper bound on the window so `TimeDelta` construction can never overflow.
    const MAX_AGE_HOURS_CAP: i64 = 1_000_000;

    pub fn new(max_age: TimeDelta, direction: SortDirection) -> Self {
        Self { max_age, direction }
    }

    pub fn hours(hours: i64, direction: SortDirection) -> Self {
        Self::new(
            TimeDelta::hours(hours.clamp(0, Self::MAX_AGE_HOURS_CAP)),
            direction,
        )
    }

    pub fn max_age_hours(&self) -> i64 {
        self.max_age.num_hours()
    }

    /// Applies a loosely-typed filter request on top of this filter.
    ///
    /// An unparsable hour count resets the window to the default 24 hours;
    /// an unknown sort string keeps the current direction. `None` leaves the
    /// corresponding field untouched.
    pub fn apply_request(&self, hours: Option<&str>, sort: Option<&str>) -> Self {
        let mut next = *self;
        if let Some(raw) = hours.map(str::trim).filter(|h| !h.is_empty()) {
            let hours = raw
                .parse::<i64>()
                .ok()
                .filter(|h| *h >= 0)
                .unwrap_or(Self::DEFAULT_MAX_AGE_HOURS);
            next.max_age = Self::hours(hours, next.direction).max_age;
        }
        if let Some(direction) = sort.and_then(|s| s.parse::<SortDirection>().ok()) {
            next.direction = direction;
        }
        next
    }

    /// Title of the unfiltered-by-channel view.
    pub fn heading(&self) -> String {
        format!("All news for the last {} hours", self.max_age_hours())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_direction_parse() {
        assert_eq!("asc".parse::<SortDirection>(), Ok(SortDirection::Asc));
        assert_eq!(" DESC ".parse::<SortDirection>(), Ok(SortDirection::Desc));
        assert!("sideways".parse::<SortDirection>().is_err());
    }

    #[test]
    fn test_default_filter_is_day_descending() {
        let filter = ViewFilter::default();
        assert_eq!(filter.max_age_hours(), 24);
        assert_eq!(filter.direction, SortDirection::Desc);
        assert_eq!(filter.heading(), "All news for the last 24 hours");
    }

    #[test]
    fn test_apply_request_valid_values() {
        let filter = ViewFilter::default().apply_request(Some("6"), Some("asc"));
        assert_eq!(filter.max_age_hours(), 6);
        assert_eq!(filter.direction, SortDirection::Asc);
    }

    #[test]
    fn test_apply_request_bad_hours_resets_to_default() {
        let filter = ViewFilter::hours(72, SortDirection::Asc).apply_request(Some("abc"), None);
        assert_eq!(filter.max_age_hours(), 24);
        assert_eq!(filter.direction, SortDirection::Asc);
    }

    #[test]
    fn test_apply_request_unknown_sort_keeps_direction() {
        let filter = ViewFilter::hours(12, SortDirection::Asc).apply_request(None, Some("random"));
        assert_eq!(filter, ViewFilter::hours(12, SortDirection::Asc));
    }

    #[test]
    fn test_item_serializes_camel_case() {
        let item = CanonicalItem {
            title: "t".into(),
            description: "d".into(),
            content: "c".into(),
            item_link: "https://example.com/a".into(),
            channel_link: "https://example.com".into(),
            channel_title: "Example".into(),
            category: "news".into(),
            pub_date: DateTime::from_timestamp(1_136_214_245, 0).unwrap(),
            creator: None,
            comments: None,
            guid: None,
            media_url: Some("https://example.com/a.jpg".into()),
            favicon: None,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["channelLink"], "https://example.com");
        assert_eq!(json["mediaURL"], "https://example.com/a.jpg");
        assert_eq!(json["pubDate"], "2006-01-02T15:04:05Z");
    }
}
