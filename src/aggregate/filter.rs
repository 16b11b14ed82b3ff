use crate::model::{CanonicalItem, SortDirection};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Keeps items published no more than `max_age` ago.
///
/// `now` is sampled once for the whole slice. Items dated in the future are
/// kept.
pub fn filter_by_time(items: &[CanonicalItem], max_age: TimeDelta) -> Vec<CanonicalItem> {
    filter_by_time_at(items, max_age, Utc::now())
}

/// [`filter_by_time`] with an explicit reference instant.
pub fn filter_by_time_at(
    items: &[CanonicalItem],
    max_age: TimeDelta,
    now: DateTime<Utc>,
) -> Vec<CanonicalItem> {
    items
        .iter()
        .filter(|item| now.signed_duration_since(item.pub_date) <= max_age)
        .cloned()
        .collect()
}

/// Stable sort by publish date.
pub fn sort_by_direction(items: &mut [CanonicalItem], direction: SortDirection) {
    match direction {
        SortDirection::Asc => items.sort_by_key(|item| item.pub_date),
        SortDirection::Desc => items.sort_by_key(|item| Reverse(item.pub_date)),
    }
}

/// One representative item per channel plus per-channel item counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Dedup {
    /// First-encountered item of each channel, most active channel first.
    pub representatives: Vec<CanonicalItem>,
    /// Item count keyed by `channel_link`.
    pub counts: BTreeMap<String, usize>,
}

impl Dedup {
    pub fn count_for(&self, channel_link: &str) -> usize {
        self.counts.get(channel_link).copied().unwrap_or(0)
    }
}

/// Groups items by `channel_link`.
///
/// Representatives are ordered by descending count, then channel title,
/// then channel link, so equal counts still produce a stable order.
pub fn dedupe_by_channel(items: &[CanonicalItem]) -> Dedup {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut representatives = Vec::new();

    for item in items {
        let count = counts.entry(item.channel_link.clone()).or_insert(0);
        if *count == 0 {
            representatives.push(item.clone());
        }
        *count += 1;
    }

    representatives.sort_by(|a, b| {
        let count_a = counts.get(&a.channel_link).copied().unwrap_or(0);
        let count_b = counts.get(&b.channel_link).copied().unwrap_or(0);
        count_b
            .cmp(&count_a)
            .then_with(|| a.channel_title.cmp(&b.channel_title))
            .then_with(|| a.channel_link.cmp(&b.channel_link))
    });

    Dedup {
        representatives,
        counts,
    }
}

/// Items whose `channel_link` equals `channel_link` exactly.
pub fn filter_by_link(items: &[CanonicalItem], channel_link: &str) -> Vec<CanonicalItem> {
    items
        .iter()
        .filter(|item| item.channel_link == channel_link)
        .cloned()
        .collect()
}

/// Case-insensitive substring match on title or stripped description.
///
/// The query is used as given, surrounding whitespace included. An empty
/// query matches everything.
pub fn filter_by_search(items: &[CanonicalItem], query: &str) -> Vec<CanonicalItem> {
    let needle = query.to_lowercase();
    items
        .iter()
        .filter(|item| {
            item.title.to_lowercase().contains(&needle)
                || item.description.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}
