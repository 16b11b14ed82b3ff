use super::filter::{
    dedupe_by_channel, filter_by_link, filter_by_search, filter_by_time_at, sort_by_direction,
};
use super::view::{FeedView, UniqueView};
use crate::feed::fallback_icon;
use crate::model::{CanonicalItem, ViewFilter};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Process-wide item collection and its derived visible view.
///
/// Every write and every read of the collection happens under one mutex,
/// held only for the duration of a single call. Readers get `Arc` snapshots:
/// a later [`replace_all`](Self::replace_all) swaps in new vectors and never
/// touches one a reader may still be iterating.
///
/// # Examples
///
/// ```
/// use newsdesk::aggregate::AggregationStore;
/// use newsdesk::model::{SortDirection, ViewFilter};
///
/// let store = AggregationStore::new(ViewFilter::default());
/// assert!(store.view().loading);
///
/// let visible = store.set_filter(ViewFilter::hours(6, SortDirection::Asc));
/// assert!(visible.is_empty());
/// assert_eq!(store.active_filter().max_age_hours(), 6);
/// ```
#[derive(Debug)]
pub struct AggregationStore {
    state: Mutex<State>,
}

#[derive(Debug)]
struct State {
    all: Arc<Vec<CanonicalItem>>,
    visible: Arc<Vec<CanonicalItem>>,
    filter: ViewFilter,
}

impl State {
    fn recompute(&mut self, now: DateTime<Utc>) {
        let mut visible = filter_by_time_at(&self.all, self.filter.max_age, now);
        sort_by_direction(&mut visible, self.filter.direction);
        self.visible = Arc::new(visible);
    }
}

impl Default for AggregationStore {
    fn default() -> Self {
        Self::new(ViewFilter::default())
    }
}

impl AggregationStore {
    pub fn new(filter: ViewFilter) -> Self {
        Self {
            state: Mutex::new(State {
                all: Arc::new(Vec::new()),
                visible: Arc::new(Vec::new()),
                filter,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // State is always replaced wholesale, so a poisoned lock still guards consistent data
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Swaps the full collection and recomputes the visible view.
    pub fn replace_all(&self, items: Vec<CanonicalItem>) {
        let mut state = self.lock();
        state.all = Arc::new(items);
        state.recompute(Utc::now());
        tracing::debug!(
            total = state.all.len(),
            visible = state.visible.len(),
            "Store updated"
        );
    }

    /// Makes `filter` the sticky filter and returns the recomputed view.
    pub fn set_filter(&self, filter: ViewFilter) -> Arc<Vec<CanonicalItem>> {
        let mut state = self.lock();
        state.filter = filter;
        state.recompute(Utc::now());
        Arc::clone(&state.visible)
    }

    pub fn visible_items(&self) -> Arc<Vec<CanonicalItem>> {
        Arc::clone(&self.lock().visible)
    }

    pub fn all_items(&self) -> Arc<Vec<CanonicalItem>> {
        Arc::clone(&self.lock().all)
    }

    pub fn active_filter(&self) -> ViewFilter {
        self.lock().filter
    }

    /// Number of items in the full collection.
    pub fn len(&self) -> usize {
        self.lock().all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> (Arc<Vec<CanonicalItem>>, usize, ViewFilter) {
        let state = self.lock();
        (Arc::clone(&state.visible), state.all.len(), state.filter)
    }

    /// The visible view under its standard heading.
    pub fn view(&self) -> FeedView {
        let (visible, total_count, filter) = self.snapshot();
        FeedView {
            title: filter.heading(),
            loading: visible.is_empty(),
            items: visible.as_ref().clone(),
            total_count,
            filter,
        }
    }

    /// Visible items deduplicated by channel, with one favicon per channel.
    ///
    /// Channels whose items carry no resolved favicon get the site's
    /// `/favicon.ico`; no network access happens here.
    pub fn unique_view(&self) -> UniqueView {
        let (visible, _, _) = self.snapshot();
        let dedup = dedupe_by_channel(&visible);

        let favicons: BTreeMap<String, String> = dedup
            .representatives
            .iter()
            .filter_map(|rep| {
                rep.favicon
                    .clone()
                    .filter(|icon| !icon.is_empty())
                    .or_else(|| fallback_icon(&rep.channel_link))
                    .map(|icon| (rep.channel_link.clone(), icon))
            })
            .collect();

        UniqueView {
            loading: dedup.representatives.is_empty(),
            representatives: dedup.representatives,
            counts: dedup.counts,
            favicons,
        }
    }

    /// Visible items matching `query` in title or description.
    pub fn search(&self, query: &str) -> Vec<CanonicalItem> {
        let (visible, _, _) = self.snapshot();
        filter_by_search(&visible, query)
    }

    /// Visible items of one channel, titled with that channel's title.
    pub fn filter_by_channel(&self, channel_link: &str) -> FeedView {
        let (visible, total_count, filter) = self.snapshot();
        let items = filter_by_link(&visible, channel_link);
        let title = items
            .first()
            .map(|item| item.channel_title.clone())
            .unwrap_or_else(|| filter.heading());
        FeedView {
            title,
            loading: items.is_empty(),
            items,
            total_count,
            filter,
        }
    }
}
