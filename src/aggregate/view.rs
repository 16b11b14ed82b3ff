use crate::model::{CanonicalItem, ViewFilter};
use serde::Serialize;
use std::collections::BTreeMap;

/// A list of items as handed to the view layer.
///
/// Built from a store snapshot; owns its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedView {
    /// `All news for the last N hours`, or the channel title for a channel view.
    pub title: String,
    pub items: Vec<CanonicalItem>,
    /// Size of the full, unfiltered collection.
    pub total_count: usize,
    pub filter: ViewFilter,
    /// Nothing to show yet; renderers display a loading state.
    pub loading: bool,
}

/// The visible view collapsed to one item per channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UniqueView {
    pub representatives: Vec<CanonicalItem>,
    /// Item count per `channel_link`.
    pub counts: BTreeMap<String, usize>,
    /// Icon URL per `channel_link`.
    pub favicons: BTreeMap<String, String>,
    pub loading: bool,
}
