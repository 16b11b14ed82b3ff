//! Live news aggregation over RSS 2.0, RDF/RSS 1.0 and Atom feeds.
//!
//! The pieces, leaves first:
//!
//! - [`util`] normalizes dates and strips markup
//! - [`feed`] downloads, sniffs and parses feeds into [`model::CanonicalItem`]s
//! - [`aggregate`] holds the shared collection and derives filtered, sorted
//!   and per-channel views from it
//! - [`broadcast`] notifies live subscribers when the collection changes
//! - [`refresh`] is the background loop tying fetcher, store and broadcaster together
//! - [`config`] loads the operator's TOML configuration

pub mod aggregate;
pub mod broadcast;
pub mod config;
pub mod feed;
pub mod model;
pub mod refresh;
pub mod util;

#[cfg(test)]
mod test_support;
