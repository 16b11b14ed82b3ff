//! Utility functions for normalizing feed-supplied values.
//!
//! This module provides reusable utilities for:
//!
//! - **Date normalization**: parsing the many date layouts feeds use into one UTC instant
//! - **Text processing**: stripping markup from summaries and truncating them for display
//!
//! # Examples
//!
//! ```
//! use newsdesk::util::{normalize_date, strip_html, truncate_summary};
//!
//! let published = normalize_date("2006-01-02T15:04:05Z").unwrap();
//! assert_eq!(published.timestamp(), 1136214245);
//!
//! assert_eq!(strip_html("<p>Breaking</p>"), "Breaking");
//! assert_eq!(truncate_summary("one two three", 8), "one two …");
//! ```

mod date;
mod text;

pub use date::{normalize_date, DateError};
pub use text::{strip_html, truncate_summary};
