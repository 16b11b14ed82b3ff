//! Feed retrieval and parsing for RSS 2.0, RDF/RSS 1.0 and Atom.
//!
//! - **Parsing**: sniff the dialect and decode it into [`CanonicalItem`](crate::model::CanonicalItem)s
//! - **Fetching**: HTTP retrieval with a timeout, size limit and browser-like headers
//! - **Favicons**: one cached icon URL per site
//! - **Diagnostics**: a bounded log of recent fetch failures
//!
//! # Architecture
//!
//! - [`xml`] reads a whole document into an owned tree; malformed XML fails here
//! - `rss`, `rdf` and `atom` implement [`FeedParser`] over that tree
//! - `parser` owns sniffing and the entry pipeline shared by all dialects
//! - `fetcher` ties download, parse and favicon resolution together
//!
//! # Example
//!
//! ```
//! use newsdesk::feed::{parse, Dialect};
//!
//! let atom = br#"<feed xmlns="http://www.w3.org/2005/Atom">
//!   <title>Example</title>
//!   <entry>
//!     <link rel="self" href="https://example.com/api/1"/>
//!     <link rel="alternate" href="https://example.com/1"/>
//!     <published>2006-01-02T15:04:05Z</published>
//!   </entry>
//! </feed>"#;
//!
//! assert_eq!(Dialect::sniff(atom), Some(Dialect::Atom));
//! let items = parse(atom, "blogs");
//! assert_eq!(items[0].item_link, "https://example.com/1");
//! ```

mod atom;
mod error_log;
mod favicon;
mod fetcher;
mod link;
mod parser;
mod rdf;
mod rss;
pub mod xml;

pub use atom::AtomParser;
pub use error_log::ErrorLog;
pub use favicon::{fallback_icon, FaviconResolver};
pub use fetcher::{build_client, FeedFetcher, FetchError, FetchSettings};
pub use link::{resolve_url, site_root};
pub use parser::{decode, parse, Dialect, FeedParser, ParseError, ParsedFeed, UNTITLED_FEED};
pub use rdf::RdfParser;
pub use rss::RssParser;
