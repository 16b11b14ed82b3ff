//! Dialect sniffing and the shared entry-to-item pipeline.
//!
//! Each dialect implements [`FeedParser`] over an already-parsed XML tree.
//! The parsers only extract [`RawEntry`] values; date normalization, HTML
//! stripping, link resolution and category stamping happen once, here, so
//! the three dialects cannot drift apart.

use super::atom::AtomParser;
use super::link::{first_link_in_document, resolve_url, site_root};
use super::rdf::RdfParser;
use super::rss::RssParser;
use super::xml::{parse_document, Element, XmlError};
use crate::model::CanonicalItem;
use crate::util::{normalize_date, strip_html, DateError};
use std::fmt;
use thiserror::Error;

/// Channel title used when a feed does not name itself.
pub const UNTITLED_FEED: &str = "Untitled feed";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unrecognized feed format")]
    UnknownFormat,

    #[error("malformed XML: {0}")]
    Malformed(#[from] XmlError),

    #[error("expected <{expected}> root element, found <{found}>")]
    UnexpectedRoot {
        expected: &'static str,
        found: String,
    },
}

// ============================================================================
// Dialects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Rss,
    Rdf,
    Atom,
}

impl Dialect {
    /// Detects the dialect by substring search over the raw body.
    ///
    /// `<rss` is checked first, then the RDF root, then `<feed`. Cheap and
    /// indifferent to encoding declarations; the chosen parser still checks
    /// the real root element.
    pub fn sniff(raw: &[u8]) -> Option<Dialect> {
        if contains(raw, b"<rss") {
            Some(Dialect::Rss)
        } else if contains(raw, b"<rdf:RDF") || contains(raw, b"<RDF") {
            Some(Dialect::Rdf)
        } else if contains(raw, b"<feed") {
            Some(Dialect::Atom)
        } else {
            None
        }
    }

    /// Dialect owning a root element with this local name.
    pub fn from_root(local_name: &str) -> Option<Dialect> {
        match local_name {
            "rss" => Some(Dialect::Rss),
            "RDF" => Some(Dialect::Rdf),
            "feed" => Some(Dialect::Atom),
            _ => None,
        }
    }

    pub fn parser(self) -> &'static dyn FeedParser {
        match self {
            Dialect::Rss => &RssParser,
            Dialect::Rdf => &RdfParser,
            Dialect::Atom => &AtomParser,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dialect::Rss => "RSS",
            Dialect::Rdf => "RDF",
            Dialect::Atom => "Atom",
        })
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

// ============================================================================
// Parser capability
// ============================================================================

/// One feed dialect.
pub trait FeedParser: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Extracts channel metadata and entries from a parsed document.
    ///
    /// # Errors
    ///
    /// [`ParseError::UnexpectedRoot`] when the root element does not belong
    /// to this dialect.
    fn decode_tree(&self, root: &Element, category: &str) -> Result<ParsedFeed, ParseError>;

    /// Parses raw bytes and decodes them.
    ///
    /// Malformed XML fails the whole document; entries with unusable dates
    /// are dropped individually and counted in [`ParsedFeed::dropped`].
    fn decode(&self, raw: &[u8], category: &str) -> Result<ParsedFeed, ParseError> {
        let root = parse_document(raw)?;
        self.decode_tree(&root, category)
    }
}

/// Sniffs the dialect and decodes the document.
pub fn decode(raw: &[u8], category: &str) -> Result<ParsedFeed, ParseError> {
    let sniffed = Dialect::sniff(raw).ok_or(ParseError::UnknownFormat)?;
    tracing::debug!(dialect = %sniffed, "Feed dialect detected");
    let root = parse_document(raw)?;

    match sniffed.parser().decode_tree(&root, category) {
        // The sniff matched markup inside the document, not its root
        Err(ParseError::UnexpectedRoot { .. }) => {
            match Dialect::from_root(root.local_name()).filter(|d| *d != sniffed) {
                Some(actual) => {
                    tracing::debug!(
                        sniffed = %sniffed,
                        actual = %actual,
                        "Dialect corrected from root element"
                    );
                    actual.parser().decode_tree(&root, category)
                }
                None => Err(ParseError::UnknownFormat),
            }
        }
        result => result,
    }
}

/// Parses a feed document into canonical items, in document order.
///
/// Never fails: an unknown format or malformed document yields an empty
/// sequence (and a warning), a bad entry is skipped.
///
/// # Examples
///
/// ```
/// use newsdesk::feed::parse;
///
/// let raw = br#"<rss version="2.0"><channel>
///   <title>Example</title><link>https://example.com/</link>
///   <item><title>Hello</title><pubDate>Mon, 02 Jan 2006 15:04:05 +0000</pubDate></item>
/// </channel></rss>"#;
///
/// let items = parse(raw, "tech");
/// assert_eq!(items.len(), 1);
/// assert_eq!(items[0].channel_title, "Example");
/// assert_eq!(items[0].category, "tech");
///
/// assert!(parse(b"<rss><channel><item>", "tech").is_empty());
/// ```
pub fn parse(raw: &[u8], category: &str) -> Vec<CanonicalItem> {
    match decode(raw, category) {
        Ok(feed) => feed.items,
        Err(e) => {
            tracing::warn!(error = %e, "Feed document rejected");
            Vec::new()
        }
    }
}

// ============================================================================
// Decoded feed
// ============================================================================

/// Result of decoding one document.
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub dialect: Dialect,
    pub channel_title: String,
    /// As found in the document: may be empty or relative; see
    /// [`ParsedFeed::with_source_url`].
    pub channel_link: String,
    pub items: Vec<CanonicalItem>,
    /// Entries skipped because their date could not be normalized.
    pub dropped: usize,
}

impl ParsedFeed {
    /// Anchors the channel link to the URL the document was fetched from.
    ///
    /// A missing channel link becomes the site root of `source_url`; a
    /// relative one is resolved against `source_url`. Item links are then
    /// re-resolved against the anchored channel link. An absolute channel
    /// link is left alone.
    pub fn with_source_url(mut self, source_url: &str) -> Self {
        if site_root(&self.channel_link).is_some() {
            return self;
        }
        let anchored = if self.channel_link.is_empty() {
            site_root(source_url)
        } else {
            let resolved = resolve_url(&self.channel_link, source_url);
            site_root(&resolved).map(|_| resolved)
        };
        let Some(channel_link) = anchored else {
            return self;
        };

        for item in &mut self.items {
            item.channel_link.clone_from(&channel_link);
            if !item.item_link.is_empty() {
                item.item_link = resolve_url(&item.item_link, &channel_link);
            }
        }
        self.channel_link = channel_link;
        self
    }

    /// Stamps a favicon URL on every item.
    pub fn with_favicon(mut self, favicon: &str) -> Self {
        if favicon.is_empty() {
            return self;
        }
        for item in &mut self.items {
            item.favicon = Some(favicon.to_owned());
        }
        self
    }
}

// ============================================================================
// Shared entry pipeline
// ============================================================================

/// Fields pulled out of one entry, before normalization.
///
/// `summary` and `content` hold markup as it appeared in the feed.
#[derive(Debug, Default, Clone)]
pub(crate) struct RawEntry {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub link: Option<String>,
    pub date: Option<String>,
    pub creator: Option<String>,
    pub comments: Option<String>,
    pub guid: Option<String>,
    pub media_url: Option<String>,
}

impl RawEntry {
    fn into_item(
        self,
        channel_title: &str,
        channel_link: &str,
        category: &str,
    ) -> Result<CanonicalItem, DateError> {
        let pub_date = normalize_date(self.date.as_deref().unwrap_or_default())?;

        let summary = self
            .summary
            .or_else(|| self.content.clone())
            .unwrap_or_default();
        let description = strip_html(&summary).trim().to_owned();
        let content = self.content.unwrap_or(summary);

        let item_link = match self.link {
            Some(link) if !channel_link.is_empty() => resolve_url(&link, channel_link),
            Some(link) => link,
            None => String::new(),
        };

        Ok(CanonicalItem {
            title: self.title.unwrap_or_default(),
            description,
            content,
            item_link,
            channel_link: channel_link.to_owned(),
            channel_title: channel_title.to_owned(),
            category: category.to_owned(),
            pub_date,
            creator: self.creator,
            comments: self.comments,
            guid: self.guid,
            media_url: self.media_url,
            favicon: None,
        })
    }
}

/// Channel-level fields a dialect parser extracted.
pub(crate) struct ChannelMeta {
    pub title: Option<String>,
    pub link: Option<String>,
}

/// Turns extracted entries into canonical items.
///
/// Channel link fallback order: explicit channel link, first entry link,
/// first `<link>` anywhere in the document. The title falls back to
/// [`UNTITLED_FEED`].
pub(crate) fn assemble(
    dialect: Dialect,
    root: &Element,
    channel: ChannelMeta,
    entries: Vec<RawEntry>,
    category: &str,
) -> ParsedFeed {
    let channel_title = channel.title.unwrap_or_else(|| UNTITLED_FEED.to_owned());
    let channel_link = channel
        .link
        .or_else(|| entries.iter().find_map(|e| e.link.clone()))
        .or_else(|| first_link_in_document(root))
        .unwrap_or_default();

    let mut items = Vec::with_capacity(entries.len());
    let mut dropped = 0;
    for entry in entries {
        let title = entry.title.clone().unwrap_or_default();
        match entry.into_item(&channel_title, &channel_link, category) {
            Ok(item) => items.push(item),
            Err(e) => {
                dropped += 1;
                tracing::debug!(
                    channel = %channel_title,
                    entry = %title,
                    error = %e,
                    "Dropping entry with unusable date"
                );
            }
        }
    }

    ParsedFeed {
        dialect,
        channel_title,
        channel_link,
        items,
        dropped,
    }
}

/// Trimmed, non-empty copy of `s`.
pub(crate) fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == s.len() {
        Some(s)
    } else {
        Some(trimmed.to_owned())
    }
}

/// Markup of the first child with this qualified name, if non-blank.
pub(crate) fn child_markup(el: &Element, name: &str) -> Option<String> {
    el.child(name).map(Element::markup).and_then(non_empty)
}

/// Markup of the first child with this local name, if non-blank.
pub(crate) fn child_markup_local(el: &Element, local: &str) -> Option<String> {
    el.child_local(local).map(Element::markup).and_then(non_empty)
}

/// `url` attribute of the first media-bearing child, checked in `locals` order.
pub(crate) fn media_url(el: &Element, locals: &[&str]) -> Option<String> {
    locals.iter().find_map(|local| {
        el.children_local(local)
            .find_map(|child| child.attr_value("url"))
    })
}

pub(crate) fn expect_root(
    root: &Element,
    local: &'static str,
) -> Result<(), ParseError> {
    if root.local_name() == local {
        Ok(())
    } else {
        Err(ParseError::UnexpectedRoot {
            expected: local,
            found: root.name.clone(),
        })
    }
}
