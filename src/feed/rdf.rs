//! RDF Site Summary / RSS 1.0 (`rdf:RDF` with `item` siblings of `channel`).

use super::link::alternate_link;
use super::parser::{
    assemble, child_markup, child_markup_local, expect_root, media_url, ChannelMeta, Dialect,
    FeedParser, ParseError, ParsedFeed, RawEntry,
};
use super::xml::Element;

pub struct RdfParser;

impl FeedParser for RdfParser {
    fn dialect(&self) -> Dialect {
        Dialect::Rdf
    }

    fn decode_tree(&self, root: &Element, category: &str) -> Result<ParsedFeed, ParseError> {
        expect_root(root, "RDF")?;

        let channel = root.child_local("channel");
        let meta = ChannelMeta {
            title: channel.and_then(|c| c.child_text_local("title")),
            link: channel.and_then(|c| alternate_link(c.children_local("link"))),
        };

        // Items belong at the root, but some producers nest them in the channel
        let mut entries: Vec<RawEntry> = root.children_local("item").map(entry).collect();
        if entries.is_empty() {
            if let Some(channel) = channel {
                entries = channel.children_local("item").map(entry).collect();
            }
        }

        Ok(assemble(self.dialect(), root, meta, entries, category))
    }
}

fn entry(item: &Element) -> RawEntry {
    RawEntry {
        title: item.child_text_local("title"),
        summary: child_markup(item, "description"),
        content: child_markup_local(item, "encoded"),
        link: alternate_link(item.children_local("link")),
        date: item
            .child_text_local("date")
            .or_else(|| item.child_text("pubDate")),
        creator: item.child_text_local("creator"),
        comments: item.child_text("comments"),
        guid: item
            .child_text("guid")
            .or_else(|| item.attr_value("rdf:about")),
        media_url: media_url(item, &["enclosure", "content", "thumbnail"]),
    }
}
