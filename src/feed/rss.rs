//! RSS 2.0 (`rss/channel/item`).

use super::link::alternate_link;
use super::parser::{
    assemble, child_markup, child_markup_local, expect_root, media_url, ChannelMeta, Dialect,
    FeedParser, ParseError, ParsedFeed, RawEntry,
};
use super::xml::Element;

pub struct RssParser;

impl FeedParser for RssParser {
    fn dialect(&self) -> Dialect {
        Dialect::Rss
    }

    fn decode_tree(&self, root: &Element, category: &str) -> Result<ParsedFeed, ParseError> {
        expect_root(root, "rss")?;

        let Some(channel) = root.child_local("channel") else {
            let meta = ChannelMeta {
                title: None,
                link: None,
            };
            return Ok(assemble(self.dialect(), root, meta, Vec::new(), category));
        };

        let meta = ChannelMeta {
            title: channel.child_text("title"),
            // Plain <link> text and <atom:link rel="alternate"> both count
            link: alternate_link(channel.children_local("link")),
        };
        let entries = channel.children_local("item").map(entry).collect();

        Ok(assemble(self.dialect(), root, meta, entries, category))
    }
}

fn entry(item: &Element) -> RawEntry {
    RawEntry {
        title: item.child_text("title"),
        summary: child_markup(item, "description"),
        content: child_markup_local(item, "encoded"),
        link: alternate_link(item.children_local("link")),
        date: item
            .child_text("pubDate")
            .or_else(|| item.child_text_local("date")),
        creator: item
            .child_text("author")
            .or_else(|| item.child_text_local("creator")),
        comments: item.child_text("comments"),
        guid: item.child_text("guid"),
        media_url: media_url(item, &["enclosure", "content", "thumbnail"]),
    }
}
