//! Atom 1.0 (`feed/entry`), with Atom 0.3 date elements as fallbacks.

use super::link::{alternate_link, link_with_rel};
use super::parser::{
    assemble, child_markup_local, expect_root, media_url, ChannelMeta, Dialect, FeedParser,
    ParseError, ParsedFeed, RawEntry,
};
use super::xml::Element;

pub struct AtomParser;

impl FeedParser for AtomParser {
    fn dialect(&self) -> Dialect {
        Dialect::Atom
    }

    fn decode_tree(&self, root: &Element, category: &str) -> Result<ParsedFeed, ParseError> {
        expect_root(root, "feed")?;

        let meta = ChannelMeta {
            title: root.child_text_local("title"),
            link: alternate_link(root.children_local("link")),
        };
        let entries = root.children_local("entry").map(entry).collect();

        Ok(assemble(self.dialect(), root, meta, entries, category))
    }
}

fn entry(el: &Element) -> RawEntry {
    RawEntry {
        title: el.child_text_local("title"),
        summary: child_markup_local(el, "summary"),
        content: child_markup_local(el, "content"),
        link: alternate_link(el.children_local("link")),
        // published wins over updated whenever both are present
        date: ["published", "issued", "updated", "modified"]
            .iter()
            .find_map(|name| el.child_text_local(name)),
        creator: el
            .child_local("author")
            .and_then(|author| author.child_text_local("name")),
        comments: link_with_rel(el.children_local("link"), "replies"),
        guid: el.child_text_local("id"),
        media_url: link_with_rel(el.children_local("link"), "enclosure")
            .or_else(|| media_url(el, &["thumbnail", "content"])),
    }
}
