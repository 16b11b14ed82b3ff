//! Link selection and URL resolution shared by the dialect parsers.

use super::xml::Element;

/// URL carried by a `<link>` element: its `href` attribute, else its text.
pub fn link_target(el: &Element) -> Option<String> {
    el.attr_value("href").or_else(|| {
        let text = el.text();
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_owned())
    })
}

/// Whether a link element points at the human-readable page.
///
/// A missing or empty `rel` counts as `alternate`.
pub fn is_alternate(el: &Element) -> bool {
    match el.attr("rel").map(str::trim) {
        None | Some("") => true,
        Some(rel) => rel.eq_ignore_ascii_case("alternate"),
    }
}

/// First alternate link among `links` that carries a target.
pub fn alternate_link<'a>(links: impl IntoIterator<Item = &'a Element>) -> Option<String> {
    links
        .into_iter()
        .filter(|el| is_alternate(el))
        .find_map(link_target)
}

/// First link among `links` with the given `rel`.
pub fn link_with_rel<'a>(
    links: impl IntoIterator<Item = &'a Element>,
    rel: &str,
) -> Option<String> {
    links
        .into_iter()
        .filter(|el| {
            el.attr("rel")
                .is_some_and(|r| r.trim().eq_ignore_ascii_case(rel))
        })
        .find_map(link_target)
}

/// First `<link>` anywhere in the document with a target, in document order.
///
/// Last resort for channel links; ignores `rel` entirely.
pub fn first_link_in_document(root: &Element) -> Option<String> {
    root.descendants()
        .filter(|el| el.local_name() == "link")
        .find_map(link_target)
}

/// `{scheme}://{host}[:port]` of an absolute http(s) URL.
pub fn site_root(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    })
}

/// Resolves `href` against `base`, returning `href` unchanged when that fails.
pub fn resolve_url(href: &str, base: &str) -> String {
    let href = href.trim();
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_owned();
    }

    // Protocol-relative: go through the parser so credentials can't sneak in
    if href.starts_with("//") {
        let scheme = url::Url::parse(base)
            .map(|b| b.scheme().to_owned())
            .unwrap_or_else(|_| "https".to_owned());
        if let Ok(parsed) = url::Url::parse(&format!("{}:{}", scheme, href)) {
            return parsed.to_string();
        }
    }

    if let Ok(base) = url::Url::parse(base) {
        if let Ok(resolved) = base.join(href) {
            return resolved.to_string();
        }
    }

    href.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::xml::parse_document;

    #[test]
    fn test_alternate_beats_self() {
        let doc = parse_document(
            br#"<entry>
                <link rel="self" href="https://example.com/feed/1"/>
                <link rel="alternate" href="https://example.com/posts/1"/>
            </entry>"#,
        )
        .unwrap();
        assert_eq!(
            alternate_link(doc.children_local("link")).as_deref(),
            Some("https://example.com/posts/1")
        );
    }

    #[test]
    fn test_missing_rel_counts_as_alternate() {
        let doc = parse_document(
            br#"<entry><link rel="edit" href="/edit"/><link href="/post"/></entry>"#,
        )
        .unwrap();
        assert_eq!(
            alternate_link(doc.children_local("link")).as_deref(),
            Some("/post")
        );
    }

    #[test]
    fn test_text_link_used_when_no_href() {
        let doc = parse_document(b"<item><link> https://example.com/a </link></item>").unwrap();
        assert_eq!(
            alternate_link(doc.children_local("link")).as_deref(),
            Some("https://example.com/a")
        );
    }

    #[test]
    fn test_no_alternate_returns_none() {
        let doc = parse_document(br#"<entry><link rel="self" href="/self"/></entry>"#).unwrap();
        assert_eq!(alternate_link(doc.children_local("link")), None);
        assert_eq!(
            link_with_rel(doc.children_local("link"), "SELF").as_deref(),
            Some("/self")
        );
    }

    #[test]
    fn test_first_link_in_document_ignores_rel_and_depth() {
        let doc = parse_document(
            br#"<feed><meta><link rel="hub" href="https://hub.example/"/></meta><link href="/x"/></feed>"#,
        )
        .unwrap();
        assert_eq!(
            first_link_in_document(&doc).as_deref(),
            Some("https://hub.example/")
        );
    }

    #[test]
    fn test_site_root() {
        assert_eq!(
            site_root("https://news.example.com/rss/world.xml?x=1").as_deref(),
            Some("https://news.example.com")
        );
        assert_eq!(
            site_root("http://localhost:8080/feed").as_deref(),
            Some("http://localhost:8080")
        );
        assert_eq!(site_root("not a url"), None);
        assert_eq!(site_root("mailto:someone@example.com"), None);
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        assert_eq!(
            resolve_url("/posts/1", "https://example.com/blog/"),
            "https://example.com/posts/1"
        );
        assert_eq!(
            resolve_url("posts/1", "https://example.com/blog/"),
            "https://example.com/blog/posts/1"
        );
        assert_eq!(
            resolve_url("https://other.example/a", "https://example.com"),
            "https://other.example/a"
        );
    }

    #[test]
    fn test_resolve_protocol_relative_keeps_base_scheme() {
        assert_eq!(
            resolve_url("//cdn.example.com/icon.png", "http://example.com/"),
            "http://cdn.example.com/icon.png"
        );
    }

    #[test]
    fn test_resolve_without_usable_base_returns_href() {
        assert_eq!(resolve_url("/posts/1", ""), "/posts/1");
    }
}
