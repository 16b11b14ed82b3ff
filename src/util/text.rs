use std::borrow::Cow;

/// Suffix appended by [`truncate_summary`] when text is cut.
const ELLIPSIS: &str = " …";

/// Removes `<...>` spans from feed-supplied HTML, keeping every other character.
///
/// A single pass that treats anything between `<` and the next `>` as opaque.
/// No entity decoding and no awareness of nesting, comments or quoted `>`
/// inside attributes: a stray `>` outside a tag is dropped as well. Total and
/// deterministic; empty input yields empty output.
///
/// Returns `Cow::Borrowed` when the input contains no angle brackets (the
/// common case for plain-text summaries).
///
/// # Examples
///
/// ```
/// use newsdesk::util::strip_html;
///
/// assert_eq!(strip_html("<p>Hello <b>world</b></p>"), "Hello world");
/// assert_eq!(strip_html("a &amp; b"), "a &amp; b");
/// assert_eq!(strip_html(""), "");
/// ```
pub fn strip_html(html: &str) -> Cow<'_, str> {
    if !html.contains(['<', '>']) {
        return Cow::Borrowed(html);
    }

    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    Cow::Owned(out)
}

/// Shortens a summary to at most `max_chars` characters plus an ellipsis.
///
/// Cuts at the last space inside the limit so words are not split (falls
/// back to a hard cut for a single long word), trims trailing whitespace and
/// appends `" …"`. Text already within the limit is returned borrowed.
///
/// # Examples
///
/// ```
/// use newsdesk::util::truncate_summary;
///
/// assert_eq!(truncate_summary("short", 10), "short");
/// assert_eq!(truncate_summary("the quick brown fox", 12), "the quick …");
/// ```
pub fn truncate_summary(text: &str, max_chars: usize) -> Cow<'_, str> {
    let cut = match text.char_indices().nth(max_chars) {
        Some((idx, _)) => idx,
        None => return Cow::Borrowed(text),
    };

    let mut truncated = &text[..cut];
    if let Some(space) = truncated.rfind(' ') {
        if space > 0 {
            truncated = &truncated[..space];
        }
    }

    Cow::Owned(format!("{}{}", truncated.trim(), ELLIPSIS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_strip_plain_text_returns_borrowed() {
        let input = "nothing to strip here";
        assert!(matches!(strip_html(input), Cow::Borrowed(_)));
    }

    #[test]
    fn test_strip_nested_tags() {
        assert_eq!(
            strip_html(r#"<div class="x"><p>One <a href="/y">two</a></p> three</div>"#),
            "One two three"
        );
    }

    #[test]
    fn test_strip_keeps_entities_verbatim() {
        assert_eq!(strip_html("<i>caf&eacute;</i> &lt;3"), "caf&eacute; &lt;3");
    }

    #[test]
    fn test_strip_unclosed_tag_swallows_rest() {
        assert_eq!(strip_html("before <img src="), "before ");
    }

    #[test]
    fn test_strip_stray_closing_bracket_dropped() {
        assert_eq!(strip_html("a > b"), "a  b");
    }

    #[test]
    fn test_strip_unicode_preserved() {
        assert_eq!(strip_html("<b>Привет</b>, 世界"), "Привет, 世界");
    }

    #[test]
    fn test_truncate_at_word_boundary() {
        assert_eq!(
            truncate_summary("alpha beta gamma delta", 13),
            "alpha beta …"
        );
    }

    #[test]
    fn test_truncate_single_long_word_hard_cut() {
        assert_eq!(truncate_summary("abcdefghij", 4), "abcd …");
    }

    #[test]
    fn test_truncate_exact_fit_borrowed() {
        let text = "exactly";
        assert!(matches!(truncate_summary(text, 7), Cow::Borrowed("exactly")));
    }

    #[test]
    fn test_truncate_multibyte_boundary() {
        assert_eq!(truncate_summary("日本語のテキスト", 3), "日本語 …");
    }

    proptest! {
        #[test]
        fn prop_strip_output_has_no_brackets(s in ".*") {
            let out = strip_html(&s);
            prop_assert!(!out.contains('<'));
            prop_assert!(!out.contains('>'));
            prop_assert!(out.len() <= s.len());
        }

        #[test]
        fn prop_strip_is_idempotent(s in ".*") {
            let once = strip_html(&s).into_owned();
            prop_assert_eq!(strip_html(&once).into_owned(), once);
        }

        #[test]
        fn prop_truncate_never_exceeds_limit(s in ".*", max in 1usize..64) {
            let out = truncate_summary(&s, max);
            prop_assert!(out.chars().count() <= max + ELLIPSIS.chars().count());
        }
    }
}
