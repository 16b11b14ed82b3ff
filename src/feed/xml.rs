//! Owned XML tree used by the dialect parsers.
//!
//! The whole document is read with `quick-xml` before any dialect logic runs,
//! so a syntax error anywhere fails the document as a unit and no dialect
//! parser ever sees a partial structure.

use quick_xml::escape::{escape, resolve_predefined_entity};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// SEC-003: Maximum element nesting accepted before the document is rejected.
const MAX_DEPTH: usize = 256;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("XML syntax error: {0}")]
    Syntax(String),

    #[error("document has no root element")]
    NoRoot,

    #[error("document ends inside <{0}>")]
    Unclosed(String),

    #[error("nesting depth exceeds maximum of {0} levels")]
    TooDeep(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Element(Element),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Qualified name as written, e.g. `dc:creator`.
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    /// Name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    /// Attribute value by qualified name, falling back to a local-name match
    /// (so `about` finds `rdf:about`).
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .or_else(|| self.attrs.iter().find(|(k, _)| local_part(k) == name))
            .map(|(_, v)| v.as_str())
    }

    /// Non-empty, trimmed attribute value.
    pub fn attr_value(&self, name: &str) -> Option<String> {
        self.attr(name).and_then(non_empty)
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    /// First child with exactly this qualified name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|el| el.name == name)
    }

    /// First child with this local name, whatever its prefix.
    pub fn child_local(&self, local: &str) -> Option<&Element> {
        self.elements().find(|el| el.local_name() == local)
    }

    pub fn children_local<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements().filter(move |el| el.local_name() == local)
    }

    /// Concatenated text of all descendants, in document order.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Trimmed text of the first child with this qualified name, if non-empty.
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name).and_then(|el| non_empty(&el.text()))
    }

    /// Trimmed text of the first child with this local name, if non-empty.
    pub fn child_text_local(&self, local: &str) -> Option<String> {
        self.children_local(local)
            .find_map(|el| non_empty(&el.text()))
    }

    /// Body markup of this element.
    ///
    /// Escaped or CDATA-wrapped HTML arrives as text and is returned as-is;
    /// literal child elements (XHTML content) are serialized back to markup.
    pub fn markup(&self) -> String {
        if self.elements().next().is_some() {
            self.inner_xml()
        } else {
            self.text()
        }
    }

    /// Re-serializes the children of this element.
    pub fn inner_xml(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            write_node(child, &mut out);
        }
        out
    }

    /// Depth-first, document-order walk over this element and everything below it.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<&'a Element> {
        let el = self.stack.pop()?;
        for child in el.children.iter().rev() {
            if let Node::Element(child) = child {
                self.stack.push(child);
            }
        }
        Some(el)
    }
}

/// Parses a complete document into its root element.
///
/// Bytes are decoded as UTF-8 (lossily). Any syntax error, mismatched or
/// missing end tag, or stray non-whitespace text outside the root is an error.
pub fn parse_document(raw: &[u8]) -> Result<Element, XmlError> {
    let source = String::from_utf8_lossy(raw);
    let mut reader = Reader::from_str(&source);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| XmlError::Syntax(e.to_string()))?;
        match event {
            Event::Start(start) => {
                if stack.len() >= MAX_DEPTH {
                    return Err(XmlError::TooDeep(MAX_DEPTH));
                }
                ensure_single_root(&stack, &root)?;
                stack.push(open_element(&start, &reader));
            }
            Event::Empty(start) => {
                ensure_single_root(&stack, &root)?;
                let el = open_element(&start, &reader);
                attach(el, &mut stack, &mut root);
            }
            Event::End(_) => {
                let el = stack
                    .pop()
                    .ok_or_else(|| XmlError::Syntax("unexpected closing tag".to_owned()))?;
                attach(el, &mut stack, &mut root);
            }
            Event::Text(text) => {
                let value = text
                    .unescape_with(resolve_entity)
                    .map_err(|e| XmlError::Syntax(e.to_string()))?;
                push_text(&mut stack, &value)?;
            }
            Event::CData(cdata) => {
                push_text(&mut stack, &String::from_utf8_lossy(&cdata))?;
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctype
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(XmlError::Unclosed(open.name.clone()));
    }
    root.ok_or(XmlError::NoRoot)
}

/// Resolves XML builtins plus the HTML entities feeds commonly leak into XML.
fn resolve_entity(name: &str) -> Option<&'static str> {
    resolve_predefined_entity(name).or(match name {
        "nbsp" => Some("\u{a0}"),
        "ndash" => Some("\u{2013}"),
        "mdash" => Some("\u{2014}"),
        "hellip" => Some("\u{2026}"),
        "laquo" => Some("\u{ab}"),
        "raquo" => Some("\u{bb}"),
        "lsquo" => Some("\u{2018}"),
        "rsquo" => Some("\u{2019}"),
        "ldquo" => Some("\u{201c}"),
        "rdquo" => Some("\u{201d}"),
        "bull" => Some("\u{2022}"),
        "middot" => Some("\u{b7}"),
        "copy" => Some("\u{a9}"),
        "reg" => Some("\u{ae}"),
        "trade" => Some("\u{2122}"),
        "deg" => Some("\u{b0}"),
        "euro" => Some("\u{20ac}"),
        "pound" => Some("\u{a3}"),
        _ => None,
    })
}

fn ensure_single_root(stack: &[Element], root: &Option<Element>) -> Result<(), XmlError> {
    if stack.is_empty() && root.is_some() {
        return Err(XmlError::Syntax(
            "multiple root elements in document".to_owned(),
        ));
    }
    Ok(())
}

fn open_element(start: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Element {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr_result in start.attributes() {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(e) => {
                tracing::debug!(element = %name, error = %e, "Skipping malformed attribute");
                continue;
            }
        };
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        match attr.decode_and_unescape_value_with(reader.decoder(), resolve_entity) {
            Ok(value) => attrs.push((key, value.into_owned())),
            Err(e) => {
                tracing::debug!(element = %name, attr = %key, error = %e, "Skipping undecodable attribute");
            }
        }
    }
    Element {
        name,
        attrs,
        children: Vec::new(),
    }
}

fn attach(el: Element, stack: &mut [Element], root: &mut Option<Element>) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(el)),
        None => *root = Some(el),
    }
}

fn push_text(stack: &mut [Element], value: &str) -> Result<(), XmlError> {
    let Some(parent) = stack.last_mut() else {
        if value.trim().is_empty() {
            return Ok(());
        }
        return Err(XmlError::Syntax(
            "text content outside the root element".to_owned(),
        ));
    };
    if let Some(Node::Text(existing)) = parent.children.last_mut() {
        existing.push_str(value);
    } else {
        parent.children.push(Node::Text(value.to_owned()));
    }
    Ok(())
}

fn collect_text(el: &Element, out: &mut String) {
    for child in &el.children {
        match child {
            Node::Text(t) => out.push_str(t),
            Node::Element(inner) => collect_text(inner, out),
        }
    }
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Text(t) => out.push_str(&escape(t.as_str())),
        Node::Element(el) => {
            out.push('<');
            out.push_str(el.local_name());
            for (key, value) in &el.attrs {
                if key == "xmlns" || key.starts_with("xmlns:") {
                    continue;
                }
                out.push(' ');
                out.push_str(key);
                out.push_str("=\"");
                out.push_str(&escape(value.as_str()));
                out.push('"');
            }
            if el.children.is_empty() {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for child in &el.children {
                write_node(child, out);
            }
            out.push_str("</");
            out.push_str(el.local_name());
            out.push('>');
        }
    }
}

fn local_part(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}
