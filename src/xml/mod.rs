// src/xml/mod.rs

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::BufRead;
use thiserror::Error;

use crate::tree::{Mapping, RawNode, METADATA_MARKER};

/// Key holding an element's own text when it also has attributes or children.
pub const TEXT_KEY: &str = "#text";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed xml: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("document has no root element")]
    NoRoot,
    #[error("element <{0}> is never closed")]
    Unclosed(String),
    #[error("second top-level element <{0}> after the root")]
    ExtraRoot(String),
}

/// An element under construction.
struct Frame {
    name: String,
    entries: Mapping,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> Result<Self, ParseError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut entries = Mapping::new();

        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            // namespace declarations describe the markup, not the record
            if key == "xmlns" || key.starts_with("xmlns:") {
                continue;
            }
            let value = attr.unescape_value().map_err(quick_xml::Error::from)?;
            entries.insert(
                format!("{}{}", METADATA_MARKER, key),
                RawNode::scalar(value.into_owned()),
            );
        }

        Ok(Self {
            name,
            entries,
            text: String::new(),
        })
    }

    /// Append `child` under `name`; a repeated name turns the slot into a sequence.
    fn push_child(&mut self, name: String, child: RawNode) {
        match self.entries.get_mut(&name) {
            Some(RawNode::Sequence(items)) => items.push(child),
            Some(existing) => {
                let first = std::mem::replace(existing, RawNode::Sequence(Vec::new()));
                *existing = RawNode::Sequence(vec![first, child]);
            }
            None => {
                self.entries.insert(name, child);
            }
        }
    }

    /// Text chunks on either side of child elements were appended to
    /// `text` as they came, with no separator: `a<b/>c` closes to `"ac"`.
    fn close(self) -> (String, RawNode) {
        let text = self.text.trim();
        if self.entries.is_empty() {
            return (self.name, RawNode::scalar(text));
        }
        let mut entries = self.entries;
        if !text.is_empty() {
            entries.insert(TEXT_KEY.to_string(), RawNode::scalar(text));
        }
        (self.name, RawNode::Mapping(entries))
    }
}

/// Convert an XML document into a generic tree.
///
/// The result is a one-entry mapping from the root element's qualified name
/// to its content. Elements with neither attributes nor children become
/// scalars holding their trimmed text; everything else becomes a mapping
/// with attributes as `@name` keys, children in document order and any
/// remaining text under `#text`. Repeated sibling elements collect into a
/// sequence.
pub fn parse_reader<R: BufRead>(source: R) -> Result<RawNode, ParseError> {
    let mut reader = Reader::from_reader(source);
    let mut buf = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<(String, RawNode)> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => stack.push(Frame::open(&e)?),
            Event::Empty(e) => {
                let (name, node) = Frame::open(&e)?.close();
                attach(&mut stack, &mut root, name, node)?;
            }
            Event::End(_) => {
                if let Some(frame) = stack.pop() {
                    let (name, node) = frame.close();
                    attach(&mut stack, &mut root, name, node)?;
                }
            }
            Event::Text(e) => {
                if let Some(top) = stack.last_mut() {
                    let text = e.unescape().map_err(quick_xml::Error::from)?;
                    top.text.push_str(&text);
                }
            }
            Event::CData(e) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.pop() {
        return Err(ParseError::Unclosed(open.name));
    }
    let (name, node) = root.ok_or(ParseError::NoRoot)?;
    let mut doc = Mapping::with_capacity(1);
    doc.insert(name, node);
    Ok(RawNode::Mapping(doc))
}

pub fn parse_str(text: &str) -> Result<RawNode, ParseError> {
    parse_reader(text.as_bytes())
}

fn attach(
    stack: &mut [Frame],
    root: &mut Option<(String, RawNode)>,
    name: String,
    node: RawNode,
) -> Result<(), ParseError> {
    match stack.last_mut() {
        Some(parent) => parent.push_child(name, node),
        None if root.is_some() => return Err(ParseError::ExtraRoot(name)),
        None => *root = Some((name, node)),
    }
    Ok(())
}
