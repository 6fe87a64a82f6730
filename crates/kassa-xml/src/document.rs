#![forbid(unsafe_code)]

//! Owned XML document with in-place edits.
//!
//! The document keeps its text and hands out short-lived `roxmltree` trees
//! through [`XmlDocument::parse_doc`]. Edits splice the text at the byte
//! ranges `roxmltree` reports and re-parse the result, so the stored text is
//! well-formed after every successful call.

use crate::select;
use crate::writer;
use kassa_core::Error;
use roxmltree::NodeId;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// An owned, always well-formed XML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    text: String,
}

impl XmlDocument {
    /// Parse and validate XML, taking ownership of the text.
    pub fn parse(text: impl Into<String>) -> Result<Self, Error> {
        let text = text.into();
        validate(&text)?;
        Ok(Self { text })
    }

    /// Parse and validate XML from bytes.
    pub fn parse_bytes(data: &[u8]) -> Result<Self, Error> {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::XmlParse(format!("invalid UTF-8: {e}")))?;
        Self::parse(text)
    }

    /// The serialized document.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    /// Parse the stored text into a temporary tree.
    ///
    /// Node IDs handed to the editing methods must come from a tree parsed
    /// from the current text; every edit invalidates earlier trees.
    pub fn parse_doc(&self) -> Result<roxmltree::Document<'_>, Error> {
        roxmltree::Document::parse_with_options(&self.text, crate::parsing_options())
            .map_err(|e| Error::XmlParse(e.to_string()))
    }

    /// Add an attribute to the start tag of `element`.
    pub fn insert_attribute(
        &mut self,
        element: NodeId,
        qname: &str,
        value: &str,
    ) -> Result<(), Error> {
        let at = {
            let doc = self.parse_doc()?;
            TagSpan::of(&doc, element)?.name_end
        };
        let markup = format!(" {qname}=\"{}\"", writer::escape_attr(value));
        self.splice(at..at, &markup)
    }

    /// Append raw markup as the last content of `element`.
    ///
    /// A self-closing element is expanded into a start and end tag. The
    /// markup must be a well-formed fragment in the element's scope.
    pub fn append_child_markup(&mut self, element: NodeId, markup: &str) -> Result<(), Error> {
        let (range, replacement) = {
            let doc = self.parse_doc()?;
            let span = TagSpan::of(&doc, element)?;
            match span.end_tag_start {
                Some(at) => (at..at, markup.to_owned()),
                None => (
                    span.start_tag_close - 1..span.start_tag_close + 1,
                    format!(">{markup}</{}>", span.qname),
                ),
            }
        };
        self.splice(range, &replacement)
    }

    /// Replace the whole content of `element` with escaped text.
    pub fn set_text(&mut self, element: NodeId, text: &str) -> Result<(), Error> {
        let escaped = writer::escape_text(text);
        let (range, replacement) = {
            let doc = self.parse_doc()?;
            let span = TagSpan::of(&doc, element)?;
            match span.end_tag_start {
                Some(at) => (span.start_tag_close + 1..at, escaped),
                None => (
                    span.start_tag_close - 1..span.start_tag_close + 1,
                    format!(">{escaped}</{}>", span.qname),
                ),
            }
        };
        self.splice(range, &replacement)
    }

    /// Drop whitespace-only text between elements below `element`.
    ///
    /// Text is removed only when its parent also has element children and
    /// no `xml:space="preserve"` is in scope, so leaf values are untouched.
    /// Returns the number of text nodes removed.
    pub fn strip_blank_text(&mut self, element: NodeId) -> Result<usize, Error> {
        let ranges = {
            let doc = self.parse_doc()?;
            let root = doc
                .get_node(element)
                .filter(|n| n.is_element())
                .ok_or_else(|| Error::XmlStructure(format!("node {element:?} is not an element")))?;
            let text = doc.input_text();
            root.descendants()
                .filter(|n| n.is_text() && is_blank_between_elements(*n))
                .map(|n| n.range())
                .filter(|r| text[r.clone()].bytes().all(is_xml_space))
                .collect::<Vec<_>>()
        };
        if ranges.is_empty() {
            return Ok(0);
        }

        let mut updated = String::with_capacity(self.text.len());
        let mut at = 0;
        for range in &ranges {
            updated.push_str(&self.text[at..range.start]);
            at = range.end;
        }
        updated.push_str(&self.text[at..]);
        validate(&updated)?;
        self.text = updated;
        Ok(ranges.len())
    }

    fn splice(&mut self, range: Range<usize>, replacement: &str) -> Result<(), Error> {
        let mut updated =
            String::with_capacity(self.text.len() - (range.end - range.start) + replacement.len());
        updated.push_str(&self.text[..range.start]);
        updated.push_str(replacement);
        updated.push_str(&self.text[range.end..]);
        validate(&updated)?;
        self.text = updated;
        Ok(())
    }
}

impl fmt::Display for XmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for XmlDocument {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn validate(text: &str) -> Result<(), Error> {
    roxmltree::Document::parse_with_options(text, crate::parsing_options())
        .map(|_| ())
        .map_err(|e| Error::XmlParse(e.to_string()))
}

fn is_xml_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}

fn is_blank_between_elements(node: roxmltree::Node<'_, '_>) -> bool {
    let Some(parent) = node.parent_element() else {
        return false;
    };
    if !parent.children().any(|c| c.is_element()) {
        return false;
    }
    let preserve = node
        .ancestors()
        .filter_map(|a| a.attribute((roxmltree::NS_XML_URI, "space")))
        .next()
        == Some("preserve");
    !preserve
}

/// Byte offsets of an element's tags in the source text.
struct TagSpan {
    qname: String,
    /// End of the element name in the start tag.
    name_end: usize,
    /// Offset of the `>` closing the start tag.
    start_tag_close: usize,
    /// Offset of `</` for elements that are not self-closing.
    end_tag_start: Option<usize>,
}

impl TagSpan {
    fn of(doc: &roxmltree::Document<'_>, id: NodeId) -> Result<Self, Error> {
        let node = doc
            .get_node(id)
            .filter(|n| n.is_element())
            .ok_or_else(|| Error::XmlStructure(format!("node {id:?} is not an element")))?;
        let text = doc.input_text();
        let range = node.range();
        let qname = select::qualified_name(node);
        let name_end = range.start + 1 + qname.len();

        let start_tag_close = find_tag_close(text, name_end, range.end)
            .ok_or_else(|| Error::XmlStructure(format!("unterminated start tag <{qname}>")))?;

        let end_tag_start = if text.as_bytes()[start_tag_close - 1] == b'/' {
            None
        } else {
            let at = text[..range.end]
                .rfind("</")
                .filter(|at| *at > start_tag_close)
                .ok_or_else(|| Error::XmlStructure(format!("missing end tag for <{qname}>")))?;
            Some(at)
        };

        Ok(Self {
            qname: qname.to_owned(),
            name_end,
            start_tag_close,
            end_tag_start,
        })
    }
}

/// Find the `>` that closes a start tag, skipping quoted attribute values.
fn find_tag_close(text: &str, from: usize, limit: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (offset, byte) in text.as_bytes()[from..limit].iter().enumerate() {
        match (quote, *byte) {
            (Some(q), b) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b'"') | (None, b'\'') => quote = Some(*byte),
            (None, b'>') => return Some(from + offset),
            (None, _) => {}
        }
    }
    None
}
