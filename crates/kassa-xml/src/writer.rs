#![forbid(unsafe_code)]

//! Compact XML writer used to build signature markup.

use kassa_core::Error;

/// A minimal streaming XML writer.
///
/// Output carries no indentation and no whitespace between tags, so the
/// markup it produces can be spliced into a document without adding text
/// nodes.
#[derive(Debug, Default)]
pub struct XmlWriter {
    out: String,
    open: Vec<String>,
}

impl XmlWriter {
    /// Create a new XML writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an element with the given name and attributes.
    pub fn start_element(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), Error> {
        self.write_start_tag(name, attrs)?;
        self.out.push('>');
        self.open.push(name.to_owned());
        Ok(())
    }

    /// Write an empty element (self-closing).
    pub fn empty_element(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), Error> {
        self.write_start_tag(name, attrs)?;
        self.out.push_str("/>");
        Ok(())
    }

    /// Write an element whose only content is `text`.
    pub fn text_element(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
        text: &str,
    ) -> Result<(), Error> {
        self.start_element(name, attrs)?;
        self.write_text(text)?;
        self.end_element(name)
    }

    /// End the current element.
    pub fn end_element(&mut self, name: &str) -> Result<(), Error> {
        match self.open.pop() {
            Some(open) if open == name => {
                self.out.push_str("</");
                self.out.push_str(name);
                self.out.push('>');
                Ok(())
            }
            Some(open) => Err(Error::XmlStructure(format!(
                "end tag </{name}> does not match <{open}>"
            ))),
            None => Err(Error::XmlStructure(format!("end tag </{name}> without start tag"))),
        }
    }

    /// Write text content.
    pub fn write_text(&mut self, text: &str) -> Result<(), Error> {
        if self.open.is_empty() {
            return Err(Error::XmlStructure("text outside of an element".into()));
        }
        self.out.push_str(&escape_text(text));
        Ok(())
    }

    /// Finish writing and return the XML as a string.
    pub fn into_string(self) -> Result<String, Error> {
        if let Some(open) = self.open.last() {
            return Err(Error::XmlStructure(format!("element <{open}> is not closed")));
        }
        Ok(self.out)
    }

    fn write_start_tag(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), Error> {
        if name.is_empty() {
            return Err(Error::XmlStructure("empty element name".into()));
        }
        self.out.push('<');
        self.out.push_str(name);
        for (key, value) in attrs {
            self.out.push(' ');
            self.out.push_str(key);
            self.out.push_str("=\"");
            self.out.push_str(&escape_attr(value));
            self.out.push('"');
        }
        Ok(())
    }
}

/// Escape character data for element content.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape an attribute value for a double-quoted attribute.
pub fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#9;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(c),
        }
    }
    out
}
