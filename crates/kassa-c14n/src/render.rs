#![forbid(unsafe_code)]

//! Rendering of canonical start tags, end tags and leaf nodes.

use crate::escape;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Namespace declarations to render on one start tag, keyed by prefix.
///
/// The empty prefix stands for the default namespace and sorts first.
pub type NsDecls<'a> = BTreeMap<&'a str, &'a str>;

/// An attribute to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr<'a> {
    /// Namespace URI, empty for attributes in no namespace.
    pub ns_uri: &'a str,
    pub local_name: &'a str,
    /// Name as written in the source (`prefix:local` or `local`).
    pub qualified_name: &'a str,
    pub value: &'a str,
}

impl Ord for Attr<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Unqualified attributes first, then by namespace URI and local name.
        match (self.ns_uri.is_empty(), other.ns_uri.is_empty()) {
            (true, true) => self.local_name.cmp(other.local_name),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self
                .ns_uri
                .cmp(other.ns_uri)
                .then(self.local_name.cmp(other.local_name)),
        }
    }
}

impl PartialOrd for Attr<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Append a start tag. `attrs` must already be sorted.
pub fn push_start_tag(out: &mut String, name: &str, ns_decls: &NsDecls<'_>, attrs: &[Attr<'_>]) {
    out.push('<');
    out.push_str(name);
    for (prefix, uri) in ns_decls {
        if prefix.is_empty() {
            out.push_str(" xmlns=\"");
        } else {
            out.push_str(" xmlns:");
            out.push_str(prefix);
            out.push_str("=\"");
        }
        escape::push_attr_value(out, uri);
        out.push('"');
    }
    for attr in attrs {
        out.push(' ');
        out.push_str(attr.qualified_name);
        out.push_str("=\"");
        escape::push_attr_value(out, attr.value);
        out.push('"');
    }
    out.push('>');
}

pub fn push_end_tag(out: &mut String, name: &str) {
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

pub fn push_comment(out: &mut String, text: &str) {
    out.push_str("<!--");
    out.push_str(text);
    out.push_str("-->");
}

pub fn push_pi(out: &mut String, target: &str, data: Option<&str>) {
    out.push_str("<?");
    out.push_str(target);
    if let Some(data) = data.filter(|d| !d.is_empty()) {
        out.push(' ');
        escape::push_pi_data(out, data);
    }
    out.push_str("?>");
}
