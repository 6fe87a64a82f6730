#![forbid(unsafe_code)]

//! Exclusive Canonical XML 1.0 (exc-C14N).
//!
//! Algorithm URI: `http://www.w3.org/2001/10/xml-exc-c14n#`
//! With comments: `http://www.w3.org/2001/10/xml-exc-c14n#WithComments`
//!
//! Only "visibly utilized" namespace declarations are output. A namespace is
//! visibly utilized on an element if:
//! 1. Its prefix is used by the element's tag name, OR
//! 2. Its prefix is used by one of the element's attributes, OR
//! 3. The prefix appears in the InclusiveNamespaces PrefixList.
//!
//! A declaration is emitted only when the nearest output ancestor did not
//! already render the same binding.

use crate::escape;
use crate::render::{self, Attr, NsDecls};
use kassa_core::Error;
use kassa_xml::{select, NodeSet};
use roxmltree::{Node, NodeType};
use std::collections::BTreeMap;

/// Prefix → URI bindings rendered by output ancestors.
type Rendered = BTreeMap<String, String>;

/// Canonicalize the nodes of `node_set` found under `apex`.
///
/// `apex` is either an element or the document root.
pub fn canonicalize(
    apex: Node<'_, '_>,
    with_comments: bool,
    node_set: &NodeSet,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    if !(apex.is_element() || apex.is_root()) {
        return Err(Error::XmlStructure(
            "canonicalization must start at an element or the document root".into(),
        ));
    }
    let ctx = ExcC14nContext {
        with_comments,
        node_set,
        inclusive_prefixes,
    };
    let mut output = String::new();
    ctx.process_node(apex, &mut output, &Rendered::new());
    Ok(output.into_bytes())
}

struct ExcC14nContext<'s> {
    with_comments: bool,
    node_set: &'s NodeSet,
    inclusive_prefixes: &'s [String],
}

impl ExcC14nContext<'_> {
    fn process_node(&self, node: Node<'_, '_>, output: &mut String, rendered: &Rendered) {
        match node.node_type() {
            NodeType::Root => {
                for child in node.children() {
                    self.process_node(child, output, rendered);
                }
            }
            NodeType::Element => self.process_element(node, output, rendered),
            NodeType::Text => {
                if self.node_set.contains(node) {
                    escape::push_text(output, node.text().unwrap_or(""));
                }
            }
            NodeType::Comment => {
                if self.with_comments && self.node_set.contains(node) {
                    push_top_level(node, output, |out| {
                        render::push_comment(out, node.text().unwrap_or(""))
                    });
                }
            }
            NodeType::PI => {
                if let Some(pi) = node.pi().filter(|_| self.node_set.contains(node)) {
                    push_top_level(node, output, |out| render::push_pi(out, pi.target, pi.value));
                }
            }
        }
    }

    fn process_element(&self, node: Node<'_, '_>, output: &mut String, rendered: &Rendered) {
        if !self.node_set.contains(node) {
            // Declarations are only rendered on output start tags, so the
            // children inherit the ancestor bindings unchanged.
            for child in node.children() {
                self.process_node(child, output, rendered);
            }
            return;
        }

        let input = node.document().input_text();
        let name = select::qualified_name(node);

        let mut utilized = NsDecls::new();
        utilized.insert(
            select::element_prefix(node).unwrap_or(""),
            node.tag_name().namespace().unwrap_or(""),
        );

        let mut attrs = Vec::new();
        for attr in node.attributes() {
            let qualified_name = &input[attr.range_qname()];
            let ns_uri = attr.namespace().unwrap_or("");
            if let Some((prefix, _)) = qualified_name.split_once(':') {
                if prefix != "xml" {
                    utilized.insert(prefix, ns_uri);
                }
            }
            attrs.push(Attr {
                ns_uri,
                local_name: attr.name(),
                qualified_name,
                value: attr.value(),
            });
        }
        attrs.sort();

        for prefix in self.inclusive_prefixes {
            match prefix.as_str() {
                "#default" => {
                    if let Some(uri) = node.lookup_namespace_uri(None) {
                        utilized.insert("", uri);
                    }
                }
                "xml" => {}
                p => {
                    if let Some(uri) = node.lookup_namespace_uri(Some(p)) {
                        utilized.insert(p, uri);
                    }
                }
            }
        }

        let mut ns_decls = NsDecls::new();
        for (prefix, uri) in &utilized {
            let previous = rendered.get(*prefix).map(String::as_str);
            if uri.is_empty() {
                // An unqualified element below a rendered default namespace
                // must undeclare it.
                if prefix.is_empty() && previous.is_some_and(|p| !p.is_empty()) {
                    ns_decls.insert("", "");
                }
            } else if previous != Some(*uri) {
                ns_decls.insert(prefix, uri);
            }
        }

        render::push_start_tag(output, name, &ns_decls, &attrs);

        let child_rendered;
        let rendered = if ns_decls.is_empty() {
            rendered
        } else {
            let mut updated = rendered.clone();
            for (prefix, uri) in &ns_decls {
                updated.insert((*prefix).to_owned(), (*uri).to_owned());
            }
            child_rendered = updated;
            &child_rendered
        };

        for child in node.children() {
            self.process_node(child, output, rendered);
        }

        render::push_end_tag(output, name);
    }
}

/// Render a comment or PI, adding the line breaks separating nodes outside
/// the document element from it.
fn push_top_level(node: Node<'_, '_>, output: &mut String, emit: impl FnOnce(&mut String)) {
    let top_level = node.parent().is_some_and(|p| p.is_root());
    if top_level && node.prev_siblings().skip(1).any(|n| n.is_element()) {
        output.push('\n');
    }
    emit(output);
    if top_level && node.next_siblings().skip(1).any(|n| n.is_element()) {
        output.push('\n');
    }
}
