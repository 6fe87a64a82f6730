#![forbid(unsafe_code)]

//! Element lookups used by the signer and verifier.
//!
//! Only the patterns XML-DSig processing needs here are supported: lookup by
//! namespace and local name, same-document `#id` references and ID
//! attribute resolution.

use kassa_core::{ns, Error};
use roxmltree::{Document, Node};

/// Parse a same-document reference (e.g., `#foo` → `foo`).
pub fn parse_same_document_ref(uri: &str) -> Option<&str> {
    uri.strip_prefix('#').filter(|id| !id.is_empty())
}

/// Whether `node` is an element with the given namespace and local name.
///
/// An empty `ns` matches elements in no namespace.
pub fn is_element(node: Node<'_, '_>, ns: &str, local_name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == local_name
        && node.tag_name().namespace().unwrap_or("") == ns
}

/// Find the first descendant element with the given namespace and local name.
pub fn find_element<'a, 'i>(
    doc: &'a Document<'i>,
    ns: &str,
    local_name: &str,
) -> Option<Node<'a, 'i>> {
    doc.descendants().find(|n| is_element(*n, ns, local_name))
}

/// Find all descendant elements with the given namespace and local name.
pub fn find_elements<'a, 'i>(
    doc: &'a Document<'i>,
    ns: &str,
    local_name: &str,
) -> Vec<Node<'a, 'i>> {
    doc.descendants()
        .filter(|n| is_element(*n, ns, local_name))
        .collect()
}

/// Find the first child element with the given namespace and local name.
pub fn find_child_element<'a, 'i>(
    parent: Node<'a, 'i>,
    ns: &str,
    local_name: &str,
) -> Option<Node<'a, 'i>> {
    parent.children().find(|n| is_element(*n, ns, local_name))
}

pub fn find_child_elements<'a, 'i>(
    parent: Node<'a, 'i>,
    ns: &str,
    local_name: &str,
) -> Vec<Node<'a, 'i>> {
    parent
        .children()
        .filter(|n| is_element(*n, ns, local_name))
        .collect()
}

/// The element name as written in the source, prefix included.
pub fn qualified_name<'i>(node: Node<'_, 'i>) -> &'i str {
    let text = node.document().input_text();
    let start = node.range().start + 1;
    let rest = &text[start..];
    let end = rest
        .find(|c: char| c.is_ascii_whitespace() || c == '/' || c == '>')
        .unwrap_or(rest.len());
    &rest[..end]
}

/// The namespace prefix of an element as written in the source.
pub fn element_prefix<'i>(node: Node<'_, 'i>) -> Option<&'i str> {
    qualified_name(node).split_once(':').map(|(prefix, _)| prefix)
}

/// The ID attribute value of an element, if it carries one.
///
/// `Id`, `ID` and `id` without a namespace are recognized, as is `wsu:Id`.
pub fn id_value<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    node.attributes()
        .find(|a| match a.namespace() {
            None => ns::attr::ID_NAMES.contains(&a.name()),
            Some(uri) => uri == ns::WSU && a.name() == ns::attr::ID,
        })
        .map(|a| a.value())
}

/// Resolve an ID value to exactly one element.
///
/// Fails when no element carries the ID or when more than one does.
pub fn find_by_id<'a, 'i>(doc: &'a Document<'i>, id: &str) -> Result<Node<'a, 'i>, Error> {
    let mut matches = doc
        .descendants()
        .filter(|n| n.is_element() && id_value(*n) == Some(id));
    let first = matches
        .next()
        .ok_or_else(|| Error::XmlStructure(format!("ID not found: {id}")))?;
    if matches.next().is_some() {
        return Err(Error::XmlStructure(format!("duplicate ID: {id}")));
    }
    Ok(first)
}

/// Concatenated text of all descendant text nodes.
pub fn text_content(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

/// Check if `ancestor` is an ancestor-or-self of `node`.
pub fn is_ancestor_or_self(ancestor: Node<'_, '_>, node: Node<'_, '_>) -> bool {
    node.ancestors().any(|n| n.id() == ancestor.id())
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = r#"<s:Envelope xmlns:s="urn:soap" xmlns:wsu="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd">
  <s:Header><token wsu:Id="tok-1">abc</token></s:Header>
  <s:Body Id="body-1"><pay amount="10">ok<b>!</b></pay><pay/></s:Body>
</s:Envelope>"#;

    #[test]
    fn test_parse_same_document_ref() {
        assert_eq!(parse_same_document_ref("#body-1"), Some("body-1"));
        assert_eq!(parse_same_document_ref("#"), None);
        assert_eq!(parse_same_document_ref(""), None);
        assert_eq!(parse_same_document_ref("http://x/#a"), None);
    }

    #[test]
    fn test_find_elements_by_namespace() {
        let doc = Document::parse(XML).unwrap();
        let body = find_element(&doc, "urn:soap", "Body").unwrap();
        assert_eq!(qualified_name(body), "s:Body");
        assert_eq!(element_prefix(body), Some("s"));
        assert!(find_element(&doc, "", "Body").is_none());
        assert_eq!(find_elements(&doc, "", "pay").len(), 2);
        assert_eq!(find_child_elements(body, "", "pay").len(), 2);
        assert!(find_child_element(body, "", "b").is_none());
    }

    #[test]
    fn test_qualified_name_of_self_closing() {
        let doc = Document::parse("<a><p:b xmlns:p=\"urn:p\"/><c/></a>").unwrap();
        let names: Vec<&str> = doc
            .descendants()
            .filter(|n| n.is_element())
            .map(qualified_name)
            .collect();
        assert_eq!(names, vec!["a", "p:b", "c"]);
    }

    #[test]
    fn test_find_by_id() {
        let doc = Document::parse(XML).unwrap();
        assert_eq!(find_by_id(&doc, "body-1").unwrap().tag_name().name(), "Body");
        assert_eq!(find_by_id(&doc, "tok-1").unwrap().tag_name().name(), "token");
        assert!(find_by_id(&doc, "missing").is_err());
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let doc = Document::parse(r#"<r><a Id="x"/><b id="x"/></r>"#).unwrap();
        assert!(find_by_id(&doc, "x").is_err());
    }

    #[test]
    fn test_text_content() {
        let doc = Document::parse(XML).unwrap();
        let pay = find_element(&doc, "", "pay").unwrap();
        assert_eq!(text_content(pay), "ok!");
        assert!(is_ancestor_or_self(doc.root_element(), pay));
        assert!(!is_ancestor_or_self(pay, doc.root_element()));
    }
}
