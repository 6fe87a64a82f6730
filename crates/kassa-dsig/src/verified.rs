#![forbid(unsafe_code)]

//! Documents that passed verification.

use crate::context::VerifyContext;
use crate::verify::{self, InvalidReason};
use kassa_core::ns;
use kassa_xml::{select, XmlDocument};
use roxmltree::Node;

/// A document whose enveloped signature verified against the trusted
/// certificate.
///
/// Only [`verify_document`] and
/// [`accept_response`](crate::response::accept_response) construct one.
/// Field lookups are confined to the signed payload element and never look
/// inside the signature block.
#[derive(Debug, Clone)]
pub struct VerifiedDocument {
    document: XmlDocument,
    payload_id: String,
}

impl VerifiedDocument {
    pub fn document(&self) -> &XmlDocument {
        &self.document
    }

    pub fn into_inner(self) -> XmlDocument {
        self.document
    }

    /// `Id` of the signed payload element.
    pub fn payload_id(&self) -> &str {
        &self.payload_id
    }

    /// Trimmed text of the first payload descendant with this local name.
    pub fn field(&self, local_name: &str) -> Option<String> {
        self.fields(local_name).into_iter().next()
    }

    /// Trimmed text of every payload descendant with this local name, in
    /// document order.
    pub fn fields(&self, local_name: &str) -> Vec<String> {
        self.with_payload(|payload| {
            payload
                .descendants()
                .skip(1)
                .filter(|n| n.is_element() && n.tag_name().name() == local_name)
                .filter(|n| !inside_signature(*n))
                .map(|n| select::text_content(n).trim().to_owned())
                .collect()
        })
        .unwrap_or_default()
    }

    /// An unqualified attribute of the payload element itself.
    pub fn payload_attribute(&self, name: &str) -> Option<String> {
        self.with_payload(|payload| payload.attribute(name).map(str::to_owned))
            .flatten()
    }

    fn with_payload<T>(&self, f: impl FnOnce(Node<'_, '_>) -> T) -> Option<T> {
        let tree = self.document.parse_doc().ok()?;
        let payload = select::find_by_id(&tree, &self.payload_id).ok()?;
        Some(f(payload))
    }
}

fn inside_signature(node: Node<'_, '_>) -> bool {
    node.ancestors()
        .any(|a| select::is_element(a, ns::DSIG, ns::node::SIGNATURE))
}

/// Verify `document` and, when valid, hand it back as a [`VerifiedDocument`].
pub fn verify_document(
    ctx: &VerifyContext,
    document: XmlDocument,
) -> Result<VerifiedDocument, InvalidReason> {
    let payload_id = verify::verify_payload(ctx, &document)?;
    Ok(VerifiedDocument {
        document,
        payload_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SignContext;
    use crate::sign::sign;
    use kassa_keys::testing;

    fn signed_response(xml: &str) -> (XmlDocument, VerifyContext) {
        let (key, cert) = testing::rsa_key_pair("CN=Bank").unwrap();
        let ctx = SignContext::new(key).with_certificate(cert.clone());
        let doc = sign(&ctx, XmlDocument::parse(xml).unwrap()).unwrap();
        (doc, VerifyContext::new(cert).unwrap())
    }

    #[test]
    fn test_fields_come_from_payload_only() {
        let (doc, ctx) = signed_response(
            r#"<Res><Header><Status>FORGED</Status></Header><Body result="0"><Status> OK </Status><Ref>1</Ref><Ref>2</Ref></Body></Res>"#,
        );
        let verified = verify_document(&ctx, doc).unwrap();
        assert_eq!(verified.field("Status").as_deref(), Some("OK"));
        assert_eq!(verified.fields("Ref"), vec!["1", "2"]);
        assert_eq!(verified.payload_attribute("result").as_deref(), Some("0"));
        assert!(verified.field("Missing").is_none());
        assert!(verified.payload_id().starts_with('_'));
    }

    #[test]
    fn test_signature_block_is_not_a_field_source() {
        let (doc, ctx) = signed_response("<Res><Body/></Res>");
        let verified = verify_document(&ctx, doc).unwrap();
        assert!(verified.field("DigestValue").is_none());
        assert!(verified.field("X509Certificate").is_none());
    }

    #[test]
    fn test_invalid_document_is_not_returned() {
        let (doc, ctx) = signed_response("<Res><Body><Status>OK</Status></Body></Res>");
        let tampered =
            XmlDocument::parse(doc.text().replace("<Status>OK", "<Status>NOK")).unwrap();
        let err = verify_document(&ctx, tampered).unwrap_err();
        assert!(matches!(err, InvalidReason::DigestMismatch(_)));
    }
}
