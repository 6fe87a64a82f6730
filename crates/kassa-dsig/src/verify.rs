#![forbid(unsafe_code)]

//! The Verifier: decides whether an inbound document was signed by the
//! trusted counterparty and is unmodified.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. exactly one well-formed `<ds:Signature>` block
//! 2. the reference resolves to the enveloping payload element
//! 3. the recomputed digest matches `DigestValue`
//! 4. any embedded certificate carries the trusted public key
//! 5. `SignatureValue` verifies under the trusted key
//! 6. the trusted certificate is within its validity window

use crate::block::{self, ParsedSignature};
use crate::context::VerifyContext;
use crate::transforms::{self, Transform};
use kassa_c14n::C14nMode;
use kassa_core::ns;
use kassa_crypto::{DigestMethod, SignatureMethod};
use kassa_keys::{cert, keyinfo};
use kassa_xml::{select, XmlDocument};
use roxmltree::{Document, Node};
use tracing::{debug, warn};

/// Why a document failed verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidReason {
    #[error("missing signature: {0}")]
    MissingSignature(String),

    #[error("missing signed content: {0}")]
    MissingSignedContent(String),

    #[error("digest mismatch: {0}")]
    DigestMismatch(String),

    #[error("untrusted signer: {0}")]
    UntrustedSigner(String),

    #[error("invalid signature: {0}")]
    SignatureInvalid(String),

    #[error("certificate expired: {0}")]
    CertificateExpired(String),
}

impl InvalidReason {
    /// Stable name of the failure kind, for logs and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingSignature(_) => "MissingSignature",
            Self::MissingSignedContent(_) => "MissingSignedContent",
            Self::DigestMismatch(_) => "DigestMismatch",
            Self::UntrustedSigner(_) => "UntrustedSigner",
            Self::SignatureInvalid(_) => "SignatureInvalid",
            Self::CertificateExpired(_) => "CertificateExpired",
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::MissingSignature(d)
            | Self::MissingSignedContent(d)
            | Self::DigestMismatch(d)
            | Self::UntrustedSigner(d)
            | Self::SignatureInvalid(d)
            | Self::CertificateExpired(d) => d,
        }
    }
}

/// Result of verifying one document.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationResult {
    Valid,
    Invalid(InvalidReason),
}

impl VerificationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    pub fn reason(&self) -> Option<&InvalidReason> {
        match self {
            Self::Valid => None,
            Self::Invalid(reason) => Some(reason),
        }
    }

    pub fn into_result(self) -> Result<(), InvalidReason> {
        match self {
            Self::Valid => Ok(()),
            Self::Invalid(reason) => Err(reason),
        }
    }
}

impl From<Result<(), InvalidReason>> for VerificationResult {
    fn from(result: Result<(), InvalidReason>) -> Self {
        match result {
            Ok(()) => Self::Valid,
            Err(reason) => Self::Invalid(reason),
        }
    }
}

/// Verify the enveloped signature of `doc` against the trusted certificate.
pub fn verify(ctx: &VerifyContext, doc: &XmlDocument) -> VerificationResult {
    verify_payload(ctx, doc).map(|_| ()).into()
}

/// Verify `doc` and return the `Id` of the signed payload element.
pub(crate) fn verify_payload(ctx: &VerifyContext, doc: &XmlDocument) -> Result<String, InvalidReason> {
    let outcome = match doc.parse_doc() {
        Ok(tree) => verify_tree(ctx, &tree),
        Err(e) => Err(InvalidReason::MissingSignature(format!(
            "document does not parse: {e}"
        ))),
    };
    match &outcome {
        Ok(id) => debug!(payload = %id, "signature verified"),
        Err(reason) => warn!(kind = reason.kind(), detail = reason.detail(), "signature rejected"),
    }
    outcome
}

fn verify_tree(ctx: &VerifyContext, tree: &Document<'_>) -> Result<String, InvalidReason> {
    let signature = locate_signature(tree)?;
    let parsed = block::parse_signature(signature)
        .map_err(|e| InvalidReason::MissingSignature(e.to_string()))?;

    let (id, target) = resolve_payload(ctx, tree, &parsed)?;
    check_digest(&parsed, id, target)?;
    check_signer(ctx, signature)?;
    check_signature_value(ctx, &parsed)?;
    check_validity(ctx)?;
    Ok(id.to_owned())
}

fn locate_signature<'a, 'i>(tree: &'a Document<'i>) -> Result<Node<'a, 'i>, InvalidReason> {
    match select::find_elements(tree, ns::DSIG, ns::node::SIGNATURE).as_slice() {
        [] => Err(InvalidReason::MissingSignature(
            "document contains no ds:Signature element".into(),
        )),
        [signature] => Ok(*signature),
        many => Err(InvalidReason::MissingSignature(format!(
            "document contains {} ds:Signature elements, expected one",
            many.len()
        ))),
    }
}

fn resolve_payload<'a, 'i>(
    ctx: &VerifyContext,
    tree: &'a Document<'i>,
    parsed: &ParsedSignature<'a, 'i>,
) -> Result<(&'a str, Node<'a, 'i>), InvalidReason> {
    let id = select::parse_same_document_ref(parsed.reference_uri).ok_or_else(|| {
        InvalidReason::MissingSignedContent(format!(
            "reference URI {:?} is not a same-document #id reference",
            parsed.reference_uri
        ))
    })?;
    let target = select::find_by_id(tree, id)
        .map_err(|e| InvalidReason::MissingSignedContent(e.to_string()))?;
    if !ctx.payload().matches(target) {
        return Err(InvalidReason::MissingSignedContent(format!(
            "#{id} names <{}>, not the payload {}",
            select::qualified_name(target),
            ctx.payload()
        )));
    }
    if parsed.signature.parent().map(|p| p.id()) != Some(target.id()) {
        return Err(InvalidReason::MissingSignedContent(format!(
            "signature is not enveloped by #{id}"
        )));
    }
    Ok((id, target))
}

fn check_digest(
    parsed: &ParsedSignature<'_, '_>,
    id: &str,
    target: Node<'_, '_>,
) -> Result<(), InvalidReason> {
    let transforms = parsed
        .transforms
        .iter()
        .map(|n| Transform::from_node(*n))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| InvalidReason::SignatureInvalid(e.to_string()))?;
    let method = DigestMethod::from_uri(parsed.digest_method_uri)
        .map_err(|e| InvalidReason::SignatureInvalid(e.to_string()))?;
    let octets = transforms::apply(&transforms, target, parsed.signature)
        .map_err(|e| InvalidReason::SignatureInvalid(e.to_string()))?;
    if method.digest(&octets) != parsed.digest_value {
        return Err(InvalidReason::DigestMismatch(format!(
            "{} digest of #{id} does not match DigestValue",
            method.name()
        )));
    }
    Ok(())
}

fn check_signer(ctx: &VerifyContext, signature: Node<'_, '_>) -> Result<(), InvalidReason> {
    let embedded = keyinfo::read_signer_certificate(signature).map_err(|e| {
        InvalidReason::UntrustedSigner(format!("embedded certificate is unusable: {e}"))
    })?;
    let Some(embedded) = embedded else {
        return Ok(());
    };
    let spki = embedded
        .spki_der()
        .map_err(|e| InvalidReason::UntrustedSigner(e.to_string()))?;
    if spki != ctx.trusted_spki() {
        return Err(InvalidReason::UntrustedSigner(format!(
            "embedded certificate {} does not carry the trusted public key",
            embedded.subject()
        )));
    }
    Ok(())
}

fn check_signature_value(
    ctx: &VerifyContext,
    parsed: &ParsedSignature<'_, '_>,
) -> Result<(), InvalidReason> {
    let mode = C14nMode::from_uri(parsed.c14n_uri).ok_or_else(|| {
        InvalidReason::SignatureInvalid(format!(
            "unsupported canonicalization method {}",
            parsed.c14n_uri
        ))
    })?;
    let method = SignatureMethod::from_uri(parsed.signature_method_uri)
        .map_err(|e| InvalidReason::SignatureInvalid(e.to_string()))?;
    let prefixes = transforms::read_inclusive_prefixes(parsed.c14n_method);
    let signed_info = kassa_c14n::canonicalize_subtree(parsed.signed_info, mode, &prefixes)
        .map_err(|e| InvalidReason::SignatureInvalid(e.to_string()))?;
    match method.verify(ctx.trusted_key(), &signed_info, &parsed.signature_value) {
        Ok(true) => Ok(()),
        Ok(false) => Err(InvalidReason::SignatureInvalid(format!(
            "{} signature does not verify under the trusted key",
            method.name()
        ))),
        Err(e) => Err(InvalidReason::SignatureInvalid(e.to_string())),
    }
}

fn check_validity(ctx: &VerifyContext) -> Result<(), InvalidReason> {
    if !ctx.check_validity() {
        return Ok(());
    }
    let now = match ctx.verification_time() {
        Some(time) => time,
        None => cert::now().map_err(|e| InvalidReason::CertificateExpired(e.to_string()))?,
    };
    ctx.trusted_certificate()
        .check_validity_at(&now)
        .map_err(|e| InvalidReason::CertificateExpired(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SignContext;
    use crate::sign::sign;
    use kassa_keys::{testing, Certificate, PrivateKey};

    struct Fixture {
        key: PrivateKey,
        cert: Certificate,
    }

    impl Fixture {
        fn new() -> Self {
            let (key, cert) = testing::rsa_key_pair("CN=Bank").unwrap();
            Self { key, cert }
        }

        fn signed(&self, xml: &str) -> XmlDocument {
            let ctx = SignContext::new(self.key.clone()).with_certificate(self.cert.clone());
            sign(&ctx, XmlDocument::parse(xml).unwrap()).unwrap()
        }

        fn verifier(&self) -> VerifyContext {
            VerifyContext::new(self.cert.clone()).unwrap()
        }
    }

    fn tamper(doc: &XmlDocument, from: &str, to: &str) -> XmlDocument {
        assert!(doc.text().contains(from), "{from} not in {}", doc.text());
        XmlDocument::parse(doc.text().replacen(from, to, 1)).unwrap()
    }

    fn kind(result: VerificationResult) -> &'static str {
        result.reason().map(InvalidReason::kind).unwrap_or("Valid")
    }

    #[test]
    fn test_valid_signature() {
        let f = Fixture::new();
        let doc = f.signed(r#"<Res><Body amount="1000"><Status>OK</Status></Body></Res>"#);
        assert_eq!(verify(&f.verifier(), &doc), VerificationResult::Valid);
    }

    #[test]
    fn test_unsigned_document() {
        let f = Fixture::new();
        let doc = XmlDocument::parse("<Res><Body/></Res>").unwrap();
        assert_eq!(kind(verify(&f.verifier(), &doc)), "MissingSignature");
    }

    #[test]
    fn test_two_signatures() {
        let f = Fixture::new();
        let doc = f.signed("<Res><Body/></Res>");
        let tree = doc.parse_doc().unwrap();
        let sig = select::find_element(&tree, ns::DSIG, ns::node::SIGNATURE).unwrap();
        let markup = &doc.text()[sig.range()];
        let doubled = tamper(&doc, "</Res>", &format!("{markup}</Res>"));
        assert_eq!(kind(verify(&f.verifier(), &doubled)), "MissingSignature");
    }

    #[test]
    fn test_empty_signature_value() {
        let f = Fixture::new();
        let doc = f.signed("<Res><Body/></Res>");
        let tree = doc.parse_doc().unwrap();
        let value = select::find_element(&tree, ns::DSIG, ns::node::SIGNATURE_VALUE).unwrap();
        let text = select::text_content(value);
        let emptied = tamper(&doc, &text, "");
        assert_eq!(kind(verify(&f.verifier(), &emptied)), "MissingSignature");
    }

    #[test]
    fn test_tampered_attribute() {
        let f = Fixture::new();
        let doc = f.signed(r#"<Res><Body amount="1000"/></Res>"#);
        let tampered = tamper(&doc, r#"amount="1000""#, r#"amount="9000""#);
        assert_eq!(kind(verify(&f.verifier(), &tampered)), "DigestMismatch");
    }

    #[test]
    fn test_tampered_text() {
        let f = Fixture::new();
        let doc = f.signed("<Res><Body><Status>OK</Status></Body></Res>");
        let tampered = tamper(&doc, "<Status>OK", "<Status>FAILED");
        assert_eq!(kind(verify(&f.verifier(), &tampered)), "DigestMismatch");
    }

    #[test]
    fn test_content_outside_payload_is_not_covered() {
        let f = Fixture::new();
        let doc = f.signed("<Res><Header>a</Header><Body/></Res>");
        let changed = tamper(&doc, "<Header>a", "<Header>b");
        assert!(verify(&f.verifier(), &changed).is_valid());
    }

    #[test]
    fn test_reference_to_unknown_id() {
        let f = Fixture::new();
        let doc = f.signed(r#"<Res><Body Id="b1"/></Res>"#);
        let moved = tamper(&doc, r##"URI="#b1""##, r##"URI="#b2""##);
        assert_eq!(kind(verify(&f.verifier(), &moved)), "MissingSignedContent");
    }

    #[test]
    fn test_reference_to_non_payload_element() {
        let f = Fixture::new();
        let doc = f.signed(r#"<Res><Note Id="n"/><Body Id="b1"/></Res>"#);
        let moved = tamper(&doc, r##"URI="#b1""##, r##"URI="#n""##);
        assert_eq!(kind(verify(&f.verifier(), &moved)), "MissingSignedContent");
    }

    #[test]
    fn test_signature_moved_out_of_payload() {
        let f = Fixture::new();
        let doc = f.signed(r#"<Res><Body Id="b1"><Status>OK</Status></Body><Note/></Res>"#);
        let tree = doc.parse_doc().unwrap();
        let sig = select::find_element(&tree, ns::DSIG, ns::node::SIGNATURE).unwrap();
        let markup = doc.text()[sig.range()].to_owned();
        let moved = doc
            .text()
            .replacen(&markup, "", 1)
            .replacen("<Note/>", &format!("<Note>{markup}</Note>"), 1);
        let moved = XmlDocument::parse(moved).unwrap();
        assert_eq!(
            verify(&f.verifier(), &moved),
            VerificationResult::Invalid(InvalidReason::MissingSignedContent(
                "signature is not enveloped by #b1".into()
            ))
        );
    }

    #[test]
    fn test_ecdsa_p256_round_trip() {
        let key = testing::p256_key();
        let cert = testing::self_signed(&key, "CN=Bank").unwrap();
        let ctx = SignContext::new(key).with_certificate(cert.clone());
        assert_eq!(ctx.profile().signature, SignatureMethod::EcdsaP256Sha256);
        let request = XmlDocument::parse("<Res><Body><Status>OK</Status></Body></Res>").unwrap();
        let doc = sign(&ctx, request).unwrap();
        assert!(doc.text().contains("ecdsa-sha256"));

        let verifier = VerifyContext::new(cert).unwrap();
        assert_eq!(verify(&verifier, &doc), VerificationResult::Valid);
        let tampered = tamper(&doc, "<Status>OK", "<Status>NO");
        assert_eq!(kind(verify(&verifier, &tampered)), "DigestMismatch");
    }

    #[test]
    fn test_signature_from_other_key() {
        let f = Fixture::new();
        let other = Fixture::new();
        let doc = other.signed("<Res><Body/></Res>");
        assert_eq!(kind(verify(&f.verifier(), &doc)), "UntrustedSigner");
    }

    #[test]
    fn test_signature_from_other_key_without_certificate() {
        let f = Fixture::new();
        let other = testing::rsa_key().unwrap();
        let doc = sign(
            &SignContext::new(other),
            XmlDocument::parse("<Res><Body/></Res>").unwrap(),
        )
        .unwrap();
        assert_eq!(kind(verify(&f.verifier(), &doc)), "SignatureInvalid");
    }

    #[test]
    fn test_tampered_signed_info() {
        let f = Fixture::new();
        let doc = f.signed("<Res><Body/></Res>");
        // Serialization changes that canonicalize away are harmless.
        let tampered = tamper(
            &doc,
            r#"<ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/>"#,
            r#"<ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256" ></ds:DigestMethod>"#,
        );
        assert!(verify(&f.verifier(), &tampered).is_valid());

        let tampered = tamper(
            &doc,
            r#"<ds:SignedInfo>"#,
            r#"<ds:SignedInfo Id="x">"#,
        );
        assert_eq!(kind(verify(&f.verifier(), &tampered)), "SignatureInvalid");
    }

    #[test]
    fn test_unsupported_signature_method() {
        let f = Fixture::new();
        let doc = f.signed("<Res><Body/></Res>");
        let tampered = tamper(
            &doc,
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256",
            "http://www.w3.org/2001/04/xmldsig-more#rsa-md5",
        );
        assert_eq!(kind(verify(&f.verifier(), &tampered)), "SignatureInvalid");
    }

    #[test]
    fn test_expired_certificate() {
        let f = Fixture::new();
        let expired = testing::expired_certificate(&f.key, "CN=Bank").unwrap();
        let ctx = SignContext::new(f.key.clone()).with_certificate(expired.clone());
        let doc = sign(&ctx, XmlDocument::parse("<Res><Body/></Res>").unwrap()).unwrap();

        let verifier = VerifyContext::new(expired.clone()).unwrap();
        assert_eq!(kind(verify(&verifier, &doc)), "CertificateExpired");

        let lenient = VerifyContext::new(expired).unwrap().with_validity_check(false);
        assert!(verify(&lenient, &doc).is_valid());
    }

    #[test]
    fn test_fixed_verification_time() {
        let f = Fixture::new();
        let doc = f.signed("<Res><Body/></Res>");
        let past = kassa_keys::parse_verification_time("2001-01-01 00:00:00").unwrap();
        let verifier = f.verifier().with_verification_time(past);
        assert_eq!(kind(verify(&verifier, &doc)), "CertificateExpired");
    }

    #[test]
    fn test_into_result() {
        let f = Fixture::new();
        let doc = XmlDocument::parse("<Res/>").unwrap();
        let err = verify(&f.verifier(), &doc).into_result().unwrap_err();
        assert!(err.to_string().starts_with("missing signature: "));
    }
}
