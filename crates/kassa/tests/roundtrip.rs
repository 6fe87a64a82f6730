//! End-to-end signing and verification of payment messages.

use kassa::core::ns;
use kassa::keys::{keyinfo, testing, Certificate, PrivateKey};
use kassa::xml::select;
use kassa::{
    accept_response, sign, verify, verify_document, InvalidReason, ResponseError, SignContext,
    VerificationResult, VerifyContext, XmlDocument,
};
use std::sync::Arc;

struct Party {
    key: PrivateKey,
    cert: Certificate,
}

impl Party {
    fn new(subject: &str) -> Self {
        let (key, cert) = testing::rsa_key_pair(subject).unwrap();
        Self { key, cert }
    }

    fn signer(&self) -> SignContext {
        SignContext::new(self.key.clone()).with_certificate(self.cert.clone())
    }

    fn verifier(&self) -> VerifyContext {
        VerifyContext::new(self.cert.clone()).unwrap()
    }

    fn sign(&self, xml: &str) -> XmlDocument {
        sign(&self.signer(), XmlDocument::parse(xml).unwrap()).unwrap()
    }
}

fn reason(result: VerificationResult) -> InvalidReason {
    result.into_result().unwrap_err()
}

fn element_text(doc: &XmlDocument, local_name: &str) -> String {
    let tree = doc.parse_doc().unwrap();
    let node = select::find_element(&tree, ns::DSIG, local_name).unwrap();
    select::text_content(node)
}

#[test]
fn test_scenario_sign_serialize_parse_verify() {
    let merchant = Party::new("CN=Merchant");
    let signed = merchant.sign(r#"<Req><Body amount="1000"/></Req>"#);

    let wire = signed.text().to_owned();
    let received = XmlDocument::parse(wire).unwrap();
    assert_eq!(verify(&merchant.verifier(), &received), VerificationResult::Valid);

    let unrelated = Party::new("CN=Unrelated");
    assert!(matches!(
        reason(verify(&unrelated.verifier(), &received)),
        InvalidReason::UntrustedSigner(_)
    ));
}

#[test]
fn test_unrelated_certificate_without_embedded_certificate() {
    let merchant = Party::new("CN=Merchant");
    let ctx = SignContext::new(merchant.key.clone());
    let signed = sign(&ctx, XmlDocument::parse(r#"<Req><Body amount="1000"/></Req>"#).unwrap())
        .unwrap();
    let unrelated = Party::new("CN=Unrelated");
    assert!(matches!(
        reason(verify(&unrelated.verifier(), &signed)),
        InvalidReason::SignatureInvalid(_)
    ));
}

#[test]
fn test_soap_envelope_round_trip() {
    let bank = Party::new("CN=Bank");
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/" xmlns:p="urn:payments">
  <soap:Header/>
  <soap:Body>
    <p:AuthorizeResponse>
      <p:Result code="00">Approved</p:Result>
      <!-- processor note -->
      <p:Amount currency="EUR">10.00</p:Amount>
    </p:AuthorizeResponse>
  </soap:Body>
</soap:Envelope>"#;
    let signed = bank.sign(xml);
    let verified = verify_document(&bank.verifier(), signed).unwrap();
    assert_eq!(verified.field("Result").as_deref(), Some("Approved"));
    assert_eq!(verified.field("Amount").as_deref(), Some("10.00"));
}

#[test]
fn test_tampering_after_signing() {
    let bank = Party::new("CN=Bank");
    let signed = bank.sign(r#"<Res><Body amount="1000"><Code>00</Code></Body></Res>"#);
    for (from, to) in [
        (r#"amount="1000""#, r#"amount="1""#),
        ("<Code>00</Code>", "<Code>05</Code>"),
        ("<Code>00</Code>", "<Code>00</Code><Extra/>"),
    ] {
        let tampered = XmlDocument::parse(signed.text().replacen(from, to, 1)).unwrap();
        assert!(
            matches!(reason(verify(&bank.verifier(), &tampered)), InvalidReason::DigestMismatch(_)),
            "{from} -> {to}"
        );
    }
}

#[test]
fn test_embedded_certificate_swap_is_untrusted() {
    let bank = Party::new("CN=Bank");
    let attacker = Party::new("CN=Bank");
    let signed = bank.sign("<Res><Body><Code>00</Code></Body></Res>");

    let original = element_text(&signed, ns::node::X509_CERTIFICATE);
    let forged = keyinfo::encode_base64(attacker.cert.der());
    let swapped = XmlDocument::parse(signed.text().replace(&original, &forged)).unwrap();
    assert!(matches!(
        reason(verify(&bank.verifier(), &swapped)),
        InvalidReason::UntrustedSigner(_)
    ));
}

#[test]
fn test_attacker_resigned_document_is_never_valid() {
    let bank = Party::new("CN=Bank");
    let attacker = Party::new("CN=Bank");
    let forged = attacker.sign("<Res><Body><Code>00</Code></Body></Res>");
    assert!(!verify(&bank.verifier(), &forged).is_valid());

    let bare = sign(
        &SignContext::new(attacker.key.clone()),
        XmlDocument::parse("<Res><Body><Code>00</Code></Body></Res>").unwrap(),
    )
    .unwrap();
    assert!(!verify(&bank.verifier(), &bare).is_valid());
}

#[test]
fn test_wrapped_payload_with_duplicate_id() {
    let bank = Party::new("CN=Bank");
    let signed = bank.sign(r#"<Res><Body Id="pay"><Code>00</Code></Body></Res>"#);
    let wrapped = XmlDocument::parse(
        signed
            .text()
            .replacen("<Res>", r#"<Res><Body Id="pay"><Code>05</Code></Body>"#, 1),
    )
    .unwrap();
    assert!(matches!(
        reason(verify(&bank.verifier(), &wrapped)),
        InvalidReason::MissingSignedContent(_)
    ));
}

#[test]
fn test_canonical_form_ignores_attribute_order_and_markup_whitespace() {
    let merchant = Party::new("CN=Merchant");
    let a = merchant.sign(r#"<Req><Body Id="p" b="2" a="1"><Item  n="x"   /></Body></Req>"#);
    let b = merchant.sign("<Req>\n<Body a='1'\n      Id='p' b='2'><Item n=\"x\"></Item></Body>\n</Req>");
    assert_eq!(
        element_text(&a, ns::node::DIGEST_VALUE),
        element_text(&b, ns::node::DIGEST_VALUE)
    );
    assert!(verify(&merchant.verifier(), &b).is_valid());
}

#[test]
fn test_canonical_form_ignores_indentation_inside_payload() {
    let merchant = Party::new("CN=Merchant");
    let compact = merchant
        .sign(r#"<Req><Body Id="p"><Order><Amount>1000</Amount></Order><Ref>7</Ref></Body></Req>"#);
    let pretty = merchant.sign(
        "<Req>\n  <Body Id=\"p\">\n    <Order>\n      <Amount>1000</Amount>\n    </Order>\n    <Ref>7</Ref>\n  </Body>\n</Req>",
    );
    assert_eq!(
        element_text(&compact, ns::node::DIGEST_VALUE),
        element_text(&pretty, ns::node::DIGEST_VALUE)
    );
    assert!(verify(&merchant.verifier(), &pretty).is_valid());
}

#[test]
fn test_zero_or_two_signature_blocks() {
    let bank = Party::new("CN=Bank");
    let unsigned = XmlDocument::parse("<Res><Body/></Res>").unwrap();
    assert!(matches!(
        reason(verify(&bank.verifier(), &unsigned)),
        InvalidReason::MissingSignature(_)
    ));

    let signed = bank.sign("<Res><Body/><Note/></Res>");
    let block = {
        let tree = signed.parse_doc().unwrap();
        let sig = select::find_element(&tree, ns::DSIG, ns::node::SIGNATURE).unwrap();
        signed.text()[sig.range()].to_owned()
    };
    let doubled =
        XmlDocument::parse(signed.text().replacen("<Note/>", &format!("<Note>{block}</Note>"), 1))
            .unwrap();
    assert!(matches!(
        reason(verify(&bank.verifier(), &doubled)),
        InvalidReason::MissingSignature(_)
    ));
}

#[test]
fn test_expired_trusted_certificate() {
    let key = testing::rsa_key().unwrap();
    let expired = testing::expired_certificate(&key, "CN=Bank").unwrap();
    let signed = sign(
        &SignContext::new(key).with_certificate(expired.clone()),
        XmlDocument::parse("<Res><Body/></Res>").unwrap(),
    )
    .unwrap();
    assert!(matches!(
        reason(verify(&VerifyContext::new(expired).unwrap(), &signed)),
        InvalidReason::CertificateExpired(_)
    ));
}

#[test]
fn test_fields_outside_payload_are_not_readable() {
    let bank = Party::new("CN=Bank");
    let signed = bank.sign("<Res><Body><Code>00</Code></Body></Res>");
    let injected = XmlDocument::parse(
        signed
            .text()
            .replacen("<Res>", "<Res><Header><Code>99</Code><Limit>1</Limit></Header>", 1),
    )
    .unwrap();
    let verified = verify_document(&bank.verifier(), injected).unwrap();
    assert_eq!(verified.fields("Code"), vec!["00"]);
    assert!(verified.field("Limit").is_none());
}

#[test]
fn test_no_response_is_not_a_verification_failure() {
    let bank = Party::new("CN=Bank");
    assert!(matches!(
        accept_response(&bank.verifier(), None),
        Err(ResponseError::NoResponse)
    ));
    assert!(matches!(
        accept_response(&bank.verifier(), Some("<Res><Body/></Res>")),
        Err(ResponseError::Rejected(InvalidReason::MissingSignature(_)))
    ));
}

#[test]
fn test_concurrent_verification_with_shared_context() {
    let bank = Party::new("CN=Bank");
    let ctx = Arc::new(bank.verifier());
    let documents: Vec<XmlDocument> = (0..16)
        .map(|i| bank.sign(&format!(r#"<Res><Body seq="{i}"/></Res>"#)))
        .collect();

    std::thread::scope(|scope| {
        for (i, doc) in documents.iter().enumerate() {
            let ctx = Arc::clone(&ctx);
            scope.spawn(move || {
                assert!(verify(&ctx, doc).is_valid());
                let tampered = XmlDocument::parse(
                    doc.text()
                        .replacen(&format!(r#"seq="{i}""#), r#"seq="x""#, 1),
                )
                .unwrap();
                assert!(!verify(&ctx, &tampered).is_valid());
            });
        }
    });
}
