#![forbid(unsafe_code)]

//! The `<ds:Signature>` block: building it for the Signer and reading it
//! back for the Verifier.

use kassa_c14n::C14nMode;
use kassa_core::{algorithm, ns, Error};
use kassa_crypto::{DigestMethod, SignatureMethod};
use kassa_keys::{keyinfo, Certificate};
use kassa_xml::{select, XmlWriter};
use roxmltree::Node;

/// Inputs to the signature markup written into the payload.
///
/// `SignatureValue` is written empty; it is filled in once the block sits
/// in the document and `SignedInfo` can be canonicalized in place.
#[derive(Debug)]
pub struct SignatureBlock<'a> {
    pub reference_id: &'a str,
    pub c14n: C14nMode,
    pub digest: DigestMethod,
    pub digest_value: &'a [u8],
    pub signature: SignatureMethod,
    pub certificate: Option<&'a Certificate>,
}

fn ds(local_name: &str) -> String {
    format!("{}:{local_name}", ns::DSIG_PREFIX)
}

impl SignatureBlock<'_> {
    /// Serialize the block as compact markup declaring its own `ds` prefix.
    pub fn to_markup(&self) -> Result<String, Error> {
        let reference_uri = format!("#{}", self.reference_id);
        let xmlns = format!("xmlns:{}", ns::DSIG_PREFIX);

        let mut w = XmlWriter::new();
        w.start_element(&ds(ns::node::SIGNATURE), &[(xmlns.as_str(), ns::DSIG)])?;
        w.start_element(&ds(ns::node::SIGNED_INFO), &[])?;
        w.empty_element(
            &ds(ns::node::CANONICALIZATION_METHOD),
            &[(ns::attr::ALGORITHM, self.c14n.uri())],
        )?;
        w.empty_element(
            &ds(ns::node::SIGNATURE_METHOD),
            &[(ns::attr::ALGORITHM, self.signature.uri())],
        )?;
        w.start_element(
            &ds(ns::node::REFERENCE),
            &[(ns::attr::URI, reference_uri.as_str())],
        )?;
        w.start_element(&ds(ns::node::TRANSFORMS), &[])?;
        w.empty_element(
            &ds(ns::node::TRANSFORM),
            &[(ns::attr::ALGORITHM, algorithm::ENVELOPED_SIGNATURE)],
        )?;
        w.empty_element(
            &ds(ns::node::TRANSFORM),
            &[(ns::attr::ALGORITHM, self.c14n.uri())],
        )?;
        w.end_element(&ds(ns::node::TRANSFORMS))?;
        w.empty_element(
            &ds(ns::node::DIGEST_METHOD),
            &[(ns::attr::ALGORITHM, self.digest.uri())],
        )?;
        w.text_element(
            &ds(ns::node::DIGEST_VALUE),
            &[],
            &keyinfo::encode_base64(self.digest_value),
        )?;
        w.end_element(&ds(ns::node::REFERENCE))?;
        w.end_element(&ds(ns::node::SIGNED_INFO))?;
        w.text_element(&ds(ns::node::SIGNATURE_VALUE), &[], "")?;
        if let Some(cert) = self.certificate {
            keyinfo::write_x509_key_info(&mut w, ns::DSIG_PREFIX, cert)?;
        }
        w.end_element(&ds(ns::node::SIGNATURE))?;
        w.into_string()
    }
}

/// A `<ds:Signature>` element with its required parts located.
///
/// Algorithm URIs are kept as written; resolving them is left to the
/// Verifier so that an unknown algorithm is reported separately from a
/// structurally broken block.
#[derive(Debug)]
pub struct ParsedSignature<'a, 'i> {
    pub signature: Node<'a, 'i>,
    pub signed_info: Node<'a, 'i>,
    pub c14n_method: Node<'a, 'i>,
    pub c14n_uri: &'a str,
    pub signature_method_uri: &'a str,
    pub reference_uri: &'a str,
    pub transforms: Vec<Node<'a, 'i>>,
    pub digest_method_uri: &'a str,
    pub digest_value: Vec<u8>,
    pub signature_value: Vec<u8>,
}

fn required_child<'a, 'i>(parent: Node<'a, 'i>, local_name: &str) -> Result<Node<'a, 'i>, Error> {
    select::find_child_element(parent, ns::DSIG, local_name).ok_or_else(|| {
        Error::XmlStructure(format!(
            "<{}> has no <ds:{local_name}>",
            select::qualified_name(parent)
        ))
    })
}

fn required_algorithm<'a>(node: Node<'a, '_>) -> Result<&'a str, Error> {
    node.attribute(ns::attr::ALGORITHM).ok_or_else(|| {
        Error::XmlStructure(format!(
            "<{}> has no Algorithm attribute",
            select::qualified_name(node)
        ))
    })
}

/// Locate the parts of a signature block.
///
/// Exactly one `<ds:Reference>` is accepted. Empty or undecodable
/// `DigestValue` and `SignatureValue` are structural errors.
pub fn parse_signature<'a, 'i>(signature: Node<'a, 'i>) -> Result<ParsedSignature<'a, 'i>, Error> {
    let signed_info = required_child(signature, ns::node::SIGNED_INFO)?;
    let c14n_method = required_child(signed_info, ns::node::CANONICALIZATION_METHOD)?;
    let c14n_uri = required_algorithm(c14n_method)?;
    let signature_method_uri =
        required_algorithm(required_child(signed_info, ns::node::SIGNATURE_METHOD)?)?;

    let reference = match select::find_child_elements(signed_info, ns::DSIG, ns::node::REFERENCE)
        .as_slice()
    {
        [] => return Err(Error::XmlStructure("<ds:SignedInfo> has no <ds:Reference>".into())),
        [reference] => *reference,
        many => {
            return Err(Error::XmlStructure(format!(
                "<ds:SignedInfo> has {} references, expected one",
                many.len()
            )))
        }
    };
    let reference_uri = reference
        .attribute(ns::attr::URI)
        .ok_or_else(|| Error::XmlStructure("<ds:Reference> has no URI attribute".into()))?;
    let transforms = select::find_child_element(reference, ns::DSIG, ns::node::TRANSFORMS)
        .map(|t| select::find_child_elements(t, ns::DSIG, ns::node::TRANSFORM))
        .unwrap_or_default();
    let digest_method_uri = required_algorithm(required_child(reference, ns::node::DIGEST_METHOD)?)?;

    let digest_value = keyinfo::decode_base64(&select::text_content(required_child(
        reference,
        ns::node::DIGEST_VALUE,
    )?))
    .map_err(|e| Error::XmlStructure(format!("<ds:DigestValue>: {e}")))?;
    let signature_value = keyinfo::decode_base64(&select::text_content(required_child(
        signature,
        ns::node::SIGNATURE_VALUE,
    )?))
    .map_err(|e| Error::XmlStructure(format!("<ds:SignatureValue>: {e}")))?;

    Ok(ParsedSignature {
        signature,
        signed_info,
        c14n_method,
        c14n_uri,
        signature_method_uri,
        reference_uri,
        transforms,
        digest_method_uri,
        digest_value,
        signature_value,
    })
}
