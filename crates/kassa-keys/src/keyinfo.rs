#![forbid(unsafe_code)]

//! `<ds:KeyInfo>` writing and reading.
//!
//! Only `X509Data/X509Certificate` is produced or read. An embedded
//! certificate is informational; callers decide whether it is trusted.

use crate::cert::Certificate;
use base64::Engine;
use kassa_core::{ns, Error};
use kassa_xml::{select, XmlWriter};

/// Decode a base64 element value, ignoring embedded whitespace.
pub fn decode_base64(text: &str) -> Result<Vec<u8>, Error> {
    let clean: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if clean.is_empty() {
        return Err(Error::Base64("empty value".into()));
    }
    base64::engine::general_purpose::STANDARD
        .decode(&clean)
        .map_err(|e| Error::Base64(e.to_string()))
}

pub fn encode_base64(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

fn qname(prefix: &str, local_name: &str) -> String {
    if prefix.is_empty() {
        local_name.to_owned()
    } else {
        format!("{prefix}:{local_name}")
    }
}

/// Write `<KeyInfo><X509Data><X509Certificate>` for `cert`.
pub fn write_x509_key_info(
    writer: &mut XmlWriter,
    prefix: &str,
    cert: &Certificate,
) -> Result<(), Error> {
    let key_info = qname(prefix, ns::node::KEY_INFO);
    let x509_data = qname(prefix, ns::node::X509_DATA);
    writer.start_element(&key_info, &[])?;
    writer.start_element(&x509_data, &[])?;
    writer.text_element(
        &qname(prefix, ns::node::X509_CERTIFICATE),
        &[],
        &encode_base64(cert.der()),
    )?;
    writer.end_element(&x509_data)?;
    writer.end_element(&key_info)
}

/// Read the signer certificate embedded in a `<ds:Signature>` element.
///
/// Returns `Ok(None)` when the signature carries no `X509Certificate`. The
/// first certificate is the signer's; any following ones are ignored. An
/// undecodable or unparseable certificate is an error.
pub fn read_signer_certificate(
    signature: roxmltree::Node<'_, '_>,
) -> Result<Option<Certificate>, Error> {
    let cert_node = select::find_child_elements(signature, ns::DSIG, ns::node::KEY_INFO)
        .into_iter()
        .flat_map(|key_info| select::find_child_elements(key_info, ns::DSIG, ns::node::X509_DATA))
        .flat_map(|data| select::find_child_elements(data, ns::DSIG, ns::node::X509_CERTIFICATE))
        .next();

    let Some(cert_node) = cert_node else {
        return Ok(None);
    };
    let der = decode_base64(&select::text_content(cert_node))?;
    Certificate::from_der(&der).map(Some)
}
