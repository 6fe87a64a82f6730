#![forbid(unsafe_code)]

//! The Signer: turns an outgoing request into an enveloped-signed document.
//!
//! The payload element gets an `Id` when it has none, whitespace-only text
//! between its elements is dropped, its canonical form is digested, and a
//! `<ds:Signature>` block is appended as its last child.
//! The signature value is computed over the canonical `<ds:SignedInfo>` as
//! it sits in the final document.

use crate::block::SignatureBlock;
use crate::context::SignContext;
use kassa_c14n::C14nMode;
use kassa_core::{ns, Error};
use kassa_crypto::{KeyFamily, SignatureMethod};
use kassa_keys::keyinfo;
use kassa_xml::{select, NodeSet, XmlDocument};
use roxmltree::NodeId;
use tracing::debug;

/// Why a request could not be signed.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("no element matches payload selector {0}")]
    MissingPayload(String),

    #[error("{count} elements match payload selector {selector}, expected one")]
    AmbiguousPayload { selector: String, count: usize },

    #[error("document already contains a ds:Signature element")]
    AlreadySigned,

    #[error("a {key} key cannot produce {method} signatures")]
    Incompatible {
        key: KeyFamily,
        method: SignatureMethod,
    },

    #[error(transparent)]
    Core(#[from] Error),
}

/// Sign `doc` with the context's key and profile.
///
/// The input is consumed; on success the returned document carries exactly
/// one enveloped signature over the payload.
pub fn sign(ctx: &SignContext, mut doc: XmlDocument) -> Result<XmlDocument, SigningError> {
    let profile = ctx.profile();
    let key_family = ctx.key().family();
    if profile.signature.key_family() != key_family {
        return Err(SigningError::Incompatible {
            key: key_family,
            method: profile.signature,
        });
    }

    let (payload, existing_id) = {
        let tree = doc.parse_doc()?;
        if select::find_element(&tree, ns::DSIG, ns::node::SIGNATURE).is_some() {
            return Err(SigningError::AlreadySigned);
        }
        let payload = match profile.payload.find_all(&tree).as_slice() {
            [] => return Err(SigningError::MissingPayload(profile.payload.to_string())),
            [payload] => *payload,
            many => {
                return Err(SigningError::AmbiguousPayload {
                    selector: profile.payload.to_string(),
                    count: many.len(),
                })
            }
        };
        (payload.id(), select::id_value(payload).map(str::to_owned))
    };

    let payload_id = match existing_id {
        Some(id) => id,
        None => {
            let id = generate_id();
            doc.insert_attribute(payload, ns::attr::ID, &id)?;
            id
        }
    };

    let payload = select::find_by_id(&doc.parse_doc()?, &payload_id)?.id();
    let stripped = doc.strip_blank_text(payload)?;

    let (payload, digest_value) = {
        let tree = doc.parse_doc()?;
        let payload = select::find_by_id(&tree, &payload_id)?;
        let canonical = kassa_c14n::canonicalize(
            payload,
            profile.c14n,
            &NodeSet::tree_without_comments(payload),
            &[],
        )?;
        (payload.id(), profile.digest.digest(&canonical))
    };

    let markup = SignatureBlock {
        reference_id: &payload_id,
        c14n: profile.c14n,
        digest: profile.digest,
        digest_value: &digest_value,
        signature: profile.signature,
        certificate: ctx.certificate().filter(|_| profile.embed_certificate),
    }
    .to_markup()?;
    doc.append_child_markup(payload, &markup)?;

    let (signature_value_node, signed_info) = signed_info_of(&doc, &payload_id, profile.c14n)?;
    let signature_value = profile
        .signature
        .sign(ctx.key().signing_key(), &signed_info)?;
    doc.set_text(signature_value_node, &keyinfo::encode_base64(&signature_value))?;

    debug!(
        payload = %payload_id,
        stripped,
        digest = profile.digest.name(),
        signature = profile.signature.name(),
        "signed payload"
    );
    Ok(doc)
}

/// Canonicalize the freshly inserted `SignedInfo` and locate the
/// `SignatureValue` element to fill.
fn signed_info_of(
    doc: &XmlDocument,
    payload_id: &str,
    mode: C14nMode,
) -> Result<(NodeId, Vec<u8>), Error> {
    let tree = doc.parse_doc()?;
    let payload = select::find_by_id(&tree, payload_id)?;
    let signature = payload
        .children()
        .filter(|n| select::is_element(*n, ns::DSIG, ns::node::SIGNATURE))
        .last()
        .ok_or_else(|| Error::XmlStructure("inserted signature block not found".into()))?;
    let signed_info = select::find_child_element(signature, ns::DSIG, ns::node::SIGNED_INFO)
        .ok_or_else(|| Error::XmlStructure("inserted block has no SignedInfo".into()))?;
    let signature_value =
        select::find_child_element(signature, ns::DSIG, ns::node::SIGNATURE_VALUE)
            .ok_or_else(|| Error::XmlStructure("inserted block has no SignatureValue".into()))?;
    let canonical = kassa_c14n::canonicalize_subtree(signed_info, mode, &[])?;
    Ok((signature_value.id(), canonical))
}

/// A fresh `Id` value: an underscore followed by 128 random bits in hex.
fn generate_id() -> String {
    format!("_{}", hex::encode(rand::random::<[u8; 16]>()))
}
