#![forbid(unsafe_code)]

//! Acceptance of a webservice response body.

use crate::context::VerifyContext;
use crate::verified::{verify_document, VerifiedDocument};
use crate::verify::InvalidReason;
use kassa_core::Error;
use kassa_xml::XmlDocument;
use tracing::warn;

/// Why a response was not accepted.
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    /// The transport produced no body, or only whitespace.
    #[error("no response received")]
    NoResponse,

    #[error("malformed response: {0}")]
    Malformed(#[source] Error),

    #[error("response rejected: {0}")]
    Rejected(#[from] InvalidReason),
}

/// Parse and verify a response body.
///
/// `None` stands for a transport call that returned nothing.
pub fn accept_response(
    ctx: &VerifyContext,
    body: Option<&str>,
) -> Result<VerifiedDocument, ResponseError> {
    let body = body
        .filter(|b| !b.trim().is_empty())
        .ok_or(ResponseError::NoResponse)?;
    let document = XmlDocument::parse(body).map_err(|e| {
        warn!(error = %e, "response body is not well-formed XML");
        ResponseError::Malformed(e)
    })?;
    Ok(verify_document(ctx, document)?)
}
