#![forbid(unsafe_code)]

//! Enveloped XML-DSig for merchant payment messages.
//!
//! The [`sign`] function signs an outgoing request's payload element with
//! the merchant key. [`verify`] checks an inbound document against the one
//! trusted counterparty certificate, and [`verify_document`] and
//! [`accept_response`] hand back a [`VerifiedDocument`] whose fields may be
//! read.

pub mod block;
pub mod context;
pub mod response;
pub mod sign;
pub mod transforms;
pub mod verified;
pub mod verify;

pub use block::SignatureBlock;
pub use context::{PayloadSelector, SignContext, SignatureProfile, VerifyContext};
pub use response::{accept_response, ResponseError};
pub use sign::{sign, SigningError};
pub use verified::{verify_document, VerifiedDocument};
pub use verify::{verify, InvalidReason, VerificationResult};
