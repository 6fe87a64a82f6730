#![forbid(unsafe_code)]

//! Signed XML for merchant payment-webservice integrations.
//!
//! Requests are signed with [`sign`] under a [`SignContext`]; responses are
//! checked with [`verify`] or accepted with [`accept_response`] under a
//! [`VerifyContext`]. [`config::MerchantSecurity`] builds both contexts from
//! layered settings.

pub mod config;
pub mod error;
pub mod telemetry;

pub use kassa_c14n as c14n;
pub use kassa_core as core;
pub use kassa_crypto as crypto;
pub use kassa_dsig as dsig;
pub use kassa_keys as keys;
pub use kassa_xml as xml;

pub use config::{MerchantSecurity, Settings};
pub use error::{Error, Result};
pub use kassa_dsig::{
    accept_response, sign, verify, verify_document, InvalidReason, PayloadSelector,
    ResponseError, SignContext, SignatureProfile, SigningError, VerificationResult,
    VerifiedDocument, VerifyContext,
};
pub use kassa_keys::{Certificate, PrivateKey};
pub use kassa_xml::XmlDocument;
