#![forbid(unsafe_code)]

//! Cryptographic algorithms for kassa.
//!
//! Digests and signature methods are addressed by their XML-DSig algorithm
//! URIs or by short configuration names.

pub mod digest;
pub mod sign;

pub use self::digest::{DigestAlgorithm, DigestMethod};
pub use self::sign::{KeyFamily, SignatureMethod, SigningKey, VerifyingKey};
