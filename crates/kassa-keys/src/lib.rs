#![forbid(unsafe_code)]

//! Key material for kassa.
//!
//! Loads the merchant private key and X.509 certificates from PEM or DER,
//! compares public keys, checks validity windows and reads or writes the
//! `X509Data` carried in `<ds:KeyInfo>`.

pub mod cert;
pub mod key;
pub mod keyinfo;
pub mod loader;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use cert::{parse_verification_time, Certificate};
pub use key::PrivateKey;
