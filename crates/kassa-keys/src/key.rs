#![forbid(unsafe_code)]

//! The merchant's private signing key.

use crate::cert::Certificate;
use kassa_core::Error;
use kassa_crypto::{KeyFamily, SignatureMethod, SigningKey, VerifyingKey};
use std::fmt;

/// A private key used to sign outgoing documents.
///
/// `Debug` prints only the key type.
#[derive(Clone)]
pub struct PrivateKey {
    key: SigningKey,
}

impl PrivateKey {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    pub fn family(&self) -> KeyFamily {
        self.key.family()
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.key
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    /// The signature method used when none is configured.
    pub fn default_signature_method(&self) -> SignatureMethod {
        match self.family() {
            KeyFamily::Rsa => SignatureMethod::RsaSha256,
            KeyFamily::EcP256 => SignatureMethod::EcdsaP256Sha256,
            KeyFamily::EcP384 => SignatureMethod::EcdsaP384Sha384,
        }
    }

    /// Whether `cert` carries this key's public half.
    pub fn matches_certificate(&self, cert: &Certificate) -> Result<bool, Error> {
        Ok(cert.public_key()? == self.verifying_key())
    }
}

impl From<rsa::RsaPrivateKey> for PrivateKey {
    fn from(key: rsa::RsaPrivateKey) -> Self {
        Self::new(SigningKey::Rsa(key))
    }
}

impl From<p256::ecdsa::SigningKey> for PrivateKey {
    fn from(key: p256::ecdsa::SigningKey) -> Self {
        Self::new(SigningKey::EcP256(key))
    }
}

impl From<p384::ecdsa::SigningKey> for PrivateKey {
    fn from(key: p384::ecdsa::SigningKey) -> Self {
        Self::new(SigningKey::EcP384(key))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey({})", self.family())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn test_matches_own_certificate_only() {
        let (key, cert) = testing::rsa_key_pair("CN=Merchant").unwrap();
        let (_, other) = testing::rsa_key_pair("CN=Other").unwrap();
        assert!(key.matches_certificate(&cert).unwrap());
        assert!(!key.matches_certificate(&other).unwrap());
    }

    #[test]
    fn test_default_signature_method() {
        let key = PrivateKey::from(p256::ecdsa::SigningKey::random(&mut rand::thread_rng()));
        assert_eq!(key.default_signature_method(), SignatureMethod::EcdsaP256Sha256);
        assert_eq!(format!("{key:?}"), "PrivateKey(EC P-256)");
    }
}
