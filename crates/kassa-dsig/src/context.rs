#![forbid(unsafe_code)]

//! Signing and verification contexts.
//!
//! Both contexts are built once from configuration and then shared read-only
//! (they are `Send + Sync`) across every document signed or verified.

use kassa_c14n::C14nMode;
use kassa_core::Error;
use kassa_crypto::{DigestMethod, SignatureMethod, VerifyingKey};
use kassa_keys::{Certificate, PrivateKey};
use roxmltree::{Document, Node};
use std::fmt;

/// Selects the element that carries the signed business payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadSelector {
    /// Local name of the payload element.
    pub local_name: String,
    /// Namespace URI to require; `None` accepts any namespace.
    pub namespace: Option<String>,
}

impl PayloadSelector {
    /// Match elements by local name in any namespace.
    pub fn new(local_name: impl Into<String>) -> Self {
        Self {
            local_name: local_name.into(),
            namespace: None,
        }
    }

    /// Match elements by local name and namespace URI. An empty URI means
    /// no namespace.
    pub fn with_namespace(local_name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            local_name: local_name.into(),
            namespace: Some(namespace.into()),
        }
    }

    pub fn matches(&self, node: Node<'_, '_>) -> bool {
        node.is_element()
            && node.tag_name().name() == self.local_name
            && self
                .namespace
                .as_deref()
                .map_or(true, |ns| node.tag_name().namespace().unwrap_or("") == ns)
    }

    /// All matching elements in document order.
    pub fn find_all<'a, 'i>(&self, doc: &'a Document<'i>) -> Vec<Node<'a, 'i>> {
        doc.descendants().filter(|n| self.matches(*n)).collect()
    }
}

impl Default for PayloadSelector {
    fn default() -> Self {
        Self::new("Body")
    }
}

impl fmt::Display for PayloadSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{ns}}}{}", self.local_name),
            None => write!(f, "{}", self.local_name),
        }
    }
}

/// How outgoing documents are signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureProfile {
    pub payload: PayloadSelector,
    pub c14n: C14nMode,
    pub digest: DigestMethod,
    pub signature: SignatureMethod,
    /// Embed the merchant certificate in `KeyInfo` when one is configured.
    pub embed_certificate: bool,
}

impl Default for SignatureProfile {
    fn default() -> Self {
        Self {
            payload: PayloadSelector::default(),
            c14n: C14nMode::Exclusive,
            digest: DigestMethod::Sha256,
            signature: SignatureMethod::RsaSha256,
            embed_certificate: true,
        }
    }
}

/// Everything the Signer needs: the merchant key, its certificate and the
/// signature profile.
#[derive(Debug, Clone)]
pub struct SignContext {
    key: PrivateKey,
    certificate: Option<Certificate>,
    profile: SignatureProfile,
}

impl SignContext {
    /// Create a context with the default profile, using the key's default
    /// signature method.
    pub fn new(key: PrivateKey) -> Self {
        let profile = SignatureProfile {
            signature: key.default_signature_method(),
            ..SignatureProfile::default()
        };
        Self {
            key,
            certificate: None,
            profile,
        }
    }

    pub fn with_certificate(mut self, certificate: Certificate) -> Self {
        self.certificate = Some(certificate);
        self
    }

    pub fn with_profile(mut self, profile: SignatureProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn key(&self) -> &PrivateKey {
        &self.key
    }

    pub fn certificate(&self) -> Option<&Certificate> {
        self.certificate.as_ref()
    }

    pub fn profile(&self) -> &SignatureProfile {
        &self.profile
    }
}

/// Everything the Verifier needs: the trusted counterparty certificate and
/// how to check it.
#[derive(Debug, Clone)]
pub struct VerifyContext {
    trusted: Certificate,
    trusted_key: VerifyingKey,
    trusted_spki: Vec<u8>,
    payload: PayloadSelector,
    check_validity: bool,
    verification_time: Option<der::DateTime>,
}

impl VerifyContext {
    /// Build a context trusting `trusted` only.
    ///
    /// Fails when the certificate's public key cannot be decoded.
    pub fn new(trusted: Certificate) -> Result<Self, Error> {
        let trusted_key = trusted.public_key()?;
        let trusted_spki = trusted.spki_der()?;
        Ok(Self {
            trusted,
            trusted_key,
            trusted_spki,
            payload: PayloadSelector::default(),
            check_validity: true,
            verification_time: None,
        })
    }

    pub fn with_payload(mut self, payload: PayloadSelector) -> Self {
        self.payload = payload;
        self
    }

    /// Enable or disable the trusted certificate's validity window check.
    pub fn with_validity_check(mut self, check: bool) -> Self {
        self.check_validity = check;
        self
    }

    /// Check validity at a fixed time instead of now.
    pub fn with_verification_time(mut self, time: der::DateTime) -> Self {
        self.verification_time = Some(time);
        self
    }

    pub fn trusted_certificate(&self) -> &Certificate {
        &self.trusted
    }

    pub fn trusted_key(&self) -> &VerifyingKey {
        &self.trusted_key
    }

    pub(crate) fn trusted_spki(&self) -> &[u8] {
        &self.trusted_spki
    }

    pub fn payload(&self) -> &PayloadSelector {
        &self.payload
    }

    pub fn check_validity(&self) -> bool {
        self.check_validity
    }

    pub fn verification_time(&self) -> Option<der::DateTime> {
        self.verification_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_contexts_are_send_and_sync() {
        assert_send_sync::<SignContext>();
        assert_send_sync::<VerifyContext>();
    }

    #[test]
    fn test_payload_selector() {
        let doc = Document::parse(
            r#"<s:Envelope xmlns:s="urn:soap"><s:Body/><Body/></s:Envelope>"#,
        )
        .unwrap();
        assert_eq!(PayloadSelector::default().find_all(&doc).len(), 2);
        assert_eq!(
            PayloadSelector::with_namespace("Body", "urn:soap").find_all(&doc).len(),
            1
        );
        assert_eq!(PayloadSelector::with_namespace("Body", "").find_all(&doc).len(), 1);
        assert_eq!(
            PayloadSelector::with_namespace("Body", "urn:soap").to_string(),
            "{urn:soap}Body"
        );
    }

    #[test]
    fn test_default_profile() {
        let profile = SignatureProfile::default();
        assert_eq!(profile.digest, DigestMethod::Sha256);
        assert_eq!(profile.signature, SignatureMethod::RsaSha256);
        assert_eq!(profile.c14n, C14nMode::Exclusive);
        assert!(profile.embed_certificate);
        assert_eq!(profile.payload.local_name, "Body");
    }

    #[test]
    fn test_sign_context_uses_key_default_method() {
        let ctx = SignContext::new(kassa_keys::testing::p256_key());
        assert_eq!(ctx.profile().signature, SignatureMethod::EcdsaP256Sha256);
        assert!(ctx.certificate().is_none());
    }
}
