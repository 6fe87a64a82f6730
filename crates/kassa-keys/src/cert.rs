#![forbid(unsafe_code)]

//! X.509 certificates: parsing, public key extraction and validity windows.

use der::{Decode, DecodePem, Encode};
use kassa_core::Error;
use kassa_crypto::VerifyingKey;
use std::fmt;
use std::path::Path;

/// A parsed X.509 certificate together with its DER encoding.
#[derive(Clone)]
pub struct Certificate {
    der: Vec<u8>,
    parsed: x509_cert::Certificate,
}

impl Certificate {
    pub fn from_der(der: &[u8]) -> Result<Self, Error> {
        let parsed = x509_cert::Certificate::from_der(der)
            .map_err(|e| Error::Certificate(format!("failed to parse X.509 certificate: {e}")))?;
        Ok(Self {
            der: der.to_vec(),
            parsed,
        })
    }

    pub fn from_pem(pem: &[u8]) -> Result<Self, Error> {
        let parsed = x509_cert::Certificate::from_pem(pem)
            .map_err(|e| Error::Certificate(format!("failed to parse PEM certificate: {e}")))?;
        let der = parsed
            .to_der()
            .map_err(|e| Error::Certificate(format!("failed to encode certificate: {e}")))?;
        Ok(Self { der, parsed })
    }

    /// Parse PEM or DER, detected by the PEM armor.
    pub fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        if crate::loader::is_pem(data) {
            Self::from_pem(data)
        } else {
            Self::from_der(data)
        }
    }

    pub fn load_file(path: &Path) -> Result<Self, Error> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
            .map_err(|e| Error::Certificate(format!("{}: {e}", path.display())))
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn inner(&self) -> &x509_cert::Certificate {
        &self.parsed
    }

    /// DER encoding of the SubjectPublicKeyInfo.
    pub fn spki_der(&self) -> Result<Vec<u8>, Error> {
        self.parsed
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| Error::Certificate(format!("failed to encode SPKI: {e}")))
    }

    /// Whether both certificates carry the same SubjectPublicKeyInfo.
    pub fn same_public_key(&self, other: &Certificate) -> Result<bool, Error> {
        Ok(self.spki_der()? == other.spki_der()?)
    }

    /// Decode the subject public key.
    pub fn public_key(&self) -> Result<VerifyingKey, Error> {
        use spki::DecodePublicKey;
        let spki_der = self.spki_der()?;

        if let Ok(pk) = rsa::RsaPublicKey::from_public_key_der(&spki_der) {
            return Ok(VerifyingKey::Rsa(pk));
        }
        if let Ok(vk) = p256::ecdsa::VerifyingKey::from_public_key_der(&spki_der) {
            return Ok(VerifyingKey::EcP256(vk));
        }
        if let Ok(vk) = p384::ecdsa::VerifyingKey::from_public_key_der(&spki_der) {
            return Ok(VerifyingKey::EcP384(vk));
        }

        Err(Error::Certificate(
            "unsupported public key algorithm in X.509 certificate".into(),
        ))
    }

    pub fn subject(&self) -> String {
        self.parsed.tbs_certificate.subject.to_string()
    }

    pub fn issuer(&self) -> String {
        self.parsed.tbs_certificate.issuer.to_string()
    }

    /// Serial number as colon-separated hex.
    pub fn serial(&self) -> String {
        self.parsed
            .tbs_certificate
            .serial_number
            .as_bytes()
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(":")
    }

    pub fn not_before(&self) -> der::DateTime {
        self.parsed.tbs_certificate.validity.not_before.to_date_time()
    }

    pub fn not_after(&self) -> der::DateTime {
        self.parsed.tbs_certificate.validity.not_after.to_date_time()
    }

    /// Check that `time` lies within `notBefore..=notAfter`.
    pub fn check_validity_at(&self, time: &der::DateTime) -> Result<(), Error> {
        let not_before = self.not_before();
        let not_after = self.not_after();

        if *time < not_before {
            return Err(Error::Certificate(format!(
                "certificate is not yet valid (notBefore: {not_before})"
            )));
        }
        if *time > not_after {
            return Err(Error::Certificate(format!(
                "certificate has expired (notAfter: {not_after})"
            )));
        }

        Ok(())
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for Certificate {}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject())
            .field("serial", &self.serial())
            .finish()
    }
}

/// Parse a verification time string into a `der::DateTime`.
///
/// Format: `YYYY-MM-DD+HH:MM:SS`; `T` or a space is also accepted as the
/// separator.
pub fn parse_verification_time(s: &str) -> Result<der::DateTime, Error> {
    let s = s.trim();
    let invalid = || Error::Certificate(format!("invalid verification time format: {s}"));
    if s.len() != 19 || !s.is_ascii() {
        return Err(invalid());
    }
    let sep = s.as_bytes()[10];
    if !matches!(sep, b'+' | b'T' | b' ')
        || &s[4..5] != "-"
        || &s[7..8] != "-"
        || &s[13..14] != ":"
        || &s[16..17] != ":"
    {
        return Err(invalid());
    }

    let year: u16 = s[0..4].parse().map_err(|_| invalid())?;
    let month: u8 = s[5..7].parse().map_err(|_| invalid())?;
    let day: u8 = s[8..10].parse().map_err(|_| invalid())?;
    let hour: u8 = s[11..13].parse().map_err(|_| invalid())?;
    let min: u8 = s[14..16].parse().map_err(|_| invalid())?;
    let sec: u8 = s[17..19].parse().map_err(|_| invalid())?;

    der::DateTime::new(year, month, day, hour, min, sec)
        .map_err(|e| Error::Certificate(format!("invalid verification time: {e}")))
}

/// The current time as a `der::DateTime`.
pub fn now() -> Result<der::DateTime, Error> {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|e| Error::Certificate(format!("system time error: {e}")))?;

    der::DateTime::from_unix_duration(now)
        .map_err(|e| Error::Certificate(format!("time conversion error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn test_der_and_pem_agree() {
        let (_, cert) = testing::rsa_key_pair("CN=Processor").unwrap();
        let pem = testing::certificate_pem(&cert).unwrap();
        let from_pem = Certificate::from_bytes(pem.as_bytes()).unwrap();
        let from_der = Certificate::from_bytes(cert.der()).unwrap();
        assert_eq!(from_pem, from_der);
        assert_eq!(from_der.subject(), "CN=Processor");
    }

    #[test]
    fn test_same_public_key() {
        let (key, cert) = testing::rsa_key_pair("CN=A").unwrap();
        let reissued = testing::self_signed(&key, "CN=A reissued").unwrap();
        let (_, other) = testing::rsa_key_pair("CN=B").unwrap();
        assert!(cert.same_public_key(&reissued).unwrap());
        assert!(!cert.same_public_key(&other).unwrap());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(Certificate::from_bytes(b"not a certificate").is_err());
        assert!(Certificate::from_bytes(b"-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n").is_err());
    }

    #[test]
    fn test_validity_window() {
        let (key, _) = testing::rsa_key_pair("CN=A").unwrap();
        let cert = testing::self_signed_between(
            &key,
            "CN=A",
            parse_verification_time("2020-01-01+00:00:00").unwrap(),
            parse_verification_time("2021-01-01+00:00:00").unwrap(),
        )
        .unwrap();
        let inside = parse_verification_time("2020-06-01+12:00:00").unwrap();
        let before = parse_verification_time("2019-12-31+23:59:59").unwrap();
        let after = parse_verification_time("2021-01-01+00:00:01").unwrap();
        assert!(cert.check_validity_at(&inside).is_ok());
        assert!(cert.check_validity_at(&before).is_err());
        assert!(cert.check_validity_at(&after).is_err());
        assert!(cert.check_validity_at(&cert.not_after()).is_ok());
    }

    #[test]
    fn test_parse_verification_time() {
        let t = parse_verification_time("2025-12-10+08:30:05").unwrap();
        assert_eq!((t.year(), t.month(), t.day()), (2025, 12, 10));
        assert_eq!((t.hour(), t.minutes(), t.seconds()), (8, 30, 5));
        assert!(parse_verification_time("2025-12-10T08:30:05").is_ok());
        assert!(parse_verification_time("2025-13-10+08:30:05").is_err());
        assert!(parse_verification_time("2025/12/10+08:30:05").is_err());
        assert!(parse_verification_time("yesterday").is_err());
    }
}
