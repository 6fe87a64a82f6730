#![forbid(unsafe_code)]

//! Key and certificate generators for tests.
//!
//! Certificates are self-signed with the x509-cert builder. RSA keys are
//! 1024 bits to keep key generation fast; they must not be used outside
//! tests.

use crate::cert::Certificate;
use crate::key::PrivateKey;
use der::asn1::{GeneralizedTime, UtcTime};
use der::{Encode, EncodePem};
use kassa_core::Error;
use kassa_crypto::SigningKey;
use std::str::FromStr;
use std::time::Duration;
use x509_cert::builder::{Builder, CertificateBuilder, Profile};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::{Time, Validity};

const TEST_RSA_BITS: usize = 1024;

fn builder_error(e: impl std::fmt::Display) -> Error {
    Error::Certificate(format!("certificate builder: {e}"))
}

/// Generate an RSA private key.
pub fn rsa_key() -> Result<PrivateKey, Error> {
    rsa::RsaPrivateKey::new(&mut rand::thread_rng(), TEST_RSA_BITS)
        .map(PrivateKey::from)
        .map_err(|e| Error::Key(format!("RSA key generation failed: {e}")))
}

/// Generate an EC P-256 private key.
pub fn p256_key() -> PrivateKey {
    p256::ecdsa::SigningKey::random(&mut rand::thread_rng()).into()
}

/// Generate an RSA key and a certificate for it, valid for a year from now.
pub fn rsa_key_pair(subject: &str) -> Result<(PrivateKey, Certificate), Error> {
    let key = rsa_key()?;
    let cert = self_signed(&key, subject)?;
    Ok((key, cert))
}

/// Self-signed certificate valid for a year from now.
pub fn self_signed(key: &PrivateKey, subject: &str) -> Result<Certificate, Error> {
    let validity =
        Validity::from_now(Duration::from_secs(365 * 24 * 60 * 60)).map_err(builder_error)?;
    build(key, subject, validity)
}

/// Self-signed certificate valid from `not_before` to `not_after`.
pub fn self_signed_between(
    key: &PrivateKey,
    subject: &str,
    not_before: der::DateTime,
    not_after: der::DateTime,
) -> Result<Certificate, Error> {
    let validity = Validity {
        not_before: to_time(not_before)?,
        not_after: to_time(not_after)?,
    };
    build(key, subject, validity)
}

/// Self-signed certificate whose validity ended in 2021.
pub fn expired_certificate(key: &PrivateKey, subject: &str) -> Result<Certificate, Error> {
    let not_before = der::DateTime::new(2020, 1, 1, 0, 0, 0).map_err(builder_error)?;
    let not_after = der::DateTime::new(2021, 1, 1, 0, 0, 0).map_err(builder_error)?;
    self_signed_between(key, subject, not_before, not_after)
}

/// PEM form of a certificate.
pub fn certificate_pem(cert: &Certificate) -> Result<String, Error> {
    cert.inner()
        .to_pem(der::pem::LineEnding::LF)
        .map_err(builder_error)
}

/// PKCS#8 PEM form of a private key.
pub fn private_key_pem(key: &PrivateKey) -> Result<String, Error> {
    use pkcs8::EncodePrivateKey;
    let pem = match key.signing_key() {
        SigningKey::Rsa(sk) => sk.to_pkcs8_pem(der::pem::LineEnding::LF),
        SigningKey::EcP256(sk) => sk.to_pkcs8_pem(der::pem::LineEnding::LF),
        SigningKey::EcP384(sk) => sk.to_pkcs8_pem(der::pem::LineEnding::LF),
    }
    .map_err(|e| Error::Key(format!("PKCS#8 encoding failed: {e}")))?;
    Ok(pem.as_str().to_owned())
}

fn to_time(dt: der::DateTime) -> Result<Time, Error> {
    if dt.year() < 2050 {
        UtcTime::from_date_time(dt)
            .map(Time::UtcTime)
            .map_err(builder_error)
    } else {
        Ok(Time::GeneralTime(GeneralizedTime::from_date_time(dt)))
    }
}

fn build(key: &PrivateKey, subject: &str, validity: Validity) -> Result<Certificate, Error> {
    let serial = SerialNumber::new(&[0x01, 0x2a]).map_err(builder_error)?;
    let subject = Name::from_str(subject).map_err(builder_error)?;

    let cert = match key.signing_key() {
        SigningKey::Rsa(sk) => {
            let spki =
                SubjectPublicKeyInfoOwned::from_key(sk.to_public_key()).map_err(builder_error)?;
            let signer = rsa::pkcs1v15::SigningKey::<sha2::Sha256>::new(sk.clone());
            CertificateBuilder::new(Profile::Root, serial, validity, subject, spki, &signer)
                .map_err(builder_error)?
                .build::<rsa::pkcs1v15::Signature>()
                .map_err(builder_error)?
        }
        SigningKey::EcP256(sk) => {
            let spki =
                SubjectPublicKeyInfoOwned::from_key(*sk.verifying_key()).map_err(builder_error)?;
            CertificateBuilder::new(Profile::Root, serial, validity, subject, spki, sk)
                .map_err(builder_error)?
                .build::<p256::ecdsa::DerSignature>()
                .map_err(builder_error)?
        }
        SigningKey::EcP384(sk) => {
            let spki =
                SubjectPublicKeyInfoOwned::from_key(*sk.verifying_key()).map_err(builder_error)?;
            CertificateBuilder::new(Profile::Root, serial, validity, subject, spki, sk)
                .map_err(builder_error)?
                .build::<p384::ecdsa::DerSignature>()
                .map_err(builder_error)?
        }
    };

    let der = cert.to_der().map_err(builder_error)?;
    Certificate::from_der(&der)
}
