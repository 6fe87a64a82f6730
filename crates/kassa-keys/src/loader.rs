#![forbid(unsafe_code)]

//! Private key and certificate loading from PEM and DER.
//!
//! RSA keys are accepted as PKCS#8 or PKCS#1, EC keys (P-256, P-384) as
//! PKCS#8 or SEC1.

use crate::cert::Certificate;
use crate::key::PrivateKey;
use kassa_core::Error;
use std::path::Path;

/// Whether `data` looks PEM-armored.
pub fn is_pem(data: &[u8]) -> bool {
    data.iter()
        .position(|b| !b.is_ascii_whitespace())
        .is_some_and(|start| data[start..].starts_with(b"-----BEGIN"))
}

/// Load a private key, detecting PEM or DER.
pub fn load_private_key(data: &[u8]) -> Result<PrivateKey, Error> {
    if is_pem(data) {
        load_private_key_pem(data)
    } else {
        load_private_key_der(data)
    }
}

/// Load a private key from PEM data.
///
/// Tries PKCS#8 (RSA, P-256, P-384), then PKCS#1 RSA, then SEC1 EC.
pub fn load_private_key_pem(pem_data: &[u8]) -> Result<PrivateKey, Error> {
    use pkcs8::DecodePrivateKey;
    use rsa::pkcs1::DecodeRsaPrivateKey;

    let pem_str = std::str::from_utf8(pem_data)
        .map_err(|e| Error::Key(format!("invalid PEM encoding: {e}")))?
        .trim();

    if let Ok(pk) = rsa::RsaPrivateKey::from_pkcs8_pem(pem_str) {
        return Ok(pk.into());
    }
    if let Ok(sk) = p256::ecdsa::SigningKey::from_pkcs8_pem(pem_str) {
        return Ok(sk.into());
    }
    if let Ok(sk) = p384::ecdsa::SigningKey::from_pkcs8_pem(pem_str) {
        return Ok(sk.into());
    }
    if let Ok(pk) = rsa::RsaPrivateKey::from_pkcs1_pem(pem_str) {
        return Ok(pk.into());
    }
    if let Ok(secret) = p256::SecretKey::from_sec1_pem(pem_str) {
        return Ok(p256::ecdsa::SigningKey::from(secret).into());
    }
    if let Ok(secret) = p384::SecretKey::from_sec1_pem(pem_str) {
        return Ok(p384::ecdsa::SigningKey::from(secret).into());
    }

    Err(Error::Key(
        "unable to parse PEM private key (tried PKCS#8, PKCS#1 and SEC1)".into(),
    ))
}

/// Load a private key from DER bytes.
pub fn load_private_key_der(der: &[u8]) -> Result<PrivateKey, Error> {
    use pkcs8::DecodePrivateKey;
    use rsa::pkcs1::DecodeRsaPrivateKey;

    if let Ok(pk) = rsa::RsaPrivateKey::from_pkcs8_der(der) {
        return Ok(pk.into());
    }
    if let Ok(sk) = p256::ecdsa::SigningKey::from_pkcs8_der(der) {
        return Ok(sk.into());
    }
    if let Ok(sk) = p384::ecdsa::SigningKey::from_pkcs8_der(der) {
        return Ok(sk.into());
    }
    if let Ok(pk) = rsa::RsaPrivateKey::from_pkcs1_der(der) {
        return Ok(pk.into());
    }
    if let Ok(secret) = p256::SecretKey::from_sec1_der(der) {
        return Ok(p256::ecdsa::SigningKey::from(secret).into());
    }
    if let Ok(secret) = p384::SecretKey::from_sec1_der(der) {
        return Ok(p384::ecdsa::SigningKey::from(secret).into());
    }

    Err(Error::Key(
        "unable to parse DER private key (tried PKCS#8, PKCS#1 and SEC1)".into(),
    ))
}

/// Load a private key from a file, auto-detecting the format.
pub fn load_private_key_file(path: &Path) -> Result<PrivateKey, Error> {
    let data = std::fs::read(path)?;
    load_private_key(&data).map_err(|e| Error::Key(format!("{}: {e}", path.display())))
}

/// Load a certificate, detecting PEM or DER.
pub fn load_certificate(data: &[u8]) -> Result<Certificate, Error> {
    Certificate::from_bytes(data)
}

/// Load a certificate from a file, auto-detecting the format.
pub fn load_certificate_file(path: &Path) -> Result<Certificate, Error> {
    Certificate::load_file(path)
}
