#![forbid(unsafe_code)]

//! Signature algorithm implementations (RSA PKCS#1 v1.5, RSA-PSS, ECDSA).

use kassa_core::{algorithm, Error};
use signature::SignatureEncoding;
use std::fmt;
use std::str::FromStr;

/// Private key material for signing.
#[derive(Clone)]
pub enum SigningKey {
    Rsa(rsa::RsaPrivateKey),
    EcP256(p256::ecdsa::SigningKey),
    EcP384(p384::ecdsa::SigningKey),
}

impl SigningKey {
    pub fn family(&self) -> KeyFamily {
        match self {
            Self::Rsa(_) => KeyFamily::Rsa,
            Self::EcP256(_) => KeyFamily::EcP256,
            Self::EcP384(_) => KeyFamily::EcP384,
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        match self {
            Self::Rsa(sk) => VerifyingKey::Rsa(sk.to_public_key()),
            Self::EcP256(sk) => VerifyingKey::EcP256(*sk.verifying_key()),
            Self::EcP384(sk) => VerifyingKey::EcP384(*sk.verifying_key()),
        }
    }
}

impl fmt::Debug for SigningKey {
    // Key material stays out of logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey({})", self.family())
    }
}

/// Public key material for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyingKey {
    Rsa(rsa::RsaPublicKey),
    EcP256(p256::ecdsa::VerifyingKey),
    EcP384(p384::ecdsa::VerifyingKey),
}

impl VerifyingKey {
    pub fn family(&self) -> KeyFamily {
        match self {
            Self::Rsa(_) => KeyFamily::Rsa,
            Self::EcP256(_) => KeyFamily::EcP256,
            Self::EcP384(_) => KeyFamily::EcP384,
        }
    }
}

/// The kind of key a signature method operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Rsa,
    EcP256,
    EcP384,
}

impl fmt::Display for KeyFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rsa => "RSA",
            Self::EcP256 => "EC P-256",
            Self::EcP384 => "EC P-384",
        })
    }
}

/// A signature method usable in `ds:SignatureMethod`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SignatureMethod {
    RsaSha1,
    #[default]
    RsaSha256,
    RsaSha384,
    RsaSha512,
    RsaPssSha256,
    RsaPssSha384,
    RsaPssSha512,
    EcdsaP256Sha256,
    EcdsaP384Sha384,
}

#[derive(Debug, Clone, Copy)]
enum HashType {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl SignatureMethod {
    pub const ALL: [Self; 9] = [
        Self::RsaSha1,
        Self::RsaSha256,
        Self::RsaSha384,
        Self::RsaSha512,
        Self::RsaPssSha256,
        Self::RsaPssSha384,
        Self::RsaPssSha512,
        Self::EcdsaP256Sha256,
        Self::EcdsaP384Sha384,
    ];

    pub fn uri(self) -> &'static str {
        match self {
            Self::RsaSha1 => algorithm::RSA_SHA1,
            Self::RsaSha256 => algorithm::RSA_SHA256,
            Self::RsaSha384 => algorithm::RSA_SHA384,
            Self::RsaSha512 => algorithm::RSA_SHA512,
            Self::RsaPssSha256 => algorithm::RSA_PSS_SHA256,
            Self::RsaPssSha384 => algorithm::RSA_PSS_SHA384,
            Self::RsaPssSha512 => algorithm::RSA_PSS_SHA512,
            Self::EcdsaP256Sha256 => algorithm::ECDSA_SHA256,
            Self::EcdsaP384Sha384 => algorithm::ECDSA_SHA384,
        }
    }

    /// Short name used in configuration and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Self::RsaSha1 => "rsa-sha1",
            Self::RsaSha256 => "rsa-sha256",
            Self::RsaSha384 => "rsa-sha384",
            Self::RsaSha512 => "rsa-sha512",
            Self::RsaPssSha256 => "rsa-pss-sha256",
            Self::RsaPssSha384 => "rsa-pss-sha384",
            Self::RsaPssSha512 => "rsa-pss-sha512",
            Self::EcdsaP256Sha256 => "ecdsa-sha256",
            Self::EcdsaP384Sha384 => "ecdsa-sha384",
        }
    }

    pub fn from_uri(uri: &str) -> Result<Self, Error> {
        Self::ALL
            .into_iter()
            .find(|m| m.uri() == uri)
            .ok_or_else(|| Error::UnsupportedAlgorithm(format!("signature algorithm: {uri}")))
    }

    /// Accept either a short name (`rsa-sha256`) or a full algorithm URI.
    pub fn from_name(name: &str) -> Result<Self, Error> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(name) || m.uri() == name)
            .ok_or_else(|| Error::UnsupportedAlgorithm(format!("signature algorithm: {name}")))
    }

    /// The key family this method needs.
    pub fn key_family(self) -> KeyFamily {
        match self {
            Self::EcdsaP256Sha256 => KeyFamily::EcP256,
            Self::EcdsaP384Sha384 => KeyFamily::EcP384,
            _ => KeyFamily::Rsa,
        }
    }

    fn hash(self) -> HashType {
        match self {
            Self::RsaSha1 => HashType::Sha1,
            Self::RsaSha256 | Self::RsaPssSha256 | Self::EcdsaP256Sha256 => HashType::Sha256,
            Self::RsaSha384 | Self::RsaPssSha384 | Self::EcdsaP384Sha384 => HashType::Sha384,
            Self::RsaSha512 | Self::RsaPssSha512 => HashType::Sha512,
        }
    }

    fn is_pss(self) -> bool {
        matches!(self, Self::RsaPssSha256 | Self::RsaPssSha384 | Self::RsaPssSha512)
    }

    /// Sign `data` with `key`.
    ///
    /// ECDSA signatures are returned in the XML-DSig `r || s` form.
    pub fn sign(self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        match key {
            SigningKey::Rsa(sk) if self.key_family() == KeyFamily::Rsa => {
                if self.is_pss() {
                    rsa_pss_sign(self.hash(), sk, data)
                } else {
                    rsa_pkcs1v15_sign(self.hash(), sk, data)
                }
            }
            SigningKey::EcP256(sk) if self == Self::EcdsaP256Sha256 => {
                use signature::Signer;
                let sig: p256::ecdsa::Signature = sk
                    .try_sign(data)
                    .map_err(|e| Error::Crypto(format!("ECDSA signing failed: {e}")))?;
                Ok(p256_to_xmldsig(&sig))
            }
            SigningKey::EcP384(sk) if self == Self::EcdsaP384Sha384 => {
                use signature::Signer;
                let sig: p384::ecdsa::Signature = sk
                    .try_sign(data)
                    .map_err(|e| Error::Crypto(format!("ECDSA signing failed: {e}")))?;
                Ok(p384_to_xmldsig(&sig))
            }
            _ => Err(Error::Key(format!(
                "{} key cannot be used with {}",
                key.family(),
                self.name()
            ))),
        }
    }

    /// Verify `sig_bytes` over `data`.
    ///
    /// `Ok(false)` means the signature does not match; errors report a key
    /// of the wrong family or a malformed signature value.
    pub fn verify(self, key: &VerifyingKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        match key {
            VerifyingKey::Rsa(pk) if self.key_family() == KeyFamily::Rsa => {
                if self.is_pss() {
                    rsa_pss_verify(self.hash(), pk, data, sig_bytes)
                } else {
                    rsa_pkcs1v15_verify(self.hash(), pk, data, sig_bytes)
                }
            }
            VerifyingKey::EcP256(vk) if self == Self::EcdsaP256Sha256 => {
                use signature::Verifier;
                let sig = xmldsig_to_p256(sig_bytes)?;
                Ok(vk.verify(data, &sig).is_ok())
            }
            VerifyingKey::EcP384(vk) if self == Self::EcdsaP384Sha384 => {
                use signature::Verifier;
                let sig = xmldsig_to_p384(sig_bytes)?;
                Ok(vk.verify(data, &sig).is_ok())
            }
            _ => Err(Error::Key(format!(
                "{} key cannot be used with {}",
                key.family(),
                self.name()
            ))),
        }
    }
}

impl fmt::Display for SignatureMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SignatureMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

// ── RSA PKCS#1 v1.5 ─────────────────────────────────────────────────

fn rsa_pkcs1v15_sign(
    hash: HashType,
    private_key: &rsa::RsaPrivateKey,
    data: &[u8],
) -> Result<Vec<u8>, Error> {
    use signature::Signer;
    macro_rules! do_sign {
        ($hasher:ty) => {{
            let sk = rsa::pkcs1v15::SigningKey::<$hasher>::new(private_key.clone());
            let sig = sk
                .try_sign(data)
                .map_err(|e| Error::Crypto(format!("RSA signing failed: {e}")))?;
            Ok(sig.to_vec())
        }};
    }
    match hash {
        HashType::Sha1 => do_sign!(sha1::Sha1),
        HashType::Sha256 => do_sign!(sha2::Sha256),
        HashType::Sha384 => do_sign!(sha2::Sha384),
        HashType::Sha512 => do_sign!(sha2::Sha512),
    }
}

fn rsa_pkcs1v15_verify(
    hash: HashType,
    public_key: &rsa::RsaPublicKey,
    data: &[u8],
    sig_bytes: &[u8],
) -> Result<bool, Error> {
    use signature::Verifier;
    let sig = rsa::pkcs1v15::Signature::try_from(sig_bytes)
        .map_err(|e| Error::Crypto(format!("invalid RSA signature: {e}")))?;
    macro_rules! do_verify {
        ($hasher:ty) => {{
            let vk = rsa::pkcs1v15::VerifyingKey::<$hasher>::new(public_key.clone());
            Ok(vk.verify(data, &sig).is_ok())
        }};
    }
    match hash {
        HashType::Sha1 => do_verify!(sha1::Sha1),
        HashType::Sha256 => do_verify!(sha2::Sha256),
        HashType::Sha384 => do_verify!(sha2::Sha384),
        HashType::Sha512 => do_verify!(sha2::Sha512),
    }
}

// ── RSA-PSS ──────────────────────────────────────────────────────────

fn rsa_pss_sign(
    hash: HashType,
    private_key: &rsa::RsaPrivateKey,
    data: &[u8],
) -> Result<Vec<u8>, Error> {
    use signature::RandomizedSigner;
    let mut rng = rand::thread_rng();
    macro_rules! do_sign {
        ($hasher:ty) => {{
            let sk = rsa::pss::SigningKey::<$hasher>::new(private_key.clone());
            let sig = sk
                .try_sign_with_rng(&mut rng, data)
                .map_err(|e| Error::Crypto(format!("RSA-PSS signing failed: {e}")))?;
            Ok(sig.to_vec())
        }};
    }
    match hash {
        HashType::Sha1 => do_sign!(sha1::Sha1),
        HashType::Sha256 => do_sign!(sha2::Sha256),
        HashType::Sha384 => do_sign!(sha2::Sha384),
        HashType::Sha512 => do_sign!(sha2::Sha512),
    }
}

fn rsa_pss_verify(
    hash: HashType,
    public_key: &rsa::RsaPublicKey,
    data: &[u8],
    sig_bytes: &[u8],
) -> Result<bool, Error> {
    use signature::Verifier;
    let sig = rsa::pss::Signature::try_from(sig_bytes)
        .map_err(|e| Error::Crypto(format!("invalid RSA-PSS signature: {e}")))?;
    macro_rules! do_verify {
        ($hasher:ty) => {{
            let vk = rsa::pss::VerifyingKey::<$hasher>::new(public_key.clone());
            Ok(vk.verify(data, &sig).is_ok())
        }};
    }
    match hash {
        HashType::Sha1 => do_verify!(sha1::Sha1),
        HashType::Sha256 => do_verify!(sha2::Sha256),
        HashType::Sha384 => do_verify!(sha2::Sha384),
        HashType::Sha512 => do_verify!(sha2::Sha512),
    }
}

// ── ECDSA r||s conversion ────────────────────────────────────────────

/// Convert XML-DSig ECDSA r||s to a typed Signature for P-256.
pub fn xmldsig_to_p256(rs: &[u8]) -> Result<p256::ecdsa::Signature, Error> {
    if rs.len() != 64 {
        return Err(Error::Crypto(format!(
            "P-256 signature must be 64 bytes, got {}",
            rs.len()
        )));
    }
    let r = p256::FieldBytes::from_slice(&rs[..32]);
    let s = p256::FieldBytes::from_slice(&rs[32..]);
    p256::ecdsa::Signature::from_scalars(*r, *s)
        .map_err(|e| Error::Crypto(format!("invalid P-256 signature: {e}")))
}

/// Convert P-256 signature to XML-DSig r||s format.
pub fn p256_to_xmldsig(sig: &p256::ecdsa::Signature) -> Vec<u8> {
    let (r, s) = sig.split_bytes();
    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(&r);
    out.extend_from_slice(&s);
    out
}

/// Convert XML-DSig ECDSA r||s to a typed Signature for P-384.
pub fn xmldsig_to_p384(rs: &[u8]) -> Result<p384::ecdsa::Signature, Error> {
    if rs.len() != 96 {
        return Err(Error::Crypto(format!(
            "P-384 signature must be 96 bytes, got {}",
            rs.len()
        )));
    }
    let r = p384::FieldBytes::from_slice(&rs[..48]);
    let s = p384::FieldBytes::from_slice(&rs[48..]);
    p384::ecdsa::Signature::from_scalars(*r, *s)
        .map_err(|e| Error::Crypto(format!("invalid P-384 signature: {e}")))
}

/// Convert P-384 signature to XML-DSig r||s format.
pub fn p384_to_xmldsig(sig: &p384::ecdsa::Signature) -> Vec<u8> {
    let (r, s) = sig.split_bytes();
    let mut out = Vec::with_capacity(96);
    out.extend_from_slice(&r);
    out.extend_from_slice(&s);
    out
}
