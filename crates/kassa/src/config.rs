#![forbid(unsafe_code)]

//! Layered settings and the security contexts built from them.
//!
//! Sources, lowest priority first: built-in defaults, the optional
//! `config/kassa` file (any format the `config` crate reads), then either
//! `KASSA_*` environment variables (`KASSA_MERCHANT__PRIVATE_KEY`) or an
//! explicit override map.

use crate::error::{Error, Result};
use config::{Config as ConfigLib, ConfigError, Environment, File};
use kassa_crypto::{DigestMethod, SignatureMethod};
use kassa_dsig::{PayloadSelector, SignContext, SignatureProfile, VerifyContext};
use kassa_keys::{loader, parse_verification_time};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub merchant: MerchantSettings,
    pub signature: SignatureSettings,
    pub verification: VerificationSettings,
}

/// Key material locations. Files may be PEM or DER.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MerchantSettings {
    #[serde(default)]
    pub private_key: Option<PathBuf>,
    #[serde(default)]
    pub certificate: Option<PathBuf>,
    #[serde(default)]
    pub trusted_certificate: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignatureSettings {
    pub payload_element: String,
    #[serde(default)]
    pub payload_namespace: Option<String>,
    /// Short name (`sha256`) or algorithm URI.
    pub digest: String,
    /// Short name (`rsa-sha256`) or algorithm URI.
    pub method: String,
    pub embed_certificate: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerificationSettings {
    pub check_validity: bool,
    /// Fixed time for validity checks, `YYYY-MM-DD+HH:MM:SS` in UTC.
    #[serde(default)]
    pub verification_time: Option<String>,
}

impl Settings {
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_with_sources(None, None)
    }

    /// Load settings from `file` (instead of `config/kassa`) and from
    /// `overrides` (instead of the process environment).
    pub fn load_with_sources(
        file: Option<&Path>,
        overrides: Option<HashMap<String, String>>,
    ) -> std::result::Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("signature.payload_element", "Body")?
            .set_default("signature.digest", DigestMethod::default().name())?
            .set_default("signature.method", SignatureMethod::default().name())?
            .set_default("signature.embed_certificate", true)?
            .set_default("verification.check_validity", true)?;

        builder = match file {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name("config/kassa").required(false)),
        };

        if let Some(vars) = overrides {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            builder = builder.add_source(
                Environment::with_prefix("KASSA")
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        builder.build()?.try_deserialize()
    }
}

impl SignatureSettings {
    pub fn payload(&self) -> PayloadSelector {
        match &self.payload_namespace {
            Some(ns) => PayloadSelector::with_namespace(&self.payload_element, ns),
            None => PayloadSelector::new(&self.payload_element),
        }
    }

    pub fn profile(&self) -> Result<SignatureProfile> {
        Ok(SignatureProfile {
            payload: self.payload(),
            digest: DigestMethod::from_name(&self.digest)
                .map_err(|e| Error::setting("signature.digest", e))?,
            signature: SignatureMethod::from_name(&self.method)
                .map_err(|e| Error::setting("signature.method", e))?,
            embed_certificate: self.embed_certificate,
            ..SignatureProfile::default()
        })
    }
}

/// Build the Signer context: load the merchant key and certificate and
/// check that they belong together.
pub fn signing_context(settings: &Settings) -> Result<SignContext> {
    let key_path = settings
        .merchant
        .private_key
        .as_deref()
        .ok_or_else(|| Error::setting("merchant.private_key", "not configured"))?;
    let key = loader::load_private_key_file(key_path)?;
    let profile = settings.signature.profile()?;
    if profile.signature.key_family() != key.family() {
        return Err(Error::setting(
            "signature.method",
            format!("{} cannot be used with a {} key", profile.signature, key.family()),
        ));
    }

    let mut ctx = SignContext::new(key).with_profile(profile);
    if let Some(cert_path) = settings.merchant.certificate.as_deref() {
        let cert = loader::load_certificate_file(cert_path)?;
        if !ctx.key().matches_certificate(&cert)? {
            return Err(Error::setting(
                "merchant.certificate",
                "certificate does not match the merchant private key",
            ));
        }
        info!(subject = %cert.subject(), "loaded merchant certificate");
        ctx = ctx.with_certificate(cert);
    }
    info!(key = %ctx.key().family(), method = %ctx.profile().signature, "loaded merchant key");
    Ok(ctx)
}

/// Build the Verifier context around the trusted counterparty certificate.
pub fn verification_context(settings: &Settings) -> Result<VerifyContext> {
    let trusted_path = settings
        .merchant
        .trusted_certificate
        .as_deref()
        .ok_or_else(|| Error::setting("merchant.trusted_certificate", "not configured"))?;
    let trusted = loader::load_certificate_file(trusted_path)?;
    info!(
        subject = %trusted.subject(),
        serial = %trusted.serial(),
        "loaded trusted certificate"
    );

    let mut ctx = VerifyContext::new(trusted)?
        .with_payload(settings.signature.payload())
        .with_validity_check(settings.verification.check_validity);
    if let Some(time) = &settings.verification.verification_time {
        let time = parse_verification_time(time)
            .map_err(|e| Error::setting("verification.verification_time", e))?;
        ctx = ctx.with_verification_time(time);
    }
    Ok(ctx)
}

/// The merchant's signing and verification contexts, loaded once.
#[derive(Debug, Clone)]
pub struct MerchantSecurity {
    sign: SignContext,
    verify: VerifyContext,
}

impl MerchantSecurity {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            sign: signing_context(settings)?,
            verify: verification_context(settings)?,
        })
    }

    pub fn sign_context(&self) -> &SignContext {
        &self.sign
    }

    pub fn verify_context(&self) -> &VerifyContext {
        &self.verify
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kassa_keys::testing;

    fn overrides(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    struct Files {
        dir: PathBuf,
    }

    impl Files {
        fn new(name: &str) -> Self {
            let dir = std::env::temp_dir().join(format!("kassa-config-{name}-{}", std::process::id()));
            std::fs::create_dir_all(&dir).unwrap();
            Self { dir }
        }

        fn write(&self, name: &str, contents: &str) -> String {
            let path = self.dir.join(name);
            std::fs::write(&path, contents).unwrap();
            path.to_string_lossy().into_owned()
        }
    }

    impl Drop for Files {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::load_with_sources(None, Some(HashMap::new())).unwrap();
        assert_eq!(settings.signature.payload_element, "Body");
        assert_eq!(settings.signature.digest, "sha256");
        assert_eq!(settings.signature.method, "rsa-sha256");
        assert!(settings.signature.embed_certificate);
        assert!(settings.verification.check_validity);
        assert!(settings.merchant.private_key.is_none());
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::load_with_sources(
            None,
            Some(overrides(&[
                ("signature.digest", "http://www.w3.org/2001/04/xmldsig-more#sha384"),
                ("signature.embed_certificate", "false"),
                ("signature.payload_namespace", "urn:soap"),
                ("verification.verification_time", "2030-01-01+00:00:00"),
            ])),
        )
        .unwrap();
        let profile = settings.signature.profile().unwrap();
        assert_eq!(profile.digest, DigestMethod::Sha384);
        assert!(!profile.embed_certificate);
        assert_eq!(profile.payload, PayloadSelector::with_namespace("Body", "urn:soap"));
    }

    #[test]
    fn test_unknown_algorithm_name() {
        let settings =
            Settings::load_with_sources(None, Some(overrides(&[("signature.digest", "md5")])))
                .unwrap();
        assert!(matches!(
            settings.signature.profile(),
            Err(Error::Setting { key: "signature.digest", .. })
        ));
    }

    #[test]
    fn test_settings_file() {
        let files = Files::new("file");
        let path = files.write(
            "kassa.toml",
            "[signature]\npayload_element = \"Payment\"\n\n[verification]\ncheck_validity = false\n",
        );
        let settings =
            Settings::load_with_sources(Some(Path::new(&path)), Some(HashMap::new())).unwrap();
        assert_eq!(settings.signature.payload_element, "Payment");
        assert_eq!(settings.signature.method, "rsa-sha256");
        assert!(!settings.verification.check_validity);
    }

    #[test]
    fn test_merchant_security_from_settings() {
        let files = Files::new("security");
        let (key, cert) = testing::rsa_key_pair("CN=Merchant").unwrap();
        let (_, bank) = testing::rsa_key_pair("CN=Bank").unwrap();
        let key_path = files.write("merchant.key", &testing::private_key_pem(&key).unwrap());
        let cert_path = files.write("merchant.crt", &testing::certificate_pem(&cert).unwrap());
        let bank_path = files.write("bank.crt", &testing::certificate_pem(&bank).unwrap());

        let settings = Settings::load_with_sources(
            None,
            Some(overrides(&[
                ("merchant.private_key", key_path.as_str()),
                ("merchant.certificate", cert_path.as_str()),
                ("merchant.trusted_certificate", bank_path.as_str()),
            ])),
        )
        .unwrap();
        let security = MerchantSecurity::from_settings(&settings).unwrap();
        assert_eq!(security.sign_context().certificate(), Some(&cert));
        assert_eq!(security.verify_context().trusted_certificate(), &bank);
        assert!(security.verify_context().check_validity());
    }

    #[test]
    fn test_mismatched_merchant_certificate() {
        let files = Files::new("mismatch");
        let key = testing::rsa_key().unwrap();
        let (_, other) = testing::rsa_key_pair("CN=Other").unwrap();
        let key_path = files.write("merchant.key", &testing::private_key_pem(&key).unwrap());
        let cert_path = files.write("merchant.crt", &testing::certificate_pem(&other).unwrap());

        let settings = Settings::load_with_sources(
            None,
            Some(overrides(&[
                ("merchant.private_key", key_path.as_str()),
                ("merchant.certificate", cert_path.as_str()),
            ])),
        )
        .unwrap();
        assert!(matches!(
            signing_context(&settings),
            Err(Error::Setting { key: "merchant.certificate", .. })
        ));
    }

    #[test]
    fn test_missing_key_material() {
        let settings = Settings::load_with_sources(None, Some(HashMap::new())).unwrap();
        assert!(matches!(
            signing_context(&settings),
            Err(Error::Setting { key: "merchant.private_key", .. })
        ));
        assert!(matches!(
            verification_context(&settings),
            Err(Error::Setting { key: "merchant.trusted_certificate", .. })
        ));
    }
}
