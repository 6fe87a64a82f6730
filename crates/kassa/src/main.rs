#![forbid(unsafe_code)]

//! kassa CLI: sign payment requests and verify payment responses.

use clap::{Args, Parser, Subcommand};
use kassa::c14n::C14nMode;
use kassa::config::{self, Settings};
use kassa::crypto::{DigestMethod, SignatureMethod};
use kassa::keys::{loader, parse_verification_time};
use kassa::{Error, PayloadSelector, SignContext, VerificationResult, VerifyContext, XmlDocument};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(
    name = "kassa",
    about = "kassa: XML-DSig for payment webservice requests and responses",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign the payload element of a request document
    Sign {
        /// Input XML file
        file: PathBuf,

        #[command(flatten)]
        source: SettingsSource,

        /// Load merchant private key (PEM or DER)
        #[arg(short = 'k', long, conflicts_with = "config")]
        key: Option<PathBuf>,

        /// Merchant certificate to embed in KeyInfo
        #[arg(long, requires = "key")]
        cert: Option<PathBuf>,

        /// Local name of the payload element
        #[arg(long)]
        payload: Option<String>,

        /// Digest algorithm (short name or URI)
        #[arg(long)]
        digest: Option<String>,

        /// Signature algorithm (short name or URI)
        #[arg(long)]
        signature: Option<String>,

        /// Do not embed the merchant certificate
        #[arg(long = "no-embed-cert")]
        no_embed_cert: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Verify a signed response document
    Verify {
        /// Input XML file
        file: PathBuf,

        #[command(flatten)]
        source: SettingsSource,

        /// Trusted counterparty certificate (PEM or DER)
        #[arg(long, conflicts_with = "config")]
        trusted: Option<PathBuf>,

        /// Local name of the payload element
        #[arg(long)]
        payload: Option<String>,

        /// Skip the certificate validity window check
        #[arg(long = "skip-time-checks")]
        skip_time_checks: bool,

        /// Check validity at this time (YYYY-MM-DD+HH:MM:SS, UTC)
        #[arg(long = "verification-time", conflicts_with = "skip_time_checks")]
        verification_time: Option<String>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// List supported algorithms and key types
    Info,
}

#[derive(Args)]
struct SettingsSource {
    /// Settings file (default: config/kassa plus KASSA_* environment)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,
}

impl SettingsSource {
    fn load(&self) -> Result<Settings, Error> {
        let settings = match &self.config {
            Some(path) => Settings::load_with_sources(Some(path.as_path()), None)?,
            None => Settings::load()?,
        };
        Ok(settings)
    }
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Sign {
            file,
            source,
            key,
            cert,
            payload,
            digest,
            signature,
            no_embed_cert,
            output,
            verbose,
        } => {
            kassa::telemetry::init_tracing(verbose);
            let options = SignOptions {
                payload,
                digest,
                signature,
                no_embed_cert,
            };
            cmd_sign(&file, &source, key, cert, options, output)
        }

        Commands::Verify {
            file,
            source,
            trusted,
            payload,
            skip_time_checks,
            verification_time,
            verbose,
        } => {
            kassa::telemetry::init_tracing(verbose);
            cmd_verify(
                &file,
                &source,
                trusted,
                payload,
                skip_time_checks,
                verification_time,
            )
        }

        Commands::Info => cmd_info(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

struct SignOptions {
    payload: Option<String>,
    digest: Option<String>,
    signature: Option<String>,
    no_embed_cert: bool,
}

fn cmd_sign(
    file: &Path,
    source: &SettingsSource,
    key: Option<PathBuf>,
    cert: Option<PathBuf>,
    options: SignOptions,
    output: Option<PathBuf>,
) -> Result<(), Error> {
    let document = read_document(file)?;

    let ctx = match key {
        Some(key_path) => {
            let key = loader::load_private_key_file(&key_path)?;
            let mut ctx = SignContext::new(key);
            if let Some(cert_path) = cert {
                ctx = ctx.with_certificate(loader::load_certificate_file(&cert_path)?);
            }
            ctx
        }
        None => config::signing_context(&source.load()?)?,
    };

    let mut profile = ctx.profile().clone();
    if let Some(name) = options.payload {
        profile.payload = PayloadSelector::new(name);
    }
    if let Some(name) = options.digest {
        profile.digest = DigestMethod::from_name(&name)?;
    }
    if let Some(name) = options.signature {
        profile.signature = SignatureMethod::from_name(&name)?;
    }
    if options.no_embed_cert {
        profile.embed_certificate = false;
    }
    let ctx = ctx.with_profile(profile);

    let signed = kassa::sign(&ctx, document)?;
    write_output(output, signed.text().as_bytes())
}

fn cmd_verify(
    file: &Path,
    source: &SettingsSource,
    trusted: Option<PathBuf>,
    payload: Option<String>,
    skip_time_checks: bool,
    verification_time: Option<String>,
) -> Result<(), Error> {
    let document = read_document(file)?;

    let mut ctx = match trusted {
        Some(path) => VerifyContext::new(loader::load_certificate_file(&path)?)?,
        None => config::verification_context(&source.load()?)?,
    };
    if let Some(name) = payload {
        ctx = ctx.with_payload(PayloadSelector::new(name));
    }
    if skip_time_checks {
        ctx = ctx.with_validity_check(false);
    }
    if let Some(time) = verification_time {
        ctx = ctx
            .with_validity_check(true)
            .with_verification_time(parse_verification_time(&time)?);
    }

    match kassa::verify(&ctx, &document) {
        VerificationResult::Valid => {
            println!("OK");
            Ok(())
        }
        VerificationResult::Invalid(reason) => {
            eprintln!("INVALID: {reason}");
            process::exit(1);
        }
    }
}

fn cmd_info() -> Result<(), Error> {
    println!("kassa: enveloped XML-DSig for payment messages");
    println!();
    println!("Supported digest algorithms:");
    for method in DigestMethod::ALL {
        println!("  {:<16} {}", method.name(), method.uri());
    }
    println!();
    println!("Supported signature algorithms:");
    for method in SignatureMethod::ALL {
        println!("  {:<16} {}", method.name(), method.uri());
    }
    println!();
    println!("Supported canonicalization:");
    for mode in [C14nMode::Exclusive, C14nMode::ExclusiveWithComments] {
        println!("  {}", mode.uri());
    }
    println!();
    println!("Supported key formats:");
    println!("  PEM, DER (RSA PKCS#1/PKCS#8, EC P-256/P-384 PKCS#8/SEC1)");
    Ok(())
}

// ── Utility functions ────────────────────────────────────────────────

fn read_document(path: &Path) -> Result<XmlDocument, Error> {
    let data = std::fs::read(path).map_err(|source| Error::Io {
        path: path.to_owned(),
        source,
    })?;
    Ok(XmlDocument::parse_bytes(&data)?)
}

fn write_output(path: Option<PathBuf>, data: &[u8]) -> Result<(), Error> {
    match path {
        Some(p) => std::fs::write(&p, data).map_err(|source| Error::Io { path: p, source }),
        None => {
            use std::io::Write;
            std::io::stdout().write_all(data).map_err(|source| Error::Io {
                path: PathBuf::from("<stdout>"),
                source,
            })
        }
    }
}
