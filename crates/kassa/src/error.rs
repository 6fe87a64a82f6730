#![forbid(unsafe_code)]

use kassa_dsig::{ResponseError, SigningError};
use std::path::PathBuf;

/// Errors surfaced by configuration loading and the CLI.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid setting {key}: {message}")]
    Setting { key: &'static str, message: String },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Core(#[from] kassa_core::Error),

    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error(transparent)]
    Response(#[from] ResponseError),
}

impl Error {
    pub(crate) fn setting(key: &'static str, message: impl ToString) -> Self {
        Self::Setting {
            key,
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
