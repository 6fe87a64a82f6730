#![forbid(unsafe_code)]

//! Shared types for the kassa workspace: the common error type, algorithm
//! URIs and the namespace/element names used by the signer and verifier.

pub mod algorithm;
pub mod error;
pub mod ns;

pub use error::{Error, Result};
