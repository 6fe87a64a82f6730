#![forbid(unsafe_code)]

//! XML document abstraction for kassa.
//!
//! Wraps an owned XML text that always parses with `roxmltree`, plus the
//! node-set and lookup helpers the canonicalizer, signer and verifier share.

pub mod document;
pub mod nodeset;
pub mod select;
pub mod writer;

pub use document::XmlDocument;
pub use nodeset::NodeSet;
pub use writer::XmlWriter;

/// Parsing options used for every document.
///
/// Payment messages never carry a DTD, so documents declaring one are
/// rejected instead of being expanded.
pub fn parsing_options() -> roxmltree::ParsingOptions {
    roxmltree::ParsingOptions {
        allow_dtd: false,
        ..roxmltree::ParsingOptions::default()
    }
}
