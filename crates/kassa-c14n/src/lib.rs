#![forbid(unsafe_code)]

//! Exclusive XML Canonicalization for kassa.
//!
//! Both variants of Exclusive Canonical XML 1.0 are supported, with and
//! without comments. Canonicalization always runs on a parsed `roxmltree`
//! tree and a [`NodeSet`] naming the nodes to output.

pub mod escape;
pub mod exclusive;
pub mod render;

use kassa_core::{algorithm, Error};
use kassa_xml::NodeSet;
use roxmltree::Node;

/// The canonicalization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum C14nMode {
    /// Exclusive Canonical XML 1.0
    #[default]
    Exclusive,
    /// Exclusive Canonical XML 1.0 with comments
    ExclusiveWithComments,
}

impl C14nMode {
    /// Get the algorithm URI for this mode.
    pub fn uri(&self) -> &'static str {
        match self {
            Self::Exclusive => algorithm::EXC_C14N,
            Self::ExclusiveWithComments => algorithm::EXC_C14N_WITH_COMMENTS,
        }
    }

    /// Parse a C14N mode from an algorithm URI.
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            algorithm::EXC_C14N => Some(Self::Exclusive),
            algorithm::EXC_C14N_WITH_COMMENTS => Some(Self::ExclusiveWithComments),
            _ => None,
        }
    }

    pub fn with_comments(&self) -> bool {
        matches!(self, Self::ExclusiveWithComments)
    }
}

/// Canonicalize the nodes of `node_set` below `apex`.
///
/// `inclusive_prefixes` is the InclusiveNamespaces PrefixList; `#default`
/// stands for the default namespace.
pub fn canonicalize(
    apex: Node<'_, '_>,
    mode: C14nMode,
    node_set: &NodeSet,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    exclusive::canonicalize(apex, mode.with_comments(), node_set, inclusive_prefixes)
}

/// Canonicalize the whole subtree rooted at `node`.
pub fn canonicalize_subtree(
    node: Node<'_, '_>,
    mode: C14nMode,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    let node_set = if mode.with_comments() {
        NodeSet::tree_with_comments(node)
    } else {
        NodeSet::tree_without_comments(node)
    };
    canonicalize(node, mode, &node_set, inclusive_prefixes)
}

/// Split an InclusiveNamespaces `PrefixList` attribute value.
pub fn parse_prefix_list(list: &str) -> Vec<String> {
    list.split_whitespace().map(str::to_owned).collect()
}
