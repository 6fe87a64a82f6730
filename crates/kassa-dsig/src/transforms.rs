#![forbid(unsafe_code)]

//! Reference transforms.
//!
//! Two transforms are supported: enveloped-signature and Exclusive C14N
//! (with or without comments). A reference selects a node set; the
//! transforms narrow or serialize it, and whatever is still a node set at
//! the end is serialized with plain Exclusive C14N.

use kassa_c14n::C14nMode;
use kassa_core::{algorithm, ns, Error};
use kassa_xml::{select, NodeSet};
use roxmltree::Node;

/// A transform declared in `<ds:Transforms>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transform {
    EnvelopedSignature,
    Canonicalize {
        mode: C14nMode,
        inclusive_prefixes: Vec<String>,
    },
}

impl Transform {
    /// Parse a `<ds:Transform>` element.
    pub fn from_node(node: Node<'_, '_>) -> Result<Self, Error> {
        let uri = node.attribute(ns::attr::ALGORITHM).ok_or_else(|| {
            Error::UnsupportedAlgorithm("transform without Algorithm attribute".into())
        })?;
        if uri == algorithm::ENVELOPED_SIGNATURE {
            return Ok(Self::EnvelopedSignature);
        }
        let mode = C14nMode::from_uri(uri)
            .ok_or_else(|| Error::UnsupportedAlgorithm(format!("transform: {uri}")))?;
        Ok(Self::Canonicalize {
            mode,
            inclusive_prefixes: read_inclusive_prefixes(node),
        })
    }

    pub fn uri(&self) -> &'static str {
        match self {
            Self::EnvelopedSignature => algorithm::ENVELOPED_SIGNATURE,
            Self::Canonicalize { mode, .. } => mode.uri(),
        }
    }
}

/// The `PrefixList` of an `<ec:InclusiveNamespaces>` child, if present.
pub fn read_inclusive_prefixes(node: Node<'_, '_>) -> Vec<String> {
    select::find_child_element(node, ns::EXC_C14N, ns::node::INCLUSIVE_NAMESPACES)
        .and_then(|n| n.attribute(ns::attr::PREFIX_LIST))
        .map(kassa_c14n::parse_prefix_list)
        .unwrap_or_default()
}

/// Data flowing between transforms.
enum TransformData {
    Nodes(NodeSet),
    Octets(Vec<u8>),
}

/// Apply `transforms` to the node set selected by a same-document reference
/// to `target`, returning the octets to digest.
///
/// `signature` is the `<ds:Signature>` element the enveloped-signature
/// transform removes.
pub fn apply(
    transforms: &[Transform],
    target: Node<'_, '_>,
    signature: Node<'_, '_>,
) -> Result<Vec<u8>, Error> {
    let mut data = TransformData::Nodes(NodeSet::tree_without_comments(target));
    for transform in transforms {
        data = match (transform, data) {
            (Transform::EnvelopedSignature, TransformData::Nodes(mut nodes)) => {
                nodes.remove_subtree(signature);
                TransformData::Nodes(nodes)
            }
            (
                Transform::Canonicalize {
                    mode,
                    inclusive_prefixes,
                },
                TransformData::Nodes(nodes),
            ) => TransformData::Octets(kassa_c14n::canonicalize(
                target,
                *mode,
                &nodes,
                inclusive_prefixes,
            )?),
            (transform, TransformData::Octets(_)) => {
                return Err(Error::UnsupportedAlgorithm(format!(
                    "transform {} after canonicalization",
                    transform.uri()
                )))
            }
        };
    }
    match data {
        TransformData::Octets(octets) => Ok(octets),
        TransformData::Nodes(nodes) => {
            kassa_c14n::canonicalize(target, C14nMode::Exclusive, &nodes, &[])
        }
    }
}
