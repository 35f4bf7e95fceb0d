// src/tree/mod.rs

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub mod normalize;

pub use normalize::{normalize_document, normalize_mapping, METADATA_MARKER, NAMESPACE_SEPARATOR};

/// Children of a mapping node, kept in document order.
pub type Mapping = IndexMap<String, RawNode>;

/// A node of a parsed XML document.
///
/// Serializes untagged, so a tree maps one-to-one onto JSON strings,
/// objects and arrays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawNode {
    Scalar(String),
    Mapping(Mapping),
    Sequence(Vec<RawNode>),
}

impl RawNode {
    pub fn scalar(value: impl Into<String>) -> Self {
        RawNode::Scalar(value.into())
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            RawNode::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            RawNode::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Child at `key`, if this node is a mapping that has one.
    pub fn get(&self, key: &str) -> Option<&RawNode> {
        self.as_mapping().and_then(|m| m.get(key))
    }

    /// Follow `path` through nested mappings.
    pub fn lookup(&self, path: &[&str]) -> Option<&RawNode> {
        path.iter().try_fold(self, |node, key| node.get(key))
    }
}

impl From<Mapping> for RawNode {
    fn from(map: Mapping) -> Self {
        RawNode::Mapping(map)
    }
}

#[cfg(test)]
pub(crate) fn from_json(value: serde_json::Value) -> RawNode {
    serde_json::from_value(value).expect("test tree must only hold strings, objects and arrays")
}
