// src/record/mod.rs

use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::debug;

use crate::tree::{normalize_document, Mapping, RawNode};

/// Root element of a researcher file.
pub const RECORD_KEY: &str = "record:record";
pub const PERSON_KEY: &str = "person:person";
pub const ACTIVITIES_KEY: &str = "activities:activities-summary";
/// Attribute on the person element whose second path segment is the researcher id.
pub const PATH_ATTR: &str = "@path";
pub const ID_KEY: &str = "_id";

/// Keys of the two subtrees once normalized.
pub const PERSON: &str = "person";
pub const ACTIVITIES: &str = "activities-summary";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// The document is not a researcher record; skip it.
    #[error("missing `{0}`, not a researcher record")]
    MalformedInput(&'static str),
    /// The document is a record but carries no usable id.
    #[error("cannot derive researcher id: {0}")]
    Identifier(String),
}

/// One researcher document, normalized and keyed by `_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRecord {
    id: String,
    doc: Mapping,
}

impl NormalizedRecord {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Full document, `_id` included.
    pub fn document(&self) -> &Mapping {
        &self.doc
    }

    pub fn person(&self) -> Option<&RawNode> {
        self.doc.get(PERSON)
    }

    pub fn activities(&self) -> Option<&RawNode> {
        self.doc.get(ACTIVITIES)
    }
}

impl Serialize for NormalizedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.doc.serialize(serializer)
    }
}

/// Pull the person and activities subtrees out of a parsed researcher file,
/// assign `_id` and normalize the result.
///
/// A document without the record wrapper or either subtree yields
/// [`ExtractError::MalformedInput`]; a person subtree without a usable
/// `@path` yields [`ExtractError::Identifier`].
pub fn extract_record(raw: RawNode) -> Result<NormalizedRecord, ExtractError> {
    let RawNode::Mapping(mut top) = raw else {
        return Err(ExtractError::MalformedInput(RECORD_KEY));
    };
    let Some(RawNode::Mapping(mut wrapper)) = top.shift_remove(RECORD_KEY) else {
        return Err(ExtractError::MalformedInput(RECORD_KEY));
    };
    if !wrapper.contains_key(PERSON_KEY) {
        return Err(ExtractError::MalformedInput(PERSON_KEY));
    }
    if !wrapper.contains_key(ACTIVITIES_KEY) {
        return Err(ExtractError::MalformedInput(ACTIVITIES_KEY));
    }

    let mut doc = Mapping::with_capacity(3);
    for key in [PERSON_KEY, ACTIVITIES_KEY] {
        if let Some(node) = wrapper.shift_remove(key) {
            doc.insert(key.to_string(), node);
        }
    }

    let id = researcher_id(&doc[PERSON_KEY])?;
    doc.insert(ID_KEY.to_string(), RawNode::scalar(id.as_str()));
    debug!(id = %id, "extracted researcher record");

    Ok(NormalizedRecord {
        id,
        doc: normalize_document(doc),
    })
}

/// `"/0000-0001-2345-6789/person"` → `"0000-0001-2345-6789"`.
fn researcher_id(person: &RawNode) -> Result<String, ExtractError> {
    let path = person
        .get(PATH_ATTR)
        .and_then(RawNode::as_scalar)
        .ok_or_else(|| {
            ExtractError::Identifier(format!("`{}` has no `{}` attribute", PERSON_KEY, PATH_ATTR))
        })?;

    match path.split('/').nth(1) {
        Some(segment) if !segment.is_empty() => Ok(segment.to_string()),
        _ => Err(ExtractError::Identifier(format!(
            "`{}` value {:?} has no id segment",
            PATH_ATTR, path
        ))),
    }
}
