// src/tree/normalize.rs

use std::collections::HashSet;

use super::{Mapping, RawNode};

/// Separates a namespace prefix from the local name, e.g. `person:person`.
pub const NAMESPACE_SEPARATOR: char = ':';
/// Leading character of attribute-derived keys, e.g. `@path`.
pub const METADATA_MARKER: char = '@';

/// Local part of `key` when it carries exactly one namespace separator,
/// otherwise `key` unchanged.
pub fn strip_prefix(key: &str) -> &str {
    let mut parts = key.split(NAMESPACE_SEPARATOR);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(local), None) => local,
        _ => key,
    }
}

pub fn is_metadata(key: &str) -> bool {
    key.starts_with(METADATA_MARKER)
}

/// True for a non-empty mapping whose every raw key starts with `@`.
fn is_pure_metadata(map: &Mapping) -> bool {
    !map.is_empty() && map.keys().all(|k| is_metadata(k))
}

fn sequence_to_mapping(items: Vec<RawNode>) -> Mapping {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| (i.to_string(), item))
        .collect()
}

/// Output mapping that remembers which slots were filled by a renamed key.
///
/// A rename overwrites whatever holds its target slot; a plain key never
/// replaces a value a rename already put there.
struct Slots {
    out: Mapping,
    renamed: HashSet<String>,
}

impl Slots {
    fn with_capacity(n: usize) -> Self {
        Self {
            out: Mapping::with_capacity(n),
            renamed: HashSet::new(),
        }
    }

    fn put(&mut self, key: String, was_renamed: bool, value: RawNode) {
        if was_renamed {
            self.renamed.insert(key.clone());
        } else if self.renamed.contains(&key) {
            return;
        }
        self.out.insert(key, value);
    }
}

/// Normalize every entry of `map`, recursing into mappings and sequences.
///
/// Per key, in order:
///  1. a single `ns:` prefix is dropped from the key
///  2. keys starting with `@` are dropped
///  3. mapping values made only of `@` keys are dropped, other mappings
///     are normalized recursively
///  4. sequence values become mappings keyed `"0"`, `"1"`, … and are then
///     normalized like any other mapping
///
/// When a stripped key lands on an existing name it takes over that slot,
/// whichever sibling came first; between two renames the later one wins.
pub fn normalize_mapping(map: Mapping) -> Mapping {
    let mut slots = Slots::with_capacity(map.len());

    for (raw_key, value) in map {
        let key = strip_prefix(&raw_key);
        let was_renamed = key.len() != raw_key.len();
        if is_metadata(key) {
            continue;
        }
        let key = key.to_string();

        let value = match value {
            RawNode::Mapping(child) => {
                if is_pure_metadata(&child) {
                    continue;
                }
                RawNode::Mapping(normalize_mapping(child))
            }
            RawNode::Sequence(items) => RawNode::Mapping(normalize_mapping(sequence_to_mapping(items))),
            scalar @ RawNode::Scalar(_) => scalar,
        };

        slots.put(key, was_renamed, value);
    }

    slots.out
}

/// Outer pass over a freshly assembled document.
///
/// Top-level keys only get their prefix stripped; mapping values go through
/// [`normalize_mapping`]. Anything else at this level is left as-is, so a
/// scalar such as `_id` passes through untouched.
pub fn normalize_document(doc: Mapping) -> Mapping {
    let mut slots = Slots::with_capacity(doc.len());

    for (raw_key, value) in doc {
        let key = strip_prefix(&raw_key);
        let was_renamed = key.len() != raw_key.len();
        let key = key.to_string();
        let value = match value {
            RawNode::Mapping(child) => RawNode::Mapping(normalize_mapping(child)),
            other => other,
        };
        slots.put(key, was_renamed, value);
    }

    slots.out
}
