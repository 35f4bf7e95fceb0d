// src/affiliation/collect.rs

use thiserror::Error;
use tracing::{debug, warn};

use super::AffiliationIndex;
use crate::record::NormalizedRecord;
use crate::tree::RawNode;

pub const GROUP_KEY: &str = "affiliation-group";
pub const LAST_MODIFIED_KEY: &str = "last-modified-date";
pub const ORGANIZATION_KEY: &str = "organization";

/// An activities section holding affiliation groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section {
    pub name: &'static str,
    pub summary_key: &'static str,
}

pub const EDUCATIONS: Section = Section {
    name: "educations",
    summary_key: "education-summary",
};

pub const EMPLOYMENTS: Section = Section {
    name: "employments",
    summary_key: "employment-summary",
};

pub const SECTIONS: [Section; 2] = [EDUCATIONS, EMPLOYMENTS];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectError {
    /// One group was skipped; the rest of the section was still read.
    #[error("{section}: affiliation group {group} has no {missing}")]
    MissingAffiliationData {
        section: &'static str,
        group: String,
        missing: &'static str,
    },
    /// The whole section was skipped for this record.
    #[error("{section}: cannot tell single from multiple affiliation groups: {detail}")]
    AmbiguousShape {
        section: &'static str,
        detail: String,
    },
}

/// What one record contributed to the index.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectOutcome {
    /// Pairs found in the record, duplicates included.
    pub pairs_seen: usize,
    /// Pairs the index did not know before.
    pub pairs_added: usize,
    pub issues: Vec<CollectError>,
}

impl CollectOutcome {
    pub fn sections_skipped(&self) -> usize {
        self.issues
            .iter()
            .filter(|e| matches!(e, CollectError::AmbiguousShape { .. }))
            .count()
    }

    pub fn groups_skipped(&self) -> usize {
        self.issues
            .iter()
            .filter(|e| matches!(e, CollectError::MissingAffiliationData { .. }))
            .count()
    }
}

/// Fold every (country, institution) pair of `record`'s educations and
/// employments into `index`.
///
/// Groups lacking organization data are skipped one by one; a section whose
/// group container cannot be classified is skipped as a whole. Both are
/// reported in the outcome and never abort the record.
pub fn collect_affiliations(record: &NormalizedRecord, index: &mut AffiliationIndex) -> CollectOutcome {
    let mut outcome = CollectOutcome::default();
    let Some(activities) = record.activities() else {
        return outcome;
    };

    for section in SECTIONS {
        let Some(container) = activities.get(section.name).and_then(|s| s.get(GROUP_KEY)) else {
            continue;
        };

        let groups = match resolve_groups(container) {
            Ok(groups) => groups,
            Err(detail) => {
                let err = CollectError::AmbiguousShape {
                    section: section.name,
                    detail,
                };
                warn!(id = %record.id(), "{}", err);
                outcome.issues.push(err);
                continue;
            }
        };

        for (label, group) in groups {
            for pair in group_pairs(section, &label, group) {
                match pair {
                    Ok((country, institution)) => {
                        outcome.pairs_seen += 1;
                        if index.insert(country, institution) {
                            outcome.pairs_added += 1;
                        }
                    }
                    Err(err) => {
                        warn!(id = %record.id(), "{}", err);
                        outcome.issues.push(err);
                    }
                }
            }
        }
    }

    debug!(
        id = %record.id(),
        seen = outcome.pairs_seen,
        added = outcome.pairs_added,
        "collected affiliations"
    );
    outcome
}

/// Split an `affiliation-group` value into the groups it holds.
///
/// This is a heuristic, not a schema guarantee: a lone group carries
/// `last-modified-date` directly, while repeated groups were converted to a
/// mapping of ordinals and keep that key one level down. A lone group that
/// happens to lack the date falls through to the ordinal check and is
/// reported as ambiguous.
fn resolve_groups(container: &RawNode) -> Result<Vec<(String, &RawNode)>, String> {
    let RawNode::Mapping(map) = container else {
        return Err("group container is not a mapping".to_string());
    };
    if map.contains_key(LAST_MODIFIED_KEY) {
        return Ok(vec![("single".to_string(), container)]);
    }
    if map.is_empty() {
        return Err("group container is empty".to_string());
    }
    if let Some(key) = map.keys().find(|k| !is_ordinal(k)) {
        return Err(format!(
            "no `{}` and non-ordinal key `{}`",
            LAST_MODIFIED_KEY, key
        ));
    }
    Ok(map.iter().map(|(k, v)| (k.clone(), v)).collect())
}

fn is_ordinal(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit())
}

/// Pairs from every summary of one group.
///
/// A group normally holds one summary; several summaries sharing a group
/// arrive as an ordinal mapping and are visited in turn.
fn group_pairs<'a>(
    section: Section,
    label: &str,
    group: &'a RawNode,
) -> Vec<Result<(&'a str, &'a str), CollectError>> {
    let missing = |group: String, missing: &'static str| CollectError::MissingAffiliationData {
        section: section.name,
        group,
        missing,
    };

    let Some(summary) = group.get(section.summary_key) else {
        return vec![Err(missing(label.to_string(), section.summary_key))];
    };

    match summary.as_mapping() {
        Some(map)
            if !map.contains_key(ORGANIZATION_KEY)
                && !map.is_empty()
                && map.keys().all(|k| is_ordinal(k)) =>
        {
            map.iter()
                .map(|(i, s)| {
                    organization_pair(s).map_err(|m| missing(format!("{}.{}", label, i), m))
                })
                .collect()
        }
        _ => vec![organization_pair(summary).map_err(|m| missing(label.to_string(), m))],
    }
}

fn organization_pair(summary: &RawNode) -> Result<(&str, &str), &'static str> {
    let org = summary.get(ORGANIZATION_KEY).ok_or(ORGANIZATION_KEY)?;
    let name = non_empty(org.get("name")).ok_or("organization name")?;
    let country = non_empty(org.lookup(&["address", "country"])).ok_or("organization country")?;
    Ok((country, name))
}

fn non_empty(node: Option<&RawNode>) -> Option<&str> {
    node.and_then(RawNode::as_scalar)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::extract_record;
    use crate::tree::from_json;
    use serde_json::{json, Value};

    fn record_with(id: &str, activities: Value) -> NormalizedRecord {
        extract_record(from_json(json!({
            "record:record": {
                "person:person": { "@path": format!("/{}/person", id) },
                "activities:activities-summary": activities
            }
        })))
        .unwrap()
    }

    fn org(name: &str, country: &str) -> Value {
        json!({ "organization": { "name": name, "address": { "city": "X", "country": country } } })
    }

    fn names(index: &AffiliationIndex, country: &str) -> Vec<String> {
        index
            .institutions(country)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_single_group_is_read_directly() {
        let rec = record_with(
            "0000-0001",
            json!({
                "educations": {
                    "affiliation-group": {
                        "last-modified-date": "2020-01-01",
                        "education-summary": org("MIT", "US")
                    }
                }
            }),
        );

        let mut index = AffiliationIndex::new();
        let outcome = collect_affiliations(&rec, &mut index);

        assert_eq!(names(&index, "US"), vec!["MIT"]);
        assert_eq!(outcome.pairs_added, 1);
        assert!(outcome.issues.is_empty());
    }

    #[test]
    fn test_multiple_groups_are_iterated() {
        let rec = record_with(
            "0000-0001",
            json!({
                "educations": {
                    "affiliation-group": {
                        "0": { "education-summary": org("MIT", "US") },
                        "1": { "education-summary": org("Stanford", "US") },
                        "2": { "education-summary": org("MIT", "US") }
                    }
                }
            }),
        );

        let mut index = AffiliationIndex::new();
        let outcome = collect_affiliations(&rec, &mut index);

        assert_eq!(names(&index, "US"), vec!["MIT", "Stanford"]);
        assert_eq!(outcome.pairs_seen, 3);
        assert_eq!(outcome.pairs_added, 2);
    }

    #[test]
    fn test_group_list_from_xml_shape() {
        // a repeated element normalized into ordinals
        let rec = record_with(
            "0000-0001",
            json!({
                "activities:employments": {
                    "activities:affiliation-group": [
                        { "common:last-modified-date": "1", "employment:employment-summary": org("CERN", "CH") },
                        { "common:last-modified-date": "2", "employment:employment-summary": org("EPFL", "CH") }
                    ]
                }
            }),
        );

        let mut index = AffiliationIndex::new();
        collect_affiliations(&rec, &mut index);
        assert_eq!(names(&index, "CH"), vec!["CERN", "EPFL"]);
    }

    #[test]
    fn test_same_pair_across_records_is_kept_once() {
        let activities = json!({
            "employments": {
                "affiliation-group": {
                    "last-modified-date": "2020-01-01",
                    "employment-summary": org("Universidad de Oviedo", "ES")
                }
            }
        });
        let a = record_with("0000-0001", activities.clone());
        let b = record_with("0000-0002", activities);

        let mut index = AffiliationIndex::new();
        let first = collect_affiliations(&a, &mut index);
        let second = collect_affiliations(&b, &mut index);

        assert_eq!(names(&index, "ES"), vec!["Universidad de Oviedo"]);
        assert_eq!(first.pairs_added, 1);
        assert_eq!(second.pairs_seen, 1);
        assert_eq!(second.pairs_added, 0);
    }

    #[test]
    fn test_both_sections_feed_the_index() {
        let rec = record_with(
            "0000-0001",
            json!({
                "educations": {
                    "affiliation-group": {
                        "last-modified-date": "1",
                        "education-summary": org("Sorbonne", "FR")
                    }
                },
                "employments": {
                    "affiliation-group": {
                        "0": { "employment-summary": org("INRIA", "FR") },
                        "1": { "employment-summary": org("Max Planck", "DE") }
                    }
                }
            }),
        );

        let mut index = AffiliationIndex::new();
        collect_affiliations(&rec, &mut index);

        assert_eq!(names(&index, "FR"), vec!["Sorbonne", "INRIA"]);
        assert_eq!(names(&index, "DE"), vec!["Max Planck"]);
        let countries: Vec<&str> = index.iter().map(|(c, _)| c).collect();
        assert_eq!(countries, vec!["FR", "DE"]);
    }

    #[test]
    fn test_missing_org_data_skips_only_that_group() {
        let rec = record_with(
            "0000-0001",
            json!({
                "educations": {
                    "affiliation-group": {
                        "0": { "education-summary": { "organization": { "name": "Nowhere U" } } },
                        "1": { "education-summary": { "organization": { "name": "No Country", "address": { "city": "Y" } } } },
                        "2": { "education-summary": { "organization": { "address": { "country": "GB" } } } },
                        "3": { "other-summary": org("Wrong Key", "GB") },
                        "4": { "education-summary": org("Oxford", "GB") }
                    }
                }
            }),
        );

        let mut index = AffiliationIndex::new();
        let outcome = collect_affiliations(&rec, &mut index);

        assert_eq!(names(&index, "GB"), vec!["Oxford"]);
        assert_eq!(outcome.groups_skipped(), 4);
        assert_eq!(outcome.sections_skipped(), 0);
        assert_eq!(
            outcome.issues[0],
            CollectError::MissingAffiliationData {
                section: "educations",
                group: "0".to_string(),
                missing: "organization country",
            }
        );
        assert_eq!(
            outcome.issues[3],
            CollectError::MissingAffiliationData {
                section: "educations",
                group: "3".to_string(),
                missing: "education-summary",
            }
        );
    }

    #[test]
    fn test_unclassifiable_container_skips_section() {
        let rec = record_with(
            "0000-0001",
            json!({
                "educations": {
                    // a lone group without its date: misread as a list, so flagged
                    "affiliation-group": { "education-summary": org("MIT", "US") }
                },
                "employments": {
                    "affiliation-group": "free text"
                }
            }),
        );

        let mut index = AffiliationIndex::new();
        let outcome = collect_affiliations(&rec, &mut index);

        assert!(index.is_empty());
        assert_eq!(outcome.sections_skipped(), 2);
        assert!(matches!(
            &outcome.issues[0],
            CollectError::AmbiguousShape { section: "educations", detail } if detail.contains("education-summary")
        ));
    }

    #[test]
    fn test_absent_sections_and_groups_are_ignored() {
        let rec = record_with(
            "0000-0001",
            json!({ "educations": { "x": "1" }, "works": { "group": "2" } }),
        );

        let mut index = AffiliationIndex::new();
        let outcome = collect_affiliations(&rec, &mut index);

        assert!(index.is_empty());
        assert_eq!(outcome, CollectOutcome::default());
    }

    #[test]
    fn test_several_summaries_in_one_group() {
        let rec = record_with(
            "0000-0001",
            json!({
                "employments": {
                    "affiliation-group": {
                        "last-modified-date": "1",
                        "employment-summary": [org("KTH", "SE"), org("Lund", "SE")]
                    }
                }
            }),
        );

        let mut index = AffiliationIndex::new();
        let outcome = collect_affiliations(&rec, &mut index);

        assert_eq!(names(&index, "SE"), vec!["KTH", "Lund"]);
        assert!(outcome.issues.is_empty());
    }

    #[test]
    fn test_resolve_groups_classification() {
        let single = from_json(json!({ "last-modified-date": "1", "education-summary": "x" }));
        assert_eq!(resolve_groups(&single).unwrap().len(), 1);

        let many = from_json(json!({ "0": "a", "1": "b", "10": "c" }));
        let labels: Vec<String> = resolve_groups(&many).unwrap().into_iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec!["0", "1", "10"]);

        assert!(resolve_groups(&from_json(json!({}))).is_err());
        assert!(resolve_groups(&from_json(json!(["a"]))).is_err());
        assert!(resolve_groups(&from_json(json!({ "0": "a", "x": "b" }))).is_err());
    }
}
