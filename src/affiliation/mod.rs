// src/affiliation/mod.rs

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

pub mod collect;

pub use collect::{collect_affiliations, CollectError, CollectOutcome, Section, SECTIONS};

/// Country → institutions seen there, both in first-seen order.
///
/// Built by a single writer across a whole run; the insertion order makes
/// the report reproducible for a given file order.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AffiliationIndex {
    countries: IndexMap<String, IndexSet<String>>,
}

impl AffiliationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `institution` under `country`. Returns `false` if the pair was already known.
    pub fn insert(&mut self, country: &str, institution: &str) -> bool {
        match self.countries.get_mut(country) {
            Some(set) if set.contains(institution) => false,
            Some(set) => set.insert(institution.to_string()),
            None => {
                let mut set = IndexSet::new();
                set.insert(institution.to_string());
                self.countries.insert(country.to_string(), set);
                true
            }
        }
    }

    pub fn institutions(&self, country: &str) -> Option<&IndexSet<String>> {
        self.countries.get(country)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &IndexSet<String>)> {
        self.countries.iter().map(|(c, set)| (c.as_str(), set))
    }

    /// Number of countries.
    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }

    /// Number of (country, institution) pairs.
    pub fn pair_count(&self) -> usize {
        self.countries.values().map(IndexSet::len).sum()
    }
}
