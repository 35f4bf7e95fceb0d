// src/process/summary.rs

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{fs, path::Path, path::PathBuf};
use tracing::info;

/// Why a researcher file did not produce a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipKind {
    Unreadable,
    Parse,
    MalformedInput,
    Identifier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipReason {
    pub path: PathBuf,
    pub kind: SkipKind,
    pub message: String,
}

/// Counters for one run over the input tree.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub batches: usize,
    pub files_seen: usize,
    pub processed: usize,
    pub skipped: usize,
    pub stored: usize,
    pub pairs_seen: usize,
    /// Sections dropped because their group container could not be classified.
    pub sections_skipped: usize,
    /// Groups dropped for missing organization data.
    pub groups_skipped: usize,
    pub countries: usize,
    pub institutions: usize,
    pub skips: Vec<SkipReason>,
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}

impl RunSummary {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            batches: 0,
            files_seen: 0,
            processed: 0,
            skipped: 0,
            stored: 0,
            pairs_seen: 0,
            sections_skipped: 0,
            groups_skipped: 0,
            countries: 0,
            institutions: 0,
            skips: Vec::new(),
        }
    }

    pub fn count(&self, kind: SkipKind) -> usize {
        self.skips.iter().filter(|s| s.kind == kind).count()
    }

    pub fn log(&self) {
        info!(
            batches = self.batches,
            files = self.files_seen,
            processed = self.processed,
            skipped = self.skipped,
            stored = self.stored,
            sections_skipped = self.sections_skipped,
            groups_skipped = self.groups_skipped,
            countries = self.countries,
            institutions = self.institutions,
            "run complete"
        );
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating summary directory {:?}", parent))?;
        }
        let mut text = serde_json::to_string_pretty(self).context("serializing run summary")?;
        text.push('\n');
        fs::write(path, text).with_context(|| format!("writing run summary {:?}", path))?;
        Ok(())
    }
}
