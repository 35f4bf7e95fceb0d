// src/sink/store.rs

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::debug;

use super::RecordSink;
use crate::record::NormalizedRecord;

/// One pretty-printed `<id>.json` file per researcher.
pub struct JsonDirSink {
    dir: PathBuf,
}

impl JsonDirSink {
    /// Store documents under `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating store directory {:?}", &dir))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\']) {
            bail!("researcher id {:?} cannot be used as a file name", id);
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }
}

impl RecordSink for JsonDirSink {
    /// Written to a temp file in the same directory, then renamed over any
    /// previous version.
    fn upsert(&mut self, record: &NormalizedRecord) -> Result<()> {
        let path = self.path_for(record.id())?;

        let mut tmp = NamedTempFile::new_in(&self.dir)
            .with_context(|| format!("creating temp file in {:?}", &self.dir))?;
        serde_json::to_writer_pretty(&mut tmp, record)
            .with_context(|| format!("serializing record {}", record.id()))?;
        tmp.write_all(b"\n")?;
        tmp.persist(&path)
            .map_err(|e| e.error)
            .with_context(|| format!("renaming temp file onto {:?}", &path))?;

        debug!(id = %record.id(), path = %path.display(), "stored record");
        Ok(())
    }
}

/// Keeps documents in memory, keyed by id.
#[derive(Debug, Default)]
pub struct MemorySink {
    documents: IndexMap<String, serde_json::Value>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&serde_json::Value> {
        self.documents.get(id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl RecordSink for MemorySink {
    fn upsert(&mut self, record: &NormalizedRecord) -> Result<()> {
        let value = serde_json::to_value(record)
            .with_context(|| format!("serializing record {}", record.id()))?;
        self.documents.insert(record.id().to_string(), value);
        Ok(())
    }
}
