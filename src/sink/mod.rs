// src/sink/mod.rs

use anyhow::Result;

use crate::affiliation::AffiliationIndex;
use crate::record::NormalizedRecord;

pub mod report;
pub mod store;

pub use report::CsvReport;
pub use store::{JsonDirSink, MemorySink};

/// Destination for normalized researcher documents.
pub trait RecordSink {
    /// Insert or replace the document stored under `record.id()`.
    fn upsert(&mut self, record: &NormalizedRecord) -> Result<()>;
}

/// Destination for the country → institutions table, written once per run.
pub trait ReportSink {
    fn write(&mut self, index: &AffiliationIndex) -> Result<()>;
}
