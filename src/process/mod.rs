// src/process/mod.rs

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::{
    fs::File,
    io::{self, BufReader},
    path::Path,
    time::Instant,
};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::affiliation::{collect_affiliations, AffiliationIndex};
use crate::config::PipelineConfig;
use crate::record::{extract_record, ExtractError, NormalizedRecord};
use crate::sink::{RecordSink, ReportSink};
use crate::xml::{self, ParseError};

pub mod discover;
pub mod summary;

pub use discover::{discover_batches, Batch};
pub use summary::{RunSummary, SkipKind, SkipReason};

/// Why one researcher file was skipped.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("reading file: {0}")]
    Read(#[from] io::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

impl FileError {
    pub fn kind(&self) -> SkipKind {
        match self {
            FileError::Read(_) => SkipKind::Unreadable,
            FileError::Parse(_) => SkipKind::Parse,
            FileError::Extract(ExtractError::MalformedInput(_)) => SkipKind::MalformedInput,
            FileError::Extract(ExtractError::Identifier(_)) => SkipKind::Identifier,
        }
    }
}

/// Read, parse and normalize one researcher file.
#[instrument(level = "debug", skip(path), fields(path = %path.display()))]
pub fn load_record(path: &Path) -> Result<NormalizedRecord, FileError> {
    let file = File::open(path)?;
    let raw = xml::parse_reader(BufReader::new(file))?;
    Ok(extract_record(raw)?)
}

/// Single writer over the run state: the store, the affiliation index and
/// the counters. Files must be fed in the order they should appear in the
/// report.
pub struct Pipeline<'s> {
    store: Option<&'s mut dyn RecordSink>,
    index: AffiliationIndex,
    summary: RunSummary,
}

impl<'s> Pipeline<'s> {
    pub fn new(store: Option<&'s mut dyn RecordSink>) -> Self {
        Self {
            store,
            index: AffiliationIndex::new(),
            summary: RunSummary::new(),
        }
    }

    pub fn index(&self) -> &AffiliationIndex {
        &self.index
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Fold one file's result into the run.
    ///
    /// A skipped file is only counted; the error is returned solely when the
    /// store cannot be written.
    pub fn ingest(&mut self, path: &Path, loaded: Result<NormalizedRecord, FileError>) -> Result<()> {
        self.summary.files_seen += 1;

        let record = match loaded {
            Ok(record) => record,
            Err(err) => {
                let kind = err.kind();
                match kind {
                    SkipKind::Identifier => {
                        error!(path = %path.display(), "record has no usable id: {}", err)
                    }
                    _ => warn!(path = %path.display(), ?kind, "skipping file: {}", err),
                }
                self.summary.skipped += 1;
                self.summary.skips.push(SkipReason {
                    path: path.to_path_buf(),
                    kind,
                    message: err.to_string(),
                });
                return Ok(());
            }
        };

        if let Some(store) = self.store.as_deref_mut() {
            store
                .upsert(&record)
                .with_context(|| format!("storing record {} from {:?}", record.id(), path))?;
            self.summary.stored += 1;
        }

        let outcome = collect_affiliations(&record, &mut self.index);
        self.summary.processed += 1;
        self.summary.pairs_seen += outcome.pairs_seen;
        self.summary.sections_skipped += outcome.sections_skipped();
        self.summary.groups_skipped += outcome.groups_skipped();
        debug!(id = %record.id(), path = %path.display(), "ingested record");
        Ok(())
    }

    /// Parse a batch on `pool`, then fold the results in file order.
    #[instrument(level = "info", skip_all, fields(batch = %batch.name, files = batch.files.len()))]
    pub fn ingest_batch(&mut self, pool: &rayon::ThreadPool, batch: &Batch) -> Result<()> {
        let start = Instant::now();
        let loaded: Vec<Result<NormalizedRecord, FileError>> =
            pool.install(|| batch.files.par_iter().map(|p| load_record(p)).collect());

        for (path, result) in batch.files.iter().zip(loaded) {
            self.ingest(path, result)?;
        }
        self.summary.batches += 1;
        info!(elapsed = ?start.elapsed(), "batch done");
        Ok(())
    }

    /// Flush the index to `report` and close the summary.
    pub fn finish(mut self, report: &mut dyn ReportSink) -> Result<(RunSummary, AffiliationIndex)> {
        report.write(&self.index).context("writing affiliation report")?;
        self.summary.countries = self.index.len();
        self.summary.institutions = self.index.pair_count();
        self.summary.finished_at = Some(chrono::Utc::now());
        Ok((self.summary, self.index))
    }
}

/// Run the whole ingestion described by `config`.
///
/// Per-file problems are counted in the returned summary. Errors are
/// reserved for an unreadable input root, a failing store or report, and
/// an unwritable summary file.
#[instrument(level = "info", skip_all, fields(data_dir = %config.data_dir.display()))]
pub fn run(
    config: &PipelineConfig,
    store: Option<&mut dyn RecordSink>,
    report: &mut dyn ReportSink,
) -> Result<(RunSummary, AffiliationIndex)> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.thread_count())
        .build()
        .context("building parser thread pool")?;

    let batches = discover_batches(&config.data_dir, &config.extension)?;
    info!(batches = batches.len(), "discovered input batches");

    let mut pipeline = Pipeline::new(store);
    for batch in &batches {
        pipeline.ingest_batch(&pool, batch)?;
    }

    let (summary, index) = pipeline.finish(report)?;
    summary.log();
    if let Some(path) = &config.summary {
        summary.write_json(path)?;
    }
    Ok((summary, index))
}
