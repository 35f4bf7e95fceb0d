// src/config.rs

use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_EXTENSION: &str = "xml";
pub const DEFAULT_REPORT: &str = "affiliations_report.csv";

/// Ingest ORCID researcher summaries and report institutions per country.
#[derive(Parser, Debug, Clone)]
#[command(name = "orcid-ingest", version)]
pub struct PipelineConfig {
    /// Root directory holding one sub-directory per batch of researcher files
    #[arg(long, env = "ORCID_DATA_DIR")]
    pub data_dir: PathBuf,

    /// Where to write the Country/Institutions report
    #[arg(long, env = "ORCID_REPORT", default_value = DEFAULT_REPORT)]
    pub report: PathBuf,

    /// Store normalized documents as `<id>.json` under this directory
    #[arg(long, env = "ORCID_STORE_DIR")]
    pub store_dir: Option<PathBuf>,

    /// Write a JSON run summary here
    #[arg(long, env = "ORCID_SUMMARY")]
    pub summary: Option<PathBuf>,

    /// Extension of researcher files inside each batch directory
    #[arg(long, env = "ORCID_EXTENSION", default_value = DEFAULT_EXTENSION)]
    pub extension: String,

    /// Worker threads for parsing (defaults to the number of CPUs)
    #[arg(long, env = "ORCID_THREADS")]
    pub threads: Option<usize>,
}

impl PipelineConfig {
    /// Defaults for everything but the input root.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            report: PathBuf::from(DEFAULT_REPORT),
            store_dir: None,
            summary: None,
            extension: DEFAULT_EXTENSION.to_string(),
            threads: None,
        }
    }

    pub fn thread_count(&self) -> usize {
        self.threads.filter(|n| *n > 0).unwrap_or_else(num_cpus::get)
    }
}
