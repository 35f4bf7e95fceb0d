// src/sink/report.rs

use anyhow::{Context, Result};
use csv::WriterBuilder;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::{info, warn};

use super::ReportSink;
use crate::affiliation::AffiliationIndex;

/// Institution names are joined with this inside one cell.
pub const INSTITUTION_SEPARATOR: &str = ", ";
/// Field delimiter; commas and quotes are common inside institution names.
pub const FIELD_DELIMITER: u8 = b'/';
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// `Country` / `Institutions` rows in index order, quotes removed from names.
pub fn report_rows(index: &AffiliationIndex) -> Vec<(String, String)> {
    index
        .iter()
        .map(|(country, institutions)| {
            let joined = institutions
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(INSTITUTION_SEPARATOR)
                .replace('"', "");
            (country.to_string(), joined)
        })
        .collect()
}

/// Writes the report as a `/`-delimited, BOM-prefixed UTF-8 CSV file.
pub struct CsvReport {
    path: PathBuf,
}

impl CsvReport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSink for CsvReport {
    /// An empty index produces no file.
    fn write(&mut self, index: &AffiliationIndex) -> Result<()> {
        if index.is_empty() {
            warn!(path = %self.path.display(), "no affiliations collected, report not written");
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating report directory {:?}", parent))?;
        }
        let file = File::create(&self.path)
            .with_context(|| format!("creating report file {:?}", &self.path))?;
        let mut out = BufWriter::new(file);
        out.write_all(UTF8_BOM)?;

        let mut wtr = WriterBuilder::new()
            .delimiter(FIELD_DELIMITER)
            .from_writer(out);
        wtr.write_record(["Country", "Institutions"])?;
        let rows = report_rows(index);
        for (country, institutions) in &rows {
            wtr.write_record([country, institutions])
                .with_context(|| format!("writing report row for {}", country))?;
        }
        wtr.flush()
            .with_context(|| format!("flushing report {:?}", &self.path))?;

        info!(path = %self.path.display(), rows = rows.len(), "wrote affiliation report");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_index() -> AffiliationIndex {
        let mut index = AffiliationIndex::new();
        index.insert("US", "MIT");
        index.insert("US", "Stanford");
        index.insert("ES", "Universidad \"Carlos III\"");
        index.insert("ES", "CSIC");
        index
    }

    #[test]
    fn test_report_rows_join_and_strip_quotes() {
        let rows = report_rows(&sample_index());
        assert_eq!(
            rows,
            vec![
                ("US".to_string(), "MIT, Stanford".to_string()),
                ("ES".to_string(), "Universidad Carlos III, CSIC".to_string()),
            ]
        );
    }

    #[test]
    fn test_csv_report_layout() -> Result<()> {
        let tmp = tempdir()?;
        let path = tmp.path().join("reports").join("affiliations.csv");
        let mut report = CsvReport::new(&path);
        report.write(&sample_index())?;

        let bytes = fs::read(&path)?;
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec())?;
        assert_eq!(
            text,
            "Country/Institutions\nUS/MIT, Stanford\nES/Universidad Carlos III, CSIC\n"
        );
        Ok(())
    }

    #[test]
    fn test_csv_report_quotes_names_with_delimiter() -> Result<()> {
        let tmp = tempdir()?;
        let path = tmp.path().join("r.csv");
        let mut index = AffiliationIndex::new();
        index.insert("GB", "Oxford/Brookes");
        CsvReport::new(&path).write(&index)?;

        let text = fs::read_to_string(&path)?;
        assert!(text.ends_with("GB/\"Oxford/Brookes\"\n"));
        Ok(())
    }

    #[test]
    fn test_empty_index_writes_nothing() -> Result<()> {
        let tmp = tempdir()?;
        let path = tmp.path().join("empty.csv");
        CsvReport::new(&path).write(&AffiliationIndex::new())?;
        assert!(!path.exists());
        Ok(())
    }
}
