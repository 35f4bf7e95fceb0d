use anyhow::Result;
use clap::Parser;
use orcid_ingest::{
    config::PipelineConfig,
    process::{self, SkipKind},
    sink::{CsvReport, JsonDirSink, RecordSink},
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    // ─── 2) configure ────────────────────────────────────────────────
    let config = PipelineConfig::parse();
    info!(
        data_dir = %config.data_dir.display(),
        report = %config.report.display(),
        store = ?config.store_dir,
        threads = config.thread_count(),
        "startup"
    );

    let mut store = match &config.store_dir {
        Some(dir) => Some(JsonDirSink::new(dir)?),
        None => None,
    };
    let mut report = CsvReport::new(&config.report);

    // ─── 3) ingest ───────────────────────────────────────────────────
    let (summary, _index) = process::run(
        &config,
        store.as_mut().map(|s| s as &mut dyn RecordSink),
        &mut report,
    )?;

    let missing_ids = summary.count(SkipKind::Identifier);
    if missing_ids > 0 {
        warn!(count = missing_ids, "records without a usable id were not stored");
    }

    info!("all done");
    Ok(())
}
