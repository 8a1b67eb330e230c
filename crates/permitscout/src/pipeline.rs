use std::path::PathBuf;

use chrono::NaiveDate;

use crate::browser::{Browser, BrowserError};
use crate::collector::{CollectError, CollectionController, CollectionReport};
use crate::config::PipelineConfig;
use crate::dataset::{
    DatasetError, prepare_records, rotate_outputs, write_rows_csv, write_rows_json, write_rows_xlsx,
};
use crate::detail::{DetailOutcome, DetailScraper};
use crate::intervals::{InvalidRangeError, plan_intervals};
use crate::owners::expand_owners;
use crate::types::{OwnerRow, RawRecordRow};
use crate::utils::{RecordTypeFilter, RunStats};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),
    #[error("Collection failed: {0}")]
    Collect(#[from] CollectError),
    #[error(transparent)]
    InvalidRange(#[from] InvalidRangeError),
    #[error("Invalid record window: {0}")]
    Window(String),
    #[error("No data file at {0}, run the collection phase first")]
    MissingDataset(PathBuf),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Xlsx,
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Xlsx => "xlsx",
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

/// Phase one: search the permits portal month by month and build the data file.
pub async fn run_collection<B: Browser>(
    browser: &mut B,
    config: &PipelineConfig,
    start: NaiveDate,
    end: NaiveDate,
    stats: &mut RunStats,
) -> Result<CollectionReport, PipelineError> {
    let intervals = plan_intervals(start, end)?;
    stats.intervals_planned = intervals.len();
    log::info!("Planned {} interval(s) from {start} to {end}", intervals.len());

    let filter = RecordTypeFilter::load(&config.filter_path)?;
    let mut controller = CollectionController::new(browser, config, filter);
    controller
        .open_portal()
        .await
        .inspect_err(|e| log::error!("Could not reach the permit search: {e}"))?;

    let report = controller.collect_all(intervals).await;
    stats.intervals_merged = report.merged();
    stats.intervals_empty = report.empty();
    stats.intervals_abandoned = report.abandoned.len();
    for interval in &report.abandoned {
        log::error!("Abandoned interval {interval}");
    }
    Ok(report)
}

/// The records to enrich: filtered, deduplicated and windowed.
pub fn load_records(config: &PipelineConfig) -> Result<Vec<RawRecordRow>, PipelineError> {
    if !config.canonical_path.exists() {
        return Err(PipelineError::MissingDataset(config.canonical_path.clone()));
    }
    let window = config.window.validate().map_err(PipelineError::Window)?;
    let filter = RecordTypeFilter::load(&config.filter_path)?;
    let records = prepare_records(&config.canonical_path, filter.as_ref())?;
    Ok(window.apply(records))
}

/// Looks every record up on the auditor site and fans the results out per owner.
///
/// Records that are skipped or fail contribute no rows; the run carries on.
pub async fn enrich_records<B: Browser>(
    browser: &mut B,
    config: &PipelineConfig,
    records: &[RawRecordRow],
    stats: &mut RunStats,
) -> Vec<OwnerRow> {
    let mut rows = Vec::new();
    for (i, record) in records.iter().enumerate() {
        log::info!("Processing record {}/{}: {}", i + 1, records.len(), record.address);

        if let Err(e) = browser.navigate(&config.auditor_url).await {
            log::error!("Could not open the auditor search for {record}: {e}");
            stats.records_failed += 1;
            continue;
        }

        match DetailScraper::new(browser, &config.timeouts)
            .scrape(record)
            .await
        {
            DetailOutcome::Skipped => stats.records_skipped += 1,
            DetailOutcome::NoRecord(detail) => {
                stats.records_not_found += 1;
                rows.extend(expand_owners(&detail));
            }
            DetailOutcome::Found(detail) => {
                log::debug!("\n{detail}");
                stats.records_found += 1;
                rows.extend(expand_owners(&detail));
            }
            DetailOutcome::Failed(reason) => {
                log::warn!("No usable data for {record}: {reason}");
                stats.records_failed += 1;
            }
        }
    }
    rows
}

/// Rotates the last run's files and writes the final table.
pub fn write_output(
    rows: &[OwnerRow],
    config: &PipelineConfig,
    format: OutputFormat,
) -> Result<(), PipelineError> {
    rotate_outputs(
        &config.output_path,
        &config.previous_output_path,
        &config.canonical_path,
        &config.processed_path,
    )
    .map_err(DatasetError::from)?;

    match format {
        OutputFormat::Xlsx => write_rows_xlsx(rows, &config.output_path),
        OutputFormat::Csv => write_rows_csv(rows, &config.output_path),
        OutputFormat::Json => write_rows_json(rows, &config.output_path),
    }
    .inspect_err(|e| log::error!("Failed to write {}: {e}", config.output_path.display()))?;

    log::info!("Data saved to {}", config.output_path.display());
    Ok(())
}

/// Phase two: enrich the data file and write the final table.
pub async fn run_enrichment<B: Browser>(
    browser: &mut B,
    config: &PipelineConfig,
    format: OutputFormat,
    stats: &mut RunStats,
) -> Result<usize, PipelineError> {
    let records = load_records(config)?;
    log::info!("Enriching {} record(s)", records.len());

    let rows = enrich_records(browser, config, &records, stats).await;
    write_output(&rows, config, format)?;
    stats.rows_written = rows.len();
    Ok(rows.len())
}
