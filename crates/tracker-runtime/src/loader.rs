//! Timed workbook loading.
//!
//! [`WorkbookLoader`] reads a workbook, runs the ingestion pipeline with
//! `tokio::task::yield_now` between batches and races the whole ingestion
//! against the configured time budget. Dropping the ingestion future is the
//! only way it is aborted.

use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tracker_core::error::{Result, TrackerError};
use tracker_core::models::{CanonicalRecord, RawRow};
use tracker_core::settings::{Settings, DEFAULT_BATCH_SIZE, DEFAULT_TIMEOUT_SECS};
use tracker_data::ingest::{IngestionOutcome, IngestionReport, RecordIngestionPipeline};
use tracker_data::reader::{read_workbook_bytes, read_workbook_file, DEFAULT_MAX_FILE_SIZE};

// ── LoaderConfig ──────────────────────────────────────────────────────────────

/// Limits applied to one load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Payload ceiling, checked before parsing.
    pub max_file_size_bytes: u64,
    /// Rows per ingestion batch.
    pub batch_size: usize,
    /// Budget for the ingestion phase.
    pub timeout: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE as usize,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl From<&Settings> for LoaderConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            max_file_size_bytes: settings.max_file_size_bytes(),
            batch_size: usize::try_from(settings.batch_size).unwrap_or(usize::MAX),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }
}

// ── LoadedDataset ─────────────────────────────────────────────────────────────

/// Metadata produced alongside a loaded dataset.
#[derive(Debug, Clone, Serialize)]
pub struct LoadMetadata {
    /// Where the rows came from (a path or a caller-supplied name).
    pub source: String,
    /// RFC 3339 timestamp of when the load finished.
    pub generated_at: String,
    /// Wall-clock seconds spent reading and parsing the workbook.
    pub read_time_seconds: f64,
    /// Wall-clock seconds spent in the ingestion pipeline.
    pub ingest_time_seconds: f64,
}

/// Canonical records with their ingestion report.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub records: Vec<CanonicalRecord>,
    pub report: IngestionReport,
    pub metadata: LoadMetadata,
}

// ── WorkbookLoader ────────────────────────────────────────────────────────────

/// Reads workbooks and turns them into [`LoadedDataset`]s.
#[derive(Debug, Clone)]
pub struct WorkbookLoader {
    config: LoaderConfig,
    pipeline: RecordIngestionPipeline,
}

impl Default for WorkbookLoader {
    fn default() -> Self {
        Self::new(LoaderConfig::default())
    }
}

impl WorkbookLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            pipeline: RecordIngestionPipeline::new(config.batch_size),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Load the first sheet of the workbook at `path`.
    pub async fn load(&self, path: &Path) -> Result<LoadedDataset> {
        let read_start = Instant::now();
        let rows = read_workbook_file(path, self.config.max_file_size_bytes)?;
        let read_time = read_start.elapsed();

        self.finish(path.display().to_string(), rows, read_time).await
    }

    /// Load an in-memory workbook, e.g. an upload.
    pub async fn load_bytes(&self, name: &str, bytes: Vec<u8>) -> Result<LoadedDataset> {
        let read_start = Instant::now();
        let rows = read_workbook_bytes(Path::new(name), bytes, self.config.max_file_size_bytes)?;
        let read_time = read_start.elapsed();

        self.finish(name.to_string(), rows, read_time).await
    }

    /// Ingest rows that were already read by the caller.
    pub async fn load_rows(&self, source: &str, rows: Vec<RawRow>) -> Result<LoadedDataset> {
        self.finish(source.to_string(), rows, Duration::ZERO).await
    }

    // ── Private helpers ───────────────────────────────────────────────────────

    async fn finish(
        &self,
        source: String,
        rows: Vec<RawRow>,
        read_time: Duration,
    ) -> Result<LoadedDataset> {
        let ingest_start = Instant::now();
        let IngestionOutcome { records, report } = with_deadline(
            self.config.timeout,
            self.pipeline.run(&rows, tokio::task::yield_now),
        )
        .await?;
        let ingest_time = ingest_start.elapsed();

        tracing::debug!(
            source = %source,
            records = records.len(),
            dropped = report.rows_dropped,
            "dataset loaded"
        );

        Ok(LoadedDataset {
            records,
            report,
            metadata: LoadMetadata {
                source,
                generated_at: Utc::now().to_rfc3339(),
                read_time_seconds: read_time.as_secs_f64(),
                ingest_time_seconds: ingest_time.as_secs_f64(),
            },
        })
    }
}

/// Await `fut`, failing with [`TrackerError::ProcessingTimeout`] once
/// `timeout` has passed.
pub(crate) async fn with_deadline<T, F>(timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(seconds = timeout.as_secs(), "ingestion timed out");
            Err(TrackerError::ProcessingTimeout {
                seconds: timeout.as_secs(),
            })
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
