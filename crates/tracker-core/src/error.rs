use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the PSP tracker.
///
/// The first five variants abort an ingestion call and are shown to the user
/// as a single message. Per-row problems are not errors; see
/// [`crate::models::RowSkip`].
#[derive(Error, Debug)]
pub enum TrackerError {
    /// The workbook payload exceeds the configured size ceiling.
    #[error("File {path} is too large: {size} bytes exceeds the {limit} byte limit")]
    FileTooLarge {
        path: PathBuf,
        size: u64,
        limit: u64,
    },

    /// The payload is empty, has no sheets, or its first sheet is blank.
    #[error("Unreadable workbook: {0}")]
    UnreadableWorkbook(String),

    /// The first sheet has a header but no data rows.
    #[error("No data rows found in the first sheet")]
    NoData,

    /// Rows were read but none carried a week, country and PSP.
    #[error("No valid records: all {rows} rows were dropped ({dropped} missing week, country or PSP)")]
    NoValidRecords { rows: usize, dropped: usize },

    /// Ingestion did not finish within the caller's time budget.
    #[error("Processing timed out after {seconds} seconds")]
    ProcessingTimeout { seconds: u64 },

    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the tracker crates.
pub type Result<T> = std::result::Result<T, TrackerError>;
