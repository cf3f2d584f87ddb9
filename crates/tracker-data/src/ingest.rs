//! Raw rows → canonical records.
//!
//! Rows are transformed in fixed-size batches. [`RecordIngestionPipeline::run`]
//! awaits a caller-supplied yield point between batches so a long file never
//! holds the executor for more than one batch; the batch step itself is plain
//! synchronous code. Once every batch is done the share computer runs over
//! the surviving records.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tracker_core::error::{Result, TrackerError};
use tracker_core::models::{CanonicalRecord, LogicalField, RawRow, RowSkip};
use tracker_core::normalize::{canonicalize_psp, parse_number};
use tracker_core::schema::SchemaResolver;

use crate::shares::ShareComputer;

/// Rows per batch unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// How many drop reasons are kept for diagnostics.
pub const MAX_DROP_SAMPLES: usize = 5;

// ── Report types ──────────────────────────────────────────────────────────────

/// One dropped row, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropSample {
    /// Zero-based position in the input.
    pub row_index: usize,
    pub reason: RowSkip,
}

/// Counters for one ingestion run.
///
/// `records_created == rows_read - rows_dropped` always holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionReport {
    pub rows_read: usize,
    pub records_created: usize,
    pub rows_dropped: usize,
    pub batches: usize,
    /// The first [`MAX_DROP_SAMPLES`] drop reasons, in input order.
    pub drop_samples: Vec<DropSample>,
}

/// Result of a successful ingestion run.
#[derive(Debug, Clone)]
pub struct IngestionOutcome {
    /// Canonical records with shares attached, in input order.
    pub records: Vec<CanonicalRecord>,
    pub report: IngestionReport,
}

// ── Working state ─────────────────────────────────────────────────────────────

/// Buffers owned by one run; nothing else touches them while a run is
/// suspended at a yield point.
#[derive(Debug, Default)]
struct IngestionState {
    records: Vec<CanonicalRecord>,
    report: IngestionReport,
}

// ── RecordIngestionPipeline ───────────────────────────────────────────────────

/// Drives schema resolution and normalization over all rows of a sheet.
#[derive(Debug, Clone)]
pub struct RecordIngestionPipeline {
    resolver: SchemaResolver,
    batch_size: usize,
}

impl Default for RecordIngestionPipeline {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl RecordIngestionPipeline {
    /// Create a pipeline. A `batch_size` of 0 is treated as 1.
    pub fn new(batch_size: usize) -> Self {
        Self {
            resolver: SchemaResolver::new(),
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Ingest `rows`, awaiting `yield_point()` between consecutive batches.
    ///
    /// There is no cancellation: callers that need a deadline race this
    /// future against a timer and drop it.
    pub async fn run<F, Fut>(&self, rows: &[RawRow], mut yield_point: F) -> Result<IngestionOutcome>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        if rows.is_empty() {
            return Err(TrackerError::NoData);
        }

        let mut state = IngestionState::default();
        for (batch_no, batch) in rows.chunks(self.batch_size).enumerate() {
            if batch_no > 0 {
                yield_point().await;
            }
            self.process_batch(batch, batch_no * self.batch_size, &mut state);
        }

        self.finish(state)
    }

    /// Ingest `rows` without yielding.
    pub fn run_blocking(&self, rows: &[RawRow]) -> Result<IngestionOutcome> {
        if rows.is_empty() {
            return Err(TrackerError::NoData);
        }

        let mut state = IngestionState::default();
        for (batch_no, batch) in rows.chunks(self.batch_size).enumerate() {
            self.process_batch(batch, batch_no * self.batch_size, &mut state);
        }

        self.finish(state)
    }

    /// Turn one row into a record, or say why it was dropped.
    ///
    /// Counts are clamped at zero; the payment option is optional and blank
    /// text counts as absent.
    pub fn canonicalize_row(&self, row: &RawRow) -> std::result::Result<CanonicalRecord, RowSkip> {
        let week = self.required_text(row, LogicalField::Week)?;
        let country = self.required_text(row, LogicalField::Country)?;
        let psp = canonicalize_psp(&self.required_text(row, LogicalField::Psp)?);
        if psp.is_empty() {
            return Err(RowSkip::MissingField(LogicalField::Psp));
        }

        let press_buy = self.count(row, LogicalField::PressBuyCount);
        let converted = self.count(row, LogicalField::ConvertedCount);

        let payment_option = self
            .resolver
            .resolve(row, LogicalField::PaymentOption)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        Ok(CanonicalRecord::new(
            week,
            country,
            psp,
            press_buy,
            converted,
            payment_option,
        ))
    }

    // ── Private helpers ───────────────────────────────────────────────────────

    /// Synchronous transformation of one batch into `state`.
    fn process_batch(&self, batch: &[RawRow], first_index: usize, state: &mut IngestionState) {
        let before = state.records.len();

        for (offset, row) in batch.iter().enumerate() {
            state.report.rows_read += 1;
            match self.canonicalize_row(row) {
                Ok(record) => state.records.push(record),
                Err(reason) => {
                    state.report.rows_dropped += 1;
                    if state.report.drop_samples.len() < MAX_DROP_SAMPLES {
                        let row_index = first_index + offset;
                        warn!("Skipping row {}: {}", row_index, reason);
                        state.report.drop_samples.push(DropSample { row_index, reason });
                    }
                }
            }
        }

        state.report.batches += 1;
        debug!(
            "Batch {}: {} rows, {} records",
            state.report.batches,
            batch.len(),
            state.records.len() - before
        );
    }

    fn finish(&self, state: IngestionState) -> Result<IngestionOutcome> {
        let IngestionState {
            mut records,
            mut report,
        } = state;
        report.records_created = records.len();

        if records.is_empty() {
            return Err(TrackerError::NoValidRecords {
                rows: report.rows_read,
                dropped: report.rows_dropped,
            });
        }

        ShareComputer::attach_shares(&mut records);

        info!(
            "Ingested {} records from {} rows ({} dropped, {} batches)",
            report.records_created, report.rows_read, report.rows_dropped, report.batches
        );

        Ok(IngestionOutcome { records, report })
    }

    fn required_text(
        &self,
        row: &RawRow,
        field: LogicalField,
    ) -> std::result::Result<String, RowSkip> {
        self.resolver
            .resolve(row, field)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or(RowSkip::MissingField(field))
    }

    fn count(&self, row: &RawRow, field: LogicalField) -> f64 {
        parse_number(self.resolver.resolve(row, field)).max(0.0)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
