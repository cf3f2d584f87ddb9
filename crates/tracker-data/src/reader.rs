//! Workbook loading: turns the first sheet of a spreadsheet into [`RawRow`]s.
//!
//! The payload size is checked before any parsing. The first row of the
//! first sheet supplies the column labels; every following non-blank row
//! becomes one [`RawRow`].

use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use tracing::{debug, info};
use tracker_core::error::{Result, TrackerError};
use tracker_core::models::RawRow;

/// Default payload ceiling: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

// ── Public API ────────────────────────────────────────────────────────────────

/// Read the first sheet of the workbook at `path`.
///
/// The file size is taken from its metadata and compared with `max_bytes`
/// before the file is read.
pub fn read_workbook_file(path: &Path, max_bytes: u64) -> Result<Vec<RawRow>> {
    let metadata = std::fs::metadata(path).map_err(|source| TrackerError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    ensure_within_limit(path, metadata.len(), max_bytes)?;

    let bytes = std::fs::read(path).map_err(|source| TrackerError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let rows = read_workbook_bytes(path, bytes, max_bytes)?;
    info!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Read the first sheet of an in-memory workbook.
///
/// `origin` only labels error messages. The format (xlsx, xls, xlsb, ods) is
/// detected from the content.
pub fn read_workbook_bytes(origin: &Path, bytes: Vec<u8>, max_bytes: u64) -> Result<Vec<RawRow>> {
    ensure_within_limit(origin, bytes.len() as u64, max_bytes)?;
    if bytes.is_empty() {
        return Err(TrackerError::UnreadableWorkbook("empty payload".to_string()));
    }

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| TrackerError::UnreadableWorkbook(e.to_string()))?;

    let sheet_names = workbook.sheet_names();
    debug!("Workbook sheets: {:?}", sheet_names);

    let range = match workbook.worksheet_range_at(0) {
        Some(Ok(range)) => range,
        Some(Err(e)) => return Err(TrackerError::UnreadableWorkbook(e.to_string())),
        None => {
            return Err(TrackerError::UnreadableWorkbook(
                "workbook has no sheets".to_string(),
            ))
        }
    };

    rows_from_range(&range)
}

/// Convert a sheet range into labelled rows.
///
/// * no rows, or a blank header row → [`TrackerError::UnreadableWorkbook`]
/// * a header but no non-blank data rows → [`TrackerError::NoData`]
///
/// Blank header cells are labelled `Column<N>` (1-based).
pub fn rows_from_range(range: &Range<Data>) -> Result<Vec<RawRow>> {
    let mut sheet_rows = range.rows();

    let Some(header) = sheet_rows.next() else {
        return Err(TrackerError::UnreadableWorkbook(
            "first sheet is empty".to_string(),
        ));
    };

    let labels: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            let text = cell_text(cell);
            let trimmed = text.trim();
            if trimmed.is_empty() {
                format!("Column{}", idx + 1)
            } else {
                trimmed.to_string()
            }
        })
        .collect();

    if header.iter().all(|c| cell_text(c).trim().is_empty()) {
        return Err(TrackerError::UnreadableWorkbook(
            "first sheet has no header row".to_string(),
        ));
    }

    let mut rows = Vec::new();
    let mut blank_rows = 0usize;
    for sheet_row in sheet_rows {
        let row = RawRow::from_pairs(
            labels
                .iter()
                .zip(sheet_row.iter())
                .map(|(label, cell)| (label.clone(), cell_text(cell))),
        );
        if row.is_blank() {
            blank_rows += 1;
            continue;
        }
        rows.push(row);
    }

    debug!(
        "Sheet: {} columns, {} data rows, {} blank rows skipped",
        labels.len(),
        rows.len(),
        blank_rows
    );

    if rows.is_empty() {
        return Err(TrackerError::NoData);
    }
    Ok(rows)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn ensure_within_limit(path: &Path, size: u64, limit: u64) -> Result<()> {
    if size > limit {
        return Err(TrackerError::FileTooLarge {
            path: path.to_path_buf(),
            size,
            limit,
        });
    }
    Ok(())
}

/// Text form of a cell. Empty and error cells become `""`.
///
/// Whole floats print without a fraction (`100.0` → `"100"`); date cells
/// print as `YYYY-MM-DD`, with the time only when it is not midnight.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) if naive.time() == chrono::NaiveTime::MIN => {
                naive.format("%Y-%m-%d").to_string()
            }
            Some(naive) => naive.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => dt.as_f64().to_string(),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
