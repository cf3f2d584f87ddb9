use clap::Parser;
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::models::{Dimension, Metric, Selection, ShareBasis};

/// Default payload ceiling in MiB.
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 50;

/// Default number of rows transformed between two yield points.
pub const DEFAULT_BATCH_SIZE: u64 = 1000;

/// Default wall-clock budget for one ingestion, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Weekly PSP conversion analysis for spreadsheet exports
#[derive(Parser, Debug, Clone)]
#[command(
    name = "psp-tracker",
    about = "Weekly PSP conversion analysis for spreadsheet exports",
    version
)]
pub struct Settings {
    /// Workbook to analyse (.xlsx, .xls, .xlsb or .ods); only the first sheet is read
    pub file: PathBuf,

    /// Reject workbooks larger than this many MiB before parsing
    #[arg(long, default_value_t = DEFAULT_MAX_FILE_SIZE_MB, value_parser = clap::value_parser!(u64).range(1..=1024))]
    pub max_file_size_mb: u64,

    /// Rows transformed per batch before yielding
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, value_parser = clap::value_parser!(u64).range(1..=100_000))]
    pub batch_size: u64,

    /// Give up on ingestion after this many seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: u64,

    /// Denominator used for share-of-total figures
    #[arg(long, value_enum, default_value_t = ShareBasis::CountryTotal)]
    pub share_basis: ShareBasis,

    /// Metric pivoted by week in the output
    #[arg(long, value_enum, default_value_t = Metric::PressBuyCount)]
    pub metric: Metric,

    /// Only include these PSPs (repeatable or comma separated)
    #[arg(long = "psp", value_delimiter = ',')]
    pub psps: Vec<String>,

    /// Only include these weeks (repeatable or comma separated)
    #[arg(long = "week", value_delimiter = ',')]
    pub weeks: Vec<String>,

    /// Only include these countries (repeatable or comma separated)
    #[arg(long = "country", value_delimiter = ',')]
    pub countries: Vec<String>,

    /// Only include these payment options (repeatable or comma separated)
    #[arg(long = "payment-option", value_delimiter = ',')]
    pub payment_options: Vec<String>,

    /// Output format
    #[arg(long, default_value = "table", value_parser = ["table", "json"])]
    pub format: String,

    /// Logging level
    #[arg(long, default_value = "WARNING", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Settings {
    /// Parse process arguments and apply the `--debug` override.
    pub fn load() -> Self {
        Self::load_from_args(std::env::args_os())
    }

    /// Same as [`Settings::load`] with an explicit argument list.
    pub fn load_from_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let mut settings = Settings::parse_from(args);
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// Payload ceiling in bytes.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }

    /// The command-line filters as a [`Selection`].
    ///
    /// Values are trimmed; blanks are ignored.
    pub fn selection(&self) -> Selection {
        let mut selection = Selection::all();
        for (dimension, values) in [
            (Dimension::Psp, &self.psps),
            (Dimension::Week, &self.weeks),
            (Dimension::Country, &self.countries),
            (Dimension::PaymentOption, &self.payment_options),
        ] {
            let set: BTreeSet<String> = values
                .iter()
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect();
            selection.set(dimension, set);
        }
        selection
    }

    pub fn wants_json(&self) -> bool {
        self.format == "json"
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::parse_from(["psp-tracker", "export.xlsx"]);

        assert_eq!(settings.file, PathBuf::from("export.xlsx"));
        assert_eq!(settings.max_file_size_mb, 50);
        assert_eq!(settings.batch_size, 1000);
        assert_eq!(settings.timeout_secs, 60);
        assert_eq!(settings.share_basis, ShareBasis::CountryTotal);
        assert_eq!(settings.metric, Metric::PressBuyCount);
        assert!(settings.psps.is_empty());
        assert_eq!(settings.format, "table");
        assert_eq!(settings.log_level, "WARNING");
        assert!(!settings.debug);
    }

    #[test]
    fn test_settings_share_basis_and_metric() {
        let settings = Settings::parse_from([
            "psp-tracker",
            "export.xlsx",
            "--share-basis",
            "week",
            "--metric",
            "converted-share",
        ]);
        assert_eq!(settings.share_basis, ShareBasis::WeekTotal);
        assert_eq!(settings.metric, Metric::ConvertedShare);
    }

    #[test]
    fn test_settings_repeated_and_delimited_filters() {
        let settings = Settings::parse_from([
            "psp-tracker",
            "export.xlsx",
            "--psp",
            "Adyen,Stripe",
            "--psp",
            "Klarna",
            "--country",
            "US",
        ]);
        assert_eq!(settings.psps, vec!["Adyen", "Stripe", "Klarna"]);

        let selection = settings.selection();
        assert_eq!(selection.psps.len(), 3);
        assert!(selection.countries.contains("US"));
        assert!(selection.weeks.is_empty());
        assert!(selection.payment_options.is_empty());
    }

    #[test]
    fn test_selection_trims_and_skips_blanks() {
        let settings = Settings::parse_from([
            "psp-tracker",
            "export.xlsx",
            "--week",
            " W1 , ,W2",
        ]);
        let selection = settings.selection();
        let weeks: Vec<&str> = selection.weeks.iter().map(String::as_str).collect();
        assert_eq!(weeks, vec!["W1", "W2"]);
    }

    #[test]
    fn test_debug_overrides_log_level() {
        let settings = Settings::load_from_args(["psp-tracker", "export.xlsx", "--debug"]);
        assert_eq!(settings.log_level, "DEBUG");
    }

    #[test]
    fn test_max_file_size_bytes() {
        let settings =
            Settings::parse_from(["psp-tracker", "export.xlsx", "--max-file-size-mb", "2"]);
        assert_eq!(settings.max_file_size_bytes(), 2 * 1024 * 1024);
    }

    #[test]
    fn test_batch_size_out_of_range_is_rejected() {
        let result =
            Settings::try_parse_from(["psp-tracker", "export.xlsx", "--batch-size", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_json_format() {
        let settings = Settings::parse_from(["psp-tracker", "export.xlsx", "--format", "json"]);
        assert!(settings.wants_json());
    }
}
