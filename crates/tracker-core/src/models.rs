use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// ── RawRow ────────────────────────────────────────────────────────────────────

/// One spreadsheet row as an ordered list of `(column label, cell text)` pairs.
///
/// Empty cells are stored as empty strings. Labels keep the sheet's column
/// order, which is the order the keyword fallback scan walks them in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    cells: Vec<(String, String)>,
}

impl RawRow {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from `(label, value)` pairs, preserving their order.
    pub fn from_pairs<L, V, I>(pairs: I) -> Self
    where
        L: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (L, V)>,
    {
        Self {
            cells: pairs
                .into_iter()
                .map(|(l, v)| (l.into(), v.into()))
                .collect(),
        }
    }

    /// Append a cell.
    pub fn push(&mut self, label: impl Into<String>, value: impl Into<String>) {
        self.cells.push((label.into(), value.into()));
    }

    /// Value of the first cell whose label equals `label` exactly.
    pub fn get(&self, label: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over `(label, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells.iter().map(|(l, v)| (l.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// `true` when every cell is blank after trimming.
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, v)| v.trim().is_empty())
    }
}

// ── LogicalField ──────────────────────────────────────────────────────────────

/// A field the ingestion pipeline needs to find on an arbitrary row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalField {
    Week,
    Country,
    Psp,
    PressBuyCount,
    ConvertedCount,
    PaymentOption,
}

impl LogicalField {
    /// Every field, in resolution-table order.
    pub const ALL: [LogicalField; 6] = [
        LogicalField::Week,
        LogicalField::Country,
        LogicalField::Psp,
        LogicalField::PressBuyCount,
        LogicalField::ConvertedCount,
        LogicalField::PaymentOption,
    ];

    /// Whether resolved values are counts fed through the numeric normalizer.
    pub fn is_numeric(self) -> bool {
        matches!(self, LogicalField::PressBuyCount | LogicalField::ConvertedCount)
    }
}

impl fmt::Display for LogicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogicalField::Week => "week",
            LogicalField::Country => "country",
            LogicalField::Psp => "psp",
            LogicalField::PressBuyCount => "press buy count",
            LogicalField::ConvertedCount => "converted count",
            LogicalField::PaymentOption => "payment option",
        };
        f.write_str(name)
    }
}

// ── RowSkip ───────────────────────────────────────────────────────────────────

/// Why a raw row did not become a [`CanonicalRecord`].
///
/// Never propagated as an error: dropped rows are counted and the first few
/// reasons are kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowSkip {
    /// A required key field resolved to nothing (or to blank text).
    MissingField(LogicalField),
}

impl fmt::Display for RowSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowSkip::MissingField(field) => write!(f, "missing {}", field),
        }
    }
}

// ── ShareBasis ────────────────────────────────────────────────────────────────

/// Which grouping supplies the denominator of a share-of-total figure.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ShareBasis {
    /// All weeks of a country pooled; one share per (country, psp).
    #[default]
    #[value(name = "country")]
    CountryTotal,
    /// All countries of a week pooled; one share per (week, psp).
    #[value(name = "week")]
    WeekTotal,
}

impl ShareBasis {
    pub const ALL: [ShareBasis; 2] = [ShareBasis::CountryTotal, ShareBasis::WeekTotal];
}

impl fmt::Display for ShareBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShareBasis::CountryTotal => f.write_str("country total"),
            ShareBasis::WeekTotal => f.write_str("week total"),
        }
    }
}

// ── Shares ────────────────────────────────────────────────────────────────────

/// Press-buy and converted share of one record under one basis, in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ShareValues {
    pub press_buy_share: f64,
    pub converted_share: f64,
}

/// Shares under both bases; filled in once by the share computer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordShares {
    pub country_total: ShareValues,
    pub week_total: ShareValues,
}

impl RecordShares {
    pub fn get(&self, basis: ShareBasis) -> ShareValues {
        match basis {
            ShareBasis::CountryTotal => self.country_total,
            ShareBasis::WeekTotal => self.week_total,
        }
    }

    pub fn set(&mut self, basis: ShareBasis, values: ShareValues) {
        match basis {
            ShareBasis::CountryTotal => self.country_total = values,
            ShareBasis::WeekTotal => self.week_total = values,
        }
    }
}

// ── CanonicalRecord ───────────────────────────────────────────────────────────

/// A fully resolved (week, country, psp) row with derived metrics.
///
/// `week`, `country` and `psp` are always non-empty and trimmed; the ingestion
/// pipeline never constructs a record otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub week: String,
    pub country: String,
    pub psp: String,
    pub press_buy_count: f64,
    pub converted_count: f64,
    /// `converted / press_buy * 100` rounded to two decimals, 0 without press buys.
    pub conversion_rate: f64,
    #[serde(default)]
    pub shares: RecordShares,
    #[serde(default)]
    pub last_selected_payment_option: Option<String>,
}

impl CanonicalRecord {
    /// Build a record and derive its conversion rate. Shares start at zero.
    pub fn new(
        week: impl Into<String>,
        country: impl Into<String>,
        psp: impl Into<String>,
        press_buy_count: f64,
        converted_count: f64,
        last_selected_payment_option: Option<String>,
    ) -> Self {
        Self {
            week: week.into(),
            country: country.into(),
            psp: psp.into(),
            press_buy_count,
            converted_count,
            conversion_rate: conversion_rate(converted_count, press_buy_count),
            shares: RecordShares::default(),
            last_selected_payment_option,
        }
    }

    pub fn press_buy_share(&self, basis: ShareBasis) -> f64 {
        self.shares.get(basis).press_buy_share
    }

    pub fn converted_share(&self, basis: ShareBasis) -> f64 {
        self.shares.get(basis).converted_share
    }

    /// This record's value along `dimension`; `None` only for a missing
    /// payment option.
    pub fn dimension_value(&self, dimension: Dimension) -> Option<&str> {
        match dimension {
            Dimension::Psp => Some(&self.psp),
            Dimension::Week => Some(&self.week),
            Dimension::Country => Some(&self.country),
            Dimension::PaymentOption => self.last_selected_payment_option.as_deref(),
        }
    }

    /// Value of `metric` for this single record.
    pub fn metric_value(&self, metric: Metric, basis: ShareBasis) -> f64 {
        match metric {
            Metric::PressBuyCount => self.press_buy_count,
            Metric::ConvertedCount => self.converted_count,
            Metric::ConversionRate => self.conversion_rate,
            Metric::PressBuyShare => self.press_buy_share(basis),
            Metric::ConvertedShare => self.converted_share(basis),
        }
    }
}

/// Weighted conversion rate in percent, two decimals; 0 when nothing was pressed.
pub fn conversion_rate(converted: f64, press_buy: f64) -> f64 {
    if press_buy > 0.0 {
        round2(converted / press_buy * 100.0)
    } else {
        0.0
    }
}

/// Round half away from zero to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ── Dimension / Selection ─────────────────────────────────────────────────────

/// A filterable record attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Psp,
    Week,
    Country,
    PaymentOption,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Psp,
        Dimension::Week,
        Dimension::Country,
        Dimension::PaymentOption,
    ];
}

/// Active filter values per dimension. An empty set places no restriction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default)]
    pub psps: BTreeSet<String>,
    #[serde(default)]
    pub weeks: BTreeSet<String>,
    #[serde(default)]
    pub countries: BTreeSet<String>,
    #[serde(default)]
    pub payment_options: BTreeSet<String>,
}

impl Selection {
    /// A selection that matches everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Builder-style setter for one dimension.
    pub fn with<I, S>(mut self, dimension: Dimension, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(dimension, values.into_iter().map(Into::into).collect());
        self
    }

    pub fn get(&self, dimension: Dimension) -> &BTreeSet<String> {
        match dimension {
            Dimension::Psp => &self.psps,
            Dimension::Week => &self.weeks,
            Dimension::Country => &self.countries,
            Dimension::PaymentOption => &self.payment_options,
        }
    }

    pub fn set(&mut self, dimension: Dimension, values: BTreeSet<String>) {
        match dimension {
            Dimension::Psp => self.psps = values,
            Dimension::Week => self.weeks = values,
            Dimension::Country => self.countries = values,
            Dimension::PaymentOption => self.payment_options = values,
        }
    }

    /// `true` when no dimension restricts anything.
    pub fn is_unrestricted(&self) -> bool {
        Dimension::ALL.iter().all(|d| self.get(*d).is_empty())
    }

    /// The same selection with the payment-option dimension cleared.
    pub fn without_payment_options(&self) -> Self {
        Self {
            payment_options: BTreeSet::new(),
            ..self.clone()
        }
    }
}

// ── Metric ────────────────────────────────────────────────────────────────────

/// A charted measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[value(name = "press-buy")]
    PressBuyCount,
    #[value(name = "converted")]
    ConvertedCount,
    #[value(name = "conversion-rate")]
    ConversionRate,
    #[value(name = "press-buy-share")]
    PressBuyShare,
    #[value(name = "converted-share")]
    ConvertedShare,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::PressBuyCount,
        Metric::ConvertedCount,
        Metric::ConversionRate,
        Metric::PressBuyShare,
        Metric::ConvertedShare,
    ];

    /// Chart title for this metric.
    pub fn title(self) -> &'static str {
        match self {
            Metric::PressBuyCount => "Press Buy Count",
            Metric::ConvertedCount => "Converted Count",
            Metric::ConversionRate => "Conversion Rate (%)",
            Metric::PressBuyShare => "Press Buy Share (%)",
            Metric::ConvertedShare => "Converted Share (%)",
        }
    }

    /// Whether values are percentages rather than counts.
    pub fn is_percentage(self) -> bool {
        !matches!(self, Metric::PressBuyCount | Metric::ConvertedCount)
    }

    /// Share metrics are per-record and cannot be summed across buckets.
    pub fn is_share(self) -> bool {
        matches!(self, Metric::PressBuyShare | Metric::ConvertedShare)
    }
}
