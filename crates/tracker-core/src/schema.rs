//! Heuristic column resolution over rows with unknown labels.
//!
//! Each [`LogicalField`] owns one [`FieldMatcher`] in [`FIELD_MATCHERS`]: an
//! ordered list of exact aliases tried first, then a keyword scan over every
//! label of the row. The tables are compiled in and not user-editable.

use crate::models::{LogicalField, RawRow};
use crate::normalize::parse_number;

// ── FieldMatcher ──────────────────────────────────────────────────────────────

/// Resolution rules for one logical field.
#[derive(Debug, Clone, Copy)]
pub struct FieldMatcher {
    pub field: LogicalField,
    /// Exact column labels, most specific first.
    pub aliases: &'static [&'static str],
    /// Lower-case substrings; a label containing any of them is a candidate.
    pub keywords: &'static [&'static str],
    /// Lower-case substrings that disqualify an otherwise matching label.
    pub excludes: &'static [&'static str],
}

impl FieldMatcher {
    /// First alias present on `row` with a non-blank value.
    pub fn alias_hit<'r>(&self, row: &'r RawRow) -> Option<&'r str> {
        self.aliases
            .iter()
            .filter_map(|alias| row.get(alias))
            .find(|value| !value.trim().is_empty())
    }

    /// Whether `label` passes this field's keyword test.
    pub fn label_matches(&self, label: &str) -> bool {
        let lower = label.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(k))
            && !self.excludes.iter().any(|k| lower.contains(k))
    }

    /// First keyword-matching label (in column order) with a usable value.
    ///
    /// For count fields a value that normalizes to exactly zero is passed
    /// over and the scan continues with the next candidate column.
    pub fn fallback_hit<'r>(&self, row: &'r RawRow) -> Option<&'r str> {
        row.iter()
            .filter(|(label, _)| self.label_matches(label))
            .map(|(_, value)| value)
            .filter(|value| !value.trim().is_empty())
            .find(|value| !self.field.is_numeric() || parse_number(Some(*value)) != 0.0)
    }

    /// Alias list first, keyword scan second.
    pub fn resolve<'r>(&self, row: &'r RawRow) -> Option<&'r str> {
        self.alias_hit(row).or_else(|| self.fallback_hit(row))
    }
}

// ── Tables ────────────────────────────────────────────────────────────────────

/// The compiled-in resolution table, one entry per [`LogicalField`].
pub static FIELD_MATCHERS: [FieldMatcher; 6] = [
    FieldMatcher {
        field: LogicalField::Week,
        aliases: &[
            "week", "Week", "WEEK", "Week Number", "week_number", "Week Label", "period",
            "Period", "PERIOD", "date", "Date", "DATE",
        ],
        keywords: &["week", "period", "date"],
        excludes: &[],
    },
    FieldMatcher {
        field: LogicalField::Country,
        aliases: &[
            "country", "Country", "COUNTRY", "Country Code", "country_code", "market", "Market",
            "MARKET",
        ],
        keywords: &["country", "market", "region"],
        excludes: &[],
    },
    FieldMatcher {
        field: LogicalField::Psp,
        aliases: &[
            "psp", "PSP", "Psp", "payment service provider", "Payment Service Provider",
            "Payment Provider", "payment provider", "provider", "Provider", "PROVIDER",
        ],
        keywords: &["psp", "provider", "processor", "gateway", "acquirer"],
        excludes: &[],
    },
    FieldMatcher {
        field: LogicalField::PressBuyCount,
        aliases: &[
            "press buy count", "Press Buy Count", "PRESS BUY COUNT", "press_buy_count",
            "PressBuyCount", "press buy", "Press Buy", "buys", "Buys",
        ],
        keywords: &["press buy", "press_buy", "pressbuy", "buy"],
        excludes: &["share", "rate", "%"],
    },
    FieldMatcher {
        field: LogicalField::ConvertedCount,
        aliases: &[
            "converted count", "Converted Count", "CONVERTED COUNT", "converted_count",
            "ConvertedCount", "converted", "Converted", "conversions", "Conversions",
        ],
        keywords: &["converted", "conversion"],
        excludes: &["share", "rate", "%"],
    },
    FieldMatcher {
        field: LogicalField::PaymentOption,
        aliases: &[
            "last selected payment option", "Last Selected Payment Option",
            "last_selected_payment_option", "LastSelectedPaymentOption", "payment option",
            "Payment Option", "payment method", "Payment Method",
        ],
        keywords: &["payment option", "payment_option", "payment method", "payment_method"],
        excludes: &[],
    },
];

// ── SchemaResolver ────────────────────────────────────────────────────────────

/// Looks up logical fields on rows of arbitrary shape.
///
/// Resolution only looks at the row it is given, so the result for a row
/// never depends on its position or on earlier rows.
#[derive(Debug, Clone, Copy)]
pub struct SchemaResolver {
    matchers: &'static [FieldMatcher],
}

impl Default for SchemaResolver {
    fn default() -> Self {
        Self {
            matchers: &FIELD_MATCHERS,
        }
    }
}

impl SchemaResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// The matcher table entry for `field`.
    pub fn matcher(&self, field: LogicalField) -> &FieldMatcher {
        self.matchers
            .iter()
            .find(|m| m.field == field)
            .unwrap_or(&FIELD_MATCHERS[field as usize])
    }

    /// Value of `field` on `row`, or `None` when it is missing or blank.
    pub fn resolve<'r>(&self, row: &'r RawRow, field: LogicalField) -> Option<&'r str> {
        self.matcher(field).resolve(row)
    }
}
