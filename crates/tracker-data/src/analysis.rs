//! Dataset-level summaries: vocabularies, the headline overview and the
//! per-country breakdown.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::Serialize;
use tracker_core::models::{CanonicalRecord, Dimension};

use crate::aggregator::{weighted_rate, AggregatedBucket, AggregationEngine, Grouping};

/// Case-insensitive ordering with raw byte order as the tie-breaker.
///
/// ```
/// use std::cmp::Ordering;
/// use tracker_data::analysis::collation_cmp;
///
/// assert_eq!(collation_cmp("adyen", "Stripe"), Ordering::Less);
/// assert_eq!(collation_cmp("US", "us"), Ordering::Less);
/// ```
pub fn collation_cmp(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn collate(values: BTreeSet<&str>) -> Vec<String> {
    let mut out: Vec<String> = values.into_iter().map(str::to_string).collect();
    out.sort_by(|a, b| collation_cmp(a, b));
    out
}

// ── Vocabularies ──────────────────────────────────────────────────────────────

/// Distinct values per dimension, collation-sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Vocabularies {
    pub weeks: Vec<String>,
    pub countries: Vec<String>,
    pub psps: Vec<String>,
    pub payment_options: Vec<String>,
}

impl Vocabularies {
    pub fn from_records(records: &[CanonicalRecord]) -> Self {
        let distinct = |dimension: Dimension| -> Vec<String> {
            collate(
                records
                    .iter()
                    .filter_map(|r| r.dimension_value(dimension))
                    .collect(),
            )
        };

        Self {
            weeks: distinct(Dimension::Week),
            countries: distinct(Dimension::Country),
            psps: distinct(Dimension::Psp),
            payment_options: distinct(Dimension::PaymentOption),
        }
    }

    pub fn get(&self, dimension: Dimension) -> &[String] {
        match dimension {
            Dimension::Week => &self.weeks,
            Dimension::Country => &self.countries,
            Dimension::Psp => &self.psps,
            Dimension::PaymentOption => &self.payment_options,
        }
    }
}

// ── Overview ──────────────────────────────────────────────────────────────────

/// Headline figures for a set of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Overview {
    pub record_count: usize,
    pub country_count: usize,
    pub psp_count: usize,
    pub week_count: usize,
    pub total_press_buy: f64,
    pub total_converted: f64,
    pub conversion_rate: f64,
}

impl Overview {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a CanonicalRecord>,
    {
        let mut countries = BTreeSet::new();
        let mut psps = BTreeSet::new();
        let mut weeks = BTreeSet::new();
        let mut overview = Overview::default();

        for record in records {
            countries.insert(record.country.as_str());
            psps.insert(record.psp.as_str());
            weeks.insert(record.week.as_str());
            overview.record_count += 1;
            overview.total_press_buy += record.press_buy_count;
            overview.total_converted += record.converted_count;
        }

        overview.country_count = countries.len();
        overview.psp_count = psps.len();
        overview.week_count = weeks.len();
        overview.conversion_rate = weighted_rate(overview.total_converted, overview.total_press_buy);
        overview
    }
}

// ── Country breakdown ─────────────────────────────────────────────────────────

/// Summed figures of one psp within one country.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PspSummary {
    pub psp: String,
    #[serde(flatten)]
    pub totals: AggregatedBucket,
}

/// One country with its per-psp summaries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryBreakdown {
    pub country: String,
    #[serde(flatten)]
    pub totals: AggregatedBucket,
    pub psps: Vec<PspSummary>,
}

/// Per-country, per-psp totals with weighted rates, countries and psps in
/// collation order.
pub fn country_breakdown<'a, I>(records: I) -> Vec<CountryBreakdown>
where
    I: IntoIterator<Item = &'a CanonicalRecord>,
{
    let records: Vec<&CanonicalRecord> = records.into_iter().collect();
    let by_country = AggregationEngine::group_and_sum(records.iter().copied(), |r| r.country.clone());
    let by_country_psp = AggregationEngine::group_by(records.iter().copied(), Grouping::COUNTRY_PSP);

    let mut breakdown: Vec<CountryBreakdown> = by_country
        .into_iter()
        .map(|(country, totals)| {
            let mut psps: Vec<PspSummary> = by_country_psp
                .iter()
                .filter(|(key, _)| key.country.as_deref() == Some(country.as_str()))
                .filter_map(|(key, bucket)| {
                    key.psp.as_ref().map(|psp| PspSummary {
                        psp: psp.clone(),
                        totals: *bucket,
                    })
                })
                .collect();
            psps.sort_by(|a, b| collation_cmp(&a.psp, &b.psp));
            CountryBreakdown {
                country,
                totals,
                psps,
            }
        })
        .collect();

    breakdown.sort_by(|a, b| collation_cmp(&a.country, &b.country));
    breakdown
}
