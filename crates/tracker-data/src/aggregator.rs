//! Filtering, grouping and week pivots over canonical records.
//!
//! Every function here is pure: results are freshly allocated and the sums
//! behind a bucket live only for the duration of the call.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracker_core::models::{
    conversion_rate, CanonicalRecord, Dimension, Metric, Selection, ShareBasis,
};

// ── AggregatedBucket ──────────────────────────────────────────────────────────

/// Summed counts of one group with its weighted conversion rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AggregatedBucket {
    pub press_buy_count: f64,
    pub converted_count: f64,
    /// `sum(converted) / sum(press_buy) * 100`, two decimals; never a mean
    /// of per-record rates.
    pub conversion_rate: f64,
    pub record_count: usize,
}

impl AggregatedBucket {
    pub fn value(&self, metric: BucketMetric) -> f64 {
        match metric {
            BucketMetric::PressBuyCount => self.press_buy_count,
            BucketMetric::ConvertedCount => self.converted_count,
            BucketMetric::ConversionRate => self.conversion_rate,
        }
    }
}

/// Running sums for one bucket.
#[derive(Debug, Clone, Copy, Default)]
struct RateAccumulator {
    press_buy: f64,
    converted: f64,
    records: usize,
}

impl RateAccumulator {
    fn add(&mut self, press_buy: f64, converted: f64, records: usize) {
        self.press_buy += press_buy;
        self.converted += converted;
        self.records += records;
    }

    fn finish(self) -> AggregatedBucket {
        AggregatedBucket {
            press_buy_count: self.press_buy,
            converted_count: self.converted,
            conversion_rate: weighted_rate(self.converted, self.press_buy),
            record_count: self.records,
        }
    }
}

/// Weighted conversion rate of summed counts; 0 when nothing was pressed.
pub fn weighted_rate(converted: f64, press_buy: f64) -> f64 {
    conversion_rate(converted, press_buy)
}

// ── Metrics usable on buckets ─────────────────────────────────────────────────

/// The [`Metric`]s that survive summation.
///
/// Share metrics are per-record values and go through
/// [`AggregationEngine::share_pivot`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketMetric {
    PressBuyCount,
    ConvertedCount,
    ConversionRate,
}

impl TryFrom<Metric> for BucketMetric {
    type Error = Metric;

    fn try_from(metric: Metric) -> Result<Self, Self::Error> {
        match metric {
            Metric::PressBuyCount => Ok(BucketMetric::PressBuyCount),
            Metric::ConvertedCount => Ok(BucketMetric::ConvertedCount),
            Metric::ConversionRate => Ok(BucketMetric::ConversionRate),
            other => Err(other),
        }
    }
}

impl From<BucketMetric> for Metric {
    fn from(metric: BucketMetric) -> Self {
        match metric {
            BucketMetric::PressBuyCount => Metric::PressBuyCount,
            BucketMetric::ConvertedCount => Metric::ConvertedCount,
            BucketMetric::ConversionRate => Metric::ConversionRate,
        }
    }
}

// ── Grouping keys ─────────────────────────────────────────────────────────────

/// Which of week, country and psp make up a bucket key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Grouping {
    pub week: bool,
    pub country: bool,
    pub psp: bool,
}

impl Grouping {
    pub const WEEK_PSP: Grouping = Grouping {
        week: true,
        country: false,
        psp: true,
    };
    pub const WEEK_COUNTRY_PSP: Grouping = Grouping {
        week: true,
        country: true,
        psp: true,
    };
    pub const COUNTRY_PSP: Grouping = Grouping {
        week: false,
        country: true,
        psp: true,
    };

    /// The key of `record` under this grouping.
    pub fn key(&self, record: &CanonicalRecord) -> BucketKey {
        BucketKey {
            week: self.week.then(|| record.week.clone()),
            country: self.country.then(|| record.country.clone()),
            psp: self.psp.then(|| record.psp.clone()),
        }
    }
}

/// Composite bucket key; dimensions outside the grouping are `None`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BucketKey {
    pub week: Option<String>,
    pub country: Option<String>,
    pub psp: Option<String>,
}

/// How pivot series are labelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesDimension {
    Psp,
    Country,
    /// `"<psp> (<country>)"`
    PspCountry,
}

impl SeriesDimension {
    /// Series label for a bucket key; `None` when the key lacks a dimension
    /// the label needs.
    pub fn label(&self, key: &BucketKey) -> Option<String> {
        match self {
            SeriesDimension::Psp => key.psp.clone(),
            SeriesDimension::Country => key.country.clone(),
            SeriesDimension::PspCountry => match (&key.psp, &key.country) {
                (Some(psp), Some(country)) => Some(psp_country_label(psp, country)),
                _ => None,
            },
        }
    }
}

pub fn psp_country_label(psp: &str, country: &str) -> String {
    format!("{} ({})", psp, country)
}

// ── PivotTable ────────────────────────────────────────────────────────────────

/// Week × series table of one metric.
///
/// Only observed (week, series) cells are stored. Weeks and series are both
/// in lexical order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotTable {
    pub metric: Metric,
    pub times: Vec<String>,
    pub series: Vec<String>,
    /// week → series → value
    pub cells: BTreeMap<String, BTreeMap<String, f64>>,
}

impl PivotTable {
    fn from_cells(metric: Metric, cells: BTreeMap<String, BTreeMap<String, f64>>) -> Self {
        let times = cells.keys().cloned().collect();
        let series: BTreeSet<String> = cells
            .values()
            .flat_map(|row| row.keys().cloned())
            .collect();
        Self {
            metric,
            times,
            series: series.into_iter().collect(),
            cells,
        }
    }

    /// Value at (`time`, `series`).
    ///
    /// A series present elsewhere in the table reads as 0 in weeks where it
    /// was not observed. An unknown series or week is `None`.
    pub fn value(&self, time: &str, series: &str) -> Option<f64> {
        if !self.series.iter().any(|s| s == series) {
            return None;
        }
        let row = self.cells.get(time)?;
        Some(row.get(series).copied().unwrap_or(0.0))
    }

    /// One row per week with a value for every series, in `series` order.
    pub fn dense_rows(&self) -> Vec<(String, Vec<f64>)> {
        self.times
            .iter()
            .map(|time| {
                let values = self
                    .series
                    .iter()
                    .map(|s| self.value(time, s).unwrap_or(0.0))
                    .collect();
                (time.clone(), values)
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

// ── AggregationEngine ─────────────────────────────────────────────────────────

/// Stateless filtering and grouping over canonical records.
pub struct AggregationEngine;

impl AggregationEngine {
    /// Records that pass every restricted dimension of `selection`.
    ///
    /// A record without a payment option passes the payment-option
    /// dimension whatever it holds.
    pub fn filter<'a>(
        records: &'a [CanonicalRecord],
        selection: &Selection,
    ) -> Vec<&'a CanonicalRecord> {
        records
            .iter()
            .filter(|r| Self::matches(r, selection))
            .collect()
    }

    /// Whether `record` passes `selection`.
    pub fn matches(record: &CanonicalRecord, selection: &Selection) -> bool {
        Dimension::ALL.iter().all(|dimension| {
            let wanted = selection.get(*dimension);
            if wanted.is_empty() {
                return true;
            }
            match record.dimension_value(*dimension) {
                Some(value) => wanted.contains(value),
                None => true,
            }
        })
    }

    /// Whether `record` passes the psp, week and country parts of `selection`.
    pub fn matches_ignoring_payment_option(record: &CanonicalRecord, selection: &Selection) -> bool {
        [Dimension::Psp, Dimension::Week, Dimension::Country]
            .iter()
            .all(|dimension| {
                let wanted = selection.get(*dimension);
                wanted.is_empty()
                    || record
                        .dimension_value(*dimension)
                        .is_some_and(|v| wanted.contains(v))
            })
    }

    /// Sum counts per key and derive the weighted rate of each bucket.
    pub fn group_and_sum<'a, K, I, F>(records: I, mut key_fn: F) -> BTreeMap<K, AggregatedBucket>
    where
        K: Ord,
        I: IntoIterator<Item = &'a CanonicalRecord>,
        F: FnMut(&CanonicalRecord) -> K,
    {
        let mut sums: BTreeMap<K, RateAccumulator> = BTreeMap::new();
        for record in records {
            sums.entry(key_fn(record)).or_default().add(
                record.press_buy_count,
                record.converted_count,
                1,
            );
        }
        sums.into_iter().map(|(k, acc)| (k, acc.finish())).collect()
    }

    /// [`Self::group_and_sum`] keyed by a [`Grouping`].
    pub fn group_by<'a, I>(records: I, grouping: Grouping) -> BTreeMap<BucketKey, AggregatedBucket>
    where
        I: IntoIterator<Item = &'a CanonicalRecord>,
    {
        Self::group_and_sum(records, |r| grouping.key(r))
    }

    /// Pivot buckets into a week × series table.
    ///
    /// Buckets without a week, or without the dimension `series` labels by,
    /// are skipped. Buckets sharing a cell are re-summed, so rates stay
    /// weighted.
    pub fn pivot(
        buckets: &BTreeMap<BucketKey, AggregatedBucket>,
        series: SeriesDimension,
        metric: BucketMetric,
    ) -> PivotTable {
        let mut sums: BTreeMap<String, BTreeMap<String, RateAccumulator>> = BTreeMap::new();
        for (key, bucket) in buckets {
            let (Some(week), Some(label)) = (key.week.as_ref(), series.label(key)) else {
                continue;
            };
            sums.entry(week.clone()).or_default().entry(label).or_default().add(
                bucket.press_buy_count,
                bucket.converted_count,
                bucket.record_count,
            );
        }

        let cells = sums
            .into_iter()
            .map(|(week, row)| {
                let row = row
                    .into_iter()
                    .map(|(label, acc)| (label, acc.finish().value(metric)))
                    .collect();
                (week, row)
            })
            .collect();

        PivotTable::from_cells(metric.into(), cells)
    }

    /// Per-record values pivoted by week with `"<psp> (<country>)"` series.
    ///
    /// Meant for share metrics, which are identical on every record of a
    /// cell; when several records land in one cell the first one wins.
    pub fn share_pivot<'a, I>(records: I, basis: ShareBasis, metric: Metric) -> PivotTable
    where
        I: IntoIterator<Item = &'a CanonicalRecord>,
    {
        let mut cells: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
        for record in records {
            cells
                .entry(record.week.clone())
                .or_default()
                .entry(psp_country_label(&record.psp, &record.country))
                .or_insert_with(|| record.metric_value(metric, basis));
        }
        PivotTable::from_cells(metric, cells)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shares::ShareComputer;

    fn rec(week: &str, country: &str, psp: &str, press_buy: f64, converted: f64) -> CanonicalRecord {
        CanonicalRecord::new(week, country, psp, press_buy, converted, None)
    }

    fn with_option(mut record: CanonicalRecord, option: &str) -> CanonicalRecord {
        record.last_selected_payment_option = Some(option.to_string());
        record
    }

    fn sample() -> Vec<CanonicalRecord> {
        let mut records = vec![
            with_option(rec("W1", "US", "Adyen", 100.0, 40.0), "card"),
            with_option(rec("W1", "US", "Stripe", 50.0, 10.0), "paypal"),
            rec("W2", "US", "Adyen", 0.0, 0.0),
            with_option(rec("W1", "FR", "Adyen", 10.0, 1.0), "ideal"),
            with_option(rec("W2", "FR", "Stripe", 20.0, 10.0), "card"),
        ];
        ShareComputer::attach_shares(&mut records);
        records
    }

    // ── filter ────────────────────────────────────────────────────────────────

    #[test]
    fn test_filter_empty_selection_returns_everything() {
        let records = sample();
        let filtered = AggregationEngine::filter(&records, &Selection::all());
        assert_eq!(filtered.len(), records.len());
        assert!(filtered.iter().zip(&records).all(|(a, b)| *a == b));
    }

    #[test]
    fn test_filter_combines_dimensions() {
        let records = sample();
        let selection = Selection::all()
            .with(Dimension::Psp, ["Adyen"])
            .with(Dimension::Country, ["US"]);
        let filtered = AggregationEngine::filter(&records, &selection);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|r| r.psp == "Adyen" && r.country == "US"));
    }

    #[test]
    fn test_filter_missing_payment_option_always_passes() {
        let records = sample();
        let selection = Selection::all().with(Dimension::PaymentOption, ["card"]);
        let weeks: Vec<(&str, &str)> = AggregationEngine::filter(&records, &selection)
            .iter()
            .map(|r| (r.week.as_str(), r.country.as_str()))
            .collect();
        // Two card rows plus the W2 US row that has no option at all.
        assert_eq!(weeks, vec![("W1", "US"), ("W2", "US"), ("W2", "FR")]);
    }

    #[test]
    fn test_filter_unknown_value_matches_nothing() {
        let records = sample();
        let selection = Selection::all().with(Dimension::Week, ["W9"]);
        assert!(AggregationEngine::filter(&records, &selection).is_empty());
    }

    // ── group_and_sum ─────────────────────────────────────────────────────────

    #[test]
    fn test_weighted_rate_is_not_mean_of_rates() {
        let records = vec![rec("W1", "US", "Adyen", 100.0, 50.0), rec("W2", "US", "Adyen", 10.0, 1.0)];
        let buckets = AggregationEngine::group_and_sum(&records, |r| r.psp.clone());
        let adyen = buckets["Adyen"];
        assert_eq!(adyen.press_buy_count, 110.0);
        assert_eq!(adyen.converted_count, 51.0);
        assert_eq!(adyen.conversion_rate, 46.36);
        assert_eq!(adyen.record_count, 2);
    }

    #[test]
    fn test_group_by_week_psp() {
        let records = sample();
        let buckets = AggregationEngine::group_by(&records, Grouping::WEEK_PSP);
        let key = BucketKey {
            week: Some("W1".to_string()),
            country: None,
            psp: Some("Adyen".to_string()),
        };
        let bucket = buckets[&key];
        assert_eq!(bucket.press_buy_count, 110.0);
        assert_eq!(bucket.converted_count, 41.0);
        assert_eq!(bucket.conversion_rate, 37.27);
        assert_eq!(buckets.len(), 4);
    }

    #[test]
    fn test_group_zero_press_buy_rate_is_zero() {
        let records = vec![rec("W2", "US", "Adyen", 0.0, 3.0)];
        let buckets = AggregationEngine::group_by(&records, Grouping::COUNTRY_PSP);
        assert_eq!(buckets.values().next().map(|b| b.conversion_rate), Some(0.0));
    }

    // ── pivot ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_pivot_by_psp_resums_countries() {
        let records = sample();
        let buckets = AggregationEngine::group_by(&records, Grouping::WEEK_COUNTRY_PSP);
        let table =
            AggregationEngine::pivot(&buckets, SeriesDimension::Psp, BucketMetric::ConversionRate);

        assert_eq!(table.metric, Metric::ConversionRate);
        assert_eq!(table.times, vec!["W1", "W2"]);
        assert_eq!(table.series, vec!["Adyen", "Stripe"]);
        assert_eq!(table.value("W1", "Adyen"), Some(37.27));
        assert_eq!(table.value("W2", "Stripe"), Some(50.0));
    }

    #[test]
    fn test_pivot_missing_cells() {
        let records = vec![rec("W1", "US", "Adyen", 10.0, 1.0), rec("W2", "US", "Stripe", 5.0, 1.0)];
        let buckets = AggregationEngine::group_by(&records, Grouping::WEEK_PSP);
        let table =
            AggregationEngine::pivot(&buckets, SeriesDimension::Psp, BucketMetric::PressBuyCount);

        assert_eq!(table.value("W1", "Stripe"), Some(0.0));
        assert_eq!(table.value("W1", "Klarna"), None);
        assert_eq!(table.value("W9", "Adyen"), None);
        assert_eq!(
            table.dense_rows(),
            vec![
                ("W1".to_string(), vec![10.0, 0.0]),
                ("W2".to_string(), vec![0.0, 5.0]),
            ]
        );
    }

    #[test]
    fn test_pivot_weeks_sort_lexically() {
        let records = vec![rec("W10", "US", "Adyen", 1.0, 1.0), rec("W2", "US", "Adyen", 1.0, 1.0)];
        let buckets = AggregationEngine::group_by(&records, Grouping::WEEK_PSP);
        let table =
            AggregationEngine::pivot(&buckets, SeriesDimension::Psp, BucketMetric::PressBuyCount);
        assert_eq!(table.times, vec!["W10", "W2"]);
    }

    #[test]
    fn test_pivot_other_series_dimensions() {
        let records = sample();
        let buckets = AggregationEngine::group_by(&records, Grouping::WEEK_COUNTRY_PSP);

        let by_country =
            AggregationEngine::pivot(&buckets, SeriesDimension::Country, BucketMetric::ConvertedCount);
        assert_eq!(by_country.series, vec!["FR", "US"]);
        assert_eq!(by_country.value("W1", "US"), Some(50.0));

        let by_pair =
            AggregationEngine::pivot(&buckets, SeriesDimension::PspCountry, BucketMetric::PressBuyCount);
        assert_eq!(by_pair.value("W1", "Stripe (US)"), Some(50.0));
        assert_eq!(by_pair.value("W1", "Stripe (FR)"), Some(0.0));

        // WEEK_PSP keys carry no country, so nothing can be labelled.
        let week_psp = AggregationEngine::group_by(&records, Grouping::WEEK_PSP);
        assert!(AggregationEngine::pivot(&week_psp, SeriesDimension::PspCountry, BucketMetric::PressBuyCount)
            .is_empty());
    }

    #[test]
    fn test_pivot_skips_buckets_without_week() {
        let records = sample();
        let buckets = AggregationEngine::group_by(&records, Grouping::COUNTRY_PSP);
        let table =
            AggregationEngine::pivot(&buckets, SeriesDimension::Psp, BucketMetric::PressBuyCount);
        assert!(table.is_empty());
    }

    #[test]
    fn test_bucket_metric_rejects_shares() {
        assert_eq!(
            BucketMetric::try_from(Metric::ConversionRate),
            Ok(BucketMetric::ConversionRate)
        );
        assert_eq!(
            BucketMetric::try_from(Metric::PressBuyShare),
            Err(Metric::PressBuyShare)
        );
    }

    // ── share_pivot ───────────────────────────────────────────────────────────

    #[test]
    fn test_share_pivot_series_labels() {
        let records = sample();
        let table = AggregationEngine::share_pivot(
            &records,
            ShareBasis::CountryTotal,
            Metric::PressBuyShare,
        );
        assert_eq!(
            table.series,
            vec!["Adyen (FR)", "Adyen (US)", "Stripe (FR)", "Stripe (US)"]
        );
        assert_eq!(table.value("W1", "Adyen (US)"), Some(66.67));
        assert_eq!(table.value("W2", "Adyen (US)"), Some(66.67));
        assert_eq!(table.value("W2", "Stripe (FR)"), Some(66.67));
    }

    #[test]
    fn test_pivot_serializes_to_json() {
        let records = sample();
        let table = AggregationEngine::share_pivot(&records, ShareBasis::WeekTotal, Metric::ConvertedShare);
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["metric"], "converted_share");
        assert!(json["cells"]["W1"].is_object());
    }
}
