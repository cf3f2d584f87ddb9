//! Interactive analysis state over one loaded dataset.
//!
//! [`AnalysisSession`] owns the immutable record set together with the
//! active [`Selection`] and share basis. Changing the psp, week or country
//! selection re-runs the cascade so the payment-option selection never holds
//! an option that is no longer reachable. Every query recomputes from the
//! records; nothing is cached.

use std::collections::BTreeMap;

use serde::Serialize;
use tracker_core::models::{CanonicalRecord, Dimension, Metric, Selection, ShareBasis};
use tracker_data::aggregator::{
    AggregatedBucket, AggregationEngine, BucketKey, BucketMetric, Grouping, PivotTable,
    SeriesDimension,
};
use tracker_data::analysis::{country_breakdown, CountryBreakdown, Overview, Vocabularies};
use tracker_data::cascade::{FilterCascadeResolver, ValidPaymentOptions};

// ── Public types ──────────────────────────────────────────────────────────────

/// Everything a front end shows for the current selection.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub selection: Selection,
    pub share_basis: ShareBasis,
    pub vocabularies: Vocabularies,
    pub valid_payment_options: ValidPaymentOptions,
    pub overview: Overview,
    pub countries: Vec<CountryBreakdown>,
    pub pivots: Vec<PivotTable>,
}

// ── AnalysisSession ───────────────────────────────────────────────────────────

/// Selection state plus the queries that depend on it.
#[derive(Debug, Clone)]
pub struct AnalysisSession {
    records: Vec<CanonicalRecord>,
    selection: Selection,
    valid_payment_options: ValidPaymentOptions,
    share_basis: ShareBasis,
}

impl AnalysisSession {
    /// Start with everything selected and the country-total share basis.
    pub fn new(records: Vec<CanonicalRecord>) -> Self {
        Self::with_selection(records, Selection::all())
    }

    /// Start from an initial selection; its payment options are reconciled
    /// against the other dimensions right away.
    pub fn with_selection(records: Vec<CanonicalRecord>, selection: Selection) -> Self {
        let (valid_payment_options, selection) =
            FilterCascadeResolver::reconcile(&records, &selection);
        Self {
            records,
            selection,
            valid_payment_options,
            share_basis: ShareBasis::default(),
        }
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn share_basis(&self) -> ShareBasis {
        self.share_basis
    }

    pub fn set_share_basis(&mut self, basis: ShareBasis) {
        self.share_basis = basis;
    }

    // ── Selection setters ─────────────────────────────────────────────────────

    pub fn set_psps<I, S>(&mut self, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_dimension(Dimension::Psp, values);
    }

    pub fn set_weeks<I, S>(&mut self, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_dimension(Dimension::Week, values);
    }

    pub fn set_countries<I, S>(&mut self, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_dimension(Dimension::Country, values);
    }

    /// Select payment options; options outside the valid set are ignored.
    pub fn set_payment_options<I, S>(&mut self, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_dimension(Dimension::PaymentOption, values);
    }

    /// Replace the selection of one dimension and re-run the cascade.
    pub fn set_dimension<I, S>(&mut self, dimension: Dimension, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selection
            .set(dimension, values.into_iter().map(Into::into).collect());

        if FilterCascadeResolver::drives_payment_options(dimension) {
            self.valid_payment_options =
                FilterCascadeResolver::valid_payment_options(&self.records, &self.selection);
        }
        FilterCascadeResolver::prune_payment_options(
            &mut self.selection,
            &self.valid_payment_options,
        );
    }

    /// Clear every dimension.
    pub fn reset_selection(&mut self) {
        self.selection = Selection::all();
        self.valid_payment_options =
            FilterCascadeResolver::valid_payment_options(&self.records, &self.selection);
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    pub fn valid_payment_options(&self) -> &ValidPaymentOptions {
        &self.valid_payment_options
    }

    /// Distinct values of the whole dataset, independent of the selection.
    pub fn vocabularies(&self) -> Vocabularies {
        Vocabularies::from_records(&self.records)
    }

    pub fn filtered(&self) -> Vec<&CanonicalRecord> {
        AggregationEngine::filter(&self.records, &self.selection)
    }

    pub fn buckets(&self, grouping: Grouping) -> BTreeMap<BucketKey, AggregatedBucket> {
        AggregationEngine::group_by(self.filtered(), grouping)
    }

    /// Week pivot of `metric` over the filtered records.
    ///
    /// Counts and the conversion rate are summed per psp; share metrics are
    /// read per record under the current basis with `psp (country)` series.
    pub fn pivot(&self, metric: Metric) -> PivotTable {
        match BucketMetric::try_from(metric) {
            Ok(bucket_metric) => AggregationEngine::pivot(
                &self.buckets(Grouping::WEEK_PSP),
                SeriesDimension::Psp,
                bucket_metric,
            ),
            Err(share_metric) => self.share_pivot(share_metric),
        }
    }

    pub fn share_pivot(&self, metric: Metric) -> PivotTable {
        AggregationEngine::share_pivot(self.filtered(), self.share_basis, metric)
    }

    pub fn overview(&self) -> Overview {
        Overview::from_records(self.filtered())
    }

    pub fn country_breakdown(&self) -> Vec<CountryBreakdown> {
        country_breakdown(self.filtered())
    }

    /// Overview, breakdown and one pivot per entry of `metrics`.
    pub fn snapshot(&self, metrics: &[Metric]) -> SessionSnapshot {
        SessionSnapshot {
            selection: self.selection.clone(),
            share_basis: self.share_basis,
            vocabularies: self.vocabularies(),
            valid_payment_options: self.valid_payment_options.clone(),
            overview: self.overview(),
            countries: self.country_breakdown(),
            pivots: metrics.iter().map(|m| self.pivot(*m)).collect(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_data::shares::ShareComputer;

    fn rec(week: &str, country: &str, psp: &str, pb: f64, conv: f64, option: Option<&str>) -> CanonicalRecord {
        CanonicalRecord::new(week, country, psp, pb, conv, option.map(str::to_string))
    }

    fn session() -> AnalysisSession {
        let mut records = vec![
            rec("W1", "US", "Adyen", 100.0, 40.0, Some("card")),
            rec("W1", "US", "Stripe", 50.0, 10.0, Some("paypal")),
            rec("W2", "US", "Adyen", 0.0, 0.0, None),
            rec("W2", "FR", "Stripe", 20.0, 5.0, Some("ideal")),
        ];
        ShareComputer::attach_shares(&mut records);
        AnalysisSession::new(records)
    }

    #[test]
    fn test_new_session_is_unrestricted() {
        let s = session();
        assert!(s.selection().is_unrestricted());
        assert_eq!(s.filtered().len(), 4);
        assert_eq!(s.valid_payment_options().len(), 3);
        assert_eq!(s.share_basis(), ShareBasis::CountryTotal);
    }

    #[test]
    fn test_psp_change_prunes_payment_options() {
        let mut s = session();
        s.set_payment_options(["card", "paypal"]);
        assert_eq!(s.selection().payment_options.len(), 2);

        s.set_psps(["Adyen"]);
        let kept: Vec<&str> = s.selection().payment_options.iter().map(String::as_str).collect();
        assert_eq!(kept, vec!["card"]);
        assert!(!s.valid_payment_options().contains("paypal"));
    }

    #[test]
    fn test_set_payment_options_ignores_unreachable_values() {
        let mut s = session();
        s.set_countries(["FR"]);
        s.set_payment_options(["card", "ideal"]);
        let kept: Vec<&str> = s.selection().payment_options.iter().map(String::as_str).collect();
        assert_eq!(kept, vec!["ideal"]);
    }

    #[test]
    fn test_with_selection_reconciles_up_front() {
        let selection = Selection::all()
            .with(Dimension::Week, ["W2"])
            .with(Dimension::PaymentOption, ["card"]);
        let s = AnalysisSession::with_selection(session().records().to_vec(), selection);
        assert!(s.selection().payment_options.is_empty());
    }

    #[test]
    fn test_reset_selection() {
        let mut s = session();
        s.set_weeks(["W1"]);
        s.reset_selection();
        assert!(s.selection().is_unrestricted());
        assert_eq!(s.valid_payment_options().len(), 3);
    }

    #[test]
    fn test_pivot_dispatches_on_metric() {
        let s = session();
        let rate = s.pivot(Metric::ConversionRate);
        assert_eq!(rate.series, vec!["Adyen", "Stripe"]);
        assert_eq!(rate.value("W1", "Adyen"), Some(40.0));

        let share = s.pivot(Metric::PressBuyShare);
        assert_eq!(share.value("W1", "Adyen (US)"), Some(66.67));
        assert_eq!(share.value("W2", "Stripe (FR)"), Some(100.0));
    }

    #[test]
    fn test_share_basis_switch() {
        let mut s = session();
        s.set_share_basis(ShareBasis::WeekTotal);
        let share = s.pivot(Metric::PressBuyShare);
        // W1: Adyen 100 of 150.
        assert_eq!(share.value("W1", "Adyen (US)"), Some(66.67));
        // W2: Stripe 20 of 20.
        assert_eq!(share.value("W2", "Stripe (FR)"), Some(100.0));
        assert_eq!(share.value("W2", "Adyen (US)"), Some(0.0));
    }

    #[test]
    fn test_overview_follows_selection() {
        let mut s = session();
        s.set_countries(["US"]);
        let overview = s.overview();
        assert_eq!(overview.record_count, 3);
        assert_eq!(overview.total_press_buy, 150.0);
        assert_eq!(overview.conversion_rate, 33.33);
        // Vocabularies always cover the whole dataset.
        assert_eq!(s.vocabularies().countries, vec!["FR", "US"]);
    }

    #[test]
    fn test_snapshot_serializes() {
        let s = session();
        let snapshot = s.snapshot(&[Metric::PressBuyCount, Metric::ConvertedShare]);
        assert_eq!(snapshot.pivots.len(), 2);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["share_basis"], "country_total");
        assert_eq!(json["overview"]["psp_count"], 2);
        assert_eq!(json["countries"][1]["country"], "US");
    }
}
