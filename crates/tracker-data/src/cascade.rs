//! Payment-option validity under the psp, week and country selections.
//!
//! The dependency is one way: the psp, week and country selections decide
//! which payment options are reachable, and the active payment-option
//! selection is pruned to that set. Nothing flows back.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;
use tracker_core::models::{CanonicalRecord, Dimension, Selection};

use crate::aggregator::AggregationEngine;

/// Payment options reachable under the current psp/week/country selections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidPaymentOptions {
    options: BTreeSet<String>,
}

impl ValidPaymentOptions {
    pub fn contains(&self, option: &str) -> bool {
        self.options.contains(option)
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(String::as_str)
    }

    pub fn as_set(&self) -> &BTreeSet<String> {
        &self.options
    }
}

/// Stateless cascade resolution.
pub struct FilterCascadeResolver;

impl FilterCascadeResolver {
    /// Distinct payment options on records passing the psp, week and country
    /// selections. The payment-option selection itself is ignored.
    pub fn valid_payment_options(
        records: &[CanonicalRecord],
        selection: &Selection,
    ) -> ValidPaymentOptions {
        let options = records
            .iter()
            .filter(|r| AggregationEngine::matches_ignoring_payment_option(r, selection))
            .filter_map(|r| r.last_selected_payment_option.clone())
            .collect();
        ValidPaymentOptions { options }
    }

    /// Drop selected payment options that are not in `valid`.
    pub fn prune_payment_options(selection: &mut Selection, valid: &ValidPaymentOptions) {
        let before = selection.payment_options.len();
        selection.payment_options.retain(|o| valid.contains(o));
        let removed = before - selection.payment_options.len();
        if removed > 0 {
            debug!("Dropped {} inactive payment option selection(s)", removed);
        }
    }

    /// Recompute the valid set and return it with a pruned copy of
    /// `selection`.
    pub fn reconcile(
        records: &[CanonicalRecord],
        selection: &Selection,
    ) -> (ValidPaymentOptions, Selection) {
        let valid = Self::valid_payment_options(records, selection);
        let mut reconciled = selection.clone();
        Self::prune_payment_options(&mut reconciled, &valid);
        (valid, reconciled)
    }

    /// Whether changing `dimension` can change the valid payment options.
    pub fn drives_payment_options(dimension: Dimension) -> bool {
        !matches!(dimension, Dimension::PaymentOption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(week: &str, country: &str, psp: &str, option: Option<&str>) -> CanonicalRecord {
        CanonicalRecord::new(week, country, psp, 10.0, 5.0, option.map(str::to_string))
    }

    fn sample() -> Vec<CanonicalRecord> {
        vec![
            rec("W1", "US", "Adyen", Some("card")),
            rec("W1", "US", "Stripe", Some("paypal")),
            rec("W2", "FR", "Adyen", Some("ideal")),
            rec("W2", "FR", "Stripe", None),
            rec("W3", "DE", "Klarna", Some("sofort")),
        ]
    }

    fn options(valid: &ValidPaymentOptions) -> Vec<&str> {
        valid.iter().collect()
    }

    #[test]
    fn test_valid_options_follow_psp_selection() {
        let records = sample();
        let selection = Selection::all().with(Dimension::Psp, ["Adyen"]);
        let valid = FilterCascadeResolver::valid_payment_options(&records, &selection);

        let expected: BTreeSet<String> = records
            .iter()
            .filter(|r| r.psp == "Adyen")
            .filter_map(|r| r.last_selected_payment_option.clone())
            .collect();
        assert_eq!(valid.as_set(), &expected);
        assert_eq!(options(&valid), vec!["card", "ideal"]);
    }

    #[test]
    fn test_valid_options_ignore_payment_option_selection() {
        let records = sample();
        let selection = Selection::all()
            .with(Dimension::Country, ["US"])
            .with(Dimension::PaymentOption, ["sofort"]);
        let valid = FilterCascadeResolver::valid_payment_options(&records, &selection);
        assert_eq!(options(&valid), vec!["card", "paypal"]);
    }

    #[test]
    fn test_valid_options_unrestricted() {
        let valid = FilterCascadeResolver::valid_payment_options(&sample(), &Selection::all());
        assert_eq!(valid.len(), 4);
    }

    #[test]
    fn test_reconcile_prunes_inactive_options() {
        let records = sample();
        let selection = Selection::all()
            .with(Dimension::Psp, ["Adyen"])
            .with(Dimension::PaymentOption, ["card", "paypal"]);

        let (valid, reconciled) = FilterCascadeResolver::reconcile(&records, &selection);
        assert!(valid.contains("card"));
        assert!(!valid.contains("paypal"));
        assert_eq!(
            reconciled.payment_options.iter().collect::<Vec<_>>(),
            vec!["card"]
        );
        assert_eq!(reconciled.psps, selection.psps);
    }

    #[test]
    fn test_reconcile_empty_valid_set_clears_selection() {
        let records = sample();
        let selection = Selection::all()
            .with(Dimension::Week, ["W9"])
            .with(Dimension::PaymentOption, ["card"]);
        let (valid, reconciled) = FilterCascadeResolver::reconcile(&records, &selection);
        assert!(valid.is_empty());
        assert!(reconciled.payment_options.is_empty());
    }

    #[test]
    fn test_drives_payment_options() {
        assert!(FilterCascadeResolver::drives_payment_options(Dimension::Psp));
        assert!(!FilterCascadeResolver::drives_payment_options(
            Dimension::PaymentOption
        ));
    }
}
