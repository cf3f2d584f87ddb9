//! Share-of-total figures under each [`ShareBasis`].
//!
//! Under [`ShareBasis::CountryTotal`] every record of a country is pooled
//! across weeks, so all week-rows of one (country, psp) carry the same share.
//! Under [`ShareBasis::WeekTotal`] the pooling runs across countries instead.

use std::collections::BTreeMap;

use tracker_core::models::{round2, CanonicalRecord, ShareBasis, ShareValues};

/// `(group, psp)` → shares. The group is a country or a week label
/// depending on the basis.
pub type ShareTable = BTreeMap<(String, String), ShareValues>;

#[derive(Debug, Default, Clone, Copy)]
struct Totals {
    press_buy: f64,
    converted: f64,
}

impl Totals {
    fn add(&mut self, record: &CanonicalRecord) {
        self.press_buy += record.press_buy_count;
        self.converted += record.converted_count;
    }
}

/// Computes and attaches share-of-total values.
pub struct ShareComputer;

impl ShareComputer {
    /// The grouping label of `record` under `basis`.
    pub fn group_of(record: &CanonicalRecord, basis: ShareBasis) -> &str {
        match basis {
            ShareBasis::CountryTotal => &record.country,
            ShareBasis::WeekTotal => &record.week,
        }
    }

    /// Shares of every (group, psp) pair under `basis`.
    ///
    /// A share is 0 when its group's total is 0.
    pub fn share_table(records: &[CanonicalRecord], basis: ShareBasis) -> ShareTable {
        let mut group_totals: BTreeMap<&str, Totals> = BTreeMap::new();
        let mut psp_totals: BTreeMap<(&str, &str), Totals> = BTreeMap::new();

        for record in records {
            let group = Self::group_of(record, basis);
            group_totals.entry(group).or_default().add(record);
            psp_totals
                .entry((group, record.psp.as_str()))
                .or_default()
                .add(record);
        }

        psp_totals
            .into_iter()
            .map(|((group, psp), totals)| {
                let denominator = group_totals.get(group).copied().unwrap_or_default();
                let values = ShareValues {
                    press_buy_share: percent_of(totals.press_buy, denominator.press_buy),
                    converted_share: percent_of(totals.converted, denominator.converted),
                };
                ((group.to_string(), psp.to_string()), values)
            })
            .collect()
    }

    /// Fill `shares` on every record for both bases.
    pub fn attach_shares(records: &mut [CanonicalRecord]) {
        for basis in ShareBasis::ALL {
            let table = Self::share_table(records, basis);
            for record in records.iter_mut() {
                let key = (
                    Self::group_of(record, basis).to_string(),
                    record.psp.clone(),
                );
                let values = table.get(&key).copied().unwrap_or_default();
                record.shares.set(basis, values);
            }
        }
    }
}

fn percent_of(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        round2(part / whole * 100.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(week: &str, country: &str, psp: &str, press_buy: f64, converted: f64) -> CanonicalRecord {
        CanonicalRecord::new(week, country, psp, press_buy, converted, None)
    }

    fn sample() -> Vec<CanonicalRecord> {
        vec![
            rec("W1", "US", "Adyen", 100.0, 40.0),
            rec("W1", "US", "Stripe", 50.0, 10.0),
            rec("W2", "US", "Adyen", 0.0, 0.0),
            rec("W1", "FR", "Adyen", 30.0, 3.0),
            rec("W2", "FR", "Klarna", 10.0, 7.0),
        ]
    }

    // ── share_table ───────────────────────────────────────────────────────────

    #[test]
    fn test_country_total_pools_weeks() {
        let table = ShareComputer::share_table(&sample(), ShareBasis::CountryTotal);
        let adyen_us = table[&("US".to_string(), "Adyen".to_string())];
        let stripe_us = table[&("US".to_string(), "Stripe".to_string())];

        assert_eq!(adyen_us.press_buy_share, 66.67);
        assert_eq!(stripe_us.press_buy_share, 33.33);
        assert_eq!(adyen_us.converted_share, 80.0);
        assert_eq!(stripe_us.converted_share, 20.0);
    }

    #[test]
    fn test_week_total_pools_countries() {
        let table = ShareComputer::share_table(&sample(), ShareBasis::WeekTotal);
        // W1: Adyen 130 of 180, Stripe 50 of 180.
        assert_eq!(table[&("W1".to_string(), "Adyen".to_string())].press_buy_share, 72.22);
        assert_eq!(table[&("W1".to_string(), "Stripe".to_string())].press_buy_share, 27.78);
        // W2: Adyen 0 of 10.
        assert_eq!(table[&("W2".to_string(), "Adyen".to_string())].press_buy_share, 0.0);
        assert_eq!(table[&("W2".to_string(), "Klarna".to_string())].press_buy_share, 100.0);
    }

    #[test]
    fn test_shares_sum_to_100_per_group() {
        let records = sample();
        for basis in ShareBasis::ALL {
            let table = ShareComputer::share_table(&records, basis);
            let mut sums: BTreeMap<&str, f64> = BTreeMap::new();
            for ((group, _), values) in &table {
                *sums.entry(group.as_str()).or_default() += values.press_buy_share;
            }
            for (group, sum) in sums {
                assert!((sum - 100.0).abs() <= 0.02, "{basis} {group}: {sum}");
            }
        }
    }

    #[test]
    fn test_zero_denominator_gives_zero_share() {
        let records = vec![rec("W1", "DE", "Adyen", 0.0, 0.0), rec("W1", "DE", "Stripe", 0.0, 0.0)];
        let table = ShareComputer::share_table(&records, ShareBasis::CountryTotal);
        for values in table.values() {
            assert_eq!(values.press_buy_share, 0.0);
            assert_eq!(values.converted_share, 0.0);
        }
    }

    // ── attach_shares ─────────────────────────────────────────────────────────

    #[test]
    fn test_attach_shares_fills_both_bases() {
        let mut records = sample();
        ShareComputer::attach_shares(&mut records);

        // Both US Adyen week-rows carry the pooled country share.
        for r in records.iter().filter(|r| r.country == "US" && r.psp == "Adyen") {
            assert_eq!(r.press_buy_share(ShareBasis::CountryTotal), 66.67);
        }
        let fr_adyen = records.iter().find(|r| r.country == "FR" && r.psp == "Adyen").unwrap();
        assert_eq!(fr_adyen.press_buy_share(ShareBasis::CountryTotal), 75.0);
        assert_eq!(fr_adyen.press_buy_share(ShareBasis::WeekTotal), 72.22);
    }

    #[test]
    fn test_attach_shares_is_repeatable() {
        let mut once = sample();
        ShareComputer::attach_shares(&mut once);
        let mut twice = once.clone();
        ShareComputer::attach_shares(&mut twice);
        assert_eq!(once, twice);
    }
}
