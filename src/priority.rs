// 🎯 Priority Ranker - which delinquent parcels need attention first
//
// Urgency compares, in order:
//   1. outstanding balance (cents)
//   2. deadline pressure: days past (or until) the nearer of the cure
//      deadline and the lien cutoff; overdue ranks higher
//   3. square footage
// Exact ties fall back to parcel id ascending. CURRENT and SETTLED parcels
// are left out.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

use crate::arrears::ArrearsCalculator;
use crate::entities::{Credit, Parcel};
use crate::error::EnforcementResult;
use crate::money::to_cents;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UrgencyScore {
    pub balance_cents: i64,
    /// Negated days until the nearest deadline; positive when overdue
    pub deadline_pressure: i64,
    pub sqft: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedParcel {
    pub parcel: Parcel,
    pub score: UrgencyScore,
    pub arrears: f64,
    pub nearest_deadline: NaiveDate,
}

/// A finished ranking.
///
/// Scoring and sorting happen once, when the ranking is built, so the whole
/// ordered list is held in memory. Every parcel has to be scored before the
/// first one can be placed, so a lazy iterator would buy nothing. `iter()` can
/// be called any number of times and always yields the same order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Ranking {
    entries: Vec<RankedParcel>,
}

impl Ranking {
    pub fn iter(&self) -> std::slice::Iter<'_, RankedParcel> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&RankedParcel> {
        self.entries.get(index)
    }
}

impl IntoIterator for Ranking {
    type Item = RankedParcel;
    type IntoIter = std::vec::IntoIter<RankedParcel>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'r> IntoIterator for &'r Ranking {
    type Item = &'r RankedParcel;
    type IntoIter = std::slice::Iter<'r, RankedParcel>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

pub struct PriorityRanker<'a> {
    arrears: &'a ArrearsCalculator,
    lien_cutoff: NaiveDate,
}

impl<'a> PriorityRanker<'a> {
    pub fn new(arrears: &'a ArrearsCalculator, lien_cutoff: NaiveDate) -> Self {
        PriorityRanker { arrears, lien_cutoff }
    }

    pub fn score(&self, parcel: &Parcel, balance: f64, as_of: NaiveDate) -> (UrgencyScore, NaiveDate) {
        let nearest = match parcel.cure_deadline {
            Some(cure) => cure.min(self.lien_cutoff),
            None => self.lien_cutoff,
        };

        let score = UrgencyScore {
            balance_cents: to_cents(balance),
            deadline_pressure: -(nearest - as_of).num_days(),
            sqft: parcel.sqft,
        };
        (score, nearest)
    }

    /// Rank every enforceable parcel as of a date
    pub fn rank(&self, parcels: &[Parcel], credits: &[Credit], as_of: NaiveDate) -> EnforcementResult<Ranking> {
        let mut entries = Vec::new();

        for parcel in parcels.iter().filter(|p| p.status.is_enforceable()) {
            let balance = self.arrears.compute(parcel, credits, as_of)?.amount;
            let (score, nearest_deadline) = self.score(parcel, balance, as_of);
            entries.push(RankedParcel {
                parcel: parcel.clone(),
                score,
                arrears: balance,
                nearest_deadline,
            });
        }

        entries.sort_by(compare_ranked);

        debug!(count = entries.len(), %as_of, "ranked delinquent parcels");
        Ok(Ranking { entries })
    }
}

/// Higher urgency first; equal scores by id ascending
fn compare_ranked(a: &RankedParcel, b: &RankedParcel) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.parcel.id.cmp(&b.parcel.id))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnforcementConfig;
    use crate::entities::ParcelStatus;
    use crate::seed::campus_parcels;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn calculator() -> ArrearsCalculator {
        ArrearsCalculator::from_config(&EnforcementConfig::default()).unwrap()
    }

    #[test]
    fn test_excludes_current_and_settled() {
        let calc = calculator();
        let ranker = PriorityRanker::new(&calc, date(2026, 4, 1));
        let mut parcels = campus_parcels();
        parcels[9].status = ParcelStatus::Settled;

        let ranking = ranker.rank(&parcels, &[], date(2026, 2, 1)).unwrap();

        // 21 seeded - 9 current - 1 settled
        assert_eq!(ranking.len(), 11);
        assert!(ranking.iter().all(|r| r.parcel.status.is_enforceable()));
    }

    #[test]
    fn test_order_is_stable_and_descending() {
        let calc = calculator();
        let ranker = PriorityRanker::new(&calc, date(2026, 4, 1));
        let parcels = campus_parcels();
        let as_of = date(2026, 2, 1);

        let first = ranker.rank(&parcels, &[], as_of).unwrap();
        let second = ranker.rank(&parcels, &[], as_of).unwrap();
        assert_eq!(first, second);

        let ids_a: Vec<i64> = first.iter().map(|r| r.parcel.id).collect();
        let ids_b: Vec<i64> = second.iter().map(|r| r.parcel.id).collect();
        assert_eq!(ids_a, ids_b);

        for pair in first.iter().collect::<Vec<_>>().windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }

        // Largest accruing balance leads
        assert_eq!(first.get(0).unwrap().parcel.business_name, "Summit of Germantown");
    }

    #[test]
    fn test_ties_break_by_id() {
        let calc = calculator();
        let ranker = PriorityRanker::new(&calc, date(2026, 4, 1));
        let since = date(2025, 6, 1);
        let parcels = vec![
            Parcel::new(7, "b", "Twin B", 5_000, ParcelStatus::Delinquent).with_delinquency(since),
            Parcel::new(3, "a", "Twin A", 5_000, ParcelStatus::Delinquent).with_delinquency(since),
            Parcel::new(5, "c", "Twin C", 5_000, ParcelStatus::Delinquent).with_delinquency(since),
        ];

        let ranking = ranker.rank(&parcels, &[], date(2026, 2, 1)).unwrap();
        let ids: Vec<i64> = ranking.iter().map(|r| r.parcel.id).collect();
        assert_eq!(ids, vec![3, 5, 7]);

        // Re-walking the ranking replays the same order
        let again: Vec<i64> = (&ranking).into_iter().map(|r| r.parcel.id).collect();
        assert_eq!(again, ids);
        assert_eq!(ranking.len(), 3);
    }

    #[test]
    fn test_overdue_cure_outranks_equal_balance() {
        let calc = calculator();
        let ranker = PriorityRanker::new(&calc, date(2026, 4, 1));
        let as_of = date(2026, 2, 1);

        let mut overdue = Parcel::new(2, "a", "Overdue", 5_000, ParcelStatus::Delinquent).with_past_due(1_000.0);
        overdue.cure_deadline = Some(date(2026, 1, 20));
        let calm = Parcel::new(1, "b", "Calm", 5_000, ParcelStatus::Delinquent).with_past_due(1_000.0);

        let ranking = ranker.rank(&[calm, overdue], &[], as_of).unwrap();
        assert_eq!(ranking.get(0).unwrap().parcel.id, 2);
        assert_eq!(ranking.get(0).unwrap().score.deadline_pressure, 12);
        assert_eq!(ranking.get(1).unwrap().score.deadline_pressure, -59);
    }

    #[test]
    fn test_sqft_breaks_balance_and_deadline_tie() {
        let calc = calculator();
        let ranker = PriorityRanker::new(&calc, date(2026, 4, 1));
        let small = Parcel::new(1, "a", "Small", 2_000, ParcelStatus::Recon).with_past_due(500.0);
        let large = Parcel::new(2, "b", "Large", 9_000, ParcelStatus::Verify).with_past_due(500.0);

        let ranking = ranker.rank(&[small, large], &[], date(2026, 2, 1)).unwrap();
        let ids: Vec<i64> = (&ranking).into_iter().map(|r| r.parcel.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }
}
