// ⏳ Arrears Calculator - accrued security-fee debt over a bounded window
//
// For each week in the window, charge the campus rate in effect on the
// week's first day, scaled by the parcel's pro-rata share; a trailing
// partial week is charged pro rata by days. Recorded credits come off the
// top and the result never goes below zero.
//
// The window never reaches further back than:
//   - the arrears cap (156 weeks before the as-of date)
//   - the statute of limitations (6 years before the as-of date)
//   - the recording of the covenant itself
// Anything older is time-barred and reported, not charged.
//
// This is the one place arrears are computed. Every collaborator (tables,
// letters, exports, the server) goes through it.

use chrono::{Days, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::allocation::CampusAllocator;
use crate::config::EnforcementConfig;
use crate::entities::{Credit, Parcel, ParcelStatus};
use crate::error::EnforcementResult;
use crate::rate_schedule::RateSchedule;

// ============================================================================
// RESULT TYPES
// ============================================================================

/// How many weeks were charged at one historical rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateBreakdown {
    pub effective_from: NaiveDate,
    pub weekly_rate: f64,
    /// Fractional when a partial week was charged
    pub weeks: f64,
    pub amount: f64,
}

/// Campus-level accrual over a window (share = 1, no credits)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accrual {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub weeks_charged: f64,
    pub time_barred_weeks: f64,
    pub amount: f64,
    pub breakdown: Vec<RateBreakdown>,
}

impl Accrual {
    fn empty(start: NaiveDate, end: NaiveDate) -> Self {
        Accrual {
            window_start: start,
            window_end: end,
            weeks_charged: 0.0,
            time_barred_weeks: 0.0,
            amount: 0.0,
            breakdown: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArrearsBasis {
    /// Accrued from the delinquency start under the rate schedule
    Accrued,
    /// No delinquency start known; operator-recorded balance used
    Recorded,
    /// Parcel has settled; nothing outstanding
    Settled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arrears {
    pub parcel_id: i64,
    pub as_of: NaiveDate,
    pub basis: ArrearsBasis,
    pub share: f64,
    /// Before credits
    pub gross: f64,
    pub credits: f64,
    /// Outstanding amount, never negative
    pub amount: f64,
    pub weeks_charged: f64,
    pub time_barred_weeks: f64,
    /// Per-rate breakdown, already scaled by share
    pub breakdown: Vec<RateBreakdown>,
}

impl Arrears {
    pub fn is_outstanding(&self) -> bool {
        self.amount > 0.0
    }
}

/// `as_of` minus whole weeks, saturating at the earliest representable date
fn weeks_before(as_of: NaiveDate, weeks: u32) -> NaiveDate {
    as_of
        .checked_sub_days(Days::new(u64::from(weeks) * 7))
        .unwrap_or(NaiveDate::MIN)
}

// ============================================================================
// CALCULATOR
// ============================================================================

#[derive(Debug, Clone)]
pub struct ArrearsCalculator {
    schedule: RateSchedule,
    allocator: CampusAllocator,
    cap_weeks: u32,
    limitation_years: u32,
    covenant_origination: NaiveDate,
}

impl ArrearsCalculator {
    pub fn new(
        schedule: RateSchedule,
        allocator: CampusAllocator,
        cap_weeks: u32,
        limitation_years: u32,
        covenant_origination: NaiveDate,
    ) -> Self {
        ArrearsCalculator {
            schedule,
            allocator,
            cap_weeks,
            limitation_years,
            covenant_origination,
        }
    }

    pub fn from_config(config: &EnforcementConfig) -> EnforcementResult<Self> {
        Ok(ArrearsCalculator::new(
            RateSchedule::new(config.rates.clone())?,
            CampusAllocator::new(config.campus_total_sqft),
            config.arrears_cap_weeks,
            config.limitation_years,
            config.covenant_origination,
        ))
    }

    pub fn schedule(&self) -> &RateSchedule {
        &self.schedule
    }

    pub fn allocator(&self) -> &CampusAllocator {
        &self.allocator
    }

    /// Earliest date still collectible as of `as_of`
    pub fn earliest_collectible(&self, as_of: NaiveDate) -> NaiveDate {
        let cap = weeks_before(as_of, self.cap_weeks);
        let limitation = as_of
            .checked_sub_months(Months::new(self.limitation_years * 12))
            .unwrap_or(NaiveDate::MIN);

        cap.max(limitation).max(self.covenant_origination)
    }

    /// Campus-level accrual from `start` up to (not including) `as_of`.
    ///
    /// An as-of date on or before the start yields an empty accrual.
    pub fn accrue(&self, start: NaiveDate, as_of: NaiveDate) -> EnforcementResult<Accrual> {
        if as_of <= start {
            return Ok(Accrual::empty(start, as_of));
        }

        let window_start = start.max(self.earliest_collectible(as_of));
        let time_barred_weeks = (window_start - start).num_days() as f64 / 7.0;

        if window_start >= as_of {
            let mut accrual = Accrual::empty(window_start, as_of);
            accrual.time_barred_weeks = time_barred_weeks;
            return Ok(accrual);
        }

        // Bucket by the rate record that applied, ordered by effective date
        let mut buckets: BTreeMap<NaiveDate, RateBreakdown> = BTreeMap::new();
        let mut cursor = window_start;
        let mut amount = 0.0;
        let mut weeks_charged = 0.0;

        while cursor < as_of {
            let next = (cursor + Duration::days(7)).min(as_of);
            let fraction = (next - cursor).num_days() as f64 / 7.0;
            let record = self.schedule.record_on(cursor)?;
            let charge = record.weekly_rate * fraction;

            let bucket = buckets
                .entry(record.effective_from)
                .or_insert_with(|| RateBreakdown {
                    effective_from: record.effective_from,
                    weekly_rate: record.weekly_rate,
                    weeks: 0.0,
                    amount: 0.0,
                });
            bucket.weeks += fraction;
            bucket.amount += charge;

            amount += charge;
            weeks_charged += fraction;
            cursor = next;
        }

        Ok(Accrual {
            window_start,
            window_end: as_of,
            weeks_charged,
            time_barred_weeks,
            amount,
            breakdown: buckets.into_values().collect(),
        })
    }

    /// Campus-level accrual over an explicit number of weeks ending at `as_of`
    pub fn accrue_weeks(&self, as_of: NaiveDate, weeks: u32) -> EnforcementResult<Accrual> {
        self.accrue(weeks_before(as_of, weeks), as_of)
    }

    /// Outstanding arrears for a parcel as of a date.
    ///
    /// `credits` may contain credits for other parcels; only this parcel's
    /// credits received on or after the delinquency start and on or before
    /// the as-of date count.
    pub fn compute(
        &self,
        parcel: &Parcel,
        credits: &[Credit],
        as_of: NaiveDate,
    ) -> EnforcementResult<Arrears> {
        let share = self.allocator.share(parcel)?;

        if parcel.status == ParcelStatus::Settled {
            return Ok(Arrears {
                parcel_id: parcel.id,
                as_of,
                basis: ArrearsBasis::Settled,
                share,
                gross: 0.0,
                credits: 0.0,
                amount: 0.0,
                weeks_charged: 0.0,
                time_barred_weeks: 0.0,
                breakdown: Vec::new(),
            });
        }

        let start = match parcel.delinquent_since {
            Some(start) => start,
            None => {
                let recorded = parcel.past_due_balance.max(0.0);
                return Ok(Arrears {
                    parcel_id: parcel.id,
                    as_of,
                    basis: ArrearsBasis::Recorded,
                    share,
                    gross: recorded,
                    credits: 0.0,
                    amount: recorded,
                    weeks_charged: 0.0,
                    time_barred_weeks: 0.0,
                    breakdown: Vec::new(),
                });
            }
        };

        let accrual = self.accrue(start, as_of)?;
        Ok(self.scale(parcel, share, accrual, credits, start, as_of))
    }

    /// Parcel arrears over an explicit window length, ignoring the recorded start
    pub fn compute_for_window(
        &self,
        parcel: &Parcel,
        credits: &[Credit],
        as_of: NaiveDate,
        weeks: u32,
    ) -> EnforcementResult<Arrears> {
        let share = self.allocator.share(parcel)?;
        let start = weeks_before(as_of, weeks);
        let accrual = self.accrue(start, as_of)?;
        Ok(self.scale(parcel, share, accrual, credits, start, as_of))
    }

    fn scale(
        &self,
        parcel: &Parcel,
        share: f64,
        accrual: Accrual,
        credits: &[Credit],
        start: NaiveDate,
        as_of: NaiveDate,
    ) -> Arrears {
        let gross = accrual.amount * share;
        let credited: f64 = credits
            .iter()
            .filter(|c| c.parcel_id == parcel.id)
            .filter(|c| c.received_on >= start && c.received_on <= as_of)
            .map(|c| c.amount)
            .sum();
        let amount = (gross - credited).max(0.0);

        debug!(
            parcel_id = parcel.id,
            %as_of,
            gross,
            credited,
            amount,
            weeks = accrual.weeks_charged,
            "computed arrears"
        );

        Arrears {
            parcel_id: parcel.id,
            as_of,
            basis: ArrearsBasis::Accrued,
            share,
            gross,
            credits: credited,
            amount,
            weeks_charged: accrual.weeks_charged,
            time_barred_weeks: accrual.time_barred_weeks,
            breakdown: accrual
                .breakdown
                .into_iter()
                .map(|b| RateBreakdown {
                    effective_from: b.effective_from,
                    weekly_rate: b.weekly_rate * share,
                    weeks: b.weeks,
                    amount: b.amount * share,
                })
                .collect(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn calculator() -> ArrearsCalculator {
        ArrearsCalculator::from_config(&EnforcementConfig::default()).unwrap()
    }

    fn base() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 12, 1).unwrap()
    }

    proptest! {
        #[test]
        fn arrears_never_decrease_with_as_of(
            start_offset in 0i64..1_500,
            as_of_offset in 0i64..1_500,
            step in 1i64..120,
        ) {
            let calc = calculator();
            let start = base() + Duration::days(start_offset);
            let parcel = Parcel::new(1, "p", "p", 31_061, ParcelStatus::Delinquent)
                .with_delinquency(start);

            let earlier = base() + Duration::days(as_of_offset);
            let later = earlier + Duration::days(step);

            let a = calc.compute(&parcel, &[], earlier).unwrap().amount;
            let b = calc.compute(&parcel, &[], later).unwrap().amount;
            prop_assert!(b + 1e-6 >= a, "{} then {}", a, b);
        }

        #[test]
        fn arrears_are_never_negative(
            start_offset in 0i64..1_500,
            as_of_offset in 0i64..1_500,
            credit in 0.0f64..500_000.0,
        ) {
            let calc = calculator();
            let start = base() + Duration::days(start_offset);
            let as_of = base() + Duration::days(as_of_offset);
            let parcel = Parcel::new(1, "p", "p", 58_592, ParcelStatus::Delinquent)
                .with_delinquency(start);
            let credits = vec![Credit::new(1, start, credit, "payment")];

            let arrears = calc.compute(&parcel, &credits, as_of).unwrap();
            prop_assert!(arrears.amount >= 0.0);
            prop_assert!(arrears.amount <= arrears.gross + 1e-9);
        }

        #[test]
        fn delinquency_older_than_cap_matches_cap(extra_weeks in 0i64..200) {
            let calc = calculator();
            let as_of = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
            let at_cap = Parcel::new(1, "p", "p", 12_314, ParcelStatus::Delinquent)
                .with_delinquency(as_of - Duration::weeks(156));
            let older = Parcel::new(1, "p", "p", 12_314, ParcelStatus::Delinquent)
                .with_delinquency(as_of - Duration::weeks(156 + extra_weeks));

            let a = calc.compute(&at_cap, &[], as_of).unwrap().amount;
            let b = calc.compute(&older, &[], as_of).unwrap().amount;
            prop_assert!((a - b).abs() < 1e-9);
        }
    }
}
