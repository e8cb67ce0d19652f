// 📐 Campus Allocator - pro-rata share of the campus by square footage
//
// share = parcel SF / total campus SF
//
// Every campus-wide charge (the weekly security fee, a one-off common-area
// bill) is spread across parcels by this share.

use serde::{Deserialize, Serialize};

use crate::entities::Parcel;
use crate::error::{EnforcementError, EnforcementResult};

/// Tolerance for the "shares sum to one" check
pub const SHARE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub parcel_id: i64,
    pub share: f64,
    pub amount: f64,
}

/// Pro-rata charge vs what the parcel is actually billed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingComparison {
    pub parcel_id: i64,
    pub share: f64,
    pub pro_rata_weekly: f64,
    pub billed_weekly: f64,
    /// Positive when the parcel owes more than it is billed
    pub weekly_difference: f64,
    pub pro_rata_monthly: f64,
    pub billed_monthly: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CampusAllocator {
    total_sqft: u64,
}

impl CampusAllocator {
    pub fn new(total_sqft: u64) -> Self {
        CampusAllocator { total_sqft }
    }

    pub fn total_sqft(&self) -> u64 {
        self.total_sqft
    }

    /// Pro-rata share of a parcel, in [0, 1]
    pub fn share(&self, parcel: &Parcel) -> EnforcementResult<f64> {
        if parcel.sqft == 0 {
            return Err(EnforcementError::invariant(format!(
                "parcel {} has non-positive square footage",
                parcel.id
            )));
        }
        self.share_of_sqft(parcel.sqft as u64)
    }

    pub fn share_of_sqft(&self, sqft: u64) -> EnforcementResult<f64> {
        if self.total_sqft == 0 {
            return Err(EnforcementError::invariant("campus total square footage is zero"));
        }
        if sqft > self.total_sqft {
            return Err(EnforcementError::invariant(format!(
                "{} SF exceeds the campus total of {} SF",
                sqft, self.total_sqft
            )));
        }
        Ok(sqft as f64 / self.total_sqft as f64)
    }

    /// Check the whole parcel set against the campus: every parcel positive,
    /// square footage summing to the total, shares summing to one.
    pub fn validate_campus(&self, parcels: &[Parcel]) -> EnforcementResult<()> {
        let mut sqft_total: u64 = 0;
        let mut share_total = 0.0;

        for parcel in parcels {
            share_total += self.share(parcel)?;
            sqft_total += parcel.sqft as u64;
        }

        if sqft_total != self.total_sqft {
            return Err(EnforcementError::invariant(format!(
                "parcels cover {} SF but the campus is {} SF",
                sqft_total, self.total_sqft
            )));
        }

        if (share_total - 1.0).abs() > SHARE_TOLERANCE {
            return Err(EnforcementError::invariant(format!(
                "campus shares sum to {:.12}, not 1",
                share_total
            )));
        }

        Ok(())
    }

    /// Spread a campus-wide charge across parcels by share
    pub fn allocate(&self, charge: f64, parcels: &[Parcel]) -> EnforcementResult<Vec<Allocation>> {
        parcels
            .iter()
            .map(|parcel| {
                let share = self.share(parcel)?;
                Ok(Allocation {
                    parcel_id: parcel.id,
                    share,
                    amount: charge * share,
                })
            })
            .collect()
    }

    /// A parcel's slice of a campus weekly rate
    pub fn weekly_charge(&self, parcel: &Parcel, campus_weekly_rate: f64) -> EnforcementResult<f64> {
        Ok(campus_weekly_rate * self.share(parcel)?)
    }

    pub fn billing_comparison(
        &self,
        parcel: &Parcel,
        campus_weekly_rate: f64,
        weeks_per_month: f64,
    ) -> EnforcementResult<BillingComparison> {
        let share = self.share(parcel)?;
        let pro_rata_weekly = campus_weekly_rate * share;
        let billed_weekly = parcel.billed_weekly_rate.unwrap_or(0.0);

        Ok(BillingComparison {
            parcel_id: parcel.id,
            share,
            pro_rata_weekly,
            billed_weekly,
            weekly_difference: pro_rata_weekly - billed_weekly,
            pro_rata_monthly: pro_rata_weekly * weeks_per_month,
            billed_monthly: billed_weekly * weeks_per_month,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
