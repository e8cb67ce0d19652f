// 📈 Rate Schedule - "what was the weekly rate in effect on date D?"
//
// A sorted lookup over the rate history, not a historic/current branch: a
// third or fourth rate change is just another record.

use chrono::NaiveDate;

use crate::entities::RateRecord;
use crate::error::{EnforcementError, EnforcementResult};

#[derive(Debug, Clone, PartialEq)]
pub struct RateSchedule {
    /// Sorted by effective_from, ascending, no duplicate dates
    records: Vec<RateRecord>,
}

impl RateSchedule {
    /// Build a schedule from rate records in any order.
    ///
    /// Rejects non-positive rates and two records sharing an effective date,
    /// since either would make "the rate on date D" ambiguous.
    pub fn new(mut records: Vec<RateRecord>) -> EnforcementResult<Self> {
        if let Some(bad) = records.iter().find(|r| !(r.weekly_rate > 0.0)) {
            return Err(EnforcementError::invariant(format!(
                "weekly rate effective {} must be positive, got {}",
                bad.effective_from, bad.weekly_rate
            )));
        }

        records.sort_by_key(|r| r.effective_from);

        if let Some(pair) = records
            .windows(2)
            .find(|pair| pair[0].effective_from == pair[1].effective_from)
        {
            return Err(EnforcementError::invariant(format!(
                "two rate records share effective date {}",
                pair[0].effective_from
            )));
        }

        Ok(RateSchedule { records })
    }

    /// Append a future rate change. Must be later than every existing record.
    pub fn append(&mut self, record: RateRecord) -> EnforcementResult<()> {
        if !(record.weekly_rate > 0.0) {
            return Err(EnforcementError::invariant(format!(
                "weekly rate effective {} must be positive, got {}",
                record.effective_from, record.weekly_rate
            )));
        }
        if let Some(last) = self.records.last() {
            if record.effective_from <= last.effective_from {
                return Err(EnforcementError::invariant(format!(
                    "rate history is append-only: {} is not after {}",
                    record.effective_from, last.effective_from
                )));
            }
        }
        self.records.push(record);
        Ok(())
    }

    /// The record with the latest effective date on or before `date`
    pub fn record_on(&self, date: NaiveDate) -> EnforcementResult<&RateRecord> {
        let idx = self.records.partition_point(|r| r.effective_from <= date);
        if idx == 0 {
            return Err(EnforcementError::NoApplicableRate { date });
        }
        Ok(&self.records[idx - 1])
    }

    /// Weekly rate in effect on `date`
    pub fn rate_on(&self, date: NaiveDate) -> EnforcementResult<f64> {
        self.record_on(date).map(|r| r.weekly_rate)
    }

    /// Earliest date any rate applies from
    pub fn earliest(&self) -> Option<NaiveDate> {
        self.records.first().map(|r| r.effective_from)
    }

    pub fn records(&self) -> &[RateRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================
