// 💵 Rate Record - one campus-wide weekly fee rate effective from a date
//
// Rate history is append-only: a new rate is a new record with a later
// effective date, never an edit of an old one.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    pub label: String,
    pub effective_from: NaiveDate,
    /// Campus-wide weekly security fee
    pub weekly_rate: f64,
}

impl RateRecord {
    pub fn new(label: &str, effective_from: NaiveDate, weekly_rate: f64) -> Self {
        RateRecord {
            label: label.to_string(),
            effective_from,
            weekly_rate,
        }
    }
}
