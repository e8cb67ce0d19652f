// 💳 Credit - a payment or credit recorded against a parcel's arrears

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credit {
    pub parcel_id: i64,
    pub received_on: NaiveDate,
    pub amount: f64,
    pub memo: String,
}

impl Credit {
    pub fn new(parcel_id: i64, received_on: NaiveDate, amount: f64, memo: &str) -> Self {
        Credit {
            parcel_id,
            received_on,
            amount,
            memo: memo.to_string(),
        }
    }
}
