// 🗄️ Parcel Store - what the core reads from and writes to
//
// The computation core never talks to SQLite directly. It reads parcels, rate
// records and credits through this trait and writes a parcel update together
// with its log entry through `commit`, which stores must apply all-or-nothing.

use std::collections::BTreeMap;

use crate::entities::{Credit, EnforcementLogEntry, Parcel, RateRecord};
use crate::error::{EnforcementError, EnforcementResult};

pub trait ParcelStore {
    /// One parcel, or `ParcelNotFound`
    fn parcel(&self, parcel_id: i64) -> EnforcementResult<Parcel>;

    /// Every parcel, ordered by id
    fn parcels(&self) -> EnforcementResult<Vec<Parcel>>;

    fn rates(&self) -> EnforcementResult<Vec<RateRecord>>;

    /// Credits for one parcel, or for the whole campus when `parcel_id` is None
    fn credits(&self, parcel_id: Option<i64>) -> EnforcementResult<Vec<Credit>>;

    /// Log entries, oldest first
    fn log_entries(&self, parcel_id: Option<i64>) -> EnforcementResult<Vec<EnforcementLogEntry>>;

    /// Replace a parcel and append its log entry in one unit of work
    fn commit(&mut self, parcel: &Parcel, entry: &EnforcementLogEntry) -> EnforcementResult<()>;

    /// Replace several parcels, each with its log entry, in one unit of work.
    /// If any parcel is unknown nothing is written.
    fn commit_batch(&mut self, changes: &[(Parcel, EnforcementLogEntry)]) -> EnforcementResult<()>;

    /// Append a log entry without touching the parcel. Unknown parcels are refused.
    fn append_log(&mut self, entry: &EnforcementLogEntry) -> EnforcementResult<()>;

    /// Record a credit and its log entry together. Unknown parcels are refused.
    fn record_credit(&mut self, credit: &Credit, entry: &EnforcementLogEntry) -> EnforcementResult<()>;
}

/// Refuse a log entry that doesn't belong to the parcel it is committed with
pub(crate) fn check_entry_matches(parcel_id: i64, entry: &EnforcementLogEntry) -> EnforcementResult<()> {
    if entry.parcel_id != parcel_id {
        return Err(EnforcementError::invariant(format!(
            "log entry for parcel {} committed with parcel {}",
            entry.parcel_id, parcel_id
        )));
    }
    Ok(())
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// Store backed by plain collections, for callers that don't need persistence
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    parcels: BTreeMap<i64, Parcel>,
    rates: Vec<RateRecord>,
    credits: Vec<Credit>,
    log: Vec<EnforcementLogEntry>,
}

impl MemoryStore {
    pub fn new(parcels: Vec<Parcel>, rates: Vec<RateRecord>) -> Self {
        MemoryStore {
            parcels: parcels.into_iter().map(|p| (p.id, p)).collect(),
            rates,
            credits: Vec::new(),
            log: Vec::new(),
        }
    }

    fn ensure_parcel(&self, parcel_id: i64) -> EnforcementResult<()> {
        if self.parcels.contains_key(&parcel_id) {
            Ok(())
        } else {
            Err(EnforcementError::ParcelNotFound { parcel_id })
        }
    }
}

impl ParcelStore for MemoryStore {
    fn parcel(&self, parcel_id: i64) -> EnforcementResult<Parcel> {
        self.parcels
            .get(&parcel_id)
            .cloned()
            .ok_or(EnforcementError::ParcelNotFound { parcel_id })
    }

    fn parcels(&self) -> EnforcementResult<Vec<Parcel>> {
        Ok(self.parcels.values().cloned().collect())
    }

    fn rates(&self) -> EnforcementResult<Vec<RateRecord>> {
        Ok(self.rates.clone())
    }

    fn credits(&self, parcel_id: Option<i64>) -> EnforcementResult<Vec<Credit>> {
        Ok(self
            .credits
            .iter()
            .filter(|c| parcel_id.map_or(true, |id| c.parcel_id == id))
            .cloned()
            .collect())
    }

    fn log_entries(&self, parcel_id: Option<i64>) -> EnforcementResult<Vec<EnforcementLogEntry>> {
        Ok(self
            .log
            .iter()
            .filter(|e| parcel_id.map_or(true, |id| e.parcel_id == id))
            .cloned()
            .collect())
    }

    fn commit(&mut self, parcel: &Parcel, entry: &EnforcementLogEntry) -> EnforcementResult<()> {
        self.ensure_parcel(parcel.id)?;
        check_entry_matches(parcel.id, entry)?;

        self.parcels.insert(parcel.id, parcel.clone());
        self.log.push(entry.clone());
        Ok(())
    }

    fn commit_batch(&mut self, changes: &[(Parcel, EnforcementLogEntry)]) -> EnforcementResult<()> {
        for (parcel, entry) in changes {
            self.ensure_parcel(parcel.id)?;
            check_entry_matches(parcel.id, entry)?;
        }

        for (parcel, entry) in changes {
            self.parcels.insert(parcel.id, parcel.clone());
            self.log.push(entry.clone());
        }
        Ok(())
    }

    fn append_log(&mut self, entry: &EnforcementLogEntry) -> EnforcementResult<()> {
        self.ensure_parcel(entry.parcel_id)?;
        self.log.push(entry.clone());
        Ok(())
    }

    fn record_credit(&mut self, credit: &Credit, entry: &EnforcementLogEntry) -> EnforcementResult<()> {
        self.ensure_parcel(credit.parcel_id)?;
        check_entry_matches(credit.parcel_id, entry)?;

        self.credits.push(credit.clone());
        self.log.push(entry.clone());
        Ok(())
    }
}
