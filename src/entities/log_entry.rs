// 📜 Enforcement Log Entry - append-only audit record ("every change is an event")
//
// Entries are owned by the parcel they reference and are never mutated after
// creation. Each entry carries a SHA-256 digest of its content so a later
// edit of the stored row is detectable.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::ParcelStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnforcementLogEntry {
    /// Stable identity (UUID)
    pub entry_id: String,
    pub parcel_id: i64,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    /// Status the parcel moved into, when the action was a transition
    pub resulting_status: Option<ParcelStatus>,
    pub sent_via: Option<String>,
    pub response_due: Option<NaiveDate>,
    pub next_step: Option<String>,
    pub notes: Option<String>,
    pub digest: String,
}

impl EnforcementLogEntry {
    pub fn new(parcel_id: i64, action: &str) -> Self {
        let mut entry = EnforcementLogEntry {
            entry_id: uuid::Uuid::new_v4().to_string(),
            parcel_id,
            timestamp: Utc::now(),
            action: action.to_string(),
            resulting_status: None,
            sent_via: None,
            response_due: None,
            next_step: None,
            notes: None,
            digest: String::new(),
        };
        entry.digest = entry.compute_digest();
        entry
    }

    pub fn with_status(mut self, status: ParcelStatus) -> Self {
        self.resulting_status = Some(status);
        self.seal()
    }

    pub fn with_sent_via(mut self, sent_via: &str) -> Self {
        self.sent_via = Some(sent_via.to_string());
        self.seal()
    }

    pub fn with_response_due(mut self, due: NaiveDate) -> Self {
        self.response_due = Some(due);
        self.seal()
    }

    pub fn with_next_step(mut self, next_step: &str) -> Self {
        self.next_step = Some(next_step.to_string());
        self.seal()
    }

    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self.seal()
    }

    /// Backdate an entry, e.g. one carried over from an older store
    pub fn recorded_at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self.seal()
    }

    fn seal(mut self) -> Self {
        self.digest = self.compute_digest();
        self
    }

    /// Digest over every content field (not the digest itself)
    pub fn compute_digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{}|{}|{}|{}|{}|{}|{}|{}",
            self.entry_id,
            self.parcel_id,
            self.timestamp.to_rfc3339(),
            self.action,
            self.resulting_status.map(|s| s.as_str()).unwrap_or(""),
            self.sent_via.as_deref().unwrap_or(""),
            self.response_due.map(|d| d.to_string()).unwrap_or_default(),
            self.next_step.as_deref().unwrap_or(""),
            self.notes.as_deref().unwrap_or(""),
        ));
        format!("{:x}", hasher.finalize())
    }

    /// True when the stored digest still matches the content
    pub fn is_intact(&self) -> bool {
        self.digest == self.compute_digest()
    }
}
