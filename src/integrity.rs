// 🔍 Integrity Checks - is the stored data still something the core can trust?
//
// Runs over a snapshot of parcels and log entries and reports findings; it
// never repairs anything. Critical findings mean some computed figure would
// be wrong (campus shares drifting from 1, a cure deadline that wasn't
// derived from its packet date, a tampered log row).

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::allocation::CampusAllocator;
use crate::enforcement::DeadlinePolicy;
use crate::entities::{EnforcementLogEntry, Parcel, ParcelStatus};
use crate::error::{EnforcementError, EnforcementResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Critical, // A computed figure would be wrong
    Warning,  // Questionable or incomplete
    Info,     // Worth a look
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub check: String,
    pub parcel_id: Option<i64>,
    pub message: String,
    pub recommendation: String,
}

impl Finding {
    fn new(severity: Severity, check: &str, parcel_id: Option<i64>, message: String, recommendation: &str) -> Self {
        Finding {
            severity,
            check: check.to_string(),
            parcel_id,
            message,
            recommendation: recommendation.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub parcels_checked: usize,
    pub log_entries_checked: usize,
    pub findings: Vec<Finding>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn critical_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Critical)
            .count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} parcels, {} log entries checked: {} findings ({} critical)",
            self.parcels_checked,
            self.log_entries_checked,
            self.findings.len(),
            self.critical_count()
        )
    }

    /// `InvariantViolation` naming every critical finding, or Ok when there are none
    pub fn into_result(self) -> EnforcementResult<IntegrityReport> {
        let critical: Vec<&str> = self
            .findings
            .iter()
            .filter(|f| f.severity == Severity::Critical)
            .map(|f| f.message.as_str())
            .collect();

        if critical.is_empty() {
            Ok(self)
        } else {
            Err(EnforcementError::invariant(critical.join("; ")))
        }
    }
}

pub struct IntegrityChecker {
    allocator: CampusAllocator,
    policy: DeadlinePolicy,
}

impl IntegrityChecker {
    pub fn new(allocator: CampusAllocator, policy: DeadlinePolicy) -> Self {
        IntegrityChecker { allocator, policy }
    }

    pub fn check(
        &self,
        parcels: &[Parcel],
        log: &[EnforcementLogEntry],
        legacy_layouts: &[String],
    ) -> IntegrityReport {
        let mut findings = Vec::new();

        for layout in legacy_layouts {
            findings.push(Finding::new(
                Severity::Critical,
                "legacy_layout",
                None,
                format!("second, incompatible store layout present: {}", layout),
                "Treat it as a one-time `import-legacy` source; never read it as a live store",
            ));
        }

        if let Err(err) = self.allocator.validate_campus(parcels) {
            findings.push(Finding::new(
                Severity::Critical,
                "campus_total",
                None,
                err.to_string(),
                "Correct parcel square footage so the campus sums to its recorded total",
            ));
        }

        for parcel in parcels {
            self.check_parcel(parcel, &mut findings);
        }

        for entry in log {
            if !parcels.iter().any(|p| p.id == entry.parcel_id) {
                findings.push(Finding::new(
                    Severity::Critical,
                    "log_reference",
                    Some(entry.parcel_id),
                    format!("log entry {} references unknown parcel {}", entry.entry_id, entry.parcel_id),
                    "Restore the parcel or archive the orphaned entry",
                ));
            }
            if !entry.is_intact() {
                findings.push(Finding::new(
                    Severity::Critical,
                    "log_digest",
                    Some(entry.parcel_id),
                    format!("log entry {} was modified after it was written", entry.entry_id),
                    "Restore the entry from backup; log rows are append-only",
                ));
            }
        }

        for finding in findings.iter().filter(|f| f.severity == Severity::Critical) {
            warn!(check = %finding.check, parcel_id = ?finding.parcel_id, "{}", finding.message);
        }

        IntegrityReport {
            parcels_checked: parcels.len(),
            log_entries_checked: log.len(),
            findings,
        }
    }

    fn check_parcel(&self, parcel: &Parcel, findings: &mut Vec<Finding>) {
        let id = Some(parcel.id);

        if parcel.sqft == 0 {
            findings.push(Finding::new(
                Severity::Critical,
                "sqft",
                id,
                format!("parcel {} has no square footage", parcel.id),
                "Enter the surveyed square footage",
            ));
        }

        if parcel.past_due_balance < 0.0 {
            findings.push(Finding::new(
                Severity::Critical,
                "balance",
                id,
                format!("parcel {} has a negative recorded balance", parcel.id),
                "Record overpayments as credits instead",
            ));
        }

        match (parcel.packet_sent, parcel.cure_deadline) {
            (None, Some(cure)) => findings.push(Finding::new(
                Severity::Critical,
                "cure_deadline",
                id,
                format!("parcel {} has cure deadline {} but no packet-sent date", parcel.id, cure),
                "Record the packet-sent date; cure deadlines are derived from it",
            )),
            (Some(sent), cure) => {
                let expected = self.policy.derive(sent, parcel.cure_track);
                if cure != Some(expected.cure_deadline) {
                    findings.push(Finding::new(
                        Severity::Critical,
                        "cure_deadline",
                        id,
                        format!(
                            "parcel {} cure deadline {:?} does not match packet sent {} + {} days",
                            parcel.id,
                            cure,
                            sent,
                            self.policy.cure_days(parcel.cure_track)
                        ),
                        "Re-record the packet-sent date to re-derive deadlines",
                    ));
                }
                if parcel.lien_filing_date != Some(expected.lien_filing_date)
                    || parcel.attorney_referral_date != Some(expected.attorney_referral_date)
                {
                    findings.push(Finding::new(
                        Severity::Warning,
                        "derived_dates",
                        id,
                        format!("parcel {} lien/attorney dates do not match its packet-sent date", parcel.id),
                        "Re-record the packet-sent date to re-derive deadlines",
                    ));
                }
            }
            (None, None) => {}
        }

        if parcel.status == ParcelStatus::Settled && parcel.settlement_amount.is_none() {
            findings.push(Finding::new(
                Severity::Warning,
                "settlement",
                id,
                format!("parcel {} is SETTLED with no settlement amount", parcel.id),
                "Record the agreed amount in the enforcement log",
            ));
        }

        if parcel.status.is_enforceable() && parcel.delinquent_since.is_none() && parcel.past_due_balance == 0.0 {
            findings.push(Finding::new(
                Severity::Info,
                "balance_unknown",
                id,
                format!("parcel {} is {} with no accrual start and no recorded balance", parcel.id, parcel.status),
                "Set delinquent_since or past_due_balance",
            ));
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
