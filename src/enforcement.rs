// 🚦 Enforcement State Machine - status transitions and legal deadlines
//
// Statuses: CURRENT, DELINQUENT, DISPUTED, RECON, VERIFY, SETTLED.
// SETTLED is terminal; the others reach each other only through an explicit
// operator or collaborator action. Deadlines are derived from the packet-sent
// date and are only ever *reported* (overdue, lien eligible), never acted on.
//
// Every mutating operation is planned as a pure function returning the new
// parcel and its single log entry, then committed through the store in one
// unit of work. A failed plan touches nothing.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

use crate::arrears::ArrearsCalculator;
use crate::config::EnforcementConfig;
use crate::entities::{
    Credit, CureTrack, DeadlineKind, EnforcementLogEntry, EnforcementStep, Parcel, ParcelStatus,
};
use crate::error::{EnforcementError, EnforcementResult};
use crate::settlement::SettlementEngine;
use crate::store::ParcelStore;

// ============================================================================
// DEADLINE POLICY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeadlinePolicy {
    pub declaration_cure_days: i64,
    pub demand_letter_cure_days: i64,
    pub lien_filing_offset_days: i64,
    pub attorney_referral_offset_days: i64,
    pub lien_cutoff: NaiveDate,
    pub due_soon_days: i64,
    pub urgent_days: i64,
}

impl DeadlinePolicy {
    pub fn from_config(config: &EnforcementConfig) -> Self {
        DeadlinePolicy {
            declaration_cure_days: config.declaration_cure_days,
            demand_letter_cure_days: config.demand_letter_cure_days,
            lien_filing_offset_days: config.lien_filing_offset_days,
            attorney_referral_offset_days: config.attorney_referral_offset_days,
            lien_cutoff: config.lien_cutoff,
            due_soon_days: config.due_soon_days,
            urgent_days: config.urgent_days,
        }
    }

    pub fn cure_days(&self, track: CureTrack) -> i64 {
        match track {
            CureTrack::Declaration => self.declaration_cure_days,
            CureTrack::DemandLetter => self.demand_letter_cure_days,
        }
    }

    /// Cure, lien-filing and attorney-referral dates for a packet sent on `sent_on`
    pub fn derive(&self, sent_on: NaiveDate, track: CureTrack) -> DerivedDeadlines {
        DerivedDeadlines {
            cure_deadline: sent_on + chrono::Duration::days(self.cure_days(track)),
            lien_filing_date: sent_on + chrono::Duration::days(self.lien_filing_offset_days),
            attorney_referral_date: sent_on + chrono::Duration::days(self.attorney_referral_offset_days),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedDeadlines {
    pub cure_deadline: NaiveDate,
    pub lien_filing_date: NaiveDate,
    pub attorney_referral_date: NaiveDate,
}

// ============================================================================
// QUERY RESULTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeadlineStatus {
    NotDue,
    DueSoon,
    Overdue,
    LienEligible,
}

impl DeadlineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeadlineStatus::NotDue => "not-due",
            DeadlineStatus::DueSoon => "due-soon",
            DeadlineStatus::Overdue => "overdue",
            DeadlineStatus::LienEligible => "lien-eligible",
        }
    }
}

impl fmt::Display for DeadlineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something the operator should look at. Flags only; nothing is mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PendingAction {
    /// A CURRENT parcel carries arrears and could be marked DELINQUENT
    MarkDelinquent { arrears: f64 },
    /// The cure period ran out with a balance still owed
    CureExpired { deadline: NaiveDate, balance: f64 },
    /// The lien-filing cutoff has passed with a balance still owed
    LienEligible { balance: f64 },
}

impl PendingAction {
    pub fn describe(&self) -> String {
        match self {
            PendingAction::MarkDelinquent { arrears } => {
                format!("Arrears of ${:.2} on a CURRENT parcel: consider DELINQUENT", arrears)
            }
            PendingAction::CureExpired { deadline, balance } => {
                format!("Cure period ended {} with ${:.2} still owed", deadline, balance)
            }
            PendingAction::LienEligible { balance } => {
                format!("Lien may be filed for ${:.2}", balance)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeadlineBucket {
    Overdue,
    Urgent,
    Soon,
    Later,
}

impl DeadlineBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeadlineBucket::Overdue => "OVERDUE",
            DeadlineBucket::Urgent => "URGENT",
            DeadlineBucket::Soon => "SOON",
            DeadlineBucket::Later => "",
        }
    }
}

/// One row of the deadline board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadlineEntry {
    pub parcel_id: i64,
    pub business_name: String,
    pub address: String,
    pub kind: DeadlineKind,
    pub date: NaiveDate,
    pub days_left: i64,
    pub bucket: DeadlineBucket,
    pub tracking: Option<String>,
}

// ============================================================================
// TRANSITION CONTEXT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransitionContext {
    pub as_of: NaiveDate,
    /// Required when moving into SETTLED
    pub settlement_amount: Option<f64>,
    /// Validate the settlement against this tier instead of the policy floor
    pub settlement_tier: Option<String>,
    /// Accrual start to record when a parcel goes DELINQUENT
    pub delinquent_since: Option<NaiveDate>,
    pub note: Option<String>,
}

impl TransitionContext {
    pub fn new(as_of: NaiveDate) -> Self {
        TransitionContext {
            as_of,
            ..Default::default()
        }
    }

    pub fn with_settlement(mut self, amount: f64) -> Self {
        self.settlement_amount = Some(amount);
        self
    }

    pub fn with_tier(mut self, tier: &str) -> Self {
        self.settlement_tier = Some(tier.to_string());
        self
    }

    pub fn with_delinquent_since(mut self, since: NaiveDate) -> Self {
        self.delinquent_since = Some(since);
        self
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }
}

// ============================================================================
// OPERATOR-EDITABLE FIELDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParcelField {
    NextAction,
    NextActionDeadline,
    Notes,
    EntityOwner,
    CorporateTarget,
    PastDueBalance,
    BilledWeeklyRate,
    DelinquentSince,
    EnforcementStep,
    CountyParcelId,
    MailingAddress,
    LenderName,
    LenderAddress,
    DeedOfTrustRef,
    LenderContact,
    LoanNumber,
    TitleCompany,
    AddressVerified,
    LenderVerified,
}

impl ParcelField {
    pub const ALL: [ParcelField; 19] = [
        ParcelField::NextAction,
        ParcelField::NextActionDeadline,
        ParcelField::Notes,
        ParcelField::EntityOwner,
        ParcelField::CorporateTarget,
        ParcelField::PastDueBalance,
        ParcelField::BilledWeeklyRate,
        ParcelField::DelinquentSince,
        ParcelField::EnforcementStep,
        ParcelField::CountyParcelId,
        ParcelField::MailingAddress,
        ParcelField::LenderName,
        ParcelField::LenderAddress,
        ParcelField::DeedOfTrustRef,
        ParcelField::LenderContact,
        ParcelField::LoanNumber,
        ParcelField::TitleCompany,
        ParcelField::AddressVerified,
        ParcelField::LenderVerified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParcelField::NextAction => "next_action",
            ParcelField::NextActionDeadline => "next_action_deadline",
            ParcelField::Notes => "notes",
            ParcelField::EntityOwner => "entity_owner",
            ParcelField::CorporateTarget => "corporate_target",
            ParcelField::PastDueBalance => "past_due_balance",
            ParcelField::BilledWeeklyRate => "billed_weekly_rate",
            ParcelField::DelinquentSince => "delinquent_since",
            ParcelField::EnforcementStep => "enforcement_step",
            ParcelField::CountyParcelId => "county_parcel_id",
            ParcelField::MailingAddress => "mailing_address",
            ParcelField::LenderName => "lender_name",
            ParcelField::LenderAddress => "lender_address",
            ParcelField::DeedOfTrustRef => "deed_of_trust_ref",
            ParcelField::LenderContact => "lender_contact",
            ParcelField::LoanNumber => "loan_number",
            ParcelField::TitleCompany => "title_company",
            ParcelField::AddressVerified => "address_verified",
            ParcelField::LenderVerified => "lender_verified",
        }
    }

    /// Fields filled in from county assessor and register of deeds research
    pub fn is_lender_research(&self) -> bool {
        matches!(
            self,
            ParcelField::CountyParcelId
                | ParcelField::MailingAddress
                | ParcelField::LenderName
                | ParcelField::LenderAddress
                | ParcelField::DeedOfTrustRef
                | ParcelField::LenderContact
                | ParcelField::LoanNumber
                | ParcelField::TitleCompany
                | ParcelField::AddressVerified
                | ParcelField::LenderVerified
        )
    }
}

impl FromStr for ParcelField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_");
        ParcelField::ALL
            .iter()
            .copied()
            .find(|f| f.as_str().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| {
                let names: Vec<_> = ParcelField::ALL.iter().map(|f| f.as_str()).collect();
                format!("unknown field '{}' (editable: {})", s, names.join(", "))
            })
    }
}

/// A parcel's square footage as measured by a re-survey
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyedArea {
    pub parcel_id: i64,
    pub sqft: u32,
}

impl SurveyedArea {
    pub fn new(parcel_id: i64, sqft: u32) -> Self {
        SurveyedArea { parcel_id, sqft }
    }
}

impl FromStr for SurveyedArea {
    type Err = String;

    /// `ID=SQFT`, e.g. `10=125760` or `10=125,760`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, sqft) = s
            .split_once('=')
            .ok_or_else(|| format!("expected ID=SQFT, got '{}'", s))?;
        let parcel_id = id
            .trim()
            .parse()
            .map_err(|_| format!("bad parcel id in '{}'", s))?;
        let sqft = sqft
            .trim()
            .replace(',', "")
            .parse()
            .map_err(|_| format!("sqft must be a whole number in '{}'", s))?;
        Ok(SurveyedArea { parcel_id, sqft })
    }
}

fn parse_date(field: ParcelField, value: &str) -> EnforcementResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        EnforcementError::invariant(format!("{} must be a YYYY-MM-DD date, got '{}'", field.as_str(), value))
    })
}

fn parse_amount(field: ParcelField, value: &str) -> EnforcementResult<f64> {
    let cleaned = value.trim().replace(['$', ','], "");
    match cleaned.parse::<f64>() {
        Ok(amount) if amount >= 0.0 && amount.is_finite() => Ok(amount),
        _ => Err(EnforcementError::invariant(format!(
            "{} must be a non-negative amount, got '{}'",
            field.as_str(),
            value
        ))),
    }
}

fn parse_flag(field: ParcelField, value: &str) -> EnforcementResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "yes" | "y" | "true" | "1" => Ok(true),
        "no" | "n" | "false" | "0" | "" => Ok(false),
        _ => Err(EnforcementError::invariant(format!(
            "{} must be yes or no, got '{}'",
            field.as_str(),
            value
        ))),
    }
}

fn optional_text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ============================================================================
// STATE MACHINE
// ============================================================================

pub struct EnforcementStateMachine<'a> {
    arrears: &'a ArrearsCalculator,
    settlement: &'a SettlementEngine,
    policy: DeadlinePolicy,
}

impl<'a> EnforcementStateMachine<'a> {
    pub fn new(arrears: &'a ArrearsCalculator, settlement: &'a SettlementEngine, policy: DeadlinePolicy) -> Self {
        EnforcementStateMachine {
            arrears,
            settlement,
            policy,
        }
    }

    pub fn policy(&self) -> &DeadlinePolicy {
        &self.policy
    }

    fn illegal(from: ParcelStatus, to: ParcelStatus, reason: impl Into<String>) -> EnforcementError {
        EnforcementError::IllegalTransition {
            from,
            to,
            reason: reason.into(),
        }
    }

    /// Plan a status change without touching any store
    pub fn plan_transition(
        &self,
        parcel: &Parcel,
        credits: &[Credit],
        target: ParcelStatus,
        ctx: &TransitionContext,
    ) -> EnforcementResult<(Parcel, EnforcementLogEntry)> {
        let from = parcel.status;

        if from.is_terminal() {
            return Err(Self::illegal(from, target, "SETTLED is terminal"));
        }
        if from == target {
            return Err(Self::illegal(from, target, "parcel is already in that status"));
        }

        let mut updated = parcel.clone();
        updated.status = target;
        let mut action = format!("Status {} -> {}", from, target);

        match target {
            ParcelStatus::Settled => {
                let proposed = ctx
                    .settlement_amount
                    .ok_or_else(|| Self::illegal(from, target, "a settlement amount is required"))?;
                let owed = self.arrears.compute(parcel, credits, ctx.as_of)?.amount;

                match &ctx.settlement_tier {
                    Some(tier) => self.settlement.validate_for_tier(owed, proposed, tier)?,
                    None => self.settlement.validate_against_policy(owed, proposed)?,
                }

                updated.settlement_amount = Some(proposed);
                updated.settled_on = Some(ctx.as_of);
                updated.enforcement_step = EnforcementStep::Resolved;
                updated.next_action = None;
                updated.next_action_deadline = None;
                action = format!("{} (settled for ${:.2} of ${:.2})", action, proposed, owed);
            }
            ParcelStatus::Delinquent => {
                if let Some(since) = ctx.delinquent_since {
                    updated.delinquent_since = Some(since);
                }
                if from == ParcelStatus::Current {
                    let owed = self.arrears.compute(&updated, credits, ctx.as_of)?.amount;
                    if owed <= 0.0 {
                        return Err(Self::illegal(
                            from,
                            target,
                            format!("no arrears outstanding as of {}", ctx.as_of),
                        ));
                    }
                    updated.enforcement_step = EnforcementStep::Research;
                }
            }
            ParcelStatus::Current => {
                updated.enforcement_step = EnforcementStep::Paying;
            }
            ParcelStatus::Disputed | ParcelStatus::Recon | ParcelStatus::Verify => {}
        }

        let mut entry = EnforcementLogEntry::new(parcel.id, &action).with_status(target);
        if let Some(note) = &ctx.note {
            entry = entry.with_notes(note);
        }

        Ok((updated, entry))
    }

    /// Move a parcel to a new status and record it
    pub fn transition<S: ParcelStore>(
        &self,
        store: &mut S,
        parcel_id: i64,
        target: ParcelStatus,
        ctx: &TransitionContext,
    ) -> EnforcementResult<EnforcementLogEntry> {
        let parcel = store.parcel(parcel_id)?;
        let credits = store.credits(Some(parcel_id))?;

        let (updated, entry) = self.plan_transition(&parcel, &credits, target, ctx)?;
        store.commit(&updated, &entry)?;

        info!(parcel_id, from = %parcel.status, to = %target, "parcel status changed");
        Ok(entry)
    }

    /// Plan the packet-sent update: derived deadlines, step and next action.
    /// Status is left alone.
    pub fn plan_packet_sent(
        &self,
        parcel: &Parcel,
        sent_on: NaiveDate,
        tracking: Option<&str>,
        track: Option<CureTrack>,
    ) -> EnforcementResult<(Parcel, EnforcementLogEntry)> {
        if !parcel.status.is_enforceable() {
            return Err(Self::illegal(
                parcel.status,
                parcel.status,
                "a demand packet can only be sent to a parcel under enforcement",
            ));
        }

        let track = track.unwrap_or(parcel.cure_track);
        let deadlines = self.policy.derive(sent_on, track);

        let mut updated = parcel.clone();
        updated.packet_sent = Some(sent_on);
        updated.cure_track = track;
        if let Some(number) = tracking.and_then(optional_text) {
            updated.certified_mail_tracking = Some(number);
        }
        updated.cure_deadline = Some(deadlines.cure_deadline);
        updated.lien_filing_date = Some(deadlines.lien_filing_date);
        updated.attorney_referral_date = Some(deadlines.attorney_referral_date);
        updated.enforcement_step = EnforcementStep::DemandSent;
        updated.next_action = Some(format!("Await cure by {}", deadlines.cure_deadline));
        updated.next_action_deadline = Some(deadlines.cure_deadline);

        let tracking_note = updated
            .certified_mail_tracking
            .as_deref()
            .map(|t| format!(", tracking: {}", t))
            .unwrap_or_default();

        let entry = EnforcementLogEntry::new(parcel.id, &format!("Demand packet sent on {}{}", sent_on, tracking_note))
            .with_sent_via("USPS Certified")
            .with_response_due(deadlines.cure_deadline)
            .with_next_step(&format!(
                "Cure by {}, lien by {}, attorney by {}",
                deadlines.cure_deadline, deadlines.lien_filing_date, deadlines.attorney_referral_date
            ))
            .with_notes(&format!(
                "{}-day cure ({})",
                self.policy.cure_days(track),
                track.as_str()
            ));

        Ok((updated, entry))
    }

    pub fn record_packet_sent<S: ParcelStore>(
        &self,
        store: &mut S,
        parcel_id: i64,
        sent_on: NaiveDate,
        tracking: Option<&str>,
        track: Option<CureTrack>,
    ) -> EnforcementResult<EnforcementLogEntry> {
        let parcel = store.parcel(parcel_id)?;
        let (updated, entry) = self.plan_packet_sent(&parcel, sent_on, tracking, track)?;
        store.commit(&updated, &entry)?;

        info!(
            parcel_id,
            %sent_on,
            cure_deadline = ?updated.cure_deadline,
            "demand packet recorded"
        );
        Ok(entry)
    }

    /// Plan an operator edit of one field. An empty value clears optional fields.
    pub fn plan_field_update(
        &self,
        parcel: &Parcel,
        field: ParcelField,
        value: &str,
    ) -> EnforcementResult<(Parcel, EnforcementLogEntry)> {
        if parcel.status.is_terminal() {
            return Err(Self::illegal(
                parcel.status,
                parcel.status,
                "a SETTLED parcel can no longer be edited",
            ));
        }

        let mut updated = parcel.clone();
        match field {
            ParcelField::NextAction => updated.next_action = optional_text(value),
            ParcelField::NextActionDeadline => {
                updated.next_action_deadline = match optional_text(value) {
                    Some(v) => Some(parse_date(field, &v)?),
                    None => None,
                }
            }
            ParcelField::Notes => updated.notes = optional_text(value),
            ParcelField::EntityOwner => updated.entity_owner = value.trim().to_string(),
            ParcelField::CorporateTarget => updated.corporate_target = value.trim().to_string(),
            ParcelField::PastDueBalance => updated.past_due_balance = parse_amount(field, value)?,
            ParcelField::BilledWeeklyRate => {
                updated.billed_weekly_rate = match optional_text(value) {
                    Some(v) => Some(parse_amount(field, &v)?),
                    None => None,
                }
            }
            ParcelField::DelinquentSince => {
                updated.delinquent_since = match optional_text(value) {
                    Some(v) => Some(parse_date(field, &v)?),
                    None => None,
                }
            }
            ParcelField::EnforcementStep => {
                updated.enforcement_step = value
                    .parse()
                    .map_err(|e: String| EnforcementError::invariant(e))?;
            }
            ParcelField::CountyParcelId => updated.county_parcel_id = optional_text(value),
            ParcelField::MailingAddress => updated.mailing_address = optional_text(value),
            ParcelField::LenderName => updated.lender_name = optional_text(value),
            ParcelField::LenderAddress => updated.lender_address = optional_text(value),
            ParcelField::DeedOfTrustRef => updated.deed_of_trust_ref = optional_text(value),
            ParcelField::LenderContact => updated.lender_contact = optional_text(value),
            ParcelField::LoanNumber => updated.loan_number = optional_text(value),
            ParcelField::TitleCompany => updated.title_company = optional_text(value),
            ParcelField::AddressVerified => updated.address_verified = parse_flag(field, value)?,
            ParcelField::LenderVerified => updated.lender_verified = parse_flag(field, value)?,
        }

        let shown = if value.trim().is_empty() { "(cleared)" } else { value.trim() };
        let entry = EnforcementLogEntry::new(parcel.id, &format!("Updated {} = {}", field.as_str(), shown));
        Ok((updated, entry))
    }

    pub fn update_field<S: ParcelStore>(
        &self,
        store: &mut S,
        parcel_id: i64,
        field: ParcelField,
        value: &str,
    ) -> EnforcementResult<EnforcementLogEntry> {
        let parcel = store.parcel(parcel_id)?;
        let (updated, entry) = self.plan_field_update(&parcel, field, value)?;
        store.commit(&updated, &entry)?;

        info!(parcel_id, field = field.as_str(), "parcel field updated");
        Ok(entry)
    }

    /// Plan a re-survey that moves square footage between parcels.
    ///
    /// Parcel areas only change together: the campus must still add up to
    /// its recorded total once every measured area is applied. Parcels whose
    /// area is unchanged get no log entry.
    pub fn plan_resurvey(
        &self,
        parcels: &[Parcel],
        areas: &[SurveyedArea],
    ) -> EnforcementResult<Vec<(Parcel, EnforcementLogEntry)>> {
        let mut campus = parcels.to_vec();
        let mut changes = Vec::new();

        for (i, area) in areas.iter().enumerate() {
            if areas[..i].iter().any(|a| a.parcel_id == area.parcel_id) {
                return Err(EnforcementError::invariant(format!(
                    "parcel {} is measured more than once",
                    area.parcel_id
                )));
            }
            if area.sqft == 0 {
                return Err(EnforcementError::invariant(format!(
                    "parcel {} square footage must be positive",
                    area.parcel_id
                )));
            }

            let parcel = campus
                .iter_mut()
                .find(|p| p.id == area.parcel_id)
                .ok_or(EnforcementError::ParcelNotFound {
                    parcel_id: area.parcel_id,
                })?;
            if parcel.status.is_terminal() {
                return Err(Self::illegal(
                    parcel.status,
                    parcel.status,
                    "a SETTLED parcel can no longer be edited",
                ));
            }
            if parcel.sqft == area.sqft {
                continue;
            }

            let entry = EnforcementLogEntry::new(
                parcel.id,
                &format!("Re-survey: sqft {} -> {}", parcel.sqft, area.sqft),
            );
            parcel.sqft = area.sqft;
            changes.push((parcel.clone(), entry));
        }

        if changes.is_empty() {
            return Err(EnforcementError::invariant("re-survey changes no parcel area"));
        }
        self.arrears.allocator().validate_campus(&campus)?;
        Ok(changes)
    }

    pub fn resurvey<S: ParcelStore>(
        &self,
        store: &mut S,
        areas: &[SurveyedArea],
    ) -> EnforcementResult<Vec<EnforcementLogEntry>> {
        let parcels = store.parcels()?;
        let changes = self.plan_resurvey(&parcels, areas)?;
        store.commit_batch(&changes)?;

        info!(parcels = changes.len(), "re-survey applied");
        Ok(changes.into_iter().map(|(_, entry)| entry).collect())
    }

    /// Record a manual enforcement action (call, letter, meeting) with no field changes
    pub fn log_action<S: ParcelStore>(
        &self,
        store: &mut S,
        parcel_id: i64,
        action: &str,
        sent_via: Option<&str>,
        notes: Option<&str>,
    ) -> EnforcementResult<EnforcementLogEntry> {
        // Existence check first so no entry is ever built for an unknown parcel
        store.parcel(parcel_id)?;

        let mut entry = EnforcementLogEntry::new(parcel_id, action);
        if let Some(via) = sent_via.and_then(optional_text) {
            entry = entry.with_sent_via(&via);
        }
        if let Some(text) = notes.and_then(optional_text) {
            entry = entry.with_notes(&text);
        }
        store.append_log(&entry)?;
        Ok(entry)
    }

    /// Record a payment or credit against a parcel
    pub fn record_credit<S: ParcelStore>(&self, store: &mut S, credit: &Credit) -> EnforcementResult<EnforcementLogEntry> {
        store.parcel(credit.parcel_id)?;
        if !(credit.amount > 0.0) {
            return Err(EnforcementError::invariant(format!(
                "credit amount must be positive, got {}",
                credit.amount
            )));
        }

        let mut entry = EnforcementLogEntry::new(
            credit.parcel_id,
            &format!("Credit of ${:.2} received {}", credit.amount, credit.received_on),
        );
        if !credit.memo.is_empty() {
            entry = entry.with_notes(&credit.memo);
        }
        store.record_credit(credit, &entry)?;

        info!(parcel_id = credit.parcel_id, amount = credit.amount, "credit recorded");
        Ok(entry)
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Where a parcel stands against its deadlines as of a date
    pub fn deadline_status(
        &self,
        parcel: &Parcel,
        credits: &[Credit],
        as_of: NaiveDate,
    ) -> EnforcementResult<DeadlineStatus> {
        let balance = self.arrears.compute(parcel, credits, as_of)?.amount;
        Ok(self.status_for_balance(parcel, balance, as_of))
    }

    /// `deadline_status` with an already computed balance
    pub fn status_for_balance(&self, parcel: &Parcel, balance: f64, as_of: NaiveDate) -> DeadlineStatus {
        if balance <= 0.0 {
            return DeadlineStatus::NotDue;
        }
        if as_of >= self.policy.lien_cutoff {
            return DeadlineStatus::LienEligible;
        }

        let earliest = match parcel.deadlines().iter().map(|(_, date)| *date).min() {
            Some(date) => date,
            None => return DeadlineStatus::NotDue,
        };

        if earliest < as_of {
            DeadlineStatus::Overdue
        } else if (earliest - as_of).num_days() <= self.policy.due_soon_days {
            DeadlineStatus::DueSoon
        } else {
            DeadlineStatus::NotDue
        }
    }

    /// Transitions or filings the operator should consider
    pub fn pending_actions(
        &self,
        parcel: &Parcel,
        credits: &[Credit],
        as_of: NaiveDate,
    ) -> EnforcementResult<Vec<PendingAction>> {
        let balance = self.arrears.compute(parcel, credits, as_of)?.amount;
        let mut actions = Vec::new();

        if balance <= 0.0 {
            return Ok(actions);
        }

        if parcel.status == ParcelStatus::Current {
            actions.push(PendingAction::MarkDelinquent { arrears: balance });
        }
        if let Some(deadline) = parcel.cure_deadline {
            if deadline < as_of {
                actions.push(PendingAction::CureExpired { deadline, balance });
            }
        }
        if as_of >= self.policy.lien_cutoff && parcel.status.is_enforceable() {
            actions.push(PendingAction::LienEligible { balance });
        }

        Ok(actions)
    }

    /// Flattened cure / lien / attorney deadlines for every parcel with a packet sent
    pub fn deadline_board(&self, parcels: &[Parcel], as_of: NaiveDate) -> Vec<DeadlineEntry> {
        let mut board: Vec<DeadlineEntry> = parcels
            .iter()
            .filter(|p| p.packet_sent.is_some() && !p.status.is_terminal())
            .flat_map(|p| {
                p.deadlines()
                    .into_iter()
                    .filter(|(kind, _)| *kind != DeadlineKind::NextAction)
                    .map(move |(kind, date)| {
                        let days_left = (date - as_of).num_days();
                        DeadlineEntry {
                            parcel_id: p.id,
                            business_name: p.business_name.clone(),
                            address: p.address.clone(),
                            kind,
                            date,
                            days_left,
                            bucket: self.bucket(days_left),
                            tracking: p.certified_mail_tracking.clone(),
                        }
                    })
            })
            .collect();

        board.sort_by(|a, b| (a.date, a.parcel_id, a.kind).cmp(&(b.date, b.parcel_id, b.kind)));
        board
    }

    fn bucket(&self, days_left: i64) -> DeadlineBucket {
        if days_left < 0 {
            DeadlineBucket::Overdue
        } else if days_left <= self.policy.urgent_days {
            DeadlineBucket::Urgent
        } else if days_left <= self.policy.due_soon_days {
            DeadlineBucket::Soon
        } else {
            DeadlineBucket::Later
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::seed::campus_parcels;

    // Seed ids
    const SUMMIT: i64 = 10;
    const POINTE: i64 = 12;
    const WATERS: i64 = 1;
    const KG: i64 = 19;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct Fixture {
        arrears: ArrearsCalculator,
        settlement: SettlementEngine,
        policy: DeadlinePolicy,
        store: MemoryStore,
    }

    impl Fixture {
        fn new() -> Self {
            let config = EnforcementConfig::default();
            Fixture {
                arrears: ArrearsCalculator::from_config(&config).unwrap(),
                settlement: SettlementEngine::from_config(&config),
                policy: DeadlinePolicy::from_config(&config),
                store: MemoryStore::new(campus_parcels(), config.rates.clone()),
            }
        }

        fn split(&mut self) -> (EnforcementStateMachine<'_>, &mut MemoryStore) {
            (
                EnforcementStateMachine::new(&self.arrears, &self.settlement, self.policy),
                &mut self.store,
            )
        }
    }

    #[test]
    fn test_settling_for_more_than_owed_fails_and_changes_nothing() {
        let mut fx = Fixture::new();
        let as_of = date(2026, 2, 1);
        let owed = {
            let parcel = fx.store.parcel(POINTE).unwrap();
            fx.arrears.compute(&parcel, &[], as_of).unwrap().amount
        };
        let (machine, store) = fx.split();

        let ctx = TransitionContext::new(as_of).with_settlement(owed * 1.1);
        let err = machine
            .transition(store, POINTE, ParcelStatus::Settled, &ctx)
            .unwrap_err();

        assert!(matches!(err, EnforcementError::InvalidSettlement { .. }));
        assert_eq!(store.parcel(POINTE).unwrap().status, ParcelStatus::Delinquent);
        assert!(store.log_entries(None).unwrap().is_empty());
    }

    #[test]
    fn test_settlement_is_recorded_and_terminal() {
        let mut fx = Fixture::new();
        let as_of = date(2026, 2, 1);
        let owed = {
            let parcel = fx.store.parcel(POINTE).unwrap();
            fx.arrears.compute(&parcel, &[], as_of).unwrap().amount
        };
        let (machine, store) = fx.split();

        let ctx = TransitionContext::new(as_of).with_settlement(owed * 0.8);
        let entry = machine
            .transition(store, POINTE, ParcelStatus::Settled, &ctx)
            .unwrap();
        assert_eq!(entry.resulting_status, Some(ParcelStatus::Settled));

        let settled = store.parcel(POINTE).unwrap();
        assert_eq!(settled.status, ParcelStatus::Settled);
        assert_eq!(settled.settled_on, Some(as_of));
        assert_eq!(settled.enforcement_step, EnforcementStep::Resolved);

        let err = machine
            .transition(store, POINTE, ParcelStatus::Delinquent, &TransitionContext::new(as_of))
            .unwrap_err();
        assert!(matches!(err, EnforcementError::IllegalTransition { .. }));
        assert_eq!(store.log_entries(Some(POINTE)).unwrap().len(), 1);
    }

    #[test]
    fn test_settlement_below_floor() {
        let mut fx = Fixture::new();
        let as_of = date(2026, 2, 1);
        let (machine, store) = fx.split();

        let ctx = TransitionContext::new(as_of).with_settlement(1.0);
        let err = machine
            .transition(store, SUMMIT, ParcelStatus::Settled, &ctx)
            .unwrap_err();
        assert!(matches!(err, EnforcementError::BelowPolicyFloor { .. }));

        let ctx = TransitionContext::new(as_of);
        let err = machine
            .transition(store, SUMMIT, ParcelStatus::Settled, &ctx)
            .unwrap_err();
        assert!(matches!(err, EnforcementError::IllegalTransition { .. }));
    }

    #[test]
    fn test_unknown_parcel() {
        let mut fx = Fixture::new();
        let (machine, store) = fx.split();
        let err = machine
            .transition(store, 404, ParcelStatus::Recon, &TransitionContext::new(date(2026, 2, 1)))
            .unwrap_err();
        assert_eq!(err, EnforcementError::ParcelNotFound { parcel_id: 404 });
    }

    #[test]
    fn test_operator_moves_append_exactly_one_entry_each() {
        let mut fx = Fixture::new();
        let (machine, store) = fx.split();
        let ctx = TransitionContext::new(date(2026, 2, 1)).with_note("Entity unclear");

        machine.transition(store, SUMMIT, ParcelStatus::Recon, &ctx).unwrap();
        machine.transition(store, SUMMIT, ParcelStatus::Verify, &ctx).unwrap();
        machine.transition(store, SUMMIT, ParcelStatus::Disputed, &ctx).unwrap();

        let log = store.log_entries(Some(SUMMIT)).unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].action, "Status DELINQUENT -> RECON");
        assert_eq!(log[2].resulting_status, Some(ParcelStatus::Disputed));
        assert_eq!(log[1].notes.as_deref(), Some("Entity unclear"));
    }

    #[test]
    fn test_same_status_is_illegal() {
        let mut fx = Fixture::new();
        let (machine, store) = fx.split();
        let err = machine
            .transition(store, SUMMIT, ParcelStatus::Delinquent, &TransitionContext::new(date(2026, 2, 1)))
            .unwrap_err();
        assert!(matches!(err, EnforcementError::IllegalTransition { .. }));
    }

    #[test]
    fn test_current_to_delinquent_needs_arrears() {
        let mut fx = Fixture::new();
        let as_of = date(2026, 2, 1);
        let (machine, store) = fx.split();

        let err = machine
            .transition(store, WATERS, ParcelStatus::Delinquent, &TransitionContext::new(as_of))
            .unwrap_err();
        assert!(matches!(err, EnforcementError::IllegalTransition { .. }));

        let ctx = TransitionContext::new(as_of).with_delinquent_since(date(2026, 1, 1));
        machine
            .transition(store, WATERS, ParcelStatus::Delinquent, &ctx)
            .unwrap();

        let parcel = store.parcel(WATERS).unwrap();
        assert_eq!(parcel.status, ParcelStatus::Delinquent);
        assert_eq!(parcel.delinquent_since, Some(date(2026, 1, 1)));
    }

    #[test]
    fn test_packet_sent_derives_deadlines() {
        let mut fx = Fixture::new();
        let (machine, store) = fx.split();
        let sent = date(2026, 2, 10);

        let entry = machine
            .record_packet_sent(store, POINTE, sent, Some("9407 1000 0000 0000 0001"), None)
            .unwrap();

        let parcel = store.parcel(POINTE).unwrap();
        assert_eq!(parcel.status, ParcelStatus::Delinquent);
        assert_eq!(parcel.packet_sent, Some(sent));
        assert_eq!(parcel.cure_deadline, Some(date(2026, 3, 12)));
        assert_eq!(parcel.lien_filing_date, Some(date(2026, 3, 27)));
        assert_eq!(parcel.attorney_referral_date, Some(date(2026, 4, 11)));
        assert_eq!(parcel.enforcement_step, EnforcementStep::DemandSent);
        assert_eq!(parcel.next_action.as_deref(), Some("Await cure by 2026-03-12"));
        assert_eq!(parcel.next_action_deadline, parcel.cure_deadline);

        assert_eq!(entry.response_due, Some(date(2026, 3, 12)));
        assert!(entry.action.contains("9407 1000"));
        assert_eq!(store.log_entries(Some(POINTE)).unwrap().len(), 1);
    }

    #[test]
    fn test_declaration_track_uses_short_cure() {
        let mut fx = Fixture::new();
        let (machine, store) = fx.split();

        machine
            .record_packet_sent(store, SUMMIT, date(2026, 2, 10), None, Some(CureTrack::Declaration))
            .unwrap();

        let parcel = store.parcel(SUMMIT).unwrap();
        assert_eq!(parcel.cure_deadline, Some(date(2026, 2, 25)));
        assert_eq!(parcel.cure_track, CureTrack::Declaration);
    }

    #[test]
    fn test_packet_to_paying_parcel_is_refused() {
        let mut fx = Fixture::new();
        let (machine, store) = fx.split();
        assert!(machine
            .record_packet_sent(store, WATERS, date(2026, 2, 10), None, None)
            .is_err());
        assert!(store.log_entries(None).unwrap().is_empty());
    }

    #[test]
    fn test_lien_eligible_exactly_at_cutoff_with_balance() {
        let fx = Fixture::new();
        let machine = EnforcementStateMachine::new(&fx.arrears, &fx.settlement, fx.policy);
        let parcel = fx.store.parcel(SUMMIT).unwrap();

        let before = machine.deadline_status(&parcel, &[], date(2026, 3, 31)).unwrap();
        assert_ne!(before, DeadlineStatus::LienEligible);

        let at = machine.deadline_status(&parcel, &[], date(2026, 4, 1)).unwrap();
        assert_eq!(at, DeadlineStatus::LienEligible);

        let paid_up = fx.store.parcel(WATERS).unwrap();
        let status = machine.deadline_status(&paid_up, &[], date(2026, 6, 1)).unwrap();
        assert_eq!(status, DeadlineStatus::NotDue);
    }

    #[test]
    fn test_due_soon_and_overdue() {
        let mut fx = Fixture::new();
        {
            let (machine, store) = fx.split();
            machine
                .record_packet_sent(store, POINTE, date(2026, 1, 5), None, None)
                .unwrap();
        }
        let machine = EnforcementStateMachine::new(&fx.arrears, &fx.settlement, fx.policy);
        let parcel = fx.store.parcel(POINTE).unwrap();

        // Cure 2026-02-04; seeded next-action deadline 2026-03-01 was replaced
        assert_eq!(
            machine.deadline_status(&parcel, &[], date(2026, 1, 10)).unwrap(),
            DeadlineStatus::NotDue
        );
        assert_eq!(
            machine.deadline_status(&parcel, &[], date(2026, 1, 25)).unwrap(),
            DeadlineStatus::DueSoon
        );
        assert_eq!(
            machine.deadline_status(&parcel, &[], date(2026, 2, 5)).unwrap(),
            DeadlineStatus::Overdue
        );

        let flags = machine.pending_actions(&parcel, &[], date(2026, 2, 5)).unwrap();
        assert_eq!(flags.len(), 1);
        assert!(matches!(flags[0], PendingAction::CureExpired { .. }));
    }

    #[test]
    fn test_pending_actions_flag_current_parcel_with_arrears() {
        let fx = Fixture::new();
        let machine = EnforcementStateMachine::new(&fx.arrears, &fx.settlement, fx.policy);
        let mut parcel = fx.store.parcel(WATERS).unwrap();
        parcel.past_due_balance = 1_200.0;

        let flags = machine.pending_actions(&parcel, &[], date(2026, 2, 1)).unwrap();
        assert_eq!(flags, vec![PendingAction::MarkDelinquent { arrears: 1_200.0 }]);
        // Flagging never mutates
        assert_eq!(parcel.status, ParcelStatus::Current);
    }

    #[test]
    fn test_deadline_board_buckets() {
        let mut fx = Fixture::new();
        {
            let (machine, store) = fx.split();
            machine
                .record_packet_sent(store, POINTE, date(2026, 2, 1), Some("TRK-1"), None)
                .unwrap();
            machine
                .record_packet_sent(store, KG, date(2026, 1, 1), None, None)
                .unwrap();
        }
        let machine = EnforcementStateMachine::new(&fx.arrears, &fx.settlement, fx.policy);
        let parcels = fx.store.parcels().unwrap();

        let board = machine.deadline_board(&parcels, date(2026, 2, 25));
        assert_eq!(board.len(), 6);
        assert!(board.windows(2).all(|w| w[0].date <= w[1].date));

        // KG cure 2026-01-31 is overdue; Pointe cure 2026-03-03 is urgent
        assert_eq!(board[0].parcel_id, KG);
        assert_eq!(board[0].bucket, DeadlineBucket::Overdue);
        let pointe_cure = board
            .iter()
            .find(|e| e.parcel_id == POINTE && e.kind == DeadlineKind::Cure)
            .unwrap();
        assert_eq!(pointe_cure.days_left, 6);
        assert_eq!(pointe_cure.bucket, DeadlineBucket::Urgent);
        assert_eq!(pointe_cure.tracking.as_deref(), Some("TRK-1"));
    }

    #[test]
    fn test_field_updates() {
        let mut fx = Fixture::new();
        let (machine, store) = fx.split();

        machine
            .update_field(store, KG, ParcelField::EntityOwner, "3LS Properties Inc")
            .unwrap();
        machine
            .update_field(store, KG, ParcelField::PastDueBalance, "$24,300.50")
            .unwrap();
        machine
            .update_field(store, KG, ParcelField::EnforcementStep, "demand_drafted")
            .unwrap();

        let parcel = store.parcel(KG).unwrap();
        assert_eq!(parcel.entity_owner, "3LS Properties Inc");
        assert_eq!(parcel.past_due_balance, 24_300.50);
        assert_eq!(parcel.enforcement_step, EnforcementStep::DemandDrafted);
        assert_eq!(store.log_entries(Some(KG)).unwrap().len(), 3);

        assert!("sqft".parse::<ParcelField>().is_err());
        assert!(machine
            .update_field(store, KG, ParcelField::NextActionDeadline, "next week")
            .is_err());
        assert_eq!(store.log_entries(Some(KG)).unwrap().len(), 3);

        assert_eq!("billed-weekly-rate".parse::<ParcelField>().unwrap(), ParcelField::BilledWeeklyRate);
        assert!("cure_deadline".parse::<ParcelField>().is_err());
    }

    #[test]
    fn test_lender_research_fields() {
        let mut fx = Fixture::new();
        let (machine, store) = fx.split();

        machine
            .update_field(store, POINTE, ParcelField::LenderName, "First Horizon Bank")
            .unwrap();
        machine
            .update_field(store, POINTE, ParcelField::DeedOfTrustRef, "Instr. 21034567")
            .unwrap();
        machine
            .update_field(store, POINTE, ParcelField::AddressVerified, "yes")
            .unwrap();

        let parcel = store.parcel(POINTE).unwrap();
        assert_eq!(parcel.lender_name.as_deref(), Some("First Horizon Bank"));
        assert_eq!(parcel.deed_of_trust_ref.as_deref(), Some("Instr. 21034567"));
        assert!(parcel.address_verified);
        assert!(!parcel.lender_verified);

        assert!(machine
            .update_field(store, POINTE, ParcelField::LenderVerified, "maybe")
            .is_err());
        machine
            .update_field(store, POINTE, ParcelField::LenderName, "")
            .unwrap();
        assert_eq!(store.parcel(POINTE).unwrap().lender_name, None);

        assert_eq!("deed-of-trust-ref".parse::<ParcelField>().unwrap(), ParcelField::DeedOfTrustRef);
        assert!(ParcelField::LoanNumber.is_lender_research());
        assert!(!ParcelField::Notes.is_lender_research());
    }

    #[test]
    fn test_single_parcel_resurvey_breaking_campus_total_is_refused() {
        let mut fx = Fixture::new();
        let (machine, store) = fx.split();

        let err = machine
            .resurvey(store, &[SurveyedArea::new(SUMMIT, 130_000)])
            .unwrap_err();
        assert_eq!(
            err,
            EnforcementError::invariant("parcels cover 674958 SF but the campus is 672718 SF")
        );
        assert_eq!(store.parcel(SUMMIT).unwrap().sqft, 127_760);
        assert!(store.log_entries(None).unwrap().is_empty());

        let campus = store.parcels().unwrap();
        assert!(fx.arrears.allocator().validate_campus(&campus).is_ok());
    }

    #[test]
    fn test_resurvey_moves_area_between_parcels() {
        let mut fx = Fixture::new();
        let (machine, store) = fx.split();

        let entries = machine
            .resurvey(
                store,
                &[
                    SurveyedArea::new(SUMMIT, 125_760),
                    "11=60,592".parse().unwrap(),
                    SurveyedArea::new(POINTE, 31_061),
                ],
            )
            .unwrap();

        // The unchanged parcel gets no entry
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "Re-survey: sqft 127760 -> 125760");
        assert_eq!(store.parcel(SUMMIT).unwrap().sqft, 125_760);
        assert_eq!(store.parcel(11).unwrap().sqft, 60_592);
        assert_eq!(store.log_entries(Some(POINTE)).unwrap().len(), 0);

        let campus = store.parcels().unwrap();
        assert!(fx.arrears.allocator().validate_campus(&campus).is_ok());
    }

    #[test]
    fn test_resurvey_rejects_bad_measurements() {
        let mut fx = Fixture::new();
        let (machine, store) = fx.split();

        let duplicate = [SurveyedArea::new(SUMMIT, 125_760), SurveyedArea::new(SUMMIT, 127_760)];
        assert!(machine.resurvey(store, &duplicate).is_err());
        assert!(machine.resurvey(store, &[SurveyedArea::new(KG, 0)]).is_err());
        assert_eq!(
            machine.resurvey(store, &[SurveyedArea::new(999, 10)]).unwrap_err(),
            EnforcementError::ParcelNotFound { parcel_id: 999 }
        );
        assert!(machine.resurvey(store, &[]).is_err());
        assert!("10:125760".parse::<SurveyedArea>().is_err());
        assert!(store.log_entries(None).unwrap().is_empty());
    }

    #[test]
    fn test_log_action_and_credit() {
        let mut fx = Fixture::new();
        let (machine, store) = fx.split();

        let entry = machine
            .log_action(store, SUMMIT, "Phone call with counsel", Some("Phone"), Some("Wants payment plan"))
            .unwrap();
        assert_eq!(entry.sent_via.as_deref(), Some("Phone"));
        assert!(machine.log_action(store, 404, "Ghost call", None, None).is_err());

        let credit = Credit::new(SUMMIT, date(2026, 1, 15), 10_000.0, "Partial payment");
        machine.record_credit(store, &credit).unwrap();
        assert_eq!(store.credits(Some(SUMMIT)).unwrap().len(), 1);
        assert_eq!(store.log_entries(Some(SUMMIT)).unwrap().len(), 2);

        let bad = Credit::new(SUMMIT, date(2026, 1, 15), -5.0, "");
        assert!(machine.record_credit(store, &bad).is_err());
    }
}
