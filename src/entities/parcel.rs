// 🏢 Parcel Entity - one leasable unit of the campus, the unit of enforcement
//
// Parcel is the aggregate root for its own enforcement log. Identity is the
// integer id assigned at seed load; everything else is a value the operator
// or the state machine may change over time. Parcels are never deleted, only
// moved into the terminal SETTLED status.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// PARCEL STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParcelStatus {
    /// Paying, nothing owed
    Current,
    /// Non-paying, arrears accruing
    Delinquent,
    /// Tenant disputes the obligation or amount
    Disputed,
    /// Under reconciliation (entity or balance unknown)
    Recon,
    /// Balance under verification
    Verify,
    /// Settled - terminal
    Settled,
}

impl ParcelStatus {
    pub const ALL: [ParcelStatus; 6] = [
        ParcelStatus::Current,
        ParcelStatus::Delinquent,
        ParcelStatus::Disputed,
        ParcelStatus::Recon,
        ParcelStatus::Verify,
        ParcelStatus::Settled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParcelStatus::Current => "CURRENT",
            ParcelStatus::Delinquent => "DELINQUENT",
            ParcelStatus::Disputed => "DISPUTED",
            ParcelStatus::Recon => "RECON",
            ParcelStatus::Verify => "VERIFY",
            ParcelStatus::Settled => "SETTLED",
        }
    }

    /// Short marker used on operator tables
    pub fn marker(&self) -> &'static str {
        match self {
            ParcelStatus::Current => "[OK]",
            ParcelStatus::Delinquent => "[!!]",
            ParcelStatus::Disputed => "[??]",
            ParcelStatus::Recon => "[RR]",
            ParcelStatus::Verify => "[VV]",
            ParcelStatus::Settled => "[$$]",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ParcelStatus::Settled)
    }

    /// Statuses that take part in enforcement ranking
    pub fn is_enforceable(&self) -> bool {
        !matches!(self, ParcelStatus::Current | ParcelStatus::Settled)
    }
}

impl fmt::Display for ParcelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParcelStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParcelStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown status '{}'", s))
    }
}

// ============================================================================
// ENFORCEMENT STEP (ordinal)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EnforcementStep {
    Research,
    Paying,
    DemandDrafted,
    DemandSent,
    ResponseReceived,
    InNegotiation,
    SettlementAgreed,
    LienFiled,
    AttorneyLetterReceived,
    Resolved,
}

impl EnforcementStep {
    pub const ALL: [EnforcementStep; 10] = [
        EnforcementStep::Research,
        EnforcementStep::Paying,
        EnforcementStep::DemandDrafted,
        EnforcementStep::DemandSent,
        EnforcementStep::ResponseReceived,
        EnforcementStep::InNegotiation,
        EnforcementStep::SettlementAgreed,
        EnforcementStep::LienFiled,
        EnforcementStep::AttorneyLetterReceived,
        EnforcementStep::Resolved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EnforcementStep::Research => "Research",
            EnforcementStep::Paying => "Paying",
            EnforcementStep::DemandDrafted => "Demand Drafted",
            EnforcementStep::DemandSent => "Demand Sent",
            EnforcementStep::ResponseReceived => "Response Received",
            EnforcementStep::InNegotiation => "In Negotiation",
            EnforcementStep::SettlementAgreed => "Settlement Agreed",
            EnforcementStep::LienFiled => "Lien Filed",
            EnforcementStep::AttorneyLetterReceived => "Attorney Letter Received",
            EnforcementStep::Resolved => "Resolved",
        }
    }

    /// Position in the enforcement ladder (stored in the database)
    pub fn ordinal(&self) -> u8 {
        *self as u8
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        EnforcementStep::ALL.get(ordinal as usize).copied()
    }
}

impl fmt::Display for EnforcementStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnforcementStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace(['_', '-'], " ");
        EnforcementStep::ALL
            .iter()
            .copied()
            .find(|step| step.as_str().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| format!("unknown enforcement step '{}'", s))
    }
}

// ============================================================================
// CURE TRACK
// ============================================================================

/// Which notice the cure period runs from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CureTrack {
    /// Notice under the Declaration itself (15-day cure)
    Declaration,
    /// Formal demand letter (30-day cure)
    #[default]
    DemandLetter,
}

impl CureTrack {
    pub fn as_str(&self) -> &'static str {
        match self {
            CureTrack::Declaration => "declaration",
            CureTrack::DemandLetter => "demand-letter",
        }
    }
}

impl FromStr for CureTrack {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "declaration" => Ok(CureTrack::Declaration),
            "demand-letter" | "demand_letter" | "demand" => Ok(CureTrack::DemandLetter),
            other => Err(format!("unknown cure track '{}'", other)),
        }
    }
}

// ============================================================================
// PARCEL
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parcel {
    // ========================================================================
    // IDENTITY
    // ========================================================================
    pub id: i64,
    pub address: String,
    pub business_name: String,
    pub sqft: u32,

    // ========================================================================
    // PARTIES
    // ========================================================================
    pub status: ParcelStatus,
    pub entity_owner: String,
    /// Legal party to enforce against (may differ from the occupant)
    pub corporate_target: String,

    // ========================================================================
    // MONEY
    // ========================================================================
    /// Operator-recorded past-due figure (used when no delinquency start is known)
    pub past_due_balance: f64,
    /// Weekly amount actually billed to the parcel, if any
    pub billed_weekly_rate: Option<f64>,
    /// First day arrears began accruing
    pub delinquent_since: Option<NaiveDate>,
    /// Amount the parcel settled for (SETTLED only)
    pub settlement_amount: Option<f64>,
    pub settled_on: Option<NaiveDate>,

    // ========================================================================
    // ENFORCEMENT TIMELINE (derived from packet-sent date)
    // ========================================================================
    pub certified_mail_tracking: Option<String>,
    pub packet_sent: Option<NaiveDate>,
    pub cure_track: CureTrack,
    pub cure_deadline: Option<NaiveDate>,
    pub lien_filing_date: Option<NaiveDate>,
    pub attorney_referral_date: Option<NaiveDate>,

    // ========================================================================
    // OPERATOR WORKFLOW
    // ========================================================================
    pub enforcement_step: EnforcementStep,
    pub next_action: Option<String>,
    pub next_action_deadline: Option<NaiveDate>,
    pub notes: Option<String>,

    // ========================================================================
    // LENDER / TITLE RESEARCH (county assessor and register of deeds)
    // ========================================================================
    #[serde(default)]
    pub county_parcel_id: Option<String>,
    /// Owner mailing address for certified mail, when it differs from the site
    #[serde(default)]
    pub mailing_address: Option<String>,
    #[serde(default)]
    pub lender_name: Option<String>,
    #[serde(default)]
    pub lender_address: Option<String>,
    /// Book/page or instrument number of the recorded deed of trust
    #[serde(default)]
    pub deed_of_trust_ref: Option<String>,
    #[serde(default)]
    pub lender_contact: Option<String>,
    #[serde(default)]
    pub loan_number: Option<String>,
    #[serde(default)]
    pub title_company: Option<String>,
    #[serde(default)]
    pub address_verified: bool,
    #[serde(default)]
    pub lender_verified: bool,
}

impl Parcel {
    /// Create a parcel as it looks at campus onboarding
    pub fn new(id: i64, address: &str, business_name: &str, sqft: u32, status: ParcelStatus) -> Self {
        Parcel {
            id,
            address: address.to_string(),
            business_name: business_name.to_string(),
            sqft,
            status,
            entity_owner: String::new(),
            corporate_target: String::new(),
            past_due_balance: 0.0,
            billed_weekly_rate: None,
            delinquent_since: None,
            settlement_amount: None,
            settled_on: None,
            certified_mail_tracking: None,
            packet_sent: None,
            cure_track: CureTrack::default(),
            cure_deadline: None,
            lien_filing_date: None,
            attorney_referral_date: None,
            enforcement_step: if status == ParcelStatus::Current {
                EnforcementStep::Paying
            } else {
                EnforcementStep::Research
            },
            next_action: None,
            next_action_deadline: None,
            notes: None,
            county_parcel_id: None,
            mailing_address: None,
            lender_name: None,
            lender_address: None,
            deed_of_trust_ref: None,
            lender_contact: None,
            loan_number: None,
            title_company: None,
            address_verified: false,
            lender_verified: false,
        }
    }

    pub fn with_parties(mut self, entity_owner: &str, corporate_target: &str) -> Self {
        self.entity_owner = entity_owner.to_string();
        self.corporate_target = corporate_target.to_string();
        self
    }

    pub fn with_delinquency(mut self, since: NaiveDate) -> Self {
        self.delinquent_since = Some(since);
        self
    }

    pub fn with_past_due(mut self, balance: f64) -> Self {
        self.past_due_balance = balance;
        self
    }

    /// All dated deadlines currently attached to this parcel
    pub fn deadlines(&self) -> Vec<(DeadlineKind, NaiveDate)> {
        let mut out = Vec::new();
        if let Some(d) = self.cure_deadline {
            out.push((DeadlineKind::Cure, d));
        }
        if let Some(d) = self.lien_filing_date {
            out.push((DeadlineKind::LienFiling, d));
        }
        if let Some(d) = self.attorney_referral_date {
            out.push((DeadlineKind::AttorneyReferral, d));
        }
        if let Some(d) = self.next_action_deadline {
            out.push((DeadlineKind::NextAction, d));
        }
        out
    }

    /// Short label for tables: business name, falling back to address
    pub fn label(&self) -> &str {
        if self.business_name.is_empty() {
            &self.address
        } else {
            &self.business_name
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeadlineKind {
    Cure,
    LienFiling,
    AttorneyReferral,
    NextAction,
}

impl DeadlineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeadlineKind::Cure => "CURE",
            DeadlineKind::LienFiling => "LIEN",
            DeadlineKind::AttorneyReferral => "ATTORNEY",
            DeadlineKind::NextAction => "NEXT ACTION",
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_through_strings() {
        for status in ParcelStatus::ALL {
            let parsed: ParcelStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert_eq!("recon".parse::<ParcelStatus>().unwrap(), ParcelStatus::Recon);
        assert!("LIEN FILED".parse::<ParcelStatus>().is_err());
    }

    #[test]
    fn test_only_settled_is_terminal() {
        let terminal: Vec<_> = ParcelStatus::ALL.iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![&ParcelStatus::Settled]);
        assert!(!ParcelStatus::Current.is_enforceable());
        assert!(ParcelStatus::Disputed.is_enforceable());
    }

    #[test]
    fn test_step_ordinals_are_stable() {
        for (i, step) in EnforcementStep::ALL.iter().enumerate() {
            assert_eq!(step.ordinal() as usize, i);
            assert_eq!(EnforcementStep::from_ordinal(i as u8), Some(*step));
        }
        assert_eq!(EnforcementStep::from_ordinal(42), None);
        assert_eq!(
            "demand_sent".parse::<EnforcementStep>().unwrap(),
            EnforcementStep::DemandSent
        );
    }

    #[test]
    fn test_new_parcel_defaults() {
        let paying = Parcel::new(1, "2809 Kirby Pkwy", "Shoppes at Kirby", 22_350, ParcelStatus::Current);
        assert_eq!(paying.enforcement_step, EnforcementStep::Paying);
        assert!(paying.deadlines().is_empty());

        let target = Parcel::new(2, "6480 Quince Rd", "Pointe at Kirby", 31_061, ParcelStatus::Delinquent);
        assert_eq!(target.enforcement_step, EnforcementStep::Research);
        assert_eq!(target.cure_track, CureTrack::DemandLetter);
    }

    #[test]
    fn test_cure_track_json_matches_cli_spelling() {
        let track: CureTrack = serde_json::from_str("\"demand-letter\"").unwrap();
        assert_eq!(track, CureTrack::DemandLetter);
        for track in [CureTrack::Declaration, CureTrack::DemandLetter] {
            let json = serde_json::to_string(&track).unwrap();
            assert_eq!(json, format!("\"{}\"", track.as_str()));
        }
    }
}
