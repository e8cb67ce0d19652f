// ⚙️ Enforcement Configuration - legal and business constants as data
//
// Rates, cure periods, cutoff dates and settlement tiers live here instead of
// being scattered through the computation code. A rate change or a new
// jurisdiction is a new config version, not a code change.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::entities::RateRecord;

/// Current config schema version
pub const CONFIG_VERSION: u32 = 1;

// ============================================================================
// SETTLEMENT TIER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementTier {
    /// Tier name used by operators ("full", "prompt-pay", ...)
    pub name: String,

    /// Maximum discount off current arrears allowed at this tier (0.0 - 1.0)
    pub max_discount: f64,
}

impl SettlementTier {
    pub fn new(name: &str, max_discount: f64) -> Self {
        SettlementTier {
            name: name.to_string(),
            max_discount,
        }
    }
}

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnforcementConfig {
    /// Schema version of this config document
    pub version: u32,

    /// Total campus square footage every share is measured against
    pub campus_total_sqft: u64,

    /// Campus-wide weekly rate history (any order; the schedule sorts it)
    pub rates: Vec<RateRecord>,

    /// Maximum look-back window for accrued arrears
    pub arrears_cap_weeks: u32,

    /// Statute of limitations for contract enforcement
    pub limitation_years: u32,

    /// Recording date of the Declaration of Restrictive Covenants
    pub covenant_origination: NaiveDate,

    /// Cure period when notice is given under the Declaration
    pub declaration_cure_days: i64,

    /// Cure period when notice is given by demand letter
    pub demand_letter_cure_days: i64,

    /// Lien filing date offset from packet-sent date
    pub lien_filing_offset_days: i64,

    /// Attorney referral offset from packet-sent date
    pub attorney_referral_offset_days: i64,

    /// Fixed calendar date after which liens may be filed
    pub lien_cutoff: NaiveDate,

    /// Deadlines within this many days count as "due soon"
    pub due_soon_days: i64,

    /// Deadlines within this many days are "urgent" on the deadline board
    pub urgent_days: i64,

    /// Weeks-per-month factor used for forward monthly billing
    pub weeks_per_month: f64,

    /// Cost premium of litigating instead of settling (0.40 = +40%)
    pub litigation_premium: f64,

    /// Negotiation tiers, shallowest discount first
    pub settlement_tiers: Vec<SettlementTier>,
}

impl EnforcementConfig {
    /// Load config from a JSON file and validate it
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: EnforcementConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        config.validate()?;
        Ok(config)
    }

    /// Load from file when a path is given, otherwise use the campus defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != CONFIG_VERSION {
            bail!(
                "Unsupported config version {} (expected {})",
                self.version,
                CONFIG_VERSION
            );
        }
        if self.campus_total_sqft == 0 {
            bail!("campus_total_sqft must be positive");
        }
        if self.rates.is_empty() {
            bail!("at least one rate record is required");
        }
        if let Some(bad) = self.rates.iter().find(|r| r.weekly_rate <= 0.0) {
            bail!(
                "weekly rate effective {} must be positive, got {}",
                bad.effective_from,
                bad.weekly_rate
            );
        }
        if self.settlement_tiers.is_empty() {
            bail!("at least one settlement tier is required");
        }
        for tier in &self.settlement_tiers {
            if !(0.0..=1.0).contains(&tier.max_discount) {
                bail!(
                    "tier '{}' discount must be within [0, 1], got {}",
                    tier.name,
                    tier.max_discount
                );
            }
        }
        if self.arrears_cap_weeks == 0 {
            bail!("arrears_cap_weeks must be positive");
        }
        Ok(())
    }

    /// Look up a settlement tier by name (case-insensitive)
    pub fn tier(&self, name: &str) -> Option<&SettlementTier> {
        self.settlement_tiers
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// The deepest discount policy allows at any tier
    pub fn policy_max_discount(&self) -> f64 {
        self.settlement_tiers
            .iter()
            .map(|t| t.max_discount)
            .fold(0.0, f64::max)
    }
}

impl Default for EnforcementConfig {
    /// Kirby Gate campus constants
    fn default() -> Self {
        EnforcementConfig {
            version: CONFIG_VERSION,
            campus_total_sqft: 672_718,
            rates: vec![
                RateRecord::new(
                    "Historic Campus Weekly Rate",
                    NaiveDate::from_ymd_opt(2022, 12, 1).unwrap_or_default(),
                    6_069.52,
                ),
                RateRecord::new(
                    "Current Campus Weekly Rate",
                    NaiveDate::from_ymd_opt(2026, 1, 1).unwrap_or_default(),
                    9_000.00,
                ),
            ],
            arrears_cap_weeks: 156,
            limitation_years: 6,
            covenant_origination: NaiveDate::from_ymd_opt(2011, 5, 5).unwrap_or_default(),
            declaration_cure_days: 15,
            demand_letter_cure_days: 30,
            lien_filing_offset_days: 45,
            attorney_referral_offset_days: 60,
            lien_cutoff: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap_or_default(),
            due_soon_days: 14,
            urgent_days: 7,
            weeks_per_month: 4.333,
            litigation_premium: 0.40,
            settlement_tiers: vec![
                SettlementTier::new("full", 0.0),
                SettlementTier::new("prompt-pay", 0.15),
                SettlementTier::new("negotiated", 0.25),
                SettlementTier::new("litigation-avoidance", 0.35),
            ],
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
