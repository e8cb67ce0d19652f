// 🧮 Enforcement Engine - the operations collaborators call
//
// One owner for the calculator, settlement policy and deadline policy, so
// the CLI, the dashboard, exports and the JSON server all compute arrears
// the same way.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::allocation::{BillingComparison, CampusAllocator};
use crate::arrears::{Arrears, ArrearsCalculator};
use crate::config::EnforcementConfig;
use crate::enforcement::{
    DeadlinePolicy, DeadlineStatus, EnforcementStateMachine, PendingAction, SurveyedArea,
    TransitionContext,
};
use crate::entities::{Credit, EnforcementLogEntry, Parcel, ParcelStatus, RateRecord};
use crate::error::EnforcementResult;
use crate::integrity::IntegrityChecker;
use crate::priority::{PriorityRanker, Ranking};
use crate::rate_schedule::RateSchedule;
use crate::settlement::{SettlementEngine, SettlementQuote};
use crate::store::ParcelStore;

/// Computed figures for one parcel, as shown on tables and exports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParcelFigures {
    pub parcel_id: i64,
    pub business_name: String,
    pub address: String,
    pub status: ParcelStatus,
    pub sqft: u32,
    pub share: f64,
    pub arrears: f64,
    pub weekly_pro_rata: f64,
    pub monthly_pro_rata: f64,
    pub billed_weekly: Option<f64>,
    pub deadline_status: DeadlineStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub as_of: NaiveDate,
    pub total_parcels: usize,
    pub by_status: BTreeMap<ParcelStatus, usize>,
    pub tracked_sqft: u64,
    pub campus_sqft: u64,
    pub delinquent_arrears: f64,
    pub disputed_arrears: f64,
    pub recon_verify_arrears: f64,
    pub total_arrears: f64,
    pub campus_weekly_rate: f64,
    pub delinquent_weekly: f64,
    pub days_to_lien_cutoff: i64,
    pub log_entries: i64,
}

/// Lender and title research progress over the parcels still being pursued
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LenderResearchSummary {
    /// Every non-CURRENT parcel, largest first
    pub parcels: Vec<Parcel>,
    pub address_verified: usize,
    pub lender_verified: usize,
}

impl LenderResearchSummary {
    pub fn from_parcels(parcels: &[Parcel]) -> Self {
        let mut tracked: Vec<Parcel> = parcels
            .iter()
            .filter(|p| p.status != ParcelStatus::Current)
            .cloned()
            .collect();
        tracked.sort_by(|a, b| b.sqft.cmp(&a.sqft).then(a.id.cmp(&b.id)));

        LenderResearchSummary {
            address_verified: tracked.iter().filter(|p| p.address_verified).count(),
            lender_verified: tracked.iter().filter(|p| p.lender_verified).count(),
            parcels: tracked,
        }
    }

    pub fn total(&self) -> usize {
        self.parcels.len()
    }
}

pub struct EnforcementEngine {
    config: EnforcementConfig,
    arrears: ArrearsCalculator,
    settlement: SettlementEngine,
    policy: DeadlinePolicy,
}

impl EnforcementEngine {
    pub fn new(config: EnforcementConfig) -> EnforcementResult<Self> {
        let rates = config.rates.clone();
        Self::with_rates(config, rates)
    }

    /// Use a stored rate history instead of the one in the config
    pub fn with_rates(config: EnforcementConfig, rates: Vec<RateRecord>) -> EnforcementResult<Self> {
        let arrears = ArrearsCalculator::new(
            RateSchedule::new(rates)?,
            CampusAllocator::new(config.campus_total_sqft),
            config.arrears_cap_weeks,
            config.limitation_years,
            config.covenant_origination,
        );
        Ok(EnforcementEngine {
            settlement: SettlementEngine::from_config(&config),
            policy: DeadlinePolicy::from_config(&config),
            arrears,
            config,
        })
    }

    /// Engine over whatever rate history the store holds, falling back to the config
    pub fn for_store<S: ParcelStore>(config: EnforcementConfig, store: &S) -> EnforcementResult<Self> {
        let stored = store.rates()?;
        if stored.is_empty() {
            Self::new(config)
        } else {
            Self::with_rates(config, stored)
        }
    }

    pub fn config(&self) -> &EnforcementConfig {
        &self.config
    }

    pub fn calculator(&self) -> &ArrearsCalculator {
        &self.arrears
    }

    pub fn settlement(&self) -> &SettlementEngine {
        &self.settlement
    }

    pub fn allocator(&self) -> &CampusAllocator {
        self.arrears.allocator()
    }

    pub fn machine(&self) -> EnforcementStateMachine<'_> {
        EnforcementStateMachine::new(&self.arrears, &self.settlement, self.policy)
    }

    pub fn ranker(&self) -> PriorityRanker<'_> {
        PriorityRanker::new(&self.arrears, self.policy.lien_cutoff)
    }

    pub fn integrity_checker(&self) -> IntegrityChecker {
        IntegrityChecker::new(*self.arrears.allocator(), self.policy)
    }

    // ========================================================================
    // CORE OPERATIONS
    // ========================================================================

    pub fn compute_arrears(&self, parcel: &Parcel, credits: &[Credit], as_of: NaiveDate) -> EnforcementResult<Arrears> {
        self.arrears.compute(parcel, credits, as_of)
    }

    pub fn current_rate(&self, date: NaiveDate) -> EnforcementResult<f64> {
        self.arrears.schedule().rate_on(date)
    }

    pub fn pro_rata_share(&self, parcel: &Parcel) -> EnforcementResult<f64> {
        self.arrears.allocator().share(parcel)
    }

    pub fn propose_settlement(
        &self,
        parcel: &Parcel,
        credits: &[Credit],
        tier: &str,
        as_of: NaiveDate,
    ) -> EnforcementResult<SettlementQuote> {
        let owed = self.compute_arrears(parcel, credits, as_of)?.amount;
        self.settlement.propose(owed, tier)
    }

    /// Check a proposed payoff against current arrears and the policy floor
    pub fn validate_settlement(
        &self,
        parcel: &Parcel,
        credits: &[Credit],
        proposed: f64,
        as_of: NaiveDate,
    ) -> EnforcementResult<()> {
        let owed = self.compute_arrears(parcel, credits, as_of)?.amount;
        self.settlement.validate_against_policy(owed, proposed)
    }

    pub fn transition<S: ParcelStore>(
        &self,
        store: &mut S,
        parcel_id: i64,
        target: ParcelStatus,
        ctx: &TransitionContext,
    ) -> EnforcementResult<EnforcementLogEntry> {
        self.machine().transition(store, parcel_id, target, ctx)
    }

    /// Apply re-surveyed areas to several parcels at once
    pub fn resurvey<S: ParcelStore>(
        &self,
        store: &mut S,
        areas: &[SurveyedArea],
    ) -> EnforcementResult<Vec<EnforcementLogEntry>> {
        self.machine().resurvey(store, areas)
    }

    pub fn rank_delinquent(&self, parcels: &[Parcel], credits: &[Credit], as_of: NaiveDate) -> EnforcementResult<Ranking> {
        self.ranker().rank(parcels, credits, as_of)
    }

    pub fn deadline_status(&self, parcel: &Parcel, credits: &[Credit], as_of: NaiveDate) -> EnforcementResult<DeadlineStatus> {
        self.machine().deadline_status(parcel, credits, as_of)
    }

    pub fn pending_actions(
        &self,
        parcel: &Parcel,
        credits: &[Credit],
        as_of: NaiveDate,
    ) -> EnforcementResult<Vec<PendingAction>> {
        self.machine().pending_actions(parcel, credits, as_of)
    }

    // ========================================================================
    // REPORTING
    // ========================================================================

    pub fn billing_comparison(&self, parcel: &Parcel, as_of: NaiveDate) -> EnforcementResult<BillingComparison> {
        let rate = self.current_rate(as_of)?;
        self.allocator()
            .billing_comparison(parcel, rate, self.config.weeks_per_month)
    }

    pub fn parcel_figures(&self, parcel: &Parcel, credits: &[Credit], as_of: NaiveDate) -> EnforcementResult<ParcelFigures> {
        let arrears = self.compute_arrears(parcel, credits, as_of)?;
        let comparison = self.billing_comparison(parcel, as_of)?;
        let machine = self.machine();

        Ok(ParcelFigures {
            parcel_id: parcel.id,
            business_name: parcel.business_name.clone(),
            address: parcel.address.clone(),
            status: parcel.status,
            sqft: parcel.sqft,
            share: arrears.share,
            arrears: arrears.amount,
            weekly_pro_rata: comparison.pro_rata_weekly,
            monthly_pro_rata: comparison.pro_rata_monthly,
            billed_weekly: parcel.billed_weekly_rate,
            deadline_status: machine.status_for_balance(parcel, arrears.amount, as_of),
        })
    }

    pub fn all_figures(&self, parcels: &[Parcel], credits: &[Credit], as_of: NaiveDate) -> EnforcementResult<Vec<ParcelFigures>> {
        parcels
            .iter()
            .map(|p| self.parcel_figures(p, credits, as_of))
            .collect()
    }

    pub fn lender_research(&self, parcels: &[Parcel]) -> LenderResearchSummary {
        LenderResearchSummary::from_parcels(parcels)
    }

    pub fn summary(
        &self,
        parcels: &[Parcel],
        credits: &[Credit],
        log_entries: i64,
        as_of: NaiveDate,
    ) -> EnforcementResult<DashboardSummary> {
        let campus_weekly_rate = self.current_rate(as_of)?;
        let mut by_status = BTreeMap::new();
        let mut delinquent_arrears = 0.0;
        let mut disputed_arrears = 0.0;
        let mut recon_verify_arrears = 0.0;
        let mut delinquent_weekly = 0.0;

        for parcel in parcels {
            *by_status.entry(parcel.status).or_insert(0) += 1;
            let owed = self.compute_arrears(parcel, credits, as_of)?.amount;

            match parcel.status {
                ParcelStatus::Delinquent => {
                    delinquent_arrears += owed;
                    delinquent_weekly += self.allocator().weekly_charge(parcel, campus_weekly_rate)?;
                }
                ParcelStatus::Disputed => disputed_arrears += owed,
                ParcelStatus::Recon | ParcelStatus::Verify => recon_verify_arrears += owed,
                ParcelStatus::Current | ParcelStatus::Settled => {}
            }
        }

        Ok(DashboardSummary {
            as_of,
            total_parcels: parcels.len(),
            by_status,
            tracked_sqft: parcels.iter().map(|p| p.sqft as u64).sum(),
            campus_sqft: self.config.campus_total_sqft,
            delinquent_arrears,
            disputed_arrears,
            recon_verify_arrears,
            total_arrears: delinquent_arrears + disputed_arrears + recon_verify_arrears,
            campus_weekly_rate,
            delinquent_weekly,
            days_to_lien_cutoff: (self.policy.lien_cutoff - as_of).num_days(),
            log_entries,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EnforcementError;
    use crate::seed::campus_parcels;
    use crate::store::MemoryStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn engine() -> EnforcementEngine {
        EnforcementEngine::new(EnforcementConfig::default()).unwrap()
    }

    #[test]
    fn test_current_rate_follows_schedule() {
        let engine = engine();
        assert_eq!(engine.current_rate(date(2025, 6, 1)).unwrap(), 6_069.52);
        assert_eq!(engine.current_rate(date(2026, 6, 1)).unwrap(), 9_000.00);
        assert!(matches!(
            engine.current_rate(date(2020, 1, 1)),
            Err(EnforcementError::NoApplicableRate { .. })
        ));
    }

    #[test]
    fn test_proposal_never_exceeds_arrears() {
        let engine = engine();
        let as_of = date(2026, 2, 1);
        for parcel in campus_parcels() {
            let owed = engine.compute_arrears(&parcel, &[], as_of).unwrap().amount;
            for tier in ["full", "prompt-pay", "negotiated", "litigation-avoidance"] {
                let quote = engine.propose_settlement(&parcel, &[], tier, as_of).unwrap();
                assert!(quote.minimum <= owed);
            }
        }
    }

    #[test]
    fn test_validate_settlement_uses_policy_floor() {
        let engine = engine();
        let parcel = campus_parcels().remove(11);
        let as_of = date(2026, 2, 1);
        let owed = engine.compute_arrears(&parcel, &[], as_of).unwrap().amount;

        assert!(engine.validate_settlement(&parcel, &[], owed * 0.70, as_of).is_ok());
        assert!(matches!(
            engine.validate_settlement(&parcel, &[], owed * 0.50, as_of),
            Err(EnforcementError::BelowPolicyFloor { .. })
        ));
        assert!(matches!(
            engine.validate_settlement(&parcel, &[], owed * 1.1, as_of),
            Err(EnforcementError::InvalidSettlement { .. })
        ));
    }

    #[test]
    fn test_transition_through_engine() {
        let engine = engine();
        let mut store = MemoryStore::new(campus_parcels(), EnforcementConfig::default().rates);

        let entry = engine
            .transition(&mut store, 20, ParcelStatus::Delinquent, &TransitionContext::new(date(2026, 2, 1)))
            .unwrap();
        assert_eq!(entry.parcel_id, 20);
        assert_eq!(store.parcel(20).unwrap().status, ParcelStatus::Delinquent);
    }

    #[test]
    fn test_for_store_prefers_stored_rates() {
        let mut config = EnforcementConfig::default();
        config.rates.truncate(1);
        let store = MemoryStore::new(campus_parcels(), EnforcementConfig::default().rates);

        let engine = EnforcementEngine::for_store(config, &store).unwrap();
        assert_eq!(engine.calculator().schedule().len(), 2);
    }

    #[test]
    fn test_summary_groups_arrears() {
        let engine = engine();
        let parcels = campus_parcels();
        let summary = engine.summary(&parcels, &[], 3, date(2026, 2, 1)).unwrap();

        assert_eq!(summary.total_parcels, 21);
        assert_eq!(summary.by_status.get(&ParcelStatus::Current), Some(&9));
        assert_eq!(summary.by_status.get(&ParcelStatus::Delinquent), Some(&9));
        assert_eq!(summary.tracked_sqft, 672_718);
        assert_eq!(summary.days_to_lien_cutoff, 59);
        assert!(summary.delinquent_arrears > 0.0);
        assert!(
            (summary.total_arrears
                - (summary.delinquent_arrears + summary.disputed_arrears + summary.recon_verify_arrears))
                .abs()
                < 1e-9
        );
        assert_eq!(summary.log_entries, 3);
    }

    #[test]
    fn test_parcel_figures() {
        let engine = engine();
        let parcels = campus_parcels();
        let figures = engine.all_figures(&parcels, &[], date(2026, 2, 1)).unwrap();

        assert_eq!(figures.len(), 21);
        let share_total: f64 = figures.iter().map(|f| f.share).sum();
        assert!((share_total - 1.0).abs() < 1e-9);
        assert!(figures
            .iter()
            .filter(|f| f.status == ParcelStatus::Current)
            .all(|f| f.arrears == 0.0));
    }

    #[test]
    fn test_lender_research_counts_only_pursued_parcels() {
        let engine = engine();
        let mut parcels = campus_parcels();
        for parcel in parcels.iter_mut() {
            match parcel.id {
                // A paying parcel's flags are not counted
                1 => parcel.address_verified = true,
                10 => {
                    parcel.address_verified = true;
                    parcel.lender_verified = true;
                }
                12 => parcel.address_verified = true,
                _ => {}
            }
        }

        let research = engine.lender_research(&parcels);
        assert_eq!(research.total(), 12);
        assert_eq!(research.address_verified, 2);
        assert_eq!(research.lender_verified, 1);
        assert!(research.parcels.iter().all(|p| p.status != ParcelStatus::Current));
        assert_eq!(research.parcels[0].id, 10);
        assert!(research
            .parcels
            .windows(2)
            .all(|pair| pair[0].sqft >= pair[1].sqft));
    }

    #[test]
    fn test_resurvey_through_engine_keeps_campus_whole() {
        let engine = engine();
        let mut store = MemoryStore::new(campus_parcels(), EnforcementConfig::default().rates);

        let entries = engine
            .resurvey(&mut store, &[SurveyedArea::new(10, 127_000), SurveyedArea::new(19, 43_960)])
            .unwrap();
        assert_eq!(entries.len(), 2);

        let parcels = store.parcels().unwrap();
        assert!(engine.allocator().validate_campus(&parcels).is_ok());
        let figures = engine.all_figures(&parcels, &[], date(2026, 2, 1)).unwrap();
        let share_total: f64 = figures.iter().map(|f| f.share).sum();
        assert!((share_total - 1.0).abs() < 1e-9);
    }
}
