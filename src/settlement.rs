// 🤝 Settlement Engine - what payoff can legally be offered
//
// minimum acceptable = arrears × (1 − tier discount), floored at zero
//
// A proposal is valid when it is at or above the floor and never above the
// arrears actually owed. Comparisons are done in whole cents so a proposal
// typed to the cent is never rejected by float noise.

use serde::{Deserialize, Serialize};

use crate::config::{EnforcementConfig, SettlementTier};
use crate::error::{EnforcementError, EnforcementResult};
use crate::money::to_cents;

// ============================================================================
// RESULT TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementQuote {
    pub tier: String,
    pub discount: f64,
    pub arrears: f64,
    pub minimum: f64,
}

/// Payment-plan terms for a negotiated payoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementTerms {
    pub principal: f64,
    pub discount: f64,
    pub annual_interest_rate: f64,
    pub term_months: u32,
    pub settled_amount: f64,
    pub monthly_no_interest: f64,
    /// Simple interest over the term
    pub total_with_interest: f64,
    pub monthly_with_interest: f64,
    pub savings_vs_full: f64,
    pub litigation_estimate: f64,
    pub savings_vs_litigation: f64,
}

// ============================================================================
// SETTLEMENT ENGINE
// ============================================================================

#[derive(Debug, Clone)]
pub struct SettlementEngine {
    tiers: Vec<SettlementTier>,
    litigation_premium: f64,
}

impl SettlementEngine {
    pub fn new(tiers: Vec<SettlementTier>, litigation_premium: f64) -> Self {
        SettlementEngine {
            tiers,
            litigation_premium,
        }
    }

    pub fn from_config(config: &EnforcementConfig) -> Self {
        SettlementEngine::new(config.settlement_tiers.clone(), config.litigation_premium)
    }

    pub fn tiers(&self) -> &[SettlementTier] {
        &self.tiers
    }

    pub fn tier(&self, name: &str) -> EnforcementResult<&SettlementTier> {
        self.tiers
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| EnforcementError::invariant(format!("unknown settlement tier '{}'", name)))
    }

    /// Deepest discount any tier allows
    pub fn policy_discount(&self) -> f64 {
        self.tiers.iter().map(|t| t.max_discount).fold(0.0, f64::max)
    }

    /// arrears × (1 − discount), never below zero
    pub fn minimum_for_discount(arrears: f64, discount: f64) -> f64 {
        (arrears * (1.0 - discount)).max(0.0)
    }

    /// Minimum acceptable amount at a named tier
    pub fn propose(&self, arrears: f64, tier_name: &str) -> EnforcementResult<SettlementQuote> {
        let tier = self.tier(tier_name)?;
        Ok(SettlementQuote {
            tier: tier.name.clone(),
            discount: tier.max_discount,
            arrears,
            minimum: Self::minimum_for_discount(arrears, tier.max_discount),
        })
    }

    /// One quote per configured tier, shallowest discount first
    pub fn quote_all(&self, arrears: f64) -> Vec<SettlementQuote> {
        let mut quotes: Vec<SettlementQuote> = self
            .tiers
            .iter()
            .map(|tier| SettlementQuote {
                tier: tier.name.clone(),
                discount: tier.max_discount,
                arrears,
                minimum: Self::minimum_for_discount(arrears, tier.max_discount),
            })
            .collect();
        quotes.sort_by(|a, b| a.discount.total_cmp(&b.discount));
        quotes
    }

    /// The lowest amount policy allows at any tier
    pub fn policy_floor(&self, arrears: f64) -> f64 {
        Self::minimum_for_discount(arrears, self.policy_discount())
    }

    /// Check a proposal against arrears and a floor.
    ///
    /// Over arrears is `InvalidSettlement`, compared exactly: arrears carry
    /// fractions of a cent, and nothing above them is ever accepted. Under the
    /// floor is `BelowPolicyFloor`, compared in whole cents.
    pub fn validate(arrears: f64, proposed: f64, minimum: f64) -> EnforcementResult<()> {
        if proposed > arrears {
            return Err(EnforcementError::InvalidSettlement { proposed, arrears });
        }
        if to_cents(proposed) < to_cents(minimum) || proposed < 0.0 {
            return Err(EnforcementError::BelowPolicyFloor { proposed, minimum });
        }
        Ok(())
    }

    /// Validate against the deepest discount policy allows
    pub fn validate_against_policy(&self, arrears: f64, proposed: f64) -> EnforcementResult<()> {
        Self::validate(arrears, proposed, self.policy_floor(arrears))
    }

    pub fn validate_for_tier(&self, arrears: f64, proposed: f64, tier_name: &str) -> EnforcementResult<()> {
        let quote = self.propose(arrears, tier_name)?;
        Self::validate(arrears, proposed, quote.minimum)
    }

    /// Payment-plan terms for paying off `principal` at a discount over `term_months`.
    ///
    /// A zero-month term means a lump sum: monthly figures are zero and no
    /// interest accrues.
    pub fn payment_plan(
        &self,
        principal: f64,
        discount: f64,
        annual_interest_rate: f64,
        term_months: u32,
    ) -> SettlementTerms {
        let settled_amount = Self::minimum_for_discount(principal, discount);
        let years = term_months as f64 / 12.0;
        let total_with_interest = settled_amount * (1.0 + annual_interest_rate * years);
        let (monthly_no_interest, monthly_with_interest) = if term_months == 0 {
            (0.0, 0.0)
        } else {
            (
                settled_amount / term_months as f64,
                total_with_interest / term_months as f64,
            )
        };
        let litigation_estimate = principal * (1.0 + self.litigation_premium);

        SettlementTerms {
            principal,
            discount,
            annual_interest_rate,
            term_months,
            settled_amount,
            monthly_no_interest,
            total_with_interest,
            monthly_with_interest,
            savings_vs_full: principal - settled_amount,
            litigation_estimate,
            savings_vs_litigation: litigation_estimate - total_with_interest,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SettlementEngine {
        SettlementEngine::from_config(&EnforcementConfig::default())
    }

    #[test]
    fn test_minimum_per_tier() {
        let engine = engine();

        let quote = engine.propose(100_000.0, "prompt-pay").unwrap();
        assert!((quote.minimum - 85_000.0).abs() < 1e-9);

        let quote = engine.propose(100_000.0, "LITIGATION-AVOIDANCE").unwrap();
        assert!((quote.minimum - 65_000.0).abs() < 1e-9);

        let quote = engine.propose(100_000.0, "full").unwrap();
        assert_eq!(quote.minimum, 100_000.0);
    }

    #[test]
    fn test_unknown_tier_is_rejected() {
        assert!(engine().propose(1_000.0, "platinum").is_err());
    }

    #[test]
    fn test_quotes_are_ordered_by_discount() {
        let quotes = engine().quote_all(10_000.0);
        let names: Vec<_> = quotes.iter().map(|q| q.tier.as_str()).collect();
        assert_eq!(names, vec!["full", "prompt-pay", "negotiated", "litigation-avoidance"]);
        assert!(quotes.windows(2).all(|w| w[0].minimum >= w[1].minimum));
    }

    #[test]
    fn test_over_arrears_is_invalid() {
        let engine = engine();
        let err = engine.validate_against_policy(10_000.0, 11_000.0).unwrap_err();
        assert_eq!(
            err,
            EnforcementError::InvalidSettlement {
                proposed: 11_000.0,
                arrears: 10_000.0
            }
        );
    }

    #[test]
    fn test_sub_cent_excess_is_invalid() {
        let engine = engine();
        assert!(matches!(
            engine.validate_against_policy(100.006, 100.009),
            Err(EnforcementError::InvalidSettlement { .. })
        ));
        assert!(matches!(
            engine.validate_for_tier(100.006, 100.009, "full"),
            Err(EnforcementError::InvalidSettlement { .. })
        ));
        assert!(engine.validate_against_policy(100.006, 100.006).is_ok());
    }

    #[test]
    fn test_under_floor_reports_minimum() {
        let engine = engine();
        match engine.validate_for_tier(10_000.0, 8_000.0, "prompt-pay") {
            Err(EnforcementError::BelowPolicyFloor { proposed, minimum }) => {
                assert_eq!(proposed, 8_000.0);
                assert!((minimum - 8_500.0).abs() < 1e-9);
            }
            other => panic!("expected BelowPolicyFloor, got {:?}", other),
        }

        // Same amount clears the deepest policy tier
        assert!(engine.validate_against_policy(10_000.0, 8_000.0).is_ok());
    }

    #[test]
    fn test_exact_arrears_and_exact_floor_are_accepted() {
        let engine = engine();
        assert!(engine.validate_against_policy(43_744.24, 43_744.24).is_ok());
        assert!(engine
            .validate_for_tier(43_744.24, 43_744.24 * 0.75, "negotiated")
            .is_ok());
    }

    #[test]
    fn test_zero_arrears_settles_for_zero_only() {
        let engine = engine();
        assert!(engine.validate_against_policy(0.0, 0.0).is_ok());
        assert!(engine.validate_against_policy(0.0, 1.0).is_err());
    }

    #[test]
    fn test_payment_plan() {
        let terms = engine().payment_plan(100_000.0, 0.15, 0.02, 12);

        assert!((terms.settled_amount - 85_000.0).abs() < 1e-9);
        assert!((terms.total_with_interest - 86_700.0).abs() < 1e-9);
        assert!((terms.monthly_with_interest - 7_225.0).abs() < 1e-9);
        assert!((terms.monthly_no_interest - 85_000.0 / 12.0).abs() < 1e-9);
        assert!((terms.savings_vs_full - 15_000.0).abs() < 1e-9);
        assert!((terms.litigation_estimate - 140_000.0).abs() < 1e-9);
        assert!((terms.savings_vs_litigation - 53_300.0).abs() < 1e-9);
    }

    #[test]
    fn test_lump_sum_plan() {
        let terms = engine().payment_plan(5_000.0, 0.0, 0.05, 0);
        assert_eq!(terms.settled_amount, 5_000.0);
        assert_eq!(terms.total_with_interest, 5_000.0);
        assert_eq!(terms.monthly_with_interest, 0.0);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn proposal_never_exceeds_arrears(arrears in 0.0f64..2_000_000.0, discount in 0.0f64..=1.0) {
            let minimum = SettlementEngine::minimum_for_discount(arrears, discount);
            prop_assert!(minimum <= arrears);
            prop_assert!(minimum >= 0.0);
        }

        #[test]
        fn validation_never_accepts_more_than_owed(
            arrears in 0.0f64..2_000_000.0,
            excess in 1e-6f64..100_000.0,
        ) {
            let engine = SettlementEngine::from_config(&EnforcementConfig::default());
            let proposed = arrears + excess;
            prop_assume!(proposed > arrears);
            let is_invalid = matches!(
                engine.validate_against_policy(arrears, proposed),
                Err(EnforcementError::InvalidSettlement { .. })
            );
            prop_assert!(is_invalid);
        }

        #[test]
        fn every_tier_quote_validates(arrears in 0.0f64..2_000_000.0) {
            let engine = SettlementEngine::from_config(&EnforcementConfig::default());
            for quote in engine.quote_all(arrears) {
                prop_assert!(engine.validate_for_tier(arrears, quote.minimum, &quote.tier).is_ok());
            }
        }
    }
}
