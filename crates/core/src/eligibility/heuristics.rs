use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::profile::ProfileFacts;
use crate::domain::program::ConfidenceThresholds;
use crate::finance::{collection_potential, quick_sale_equity};

/// Simplified collection heuristics. These are tunable approximations, not
/// authoritative determinations; every value can be replaced from configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Heuristics {
    /// Monthly living allowance subtracted from net income.
    pub standard_monthly_allowance: Decimal,
    pub collection_horizon_months: u32,
    /// Share of home equity realised in a forced sale.
    pub quick_sale_factor: Decimal,
    /// Share of retirement balances counted after early-withdrawal costs.
    pub retirement_factor: Decimal,
    /// Liquid assets above this rule out a hardship status.
    pub hardship_liquid_ceiling: Decimal,
    pub streamlined_installment_ceiling: Decimal,
    pub max_installment_term_months: u32,
    /// Annual rate used to project installment payoff.
    pub installment_annual_rate_pct: Decimal,
    pub settlement_minimum_debt: Decimal,
    pub thresholds: ConfidenceThresholds,
}

impl Default for Heuristics {
    fn default() -> Self {
        Self {
            standard_monthly_allowance: Decimal::from(2_000),
            collection_horizon_months: 12,
            quick_sale_factor: Decimal::new(8, 1),
            retirement_factor: Decimal::new(6, 1),
            hardship_liquid_ceiling: Decimal::from(5_000),
            streamlined_installment_ceiling: Decimal::from(50_000),
            max_installment_term_months: 72,
            installment_annual_rate_pct: Decimal::from(7),
            settlement_minimum_debt: Decimal::from(10_000),
            thresholds: ConfidenceThresholds::default(),
        }
    }
}

impl Heuristics {
    /// Net income left after the standard allowance; may be negative.
    pub fn monthly_disposable_income(&self, facts: &ProfileFacts) -> Decimal {
        facts.monthly_net_income.saturating_sub(self.standard_monthly_allowance)
    }

    pub fn asset_equity(&self, facts: &ProfileFacts) -> Decimal {
        facts
            .bank_balance
            .saturating_add(facts.retirement_balance.saturating_mul(self.retirement_factor))
            .saturating_add(quick_sale_equity(facts.home_equity, Decimal::ZERO, self.quick_sale_factor))
    }

    pub fn collection_potential(&self, facts: &ProfileFacts) -> Decimal {
        collection_potential(
            self.monthly_disposable_income(facts),
            self.asset_equity(facts),
            self.collection_horizon_months,
        )
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.standard_monthly_allowance <= Decimal::ZERO {
            return Err("heuristics.standard_monthly_allowance must be positive".to_string());
        }
        if self.collection_horizon_months == 0 {
            return Err("heuristics.collection_horizon_months must be positive".to_string());
        }
        if self.max_installment_term_months == 0 {
            return Err("heuristics.max_installment_term_months must be positive".to_string());
        }
        for (name, factor) in
            [("quick_sale_factor", self.quick_sale_factor), ("retirement_factor", self.retirement_factor)]
        {
            if factor < Decimal::ZERO || factor > Decimal::ONE {
                return Err(format!("heuristics.{name} must be between 0 and 1"));
            }
        }
        for (name, amount) in [
            ("hardship_liquid_ceiling", self.hardship_liquid_ceiling),
            ("streamlined_installment_ceiling", self.streamlined_installment_ceiling),
            ("installment_annual_rate_pct", self.installment_annual_rate_pct),
            ("settlement_minimum_debt", self.settlement_minimum_debt),
        ] {
            if amount < Decimal::ZERO {
                return Err(format!("heuristics.{name} cannot be negative"));
            }
        }

        let ConfidenceThresholds { high, medium } = self.thresholds;
        if !(0.0..=1.0).contains(&medium) || !(0.0..=1.0).contains(&high) || medium >= high {
            return Err(
                "heuristics.thresholds must satisfy 0 <= medium < high <= 1".to_string(),
            );
        }
        Ok(())
    }
}
