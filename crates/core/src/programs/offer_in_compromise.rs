use rust_decimal::Decimal;

use super::common;
use crate::condition::Condition;
use crate::domain::profile::ProfileFacts;
use crate::domain::program::{ProgramCategory, ProgramMetadata};
use crate::eligibility::heuristics::Heuristics;
use crate::eligibility::rule::{
    medium_without_hardship, returns_filed, returns_not_filed, ConfidenceRule, Disqualification,
    EligibilityRule,
};
use crate::finance::clamped_ratio;
use crate::validators::FieldRule;
use crate::workflow::definition::{Derivation, FieldSpec, ProgramDefinition, StepDefinition};

pub const ID: &str = "offer_in_compromise";

const PAYMENT_OPTIONS: &[&str] = &["lump_sum", "periodic"];
const REQUIRED_DOCUMENTS: usize = 3;

const INCOME_TOTAL_KEYS: &[&str] = &[
    "wages",
    "business_net_income",
    "social_security",
    "pension",
    "rental_income",
    "other_income",
];

const ASSET_EQUITY_KEYS: &[&str] =
    &["bank_accounts_total", "investments_total", "home_equity", "vehicle_equity"];

pub fn definition(heuristics: &Heuristics) -> ProgramDefinition {
    ProgramDefinition {
        id: ID,
        version: 1,
        name: "Offer in Compromise",
        category: ProgramCategory::Settlement,
        summary: "Settle the balance for less than the full amount owed.",
        steps: vec![
            common::personal_step(),
            StepDefinition::new("debt", "Balance owed")
                .field(
                    FieldSpec::currency("tax_debt_amount", "Total balance owed")
                        .rule(FieldRule::MinAmount(Decimal::ONE)),
                )
                .field(FieldSpec::text("tax_years", "Tax years owed")),
            StepDefinition::new("employment", "Employment")
                .field(FieldSpec::choice(
                    "employment_status",
                    "Employment status",
                    common::EMPLOYMENT_STATUSES,
                ))
                .field(
                    FieldSpec::text("employer_name", "Employer name")
                        .required_if(Condition::equals("employment_status", "employed")),
                ),
            StepDefinition::new("self_employment", "Self-employment")
                .include_when(Condition::equals("employment_status", "self_employed"))
                .field(FieldSpec::text("business_name", "Business name"))
                .field(
                    FieldSpec::identifier("business_ein", "Employer identification number", FieldRule::Ein)
                        .optional(),
                )
                .field(FieldSpec::currency("gross_monthly_receipts", "Gross monthly receipts"))
                .field(FieldSpec::currency("monthly_business_expenses", "Monthly business expenses"))
                .derive(
                    "business_net_income",
                    "Net business income",
                    Derivation::FlooredDifference {
                        minuend: "gross_monthly_receipts",
                        subtrahend: "monthly_business_expenses",
                    },
                ),
            common::income_step(INCOME_TOTAL_KEYS),
            common::expenses_step(),
            StepDefinition::new("assets", "Assets")
                .field(FieldSpec::currency("bank_accounts_total", "Cash and bank accounts"))
                .field(FieldSpec::currency("investments_total", "Investments and retirement").optional())
                .field(FieldSpec::currency("home_value", "Home market value").optional())
                .field(FieldSpec::currency("mortgage_balance", "Mortgage balance").optional())
                .field(FieldSpec::currency("vehicle_value", "Vehicle market value").optional())
                .field(FieldSpec::currency("vehicle_loan_balance", "Vehicle loan balance").optional())
                .derive(
                    "home_equity",
                    "Home equity at quick sale",
                    Derivation::QuickSaleEquity {
                        value: "home_value",
                        encumbrance: "mortgage_balance",
                        factor: heuristics.quick_sale_factor,
                    },
                )
                .derive(
                    "vehicle_equity",
                    "Vehicle equity at quick sale",
                    Derivation::QuickSaleEquity {
                        value: "vehicle_value",
                        encumbrance: "vehicle_loan_balance",
                        factor: heuristics.quick_sale_factor,
                    },
                )
                .derive("net_asset_equity", "Net asset equity", Derivation::Sum(ASSET_EQUITY_KEYS))
                .derive(
                    "monthly_disposable_income",
                    "Monthly disposable income",
                    Derivation::FlooredDifference {
                        minuend: "total_monthly_income",
                        subtrahend: "total_monthly_expenses",
                    },
                )
                .derive(
                    "reasonable_collection_potential",
                    "Reasonable collection potential",
                    Derivation::CollectionPotential {
                        monthly_income: "total_monthly_income",
                        monthly_expenses: "total_monthly_expenses",
                        equity: "net_asset_equity",
                        horizon_months: heuristics.collection_horizon_months,
                    },
                ),
            StepDefinition::new("offer", "Your offer")
                .field(
                    FieldSpec::currency("offer_amount", "Offer amount")
                        .rule(FieldRule::AtLeastDerived("reasonable_collection_potential")),
                )
                .field(FieldSpec::choice("payment_option", "Payment option", PAYMENT_OPTIONS))
                .field(FieldSpec::narrative(
                    "hardship_explanation",
                    "Why can you not pay the full balance?",
                    common::NARRATIVE_MIN_CHARS,
                )),
            common::documents_step(REQUIRED_DOCUMENTS),
            common::review_step(),
        ],
        certifications: common::certifications(),
        eligibility: EligibilityRule {
            applies,
            qualifies,
            confidence: ConfidenceRule::Scored { score, ceiling: Some(medium_without_hardship) },
            disqualifications: vec![
                Disqualification {
                    code: "unfiled_returns",
                    message: "All required tax returns must be filed before an offer is considered.",
                    when: returns_not_filed,
                },
                Disqualification {
                    code: "can_pay_in_full",
                    message: "Your estimated ability to pay covers the full balance, so a settlement is unlikely to be accepted.",
                    when: can_pay_in_full,
                },
            ],
            fallback_reason: "A settlement does not fit the information provided.",
            pauses_collection: true,
        },
        metadata: ProgramMetadata {
            timeline_weeks: (24, 104),
            savings_pct: (40, 90),
            success_rate_pct: 30,
            cost_range: "$205 application fee + 20% initial payment",
        },
    }
}

/// Settlements below the minimum balance are not worth the process and are skipped.
fn applies(facts: &ProfileFacts, heuristics: &Heuristics) -> bool {
    facts.debt_amount >= heuristics.settlement_minimum_debt
}

fn qualifies(facts: &ProfileFacts, heuristics: &Heuristics) -> bool {
    returns_filed(facts, heuristics) && !can_pay_in_full(facts, heuristics)
}

fn can_pay_in_full(facts: &ProfileFacts, heuristics: &Heuristics) -> bool {
    heuristics.collection_potential(facts) >= facts.debt_amount
}

/// Share of the balance that could not be collected.
fn score(facts: &ProfileFacts, heuristics: &Heuristics) -> f64 {
    1.0 - clamped_ratio(heuristics.collection_potential(facts), facts.debt_amount)
}
