use rust_decimal::Decimal;

use super::common;
use crate::condition::Condition;
use crate::domain::profile::ProfileFacts;
use crate::domain::program::{ConfidenceTier, ProgramCategory, ProgramMetadata};
use crate::eligibility::heuristics::Heuristics;
use crate::eligibility::rule::{
    always, returns_not_filed, ConfidenceRule, Disqualification, EligibilityRule,
};
use crate::validators::FieldRule;
use crate::workflow::definition::{Derivation, FieldSpec, ProgramDefinition, StepDefinition};

pub const ID: &str = "installment_agreement";

const PAYMENT_METHODS: &[&str] = &["direct_debit", "payroll_deduction", "check", "online"];
const ACCOUNT_TYPES: &[&str] = &["checking", "savings"];
const MINIMUM_MONTHLY_PAYMENT: i64 = 25;

pub fn definition(heuristics: &Heuristics) -> ProgramDefinition {
    ProgramDefinition {
        id: ID,
        version: 1,
        name: "Installment Agreement",
        category: ProgramCategory::PaymentPlan,
        summary: "Pay the full balance in monthly installments.",
        steps: vec![
            common::personal_step(),
            StepDefinition::new("debt", "Balance owed")
                .field(
                    FieldSpec::currency("tax_debt_amount", "Total balance owed")
                        .rule(FieldRule::MinAmount(Decimal::ONE)),
                )
                .field(FieldSpec::text("tax_years", "Tax years owed"))
                .field(FieldSpec::flag("notice_received", "Have you received a collection notice?")),
            common::income_step(common::INCOME_FIELDS),
            common::expenses_step(),
            StepDefinition::new("payment", "Proposed payment")
                .field(
                    FieldSpec::currency("proposed_monthly_payment", "Proposed monthly payment")
                        .rule(FieldRule::MinAmount(Decimal::from(MINIMUM_MONTHLY_PAYMENT))),
                )
                .field(FieldSpec::integer("payment_day", "Day of month to pay", 1, 28))
                .field(FieldSpec::choice("payment_method", "Payment method", PAYMENT_METHODS))
                .derive(
                    "payoff_months",
                    "Estimated months to pay off",
                    Derivation::PayoffMonths {
                        principal: "tax_debt_amount",
                        payment: "proposed_monthly_payment",
                        annual_rate_pct: heuristics.installment_annual_rate_pct,
                    },
                ),
            StepDefinition::new("bank_details", "Direct debit account")
                .include_when(Condition::equals("payment_method", "direct_debit"))
                .field(FieldSpec::identifier("routing_number", "Routing number", FieldRule::RoutingNumber))
                .field(FieldSpec::identifier("account_number", "Account number", FieldRule::BankAccount))
                .field(FieldSpec::choice("account_type", "Account type", ACCOUNT_TYPES)),
            common::review_step(),
        ],
        certifications: common::certifications(),
        eligibility: EligibilityRule {
            applies: always,
            qualifies,
            confidence: ConfidenceRule::Tiered(confidence),
            disqualifications: vec![
                Disqualification {
                    code: "unfiled_returns",
                    message: "All required tax returns must be filed before a payment plan can be approved.",
                    when: returns_not_filed,
                },
                Disqualification {
                    code: "no_balance",
                    message: "No outstanding balance was reported, so there is nothing to pay in installments.",
                    when: no_balance,
                },
            ],
            fallback_reason: "A payment plan does not fit the information provided.",
            pauses_collection: true,
        },
        metadata: ProgramMetadata {
            timeline_weeks: (2, 6),
            savings_pct: (0, 5),
            success_rate_pct: 90,
            cost_range: "$0 - $225 setup fee",
        },
    }
}

fn qualifies(facts: &ProfileFacts, _: &Heuristics) -> bool {
    facts.all_returns_filed && facts.debt_amount > Decimal::ZERO
}

fn no_balance(facts: &ProfileFacts, _: &Heuristics) -> bool {
    facts.debt_amount <= Decimal::ZERO
}

/// Streamlined balances are near-automatic; up to twice that usually still clears.
fn confidence(facts: &ProfileFacts, heuristics: &Heuristics) -> ConfidenceTier {
    let ceiling = heuristics.streamlined_installment_ceiling;
    if facts.debt_amount <= ceiling {
        ConfidenceTier::High
    } else if facts.debt_amount <= ceiling.saturating_mul(Decimal::TWO) {
        ConfidenceTier::Medium
    } else {
        ConfidenceTier::Low
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{definition, ID};
    use crate::domain::profile::{Profile, ProfileFacts};
    use crate::domain::program::ConfidenceTier;
    use crate::domain::session::{DerivedValue, SessionId};
    use crate::eligibility::heuristics::Heuristics;
    use crate::finance::PayoffEstimate;
    use crate::workflow::engine::WorkflowEngine;

    fn facts(total_debt: &str) -> ProfileFacts {
        ProfileFacts::from_profile(&Profile {
            total_debt: total_debt.to_string(),
            all_returns_filed: Some(true),
            ..Profile::default()
        })
    }

    #[test]
    fn confidence_steps_down_with_balance_size() {
        let heuristics = Heuristics::default();
        let program = definition(&heuristics);

        let tier = |debt: &str| program.eligibility.assess(&facts(debt), &heuristics).confidence;
        assert_eq!(tier("25k-50k"), ConfidenceTier::High);
        assert_eq!(tier("50k-100k"), ConfidenceTier::Medium);
        assert_eq!(tier("over-100k"), ConfidenceTier::Low);
    }

    #[test]
    fn unknown_balance_is_disqualified_with_reason() {
        let heuristics = Heuristics::default();
        let assessment = definition(&heuristics).eligibility.assess(&facts("lots"), &heuristics);

        assert!(!assessment.qualified);
        assert_eq!(
            assessment.disqualification.map(|(code, _)| code),
            Some("no_balance".to_string())
        );
    }

    #[test]
    fn bank_details_step_appears_only_for_direct_debit() {
        let program = definition(&Heuristics::default());
        let engine = WorkflowEngine::new(&program);
        let session = engine.start(SessionId("WS-ia".to_string()));

        let has_bank_step = |session: &crate::domain::session::WorkflowSession| {
            engine.effective_steps(&session.answers).iter().any(|(_, step)| step.id == "bank_details")
        };
        assert!(!has_bank_step(&session));

        let debit = engine
            .set_field(&session, "payment_method", json!("direct_debit"))
            .expect("payment method accepted");
        assert!(has_bank_step(&debit));
        assert_eq!(program.id, ID);
    }

    #[test]
    fn payoff_is_derived_across_debt_and_payment_steps() {
        let program = definition(&Heuristics::default());
        let engine = WorkflowEngine::new(&program);
        let session = engine.start(SessionId("WS-ia".to_string()));

        let session = engine.set_field(&session, "tax_debt_amount", json!("12,000")).expect("debt");
        let session =
            engine.set_field(&session, "proposed_monthly_payment", json!("50")).expect("payment");
        assert_eq!(
            session.derived.get("payoff_months"),
            Some(&DerivedValue::Payoff(PayoffEstimate::NeverPaysOff))
        );

        let session =
            engine.set_field(&session, "proposed_monthly_payment", json!("500")).expect("payment");
        let months = match session.derived.get("payoff_months") {
            Some(DerivedValue::Payoff(estimate)) => estimate.months(),
            _ => None,
        };
        assert!(months.is_some_and(|months| months > 24 && months <= 30));
    }
}
