use rust_decimal::Decimal;

use super::common;
use crate::condition::Condition;
use crate::domain::profile::ProfileFacts;
use crate::domain::program::{ConfidenceTier, ProgramCategory, ProgramMetadata};
use crate::eligibility::heuristics::Heuristics;
use crate::eligibility::rule::{
    always, returns_filed, returns_not_filed, ConfidenceRule, Disqualification, EligibilityRule,
};
use crate::validators::FieldRule;
use crate::workflow::definition::{
    Derivation, FieldKind, FieldSpec, ProgramDefinition, StepDefinition,
};

pub const ID: &str = "penalty_abatement";

const PENALTY_TYPES: &[&str] =
    &["failure_to_file", "failure_to_pay", "failure_to_deposit", "accuracy"];
const ABATEMENT_BASES: &[&str] = &["first_time", "reasonable_cause"];
const CAUSE_TYPES: &[&str] =
    &["serious_illness", "death_in_family", "natural_disaster", "records_unavailable", "other"];

pub fn definition(_heuristics: &Heuristics) -> ProgramDefinition {
    let reasonable_cause = || Condition::equals("abatement_basis", "reasonable_cause");

    ProgramDefinition {
        id: ID,
        version: 1,
        name: "Penalty Abatement",
        category: ProgramCategory::PenaltyRelief,
        summary: "Remove penalties for a clean history or a reasonable cause.",
        steps: vec![
            common::personal_step(),
            StepDefinition::new("penalty", "Penalty details")
                .field(FieldSpec::choice("penalty_type", "Penalty type", PENALTY_TYPES))
                .field(FieldSpec::integer("penalty_tax_year", "Tax year", 1990, 2100))
                .field(
                    FieldSpec::currency("penalty_amount", "Penalty amount")
                        .rule(FieldRule::MinAmount(Decimal::ONE)),
                )
                .field(FieldSpec::text("notice_number", "Notice number").optional()),
            StepDefinition::new("abatement_basis", "Basis for relief")
                .field(FieldSpec::choice("abatement_basis", "Basis for relief", ABATEMENT_BASES))
                .field(FieldSpec::flag(
                    "prior_penalties_three_years",
                    "Any penalties in the prior three years?",
                )),
            StepDefinition::new("reasonable_cause", "Reasonable cause")
                .include_when(reasonable_cause())
                .field(FieldSpec::choice("cause_type", "What happened?", CAUSE_TYPES))
                .field(FieldSpec::date("cause_start_date", "Start date"))
                .field(
                    FieldSpec::date("cause_end_date", "End date")
                        .rule(FieldRule::DateNotBefore("cause_start_date")),
                )
                .field(FieldSpec::narrative(
                    "cause_explanation",
                    "Explain how this prevented you from complying",
                    common::NARRATIVE_MIN_CHARS,
                ))
                .derive(
                    "cause_duration_days",
                    "Days affected",
                    Derivation::DaysBetween { start: "cause_start_date", end: "cause_end_date" },
                ),
            StepDefinition::new("balance", "Balance status")
                .field(FieldSpec::currency("penalty_interest_amount", "Interest charged on the penalty").optional())
                .field(FieldSpec::flag("tax_balance_paid", "Is the underlying tax paid?"))
                .field(
                    FieldSpec::flag("payment_plan_in_place", "Is a payment plan in place?")
                        .required_if(Condition::IsFalse("tax_balance_paid")),
                )
                .derive(
                    "total_relief_requested",
                    "Total relief requested",
                    Derivation::Sum(&["penalty_amount", "penalty_interest_amount"]),
                ),
            StepDefinition::new("compliance", "Filing compliance")
                .field(
                    FieldSpec::new(
                        "returns_filed_confirmed",
                        "All required returns are filed",
                        FieldKind::Flag,
                    )
                    .rule(FieldRule::Affirmed),
                ),
            StepDefinition::new("documents", "Supporting documents")
                .field(
                    FieldSpec::documents("supporting_documents", "Supporting documents", 1)
                        .required_if(reasonable_cause()),
                )
                .derive("document_count", "Documents attached", Derivation::DocumentCount),
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
                    message: "Penalty relief requires all required returns to be filed.",
                    when: returns_not_filed,
                },
                Disqualification {
                    code: "prior_relief_without_cause",
                    message: "First-time relief was already used and no qualifying reasonable cause was reported.",
                    when: prior_relief_without_cause,
                },
            ],
            fallback_reason: "Penalty relief does not fit the information provided.",
            pauses_collection: false,
        },
        metadata: ProgramMetadata {
            timeline_weeks: (4, 16),
            savings_pct: (5, 25),
            success_rate_pct: 60,
            cost_range: "$0",
        },
    }
}

fn qualifies(facts: &ProfileFacts, heuristics: &Heuristics) -> bool {
    returns_filed(facts, heuristics) && !prior_relief_without_cause(facts, heuristics)
}

fn prior_relief_without_cause(facts: &ProfileFacts, _: &Heuristics) -> bool {
    facts.prior_relief_received && !facts.has_reasonable_cause()
}

/// First-time relief is close to automatic; reasonable cause is judged case by case.
fn confidence(facts: &ProfileFacts, _: &Heuristics) -> ConfidenceTier {
    if facts.prior_relief_received {
        ConfidenceTier::Medium
    } else {
        ConfidenceTier::High
    }
}
