use super::common;
use crate::condition::Condition;
use crate::domain::profile::ProfileFacts;
use crate::domain::program::{ProgramCategory, ProgramMetadata};
use crate::eligibility::heuristics::Heuristics;
use crate::eligibility::rule::{
    always, medium_without_hardship, ConfidenceRule, Disqualification, EligibilityRule,
};
use crate::finance::clamped_ratio;
use crate::validators::FieldRule;
use crate::workflow::definition::{Derivation, FieldSpec, ProgramDefinition, StepDefinition};

pub const ID: &str = "currently_not_collectible";

const EMERGENCY_TYPES: &[&str] =
    &["medical", "eviction", "utility_shutoff", "vehicle_repossession", "other"];
const REQUIRED_DOCUMENTS: usize = 2;

pub fn definition(_heuristics: &Heuristics) -> ProgramDefinition {
    ProgramDefinition {
        id: ID,
        version: 1,
        name: "Currently Not Collectible",
        category: ProgramCategory::HardshipRelief,
        summary: "Pause collection while income does not cover basic living expenses.",
        steps: vec![
            common::personal_step(),
            StepDefinition::new("employment", "Employment")
                .field(FieldSpec::choice(
                    "employment_status",
                    "Employment status",
                    common::EMPLOYMENT_STATUSES,
                ))
                .field(FieldSpec::text("employer_name", "Current employer").optional()),
            StepDefinition::new("last_employment", "Last employment")
                .include_when(Condition::equals("employment_status", "unemployed"))
                .field(FieldSpec::text("last_employer_name", "Last employer"))
                .field(FieldSpec::date("last_employment_date", "Last day of employment"))
                .field(FieldSpec::flag("receiving_unemployment", "Are you receiving unemployment benefits?")),
            StepDefinition::new("emergency", "Emergencies")
                .field(FieldSpec::flag("has_emergency", "Are you facing a financial emergency?")),
            StepDefinition::new("emergency_details", "Emergency details")
                .include_when(Condition::IsTrue("has_emergency"))
                .field(FieldSpec::choice("emergency_type", "Type of emergency", EMERGENCY_TYPES))
                .field(FieldSpec::currency("emergency_cost", "Estimated cost"))
                .field(FieldSpec::date("emergency_date", "When did it start?"))
                .field(FieldSpec::narrative(
                    "emergency_description",
                    "Describe the emergency",
                    common::NARRATIVE_MIN_CHARS,
                )),
            common::income_step(common::INCOME_FIELDS),
            common::expenses_step(),
            StepDefinition::new("hardship", "Hardship")
                .field(FieldSpec::narrative(
                    "hardship_explanation",
                    "Explain why you cannot pay anything right now",
                    common::NARRATIVE_MIN_CHARS,
                ))
                .field(FieldSpec::date("hardship_start_date", "When did the hardship begin?"))
                .field(
                    FieldSpec::date("hardship_expected_end", "When do you expect it to end?")
                        .optional()
                        .rule(FieldRule::DateNotBefore("hardship_start_date")),
                )
                .derive(
                    "monthly_shortfall",
                    "Monthly shortfall",
                    Derivation::FlooredDifference {
                        minuend: "total_monthly_expenses",
                        subtrahend: "total_monthly_income",
                    },
                ),
            common::documents_step(REQUIRED_DOCUMENTS),
            common::review_step(),
        ],
        certifications: common::certifications(),
        eligibility: EligibilityRule {
            applies: always,
            qualifies,
            confidence: ConfidenceRule::Scored { score, ceiling: Some(medium_without_hardship) },
            disqualifications: vec![
                Disqualification {
                    code: "income_above_allowance",
                    message: "Your monthly income exceeds the standard living allowance, so collection is unlikely to be paused.",
                    when: income_above_allowance,
                },
                Disqualification {
                    code: "liquid_assets_available",
                    message: "Available cash exceeds the hardship limit and would be expected to go toward the balance first.",
                    when: liquid_assets_available,
                },
            ],
            fallback_reason: "A hardship status does not fit the information provided.",
            pauses_collection: true,
        },
        metadata: ProgramMetadata {
            timeline_weeks: (4, 12),
            savings_pct: (0, 10),
            success_rate_pct: 70,
            cost_range: "$0",
        },
    }
}

fn qualifies(facts: &ProfileFacts, heuristics: &Heuristics) -> bool {
    !income_above_allowance(facts, heuristics) && !liquid_assets_available(facts, heuristics)
}

fn income_above_allowance(facts: &ProfileFacts, heuristics: &Heuristics) -> bool {
    facts.monthly_net_income > heuristics.standard_monthly_allowance
}

fn liquid_assets_available(facts: &ProfileFacts, heuristics: &Heuristics) -> bool {
    facts.bank_balance > heuristics.hardship_liquid_ceiling
}

/// How far income falls below the allowance, as a share of the allowance.
fn score(facts: &ProfileFacts, heuristics: &Heuristics) -> f64 {
    let allowance = heuristics.standard_monthly_allowance;
    clamped_ratio(allowance - facts.monthly_net_income, allowance)
}
