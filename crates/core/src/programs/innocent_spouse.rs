use super::common;
use crate::condition::Condition;
use crate::domain::profile::{Circumstance, FilingStatus, ProfileFacts};
use crate::domain::program::{ConfidenceTier, ProgramCategory, ProgramMetadata};
use crate::eligibility::heuristics::Heuristics;
use crate::eligibility::rule::{ConfidenceRule, Disqualification, EligibilityRule};
use crate::validators::FieldRule;
use crate::workflow::definition::{Derivation, FieldSpec, ProgramDefinition, StepDefinition};

pub const ID: &str = "innocent_spouse";

const REQUIRED_DOCUMENTS: usize = 1;

pub fn definition(_heuristics: &Heuristics) -> ProgramDefinition {
    ProgramDefinition {
        id: ID,
        version: 1,
        name: "Innocent Spouse Relief",
        category: ProgramCategory::SpousalRelief,
        summary: "Separate your liability from tax understated by a spouse or former spouse.",
        steps: vec![
            common::personal_step(),
            StepDefinition::new("joint_return", "Joint return")
                .field(FieldSpec::text("joint_tax_years", "Tax years filed jointly"))
                .field(FieldSpec::text("spouse_full_name", "Spouse or former spouse name"))
                .field(FieldSpec::identifier("spouse_ssn", "Spouse social security number", FieldRule::Ssn))
                .field(FieldSpec::flag("still_married", "Are you still married to this person?"))
                .field(
                    FieldSpec::date("separation_date", "Date of separation or divorce")
                        .required_if(Condition::IsFalse("still_married")),
                )
                .field(FieldSpec::currency("understated_tax", "Understated tax on the joint return")),
            StepDefinition::new("knowledge", "What you knew")
                .field(FieldSpec::flag(
                    "knew_of_understatement",
                    "Did you know about the understatement when you signed?",
                ))
                .field(FieldSpec::narrative(
                    "knowledge_explanation",
                    "Describe your involvement in the household finances",
                    common::NARRATIVE_MIN_CHARS,
                ))
                .field(FieldSpec::flag(
                    "abuse_or_control",
                    "Were you subject to abuse or financial control?",
                )),
            StepDefinition::new("abuse_details", "Abuse or financial control")
                .include_when(Condition::IsTrue("abuse_or_control"))
                .field(FieldSpec::narrative(
                    "abuse_description",
                    "Describe how the abuse or control affected the return",
                    common::NARRATIVE_MIN_CHARS,
                ))
                .field(FieldSpec::flag(
                    "abuse_documentation_available",
                    "Do you have documentation such as protective orders?",
                )),
            StepDefinition::new("financials", "Allocation")
                .field(FieldSpec::currency("attributable_to_you", "Portion attributable to your own income"))
                .field(FieldSpec::currency("current_monthly_income", "Your current monthly income"))
                .derive(
                    "requested_relief",
                    "Relief requested",
                    Derivation::FlooredDifference {
                        minuend: "understated_tax",
                        subtrahend: "attributable_to_you",
                    },
                ),
            common::documents_step(REQUIRED_DOCUMENTS),
            common::review_step(),
        ],
        certifications: common::certifications(),
        eligibility: EligibilityRule {
            applies,
            qualifies,
            confidence: ConfidenceRule::Tiered(confidence),
            disqualifications: vec![Disqualification {
                code: "still_jointly_liable",
                message: "Relief from a joint liability is rarely granted while the household is intact; separation or divorce is usually required.",
                when: not_divorced,
            }],
            fallback_reason: "Spousal relief does not fit the information provided.",
            pauses_collection: true,
        },
        metadata: ProgramMetadata {
            timeline_weeks: (26, 78),
            savings_pct: (50, 100),
            success_rate_pct: 45,
            cost_range: "$0",
        },
    }
}

/// Only meaningful for people who filed jointly or have since divorced.
fn applies(facts: &ProfileFacts, _: &Heuristics) -> bool {
    matches!(facts.filing_status, FilingStatus::MarriedJoint | FilingStatus::MarriedSeparate)
        || facts.has(Circumstance::Divorce)
}

fn qualifies(facts: &ProfileFacts, _: &Heuristics) -> bool {
    facts.has(Circumstance::Divorce)
}

fn not_divorced(facts: &ProfileFacts, _: &Heuristics) -> bool {
    !facts.has(Circumstance::Divorce)
}

/// Filing on one's own again after the divorce is the strongest separation signal.
fn confidence(facts: &ProfileFacts, _: &Heuristics) -> ConfidenceTier {
    match facts.filing_status {
        FilingStatus::Single | FilingStatus::HeadOfHousehold => ConfidenceTier::High,
        _ => ConfidenceTier::Medium,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::definition;
    use crate::domain::profile::{FilingStatus, Profile, ProfileFacts};
    use crate::domain::session::{DerivedValue, SessionId};
    use crate::eligibility::heuristics::Heuristics;
    use crate::workflow::engine::WorkflowEngine;
    use rust_decimal::Decimal;

    #[test]
    fn married_without_divorce_is_evaluated_but_not_qualified() {
        let heuristics = Heuristics::default();
        let program = definition(&heuristics);
        let facts = ProfileFacts::from_profile(&Profile {
            filing_status: FilingStatus::MarriedJoint,
            ..Profile::default()
        });

        assert!(program.eligibility.applies(&facts, &heuristics));
        let assessment = program.eligibility.assess(&facts, &heuristics);
        assert!(!assessment.qualified);
        assert_eq!(
            assessment.disqualification.map(|(code, _)| code),
            Some("still_jointly_liable".to_string())
        );
    }

    #[test]
    fn separation_date_and_abuse_step_follow_answers() {
        let program = definition(&Heuristics::default());
        let engine = WorkflowEngine::new(&program);
        let session = engine.start(SessionId("WS-is".to_string()));

        let separated = engine.set_field(&session, "still_married", json!("no")).expect("flag");
        let separation = program.field("separation_date").expect("separation field");
        assert!(separation.requirement.is_required(&separated.answers));

        let abused = engine.set_field(&separated, "abuse_or_control", json!(true)).expect("flag");
        assert!(engine
            .visible_fields(&abused)
            .iter()
            .any(|field| field.key == "abuse_description" && field.required));
        assert!(!engine.visible_fields(&separated).iter().any(|field| field.key == "abuse_description"));
    }

    #[test]
    fn requested_relief_combines_return_and_allocation_steps() {
        let program = definition(&Heuristics::default());
        let engine = WorkflowEngine::new(&program);
        let session = engine.start(SessionId("WS-is".to_string()));

        let session = engine.set_field(&session, "understated_tax", json!("18000")).expect("tax");
        let session = engine.set_field(&session, "attributable_to_you", json!("4500")).expect("share");
        assert_eq!(
            session.derived.get("requested_relief"),
            Some(&DerivedValue::Amount(Decimal::from(13_500)))
        );
    }
}
