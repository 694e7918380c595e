use crate::domain::profile::ProfileFacts;
use crate::domain::program::ConfidenceTier;
use crate::eligibility::heuristics::Heuristics;

pub type FactPredicate = fn(&ProfileFacts, &Heuristics) -> bool;
pub type FactScore = fn(&ProfileFacts, &Heuristics) -> f64;
pub type FactTier = fn(&ProfileFacts, &Heuristics) -> ConfidenceTier;

/// How a qualified program's confidence is decided.
#[derive(Clone, Copy, Debug)]
pub enum ConfidenceRule {
    /// Numeric score classified through the configured thresholds, optionally
    /// capped by a per-profile ceiling.
    Scored { score: FactScore, ceiling: Option<FactTier> },
    /// Direct tier decision with no numeric score.
    Tiered(FactTier),
}

#[derive(Clone, Copy, Debug)]
pub struct Disqualification {
    pub code: &'static str,
    pub message: &'static str,
    pub when: FactPredicate,
}

/// Pure predicate set for one program. Evaluated against coerced facts only.
#[derive(Clone, Debug)]
pub struct EligibilityRule {
    /// False means the program is skipped entirely rather than disqualified.
    pub applies: FactPredicate,
    pub qualifies: FactPredicate,
    pub confidence: ConfidenceRule,
    /// Checked in order; the first match explains a disqualification.
    pub disqualifications: Vec<Disqualification>,
    pub fallback_reason: &'static str,
    /// Whether an accepted application halts levies and garnishments.
    pub pauses_collection: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Assessment {
    pub qualified: bool,
    pub confidence: ConfidenceTier,
    pub score: Option<f64>,
    pub disqualification: Option<(String, String)>,
}

pub const FALLBACK_CODE: &str = "not_eligible";

impl EligibilityRule {
    pub fn applies(&self, facts: &ProfileFacts, heuristics: &Heuristics) -> bool {
        (self.applies)(facts, heuristics)
    }

    pub fn assess(&self, facts: &ProfileFacts, heuristics: &Heuristics) -> Assessment {
        if !(self.qualifies)(facts, heuristics) {
            let (code, message) = self
                .disqualifications
                .iter()
                .find(|reason| (reason.when)(facts, heuristics))
                .map(|reason| (reason.code, reason.message))
                .unwrap_or((FALLBACK_CODE, self.fallback_reason));

            return Assessment {
                qualified: false,
                confidence: ConfidenceTier::Low,
                score: None,
                disqualification: Some((code.to_string(), message.to_string())),
            };
        }

        let (confidence, score) = match self.confidence {
            ConfidenceRule::Scored { score, ceiling } => {
                let value = score(facts, heuristics);
                let tier = ConfidenceTier::classify(value, &heuristics.thresholds);
                let capped = match ceiling {
                    Some(ceiling) => tier.min(ceiling(facts, heuristics)),
                    None => tier,
                };
                (capped, value.is_finite().then_some(value))
            }
            ConfidenceRule::Tiered(tier) => (tier(facts, heuristics), None),
        };

        Assessment { qualified: true, confidence, score, disqualification: None }
    }
}

pub fn always(_: &ProfileFacts, _: &Heuristics) -> bool {
    true
}

pub fn returns_filed(facts: &ProfileFacts, _: &Heuristics) -> bool {
    facts.all_returns_filed
}

pub fn returns_not_filed(facts: &ProfileFacts, _: &Heuristics) -> bool {
    !facts.all_returns_filed
}

/// Ceiling that keeps scores at most `Medium` unless a financial hardship is on record.
pub fn medium_without_hardship(facts: &ProfileFacts, _: &Heuristics) -> ConfidenceTier {
    if facts.has_financial_hardship() {
        ConfidenceTier::High
    } else {
        ConfidenceTier::Medium
    }
}

#[cfg(test)]
mod tests {
    use super::{
        always, medium_without_hardship, returns_filed, returns_not_filed, ConfidenceRule,
        Disqualification, EligibilityRule, FALLBACK_CODE,
    };
    use crate::domain::profile::{Circumstance, Profile, ProfileFacts};
    use crate::domain::program::ConfidenceTier;
    use crate::eligibility::heuristics::Heuristics;

    fn never(_: &ProfileFacts, _: &Heuristics) -> bool {
        false
    }

    fn perfect(_: &ProfileFacts, _: &Heuristics) -> f64 {
        1.0
    }

    fn rule(qualifies: super::FactPredicate) -> EligibilityRule {
        EligibilityRule {
            applies: always,
            qualifies,
            confidence: ConfidenceRule::Scored { score: perfect, ceiling: Some(medium_without_hardship) },
            disqualifications: vec![Disqualification {
                code: "unfiled_returns",
                message: "All required returns must be filed first.",
                when: returns_not_filed,
            }],
            fallback_reason: "This program does not fit your situation.",
            pauses_collection: false,
        }
    }

    #[test]
    fn disqualification_uses_first_matching_reason_then_fallback() {
        let heuristics = Heuristics::default();
        let unfiled = ProfileFacts::from_profile(&Profile::default());

        let assessment = rule(returns_filed).assess(&unfiled, &heuristics);
        assert!(!assessment.qualified);
        assert_eq!(assessment.confidence, ConfidenceTier::Low);
        assert_eq!(assessment.disqualification.as_ref().map(|(code, _)| code.as_str()), Some("unfiled_returns"));

        let filed = ProfileFacts::from_profile(&Profile {
            all_returns_filed: Some(true),
            ..Profile::default()
        });
        let assessment = rule(never).assess(&filed, &heuristics);
        assert_eq!(
            assessment.disqualification,
            Some((FALLBACK_CODE.to_string(), "This program does not fit your situation.".to_string()))
        );
    }

    #[test]
    fn ceiling_caps_score_unless_hardship_is_present() {
        let heuristics = Heuristics::default();
        let plain = ProfileFacts::from_profile(&Profile::default());
        let hardship = ProfileFacts::from_profile(&Profile {
            circumstances: vec![Circumstance::Medical],
            ..Profile::default()
        });

        let capped = rule(always).assess(&plain, &heuristics);
        assert_eq!(capped.confidence, ConfidenceTier::Medium);
        assert_eq!(capped.score, Some(1.0));
        assert_eq!(rule(always).assess(&hardship, &heuristics).confidence, ConfidenceTier::High);
    }
}
