use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProgramId(pub String);

impl ProgramId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProgramId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramCategory {
    PaymentPlan,
    Settlement,
    HardshipRelief,
    PenaltyRelief,
    SpousalRelief,
}

/// Qualification strength. Variant order is the ranking order (`Low < Medium < High`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl ConfidenceTier {
    /// Scores exactly on a threshold fall to the lower tier.
    pub fn classify(score: f64, thresholds: &ConfidenceThresholds) -> Self {
        if !score.is_finite() {
            return Self::Low;
        }

        if score > thresholds.high {
            Self::High
        } else if score > thresholds.medium {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceThresholds {
    pub high: f64,
    pub medium: f64,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self { high: 0.66, medium: 0.33 }
    }
}

/// Display-only program facts; never consulted for control flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramMetadata {
    pub timeline_weeks: (u16, u16),
    pub savings_pct: (u8, u8),
    pub success_rate_pct: u8,
    pub cost_range: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMetrics {
    pub timeline_weeks: (u16, u16),
    pub savings_low: Decimal,
    pub savings_high: Decimal,
    pub success_rate_pct: u8,
    pub cost_range: String,
}

impl DisplayMetrics {
    /// Savings are rounded to whole currency units here and nowhere earlier.
    pub fn for_debt(metadata: &ProgramMetadata, debt_amount: Decimal) -> Self {
        let (low_pct, high_pct) = metadata.savings_pct;
        let share = |pct: u8| {
            crate::finance::round_whole(debt_amount * Decimal::from(pct) / Decimal::ONE_HUNDRED)
        };

        Self {
            timeline_weeks: metadata.timeline_weeks,
            savings_low: share(low_pct),
            savings_high: share(high_pct),
            success_rate_pct: metadata.success_rate_pct,
            cost_range: metadata.cost_range.to_string(),
        }
    }
}

/// One row of an eligibility evaluation. Rebuilt on every evaluation, never mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgramResult {
    pub id: ProgramId,
    pub name: String,
    pub category: ProgramCategory,
    pub qualified: bool,
    pub confidence: ConfidenceTier,
    pub score: Option<f64>,
    /// Present iff `qualified` is false.
    pub disqualification_code: Option<String>,
    /// Present iff `qualified` is false.
    pub explanation: Option<String>,
    pub urgent_notice: Option<String>,
    pub metrics: DisplayMetrics,
}
