use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::answers::{parse_amount_str, parse_flag};

/// Bumped whenever a [`Circumstance`] variant is added or removed.
pub const CIRCUMSTANCE_SCHEMA_VERSION: u16 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Circumstance {
    Divorce,
    Medical,
    Disability,
    Unemployment,
    Covid,
    BusinessFailure,
    DeathInFamily,
    NaturalDisaster,
    #[serde(other)]
    Unrecognized,
}

impl Circumstance {
    /// Events that ordinarily support a reasonable-cause argument.
    pub fn is_reasonable_cause(self) -> bool {
        matches!(
            self,
            Self::Medical
                | Self::Disability
                | Self::Covid
                | Self::DeathInFamily
                | Self::NaturalDisaster
                | Self::Divorce
        )
    }

    /// Events that reduce ability to pay.
    pub fn is_financial_hardship(self) -> bool {
        matches!(
            self,
            Self::Medical
                | Self::Disability
                | Self::Unemployment
                | Self::Covid
                | Self::BusinessFailure
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilingStatus {
    Single,
    MarriedJoint,
    MarriedSeparate,
    HeadOfHousehold,
    Widowed,
    #[default]
    #[serde(other)]
    Unspecified,
}

impl FilingStatus {
    fn from_raw(raw: &str) -> Self {
        match normalize(raw).as_str() {
            "single" => Self::Single,
            "married_joint" | "married_filing_jointly" | "joint" => Self::MarriedJoint,
            "married_separate" | "married_filing_separately" | "separate" => Self::MarriedSeparate,
            "head_of_household" | "hoh" => Self::HeadOfHousehold,
            "widowed" | "qualifying_widow" | "qualifying_surviving_spouse" => Self::Widowed,
            _ => Self::Unspecified,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtBracket {
    Unknown,
    Under10k,
    From10kTo25k,
    From25kTo50k,
    From50kTo100k,
    Over100k,
}

impl DebtBracket {
    /// Accepts bracket labels (`50k-100k`, `over-100k`, `<10k`) or a plain amount.
    pub fn parse(raw: &str) -> Self {
        let key = normalize(raw).replace('_', "-").replace('$', "");
        match key.as_str() {
            "under-10k" | "0-10k" | "<10k" | "less-than-10k" => return Self::Under10k,
            "10k-25k" => return Self::From10kTo25k,
            "25k-50k" => return Self::From25kTo50k,
            "50k-100k" => return Self::From50kTo100k,
            "over-100k" | "100k+" | ">100k" | "more-than-100k" => return Self::Over100k,
            _ => {}
        }

        match parse_amount_str(raw) {
            Some(amount) => Self::for_amount(amount),
            None => Self::Unknown,
        }
    }

    pub fn for_amount(amount: Decimal) -> Self {
        if amount <= Decimal::ZERO {
            Self::Unknown
        } else if amount < Decimal::from(10_000) {
            Self::Under10k
        } else if amount < Decimal::from(25_000) {
            Self::From10kTo25k
        } else if amount < Decimal::from(50_000) {
            Self::From25kTo50k
        } else if amount <= Decimal::from(100_000) {
            Self::From50kTo100k
        } else {
            Self::Over100k
        }
    }

    /// Midpoint used wherever a single debt figure is needed.
    pub fn representative_amount(self) -> Decimal {
        match self {
            Self::Unknown => Decimal::ZERO,
            Self::Under10k => Decimal::from(5_000),
            Self::From10kTo25k => Decimal::from(17_500),
            Self::From25kTo50k => Decimal::from(37_500),
            Self::From50kTo100k => Decimal::from(75_000),
            Self::Over100k => Decimal::from(150_000),
        }
    }
}

/// Free-form intake answers. Deserialization is lenient: amounts and flags
/// accept strings, numbers or garbage, and unknown circumstance tags map to
/// [`Circumstance::Unrecognized`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    #[serde(deserialize_with = "lenient_text")]
    pub total_debt: String,
    #[serde(deserialize_with = "lenient_text")]
    pub monthly_net_income: String,
    #[serde(deserialize_with = "lenient_text")]
    pub bank_balance: String,
    #[serde(deserialize_with = "lenient_text")]
    pub retirement_balance: String,
    #[serde(deserialize_with = "lenient_text")]
    pub home_equity: String,
    #[serde(deserialize_with = "lenient_flag")]
    pub levy_active: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub wage_garnishment: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub asset_seizure: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub business_closure_threat: bool,
    #[serde(deserialize_with = "lenient_optional_flag")]
    pub all_returns_filed: Option<bool>,
    #[serde(deserialize_with = "lenient_circumstances")]
    pub circumstances: Vec<Circumstance>,
    #[serde(deserialize_with = "lenient_flag")]
    pub prior_relief_received: bool,
    #[serde(deserialize_with = "lenient_filing_status")]
    pub filing_status: FilingStatus,
}

/// Coerced view of a [`Profile`]; every rule predicate reads this instead of raw strings.
#[derive(Clone, Debug, PartialEq)]
pub struct ProfileFacts {
    pub debt_bracket: DebtBracket,
    pub debt_amount: Decimal,
    pub monthly_net_income: Decimal,
    pub bank_balance: Decimal,
    pub retirement_balance: Decimal,
    pub home_equity: Decimal,
    pub levy_active: bool,
    pub wage_garnishment: bool,
    pub asset_seizure: bool,
    pub business_closure_threat: bool,
    pub all_returns_filed: bool,
    pub circumstances: BTreeSet<Circumstance>,
    pub prior_relief_received: bool,
    pub filing_status: FilingStatus,
}

impl ProfileFacts {
    pub fn from_profile(profile: &Profile) -> Self {
        let debt_bracket = DebtBracket::parse(&profile.total_debt);
        if debt_bracket == DebtBracket::Unknown && !profile.total_debt.trim().is_empty() {
            tracing::debug!(
                event_name = "eligibility.field_coerced",
                field = "totalDebt",
                raw = %profile.total_debt,
                "unrecognized debt bracket treated as unknown"
            );
        }

        Self {
            debt_bracket,
            debt_amount: debt_bracket.representative_amount(),
            monthly_net_income: coerce_amount("monthlyNetIncome", &profile.monthly_net_income),
            bank_balance: coerce_amount("bankBalance", &profile.bank_balance),
            retirement_balance: coerce_amount("retirementBalance", &profile.retirement_balance),
            home_equity: coerce_amount("homeEquity", &profile.home_equity),
            levy_active: profile.levy_active,
            wage_garnishment: profile.wage_garnishment,
            asset_seizure: profile.asset_seizure,
            business_closure_threat: profile.business_closure_threat,
            all_returns_filed: profile.all_returns_filed.unwrap_or(false),
            circumstances: profile
                .circumstances
                .iter()
                .copied()
                .filter(|circumstance| *circumstance != Circumstance::Unrecognized)
                .collect(),
            prior_relief_received: profile.prior_relief_received,
            filing_status: profile.filing_status,
        }
    }

    pub fn has(&self, circumstance: Circumstance) -> bool {
        self.circumstances.contains(&circumstance)
    }

    pub fn has_financial_hardship(&self) -> bool {
        self.circumstances.iter().any(|circumstance| circumstance.is_financial_hardship())
    }

    pub fn has_reasonable_cause(&self) -> bool {
        self.circumstances.iter().any(|circumstance| circumstance.is_reasonable_cause())
    }

    /// Labels of the collection actions currently flagged, in a fixed order.
    pub fn urgent_actions(&self) -> Vec<&'static str> {
        [
            (self.levy_active, "bank levy"),
            (self.wage_garnishment, "wage garnishment"),
            (self.asset_seizure, "asset seizure"),
            (self.business_closure_threat, "business closure threat"),
        ]
        .into_iter()
        .filter_map(|(active, label)| active.then_some(label))
        .collect()
    }
}

fn coerce_amount(field: &'static str, raw: &str) -> Decimal {
    if raw.trim().is_empty() {
        return Decimal::ZERO;
    }

    match parse_amount_str(raw) {
        Some(amount) if amount >= Decimal::ZERO => amount,
        Some(_) => Decimal::ZERO,
        None => {
            tracing::debug!(
                event_name = "eligibility.field_coerced",
                field,
                raw = %raw,
                "malformed amount coerced to zero"
            );
            Decimal::ZERO
        }
    }
}

fn normalize(raw: &str) -> String {
    raw.trim().to_ascii_lowercase().replace([' ', '-'], "_")
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(raw) => raw,
        Value::Number(number) => number.to_string(),
        _ => String::new(),
    })
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(parse_flag(&Value::deserialize(deserializer)?).unwrap_or(false))
}

fn lenient_optional_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(parse_flag(&Value::deserialize(deserializer)?))
}

fn lenient_circumstances<'de, D>(deserializer: D) -> Result<Vec<Circumstance>, D::Error>
where
    D: Deserializer<'de>,
{
    let tags: Vec<String> = match Value::deserialize(deserializer)? {
        Value::Array(items) => {
            items.into_iter().filter_map(|item| item.as_str().map(str::to_owned)).collect()
        }
        Value::String(raw) => raw.split(',').map(str::to_owned).collect(),
        _ => Vec::new(),
    };

    Ok(tags
        .iter()
        .map(|tag| normalize(tag))
        .filter(|tag| !tag.is_empty())
        .map(|tag| {
            serde_json::from_value::<Circumstance>(Value::String(tag))
                .unwrap_or(Circumstance::Unrecognized)
        })
        .collect())
}

fn lenient_filing_status<'de, D>(deserializer: D) -> Result<FilingStatus, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(raw) => FilingStatus::from_raw(&raw),
        _ => FilingStatus::Unspecified,
    })
}
