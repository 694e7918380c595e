//! Field validators.
//!
//! Every validator is a total function over `Option<&Value>`: an absent or
//! blank answer yields the "required" message, any other input yields a
//! pass/fail [`FieldCheck`]. Composite validators additionally read the
//! [`ValidationContext`].

pub mod composite;
pub mod format;

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::answers::{value_is_present, Answers};
use crate::domain::session::{DerivedValue, DocumentRef};

pub const REQUIRED_MESSAGE: &str = "This field is required";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCheck {
    pub valid: bool,
    pub message: Option<String>,
}

impl FieldCheck {
    pub fn pass() -> Self {
        Self { valid: true, message: None }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self { valid: false, message: Some(message.into()) }
    }
}

/// Everything a composite validator may look at besides its own value.
#[derive(Clone, Copy, Debug)]
pub struct ValidationContext<'a> {
    pub answers: &'a Answers,
    pub derived: &'a BTreeMap<String, DerivedValue>,
    pub documents: &'a [DocumentRef],
}

/// Validator reference attached to a field in a program definition.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldRule {
    Ssn,
    Ein,
    Phone,
    Email,
    ZipCode,
    RoutingNumber,
    BankAccount,
    Currency,
    MinAmount(Decimal),
    MaxAmount(Decimal),
    IntegerBetween(i64, i64),
    Date,
    /// This date must be on or after the date in the named field.
    DateNotBefore(&'static str),
    /// This date must be strictly before the date in the named field.
    DateBefore(&'static str),
    OneOf(&'static [&'static str]),
    MinLength(usize),
    MaxLength(usize),
    Affirmed,
    YesNo,
    DocumentsAtLeast(usize),
    /// Amount must be at least the named derived value.
    AtLeastDerived(&'static str),
    /// Text must equal the named field, ignoring case and surrounding whitespace.
    MatchesField(&'static str),
}

impl FieldRule {
    pub fn check(&self, value: Option<&Value>, context: &ValidationContext<'_>) -> FieldCheck {
        match self {
            Self::Ssn => format::ssn(value),
            Self::Ein => format::ein(value),
            Self::Phone => format::phone(value),
            Self::Email => format::email(value),
            Self::ZipCode => format::zip_code(value),
            Self::RoutingNumber => format::routing_number(value),
            Self::BankAccount => format::bank_account(value),
            Self::Currency => format::currency(value),
            Self::MinAmount(minimum) => format::min_amount(value, *minimum),
            Self::MaxAmount(maximum) => format::max_amount(value, *maximum),
            Self::IntegerBetween(min, max) => format::integer_between(value, *min, *max),
            Self::Date => format::date(value),
            Self::DateNotBefore(other) => composite::date_not_before(value, other, context.answers),
            Self::DateBefore(other) => composite::date_before(value, other, context.answers),
            Self::OneOf(options) => format::one_of(value, options),
            Self::MinLength(minimum) => format::min_length(value, *minimum),
            Self::MaxLength(maximum) => format::max_length(value, *maximum),
            Self::Affirmed => format::affirmed(value),
            Self::YesNo => format::yes_no(value),
            Self::DocumentsAtLeast(count) => composite::documents_at_least(context.documents, *count),
            Self::AtLeastDerived(key) => composite::at_least_derived(value, key, context.derived),
            Self::MatchesField(other) => composite::matches_field(value, other, context.answers),
        }
    }

    /// Other answer keys this rule reads.
    pub fn referenced_field(&self) -> Option<&'static str> {
        match self {
            Self::DateNotBefore(other) | Self::DateBefore(other) | Self::MatchesField(other) => {
                Some(*other)
            }
            _ => None,
        }
    }

    pub fn referenced_derived(&self) -> Option<&'static str> {
        match self {
            Self::AtLeastDerived(key) => Some(*key),
            _ => None,
        }
    }
}

pub(crate) fn is_answered(value: &Value) -> bool {
    value_is_present(value)
}

/// Trimmed textual form of a scalar answer; `None` for absent, blank or structured values.
pub(crate) fn raw_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(raw) => {
            let trimmed = raw.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
