//! Declarative program data: steps, fields, derived values, certifications.
//!
//! Nothing in here drives a session. The [`WorkflowEngine`](super::engine::WorkflowEngine)
//! interprets these structures, so a new program is a new value, not new engine code.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde_json::Value;

use crate::condition::Condition;
use crate::domain::answers::{value_is_present, Answers};
use crate::domain::program::{ProgramCategory, ProgramId, ProgramMetadata};
use crate::domain::session::{DerivedValue, DocumentRef};
use crate::eligibility::rule::EligibilityRule;
use crate::finance::{
    amortized_months, collection_potential, days_between, monthly_rate_from_annual_pct,
    monthly_surplus, quick_sale_equity, sum_itemized,
};
use crate::validators::{composite, FieldCheck, FieldRule, ValidationContext, REQUIRED_MESSAGE};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// Free-text narrative; must carry a minimum-length rule.
    LongText,
    Choice,
    Flag,
    Currency,
    Integer,
    Date,
    Identifier,
    Phone,
    Email,
    /// Satisfied by attached document metadata rather than an answer.
    Documents,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Requirement {
    Required,
    Optional,
    RequiredIf(Condition),
}

impl Requirement {
    pub fn is_required(&self, answers: &Answers) -> bool {
        match self {
            Self::Required => true,
            Self::Optional => false,
            Self::RequiredIf(condition) => condition.evaluate(answers),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub requirement: Requirement,
    pub rules: Vec<FieldRule>,
}

impl FieldSpec {
    pub fn new(key: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self { key, label, kind, requirement: Requirement::Required, rules: Vec::new() }
    }

    pub fn text(key: &'static str, label: &'static str) -> Self {
        Self::new(key, label, FieldKind::Text)
    }

    pub fn narrative(key: &'static str, label: &'static str, min_chars: usize) -> Self {
        Self::new(key, label, FieldKind::LongText).rule(FieldRule::MinLength(min_chars))
    }

    pub fn choice(key: &'static str, label: &'static str, options: &'static [&'static str]) -> Self {
        Self::new(key, label, FieldKind::Choice).rule(FieldRule::OneOf(options))
    }

    pub fn flag(key: &'static str, label: &'static str) -> Self {
        Self::new(key, label, FieldKind::Flag).rule(FieldRule::YesNo)
    }

    pub fn currency(key: &'static str, label: &'static str) -> Self {
        Self::new(key, label, FieldKind::Currency).rule(FieldRule::Currency)
    }

    pub fn integer(key: &'static str, label: &'static str, min: i64, max: i64) -> Self {
        Self::new(key, label, FieldKind::Integer).rule(FieldRule::IntegerBetween(min, max))
    }

    pub fn date(key: &'static str, label: &'static str) -> Self {
        Self::new(key, label, FieldKind::Date).rule(FieldRule::Date)
    }

    pub fn identifier(key: &'static str, label: &'static str, rule: FieldRule) -> Self {
        Self::new(key, label, FieldKind::Identifier).rule(rule)
    }

    pub fn phone(key: &'static str, label: &'static str) -> Self {
        Self::new(key, label, FieldKind::Phone).rule(FieldRule::Phone)
    }

    pub fn email(key: &'static str, label: &'static str) -> Self {
        Self::new(key, label, FieldKind::Email).rule(FieldRule::Email)
    }

    pub fn documents(key: &'static str, label: &'static str, at_least: usize) -> Self {
        Self::new(key, label, FieldKind::Documents).rule(FieldRule::DocumentsAtLeast(at_least))
    }

    pub fn optional(mut self) -> Self {
        self.requirement = Requirement::Optional;
        self
    }

    pub fn required_if(mut self, condition: Condition) -> Self {
        self.requirement = Requirement::RequiredIf(condition);
        self
    }

    pub fn rule(mut self, rule: FieldRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// First failing message for this field, or `None` when it passes.
    ///
    /// Absent optional fields pass without running their rules; present
    /// optional fields must still be well formed.
    pub fn validate(&self, context: &ValidationContext<'_>) -> Option<String> {
        let value = self.value(context.answers);
        let required = self.requirement.is_required(context.answers);
        let present = match self.kind {
            FieldKind::Documents => !context.documents.is_empty(),
            _ => value.map(value_is_present).unwrap_or(false),
        };

        if !present {
            if !required {
                return None;
            }
            if self.kind != FieldKind::Documents {
                return Some(REQUIRED_MESSAGE.to_string());
            }
        }

        self.rules
            .iter()
            .map(|rule| rule.check(value, context))
            .find(|check| !check.valid)
            .map(|check| check.message.unwrap_or_else(|| REQUIRED_MESSAGE.to_string()))
    }

    fn value<'a>(&self, answers: &'a Answers) -> Option<&'a Value> {
        match self.kind {
            FieldKind::Documents => None,
            _ => answers.get(self.key),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Derivation {
    /// Sum of the named operands; negative items contribute nothing.
    Sum(&'static [&'static str]),
    Difference { minuend: &'static str, subtrahend: &'static str },
    /// Difference floored at zero.
    FlooredDifference { minuend: &'static str, subtrahend: &'static str },
    Lesser(&'static str, &'static str),
    QuickSaleEquity { value: &'static str, encumbrance: &'static str, factor: Decimal },
    CollectionPotential {
        monthly_income: &'static str,
        monthly_expenses: &'static str,
        equity: &'static str,
        horizon_months: u32,
    },
    PayoffMonths { principal: &'static str, payment: &'static str, annual_rate_pct: Decimal },
    DaysBetween { start: &'static str, end: &'static str },
    DocumentCount,
}

impl Derivation {
    /// Operand keys: answers or earlier derived values.
    pub fn operands(&self) -> Vec<&'static str> {
        match self {
            Self::Sum(keys) => keys.to_vec(),
            Self::Difference { minuend, subtrahend }
            | Self::FlooredDifference { minuend, subtrahend } => vec![*minuend, *subtrahend],
            Self::Lesser(left, right) => vec![*left, *right],
            Self::QuickSaleEquity { value, encumbrance, .. } => vec![*value, *encumbrance],
            Self::CollectionPotential { monthly_income, monthly_expenses, equity, .. } => {
                vec![*monthly_income, *monthly_expenses, *equity]
            }
            Self::PayoffMonths { principal, payment, .. } => vec![*principal, *payment],
            Self::DaysBetween { start, end } => vec![*start, *end],
            Self::DocumentCount => Vec::new(),
        }
    }

    /// `None` when an input the derivation cannot default (a date) is missing.
    fn compute(
        &self,
        answers: &Answers,
        derived: &BTreeMap<String, DerivedValue>,
        documents: &[DocumentRef],
    ) -> Option<DerivedValue> {
        let amount = |key: &str| -> Decimal {
            derived.get(key).and_then(DerivedValue::as_amount).unwrap_or_else(|| answers.amount(key))
        };

        let value = match self {
            Self::Sum(keys) => DerivedValue::Amount(sum_itemized(keys.iter().map(|key| amount(key)))),
            Self::Difference { minuend, subtrahend } => {
                DerivedValue::Amount(monthly_surplus(amount(minuend), amount(subtrahend)))
            }
            Self::FlooredDifference { minuend, subtrahend } => {
                DerivedValue::Amount(amount(minuend).saturating_sub(amount(subtrahend)).max(Decimal::ZERO))
            }
            Self::Lesser(left, right) => DerivedValue::Amount(amount(left).min(amount(right))),
            Self::QuickSaleEquity { value, encumbrance, factor } => {
                DerivedValue::Amount(quick_sale_equity(amount(value), amount(encumbrance), *factor))
            }
            Self::CollectionPotential { monthly_income, monthly_expenses, equity, horizon_months } => {
                let disposable = monthly_surplus(amount(monthly_income), amount(monthly_expenses));
                DerivedValue::Amount(collection_potential(disposable, amount(equity), *horizon_months))
            }
            Self::PayoffMonths { principal, payment, annual_rate_pct } => DerivedValue::Payoff(
                amortized_months(
                    amount(principal),
                    amount(payment),
                    monthly_rate_from_annual_pct(*annual_rate_pct),
                ),
            ),
            Self::DaysBetween { start, end } => {
                DerivedValue::Days(days_between(answers.date(start)?, answers.date(end)?))
            }
            Self::DocumentCount => {
                DerivedValue::Count(u32::try_from(documents.len()).unwrap_or(u32::MAX))
            }
        };
        Some(value)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DerivedField {
    pub key: &'static str,
    pub label: &'static str,
    pub derivation: Derivation,
}

impl DerivedField {
    pub fn new(key: &'static str, label: &'static str, derivation: Derivation) -> Self {
        Self { key, label, derivation }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StepDefinition {
    pub id: &'static str,
    pub title: &'static str,
    /// Whether the step is part of the effective step list for the current answers.
    pub include: Condition,
    pub fields: Vec<FieldSpec>,
    pub derived: Vec<DerivedField>,
}

impl StepDefinition {
    pub fn new(id: &'static str, title: &'static str) -> Self {
        Self { id, title, include: Condition::Always, fields: Vec::new(), derived: Vec::new() }
    }

    pub fn include_when(mut self, condition: Condition) -> Self {
        self.include = condition;
        self
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn derive(mut self, key: &'static str, label: &'static str, derivation: Derivation) -> Self {
        self.derived.push(DerivedField::new(key, label, derivation));
        self
    }

    pub fn is_included(&self, answers: &Answers) -> bool {
        self.include.evaluate(answers)
    }

    /// Field key → message for every failing field of this step.
    pub fn validate(&self, context: &ValidationContext<'_>) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .filter_map(|field| field.validate(context).map(|message| (field.key.to_string(), message)))
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CertificationCheck {
    Affirmed,
    NonEmpty,
    MatchesField(&'static str),
}

/// Submit-time composite check spanning the whole session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Certification {
    pub field: &'static str,
    pub check: CertificationCheck,
    pub message: &'static str,
}

impl Certification {
    pub fn check(&self, answers: &Answers) -> FieldCheck {
        let value = answers.get(self.field);
        let check = match self.check {
            CertificationCheck::Affirmed => crate::validators::format::affirmed(value),
            CertificationCheck::NonEmpty => match value {
                Some(value) if value_is_present(value) => FieldCheck::pass(),
                _ => FieldCheck::fail(REQUIRED_MESSAGE),
            },
            CertificationCheck::MatchesField(other) => composite::matches_field(value, other, answers),
        };

        if check.valid {
            check
        } else {
            FieldCheck::fail(self.message)
        }
    }
}

/// One relief program, versioned. Bump `version` whenever steps or fields change so that
/// stored sessions started on an older shape are refused instead of misread.
#[derive(Clone, Debug)]
pub struct ProgramDefinition {
    pub id: &'static str,
    pub version: u32,
    pub name: &'static str,
    pub category: ProgramCategory,
    pub summary: &'static str,
    pub steps: Vec<StepDefinition>,
    pub certifications: Vec<Certification>,
    pub eligibility: EligibilityRule,
    pub metadata: ProgramMetadata,
}

impl ProgramDefinition {
    pub fn program_id(&self) -> ProgramId {
        ProgramId::new(self.id)
    }

    pub fn field(&self, key: &str) -> Option<&FieldSpec> {
        self.steps.iter().flat_map(|step| step.fields.iter()).find(|field| field.key == key)
    }

    /// Recomputes every derived value from scratch for the steps `answers` currently include.
    ///
    /// Later derivations may read earlier derived keys; inputs that are missing
    /// read as zero, and derivations that need a missing date are omitted.
    /// Answers collected on an excluded step read as missing.
    pub fn derive_all(
        &self,
        answers: &Answers,
        documents: &[DocumentRef],
    ) -> BTreeMap<String, DerivedValue> {
        let (included, excluded): (Vec<&StepDefinition>, Vec<&StepDefinition>) =
            self.steps.iter().partition(|step| step.is_included(answers));
        let hidden: BTreeSet<&str> =
            excluded.iter().flat_map(|step| step.fields.iter().map(|field| field.key)).collect();
        let in_scope: Answers = answers
            .iter()
            .filter(|(key, _)| !hidden.contains(key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let mut derived = BTreeMap::new();
        for field in included.iter().flat_map(|step| step.derived.iter()) {
            if let Some(value) = field.derivation.compute(&in_scope, &derived, documents) {
                derived.insert(field.key.to_string(), value);
            }
        }
        derived
    }

    /// Structural self-check run by tests and by `doctor`.
    pub fn check_integrity(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();
        let mut step_ids = BTreeSet::new();
        let mut field_keys = BTreeSet::new();
        let mut derived_keys = BTreeSet::new();

        if self.steps.is_empty() {
            problems.push(format!("{}: has no steps", self.id));
        }

        for step in &self.steps {
            if !step_ids.insert(step.id) {
                problems.push(format!("{}: duplicate step id `{}`", self.id, step.id));
            }

            for referenced in step.include.referenced_fields() {
                if !field_keys.contains(referenced) {
                    problems.push(format!(
                        "{}: step `{}` include condition reads `{referenced}` which no earlier step collects",
                        self.id, step.id
                    ));
                }
            }

            for field in &step.fields {
                if !field_keys.insert(field.key) {
                    problems.push(format!("{}: duplicate field key `{}`", self.id, field.key));
                }
                if field.kind == FieldKind::LongText
                    && !field.rules.iter().any(|rule| matches!(rule, FieldRule::MinLength(_)))
                {
                    problems.push(format!(
                        "{}: narrative field `{}` has no minimum length",
                        self.id, field.key
                    ));
                }
            }

            for derived in &step.derived {
                for operand in derived.derivation.operands() {
                    if !field_keys.contains(operand) && !derived_keys.contains(operand) {
                        problems.push(format!(
                            "{}: derived `{}` reads unknown operand `{operand}`",
                            self.id, derived.key
                        ));
                    }
                }
                if !derived_keys.insert(derived.key) {
                    problems.push(format!("{}: duplicate derived key `{}`", self.id, derived.key));
                }
            }
        }

        let all_fields = self.steps.iter().flat_map(|step| step.fields.iter());
        for field in all_fields {
            if let Requirement::RequiredIf(condition) = &field.requirement {
                for referenced in condition.referenced_fields() {
                    if !field_keys.contains(referenced) {
                        problems.push(format!(
                            "{}: field `{}` is required-if on unknown field `{referenced}`",
                            self.id, field.key
                        ));
                    }
                }
            }
            for rule in &field.rules {
                if let Some(other) = rule.referenced_field() {
                    if !field_keys.contains(other) {
                        problems.push(format!(
                            "{}: field `{}` compares against unknown field `{other}`",
                            self.id, field.key
                        ));
                    }
                }
                if let Some(key) = rule.referenced_derived() {
                    if !derived_keys.contains(key) {
                        problems.push(format!(
                            "{}: field `{}` reads unknown derived value `{key}`",
                            self.id, field.key
                        ));
                    }
                }
            }
        }

        for certification in &self.certifications {
            if !field_keys.contains(certification.field) {
                problems.push(format!(
                    "{}: certification reads unknown field `{}`",
                    self.id, certification.field
                ));
            }
            if let CertificationCheck::MatchesField(other) = certification.check {
                if !field_keys.contains(other) {
                    problems.push(format!(
                        "{}: certification compares against unknown field `{other}`",
                        self.id
                    ));
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}
