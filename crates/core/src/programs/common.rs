//! Steps, fields and certifications shared by every program.

use crate::condition::Condition;
use crate::validators::FieldRule;
use crate::workflow::definition::{
    Certification, CertificationCheck, Derivation, FieldKind, FieldSpec, StepDefinition,
};

pub const NARRATIVE_MIN_CHARS: usize = 100;

pub const MARITAL_STATUSES: &[&str] = &["single", "married", "separated", "divorced", "widowed"];
pub const EMPLOYMENT_STATUSES: &[&str] = &["employed", "self_employed", "unemployed", "retired"];
pub const US_STATE_CODE_LEN: usize = 2;

pub const INCOME_FIELDS: &[&str] = &[
    "wages",
    "social_security",
    "pension",
    "rental_income",
    "other_income",
];

pub const EXPENSE_FIELDS: &[&str] = &[
    "housing",
    "utilities",
    "food",
    "transportation",
    "health_care",
    "child_care",
    "court_ordered_payments",
    "other_expenses",
];

pub fn personal_step() -> StepDefinition {
    StepDefinition::new("personal", "Personal information")
        .field(FieldSpec::text("full_name", "Full legal name"))
        .field(FieldSpec::identifier("ssn", "Social security number", FieldRule::Ssn))
        .field(FieldSpec::phone("phone", "Phone number"))
        .field(FieldSpec::email("email", "Email address"))
        .field(FieldSpec::text("street_address", "Street address"))
        .field(FieldSpec::text("city", "City"))
        .field(
            FieldSpec::text("state", "State")
                .rule(FieldRule::MinLength(US_STATE_CODE_LEN))
                .rule(FieldRule::MaxLength(US_STATE_CODE_LEN)),
        )
        .field(FieldSpec::identifier("zip_code", "ZIP code", FieldRule::ZipCode))
        .field(FieldSpec::choice("marital_status", "Marital status", MARITAL_STATUSES))
        .field(
            FieldSpec::text("spouse_name", "Spouse full name")
                .required_if(Condition::not_equals("marital_status", "single")),
        )
}

/// Monthly income; `total_keys` lists what counts toward `total_monthly_income`.
pub fn income_step(total_keys: &'static [&'static str]) -> StepDefinition {
    let step = StepDefinition::new("income", "Monthly income")
        .field(FieldSpec::currency("wages", "Wages and salary (net)"));
    INCOME_FIELDS[1..]
        .iter()
        .fold(step, |step, key| step.field(FieldSpec::currency(*key, income_label(key)).optional()))
        .derive("total_monthly_income", "Total monthly income", Derivation::Sum(total_keys))
}

/// Monthly expenses plus the surplus against `total_monthly_income`.
pub fn expenses_step() -> StepDefinition {
    let step = StepDefinition::new("expenses", "Monthly living expenses")
        .field(FieldSpec::currency("housing", "Rent or mortgage"))
        .field(FieldSpec::currency("utilities", "Utilities"))
        .field(FieldSpec::currency("food", "Food and household supplies"));
    EXPENSE_FIELDS[3..]
        .iter()
        .fold(step, |step, key| step.field(FieldSpec::currency(*key, expense_label(key)).optional()))
        .derive("total_monthly_expenses", "Total monthly expenses", Derivation::Sum(EXPENSE_FIELDS))
        .derive(
            "monthly_surplus",
            "Monthly surplus or deficit",
            Derivation::Difference {
                minuend: "total_monthly_income",
                subtrahend: "total_monthly_expenses",
            },
        )
}

pub fn documents_step(at_least: usize) -> StepDefinition {
    StepDefinition::new("documents", "Supporting documents")
        .field(FieldSpec::documents("supporting_documents", "Supporting documents", at_least))
        .derive("document_count", "Documents attached", Derivation::DocumentCount)
}

pub fn review_step() -> StepDefinition {
    StepDefinition::new("review", "Review and sign")
        .field(
            FieldSpec::new(
                "certify_accuracy",
                "I certify the information provided is true and complete",
                FieldKind::Flag,
            )
            .rule(FieldRule::Affirmed),
        )
        .field(
            FieldSpec::text("signature_name", "Type your full legal name to sign")
                .rule(FieldRule::MatchesField("full_name")),
        )
}

pub fn certifications() -> Vec<Certification> {
    vec![
        Certification {
            field: "certify_accuracy",
            check: CertificationCheck::Affirmed,
            message: "You must certify that the information provided is accurate",
        },
        Certification {
            field: "signature_name",
            check: CertificationCheck::NonEmpty,
            message: "Sign the application by typing your full legal name",
        },
        Certification {
            field: "signature_name",
            check: CertificationCheck::MatchesField("full_name"),
            message: "Signature must match the full legal name on the application",
        },
    ]
}

fn income_label(key: &str) -> &'static str {
    match key {
        "social_security" => "Social security benefits",
        "pension" => "Pension or retirement distributions",
        "rental_income" => "Net rental income",
        _ => "Other income",
    }
}

fn expense_label(key: &str) -> &'static str {
    match key {
        "transportation" => "Transportation",
        "health_care" => "Out-of-pocket health care",
        "child_care" => "Child or dependent care",
        "court_ordered_payments" => "Court-ordered payments",
        _ => "Other necessary expenses",
    }
}
