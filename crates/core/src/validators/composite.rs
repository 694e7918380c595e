//! Validators that look beyond their own value: other answers, derived values, documents.

use std::collections::BTreeMap;

use serde_json::Value;

use super::{raw_text, FieldCheck, REQUIRED_MESSAGE};
use crate::condition::Condition;
use crate::domain::answers::{parse_amount, parse_date, value_is_present, Answers};
use crate::domain::session::{DerivedValue, DocumentRef};
use crate::finance::round_for_display;

/// Passes when `value` is on or after the date stored under `other`.
/// An absent or unparseable `other` date cannot be compared and is left to its own field's rules.
pub fn date_not_before(value: Option<&Value>, other: &str, answers: &Answers) -> FieldCheck {
    compare_dates(value, other, answers, |this, that| this >= that, "cannot be before")
}

pub fn date_before(value: Option<&Value>, other: &str, answers: &Answers) -> FieldCheck {
    compare_dates(value, other, answers, |this, that| this < that, "must be before")
}

fn compare_dates(
    value: Option<&Value>,
    other: &str,
    answers: &Answers,
    ordered: impl Fn(chrono::NaiveDate, chrono::NaiveDate) -> bool,
    relation: &str,
) -> FieldCheck {
    if raw_text(value).is_none() {
        return FieldCheck::fail(REQUIRED_MESSAGE);
    }
    let Some(this) = value.and_then(parse_date) else {
        return FieldCheck::fail("Enter a date as YYYY-MM-DD");
    };
    let Some(that) = answers.date(other) else {
        return FieldCheck::pass();
    };

    if ordered(this, that) {
        FieldCheck::pass()
    } else {
        FieldCheck::fail(format!("This date {relation} {}", that.format("%Y-%m-%d")))
    }
}

/// Presence check that only applies while `condition` holds for the current answers.
pub fn required_if(value: Option<&Value>, condition: &Condition, answers: &Answers) -> FieldCheck {
    if !condition.evaluate(answers) {
        return FieldCheck::pass();
    }

    match value {
        Some(value) if value_is_present(value) => FieldCheck::pass(),
        _ => FieldCheck::fail(REQUIRED_MESSAGE),
    }
}

pub fn documents_at_least(documents: &[DocumentRef], count: usize) -> FieldCheck {
    let uploaded = documents.iter().filter(|document| !document.name.trim().is_empty()).count();
    if uploaded >= count {
        FieldCheck::pass()
    } else if uploaded == 0 {
        FieldCheck::fail(format!("Upload at least {count} supporting document(s)"))
    } else {
        FieldCheck::fail(format!(
            "Upload at least {count} supporting document(s); {uploaded} uploaded"
        ))
    }
}

/// Amount must reach a derived floor, e.g. an offer against collection potential.
pub fn at_least_derived(
    value: Option<&Value>,
    key: &str,
    derived: &BTreeMap<String, DerivedValue>,
) -> FieldCheck {
    let Some(amount) = value.filter(|value| value_is_present(value)).map(parse_amount) else {
        return FieldCheck::fail(REQUIRED_MESSAGE);
    };
    let Some(amount) = amount else {
        return FieldCheck::fail("Enter a valid dollar amount");
    };
    let Some(floor) = derived.get(key).and_then(DerivedValue::as_amount) else {
        return FieldCheck::pass();
    };

    if amount >= floor {
        FieldCheck::pass()
    } else {
        FieldCheck::fail(format!(
            "Amount must be at least ${:.2} based on your financial information",
            round_for_display(floor)
        ))
    }
}

pub fn matches_field(value: Option<&Value>, other: &str, answers: &Answers) -> FieldCheck {
    let Some(raw) = raw_text(value) else {
        return FieldCheck::fail(REQUIRED_MESSAGE);
    };
    let Some(expected) = answers.text(other) else {
        return FieldCheck::fail("The value this must match has not been entered");
    };

    if normalize(&raw) == normalize(expected) {
        FieldCheck::pass()
    } else {
        FieldCheck::fail("This must match the name entered earlier")
    }
}

fn normalize(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;

    fn answers(pairs: &[(&str, Value)]) -> Answers {
        pairs.iter().map(|(key, value)| (*key, value.clone())).collect()
    }

    #[test]
    fn date_ordering_compares_against_the_other_field() {
        let answers = answers(&[("cause_start_date", json!("2023-03-01"))]);

        assert!(date_not_before(Some(&json!("2023-03-01")), "cause_start_date", &answers).valid);
        let earlier = date_not_before(Some(&json!("2023-02-28")), "cause_start_date", &answers);
        assert_eq!(earlier.message.as_deref(), Some("This date cannot be before 2023-03-01"));
        assert!(!date_before(Some(&json!("2023-03-01")), "cause_start_date", &answers).valid);
        assert!(!date_not_before(Some(&json!("03/01/2023")), "cause_start_date", &answers).valid);
        assert!(date_not_before(Some(&json!("2020-01-01")), "missing", &answers).valid);
    }

    #[test]
    fn required_if_reads_current_answers() {
        let condition = Condition::not_equals("marital_status", "single");
        let married = answers(&[("marital_status", json!("married"))]);
        let single = answers(&[("marital_status", json!("single"))]);

        assert!(!required_if(None, &condition, &married).valid);
        assert!(required_if(Some(&json!("Sam Doe")), &condition, &married).valid);
        assert!(required_if(None, &condition, &single).valid);
    }

    #[test]
    fn documents_are_counted_from_metadata() {
        let documents = vec![DocumentRef::new("paystub.pdf", 2_048), DocumentRef::new("  ", 10)];

        assert!(documents_at_least(&documents, 1).valid);
        let short = documents_at_least(&documents, 3);
        assert_eq!(
            short.message.as_deref(),
            Some("Upload at least 3 supporting document(s); 1 uploaded")
        );
    }

    #[test]
    fn offers_are_held_to_the_derived_floor() {
        let mut derived = BTreeMap::new();
        derived.insert(
            "reasonable_collection_potential".to_string(),
            DerivedValue::Amount(Decimal::new(1_234_567, 3)),
        );

        assert!(at_least_derived(Some(&json!("1300")), "reasonable_collection_potential", &derived).valid);
        let low = at_least_derived(Some(&json!(100)), "reasonable_collection_potential", &derived);
        assert_eq!(
            low.message.as_deref(),
            Some("Amount must be at least $1234.57 based on your financial information")
        );
        assert!(!at_least_derived(Some(&json!("abc")), "reasonable_collection_potential", &derived).valid);
    }

    #[test]
    fn signatures_match_names_loosely() {
        let answers = answers(&[("full_name", json!("Pat  Q. Doe"))]);
        assert!(matches_field(Some(&json!("pat q. doe")), "full_name", &answers).valid);
        assert!(!matches_field(Some(&json!("Pat Doe")), "full_name", &answers).valid);
        assert!(!matches_field(Some(&json!("Pat")), "missing", &answers).valid);
    }
}
