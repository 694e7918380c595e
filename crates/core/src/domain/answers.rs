use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field-key → raw value map collected by a workflow session.
///
/// Values stay as JSON so that any input type can be stored and later
/// judged by a validator; typed accessors coerce on read.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Answers(BTreeMap<String, Value>);

impl Answers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn clear(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn is_present(&self, key: &str) -> bool {
        self.get(key).map(value_is_present).unwrap_or(false)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(Value::String(raw)) => {
                let trimmed = raw.trim();
                (!trimmed.is_empty()).then_some(trimmed)
            }
            _ => None,
        }
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(parse_flag)
    }

    /// Coerced amount; absent or malformed values read as zero.
    pub fn amount(&self, key: &str) -> Decimal {
        self.get(key).and_then(parse_amount).unwrap_or(Decimal::ZERO)
    }

    pub fn date(&self, key: &str) -> Option<NaiveDate> {
        self.get(key).and_then(parse_date)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K> FromIterator<(K, Value)> for Answers
where
    K: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(key, value)| (key.into(), value)).collect())
    }
}

pub fn value_is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(raw) => !raw.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(entries) => !entries.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// Parses currency-ish input: JSON numbers, or strings with optional `$`,
/// thousands separators and surrounding whitespace.
pub fn parse_amount(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => parse_amount_str(&number.to_string()),
        Value::String(raw) => parse_amount_str(raw),
        _ => None,
    }
}

pub fn parse_amount_str(raw: &str) -> Option<Decimal> {
    let cleaned: String =
        raw.trim().chars().filter(|ch| !matches!(ch, '$' | ',' | '_' | ' ')).collect();
    if cleaned.is_empty() {
        return None;
    }

    Decimal::from_str(&cleaned).or_else(|_| Decimal::from_scientific(&cleaned)).ok()
}

pub fn parse_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_i64().map(|n| n != 0),
        Value::String(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" | "on" => Some(true),
            "false" | "no" | "n" | "0" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{parse_amount, parse_flag, value_is_present, Answers};

    #[test]
    fn amount_accessor_coerces_malformed_values_to_zero() {
        let answers: Answers = [
            ("wages", json!("$1,250.50")),
            ("bonus", json!(300)),
            ("junk", json!("twelve")),
            ("object", json!({"nested": 1})),
        ]
        .into_iter()
        .collect();

        assert_eq!(answers.amount("wages"), Decimal::new(125_050, 2));
        assert_eq!(answers.amount("bonus"), Decimal::from(300));
        assert_eq!(answers.amount("junk"), Decimal::ZERO);
        assert_eq!(answers.amount("object"), Decimal::ZERO);
        assert_eq!(answers.amount("missing"), Decimal::ZERO);
    }

    #[test]
    fn presence_treats_blank_and_null_as_absent() {
        assert!(!value_is_present(&json!(null)));
        assert!(!value_is_present(&json!("   ")));
        assert!(!value_is_present(&json!([])));
        assert!(value_is_present(&json!(false)));
        assert!(value_is_present(&json!(0)));
    }

    #[test]
    fn flags_accept_common_spellings() {
        assert_eq!(parse_flag(&json!("Yes")), Some(true));
        assert_eq!(parse_flag(&json!("off")), Some(false));
        assert_eq!(parse_flag(&json!(1)), Some(true));
        assert_eq!(parse_flag(&json!("maybe")), None);
        assert_eq!(parse_amount(&json!("1e3")), Some(Decimal::from(1000)));
    }
}
