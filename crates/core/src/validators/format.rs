//! Single-value format checks. Each takes the raw answer, if any, and never panics.

use rust_decimal::Decimal;
use serde_json::Value;

use super::{raw_text, FieldCheck, REQUIRED_MESSAGE};
use crate::domain::answers::{parse_amount, parse_date, parse_flag};

fn digits_of(raw: &str, separators: &[char]) -> Option<String> {
    let mut digits = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
        } else if !separators.contains(&ch) {
            return None;
        }
    }
    Some(digits)
}

pub fn ssn(value: Option<&Value>) -> FieldCheck {
    let Some(raw) = raw_text(value) else {
        return FieldCheck::fail(REQUIRED_MESSAGE);
    };

    match digits_of(&raw, &['-', ' ']) {
        Some(digits) if digits.len() == 9 => {
            let (area, rest) = digits.split_at(3);
            let (group, serial) = rest.split_at(2);
            if area == "000" || area == "666" || area.starts_with('9') {
                FieldCheck::fail("Social security number has an invalid area number")
            } else if group == "00" || serial == "0000" {
                FieldCheck::fail("Social security number has an invalid group or serial")
            } else {
                FieldCheck::pass()
            }
        }
        _ => FieldCheck::fail("Enter a 9-digit social security number (XXX-XX-XXXX)"),
    }
}

pub fn ein(value: Option<&Value>) -> FieldCheck {
    let Some(raw) = raw_text(value) else {
        return FieldCheck::fail(REQUIRED_MESSAGE);
    };

    match digits_of(&raw, &['-']) {
        Some(digits) if digits.len() == 9 && !digits.starts_with("00") => FieldCheck::pass(),
        _ => FieldCheck::fail("Enter a 9-digit employer identification number (XX-XXXXXXX)"),
    }
}

/// Ten-digit North American numbers; a leading country code `1` is accepted.
pub fn phone(value: Option<&Value>) -> FieldCheck {
    let Some(raw) = raw_text(value) else {
        return FieldCheck::fail(REQUIRED_MESSAGE);
    };

    let Some(mut digits) = digits_of(&raw, &['-', ' ', '(', ')', '.', '+']) else {
        return FieldCheck::fail("Phone number may only contain digits and separators");
    };
    if digits.len() == 11 && digits.starts_with('1') {
        digits.remove(0);
    }

    if digits.len() != 10 {
        return FieldCheck::fail("Enter a 10-digit phone number");
    }
    if digits.starts_with('0') || digits.starts_with('1') {
        return FieldCheck::fail("Phone number area code cannot start with 0 or 1");
    }
    FieldCheck::pass()
}

pub fn email(value: Option<&Value>) -> FieldCheck {
    let Some(raw) = raw_text(value) else {
        return FieldCheck::fail(REQUIRED_MESSAGE);
    };

    let valid = match raw.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && !raw.chars().any(char::is_whitespace)
                && domain.split('.').count() >= 2
                && domain.split('.').all(|label| !label.is_empty())
        }
        None => false,
    };

    if valid {
        FieldCheck::pass()
    } else {
        FieldCheck::fail("Enter a valid email address")
    }
}

pub fn zip_code(value: Option<&Value>) -> FieldCheck {
    let Some(raw) = raw_text(value) else {
        return FieldCheck::fail(REQUIRED_MESSAGE);
    };

    let valid = match raw.split_once('-') {
        Some((base, plus_four)) => {
            base.len() == 5
                && plus_four.len() == 4
                && base.chars().chain(plus_four.chars()).all(|ch| ch.is_ascii_digit())
        }
        None => raw.len() == 5 && raw.chars().all(|ch| ch.is_ascii_digit()),
    };

    if valid {
        FieldCheck::pass()
    } else {
        FieldCheck::fail("Enter a 5-digit ZIP code")
    }
}

/// ABA routing number with its 3-7-1 checksum.
pub fn routing_number(value: Option<&Value>) -> FieldCheck {
    let Some(raw) = raw_text(value) else {
        return FieldCheck::fail(REQUIRED_MESSAGE);
    };

    let digits: Vec<u32> = raw.chars().filter_map(|ch| ch.to_digit(10)).collect();
    if digits.len() != 9 || raw.chars().count() != 9 {
        return FieldCheck::fail("Routing number must be exactly 9 digits");
    }

    let weights = [3, 7, 1, 3, 7, 1, 3, 7, 1];
    let checksum: u32 = digits.iter().zip(weights).map(|(digit, weight)| digit * weight).sum();
    if checksum % 10 == 0 {
        FieldCheck::pass()
    } else {
        FieldCheck::fail("Routing number checksum is invalid")
    }
}

pub fn bank_account(value: Option<&Value>) -> FieldCheck {
    let Some(raw) = raw_text(value) else {
        return FieldCheck::fail(REQUIRED_MESSAGE);
    };

    match digits_of(&raw, &['-', ' ']) {
        Some(digits) if (4..=17).contains(&digits.len()) => FieldCheck::pass(),
        _ => FieldCheck::fail("Account number must be 4 to 17 digits"),
    }
}

pub fn currency(value: Option<&Value>) -> FieldCheck {
    match value.filter(|value| super::is_answered(value)) {
        None => FieldCheck::fail(REQUIRED_MESSAGE),
        Some(value) => match parse_amount(value) {
            Some(amount) if amount < Decimal::ZERO => FieldCheck::fail("Amount cannot be negative"),
            Some(amount) if amount.normalize().scale() > 2 => {
                FieldCheck::fail("Amount cannot have more than two decimal places")
            }
            Some(_) => FieldCheck::pass(),
            None => FieldCheck::fail("Enter a valid dollar amount"),
        },
    }
}

pub fn min_amount(value: Option<&Value>, minimum: Decimal) -> FieldCheck {
    let check = currency(value);
    if !check.valid {
        return check;
    }

    match value.and_then(parse_amount) {
        Some(amount) if amount >= minimum => FieldCheck::pass(),
        _ => FieldCheck::fail(format!("Amount must be at least ${minimum}")),
    }
}

pub fn max_amount(value: Option<&Value>, maximum: Decimal) -> FieldCheck {
    let check = currency(value);
    if !check.valid {
        return check;
    }

    match value.and_then(parse_amount) {
        Some(amount) if amount <= maximum => FieldCheck::pass(),
        _ => FieldCheck::fail(format!("Amount cannot exceed ${maximum}")),
    }
}

pub fn integer_between(value: Option<&Value>, min: i64, max: i64) -> FieldCheck {
    let parsed = match value {
        Some(Value::Number(number)) => number.as_i64(),
        Some(Value::String(raw)) if !raw.trim().is_empty() => raw.trim().parse::<i64>().ok(),
        _ => return FieldCheck::fail(REQUIRED_MESSAGE),
    };

    match parsed {
        Some(number) if (min..=max).contains(&number) => FieldCheck::pass(),
        Some(_) => FieldCheck::fail(format!("Enter a whole number between {min} and {max}")),
        None => FieldCheck::fail("Enter a whole number"),
    }
}

pub fn date(value: Option<&Value>) -> FieldCheck {
    let Some(raw) = raw_text(value) else {
        return FieldCheck::fail(REQUIRED_MESSAGE);
    };

    if parse_date(&Value::String(raw)).is_some() {
        FieldCheck::pass()
    } else {
        FieldCheck::fail("Enter a date as YYYY-MM-DD")
    }
}

/// Minimum length in characters after trimming; used for every narrative field.
pub fn min_length(value: Option<&Value>, minimum: usize) -> FieldCheck {
    let Some(raw) = raw_text(value) else {
        return FieldCheck::fail(REQUIRED_MESSAGE);
    };

    let length = raw.chars().count();
    if length >= minimum {
        FieldCheck::pass()
    } else {
        FieldCheck::fail(format!(
            "Please provide at least {minimum} characters ({length} entered)"
        ))
    }
}

pub fn max_length(value: Option<&Value>, maximum: usize) -> FieldCheck {
    let Some(raw) = raw_text(value) else {
        return FieldCheck::fail(REQUIRED_MESSAGE);
    };

    if raw.chars().count() <= maximum {
        FieldCheck::pass()
    } else {
        FieldCheck::fail(format!("Keep this under {maximum} characters"))
    }
}

pub fn one_of(value: Option<&Value>, options: &[&str]) -> FieldCheck {
    let Some(raw) = raw_text(value) else {
        return FieldCheck::fail(REQUIRED_MESSAGE);
    };

    if options.iter().any(|option| option.eq_ignore_ascii_case(&raw)) {
        FieldCheck::pass()
    } else {
        FieldCheck::fail(format!("Choose one of: {}", options.join(", ")))
    }
}

/// Checkbox-style confirmations: only an explicit true passes.
pub fn affirmed(value: Option<&Value>) -> FieldCheck {
    match value.and_then(parse_flag) {
        Some(true) => FieldCheck::pass(),
        _ => FieldCheck::fail("You must confirm this statement to continue"),
    }
}

pub fn yes_no(value: Option<&Value>) -> FieldCheck {
    match value {
        None | Some(Value::Null) => FieldCheck::fail(REQUIRED_MESSAGE),
        Some(Value::String(raw)) if raw.trim().is_empty() => FieldCheck::fail(REQUIRED_MESSAGE),
        Some(value) if parse_flag(value).is_some() => FieldCheck::pass(),
        Some(_) => FieldCheck::fail("Answer yes or no"),
    }
}
