use crate::domain::answers::Answers;

/// Declarative predicate over current answers.
///
/// Used for step inclusion and for "required if" field rules. Comparisons are
/// case-insensitive on trimmed text; an absent field never satisfies
/// `Equals`, `NotEquals`, `OneOf`, `IsTrue` or `IsFalse`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    Always,
    Equals { field: &'static str, value: &'static str },
    NotEquals { field: &'static str, value: &'static str },
    OneOf { field: &'static str, values: &'static [&'static str] },
    IsTrue(&'static str),
    IsFalse(&'static str),
    Present(&'static str),
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn equals(field: &'static str, value: &'static str) -> Self {
        Self::Equals { field, value }
    }

    pub fn not_equals(field: &'static str, value: &'static str) -> Self {
        Self::NotEquals { field, value }
    }

    pub fn evaluate(&self, answers: &Answers) -> bool {
        match self {
            Self::Always => true,
            Self::Equals { field, value } => {
                choice(answers, field).map(|answer| answer == value.to_ascii_lowercase()).unwrap_or(false)
            }
            Self::NotEquals { field, value } => {
                choice(answers, field).map(|answer| answer != value.to_ascii_lowercase()).unwrap_or(false)
            }
            Self::OneOf { field, values } => choice(answers, field)
                .map(|answer| values.iter().any(|value| answer == value.to_ascii_lowercase()))
                .unwrap_or(false),
            Self::IsTrue(field) => answers.flag(field) == Some(true),
            Self::IsFalse(field) => answers.flag(field) == Some(false),
            Self::Present(field) => answers.is_present(field),
            Self::All(conditions) => conditions.iter().all(|condition| condition.evaluate(answers)),
            Self::Any(conditions) => conditions.iter().any(|condition| condition.evaluate(answers)),
            Self::Not(condition) => !condition.evaluate(answers),
        }
    }

    /// Field keys this condition reads, in declaration order.
    pub fn referenced_fields(&self) -> Vec<&'static str> {
        match self {
            Self::Always => Vec::new(),
            Self::Equals { field, .. }
            | Self::NotEquals { field, .. }
            | Self::OneOf { field, .. }
            | Self::IsTrue(field)
            | Self::IsFalse(field)
            | Self::Present(field) => vec![*field],
            Self::All(conditions) | Self::Any(conditions) => {
                conditions.iter().flat_map(Condition::referenced_fields).collect()
            }
            Self::Not(condition) => condition.referenced_fields(),
        }
    }
}

fn choice(answers: &Answers, field: &str) -> Option<String> {
    answers.text(field).map(str::to_ascii_lowercase)
}
