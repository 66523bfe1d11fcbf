//! Forms value objects

use chrono::{DateTime, NaiveDate};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

pub type FormId = Uuid;
pub type QuestionId = Uuid;
pub type ResponseId = Uuid;
pub type AnswerId = Uuid;
pub type OwnerId = Uuid;

/// Whether a form asks respondents to identify themselves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    #[default]
    Anonymous,
    Nominative,
    Authenticated,
}

impl AccessMode {
    pub fn requires_identification(self) -> bool {
        !matches!(self, Self::Anonymous)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentificationField {
    Name,
    Email,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    ShortText,
    LongText,
    SingleChoice,
    MultipleChoice,
    Number,
    Date,
    File,
}

impl QuestionType {
    pub fn is_choice(self) -> bool {
        matches!(self, Self::SingleChoice | Self::MultipleChoice)
    }
}

/// An authenticated caller, as vouched for by the session service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: OwnerId,
    pub email: String,
    pub name: Option<String>,
}

/// Identity fields attached to a response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Respondent {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// A single field-level validation failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

/// A typed answer value. The variant is decided by the question type at
/// submission time; serialized untagged so clients see the plain value.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Text(String),
    Number(f64),
    Choice(String),
    Choices(Vec<String>),
    Date(String),
    File(Value),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnswerError {
    #[error("expected a text value")]
    ExpectedText,
    #[error("expected a number, got {0}")]
    ExpectedNumber(String),
    #[error("invalid date: {0}")]
    InvalidDate(String),
    #[error("expected a single choice")]
    ExpectedChoice,
    #[error("expected a list of choices")]
    ExpectedChoices,
    #[error("unknown option: {0}")]
    UnknownOption(String),
}

impl AnswerValue {
    /// Coerces a raw payload value into the shape `question_type` expects.
    ///
    /// Returns `Ok(None)` for blank input (null, empty string, empty list),
    /// which callers treat as "not answered".
    pub fn coerce(
        question_type: QuestionType,
        options: &[String],
        raw: &Value,
    ) -> Result<Option<Self>, AnswerError> {
        if is_blank(raw) {
            return Ok(None);
        }

        let value = match question_type {
            QuestionType::ShortText | QuestionType::LongText => match raw {
                Value::String(s) => Self::Text(s.clone()),
                Value::Number(n) => Self::Text(n.to_string()),
                Value::Bool(b) => Self::Text(b.to_string()),
                _ => return Err(AnswerError::ExpectedText),
            },
            QuestionType::Number => Self::Number(coerce_number(raw)?),
            QuestionType::Date => {
                let Value::String(s) = raw else {
                    return Err(AnswerError::InvalidDate(raw.to_string()));
                };
                let s = s.trim();
                if parse_date(s).is_none() {
                    return Err(AnswerError::InvalidDate(s.to_string()));
                }
                Self::Date(s.to_string())
            }
            QuestionType::SingleChoice => {
                let choice = match raw {
                    Value::String(s) => s.clone(),
                    Value::Array(items) if items.len() == 1 => match &items[0] {
                        Value::String(s) => s.clone(),
                        _ => return Err(AnswerError::ExpectedChoice),
                    },
                    _ => return Err(AnswerError::ExpectedChoice),
                };
                check_option(options, &choice)?;
                Self::Choice(choice)
            }
            QuestionType::MultipleChoice => {
                let choices = match raw {
                    Value::String(s) => vec![s.clone()],
                    Value::Array(items) => items
                        .iter()
                        .map(|item| match item {
                            Value::String(s) => Ok(s.clone()),
                            _ => Err(AnswerError::ExpectedChoices),
                        })
                        .collect::<Result<Vec<_>, _>>()?,
                    _ => return Err(AnswerError::ExpectedChoices),
                };
                let choices: Vec<String> =
                    choices.into_iter().filter(|c| !c.trim().is_empty()).collect();
                if choices.is_empty() {
                    return Ok(None);
                }
                for choice in &choices {
                    check_option(options, choice)?;
                }
                Self::Choices(choices)
            }
            QuestionType::File => Self::File(raw.clone()),
        };

        Ok(Some(value))
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) | Self::Choice(s) | Self::Date(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{}", n),
            Self::Choices(items) => f.write_str(&items.join("; ")),
            Self::File(Value::String(s)) => f.write_str(s),
            Self::File(other) => write!(f, "{}", other),
        }
    }
}

fn is_blank(raw: &Value) -> bool {
    match raw {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn coerce_number(raw: &Value) -> Result<f64, AnswerError> {
    let parsed = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|n| n.is_finite())
        .ok_or_else(|| AnswerError::ExpectedNumber(raw.to_string()))
}

fn check_option(options: &[String], choice: &str) -> Result<(), AnswerError> {
    if options.is_empty() || options.iter().any(|o| o == choice) {
        Ok(())
    } else {
        Err(AnswerError::UnknownOption(choice.to_string()))
    }
}

/// Parses the date shapes the public form can send: a plain calendar date
/// or a full RFC 3339 timestamp.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

const SLUG_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Random lowercase alphanumeric slug.
pub fn generate_slug(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| SLUG_ALPHABET[rng.gen_range(0..SLUG_ALPHABET.len())] as char)
        .collect()
}

/// Loose shape check; delivery is what actually proves an address.
pub fn is_plausible_email(raw: &str) -> bool {
    match raw.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !raw.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
