//! CSV rendering of collected responses

use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt::{self, Write};
use thiserror::Error;

use crate::domain::aggregates::{Form, Question, ResponseWithAnswers};
use crate::domain::value_objects::{parse_date, AccessMode, AnswerValue, QuestionType};

/// Labels and formats used in the exported file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// `chrono` format for the submission timestamp column.
    pub timestamp_format: String,
    /// `chrono` format for date answers.
    pub date_format: String,
    /// Cell text for file answers.
    pub file_placeholder: String,
    pub submitted_at_label: String,
    pub name_label: String,
    pub email_label: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            timestamp_format: "%d/%m/%Y %H:%M".into(),
            date_format: "%d/%m/%Y".into(),
            file_placeholder: "Attached file".into(),
            submitted_at_label: "Submitted at".into(),
            name_label: "Name".into(),
            email_label: "Email".into(),
        }
    }
}

impl ExportOptions {
    /// Fails on the first format `chrono` cannot render.
    pub fn validate(&self) -> Result<(), FormatError> {
        let formats = [("timestamp_format", &self.timestamp_format), ("date_format", &self.date_format)];
        for (field, format) in formats {
            if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
                return Err(FormatError { field, format: format.clone() });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid {field}: {format:?}")]
pub struct FormatError {
    pub field: &'static str,
    pub format: String,
}

#[derive(Clone, Debug, Default)]
pub struct CsvExporter {
    options: ExportOptions,
}

impl CsvExporter {
    pub fn new(options: ExportOptions) -> Self {
        Self { options }
    }

    /// Renders the header and one row per response, in the order given.
    ///
    /// Columns: timestamp, then name and email for nominative forms, then one
    /// column per question in `index` order.
    pub fn render(
        &self,
        form: &Form,
        questions: &[Question],
        responses: &[ResponseWithAnswers],
    ) -> String {
        let mut questions: Vec<&Question> = questions.iter().collect();
        questions.sort_by_key(|q| q.index);
        let nominative = form.access_mode == AccessMode::Nominative;

        let mut header = vec![self.options.submitted_at_label.clone()];
        if nominative {
            header.push(self.options.name_label.clone());
            header.push(self.options.email_label.clone());
        }
        header.extend(questions.iter().map(|q| q.label.clone()));

        let mut rows = Vec::with_capacity(responses.len() + 1);
        rows.push(join_row(&header));

        for entry in responses {
            let response = &entry.response;
            let at = response.submitted_at;
            let mut row = vec![display_or(at.format(&self.options.timestamp_format), || at.to_rfc3339())];
            if nominative {
                row.push(response.responder_name.clone().unwrap_or_default());
                row.push(response.responder_email.clone().unwrap_or_default());
            }
            for q in &questions {
                row.push(self.format_value(entry.answer_for(&q.id), q.question_type));
            }
            rows.push(join_row(&row));
        }

        rows.join("\n")
    }

    pub fn format_value(&self, value: Option<&AnswerValue>, question_type: QuestionType) -> String {
        let Some(value) = value else {
            return String::new();
        };
        match (question_type, value) {
            (QuestionType::File, _) => self.options.file_placeholder.clone(),
            (QuestionType::MultipleChoice, AnswerValue::Choices(items)) => items.join("; "),
            (QuestionType::Date, AnswerValue::Date(raw) | AnswerValue::Text(raw)) => match parse_date(raw) {
                Some(date) => display_or(date.format(&self.options.date_format), || raw.clone()),
                None => raw.clone(),
            },
            (_, other) => other.to_string(),
        }
    }

    /// `<title>_responses_<date>.csv`, with anything outside `[A-Za-z0-9]`
    /// in the title replaced by `_`.
    pub fn file_name(&self, form: &Form, today: NaiveDate) -> String {
        let title: String = form
            .title
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("{}_responses_{}.csv", title, today.format("%Y-%m-%d"))
    }
}

/// Quotes a field when it contains a comma, a double quote or a newline.
pub fn escape_field(raw: &str) -> Cow<'_, str> {
    if raw.contains([',', '"', '\n']) {
        Cow::Owned(format!("\"{}\"", raw.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(raw)
    }
}

fn join_row(fields: &[String]) -> String {
    fields.iter().map(|f| escape_field(f)).collect::<Vec<_>>().join(",")
}

/// `chrono` reports a bad format item as a `fmt::Error`, which `to_string`
/// would turn into a panic.
fn display_or(value: impl fmt::Display, fallback: impl FnOnce() -> String) -> String {
    let mut out = String::new();
    match write!(out, "{}", value) {
        Ok(()) => out,
        Err(_) => fallback(),
    }
}
