//! Submission pipeline: payload normalization, validation, persistence

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::aggregates::{Answer, Form, Question, Response};
use crate::domain::value_objects::{
    is_plausible_email, AccessMode, AnswerValue, FieldError, FormId, IdentificationField,
    Identity, QuestionId, Respondent,
};
use crate::ports::outbound::FormStore;
use crate::{FormsError, Result};

const FORM_FIELD_PREFIX: &str = "q_";
const MAX_NAME_LEN: usize = 200;

/// JSON submission body.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitPayload {
    #[serde(rename = "formId")]
    pub form_id: String,
    pub responder_name: Option<String>,
    pub responder_email: Option<String>,
    #[serde(default)]
    pub answers: Vec<RawAnswerPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAnswerPayload {
    #[serde(rename = "questionId")]
    pub question_id: String,
    #[serde(default)]
    pub value: Value,
}

/// An answer before it has been checked against the form.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAnswer {
    pub question_id: String,
    pub value: Value,
}

/// Encoding-independent submission, ready for validation.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionInput {
    pub form_id: FormId,
    pub responder_name: Option<String>,
    pub responder_email: Option<String>,
    pub answers: Vec<RawAnswer>,
}

impl SubmissionInput {
    pub fn from_json(payload: SubmitPayload) -> Result<Self> {
        let answers = payload
            .answers
            .into_iter()
            .map(|a| RawAnswer { question_id: a.question_id, value: a.value })
            .collect();
        Self::build(&payload.form_id, payload.responder_name, payload.responder_email, answers)
    }

    /// Builds the input from url-encoded pairs. Answers arrive as
    /// `q_<questionId>`; a key repeated several times (checkbox groups)
    /// becomes a list.
    pub fn from_form_fields(fields: Vec<(String, String)>) -> Result<Self> {
        let mut form_id = None;
        let mut name = None;
        let mut email = None;
        let mut order: Vec<String> = Vec::new();
        let mut grouped: HashMap<String, Vec<String>> = HashMap::new();

        for (key, value) in fields {
            match key.as_str() {
                "formId" => form_id = Some(value),
                "responder_name" => name = Some(value),
                "responder_email" => email = Some(value),
                _ => {
                    if let Some(question_id) = key.strip_prefix(FORM_FIELD_PREFIX) {
                        let slot = grouped.entry(question_id.to_string()).or_insert_with(|| {
                            order.push(question_id.to_string());
                            Vec::new()
                        });
                        slot.push(value);
                    }
                }
            }
        }

        let form_id = form_id
            .ok_or_else(|| FormsError::invalid("formId", "Missing formId"))?;
        let answers = order
            .into_iter()
            .map(|question_id| {
                let mut values = grouped.remove(&question_id).unwrap_or_default();
                let value = if values.len() == 1 {
                    Value::String(values.remove(0))
                } else {
                    Value::Array(values.into_iter().map(Value::String).collect())
                };
                RawAnswer { question_id, value }
            })
            .collect();
        Self::build(&form_id, name, email, answers)
    }

    fn build(
        form_id: &str,
        responder_name: Option<String>,
        responder_email: Option<String>,
        answers: Vec<RawAnswer>,
    ) -> Result<Self> {
        let mut errors = Vec::new();

        let form_id = match form_id.trim().parse::<FormId>() {
            Ok(id) => Some(id),
            Err(_) => {
                errors.push(FieldError::new("formId", "must be a UUID"));
                None
            }
        };

        let responder_name = non_blank(responder_name);
        if let Some(name) = &responder_name {
            if name.chars().count() > MAX_NAME_LEN {
                errors.push(FieldError::new(
                    "responder_name",
                    format!("must be at most {} characters", MAX_NAME_LEN),
                ));
            }
        }

        let responder_email = non_blank(responder_email);
        if let Some(email) = &responder_email {
            if !is_plausible_email(email) {
                errors.push(FieldError::new("responder_email", "must be a valid email address"));
            }
        }

        match form_id {
            Some(form_id) if errors.is_empty() => {
                Ok(Self { form_id, responder_name, responder_email, answers })
            }
            _ => Err(FormsError::Invalid(errors)),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// A submission that passed validation. Every answer references a question
/// of `form_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSubmission {
    pub form_id: FormId,
    pub respondent: Respondent,
    pub answers: Vec<(QuestionId, AnswerValue)>,
}

#[derive(Debug, Clone, Copy)]
pub struct SubmissionPolicy {
    /// Reject submissions that leave a required question unanswered.
    pub enforce_required: bool,
}

impl Default for SubmissionPolicy {
    fn default() -> Self {
        Self { enforce_required: true }
    }
}

/// Checks a submission against the form's current schema and access mode.
/// Read-only.
pub struct SubmissionValidator {
    store: Arc<dyn FormStore>,
    policy: SubmissionPolicy,
}

impl SubmissionValidator {
    pub fn new(store: Arc<dyn FormStore>, policy: SubmissionPolicy) -> Self {
        Self { store, policy }
    }

    pub async fn validate(
        &self,
        input: SubmissionInput,
        session: Option<&Identity>,
    ) -> Result<ValidatedSubmission> {
        let form = self
            .store
            .find_form(&input.form_id)
            .await?
            .filter(Form::is_available)
            .ok_or(FormsError::FormUnavailable)?;

        let questions = self.store.list_questions(&form.id).await?;
        let mut errors = Vec::new();
        let answers = self.collect_answers(&questions, input.answers, &mut errors);

        if self.policy.enforce_required {
            for q in questions.iter().filter(|q| q.is_required) {
                if !answers.contains_key(&q.id) {
                    errors.push(FieldError::new(answer_field(&q.id), "This question is required"));
                }
            }
        }

        let respondent =
            resolve_respondent(&form, input.responder_name, input.responder_email, session, &mut errors)?;

        if !errors.is_empty() {
            return Err(FormsError::Invalid(errors));
        }

        let answers: Vec<(QuestionId, AnswerValue)> = questions
            .iter()
            .filter_map(|q| answers.get(&q.id).map(|v| (q.id, v.clone())))
            .collect();

        Ok(ValidatedSubmission { form_id: form.id, respondent, answers })
    }

    /// Coerces answers by question type. Unknown question ids are dropped;
    /// a later answer for the same question replaces an earlier one.
    fn collect_answers(
        &self,
        questions: &[Question],
        raw: Vec<RawAnswer>,
        errors: &mut Vec<FieldError>,
    ) -> HashMap<QuestionId, AnswerValue> {
        let by_id: HashMap<QuestionId, &Question> = questions.iter().map(|q| (q.id, q)).collect();
        let mut answers = HashMap::new();

        for answer in raw {
            let question_id = answer.question_id.trim();
            let Some(question) = question_id
                .parse::<QuestionId>()
                .ok()
                .and_then(|id| by_id.get(&id).copied())
            else {
                debug!(question_id, "dropping answer for unknown question");
                continue;
            };

            match AnswerValue::coerce(question.question_type, &question.options, &answer.value) {
                Ok(Some(value)) => {
                    answers.insert(question.id, value);
                }
                Ok(None) => {
                    answers.remove(&question.id);
                }
                Err(e) => errors.push(FieldError::new(answer_field(&question.id), e.to_string())),
            }
        }
        answers
    }
}

fn answer_field(question_id: &QuestionId) -> String {
    format!("{}{}", FORM_FIELD_PREFIX, question_id)
}

fn resolve_respondent(
    form: &Form,
    name: Option<String>,
    email: Option<String>,
    session: Option<&Identity>,
    errors: &mut Vec<FieldError>,
) -> Result<Respondent> {
    match form.access_mode {
        AccessMode::Anonymous => Ok(Respondent::default()),
        AccessMode::Nominative => {
            for field in form.required_identification() {
                match field {
                    IdentificationField::Name if name.is_none() => {
                        errors.push(FieldError::new("responder_name", "Name is required"))
                    }
                    IdentificationField::Email if email.is_none() => {
                        errors.push(FieldError::new("responder_email", "Email is required"))
                    }
                    _ => {}
                }
            }
            Ok(Respondent { name, email })
        }
        AccessMode::Authenticated => {
            let identity = session.ok_or(FormsError::AuthenticationRequired)?;
            Ok(Respondent {
                name: identity.name.clone().or(name),
                email: Some(identity.email.clone()),
            })
        }
    }
}

/// Persists a validated submission: one response row, then its answers.
///
/// There is no rollback. If the answer batch fails the response row stays
/// behind without answers and the failure is reported.
pub struct SubmissionWriter {
    store: Arc<dyn FormStore>,
}

impl SubmissionWriter {
    pub fn new(store: Arc<dyn FormStore>) -> Self {
        Self { store }
    }

    pub async fn write(&self, submission: ValidatedSubmission) -> Result<()> {
        let response = Response::create(submission.form_id, submission.respondent);
        self.store.insert_response(&response).await?;

        let rows: Vec<Answer> = submission
            .answers
            .into_iter()
            .map(|(question_id, value)| Answer::create(response.id, question_id, value))
            .collect();

        if !rows.is_empty() {
            if let Err(source) = self.store.insert_answers(&rows).await {
                warn!(response_id = %response.id, error = %source, "answers not persisted, response left without answers");
                return Err(FormsError::AnswersNotSaved { response_id: response.id, source });
            }
        }

        info!(form_id = %submission.form_id, response_id = %response.id, answers = rows.len(), "response recorded");
        Ok(())
    }
}

/// Validate then write.
pub struct SubmissionService {
    validator: SubmissionValidator,
    writer: SubmissionWriter,
}

impl SubmissionService {
    pub fn new(store: Arc<dyn FormStore>, policy: SubmissionPolicy) -> Self {
        Self {
            validator: SubmissionValidator::new(store.clone(), policy),
            writer: SubmissionWriter::new(store),
        }
    }

    pub async fn submit(&self, input: SubmissionInput, session: Option<&Identity>) -> Result<()> {
        let validated = self.validator.validate(input, session).await?;
        self.writer.write(validated).await
    }
}
