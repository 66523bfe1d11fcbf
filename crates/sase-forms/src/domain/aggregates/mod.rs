//! Form aggregates and the records hanging off them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{
    AccessMode, AnswerId, AnswerValue, FormId, IdentificationField, OwnerId, QuestionId,
    QuestionType, Respondent, ResponseId,
};

pub const DEFAULT_TITLE: &str = "Untitled";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Form {
    pub id: FormId,
    pub title: String,
    pub description: Option<String>,
    pub slug: Option<String>,
    pub access_mode: AccessMode,
    pub identification_fields: Vec<IdentificationField>,
    pub is_published: bool,
    pub is_active: bool,
    pub owner_id: OwnerId,
    pub created_at: DateTime<Utc>,
}

impl Form {
    /// New draft: unpublished, active, no slug.
    pub fn create(owner_id: OwnerId, title: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            title: title.into(),
            description: None,
            slug: None,
            access_mode: AccessMode::default(),
            identification_fields: vec![],
            is_published: false,
            is_active: true,
            owner_id,
            created_at: Utc::now(),
        }
    }

    pub fn is_owned_by(&self, owner_id: &OwnerId) -> bool {
        &self.owner_id == owner_id
    }

    /// Publicly resolvable and accepting submissions.
    pub fn is_available(&self) -> bool {
        self.is_published && self.is_active
    }

    /// Identification fields a nominative form demands; both when unset.
    pub fn required_identification(&self) -> Vec<IdentificationField> {
        if self.identification_fields.is_empty() {
            vec![IdentificationField::Name, IdentificationField::Email]
        } else {
            self.identification_fields.clone()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub form_id: FormId,
    pub index: u32,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub label: String,
    pub description: Option<String>,
    pub is_required: bool,
    #[serde(default)]
    pub options: Vec<String>,
}

/// Reassigns `index` so it runs `0..n` in slice order.
pub fn reindex(questions: &mut [Question]) {
    for (i, q) in questions.iter_mut().enumerate() {
        q.index = i as u32;
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: ResponseId,
    pub form_id: FormId,
    pub submitted_at: DateTime<Utc>,
    pub responder_name: Option<String>,
    pub responder_email: Option<String>,
}

impl Response {
    pub fn create(form_id: FormId, respondent: Respondent) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            form_id,
            submitted_at: Utc::now(),
            responder_name: respondent.name,
            responder_email: respondent.email,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Answer {
    pub id: AnswerId,
    pub response_id: ResponseId,
    pub question_id: QuestionId,
    pub value: AnswerValue,
}

impl Answer {
    pub fn create(response_id: ResponseId, question_id: QuestionId, value: AnswerValue) -> Self {
        Self { id: uuid::Uuid::new_v4(), response_id, question_id, value }
    }
}

/// Answer as embedded in a response listing.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnswerView {
    pub question_id: QuestionId,
    pub value: AnswerValue,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResponseWithAnswers {
    #[serde(flatten)]
    pub response: Response,
    pub answers: Vec<AnswerView>,
}

impl ResponseWithAnswers {
    pub fn answer_for(&self, question_id: &QuestionId) -> Option<&AnswerValue> {
        self.answers.iter().find(|a| &a.question_id == question_id).map(|a| &a.value)
    }
}

/// Form plus its questions in `index` order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FormWithQuestions {
    pub form: Form,
    pub questions: Vec<Question>,
}
