//! Outbound ports (persistence)
//!
//! Hexagonal architecture: the datastore sits behind `FormStore` and is
//! handed to every service explicitly.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

use crate::domain::aggregates::{Answer, Form, Question, Response};
use crate::domain::value_objects::{FormId, OwnerId, QuestionId, ResponseId};

/// Slice of a newest-first response listing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub offset: usize,
    pub limit: Option<usize>,
}

impl Window {
    pub fn all() -> Self {
        Self { offset: 0, limit: None }
    }

    pub fn page(offset: usize, limit: usize) -> Self {
        Self { offset, limit: Some(limit) }
    }
}

/// What a question-set sync changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct QuestionSync {
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
    pub unchanged: usize,
}

/// Form repository port
#[async_trait]
pub trait FormStore: Send + Sync {
    async fn insert_form(&self, form: &Form) -> Result<(), StoreError>;

    async fn find_form(&self, id: &FormId) -> Result<Option<Form>, StoreError>;

    async fn find_form_by_slug(&self, slug: &str) -> Result<Option<Form>, StoreError>;

    async fn list_forms_by_owner(&self, owner_id: &OwnerId) -> Result<Vec<Form>, StoreError>;

    /// Overwrites the stored metadata of an existing form.
    async fn update_form(&self, form: &Form) -> Result<(), StoreError>;

    /// Reserves `slug` for `form_id`. Returns `false` when another form
    /// already holds it.
    async fn claim_slug(&self, form_id: &FormId, slug: &str) -> Result<bool, StoreError>;

    /// Questions of a form in `index` order.
    async fn list_questions(&self, form_id: &FormId) -> Result<Vec<Question>, StoreError>;

    /// Form that owns a question, if the question exists at all.
    async fn question_form_id(&self, id: &QuestionId) -> Result<Option<FormId>, StoreError>;

    /// Makes the stored question set equal to `questions`: matching ids are
    /// updated, new ids inserted, missing ids removed. All or nothing.
    async fn sync_questions(
        &self,
        form_id: &FormId,
        questions: Vec<Question>,
    ) -> Result<QuestionSync, StoreError>;

    async fn insert_response(&self, response: &Response) -> Result<(), StoreError>;

    /// Batch insert; every answer must reference an existing response and a
    /// question of that response's form.
    async fn insert_answers(&self, answers: &[Answer]) -> Result<(), StoreError>;

    async fn count_responses(&self, form_id: &FormId) -> Result<u64, StoreError>;

    async fn count_responses_by_form(
        &self,
        form_ids: &[FormId],
    ) -> Result<HashMap<FormId, u64>, StoreError>;

    /// Responses of a form, newest `submitted_at` first.
    async fn list_responses(
        &self,
        form_id: &FormId,
        window: Window,
    ) -> Result<Vec<Response>, StoreError>;

    async fn list_answers(&self, response_ids: &[ResponseId]) -> Result<Vec<Answer>, StoreError>;
}

/// Repository error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
