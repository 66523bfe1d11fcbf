//! In-memory store implementation
//!
//! Backs the service in development and in tests. Tables are `DashMap`s
//! keyed the way a relational schema would index them.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::aggregates::{Answer, Form, Question, Response};
use crate::domain::value_objects::{FormId, OwnerId, QuestionId, ResponseId};
use crate::ports::outbound::{FormStore, QuestionSync, StoreError, Window};

/// Operations that can be made to fail once, to exercise partial-failure paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreOp {
    InsertResponse,
    InsertAnswers,
    SyncQuestions,
    UpdateForm,
}

#[derive(Clone)]
struct StoredResponse {
    seq: u64,
    response: Response,
}

#[derive(Default)]
pub struct InMemoryFormStore {
    forms: DashMap<FormId, Form>,
    slugs: DashMap<String, FormId>,
    questions: DashMap<FormId, Vec<Question>>,
    question_forms: DashMap<QuestionId, FormId>,
    responses: DashMap<ResponseId, StoredResponse>,
    answers: DashMap<ResponseId, Vec<Answer>>,
    seq: AtomicU64,
    faults: DashSet<StoreOp>,
}

impl InMemoryFormStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next call of `op` fail with `StoreError::Unavailable`.
    pub fn inject_failure(&self, op: StoreOp) {
        self.faults.insert(op);
    }

    fn check_fault(&self, op: StoreOp) -> Result<(), StoreError> {
        match self.faults.remove(&op) {
            Some(_) => Err(StoreError::Unavailable(format!("{:?} failed", op))),
            None => Ok(()),
        }
    }

    pub fn response_count(&self) -> usize {
        self.responses.len()
    }
}

#[async_trait]
impl FormStore for InMemoryFormStore {
    async fn insert_form(&self, form: &Form) -> Result<(), StoreError> {
        if self.forms.contains_key(&form.id) {
            return Err(StoreError::DuplicateKey(form.id.to_string()));
        }
        self.forms.insert(form.id, form.clone());
        Ok(())
    }

    async fn find_form(&self, id: &FormId) -> Result<Option<Form>, StoreError> {
        Ok(self.forms.get(id).map(|f| f.clone()))
    }

    async fn find_form_by_slug(&self, slug: &str) -> Result<Option<Form>, StoreError> {
        let Some(form_id) = self.slugs.get(slug).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self
            .forms
            .get(&form_id)
            .filter(|f| f.slug.as_deref() == Some(slug))
            .map(|f| f.clone()))
    }

    async fn list_forms_by_owner(&self, owner_id: &OwnerId) -> Result<Vec<Form>, StoreError> {
        Ok(self
            .forms
            .iter()
            .filter(|f| f.is_owned_by(owner_id))
            .map(|f| f.clone())
            .collect())
    }

    async fn update_form(&self, form: &Form) -> Result<(), StoreError> {
        self.check_fault(StoreOp::UpdateForm)?;
        let mut stored = self
            .forms
            .get_mut(&form.id)
            .ok_or_else(|| StoreError::NotFound(format!("form {}", form.id)))?;
        *stored = form.clone();
        Ok(())
    }

    async fn claim_slug(&self, form_id: &FormId, slug: &str) -> Result<bool, StoreError> {
        match self.slugs.entry(slug.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(held) => Ok(held.get() == form_id),
            dashmap::mapref::entry::Entry::Vacant(free) => {
                free.insert(*form_id);
                Ok(true)
            }
        }
    }

    async fn list_questions(&self, form_id: &FormId) -> Result<Vec<Question>, StoreError> {
        let mut questions = self.questions.get(form_id).map(|q| q.clone()).unwrap_or_default();
        questions.sort_by_key(|q| q.index);
        Ok(questions)
    }

    async fn question_form_id(&self, id: &QuestionId) -> Result<Option<FormId>, StoreError> {
        Ok(self.question_forms.get(id).map(|f| *f))
    }

    async fn sync_questions(
        &self,
        form_id: &FormId,
        mut questions: Vec<Question>,
    ) -> Result<QuestionSync, StoreError> {
        self.check_fault(StoreOp::SyncQuestions)?;
        if !self.forms.contains_key(form_id) {
            return Err(StoreError::NotFound(format!("form {}", form_id)));
        }

        let mut seen = HashSet::new();
        for q in &questions {
            if &q.form_id != form_id {
                return Err(StoreError::Constraint(format!(
                    "question {} belongs to form {}",
                    q.id, q.form_id
                )));
            }
            if !seen.insert(q.id) {
                return Err(StoreError::DuplicateKey(q.id.to_string()));
            }
            let owner = self.question_forms.get(&q.id).map(|f| *f);
            if owner.is_some_and(|owner| &owner != form_id) {
                return Err(StoreError::DuplicateKey(q.id.to_string()));
            }
        }
        questions.sort_by_key(|q| q.index);

        let mut report = QuestionSync::default();
        let removed: Vec<QuestionId> = {
            let mut current = self.questions.entry(*form_id).or_default();
            for q in &questions {
                match current.iter().find(|c| c.id == q.id) {
                    Some(existing) if existing == q => report.unchanged += 1,
                    Some(_) => report.updated += 1,
                    None => report.inserted += 1,
                }
            }
            let removed: Vec<QuestionId> =
                current.iter().filter(|c| !seen.contains(&c.id)).map(|c| c.id).collect();
            *current = questions.clone();
            removed
        };
        report.removed = removed.len();

        for id in removed {
            self.question_forms.remove(&id);
        }
        for q in &questions {
            self.question_forms.insert(q.id, *form_id);
        }
        Ok(report)
    }

    async fn insert_response(&self, response: &Response) -> Result<(), StoreError> {
        self.check_fault(StoreOp::InsertResponse)?;
        if !self.forms.contains_key(&response.form_id) {
            return Err(StoreError::Constraint(format!("form {} does not exist", response.form_id)));
        }
        if self.responses.contains_key(&response.id) {
            return Err(StoreError::DuplicateKey(response.id.to_string()));
        }
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.responses.insert(response.id, StoredResponse { seq, response: response.clone() });
        Ok(())
    }

    async fn insert_answers(&self, answers: &[Answer]) -> Result<(), StoreError> {
        self.check_fault(StoreOp::InsertAnswers)?;
        // Validate the whole batch before writing any of it.
        for answer in answers {
            let form_id = self
                .responses
                .get(&answer.response_id)
                .map(|r| r.response.form_id)
                .ok_or_else(|| {
                    StoreError::Constraint(format!("response {} does not exist", answer.response_id))
                })?;
            let question_form = self.question_forms.get(&answer.question_id).map(|f| *f);
            if question_form != Some(form_id) {
                return Err(StoreError::Constraint(format!(
                    "question {} is not part of form {}",
                    answer.question_id, form_id
                )));
            }
        }
        for answer in answers {
            self.answers.entry(answer.response_id).or_default().push(answer.clone());
        }
        Ok(())
    }

    async fn count_responses(&self, form_id: &FormId) -> Result<u64, StoreError> {
        Ok(self.responses.iter().filter(|r| &r.response.form_id == form_id).count() as u64)
    }

    async fn count_responses_by_form(
        &self,
        form_ids: &[FormId],
    ) -> Result<HashMap<FormId, u64>, StoreError> {
        let wanted: HashSet<&FormId> = form_ids.iter().collect();
        let mut counts = HashMap::new();
        for r in self.responses.iter() {
            if wanted.contains(&r.response.form_id) {
                *counts.entry(r.response.form_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn list_responses(
        &self,
        form_id: &FormId,
        window: Window,
    ) -> Result<Vec<Response>, StoreError> {
        let mut rows: Vec<StoredResponse> = self
            .responses
            .iter()
            .filter(|r| &r.response.form_id == form_id)
            .map(|r| r.clone())
            .collect();
        rows.sort_by(|a, b| {
            b.response
                .submitted_at
                .cmp(&a.response.submitted_at)
                .then_with(|| b.seq.cmp(&a.seq))
        });
        let rows = rows.into_iter().skip(window.offset);
        let rows: Vec<Response> = match window.limit {
            Some(limit) => rows.take(limit).map(|r| r.response).collect(),
            None => rows.map(|r| r.response).collect(),
        };
        Ok(rows)
    }

    async fn list_answers(&self, response_ids: &[ResponseId]) -> Result<Vec<Answer>, StoreError> {
        Ok(response_ids
            .iter()
            .filter_map(|id| self.answers.get(id).map(|a| a.clone()))
            .flatten()
            .collect())
    }
}
