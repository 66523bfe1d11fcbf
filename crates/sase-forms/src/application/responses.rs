//! Response aggregation for the owner dashboard and exports

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::aggregates::{AnswerView, Form, Question, Response, ResponseWithAnswers};
use crate::domain::value_objects::{FormId, OwnerId, ResponseId};
use crate::ports::outbound::{FormStore, Window};
use crate::{FormsError, Result};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, limit: DEFAULT_PAGE_SIZE }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResponsePage {
    pub responses: Vec<ResponseWithAnswers>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

/// Everything an export needs, in one consistent read.
#[derive(Clone, Debug)]
pub struct ExportSource {
    pub form: Form,
    pub questions: Vec<Question>,
    pub responses: Vec<ResponseWithAnswers>,
}

pub struct ResponseAggregator {
    store: Arc<dyn FormStore>,
    max_page_size: u32,
}

impl ResponseAggregator {
    pub fn new(store: Arc<dyn FormStore>, max_page_size: u32) -> Self {
        Self { store, max_page_size: max_page_size.max(1) }
    }

    /// One page of responses, newest first, each with its answers.
    pub async fn page(
        &self,
        owner_id: &OwnerId,
        form_id: &FormId,
        request: PageRequest,
    ) -> Result<ResponsePage> {
        let form = owned_form(self.store.as_ref(), owner_id, form_id).await?;

        let page = request.page.max(1);
        let limit = request.limit.clamp(1, self.max_page_size);
        let offset = (page as usize - 1) * limit as usize;

        let total = self.store.count_responses(&form.id).await?;
        let responses = self.store.list_responses(&form.id, Window::page(offset, limit as usize)).await?;
        let responses = self.attach_answers(responses).await?;

        Ok(ResponsePage { responses, total, page, limit })
    }

    /// Every response of the form, newest first, with the question schema.
    pub async fn export_source(&self, owner_id: &OwnerId, form_id: &FormId) -> Result<ExportSource> {
        let form = owned_form(self.store.as_ref(), owner_id, form_id).await?;
        let questions = self.store.list_questions(&form.id).await?;
        let responses = self.store.list_responses(&form.id, Window::all()).await?;
        let responses = self.attach_answers(responses).await?;
        Ok(ExportSource { form, questions, responses })
    }

    async fn attach_answers(&self, responses: Vec<Response>) -> Result<Vec<ResponseWithAnswers>> {
        let ids: Vec<ResponseId> = responses.iter().map(|r| r.id).collect();
        let mut grouped: HashMap<ResponseId, Vec<AnswerView>> = HashMap::new();
        for answer in self.store.list_answers(&ids).await? {
            grouped
                .entry(answer.response_id)
                .or_default()
                .push(AnswerView { question_id: answer.question_id, value: answer.value });
        }

        Ok(responses
            .into_iter()
            .map(|response| {
                let answers = grouped.remove(&response.id).unwrap_or_default();
                ResponseWithAnswers { response, answers }
            })
            .collect())
    }
}

/// Loads a form and checks the caller owns it.
pub(crate) async fn owned_form(
    store: &dyn FormStore,
    owner_id: &OwnerId,
    form_id: &FormId,
) -> Result<Form> {
    let form = store.find_form(form_id).await?.ok_or(FormsError::FormNotFound)?;
    if !form.is_owned_by(owner_id) {
        return Err(FormsError::Forbidden);
    }
    Ok(form)
}
