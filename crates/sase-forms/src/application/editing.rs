//! Owner-side form editing: create, load, save and list

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::application::responses::owned_form;
use crate::domain::aggregates::{Form, FormWithQuestions, Question, DEFAULT_TITLE};
use crate::domain::value_objects::{
    AccessMode, FieldError, FormId, IdentificationField, OwnerId, QuestionId, QuestionType,
};
use crate::ports::outbound::{FormStore, QuestionSync};
use crate::{FormsError, Result};

/// A question as sent by the builder. Position in the list is its index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuestionInput {
    #[serde(default)]
    pub id: Option<QuestionId>,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub options: Vec<String>,
}

/// Metadata changes; absent fields are left alone.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FormPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_mode: Option<AccessMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identification_fields: Option<Vec<IdentificationField>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct CreateFormRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub access_mode: Option<AccessMode>,
    #[serde(default)]
    pub questions: Vec<QuestionInput>,
}

/// Body of `/save`: metadata and/or the complete question set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveFormRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<FormPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<QuestionInput>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FormListing {
    pub forms: Vec<Form>,
    pub response_counts: HashMap<FormId, u64>,
}

pub struct FormEditor {
    store: Arc<dyn FormStore>,
}

impl FormEditor {
    pub fn new(store: Arc<dyn FormStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, owner_id: &OwnerId, request: CreateFormRequest) -> Result<FormId> {
        check_questions(&request.questions)?;

        let title = request
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());
        let mut form = Form::create(*owner_id, title);
        form.description = non_blank(request.description);
        form.access_mode = request.access_mode.unwrap_or_default();
        self.store.insert_form(&form).await?;

        if !request.questions.is_empty() {
            let questions = self.materialize(&form.id, request.questions).await?;
            self.store.sync_questions(&form.id, questions).await?;
        }

        info!(form_id = %form.id, owner_id = %owner_id, "form created");
        Ok(form.id)
    }

    pub async fn get(&self, owner_id: &OwnerId, form_id: &FormId) -> Result<FormWithQuestions> {
        let form = owned_form(self.store.as_ref(), owner_id, form_id).await?;
        let questions = self.store.list_questions(&form.id).await?;
        Ok(FormWithQuestions { form, questions })
    }

    /// Applies a metadata patch and replaces the question set. Everything is
    /// validated before anything is written.
    pub async fn save(
        &self,
        owner_id: &OwnerId,
        form_id: &FormId,
        request: SaveFormRequest,
    ) -> Result<QuestionSync> {
        let mut form = owned_form(self.store.as_ref(), owner_id, form_id).await?;

        if let Some(questions) = &request.questions {
            check_questions(questions)?;
        }
        let patched = match request.form {
            Some(patch) => apply_patch(&mut form, patch)?,
            None => false,
        };

        let report = match request.questions {
            Some(inputs) => {
                let questions = self.materialize(&form.id, inputs).await?;
                self.store.sync_questions(&form.id, questions).await?
            }
            None => QuestionSync::default(),
        };
        if patched {
            self.store.update_form(&form).await?;
        }

        info!(
            form_id = %form.id,
            inserted = report.inserted,
            updated = report.updated,
            removed = report.removed,
            "form saved"
        );
        Ok(report)
    }

    /// Owner's forms, newest first, with a response count for each.
    pub async fn list(&self, owner_id: &OwnerId) -> Result<FormListing> {
        let mut forms = self.store.list_forms_by_owner(owner_id).await?;
        forms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let ids: Vec<FormId> = forms.iter().map(|f| f.id).collect();
        let mut response_counts = self.store.count_responses_by_form(&ids).await?;
        for id in &ids {
            response_counts.entry(*id).or_insert(0);
        }
        Ok(FormListing { forms, response_counts })
    }

    /// Turns builder input into stored questions. Ids owned by another form
    /// are never reused.
    async fn materialize(&self, form_id: &FormId, inputs: Vec<QuestionInput>) -> Result<Vec<Question>> {
        let mut questions = Vec::with_capacity(inputs.len());
        for (index, input) in inputs.into_iter().enumerate() {
            let id = match input.id {
                Some(id) => match self.store.question_form_id(&id).await? {
                    Some(owner) if &owner != form_id => uuid::Uuid::new_v4(),
                    _ if questions.iter().any(|q: &Question| q.id == id) => uuid::Uuid::new_v4(),
                    _ => id,
                },
                None => uuid::Uuid::new_v4(),
            };
            let options = if input.question_type.is_choice() {
                input.options.into_iter().map(|o| o.trim().to_string()).filter(|o| !o.is_empty()).collect()
            } else {
                vec![]
            };
            questions.push(Question {
                id,
                form_id: *form_id,
                index: index as u32,
                question_type: input.question_type,
                label: input.label.trim().to_string(),
                description: non_blank(input.description),
                is_required: input.is_required,
                options,
            });
        }
        Ok(questions)
    }
}

fn check_questions(inputs: &[QuestionInput]) -> Result<()> {
    let mut errors = Vec::new();
    for (i, q) in inputs.iter().enumerate() {
        if q.label.trim().is_empty() {
            errors.push(FieldError::new(format!("questions[{}].label", i), "Label is required"));
        }
        if q.question_type.is_choice() && q.options.iter().all(|o| o.trim().is_empty()) {
            errors.push(FieldError::new(
                format!("questions[{}].options", i),
                "At least one option is required",
            ));
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(FormsError::Invalid(errors))
    }
}

/// Returns whether anything was applied.
fn apply_patch(form: &mut Form, patch: FormPatch) -> Result<bool> {
    let before = form.clone();
    if let Some(title) = patch.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(FormsError::invalid("title", "Title is required"));
        }
        form.title = title.to_string();
    }
    if let Some(description) = patch.description {
        form.description = non_blank(Some(description));
    }
    if let Some(mode) = patch.access_mode {
        form.access_mode = mode;
    }
    if let Some(mut fields) = patch.identification_fields {
        let mut seen = Vec::with_capacity(fields.len());
        fields.retain(|field| {
            let first = !seen.contains(field);
            seen.push(*field);
            first
        });
        form.identification_fields = fields;
    }
    if let Some(active) = patch.is_active {
        form.is_active = active;
    }
    Ok(*form != before)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::{InMemoryFormStore, StoreOp};

    fn input(kind: QuestionType, label: &str, options: &[&str]) -> QuestionInput {
        QuestionInput {
            id: None,
            question_type: kind,
            label: label.into(),
            description: None,
            is_required: false,
            options: options.iter().map(|o| o.to_string()).collect(),
        }
    }

    fn editor() -> (Arc<InMemoryFormStore>, FormEditor) {
        let store = Arc::new(InMemoryFormStore::new());
        (store.clone(), FormEditor::new(store))
    }

    #[tokio::test]
    async fn test_create_with_defaults() {
        let (_, editor) = editor();
        let owner = uuid::Uuid::new_v4();
        let id = editor.create(&owner, CreateFormRequest::default()).await.unwrap();

        let loaded = editor.get(&owner, &id).await.unwrap();
        assert_eq!(loaded.form.title, DEFAULT_TITLE);
        assert_eq!(loaded.form.access_mode, AccessMode::Anonymous);
        assert!(!loaded.form.is_published);
        assert!(loaded.questions.is_empty());
    }

    #[tokio::test]
    async fn test_create_with_questions_normalizes() {
        let (_, editor) = editor();
        let owner = uuid::Uuid::new_v4();
        let request = CreateFormRequest {
            title: Some("  Team lunch ".into()),
            questions: vec![
                input(QuestionType::ShortText, " Name ", &["stray"]),
                input(QuestionType::SingleChoice, "Dish", &["Pasta", " ", "Salad"]),
            ],
            ..Default::default()
        };
        let id = editor.create(&owner, request).await.unwrap();

        let loaded = editor.get(&owner, &id).await.unwrap();
        assert_eq!(loaded.form.title, "Team lunch");
        assert_eq!(loaded.questions[0].label, "Name");
        assert!(loaded.questions[0].options.is_empty());
        assert_eq!(loaded.questions[1].options, vec!["Pasta", "Salad"]);
        assert_eq!(loaded.questions[1].index, 1);
    }

    #[tokio::test]
    async fn test_save_rejects_invalid_questions() {
        let (_, editor) = editor();
        let owner = uuid::Uuid::new_v4();
        let id = editor.create(&owner, CreateFormRequest::default()).await.unwrap();

        let request = SaveFormRequest {
            form: Some(FormPatch { title: Some("Renamed".into()), ..Default::default() }),
            questions: Some(vec![
                input(QuestionType::ShortText, "", &[]),
                input(QuestionType::MultipleChoice, "Pick", &[]),
            ]),
        };
        let err = editor.save(&owner, &id, request).await.unwrap_err();
        let FormsError::Invalid(errors) = err else { panic!("expected validation error") };
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["questions[0].label", "questions[1].options"]);

        // nothing written
        assert_eq!(editor.get(&owner, &id).await.unwrap().form.title, DEFAULT_TITLE);
    }

    #[tokio::test]
    async fn test_save_diffs_question_set() {
        let (_, editor) = editor();
        let owner = uuid::Uuid::new_v4();
        let request = CreateFormRequest {
            questions: vec![
                input(QuestionType::ShortText, "A", &[]),
                input(QuestionType::ShortText, "B", &[]),
                input(QuestionType::ShortText, "C", &[]),
            ],
            ..Default::default()
        };
        let id = editor.create(&owner, request).await.unwrap();
        let existing = editor.get(&owner, &id).await.unwrap().questions;

        let keep = |q: &Question| QuestionInput {
            id: Some(q.id),
            question_type: q.question_type,
            label: q.label.clone(),
            description: q.description.clone(),
            is_required: q.is_required,
            options: q.options.clone(),
        };
        let mut renamed = keep(&existing[0]);
        renamed.label = "A2".into();

        let request = SaveFormRequest {
            form: None,
            questions: Some(vec![keep(&existing[2]), renamed, input(QuestionType::Date, "D", &[])]),
        };
        let report = editor.save(&owner, &id, request).await.unwrap();
        // C moved to index 0 and A was relabelled, both count as updates
        assert_eq!(report, QuestionSync { inserted: 1, updated: 2, removed: 1, unchanged: 0 });

        let after = editor.get(&owner, &id).await.unwrap().questions;
        let labels: Vec<&str> = after.iter().map(|q| q.label.as_str()).collect();
        assert_eq!(labels, vec!["C", "A2", "D"]);
        assert_eq!(after[0].id, existing[2].id);
        assert_eq!(after.iter().map(|q| q.index).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_save_does_not_steal_foreign_question_ids() {
        let (_, editor) = editor();
        let owner = uuid::Uuid::new_v4();
        let other = editor
            .create(
                &owner,
                CreateFormRequest {
                    questions: vec![input(QuestionType::ShortText, "Theirs", &[])],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let foreign = editor.get(&owner, &other).await.unwrap().questions[0].id;

        let mine = editor.create(&owner, CreateFormRequest::default()).await.unwrap();
        let mut q = input(QuestionType::ShortText, "Mine", &[]);
        q.id = Some(foreign);
        editor
            .save(&owner, &mine, SaveFormRequest { form: None, questions: Some(vec![q]) })
            .await
            .unwrap();

        let mine_q = editor.get(&owner, &mine).await.unwrap().questions;
        assert_ne!(mine_q[0].id, foreign);
        assert_eq!(editor.get(&owner, &other).await.unwrap().questions[0].id, foreign);
    }

    #[tokio::test]
    async fn test_failed_sync_keeps_previous_questions() {
        let (store, editor) = editor();
        let owner = uuid::Uuid::new_v4();
        let id = editor
            .create(
                &owner,
                CreateFormRequest {
                    questions: vec![input(QuestionType::ShortText, "Keep me", &[])],
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        store.inject_failure(StoreOp::SyncQuestions);
        let request = SaveFormRequest {
            form: Some(FormPatch { is_active: Some(false), ..Default::default() }),
            questions: Some(vec![]),
        };
        let err = editor.save(&owner, &id, request).await.unwrap_err();
        assert!(matches!(err, FormsError::Store(_)));

        let loaded = editor.get(&owner, &id).await.unwrap();
        assert_eq!(loaded.questions.len(), 1);
        assert!(loaded.form.is_active);
    }

    #[tokio::test]
    async fn test_save_patch_only() {
        let (_, editor) = editor();
        let owner = uuid::Uuid::new_v4();
        let id = editor.create(&owner, CreateFormRequest::default()).await.unwrap();

        let patch = FormPatch {
            access_mode: Some(AccessMode::Nominative),
            identification_fields: Some(vec![IdentificationField::Email]),
            is_active: Some(false),
            ..Default::default()
        };
        let report = editor
            .save(&owner, &id, SaveFormRequest { form: Some(patch), questions: None })
            .await
            .unwrap();
        assert_eq!(report, QuestionSync::default());

        let form = editor.get(&owner, &id).await.unwrap().form;
        assert_eq!(form.access_mode, AccessMode::Nominative);
        assert_eq!(form.identification_fields, vec![IdentificationField::Email]);
        assert!(!form.is_active);
    }

    #[tokio::test]
    async fn test_identification_fields_keep_first_occurrence() {
        let (_, editor) = editor();
        let owner = uuid::Uuid::new_v4();
        let id = editor.create(&owner, CreateFormRequest::default()).await.unwrap();

        let patch = FormPatch {
            identification_fields: Some(vec![
                IdentificationField::Name,
                IdentificationField::Email,
                IdentificationField::Name,
            ]),
            ..Default::default()
        };
        editor
            .save(&owner, &id, SaveFormRequest { form: Some(patch), questions: None })
            .await
            .unwrap();

        let form = editor.get(&owner, &id).await.unwrap().form;
        assert_eq!(
            form.identification_fields,
            vec![IdentificationField::Name, IdentificationField::Email]
        );
    }

    #[tokio::test]
    async fn test_owner_checks() {
        let (_, editor) = editor();
        let owner = uuid::Uuid::new_v4();
        let id = editor.create(&owner, CreateFormRequest::default()).await.unwrap();

        let stranger = uuid::Uuid::new_v4();
        assert!(matches!(editor.get(&stranger, &id).await, Err(FormsError::Forbidden)));
        assert!(matches!(
            editor.save(&stranger, &id, SaveFormRequest::default()).await,
            Err(FormsError::Forbidden)
        ));
        assert!(matches!(
            editor.get(&owner, &uuid::Uuid::new_v4()).await,
            Err(FormsError::FormNotFound)
        ));
    }

    #[tokio::test]
    async fn test_list_sorted_with_counts() {
        let (store, editor) = editor();
        let owner = uuid::Uuid::new_v4();
        let older = editor.create(&owner, CreateFormRequest::default()).await.unwrap();
        let newer = editor.create(&owner, CreateFormRequest::default()).await.unwrap();
        let mut f = store.find_form(&older).await.unwrap().unwrap();
        f.created_at = f.created_at - chrono::Duration::hours(1);
        store.update_form(&f).await.unwrap();

        editor.create(&uuid::Uuid::new_v4(), CreateFormRequest::default()).await.unwrap();

        let listing = editor.list(&owner).await.unwrap();
        let ids: Vec<FormId> = listing.forms.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![newer, older]);
        assert_eq!(listing.response_counts.get(&older), Some(&0));
        assert_eq!(listing.response_counts.len(), 2);
    }
}
