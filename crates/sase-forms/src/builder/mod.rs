//! Client-side form builder model
//!
//! A reducer over `BuilderAction`s. The builder never writes to the store on
//! its own; its state reaches the server through `to_save_request`, either on
//! an explicit save or via the debounced `AutoSaver`.

pub mod autosave;

pub use autosave::{AutoSaveConfig, AutoSaver, EditorSink, SaveError, SaveSink};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::application::editing::{FormPatch, QuestionInput, SaveFormRequest};
use crate::domain::aggregates::{FormWithQuestions, DEFAULT_TITLE};
use crate::domain::value_objects::{
    AccessMode, FormId, IdentificationField, QuestionId, QuestionType,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DraftQuestion {
    pub id: QuestionId,
    pub index: u32,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub label: String,
    pub description: Option<String>,
    pub is_required: bool,
    pub options: Vec<String>,
}

impl DraftQuestion {
    fn blank(question_type: QuestionType, label: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            index: 0,
            question_type,
            label,
            description: None,
            is_required: false,
            options: seed_options(question_type),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormDraft {
    pub id: Option<FormId>,
    pub title: String,
    pub description: Option<String>,
    pub access_mode: AccessMode,
    pub identification_fields: Vec<IdentificationField>,
    pub is_active: bool,
    pub is_published: bool,
    pub slug: Option<String>,
    pub questions: Vec<DraftQuestion>,
}

impl Default for FormDraft {
    fn default() -> Self {
        Self {
            id: None,
            title: DEFAULT_TITLE.to_string(),
            description: None,
            access_mode: AccessMode::default(),
            identification_fields: vec![],
            is_active: true,
            is_published: false,
            slug: None,
            questions: vec![],
        }
    }
}

impl From<FormWithQuestions> for FormDraft {
    fn from(loaded: FormWithQuestions) -> Self {
        let FormWithQuestions { form, mut questions } = loaded;
        questions.sort_by_key(|q| q.index);
        Self {
            id: Some(form.id),
            title: form.title,
            description: form.description,
            access_mode: form.access_mode,
            identification_fields: form.identification_fields,
            is_active: form.is_active,
            is_published: form.is_published,
            slug: form.slug,
            questions: questions
                .into_iter()
                .map(|q| DraftQuestion {
                    id: q.id,
                    index: q.index,
                    question_type: q.question_type,
                    label: q.label,
                    description: q.description,
                    is_required: q.is_required,
                    options: q.options,
                })
                .collect(),
        }
    }
}

/// Partial update of a single question.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionPatch {
    pub question_type: Option<QuestionType>,
    pub label: Option<String>,
    pub description: Option<Option<String>>,
    pub is_required: Option<bool>,
    pub options: Option<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BuilderAction {
    /// Replaces the whole draft, typically after loading from the server.
    SetForm(FormDraft),
    UpdateForm(FormPatch),
    /// Inserts after `after_index`, or appends when `None`.
    AddQuestion { question_type: QuestionType, after_index: Option<usize> },
    UpdateQuestion { id: QuestionId, patch: QuestionPatch },
    DeleteQuestion { id: QuestionId },
    DuplicateQuestion { id: QuestionId },
    ReorderQuestions { from: usize, to: usize },
    SetError { field: String, message: String },
    ClearError { field: String },
    /// A save of `revision` was confirmed at `at`.
    MarkSaved { revision: u64, at: DateTime<Utc> },
}

#[derive(Clone, Debug, Default)]
pub struct FormBuilder {
    draft: FormDraft,
    revision: u64,
    dirty: bool,
    errors: BTreeMap<String, String>,
    last_saved: Option<DateTime<Utc>>,
}

impl FormBuilder {
    pub fn new(draft: FormDraft) -> Self {
        let mut builder = Self::default();
        builder.apply(BuilderAction::SetForm(draft));
        builder
    }

    pub fn draft(&self) -> &FormDraft {
        &self.draft
    }

    pub fn questions(&self) -> &[DraftQuestion] {
        &self.draft.questions
    }

    /// Bumped by every mutation of the draft.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.last_saved
    }

    /// Applies one action. Returns `false` when it changed nothing.
    pub fn apply(&mut self, action: BuilderAction) -> bool {
        match action {
            BuilderAction::SetForm(mut draft) => {
                reindex(&mut draft.questions);
                self.draft = draft;
                self.errors.clear();
                self.dirty = false;
                self.revision += 1;
                return true;
            }
            BuilderAction::SetError { field, message } => {
                return self.errors.insert(field, message.clone()).as_ref() != Some(&message);
            }
            BuilderAction::ClearError { field } => return self.errors.remove(&field).is_some(),
            BuilderAction::MarkSaved { revision, at } => {
                self.last_saved = Some(at);
                if revision == self.revision {
                    self.dirty = false;
                }
                return true;
            }
            BuilderAction::UpdateForm(patch) => {
                if !self.patch_form(patch) {
                    return false;
                }
            }
            BuilderAction::AddQuestion { question_type, after_index } => {
                let label = format!("Question {}", self.draft.questions.len() + 1);
                let at = match after_index {
                    Some(i) => (i + 1).min(self.draft.questions.len()),
                    None => self.draft.questions.len(),
                };
                self.draft.questions.insert(at, DraftQuestion::blank(question_type, label));
            }
            BuilderAction::UpdateQuestion { id, patch } => {
                let Some(q) = self.draft.questions.iter_mut().find(|q| q.id == id) else {
                    return false;
                };
                patch_question(q, patch);
            }
            BuilderAction::DeleteQuestion { id } => {
                let before = self.draft.questions.len();
                self.draft.questions.retain(|q| q.id != id);
                if self.draft.questions.len() == before {
                    return false;
                }
            }
            BuilderAction::DuplicateQuestion { id } => {
                let Some(pos) = self.draft.questions.iter().position(|q| q.id == id) else {
                    return false;
                };
                let mut copy = self.draft.questions[pos].clone();
                copy.id = uuid::Uuid::new_v4();
                copy.label = format!("{} (copy)", copy.label);
                self.draft.questions.insert(pos + 1, copy);
            }
            BuilderAction::ReorderQuestions { from, to } => {
                let len = self.draft.questions.len();
                if from >= len || to >= len || from == to {
                    return false;
                }
                let moved = self.draft.questions.remove(from);
                self.draft.questions.insert(to, moved);
            }
        }

        reindex(&mut self.draft.questions);
        self.revision += 1;
        self.dirty = true;
        true
    }

    /// The `/save` body for the current draft.
    pub fn to_save_request(&self) -> SaveFormRequest {
        let d = &self.draft;
        SaveFormRequest {
            form: Some(FormPatch {
                title: Some(d.title.clone()),
                description: Some(d.description.clone().unwrap_or_default()),
                access_mode: Some(d.access_mode),
                identification_fields: Some(d.identification_fields.clone()),
                is_active: Some(d.is_active),
            }),
            questions: Some(
                d.questions
                    .iter()
                    .map(|q| QuestionInput {
                        id: Some(q.id),
                        question_type: q.question_type,
                        label: q.label.clone(),
                        description: q.description.clone(),
                        is_required: q.is_required,
                        options: q.options.clone(),
                    })
                    .collect(),
            ),
        }
    }

    fn patch_form(&mut self, patch: FormPatch) -> bool {
        let before = self.draft.clone();
        let d = &mut self.draft;
        if let Some(title) = patch.title {
            d.title = title;
        }
        if let Some(description) = patch.description {
            d.description = Some(description).filter(|s| !s.is_empty());
        }
        if let Some(mode) = patch.access_mode {
            d.access_mode = mode;
        }
        if let Some(fields) = patch.identification_fields {
            d.identification_fields = fields;
        }
        if let Some(active) = patch.is_active {
            d.is_active = active;
        }
        self.draft != before
    }
}

fn patch_question(q: &mut DraftQuestion, patch: QuestionPatch) {
    if let Some(kind) = patch.question_type {
        if kind != q.question_type {
            q.question_type = kind;
            if !kind.is_choice() {
                q.options.clear();
            } else if q.options.is_empty() {
                q.options = seed_options(kind);
            }
        }
    }
    if let Some(label) = patch.label {
        q.label = label;
    }
    if let Some(description) = patch.description {
        q.description = description;
    }
    if let Some(required) = patch.is_required {
        q.is_required = required;
    }
    if let Some(options) = patch.options {
        if q.question_type.is_choice() {
            q.options = options;
        }
    }
}

fn seed_options(question_type: QuestionType) -> Vec<String> {
    if question_type.is_choice() {
        vec!["Option 1".to_string(), "Option 2".to_string()]
    } else {
        vec![]
    }
}

fn reindex(questions: &mut [DraftQuestion]) {
    for (i, q) in questions.iter_mut().enumerate() {
        q.index = i as u32;
    }
}
