//! OpenSASE Form Builder Platform
//!
//! Self-hosted form builder core: forms and their questions, public
//! submissions, response aggregation and CSV export.
//!
//! ## Layout
//! - `domain`: forms, questions, responses, answers and typed answer values
//! - `ports`: the `FormStore` persistence port
//! - `infrastructure`: in-memory `FormStore`
//! - `application`: editing, publishing, submission, aggregation, export
//! - `builder`: client-side editing model with debounced autosave

use thiserror::Error;

pub mod application;
pub mod builder;
pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use application::*;
pub use domain::*;
pub use ports::outbound::{FormStore, QuestionSync, StoreError, Window};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum FormsError {
    #[error("Form not found")]
    FormNotFound,

    #[error("Not the owner of this form")]
    Forbidden,

    #[error("Form unavailable")]
    FormUnavailable,

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Invalid payload")]
    Invalid(Vec<FieldError>),

    #[error("Response {response_id} saved but its answers were not: {source}")]
    AnswersNotSaved {
        response_id: ResponseId,
        #[source]
        source: StoreError,
    },

    #[error("Could not allocate a unique slug after {0} attempts")]
    SlugExhausted(u32),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl FormsError {
    /// Single-field validation failure.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid(vec![FieldError::new(field, message)])
    }
}

pub type Result<T> = std::result::Result<T, FormsError>;
