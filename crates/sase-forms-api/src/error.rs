//! HTTP error mapping

use axum::{
    extract::rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sase_forms::{FieldError, FormsError};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Validation { message: String, field_errors: Vec<FieldError> },

    /// Store failures, passed through to the caller as a 400.
    #[error("{0}")]
    Upstream(String),
}

impl ApiError {
    pub fn unauthorized() -> Self {
        Self::Unauthorized("Unauthorized".into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into(), field_errors: vec![] }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation { .. } | Self::Upstream(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// Error body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Self::Upstream(message) = &self {
            tracing::error!(error = %message, "upstream failure");
        }
        let body = match self {
            Self::Validation { message, field_errors } => ErrorBody {
                error: message,
                details: Some(field_errors).filter(|e| !e.is_empty()),
            },
            other => ErrorBody { error: other.to_string(), details: None },
        };
        (status, Json(body)).into_response()
    }
}

impl From<FormsError> for ApiError {
    fn from(err: FormsError) -> Self {
        match err {
            FormsError::FormNotFound => Self::NotFound(err.to_string()),
            FormsError::Forbidden => Self::Forbidden,
            FormsError::FormUnavailable => Self::validation(err.to_string()),
            FormsError::AuthenticationRequired => Self::Unauthorized(err.to_string()),
            FormsError::Invalid(field_errors) => {
                Self::Validation { message: "Invalid payload".into(), field_errors }
            }
            FormsError::AnswersNotSaved { .. } | FormsError::SlugExhausted(_) | FormsError::Store(_) => {
                Self::Upstream(err.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

/// Path segments only ever identify a form, so a bad one names no form.
impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "rejected path");
        Self::NotFound(FormsError::FormNotFound.to_string())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}
