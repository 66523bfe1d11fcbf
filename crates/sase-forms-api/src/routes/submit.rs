//! Public submission endpoint

use axum::{
    extract::{FromRequest, Request, State},
    http::header,
    Form, Json,
};
use sase_forms::{SubmissionInput, SubmitPayload};
use std::sync::Arc;

use crate::error::ApiError;
use crate::middleware::MaybeAuthUser;
use crate::models::SubmitAccepted;
use crate::AppState;

/// Accepts JSON bodies and plain HTML form posts (`q_<questionId>` fields).
pub async fn submit(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(session): MaybeAuthUser,
    request: Request,
) -> Result<Json<SubmitAccepted>, ApiError> {
    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("application/json"));

    let input = if is_json {
        let Json(payload) = Json::<SubmitPayload>::from_request(request, &state).await?;
        SubmissionInput::from_json(payload)?
    } else {
        let Form(fields) = Form::<Vec<(String, String)>>::from_request(request, &state).await?;
        SubmissionInput::from_form_fields(fields)?
    };

    state.submissions.submit(input, session.as_ref()).await?;
    Ok(Json(SubmitAccepted { ok: true }))
}
