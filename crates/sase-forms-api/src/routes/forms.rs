//! Owner-side form endpoints and the public slug lookup

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};
use sase_forms::{CreateFormRequest, FormId, FormListing, FormWithQuestions, SaveFormRequest};
use std::sync::Arc;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::models::{CreatedForm, SaveResult};
use crate::AppState;

pub async fn list_forms(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<FormListing>, ApiError> {
    Ok(Json(state.editor.list(&user.user_id).await?))
}

pub async fn create_form(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    payload: Result<Json<CreateFormRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedForm>), ApiError> {
    let Json(request) = payload?;
    let id = state.editor.create(&user.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(CreatedForm { id })))
}

pub async fn get_form(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    path: Result<Path<FormId>, PathRejection>,
) -> Result<Json<FormWithQuestions>, ApiError> {
    let Path(id) = path?;
    Ok(Json(state.editor.get(&user.user_id, &id).await?))
}

pub async fn save_form(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    path: Result<Path<FormId>, PathRejection>,
    payload: Result<Json<SaveFormRequest>, JsonRejection>,
) -> Result<Json<SaveResult>, ApiError> {
    let Path(id) = path?;
    let Json(request) = payload?;
    let questions = state.editor.save(&user.user_id, &id, request).await?;
    Ok(Json(SaveResult { ok: true, questions }))
}

/// Data for the public form page. Unknown, unpublished and inactive forms all
/// look the same from here.
pub async fn find_by_slug(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<FormWithQuestions>, ApiError> {
    let Path(slug) = path?;
    Ok(Json(state.publishing.find_published(&slug).await?))
}
