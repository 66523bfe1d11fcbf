//! Response listing and CSV export

use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::header,
    response::IntoResponse,
    Json,
};
use sase_forms::{FormId, PageRequest, ResponsePage};
use std::sync::Arc;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::models::ResponsesQuery;
use crate::AppState;

pub async fn list_responses(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    path: Result<Path<FormId>, PathRejection>,
    query: Result<Query<ResponsesQuery>, QueryRejection>,
) -> Result<Json<ResponsePage>, ApiError> {
    let Path(id) = path?;
    let Query(query) = query?;
    let request = PageRequest {
        page: query.page.unwrap_or(1),
        limit: query.limit.unwrap_or(state.config.responses.default_page_size),
    };
    Ok(Json(state.responses.page(&user.user_id, &id, request).await?))
}

/// Whole-form CSV download. Built in memory, so either the full file is sent
/// or an error is.
pub async fn export_csv(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    path: Result<Path<FormId>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = path?;
    let source = state.responses.export_source(&user.user_id, &id).await?;
    let csv = state.exporter.render(&source.form, &source.questions, &source.responses);
    let file_name = state.exporter.file_name(&source.form, chrono::Utc::now().date_naive());

    tracing::info!(form_id = %id, rows = source.responses.len(), "responses exported");
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", file_name)),
        ],
        csv,
    ))
}
