//! Publish toggle

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::sync::Arc;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::models::{PublishRequest, PublishResult};
use crate::AppState;

pub async fn publish(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    payload: Result<Json<PublishRequest>, JsonRejection>,
) -> Result<Json<PublishResult>, ApiError> {
    let Json(request) = payload?;
    let slug = state
        .publishing
        .set_published(&user.user_id, &request.form_id, request.is_published)
        .await?;
    Ok(Json(PublishResult { slug }))
}
