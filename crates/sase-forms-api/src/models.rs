//! API Models

use sase_forms::{FormId, QuestionSync};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Reply to an accepted submission
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitAccepted {
    pub ok: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedForm {
    pub id: FormId,
}

#[derive(Debug, Serialize)]
pub struct SaveResult {
    pub ok: bool,
    pub questions: QuestionSync,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PublishRequest {
    #[serde(rename = "formId")]
    pub form_id: FormId,
    #[serde(rename = "isPublished")]
    pub is_published: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PublishResult {
    pub slug: Option<String>,
}

/// `?page=&limit=` for the responses view
#[derive(Debug, Default, Deserialize)]
pub struct ResponsesQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}
