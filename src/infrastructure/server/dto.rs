use crate::types::Turn;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct RestSubmitRequest {
    pub message: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct RestChatResponse {
    pub session_id: String,
    /// Assistant reply for the submitted message; absent on clear.
    pub reply: Option<String>,
    pub history: Vec<Turn>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct RestClearRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct RestHistoryResponse {
    pub session_id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub history: Vec<Turn>,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct ErrorResponse {
    pub error: String,
}
