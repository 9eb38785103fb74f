use super::super::dto::{
    ErrorResponse, RestChatResponse, RestClearRequest, RestHistoryResponse, RestSubmitRequest,
};
use super::super::state::ServerState;
use crate::chat::{ChatError, SubmitRequest};
use crate::generate::ResponseGenerator;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use std::sync::Arc;
use tracing::{debug, error, info};

#[utoipa::path(
    post,
    path = "/chat",
    tag = "chat",
    request_body = RestSubmitRequest,
    responses(
        (status = 200, description = "Messaggio elaborato e turno aggiunto alla cronologia", body = RestChatResponse),
        (status = 400, description = "Messaggio vuoto", body = ErrorResponse),
        (status = 409, description = "La sessione sta già elaborando un invio", body = ErrorResponse),
        (status = 502, description = "Il generatore di risposte non è raggiungibile", body = ErrorResponse)
    )
)]
pub async fn chat_handler<G: ResponseGenerator>(
    State(state): State<Arc<ServerState<G>>>,
    Json(payload): Json<RestSubmitRequest>,
) -> Result<Json<RestChatResponse>, (StatusCode, Json<ErrorResponse>)> {
    let RestSubmitRequest {
        message,
        session_id,
    } = payload;

    info!(session = session_id.as_deref(), "Received /chat request");

    let service = state.service();
    match service
        .submit(SubmitRequest {
            message,
            session_id,
        })
        .await
    {
        Ok(outcome) => {
            info!(
                session_id = outcome.session_id.as_str(),
                turns = outcome.display.len(),
                "Chat request completed successfully"
            );
            Ok(Json(RestChatResponse {
                session_id: outcome.session_id,
                reply: outcome.reply,
                history: outcome.display.turns().to_vec(),
            }))
        }
        Err(error) => {
            error!(%error, "Chat request failed");
            Err(error_response(&error))
        }
    }
}

#[utoipa::path(
    post,
    path = "/clear",
    tag = "chat",
    request_body = RestClearRequest,
    responses(
        (status = 200, description = "Cronologia della sessione azzerata", body = RestChatResponse),
        (status = 409, description = "La sessione sta già elaborando un invio", body = ErrorResponse)
    )
)]
pub async fn clear_handler<G: ResponseGenerator>(
    State(state): State<Arc<ServerState<G>>>,
    Json(payload): Json<RestClearRequest>,
) -> Result<Json<RestChatResponse>, (StatusCode, Json<ErrorResponse>)> {
    info!(session_id = payload.session_id.as_str(), "Received /clear request");

    let service = state.service();
    match service.clear(&payload.session_id) {
        Ok(outcome) => Ok(Json(RestChatResponse {
            session_id: outcome.session_id,
            reply: None,
            history: outcome.display.turns().to_vec(),
        })),
        Err(error) => {
            error!(%error, "Clear request failed");
            Err(error_response(&error))
        }
    }
}

#[utoipa::path(
    get,
    path = "/history/{session_id}",
    tag = "chat",
    params(
        ("session_id" = String, Path, description = "Identificatore della sessione")
    ),
    responses(
        (status = 200, description = "Cronologia corrente della sessione", body = RestHistoryResponse)
    )
)]
pub async fn history_handler<G: ResponseGenerator>(
    State(state): State<Arc<ServerState<G>>>,
    Path(session_id): Path<String>,
) -> Json<RestHistoryResponse> {
    debug!(session_id = session_id.as_str(), "Received /history request");

    let view = state.service().history(&session_id);
    Json(RestHistoryResponse {
        session_id: view.session_id,
        created_at: view.created_at,
        history: view.history.turns().to_vec(),
    })
}

fn error_response(error: &ChatError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match error {
        ChatError::EmptyInput => StatusCode::BAD_REQUEST,
        ChatError::Busy(_) => StatusCode::CONFLICT,
        ChatError::Inference(_) => StatusCode::BAD_GATEWAY,
    };
    (
        status,
        Json(ErrorResponse {
            error: error.user_message(),
        }),
    )
}
