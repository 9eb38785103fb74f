mod dto;
mod routes;
mod state;

use crate::chat::ChatService;
use crate::generate::ResponseGenerator;
use axum::Router;
use axum::http::Method;
use axum::routing::{get, post};
use routes::chat::{chat_handler, clear_handler, history_handler};
use state::ServerState;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind HTTP listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP server error: {0}")]
    Serve(#[from] std::io::Error),
}

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::chat::chat_handler,
        routes::chat::clear_handler,
        routes::chat::history_handler
    ),
    components(schemas(
        dto::RestSubmitRequest,
        dto::RestChatResponse,
        dto::RestClearRequest,
        dto::RestHistoryResponse,
        dto::ErrorResponse,
        crate::types::Turn
    )),
    tags(
        (name = "chat", description = "Dialogo con l'assistente CIAO-AI")
    )
)]
struct ApiDoc;

/// Builds the REST router for the given chat service.
pub fn app<G>(service: Arc<ChatService<G>>) -> Router
where
    G: ResponseGenerator + 'static,
{
    let api = ApiDoc::openapi();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let state = Arc::new(ServerState::new(service));
    Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", api))
        .route("/chat", post(chat_handler::<G>))
        .route("/clear", post(clear_handler::<G>))
        .route("/history/{session_id}", get(history_handler::<G>))
        .layer(cors)
        .with_state(state)
}

pub async fn serve<G>(service: Arc<ChatService<G>>, addr: SocketAddr) -> Result<(), ServerError>
where
    G: ResponseGenerator + 'static,
{
    info!(%addr, "Binding REST server");
    let app = app(service);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!(%addr, "REST server ready to accept connections");

    axum::serve(listener, app.into_make_service())
        .await
        .map_err(ServerError::Serve)
}
