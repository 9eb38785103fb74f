use crate::chat::{ChatService, SubmitRequest};
use crate::generate::ResponseGenerator;
use crate::types::Turn;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum StdioError {
    #[error("stdin/stdout I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize stdio response: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One UI event per input line, dispatched by name.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum StdioEvent {
    Submit {
        message: String,
        session_id: Option<String>,
    },
    Clear {
        session_id: String,
    },
    Render {
        session_id: String,
    },
}

#[derive(Debug, Serialize)]
struct StdioResponse {
    session_id: Option<String>,
    reply: Option<String>,
    history: Vec<Turn>,
    error: Option<String>,
}

impl StdioResponse {
    fn success(session_id: String, reply: Option<String>, history: Vec<Turn>) -> Self {
        Self {
            session_id: Some(session_id),
            reply,
            history,
            error: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            session_id: None,
            reply: None,
            history: Vec::new(),
            error: Some(message.into()),
        }
    }
}

/// Runs the JSON-line chat loop on stdin/stdout until EOF. Event handling
/// errors are reported in-band; only I/O failures end the loop.
pub async fn run<G>(service: Arc<ChatService<G>>) -> Result<(), StdioError>
where
    G: ResponseGenerator + 'static,
{
    let stdin = BufReader::new(io::stdin());
    let mut lines = stdin.lines();
    let mut stdout = io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        debug!("Received STDIO line");

        let response = handle_line(&service, &line).await?;
        write_response(&mut stdout, &response).await?;
    }

    stdout.flush().await?;
    Ok(())
}

/// Handles one input line and returns the JSON response line for it.
/// Malformed input and event failures come back as in-band error objects.
pub async fn handle_line<G>(service: &ChatService<G>, line: &str) -> Result<String, StdioError>
where
    G: ResponseGenerator,
{
    let response = match serde_json::from_str::<StdioEvent>(line) {
        Ok(event) => dispatch(service, event).await,
        Err(error) => {
            error!(%error, "Failed to parse STDIO input line");
            StdioResponse::error(format!("Formato JSON dell'input non valido: {error}"))
        }
    };
    Ok(serde_json::to_string(&response)?)
}

async fn dispatch<G>(service: &ChatService<G>, event: StdioEvent) -> StdioResponse
where
    G: ResponseGenerator,
{
    match event {
        StdioEvent::Submit {
            message,
            session_id,
        } => {
            info!("Processing STDIO submit event");
            match service
                .submit(SubmitRequest {
                    message,
                    session_id,
                })
                .await
            {
                Ok(outcome) => StdioResponse::success(
                    outcome.session_id,
                    outcome.reply,
                    outcome.display.turns().to_vec(),
                ),
                Err(error) => {
                    error!(%error, "STDIO submit failed");
                    StdioResponse::error(error.user_message())
                }
            }
        }
        StdioEvent::Clear { session_id } => {
            info!("Processing STDIO clear event");
            match service.clear(&session_id) {
                Ok(outcome) => StdioResponse::success(
                    outcome.session_id,
                    None,
                    outcome.display.turns().to_vec(),
                ),
                Err(error) => {
                    error!(%error, "STDIO clear failed");
                    StdioResponse::error(error.user_message())
                }
            }
        }
        StdioEvent::Render { session_id } => {
            debug!("Processing STDIO render event");
            let view = service.history(&session_id);
            StdioResponse::success(view.session_id, None, view.history.turns().to_vec())
        }
    }
}

async fn write_response(stdout: &mut io::Stdout, response: &str) -> Result<(), StdioError> {
    stdout.write_all(response.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}
