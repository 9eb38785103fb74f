use crate::types::{ChatMessage, ConversationHistory, MessageRole};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("model returned invalid response: {0}")]
    InvalidResponse(String),
    #[error("response generation exceeded {limit:?}")]
    Timeout { limit: Duration },
}

impl GenerateError {
    /// User-facing message, in the assistant's Italian voice.
    pub fn user_message(&self) -> String {
        match self {
            GenerateError::Network(err) => {
                if err.is_connect() {
                    "Impossibile contattare il servizio AI. Verifica che il server del modello sia attivo."
                        .to_string()
                } else if let Some(status) = err.status() {
                    match status {
                        StatusCode::NOT_FOUND => {
                            "Endpoint AI non trovato (404). Controlla che il server esponga /api/chat."
                                .to_string()
                        }
                        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
                            "Il servizio AI non è al momento disponibile. Riprova più tardi."
                                .to_string()
                        }
                        _ => format!(
                            "La richiesta al servizio AI è fallita con stato {}. Riprova più tardi.",
                            status.as_u16()
                        ),
                    }
                } else {
                    "Errore di rete durante il contatto con il servizio AI. Riprova più tardi."
                        .to_string()
                }
            }
            GenerateError::InvalidResponse(_) => {
                "Il servizio AI ha restituito una risposta non elaborabile. Riprova.".to_string()
            }
            GenerateError::Timeout { .. } => {
                "Il servizio AI non ha risposto in tempo. Riprova tra poco.".to_string()
            }
        }
    }
}

/// Response-generation collaborator. Given the user's message and the prior
/// history, produces the assistant's reply. Invoked at most once per submit.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(
        &self,
        user_message: &str,
        history: &ConversationHistory,
    ) -> Result<String, GenerateError>;
}

/// Generator backed by an Ollama-compatible `/api/chat` endpoint.
#[derive(Clone)]
pub struct OllamaGenerator {
    http: Client,
    base_url: String,
    model: String,
    system_prompt: Option<String>,
}

impl OllamaGenerator {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_client(base_url, model, Client::new())
    }

    pub fn with_client(
        base_url: impl Into<String>,
        model: impl Into<String>,
        client: Client,
    ) -> Self {
        Self {
            http: client,
            base_url: base_url.into(),
            model: model.into(),
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    fn endpoint(&self, path: &str) -> String {
        let trimmed = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{trimmed}/{path}")
    }
}

#[async_trait]
impl ResponseGenerator for OllamaGenerator {
    async fn generate(
        &self,
        user_message: &str,
        history: &ConversationHistory,
    ) -> Result<String, GenerateError> {
        let url = self.endpoint("/api/chat");

        let mut messages = history.to_messages(self.system_prompt.as_deref());
        messages.push(ChatMessage::new(MessageRole::User, user_message));

        info!(
            model = self.model.as_str(),
            url = %url,
            messages = messages.len(),
            "Sending request to model provider"
        );
        let payload = OllamaChatRequest {
            model: self.model.clone(),
            messages: messages
                .iter()
                .map(|msg| OllamaChatMessage {
                    role: msg.role.as_str().to_string(),
                    content: msg.content.clone(),
                })
                .collect(),
            stream: false,
        };

        let response: OllamaChatResponse = self
            .http
            .post(url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!("Received response from model provider");

        let message = response
            .message
            .ok_or_else(|| GenerateError::InvalidResponse("missing message field".into()))?;

        Ok(message.content)
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaChatMessage>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OllamaChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaChatResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponseMessage {
    content: String,
}
