use crate::generate::{GenerateError, ResponseGenerator};
use crate::types::{ConversationHistory, Turn};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, error, info};
use uuid::Uuid;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug)]
pub struct SubmitRequest {
    pub message: String,
    pub session_id: Option<String>,
}

/// Result of a submit or clear event. `display` is what the caller should
/// render, `stored` is what the session retains for the next round; the two
/// are always the same value.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub session_id: String,
    pub reply: Option<String>,
    pub display: ConversationHistory,
    pub stored: ConversationHistory,
}

impl ChatOutcome {
    fn new(session_id: String, reply: Option<String>, history: ConversationHistory) -> Self {
        Self {
            session_id,
            reply,
            display: history.clone(),
            stored: history,
        }
    }
}

/// Render lookup for one session.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub session_id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub history: ConversationHistory,
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("message is empty")]
    EmptyInput,
    #[error("session '{0}' already has a submit in flight")]
    Busy(String),
    #[error(transparent)]
    Inference(#[from] GenerateError),
}

impl ChatError {
    pub fn user_message(&self) -> String {
        match self {
            ChatError::EmptyInput => "Scrivi una domanda prima di inviare.".to_string(),
            ChatError::Busy(_) => {
                "Sto ancora elaborando la richiesta precedente. Attendi un momento.".to_string()
            }
            ChatError::Inference(err) => err.user_message(),
        }
    }
}

struct Session {
    history: ConversationHistory,
    in_flight: bool,
    created_at: DateTime<Utc>,
}

impl Session {
    fn new() -> Self {
        Self {
            history: ConversationHistory::new(),
            in_flight: false,
            created_at: Utc::now(),
        }
    }
}

/// Mediates submit, clear, and render events against per-session histories,
/// invoking the response generator on submit.
///
/// Concurrency contract: one submit in flight per session. A second submit or
/// a clear arriving while a session is processing is rejected with
/// [`ChatError::Busy`]. Sessions are independent and may process in parallel.
pub struct ChatService<G: ResponseGenerator> {
    generator: G,
    request_timeout: Duration,
    sessions: Mutex<HashMap<String, Session>>,
}

impl<G: ResponseGenerator> ChatService<G> {
    pub fn new(generator: G) -> Self {
        Self::with_timeout(generator, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(generator: G, request_timeout: Duration) -> Self {
        Self {
            generator,
            request_timeout,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Handles a submit event: calls the generator with the session's current
    /// history, appends the completed turn, and returns the updated history.
    ///
    /// On any failure the stored history is left exactly as it was; no
    /// partial turn is ever appended.
    pub async fn submit(&self, request: SubmitRequest) -> Result<ChatOutcome, ChatError> {
        if request.message.trim().is_empty() {
            debug!("Rejecting submit with empty message");
            return Err(ChatError::EmptyInput);
        }
        let session_id = request.session_id.unwrap_or_else(new_session_id);

        // Claim the session's single flight slot and snapshot its history.
        let snapshot = {
            let mut sessions = lock_sessions(&self.sessions);
            let session = sessions
                .entry(session_id.clone())
                .or_insert_with(Session::new);
            if session.in_flight {
                return Err(ChatError::Busy(session_id));
            }
            session.in_flight = true;
            session.history.clone()
        };
        let guard = FlightGuard::new(&self.sessions, &session_id);

        debug!(
            session_id = session_id.as_str(),
            history_len = snapshot.len(),
            "Dispatching submit to response generator"
        );

        let generation = self.generator.generate(&request.message, &snapshot);
        let reply = match timeout(self.request_timeout, generation).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(err)) => {
                error!(session_id = session_id.as_str(), %err, "Response generation failed");
                return Err(ChatError::Inference(err));
            }
            Err(_) => {
                error!(
                    session_id = session_id.as_str(),
                    timeout_secs = self.request_timeout.as_secs(),
                    "Response generation timed out"
                );
                return Err(ChatError::Inference(GenerateError::Timeout {
                    limit: self.request_timeout,
                }));
            }
        };

        let turn = Turn::new(request.message, reply.clone());
        let stored = {
            let mut sessions = lock_sessions(&self.sessions);
            let session = sessions
                .entry(session_id.clone())
                .or_insert_with(Session::new);
            session.history = snapshot.append(turn);
            session.in_flight = false;
            session.history.clone()
        };
        guard.disarm();

        info!(
            session_id = session_id.as_str(),
            turns = stored.len(),
            "Submit completed; turn appended to session history"
        );
        Ok(ChatOutcome::new(session_id, Some(reply), stored))
    }

    /// Handles a clear event: resets the session to the canonical empty
    /// history. Clearing an unknown session is a no-op that still yields the
    /// empty history.
    pub fn clear(&self, session_id: &str) -> Result<ChatOutcome, ChatError> {
        let mut sessions = lock_sessions(&self.sessions);
        if let Some(session) = sessions.get_mut(session_id) {
            if session.in_flight {
                return Err(ChatError::Busy(session_id.to_string()));
            }
            session.history = ConversationHistory::cleared();
        }
        info!(session_id, "Session history cleared");
        Ok(ChatOutcome::new(
            session_id.to_string(),
            None,
            ConversationHistory::cleared(),
        ))
    }

    /// Render lookup: the session's current history, without mutation.
    pub fn history(&self, session_id: &str) -> SessionView {
        let sessions = lock_sessions(&self.sessions);
        match sessions.get(session_id) {
            Some(session) => SessionView {
                session_id: session_id.to_string(),
                created_at: Some(session.created_at),
                history: session.history.clone(),
            },
            None => SessionView {
                session_id: session_id.to_string(),
                created_at: None,
                history: ConversationHistory::new(),
            },
        }
    }
}

fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

fn lock_sessions(
    sessions: &Mutex<HashMap<String, Session>>,
) -> std::sync::MutexGuard<'_, HashMap<String, Session>> {
    sessions.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Releases a session's flight slot when dropped, so a submit future that is
/// cancelled mid-generation does not leave the session wedged.
struct FlightGuard<'a> {
    sessions: &'a Mutex<HashMap<String, Session>>,
    session_id: String,
    armed: bool,
}

impl<'a> FlightGuard<'a> {
    fn new(sessions: &'a Mutex<HashMap<String, Session>>, session_id: &str) -> Self {
        Self {
            sessions,
            session_id: session_id.to_string(),
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut sessions = lock_sessions(self.sessions);
        if let Some(session) = sessions.get_mut(&self.session_id) {
            session.in_flight = false;
        }
    }
}
