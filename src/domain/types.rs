use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// Wire form of a single message as model providers expect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// One completed exchange: what the user said and what the assistant answered.
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Turn {
    pub user: String,
    pub assistant: String,
}

impl Turn {
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
        }
    }
}

/// Chronological sequence of turns for one session.
///
/// This is a plain value: `append` and `cleared` return new histories and
/// never touch the input, so a caller holding the previous value keeps an
/// unchanged snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The canonical empty history.
    pub fn cleared() -> Self {
        Self::default()
    }

    /// Returns this history with `turn` added at the end. The receiver is
    /// not modified.
    #[must_use]
    pub fn append(&self, turn: Turn) -> Self {
        let mut turns = self.turns.clone();
        turns.push(turn);
        Self { turns }
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Render view: the list-of-pairs shape display layers consume.
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.turns
            .iter()
            .map(|turn| (turn.user.clone(), turn.assistant.clone()))
            .collect()
    }

    /// Flattens the history into provider messages, prefixed with the system
    /// prompt when one is configured.
    pub fn to_messages(&self, system_prompt: Option<&str>) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.turns.len() * 2 + 1);
        if let Some(system) = system_prompt {
            let system = system.trim();
            if !system.is_empty() {
                messages.push(ChatMessage::new(MessageRole::System, system));
            }
        }
        for turn in &self.turns {
            messages.push(ChatMessage::new(MessageRole::User, turn.user.clone()));
            messages.push(ChatMessage::new(
                MessageRole::Assistant,
                turn.assistant.clone(),
            ));
        }
        messages
    }
}

impl FromIterator<Turn> for ConversationHistory {
    fn from_iter<I: IntoIterator<Item = Turn>>(iter: I) -> Self {
        Self {
            turns: iter.into_iter().collect(),
        }
    }
}
