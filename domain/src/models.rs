use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Speaker of a caller-supplied conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One turn of the caller-supplied conversation history.
/// Order is preserved end to end; turns are never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

/// One nearest-neighbor hit from the vector index.
/// Higher score means more similar; the index's return order is kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedSnippet {
    pub id: String,
    pub score: f32,
    pub text: String,
}

/// Index hits for a single extracted keyword. Results for different
/// keywords stay separate until the digest step.
#[derive(Debug, Clone)]
pub struct KeywordQueryResult {
    pub keyword: String,
    pub snippets: Vec<RetrievedSnippet>,
}

/// Message on the wire to the chat-completion model. Unlike
/// [`ConversationTurn`] this may carry the system role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

impl From<&ConversationTurn> for ChatMessage {
    fn from(turn: &ConversationTurn) -> Self {
        Self {
            role: turn.role.as_str().to_string(),
            content: turn.content.clone(),
        }
    }
}

/// Audio payload lifted out of the multipart form. The bytes are forwarded
/// to the speech-to-text service opaquely; no local decoding happens.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub bytes: Bytes,
    pub file_name: String,
    pub content_type: String,
}

/// The `input` form field: either typed text or recorded audio.
#[derive(Debug, Clone)]
pub enum AssistantInput {
    Text(String),
    Audio(AudioUpload),
}

/// Advisory caller metadata injected into the persona prompt.
/// Never used for control flow.
#[derive(Debug, Clone)]
pub struct CallerContext {
    pub city: String,
    pub timezone: String,
}

impl Default for CallerContext {
    fn default() -> Self {
        Self {
            city: "unknown".to_string(),
            timezone: "unknown".to_string(),
        }
    }
}

/// One decoded request: current input plus prior turns.
#[derive(Debug, Clone)]
pub struct AssistantRequest {
    pub input: AssistantInput,
    pub history: Vec<ConversationTurn>,
    pub caller: CallerContext,
}

/// Successful text outcome of the pipeline.
#[derive(Debug, Clone)]
pub struct AssistantReply {
    pub transcript: String,
    pub reply: String,
}
