// src/llm/mod.rs
// Model boundary: message types and the provider trait

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;

pub mod openai;
pub mod registry;
pub mod session;

pub use registry::{ModelCaps, ModelRegistry, ResponseShape};
pub use session::ConversationSession;

pub const ROLE_SYSTEM: &str = "system";
pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

/// One turn of the dialogue, in the shape every provider accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ROLE_SYSTEM.to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ROLE_USER.to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ROLE_ASSISTANT.to_string(),
            content: content.into(),
        }
    }
}

/// The only contract the core needs from a model provider: send the ordered
/// dialogue history, get the assistant's text back. Authentication, endpoint
/// selection and response-shape quirks live behind the implementation.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &'static str;

    async fn send_turn(
        &self,
        history: &[ChatMessage],
        temperature: f64,
    ) -> Result<String, AgentError>;
}
