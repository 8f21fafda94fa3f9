// src/error.rs
// Error taxonomy for a single agent instance

/// Failures that can end one instance's run.
///
/// Engine errors and plausibility rejections are deliberately absent: those
/// feed back into the refinement loop and never surface as errors.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("model transport error: {0}")]
    Transport(String),

    #[error("model returned an unusable response: {0}")]
    MalformedResponse(String),

    #[error("exhausted {attempts} attempts without a usable model reply")]
    ExhaustedRetries { attempts: u32 },

    #[error("candidate selection invoked on an empty candidate set")]
    EmptyCandidateSet,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl AgentError {
    /// Transport and malformed-reply failures are worth another attempt
    /// within the same turn; everything else is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AgentError::Transport(_) | AgentError::MalformedResponse(_)
        )
    }
}
