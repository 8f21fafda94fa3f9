// src/llm/session.rs
// One logical dialogue with the model, with the per-turn retry policy

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use super::{ChatMessage, ModelProvider, ROLE_ASSISTANT, ROLE_USER};
use crate::error::AgentError;
use crate::extract::extract_code_blocks;

const RETRY_BASE_DELAY_MS: u64 = 500;

/// Character-count accounting over the dialogue, recorded into the
/// transcript log at the end of a run.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MessageStats {
    pub prompt_chars: usize,
    pub response_chars: usize,
    pub calls: usize,
}

/// Owns the Dialogue for exactly one instance. The dialogue is the only
/// persistent state; sessions are never reused across unrelated questions.
pub struct ConversationSession {
    provider: Arc<dyn ModelProvider>,
    /// Standing instruction sent ahead of the dialogue on every call.
    /// Not a dialogue turn: the transcript holds user/assistant turns only.
    system_context: Option<String>,
    dialogue: Vec<ChatMessage>,
    temperature: f64,
    max_attempts: u32,
}

impl ConversationSession {
    pub fn new(provider: Arc<dyn ModelProvider>, temperature: f64, max_attempts: u32) -> Self {
        Self {
            provider,
            system_context: None,
            dialogue: Vec::new(),
            temperature,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn start(&mut self, system_context: impl Into<String>) {
        self.system_context = Some(system_context.into());
    }

    /// Send one user turn and return the assistant's reply.
    ///
    /// Transport failures are retried up to the attempt bound with a short
    /// backoff. A failed attempt leaves no trace in the dialogue: the
    /// user/assistant pair is committed only once the call succeeds.
    pub async fn turn(&mut self, prompt: &str) -> Result<String, AgentError> {
        let mut history = Vec::with_capacity(self.dialogue.len() + 2);
        if let Some(context) = &self.system_context {
            history.push(ChatMessage::system(context.clone()));
        }
        history.extend(self.dialogue.iter().cloned());
        history.push(ChatMessage::user(prompt));

        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);
        for attempt in 1..=self.max_attempts {
            match self.provider.send_turn(&history, self.temperature).await {
                Ok(reply) => {
                    self.dialogue.push(ChatMessage::user(prompt));
                    self.dialogue.push(ChatMessage::assistant(reply.clone()));
                    return Ok(reply);
                }
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        "{} turn failed (attempt {}/{}), retrying in {:?}: {}",
                        self.provider.name(),
                        attempt,
                        self.max_attempts,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) if e.is_retryable() => {
                    warn!(
                        "{} turn failed on final attempt {}: {}",
                        self.provider.name(),
                        attempt,
                        e
                    );
                    return Err(AgentError::ExhaustedRetries {
                        attempts: self.max_attempts,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Err(AgentError::ExhaustedRetries {
            attempts: self.max_attempts,
        })
    }

    /// Send a turn and extract fenced `tag` blocks from the reply.
    ///
    /// A reply with zero extractable blocks means the model ignored the
    /// output contract, not that the call failed, so the whole call is
    /// re-issued (a fresh model invocation, with the failed exchange left in
    /// the dialogue as context) up to the attempt bound. Exhausting the
    /// bound is fatal to the instance, never a silent empty list.
    pub async fn turn_for_code(
        &mut self,
        prompt: &str,
        tag: &str,
    ) -> Result<Vec<String>, AgentError> {
        for attempt in 1..=self.max_attempts {
            let reply = self.turn(prompt).await?;
            let blocks = extract_code_blocks(&reply, tag);
            if !blocks.is_empty() {
                return Ok(blocks);
            }
            warn!(
                "reply carried no ```{} block (attempt {}/{})",
                tag, attempt, self.max_attempts
            );
        }

        Err(AgentError::ExhaustedRetries {
            attempts: self.max_attempts,
        })
    }

    pub fn dialogue(&self) -> &[ChatMessage] {
        &self.dialogue
    }

    pub fn into_dialogue(self) -> Vec<ChatMessage> {
        self.dialogue
    }

    pub fn message_stats(&self) -> MessageStats {
        MessageStats {
            prompt_chars: self
                .dialogue
                .iter()
                .filter(|m| m.role == ROLE_USER)
                .map(|m| m.content.chars().count())
                .sum(),
            response_chars: self
                .dialogue
                .iter()
                .filter(|m| m.role == ROLE_ASSISTANT)
                .map(|m| m.content.chars().count())
                .sum(),
            calls: self.dialogue.len() / 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted provider: each entry is either a reply or a transport error.
    struct ScriptedProvider {
        script: Mutex<Vec<Result<String, String>>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<String, String>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
            })
        }
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn send_turn(
            &self,
            _history: &[ChatMessage],
            _temperature: f64,
        ) -> Result<String, AgentError> {
            let mut script = self.script.lock().unwrap();
            match script.remove(0) {
                Ok(reply) => Ok(reply),
                Err(message) => Err(AgentError::Transport(message)),
            }
        }
    }

    #[tokio::test]
    async fn failed_attempts_leave_no_dialogue_entries() {
        let provider = ScriptedProvider::new(vec![
            Err("connection reset".into()),
            Err("timeout".into()),
            Ok("the answer".into()),
        ]);
        let mut session = ConversationSession::new(provider, 1.0, 3);

        let reply = session.turn("hello").await.unwrap();
        assert_eq!(reply, "the answer");
        // Exactly one user/assistant pair despite two failed attempts.
        assert_eq!(session.dialogue().len(), 2);
        assert_eq!(session.dialogue()[0].role, ROLE_USER);
        assert_eq!(session.dialogue()[1].role, ROLE_ASSISTANT);
    }

    #[tokio::test]
    async fn exhausted_transport_retries_abort_the_turn() {
        let provider = ScriptedProvider::new(vec![
            Err("down".into()),
            Err("down".into()),
            Err("down".into()),
        ]);
        let mut session = ConversationSession::new(provider, 1.0, 3);

        let err = session.turn("hello").await.unwrap_err();
        assert!(matches!(err, AgentError::ExhaustedRetries { attempts: 3 }));
        assert!(session.dialogue().is_empty());
    }

    #[tokio::test]
    async fn zero_candidate_replies_reissue_the_whole_call() {
        let provider = ScriptedProvider::new(vec![
            Ok("no code, sorry".into()),
            Ok("```sql\nSELECT 1;\n```".into()),
        ]);
        let mut session = ConversationSession::new(provider, 1.0, 3);

        let blocks = session.turn_for_code("sql please", "sql").await.unwrap();
        assert_eq!(blocks, vec!["SELECT 1;"]);
        // Both exchanges stay in the dialogue; the model really replied twice.
        assert_eq!(session.dialogue().len(), 4);
        assert_eq!(session.message_stats().calls, 2);
    }

    #[tokio::test]
    async fn persistent_contract_violation_is_fatal() {
        let provider = ScriptedProvider::new(vec![
            Ok("nope".into()),
            Ok("still nope".into()),
            Ok("never".into()),
        ]);
        let mut session = ConversationSession::new(provider, 1.0, 3);

        let err = session.turn_for_code("sql please", "sql").await.unwrap_err();
        assert!(matches!(err, AgentError::ExhaustedRetries { .. }));
    }

    /// Provider that records the history it was handed.
    struct RecordingProvider {
        seen: Mutex<Vec<ChatMessage>>,
    }

    #[async_trait]
    impl ModelProvider for RecordingProvider {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn send_turn(
            &self,
            history: &[ChatMessage],
            _temperature: f64,
        ) -> Result<String, AgentError> {
            *self.seen.lock().unwrap() = history.to_vec();
            Ok("ok".to_string())
        }
    }

    #[tokio::test]
    async fn system_context_precedes_history_but_stays_out_of_the_dialogue() {
        let provider = Arc::new(RecordingProvider {
            seen: Mutex::new(Vec::new()),
        });
        let mut session = ConversationSession::new(provider.clone(), 1.0, 3);
        session.start("you write SQL");

        session.turn("first").await.unwrap();

        let seen = provider.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].role, "system");
        assert_eq!(seen[1].role, ROLE_USER);
        // The dialogue itself holds only the user/assistant pair.
        assert_eq!(session.dialogue().len(), 2);
        assert_eq!(session.dialogue()[0].role, ROLE_USER);
    }

    #[tokio::test]
    async fn message_stats_count_both_sides() {
        let provider = ScriptedProvider::new(vec![Ok("abcd".into())]);
        let mut session = ConversationSession::new(provider, 1.0, 3);
        session.turn("xy").await.unwrap();

        let stats = session.message_stats();
        assert_eq!(stats.prompt_chars, 2);
        assert_eq!(stats.response_chars, 4);
        assert_eq!(stats.calls, 1);
    }
}
