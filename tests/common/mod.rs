// tests/common/mod.rs
// Shared test doubles: scripted model providers and config fixtures

#![allow(dead_code)] // not every test binary uses every double

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use sqlsage::candidates::SelectionPolicy;
use sqlsage::config::AgentConfig;
use sqlsage::error::AgentError;
use sqlsage::llm::{ChatMessage, ModelProvider};

/// Replays a fixed script of replies; `Err` entries become transport
/// failures. Panics if the script runs dry; size it to the test.
pub struct ScriptedProvider {
    script: Mutex<Vec<Result<String, String>>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<String, String>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
        })
    }

    pub fn replies<S: AsRef<str>>(replies: &[S]) -> Arc<Self> {
        Self::new(replies.iter().map(|r| Ok(r.as_ref().to_string())).collect())
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
        assert!(!script.is_empty(), "scripted provider ran out of replies");
        match script.remove(0) {
            Ok(reply) => Ok(reply),
            Err(message) => Err(AgentError::Transport(message)),
        }
    }
}

/// Answers every turn by looking at the latest user prompt: prompts that
/// contain `poison_marker` get a reply with no SQL block at all, everything
/// else gets `reply`. Safe to share across concurrent instances.
pub struct KeyedProvider {
    pub poison_marker: String,
    pub reply: String,
}

#[async_trait]
impl ModelProvider for KeyedProvider {
    fn name(&self) -> &'static str {
        "keyed"
    }

    async fn send_turn(
        &self,
        history: &[ChatMessage],
        _temperature: f64,
    ) -> Result<String, AgentError> {
        let last = history.last().map(|m| m.content.as_str()).unwrap_or("");
        if last.contains(&self.poison_marker) {
            Ok("I cannot help with that.".to_string())
        } else {
            Ok(self.reply.clone())
        }
    }
}

pub fn test_config(max_iter: usize) -> AgentConfig {
    AgentConfig {
        model: "test-model".to_string(),
        api_base_url: "http://localhost".to_string(),
        api_key: "test-key".to_string(),
        temperature: 1.0,
        request_timeout_secs: 5,
        max_iter,
        self_refine: true,
        selection: SelectionPolicy::Longest,
        max_attempts: 3,
        result_byte_cap: 2000,
        error_byte_cap: 0,
        schema_strip_threshold: 200_000,
        num_workers: 2,
        log_level: "info".to_string(),
    }
}

pub fn sql_reply(sql: &str) -> String {
    format!("Here you go:\n```sql\n{}\n```\n", sql)
}
