// src/config/mod.rs
// Agent configuration loaded from the environment (and .env when present)

use std::str::FromStr;

use crate::candidates::SelectionPolicy;
use crate::error::AgentError;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    // ── Model provider
    pub model: String,
    pub api_base_url: String,
    pub api_key: String,
    pub temperature: f64,
    pub request_timeout_secs: u64,

    // ── Refinement loop
    pub max_iter: usize,
    pub self_refine: bool,
    pub selection: SelectionPolicy,
    /// Per-turn attempt bound for transport failures and empty-candidate
    /// replies alike.
    pub max_attempts: u32,

    // ── Prompt budgets
    /// Byte cap applied to the result sample embedded in feedback prompts.
    pub result_byte_cap: usize,
    /// Byte cap applied to engine diagnostics before they reach a prompt.
    /// Zero disables the cap.
    pub error_byte_cap: usize,
    /// Schema descriptions longer than this get their `Description:`
    /// annotations stripped before prompt inclusion.
    pub schema_strip_threshold: usize,

    // ── Batch driver
    pub num_workers: usize,

    // ── Logging
    pub log_level: String,
}

// Tolerant env parsing: values may carry trailing comments or whitespace.
fn env_var_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(val) => {
            let clean_val = val.split('#').next().unwrap_or("").trim();
            match clean_val.parse::<T>() {
                Ok(parsed) => parsed,
                Err(_) => {
                    eprintln!("Config: {} = '{}' (parse failed, using default)", key, val);
                    default
                }
            }
        }
        Err(_) => default,
    }
}

impl AgentConfig {
    pub fn from_env() -> Self {
        // Best effort; a missing .env just means plain environment variables.
        let _ = dotenvy::dotenv();

        Self {
            model: env_var_or("SQLSAGE_MODEL", "gpt-4o".to_string()),
            api_base_url: env_var_or("OPENAI_BASE_URL", "https://api.openai.com".to_string()),
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            temperature: env_var_or("SQLSAGE_TEMPERATURE", 1.0),
            request_timeout_secs: env_var_or("SQLSAGE_REQUEST_TIMEOUT", 120),
            max_iter: env_var_or("SQLSAGE_MAX_ITER", 5),
            self_refine: env_var_or("SQLSAGE_SELF_REFINE", true),
            selection: env_var_or("SQLSAGE_SELECTION", SelectionPolicy::Longest),
            max_attempts: env_var_or("SQLSAGE_MAX_ATTEMPTS", 3),
            result_byte_cap: env_var_or("SQLSAGE_RESULT_BYTE_CAP", 2000),
            error_byte_cap: env_var_or("SQLSAGE_ERROR_BYTE_CAP", 4000),
            schema_strip_threshold: env_var_or("SQLSAGE_SCHEMA_STRIP_THRESHOLD", 200_000),
            num_workers: env_var_or("SQLSAGE_WORKERS", 4),
            log_level: env_var_or("SQLSAGE_LOG", "info".to_string()),
        }
    }

    pub fn validate(&self) -> Result<(), AgentError> {
        if self.api_key.is_empty() {
            return Err(AgentError::Config("OPENAI_API_KEY must be set".into()));
        }
        if self.api_base_url.is_empty() {
            return Err(AgentError::Config("API base URL cannot be empty".into()));
        }
        if self.max_attempts == 0 {
            return Err(AgentError::Config("max_attempts must be at least 1".into()));
        }
        if self.num_workers == 0 {
            return Err(AgentError::Config("num_workers must be at least 1".into()));
        }
        Ok(())
    }
}
