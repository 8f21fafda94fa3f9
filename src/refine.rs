// src/refine.rs
// The refinement loop: drive the model until a plausible result or an
// exhausted budget

use serde::Deserialize;
use sqlx::sqlite::SqlitePool;
use tracing::{debug, info, warn};

use crate::candidates::{Candidate, SelectionPolicy, select};
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::executor::{ExecutionOutcome, execute_script};
use crate::llm::session::MessageStats;
use crate::llm::{ChatMessage, ConversationSession};
use crate::prompt::{SQL_TAG, feedback_prompt, seed_prompt};
use crate::table::Table;
use crate::validate::{Verdict, validate};

/// The natural-language task for one instance.
#[derive(Debug, Clone, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    /// Auxiliary phrasing of the same question, when the manifest merges
    /// two task statements into one.
    pub alt_phrasing: Option<String>,
}

const ALT_MARKER: &str = "\nAnother way to say it: ";

impl Question {
    /// Split off an embedded "Another way to say it" suffix if the manifest
    /// carries the merged form.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let (text, alt_phrasing) = match text.find(ALT_MARKER) {
            Some(pos) => {
                let alt = text[pos + ALT_MARKER.len()..].trim().to_string();
                (text[..pos].to_string(), Some(alt))
            }
            None => (text, None),
        };
        Self {
            id: id.into(),
            text,
            alt_phrasing,
        }
    }
}

/// Loop-relevant slice of the agent configuration.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub max_iter: usize,
    pub self_refine: bool,
    pub selection: SelectionPolicy,
    pub result_byte_cap: usize,
    pub error_byte_cap: usize,
}

impl LoopConfig {
    pub fn from_agent(config: &AgentConfig) -> Self {
        Self {
            max_iter: config.max_iter,
            self_refine: config.self_refine,
            selection: config.selection,
            result_byte_cap: config.result_byte_cap,
            error_byte_cap: config.error_byte_cap,
        }
    }
}

/// What one instance's run produced. `validated: false` means the budget ran
/// out (or self-refinement was off) and this is the best effort, not that
/// the run failed.
#[derive(Debug)]
pub struct RunResult {
    pub sql: String,
    pub table: Option<Table>,
    pub validated: bool,
    /// Refinement iterations consumed (0 = first candidate was accepted).
    pub iterations: usize,
    pub dialogue: Vec<ChatMessage>,
    pub stats: MessageStats,
}

/// One instance's state machine. Strictly sequential: each iteration's
/// prompt depends on the previous iteration's outcome.
pub struct RefinementLoop<'a> {
    session: ConversationSession,
    pool: &'a SqlitePool,
    config: LoopConfig,
}

impl<'a> RefinementLoop<'a> {
    pub fn new(session: ConversationSession, pool: &'a SqlitePool, config: LoopConfig) -> Self {
        Self {
            session,
            pool,
            config,
        }
    }

    pub async fn run(
        mut self,
        schema_text: &str,
        question: &Question,
    ) -> Result<RunResult, AgentError> {
        let mut prompt = seed_prompt(schema_text, question);
        let mut iterations = 0usize;

        loop {
            let blocks = self.session.turn_for_code(&prompt, SQL_TAG).await?;
            let candidates = Candidate::from_blocks(blocks, iterations);
            if candidates.len() > 1 {
                debug!(
                    "[{}] {} candidate blocks in one reply, selecting {:?}",
                    question.id,
                    candidates.len(),
                    self.config.selection
                );
            }
            let sql = select(&candidates, self.config.selection)?.sql.clone();

            let outcome = execute_script(self.pool, &sql, self.config.error_byte_cap).await;
            let rejection = match validate(&outcome) {
                Verdict::Valid => {
                    info!(
                        "[{}] accepted result after {} refinement(s)",
                        question.id, iterations
                    );
                    let table = match outcome {
                        ExecutionOutcome::Success(table) => Some(table),
                        ExecutionOutcome::EngineError(_) => None,
                    };
                    return Ok(self.finish(sql, table, true, iterations));
                }
                Verdict::Invalid(rejection) => rejection,
            };

            if iterations >= self.config.max_iter || !self.config.self_refine {
                warn!(
                    "[{}] stopping unvalidated after {} refinement(s): {}",
                    question.id,
                    iterations,
                    rejection.describe()
                );
                let table = match outcome {
                    ExecutionOutcome::Success(table) => Some(table),
                    ExecutionOutcome::EngineError(_) => None,
                };
                return Ok(self.finish(sql, table, false, iterations));
            }

            let (problem, sample) = match &outcome {
                ExecutionOutcome::EngineError(message) => (message.clone(), None),
                ExecutionOutcome::Success(table) => (
                    rejection.describe().to_string(),
                    Some(table.sample_csv(self.config.result_byte_cap)),
                ),
            };
            debug!(
                "[{}] iteration {} rejected ({:?}), refining",
                question.id, iterations, rejection
            );
            prompt = feedback_prompt(&sql, &problem, sample.as_deref());
            iterations += 1;
        }
    }

    fn finish(self, sql: String, table: Option<Table>, validated: bool, iterations: usize) -> RunResult {
        let stats = self.session.message_stats();
        RunResult {
            sql,
            table,
            validated,
            iterations,
            dialogue: self.session.into_dialogue(),
            stats,
        }
    }
}
