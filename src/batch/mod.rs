// src/batch/mod.rs
// Batch driver: manifest records in, one refinement loop per instance,
// bounded worker pool

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::llm::{ConversationSession, ModelProvider};
use crate::refine::{LoopConfig, Question, RefinementLoop, RunResult};
use crate::schema;

pub mod artifacts;

/// One line of the batch manifest (JSONL).
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestRecord {
    pub instance_id: String,
    pub question: String,
    #[serde(default)]
    pub db: Option<String>,
}

pub fn load_manifest(path: &Path) -> Result<Vec<ManifestRecord>, AgentError> {
    let content = std::fs::read_to_string(path)?;
    let mut records = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: ManifestRecord = serde_json::from_str(line).map_err(|e| {
            AgentError::Config(format!("manifest line {}: {}", lineno + 1, e))
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Find the instance's SQLite file: the nested per-instance layout first,
/// then any loose `*.sqlite` directly under the instance folder.
pub fn locate_database(db_root: &Path, instance_id: &str, db: Option<&str>) -> Option<PathBuf> {
    if let Some(db) = db {
        let nested = db_root
            .join(instance_id)
            .join("databases")
            .join(db)
            .join(format!("{db}.sqlite"));
        if nested.is_file() {
            return Some(nested);
        }
    }

    let dir = db_root.join(instance_id);
    if let Ok(entries) = std::fs::read_dir(&dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "sqlite") {
                return Some(path);
            }
        }
    }
    None
}

/// A private scratch copy of an instance database. Each loop executes
/// against its own copy, so no write contention across instances is
/// possible.
pub struct StagedDatabase {
    scratch: PathBuf,
    pub db_path: PathBuf,
}

pub async fn stage_database(source: &Path) -> Result<StagedDatabase, AgentError> {
    let file_name = source
        .file_name()
        .ok_or_else(|| AgentError::Config(format!("not a database file: {}", source.display())))?;

    let scratch = std::env::temp_dir().join(format!("sqlsage-{}", Uuid::new_v4().simple()));
    tokio::fs::create_dir_all(&scratch).await?;
    let db_path = scratch.join(file_name);
    tokio::fs::copy(source, &db_path).await?;

    Ok(StagedDatabase { scratch, db_path })
}

impl StagedDatabase {
    pub async fn connect(&self) -> Result<SqlitePool, AgentError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&format!("sqlite:{}", self.db_path.display()))
            .await?;
        Ok(pool)
    }

    /// Best-effort removal of the scratch directory.
    pub async fn cleanup(self) {
        let _ = tokio::fs::remove_dir_all(&self.scratch).await;
    }
}

/// Run one question against an already-staged database and return the run
/// result together with the schema text that seeded the dialogue.
pub async fn run_question(
    provider: Arc<dyn ModelProvider>,
    config: &AgentConfig,
    pool: &SqlitePool,
    question: &Question,
    notes: Option<&str>,
) -> Result<(RunResult, String), AgentError> {
    let raw = schema::describe(pool, notes).await?;
    let schema_text = schema::cap_description(raw, config.schema_strip_threshold);

    let mut session = ConversationSession::new(provider, config.temperature, config.max_attempts);
    session.start(crate::prompt::SYSTEM_CONTEXT);
    let refinement = RefinementLoop::new(session, pool, LoopConfig::from_agent(config));
    let result = refinement.run(&schema_text, question).await?;

    Ok((result, schema_text))
}

#[derive(Debug)]
pub enum InstanceStatus {
    Completed { validated: bool },
    /// The instance could not complete one model exchange; the last
    /// diagnostic is attached. Siblings are unaffected.
    Aborted { error: String },
}

#[derive(Debug)]
pub struct InstanceReport {
    pub instance_id: String,
    pub status: InstanceStatus,
    pub iterations: usize,
}

pub struct BatchDriver {
    provider: Arc<dyn ModelProvider>,
    config: AgentConfig,
}

impl BatchDriver {
    pub fn new(provider: Arc<dyn ModelProvider>, config: AgentConfig) -> Self {
        Self { provider, config }
    }

    /// Run every manifest record, up to `num_workers` instances in flight.
    /// Within one instance everything is strictly sequential; an aborted
    /// instance is reported and never takes its siblings down.
    pub async fn run(
        &self,
        manifest_path: &Path,
        db_root: &Path,
        output_root: &Path,
    ) -> anyhow::Result<Vec<InstanceReport>> {
        let records = load_manifest(manifest_path)?;
        info!(
            "batch: {} instance(s), {} worker(s)",
            records.len(),
            self.config.num_workers
        );

        let semaphore = Arc::new(Semaphore::new(self.config.num_workers));
        let mut tasks = JoinSet::new();

        for record in records {
            let permit = semaphore.clone().acquire_owned().await?;
            let provider = self.provider.clone();
            let config = self.config.clone();
            let db_root = db_root.to_path_buf();
            let output_root = output_root.to_path_buf();

            tasks.spawn(async move {
                let _permit = permit;
                let instance_id = record.instance_id.clone();
                match run_instance(provider, &config, &record, &db_root, &output_root).await {
                    Ok(result) => InstanceReport {
                        instance_id,
                        iterations: result.iterations,
                        status: InstanceStatus::Completed {
                            validated: result.validated,
                        },
                    },
                    Err(e) => {
                        error!("[{}] aborted: {}", instance_id, e);
                        InstanceReport {
                            instance_id,
                            iterations: 0,
                            status: InstanceStatus::Aborted {
                                error: e.to_string(),
                            },
                        }
                    }
                }
            });
        }

        let mut reports = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => error!("instance task failed to join: {}", e),
            }
        }
        Ok(reports)
    }
}

/// Stage, run, publish. Artifacts are written only for completed runs; an
/// aborted instance leaves nothing behind.
async fn run_instance(
    provider: Arc<dyn ModelProvider>,
    config: &AgentConfig,
    record: &ManifestRecord,
    db_root: &Path,
    output_root: &Path,
) -> Result<RunResult, AgentError> {
    let question = Question::new(&record.instance_id, &record.question);
    let source = locate_database(db_root, &record.instance_id, record.db.as_deref())
        .ok_or_else(|| {
            AgentError::Config(format!(
                "no sqlite database found for instance {}",
                record.instance_id
            ))
        })?;

    let staged = stage_database(&source).await?;
    let outcome = async {
        let pool = staged.connect().await?;
        let outcome = run_question(provider, config, &pool, &question, None).await;
        pool.close().await;
        outcome
    }
    .await;
    staged.cleanup().await;

    let (result, schema_text) = outcome?;
    artifacts::write_instance(output_root, &record.instance_id, &schema_text, &result).await?;
    Ok(result)
}

/// Single-question entry point used by the CLI demo mode: stages a private
/// copy of `sqlite_path` and runs one loop with an ad-hoc instance id.
pub async fn run_single(
    provider: Arc<dyn ModelProvider>,
    config: &AgentConfig,
    sqlite_path: &Path,
    question_text: &str,
    notes: Option<&str>,
    output_root: Option<&Path>,
) -> Result<(Question, RunResult), AgentError> {
    let uuid = Uuid::new_v4().simple().to_string();
    let question = Question::new(format!("local-{}", &uuid[..8]), question_text);

    let staged = stage_database(sqlite_path).await?;
    let outcome = async {
        let pool = staged.connect().await?;
        let outcome = run_question(provider, config, &pool, &question, notes).await;
        pool.close().await;
        outcome
    }
    .await;
    staged.cleanup().await;

    let (result, schema_text) = outcome?;
    if let Some(output_root) = output_root {
        artifacts::write_instance(output_root, &question.id, &schema_text, &result).await?;
    }
    Ok((question, result))
}
