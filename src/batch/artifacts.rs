// src/batch/artifacts.rs
// Per-instance output directory: schema prompt, final SQL, result CSV,
// ordered transcript

use std::path::Path;

use crate::error::AgentError;
use crate::refine::RunResult;
use crate::table::Table;

/// Publish the artifacts for one completed instance:
/// `prompts.txt` (the schema text consumed at init), exactly one
/// `<instance_id>.sql`, exactly one `result.csv`, and `log.log` with every
/// prompt and response in exchange order. Callers must not invoke this for
/// aborted instances; partial artifacts are never published.
pub async fn write_instance(
    output_root: &Path,
    instance_id: &str,
    schema_text: &str,
    result: &RunResult,
) -> Result<(), AgentError> {
    let dir = output_root.join(instance_id);
    tokio::fs::create_dir_all(&dir).await?;

    tokio::fs::write(dir.join("prompts.txt"), schema_text).await?;
    tokio::fs::write(dir.join(format!("{instance_id}.sql")), &result.sql).await?;

    let csv = result.table.as_ref().map(Table::to_csv).unwrap_or_default();
    tokio::fs::write(dir.join("result.csv"), csv).await?;

    tokio::fs::write(dir.join("log.log"), render_transcript(result)).await?;
    Ok(())
}

const SEPARATOR: &str = "--------------------------------------------------";

fn render_transcript(result: &RunResult) -> String {
    let stamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S");
    let mut out = String::new();

    for message in &result.dialogue {
        out.push_str(&format!("{} - {}\n{}\n{}\n", stamp, message.role, message.content, SEPARATOR));
    }
    out.push_str(&format!(
        "{} - summary\niterations={} validated={} prompt_chars={} response_chars={} calls={}\n",
        stamp,
        result.iterations,
        result.validated,
        result.stats.prompt_chars,
        result.stats.response_chars,
        result.stats.calls,
    ));
    out
}
