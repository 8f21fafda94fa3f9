// src/main.rs

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use sqlsage::batch::{BatchDriver, InstanceStatus, run_single};
use sqlsage::config::AgentConfig;
use sqlsage::llm::openai::OpenAiClient;
use sqlsage::llm::registry::ModelRegistry;

#[derive(Parser)]
#[command(name = "sqlsage", version, about = "Self-refining natural-language-to-SQL agent")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Model identifier (overrides SQLSAGE_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Maximum refinement iterations (overrides SQLSAGE_MAX_ITER)
    #[arg(long, global = true)]
    max_iter: Option<usize>,

    /// Disable self-refinement: stop after the first candidate
    #[arg(long, global = true)]
    no_self_refine: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run every instance of a JSONL manifest on the worker pool
    Batch {
        /// Manifest with one {instance_id, question, db?} record per line
        #[arg(long)]
        manifest: PathBuf,
        /// Root directory holding the per-instance database folders
        #[arg(long)]
        db_root: PathBuf,
        /// Where per-instance artifact directories are written
        #[arg(long)]
        output: PathBuf,
        /// Worker pool width (overrides SQLSAGE_WORKERS)
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Ask a single question against one SQLite file
    Ask {
        /// Path to the .sqlite database (a private copy is staged)
        #[arg(long)]
        database: PathBuf,
        /// The natural-language question
        question: String,
        /// Extra schema notes appended to the description
        #[arg(long)]
        notes: Option<String>,
        /// Optional artifact directory
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AgentConfig::from_env();
    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(max_iter) = cli.max_iter {
        config.max_iter = max_iter;
    }
    if cli.no_self_refine {
        config.self_refine = false;
    }

    let level = Level::from_str(&config.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!(
        "sqlsage starting: model={}, max_iter={}, self_refine={}",
        config.model, config.max_iter, config.self_refine
    );

    let registry = ModelRegistry::with_defaults();
    let provider = Arc::new(OpenAiClient::new(&config, &registry)?);

    match cli.command {
        Command::Batch {
            manifest,
            db_root,
            output,
            workers,
        } => {
            if let Some(workers) = workers {
                config.num_workers = workers;
            }
            let driver = BatchDriver::new(provider, config);
            let reports = driver.run(&manifest, &db_root, &output).await?;

            let mut completed = 0usize;
            let mut validated = 0usize;
            let mut aborted = 0usize;
            for report in &reports {
                match &report.status {
                    InstanceStatus::Completed { validated: v } => {
                        completed += 1;
                        if *v {
                            validated += 1;
                        }
                    }
                    InstanceStatus::Aborted { error } => {
                        aborted += 1;
                        warn!("[{}] aborted: {}", report.instance_id, error);
                    }
                }
            }
            info!(
                "batch done: {} completed ({} validated), {} aborted",
                completed, validated, aborted
            );
        }
        Command::Ask {
            database,
            question,
            notes,
            output,
        } => {
            let (question, result) = run_single(
                provider,
                &config,
                &database,
                &question,
                notes.as_deref(),
                output.as_deref(),
            )
            .await?;

            info!(
                "[{}] finished: validated={}, iterations={}",
                question.id, result.validated, result.iterations
            );
            println!("SQL\n---\n{}\n", result.sql);
            println!("Answer\n------");
            match &result.table {
                Some(table) => println!("{}", table.to_csv()),
                None => println!("(no tabular result)"),
            }
            if !result.validated {
                println!("\n(note: result did not pass the plausibility filter)");
            }
        }
    }

    Ok(())
}
