// src/executor.rs
// SQL execution against the instance's private SQLite copy

use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use tracing::debug;

use crate::table::{Table, Value, hard_cut};

/// What running one statement produced: a uniform tabular result, or the
/// engine's diagnostic message.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Success(Table),
    EngineError(String),
}

/// Execute exactly one statement. The diagnostic text of a failure is fed
/// back into the next prompt, so it is kept verbatim apart from an optional
/// byte cap (`error_byte_cap == 0` disables it).
pub async fn execute_one(pool: &SqlitePool, sql: &str, error_byte_cap: usize) -> ExecutionOutcome {
    debug!("executing: {}", sql);
    match sqlx::query(sql).fetch_all(pool).await {
        Ok(rows) => ExecutionOutcome::Success(rows_to_table(&rows)),
        Err(e) => ExecutionOutcome::EngineError(hard_cut(&e.to_string(), error_byte_cap)),
    }
}

/// Run a candidate script statement by statement. The first engine error
/// aborts the script and becomes the outcome; otherwise the last statement's
/// table does.
pub async fn execute_script(
    pool: &SqlitePool,
    script: &str,
    error_byte_cap: usize,
) -> ExecutionOutcome {
    let statements = split_statements(script);
    if statements.is_empty() {
        return ExecutionOutcome::EngineError("candidate contained no executable statement".into());
    }

    let mut outcome = ExecutionOutcome::EngineError(String::new());
    for statement in &statements {
        match execute_one(pool, statement, error_byte_cap).await {
            ExecutionOutcome::Success(table) => outcome = ExecutionOutcome::Success(table),
            err @ ExecutionOutcome::EngineError(_) => return err,
        }
    }
    outcome
}

/// Split a script into single statements with the parser's SQLite dialect.
/// A script the parser cannot handle passes through whole, so the engine,
/// not the parser, reports the real error.
pub fn split_statements(script: &str) -> Vec<String> {
    let trimmed = script.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    match Parser::parse_sql(&SQLiteDialect {}, trimmed) {
        Ok(statements) if !statements.is_empty() => {
            statements.iter().map(|s| s.to_string()).collect()
        }
        _ => vec![trimmed.to_string()],
    }
}

fn rows_to_table(rows: &[SqliteRow]) -> Table {
    let columns = rows
        .first()
        .map(|row| {
            row.columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect()
        })
        .unwrap_or_default();

    let data = rows
        .iter()
        .map(|row| (0..row.columns().len()).map(|i| decode_value(row, i)).collect())
        .collect();

    Table {
        columns,
        rows: data,
    }
}

// SQLite values are dynamically typed; decode by the runtime datatype of the
// cell, not the declared column type.
fn decode_value(row: &SqliteRow, idx: usize) -> Value {
    let raw = match row.try_get_raw(idx) {
        Ok(raw) => raw,
        Err(_) => return Value::Null,
    };
    if raw.is_null() {
        return Value::Null;
    }

    match raw.type_info().name() {
        "INTEGER" | "BOOLEAN" => row
            .try_get::<i64, _>(idx)
            .map(Value::Integer)
            .unwrap_or(Value::Null),
        "REAL" => row
            .try_get::<f64, _>(idx)
            .map(Value::Real)
            .unwrap_or(Value::Null),
        "BLOB" => row
            .try_get::<Vec<u8>, _>(idx)
            .map(Value::Blob)
            .unwrap_or(Value::Null),
        _ => row
            .try_get::<String, _>(idx)
            .map(Value::Text)
            .unwrap_or(Value::Null),
    }
}
