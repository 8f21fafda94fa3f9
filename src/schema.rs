// src/schema.rs
// Textual schema descriptions built from the SQLite catalog

use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::sqlite::SqlitePool;
use tracing::debug;

use crate::error::AgentError;

/// Placeholder used when the database has no user tables.
pub const EMPTY_SCHEMA: &str = "-- (empty schema)";

/// Build the schema text that seeds the dialogue: the stored DDL of every
/// user table in catalog order, blank-line separated. Caller-supplied notes
/// are appended verbatim under a labeled section.
pub async fn describe(pool: &SqlitePool, notes: Option<&str>) -> Result<String, AgentError> {
    let rows: Vec<(Option<String>,)> = sqlx::query_as(
        "SELECT sql FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
    )
    .fetch_all(pool)
    .await?;

    let ddl: Vec<String> = rows.into_iter().filter_map(|(sql,)| sql).collect();
    let mut description = if ddl.is_empty() {
        EMPTY_SCHEMA.to_string()
    } else {
        ddl.join("\n\n")
    };

    if let Some(notes) = notes {
        let notes = notes.trim();
        if !notes.is_empty() {
            description.push_str("\n\n-- Extra notes\n");
            description.push_str(notes);
        }
    }

    debug!("schema description: {} chars", description.len());
    Ok(description)
}

static DESCRIPTION_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Description:[^\n]*").expect("static pattern"));

/// Lossy size reduction for oversized descriptions: drop free-text
/// `Description:` annotations, keep the structural DDL.
pub fn strip_descriptions(text: &str) -> String {
    DESCRIPTION_LINE.replace_all(text, "").into_owned()
}

/// Apply the strip transform only past the configured size threshold.
/// Zero disables the transform.
pub fn cap_description(text: String, threshold: usize) -> String {
    if threshold > 0 && text.len() > threshold {
        let stripped = strip_descriptions(&text);
        debug!(
            "schema description over {} chars, stripped annotations: {} -> {} chars",
            threshold,
            text.len(),
            stripped.len()
        );
        stripped
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .expect("in-memory sqlite")
    }

    #[tokio::test]
    async fn empty_database_yields_sentinel() {
        let pool = pool().await;
        let text = describe(&pool, None).await.unwrap();
        assert_eq!(text, EMPTY_SCHEMA);
    }

    #[tokio::test]
    async fn tables_appear_in_catalog_order_with_blank_lines() {
        let pool = pool().await;
        sqlx::query("CREATE TABLE alpha (id INTEGER PRIMARY KEY, name TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE beta (id INTEGER)")
            .execute(&pool)
            .await
            .unwrap();

        let text = describe(&pool, None).await.unwrap();
        let alpha = text.find("CREATE TABLE alpha").unwrap();
        let beta = text.find("CREATE TABLE beta").unwrap();
        assert!(alpha < beta);
        assert!(text.contains("\n\n"));
    }

    #[tokio::test]
    async fn notes_are_appended_under_label() {
        let pool = pool().await;
        sqlx::query("CREATE TABLE t (id INTEGER)")
            .execute(&pool)
            .await
            .unwrap();

        let text = describe(&pool, Some("prices are in cents")).await.unwrap();
        assert!(text.contains("-- Extra notes\nprices are in cents"));
    }

    #[test]
    fn strip_removes_annotation_tails_only() {
        let text = "col1 TEXT, -- Description: the first column\ncol2 INTEGER";
        let stripped = strip_descriptions(text);
        assert!(stripped.contains("col1 TEXT, -- "));
        assert!(!stripped.contains("the first column"));
        assert!(stripped.contains("col2 INTEGER"));
    }

    #[test]
    fn cap_only_applies_past_threshold() {
        let text = "Description: verbose".to_string();
        assert_eq!(cap_description(text.clone(), 1000), text);
        assert_eq!(cap_description(text, 5).trim(), "");
    }
}
