// src/validate.rs
// Plausibility filter over execution outcomes

use crate::executor::ExecutionOutcome;
use crate::table::{Table, Value};

/// Why a structurally successful result was rejected.
///
/// This is a heuristic filter, not a correctness check: a `Valid` verdict
/// only means the result is worth returning, not that it answers the
/// question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The statement failed to execute at all.
    EngineError,
    /// The query ran but produced no rows.
    EmptyResult,
    /// Some cell embeds a line break: tabular content was nested into a
    /// scalar instead of being a scalar answer.
    NestedText,
    /// Some column is uniformly "0"/empty across all rows.
    DegenerateColumn,
}

impl Rejection {
    /// Wording fed back into the refinement prompt.
    pub fn describe(&self) -> &'static str {
        match self {
            Rejection::EngineError => "the SQL failed to execute",
            Rejection::EmptyResult => "the query returned no rows",
            Rejection::NestedText => {
                "a result cell contains multi-line nested text instead of a scalar value"
            }
            Rejection::DegenerateColumn => {
                "a result column is entirely zeros or entirely empty, which looks like a placeholder"
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid(Rejection),
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }
}

/// Judge whether an execution outcome is usable. Engine errors are always
/// invalid; success results run through the degeneracy heuristics. The
/// stored table is never mutated; nulls are compared as empty strings only.
pub fn validate(outcome: &ExecutionOutcome) -> Verdict {
    let table = match outcome {
        ExecutionOutcome::EngineError(_) => return Verdict::Invalid(Rejection::EngineError),
        ExecutionOutcome::Success(table) => table,
    };

    if table.is_empty() {
        return Verdict::Invalid(Rejection::EmptyResult);
    }

    for row in &table.rows {
        for cell in row {
            if let Value::Text(s) = cell {
                if s.contains('\n') {
                    return Verdict::Invalid(Rejection::NestedText);
                }
            }
        }
    }

    if has_degenerate_column(table) {
        return Verdict::Invalid(Rejection::DegenerateColumn);
    }

    Verdict::Valid
}

// A column where every cell renders as "0" or "" carries no information.
fn has_degenerate_column(table: &Table) -> bool {
    let width = table.rows.first().map_or(0, Vec::len);
    (0..width).any(|col| {
        table.rows.iter().all(|row| {
            row.get(col).is_some_and(|cell| {
                let rendered = cell.render();
                rendered == "0" || rendered.is_empty()
            })
        })
    })
}
