// src/table.rs
// Uniform tabular results: scalar values, CSV rendering, comparison

use serde::{Deserialize, Serialize};

/// Scalar cell value as SQLite hands them back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// Display form used for CSV output and plausibility checks.
    /// Nulls render as the empty string.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Integer(n) => n.to_string(),
            Value::Real(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::Blob(bytes) => format!("<blob {} bytes>", bytes.len()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Real(f) => Some(*f),
            _ => None,
        }
    }
}

/// Ordered named columns with row values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        out.push_str(&csv_line(self.columns.iter().cloned()));
        for row in &self.rows {
            out.push('\n');
            out.push_str(&csv_line(row.iter().map(Value::render)));
        }
        out
    }

    /// CSV rendering truncated to `max_bytes` for feedback prompts.
    /// Zero disables the cap.
    pub fn sample_csv(&self, max_bytes: usize) -> String {
        hard_cut(&self.to_csv(), max_bytes)
    }

    /// Column-major view used by the comparator.
    fn column_vectors(&self) -> Vec<Vec<&Value>> {
        (0..self.columns.len().max(self.rows.first().map_or(0, Vec::len)))
            .map(|c| self.rows.iter().filter_map(|r| r.get(c)).collect())
            .collect()
    }
}

fn csv_line<I: Iterator<Item = String>>(cells: I) -> String {
    cells
        .map(|cell| {
            if cell.contains(',') || cell.contains('"') || cell.contains('\n') {
                format!("\"{}\"", cell.replace('"', "\"\""))
            } else {
                cell
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Truncate to at most `max_bytes` bytes on a char boundary, marking the cut
/// with a trailing newline. `max_bytes == 0` means no cap.
pub fn hard_cut(text: &str, max_bytes: usize) -> String {
    if max_bytes == 0 || text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let mut cut = text[..end].to_string();
    cut.push('\n');
    cut
}

fn vectors_match(gold: &[&Value], pred: &[&Value], tolerance: f64, ignore_order: bool) -> bool {
    if gold.len() != pred.len() {
        return false;
    }

    let (gold, pred): (Vec<&Value>, Vec<&Value>) = if ignore_order {
        let key = |v: &&Value| (matches!(v, Value::Null), v.render());
        let mut g = gold.to_vec();
        let mut p = pred.to_vec();
        g.sort_by_key(key);
        p.sort_by_key(key);
        (g, p)
    } else {
        (gold.to_vec(), pred.to_vec())
    };

    gold.iter().zip(pred.iter()).all(|(a, b)| match (a, b) {
        (Value::Null, Value::Null) => true,
        _ => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => (x - y).abs() <= tolerance,
            _ => a.render() == b.render(),
        },
    })
}

/// Column-wise match between a predicted and a gold table.
///
/// Each gold column (optionally restricted to `condition_cols` indices) must
/// match some predicted column as a vector: numeric cells within the absolute
/// tolerance, everything else by display equality. With `ignore_order` each
/// column is compared as a multiset. Returns 1 on a full match, 0 otherwise.
pub fn compare_tables(
    pred: &Table,
    gold: &Table,
    condition_cols: &[usize],
    ignore_order: bool,
    tolerance: f64,
) -> u8 {
    let gold_vectors = gold.column_vectors();
    let gold_selected: Vec<&Vec<&Value>> = if condition_cols.is_empty() {
        gold_vectors.iter().collect()
    } else {
        condition_cols
            .iter()
            .filter_map(|&i| gold_vectors.get(i))
            .collect()
    };
    let pred_vectors = pred.column_vectors();

    for gold_col in gold_selected {
        let matched = pred_vectors
            .iter()
            .any(|pred_col| vectors_match(gold_col, pred_col, tolerance, ignore_order));
        if !matched {
            return 0;
        }
    }
    1
}
