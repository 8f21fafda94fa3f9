// src/prompt.rs
// Prompt construction for the seed turn and the refinement feedback turns

use crate::refine::Question;

/// Tag the model must use on its fenced SQL block.
pub const SQL_TAG: &str = "sql";

/// Standing instruction installed at session start.
pub const SYSTEM_CONTEXT: &str = "You translate natural-language questions into SQLite SQL. \
Reply with exactly one fenced code block tagged `sql` containing a single statement.";

/// The prompt that opens the dialogue: schema description, the question
/// (plus its alternative phrasing when the manifest carries one), and the
/// output contract.
pub fn seed_prompt(schema: &str, question: &Question) -> String {
    let mut prompt = format!(
        "The database contains the following tables / columns:\n\n{}\n\nQuestion: {}\n",
        schema, question.text
    );
    if let Some(alt) = &question.alt_phrasing {
        prompt.push_str(&format!("Another way to say it: {}\n", alt));
    }
    prompt.push_str(
        "\nWrite one SQLite SQL statement that answers the question.\n\
         Reply with exactly one fenced code block tagged `sql` and nothing else.\n",
    );
    prompt
}

/// Feedback turn after a failed iteration: the SQL that ran, what went
/// wrong (engine diagnostic or plausibility reason), a truncated sample of
/// the offending result when one exists, and the corrective instruction.
pub fn feedback_prompt(prior_sql: &str, problem: &str, sample: Option<&str>) -> String {
    let mut prompt = format!(
        "The previous SQL did not produce a usable answer.\n\n\
         SQL:\n{}\n\nProblem: {}\n",
        prior_sql, problem
    );
    if let Some(sample) = sample {
        prompt.push_str(&format!("\nResult sample:\n{}\n", sample));
    }
    prompt.push_str(
        "\nPlease correct it. Reply with exactly one fenced code block tagged `sql` \
         containing a single SQL statement.\n",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_carries_schema_question_and_contract() {
        let question = Question::new("q1", "How many users signed up in May?");
        let prompt = seed_prompt("CREATE TABLE users (id INTEGER)", &question);
        assert!(prompt.contains("CREATE TABLE users"));
        assert!(prompt.contains("How many users signed up in May?"));
        assert!(prompt.contains("tagged `sql`"));
        assert!(!prompt.contains("Another way to say it"));
    }

    #[test]
    fn seed_includes_alternative_phrasing_when_present() {
        let question = Question::new("q1", "Count May signups.\nAnother way to say it: How many users joined in May?");
        let prompt = seed_prompt("-- (empty schema)", &question);
        assert!(prompt.contains("Question: Count May signups."));
        assert!(prompt.contains("Another way to say it: How many users joined in May?"));
    }

    #[test]
    fn feedback_embeds_diagnostic_verbatim() {
        let prompt = feedback_prompt(
            "SELECT wrong FROM t",
            "error returned from database: no such column: wrong",
            None,
        );
        assert!(prompt.contains("SELECT wrong FROM t"));
        assert!(prompt.contains("no such column: wrong"));
        assert!(!prompt.contains("Result sample"));
    }

    #[test]
    fn feedback_attaches_sample_when_available() {
        let prompt = feedback_prompt("SELECT 0", "the query looks degenerate", Some("c\n0"));
        assert!(prompt.contains("Result sample:\nc\n0"));
    }
}
