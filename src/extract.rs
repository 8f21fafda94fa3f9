// src/extract.rs
// Fenced code-block extraction from raw model replies

/// Collect the bodies of all ```<tag> … ``` blocks, left to right.
///
/// The scan resumes strictly after each closing fence, so nested or
/// malformed fences can neither loop forever nor produce overlapping
/// matches. An open fence with no close before end of text is dropped.
/// No blocks is a normal outcome and yields an empty vec.
pub fn extract_code_blocks(text: &str, tag: &str) -> Vec<String> {
    let open = format!("```{}", tag);
    const CLOSE: &str = "```";

    let mut blocks = Vec::new();
    let mut cursor = 0;

    while let Some(rel_start) = text[cursor..].find(&open) {
        let body_start = cursor + rel_start + open.len();
        let Some(rel_end) = text[body_start..].find(CLOSE) else {
            break;
        };
        let body_end = body_start + rel_end;
        blocks.push(text[body_start..body_end].trim().to_string());
        cursor = body_end + CLOSE.len();
    }

    blocks
}

/// All substrings strictly between `start` and `end` markers, with the same
/// resume-after-close invariant as [`extract_code_blocks`].
pub fn extract_between(text: &str, start: &str, end: &str) -> Vec<String> {
    let mut results = Vec::new();
    let mut cursor = 0;

    while let Some(rel_start) = text[cursor..].find(start) {
        let body_start = cursor + rel_start + start.len();
        let Some(rel_end) = text[body_start..].find(end) else {
            break;
        };
        let body_end = body_start + rel_end;
        results.push(text[body_start..body_end].to_string());
        cursor = body_end + end.len();
    }

    results
}
