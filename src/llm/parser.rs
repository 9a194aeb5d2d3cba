//! Response cleanup for LLM outputs.
//!
//! The model is told to answer with raw SQL, but some models wrap their answer
//! in a markdown code block anyway. Cleanup trims the text and, if a SQL or
//! untagged code block is present, keeps only the first block's body.

/// Language tags accepted on a fenced block.
const SQL_TAGS: &[&str] = &["", "sql", "postgresql", "postgres", "psql", "pgsql"];

/// Trims a raw completion and unwraps a fenced code block if present.
pub fn clean_response(response: &str) -> String {
    let trimmed = response.trim();
    match extract_code_block(trimmed) {
        Some(body) => body.trim().to_string(),
        None => trimmed.to_string(),
    }
}

/// Extracts the body of the first fenced block tagged as SQL or untagged.
///
/// Blocks in other languages are skipped. An unterminated fence runs to the
/// end of the text.
fn extract_code_block(text: &str) -> Option<&str> {
    let mut rest = text;

    while let Some(start) = rest.find("```") {
        let after_fence = &rest[start + 3..];
        let (tag, body_and_rest) = match after_fence.find('\n') {
            Some(newline) => (&after_fence[..newline], &after_fence[newline + 1..]),
            // Single-line block: ```SELECT 1```
            None => ("", after_fence),
        };

        let (body, remainder) = match body_and_rest.find("```") {
            Some(end) => (&body_and_rest[..end], &body_and_rest[end + 3..]),
            None => (body_and_rest, ""),
        };

        let tag = tag.trim().to_lowercase();
        if SQL_TAGS.contains(&tag.as_str()) {
            return Some(body);
        }

        rest = remainder;
    }

    None
}
