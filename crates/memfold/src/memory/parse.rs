//! Reading fact lists out of model replies
//!
//! Format version 1: after trimming and removing one surrounding Markdown
//! code fence, the reply must be a JSON array of strings. Entries are
//! trimmed and blank entries dropped. Anything else is a `Parse` error.

use crate::error::{MemfoldError, Result};

/// Version of the fact-list reply format understood by `parse_fact_list`
pub const FACT_LIST_FORMAT_VERSION: u32 = 1;

/// Parse a model reply into a list of fact strings
pub fn parse_fact_list(reply: &str) -> Result<Vec<String>> {
    let body = strip_code_fence(reply.trim());
    if body.is_empty() {
        return Err(MemfoldError::Parse("empty reply".to_string()));
    }

    let facts: Vec<String> = serde_json::from_str(body).map_err(|e| {
        MemfoldError::Parse(format!("expected a JSON array of strings: {e}"))
    })?;

    Ok(facts
        .into_iter()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect())
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return text;
    };
    // Drop the info string ("json") on the opening fence line
    match inner.find('\n') {
        Some(newline) => inner[newline + 1..].trim(),
        None => inner.trim(),
    }
}
