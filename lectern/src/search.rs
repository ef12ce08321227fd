//! Book search: tokenizer and ranking pipeline.
//!
//! Linear and in-memory. Every request rescans the supplied books; there is no
//! index and nothing is cached between calls.

use crate::interface::{LecternError, LecternResult, ScoredBook};
use crate::models::Book;
use crate::ranking::relevance_score;
use rayon::prelude::*;

/// Maximum results returned by `rank`.
pub const MAX_RESULTS: usize = 50;

/// Normalize free text into comparable terms.
///
/// Lower-cases, drops everything except ASCII letters, digits and whitespace,
/// then splits on whitespace runs.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace())
        .collect();

    normalized.split_whitespace().map(String::from).collect()
}

/// Score, filter, sort and truncate `books` for `query`.
///
/// Books scoring 0 are dropped. Equal scores keep their input order.
pub fn rank(books: Vec<Book>, query: &str) -> LecternResult<Vec<ScoredBook>> {
    let normalized = query.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(LecternError::InvalidQuery);
    }
    let query_tokens = tokenize(&normalized);

    // Indexed parallel iterator: collect preserves input order.
    let mut scored: Vec<ScoredBook> = books
        .into_par_iter()
        .map(|book| {
            let relevance_score = relevance_score(&book, &query_tokens);
            ScoredBook { book, relevance_score }
        })
        .collect();
    scored.retain(|scored| scored.relevance_score > 0);

    // Stable sort keeps retrieval order for ties.
    scored.sort_by(|a, b| b.relevance_score.cmp(&a.relevance_score));
    scored.truncate(MAX_RESULTS);

    tracing::debug!(query = %normalized, tokens = query_tokens.len(), hits = scored.len(), "ranked books");

    Ok(scored)
}
