//! Weighted multi-field relevance scoring for books.
//!
//! Each text field is scored against the tokenized query with `score_field`,
//! then multiplied by a per-field weight. A book's relevance is the sum over its
//! title, description, every tag name, and every chapter title and body.

use crate::models::Book;
use crate::search::tokenize;

/// Points for a field token equal to the query token
pub const EXACT_MATCH_POINTS: u32 = 3;
/// Points for each field token containing the query token
pub const PARTIAL_MATCH_POINTS: u32 = 1;

/// Per-field multipliers applied to `score_field` results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldWeights {
    pub title: u64,
    pub description: u64,
    pub tag_name: u64,
    pub chapter_title: u64,
    pub chapter_content: u64,
}

pub const FIELD_WEIGHTS: FieldWeights = FieldWeights {
    title: 4,
    description: 3,
    tag_name: 5,
    chapter_title: 2,
    chapter_content: 1,
};

/// Score one text field against already-tokenized query terms.
///
/// For each query token the field tokens are scanned in order. Every field
/// token that merely contains the query token adds `PARTIAL_MATCH_POINTS`; the
/// first field token equal to it adds `EXACT_MATCH_POINTS` and ends the scan
/// for that query token. Partial hits seen before the exact hit are kept, and
/// partial hits are never capped.
pub fn score_field(text: &str, query_tokens: &[String]) -> u32 {
    let field_tokens = tokenize(text);
    score_tokens(&field_tokens, query_tokens)
}

fn score_tokens(field_tokens: &[String], query_tokens: &[String]) -> u32 {
    let mut score = 0;
    for query_token in query_tokens {
        for field_token in field_tokens {
            if field_token == query_token {
                score += EXACT_MATCH_POINTS;
                break;
            } else if field_token.contains(query_token.as_str()) {
                score += PARTIAL_MATCH_POINTS;
            }
        }
    }
    score
}

/// Total relevance of a book for the query, using `FIELD_WEIGHTS`.
pub fn relevance_score(book: &Book, query_tokens: &[String]) -> u64 {
    weighted_relevance(book, query_tokens, &FIELD_WEIGHTS)
}

pub fn weighted_relevance(book: &Book, query_tokens: &[String], weights: &FieldWeights) -> u64 {
    if query_tokens.is_empty() {
        return 0;
    }

    let field = |text: &str| u64::from(score_field(text, query_tokens));

    let mut score = field(&book.title) * weights.title + field(&book.description) * weights.description;

    score += book
        .tags
        .iter()
        .map(|tag| field(&tag.name) * weights.tag_name)
        .sum::<u64>();

    score += book
        .chapters
        .iter()
        .map(|chapter| {
            field(&chapter.title) * weights.chapter_title
                + field(&chapter.content) * weights.chapter_content
        })
        .sum::<u64>();

    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chapter, Tag};
    use chrono::Utc;

    fn q(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    fn book(title: &str, description: &str) -> Book {
        Book {
            id: 1,
            title: title.to_string(),
            description: description.to_string(),
            author_id: "author".to_string(),
            created_at: Utc::now(),
            tags: Vec::new(),
            chapters: Vec::new(),
        }
    }

    fn chapter(number: u32, title: &str, content: &str) -> Chapter {
        Chapter {
            id: i64::from(number),
            book_id: 1,
            title: title.to_string(),
            content: content.to_string(),
            chapter_number: number,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_exact_match_scores_three() {
        assert_eq!(score_field("The Great Adventure", &q(&["great"])), 3);
    }

    #[test]
    fn test_partial_match_scores_one() {
        assert_eq!(score_field("Greatness", &q(&["great"])), 1);
    }

    #[test]
    fn test_no_match_scores_zero() {
        assert_eq!(score_field("Silent Orchard", &q(&["great"])), 0);
        assert_eq!(score_field("", &q(&["great"])), 0);
        assert_eq!(score_field("Anything", &[]), 0);
    }

    #[test]
    fn test_exact_match_counted_once_per_query_token() {
        // Second "great" is never reached: the first exact hit ends the scan.
        assert_eq!(score_field("great great great", &q(&["great"])), 3);
    }

    #[test]
    fn test_partial_matches_before_exact_are_kept() {
        // greatness (+1), greater (+1), great (+3, stop), greatest never scanned
        assert_eq!(
            score_field("greatness greater great greatest", &q(&["great"])),
            5
        );
    }

    #[test]
    fn test_partial_matches_are_not_capped() {
        assert_eq!(score_field("greatness greater greatest", &q(&["great"])), 3);
    }

    #[test]
    fn test_each_query_token_scored_independently() {
        // "sea" exact (3); "harbor" exact (3)
        assert_eq!(score_field("Sea and harbor", &q(&["sea", "harbor"])), 6);
        // duplicate query tokens each score
        assert_eq!(score_field("sea", &q(&["sea", "sea"])), 6);
    }

    #[test]
    fn test_field_is_normalized_before_matching() {
        assert_eq!(score_field("GREAT!", &q(&["great"])), 3);
        assert_eq!(score_field("great-adventure", &q(&["great"])), 1);
    }

    #[test]
    fn test_relevance_applies_field_weights() {
        let mut b = book("Great", "great");
        b.tags.push(Tag { id: 1, name: "great".to_string() });
        b.tags.push(Tag { id: 2, name: "greatness".to_string() });
        b.chapters.push(chapter(1, "great", "great"));
        b.chapters.push(chapter(2, "nothing", "greatly"));

        // title 3*4 + description 3*3 + tags (3+1)*5 + ch1 3*2 + 3*1 + ch2 0*2 + 1*1
        assert_eq!(relevance_score(&b, &q(&["great"])), 12 + 9 + 20 + 6 + 3 + 1);
    }

    #[test]
    fn test_relevance_zero_without_matches() {
        let mut b = book("Silent Orchard", "apples and drought");
        b.chapters.push(chapter(1, "Blossom", "frost"));
        assert_eq!(relevance_score(&b, &q(&["spaceship"])), 0);
        assert_eq!(relevance_score(&b, &[]), 0);
    }

    #[test]
    fn test_custom_weights() {
        let b = book("Great", "");
        let only_title = FieldWeights {
            title: 10,
            description: 0,
            tag_name: 0,
            chapter_title: 0,
            chapter_content: 0,
        };
        assert_eq!(weighted_relevance(&b, &q(&["great"]), &only_title), 30);
    }
}
