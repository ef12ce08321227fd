//! lectern public interface
//!
//! Result records, the error type, and the `LibraryApi` trait that the calling
//! layer (HTTP handlers, CLIs) programs against.

use crate::models::{Book, Chapter, NewBook, NewChapter, ReadingProgress};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// RECORDS
// ═══════════════════════════════════════════════════════════════════════════════

/// A book paired with its relevance to one search query.
/// Exists only for the duration of a single ranking request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredBook {
    #[serde(flatten)]
    pub book: Book,
    pub relevance_score: u64,
}

/// Where a user should continue reading a book
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "chapter", rename_all = "snake_case")]
pub enum ReadingPosition {
    /// The chapter the user viewed last
    Resume(Chapter),
    /// No progress yet: the book's first chapter
    Start(Chapter),
}

impl ReadingPosition {
    pub fn chapter(&self) -> &Chapter {
        match self {
            ReadingPosition::Resume(chapter) | ReadingPosition::Start(chapter) => chapter,
        }
    }

    pub fn into_chapter(self) -> Chapter {
        match self {
            ReadingPosition::Resume(chapter) | ReadingPosition::Start(chapter) => chapter,
        }
    }
}

/// Short reference to a chapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRef {
    pub id: i64,
    pub title: String,
    pub chapter_number: u32,
}

/// The most recently created chapter of a book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestChapter {
    pub id: i64,
    pub title: String,
    pub chapter_number: u32,
    pub created_at: DateTime<Utc>,
}

/// One row of a user's reading list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingListEntry {
    pub book_id: i64,
    /// `None` when the progress row points at a chapter that no longer exists
    pub last_read_chapter: Option<ChapterRef>,
    /// `None` when the book has no chapters
    pub latest_chapter: Option<LatestChapter>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Error type for lectern operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LecternError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Search query is empty")]
    InvalidQuery,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Inconsistent state: {0}")]
    Inconsistent(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

pub type LecternResult<T> = Result<T, LecternError>;

impl From<crate::database::DatabaseError> for LecternError {
    fn from(e: crate::database::DatabaseError) -> Self {
        use crate::chapters::OrderingError;
        use crate::database::DatabaseError;

        match e {
            DatabaseError::NotFound(what) => LecternError::NotFound(what),
            DatabaseError::Inconsistent(what) => LecternError::Inconsistent(what),
            DatabaseError::Ordering(err @ OrderingError::InvalidRequestedNumber { .. }) => {
                LecternError::InvalidArgument(err.to_string())
            }
            DatabaseError::Ordering(err @ OrderingError::NotDense { .. }) => {
                LecternError::Inconsistent(err.to_string())
            }
            other => LecternError::Database(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for LecternError {
    fn from(e: validator::ValidationErrors) -> Self {
        LecternError::InvalidArgument(e.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERVICE INTERFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// The operations the library exposes to the calling layer.
#[async_trait::async_trait]
pub trait LibraryApi: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────────
    // Search
    // ─────────────────────────────────────────────────────────────────────────────

    /// Rank every book against `query`. At most 50 results, best first.
    /// Fails with `InvalidQuery` when the query is blank.
    async fn search(&self, query: String) -> LecternResult<Vec<ScoredBook>>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Catalog
    // ─────────────────────────────────────────────────────────────────────────────

    fn add_book(&self, book: NewBook) -> LecternResult<Book>;

    /// Insert a chapter, appending or shifting later chapters as needed.
    /// The returned chapter carries the assigned number.
    fn insert_chapter(&self, chapter: NewChapter) -> LecternResult<Chapter>;

    /// Chapters of a book in reading order
    fn book_chapters(&self, book_id: i64) -> LecternResult<Vec<Chapter>>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Reading progress
    // ─────────────────────────────────────────────────────────────────────────────

    fn resolve_position(&self, user_id: &str, book_id: i64) -> LecternResult<ReadingPosition>;

    /// Record that `user_id` opened `chapter_id`. Creates or overwrites the
    /// single progress row for (user, book).
    fn record_view(&self, user_id: &str, book_id: i64, chapter_id: i64) -> LecternResult<ReadingProgress>;

    fn reading_list(&self, user_id: &str) -> LecternResult<Vec<ReadingListEntry>>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────────

    fn register_user(&self, user_id: &str) -> LecternResult<()>;

    fn user_exists(&self, user_id: &str) -> LecternResult<bool>;
}
