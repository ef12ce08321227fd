//! Library - main API over storage and the ranking / ordering / progress logic
//!
//! Every operation takes a fresh snapshot from the database, hands it to the
//! pure components in `search`, `chapters` and `progress`, and persists results
//! through the database's transactional primitives. `Library` holds no mutable
//! state of its own; it is cheap to share behind an `Arc`.

use crate::config::LibraryConfig;
use crate::database::Database;
use crate::interface::{
    LecternError, LecternResult, LibraryApi, ReadingListEntry, ReadingPosition, ScoredBook,
};
use crate::models::{Book, Chapter, NewBook, NewChapter, ReadingProgress};
use crate::{progress, search};
use chrono::Utc;
use once_cell::sync::Lazy;
use std::sync::Arc;
use validator::Validate;

/// Global fallback Tokio runtime for when async functions are called outside any runtime context.
/// Shared across all Library instances and never dropped.
static FALLBACK_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create fallback tokio runtime")
});

fn require_user_id(user_id: &str) -> LecternResult<()> {
    if user_id.trim().is_empty() {
        return Err(LecternError::InvalidArgument("user id is required".to_string()));
    }
    Ok(())
}

fn require_book_id(book_id: i64) -> LecternResult<()> {
    if book_id <= 0 {
        return Err(LecternError::InvalidArgument(format!("invalid book id {book_id}")));
    }
    Ok(())
}

/// Book library backed by SQLite
pub struct Library {
    db: Arc<Database>,
}

impl Library {
    /// Open (or create) the library database described by `config`
    pub fn open(config: &LibraryConfig) -> LecternResult<Self> {
        let db = Database::open(config)?;
        tracing::info!(path = %config.db_path.display(), pool_size = config.pool_size, "opened library");
        Ok(Self { db: Arc::new(db) })
    }

    /// Create a library with an in-memory database (for testing)
    #[cfg(test)]
    pub(crate) fn new_in_memory() -> LecternResult<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Number of stored progress rows for (user, book); at most 1
    pub fn progress_row_count(&self, user_id: &str, book_id: i64) -> LecternResult<u64> {
        Ok(self.db.progress_row_count(user_id, book_id)?)
    }

    /// Get a tokio runtime handle - uses current runtime if available, otherwise global fallback
    fn runtime_handle(&self) -> tokio::runtime::Handle {
        tokio::runtime::Handle::try_current().unwrap_or_else(|_| FALLBACK_RUNTIME.handle().clone())
    }

    fn search_sync(db: &Database, query: &str) -> LecternResult<Vec<ScoredBook>> {
        let books = db.fetch_all_books()?;
        tracing::debug!(candidates = books.len(), "loaded search candidates");
        search::rank(books, query)
    }
}

#[async_trait::async_trait]
impl LibraryApi for Library {
    /// Search runs on a blocking thread: it loads the full catalog and scores
    /// every book.
    async fn search(&self, query: String) -> LecternResult<Vec<ScoredBook>> {
        if query.trim().is_empty() {
            return Err(LecternError::InvalidQuery);
        }

        let db = Arc::clone(&self.db);
        let handle = self
            .runtime_handle()
            .spawn_blocking(move || Self::search_sync(&db, &query));

        match handle.await {
            Ok(result) => result,
            Err(join_error) => Err(LecternError::TaskFailed(join_error.to_string())),
        }
    }

    fn add_book(&self, book: NewBook) -> LecternResult<Book> {
        book.validate()?;
        let stored = self.db.insert_book(&book)?;
        tracing::info!(book_id = stored.id, tags = stored.tags.len(), "added book");
        Ok(stored)
    }

    fn insert_chapter(&self, chapter: NewChapter) -> LecternResult<Chapter> {
        chapter.validate()?;
        self.db.insert_chapter(&chapter).map_err(|e| {
            let err = LecternError::from(e);
            if matches!(err, LecternError::Inconsistent(_)) {
                tracing::warn!(book_id = chapter.book_id, error = %err, "chapter insertion aborted");
            }
            err
        })
    }

    fn book_chapters(&self, book_id: i64) -> LecternResult<Vec<Chapter>> {
        require_book_id(book_id)?;
        Ok(self.db.fetch_chapters(book_id)?)
    }

    fn resolve_position(&self, user_id: &str, book_id: i64) -> LecternResult<ReadingPosition> {
        require_user_id(user_id)?;
        require_book_id(book_id)?;

        let (row, chapters) = self.db.position_snapshot(user_id, book_id)?;
        progress::resolve_position(book_id, row.as_ref(), &chapters)
    }

    fn record_view(&self, user_id: &str, book_id: i64, chapter_id: i64) -> LecternResult<ReadingProgress> {
        require_user_id(user_id)?;
        require_book_id(book_id)?;
        if chapter_id <= 0 {
            return Err(LecternError::InvalidArgument(format!("invalid chapter id {chapter_id}")));
        }

        let row = self.db.upsert_progress(user_id, book_id, chapter_id, Utc::now())?;
        tracing::debug!(user_id, book_id, chapter_id, "recorded chapter view");
        Ok(row)
    }

    fn reading_list(&self, user_id: &str) -> LecternResult<Vec<ReadingListEntry>> {
        require_user_id(user_id)?;
        let (rows, headers) = self.db.reading_list_snapshot(user_id)?;
        Ok(progress::build_reading_list(&rows, &headers))
    }

    fn register_user(&self, user_id: &str) -> LecternResult<()> {
        require_user_id(user_id)?;
        if !self.db.insert_user(user_id, Utc::now())? {
            tracing::debug!(user_id, "user already registered");
        }
        Ok(())
    }

    fn user_exists(&self, user_id: &str) -> LecternResult<bool> {
        require_user_id(user_id)?;
        Ok(self.db.user_exists(user_id)?)
    }
}
