//! SQLite storage for books, chapters, tags, users and reading progress
//!
//! Uses an r2d2 connection pool. Read-then-write sequences (chapter insertion
//! with renumbering, progress upserts) run inside IMMEDIATE transactions so that
//! concurrent writers to the same book or (user, book) pair serialize.

use crate::chapters::{self, OrderingError};
use crate::config::LibraryConfig;
use crate::models::{Book, Chapter, ChapterHeader, NewBook, NewChapter, ReadingProgress, Tag};
use chrono::{DateTime, TimeZone, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Inconsistent(String),
    #[error(transparent)]
    Ordering(#[from] OrderingError),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

fn format_db_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse timestamp string from database to DateTime<Utc>
fn parse_db_timestamp(timestamp_str: &str) -> DateTime<Utc> {
    chrono::NaiveDateTime::parse_from_str(timestamp_str, TIMESTAMP_FORMAT)
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(timestamp_str, "%Y-%m-%d %H:%M:%S"))
        .map(|dt| Utc.from_utc_datetime(&dt))
        .unwrap_or_else(|_| Utc::now())
}

const CHAPTER_COLUMNS: &str = "id, bookId, title, content, chapterNumber, createdAt";

/// Thread-safe database wrapper using connection pooling
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open or create the database described by `config`
    pub fn open(config: &LibraryConfig) -> DatabaseResult<Self> {
        if let Some(parent) = config.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        let manager = SqliteConnectionManager::file(&config.db_path).with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            conn.execute_batch(
                "
                PRAGMA journal_mode=WAL;
                PRAGMA synchronous=NORMAL;
                PRAGMA foreign_keys=ON;
            ",
            )?;
            Ok(())
        });

        let pool = Pool::builder().max_size(config.pool_size.max(1)).build(manager)?;

        let db = Self { pool };
        db.setup_schema()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> DatabaseResult<Self> {
        let manager = SqliteConnectionManager::memory().with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys=ON;")?;
            Ok(())
        });

        // In-memory needs single connection to maintain state
        let pool = Pool::builder().max_size(1).build(manager)?;

        let db = Self { pool };
        db.setup_schema()?;
        Ok(db)
    }

    /// Get a connection from the pool
    pub(crate) fn get_conn(&self) -> DatabaseResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    fn setup_schema(&self) -> DatabaseResult<()> {
        let conn = self.get_conn()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                createdAt TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS books (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                authorId TEXT NOT NULL,
                createdAt TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS book_tags (
                bookId INTEGER NOT NULL REFERENCES books(id) ON DELETE CASCADE,
                tagId INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                PRIMARY KEY (bookId, tagId)
            );

            CREATE TABLE IF NOT EXISTS chapters (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                bookId INTEGER NOT NULL REFERENCES books(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                chapterNumber INTEGER NOT NULL,
                createdAt TEXT NOT NULL,
                UNIQUE (bookId, chapterNumber)
            );

            CREATE TABLE IF NOT EXISTS reading_progress (
                userId TEXT NOT NULL,
                bookId INTEGER NOT NULL REFERENCES books(id) ON DELETE CASCADE,
                lastReadChapterId INTEGER NOT NULL,
                updatedAt TEXT NOT NULL,
                PRIMARY KEY (userId, bookId)
            );

            CREATE INDEX IF NOT EXISTS idx_chapters_book ON chapters(bookId, chapterNumber);
            CREATE INDEX IF NOT EXISTS idx_book_tags_tag ON book_tags(tagId);
        "#,
        )?;

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a user. Returns false if the id was already registered.
    pub fn insert_user(&self, user_id: &str, created_at: DateTime<Utc>) -> DatabaseResult<bool> {
        let conn = self.get_conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO users (id, createdAt) VALUES (?1, ?2)",
            params![user_id, format_db_timestamp(&created_at)],
        )?;
        Ok(inserted == 1)
    }

    pub fn user_exists(&self, user_id: &str) -> DatabaseResult<bool> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users WHERE id = ?1", [user_id], |row| row.get(0))?;
        Ok(count > 0)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Books
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a book and attach its tags, creating tags that don't exist yet.
    pub fn insert_book(&self, book: &NewBook) -> DatabaseResult<Book> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO books (title, description, authorId, createdAt) VALUES (?1, ?2, ?3, ?4)",
            params![book.title, book.description, book.author_id, format_db_timestamp(&book.created_at)],
        )?;
        let book_id = tx.last_insert_rowid();

        let mut tags: Vec<Tag> = Vec::with_capacity(book.tags.len());
        for name in &book.tags {
            let name = name.trim();
            if name.is_empty() || tags.iter().any(|t| t.name == name) {
                continue;
            }
            tx.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", [name])?;
            let tag_id: i64 = tx.query_row("SELECT id FROM tags WHERE name = ?1", [name], |row| row.get(0))?;
            tx.execute(
                "INSERT OR IGNORE INTO book_tags (bookId, tagId) VALUES (?1, ?2)",
                params![book_id, tag_id],
            )?;
            tags.push(Tag { id: tag_id, name: name.to_string() });
        }
        tags.sort_by_key(|t| t.id);

        tx.commit()?;

        Ok(Book {
            id: book_id,
            title: book.title.clone(),
            description: book.description.clone(),
            author_id: book.author_id.clone(),
            created_at: book.created_at,
            tags,
            chapters: Vec::new(),
        })
    }

    /// Fetch every book with its tags and chapters, ordered by book id.
    pub fn fetch_all_books(&self) -> DatabaseResult<Vec<Book>> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let mut books: Vec<Book> = {
            let mut stmt = tx.prepare("SELECT id, title, description, authorId, createdAt FROM books ORDER BY id")?;
            let rows = stmt.query_map([], Self::row_to_book)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        let index: HashMap<i64, usize> = books.iter().enumerate().map(|(i, b)| (b.id, i)).collect();

        {
            let mut stmt = tx.prepare(
                "SELECT bt.bookId, t.id, t.name FROM book_tags bt JOIN tags t ON t.id = bt.tagId ORDER BY bt.bookId, t.id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, Tag { id: row.get(1)?, name: row.get(2)? }))
            })?;
            for row in rows {
                let (book_id, tag) = row?;
                if let Some(&i) = index.get(&book_id) {
                    books[i].tags.push(tag);
                }
            }
        }

        {
            let sql = format!("SELECT {CHAPTER_COLUMNS} FROM chapters ORDER BY bookId, chapterNumber");
            let mut stmt = tx.prepare(&sql)?;
            for chapter in stmt.query_map([], Self::row_to_chapter)? {
                let chapter = chapter?;
                if let Some(&i) = index.get(&chapter.book_id) {
                    books[i].chapters.push(chapter);
                }
            }
        }

        tx.commit()?;
        Ok(books)
    }

    fn book_exists(conn: &Connection, book_id: i64) -> DatabaseResult<bool> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM books WHERE id = ?1", [book_id], |row| row.get(0))?;
        Ok(count > 0)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Chapters
    // ─────────────────────────────────────────────────────────────────────────

    /// Chapters of a book in reading order
    pub fn fetch_chapters(&self, book_id: i64) -> DatabaseResult<Vec<Chapter>> {
        let conn = self.get_conn()?;
        Self::chapters_for_book(&conn, book_id)
    }

    fn chapters_for_book(conn: &Connection, book_id: i64) -> DatabaseResult<Vec<Chapter>> {
        let sql = format!("SELECT {CHAPTER_COLUMNS} FROM chapters WHERE bookId = ?1 ORDER BY chapterNumber");
        let mut stmt = conn.prepare(&sql)?;
        let chapters = stmt
            .query_map([book_id], Self::row_to_chapter)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(chapters)
    }

    fn chapter_numbers(conn: &Connection, book_id: i64) -> DatabaseResult<Vec<u32>> {
        let mut stmt = conn.prepare("SELECT chapterNumber FROM chapters WHERE bookId = ?1 ORDER BY chapterNumber")?;
        let numbers = stmt
            .query_map([book_id], |row| row.get(0))?
            .collect::<Result<Vec<u32>, _>>()?;
        Ok(numbers)
    }

    /// Insert a chapter, renumbering later chapters when inserting in the middle.
    ///
    /// Reading the current numbers, shifting, inserting and re-checking the
    /// result all happen in one IMMEDIATE transaction. If the numbers afterwards
    /// differ from the plan, the transaction is rolled back and
    /// `DatabaseError::Inconsistent` is returned.
    pub fn insert_chapter(&self, chapter: &NewChapter) -> DatabaseResult<Chapter> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let book_id = chapter.book_id;

        if !Self::book_exists(&tx, book_id)? {
            return Err(DatabaseError::NotFound(format!("book {book_id}")));
        }

        let existing = Self::chapter_numbers(&tx, book_id)?;
        let plan = chapters::plan_insertion(&existing, chapter.requested_number)?;

        if let Some(from) = plan.shift_from {
            let expected = existing.iter().filter(|&&n| n >= from).count();
            // Two passes through negative numbers keep UNIQUE(bookId, chapterNumber)
            // satisfied row by row while the run moves up.
            let moved = tx.execute(
                "UPDATE chapters SET chapterNumber = -(chapterNumber + 1) WHERE bookId = ?1 AND chapterNumber >= ?2",
                params![book_id, from],
            )?;
            let restored = tx.execute(
                "UPDATE chapters SET chapterNumber = -chapterNumber WHERE bookId = ?1 AND chapterNumber < 0",
                [book_id],
            )?;
            if moved != expected || restored != expected {
                tracing::warn!(book_id, expected, moved, restored, "chapter shift touched unexpected rows");
                return Err(DatabaseError::Inconsistent(format!(
                    "shifting chapters of book {book_id} from {from} moved {moved}/{restored} rows, expected {expected}"
                )));
            }
        }

        let created_at = format_db_timestamp(&chapter.created_at);
        tx.execute(
            "INSERT INTO chapters (bookId, title, content, chapterNumber, createdAt) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![book_id, chapter.title, chapter.content, plan.assigned_number, created_at],
        )?;
        let chapter_id = tx.last_insert_rowid();

        let after = Self::chapter_numbers(&tx, book_id)?;
        if after != chapters::apply_plan(&existing, &plan) {
            tracing::warn!(book_id, ?existing, ?after, "chapter numbers diverged from plan");
            return Err(DatabaseError::Inconsistent(format!(
                "chapter numbers of book {book_id} are {after:?} after insert"
            )));
        }

        tx.commit()?;

        tracing::info!(book_id, chapter_id, chapter_number = plan.assigned_number, shifted = plan.shift_from.is_some(), "inserted chapter");

        Ok(Chapter {
            id: chapter_id,
            book_id,
            title: chapter.title.clone(),
            content: chapter.content.clone(),
            chapter_number: plan.assigned_number,
            created_at: chapter.created_at,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reading progress
    // ─────────────────────────────────────────────────────────────────────────

    /// The user's progress row for a book together with the book's chapters,
    /// read from one consistent snapshot.
    pub fn position_snapshot(&self, user_id: &str, book_id: i64) -> DatabaseResult<(Option<ReadingProgress>, Vec<Chapter>)> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let progress = tx
            .query_row(
                "SELECT userId, bookId, lastReadChapterId, updatedAt FROM reading_progress WHERE userId = ?1 AND bookId = ?2",
                params![user_id, book_id],
                Self::row_to_progress,
            )
            .optional()?;
        let chapters = Self::chapters_for_book(&tx, book_id)?;

        tx.commit()?;
        Ok((progress, chapters))
    }

    /// Create or overwrite the progress row for (user, book).
    ///
    /// The chapter must belong to the book. After the write exactly one row
    /// must exist for the pair and it must point at `chapter_id`.
    pub fn upsert_progress(
        &self,
        user_id: &str,
        book_id: i64,
        chapter_id: i64,
        updated_at: DateTime<Utc>,
    ) -> DatabaseResult<ReadingProgress> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let found: i64 = tx.query_row(
            "SELECT COUNT(*) FROM chapters WHERE id = ?1 AND bookId = ?2",
            params![chapter_id, book_id],
            |row| row.get(0),
        )?;
        if found == 0 {
            return Err(DatabaseError::NotFound(format!("chapter {chapter_id} of book {book_id}")));
        }

        tx.execute(
            r#"INSERT INTO reading_progress (userId, bookId, lastReadChapterId, updatedAt)
               VALUES (?1, ?2, ?3, ?4)
               ON CONFLICT (userId, bookId) DO UPDATE
               SET lastReadChapterId = excluded.lastReadChapterId, updatedAt = excluded.updatedAt"#,
            params![user_id, book_id, chapter_id, format_db_timestamp(&updated_at)],
        )?;

        let rows: Vec<ReadingProgress> = {
            let mut stmt = tx.prepare(
                "SELECT userId, bookId, lastReadChapterId, updatedAt FROM reading_progress WHERE userId = ?1 AND bookId = ?2",
            )?;
            let rows = stmt.query_map(params![user_id, book_id], Self::row_to_progress)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let row = match rows.as_slice() {
            [row] if row.last_read_chapter_id == chapter_id => row.clone(),
            _ => {
                tracing::warn!(user_id, book_id, chapter_id, rows = rows.len(), "progress upsert left unexpected state");
                return Err(DatabaseError::Inconsistent(format!(
                    "expected one progress row for user {user_id} and book {book_id} pointing at chapter {chapter_id}, found {}",
                    rows.len()
                )));
            }
        };

        tx.commit()?;
        Ok(row)
    }

    /// All progress rows of a user (ordered by book id) and the chapter headers
    /// of the books they refer to.
    pub fn reading_list_snapshot(&self, user_id: &str) -> DatabaseResult<(Vec<ReadingProgress>, Vec<ChapterHeader>)> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let progress = {
            let mut stmt = tx.prepare(
                "SELECT userId, bookId, lastReadChapterId, updatedAt FROM reading_progress WHERE userId = ?1 ORDER BY bookId",
            )?;
            let rows = stmt.query_map([user_id], Self::row_to_progress)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let headers = {
            let mut stmt = tx.prepare(
                r#"SELECT id, bookId, title, chapterNumber, createdAt FROM chapters
                   WHERE bookId IN (SELECT bookId FROM reading_progress WHERE userId = ?1)
                   ORDER BY bookId, chapterNumber"#,
            )?;
            let rows = stmt.query_map([user_id], |row| {
                let created_at: String = row.get(4)?;
                Ok(ChapterHeader {
                    id: row.get(0)?,
                    book_id: row.get(1)?,
                    title: row.get(2)?,
                    chapter_number: row.get(3)?,
                    created_at: parse_db_timestamp(&created_at),
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        tx.commit()?;
        Ok((progress, headers))
    }

    /// Number of progress rows stored for (user, book)
    pub fn progress_row_count(&self, user_id: &str, book_id: i64) -> DatabaseResult<u64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM reading_progress WHERE userId = ?1 AND bookId = ?2",
            params![user_id, book_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Row mapping
    // ─────────────────────────────────────────────────────────────────────────

    fn row_to_book(row: &rusqlite::Row) -> rusqlite::Result<Book> {
        let created_at: String = row.get(4)?;
        Ok(Book {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            author_id: row.get(3)?,
            created_at: parse_db_timestamp(&created_at),
            tags: Vec::new(),
            chapters: Vec::new(),
        })
    }

    fn row_to_chapter(row: &rusqlite::Row) -> rusqlite::Result<Chapter> {
        let created_at: String = row.get(5)?;
        Ok(Chapter {
            id: row.get(0)?,
            book_id: row.get(1)?,
            title: row.get(2)?,
            content: row.get(3)?,
            chapter_number: row.get(4)?,
            created_at: parse_db_timestamp(&created_at),
        })
    }

    fn row_to_progress(row: &rusqlite::Row) -> rusqlite::Result<ReadingProgress> {
        let updated_at: String = row.get(3)?;
        Ok(ReadingProgress {
            user_id: row.get(0)?,
            book_id: row.get(1)?,
            last_read_chapter_id: row.get(2)?,
            updated_at: parse_db_timestamp(&updated_at),
        })
    }
}
