//! Core data models for lectern
//!
//! Persistent entities (books, tags, chapters, reading progress) as materialized
//! from storage, plus the validated write requests used to create them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

// ─────────────────────────────────────────────────────────────────────────────
// STORED ENTITIES
// ─────────────────────────────────────────────────────────────────────────────

/// A tag attached to one or more books
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// A chapter of a book.
///
/// `chapter_number` is the 1-based reading position inside the book. Numbers
/// are dense and unique per book; inserting an earlier chapter shifts later ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: i64,
    pub book_id: i64,
    pub title: String,
    pub content: String,
    pub chapter_number: u32,
    pub created_at: DateTime<Utc>,
}

impl Chapter {
    pub fn header(&self) -> ChapterHeader {
        ChapterHeader {
            id: self.id,
            book_id: self.book_id,
            title: self.title.clone(),
            chapter_number: self.chapter_number,
            created_at: self.created_at,
        }
    }
}

/// Chapter metadata without its content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterHeader {
    pub id: i64,
    pub book_id: i64,
    pub title: String,
    pub chapter_number: u32,
    pub created_at: DateTime<Utc>,
}

/// A book with its tags (ordered by tag id) and chapters (ordered by number)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub author_id: String,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<Tag>,
    pub chapters: Vec<Chapter>,
}

/// The single progress row for a (user, book) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingProgress {
    pub user_id: String,
    pub book_id: i64,
    pub last_read_chapter_id: i64,
    pub updated_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// WRITE REQUESTS
// ─────────────────────────────────────────────────────────────────────────────

/// Request to create a book
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct NewBook {
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    pub description: String,
    #[validate(length(min = 1, message = "author is required"))]
    pub author_id: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl NewBook {
    pub fn new(title: impl Into<String>, description: impl Into<String>, author_id: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            author_id: author_id.into(),
            tags: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Request to insert a chapter into a book.
///
/// Without `requested_number` the chapter is appended after the current last
/// chapter. With it, the chapter takes that position and later chapters move
/// up by one.
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct NewChapter {
    #[validate(range(min = 1, message = "book id is required"))]
    pub book_id: i64,
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "content is required"))]
    pub content: String,
    pub requested_number: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl NewChapter {
    pub fn new(book_id: i64, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            book_id,
            title: title.into(),
            content: content.into(),
            requested_number: None,
            created_at: Utc::now(),
        }
    }

    /// Insert at `number` instead of appending
    pub fn at_number(mut self, number: u32) -> Self {
        self.requested_number = Some(number);
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}
