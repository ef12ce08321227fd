//! Lectern - core of a book-reading backend
//!
//! Relevance-ranked search over the whole catalog, dense per-book chapter
//! numbering with insert-in-the-middle, and per-user reading progress with a
//! reading list derived from it. Storage is SQLite behind an r2d2 pool.

pub mod chapters;
pub mod config;
pub mod database;
pub mod interface;
pub mod models;
pub mod progress;
pub mod ranking;
pub mod search;
mod store;

pub use config::LibraryConfig;
pub use interface::*;
pub use models::{Book, Chapter, ChapterHeader, NewBook, NewChapter, ReadingProgress, Tag};
pub use store::Library;
