//! Demo catalog for lectern
//!
//! A small, hand-written set of books and chapters used to seed demo databases,
//! drive benchmarks, and exercise integration tests with realistic text.

use once_cell::sync::Lazy;
use serde::Deserialize;
use thiserror::Error;

const BOOKS_CSV: &str = include_str!("../data/books.csv");
const CHAPTERS_CSV: &str = include_str!("../data/chapters.csv");

/// A demo chapter, listed in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoChapter {
    pub title: String,
    pub content: String,
}

/// A demo book with its tags and chapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoBook {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub author: String,
    pub tags: Vec<String>,
    pub chapters: Vec<DemoChapter>,
}

#[derive(Deserialize)]
struct BookRecord {
    slug: String,
    title: String,
    description: String,
    author: String,
    tags: String,
}

#[derive(Deserialize)]
struct ChapterRecord {
    book_slug: String,
    title: String,
    content: String,
}

/// The full demo catalog, parsed once on first access.
///
/// The CSV is compiled into the crate, so a malformed row is a build defect
/// and panics on first access.
pub static DEMO_BOOKS: Lazy<Vec<DemoBook>> =
    Lazy::new(|| load_catalog().expect("embedded demo catalog is malformed"));

#[derive(Error, Debug)]
enum CatalogError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("chapter refers to unknown book {0:?}")]
    UnknownBook(String),
}

fn parse_books(data: &str) -> Result<Vec<DemoBook>, CatalogError> {
    csv::Reader::from_reader(data.as_bytes())
        .deserialize::<BookRecord>()
        .map(|record| {
            let record = record?;
            Ok(DemoBook {
                slug: record.slug,
                title: record.title,
                description: record.description,
                author: record.author,
                tags: record
                    .tags
                    .split(';')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from)
                    .collect(),
                chapters: Vec::new(),
            })
        })
        .collect()
}

fn attach_chapters(books: &mut [DemoBook], data: &str) -> Result<(), CatalogError> {
    for record in csv::Reader::from_reader(data.as_bytes()).deserialize::<ChapterRecord>() {
        let record = record?;
        let book = books
            .iter_mut()
            .find(|b| b.slug == record.book_slug)
            .ok_or_else(|| CatalogError::UnknownBook(record.book_slug.clone()))?;
        book.chapters.push(DemoChapter {
            title: record.title,
            content: record.content,
        });
    }
    Ok(())
}

fn load_catalog() -> Result<Vec<DemoBook>, CatalogError> {
    let mut books = parse_books(BOOKS_CSV)?;
    attach_chapters(&mut books, CHAPTERS_CSV)?;
    Ok(books)
}

/// Look up a demo book by slug.
pub fn demo_book(slug: &str) -> Option<&'static DemoBook> {
    DEMO_BOOKS.iter().find(|b| b.slug == slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_parses_every_book() {
        assert_eq!(DEMO_BOOKS.len(), 12);
        assert!(DEMO_BOOKS.iter().all(|b| !b.title.is_empty()));
    }

    #[test]
    fn test_every_book_has_chapters() {
        for book in DEMO_BOOKS.iter() {
            assert!(!book.chapters.is_empty(), "{} has no chapters", book.slug);
        }
    }

    #[test]
    fn test_malformed_rows_are_errors() {
        let short_row = "slug,title,description,author,tags\nonly-slug,Title\n";
        assert!(matches!(parse_books(short_row), Err(CatalogError::Csv(_))));

        let mut books = parse_books("slug,title,description,author,tags\nknown,Known,,someone,\n").unwrap();
        let orphan = "book_slug,title,content\nmissing,Lost,text\n";
        assert!(matches!(
            attach_chapters(&mut books, orphan),
            Err(CatalogError::UnknownBook(slug)) if slug == "missing"
        ));
    }

    #[test]
    fn test_tags_are_split() {
        let book = demo_book("great-adventure").unwrap();
        assert_eq!(book.tags, vec!["adventure", "sea", "classic"]);
        assert_eq!(book.chapters.len(), 3);
        assert_eq!(book.chapters[0].title, "Leaving Port");
    }
}
