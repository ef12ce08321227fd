//! Reading position resolution and the reading-list read-model.
//!
//! Both work on snapshots read from storage in a single transaction and never
//! touch storage themselves.

use crate::interface::{
    ChapterRef, LatestChapter, LecternError, LecternResult, ReadingListEntry, ReadingPosition,
};
use crate::models::{Chapter, ChapterHeader, ReadingProgress};
use std::cmp::Reverse;
use std::collections::HashMap;

/// Pick the chapter a user should continue from.
///
/// Without progress the book's lowest-numbered chapter is returned. With
/// progress the referenced chapter is returned, and a reference to a chapter
/// missing from `chapters` is an error rather than a silent restart.
pub fn resolve_position(
    book_id: i64,
    progress: Option<&ReadingProgress>,
    chapters: &[Chapter],
) -> LecternResult<ReadingPosition> {
    match progress {
        None => chapters
            .iter()
            .min_by_key(|c| c.chapter_number)
            .cloned()
            .map(ReadingPosition::Start)
            .ok_or_else(|| LecternError::NotFound(format!("book {book_id} has no chapters"))),
        Some(progress) => chapters
            .iter()
            .find(|c| c.id == progress.last_read_chapter_id)
            .cloned()
            .map(ReadingPosition::Resume)
            .ok_or_else(|| {
                LecternError::NotFound(format!(
                    "chapter {} referenced by reading progress of book {book_id} does not exist",
                    progress.last_read_chapter_id
                ))
            }),
    }
}

/// Build a user's reading list from their progress rows and the chapter
/// headers of the books involved.
///
/// The latest chapter of a book is the one created last (greatest
/// `created_at`, then greatest id), which need not be the highest-numbered one.
/// Entries are ordered by that creation time, newest first; books without
/// chapters come last. Equal times keep the order of `progress`.
pub fn build_reading_list(progress: &[ReadingProgress], chapters: &[ChapterHeader]) -> Vec<ReadingListEntry> {
    let by_id: HashMap<i64, &ChapterHeader> = chapters.iter().map(|c| (c.id, c)).collect();

    let mut latest_by_book: HashMap<i64, &ChapterHeader> = HashMap::new();
    for chapter in chapters {
        latest_by_book
            .entry(chapter.book_id)
            .and_modify(|current| {
                if (chapter.created_at, chapter.id) > (current.created_at, current.id) {
                    *current = chapter;
                }
            })
            .or_insert(chapter);
    }

    let mut entries: Vec<ReadingListEntry> = progress
        .iter()
        .map(|row| ReadingListEntry {
            book_id: row.book_id,
            last_read_chapter: by_id
                .get(&row.last_read_chapter_id)
                .filter(|c| c.book_id == row.book_id)
                .map(|c| ChapterRef {
                    id: c.id,
                    title: c.title.clone(),
                    chapter_number: c.chapter_number,
                }),
            latest_chapter: latest_by_book.get(&row.book_id).map(|c| LatestChapter {
                id: c.id,
                title: c.title.clone(),
                chapter_number: c.chapter_number,
                created_at: c.created_at,
            }),
        })
        .collect();

    // Some(_) > None, so Reverse puts chapterless books last.
    entries.sort_by_key(|e| Reverse(e.latest_chapter.as_ref().map(|c| c.created_at)));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn chapter(id: i64, book_id: i64, number: u32, created: i64) -> Chapter {
        Chapter {
            id,
            book_id,
            title: format!("Chapter {number}"),
            content: "text".to_string(),
            chapter_number: number,
            created_at: t(created),
        }
    }

    fn progress(book_id: i64, chapter_id: i64) -> ReadingProgress {
        ReadingProgress {
            user_id: "reader".to_string(),
            book_id,
            last_read_chapter_id: chapter_id,
            updated_at: t(100),
        }
    }

    fn headers(chapters: &[Chapter]) -> Vec<ChapterHeader> {
        chapters.iter().map(Chapter::header).collect()
    }

    #[test]
    fn test_no_progress_starts_at_first_chapter() {
        let chapters = vec![chapter(12, 1, 2, 0), chapter(11, 1, 1, 0), chapter(13, 1, 3, 0)];
        let position = resolve_position(1, None, &chapters).unwrap();
        assert!(matches!(position, ReadingPosition::Start(_)));
        assert_eq!(position.chapter().id, 11);
        assert_eq!(position.chapter().chapter_number, 1);
    }

    #[test]
    fn test_no_progress_and_no_chapters_is_not_found() {
        let result = resolve_position(1, None, &[]);
        assert!(matches!(result, Err(LecternError::NotFound(_))));
    }

    #[test]
    fn test_progress_resumes_last_read_chapter() {
        let chapters = vec![chapter(11, 1, 1, 0), chapter(12, 1, 2, 0)];
        let position = resolve_position(1, Some(&progress(1, 12)), &chapters).unwrap();
        assert_eq!(position, ReadingPosition::Resume(chapters[1].clone()));
    }

    #[test]
    fn test_orphaned_progress_does_not_fall_back() {
        let chapters = vec![chapter(11, 1, 1, 0)];
        let result = resolve_position(1, Some(&progress(1, 99)), &chapters);
        assert!(matches!(result, Err(LecternError::NotFound(_))));
    }

    #[test]
    fn test_reading_list_uses_creation_time_not_number() {
        // Chapter 1 was inserted at the front after chapter 2 existed.
        let chapters = vec![chapter(21, 1, 2, 0), chapter(22, 1, 1, 30)];
        let list = build_reading_list(&[progress(1, 21)], &headers(&chapters));

        assert_eq!(list.len(), 1);
        let latest = list[0].latest_chapter.as_ref().unwrap();
        assert_eq!(latest.id, 22);
        assert_eq!(latest.chapter_number, 1);
        assert_eq!(latest.created_at, t(30));

        let last_read = list[0].last_read_chapter.as_ref().unwrap();
        assert_eq!(last_read.id, 21);
        assert_eq!(last_read.chapter_number, 2);
    }

    #[test]
    fn test_reading_list_ordered_by_latest_chapter_desc() {
        let chapters = vec![
            chapter(1, 10, 1, 5),
            chapter(2, 20, 1, 50),
            chapter(3, 30, 1, 20),
            chapter(4, 30, 2, 25),
        ];
        let rows = vec![progress(10, 1), progress(20, 2), progress(30, 3)];
        let list = build_reading_list(&rows, &headers(&chapters));
        let order: Vec<i64> = list.iter().map(|e| e.book_id).collect();
        assert_eq!(order, vec![20, 30, 10]);
        assert_eq!(list[1].latest_chapter.as_ref().unwrap().id, 4);
    }

    #[test]
    fn test_reading_list_tie_prefers_greatest_id() {
        let chapters = vec![chapter(7, 1, 1, 10), chapter(9, 1, 2, 10), chapter(8, 1, 3, 10)];
        let list = build_reading_list(&[progress(1, 7)], &headers(&chapters));
        assert_eq!(list[0].latest_chapter.as_ref().unwrap().id, 9);
    }

    #[test]
    fn test_reading_list_missing_data_reported_as_none() {
        let chapters = vec![chapter(1, 10, 1, 5)];
        let rows = vec![progress(99, 500), progress(10, 404)];
        let list = build_reading_list(&rows, &headers(&chapters));

        assert_eq!(list[0].book_id, 10);
        assert!(list[0].last_read_chapter.is_none());
        assert!(list[0].latest_chapter.is_some());

        assert_eq!(list[1].book_id, 99);
        assert!(list[1].latest_chapter.is_none());
        assert!(list[1].last_read_chapter.is_none());
    }

    #[test]
    fn test_reading_list_empty() {
        assert!(build_reading_list(&[], &[]).is_empty());
    }
}
