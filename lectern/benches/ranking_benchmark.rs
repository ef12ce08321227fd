use chrono::Utc;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use demo_library::DEMO_BOOKS;
use lectern::models::{Book, Chapter, Tag};
use lectern::search;
use std::hint::black_box;

/// Build an in-memory catalog of `copies` repetitions of the demo books
fn build_catalog(copies: usize) -> Vec<Book> {
    let now = Utc::now();
    let mut next_chapter_id = 1;

    (0..copies)
        .flat_map(|copy| DEMO_BOOKS.iter().map(move |demo| (copy, demo)))
        .enumerate()
        .map(|(i, (copy, demo))| {
            let book_id = i as i64 + 1;
            let chapters = demo
                .chapters
                .iter()
                .enumerate()
                .map(|(n, c)| {
                    let chapter = Chapter {
                        id: next_chapter_id,
                        book_id,
                        title: c.title.clone(),
                        content: c.content.clone(),
                        chapter_number: n as u32 + 1,
                        created_at: now,
                    };
                    next_chapter_id += 1;
                    chapter
                })
                .collect();

            Book {
                id: book_id,
                title: format!("{} {}", demo.title, copy),
                description: demo.description.clone(),
                author_id: demo.author.clone(),
                created_at: now,
                tags: demo
                    .tags
                    .iter()
                    .enumerate()
                    .map(|(t, name)| Tag { id: t as i64 + 1, name: name.clone() })
                    .collect(),
                chapters,
            }
        })
        .collect()
}

fn bench_rank(c: &mut Criterion) {
    let queries = vec![
        ("single_word", "great"),
        ("tag_word", "adventure"),
        ("multi_word", "sea charts stars"),
        ("no_match", "xylophone"),
        ("punctuated", "Great, adventure!"),
    ];

    let mut group = c.benchmark_group("rank");
    group.sample_size(20);

    for copies in [1usize, 100] {
        let catalog = build_catalog(copies);
        for (name, query) in &queries {
            group.bench_with_input(BenchmarkId::new(*name, catalog.len()), &catalog, |b, catalog| {
                b.iter(|| search::rank(black_box(catalog.clone()), black_box(query)).unwrap())
            });
        }
    }
    group.finish();
}

fn bench_tokenize(c: &mut Criterion) {
    let text: String = DEMO_BOOKS
        .iter()
        .flat_map(|b| b.chapters.iter().map(|c| c.content.as_str()))
        .collect::<Vec<_>>()
        .join(" ");

    c.bench_function("tokenize_all_chapters", |b| b.iter(|| search::tokenize(black_box(&text))));
}

criterion_group!(benches, bench_rank, bench_tokenize);
criterion_main!(benches);
