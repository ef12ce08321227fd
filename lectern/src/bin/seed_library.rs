//! Seed a library database with the demo catalog and simulated readers.
//!
//! Books and chapters come from the `demo-library` crate. Each reader opens a
//! random selection of books and views a random chapter in each, so the
//! resulting database has reading progress and reading lists to look at.
//!
//! Usage:
//!     cargo run --release --bin seed-library -- --db-path library.sqlite --readers 20
//!     LECTERN_DB_PATH=library.sqlite LECTERN_POOL_SIZE=4 cargo run --bin seed-library

use anyhow::{Context, Result};
use clap::Parser;
use demo_library::DEMO_BOOKS;
use lectern::{LibraryApi, LibraryConfig, Library, NewBook, NewChapter};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to save the SQLite database (defaults to LECTERN_DB_PATH, then ./data/library.sqlite)
    #[arg(short, long)]
    db_path: Option<PathBuf>,

    /// How many times the demo catalog is inserted
    #[arg(short, long, default_value_t = 1)]
    copies: usize,

    /// Number of simulated readers
    #[arg(short, long, default_value_t = 10)]
    readers: usize,

    /// Books each reader opens
    #[arg(long, default_value_t = 4)]
    books_per_reader: usize,

    /// Fraction of books that get an extra chapter inserted mid-book
    #[arg(long, default_value_t = 0.25)]
    interlude_rate: f64,

    /// RNG seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,

    /// Run this search against the seeded library and print the top hits
    #[arg(short, long)]
    query: Option<String>,

    /// Replace an existing database file
    #[arg(long)]
    overwrite: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = LibraryConfig::from_env();
    if let Some(path) = &args.db_path {
        config.db_path = path.clone();
    }

    if config.db_path.exists() {
        if !args.overwrite {
            anyhow::bail!("{} already exists (pass --overwrite to replace it)", config.db_path.display());
        }
        std::fs::remove_file(&config.db_path).context("Failed to remove existing database")?;
    }

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let library = Library::open(&config).context("Failed to open library")?;

    let mut book_ids = Vec::with_capacity(DEMO_BOOKS.len() * args.copies);
    let mut chapter_count = 0usize;

    for copy in 0..args.copies {
        for demo in DEMO_BOOKS.iter() {
            let title = if copy == 0 {
                demo.title.clone()
            } else {
                format!("{} (volume {})", demo.title, copy + 1)
            };
            let book = library.add_book(
                NewBook::new(title, demo.description.clone(), demo.author.clone()).with_tags(demo.tags.iter().cloned()),
            )?;

            for chapter in &demo.chapters {
                library.insert_chapter(NewChapter::new(book.id, chapter.title.clone(), chapter.content.clone()))?;
                chapter_count += 1;
            }

            if demo.chapters.len() > 1 && rng.gen_bool(args.interlude_rate.clamp(0.0, 1.0)) {
                let at = rng.gen_range(1..=demo.chapters.len() as u32);
                library.insert_chapter(
                    NewChapter::new(book.id, "Interlude", format!("A pause in {}.", demo.title)).at_number(at),
                )?;
                chapter_count += 1;
            }

            book_ids.push(book.id);
        }
    }

    tracing::info!(books = book_ids.len(), chapters = chapter_count, "catalog inserted");

    let mut views = 0usize;
    for reader in 0..args.readers {
        let user_id = format!("reader-{:03}", reader + 1);
        library.register_user(&user_id)?;

        let picks: Vec<i64> = book_ids
            .choose_multiple(&mut rng, args.books_per_reader.min(book_ids.len()))
            .copied()
            .collect();

        for book_id in picks {
            let chapters = library.book_chapters(book_id)?;
            if let Some(chapter) = chapters.choose(&mut rng) {
                library.record_view(&user_id, book_id, chapter.id)?;
                views += 1;
            }
        }

        let list = library.reading_list(&user_id)?;
        tracing::debug!(user_id = %user_id, entries = list.len(), "reader seeded");
    }

    tracing::info!(readers = args.readers, views, "reading progress inserted");

    if let Some(query) = args.query {
        let results = library.search(query.clone()).await?;
        println!("Top results for {:?}:", query);
        for hit in results.iter().take(10) {
            println!("  {:>4}  {}", hit.relevance_score, hit.book.title);
        }
    }

    println!("Library created: {}", config.db_path.display());
    println!("  Books: {}", book_ids.len());
    println!("  Chapters: {}", chapter_count);
    println!("  Readers: {}", args.readers);
    println!("  Chapter views: {}", views);

    Ok(())
}
