use std::fmt;

use chrono::{DateTime, Utc};
use curriculum_core::model::{Batch, BatchId, ChapterDraft, TopicDraft};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    batch_id: BatchId,
    title: String,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidBatchId { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidBatchId { raw } => write!(f, "invalid --batch-id value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("CURRICULUM_DB_URL")
            .unwrap_or_else(|_| "sqlite:curriculum.sqlite3".into());
        let mut batch_id = std::env::var("CURRICULUM_BATCH_ID")
            .ok()
            .and_then(|value| value.parse::<BatchId>().ok())
            .unwrap_or_else(|| BatchId::new(1));
        let mut title = "Rust Foundations".to_owned();
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--batch-id" => {
                    let value = require_value(&mut args, "--batch-id")?;
                    batch_id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidBatchId { raw: value.clone() })?;
                }
                "--title" => {
                    title = require_value(&mut args, "--title")?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            batch_id,
            title,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:curriculum.sqlite3)");
    eprintln!("  --batch-id <id>           Batch id to create (default: 1)");
    eprintln!("  --title <title>           Batch title (default: Rust Foundations)");
    eprintln!("  --now <rfc3339>           Fixed creation time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  CURRICULUM_DB_URL, CURRICULUM_BATCH_ID");
}

fn demo_chapters() -> Vec<ChapterDraft> {
    vec![
        ChapterDraft::new(
            "Getting started",
            vec![
                TopicDraft::new("Installing the toolchain", "rustup, cargo and editions.")
                    .with_resource("https://www.rust-lang.org/tools/install"),
                TopicDraft::new("Hello, world", "Your first binary crate."),
            ],
        ),
        ChapterDraft::new(
            "Ownership",
            vec![
                TopicDraft::new("Moves and copies", "What happens on assignment.")
                    .with_resource(
                        "https://doc.rust-lang.org/book/ch04-01-what-is-ownership.html",
                    ),
                TopicDraft::new("Borrowing", "Shared and mutable references."),
                TopicDraft::new("Lifetimes", "How long a reference stays valid."),
            ],
        )
        .test_gate(),
        ChapterDraft::new(
            "Error handling",
            vec![
                TopicDraft::new("Result and ?", "Propagating recoverable errors."),
                TopicDraft::new("Custom error types", "Enums with Display."),
            ],
        )
        .with_assignment(),
    ]
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    if let Some(existing) = storage.batches.get_batch(args.batch_id).await? {
        println!(
            "Batch {} ({}) already exists in {}; nothing to do",
            existing.id(),
            existing.title(),
            args.db_url
        );
        return Ok(());
    }

    let batch = Batch::new(args.batch_id, args.title, demo_chapters(), now)?;
    storage.batches.insert_batch(&batch).await?;

    println!(
        "Seeded batch {} with {} chapters into {}",
        batch.id(),
        batch.total_chapter_count(),
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
