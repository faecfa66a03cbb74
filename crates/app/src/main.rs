use std::fmt;
use std::path::PathBuf;

use curriculum_core::model::{Answers, BatchId, QuestionDraft};
use serde::Deserialize;
use services::content::parse::validate_questions;
use services::{BatchOverview, Clock, EngineServices, RemediationOutcome, RemediationStatus};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { name: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidBatchId { raw: String },
    InvalidIndex { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { name } => write!(f, "missing <{name}>"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::InvalidBatchId { raw } => write!(f, "invalid --batch-id value: {raw}"),
            ArgsError::InvalidIndex { raw } => write!(f, "invalid index: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
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

fn parse_index(raw: &str) -> Result<usize, ArgsError> {
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidIndex { raw: raw.to_owned() })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Status,
    CompleteTopic { chapter: usize, topic: usize },
    CompleteAssignment { chapter: usize },
    GenerateTest { chapter: usize },
    SubmitTest { chapter: usize, file: PathBuf },
    Remediate { chapter: usize },
    Certificate,
}

impl Command {
    fn parse(name: &str, positional: &[String]) -> Result<Self, ArgsError> {
        let arg = |i: usize, name: &'static str| {
            positional
                .get(i)
                .map(String::as_str)
                .ok_or(ArgsError::MissingArgument { name })
        };
        Ok(match name {
            "status" => Self::Status,
            "complete-topic" => Self::CompleteTopic {
                chapter: parse_index(arg(0, "chapter")?)?,
                topic: parse_index(arg(1, "topic")?)?,
            },
            "complete-assignment" => Self::CompleteAssignment {
                chapter: parse_index(arg(0, "chapter")?)?,
            },
            "generate-test" => Self::GenerateTest {
                chapter: parse_index(arg(0, "chapter")?)?,
            },
            "submit-test" => Self::SubmitTest {
                chapter: parse_index(arg(0, "chapter")?)?,
                file: PathBuf::from(arg(1, "file")?),
            },
            "remediate" => Self::Remediate {
                chapter: parse_index(arg(0, "chapter")?)?,
            },
            "certificate" => Self::Certificate,
            other => return Err(ArgsError::UnknownCommand(other.to_owned())),
        })
    }
}

struct Args {
    db_url: String,
    batch_id: BatchId,
    command: Command,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [--db <sqlite_url>] [--batch-id <id>] <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  status                              Chapter states and progress (default)");
    eprintln!("  complete-topic <chapter> <topic>    Mark a topic completed");
    eprintln!("  complete-assignment <chapter>       Mark a chapter's assignment completed");
    eprintln!("  generate-test <chapter>             Print generated questions as JSON");
    eprintln!("  submit-test <chapter> <file.json>   Grade {{\"questions\": [...], \"answers\": {{...}}}}");
    eprintln!("  remediate <chapter>                 Retry remediation for a chapter");
    eprintln!("  certificate                         Check certificate eligibility");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:curriculum.sqlite3");
    eprintln!("  --batch-id 1");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  CURRICULUM_DB_URL, CURRICULUM_BATCH_ID, CURRICULUM_AI_API_KEY,");
    eprintln!("  CURRICULUM_AI_BASE_URL, CURRICULUM_AI_MODEL, CURRICULUM_REMEDIATION_TIMEOUT_SECS,");
    eprintln!("  RUST_LOG");
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = normalize_sqlite_url(
            std::env::var("CURRICULUM_DB_URL")
                .unwrap_or_else(|_| "sqlite:curriculum.sqlite3".into()),
        );
        let mut batch_id = std::env::var("CURRICULUM_BATCH_ID")
            .ok()
            .and_then(|value| value.parse::<BatchId>().ok())
            .unwrap_or_else(|| BatchId::new(1));
        let mut positional = Vec::new();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--batch-id" => {
                    let value = require_value(&mut args, "--batch-id")?;
                    batch_id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidBatchId { raw: value.clone() })?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positional.push(arg),
            }
        }

        let command = match positional.split_first() {
            None => Command::Status,
            Some((name, rest)) => Command::parse(name, rest)?,
        };
        Ok(Self {
            db_url,
            batch_id,
            command,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

/// Contents of a `submit-test` file.
#[derive(Debug, Deserialize)]
struct TestFile {
    questions: Vec<QuestionDraft>,
    #[serde(default)]
    answers: Answers,
}

fn print_overview(overview: &BatchOverview) {
    println!(
        "Batch {} ({}): {}% complete, {}/{} chapters",
        overview.batch_id,
        overview.title,
        overview.progress_percent,
        overview.completed_chapters,
        overview.total_chapters
    );
    for chapter in &overview.chapters {
        let marker = match chapter.parent_chapter_index {
            Some(parent) => format!(" [remediation for {parent}]"),
            None if chapter.is_test_gate => " [gate]".to_owned(),
            None => String::new(),
        };
        let score = chapter
            .test_score
            .map_or_else(String::new, |s| format!(", score {s}"));
        let assignment = match chapter.assignment_completed {
            Some(false) => ", assignment open",
            _ => "",
        };
        println!(
            "  {:>2}. {}{marker}: {} ({}/{} topics{score}{assignment})",
            chapter.index,
            chapter.title,
            chapter.state.as_str(),
            chapter.completed_topics,
            chapter.total_topics,
        );
    }
    println!(
        "Certificate: {}",
        if overview.certificate_eligible {
            "eligible"
        } else {
            "not yet"
        }
    );
}

fn describe_remediation(outcome: &RemediationOutcome) -> String {
    match outcome {
        RemediationOutcome::NotNeeded => "no remediation needed".to_owned(),
        RemediationOutcome::AlreadyRemediated { chapter_index } => {
            format!("remediation already available as chapter {chapter_index}")
        }
        RemediationOutcome::Appended {
            chapter_index,
            concepts,
        } => format!(
            "added remediation chapter {chapter_index} covering: {}",
            concepts.join(", ")
        ),
    }
}

async fn execute(
    engine: &EngineServices,
    batch_id: BatchId,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Status => {
            print_overview(&engine.gates().overview(batch_id).await?);
        }
        Command::CompleteTopic { chapter, topic } => {
            let batch = engine
                .progress()
                .mark_topic_completed(batch_id, chapter, topic)
                .await?;
            println!("Topic completed. Batch progress: {}%", batch.progress_percent());
        }
        Command::CompleteAssignment { chapter } => {
            engine
                .progress()
                .mark_assignment_completed(batch_id, chapter)
                .await?;
            println!("Assignment for chapter {chapter} completed.");
        }
        Command::GenerateTest { chapter } => {
            let questions = engine.assessment().generate_test(batch_id, chapter).await?;
            println!("{}", serde_json::to_string_pretty(&questions)?);
        }
        Command::SubmitTest { chapter, file } => {
            let raw = std::fs::read_to_string(&file)?;
            let test: TestFile = serde_json::from_str(&raw)?;
            let questions = validate_questions(test.questions);
            let submission = engine
                .assessment()
                .submit_test(batch_id, chapter, &questions, &test.answers)
                .await?;

            println!(
                "Score {} ({}/{} correct), {}",
                submission.result.score(),
                submission.result.correct_answers(),
                submission.result.total_questions(),
                if submission.passed { "passed" } else { "below passing" }
            );
            if !submission.result.concepts_to_review().is_empty() {
                let concepts: Vec<_> = submission
                    .result
                    .concepts_to_review()
                    .iter()
                    .map(String::as_str)
                    .collect();
                println!("Concepts to review: {}", concepts.join(", "));
            }
            match submission.remediation {
                RemediationStatus::Done(outcome) => println!("{}", describe_remediation(&outcome)),
                RemediationStatus::Deferred(err) => {
                    tracing::warn!(error = %err, "remediation deferred");
                    println!(
                        "Could not generate remediation content ({err}); retry with `remediate {chapter}`."
                    );
                }
            }
        }
        Command::Remediate { chapter } => {
            let outcome = engine.remediation().remediate(batch_id, chapter).await?;
            println!("{}", describe_remediation(&outcome));
        }
        Command::Certificate => {
            let eligible = engine
                .gates()
                .is_eligible_for_certificate(batch_id)
                .await?;
            println!("{}", if eligible { "eligible" } else { "not eligible" });
        }
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    prepare_sqlite_file(&args.db_url)?;
    let engine = EngineServices::new_sqlite(&args.db_url, Clock::default()).await?;
    tracing::debug!(
        db_url = %args.db_url,
        batch_id = %args.batch_id,
        command = ?args.command,
        "running command"
    );
    execute(&engine, args.batch_id, args.command).await
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
