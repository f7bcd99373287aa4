#![forbid(unsafe_code)]

mod db;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use course_core::model::{Chapter, ChapterId, CourseId, CourseOutline, LearnerId};
use services::{AppServices, Clock, RetryPolicy};
use storage::repository::CourseCatalog;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_DB_URL: &str = "sqlite://courses.sqlite3";

#[derive(Debug, Parser)]
#[command(name = "course-progress", version, about = "Course progress and badge tracker")]
struct Cli {
    /// SQLite database URL or path.
    #[arg(long, global = true, env = "COURSE_DB_URL", default_value = DEFAULT_DB_URL)]
    db: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Publish a course with `chapters` sequential chapters, replacing any previous outline.
    Seed {
        #[arg(long)]
        course: CourseId,
        #[arg(long, default_value_t = 3)]
        chapters: u64,
    },
    /// List published courses.
    Courses,
    /// Print a course outline in order.
    Outline {
        #[arg(long)]
        course: CourseId,
    },
    /// Show a learner's progress through a course.
    Progress {
        #[arg(long, env = "COURSE_LEARNER_ID")]
        learner: LearnerId,
        #[arg(long)]
        course: CourseId,
        #[arg(long)]
        json: bool,
    },
    /// Mark a chapter complete.
    Complete {
        #[arg(long, env = "COURSE_LEARNER_ID")]
        learner: LearnerId,
        #[arg(long)]
        course: CourseId,
        #[arg(long)]
        chapter: ChapterId,
        /// Retries on transient store failures.
        #[arg(long, default_value_t = 3)]
        retries: u32,
    },
    /// List badges a learner has earned.
    Badges {
        #[arg(long, env = "COURSE_LEARNER_ID")]
        learner: LearnerId,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn seeded_outline(course: CourseId, chapters: u64) -> Result<CourseOutline> {
    if chapters == 0 {
        bail!("a seeded course needs at least one chapter");
    }
    let chapters = (1..=chapters)
        .map(|n| {
            let order = u32::try_from(n).context("too many chapters")?;
            Ok(Chapter::new(
                ChapterId::new(n),
                course,
                format!("Chapter {n}"),
                order,
            )?)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(CourseOutline::new(course, chapters)?)
}

async fn run(cli: Cli) -> Result<()> {
    let db_url = db::normalize_sqlite_url(&cli.db);
    db::prepare_sqlite_file(&db_url)?;
    let app = AppServices::new_sqlite(&db_url, Clock::System)
        .await
        .with_context(|| format!("opening {db_url}"))?;

    match cli.command {
        Command::Seed { course, chapters } => {
            let outline = seeded_outline(course, chapters)?;
            app.catalog().put_outline(&outline).await?;
            info!(course_id = %course, chapters = outline.len(), "course published");
            println!("published course {course} with {} chapters", outline.len());
        }
        Command::Courses => {
            for course in app.catalog().list_courses().await? {
                println!("{course}");
            }
        }
        Command::Outline { course } => {
            let Some(outline) = app.catalog().outline(course).await? else {
                bail!("course {course} not found");
            };
            for chapter in outline.chapters() {
                println!(
                    "{:>3}  #{:<6} {}",
                    chapter.order_index(),
                    chapter.id(),
                    chapter.title()
                );
            }
        }
        Command::Progress {
            learner,
            course,
            json,
        } => {
            let snapshot = app.progress().progress(learner, course).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                println!("course {course}: {}% complete", snapshot.percentage());
                for entry in snapshot.chapters() {
                    println!(
                        "  [{:<9}] #{:<6} {}",
                        entry.state.as_str(),
                        entry.chapter.id(),
                        entry.chapter.title()
                    );
                }
                match snapshot.next_chapter() {
                    Some(next) => println!("next: #{} {}", next.id(), next.title()),
                    None if snapshot.is_course_complete() => println!("course complete"),
                    None => {}
                }
            }
        }
        Command::Complete {
            learner,
            course,
            chapter,
            retries,
        } => {
            let policy = RetryPolicy {
                max_retries: retries,
                ..RetryPolicy::default()
            };
            let progress = app.progress();
            let outcome = progress
                .complete_chapter_with_retry(learner, course, chapter, policy)
                .await?;
            let completed_at = progress
                .completion(learner, course, chapter)
                .await?
                .map(|record| record.completed_at.to_rfc3339());
            let report = serde_json::json!({
                "percentage": outcome.percentage,
                "badge_issued": outcome.badge_issued,
                "completed_at": completed_at,
            });
            println!("{report}");
        }
        Command::Badges { learner } => {
            for badge in app.progress().badges(learner).await? {
                println!("course {}  earned {}", badge.course_id, badge.earned_at.to_rfc3339());
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    run(Cli::parse()).await
}
