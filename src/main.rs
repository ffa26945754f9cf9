use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

mod config;
mod db;
mod models;
mod platform;
mod progression;
mod report;
mod stats;

use config::Config;
use models::{PlatformStatistics, StudentDashboard};
use progression::SkillLevel;

#[derive(Parser)]
#[command(name = "slopesmaster-stats")]
#[command(about = "Lesson progress and platform statistics for SlopesMaster", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import lessons from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Show lesson statistics for one student
    Student {
        #[arg(long)]
        id: Uuid,
        /// Print the dashboard as JSON
        #[arg(long)]
        json: bool,
    },
    /// Describe a skill level and the one after it
    Level {
        /// Level key, e.g. linking_turns; omit to list every level
        level: Option<String>,
    },
    /// Show platform-wide counts for administrators
    Platform {
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown progress report for one student
    Report {
        #[arg(long)]
        id: Uuid,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(config.database_url()?)
        .await
        .context("failed to connect to Postgres")
}

async fn load_dashboard(
    pool: &PgPool,
    config: &Config,
    student_id: Uuid,
) -> anyhow::Result<StudentDashboard> {
    let level = db::fetch_student_level(pool, student_id).await?;
    let lessons = db::fetch_lessons_for_student(pool, student_id).await?;
    let achievements = db::fetch_achievements_for_student(pool, student_id).await?;
    debug!(
        %student_id,
        lessons = lessons.len(),
        achievements = achievements.len(),
        "aggregating student statistics"
    );

    let statistics = stats::aggregate_student(
        student_id,
        &lessons,
        &achievements,
        level.as_deref(),
        &config.evaluation(Utc::now()),
    )?;

    Ok(StudentDashboard::from_statistics(statistics))
}

fn print_level(raw: &str, config: &Config) -> anyhow::Result<()> {
    let level = progression::resolve_level(raw, config.level_policy)?;
    let info = progression::level_info_for(raw);
    let next = progression::next_level(level);

    println!("{} ({}): {}", info.name, level, info.description);
    if next == level {
        println!("This is the final level.");
    } else {
        println!("Next: {} ({})", progression::level_info(next).name, next);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&config).await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let pool = connect(&config).await?;
            let inserted = db::import_lessons_csv(&pool, &csv).await?;
            info!(inserted, path = %csv.display(), "lesson import finished");
            println!("Inserted {inserted} lessons from {}.", csv.display());
        }
        Commands::Student { id, json } => {
            let pool = connect(&config).await?;
            let dashboard = load_dashboard(&pool, &config, id).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&dashboard)?);
                return Ok(());
            }

            let stats = &dashboard.statistics;
            println!(
                "Level: {} (next: {})",
                dashboard.level.name, dashboard.next_level
            );
            println!(
                "Lessons: {} completed of {} ({:.0}%)",
                stats.completed_lessons,
                stats.total_lessons,
                dashboard.progress_ratio * 100.0
            );
            println!("This month: {}", stats.lessons_this_month);
            println!("Average rating: {:.1}", stats.average_rating);
            println!("Total spent: {}", report::format_cents(stats.total_spent_cents));
            println!("Streak: {}", stats.streak.count);
            println!(
                "Achievements: {} ({} points)",
                stats.total_achievements, stats.total_points
            );
            for favorite in stats.favorite_instructors.iter() {
                println!(
                    "- {} across {} lessons",
                    favorite.instructor_name, favorite.lesson_count
                );
            }
        }
        Commands::Level { level } => match level {
            Some(raw) => print_level(&raw, &config)?,
            None => {
                for level in SkillLevel::ALL {
                    let info = progression::level_info(level);
                    println!("- {} ({}): {}", info.name, level, info.description);
                }
            }
        },
        Commands::Platform { json } => {
            let pool = connect(&config).await?;
            let counts =
                db::fetch_platform_counts(&pool, Utc::now(), config.active_window_days).await?;
            let stats = PlatformStatistics::from_counts(counts);

            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print!(
                    "{}",
                    report::build_platform_summary(&stats, config.active_window_days)
                );
            }
        }
        Commands::Report { id, out } => {
            let pool = connect(&config).await?;
            let dashboard = load_dashboard(&pool, &config, id).await?;
            let report = report::build_student_report(&id.to_string(), Utc::now(), &dashboard);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
