mod ai;
mod analyzer;
mod cards;
mod config;
mod customizer;
mod description;
mod documents;
mod fetcher;
mod filter;
mod mirror;
mod models;
mod scoring;
mod sheet;
mod sync;
mod tracker;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use config::{Config, StoreConfig};
use customizer::Customizer;
use fetcher::{HttpSource, JobBoard, SearchQuery};
use filter::KeywordFilter;
use mirror::JsonMirror;
use models::{COL_COMPANY, COL_LOCATION, COL_MATCH_SCORE, COL_STATUS, COL_TITLE, JobStatus};
use sheet::{SqliteSheet, TableStore};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "jobtrack")]
#[command(about = "Track job listings and prepare tailored applications")]
struct Cli {
    /// SQLite file holding the tracking sheet
    #[arg(long, global = true)]
    sheet_db: Option<PathBuf>,

    /// Worksheet name inside the sheet database
    #[arg(long, global = true)]
    sheet_name: Option<String>,

    /// Model for analysis and cover letters (gpt-4o-mini, gpt-4o, haiku, sonnet)
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the job board and record new listings
    Scrape {
        /// Search keywords
        #[arg(short, long, default_value = "product manager")]
        keywords: String,

        /// Location filter, empty for all locations; only the first one is sent
        #[arg(short, long)]
        location: Vec<String>,

        /// Number of listings to collect
        #[arg(short, long, default_value = "50")]
        count: usize,

        /// Fetch the full description of every matching listing
        #[arg(long)]
        with_descriptions: bool,

        /// Only write the JSON mirror, never the sheet
        #[arg(long)]
        json_only: bool,

        /// Path of the JSON mirror
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fetch descriptions for stored listings that have none
    Describe {
        /// Maximum number of rows to fill
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Score new listings against the master resume and write documents
    Customize {
        /// Master resume file
        #[arg(short, long)]
        resume: Option<PathBuf>,

        /// Folder for generated documents
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Minimum match score to prepare documents
        #[arg(long)]
        min_score: Option<u32>,

        /// Maximum listings to process in this run
        #[arg(long)]
        max_jobs: Option<usize>,
    },

    /// List tracked listings
    List {
        /// Filter by status (new, resume ready, applied, ...)
        #[arg(short, long)]
        status: Option<String>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jobtrack=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(path) = cli.sheet_db {
        config.store.sheet_db = Some(path);
    }
    if let Some(name) = cli.sheet_name {
        config.store.sheet_name = name;
    }
    if let Some(model) = cli.model {
        config.ai.model = model;
    }

    match cli.command {
        Commands::Scrape {
            keywords,
            location,
            count,
            with_descriptions,
            json_only,
            output,
        } => {
            if json_only {
                config.store.sheet_db = None;
            }
            if let Some(path) = output {
                config.store.json_mirror = path;
            }
            if location.len() > 1 {
                warn!("Only the first location is searched: {}", location[0]);
            }

            let board = JobBoard::new(HttpSource::new(&config.fetch)?, config.fetch.clone());
            let mut sheet = open_sheet(&config.store);
            let mirror = JsonMirror::new(&config.store.json_mirror);
            let options = tracker::ScrapeOptions {
                query: SearchQuery {
                    keywords,
                    location: location.into_iter().next(),
                    count,
                },
                with_descriptions,
            };

            let summary = tracker::run_scrape(
                &board,
                &KeywordFilter::product_management(),
                &options,
                sheet.as_mut().map(|s| s as &mut dyn TableStore),
                Some(&mirror),
            );

            println!("\nResults:");
            println!(
                "  Cards found:     {} on {} page(s), stopped: {:?}",
                summary.cards, summary.pages, summary.stop
            );
            println!("  Parsed listings: {}", summary.extracted);
            println!("  Matching roles:  {}", summary.matched);
            if with_descriptions {
                println!("  Descriptions:    {}", summary.described);
            }
            match &summary.sync {
                Some(report) => println!(
                    "  Sheet:           {} new, {} already tracked",
                    report.appended, report.duplicates
                ),
                None => println!("  Sheet:           not updated"),
            }
            match &summary.mirror {
                Some(report) => println!(
                    "  JSON mirror:     {} new, {} total ({})",
                    report.added,
                    report.total,
                    mirror.path().display()
                ),
                None => println!("  JSON mirror:     not saved"),
            }
        }

        Commands::Describe { limit } => {
            let mut sheet = require_sheet(&config.store)?;
            let board = JobBoard::new(HttpSource::new(&config.fetch)?, config.fetch.clone());
            let summary = tracker::run_describe(&board, &mut sheet, limit)?;
            println!(
                "Filled {} of {} descriptions ({} not found, {} failed)",
                summary.updated, summary.pending, summary.missing, summary.failed
            );
        }

        Commands::Customize {
            resume,
            output_dir,
            min_score,
            max_jobs,
        } => {
            if let Some(path) = resume {
                config.customize.master_resume = path;
            }
            if let Some(dir) = output_dir {
                config.customize.output_dir = dir;
            }
            if let Some(score) = min_score {
                config.customize.min_match_score = score;
            }
            if let Some(max) = max_jobs {
                config.customize.max_jobs_per_run = max;
            }
            if !config.customize.master_resume.exists() {
                return Err(anyhow!(
                    "Master resume not found: {}",
                    config.customize.master_resume.display()
                ));
            }

            let mut sheet = require_sheet(&config.store)?;
            let board = JobBoard::new(HttpSource::new(&config.fetch)?, config.fetch.clone());
            let generator = ai::from_config(&config.ai);

            let summary =
                Customizer::new(&config.customize, &board, &mut sheet, generator.as_deref())
                    .run()?;
            println!(
                "Processed {} out of {} jobs ({} skipped, {} failed)",
                summary.processed, summary.candidates, summary.skipped, summary.failed
            );
            println!("Cover letters written: {}", summary.cover_letters);
            println!("Output folder: {}", config.customize.output_dir.display());
        }

        Commands::List { status } => {
            let sheet = require_sheet(&config.store)?;
            let wanted = status.as_deref().map(JobStatus::from);
            let rows: Vec<_> = sheet
                .get_all_records()?
                .into_iter()
                .filter(|r| {
                    wanted
                        .as_ref()
                        .is_none_or(|w| JobStatus::from(r.get(COL_STATUS)) == *w)
                })
                .collect();

            if rows.is_empty() {
                println!("No jobs found.");
            } else {
                println!(
                    "{:<5} {:<13} {:<30} {:<20} {:<20} {:>6}",
                    "ROW", "STATUS", "TITLE", "COMPANY", "LOCATION", "SCORE"
                );
                println!("{}", "-".repeat(99));
                for row in &rows {
                    println!(
                        "{:<5} {:<13} {:<30} {:<20} {:<20} {:>6}",
                        row.row,
                        truncate(row.get(COL_STATUS), 13),
                        truncate(row.get(COL_TITLE), 30),
                        truncate(row.get(COL_COMPANY), 20),
                        truncate(row.get(COL_LOCATION), 20),
                        row.get(COL_MATCH_SCORE)
                    );
                }
                println!("\n{} job(s)", rows.len());
            }
        }
    }

    Ok(())
}

/// The configured sheet, or `None` (logged) when it is disabled or cannot be
/// opened; discovery then falls back to the JSON mirror alone.
fn open_sheet(store: &StoreConfig) -> Option<SqliteSheet> {
    let path = store.sheet_db.as_ref()?;
    match SqliteSheet::open(path, &store.sheet_name) {
        Ok(sheet) => {
            info!(
                "Using sheet '{}' in {}",
                sheet.name(),
                sheet.path().unwrap_or(path.as_path()).display()
            );
            Some(sheet)
        }
        Err(e) => {
            warn!("Sheet unavailable, continuing without it: {}", e);
            None
        }
    }
}

fn require_sheet(store: &StoreConfig) -> Result<SqliteSheet> {
    let path = store
        .sheet_db
        .as_ref()
        .context("No sheet database configured")?;
    SqliteSheet::open(path, &store.sheet_name)
        .with_context(|| format!("Failed to open sheet database {}", path.display()))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
