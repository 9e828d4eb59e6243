//! # PICC CLI (`picc`)
//!
//! ```bash
//! picc --config ./config/picc.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `picc init` | Create the SQLite database and run schema migrations |
//! | `picc sources` | List scrape sources |
//! | `picc source add` / `deactivate` | Manage scrape sources |
//! | `picc scrape [--source ID]` | Scrape all active sources, or one |
//! | `picc search "<query>"` | Lexical catalog search or semantic chunk search |
//! | `picc folder <slug>` | Evaluate a smart folder |
//! | `picc analyze transcript\|image` | AI quote extraction or image description |
//! | `picc quotes` | Review queue of extracted quotes |
//! | `picc embed pending` | Embed chunks that have no vector yet |
//! | `picc stats` | Content counts and recent jobs |
//! | `picc serve` | Start the HTTP API |

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use picc::config;
use picc::search::SearchArgs;
use picc::sqlite_store::SqliteStore;
use picc::{analyze, db, embedding, folders, migrate, quotes, scrape, search, server, sources, stats};
use picc_core::search::StructuredFilters;
use picc_core::store::{QuoteFilter, DEFAULT_QUOTE_LIMIT};

#[derive(Parser)]
#[command(
    name = "picc",
    about = "PICC content hub: scraping, smart folders, search and transcript analysis",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/picc.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// List scrape sources.
    Sources {
        /// Include inactive sources.
        #[arg(long)]
        all: bool,
    },

    /// Manage scrape sources.
    Source {
        #[command(subcommand)]
        action: SourceAction,
    },

    /// Scrape every active source, or a single one.
    Scrape {
        /// Source id to scrape instead of the full batch.
        #[arg(long)]
        source: Option<String>,
    },

    /// Search the catalog (lexical) or scraped chunks (semantic).
    Search {
        query: String,

        /// `lexical` or `semantic`.
        #[arg(long, default_value = "lexical")]
        mode: String,

        /// Entity types to search (repeatable); omit for all.
        #[arg(long = "type")]
        types: Vec<String>,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        date_from: Option<NaiveDate>,

        #[arg(long)]
        date_to: Option<NaiveDate>,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        fiscal_year: Option<String>,

        #[arg(long)]
        record_type: Option<String>,

        #[arg(long)]
        location: Option<String>,

        /// Print the assembled LLM context (semantic mode).
        #[arg(long)]
        context: bool,
    },

    /// Evaluate a smart folder and list matching media.
    Folder { slug: String },

    /// AI analysis.
    Analyze {
        #[command(subcommand)]
        action: AnalyzeAction,
    },

    /// List extracted quotes, newest first.
    Quotes {
        #[arg(long)]
        theme: Option<String>,

        /// Only validated (`true`) or only pending (`false`) quotes.
        #[arg(long)]
        validated: Option<bool>,

        /// Only quotes suggested for the annual report.
        #[arg(long)]
        for_report: bool,

        #[arg(long, default_value_t = DEFAULT_QUOTE_LIMIT)]
        limit: usize,
    },

    /// Embedding management.
    Embed {
        #[command(subcommand)]
        action: EmbedAction,
    },

    /// Content counts and recent scrape jobs.
    Stats,

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum SourceAction {
    /// Register a new active source.
    Add {
        name: String,
        url: String,
        /// website, news, government or research.
        #[arg(long = "type", default_value = "website")]
        source_type: String,
    },
    /// Stop scraping a source.
    Deactivate { id: String },
}

#[derive(Subcommand)]
enum AnalyzeAction {
    /// Extract themes and quotes from a transcript file.
    Transcript {
        file: PathBuf,
        #[arg(long)]
        interview: Option<String>,
        #[arg(long)]
        storyteller: Option<String>,
        #[arg(long)]
        profile: Option<String>,
    },
    /// Describe an image by URL.
    Image {
        url: String,
        /// Media record to attach the analysis to.
        #[arg(long)]
        media: Option<String>,
    },
}

#[derive(Subcommand)]
enum EmbedAction {
    /// Embed chunks that have no vector yet.
    Pending,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    let pool = db::connect(&cfg).await?;
    let store = Arc::new(SqliteStore::new(pool.clone()));

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&pool).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sources { all } => sources::list_sources(store.as_ref(), all).await?,
        Commands::Source { action } => match action {
            SourceAction::Add {
                name,
                url,
                source_type,
            } => sources::add_source(store.as_ref(), &name, &url, &source_type).await?,
            SourceAction::Deactivate { id } => sources::deactivate_source(store.as_ref(), &id).await?,
        },
        Commands::Scrape { source } => {
            scrape::run_scrape(&cfg, store.as_ref(), source.as_deref()).await?
        }
        Commands::Search {
            query,
            mode,
            types,
            limit,
            date_from,
            date_to,
            category,
            fiscal_year,
            record_type,
            location,
            context,
        } => {
            let args = SearchArgs {
                query,
                mode,
                types,
                filters: StructuredFilters {
                    date_from,
                    date_to,
                    category,
                    fiscal_year,
                    record_type,
                    location,
                },
                limit,
                context,
            };
            search::run_search(&cfg, store.as_ref(), &args).await?
        }
        Commands::Folder { slug } => folders::run_folder(store.as_ref(), &slug).await?,
        Commands::Analyze { action } => match action {
            AnalyzeAction::Transcript {
                file,
                interview,
                storyteller,
                profile,
            } => {
                analyze::run_analyze_transcript(&cfg, store.as_ref(), &file, interview, storyteller, profile)
                    .await?
            }
            AnalyzeAction::Image { url, media } => {
                analyze::run_analyze_image(&cfg, store.as_ref(), &url, media).await?
            }
        },
        Commands::Quotes {
            theme,
            validated,
            for_report,
            limit,
        } => {
            let filter = QuoteFilter {
                theme,
                validated,
                suggested_for_report: for_report.then_some(true),
                limit,
            };
            quotes::run_quotes(store.as_ref(), &filter).await?
        }
        Commands::Embed {
            action: EmbedAction::Pending,
        } => embedding::run_embed_pending(&cfg, store.as_ref()).await?,
        Commands::Stats => stats::run_stats(&cfg, store.as_ref()).await?,
        Commands::Serve => server::run_server(&cfg, store.clone()).await?,
    }

    pool.close().await;
    Ok(())
}
