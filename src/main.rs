//! # IdeaAvoid CLI (`ideavoid`)
//!
//! Runs the HTTP API and the batch jobs that keep the idea catalog's
//! validation data current.
//!
//! ## Usage
//!
//! ```bash
//! ideavoid --config ./config/ideavoid.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ideavoid serve` | Start the JSON HTTP API |
//! | `ideavoid validate <id>` | Validate one stored idea and print the result |
//! | `ideavoid validate-all` | Validate every idea in batches, checkpointing to disk |
//! | `ideavoid enrich` | Internal-only enrichment for ideas without validation data |
//! | `ideavoid progress` | Show how much of the catalog has been validated |
//! | `ideavoid export <file>` | Write the catalog as a spreadsheet |
//!
//! ## Examples
//!
//! ```bash
//! # Preview enrichment on a handful of ideas without writing
//! ideavoid enrich --sample
//!
//! # Resume a long validation run, internal source only
//! ideavoid validate-all --skip-existing --internal-only
//!
//! # Re-run one idea against live search
//! ideavoid validate 42 --fresh
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use ideavoid::batch::{self, ValidateAllOptions};
use ideavoid::config;
use ideavoid::export;
use ideavoid::progress::ProgressMode;
use ideavoid::repository::{load_document, IdeaRepository};
use ideavoid::server;
use ideavoid::service::ValidationService;
use ideavoid::stats;

/// IdeaAvoid: business idea catalog with market-saturation validation.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults. See
/// `config/ideavoid.example.toml` for every setting.
#[derive(Parser)]
#[command(
    name = "ideavoid",
    about = "IdeaAvoid: business idea catalog with market-saturation validation",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ideavoid.toml")]
    config: PathBuf,

    /// Debug logging.
    #[arg(long, short, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Errors only.
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Batch progress output: off, human, or json. Defaults to human on a
    /// terminal and off otherwise.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server.
    ///
    /// Binds to `[server].bind` and runs until Ctrl-C or SIGTERM, then
    /// closes the headless browser if one was started.
    Serve,

    /// Validate one stored idea and print the result as JSON.
    Validate {
        /// Idea id.
        id: u64,

        /// Skip both caches and search again.
        #[arg(long)]
        fresh: bool,
    },

    /// Validate every idea in batches.
    ///
    /// Writes the ideas file after each batch so an interrupted run can be
    /// resumed with `--skip-existing`.
    ValidateAll {
        /// Only process the first few ideas and write nothing.
        #[arg(long)]
        sample: bool,

        /// Skip ideas that already carry validation and saturation data.
        #[arg(long)]
        skip_existing: bool,

        /// Disable the external search source for this run.
        #[arg(long)]
        internal_only: bool,
    },

    /// Fill in validation data from catalog similarity alone.
    ///
    /// Also assigns a category to ideas that have none.
    Enrich {
        /// Only process the first few ideas and write nothing.
        #[arg(long)]
        sample: bool,
    },

    /// Report validation progress for the ideas file.
    Progress,

    /// Export the catalog as an `.xlsx` spreadsheet.
    Export {
        /// Output file.
        #[arg(default_value = export::FILE_NAME)]
        output: PathBuf,
    },
}

fn init_tracing(quiet: bool, verbose: bool) -> anyhow::Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("IDEAVOID_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    let cfg = config::load_or_default(&cli.config)?;
    let mode = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Validate { id, fresh } => {
            let repository = Arc::new(IdeaRepository::open(&cfg.data.ideas_path)?);
            let service = ValidationService::from_config(&cfg, Arc::clone(&repository))?;
            let catalog = repository.snapshot();
            let idea = catalog
                .get(id)
                .with_context(|| format!("No idea with id {}", id))?;

            let outcome = if fresh {
                service.validate_fresh(idea).await
            } else {
                service.validate(idea).await
            };
            service.aggregator().search().shutdown().await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::ValidateAll {
            sample,
            skip_existing,
            internal_only,
        } => {
            let options = ValidateAllOptions {
                sample,
                skip_existing,
                internal_only,
            };
            batch::run_validate_all(&cfg, options, mode.reporter().as_ref()).await?;
        }
        Commands::Enrich { sample } => {
            batch::run_enrich(&cfg, sample, mode.reporter().as_ref()).await?;
        }
        Commands::Progress => {
            stats::run_progress(&cfg)?;
        }
        Commands::Export { output } => {
            let doc = load_document(&cfg.data.ideas_path)?;
            export::write_workbook(&doc.ideas, &output)?;
        }
    }

    Ok(())
}
