pub mod commands;
pub mod formatter;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use loki_core::{load_config, Config};
use loki_storage::{KnowledgeDb, Schema};
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "loki",
    version,
    about = "Genomic knowledge store: load sources, lift coordinates, resolve names",
    long_about = "Loki loads gene, SNP, pathway and liftover chain data from external sources \
                  into one SQLite knowledge store, keeps every row tagged with its source, and \
                  normalizes the result: merged SNPs carried forward, coordinates lifted to a \
                  single genome build, and names resolved to biopolymers and groups."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Knowledge database file (overrides the config)
    #[arg(long, value_name = "PATH", global = true)]
    pub db: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(short, long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Number of threads to use (0 = all available)
    #[arg(short = 'j', long, default_value = "0", global = true)]
    pub threads: usize,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load or refresh data sources
    Update(commands::update::UpdateArgs),

    /// List the available source loaders
    Sources(commands::sources::SourcesArgs),

    /// Show settings, sources and table sizes
    Info(commands::info::InfoArgs),

    /// Lift regions from one genome build to another
    Liftover(commands::liftover::LiftoverArgs),

    /// Look up biopolymers or groups by name, or SNPs by rs number
    Lookup(commands::lookup::LookupArgs),

    /// Empty staging tables and block further updates
    Finalize,

    /// Analyze and compact the database
    Optimize,
}

/// Settings and store location shared by every command
pub struct CliContext {
    pub config: Config,
    pub db_path: PathBuf,
}

impl CliContext {
    pub fn load(config_path: Option<&Path>, db_path: Option<PathBuf>) -> Result<Self> {
        let config = match config_path {
            Some(path) => load_config(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => Config::default(),
        };
        let db_path = db_path.unwrap_or_else(|| config.database.path.clone());
        Ok(Self { config, db_path })
    }

    pub fn open_db(&self) -> Result<KnowledgeDb> {
        debug!("Opening {}", self.db_path.display());
        KnowledgeDb::open_with_cache(&self.db_path, Schema::knowledge(), self.config.database.cache_size_kib)
    }
}
