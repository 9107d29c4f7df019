use clap::Parser;
use colored::*;
use loki::cli::commands::{info, liftover, lookup, maintenance, sources, update};
use loki::cli::{Cli, CliContext, Commands};
use loki::LokiError;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    // LOKI_LOG sets the default level; RUST_LOG still wins when present
    let log_level = match cli.verbose {
        0 => std::env::var("LOKI_LOG").unwrap_or_else(|_| "info".to_string()),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(exit_code(&e));
    }
}

fn exit_code(err: &anyhow::Error) -> i32 {
    let loki_error = err.chain().find_map(|cause| cause.downcast_ref::<LokiError>());
    match loki_error {
        Some(LokiError::Configuration(_)) => 2,
        Some(LokiError::Io(_)) => 3,
        Some(LokiError::Parse(_)) | Some(LokiError::InvalidOption { .. }) => 4,
        Some(LokiError::Database(_))
        | Some(LokiError::ReadOnly(_))
        | Some(LokiError::Finalized)
        | Some(LokiError::SchemaMismatch(_)) => 5,
        Some(LokiError::MergeCycle { .. }) | Some(LokiError::MergeHopLimit { .. }) => 6,
        _ => 1,
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let num_threads = if cli.threads == 0 {
        num_cpus::get()
    } else {
        cli.threads
    };
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
        .map_err(|e| anyhow::anyhow!("Failed to initialize thread pool: {}", e))?;
    tracing::debug!("Using {} threads", num_threads);

    let ctx = CliContext::load(cli.config.as_deref(), cli.db)?;
    match cli.command {
        Commands::Update(args) => update::run(args, &ctx),
        Commands::Sources(args) => sources::run(args),
        Commands::Info(args) => info::run(args, &ctx),
        Commands::Liftover(args) => liftover::run(args, &ctx),
        Commands::Lookup(args) => lookup::run(args, &ctx),
        Commands::Finalize => maintenance::finalize(&ctx),
        Commands::Optimize => maintenance::optimize(&ctx),
    }
}
