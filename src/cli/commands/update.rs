use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use comfy_table::Cell;

use crate::cli::formatter::{failure, format_number, new_table, section_header, stage_cell, success, warning};
use crate::cli::CliContext;
use crate::sources::options::parse_assignment;
use crate::sources::{SourceOptions, SourceRegistry};
use crate::updater::{UpdateOptions, UpdateReport, Updater};

#[derive(Args)]
pub struct UpdateArgs {
    /// Source to update (repeatable; default: all)
    #[arg(short, long = "source", value_name = "NAME")]
    pub sources: Vec<String>,

    /// Source option as SOURCE:KEY=VALUE (repeatable)
    #[arg(short, long = "option", value_name = "SOURCE:KEY=VALUE", value_parser = parse_assignment)]
    pub options: Vec<(String, String, String)>,

    /// Use previously downloaded files only
    #[arg(long)]
    pub cache_only: bool,

    /// Reprocess sources even if nothing changed
    #[arg(long)]
    pub force: bool,

    /// Download cache directory
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,
}

pub fn run(args: UpdateArgs, ctx: &CliContext) -> Result<()> {
    let registry = SourceRegistry::with_builtin();

    let mut options = UpdateOptions::from_config(&ctx.config);
    options.cache_only |= args.cache_only;
    options.force |= args.force;
    if let Some(dir) = args.cache_dir {
        options = options.with_cache_dir(dir);
    }

    // command-line options override the config file's per-source tables
    let mut source_options: BTreeMap<String, SourceOptions> = ctx
        .config
        .sources
        .iter()
        .map(|(name, values)| (name.to_lowercase(), SourceOptions::from(values.clone())))
        .collect();
    for (source, key, value) in args.options {
        source_options
            .entry(source.to_lowercase())
            .or_default()
            .insert(key, value);
    }

    let selected = (!args.sources.is_empty()).then_some(args.sources.as_slice());
    let mut db = ctx.open_db()?;
    let report = Updater::new(&registry, options).run(&mut db, selected, &source_options)?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &UpdateReport) {
    section_header("Update Summary");
    let mut table = new_table(&["Source", "Status", "Files", "Detail"]);
    for source in &report.sources {
        let detail = match (&source.error, &source.last_updated) {
            (Some(error), _) => error.clone(),
            (None, Some(updated)) => format!("unchanged since {}", updated),
            (None, None) => String::new(),
        };
        table.add_row(vec![
            Cell::new(&source.name),
            stage_cell(source.stage),
            Cell::new(format_number(source.files)),
            Cell::new(detail),
        ]);
    }
    println!("{}", table);

    for name in &report.unknown {
        warning(&format!("Unknown source '{}'", name));
    }
    if let Some(builds) = report.cascade.as_ref().and_then(|c| c.builds.as_ref()) {
        for build in &builds.missing_chains {
            warning(&format!("No chains to lift {} data; those sources were left unlifted", build));
        }
    }
    if report.is_success() {
        success("Update complete");
    } else {
        let failed: Vec<&str> = report.failed.iter().map(String::as_str).collect();
        failure(&format!("Some sources failed to update: {}", failed.join(", ")));
    }
}
