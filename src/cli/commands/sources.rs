use anyhow::Result;
use clap::Args;
use comfy_table::Cell;
use serde_json::json;

use crate::cli::formatter::{new_table, section_header};
use crate::sources::SourceRegistry;

#[derive(Args)]
pub struct SourcesArgs {
    /// Also list each source's options
    #[arg(long)]
    pub options: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    pub format: String,
}

pub fn run(args: SourcesArgs) -> Result<()> {
    let registry = SourceRegistry::with_builtin();

    if args.format == "json" {
        let listing: Vec<_> = registry
            .loaders()
            .map(|loader| {
                let options: Vec<_> = loader
                    .options()
                    .iter()
                    .map(|spec| json!({"name": spec.name, "description": spec.description, "default": spec.default}))
                    .collect();
                json!({"name": loader.name(), "version": loader.version(), "options": options})
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    section_header(&format!("{} sources available", registry.len()));
    let mut table = new_table(&["Source", "Version", "Options"]);
    for loader in registry.loaders() {
        let specs = loader.options();
        let options = if args.options {
            specs
                .iter()
                .map(|spec| match spec.default {
                    Some(default) => format!("{} = {} ({})", spec.name, default, spec.description),
                    None => format!("{} ({})", spec.name, spec.description),
                })
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            specs.iter().map(|spec| spec.name).collect::<Vec<_>>().join(", ")
        };
        table.add_row(vec![Cell::new(loader.name()), Cell::new(loader.version()), Cell::new(options)]);
    }
    println!("{}", table);
    Ok(())
}
