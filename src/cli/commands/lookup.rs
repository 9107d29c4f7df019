use anyhow::{Context, Result};
use clap::Args;
use comfy_table::Cell;
use loki_core::Rs;
use loki_storage::catalog;

use crate::cli::formatter::{new_table, section_header, warning};
use crate::cli::CliContext;
use crate::merge::{current_rs, snp_loci_by_rs};
use crate::names::{MatchBounds, NameLookup};

#[derive(Args)]
pub struct LookupArgs {
    /// Namespace to search: a name like `symbol`, `=` for ids, `-` for
    /// labels, `*` for any
    #[arg(short, long, default_value = "*")]
    pub namespace: String,

    /// Only match entities of this type
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub entity_type: Option<String>,

    /// Search groups instead of biopolymers
    #[arg(long, conflicts_with = "rs")]
    pub groups: bool,

    /// Treat inputs as SNP rs numbers and show current ids and loci
    #[arg(long)]
    pub rs: bool,

    /// Names (or rs numbers) to look up
    #[arg(required = true)]
    pub names: Vec<String>,
}

pub fn run(args: LookupArgs, ctx: &CliContext) -> Result<()> {
    let db = ctx.open_db()?;
    let conn = db.connection();

    if args.rs {
        let rses = args
            .names
            .iter()
            .map(|name| {
                let digits = name.trim().trim_start_matches("rs");
                digits.parse::<Rs>().with_context(|| format!("Invalid rs number '{}'", name))
            })
            .collect::<Result<Vec<_>>>()?;
        let (current, tally) = current_rs(conn, &rses)?;
        let currents: Vec<Rs> = current.iter().map(|(_, now)| *now).collect();
        let (loci, _) = snp_loci_by_rs(conn, &currents, MatchBounds::ANY, None, |_, _, _| {})?;

        section_header(&format!("{} merged, {} unchanged", tally.merged, tally.unchanged));
        let mut table = new_table(&["rs", "Current", "Loci"]);
        for ((rs, now), (_, positions)) in current.iter().zip(&loci) {
            let positions: Vec<String> =
                positions.iter().map(|(chr, pos)| format!("{}:{}", chr, pos)).collect();
            table.add_row(vec![
                Cell::new(format!("rs{}", rs)),
                Cell::new(format!("rs{}", now)),
                Cell::new(positions.join(", ")),
            ]);
        }
        println!("{}", table);
        return Ok(());
    }

    let mut lookup = if args.groups {
        NameLookup::groups(conn)
    } else {
        NameLookup::biopolymers(conn)
    };
    if let Some(name) = &args.entity_type {
        let Some(type_id) = catalog::type_id(conn, name)? else {
            warning(&format!("Unknown type '{}'", name));
            return Ok(());
        };
        lookup = lookup.of_type(type_id);
    }

    let queries = args.names.iter().map(|name| (args.namespace.as_str(), name.as_str()));
    let (found, tally) = lookup.lookup_all(queries, MatchBounds::ANY, |_| {})?;

    section_header(&format!(
        "{} unmatched, {} unique, {} ambiguous",
        tally.zero, tally.one, tally.many
    ));
    let mut table = new_table(&["Name", "Matches"]);
    for entry in found {
        let ids: Vec<String> = entry.ids.iter().map(i64::to_string).collect();
        table.add_row(vec![Cell::new(entry.name), Cell::new(ids.join(", "))]);
    }
    println!("{}", table);
    Ok(())
}
