use anyhow::Result;
use clap::Args;
use comfy_table::Cell;
use loki_storage::{catalog, maintenance, settings};

use crate::cli::formatter::{format_number, new_table, print_stats_table, section_header, warning};
use crate::cli::CliContext;

#[derive(Args)]
pub struct InfoArgs {
    /// Include tables with no rows
    #[arg(long)]
    pub all_tables: bool,

    /// Verify the schema and repair drifted indexes
    #[arg(long)]
    pub audit: bool,
}

pub fn run(args: InfoArgs, ctx: &CliContext) -> Result<()> {
    let db = ctx.open_db()?;
    let conn = db.connection();

    section_header(&format!("Knowledge database {}", ctx.db_path.display()));
    let flag = |set: bool| (if set { "yes" } else { "no" }).to_string();
    print_stats_table(
        "Settings",
        vec![
            ("Schema version", settings::get(conn, settings::SCHEMA)?.unwrap_or_default()),
            (
                "Genome build",
                settings::target_build(conn)?.map(|b| b.to_string()).unwrap_or_else(|| "-".to_string()),
            ),
            ("Zone size", settings::get(conn, settings::ZONE_SIZE)?.unwrap_or_default()),
            ("Optimized", flag(settings::is_optimized(conn)?)),
            ("Finalized", flag(settings::is_finalized(conn)?)),
        ],
    );

    let sources = catalog::sources(conn)?;
    if !sources.is_empty() {
        section_header("Sources");
        let mut table = new_table(&["Source", "Version", "Updated", "GRCh", "hg", "Current"]);
        let show = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());
        for source in sources {
            table.add_row(vec![
                Cell::new(&source.name),
                Cell::new(show(source.version)),
                Cell::new(show(source.updated)),
                Cell::new(show(source.grch.map(|g| g.to_string()))),
                Cell::new(show(source.ucschg.map(|b| b.to_string()))),
                Cell::new(show(source.current_ucschg.map(|b| b.to_string()))),
            ]);
        }
        println!("{}", table);
    }

    section_header("Tables");
    let mut table = new_table(&["Table", "Rows"]);
    for (name, rows) in maintenance::row_counts(conn, db.schema())? {
        if rows > 0 || args.all_tables {
            table.add_row(vec![Cell::new(name), Cell::new(format_number(rows))]);
        }
    }
    println!("{}", table);

    if args.audit {
        let audit = db.audit()?;
        if audit.is_clean() {
            println!("Schema matches");
        } else {
            warning(&format!(
                "Schema repaired: {} tables created, {} tables rebuilt, {} indexes created, {} indexes rebuilt",
                audit.tables_created.len(),
                audit.tables_repaired.len(),
                audit.indexes_created.len(),
                audit.indexes_repaired.len()
            ));
        }
    }
    Ok(())
}
