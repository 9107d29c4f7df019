use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use loki_core::{Build, Chromosome, LokiError};

use crate::cli::formatter::{format_number, print_stats_table};
use crate::cli::CliContext;
use crate::liftover::{ChainStore, LiftTally, LiftoverEngine, Region};

#[derive(Args)]
pub struct LiftoverArgs {
    /// Build the regions are in (e.g. hg18)
    #[arg(long, value_name = "BUILD")]
    pub from: Build,

    /// Build to lift to (e.g. hg19)
    #[arg(long, value_name = "BUILD")]
    pub to: Build,

    /// Tab-separated `label chr start end` file
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Lifted regions output (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Where to write regions that could not be lifted (default: stderr)
    #[arg(long, value_name = "FILE")]
    pub unmapped: Option<PathBuf>,

    /// Minimum fraction of a region the chain must cover
    #[arg(long, value_name = "FRACTION")]
    pub min_coverage: Option<f64>,
}

/// Parse one input line; blank lines and `#` comments yield `None`
pub fn parse_region_line(line: &str) -> Result<Option<(String, Region)>, LokiError> {
    let line = line.trim_end();
    if line.trim().is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let fields: Vec<&str> = line.split(['\t', ' ']).filter(|f| !f.is_empty()).collect();
    let [label, chr, start, end] = &fields[..] else {
        return Err(LokiError::Parse(format!("expected 'label chr start end', got '{}'", line)));
    };
    let chr: Chromosome = chr.parse()?;
    let position = |value: &str| {
        value
            .parse::<i64>()
            .map_err(|_| LokiError::Parse(format!("invalid position '{}'", value)))
    };
    Ok(Some((label.to_string(), Region::new(chr, position(start)?, position(end)?))))
}

pub fn run(args: LiftoverArgs, ctx: &CliContext) -> Result<()> {
    let min_coverage = args.min_coverage.unwrap_or(ctx.config.liftover.min_coverage);
    if !(min_coverage > 0.0 && min_coverage <= 1.0) {
        bail!(LokiError::InvalidInput(format!("min coverage must be in (0, 1], got {}", min_coverage)));
    }

    let db = ctx.open_db()?;
    let conn = db.connection();
    if !ChainStore::has_chains(conn, args.from, args.to)? {
        bail!(LokiError::NotFound(format!("chains from {} to {}", args.from, args.to)));
    }
    let chains = ChainStore::new().get_or_load(conn, args.from, args.to)?;
    let engine = LiftoverEngine::new(chains).with_min_coverage(min_coverage);

    let input = File::open(&args.input)
        .with_context(|| format!("Failed to open {}", args.input.display()))?;
    let mut output: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    let mut unmapped: Box<dyn Write> = match &args.unmapped {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stderr()),
    };

    let mut tally = LiftTally::default();
    for (number, line) in BufReader::new(input).lines().enumerate() {
        let line = line?;
        let Some((label, region)) = parse_region_line(&line)
            .with_context(|| format!("{}:{}", args.input.display(), number + 1))?
        else {
            continue;
        };
        match engine.lift(region) {
            Some(lifted) => {
                tally.lifted += 1;
                writeln!(output, "{}\t{}\t{}\t{}", label, lifted.chr, lifted.start, lifted.end)?;
            }
            None => {
                tally.dropped += 1;
                writeln!(unmapped, "{}\t{}\t{}\t{}", label, region.chr, region.start, region.end)?;
            }
        }
    }
    output.flush()?;
    unmapped.flush()?;

    print_stats_table(
        &format!("{} -> {}", args.from, args.to),
        vec![
            ("Lifted", format_number(tally.lifted)),
            ("Unmapped", format_number(tally.dropped)),
        ],
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_region_line() {
        let chr1 = Chromosome::from_code(1).unwrap();
        assert_eq!(
            parse_region_line("rs1\tchr1\t100\t200").unwrap(),
            Some(("rs1".to_string(), Region::new(chr1, 100, 200)))
        );
        assert_eq!(
            parse_region_line("gene  1 5 5").unwrap(),
            Some(("gene".to_string(), Region::point(chr1, 5)))
        );
        assert_eq!(parse_region_line("# header").unwrap(), None);
        assert_eq!(parse_region_line("   ").unwrap(), None);
        assert!(parse_region_line("rs1\tchr1\t100").is_err());
        assert!(parse_region_line("rs1\tchrUn\t1\t2").is_err());
        assert!(parse_region_line("rs1\tchr1\tx\t2").is_err());
    }
}
