/// Built-in loader for UCSC liftover chain files
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use loki_core::{Build, Chromosome};
use regex::Regex;
use tracing::{debug, info};

use super::loader::SourceLoader;
use super::options::{LoaderOptions, OptionError, OptionSpec, SourceOptions};
use super::records::ChainRecord;
use super::writer::SourceWriter;
use crate::liftover::ChainSegment;

const VERSION: &str = "2.0";

static CHAIN_FILE_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

fn chain_file_pattern() -> Option<&'static Regex> {
    CHAIN_FILE_PATTERN
        .get_or_init(|| Regex::new(r"(?i)^hg(\d+)tohg(\d+)\.over\.chain(\.gz)?$").ok())
        .as_ref()
}

/// Parse the build pair out of `hg18ToHg19.over.chain.gz`
pub fn chain_file_builds(file_name: &str) -> Option<(Build, Build)> {
    let caps = chain_file_pattern()?.captures(file_name)?;
    let old = caps.get(1)?.as_str().parse().ok()?;
    let new = caps.get(2)?.as_str().parse().ok()?;
    Some((Build(old), Build(new)))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainFileOptions {
    /// Local directory holding `.over.chain` files to copy in
    pub mirror: Option<PathBuf>,
}

impl LoaderOptions for ChainFileOptions {
    fn specs() -> Vec<OptionSpec> {
        vec![OptionSpec::new(
            "mirror",
            "local directory containing hg<OLD>ToHg<NEW>.over.chain[.gz] files",
        )]
    }

    fn parse(options: &SourceOptions) -> Result<Self, OptionError> {
        options.reject_unknown(&Self::specs())?;
        let mirror = match options.get("mirror") {
            Some(value) if value.trim().is_empty() => {
                return Err(OptionError::invalid("mirror", value, "path must not be empty"))
            }
            Some(value) => Some(PathBuf::from(value.trim())),
            None => None,
        };
        Ok(Self { mirror })
    }
}

/// A parsed chain with its gap-free blocks
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedChain {
    pub record: ChainRecord,
    pub segments: Vec<ChainSegment>,
}

#[derive(Debug, Default)]
pub struct ChainFileSource;

impl ChainFileSource {
    pub fn new() -> Self {
        Self
    }

    fn chain_files(workdir: &Path) -> Result<Vec<(PathBuf, Build, Build)>> {
        let mut files = Vec::new();
        if !workdir.exists() {
            return Ok(files);
        }
        for entry in fs::read_dir(workdir)? {
            let path = entry?.path();
            let builds = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(chain_file_builds);
            if let Some((old, new)) = builds {
                files.push((path, old, new));
            }
        }
        files.sort();
        Ok(files)
    }
}

impl SourceLoader for ChainFileSource {
    fn name(&self) -> &str {
        "chainfiles"
    }

    fn version(&self) -> String {
        VERSION.to_string()
    }

    fn options(&self) -> Vec<OptionSpec> {
        ChainFileOptions::specs()
    }

    fn validate(&self, options: &SourceOptions) -> Result<(), OptionError> {
        ChainFileOptions::parse(options).map(|_| ())
    }

    fn download(&self, options: &SourceOptions, workdir: &Path) -> Result<()> {
        let options = ChainFileOptions::parse(options)?;
        let Some(mirror) = options.mirror else {
            debug!("No chain mirror configured, using cached files only");
            return Ok(());
        };
        fs::create_dir_all(workdir)?;
        let mut copied = 0;
        for (path, _, _) in Self::chain_files(&mirror)
            .with_context(|| format!("Failed to list chain mirror {}", mirror.display()))?
        {
            let Some(name) = path.file_name() else { continue };
            fs::copy(&path, workdir.join(name))
                .with_context(|| format!("Failed to copy {}", path.display()))?;
            copied += 1;
        }
        info!("Copied {} chain files from {}", copied, mirror.display());
        Ok(())
    }

    fn transform(
        &self,
        _options: &SourceOptions,
        workdir: &Path,
        writer: &mut SourceWriter<'_>,
    ) -> Result<()> {
        writer.delete_all()?;

        for (path, old_build, new_build) in Self::chain_files(workdir)? {
            let chains = parse_chain_file(open_chain_file(&path)?)
                .with_context(|| format!("Failed to parse {}", path.display()))?;

            let records: Vec<ChainRecord> = chains.iter().map(|c| c.record).collect();
            let ids = writer.add_chains(old_build, new_build, &records)?;
            let segments: Vec<_> = ids
                .iter()
                .zip(&chains)
                .flat_map(|(id, chain)| chain.segments.iter().map(move |s| (*id, *s)))
                .collect();
            writer.add_chain_segments(&segments)?;

            info!(
                "{} -> {}: {} chains, {} segments",
                old_build,
                new_build,
                ids.len(),
                segments.len()
            );
        }
        Ok(())
    }
}

fn open_chain_file(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    if path.extension().and_then(|s| s.to_str()) == Some("gz") {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn field<T: std::str::FromStr>(fields: &[&str], index: usize, line_no: usize) -> Result<T> {
    let raw = fields
        .get(index)
        .with_context(|| format!("line {}: missing field {}", line_no, index))?;
    raw.parse()
        .map_err(|_| anyhow::anyhow!("line {}: invalid value '{}'", line_no, raw))
}

/// Chain being read: header plus alignment cursors (0-based, as in the file)
struct PendingChain {
    record: Option<ChainRecord>,
    segments: Vec<ChainSegment>,
    t_pos: i64,
    q_pos: i64,
    q_size: i64,
}

impl PendingChain {
    fn finish(self, chains: &mut Vec<ParsedChain>) {
        if let Some(record) = self.record {
            chains.push(ParsedChain {
                record,
                segments: self.segments,
            });
        }
    }
}

fn parse_header(fields: &[&str], line_no: usize) -> Result<PendingChain> {
    if fields.len() < 12 {
        bail!("line {}: truncated chain header", line_no);
    }
    let score: f64 = field(fields, 1, line_no)?;
    let t_start: i64 = field(fields, 5, line_no)?;
    let t_end: i64 = field(fields, 6, line_no)?;
    let q_size: i64 = field(fields, 8, line_no)?;
    let q_start: i64 = field(fields, 10, line_no)?;
    let q_end: i64 = field(fields, 11, line_no)?;
    if fields[4] != "+" {
        bail!("line {}: reference strand must be '+'", line_no);
    }
    let is_forward = match fields[9] {
        "+" => true,
        "-" => false,
        other => bail!("line {}: invalid strand '{}'", line_no, other),
    };

    let record = match (fields[2].parse::<Chromosome>(), fields[7].parse::<Chromosome>()) {
        (Ok(old_chr), Ok(new_chr)) => {
            let (new_start, new_end) = if is_forward {
                (q_start + 1, q_end)
            } else {
                (q_size - q_start, q_size - q_end + 1)
            };
            Some(ChainRecord {
                old_chr,
                old_start: t_start + 1,
                old_end: t_end,
                new_chr,
                new_start,
                new_end,
                score: score as i64,
                is_forward,
            })
        }
        _ => {
            debug!("Skipping chain {} -> {}", fields[2], fields[7]);
            None
        }
    };

    Ok(PendingChain {
        record,
        segments: Vec::new(),
        t_pos: t_start,
        q_pos: q_start,
        q_size,
    })
}

/// Parse UCSC chain format into 1-based closed chains
///
/// Chains on chromosomes outside the stored set (unplaced contigs, haplotypes)
/// are skipped.
pub fn parse_chain_file<R: BufRead>(reader: R) -> Result<Vec<ParsedChain>> {
    let mut chains = Vec::new();
    let mut current: Option<PendingChain> = None;

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line?;
        let fields: Vec<&str> = line.split_whitespace().collect();

        if fields.is_empty() {
            if let Some(pending) = current.take() {
                pending.finish(&mut chains);
            }
            continue;
        }

        if fields[0] == "chain" {
            if let Some(pending) = current.take() {
                pending.finish(&mut chains);
            }
            current = Some(parse_header(&fields, line_no)?);
            continue;
        }

        let Some(pending) = current.as_mut() else {
            bail!("line {}: alignment data outside a chain", line_no);
        };
        let size: i64 = field(&fields, 0, line_no)?;
        if let Some(record) = &pending.record {
            let new_start = if record.is_forward {
                pending.q_pos + 1
            } else {
                pending.q_size - pending.q_pos
            };
            pending
                .segments
                .push(ChainSegment::new(pending.t_pos + 1, pending.t_pos + size, new_start));
        }
        let (dt, dq) = if fields.len() >= 3 {
            (field::<i64>(&fields, 1, line_no)?, field::<i64>(&fields, 2, line_no)?)
        } else {
            (0, 0)
        };
        pending.t_pos += size + dt;
        pending.q_pos += size + dq;
    }

    if let Some(pending) = current.take() {
        pending.finish(&mut chains);
    }
    Ok(chains)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;
    use test_case::test_case;

    const SAMPLE: &str = "\
chain 5000 chr1 1000 + 10 120 chr1 2000 + 500 615 1
50 10 15
50

chain 300 chr1 1000 + 0 20 chr2 100 - 10 30 2
20

chain 10 chr1_gl000191_random 500 + 0 10 chr1 500 + 0 10 3
10
";

    #[test_case("hg18ToHg19.over.chain", Some((18, 19)))]
    #[test_case("hg19ToHg38.over.chain.gz", Some((19, 38)))]
    #[test_case("HG19TOHG38.OVER.CHAIN", Some((19, 38)))]
    #[test_case("hg19ToHg38.over.chain.bz2", None)]
    #[test_case("readme.txt", None)]
    fn test_chain_file_builds(name: &str, expected: Option<(u32, u32)>) {
        assert_eq!(
            chain_file_builds(name),
            expected.map(|(a, b)| (Build(a), Build(b)))
        );
    }

    #[test]
    fn test_parse_forward_chain() {
        let chains = parse_chain_file(Cursor::new(SAMPLE)).unwrap();
        assert_eq!(chains.len(), 2);

        let first = &chains[0];
        assert_eq!(first.record.old_start, 11);
        assert_eq!(first.record.old_end, 120);
        assert_eq!(first.record.new_start, 501);
        assert!(first.record.is_forward);
        assert_eq!(
            first.segments,
            vec![
                ChainSegment::new(11, 60, 501),
                ChainSegment::new(71, 120, 566),
            ]
        );
    }

    #[test]
    fn test_parse_reverse_chain() {
        let chains = parse_chain_file(Cursor::new(SAMPLE)).unwrap();
        let reverse = &chains[1];

        assert!(!reverse.record.is_forward);
        assert_eq!(reverse.record.new_chr, "chr2".parse::<Chromosome>().unwrap());
        assert_eq!(reverse.record.new_start, 90);
        assert_eq!(reverse.record.new_end, 71);
        assert_eq!(reverse.segments, vec![ChainSegment::new(1, 20, 90)]);
    }

    #[test]
    fn test_parse_rejects_orphan_data() {
        assert!(parse_chain_file(Cursor::new("50 10 10\n")).is_err());
    }

    #[test]
    fn test_options() {
        let options = SourceOptions::new().with("mirror", "/data/chains");
        assert_eq!(
            ChainFileOptions::parse(&options).unwrap().mirror,
            Some(PathBuf::from("/data/chains"))
        );

        let err = ChainFileOptions::parse(&SourceOptions::new().with("url", "x")).unwrap_err();
        assert_eq!(err.option(), "url");
    }
}
