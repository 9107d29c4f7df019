/// File fingerprints and the change check that lets a source skip reprocessing
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use loki_core::SourceId;
use loki_storage::rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};

use crate::sources::SourceOptions;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFingerprint {
    pub filename: String,
    pub size: u64,
    /// `YYYY-MM-DD HH:MM:SS` UTC, informational only
    pub modified: String,
    pub checksum: String,
}

pub fn fingerprint_file(path: &Path) -> Result<FileFingerprint> {
    let metadata = fs::metadata(path)
        .with_context(|| format!("Failed to stat {}", path.display()))?;
    let modified = metadata
        .modified()
        .map(|time| DateTime::<Utc>::from(time).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();

    let mut file = File::open(path)
        .with_context(|| format!("Failed to open {} for checksum", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0; 8192];
    loop {
        let bytes_read = file
            .read(&mut buffer)
            .with_context(|| format!("Failed to read {} for checksum", path.display()))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(FileFingerprint {
        filename: path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        size: metadata.len(),
        modified,
        checksum: hex::encode(hasher.finalize()),
    })
}

/// Fingerprint every regular file directly under `dir`, sorted by name
///
/// A missing directory yields no fingerprints.
pub fn fingerprint_dir(dir: &Path) -> Result<Vec<FileFingerprint>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut fingerprints = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() {
            fingerprints.push(fingerprint_file(&path)?);
        }
    }
    fingerprints.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(fingerprints)
}

/// What was recorded after a source's last successful run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastRun {
    pub updated: Option<String>,
    pub version: Option<String>,
    pub options: BTreeMap<String, String>,
    /// `(filename, size, checksum)`
    pub files: BTreeMap<String, (u64, String)>,
}

impl LastRun {
    pub fn load(conn: &Connection, source_id: SourceId) -> Result<Self> {
        let (updated, version) = conn
            .query_row(
                "SELECT updated, version FROM source WHERE source_id = ?1",
                params![source_id],
                |row| Ok((row.get::<_, Option<String>>(0)?, row.get::<_, Option<String>>(1)?)),
            )
            .optional()?
            .unwrap_or((None, None));

        let mut stmt = conn.prepare("SELECT option, value FROM source_option WHERE source_id = ?1")?;
        let options = stmt
            .query_map(params![source_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<BTreeMap<String, String>, _>>()?;

        let mut stmt =
            conn.prepare("SELECT filename, size, checksum FROM source_file WHERE source_id = ?1")?;
        let files = stmt
            .query_map(params![source_id], |row| {
                Ok((row.get::<_, String>(0)?, (row.get::<_, i64>(1)? as u64, row.get(2)?)))
            })?
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(Self { updated, version, options, files })
    }

    /// True when nothing the source depends on has changed
    ///
    /// A source with no recorded version has never completed and is never
    /// considered unchanged.
    pub fn matches(&self, version: &str, options: &SourceOptions, files: &[FileFingerprint]) -> bool {
        if self.version.as_deref() != Some(version) {
            return false;
        }
        if self.options.len() != options.len()
            || options.iter().any(|(key, value)| self.options.get(key).map(String::as_str) != Some(value))
        {
            return false;
        }
        self.files.len() == files.len()
            && files.iter().all(|file| {
                self.files
                    .get(&file.filename)
                    .is_some_and(|(size, checksum)| *size == file.size && *checksum == file.checksum)
            })
    }
}

/// Store the version, options and file fingerprints of a completed run
pub fn record_run(
    conn: &Connection,
    source_id: SourceId,
    version: &str,
    options: &SourceOptions,
    files: &[FileFingerprint],
) -> Result<()> {
    conn.execute(
        "UPDATE source SET updated = ?2, version = ?3 WHERE source_id = ?1",
        params![source_id, loki_core::generate_utc_timestamp(), version],
    )?;

    conn.execute("DELETE FROM source_option WHERE source_id = ?1", params![source_id])?;
    let mut insert = conn.prepare_cached(
        "INSERT INTO source_option (source_id, option, value) VALUES (?1, ?2, ?3)",
    )?;
    for (option, value) in options.iter() {
        insert.execute(params![source_id, option, value])?;
    }

    conn.execute("DELETE FROM source_file WHERE source_id = ?1", params![source_id])?;
    let mut insert = conn.prepare_cached(
        "INSERT INTO source_file (source_id, filename, size, modified, checksum) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for file in files {
        insert.execute(params![
            source_id,
            file.filename,
            file.size as i64,
            file.modified,
            file.checksum
        ])?;
    }
    Ok(())
}
