//! Test environment management
//!
//! Each environment owns a temporary directory holding a knowledge store file
//! and a download cache. Everything is removed when it drops.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use loki::sources::{SourceOptions, SourceRegistry};
use loki::updater::{UpdateOptions, UpdateReport, Updater};
use loki_core::source_work_dir;
use loki_storage::{KnowledgeDb, Schema};
use tempfile::TempDir;

pub struct TestEnvironment {
    temp_dir: TempDir,
    db_path: PathBuf,
    cache_dir: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::with_prefix("loki-test").context("Failed to create temporary directory")?;
        let db_path = temp_dir.path().join("knowledge.db");
        let cache_dir = temp_dir.path().join("cache");
        fs::create_dir_all(&cache_dir)?;
        Ok(Self {
            temp_dir,
            db_path,
            cache_dir,
        })
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Open (creating on first use) the environment's store
    pub fn open_db(&self) -> Result<KnowledgeDb> {
        KnowledgeDb::open(&self.db_path, Schema::knowledge())
    }

    /// Sequential, cache-rooted options so runs are deterministic
    pub fn update_options(&self) -> UpdateOptions {
        UpdateOptions {
            parallel_downloads: false,
            ..UpdateOptions::default().with_cache_dir(&self.cache_dir)
        }
    }

    /// Run one update over every source in `registry`
    pub fn update(&self, registry: &SourceRegistry) -> Result<UpdateReport> {
        self.update_with(registry, self.update_options(), None, &BTreeMap::new())
    }

    pub fn update_with(
        &self,
        registry: &SourceRegistry,
        options: UpdateOptions,
        selected: Option<&[&str]>,
        source_options: &BTreeMap<String, SourceOptions>,
    ) -> Result<UpdateReport> {
        let selected: Option<Vec<String>> =
            selected.map(|names| names.iter().map(|name| name.to_string()).collect());
        let mut db = self.open_db()?;
        Updater::new(registry, options).run(&mut db, selected.as_deref(), source_options)
    }

    /// Work directory the update run hands to `source`
    pub fn source_dir(&self, source: &str) -> PathBuf {
        source_work_dir(&self.cache_dir, source)
    }

    /// Drop a file into a source's work directory, as a download would
    pub fn write_source_file(&self, source: &str, filename: &str, contents: &str) -> Result<PathBuf> {
        let dir = self.source_dir(source);
        fs::create_dir_all(&dir)?;
        let path = dir.join(filename);
        fs::write(&path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Run a scalar query such as `SELECT COUNT() FROM snp_locus`
    pub fn query_i64(&self, sql: &str) -> Result<i64> {
        let db = self.open_db()?;
        let value = db.connection().query_row(sql, [], |row| row.get(0))?;
        Ok(value)
    }

    pub fn count(&self, table: &str) -> Result<i64> {
        self.query_i64(&format!("SELECT COUNT() FROM {}", table))
    }
}
