/// The update run: validate, download, load each source, then post-process
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use loki_core::{source_work_dir, Config, LokiError};
use loki_storage::rusqlite::{params, Connection};
use loki_storage::{catalog, settings, KnowledgeDb, Schema, Table};
use rayon::prelude::*;
use tracing::{error, info, info_span, warn};

use super::builds::LiftSettings;
use super::cascade::{run_cascade, CascadeSettings};
use super::fingerprint::{fingerprint_dir, record_run, LastRun};
use super::report::{SourceReport, UpdateReport};
use super::stage::SourceStage;
use super::tables::TableTracker;
use crate::liftover::ChainStore;
use crate::merge::DEFAULT_HOP_LIMIT;
use crate::sources::{OptionError, SourceLoader, SourceOptions, SourceRegistry, SourceWriter};

#[derive(Debug, Clone)]
pub struct UpdateOptions {
    pub cache_dir: PathBuf,
    /// Use whatever is already in the cache; never download
    pub cache_only: bool,
    /// Reprocess sources even when nothing changed
    pub force: bool,
    pub parallel_downloads: bool,
    pub batch_size: usize,
    pub min_coverage: f64,
    pub hop_limit: usize,
    /// Replaces the stored zone size when set; `None` leaves the store alone
    pub zone_size: Option<i64>,
}

impl UpdateOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cache_dir: config.update.cache_dir(),
            cache_only: config.update.cache_only,
            force: config.update.force,
            parallel_downloads: config.update.parallel_downloads,
            batch_size: config.update.batch_size,
            min_coverage: config.liftover.min_coverage,
            hop_limit: DEFAULT_HOP_LIMIT,
            zone_size: config.zones.zone_size,
        }
    }

    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Drives one update run against a knowledge store
///
/// Sources are loaded one at a time in name order. Each gets its own
/// savepoint inside a savepoint spanning the whole run: a failing source is
/// rolled back and recorded while the others carry on, and a fatal error
/// (read-only store, merge cycle) rolls back everything.
pub struct Updater<'a> {
    registry: &'a SourceRegistry,
    options: UpdateOptions,
}

impl<'a> Updater<'a> {
    pub fn new(registry: &'a SourceRegistry, options: UpdateOptions) -> Self {
        Self { registry, options }
    }

    pub fn options(&self) -> &UpdateOptions {
        &self.options
    }

    /// Update `selected` sources, or every registered source when `None`
    pub fn run(
        &self,
        db: &mut KnowledgeDb,
        selected: Option<&[String]>,
        source_options: &BTreeMap<String, SourceOptions>,
    ) -> Result<UpdateReport> {
        db.ensure_writeable()?;
        if settings::is_finalized(db.connection())? {
            return Err(LokiError::Finalized.into());
        }

        let mut report = UpdateReport::default();
        let loaders = self.select(selected, &mut report);
        let names: BTreeSet<&str> = loaders.iter().map(|loader| loader.name()).collect();
        for name in source_options.keys() {
            if !names.contains(name.as_str()) {
                warn!("Options given for '{}', which is not being updated", name);
            }
        }

        let empty = SourceOptions::new();
        let options_for = |name: &str| source_options.get(name).unwrap_or(&empty);

        let mut pending: Vec<(Arc<dyn SourceLoader>, SourceReport)> = loaders
            .into_iter()
            .map(|loader| {
                let mut source = SourceReport::new(loader.name());
                source.advance(SourceStage::ValidatingOptions);
                if let Err(err) = loader.validate(options_for(loader.name())) {
                    let err = anyhow::Error::from(option_error(loader.name(), err));
                    error!("{:#}", err);
                    source.fail(&err);
                }
                (loader, source)
            })
            .collect();

        if !self.options.cache_only {
            self.download_all(&mut pending, &options_for);
        }

        let (conn, schema) = db.parts_mut();
        let mut run = conn.savepoint().context("Failed to begin update")?;
        let mut tables = TableTracker::new();
        self.apply_zone_size(&run, &mut tables)?;

        let mut processed_any = false;
        for (loader, mut source) in pending {
            if source.stage.is_failed() {
                report.record(source);
                continue;
            }
            let span = info_span!("source", name = loader.name());
            let _enter = span.enter();

            let snapshot = tables.clone();
            let outcome = (|| -> Result<bool> {
                let scope = run.savepoint()?;
                let processed = self.process_source(
                    &scope,
                    schema,
                    &mut tables,
                    loader.as_ref(),
                    options_for(loader.name()),
                    &mut source,
                )?;
                scope.commit()?;
                Ok(processed)
            })();

            match settle(&mut source, outcome)? {
                Some(processed) => processed_any |= processed,
                // dropped indexes came back with the rollback
                None => tables = snapshot,
            }
            report.record(source);
        }

        let cascade = CascadeSettings {
            hop_limit: self.options.hop_limit,
            lift: LiftSettings {
                batch_size: self.options.batch_size,
                min_coverage: self.options.min_coverage,
            },
            check_builds: processed_any,
        };
        let cascade = run_cascade(&run, schema, &mut tables, &mut ChainStore::new(), cascade)?;
        run.commit().context("Failed to commit update")?;

        report.cascade = Some(cascade);
        report.log_summary();
        Ok(report)
    }

    fn select(&self, selected: Option<&[String]>, report: &mut UpdateReport) -> Vec<Arc<dyn SourceLoader>> {
        let Some(selected) = selected else {
            return self.registry.loaders().cloned().collect();
        };
        let mut wanted = BTreeSet::new();
        for name in selected {
            let key = name.trim().to_lowercase();
            if self.registry.get(&key).is_some() {
                wanted.insert(key);
            } else {
                warn!("Unknown source '{}'", name);
                report.unknown.push(name.clone());
            }
        }
        wanted
            .iter()
            .filter_map(|name| self.registry.get(name).cloned())
            .collect()
    }

    /// Fetch files for every source still pending
    ///
    /// Downloads only touch each source's own cache directory, so they may
    /// run in parallel.
    fn download_all<'o, F>(&self, pending: &mut [(Arc<dyn SourceLoader>, SourceReport)], options_for: &F)
    where
        F: Fn(&str) -> &'o SourceOptions + Sync,
    {
        for (_, source) in pending.iter_mut().filter(|(_, s)| !s.stage.is_failed()) {
            source.advance(SourceStage::Downloading);
        }

        let fetch = |loader: &Arc<dyn SourceLoader>| -> Result<()> {
            let _span = info_span!("source", name = loader.name()).entered();
            let workdir = source_work_dir(&self.options.cache_dir, loader.name());
            fs::create_dir_all(&workdir)
                .with_context(|| format!("Failed to create {}", workdir.display()))?;
            info!("Downloading {} data into {}", loader.name(), workdir.display());
            loader
                .download(options_for(loader.name()), &workdir)
                .with_context(|| format!("Failed to download {} data", loader.name()))
        };

        let results: Vec<Option<Result<()>>> = if self.options.parallel_downloads {
            pending
                .par_iter()
                .map(|(loader, source)| (!source.stage.is_failed()).then(|| fetch(loader)))
                .collect()
        } else {
            pending
                .iter()
                .map(|(loader, source)| (!source.stage.is_failed()).then(|| fetch(loader)))
                .collect()
        };

        for ((_, source), result) in pending.iter_mut().zip(results) {
            if let Some(Err(err)) = result {
                error!("{:#}", err);
                source.fail(&err);
            }
        }
    }

    fn apply_zone_size(&self, conn: &Connection, tables: &mut TableTracker) -> Result<()> {
        let Some(size) = self.options.zone_size else {
            return Ok(());
        };
        if size <= 0 {
            return Err(LokiError::Configuration(format!("zone_size must be positive, got {}", size)).into());
        }
        if settings::get(conn, settings::ZONE_SIZE)? != Some(size.to_string()) {
            info!("Zone size is now {}", size);
            settings::set(conn, settings::ZONE_SIZE, &size.to_string())?;
            tables.flag_updated(Table::BiopolymerRegion);
        }
        Ok(())
    }

    /// Load one source; returns false when it was skipped as unchanged
    fn process_source(
        &self,
        conn: &Connection,
        schema: &Schema,
        tables: &mut TableTracker,
        loader: &dyn SourceLoader,
        options: &SourceOptions,
        source: &mut SourceReport,
    ) -> Result<bool> {
        let name = loader.name();
        let source_id = catalog::add_source(conn, name)?;
        let workdir = source_work_dir(&self.options.cache_dir, name);

        source.advance(SourceStage::AnalyzingFiles);
        let files = fingerprint_dir(&workdir)?;
        source.files = files.len();
        let version = loader.version();

        if !self.options.force {
            let last = LastRun::load(conn, source_id)?;
            if last.matches(&version, options, &files) {
                info!(
                    "Skipping {} update, no data or software changes since {}",
                    name,
                    last.updated.as_deref().unwrap_or("the last run")
                );
                source.last_updated = last.updated;
                return Ok(false);
            }
        }

        source.advance(SourceStage::Processing);
        info!("Processing {} data", name);
        conn.execute("DELETE FROM warning WHERE source_id = ?1", params![source_id])?;
        transform(conn, schema, tables, loader, options, &workdir, source_id)?;
        record_run(conn, source_id, &version, options, &files)?;
        Ok(true)
    }
}

/// Record how a source's savepoint ended
///
/// The source only reaches a terminal stage here, after its savepoint has
/// been released, so a failed release still rolls it back cleanly. Returns
/// whether the source was processed, `None` when it was rolled back, or the
/// error itself when it is fatal.
fn settle(source: &mut SourceReport, outcome: Result<bool>) -> Result<Option<bool>> {
    match outcome {
        Ok(true) => {
            source.advance(SourceStage::Committed);
            Ok(Some(true))
        }
        Ok(false) => {
            source.advance(SourceStage::Skipped);
            Ok(Some(false))
        }
        Err(err) if is_fatal(&err) => Err(err),
        Err(err) => {
            error!("Failed to update {}: {:#}", source.name, err);
            source.fail(&err);
            Ok(None)
        }
    }
}

fn transform(
    conn: &Connection,
    schema: &Schema,
    tables: &mut TableTracker,
    loader: &dyn SourceLoader,
    options: &SourceOptions,
    workdir: &Path,
    source_id: loki_core::SourceId,
) -> Result<()> {
    let mut writer = SourceWriter::new(conn, schema, tables, source_id, loader.name());
    loader
        .transform(options, workdir, &mut writer)
        .with_context(|| format!("Failed to process {} data", loader.name()))
}

fn option_error(source: &str, err: OptionError) -> LokiError {
    let reason = match &err {
        OptionError::Unexpected { .. } => "not a recognized option".to_string(),
        OptionError::Invalid { value, reason, .. } => format!("'{}': {}", value, reason),
    };
    LokiError::InvalidOption {
        source_name: source.to_string(),
        option: err.option().to_string(),
        reason,
    }
}

/// Whether an error must abort the whole run
pub fn is_fatal(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.downcast_ref::<LokiError>().is_some_and(LokiError::is_fatal))
}
