use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::db::{Database, DbError};
use crate::history::{self, CanonicalEntry, HistoryError, NormalizeStats};
use crate::persist::{self, PersistSummary};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error("Database error: {0}")]
    Db(#[from] DbError),
}

/// Inputs for one load run.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Directory holding the export.
    pub data_dir: PathBuf,
    /// Also write the normalized entries here.
    pub write_json: Option<PathBuf>,
}

#[derive(Debug)]
pub struct LoadSummary {
    pub normalize: NormalizeStats,
    pub persist: PersistSummary,
    pub snapshot: Option<PathBuf>,
}

/// Read and normalize the export in `data_dir`.
pub fn read_entries(data_dir: &Path) -> Result<(Vec<CanonicalEntry>, NormalizeStats), HistoryError> {
    let raw = history::read_history(data_dir)?;
    Ok(history::normalize_with_stats(&raw))
}

/// Normalize the export and store every entry.
///
/// Input problems abort before anything is written. Per-entry storage
/// failures are counted in the summary instead.
pub fn load_history(opts: &LoadOptions, db: &Database) -> Result<LoadSummary, LoadError> {
    let (entries, normalize) = read_entries(&opts.data_dir)?;
    store_entries(&entries, normalize, opts, db)
}

/// Persist already-normalized entries, then write the snapshot if asked.
pub fn store_entries(
    entries: &[CanonicalEntry],
    normalize: NormalizeStats,
    opts: &LoadOptions,
    db: &Database,
) -> Result<LoadSummary, LoadError> {
    let persist = persist::persist_all(db, entries);
    if persist.failed > 0 {
        log::warn!("{} of {} entries could not be stored", persist.failed, entries.len());
    }

    if let Some(path) = &opts.write_json {
        history::write_snapshot(entries, path)?;
    }

    Ok(LoadSummary {
        normalize,
        persist,
        snapshot: opts.write_json.clone(),
    })
}

