use serde_json::Value;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::{HistoryError, RawEvent, Result};

/// Read the raw play events from the single JSON export in `dir`.
pub fn read_history(dir: &Path) -> Result<Vec<RawEvent>> {
    let path = find_export(dir)?;
    log::info!("Reading listening history from {}", path.display());

    let contents = std::fs::read_to_string(&path).map_err(|source| HistoryError::Read {
        path: path.clone(),
        source,
    })?;
    parse_events(&path, &contents)
}

/// Locate the one `.json` file directly inside `dir`.
fn find_export(dir: &Path) -> Result<PathBuf> {
    if dir.as_os_str().is_empty() {
        return Err(HistoryError::DataDirUnset);
    }

    let mut found = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|source| HistoryError::DataDir {
            path: dir.to_path_buf(),
            source,
        })?;
        // path().is_file() follows symlinks; file_type() does not
        if entry.path().is_file() && is_json(entry.path()) {
            found.push(entry.into_path());
        }
    }

    // A plain file as root walks to nothing
    if !dir.is_dir() {
        return Err(HistoryError::NoJsonFile { path: dir.to_path_buf() });
    }

    match found.len() {
        0 => Err(HistoryError::NoJsonFile { path: dir.to_path_buf() }),
        1 => Ok(found.remove(0)),
        _ => Err(HistoryError::MultipleJsonFiles {
            path: dir.to_path_buf(),
            files: found,
        }),
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

/// Parse file contents as an array of objects.
fn parse_events(path: &Path, contents: &str) -> Result<Vec<RawEvent>> {
    let value: Value = serde_json::from_str(contents).map_err(|source| HistoryError::InvalidJson {
        path: path.to_path_buf(),
        source,
    })?;

    let Value::Array(items) = value else {
        return Err(HistoryError::NotAnArray { path: path.to_path_buf() });
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(map) => Ok(map),
            _ => Err(HistoryError::NotAnObject {
                path: path.to_path_buf(),
                index,
            }),
        })
        .collect()
}
