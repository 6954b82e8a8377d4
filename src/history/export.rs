use std::path::Path;

use super::{CanonicalEntry, HistoryError, Result};

/// Write `entries` as pretty-printed JSON, replacing whatever was at `path`.
pub fn write_snapshot(entries: &[CanonicalEntry], path: &Path) -> Result<()> {
    let write_err = |source: std::io::Error| HistoryError::Write {
        path: path.to_path_buf(),
        source,
    };

    if path.exists() {
        std::fs::remove_file(path).map_err(write_err)?;
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }

    let mut json = serde_json::to_string_pretty(entries)?;
    json.push('\n');
    std::fs::write(path, json).map_err(write_err)?;

    log::info!("Wrote {} entries to {}", entries.len(), path.display());
    Ok(())
}
