use std::ffi::OsString;
use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;

/// Application configuration loaded from TOML config file.
/// All fields have sensible defaults — the config file is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the listening-history export.
    pub data_dir: Option<PathBuf>,
    /// Custom database path (overrides XDG default).
    pub db_path: Option<PathBuf>,
    /// Where `--json` writes the normalized snapshot.
    pub json_output: Option<PathBuf>,
}

impl AppConfig {
    /// Load config from `~/.config/listenlog/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match Self::parse(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str::<AppConfig>(contents)
    }

    /// Snapshot path: config value or the built-in default.
    pub fn json_output(&self) -> PathBuf {
        self.json_output
            .clone()
            .unwrap_or_else(|| PathBuf::from(crate::DEFAULT_JSON_OUTPUT))
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Pick the export directory: CLI argument > environment > config file.
///
/// Falls back to an empty path when nothing is set, which the reader rejects.
pub fn resolve_data_dir(
    cli: Option<PathBuf>,
    env: Option<OsString>,
    config: &AppConfig,
) -> PathBuf {
    cli.or_else(|| env.filter(|v| !v.is_empty()).map(PathBuf::from))
        .or_else(|| config.data_dir.clone())
        .unwrap_or_default()
}

/// Resolve the default database path using XDG data directory.
pub fn default_db_path() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).ok();
        data_dir.join("listenlog.db")
    } else {
        // Fallback: current directory
        PathBuf::from("listenlog.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_config() {
        let config = AppConfig::parse("data_dir = \"/exports/spotify\"\n").unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/exports/spotify")));
        assert!(config.db_path.is_none());
        assert_eq!(
            config.json_output(),
            PathBuf::from("normalized-data/extracted_data.json")
        );
    }

    #[test]
    fn rejects_bad_toml() {
        assert!(AppConfig::parse("data_dir = [").is_err());
    }

    #[test]
    fn data_dir_precedence() {
        let config = AppConfig {
            data_dir: Some(PathBuf::from("/from/config")),
            ..Default::default()
        };

        let dir = resolve_data_dir(
            Some(PathBuf::from("/from/cli")),
            Some(OsString::from("/from/env")),
            &config,
        );
        assert_eq!(dir, PathBuf::from("/from/cli"));

        let dir = resolve_data_dir(None, Some(OsString::from("/from/env")), &config);
        assert_eq!(dir, PathBuf::from("/from/env"));

        let dir = resolve_data_dir(None, Some(OsString::new()), &config);
        assert_eq!(dir, PathBuf::from("/from/config"));
    }

    #[test]
    fn data_dir_defaults_to_empty() {
        let dir = resolve_data_dir(None, None, &AppConfig::default());
        assert_eq!(dir, PathBuf::new());
    }
}
