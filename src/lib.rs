pub mod config;
pub mod db;
pub mod history;
pub mod load;
pub mod persist;

/// Application name for XDG paths
pub const APP_NAME: &str = "listenlog";

/// Where the normalized snapshot goes when no path is configured.
pub const DEFAULT_JSON_OUTPUT: &str = "normalized-data/extracted_data.json";

/// Environment variable naming the export directory.
pub const DATA_DIR_ENV: &str = "PATH_TO_DATADIR";
