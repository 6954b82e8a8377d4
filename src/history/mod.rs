pub mod export;
pub mod source;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::PathBuf;
use thiserror::Error;

pub use export::write_snapshot;
pub use source::read_history;

/// Plays at or below this many ms are dropped. The export counts in
/// milliseconds, so this is 3.6 seconds.
pub const MIN_MS_PLAYED: i64 = 3600;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("No data directory configured (pass one or set {})", crate::DATA_DIR_ENV)]
    DataDirUnset,
    #[error("Cannot read data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("No JSON file found in {path}")]
    NoJsonFile { path: PathBuf },
    #[error("Expected one JSON file in {path}, found {}: {}", .files.len(), display_files(.files))]
    MultipleJsonFiles { path: PathBuf, files: Vec<PathBuf> },
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON in {path}: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path} is not a JSON array of play events")]
    NotAnArray { path: PathBuf },
    #[error("{path}: element {index} is not a JSON object")]
    NotAnObject { path: PathBuf, index: usize },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize entries: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl HistoryError {
    /// True when the input location is at fault rather than its contents.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::DataDirUnset
                | Self::DataDir { .. }
                | Self::NoJsonFile { .. }
                | Self::MultipleJsonFiles { .. }
        )
    }
}

fn display_files(files: &[PathBuf]) -> String {
    files
        .iter()
        .map(|f| f.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, HistoryError>;

/// One play event exactly as it appears in the export.
pub type RawEvent = Map<String, Value>;

/// Normalized play event.
///
/// Optional fields keep the export's distinction between a key that was
/// absent (`None`, left out of the snapshot) and one that was present but
/// null (`Some(None)`, written as `null`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalEntry {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    pub track_name: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    pub artist_name: Option<Option<String>>,
    pub played_at: String,
    pub ms_played: i64,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    pub episode_name: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    pub show_name: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    pub track_uri: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    pub episode_uri: Option<Option<String>>,
}

/// A key that made it to the deserializer was present, even if null.
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl CanonicalEntry {
    /// Remap a raw event, or `None` if it has no timestamp or is too short.
    pub fn from_raw(raw: &RawEvent) -> Option<Self> {
        let played_at = raw.get("ts")?.as_str()?.to_string();
        let ms_played = whole_number(raw.get("ms_played")?)?;
        if ms_played <= MIN_MS_PLAYED {
            return None;
        }

        Some(Self {
            track_name: string_field(raw, "master_metadata_track_name"),
            artist_name: string_field(raw, "master_metadata_album_artist_name"),
            played_at,
            ms_played,
            episode_name: string_field(raw, "episode_name"),
            show_name: string_field(raw, "episode_show_name"),
            track_uri: string_field(raw, "spotify_track_uri"),
            episode_uri: string_field(raw, "spotify_episode_uri"),
        })
    }

    pub fn track_name(&self) -> Option<&str> {
        flat(&self.track_name)
    }

    pub fn artist_name(&self) -> Option<&str> {
        flat(&self.artist_name)
    }

    pub fn episode_name(&self) -> Option<&str> {
        flat(&self.episode_name)
    }

    pub fn show_name(&self) -> Option<&str> {
        flat(&self.show_name)
    }

    pub fn track_uri(&self) -> Option<&str> {
        flat(&self.track_uri)
    }

    pub fn episode_uri(&self) -> Option<&str> {
        flat(&self.episode_uri)
    }

    /// Track id from `track_uri`, if any.
    pub fn track_id(&self) -> Option<&str> {
        self.track_uri().and_then(derive_id)
    }

    /// Episode id from `episode_uri`, if any.
    pub fn episode_id(&self) -> Option<&str> {
        self.episode_uri().and_then(derive_id)
    }

    fn dedup_key(&self) -> (String, i64, String) {
        (
            self.played_at.clone(),
            self.ms_played,
            self.track_uri().unwrap_or_default().to_string(),
        )
    }
}

fn flat(field: &Option<Option<String>>) -> Option<&str> {
    field.as_ref().and_then(|v| v.as_deref())
}

/// Absent key gives `None`; a present key that is not a string gives `Some(None)`.
fn string_field(raw: &RawEvent, key: &str) -> Option<Option<String>> {
    raw.get(key).map(|v| v.as_str().map(str::to_string))
}

/// Integer, or a float with no fractional part (`4711.0`).
fn whole_number(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

/// Entity id from a URI: the text after the last `:`.
///
/// `spotify:track:ABC123` gives `ABC123`. Empty input or an empty tail gives `None`.
pub fn derive_id(uri: &str) -> Option<&str> {
    let id = uri.rsplit(':').next()?;
    if id.is_empty() { None } else { Some(id) }
}

/// Counters from a normalization pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeStats {
    pub total: usize,
    pub filtered: usize,
    pub duplicates: usize,
    pub kept: usize,
}

/// Remap, filter and dedup raw events, keeping first-seen order.
pub fn normalize(raw: &[RawEvent]) -> Vec<CanonicalEntry> {
    normalize_with_stats(raw).0
}

/// Like [`normalize`], also reporting how many records were dropped and why.
pub fn normalize_with_stats(raw: &[RawEvent]) -> (Vec<CanonicalEntry>, NormalizeStats) {
    let init = (
        Vec::new(),
        HashSet::new(),
        NormalizeStats {
            total: raw.len(),
            ..Default::default()
        },
    );

    let (entries, _, mut stats) = raw.iter().fold(init, |(mut out, mut seen, mut stats), event| {
        match CanonicalEntry::from_raw(event) {
            None => stats.filtered += 1,
            Some(entry) => {
                if seen.insert(entry.dedup_key()) {
                    out.push(entry);
                } else {
                    stats.duplicates += 1;
                }
            }
        }
        (out, seen, stats)
    });

    stats.kept = entries.len();
    log::info!(
        "Normalized {} events: {} kept, {} filtered, {} duplicates",
        stats.total, stats.kept, stats.filtered, stats.duplicates
    );
    (entries, stats)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn till_i_collapse() -> RawEvent {
        json!({
            "ts": "2020-01-22T19:39:58Z",
            "username": "listener01",
            "platform": "web_player windows 10;firefox 72.0;desktop",
            "ms_played": 4711,
            "conn_country": "ZZ",
            "master_metadata_track_name": "Till I Collapse",
            "master_metadata_album_artist_name": "Eminem",
            "master_metadata_album_album_name": "The Eminem Show",
            "spotify_track_uri": "spotify:track:4xkOaSrkexMciUUogZKVTS",
            "episode_name": null,
            "episode_show_name": null,
            "spotify_episode_uri": null,
            "reason_start": "trackdone",
            "reason_end": "endplay",
            "shuffle": false,
            "skipped": null,
            "offline": false,
            "incognito_mode": false
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    fn with(mut raw: RawEvent, key: &str, value: Value) -> RawEvent {
        raw.insert(key.to_string(), value);
        raw
    }

    #[test]
    fn remaps_track_event() {
        let entries = normalize(&[till_i_collapse()]);
        assert_eq!(
            entries,
            vec![CanonicalEntry {
                track_name: Some(Some("Till I Collapse".into())),
                artist_name: Some(Some("Eminem".into())),
                played_at: "2020-01-22T19:39:58Z".into(),
                ms_played: 4711,
                episode_name: Some(None),
                show_name: Some(None),
                track_uri: Some(Some("spotify:track:4xkOaSrkexMciUUogZKVTS".into())),
                episode_uri: Some(None),
            }]
        );
        assert_eq!(entries[0].track_id(), Some("4xkOaSrkexMciUUogZKVTS"));
        assert_eq!(entries[0].episode_id(), None);
    }

    #[test]
    fn remaps_episode_event() {
        let raw = json!({
            "ts": "2021-03-01T08:00:00Z",
            "ms_played": 1_200_000,
            "master_metadata_track_name": null,
            "episode_name": "Episode 12",
            "episode_show_name": "Some Show",
            "spotify_track_uri": null,
            "spotify_episode_uri": "spotify:episode:XYZ"
        })
        .as_object()
        .cloned()
        .unwrap();

        let entries = normalize(&[raw]);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].episode_name(), Some("Episode 12"));
        assert_eq!(entries[0].show_name(), Some("Some Show"));
        assert_eq!(entries[0].episode_id(), Some("XYZ"));
        assert_eq!(entries[0].track_uri, Some(None));
        assert_eq!(entries[0].artist_name, None);
    }

    #[test]
    fn drops_missing_or_null_timestamp() {
        let mut no_ts = till_i_collapse();
        no_ts.remove("ts");
        let null_ts = with(till_i_collapse(), "ts", Value::Null);

        let (entries, stats) = normalize_with_stats(&[no_ts, null_ts]);
        assert!(entries.is_empty());
        assert_eq!(stats.filtered, 2);
    }

    #[test]
    fn threshold_is_inclusive() {
        let at = with(till_i_collapse(), "ms_played", json!(3600));
        let below = with(till_i_collapse(), "ms_played", json!(1000));
        let above = with(till_i_collapse(), "ms_played", json!(3601));

        let entries = normalize(&[at, below, above]);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].ms_played, 3601);
    }

    #[test]
    fn drops_missing_duration() {
        let mut raw = till_i_collapse();
        raw.remove("ms_played");
        assert!(normalize(&[raw]).is_empty());
    }

    #[test]
    fn keeps_first_duplicate() {
        let renamed = with(till_i_collapse(), "master_metadata_track_name", json!("Other"));
        let (entries, stats) = normalize_with_stats(&[till_i_collapse(), renamed]);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].track_name(), Some("Till I Collapse"));
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.kept, 1);
    }

    #[test]
    fn missing_track_uri_dedups_as_empty() {
        let mut a = till_i_collapse();
        a.remove("spotify_track_uri");
        let b = with(till_i_collapse(), "spotify_track_uri", Value::Null);
        assert_eq!(normalize(&[a, b]).len(), 1);
    }

    #[test]
    fn distinct_keys_keep_input_order() {
        let first = with(till_i_collapse(), "ts", json!("2020-01-23T00:00:00Z"));
        let second = till_i_collapse();
        let third = with(till_i_collapse(), "ms_played", json!(9000));

        let entries = normalize(&[first, second, third]);
        let order: Vec<_> = entries.iter().map(|e| (e.played_at.as_str(), e.ms_played)).collect();
        assert_eq!(
            order,
            vec![
                ("2020-01-23T00:00:00Z", 4711),
                ("2020-01-22T19:39:58Z", 4711),
                ("2020-01-22T19:39:58Z", 9000),
            ]
        );
    }

    #[test]
    fn derive_id_takes_last_segment() {
        assert_eq!(derive_id("spotify:track:ABC123"), Some("ABC123"));
        assert_eq!(derive_id("ABC123"), Some("ABC123"));
        assert_eq!(derive_id(""), None);
        assert_eq!(derive_id("spotify:track:"), None);
    }

    #[test]
    fn null_keys_stay_null_and_absent_keys_are_omitted() {
        let mut raw = till_i_collapse();
        raw.remove("spotify_episode_uri");
        let entry = normalize(&[raw]).remove(0);

        let value = serde_json::to_value(&entry).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.get("episode_name"), Some(&Value::Null));
        assert_eq!(obj.get("show_name"), Some(&Value::Null));
        assert!(!obj.contains_key("episode_uri"));
        assert_eq!(obj["ms_played"], json!(4711));

        let back: CanonicalEntry = serde_json::from_value(value).unwrap();
        assert_eq!(back, entry);
        assert_eq!(back.episode_name, Some(None));
        assert_eq!(back.episode_uri, None);
    }

    #[test]
    fn drops_non_string_timestamp() {
        let numeric = with(till_i_collapse(), "ts", json!(1579721998));
        let (entries, stats) = normalize_with_stats(&[numeric]);
        assert!(entries.is_empty());
        assert_eq!(stats.filtered, 1);
    }

    #[test]
    fn accepts_whole_float_duration() {
        let whole = with(till_i_collapse(), "ms_played", json!(4711.0));
        let fractional = with(till_i_collapse(), "ms_played", json!(4711.5));
        let text = with(till_i_collapse(), "ms_played", json!("4711"));

        let entries = normalize(&[whole, fractional, text]);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].ms_played, 4711);
    }

    #[test]
    fn configuration_errors_are_classified() {
        assert!(HistoryError::DataDirUnset.is_configuration());
        assert!(!HistoryError::NotAnArray { path: PathBuf::from("x.json") }.is_configuration());
    }
}
