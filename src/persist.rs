use indicatif::{ProgressBar, ProgressStyle};

use crate::db::models::{NewEpisode, NewTrack};
use crate::db::{queries, Database, Result};
use crate::history::CanonicalEntry;

/// What one persisted entry produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistOutcome {
    pub playback_id: i64,
    pub track_id: Option<String>,
    pub episode_id: Option<String>,
    /// False when neither id resolved and no activity row was written.
    pub linked: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PersistSummary {
    pub persisted: u64,
    pub failed: u64,
    /// Playbacks stored without a track or episode link.
    pub unlinked: u64,
}

/// Store one entry in its own transaction.
///
/// Track and episode rows are insert-or-ignore. A playback row is always
/// appended; the activity link is only written if at least one id resolved.
/// Any error rolls the whole entry back.
pub fn persist_entry(db: &Database, entry: &CanonicalEntry) -> Result<PersistOutcome> {
    let tx = db.conn.unchecked_transaction()?;

    let track_id = entry.track_id();
    let episode_id = entry.episode_id();

    if let (Some(id), Some(uri)) = (track_id, entry.track_uri()) {
        let inserted = queries::insert_track(
            &tx,
            &NewTrack {
                id,
                uri,
                name: entry.track_name(),
                artist: entry.artist_name(),
            },
        )?;
        if inserted {
            log::trace!("New track {id}");
        }
    }

    if let (Some(id), Some(uri)) = (episode_id, entry.episode_uri()) {
        let inserted = queries::insert_episode(
            &tx,
            &NewEpisode {
                id,
                uri,
                name: entry.episode_name(),
                show: entry.show_name(),
            },
        )?;
        if inserted {
            log::trace!("New episode {id}");
        }
    }

    let playback_id = queries::insert_playback(&tx, &entry.played_at, entry.ms_played)?;

    let linked = track_id.is_some() || episode_id.is_some();
    if linked {
        queries::insert_activity(&tx, playback_id, track_id, episode_id)?;
    } else {
        log::debug!("Playback {} at {} has no track or episode", playback_id, entry.played_at);
    }

    tx.commit()?;

    Ok(PersistOutcome {
        playback_id,
        track_id: track_id.map(str::to_string),
        episode_id: episode_id.map(str::to_string),
        linked,
    })
}

/// Persist every entry in order. A failing entry is logged and skipped.
pub fn persist_all(db: &Database, entries: &[CanonicalEntry]) -> PersistSummary {
    let pb = ProgressBar::new(entries.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.set_message("Loading...");

    let mut summary = PersistSummary::default();

    for entry in entries {
        match persist_entry(db, entry) {
            Ok(outcome) => {
                summary.persisted += 1;
                if !outcome.linked {
                    summary.unlinked += 1;
                }
            }
            Err(e) => {
                log::warn!(
                    "Failed to store play at {} ({} ms): {}",
                    entry.played_at, entry.ms_played, e
                );
                summary.failed += 1;
            }
        }
        pb.inc(1);
    }

    pb.finish_with_message(format!(
        "Done: {} stored, {} failed",
        summary.persisted, summary.failed
    ));

    summary
}
