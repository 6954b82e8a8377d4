use super::models::{ActivityLink, Episode, LibraryStats, NewEpisode, NewTrack, PlayCount, Playback, Track};
use super::{Database, Result};
use rusqlite::{params, Connection, OptionalExtension};

/// Insert a track unless one with the same id exists. Returns true if inserted.
pub fn insert_track(conn: &Connection, t: &NewTrack) -> Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO track (id, uri, track_name, artist_name)
         VALUES (?1, ?2, ?3, ?4)",
        params![t.id, t.uri, t.name, t.artist],
    )?;
    Ok(changed > 0)
}

/// Insert an episode unless one with the same id exists. Returns true if inserted.
pub fn insert_episode(conn: &Connection, e: &NewEpisode) -> Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO episode (id, uri, episode_name, show_name)
         VALUES (?1, ?2, ?3, ?4)",
        params![e.id, e.uri, e.name, e.show],
    )?;
    Ok(changed > 0)
}

/// Append a playback row. Returns its id.
pub fn insert_playback(conn: &Connection, played_at: &str, ms_played: i64) -> Result<i64> {
    conn.execute(
        "INSERT INTO playback (played_at, ms_played) VALUES (?1, ?2)",
        params![played_at, ms_played],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_activity(
    conn: &Connection,
    playback_id: i64,
    track_id: Option<&str>,
    episode_id: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO playback_activity (playback_id, track_id, episode_id)
         VALUES (?1, ?2, ?3)",
        params![playback_id, track_id, episode_id],
    )?;
    Ok(())
}

impl Database {
    pub fn get_track(&self, id: &str) -> Result<Option<Track>> {
        let track = self
            .conn
            .query_row(
                "SELECT id, uri, track_name, artist_name FROM track WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Track {
                        id: row.get(0)?,
                        uri: row.get(1)?,
                        name: row.get(2)?,
                        artist: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(track)
    }

    pub fn get_episode(&self, id: &str) -> Result<Option<Episode>> {
        let episode = self
            .conn
            .query_row(
                "SELECT id, uri, episode_name, show_name FROM episode WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Episode {
                        id: row.get(0)?,
                        uri: row.get(1)?,
                        name: row.get(2)?,
                        show: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(episode)
    }

    /// All playbacks linked to a track, oldest first.
    pub fn playbacks_for_track(&self, track_id: &str) -> Result<Vec<Playback>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.id, p.played_at, p.ms_played
             FROM playback p
             JOIN playback_activity a ON a.playback_id = p.id
             WHERE a.track_id = ?1
             ORDER BY p.played_at, p.id",
        )?;

        let playbacks = stmt
            .query_map(params![track_id], |row| {
                Ok(Playback {
                    id: row.get(0)?,
                    played_at: row.get(1)?,
                    ms_played: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(playbacks)
    }

    /// Activity links written for one playback.
    pub fn links_for_playback(&self, playback_id: i64) -> Result<Vec<ActivityLink>> {
        let mut stmt = self.conn.prepare(
            "SELECT playback_id, track_id, episode_id
             FROM playback_activity
             WHERE playback_id = ?1
             ORDER BY rowid",
        )?;

        let links = stmt
            .query_map(params![playback_id], |row| {
                Ok(ActivityLink {
                    playback_id: row.get(0)?,
                    track_id: row.get(1)?,
                    episode_id: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(links)
    }

    /// Most played tracks by number of linked playbacks.
    pub fn top_tracks(&self, limit: usize) -> Result<Vec<PlayCount>> {
        self.query_top(
            "SELECT t.id, t.track_name, t.artist_name, COUNT(*), COALESCE(SUM(p.ms_played), 0)
             FROM playback_activity a
             JOIN track t ON t.id = a.track_id
             JOIN playback p ON p.id = a.playback_id
             GROUP BY t.id
             ORDER BY COUNT(*) DESC, SUM(p.ms_played) DESC, t.id
             LIMIT ?1",
            limit,
        )
    }

    /// Most played episodes by number of linked playbacks.
    pub fn top_episodes(&self, limit: usize) -> Result<Vec<PlayCount>> {
        self.query_top(
            "SELECT e.id, e.episode_name, e.show_name, COUNT(*), COALESCE(SUM(p.ms_played), 0)
             FROM playback_activity a
             JOIN episode e ON e.id = a.episode_id
             JOIN playback p ON p.id = a.playback_id
             GROUP BY e.id
             ORDER BY COUNT(*) DESC, SUM(p.ms_played) DESC, e.id
             LIMIT ?1",
            limit,
        )
    }

    fn query_top(&self, sql: &str, limit: usize) -> Result<Vec<PlayCount>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(PlayCount {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    by: row.get(2)?,
                    plays: row.get(3)?,
                    ms_played: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn stats(&self) -> Result<LibraryStats> {
        let count = |sql: &str| -> Result<i64> { Ok(self.conn.query_row(sql, [], |r| r.get(0))?) };

        let (total_ms_played, first_played_at, last_played_at): (i64, Option<String>, Option<String>) =
            self.conn.query_row(
                "SELECT COALESCE(SUM(ms_played), 0), MIN(played_at), MAX(played_at) FROM playback",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )?;

        Ok(LibraryStats {
            tracks: count("SELECT COUNT(*) FROM track")?,
            episodes: count("SELECT COUNT(*) FROM episode")?,
            playbacks: count("SELECT COUNT(*) FROM playback")?,
            activity_links: count("SELECT COUNT(*) FROM playback_activity")?,
            total_ms_played,
            first_played_at,
            last_played_at,
        })
    }
}
