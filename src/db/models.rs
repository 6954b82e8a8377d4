/// Data for inserting a track (first write wins).
pub struct NewTrack<'a> {
    pub id: &'a str,
    pub uri: &'a str,
    pub name: Option<&'a str>,
    pub artist: Option<&'a str>,
}

/// Data for inserting a podcast episode (first write wins).
pub struct NewEpisode<'a> {
    pub id: &'a str,
    pub uri: &'a str,
    pub name: Option<&'a str>,
    pub show: Option<&'a str>,
}

/// A track row read from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: String,
    pub uri: String,
    pub name: Option<String>,
    pub artist: Option<String>,
}

/// An episode row read from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    pub id: String,
    pub uri: String,
    pub name: Option<String>,
    pub show: Option<String>,
}

/// A playback row read from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct Playback {
    pub id: i64,
    pub played_at: String,
    pub ms_played: i64,
}

/// A playback_activity row.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityLink {
    pub playback_id: i64,
    pub track_id: Option<String>,
    pub episode_id: Option<String>,
}

/// Play count for a track or episode, for `top` output.
#[derive(Debug, Clone)]
pub struct PlayCount {
    pub id: String,
    pub name: Option<String>,
    /// Artist for tracks, show for episodes.
    pub by: Option<String>,
    pub plays: i64,
    pub ms_played: i64,
}

/// Library-wide counts.
#[derive(Debug, Default)]
pub struct LibraryStats {
    pub tracks: i64,
    pub episodes: i64,
    pub playbacks: i64,
    pub activity_links: i64,
    pub total_ms_played: i64,
    pub first_played_at: Option<String>,
    pub last_played_at: Option<String>,
}
