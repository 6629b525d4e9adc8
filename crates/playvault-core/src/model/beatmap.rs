use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical beatmap metadata, keyed by content hash.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Beatmap {
    pub hash: String,
    pub title: String,
    pub artist: String,
    pub mapper: String,
    /// Difficulty name within the set.
    pub version: String,
    pub bpm: f64,
    pub length_ms: i64,
    pub circles: u32,
    pub sliders: u32,
    pub spinners: u32,
    pub max_combo: u32,
    pub approach_rate: f64,
    pub circle_size: f64,
    pub overall_difficulty: f64,
    pub drain_rate: f64,
    /// Content hash of the background image blob, when known.
    pub background_hash: Option<String>,
    pub last_played: Option<DateTime<Utc>>,
    /// Resolved on-disk `.osu` path. Never downgraded to `None` by a
    /// later upsert carrying no path.
    pub file_path: Option<String>,
}

impl Beatmap {
    pub fn display_name(&self) -> String {
        format!("{} - {} [{}]", self.artist, self.title, self.version)
    }

    /// Total judgeable objects, the `n` of the classic-score rescale.
    pub fn total_objects(&self) -> u32 {
        self.circles + self.sliders + self.spinners
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name() {
        let beatmap = Beatmap {
            artist: "Artist".into(),
            title: "Title".into(),
            version: "Hard".into(),
            ..Default::default()
        };
        assert_eq!(beatmap.display_name(), "Artist - Title [Hard]");
    }

    #[test]
    fn test_total_objects() {
        let beatmap = Beatmap {
            circles: 300,
            sliders: 150,
            spinners: 2,
            ..Default::default()
        };
        assert_eq!(beatmap.total_objects(), 452);
    }
}
