//! Dynamic store record extraction.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::AliasFilter;
use crate::dynamic::adapter::{BeatmapAdapter, Document, ScoreAdapter};
use crate::dynamic::blob::resolve_blob;
use crate::dynamic::open::DynamicStore;
use crate::dynamic::shape::TableShape;
use crate::error::Result;

/// One score as extracted from the dynamic store, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDynamicScore {
    pub username: String,
    pub online_id: Option<i64>,
    pub beatmap_hash: String,
    pub accuracy: f64,
    pub max_combo: u32,
    /// Negative rank codes mark failed attempts.
    pub rank: i64,
    pub timestamp: DateTime<Utc>,
    pub total_score: i64,
    pub mods: Vec<String>,
    pub statistics: HashMap<String, u32>,
    pub hit_offsets: Vec<f64>,
    pub replay_hash: Option<String>,
}

/// One beatmap difficulty as extracted from either table shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDynamicBeatmap {
    pub hash: String,
    pub title: String,
    pub artist: String,
    pub mapper: String,
    pub difficulty_name: String,
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
    pub background_hash: Option<String>,
    pub file_hash: Option<String>,
    pub last_played: Option<DateTime<Utc>>,
}

/// Everything one pass extracts from the dynamic store.
#[derive(Debug, Default)]
pub struct DynamicContents {
    pub scores: Vec<RawDynamicScore>,
    pub beatmaps: Vec<RawDynamicBeatmap>,
    pub nested_shape: bool,
    pub skipped: usize,
}

/// Reads scores, beatmaps and blob references from an opened store.
pub struct DynamicReader {
    store: DynamicStore,
    blob_root: PathBuf,
}

impl DynamicReader {
    pub fn new(store: DynamicStore, blob_root: &Path) -> Self {
        Self {
            store,
            blob_root: blob_root.to_path_buf(),
        }
    }

    pub fn schema_version(&self) -> i64 {
        self.store.schema_version()
    }

    /// Extracts all score and beatmap records. Malformed individual rows
    /// are excluded and counted, never fatal.
    pub fn read_all(&self) -> Result<DynamicContents> {
        let mut contents = DynamicContents::default();

        for document in self.read_table("scores")? {
            match score_from_document(&document) {
                Some(score) => contents.scores.push(score),
                None => {
                    warn!("excluding malformed dynamic score row");
                    contents.skipped += 1;
                }
            }
        }

        let shape = self.probe_shape()?;
        contents.nested_shape = shape.is_nested();
        for adapter in shape.difficulties() {
            match beatmap_from_adapter(&adapter) {
                Some(beatmap) => contents.beatmaps.push(beatmap),
                None => {
                    warn!("excluding malformed dynamic beatmap entry");
                    contents.skipped += 1;
                }
            }
        }

        info!(
            scores = contents.scores.len(),
            beatmaps = contents.beatmaps.len(),
            skipped = contents.skipped,
            nested = contents.nested_shape,
            "dynamic store extraction complete"
        );
        Ok(contents)
    }

    /// Detects which beatmap table shape this store era uses. Probed once
    /// per pass.
    fn probe_shape(&self) -> Result<TableShape> {
        if self.store.has_table("beatmaps")? {
            debug!("dynamic store uses flat beatmap shape");
            Ok(TableShape::Flat(self.read_table("beatmaps")?))
        } else if self.store.has_table("beatmap_sets")? {
            debug!("dynamic store uses nested beatmap shape");
            Ok(TableShape::Nested(self.read_table("beatmap_sets")?))
        } else {
            warn!("dynamic store has no beatmap table");
            Ok(TableShape::Flat(Vec::new()))
        }
    }

    fn read_table(&self, table: &str) -> Result<Vec<Document>> {
        if !self.store.has_table(table)? {
            return Ok(Vec::new());
        }
        // Table names come from the probes above, never from input.
        let mut stmt = self
            .store
            .connection()
            .prepare(&format!("SELECT * FROM {table}"))?;
        let columns: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();

        let mut documents = Vec::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            documents.push(Document::from_row(row, &columns));
        }
        Ok(documents)
    }

    /// Resolves a score's replay blob to a path, when present on disk.
    pub fn resolve_replay(&self, score: &RawDynamicScore) -> Option<PathBuf> {
        score
            .replay_hash
            .as_deref()
            .and_then(|hash| resolve_blob(&self.blob_root, hash))
    }

    /// Resolves a beatmap's own file blob to a path.
    pub fn resolve_beatmap_file(&self, beatmap: &RawDynamicBeatmap) -> Option<PathBuf> {
        beatmap
            .file_hash
            .as_deref()
            .and_then(|hash| resolve_blob(&self.blob_root, hash))
    }
}

fn score_from_document(document: &Document) -> Option<RawDynamicScore> {
    let adapter = ScoreAdapter(document);
    // A score without map identity, time or value cannot be normalized.
    let beatmap_hash = adapter.beatmap_hash()?.to_string();
    let timestamp = adapter.timestamp()?;
    let total_score = adapter.total_score()?;

    Some(RawDynamicScore {
        username: adapter.username().unwrap_or_default().to_string(),
        online_id: adapter.online_id(),
        beatmap_hash,
        accuracy: adapter.accuracy().unwrap_or(0.0),
        max_combo: adapter.max_combo().unwrap_or(0).max(0) as u32,
        rank: adapter.rank().unwrap_or(0),
        timestamp,
        total_score,
        mods: adapter.mod_acronyms(),
        statistics: adapter.statistics(),
        hit_offsets: adapter.hit_offsets(),
        replay_hash: adapter.replay_hash().map(str::to_string),
    })
}

fn beatmap_from_adapter(adapter: &BeatmapAdapter) -> Option<RawDynamicBeatmap> {
    let hash = adapter.hash()?.to_string();
    Some(RawDynamicBeatmap {
        hash,
        title: adapter.title(),
        artist: adapter.artist(),
        mapper: adapter.mapper(),
        difficulty_name: adapter.difficulty_name(),
        bpm: adapter.bpm(),
        length_ms: adapter.length_ms(),
        circles: adapter.circles(),
        sliders: adapter.sliders(),
        spinners: adapter.spinners(),
        max_combo: adapter.max_combo(),
        approach_rate: adapter.approach_rate(),
        circle_size: adapter.circle_size(),
        overall_difficulty: adapter.overall_difficulty(),
        drain_rate: adapter.drain_rate(),
        background_hash: adapter.background_hash(),
        file_hash: adapter.file_hash(),
        last_played: adapter.last_played(),
    })
}

/// Infers the local player: the most frequent username among scores that
/// lack an externally assigned identifier. A tie for first place or an
/// empty tally leaves the identity unknown.
pub fn infer_local_player(scores: &[RawDynamicScore]) -> Option<String> {
    let mut tally: HashMap<&str, usize> = HashMap::new();
    for score in scores {
        if score.online_id.is_none() && !score.username.trim().is_empty() {
            *tally.entry(score.username.as_str()).or_default() += 1;
        }
    }

    let best = tally.iter().map(|(_, count)| *count).max()?;
    let mut leaders = tally.iter().filter(|(_, count)| **count == best);
    let leader = leaders.next()?.0.to_string();
    if leaders.next().is_some() {
        debug!("local-identity inference tied, importing everything");
        return None;
    }
    Some(leader)
}

/// Applies the identity filter: the configured one when supplied,
/// otherwise inference; no inference match leaves the import open.
pub fn select_local_scores(
    scores: Vec<RawDynamicScore>,
    configured: Option<&AliasFilter>,
    skipped: &mut usize,
) -> Vec<RawDynamicScore> {
    let filter = match configured {
        Some(filter) => filter.clone(),
        None => match infer_local_player(&scores) {
            Some(name) => AliasFilter::exact(&[name]),
            None => AliasFilter::open(),
        },
    };

    let mut kept = Vec::with_capacity(scores.len());
    for score in scores {
        if filter.matches(&score.username) {
            kept.push(score);
        } else {
            *skipped += 1;
        }
    }
    kept
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use rusqlite::Connection;
    use std::path::Path;

    /// Writes a flat-shape dynamic store file with snake_case columns.
    pub fn write_flat_store(path: &Path, version: i64) {
        let conn = Connection::open(path).unwrap();
        conn.pragma_update(None, "user_version", version).unwrap();
        conn.execute_batch(
            "CREATE TABLE scores (
                username TEXT, online_id INTEGER, beatmap_hash TEXT,
                accuracy REAL, max_combo INTEGER, rank INTEGER,
                date TEXT, total_score INTEGER, mods TEXT,
                statistics TEXT, hit_offsets TEXT, replay_hash TEXT
            );
            CREATE TABLE beatmaps (
                md5_hash TEXT, title TEXT, artist TEXT, author TEXT,
                difficulty_name TEXT, bpm REAL, length INTEGER,
                count_circles INTEGER, count_sliders INTEGER,
                count_spinners INTEGER, max_combo INTEGER,
                approach_rate REAL, circle_size REAL,
                overall_difficulty REAL, drain_rate REAL,
                background_hash TEXT, file_hash TEXT, last_played TEXT
            );",
        )
        .unwrap();
    }

    pub fn insert_score(
        path: &Path,
        username: &str,
        online_id: Option<i64>,
        hash: &str,
        total_score: i64,
        date: &str,
    ) {
        let conn = Connection::open(path).unwrap();
        conn.execute(
            "INSERT INTO scores (username, online_id, beatmap_hash, accuracy, max_combo,
                                 rank, date, total_score, mods, statistics, hit_offsets)
             VALUES (?1, ?2, ?3, 0.975, 321, 3, ?4, ?5,
                     '[{\"acronym\":\"HD\"}]',
                     '{\"great\":450,\"ok\":30,\"meh\":5,\"miss\":2}',
                     '[-5.0, 5.0]')",
            rusqlite::params![username, online_id, hash, date, total_score],
        )
        .unwrap();
    }

    pub fn insert_beatmap(path: &Path, hash: &str, title: &str) {
        let conn = Connection::open(path).unwrap();
        conn.execute(
            "INSERT INTO beatmaps (md5_hash, title, artist, author, difficulty_name,
                                   bpm, length, count_circles, count_sliders,
                                   count_spinners, max_combo, approach_rate,
                                   circle_size, overall_difficulty, drain_rate)
             VALUES (?1, ?2, 'Artist', 'Mapper', 'Hard', 180.0, 95000,
                     300, 150, 2, 640, 9.0, 4.0, 8.5, 6.0)",
            rusqlite::params![hash, title],
        )
        .unwrap();
    }

    /// Writes a nested-shape store with PascalCase (older era) columns.
    pub fn write_nested_store(path: &Path, version: i64) {
        let conn = Connection::open(path).unwrap();
        conn.pragma_update(None, "user_version", version).unwrap();
        conn.execute_batch(
            "CREATE TABLE scores (
                PlayerName TEXT, OnlineID INTEGER, MapMD5 TEXT,
                Accuracy REAL, MaxCombo INTEGER, Rank INTEGER,
                Date TEXT, TotalScore INTEGER, Mods TEXT,
                Statistics TEXT, HitOffsets TEXT, Replay TEXT
            );
            CREATE TABLE beatmap_sets (Beatmaps TEXT);",
        )
        .unwrap();
    }
}
