//! Durable play/beatmap persistence.
//!
//! Every operation opens a short-lived connection, so concurrent readers
//! (the UI, an exporter) never hold the file against an import pass. The
//! `(timestamp, beatmap_hash, score)` unique index makes play insertion
//! idempotent at the storage layer as well as in the in-memory index.

mod schema;

pub use schema::column_exists;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use crate::error::Result;
use crate::model::{
    Beatmap, DedupSignature, JudgementCounts, Mods, Outcome, Play, Provenance, format_timestamp,
};
use crate::replay::HitAnalysis;

pub struct Store {
    path: PathBuf,
}

impl Store {
    /// Opens (creating if needed) the store at `path` and brings its
    /// schema up to date.
    pub fn open(path: &Path) -> Result<Self> {
        let store = Self {
            path: path.to_path_buf(),
        };
        let conn = store.connect()?;
        schema::initialize(&conn)?;
        Ok(store)
    }

    fn connect(&self) -> Result<Connection> {
        Ok(Connection::open(&self.path)?)
    }

    /// Inserts or refreshes a beatmap row. A non-empty stored file path
    /// survives later upserts that carry none.
    pub fn upsert_beatmap(&self, beatmap: &Beatmap) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO beatmaps (
                hash, title, artist, mapper, version, bpm, length_ms,
                circles, sliders, spinners, max_combo,
                approach_rate, circle_size, overall_difficulty, drain_rate,
                background_hash, last_played, file_path
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
             ON CONFLICT(hash) DO UPDATE SET
                title = excluded.title,
                artist = excluded.artist,
                mapper = excluded.mapper,
                version = excluded.version,
                bpm = excluded.bpm,
                length_ms = excluded.length_ms,
                circles = excluded.circles,
                sliders = excluded.sliders,
                spinners = excluded.spinners,
                max_combo = excluded.max_combo,
                approach_rate = excluded.approach_rate,
                circle_size = excluded.circle_size,
                overall_difficulty = excluded.overall_difficulty,
                drain_rate = excluded.drain_rate,
                background_hash = COALESCE(excluded.background_hash, beatmaps.background_hash),
                last_played = COALESCE(excluded.last_played, beatmaps.last_played),
                file_path = CASE
                    WHEN excluded.file_path IS NULL OR excluded.file_path = ''
                        THEN beatmaps.file_path
                    ELSE excluded.file_path
                END",
            params![
                beatmap.hash,
                beatmap.title,
                beatmap.artist,
                beatmap.mapper,
                beatmap.version,
                beatmap.bpm,
                beatmap.length_ms,
                beatmap.circles,
                beatmap.sliders,
                beatmap.spinners,
                beatmap.max_combo,
                beatmap.approach_rate,
                beatmap.circle_size,
                beatmap.overall_difficulty,
                beatmap.drain_rate,
                beatmap.background_hash,
                beatmap.last_played.map(format_timestamp),
                beatmap.file_path,
            ],
        )?;
        Ok(())
    }

    /// Inserts one play, silently skipping an identity collision.
    /// Returns the assigned row id, `None` when the row already existed.
    pub fn insert_play(&self, play: &Play) -> Result<Option<i64>> {
        let conn = self.connect()?;
        let inserted = Self::insert_play_on(&conn, play)?;
        Ok(inserted)
    }

    /// Inserts a batch inside one transaction. Returns how many rows were
    /// actually added.
    pub fn insert_plays(&self, plays: &[Play]) -> Result<usize> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let mut added = 0;
        for play in plays {
            if Self::insert_play_on(&tx, play)?.is_some() {
                added += 1;
            }
        }
        tx.commit()?;
        debug!(total = plays.len(), added, "play batch stored");
        Ok(added)
    }

    fn insert_play_on(conn: &Connection, play: &Play) -> Result<Option<i64>> {
        let changed = conn.execute(
            "INSERT OR IGNORE INTO plays (
                timestamp, beatmap_hash, outcome, mods,
                c300, c100, c50, geki, katu, miss,
                max_combo, score, pp, stars, unstable_rate,
                hit_offsets, replay_path, note, provenance
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
            params![
                format_timestamp(play.timestamp),
                play.beatmap_hash,
                play.outcome.to_string(),
                play.mods.to_json(),
                play.judgements.c300,
                play.judgements.c100,
                play.judgements.c50,
                play.judgements.geki,
                play.judgements.katu,
                play.judgements.miss,
                play.max_combo,
                play.score,
                play.pp,
                play.stars,
                play.unstable_rate,
                serde_json::to_string(&play.hit_offsets)?,
                play.replay_path,
                play.note,
                play.provenance.to_string(),
            ],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        Ok(Some(conn.last_insert_rowid()))
    }

    /// Signatures of everything already stored, for seeding the
    /// deduplication index before an import pass.
    pub fn load_signatures(&self) -> Result<Vec<DedupSignature>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT beatmap_hash, score, timestamp FROM plays")?;
        let rows = stmt.query_map([], |row| {
            Ok(DedupSignature {
                beatmap_hash: row.get(0)?,
                score: row.get(1)?,
                timestamp: row.get(2)?,
            })
        })?;
        let mut signatures = Vec::new();
        for signature in rows {
            signatures.push(signature?);
        }
        Ok(signatures)
    }

    pub fn get_beatmap(&self, hash: &str) -> Result<Option<Beatmap>> {
        let conn = self.connect()?;
        let beatmap = conn
            .query_row(
                "SELECT hash, title, artist, mapper, version, bpm, length_ms,
                        circles, sliders, spinners, max_combo,
                        approach_rate, circle_size, overall_difficulty, drain_rate,
                        background_hash, last_played, file_path
                 FROM beatmaps WHERE hash = ?1",
                params![hash],
                row_to_beatmap,
            )
            .optional()?;
        Ok(beatmap)
    }

    /// Most recent plays first.
    pub fn recent_plays(&self, limit: usize) -> Result<Vec<Play>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, beatmap_hash, outcome, mods,
                    c300, c100, c50, geki, katu, miss,
                    max_combo, score, pp, stars, unstable_rate,
                    hit_offsets, replay_path, note, provenance
             FROM plays ORDER BY timestamp DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], row_to_play)?;
        let mut plays = Vec::new();
        for play in rows {
            plays.push(play?);
        }
        Ok(plays)
    }

    pub fn play_count(&self) -> Result<i64> {
        let conn = self.connect()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM plays", [], |row| row.get(0))?)
    }

    pub fn set_replay_path(&self, id: i64, replay_path: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE plays SET replay_path = ?1 WHERE id = ?2",
            params![replay_path, id],
        )?;
        Ok(())
    }

    pub fn set_note(&self, id: i64, note: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute("UPDATE plays SET note = ?1 WHERE id = ?2", params![note, id])?;
        Ok(())
    }

    /// Attaches replay-derived metrics to an existing play.
    pub fn attach_hit_analysis(&self, id: i64, analysis: &HitAnalysis) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE plays SET unstable_rate = ?1, key_balance = ?2, hit_offsets = ?3
             WHERE id = ?4",
            params![
                analysis.unstable_rate,
                analysis.key_balance,
                serde_json::to_string(&analysis.offsets)?,
                id,
            ],
        )?;
        Ok(())
    }

    pub fn set_cursor_offsets(&self, id: i64, offsets: &[f64]) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE plays SET cursor_offsets = ?1 WHERE id = ?2",
            params![serde_json::to_string(offsets)?, id],
        )?;
        Ok(())
    }

    /// Removes every play and beatmap row. The schema stays in place.
    pub fn wipe(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch("DELETE FROM plays; DELETE FROM beatmaps;")?;
        Ok(())
    }
}

fn parse_timestamp(index: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                index,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

fn row_to_beatmap(row: &Row<'_>) -> rusqlite::Result<Beatmap> {
    let last_played: Option<String> = row.get(16)?;
    let last_played = match last_played {
        Some(text) => Some(parse_timestamp(16, &text)?),
        None => None,
    };
    Ok(Beatmap {
        hash: row.get(0)?,
        title: row.get(1)?,
        artist: row.get(2)?,
        mapper: row.get(3)?,
        version: row.get(4)?,
        bpm: row.get(5)?,
        length_ms: row.get(6)?,
        circles: row.get(7)?,
        sliders: row.get(8)?,
        spinners: row.get(9)?,
        max_combo: row.get(10)?,
        approach_rate: row.get(11)?,
        circle_size: row.get(12)?,
        overall_difficulty: row.get(13)?,
        drain_rate: row.get(14)?,
        background_hash: row.get(15)?,
        last_played,
        file_path: row.get(17)?,
    })
}

fn row_to_play(row: &Row<'_>) -> rusqlite::Result<Play> {
    let timestamp: String = row.get(1)?;
    let outcome: String = row.get(3)?;
    let mods_json: String = row.get(4)?;
    let offsets_json: String = row.get(16)?;
    let provenance: String = row.get(19)?;

    let acronyms: Vec<String> = serde_json::from_str(&mods_json).unwrap_or_default();
    let hit_offsets: Vec<f64> = serde_json::from_str(&offsets_json).unwrap_or_default();

    Ok(Play {
        id: Some(row.get(0)?),
        timestamp: parse_timestamp(1, &timestamp)?,
        outcome: Outcome::from_str(&outcome).unwrap_or_default(),
        beatmap_hash: row.get(2)?,
        mods: Mods::from_acronyms(&acronyms),
        judgements: JudgementCounts {
            c300: row.get(5)?,
            c100: row.get(6)?,
            c50: row.get(7)?,
            geki: row.get(8)?,
            katu: row.get(9)?,
            miss: row.get(10)?,
        },
        max_combo: row.get(11)?,
        score: row.get(12)?,
        pp: row.get(13)?,
        stars: row.get(14)?,
        unstable_rate: row.get(15)?,
        hit_offsets,
        replay_path: row.get(17)?,
        note: row.get(18)?,
        provenance: Provenance::from_str(&provenance).unwrap_or(Provenance::StableImport),
    })
}
