//! Score ledger decoding.
//!
//! The ledger is a versioned fixed-binary file: a header, then per-beatmap
//! groups of score records. Field order inside a record is undocumented
//! and version-dependent; the layout below was reverse engineered from the
//! stable client and must be read exactly or the stream desynchronizes.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::AliasFilter;
use crate::error::{Error, Result};
use crate::ledger::bytes::ByteBuffer;
use crate::model::{JudgementCounts, Mods};

/// Ruleset id kept by the import; everything else is skipped.
pub const PRIMARY_RULESET: u8 = 0;

/// Offset from 0001-01-01 to the unix epoch, in 100ns ticks.
const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;
const TICKS_PER_SECOND: i64 = 10_000_000;

/// Converts a platform tick timestamp (100ns since 0001-01-01) to UTC.
pub fn ticks_to_utc(ticks: i64) -> Option<DateTime<Utc>> {
    let delta = ticks.checked_sub(UNIX_EPOCH_TICKS)?;
    let secs = delta.div_euclid(TICKS_PER_SECOND);
    let nanos = (delta.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
    DateTime::from_timestamp(secs, nanos)
}

/// One score record as stored in the ledger, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStableScore {
    pub ruleset: u8,
    pub internal_version: i32,
    pub beatmap_hash: String,
    pub player_name: String,
    pub replay_hash: String,
    pub judgements: JudgementCounts,
    pub score: i32,
    pub max_combo: u16,
    pub perfect: bool,
    pub mods: Mods,
    pub timestamp: DateTime<Utc>,
    pub online_id: i64,
}

/// Per-file decode result with skip accounting.
#[derive(Debug, Default)]
pub struct LedgerContents {
    pub format_version: i32,
    pub scores: Vec<RawStableScore>,
    /// Records rejected by a filter or an isolated decode failure.
    pub skipped: usize,
}

/// Reads the binary score ledger.
pub struct LedgerReader {
    filter: AliasFilter,
}

impl LedgerReader {
    pub fn new(filter: AliasFilter) -> Self {
        Self { filter }
    }

    /// Decodes the ledger at `path`, keeping only primary-ruleset,
    /// positive-score, alias-matching records.
    ///
    /// # Errors
    ///
    /// `SourceNotFound` if the file is missing; `StructuralDecode` if the
    /// stream desynchronizes at the group level. An isolated per-record
    /// failure only skips that record.
    pub fn read(&self, path: &Path) -> Result<LedgerContents> {
        let data = fs::read(path)
            .map_err(|_| Error::SourceNotFound(path.display().to_string()))?;
        self.read_bytes(&data)
    }

    pub fn read_bytes(&self, data: &[u8]) -> Result<LedgerContents> {
        let mut buf = ByteBuffer::new(data);
        let format_version = buf.read_i32()?;
        let group_count = buf.read_i32()?;
        debug!(format_version, group_count, "decoding score ledger");

        let mut contents = LedgerContents {
            format_version,
            ..Default::default()
        };

        for _ in 0..group_count.max(0) {
            let group_hash = buf.read_string()?;
            let score_count = buf.read_i32()?;

            for _ in 0..score_count.max(0) {
                match read_score(&mut buf) {
                    Ok(raw) => {
                        if self.keep(&raw, &group_hash) {
                            contents.scores.push(raw);
                        } else {
                            contents.skipped += 1;
                        }
                    }
                    // A record that failed on a value-level check leaves
                    // the stream aligned; anything positional is fatal
                    // because every later record would misread.
                    Err(e @ Error::StructuralDecode { .. }) => return Err(e),
                    Err(e) => {
                        warn!("skipping malformed ledger record: {e}");
                        contents.skipped += 1;
                    }
                }
            }
        }

        info!(
            kept = contents.scores.len(),
            skipped = contents.skipped,
            "ledger decode complete"
        );
        Ok(contents)
    }

    fn keep(&self, raw: &RawStableScore, group_hash: &str) -> bool {
        if raw.ruleset != PRIMARY_RULESET {
            return false;
        }
        if raw.score <= 0 {
            return false;
        }
        if !self.filter.matches(&raw.player_name) {
            return false;
        }
        if !group_hash.is_empty() && raw.beatmap_hash != group_hash {
            debug!(
                group = group_hash,
                record = raw.beatmap_hash,
                "ledger record hash disagrees with its group"
            );
        }
        true
    }
}

fn read_score(buf: &mut ByteBuffer<'_>) -> Result<RawStableScore> {
    let ruleset = buf.read_u8()?;
    let internal_version = buf.read_i32()?;
    let beatmap_hash = buf.read_string()?;
    let player_name = buf.read_string()?;
    let replay_hash = buf.read_string()?;

    let c300 = buf.read_u16()? as u32;
    let c100 = buf.read_u16()? as u32;
    let c50 = buf.read_u16()? as u32;
    let geki = buf.read_u16()? as u32;
    let katu = buf.read_u16()? as u32;
    let miss = buf.read_u16()? as u32;

    let score = buf.read_i32()?;
    let max_combo = buf.read_u16()?;
    let perfect = buf.read_bool()?;
    let mods = Mods(buf.read_i32()? as u32);
    // Legacy life-graph blob, unused.
    let _life_graph = buf.read_string()?;
    let ticks = buf.read_i64()?;
    // 4-byte sentinel where replay data would be inlined.
    buf.skip(4)?;
    let online_id = buf.read_i64()?;

    let timestamp = ticks_to_utc(ticks)
        .ok_or_else(|| Error::RecordDecode(format!("timestamp ticks out of range: {ticks}")))?;

    Ok(RawStableScore {
        ruleset,
        internal_version,
        beatmap_hash,
        player_name,
        replay_hash,
        judgements: JudgementCounts {
            c300,
            c100,
            c50,
            geki,
            katu,
            miss,
        },
        score,
        max_combo,
        perfect,
        mods,
        timestamp,
        online_id,
    })
}
