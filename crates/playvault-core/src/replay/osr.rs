//! Replay file decoding.
//!
//! Replays share the ledger's header conventions (same string protocol,
//! same judgement block) followed by an LZMA-compressed frame stream of
//! `delta|x|y|keys` tuples.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::ledger::{ByteBuffer, ticks_to_utc};
use crate::model::{JudgementCounts, Mods};

/// Key/button bitmask per frame.
pub const KEY_M1: u32 = 1;
pub const KEY_M2: u32 = 2;
pub const KEY_K1: u32 = 4;
pub const KEY_K2: u32 = 8;

/// Delta value marking the trailing RNG-seed frame.
const SEED_FRAME_DELTA: i64 = -12345;

/// One input frame at an absolute time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayFrame {
    pub time: i64,
    pub x: f32,
    pub y: f32,
    pub keys: u32,
}

/// A decoded replay.
#[derive(Debug, Clone)]
pub struct Replay {
    pub ruleset: u8,
    pub version: i32,
    pub beatmap_hash: String,
    pub player_name: String,
    pub replay_hash: String,
    pub judgements: JudgementCounts,
    pub score: i32,
    pub max_combo: u16,
    pub perfect: bool,
    pub mods: Mods,
    pub timestamp: Option<DateTime<Utc>>,
    pub frames: Vec<ReplayFrame>,
    pub online_id: i64,
}

impl Replay {
    pub fn from_file(path: &Path) -> Result<Self> {
        let data =
            fs::read(path).map_err(|_| Error::SourceNotFound(path.display().to_string()))?;
        Self::from_bytes(&data)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut buf = ByteBuffer::new(data);

        let ruleset = buf.read_u8()?;
        let version = buf.read_i32()?;
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
        let _life_graph = buf.read_string()?;
        let timestamp = ticks_to_utc(buf.read_i64()?);

        let compressed_len = buf.read_i32()?;
        let frames = if compressed_len > 0 {
            let compressed = buf.read_bytes(compressed_len as usize)?;
            decode_frames(compressed)?
        } else {
            Vec::new()
        };

        let online_id = if buf.remaining() >= 8 {
            buf.read_i64()?
        } else {
            0
        };

        Ok(Self {
            ruleset,
            version,
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
            frames,
            online_id,
        })
    }
}

/// Decompresses and parses the frame stream. Malformed tuples are
/// dropped rather than failing the whole replay.
fn decode_frames(compressed: &[u8]) -> Result<Vec<ReplayFrame>> {
    let mut decompressed = Vec::new();
    lzma_rs::lzma_decompress(&mut Cursor::new(compressed), &mut decompressed)
        .map_err(|e| Error::ReplayDecode(format!("frame stream: {e:?}")))?;
    let text = String::from_utf8_lossy(&decompressed);

    let mut frames = Vec::new();
    let mut time = 0i64;
    for tuple in text.split(',').filter(|t| !t.is_empty()) {
        let mut parts = tuple.split('|');
        let (Some(delta), Some(x), Some(y), Some(keys)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        let Ok(delta) = delta.parse::<i64>() else {
            continue;
        };
        if delta == SEED_FRAME_DELTA {
            continue;
        }
        time += delta;
        frames.push(ReplayFrame {
            time,
            x: x.parse().unwrap_or(0.0),
            y: y.parse().unwrap_or(0.0),
            keys: keys.parse().unwrap_or(0),
        });
    }
    Ok(frames)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::ledger::ByteWriter;
    use std::io::Cursor;

    fn compress_frames(text: &str) -> Vec<u8> {
        let mut out = Vec::new();
        lzma_rs::lzma_compress(&mut Cursor::new(text.as_bytes()), &mut out).unwrap();
        out
    }

    /// Builds a replay file body with the given frame tuples.
    pub fn replay_with_frames(frame_text: &str) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        writer.write_u8(0);
        writer.write_i32(20230101);
        writer.write_string(&"a".repeat(32));
        writer.write_string("Guest");
        writer.write_string(&"b".repeat(32));
        for count in [450u16, 30, 5, 60, 8, 2] {
            writer.write_u16(count);
        }
        writer.write_i32(725_000);
        writer.write_u16(321);
        writer.write_bool(false);
        writer.write_i32(0);
        writer.write_string("");
        writer.write_i64(638_000_000_000_000_000);
        let compressed = compress_frames(frame_text);
        writer.write_i32(compressed.len() as i32);
        let mut data = writer.into_inner();
        data.extend_from_slice(&compressed);
        data.extend_from_slice(&0i64.to_le_bytes());
        data
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::replay_with_frames;
    use super::*;

    #[test]
    fn test_replay_header_decodes() {
        let data = replay_with_frames("0|256|192|0,");
        let replay = Replay::from_bytes(&data).unwrap();
        assert_eq!(replay.ruleset, 0);
        assert_eq!(replay.player_name, "Guest");
        assert_eq!(replay.judgements.c300, 450);
        assert_eq!(replay.score, 725_000);
    }

    #[test]
    fn test_frames_accumulate_deltas() {
        let data = replay_with_frames("10|0|0|0,20|0|0|4,30|0|0|0,");
        let replay = Replay::from_bytes(&data).unwrap();
        let times: Vec<i64> = replay.frames.iter().map(|f| f.time).collect();
        assert_eq!(times, vec![10, 30, 60]);
        assert_eq!(replay.frames[1].keys, KEY_K1);
    }

    #[test]
    fn test_seed_frame_is_dropped() {
        let data = replay_with_frames("10|0|0|0,-12345|0|0|12345678,");
        let replay = Replay::from_bytes(&data).unwrap();
        assert_eq!(replay.frames.len(), 1);
    }

    #[test]
    fn test_malformed_tuple_is_dropped() {
        let data = replay_with_frames("10|0|0|0,garbage,20|0|0|1,");
        let replay = Replay::from_bytes(&data).unwrap();
        assert_eq!(replay.frames.len(), 2);
    }

    #[test]
    fn test_truncated_replay_is_error() {
        let mut data = replay_with_frames("10|0|0|0,");
        data.truncate(20);
        assert!(Replay::from_bytes(&data).is_err());
    }

    #[test]
    fn test_missing_file_is_source_not_found() {
        let err = Replay::from_file(Path::new("/nonexistent.osr")).unwrap_err();
        assert!(matches!(err, Error::SourceNotFound(_)));
    }
}
