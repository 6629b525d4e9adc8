//! Companion beatmap catalog decoding.
//!
//! The catalog is a sequential binary stream with no random access and a
//! handful of version-gated fields. A misread of any gated field corrupts
//! every following entry, so gate checks here are load-bearing: an entry
//! decode error is recoverable only when the entry carried a size prefix
//! (or failed on a value-level check that leaves the stream aligned);
//! anything else surfaces as a pass-level structural error.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::ledger::bytes::ByteBuffer;
use crate::ledger::scores::ticks_to_utc;

/// Entry size prefix exists only inside this version window.
pub const SIZE_PREFIX_MIN_VERSION: i32 = 20121008;
pub const SIZE_PREFIX_MAX_VERSION: i32 = 20191106;
/// Difficulty attributes widen from a byte to f32 at this version.
pub const FLOAT_DIFFICULTY_VERSION: i32 = 20140609;
/// Star-rating sub-blocks appear at this version.
pub const STAR_BLOCKS_MIN_VERSION: i32 = 20140609;
/// Star-rating values shrink from f64 to f32 at this version.
pub const FLOAT_STARS_VERSION: i32 = 20250107;

/// Number of per-ruleset star-rating sub-blocks in every entry.
const RULESET_BLOCKS: usize = 4;

/// One decoded catalog entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogEntry {
    pub artist: String,
    pub title: String,
    pub creator: String,
    pub version: String,
    pub audio_file: String,
    pub hash: String,
    pub osu_filename: String,
    pub ranked_status: u8,
    pub circles: u16,
    pub sliders: u16,
    pub spinners: u16,
    pub last_modified: Option<DateTime<Utc>>,
    pub approach_rate: f64,
    pub circle_size: f64,
    pub overall_difficulty: f64,
    pub drain_rate: f64,
    pub slider_velocity: f64,
    /// Primary-ruleset star rating per mod bitmask. Key 0 is nomod.
    pub star_ratings: HashMap<u32, f64>,
    pub drain_time_secs: i32,
    pub total_time_ms: i32,
    pub preview_time_ms: i32,
    /// Most common uninherited beat length, in ms per beat.
    pub beat_len_ms: f64,
    pub beatmap_id: i32,
    pub set_id: i32,
    pub mode: u8,
    pub source: String,
    pub tags: String,
    pub unplayed: bool,
    pub last_played: Option<DateTime<Utc>>,
    pub folder: String,
}

impl CatalogEntry {
    pub fn bpm(&self) -> f64 {
        if self.beat_len_ms > 0.0 {
            60_000.0 / self.beat_len_ms
        } else {
            0.0
        }
    }

    pub fn nomod_stars(&self) -> f64 {
        self.star_ratings.get(&0).copied().unwrap_or(0.0)
    }
}

/// Hash-indexed catalog of display metadata.
#[derive(Debug, Default)]
pub struct Catalog {
    pub format_version: i32,
    pub player_name: String,
    entries: HashMap<String, CatalogEntry>,
    pub skipped: usize,
}

impl Catalog {
    pub fn get(&self, hash: &str) -> Option<&CatalogEntry> {
        self.entries.get(hash)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }
}

/// Reads the companion catalog file.
#[derive(Debug, Default)]
pub struct CatalogReader;

impl CatalogReader {
    pub fn new() -> Self {
        Self
    }

    pub fn read(&self, path: &Path) -> Result<Catalog> {
        let data = fs::read(path)
            .map_err(|_| Error::SourceNotFound(path.display().to_string()))?;
        self.read_bytes(&data)
    }

    pub fn read_bytes(&self, data: &[u8]) -> Result<Catalog> {
        let mut buf = ByteBuffer::new(data);

        let format_version = buf.read_i32()?;
        let _folder_count = buf.read_i32()?;
        let _account_unlocked = buf.read_bool()?;
        let _unlock_ticks = buf.read_i64()?;
        let player_name = buf.read_string()?;
        let entry_count = buf.read_i32()?;
        debug!(format_version, entry_count, "decoding beatmap catalog");

        let mut catalog = Catalog {
            format_version,
            player_name,
            ..Default::default()
        };

        for _ in 0..entry_count.max(0) {
            let boundary = read_entry_boundary(&mut buf, format_version)?;
            match read_entry(&mut buf, format_version) {
                Ok(entry) => {
                    catalog.entries.insert(entry.hash.clone(), entry);
                }
                Err(e) => match boundary {
                    // With a size prefix the next entry's start is known,
                    // so only this entry is lost.
                    Some(end) if buf.position() <= end => {
                        warn!("skipping malformed catalog entry: {e}");
                        buf.skip(end - buf.position())?;
                        catalog.skipped += 1;
                    }
                    _ => {
                        if matches!(e, Error::RecordDecode(_)) {
                            // Value-level failure, stream still aligned.
                            warn!("skipping malformed catalog entry: {e}");
                            catalog.skipped += 1;
                        } else {
                            return Err(e);
                        }
                    }
                },
            }
        }

        info!(
            entries = catalog.entries.len(),
            skipped = catalog.skipped,
            "catalog decode complete"
        );
        Ok(catalog)
    }
}

fn has_size_prefix(version: i32) -> bool {
    (SIZE_PREFIX_MIN_VERSION..SIZE_PREFIX_MAX_VERSION).contains(&version)
}

fn read_entry_boundary(buf: &mut ByteBuffer<'_>, version: i32) -> Result<Option<usize>> {
    if has_size_prefix(version) {
        let size = buf.read_i32()?;
        if size < 0 {
            return Err(Error::StructuralDecode {
                position: buf.position(),
                message: format!("negative catalog entry size: {size}"),
            });
        }
        Ok(Some(buf.position() + size as usize))
    } else {
        Ok(None)
    }
}

fn read_entry(buf: &mut ByteBuffer<'_>, version: i32) -> Result<CatalogEntry> {
    let artist = buf.read_string()?;
    let title = buf.read_string()?;
    let creator = buf.read_string()?;
    let difficulty_name = buf.read_string()?;
    let audio_file = buf.read_string()?;
    let hash = buf.read_string()?;
    let osu_filename = buf.read_string()?;

    let ranked_status = buf.read_u8()?;
    let circles = buf.read_u16()?;
    let sliders = buf.read_u16()?;
    let spinners = buf.read_u16()?;
    let last_modified = ticks_to_utc(buf.read_i64()?);

    let (approach_rate, circle_size, overall_difficulty, drain_rate) =
        if version >= FLOAT_DIFFICULTY_VERSION {
            (
                buf.read_f32()? as f64,
                buf.read_f32()? as f64,
                buf.read_f32()? as f64,
                buf.read_f32()? as f64,
            )
        } else {
            (
                buf.read_u8()? as f64,
                buf.read_u8()? as f64,
                buf.read_u8()? as f64,
                buf.read_u8()? as f64,
            )
        };

    let slider_velocity = buf.read_f64()?;

    let mut star_ratings = HashMap::new();
    if version >= STAR_BLOCKS_MIN_VERSION {
        for block in 0..RULESET_BLOCKS {
            let pairs = read_star_block(buf, version)?;
            // Only the primary ruleset's ratings are kept.
            if block == 0 {
                star_ratings = pairs;
            }
        }
    }

    let drain_time_secs = buf.read_i32()?;
    let total_time_ms = buf.read_i32()?;
    let preview_time_ms = buf.read_i32()?;

    let timing_count = buf.read_i32()?;
    let mut beat_len_ms = 0.0;
    for _ in 0..timing_count.max(0) {
        let beat_len = buf.read_f64()?;
        let _offset = buf.read_f64()?;
        let uninherited = buf.read_bool()?;
        if uninherited && beat_len_ms == 0.0 {
            beat_len_ms = beat_len;
        }
    }

    let beatmap_id = buf.read_i32()?;
    let set_id = buf.read_i32()?;
    let mode = buf.read_u8()?;
    let source = buf.read_string()?;
    let tags = buf.read_string()?;
    let unplayed = buf.read_bool()?;
    let last_played = ticks_to_utc(buf.read_i64()?);
    let folder = buf.read_string()?;

    if hash.is_empty() {
        return Err(Error::RecordDecode(format!(
            "catalog entry '{artist} - {title}' has no hash"
        )));
    }

    Ok(CatalogEntry {
        artist,
        title,
        creator,
        version: difficulty_name,
        audio_file,
        hash,
        osu_filename,
        ranked_status,
        circles,
        sliders,
        spinners,
        last_modified,
        approach_rate,
        circle_size,
        overall_difficulty,
        drain_rate,
        slider_velocity,
        star_ratings,
        drain_time_secs,
        total_time_ms,
        preview_time_ms,
        beat_len_ms,
        beatmap_id,
        set_id,
        mode,
        source,
        tags,
        unplayed,
        last_played,
        folder,
    })
}

/// One per-ruleset star-rating sub-block: a pair count, then
/// (mod bitmask, star rating) pairs with single-byte type tags. The value
/// width depends on the catalog version.
fn read_star_block(buf: &mut ByteBuffer<'_>, version: i32) -> Result<HashMap<u32, f64>> {
    const TAG_INT: u8 = 0x08;
    const TAG_F64: u8 = 0x0D;
    const TAG_F32: u8 = 0x0C;

    let count = buf.read_i32()?;
    let mut ratings = HashMap::with_capacity(count.max(0) as usize);

    for _ in 0..count.max(0) {
        let tag = buf.read_u8()?;
        if tag != TAG_INT {
            return Err(Error::StructuralDecode {
                position: buf.position(),
                message: format!("unexpected star-pair key tag {tag:#04x}"),
            });
        }
        let mods = buf.read_i32()? as u32;

        let tag = buf.read_u8()?;
        let stars = if version >= FLOAT_STARS_VERSION {
            if tag != TAG_F32 {
                return Err(Error::StructuralDecode {
                    position: buf.position(),
                    message: format!("expected f32 star tag, got {tag:#04x}"),
                });
            }
            buf.read_f32()? as f64
        } else {
            if tag != TAG_F64 {
                return Err(Error::StructuralDecode {
                    position: buf.position(),
                    message: format!("expected f64 star tag, got {tag:#04x}"),
                });
            }
            buf.read_f64()?
        };
        ratings.insert(mods, stars);
    }

    Ok(ratings)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::ledger::bytes::ByteWriter;

    pub struct EntryFixture {
        pub hash: String,
        pub title: String,
        pub stars: f64,
        pub folder: String,
        pub osu_filename: String,
    }

    impl Default for EntryFixture {
        fn default() -> Self {
            Self {
                hash: "c".repeat(32),
                title: "Test Song".to_string(),
                stars: 5.25,
                folder: "123 Artist - Test Song".to_string(),
                osu_filename: "Artist - Test Song (Mapper) [Hard].osu".to_string(),
            }
        }
    }

    fn write_entry_body(writer: &mut ByteWriter, version: i32, fixture: &EntryFixture) {
        writer.write_string("Artist");
        writer.write_string(&fixture.title);
        writer.write_string("Mapper");
        writer.write_string("Hard");
        writer.write_string("audio.mp3");
        writer.write_string(&fixture.hash);
        writer.write_string(&fixture.osu_filename);
        writer.write_u8(4);
        writer.write_u16(300);
        writer.write_u16(150);
        writer.write_u16(2);
        writer.write_i64(0);
        if version >= FLOAT_DIFFICULTY_VERSION {
            for value in [9.0f32, 4.0, 8.5, 6.0] {
                writer.write_f32(value);
            }
        } else {
            for value in [9u8, 4, 8, 6] {
                writer.write_u8(value);
            }
        }
        writer.write_f64(1.6);
        if version >= STAR_BLOCKS_MIN_VERSION {
            for _ in 0..RULESET_BLOCKS {
                writer.write_i32(2);
                for (mods, stars) in [(0u32, fixture.stars), (64, fixture.stars + 1.5)] {
                    writer.write_u8(0x08);
                    writer.write_i32(mods as i32);
                    if version >= FLOAT_STARS_VERSION {
                        writer.write_u8(0x0C);
                        writer.write_f32(stars as f32);
                    } else {
                        writer.write_u8(0x0D);
                        writer.write_f64(stars);
                    }
                }
            }
        }
        writer.write_i32(95);
        writer.write_i32(98_000);
        writer.write_i32(31_000);
        writer.write_i32(1);
        writer.write_f64(350.0);
        writer.write_f64(0.0);
        writer.write_bool(true);
        writer.write_i32(42);
        writer.write_i32(7);
        writer.write_u8(0);
        writer.write_string("");
        writer.write_string("");
        writer.write_bool(false);
        writer.write_i64(0);
        writer.write_string(&fixture.folder);
    }

    pub fn catalog_with(version: i32, entries: &[EntryFixture]) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        writer.write_i32(version);
        writer.write_i32(entries.len() as i32);
        writer.write_bool(true);
        writer.write_i64(0);
        writer.write_string("Guest");
        writer.write_i32(entries.len() as i32);
        let mut data = writer.into_inner();

        for entry in entries {
            let mut body = ByteWriter::new();
            write_entry_body(&mut body, version, entry);
            let body = body.into_inner();
            if has_size_prefix(version) {
                data.extend_from_slice(&(body.len() as i32).to_le_bytes());
            }
            data.extend_from_slice(&body);
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_modern_catalog_f64_stars() {
        let data = catalog_with(20240101, &[EntryFixture::default()]);
        let catalog = CatalogReader::new().read_bytes(&data).unwrap();
        assert_eq!(catalog.len(), 1);
        let entry = catalog.get(&"c".repeat(32)).unwrap();
        assert_eq!(entry.nomod_stars(), 5.25);
        assert_eq!(entry.star_ratings.get(&64).copied(), Some(6.75));
        assert_eq!(entry.circles, 300);
    }

    #[test]
    fn test_post_cutoff_catalog_f32_stars() {
        let data = catalog_with(FLOAT_STARS_VERSION, &[EntryFixture::default()]);
        let catalog = CatalogReader::new().read_bytes(&data).unwrap();
        let entry = catalog.get(&"c".repeat(32)).unwrap();
        assert!((entry.nomod_stars() - 5.25).abs() < 1e-6);
    }

    #[test]
    fn test_size_prefixed_catalog() {
        let data = catalog_with(20150101, &[EntryFixture::default()]);
        let catalog = CatalogReader::new().read_bytes(&data).unwrap();
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_bpm_from_beat_len() {
        let data = catalog_with(20240101, &[EntryFixture::default()]);
        let catalog = CatalogReader::new().read_bytes(&data).unwrap();
        let entry = catalog.get(&"c".repeat(32)).unwrap();
        assert!((entry.bpm() - 60_000.0 / 350.0).abs() < 1e-9);
    }

    #[test]
    fn test_truncated_catalog_is_structural() {
        let mut data = catalog_with(20240101, &[EntryFixture::default()]);
        data.truncate(data.len() - 4);
        let err = CatalogReader::new().read_bytes(&data).unwrap_err();
        assert!(matches!(err, Error::StructuralDecode { .. }));
    }

    #[test]
    fn test_missing_catalog_is_source_not_found() {
        let err = CatalogReader::new()
            .read(Path::new("/nonexistent/catalog.db"))
            .unwrap_err();
        assert!(matches!(err, Error::SourceNotFound(_)));
    }
}
