//! Raw record normalization.
//!
//! Either source's raw record becomes one canonical Play/Beatmap pair
//! here. Normalization is pure and deterministic: the same raw input
//! always produces byte-identical canonical output, which is what makes
//! repeated overlapping import passes idempotent upstream of the dedup
//! index.

use std::path::{Path, PathBuf};

use crate::dynamic::{RawDynamicBeatmap, RawDynamicScore};
use crate::ledger::{CatalogEntry, RawStableScore};
use crate::model::{Beatmap, JudgementCounts, Mods, Outcome, Play, Provenance};

/// Scale factor constants of the classic-score rescale.
const CLASSIC_OBJECT_WEIGHT: f64 = 32.57;
const CLASSIC_BASE: f64 = 100_000.0;
const CLASSIC_DIVISOR: f64 = 1_000_000.0;

/// Rescales a newer-scale score value to the classic scoring scale.
///
/// Raw totals from different scoring eras are not comparable; the classic
/// scale is the canonical one because the ledger already uses it.
pub fn classic_score(total_objects: u32, reported_score: i64) -> i64 {
    let n = total_objects as f64;
    (((n * n * CLASSIC_OBJECT_WEIGHT + CLASSIC_BASE) * reported_score as f64) / CLASSIC_DIVISOR)
        .round() as i64
}

/// Classic difficulty multiplier from the base difficulty attributes and
/// object density.
pub fn difficulty_multiplier(
    drain_rate: f64,
    overall_difficulty: f64,
    circle_size: f64,
    total_objects: u32,
    drain_time_secs: i32,
) -> f64 {
    let density = if drain_time_secs > 0 {
        (total_objects as f64 / drain_time_secs as f64 * 8.0).clamp(0.0, 16.0)
    } else {
        0.0
    };
    ((drain_rate + overall_difficulty + circle_size + density) / 38.0 * 5.0).round()
}

/// Estimates the maximum classic score for a full combo of all-300s,
/// used to sanity check score-scale conversions. The mod multiplier
/// already folds in the clock-rate mods.
pub fn legacy_max_score(total_objects: u32, difficulty_multiplier: f64, mods: Mods) -> i64 {
    let mod_multiplier = mods.score_multiplier();
    let mut score = 0.0f64;
    for combo in 0..total_objects as u64 {
        score += 300.0 + (300.0 * combo as f64 * difficulty_multiplier * mod_multiplier) / 25.0;
    }
    score.round() as i64
}

/// Converts raw source records into canonical Play/Beatmap pairs.
#[derive(Debug, Default)]
pub struct RecordNormalizer;

impl RecordNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Canonicalizes a ledger record, cross-referencing the catalog entry
    /// gathered by the same pass when one exists.
    pub fn from_stable(
        &self,
        raw: &RawStableScore,
        catalog: Option<&CatalogEntry>,
        songs_dir: Option<&Path>,
    ) -> (Play, Option<Beatmap>) {
        let stars = catalog
            .map(|entry| star_rating_for(entry, raw.mods))
            .unwrap_or(0.0);

        let play = Play {
            id: None,
            timestamp: raw.timestamp,
            // The ledger only ever records completed attempts.
            outcome: Outcome::Pass,
            beatmap_hash: raw.beatmap_hash.clone(),
            mods: raw.mods,
            judgements: raw.judgements,
            max_combo: raw.max_combo as u32,
            // Ledger scores are already on the classic scale.
            score: raw.score as i64,
            pp: 0.0,
            stars,
            unstable_rate: 0.0,
            hit_offsets: Vec::new(),
            replay_path: None,
            note: String::new(),
            provenance: Provenance::StableImport,
        };

        let beatmap = catalog.map(|entry| beatmap_from_catalog(entry, songs_dir));
        (play, beatmap)
    }

    /// Canonicalizes a dynamic-store record.
    pub fn from_dynamic(
        &self,
        raw: &RawDynamicScore,
        raw_beatmap: Option<&RawDynamicBeatmap>,
        beatmap_file: Option<PathBuf>,
        replay_file: Option<PathBuf>,
    ) -> (Play, Option<Beatmap>) {
        let judgements = judgements_from_statistics(&raw.statistics);
        let total_objects = raw_beatmap
            .map(|b| b.circles + b.sliders + b.spinners)
            .filter(|n| *n > 0)
            .unwrap_or_else(|| judgements.total_hits());

        let play = Play {
            id: None,
            timestamp: raw.timestamp,
            outcome: if raw.rank < 0 {
                Outcome::Fail
            } else {
                Outcome::Pass
            },
            beatmap_hash: raw.beatmap_hash.clone(),
            mods: Mods::from_acronyms(&raw.mods),
            judgements,
            max_combo: raw.max_combo,
            score: classic_score(total_objects, raw.total_score),
            pp: 0.0,
            stars: 0.0,
            unstable_rate: 0.0,
            hit_offsets: raw.hit_offsets.clone(),
            replay_path: replay_file.map(|p| p.display().to_string()),
            note: String::new(),
            provenance: Provenance::DynamicImport,
        };

        let beatmap = raw_beatmap.map(|b| beatmap_from_dynamic(b, beatmap_file));
        (play, beatmap)
    }
}

/// Per-mod star rating from a catalog entry: exact mod-mask match first,
/// then the nomod rating.
fn star_rating_for(entry: &CatalogEntry, mods: Mods) -> f64 {
    entry
        .star_ratings
        .get(&mods.bits())
        .copied()
        .unwrap_or_else(|| entry.nomod_stars())
}

fn beatmap_from_catalog(entry: &CatalogEntry, songs_dir: Option<&Path>) -> Beatmap {
    let file_path = songs_dir.and_then(|dir| {
        if entry.folder.is_empty() || entry.osu_filename.is_empty() {
            return None;
        }
        let path = dir.join(&entry.folder).join(&entry.osu_filename);
        path.exists().then(|| path.display().to_string())
    });

    Beatmap {
        hash: entry.hash.clone(),
        title: entry.title.clone(),
        artist: entry.artist.clone(),
        mapper: entry.creator.clone(),
        version: entry.version.clone(),
        bpm: entry.bpm(),
        length_ms: entry.total_time_ms as i64,
        circles: entry.circles as u32,
        sliders: entry.sliders as u32,
        spinners: entry.spinners as u32,
        // The catalog does not carry max combo; the annotator fills it
        // in when the beatmap file is available.
        max_combo: 0,
        approach_rate: entry.approach_rate,
        circle_size: entry.circle_size,
        overall_difficulty: entry.overall_difficulty,
        drain_rate: entry.drain_rate,
        background_hash: None,
        last_played: entry.last_played,
        file_path,
    }
}

fn beatmap_from_dynamic(raw: &RawDynamicBeatmap, file_path: Option<PathBuf>) -> Beatmap {
    Beatmap {
        hash: raw.hash.clone(),
        title: raw.title.clone(),
        artist: raw.artist.clone(),
        mapper: raw.mapper.clone(),
        version: raw.difficulty_name.clone(),
        bpm: raw.bpm,
        length_ms: raw.length_ms,
        circles: raw.circles,
        sliders: raw.sliders,
        spinners: raw.spinners,
        max_combo: raw.max_combo,
        approach_rate: raw.approach_rate,
        circle_size: raw.circle_size,
        overall_difficulty: raw.overall_difficulty,
        drain_rate: raw.drain_rate,
        background_hash: raw.background_hash.clone(),
        last_played: raw.last_played,
        file_path: file_path.map(|p| p.display().to_string()),
    }
}

/// Maps the dynamic store's judgement names onto the ledger counters.
fn judgements_from_statistics(
    statistics: &std::collections::HashMap<String, u32>,
) -> JudgementCounts {
    let get = |name: &str| statistics.get(name).copied().unwrap_or(0);
    JudgementCounts {
        c300: get("great"),
        c100: get("ok"),
        c50: get("meh"),
        geki: get("perfect"),
        katu: get("good"),
        miss: get("miss"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    #[test]
    fn test_classic_score_reference_value() {
        assert_eq!(classic_score(500, 800_000), 6_594_000);
    }

    #[test]
    fn test_classic_score_zero_objects() {
        // Only the flat base term survives.
        assert_eq!(classic_score(0, 1_000_000), 100_000);
    }

    #[test]
    fn test_legacy_max_score_grows_with_combo() {
        let small = legacy_max_score(10, 5.0, Mods::NONE);
        let large = legacy_max_score(100, 5.0, Mods::NONE);
        assert!(large > small * 10);
    }

    #[test]
    fn test_difficulty_multiplier_range() {
        let dm = difficulty_multiplier(6.0, 8.5, 4.0, 452, 95);
        assert!((1.0..=10.0).contains(&dm));
    }

    fn raw_dynamic() -> RawDynamicScore {
        let mut statistics = HashMap::new();
        statistics.insert("great".to_string(), 450);
        statistics.insert("ok".to_string(), 30);
        statistics.insert("meh".to_string(), 5);
        statistics.insert("miss".to_string(), 15);
        RawDynamicScore {
            username: "local".to_string(),
            online_id: None,
            beatmap_hash: "abc".to_string(),
            accuracy: 0.95,
            max_combo: 321,
            rank: 2,
            timestamp: Utc.with_ymd_and_hms(2023, 4, 1, 10, 30, 0).unwrap(),
            total_score: 800_000,
            mods: vec!["HD".to_string(), "DT".to_string()],
            statistics,
            hit_offsets: vec![-5.0, 5.0],
            replay_hash: None,
        }
    }

    #[test]
    fn test_dynamic_score_rescaled_from_statistics_total() {
        let normalizer = RecordNormalizer::new();
        let (play, _) = normalizer.from_dynamic(&raw_dynamic(), None, None, None);
        assert_eq!(play.score, classic_score(500, 800_000));
        assert_eq!(play.mods, Mods::from_acronyms(&["HD", "DT"]));
        assert_eq!(play.outcome, Outcome::Pass);
        assert_eq!(play.judgements.c300, 450);
        assert_eq!(play.judgements.miss, 15);
    }

    #[test]
    fn test_negative_rank_is_fail() {
        let mut raw = raw_dynamic();
        raw.rank = -1;
        let (play, _) = RecordNormalizer::new().from_dynamic(&raw, None, None, None);
        assert_eq!(play.outcome, Outcome::Fail);
    }

    #[test]
    fn test_normalizer_is_deterministic() {
        let normalizer = RecordNormalizer::new();
        let raw = raw_dynamic();
        let (a, _) = normalizer.from_dynamic(&raw, None, None, None);
        let (b, _) = normalizer.from_dynamic(&raw, None, None, None);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_vec(&a).unwrap(),
            serde_json::to_vec(&b).unwrap()
        );
    }
}
