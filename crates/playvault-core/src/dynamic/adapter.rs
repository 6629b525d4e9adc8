//! Tolerant field access over the dynamic store.
//!
//! The store has no compiled schema: column sets differ between client
//! releases and several fields were renamed along the way. All runtime
//! field probing lives here, one adapter per logical entity, so the
//! normalizer and everything downstream sees only static types.
//!
//! Lookup rule for every field: primary name, then the fallback alternate
//! name from the older schema era, then null.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::ValueRef;
use serde_json::{Map, Value};

/// One row or embedded object, held as an untyped document.
#[derive(Debug, Clone, Default)]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Builds a document from a SQLite row using the statement's column
    /// names. Unsupported value types degrade to null.
    pub fn from_row(row: &Row<'_>, columns: &[String]) -> Self {
        let mut map = Map::with_capacity(columns.len());
        for (index, name) in columns.iter().enumerate() {
            let value = match row.get_ref(index) {
                Ok(ValueRef::Null) | Err(_) => Value::Null,
                Ok(ValueRef::Integer(i)) => Value::from(i),
                Ok(ValueRef::Real(f)) => Value::from(f),
                Ok(ValueRef::Text(t)) => Value::from(String::from_utf8_lossy(t).into_owned()),
                Ok(ValueRef::Blob(_)) => Value::Null,
            };
            map.insert(name.clone(), value);
        }
        Self(map)
    }

    /// Primary-then-fallback field lookup.
    pub fn field(&self, primary: &str, fallback: &str) -> &Value {
        match self.0.get(primary) {
            Some(value) if !value.is_null() => value,
            _ => self.0.get(fallback).unwrap_or(&Value::Null),
        }
    }

    pub fn str_field(&self, primary: &str, fallback: &str) -> Option<&str> {
        self.field(primary, fallback).as_str()
    }

    pub fn i64_field(&self, primary: &str, fallback: &str) -> Option<i64> {
        let value = self.field(primary, fallback);
        value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
    }

    pub fn f64_field(&self, primary: &str, fallback: &str) -> Option<f64> {
        self.field(primary, fallback).as_f64()
    }

    pub fn bool_field(&self, primary: &str, fallback: &str) -> Option<bool> {
        let value = self.field(primary, fallback);
        value.as_bool().or_else(|| value.as_i64().map(|i| i != 0))
    }

    /// A field holding structured text: parsed as JSON when present.
    pub fn json_field(&self, primary: &str, fallback: &str) -> Option<Value> {
        match self.field(primary, fallback) {
            Value::String(text) => serde_json::from_str(text).ok(),
            Value::Null => None,
            // Embedded documents carry the structure directly.
            other => Some(other.clone()),
        }
    }

    pub fn timestamp_field(&self, primary: &str, fallback: &str) -> Option<DateTime<Utc>> {
        let text = self.str_field(primary, fallback)?;
        DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Score-row adapter.
pub struct ScoreAdapter<'a>(pub &'a Document);

impl ScoreAdapter<'_> {
    pub fn username(&self) -> Option<&str> {
        self.0.str_field("username", "PlayerName")
    }

    /// Externally assigned identifier; absent or non-positive for purely
    /// local scores.
    pub fn online_id(&self) -> Option<i64> {
        self.0.i64_field("online_id", "OnlineID").filter(|id| *id > 0)
    }

    pub fn beatmap_hash(&self) -> Option<&str> {
        self.0.str_field("beatmap_hash", "MapMD5")
    }

    pub fn accuracy(&self) -> Option<f64> {
        self.0.f64_field("accuracy", "Accuracy")
    }

    pub fn max_combo(&self) -> Option<i64> {
        self.0.i64_field("max_combo", "MaxCombo")
    }

    /// Rank code; negative means a failed attempt.
    pub fn rank(&self) -> Option<i64> {
        self.0.i64_field("rank", "Rank")
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.0.timestamp_field("date", "Date")
    }

    pub fn total_score(&self) -> Option<i64> {
        self.0.i64_field("total_score", "TotalScore")
    }

    /// Mods as a structured-text list of acronym objects.
    pub fn mod_acronyms(&self) -> Vec<String> {
        let Some(Value::Array(entries)) = self.0.json_field("mods", "Mods") else {
            return Vec::new();
        };
        entries
            .iter()
            .filter_map(|entry| match entry {
                Value::String(acronym) => Some(acronym.clone()),
                Value::Object(map) => map
                    .get("acronym")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            })
            .collect()
    }

    /// Hit-statistics map as structured text: judgement name to count.
    pub fn statistics(&self) -> HashMap<String, u32> {
        let Some(Value::Object(map)) = self.0.json_field("statistics", "Statistics") else {
            return HashMap::new();
        };
        map.into_iter()
            .filter_map(|(name, count)| {
                count.as_u64().map(|c| (name.to_lowercase(), c as u32))
            })
            .collect()
    }

    /// Per-judged-object timing offsets.
    pub fn hit_offsets(&self) -> Vec<f64> {
        let Some(Value::Array(entries)) = self.0.json_field("hit_offsets", "HitOffsets") else {
            return Vec::new();
        };
        entries.iter().filter_map(Value::as_f64).collect()
    }

    pub fn replay_hash(&self) -> Option<&str> {
        self.0.str_field("replay_hash", "Replay")
    }
}

/// Metadata sub-document adapter (nested-era schema keeps display fields
/// in an embedded object rather than flat columns).
pub struct MetadataAdapter(pub Document);

impl MetadataAdapter {
    pub fn title(&self) -> Option<&str> {
        self.0.str_field("title", "Title")
    }

    pub fn artist(&self) -> Option<&str> {
        self.0.str_field("artist", "Artist")
    }

    pub fn mapper(&self) -> Option<&str> {
        self.0.str_field("author", "Creator")
    }

    pub fn background_file(&self) -> Option<&str> {
        self.0.str_field("background_file", "BackgroundFile")
    }
}

/// Beatmap-row adapter, valid for both table shapes.
pub struct BeatmapAdapter(pub Document);

impl BeatmapAdapter {
    pub fn hash(&self) -> Option<&str> {
        self.0.str_field("md5_hash", "MD5Hash")
    }

    fn metadata(&self) -> Option<MetadataAdapter> {
        self.0
            .json_field("metadata", "Metadata")
            .and_then(Document::from_value)
            .map(MetadataAdapter)
    }

    pub fn title(&self) -> String {
        self.0
            .str_field("title", "Title")
            .map(str::to_string)
            .or_else(|| self.metadata().and_then(|m| m.title().map(str::to_string)))
            .unwrap_or_default()
    }

    pub fn artist(&self) -> String {
        self.0
            .str_field("artist", "Artist")
            .map(str::to_string)
            .or_else(|| self.metadata().and_then(|m| m.artist().map(str::to_string)))
            .unwrap_or_default()
    }

    pub fn mapper(&self) -> String {
        self.0
            .str_field("author", "Creator")
            .map(str::to_string)
            .or_else(|| self.metadata().and_then(|m| m.mapper().map(str::to_string)))
            .unwrap_or_default()
    }

    pub fn difficulty_name(&self) -> String {
        self.0
            .str_field("difficulty_name", "Version")
            .unwrap_or_default()
            .to_string()
    }

    pub fn bpm(&self) -> f64 {
        self.0.f64_field("bpm", "BPM").unwrap_or(0.0)
    }

    pub fn length_ms(&self) -> i64 {
        self.0.i64_field("length", "TotalLength").unwrap_or(0)
    }

    pub fn circles(&self) -> u32 {
        self.0.i64_field("count_circles", "CountHitCircles").unwrap_or(0) as u32
    }

    pub fn sliders(&self) -> u32 {
        self.0.i64_field("count_sliders", "CountSliders").unwrap_or(0) as u32
    }

    pub fn spinners(&self) -> u32 {
        self.0.i64_field("count_spinners", "CountSpinners").unwrap_or(0) as u32
    }

    pub fn max_combo(&self) -> u32 {
        self.0.i64_field("max_combo", "MaxCombo").unwrap_or(0) as u32
    }

    pub fn approach_rate(&self) -> f64 {
        self.0.f64_field("approach_rate", "ApproachRate").unwrap_or(0.0)
    }

    pub fn circle_size(&self) -> f64 {
        self.0.f64_field("circle_size", "CircleSize").unwrap_or(0.0)
    }

    pub fn overall_difficulty(&self) -> f64 {
        self.0
            .f64_field("overall_difficulty", "OverallDifficulty")
            .unwrap_or(0.0)
    }

    pub fn drain_rate(&self) -> f64 {
        self.0.f64_field("drain_rate", "DrainRate").unwrap_or(0.0)
    }

    pub fn background_hash(&self) -> Option<String> {
        self.0
            .str_field("background_hash", "BackgroundHash")
            .map(str::to_string)
    }

    /// Content hash of the beatmap file itself in the blob layout.
    pub fn file_hash(&self) -> Option<String> {
        self.0.str_field("file_hash", "Hash").map(str::to_string)
    }

    pub fn last_played(&self) -> Option<DateTime<Utc>> {
        self.0.timestamp_field("last_played", "LastPlayed")
    }
}

/// Set-row adapter for the nested table shape: one row per beatmap set,
/// difficulties embedded as a structured-text list.
pub struct SetAdapter(pub Document);

impl SetAdapter {
    pub fn difficulties(&self) -> Vec<BeatmapAdapter> {
        let Some(Value::Array(entries)) = self.0.json_field("beatmaps", "Beatmaps") else {
            return Vec::new();
        };
        entries
            .into_iter()
            .filter_map(Document::from_value)
            .map(BeatmapAdapter)
            .collect()
    }
}

/// File-attachment adapter: named file to content hash.
pub struct FileAdapter(pub Document);

impl FileAdapter {
    pub fn filename(&self) -> Option<&str> {
        self.0.str_field("filename", "Filename")
    }

    pub fn hash(&self) -> Option<&str> {
        self.0.str_field("hash", "Hash")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Document::from_value(value).unwrap()
    }

    #[test]
    fn test_primary_name_wins() {
        let d = doc(json!({"accuracy": 0.97, "Accuracy": 0.5}));
        assert_eq!(ScoreAdapter(&d).accuracy(), Some(0.97));
    }

    #[test]
    fn test_fallback_name_used_when_primary_absent() {
        let d = doc(json!({"Accuracy": 0.5}));
        assert_eq!(ScoreAdapter(&d).accuracy(), Some(0.5));
    }

    #[test]
    fn test_absent_field_is_null() {
        let d = doc(json!({}));
        assert_eq!(ScoreAdapter(&d).accuracy(), None);
        assert_eq!(ScoreAdapter(&d).username(), None);
    }

    #[test]
    fn test_mods_from_structured_text() {
        let d = doc(json!({
            "mods": "[{\"acronym\":\"HD\"},{\"acronym\":\"DT\"}]"
        }));
        assert_eq!(ScoreAdapter(&d).mod_acronyms(), vec!["HD", "DT"]);
    }

    #[test]
    fn test_statistics_lowercased() {
        let d = doc(json!({
            "statistics": "{\"Great\": 100, \"Ok\": 5, \"Miss\": 1}"
        }));
        let stats = ScoreAdapter(&d).statistics();
        assert_eq!(stats.get("great"), Some(&100));
        assert_eq!(stats.get("miss"), Some(&1));
    }

    #[test]
    fn test_beatmap_metadata_fallback() {
        let d = doc(json!({
            "md5_hash": "abc",
            "metadata": "{\"title\": \"Nested Title\", \"artist\": \"Nested Artist\"}"
        }));
        let adapter = BeatmapAdapter(d);
        assert_eq!(adapter.title(), "Nested Title");
        assert_eq!(adapter.artist(), "Nested Artist");
    }

    #[test]
    fn test_set_difficulty_iteration() {
        let d = doc(json!({
            "beatmaps": "[{\"md5_hash\": \"a\"}, {\"md5_hash\": \"b\"}]"
        }));
        let hashes: Vec<_> = SetAdapter(d)
            .difficulties()
            .iter()
            .filter_map(|b| b.hash().map(str::to_string))
            .collect();
        assert_eq!(hashes, vec!["a", "b"]);
    }

    #[test]
    fn test_non_positive_online_id_is_local() {
        let d = doc(json!({"online_id": -1}));
        assert_eq!(ScoreAdapter(&d).online_id(), None);
        let d = doc(json!({"online_id": 12345}));
        assert_eq!(ScoreAdapter(&d).online_id(), Some(12345));
    }
}
