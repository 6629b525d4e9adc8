use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Play;

/// The durable identity of one physical play across every capture path.
///
/// One play can surface through live capture, a later ledger import and a
/// later dynamic-store import; all three carry the same beatmap hash, the
/// same classic score value and the same UTC timestamp, so this triple is
/// the collapse key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DedupSignature {
    pub beatmap_hash: String,
    pub score: i64,
    /// ISO-8601 UTC text, second precision, as persisted.
    pub timestamp: String,
}

impl DedupSignature {
    pub fn new(beatmap_hash: &str, score: i64, timestamp: DateTime<Utc>) -> Self {
        Self {
            beatmap_hash: beatmap_hash.to_string(),
            score,
            timestamp: format_timestamp(timestamp),
        }
    }

    pub fn of(play: &Play) -> Self {
        Self::new(&play.beatmap_hash, play.score, play.timestamp)
    }
}

/// Canonical persisted timestamp text.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}
