use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::model::Mods;

/// Whether the attempt was completed or abandoned/failed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
pub enum Outcome {
    #[default]
    Pass,
    Fail,
}

/// Which capture path produced a record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum Provenance {
    #[strum(serialize = "live-capture")]
    #[serde(rename = "live-capture")]
    LiveCapture,
    #[strum(serialize = "stable-import")]
    #[serde(rename = "stable-import")]
    StableImport,
    #[strum(serialize = "dynamic-import")]
    #[serde(rename = "dynamic-import")]
    DynamicImport,
}

/// Hit-accuracy counters, ledger order. Geki/katu are the combo-bonus
/// counters carried alongside the four accuracy judgements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JudgementCounts {
    pub c300: u32,
    pub c100: u32,
    pub c50: u32,
    pub geki: u32,
    pub katu: u32,
    pub miss: u32,
}

impl JudgementCounts {
    pub fn total_hits(&self) -> u32 {
        self.c300 + self.c100 + self.c50 + self.miss
    }

    /// Standard accuracy ratio in `[0, 1]`.
    pub fn accuracy(&self) -> f64 {
        let total = self.total_hits();
        if total == 0 {
            return 0.0;
        }
        let weighted = 300 * self.c300 + 100 * self.c100 + 50 * self.c50;
        weighted as f64 / (300 * total) as f64
    }
}

/// One canonical play record, whichever source produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Play {
    /// Store-assigned row id; `None` until persisted.
    pub id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub outcome: Outcome,
    /// May reference a beatmap that has not arrived yet.
    pub beatmap_hash: String,
    pub mods: Mods,
    pub judgements: JudgementCounts,
    pub max_combo: u32,
    /// Score value normalized to the classic scoring scale.
    pub score: i64,
    pub pp: f64,
    pub stars: f64,
    pub unstable_rate: f64,
    /// Per-judged-object timing offsets in milliseconds, in object order.
    pub hit_offsets: Vec<f64>,
    pub replay_path: Option<String>,
    pub note: String,
    pub provenance: Provenance,
}

impl Play {
    pub fn accuracy(&self) -> f64 {
        self.judgements.accuracy()
    }
}
