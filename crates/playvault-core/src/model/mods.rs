//! Gameplay modifier handling.
//!
//! Both sources describe mods differently: the binary ledger stores the
//! legacy bitmask, the dynamic store a JSON list of acronym objects. Both
//! collapse into one canonical ordered acronym set so that downstream
//! signatures and display code never see the source representation.

use serde::{Deserialize, Serialize};

/// Legacy mod bitmask wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Mods(pub u32);

/// Bit/acronym table in canonical order (ascending bit value).
///
/// Nightcore implies DoubleTime and Perfect implies SuddenDeath in the
/// legacy encoding; the canonical acronym set keeps only the outer mod.
const MOD_TABLE: &[(u32, &str)] = &[
    (1, "NF"),
    (2, "EZ"),
    (4, "TD"),
    (8, "HD"),
    (16, "HR"),
    (32, "SD"),
    (64, "DT"),
    (128, "RX"),
    (256, "HT"),
    (512, "NC"),
    (1024, "FL"),
    (2048, "AT"),
    (4096, "SO"),
    (8192, "AP"),
    (16384, "PF"),
    (1 << 29, "V2"),
];

const NIGHTCORE: u32 = 512;
const DOUBLE_TIME: u32 = 64;
const HALF_TIME: u32 = 256;
const PERFECT: u32 = 16384;
const SUDDEN_DEATH: u32 = 32;

impl Mods {
    pub const NONE: Mods = Mods(0);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, bit: u32) -> bool {
        self.0 & bit != 0
    }

    /// Canonical ordered acronym set.
    pub fn acronyms(self) -> Vec<&'static str> {
        let mut bits = self.0;
        if bits & NIGHTCORE != 0 {
            bits &= !DOUBLE_TIME;
        }
        if bits & PERFECT != 0 {
            bits &= !SUDDEN_DEATH;
        }
        MOD_TABLE
            .iter()
            .filter(|(bit, _)| bits & bit != 0)
            .map(|&(_, acronym)| acronym)
            .collect()
    }

    /// Canonical display string, `"None"` for an empty set.
    pub fn to_display(self) -> String {
        let acronyms = self.acronyms();
        if acronyms.is_empty() {
            "None".to_string()
        } else {
            acronyms.join("")
        }
    }

    /// JSON array text of the canonical acronym set, as persisted.
    pub fn to_json(self) -> String {
        serde_json::to_string(&self.acronyms()).unwrap_or_else(|_| "[]".to_string())
    }

    /// Rebuild a bitmask from a list of acronyms. Unknown acronyms are
    /// dropped; the implied DT/SD bits are restored for NC/PF.
    pub fn from_acronyms<S: AsRef<str>>(acronyms: &[S]) -> Self {
        let mut bits = 0u32;
        for acronym in acronyms {
            let upper = acronym.as_ref().to_ascii_uppercase();
            if let Some(&(bit, _)) = MOD_TABLE.iter().find(|(_, a)| *a == upper) {
                bits |= bit;
            }
        }
        if bits & NIGHTCORE != 0 {
            bits |= DOUBLE_TIME;
        }
        if bits & PERFECT != 0 {
            bits |= SUDDEN_DEATH;
        }
        Mods(bits)
    }

    /// Playback rate implied by the speed-changing mods.
    pub fn clock_rate(self) -> f64 {
        if self.contains(DOUBLE_TIME) || self.contains(NIGHTCORE) {
            1.5
        } else if self.contains(HALF_TIME) {
            0.75
        } else {
            1.0
        }
    }

    /// Legacy score multiplier for the max-score estimator.
    pub fn score_multiplier(self) -> f64 {
        let mut multiplier = 1.0;
        if self.contains(2) {
            multiplier *= 0.5; // EZ
        }
        if self.contains(1) {
            multiplier *= 0.5; // NF
        }
        if self.contains(HALF_TIME) {
            multiplier *= 0.3;
        }
        if self.contains(8) {
            multiplier *= 1.06; // HD
        }
        if self.contains(16) {
            multiplier *= 1.06; // HR
        }
        if self.contains(DOUBLE_TIME) || self.contains(NIGHTCORE) {
            multiplier *= 1.12;
        }
        if self.contains(1024) {
            multiplier *= 1.12; // FL
        }
        if self.contains(4096) {
            multiplier *= 0.9; // SO
        }
        multiplier
    }
}
