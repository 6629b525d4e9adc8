//! Consistency metrics derived from replay timing.

use std::path::Path;

use tracing::warn;

use crate::replay::osr::{KEY_K1, KEY_K2, KEY_M1, KEY_M2, Replay, ReplayFrame};

/// Neutral key-balance value when no hits exist to rank.
const NEUTRAL_BALANCE: f64 = 0.5;

/// Result of analyzing one beatmap+replay pair.
#[derive(Debug, Clone, PartialEq)]
pub struct HitAnalysis {
    /// 10 x population standard deviation of the hit offsets; lower is
    /// steadier.
    pub unstable_rate: f64,
    /// Top input channel's share of the top-two press total.
    pub key_balance: f64,
    /// Matched per-object timing offsets in milliseconds.
    pub offsets: Vec<f64>,
    /// Press tallies for K1/K2/M1/M2.
    pub press_counts: [u32; 4],
}

impl HitAnalysis {
    /// Neutral result used when decoding fails.
    pub fn neutral() -> Self {
        Self {
            unstable_rate: 0.0,
            key_balance: NEUTRAL_BALANCE,
            offsets: Vec::new(),
            press_counts: [0; 4],
        }
    }

    pub fn is_neutral(&self) -> bool {
        self.offsets.is_empty() && self.press_counts.iter().all(|c| *c == 0)
    }
}

/// 10 x population standard deviation of the offsets; 0 for fewer than
/// one sample.
pub fn unstable_rate(offsets: &[f64]) -> f64 {
    if offsets.is_empty() {
        return 0.0;
    }
    let n = offsets.len() as f64;
    let mean = offsets.iter().sum::<f64>() / n;
    let variance = offsets.iter().map(|o| (o - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt() * 10.0
}

/// Rising-edge press tallies for the four input channels. The keyboard
/// bits also raise the pointer bits in the encoding, so the pointer
/// channels only count presses with no keyboard bit.
pub fn press_counts(frames: &[ReplayFrame]) -> [u32; 4] {
    let mut counts = [0u32; 4];
    let mut previous = 0u32;
    for frame in frames {
        let pressed = frame.keys & !previous;
        if pressed & KEY_K1 != 0 {
            counts[0] += 1;
        }
        if pressed & KEY_K2 != 0 {
            counts[1] += 1;
        }
        if pressed & KEY_M1 != 0 && frame.keys & KEY_K1 == 0 {
            counts[2] += 1;
        }
        if pressed & KEY_M2 != 0 && frame.keys & KEY_K2 == 0 {
            counts[3] += 1;
        }
        previous = frame.keys;
    }
    counts
}

/// Top channel's share of the top-two total. 1.0 when a single channel
/// carries everything, 0.5 when nothing was pressed at all.
pub fn key_balance(counts: &[u32; 4]) -> f64 {
    let mut sorted = *counts;
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    let top = sorted[0] as f64;
    let second = sorted[1] as f64;
    if top == 0.0 {
        return NEUTRAL_BALANCE;
    }
    top / (top + second)
}

/// Analysis over an already-extracted offset sequence (the dynamic store
/// records per-object offsets directly).
pub fn analyze_offsets(offsets: &[f64]) -> HitAnalysis {
    HitAnalysis {
        unstable_rate: unstable_rate(offsets),
        key_balance: NEUTRAL_BALANCE,
        offsets: offsets.to_vec(),
        press_counts: [0; 4],
    }
}

/// Full beatmap+replay analysis. Every decode failure degrades to the
/// neutral result.
pub fn analyze(beatmap_path: &Path, replay_path: &Path) -> HitAnalysis {
    let replay = match Replay::from_file(replay_path) {
        Ok(replay) => replay,
        Err(e) => {
            warn!("replay analysis degraded: {e}");
            return HitAnalysis::neutral();
        }
    };
    let map = match rosu_pp::Beatmap::from_path(beatmap_path) {
        Ok(map) => map,
        Err(e) => {
            warn!("replay analysis degraded, beatmap unreadable: {e}");
            return HitAnalysis::neutral();
        }
    };
    analyze_replay(&map, &replay)
}

/// Matches presses to hit objects and derives the metrics.
pub fn analyze_replay(map: &rosu_pp::Beatmap, replay: &Replay) -> HitAnalysis {
    let counts = press_counts(&replay.frames);
    let offsets = match_offsets(map, &replay.frames, replay.mods.clock_rate());
    HitAnalysis {
        unstable_rate: unstable_rate(&offsets),
        key_balance: key_balance(&counts),
        offsets,
        press_counts: counts,
    }
}

/// Widest hit window in ms for the given overall difficulty.
fn hit_window(overall_difficulty: f64) -> f64 {
    199.5 - 10.0 * overall_difficulty
}

/// Pairs each hit object with the earliest unconsumed press inside the
/// hit window. Frame times run on the gameplay clock, so the window is
/// compared on that clock too.
fn match_offsets(map: &rosu_pp::Beatmap, frames: &[ReplayFrame], clock_rate: f64) -> Vec<f64> {
    let window = (hit_window(map.od as f64) / clock_rate).max(10.0);

    let mut presses: Vec<i64> = Vec::new();
    let mut previous = 0u32;
    for frame in frames {
        if frame.keys & !previous != 0 {
            presses.push(frame.time);
        }
        previous = frame.keys;
    }

    let mut offsets = Vec::new();
    let mut next_press = 0usize;
    for object in &map.hit_objects {
        let target = object.start_time;
        // Discard presses that are already too early for this object.
        while next_press < presses.len() && (presses[next_press] as f64) < target - window {
            next_press += 1;
        }
        if next_press < presses.len() {
            let press = presses[next_press] as f64;
            if press <= target + window {
                offsets.push(press - target);
                next_press += 1;
            }
        }
    }
    offsets
}
