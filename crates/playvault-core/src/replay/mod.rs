//! Replay decoding and hit-consistency analysis.

mod analysis;
mod osr;

pub use analysis::{
    HitAnalysis, analyze, analyze_offsets, analyze_replay, key_balance, press_counts,
    unstable_rate,
};
pub use osr::{KEY_K1, KEY_K2, KEY_M1, KEY_M2, Replay, ReplayFrame};
