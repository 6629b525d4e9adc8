//! Canonical record model shared by every reader and the store.
//!
//! Raw source records never leave their reader module; everything
//! downstream of normalization sees only these types.

mod beatmap;
mod mods;
mod play;
mod signature;

pub use beatmap::Beatmap;
pub use mods::Mods;
pub use play::{JudgementCounts, Outcome, Play, Provenance};
pub use signature::{DedupSignature, format_timestamp};
