//! Beatmap table-shape detection.
//!
//! Older store eras keep one row per difficulty (`beatmaps`); newer eras
//! keep one row per beatmap set with the difficulties embedded
//! (`beatmap_sets`). The shape is probed once per pass and iteration is
//! uniform from then on.

use crate::dynamic::adapter::{BeatmapAdapter, Document, SetAdapter};

/// The two observed beatmap storage shapes.
#[derive(Debug)]
pub enum TableShape {
    /// One document per difficulty.
    Flat(Vec<Document>),
    /// One document per set, difficulties embedded.
    Nested(Vec<Document>),
}

impl TableShape {
    /// Uniform per-difficulty iteration regardless of shape.
    pub fn difficulties(&self) -> Vec<BeatmapAdapter> {
        match self {
            TableShape::Flat(rows) => rows
                .iter()
                .cloned()
                .map(BeatmapAdapter)
                .collect(),
            TableShape::Nested(rows) => rows
                .iter()
                .cloned()
                .map(SetAdapter)
                .flat_map(|set| set.difficulties())
                .collect(),
        }
    }

    pub fn is_nested(&self) -> bool {
        matches!(self, TableShape::Nested(_))
    }
}
