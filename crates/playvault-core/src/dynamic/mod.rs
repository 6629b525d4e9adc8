//! Schema-evolving embedded object store reader.

mod adapter;
mod blob;
mod open;
mod reader;
mod shape;

pub use adapter::{
    BeatmapAdapter, Document, FileAdapter, MetadataAdapter, ScoreAdapter, SetAdapter,
};
pub use blob::{blob_path, resolve_blob};
pub use open::{DynamicStore, SUPPORTED_SCHEMA_VERSION, parse_version_from_message};
pub use reader::{
    DynamicContents, DynamicReader, RawDynamicBeatmap, RawDynamicScore, infer_local_player,
    select_local_scores,
};
pub use shape::TableShape;

#[cfg(test)]
pub(crate) use reader::fixtures as store_fixtures;
