pub mod config;
pub mod dedup;
pub mod dynamic;
pub mod error;
pub mod import;
pub mod ledger;
pub mod model;
pub mod normalize;
pub mod perf;
pub mod replay;
pub mod store;

pub use config::{AliasFilter, ImportConfig};
pub use dedup::DeduplicationIndex;
pub use dynamic::{DynamicContents, DynamicReader, DynamicStore, RawDynamicBeatmap, RawDynamicScore};
pub use error::{Error, Result};
pub use import::{ImportSummary, Importer};
pub use ledger::{Catalog, CatalogEntry, CatalogReader, LedgerContents, LedgerReader, RawStableScore};
pub use model::{Beatmap, DedupSignature, JudgementCounts, Mods, Outcome, Play, Provenance};
pub use normalize::RecordNormalizer;
pub use perf::{
    NullCalculator, PerformanceCalculator, PerformanceInput, PerformanceOutput, RosuCalculator,
};
pub use replay::{HitAnalysis, Replay};
pub use store::Store;
