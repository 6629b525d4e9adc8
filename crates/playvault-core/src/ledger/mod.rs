//! Stable-client binary sources: the score ledger and its companion
//! beatmap catalog.

mod bytes;
mod catalog;
mod scores;

pub use bytes::{ByteBuffer, ByteWriter};
pub use catalog::{
    Catalog, CatalogEntry, CatalogReader, FLOAT_DIFFICULTY_VERSION, FLOAT_STARS_VERSION,
    SIZE_PREFIX_MAX_VERSION, SIZE_PREFIX_MIN_VERSION, STAR_BLOCKS_MIN_VERSION,
};
pub use scores::{
    LedgerContents, LedgerReader, PRIMARY_RULESET, RawStableScore, ticks_to_utc,
};

#[cfg(test)]
pub(crate) use catalog::fixtures as catalog_fixtures;
#[cfg(test)]
pub(crate) use scores::fixtures as score_fixtures;
