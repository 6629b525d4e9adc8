//! Duplicate play rejection.
//!
//! One physical play can be observed through live capture, a later ledger
//! import and a later dynamic-store import. The index collapses them by
//! content signature before anything reaches the store; the store's
//! unique index over the same triple is the backstop.

use std::collections::HashSet;

use tracing::debug;

use crate::model::{DedupSignature, Play};

/// In-memory signature set: everything already persisted plus everything
/// accepted earlier in the current pass.
#[derive(Debug, Default)]
pub struct DeduplicationIndex {
    seen: HashSet<DedupSignature>,
}

impl DeduplicationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preloads the index from previously stored signatures.
    pub fn preload(signatures: impl IntoIterator<Item = DedupSignature>) -> Self {
        Self {
            seen: signatures.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn contains(&self, signature: &DedupSignature) -> bool {
        self.seen.contains(signature)
    }

    /// Accepts a candidate play: true if it is new (and now recorded),
    /// false if its signature was already present.
    pub fn accept(&mut self, play: &Play) -> bool {
        let signature = DedupSignature::of(play);
        if self.seen.contains(&signature) {
            debug!(
                hash = %signature.beatmap_hash,
                score = signature.score,
                "duplicate play rejected"
            );
            return false;
        }
        self.seen.insert(signature);
        true
    }
}
