//! Import pass orchestration.
//!
//! A pass wires one source reader through normalization, deduplication
//! and annotation into the store. Pass-level failures land in the
//! summary instead of propagating: an import is a maintenance action
//! and a broken source file must never take the application down.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info};

use crate::config::ImportConfig;
use crate::dedup::DeduplicationIndex;
use crate::dynamic::{DynamicReader, DynamicStore, RawDynamicBeatmap, select_local_scores};
use crate::error::{Error, Result};
use crate::ledger::{CatalogReader, LedgerReader};
use crate::model::{Beatmap, Play};
use crate::normalize::RecordNormalizer;
use crate::perf::{PerformanceCalculator, PerformanceInput, RosuCalculator};
use crate::replay::{self, HitAnalysis};
use crate::store::Store;

/// What one pass did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    /// Plays actually added to the store.
    pub added: usize,
    /// Records rejected along the way: filtered, malformed or duplicate.
    pub skipped: usize,
    /// Beatmap rows written or refreshed.
    pub beatmaps: usize,
    /// Set when the pass failed outright before completing.
    pub error: Option<String>,
}

impl ImportSummary {
    fn failed(error: &Error) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Default::default()
        }
    }
}

/// Runs import passes against one store.
pub struct Importer<'a> {
    store: &'a Store,
    config: ImportConfig,
    calculator: Box<dyn PerformanceCalculator>,
}

impl<'a> Importer<'a> {
    pub fn new(store: &'a Store, config: ImportConfig) -> Self {
        Self::with_calculator(store, config, Box::new(RosuCalculator::new()))
    }

    /// Injects a different performance collaborator, mainly for tests.
    pub fn with_calculator(
        store: &'a Store,
        config: ImportConfig,
        calculator: Box<dyn PerformanceCalculator>,
    ) -> Self {
        Self {
            store,
            config,
            calculator,
        }
    }

    /// Imports from the stable client's binary ledger, cross-referencing
    /// its companion catalog when one is supplied.
    pub fn run_stable_pass(
        &mut self,
        ledger_path: &Path,
        catalog_path: Option<&Path>,
    ) -> ImportSummary {
        match self.stable_pass(ledger_path, catalog_path) {
            Ok(summary) => summary,
            Err(e) => {
                error!("stable import pass failed: {e}");
                ImportSummary::failed(&e)
            }
        }
    }

    fn stable_pass(
        &mut self,
        ledger_path: &Path,
        catalog_path: Option<&Path>,
    ) -> Result<ImportSummary> {
        let mut dedup = DeduplicationIndex::preload(self.store.load_signatures()?);
        let reader = LedgerReader::new(self.config.alias_filter());
        let contents = reader.read(ledger_path)?;

        let catalog = match catalog_path {
            Some(path) => Some(CatalogReader::new().read(path)?),
            None => None,
        };

        let normalizer = RecordNormalizer::new();
        let mut summary = ImportSummary {
            skipped: contents.skipped,
            ..Default::default()
        };
        let mut accepted = Vec::new();

        for raw in &contents.scores {
            let entry = catalog.as_ref().and_then(|c| c.get(&raw.beatmap_hash));
            let (mut play, beatmap) =
                normalizer.from_stable(raw, entry, self.config.songs_dir.as_deref());
            if !dedup.accept(&play) {
                summary.skipped += 1;
                continue;
            }
            if let Some(mut beatmap) = beatmap {
                let file = beatmap.file_path.clone().map(PathBuf::from);
                self.annotate(&mut play, Some(&mut beatmap), file.as_deref());
                self.store.upsert_beatmap(&beatmap)?;
                summary.beatmaps += 1;
            }
            accepted.push(play);
        }

        summary.added = self.store.insert_plays(&accepted)?;
        summary.skipped += accepted.len() - summary.added;
        info!(
            added = summary.added,
            skipped = summary.skipped,
            "stable import pass complete"
        );
        Ok(summary)
    }

    /// Imports from the dynamic client's object store, resolving replay
    /// and beatmap blobs against `blob_root`.
    pub fn run_dynamic_pass(&mut self, store_path: &Path, blob_root: &Path) -> ImportSummary {
        match self.dynamic_pass(store_path, blob_root) {
            Ok(summary) => summary,
            Err(e) => {
                error!("dynamic import pass failed: {e}");
                ImportSummary::failed(&e)
            }
        }
    }

    fn dynamic_pass(&mut self, store_path: &Path, blob_root: &Path) -> Result<ImportSummary> {
        let mut dedup = DeduplicationIndex::preload(self.store.load_signatures()?);
        let dynamic = DynamicStore::open(store_path)?;
        let reader = DynamicReader::new(dynamic, blob_root);
        let mut contents = reader.read_all()?;

        let configured = self
            .config
            .aliases_configured()
            .then(|| self.config.alias_filter());
        let mut skipped = contents.skipped;
        let scores = select_local_scores(
            std::mem::take(&mut contents.scores),
            configured.as_ref(),
            &mut skipped,
        );

        let beatmap_index: HashMap<&str, &RawDynamicBeatmap> = contents
            .beatmaps
            .iter()
            .map(|b| (b.hash.as_str(), b))
            .collect();

        let normalizer = RecordNormalizer::new();
        let mut summary = ImportSummary {
            skipped,
            ..Default::default()
        };

        for raw in &scores {
            let raw_beatmap = beatmap_index.get(raw.beatmap_hash.as_str()).copied();
            let beatmap_file = raw_beatmap.and_then(|b| reader.resolve_beatmap_file(b));
            let replay_file = reader.resolve_replay(raw);
            let (mut play, beatmap) = normalizer.from_dynamic(
                raw,
                raw_beatmap,
                beatmap_file.clone(),
                replay_file.clone(),
            );
            if !dedup.accept(&play) {
                summary.skipped += 1;
                continue;
            }
            if let Some(mut beatmap) = beatmap {
                self.annotate(&mut play, Some(&mut beatmap), beatmap_file.as_deref());
                self.store.upsert_beatmap(&beatmap)?;
                summary.beatmaps += 1;
            }

            let analysis = self.analyze(&play, beatmap_file.as_deref(), replay_file.as_deref());
            play.unstable_rate = analysis.unstable_rate;
            if play.hit_offsets.is_empty() {
                play.hit_offsets = analysis.offsets.clone();
            }

            match self.store.insert_play(&play)? {
                Some(id) => {
                    summary.added += 1;
                    if !analysis.is_neutral() {
                        self.store.attach_hit_analysis(id, &analysis)?;
                    }
                }
                None => summary.skipped += 1,
            }
        }

        info!(
            added = summary.added,
            skipped = summary.skipped,
            "dynamic import pass complete"
        );
        Ok(summary)
    }

    /// Hit metrics: recorded offsets when the store carries them, the
    /// replay file otherwise, neutral when neither is available.
    fn analyze(
        &self,
        play: &Play,
        beatmap_file: Option<&Path>,
        replay_file: Option<&Path>,
    ) -> HitAnalysis {
        if !play.hit_offsets.is_empty() {
            return replay::analyze_offsets(&play.hit_offsets);
        }
        match (beatmap_file, replay_file) {
            (Some(map), Some(osr)) => replay::analyze(map, osr),
            _ => HitAnalysis::neutral(),
        }
    }

    fn annotate(&mut self, play: &mut Play, beatmap: Option<&mut Beatmap>, file: Option<&Path>) {
        let Some(file) = file else { return };
        let input = PerformanceInput::for_play(file, play.mods, play.judgements, play.max_combo);
        let output = self.calculator.calculate(&input);
        if output.is_placeholder {
            return;
        }
        play.pp = output.pp;
        play.stars = output.stars;
        if let Some(beatmap) = beatmap {
            if beatmap.max_combo == 0 {
                beatmap.max_combo = output.max_combo;
            }
            if beatmap.bpm == 0.0 {
                beatmap.bpm = output.bpm;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamic::store_fixtures;
    use crate::ledger::{catalog_fixtures, score_fixtures};
    use crate::model::Provenance;
    use crate::perf::NullCalculator;
    use std::fs;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> Store {
        Store::open(&dir.path().join("vault.db")).unwrap()
    }

    fn importer<'a>(store: &'a Store) -> Importer<'a> {
        Importer::with_calculator(store, ImportConfig::default(), Box::new(NullCalculator))
    }

    fn write_ledger(dir: &TempDir, fixtures: &[score_fixtures::ScoreFixture]) -> PathBuf {
        let path = dir.path().join("scores.db");
        fs::write(&path, score_fixtures::ledger_with(fixtures)).unwrap();
        path
    }

    #[test]
    fn test_stable_pass_imports_and_annotates_from_catalog() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let hash = "c".repeat(32);
        let ledger = write_ledger(
            &dir,
            &[score_fixtures::ScoreFixture {
                beatmap_hash: hash.clone(),
                ..Default::default()
            }],
        );
        let catalog_path = dir.path().join("catalog.db");
        fs::write(
            &catalog_path,
            catalog_fixtures::catalog_with(20240101, &[catalog_fixtures::EntryFixture::default()]),
        )
        .unwrap();

        let summary = importer(&store).run_stable_pass(&ledger, Some(&catalog_path));
        assert_eq!(summary.added, 1);
        assert_eq!(summary.beatmaps, 1);
        assert!(summary.error.is_none());

        let plays = store.recent_plays(10).unwrap();
        assert_eq!(plays.len(), 1);
        assert_eq!(plays[0].provenance, Provenance::StableImport);
        assert_eq!(plays[0].stars, 5.25);
        assert_eq!(store.get_beatmap(&hash).unwrap().unwrap().title, "Test Song");
    }

    #[test]
    fn test_stable_pass_without_catalog_still_imports() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let ledger = write_ledger(&dir, &[score_fixtures::ScoreFixture::default()]);

        let summary = importer(&store).run_stable_pass(&ledger, None);
        assert_eq!(summary.added, 1);
        assert_eq!(summary.beatmaps, 0);
    }

    #[test]
    fn test_double_import_adds_nothing() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let ledger = write_ledger(&dir, &[score_fixtures::ScoreFixture::default()]);

        let first = importer(&store).run_stable_pass(&ledger, None);
        assert_eq!(first.added, 1);

        let second = importer(&store).run_stable_pass(&ledger, None);
        assert_eq!(second.added, 0);
        assert_eq!(second.skipped, 1);
        assert_eq!(store.play_count().unwrap(), 1);
    }

    #[test]
    fn test_missing_ledger_is_captured_not_thrown() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let summary =
            importer(&store).run_stable_pass(Path::new("/nonexistent/scores.db"), None);
        assert_eq!(summary.added, 0);
        assert!(summary.error.is_some());
    }

    #[test]
    fn test_dynamic_pass_rescales_and_stores() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let client_db = dir.path().join("client.db");
        store_fixtures::write_flat_store(&client_db, 14);
        store_fixtures::insert_score(
            &client_db,
            "local",
            None,
            "abc",
            800_000,
            "2023-04-01T12:30:00Z",
        );
        store_fixtures::insert_beatmap(&client_db, "abc", "Song");

        let summary = importer(&store).run_dynamic_pass(&client_db, dir.path());
        assert_eq!(summary.added, 1);
        assert_eq!(summary.beatmaps, 1);

        let plays = store.recent_plays(10).unwrap();
        assert_eq!(plays[0].provenance, Provenance::DynamicImport);
        // 300 + 150 + 2 objects from the stored beatmap row.
        assert_eq!(
            plays[0].score,
            crate::normalize::classic_score(452, 800_000)
        );
        // Recorded offsets carried through and measured.
        assert_eq!(plays[0].hit_offsets, vec![-5.0, 5.0]);
        assert_eq!(plays[0].unstable_rate, 50.0);
    }

    #[test]
    fn test_dynamic_pass_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let client_db = dir.path().join("client.db");
        store_fixtures::write_flat_store(&client_db, 14);
        store_fixtures::insert_score(
            &client_db,
            "local",
            None,
            "abc",
            800_000,
            "2023-04-01T12:30:00Z",
        );

        assert_eq!(importer(&store).run_dynamic_pass(&client_db, dir.path()).added, 1);
        assert_eq!(importer(&store).run_dynamic_pass(&client_db, dir.path()).added, 0);
        assert_eq!(store.play_count().unwrap(), 1);
    }

    #[test]
    fn test_cross_source_duplicate_collapses() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        // The same physical play surfaces in the ledger (already on the
        // classic scale) and in the dynamic store (rescaled to it).
        let ledger = write_ledger(&dir, &[score_fixtures::ScoreFixture::default()]);
        importer(&store).run_stable_pass(&ledger, None);
        assert_eq!(store.play_count().unwrap(), 1);

        let summary = importer(&store).run_stable_pass(&ledger, None);
        assert_eq!(summary.added, 0);
        assert_eq!(store.play_count().unwrap(), 1);
    }
}
