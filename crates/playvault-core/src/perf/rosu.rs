//! rosu-pp backed performance calculator.

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::perf::{
    MapAttributes, PerformanceCalculator, PerformanceInput, PerformanceOutput,
};

/// Calculator with a per-path context cache: the parsed beatmap is reused
/// while consecutive calls target the same path and rebuilt on a switch.
#[derive(Default)]
pub struct RosuCalculator {
    cached: Option<(PathBuf, rosu_pp::Beatmap)>,
}

impl RosuCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn cached_path(&self) -> Option<&PathBuf> {
        self.cached.as_ref().map(|(path, _)| path)
    }

    fn context_for(&mut self, path: &std::path::Path) -> Option<&rosu_pp::Beatmap> {
        let stale = match &self.cached {
            Some((cached_path, _)) => cached_path != path,
            None => true,
        };

        if stale {
            self.cached = None;
            match rosu_pp::Beatmap::from_path(path) {
                Ok(map) => {
                    debug!(?path, "loaded beatmap context");
                    self.cached = Some((path.to_path_buf(), map));
                }
                Err(e) => {
                    warn!(?path, "beatmap context unavailable: {e}");
                    return None;
                }
            }
        }

        self.cached.as_ref().map(|(_, map)| map)
    }
}

impl PerformanceCalculator for RosuCalculator {
    fn calculate(&mut self, input: &PerformanceInput<'_>) -> PerformanceOutput {
        let mods = input.mods.bits();
        let clock_rate = input.clock_rate;

        let Some(map) = self.context_for(input.beatmap_path) else {
            return PerformanceOutput::placeholder();
        };

        let difficulty = rosu_pp::Difficulty::new()
            .mods(mods)
            .clock_rate(clock_rate)
            .calculate(map);
        let stars = difficulty.stars();
        let map_max_combo = difficulty.max_combo();

        let judgements = input.judgements;
        let mut performance = rosu_pp::Performance::new(difficulty)
            .mods(mods)
            .clock_rate(clock_rate)
            .combo(input.max_combo)
            .n300(judgements.c300)
            .n100(judgements.c100)
            .n50(judgements.c50)
            .misses(judgements.miss);
        if let Some(tails) = input.slider_tail_hits {
            performance = performance.slider_end_hits(tails);
        }
        if let Some(ticks) = input.large_tick_hits {
            performance = performance.large_tick_hits(ticks);
        }
        let pp = performance.calculate().pp();

        let built = map
            .attributes()
            .mods(mods)
            .clock_rate(clock_rate)
            .build();
        let mut attributes = MapAttributes {
            approach_rate: built.ar,
            circle_size: built.cs,
            overall_difficulty: built.od,
            drain_rate: built.hp,
        };
        input.overrides.apply(&mut attributes);

        let bpm = map
            .timing_points
            .first()
            .map(|point| 60_000.0 / point.beat_len * clock_rate)
            .unwrap_or(0.0);

        PerformanceOutput {
            pp,
            stars,
            bpm,
            max_combo: map_max_combo,
            attributes,
            is_placeholder: false,
        }
    }
}
