//! Performance-calculation collaborator contract.
//!
//! The calculation library itself is external to this core; everything
//! here talks to it through [`PerformanceCalculator`]. When the
//! collaborator cannot be used (missing beatmap file, parse failure) the
//! annotation degrades to placeholder output instead of failing the
//! import.

mod rosu;

pub use rosu::RosuCalculator;

#[cfg(test)]
pub(crate) use rosu::fixtures as test_fixtures;

use std::path::Path;

use crate::model::{JudgementCounts, Mods};

/// Difficulty attributes after mods and clock rate are applied.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MapAttributes {
    pub approach_rate: f64,
    pub circle_size: f64,
    pub overall_difficulty: f64,
    pub drain_rate: f64,
}

/// Optional per-field attribute overrides carried into a calculation.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeOverrides {
    pub approach_rate: Option<f64>,
    pub circle_size: Option<f64>,
    pub overall_difficulty: Option<f64>,
    pub drain_rate: Option<f64>,
}

impl AttributeOverrides {
    pub fn apply(&self, attributes: &mut MapAttributes) {
        if let Some(ar) = self.approach_rate {
            attributes.approach_rate = ar;
        }
        if let Some(cs) = self.circle_size {
            attributes.circle_size = cs;
        }
        if let Some(od) = self.overall_difficulty {
            attributes.overall_difficulty = od;
        }
        if let Some(hp) = self.drain_rate {
            attributes.drain_rate = hp;
        }
    }
}

/// One performance-calculation request.
#[derive(Debug, Clone)]
pub struct PerformanceInput<'a> {
    pub beatmap_path: &'a Path,
    pub mods: Mods,
    pub judgements: JudgementCounts,
    /// Slider sub-judgements used by the modern scoring model, when the
    /// source recorded them.
    pub slider_tail_hits: Option<u32>,
    pub large_tick_hits: Option<u32>,
    pub max_combo: u32,
    pub clock_rate: f64,
    pub overrides: AttributeOverrides,
}

impl<'a> PerformanceInput<'a> {
    /// Request with the clock rate taken from the mod set.
    pub fn for_play(
        beatmap_path: &'a Path,
        mods: Mods,
        judgements: JudgementCounts,
        max_combo: u32,
    ) -> Self {
        Self {
            beatmap_path,
            mods,
            judgements,
            slider_tail_hits: None,
            large_tick_hits: None,
            max_combo,
            clock_rate: mods.clock_rate(),
            overrides: AttributeOverrides::default(),
        }
    }
}

/// Calculation result. `is_placeholder` marks degraded output from an
/// unavailable collaborator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceOutput {
    pub pp: f64,
    pub stars: f64,
    pub bpm: f64,
    pub max_combo: u32,
    pub attributes: MapAttributes,
    pub is_placeholder: bool,
}

impl PerformanceOutput {
    pub fn placeholder() -> Self {
        Self {
            is_placeholder: true,
            ..Default::default()
        }
    }
}

/// The narrow collaborator contract.
///
/// Implementations may cache a loaded context keyed by beatmap path:
/// repeated calls against the same path reuse it, switching paths tears
/// it down and rebuilds.
pub trait PerformanceCalculator {
    fn calculate(&mut self, input: &PerformanceInput<'_>) -> PerformanceOutput;
}

/// Always-unavailable collaborator: every call degrades to placeholders.
#[derive(Debug, Default)]
pub struct NullCalculator;

impl PerformanceCalculator for NullCalculator {
    fn calculate(&mut self, _input: &PerformanceInput<'_>) -> PerformanceOutput {
        PerformanceOutput::placeholder()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_calculator_is_placeholder() {
        let mut calculator = NullCalculator;
        let input = PerformanceInput::for_play(
            Path::new("/nonexistent.osu"),
            Mods::NONE,
            JudgementCounts::default(),
            0,
        );
        let output = calculator.calculate(&input);
        assert!(output.is_placeholder);
        assert_eq!(output.pp, 0.0);
    }

    #[test]
    fn test_for_play_resolves_clock_rate() {
        let input = PerformanceInput::for_play(
            Path::new("x.osu"),
            Mods::from_acronyms(&["DT"]),
            JudgementCounts::default(),
            0,
        );
        assert_eq!(input.clock_rate, 1.5);
    }

    #[test]
    fn test_overrides_apply_only_set_fields() {
        let mut attributes = MapAttributes {
            approach_rate: 9.0,
            circle_size: 4.0,
            overall_difficulty: 8.0,
            drain_rate: 6.0,
        };
        let overrides = AttributeOverrides {
            approach_rate: Some(10.0),
            ..Default::default()
        };
        overrides.apply(&mut attributes);
        assert_eq!(attributes.approach_rate, 10.0);
        assert_eq!(attributes.circle_size, 4.0);
    }
}
