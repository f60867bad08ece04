// Scoring criteria for melodic candidates.
//
// Every criterion maps a candidate to [0, 1]; the scorer combines them with
// `ScoringWeights` into one weighted sum per candidate. Criteria are pure
// functions of the candidate and the melodic context, so they can be tested
// one at a time:
//
// - voice leading: size of the move from the previous note
// - harmonic fit: chord tone or not, scaled by metric weight
// - contour: distance to the phrase's target pitch
// - tendency: did the previous tendency tone resolve?
// - learned probability: the composer model's opinion, if enabled
// - variety: penalize degrees used a lot in the last few notes
// - range: stay near the middle of the window
//
// On top of the weighted sum, `emphasis` scales candidates on the tonic or
// on the mode's characteristic degree when the corrector asked for it.
//
// Consumed by scorer.rs. Hard constraints (window, interval limit, leap
// recovery) are applied before scoring and never appear here.

use crate::contour::RangeWindow;
use crate::meter::MetricWeight;
use crate::tonal::ScalePitch;
use std::collections::BTreeMap;

/// Recent notes consulted by the variety criterion.
pub const VARIETY_WINDOW: usize = 8;

/// Criterion weights. They sum to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringWeights {
    pub voice_leading: f64,
    pub harmonic: f64,
    pub contour: f64,
    pub tendency: f64,
    pub learned: f64,
    pub variety: f64,
    pub range: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        ScoringWeights {
            voice_leading: 0.28,
            harmonic: 0.22,
            contour: 0.15,
            tendency: 0.12,
            learned: 0.10,
            variety: 0.08,
            range: 0.05,
        }
    }
}

impl ScoringWeights {
    /// Give the learned-probability criterion exactly `blend` of the total
    /// and rescale the others to fill the rest. `blend = 0` drops the model
    /// from the sum entirely.
    pub fn blended(&self, blend: f64) -> ScoringWeights {
        let blend = blend.clamp(0.0, 1.0);
        let others = 1.0 - self.learned;
        let scale = if others > 0.0 { (1.0 - blend) / others } else { 0.0 };
        ScoringWeights {
            voice_leading: self.voice_leading * scale,
            harmonic: self.harmonic * scale,
            contour: self.contour * scale,
            tendency: self.tendency * scale,
            learned: blend,
            variety: self.variety * scale,
            range: self.range * scale,
        }
    }

    pub fn total(&self) -> f64 {
        self.voice_leading
            + self.harmonic
            + self.contour
            + self.tendency
            + self.learned
            + self.variety
            + self.range
    }
}

/// Per-criterion values for one candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CriterionScores {
    pub voice_leading: f64,
    pub harmonic: f64,
    pub contour: f64,
    pub tendency: f64,
    pub learned: f64,
    pub variety: f64,
    pub range: f64,
}

impl CriterionScores {
    pub fn weighted(&self, w: &ScoringWeights) -> f64 {
        self.voice_leading * w.voice_leading
            + self.harmonic * w.harmonic
            + self.contour * w.contour
            + self.tendency * w.tendency
            + self.learned * w.learned
            + self.variety * w.variety
            + self.range * w.range
    }
}

// ── Voice leading ──

/// Smooth motion scores highest; a repeated note is tolerable, large leaps
/// are not.
pub fn voice_leading(previous: Option<u8>, pitch: u8) -> f64 {
    let Some(prev) = previous else {
        return 0.8;
    };
    match prev.abs_diff(pitch) {
        0 => 0.6,
        1..=2 => 1.0,
        3..=4 => 0.85,
        5..=6 => 0.7,
        7 => 0.5,
        8..=9 => 0.3,
        _ => 0.1,
    }
}

// ── Harmonic fit ──

pub fn harmonic_fit(is_chord_tone: bool, weight: MetricWeight) -> f64 {
    match (weight, is_chord_tone) {
        (MetricWeight::Strong, true) => 1.0,
        (MetricWeight::Strong, false) => 0.3,
        (MetricWeight::Secondary, true) => 0.9,
        (MetricWeight::Secondary, false) => 0.5,
        (MetricWeight::Weak, true) => 0.8,
        (MetricWeight::Weak, false) => 0.7,
    }
}

// ── Contour ──

/// Closeness to the target in diatonic steps. Emphasis slots (strong
/// positions) want the target exactly; elsewhere the reward falls off
/// gently.
pub fn contour(target: Option<ScalePitch>, candidate: ScalePitch, emphasis: bool) -> f64 {
    let Some(target) = target else {
        return 0.5;
    };
    let d = (candidate.step() - target.step()).unsigned_abs();
    if emphasis {
        match d {
            0 => 1.0,
            1 => 0.6,
            _ => 0.2,
        }
    } else {
        (1.0 - 0.15 * d as f64).max(0.3)
    }
}

// ── Tendency tones ──

/// Resolution target and (resolved, unresolved) scores for a tendency
/// degree.
fn tendency_rule(degree: u8) -> Option<(u8, f64, f64)> {
    match degree {
        7 => Some((1, 1.0, 0.2)),
        4 => Some((3, 0.9, 0.4)),
        2 => Some((1, 0.85, 0.5)),
        6 => Some((5, 0.8, 0.6)),
        _ => None,
    }
}

/// A tendency tone resolves when the next note is its target degree a
/// step away.
pub fn tendency(previous: Option<ScalePitch>, candidate: ScalePitch) -> f64 {
    let Some(prev) = previous else {
        return 0.7;
    };
    let Some((target, resolved, unresolved)) = tendency_rule(prev.degree) else {
        return 0.7;
    };
    let stepwise = (candidate.step() - prev.step()).abs() == 1;
    if candidate.degree == target && stepwise {
        resolved
    } else {
        unresolved
    }
}

// ── Learned probability ──

/// `p / max p` under the model's distribution; 0.5 with no opinion.
pub fn learned(distribution: Option<&BTreeMap<u8, f64>>, degree: u8) -> f64 {
    let Some(dist) = distribution else {
        return 0.5;
    };
    let max = dist.values().copied().fold(0.0, f64::max);
    if max <= 0.0 {
        return 0.5;
    }
    dist.get(&degree).copied().unwrap_or(0.0) / max
}

// ── Variety ──

/// Penalize overused degrees; halve again for a third note in a row on
/// the same degree.
pub fn variety(recent: &[u8], degree: u8) -> f64 {
    let window = &recent[recent.len().saturating_sub(VARIETY_WINDOW)..];
    let count = window.iter().filter(|&&d| d == degree).count();
    let base = match count {
        0 => 1.0,
        1 => 0.8,
        2 => 0.5,
        _ => 0.2,
    };
    let third_in_row = recent.len() >= 2 && recent[recent.len() - 2..].iter().all(|&d| d == degree);
    if third_in_row { base * 0.5 } else { base }
}

// ── Range ──

pub fn range(pitch: u8, window: RangeWindow) -> f64 {
    let normalized = (pitch as f64 - window.center()).abs() / window.half_span();
    (1.0 - 0.5 * normalized).max(0.2)
}

// ── Emphasis ──

/// Multiplier for the characteristic degree under modal emphasis.
pub const MODAL_EMPHASIS: f64 = 1.25;

/// Factor applied to a candidate's weighted score: `tonic` on degree 1,
/// `MODAL_EMPHASIS` on the emphasized modal degree, both when they coincide.
pub fn emphasis(degree: u8, tonic: f64, modal: Option<u8>) -> f64 {
    let mut factor = 1.0;
    if degree == 1 {
        factor *= tonic;
    }
    if modal == Some(degree) {
        factor *= MODAL_EMPHASIS;
    }
    factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_one() {
        let w = ScoringWeights::default();
        assert!((w.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_blend_gives_model_its_share() {
        let w = ScoringWeights::default().blended(0.3);
        assert!((w.learned - 0.3).abs() < 1e-12);
        assert!((w.total() - 1.0).abs() < 1e-9);
        // Relative proportions of the rest are unchanged.
        assert!((w.voice_leading / w.harmonic - 0.28 / 0.22).abs() < 1e-9);

        let none = ScoringWeights::default().blended(0.0);
        assert_eq!(none.learned, 0.0);
        assert!((none.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_voice_leading_table() {
        assert_eq!(voice_leading(None, 60), 0.8);
        assert_eq!(voice_leading(Some(60), 60), 0.6);
        assert_eq!(voice_leading(Some(60), 62), 1.0);
        assert_eq!(voice_leading(Some(60), 56), 0.85);
        assert_eq!(voice_leading(Some(60), 67), 0.5);
        assert_eq!(voice_leading(Some(60), 69), 0.3);
        assert_eq!(voice_leading(Some(60), 72), 0.1);
    }

    #[test]
    fn test_harmonic_fit_prefers_chord_tones_on_strong_beats() {
        assert!(
            harmonic_fit(true, MetricWeight::Strong) - harmonic_fit(false, MetricWeight::Strong)
                > harmonic_fit(true, MetricWeight::Weak) - harmonic_fit(false, MetricWeight::Weak)
        );
    }

    #[test]
    fn test_contour_emphasis() {
        let target = Some(ScalePitch::new(5, 4));
        assert_eq!(contour(target, ScalePitch::new(5, 4), true), 1.0);
        assert_eq!(contour(target, ScalePitch::new(6, 4), true), 0.6);
        assert_eq!(contour(target, ScalePitch::new(1, 5), true), 0.2);
        assert!((contour(target, ScalePitch::new(3, 4), false) - 0.7).abs() < 1e-9);
        assert_eq!(contour(target, ScalePitch::new(5, 2), false), 0.3);
        assert_eq!(contour(None, ScalePitch::new(5, 2), false), 0.5);
    }

    #[test]
    fn test_leading_tone_wants_the_tonic() {
        let lt = Some(ScalePitch::new(7, 4));
        assert_eq!(tendency(lt, ScalePitch::new(1, 5)), 1.0);
        assert_eq!(tendency(lt, ScalePitch::new(1, 4)), 0.2, "tonic an octave away");
        assert_eq!(tendency(lt, ScalePitch::new(5, 4)), 0.2);
        assert_eq!(tendency(Some(ScalePitch::new(4, 4)), ScalePitch::new(3, 4)), 0.9);
        assert_eq!(tendency(Some(ScalePitch::new(3, 4)), ScalePitch::new(2, 4)), 0.7);
    }

    #[test]
    fn test_learned_is_relative_to_mode() {
        let dist: BTreeMap<u8, f64> = [(1, 0.5), (5, 0.25), (3, 0.25)].into_iter().collect();
        assert_eq!(learned(Some(&dist), 1), 1.0);
        assert_eq!(learned(Some(&dist), 5), 0.5);
        assert_eq!(learned(Some(&dist), 7), 0.0);
        assert_eq!(learned(None, 7), 0.5);
    }

    #[test]
    fn test_variety_penalizes_repetition() {
        assert_eq!(variety(&[], 1), 1.0);
        assert_eq!(variety(&[1, 2, 3], 1), 0.8);
        assert_eq!(variety(&[1, 3, 1, 2], 1), 0.5);
        // Two in a row already: the third is halved.
        assert_eq!(variety(&[2, 1, 1], 1), 0.25);
        // Only the last eight count.
        assert_eq!(variety(&[1, 1, 1, 2, 3, 4, 5, 6, 7, 2, 3], 1), 1.0);
    }

    #[test]
    fn test_range_prefers_center() {
        let w = RangeWindow::new(60, 72);
        assert_eq!(range(66, w), 1.0);
        assert_eq!(range(72, w), 0.5);
        assert!(range(60, w) < range(64, w));
    }

    #[test]
    fn test_emphasis_factors() {
        assert_eq!(emphasis(3, 1.0, None), 1.0);
        assert_eq!(emphasis(1, 1.5, None), 1.5);
        assert_eq!(emphasis(1, 1.5, Some(6)), 1.5);
        assert_eq!(emphasis(6, 1.5, Some(6)), MODAL_EMPHASIS);
        assert_eq!(emphasis(1, 2.0, Some(1)), 2.0 * MODAL_EMPHASIS);
    }
}
