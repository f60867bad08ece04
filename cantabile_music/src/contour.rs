// Phrase contour targets and period-level climax planning.
//
// `PhraseContour` gives each phrase a soft melodic shape: a start, a
// climax and an end target, interpolated slot by slot in diatonic-step
// space. The scorer rewards candidates near the current target; nothing
// here is a hard rule.
//
// Climax planning is hard. One measure of the period is chosen as the
// climax (from `climax_position`, never the final measure) and its highest
// fitting chord tone becomes the climax pitch. `ClimaxState` is the
// accumulator the assembler threads through the pitch loop:
//
// - the register ceiling rises toward the climax over the three measures
//   before it, by up to `round((intensity - 1) * 8)` semitones;
// - every other note stays strictly below the climax pitch;
// - before the climax a rising floor keeps the climax pitch within reach;
// - after the climax the ceiling falls back to the base ambitus.
//
// The climax slot itself is forced by the assembler and recorded here so
// the finished period can report whether the plan was met.

use crate::harmony::HarmonicFunction;
use crate::period::{ClimaxSummary, PhraseRole};
use crate::tonal::{ScalePitch, TonalContext};
use serde::{Deserialize, Serialize};

/// Measures over which the ceiling ramps up before the climax.
const RAMP_MEASURES: usize = 3;

/// Inclusive MIDI pitch range a note must fall in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeWindow {
    pub low: u8,
    pub high: u8,
}

impl RangeWindow {
    pub fn new(low: u8, high: u8) -> Self {
        RangeWindow { low, high }
    }

    pub fn contains(&self, pitch: u8) -> bool {
        (self.low..=self.high).contains(&pitch)
    }

    pub fn center(&self) -> f64 {
        (self.low as f64 + self.high as f64) / 2.0
    }

    pub fn half_span(&self) -> f64 {
        ((self.high as f64 - self.low as f64) / 2.0).max(1.0)
    }
}

/// Soft shape of one phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseContour {
    pub start: ScalePitch,
    pub climax: ScalePitch,
    pub end: ScalePitch,
    /// Where the climax target falls, as a fraction of the phrase. Stored
    /// in thousandths so the type stays `Eq`.
    pub climax_permille: u16,
}

impl PhraseContour {
    /// Default shape by role. Antecedents rise to the upper tonic and settle
    /// on the dominant; consequents arch gently from tonic to tonic.
    pub fn for_role(role: PhraseRole) -> Self {
        match role {
            PhraseRole::Antecedent => PhraseContour {
                start: ScalePitch::new(1, 4),
                climax: ScalePitch::new(1, 5),
                end: ScalePitch::new(5, 4),
                climax_permille: 600,
            },
            PhraseRole::Consequent | PhraseRole::Extension => PhraseContour {
                start: ScalePitch::new(1, 4),
                climax: ScalePitch::new(6, 4),
                end: ScalePitch::new(1, 4),
                climax_permille: 500,
            },
        }
    }

    /// Replace the climax target, for the phrase holding the period climax.
    pub fn with_climax(mut self, position: f64, pitch: ScalePitch) -> Self {
        self.climax = pitch;
        self.climax_permille = (position.clamp(0.0, 1.0) * 1000.0).round() as u16;
        self
    }

    pub fn climax_position(&self) -> f64 {
        self.climax_permille as f64 / 1000.0
    }

    /// One target per slot, interpolated in step space: start to climax,
    /// then climax to end.
    pub fn plan_targets(&self, n: usize) -> Vec<ScalePitch> {
        if n == 0 {
            return Vec::new();
        }
        if n == 1 {
            return vec![self.end];
        }
        let (s, c, e) = (
            self.start.step() as f64,
            self.climax.step() as f64,
            self.end.step() as f64,
        );
        let pos = self.climax_position();
        (0..n)
            .map(|i| {
                let t = i as f64 / (n - 1) as f64;
                let step = if pos <= 0.0 {
                    c + (e - c) * t
                } else if t <= pos {
                    s + (c - s) * (t / pos)
                } else if pos >= 1.0 {
                    c
                } else {
                    c + (e - c) * ((t - pos) / (1.0 - pos))
                };
                ScalePitch::from_step(step.round() as i32)
            })
            .collect()
    }
}

/// Where and how high the period peaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClimaxPlan {
    pub measure: usize,
    /// MIDI pitch of the climax note.
    pub pitch: u8,
    /// Semitones the ceiling may rise above the base ambitus.
    pub extra: u8,
}

/// Choose the climax measure and pitch.
///
/// The measure is `floor(measures * position)`, kept off the final measure.
/// The pitch is the highest chord tone of that measure's harmony at or below
/// the raised ceiling.
pub fn plan_climax(
    position: f64,
    intensity: f64,
    progression: &[HarmonicFunction],
    tonal: &dyn TonalContext,
    base: RangeWindow,
) -> ClimaxPlan {
    let n = progression.len().max(2);
    let measure = ((n as f64 * position.clamp(0.0, 1.0)).floor() as usize).min(n - 2);
    let extra = ((intensity - 1.0).max(0.0) * 8.0).round() as u8;
    let ceiling = base.high.saturating_add(extra).min(127);
    let harmony = progression
        .get(measure)
        .copied()
        .unwrap_or(HarmonicFunction::I);
    let tones = tonal.chord_tones(harmony);
    let pitch = (base.low..=ceiling)
        .rev()
        .find(|&p| {
            tonal
                .pitch_to_degree(p)
                .is_some_and(|sp| tones.contains(&sp.degree))
        })
        .unwrap_or(ceiling);
    ClimaxPlan {
        measure,
        pitch,
        extra,
    }
}

/// Register bookkeeping threaded through the pitch loop.
#[derive(Debug, Clone)]
pub struct ClimaxState {
    plan: ClimaxPlan,
    base: RangeWindow,
    slot: Option<usize>,
    reached: bool,
}

impl ClimaxState {
    pub fn new(plan: ClimaxPlan, base: RangeWindow) -> Self {
        ClimaxState {
            plan,
            base,
            slot: None,
            reached: false,
        }
    }

    pub fn plan(&self) -> &ClimaxPlan {
        &self.plan
    }

    /// Fix the slot (index in the period's slot list) that carries the
    /// climax. `None` if the climax measure had no usable slot.
    pub fn set_slot(&mut self, slot: Option<usize>) {
        self.slot = slot;
    }

    pub fn slot(&self) -> Option<usize> {
        self.slot
    }

    pub fn is_climax_slot(&self, slot: usize) -> bool {
        self.slot == Some(slot)
    }

    /// Range window for any slot other than the climax slot.
    ///
    /// `distance` counts sounding slots from this one up to the climax slot
    /// (1 for the note right before it); `None` once the climax is behind.
    pub fn window(
        &self,
        slot: usize,
        measure: usize,
        distance: Option<usize>,
        max_interval: u8,
    ) -> RangeWindow {
        let Some(climax_slot) = self.slot else {
            return self.base;
        };
        let cap = self.plan.pitch.saturating_sub(1);
        if slot > climax_slot {
            return RangeWindow::new(self.base.low, self.base.high.min(cap));
        }

        let ahead = self.plan.measure.saturating_sub(measure);
        let ramp = if ahead <= RAMP_MEASURES {
            1.0 - ahead as f64 / (RAMP_MEASURES + 1) as f64
        } else {
            0.0
        };
        let raise = (self.plan.extra as f64 * ramp).round() as u8;
        let high = self.base.high.saturating_add(raise).min(cap);

        let mut low = self.base.low as i32;
        if let Some(d) = distance {
            let reach = self.plan.pitch as i32 - 12 - (d.max(1) as i32 - 1) * max_interval as i32;
            low = low.max(reach);
        }
        let low = low.clamp(0, high as i32) as u8;
        // Keep at least an octave so every degree has a home.
        let low = low.min(high.saturating_sub(11));
        RangeWindow::new(low, high)
    }

    /// Note that the climax slot sounded at `pitch`.
    pub fn record(&mut self, slot: usize, pitch: u8) {
        if self.is_climax_slot(slot) && pitch == self.plan.pitch {
            self.reached = true;
        }
    }

    pub fn reached(&self) -> bool {
        self.reached
    }

    pub fn summary(&self) -> ClimaxSummary {
        ClimaxSummary {
            measure: self.plan.measure,
            pitch: self.plan.pitch,
            reached: self.reached,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harmony::progression;
    use crate::period::plan_layout;
    use crate::tonal::{Mode, Tonality};

    fn c_major() -> Tonality {
        Tonality::new(Mode::Major, 0)
    }

    fn base() -> RangeWindow {
        let (low, high) = c_major().ambitus();
        RangeWindow::new(low, high)
    }

    #[test]
    fn test_targets_interpolate_through_climax() {
        let contour = PhraseContour::for_role(PhraseRole::Antecedent);
        let targets = contour.plan_targets(6);
        assert_eq!(targets.len(), 6);
        assert_eq!(targets[0], ScalePitch::new(1, 4));
        assert_eq!(targets[5], ScalePitch::new(5, 4));
        let peak = targets.iter().map(|t| t.step()).max().unwrap();
        assert_eq!(peak, ScalePitch::new(1, 5).step());
        assert_eq!(targets[3].step(), peak, "climax at 0.6 of 5 gaps lands on slot 3");
    }

    #[test]
    fn test_with_climax_overrides_target() {
        let contour = PhraseContour::for_role(PhraseRole::Consequent)
            .with_climax(0.25, ScalePitch::new(3, 5));
        let targets = contour.plan_targets(5);
        assert_eq!(targets[1], ScalePitch::new(3, 5));
        assert_eq!(targets[4], ScalePitch::new(1, 4));
    }

    #[test]
    fn test_single_slot_targets_end() {
        let contour = PhraseContour::for_role(PhraseRole::Antecedent);
        assert_eq!(contour.plan_targets(1), vec![ScalePitch::new(5, 4)]);
        assert!(contour.plan_targets(0).is_empty());
    }

    #[test]
    fn test_climax_plan_eight_measures() {
        let prog = progression(&plan_layout(8).unwrap());
        let plan = plan_climax(0.75, 1.5, &prog, &c_major(), base());
        assert_eq!(plan.measure, 6);
        assert_eq!(plan.extra, 4);
        // Measure 6 is IV in the template: F, A, C. Highest at or under 81
        // is A5.
        assert_eq!(plan.pitch, 81);
    }

    #[test]
    fn test_climax_never_on_final_measure() {
        let prog = progression(&plan_layout(4).unwrap());
        let plan = plan_climax(1.0, 1.0, &prog, &c_major(), base());
        assert_eq!(plan.measure, 2);
        let prog = progression(&plan_layout(2).unwrap());
        assert_eq!(plan_climax(0.9, 1.0, &prog, &c_major(), base()).measure, 0);
    }

    #[test]
    fn test_window_caps_below_climax_and_reverts() {
        let prog = progression(&plan_layout(8).unwrap());
        let plan = plan_climax(0.75, 1.5, &prog, &c_major(), base());
        let mut state = ClimaxState::new(plan, base());
        state.set_slot(Some(40));

        let far = state.window(2, 1, Some(38), 9);
        assert_eq!(far, base(), "no ramp four or more measures out");

        let near = state.window(38, 5, Some(2), 9);
        assert!(near.high > base().high && near.high < plan.pitch);
        assert_eq!(near.low, (plan.pitch - 12 - 9).max(base().low));

        let adjacent = state.window(39, 6, Some(1), 9);
        assert_eq!(adjacent.low, plan.pitch - 12);
        assert_eq!(adjacent.high, plan.pitch - 1);

        let after = state.window(41, 6, None, 9);
        assert_eq!(after, RangeWindow::new(base().low, base().high));

        state.record(40, plan.pitch);
        assert!(state.summary().reached);
    }
}
