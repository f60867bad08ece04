// Melodic scorer: picks one pitch per rhythmic slot.
//
// For an ordinary slot the scorer
//
// 1. generates candidates: chord tones of the active harmony in every
//    octave of the range window, plus (off the strong positions) the scale
//    neighbors of the previous note as passing or neighbor tones;
// 2. filters them through the hard constraints: interval limit and leap
//    recovery (the window is already applied by generation);
// 3. takes a motif degree hint if a survivor matches it;
// 4. otherwise scores the survivors with the criteria in scoring.rs and
//    takes the best, breaking ties toward chord tones, then smaller
//    intervals, then a uniform draw.
//
// The note right after an infraction is its compensation. Strong slots can
// also be claimed by a tenoris note or an infraction roll. If nothing
// survives the constraints the slot falls back to the nearest chord tone,
// which always exists.
//
// `MelodicState` is owned by the assembler and carries everything that
// spans slots: previous note, direction, degree history, the open leap
// obligation and any pending compensation. The scorer never mutates it;
// the assembler commits each placed note.

use crate::contour::RangeWindow;
use crate::harmony::HarmonicFunction;
use crate::meter::MetricWeight;
use crate::period::{Decision, NoteRole};
use crate::probability::TransitionModel;
use crate::scoring::{self, CriterionScores, ScoringWeights};
use crate::tonal::{ScalePitch, TonalContext};
use cantabile_prng::SeededRng;
use std::collections::BTreeMap;
use tracing::warn;

/// Moves larger than this (in semitones) are leaps that must be recovered.
pub const LEAP_THRESHOLD: u8 = 4;

/// Scores closer than this are treated as equal.
const TIE_EPSILON: f64 = 1e-9;

/// An unrecovered leap. `remaining` counts the notes left to step back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeapObligation {
    pub direction: i8,
    pub remaining: u8,
}

/// Cross-slot melodic memory.
#[derive(Debug, Clone, Default)]
pub struct MelodicState {
    pub previous: Option<u8>,
    pub previous_pitch: Option<ScalePitch>,
    /// Sign of the last non-repeated move.
    pub direction: i8,
    /// Degrees of every sounding note so far.
    pub degrees: Vec<u8>,
    pub leap: Option<LeapObligation>,
    /// Direction of the previous note if it was an infraction.
    pub pending_compensation: Option<i8>,
}

impl MelodicState {
    pub fn new() -> Self {
        MelodicState::default()
    }

    /// Record a placed note.
    pub fn commit(&mut self, choice: &Choice) {
        let delta = self.previous.map(|p| choice.midi as i32 - p as i32);

        if let Some(delta) = delta {
            let dir = delta.signum() as i8;
            self.leap = if delta.unsigned_abs() > LEAP_THRESHOLD as u32 {
                Some(LeapObligation {
                    direction: dir,
                    remaining: 2,
                })
            } else {
                match self.leap {
                    Some(ob) if is_step_against(delta, ob.direction) => None,
                    Some(ob) if ob.remaining > 1 => Some(LeapObligation {
                        remaining: ob.remaining - 1,
                        ..ob
                    }),
                    _ => None,
                }
            };
            if dir != 0 {
                self.direction = dir;
            }
        }

        // Any note after an infraction settles it, overrides included.
        self.pending_compensation = choice.infraction.then(|| match delta {
            Some(d) if d != 0 => d.signum() as i8,
            _ => choice.pitch.alteration.signum(),
        });

        self.previous = Some(choice.midi);
        self.previous_pitch = Some(choice.pitch);
        self.degrees.push(choice.pitch.degree);
    }
}

fn is_step_against(delta: i32, leap_direction: i8) -> bool {
    (1..=2).contains(&delta.unsigned_abs()) && delta.signum() as i8 == -leap_direction
}

/// What the scorer needs to know about one slot.
#[derive(Debug, Clone, Copy)]
pub struct SlotContext {
    pub harmony: HarmonicFunction,
    pub weight: MetricWeight,
    pub window: RangeWindow,
    /// Soft contour target.
    pub target: Option<ScalePitch>,
    /// Degree the motif wants here, if any.
    pub hint: Option<u8>,
}

/// A placed pitch and the reason for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Choice {
    pub pitch: ScalePitch,
    pub midi: u8,
    pub role: NoteRole,
    pub decision: Decision,
    pub infraction: bool,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    pitch: ScalePitch,
    midi: u8,
    chord: bool,
    role: NoteRole,
}

impl Candidate {
    fn choice(&self, decision: Decision) -> Choice {
        Choice {
            pitch: self.pitch,
            midi: self.midi,
            role: self.role,
            decision,
            infraction: false,
        }
    }
}

pub struct MelodicScorer<'a> {
    tonal: &'a dyn TonalContext,
    weights: ScoringWeights,
    model: Option<&'a TransitionModel>,
    max_interval: u8,
    infraction_rate: f64,
    tenoris_probability: Option<f64>,
    tonic_emphasis: f64,
    modal_degree: Option<u8>,
}

impl<'a> MelodicScorer<'a> {
    pub fn new(tonal: &'a dyn TonalContext, max_interval: u8) -> Self {
        MelodicScorer {
            tonal,
            weights: ScoringWeights::default().blended(0.0),
            model: None,
            max_interval,
            infraction_rate: 0.0,
            tenoris_probability: None,
            tonic_emphasis: 1.0,
            modal_degree: None,
        }
    }

    /// Blend the model's degree distribution in at `blend` of the total.
    pub fn with_model(mut self, model: Option<&'a TransitionModel>, blend: f64) -> Self {
        self.model = model;
        let share = if model.is_some() { blend } else { 0.0 };
        self.weights = ScoringWeights::default().blended(share);
        self
    }

    pub fn with_infractions(mut self, rate: f64) -> Self {
        self.infraction_rate = rate;
        self
    }

    pub fn with_tenoris(mut self, probability: Option<f64>) -> Self {
        self.tenoris_probability = probability;
        self
    }

    /// Scale scores on the tonic by `tonic` and, if given, on the modal
    /// degree by `scoring::MODAL_EMPHASIS`.
    pub fn with_emphasis(mut self, tonic: f64, modal_degree: Option<u8>) -> Self {
        self.tonic_emphasis = tonic;
        self.modal_degree = modal_degree;
        self
    }

    /// Choose the pitch for an ordinary slot.
    pub fn choose(&self, state: &MelodicState, slot: &SlotContext, rng: &mut SeededRng) -> Choice {
        if let Some(dir) = state.pending_compensation {
            return self.compensate(state, slot, dir);
        }
        if slot.weight == MetricWeight::Strong {
            if let Some(p) = self.tenoris_probability
                && slot.harmony.contains(5)
                && rng.random_bool(p)
            {
                return self.place_degree(state, slot.window, 5, Decision::Tenoris, NoteRole::Tenoris);
            }
            if self.infraction_rate > 0.0
                && rng.random_bool(self.infraction_rate)
                && let Some(choice) = self.infraction(state, slot, rng)
            {
                return choice;
            }
        }

        let survivors = self.constrain(state, self.candidates(state, slot));
        if survivors.is_empty() {
            return self.fallback(state, slot);
        }

        let mut target = slot.target;
        if let Some(hint) = slot.hint {
            let reference = state.previous.unwrap_or(slot.window.center() as u8);
            let matching = survivors
                .iter()
                .filter(|c| c.pitch.degree == hint)
                .min_by_key(|c| (c.midi.abs_diff(reference), c.midi));
            if let Some(c) = matching {
                return c.choice(Decision::Motif);
            }
            target = Some(hint_target(hint, slot.target, state.previous_pitch));
        }

        self.select(state, slot, target, &survivors, rng)
            .unwrap_or_else(|| self.fallback(state, slot))
    }

    /// Place `degree` in the octave nearest the previous note. Used for
    /// cadence and tenoris overrides.
    pub fn place_degree(
        &self,
        state: &MelodicState,
        window: RangeWindow,
        degree: u8,
        decision: Decision,
        role: NoteRole,
    ) -> Choice {
        let reference = state.previous.unwrap_or(window.center() as u8);
        let (midi, pitch) = self
            .nearest(Some(window), reference, |sp| sp.degree == degree)
            .or_else(|| self.nearest(None, reference, |sp| sp.degree == degree))
            .unwrap_or_else(|| {
                let sp = ScalePitch::new(degree, 4);
                (self.tonal.pitch_of(sp), sp)
            });
        Choice {
            pitch,
            midi,
            role,
            decision,
            infraction: false,
        }
    }

    /// An exact pitch chosen by the caller (the climax note).
    pub fn force(&self, midi: u8, decision: Decision) -> Choice {
        let pitch = self
            .tonal
            .pitch_to_degree(midi)
            .unwrap_or_else(|| ScalePitch::new(1, 4));
        Choice {
            pitch,
            midi,
            role: NoteRole::Structural,
            decision,
            infraction: false,
        }
    }

    fn candidates(&self, state: &MelodicState, slot: &SlotContext) -> Vec<Candidate> {
        let tones = self.tonal.chord_tones(slot.harmony);
        let mut out: Vec<Candidate> = (slot.window.low..=slot.window.high)
            .filter_map(|midi| {
                let sp = self.tonal.pitch_to_degree(midi)?;
                tones.contains(&sp.degree).then_some(Candidate {
                    pitch: sp,
                    midi,
                    chord: true,
                    role: NoteRole::Structural,
                })
            })
            .collect();

        if slot.weight != MetricWeight::Strong
            && let Some(prev) = state.previous_pitch
        {
            let base = ScalePitch::new(prev.degree, prev.octave);
            for dir in [-1i32, 1] {
                let sp = ScalePitch::from_step(base.step() + dir);
                let midi = self.tonal.pitch_of(sp);
                if !slot.window.contains(midi) || out.iter().any(|c| c.midi == midi) {
                    continue;
                }
                let continuing = state.direction != 0 && dir as i8 == state.direction;
                out.push(Candidate {
                    pitch: sp,
                    midi,
                    chord: false,
                    role: if continuing {
                        NoteRole::Passing
                    } else {
                        NoteRole::Neighbor
                    },
                });
            }
        }
        out
    }

    /// Interval limit and leap recovery.
    fn constrain(&self, state: &MelodicState, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let Some(prev) = state.previous else {
            return candidates;
        };
        let delta = |c: &Candidate| c.midi as i32 - prev as i32;
        let within: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| prev.abs_diff(c.midi) <= self.max_interval)
            .collect();

        let Some(ob) = state.leap else {
            return within;
        };
        let step_back: Vec<Candidate> = within
            .iter()
            .filter(|c| is_step_against(delta(*c), ob.direction))
            .copied()
            .collect();
        if !step_back.is_empty() || ob.remaining <= 1 {
            return step_back;
        }
        // No step back available yet: hold off for one note, but do not
        // continue the leap's direction or leap again.
        within
            .into_iter()
            .filter(|c| {
                let d = delta(c);
                d.signum() as i8 != ob.direction && d.unsigned_abs() <= LEAP_THRESHOLD as u32
            })
            .collect()
    }

    fn select(
        &self,
        state: &MelodicState,
        slot: &SlotContext,
        target: Option<ScalePitch>,
        survivors: &[Candidate],
        rng: &mut SeededRng,
    ) -> Option<Choice> {
        let distribution = self.model.map(|m| {
            let order = m.order.max(1);
            let context = &state.degrees[state.degrees.len().saturating_sub(order)..];
            m.score_degree(context)
        });

        let scored: Vec<(f64, Candidate)> = survivors
            .iter()
            .map(|c| (self.score(state, slot, target, c, distribution.as_ref()), *c))
            .collect();
        let best = scored
            .iter()
            .map(|(s, _)| *s)
            .fold(f64::NEG_INFINITY, f64::max);

        let mut tied: Vec<Candidate> = scored
            .iter()
            .filter(|(s, _)| best - s <= TIE_EPSILON)
            .map(|(_, c)| *c)
            .collect();
        if tied.iter().any(|c| c.chord) {
            tied.retain(|c| c.chord);
        }
        let interval = |c: &Candidate| state.previous.map_or(0, |p| p.abs_diff(c.midi));
        if let Some(smallest) = tied.iter().map(interval).min() {
            tied.retain(|c| interval(c) == smallest);
        }
        rng.choose(&tied).map(|c| c.choice(Decision::Scored))
    }

    fn score(
        &self,
        state: &MelodicState,
        slot: &SlotContext,
        target: Option<ScalePitch>,
        c: &Candidate,
        distribution: Option<&BTreeMap<u8, f64>>,
    ) -> f64 {
        CriterionScores {
            voice_leading: scoring::voice_leading(state.previous, c.midi),
            harmonic: scoring::harmonic_fit(c.chord, slot.weight),
            contour: scoring::contour(target, c.pitch, slot.weight == MetricWeight::Strong),
            tendency: scoring::tendency(state.previous_pitch, c.pitch),
            learned: scoring::learned(distribution, c.pitch.degree),
            variety: scoring::variety(&state.degrees, c.pitch.degree),
            range: scoring::range(c.midi, slot.window),
        }
        .weighted(&self.weights)
            * scoring::emphasis(c.pitch.degree, self.tonic_emphasis, self.modal_degree)
    }

    /// A chromatic neighbor of a chord tone, if one passes the constraints.
    fn infraction(
        &self,
        state: &MelodicState,
        slot: &SlotContext,
        rng: &mut SeededRng,
    ) -> Option<Choice> {
        let tones = self.tonal.chord_tones(slot.harmony);
        let mut candidates = Vec::new();
        for midi in slot.window.low..=slot.window.high {
            let Some(sp) = self.tonal.pitch_to_degree(midi) else {
                continue;
            };
            if !tones.contains(&sp.degree) {
                continue;
            }
            for alteration in [-1i8, 1] {
                let altered = midi as i32 + alteration as i32;
                let Ok(altered) = u8::try_from(altered) else {
                    continue;
                };
                if !slot.window.contains(altered) || self.tonal.is_diatonic(altered) {
                    continue;
                }
                candidates.push(Candidate {
                    pitch: ScalePitch { alteration, ..sp },
                    midi: altered,
                    chord: false,
                    role: NoteRole::Appoggiatura,
                });
            }
        }
        let survivors = self.constrain(state, candidates);
        let mut choice = self.select(state, slot, slot.target, &survivors, rng)?;
        choice.decision = Decision::Infraction;
        choice.infraction = true;
        Some(choice)
    }

    /// Resolve a pending infraction: the chord tone moving against the
    /// infraction's direction by the smallest interval.
    fn compensate(&self, state: &MelodicState, slot: &SlotContext, direction: i8) -> Choice {
        let tones = self.tonal.chord_tones(slot.harmony);
        let is_chord = |sp: ScalePitch| tones.contains(&sp.degree);
        let reference = state.previous.unwrap_or(slot.window.center() as u8);
        let against = (slot.window.low..=slot.window.high)
            .filter_map(|midi| Some((midi, self.tonal.pitch_to_degree(midi)?)))
            .filter(|&(midi, sp)| {
                is_chord(sp) && (midi as i32 - reference as i32).signum() as i8 == -direction
            })
            .min_by_key(|&(midi, _)| (midi.abs_diff(reference), midi));
        let (midi, pitch) = match against.or_else(|| self.nearest(Some(slot.window), reference, is_chord)) {
            Some(found) => found,
            None => return self.fallback(state, slot),
        };
        Choice {
            pitch,
            midi,
            role: NoteRole::Structural,
            decision: Decision::Compensation,
            infraction: false,
        }
    }

    /// Nearest in-window chord tone to the previous note.
    fn fallback(&self, state: &MelodicState, slot: &SlotContext) -> Choice {
        warn!(
            harmony = slot.harmony.numeral(),
            previous = ?state.previous,
            leap = ?state.leap,
            "no candidate survived the hard constraints, using nearest chord tone"
        );
        let tones = self.tonal.chord_tones(slot.harmony);
        let is_chord = |sp: ScalePitch| tones.contains(&sp.degree);
        let reference = state.previous.unwrap_or(slot.window.center() as u8);
        let (midi, pitch) = self
            .nearest(Some(slot.window), reference, is_chord)
            .or_else(|| self.nearest(None, reference, is_chord))
            .unwrap_or_else(|| {
                let sp = ScalePitch::new(tones[0], 4);
                (self.tonal.pitch_of(sp), sp)
            });
        Choice {
            pitch,
            midi,
            role: NoteRole::Structural,
            decision: Decision::Fallback,
            infraction: false,
        }
    }

    /// Diatonic pitch nearest `reference` satisfying `pred`, lower pitch on
    /// ties. `None` for the window searches the whole MIDI range.
    fn nearest(
        &self,
        window: Option<RangeWindow>,
        reference: u8,
        pred: impl Fn(ScalePitch) -> bool,
    ) -> Option<(u8, ScalePitch)> {
        let window = window.unwrap_or(RangeWindow::new(0, 127));
        (window.low..=window.high)
            .filter_map(|midi| Some((midi, self.tonal.pitch_to_degree(midi)?)))
            .filter(|&(_, sp)| pred(sp))
            .min_by_key(|&(midi, _)| (midi.abs_diff(reference), midi))
    }
}

/// Place a hinted degree in the octave nearest the contour target (or the
/// previous note).
fn hint_target(hint: u8, target: Option<ScalePitch>, previous: Option<ScalePitch>) -> ScalePitch {
    let reference = target
        .or(previous)
        .unwrap_or_else(|| ScalePitch::new(1, 4))
        .step();
    let octave = reference.div_euclid(7);
    (octave - 1..=octave + 1)
        .map(|o| ScalePitch::new(hint, o as i8))
        .min_by_key(|sp| (sp.step() - reference).abs())
        .unwrap_or_else(|| ScalePitch::new(hint, 4))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tonal::{Mode, Tonality};

    fn c_major() -> Tonality {
        Tonality::new(Mode::Major, 0)
    }

    fn slot(harmony: HarmonicFunction, weight: MetricWeight) -> SlotContext {
        SlotContext {
            harmony,
            weight,
            window: RangeWindow::new(55, 77),
            target: None,
            hint: None,
        }
    }

    fn state_at(midi: u8, tonal: &Tonality) -> MelodicState {
        let mut state = MelodicState::new();
        let pitch = tonal.pitch_to_degree(midi).unwrap();
        state.commit(&Choice {
            pitch,
            midi,
            role: NoteRole::Structural,
            decision: Decision::Scored,
            infraction: false,
        });
        state
    }

    #[test]
    fn test_strong_slots_take_chord_tones() {
        let tonal = c_major();
        let scorer = MelodicScorer::new(&tonal, 9);
        let mut rng = SeededRng::new(1);
        let mut state = state_at(64, &tonal);
        for _ in 0..30 {
            let choice = scorer.choose(&state, &slot(HarmonicFunction::V, MetricWeight::Strong), &mut rng);
            assert!(HarmonicFunction::V.contains(choice.pitch.degree));
            assert!(choice.midi.abs_diff(state.previous.unwrap()) <= 9);
            state.commit(&choice);
        }
    }

    #[test]
    fn test_leap_obligation_forces_step_back() {
        let tonal = c_major();
        let scorer = MelodicScorer::new(&tonal, 9);
        let mut rng = SeededRng::new(2);
        let mut state = state_at(55, &tonal);
        state.commit(&scorer.force(64, Decision::Scored));
        assert_eq!(
            state.leap,
            Some(LeapObligation {
                direction: 1,
                remaining: 2
            })
        );

        // Weak slot over I: the scale neighbor D (62) is the only step down.
        let choice = scorer.choose(&state, &slot(HarmonicFunction::I, MetricWeight::Weak), &mut rng);
        assert_eq!(choice.midi, 62);
        state.commit(&choice);
        assert_eq!(state.leap, None);
    }

    #[test]
    fn test_leap_recovery_may_wait_one_note() {
        let tonal = c_major();
        let scorer = MelodicScorer::new(&tonal, 9);
        let mut rng = SeededRng::new(3);
        let mut state = state_at(55, &tonal);
        state.commit(&scorer.force(60, Decision::Scored));

        // Strong slot over I from C: no chord tone a step below, so the
        // note may not rise or leap. Only C itself qualifies.
        let choice = scorer.choose(&state, &slot(HarmonicFunction::I, MetricWeight::Strong), &mut rng);
        assert_eq!(choice.midi, 60);
        state.commit(&choice);
        assert_eq!(state.leap.map(|ob| ob.remaining), Some(1));

        // Now a step down is required: B.
        let choice = scorer.choose(&state, &slot(HarmonicFunction::I, MetricWeight::Weak), &mut rng);
        assert_eq!(choice.midi, 59);
        state.commit(&choice);
        assert_eq!(state.leap, None);
    }

    #[test]
    fn test_fallback_when_nothing_survives() {
        let tonal = c_major();
        let scorer = MelodicScorer::new(&tonal, 1);
        let mut rng = SeededRng::new(4);
        let state = state_at(62, &tonal);
        let choice = scorer.choose(&state, &slot(HarmonicFunction::I, MetricWeight::Strong), &mut rng);
        assert_eq!(choice.decision, Decision::Fallback);
        // C and E are equally near; the lower wins.
        assert_eq!(choice.midi, 60);
    }

    #[test]
    fn test_motif_hint_wins_when_available() {
        let tonal = c_major();
        let scorer = MelodicScorer::new(&tonal, 9);
        let mut rng = SeededRng::new(5);
        let state = state_at(60, &tonal);
        let mut ctx = slot(HarmonicFunction::I, MetricWeight::Secondary);
        ctx.hint = Some(3);
        let choice = scorer.choose(&state, &ctx, &mut rng);
        assert_eq!(choice.decision, Decision::Motif);
        assert_eq!(choice.midi, 64);

        // Degree 6 is not available over I on a strong slot: the hint
        // only steers the contour.
        ctx.weight = MetricWeight::Strong;
        ctx.hint = Some(6);
        let choice = scorer.choose(&state, &ctx, &mut rng);
        assert_eq!(choice.decision, Decision::Scored);
    }

    #[test]
    fn test_infraction_then_compensation() {
        let tonal = c_major();
        let scorer = MelodicScorer::new(&tonal, 9).with_infractions(1.0);
        let mut rng = SeededRng::new(6);
        let mut state = state_at(60, &tonal);
        let ctx = slot(HarmonicFunction::I, MetricWeight::Strong);

        let first = scorer.choose(&state, &ctx, &mut rng);
        assert!(first.infraction);
        assert_eq!(first.decision, Decision::Infraction);
        assert_eq!(first.role, NoteRole::Appoggiatura);
        assert!(!tonal.is_diatonic(first.midi));
        assert_eq!(tonal.pitch_of(first.pitch), first.midi);
        state.commit(&first);
        let dir = state.pending_compensation.unwrap();

        let second = scorer.choose(&state, &ctx, &mut rng);
        assert_eq!(second.decision, Decision::Compensation);
        assert!(HarmonicFunction::I.contains(second.pitch.degree));
        let moved = second.midi as i32 - first.midi as i32;
        assert_eq!(moved.signum() as i8, -dir, "compensation moves against the infraction");
        state.commit(&second);
        assert_eq!(state.pending_compensation, None);
    }

    #[test]
    fn test_tenoris_only_where_dominant_is_a_chord_tone() {
        let tonal = c_major();
        let scorer = MelodicScorer::new(&tonal, 9).with_tenoris(Some(1.0));
        let mut rng = SeededRng::new(7);
        let state = state_at(64, &tonal);
        let choice = scorer.choose(&state, &slot(HarmonicFunction::I, MetricWeight::Strong), &mut rng);
        assert_eq!(choice.decision, Decision::Tenoris);
        assert_eq!(choice.role, NoteRole::Tenoris);
        assert_eq!(choice.midi, 67);

        let choice = scorer.choose(&state, &slot(HarmonicFunction::IV, MetricWeight::Strong), &mut rng);
        assert_ne!(choice.decision, Decision::Tenoris);
    }

    #[test]
    fn test_same_seed_same_choice() {
        let tonal = c_major();
        let scorer = MelodicScorer::new(&tonal, 9);
        let state = state_at(62, &tonal);
        let ctx = slot(HarmonicFunction::V, MetricWeight::Weak);
        let a = scorer.choose(&state, &ctx, &mut SeededRng::new(9));
        let b = scorer.choose(&state, &ctx, &mut SeededRng::new(9));
        assert_eq!(a, b);
    }

    #[test]
    fn test_hint_target_picks_nearest_octave() {
        let target = Some(ScalePitch::new(2, 4));
        assert_eq!(hint_target(7, target, None), ScalePitch::new(7, 3));
        assert_eq!(hint_target(3, target, None), ScalePitch::new(3, 4));
    }

    #[test]
    fn test_emphasis_scales_tonic_and_modal_scores() {
        let tonal = c_major();
        let plain = MelodicScorer::new(&tonal, 9);
        let emphasized = MelodicScorer::new(&tonal, 9).with_emphasis(1.5, Some(6));
        let state = state_at(64, &tonal);
        let ctx = slot(HarmonicFunction::IV, MetricWeight::Weak);
        let candidate = |midi: u8| Candidate {
            pitch: tonal.pitch_to_degree(midi).unwrap(),
            midi,
            chord: true,
            role: NoteRole::Structural,
        };

        for (midi, factor) in [(60, 1.5), (69, scoring::MODAL_EMPHASIS), (65, 1.0)] {
            let c = candidate(midi);
            let base = plain.score(&state, &ctx, None, &c, None);
            let scaled = emphasized.score(&state, &ctx, None, &c, None);
            assert!((scaled - base * factor).abs() < 1e-12, "midi {midi}");
        }
    }

    #[test]
    fn test_strong_tonic_emphasis_steers_choice() {
        let tonal = c_major();
        let scorer = MelodicScorer::new(&tonal, 9).with_emphasis(3.0, None);
        let state = state_at(64, &tonal);
        for seed in 0..5 {
            let choice = scorer.choose(
                &state,
                &slot(HarmonicFunction::I, MetricWeight::Weak),
                &mut SeededRng::new(seed),
            );
            assert_eq!(choice.midi, 60);
            assert_eq!(choice.decision, Decision::Scored);
        }
    }
}
