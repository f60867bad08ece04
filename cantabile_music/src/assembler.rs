// Phrase/period assembler: turns parameters into a finished `Period`.
//
// The pipeline, all driven by one `SeededRng`:
//
// 1. Layout and harmony: `plan_layout` splits the measure count into
//    phrases, `progression` gives each measure its function.
// 2. Rhythm: the traditional strategy reuses one base pattern family
//    (rhythm.rs); the hierarchical strategy states a seed motif per
//    sub-period, pairs each statement with a variant in 2-measure units,
//    lays the motif out from the downbeat and lets the rhythm builder pad
//    the rest of the measure.
// 3. Slots: every measure's pattern is flattened into one period-wide slot
//    list. The last two slots of each phrase are cadence slots; the downbeat
//    of the climax measure is the climax slot.
// 4. Rests are decided before any pitch, so the climax distance and the
//    "never two rests in a row" rule can be computed up front.
// 5. Pitches: a single pass over the slots with one `MelodicState` and one
//    `ClimaxState`. Climax and cadence slots are overrides; every other
//    sounding slot goes to the scorer.
//
// Used by engine.rs. Depends on rhythm.rs, motif.rs, contour.rs, scorer.rs.

use crate::config::{GenerationParams, GenerationStrategy, ImpulseType};
use crate::contour::{ClimaxState, PhraseContour, RangeWindow, plan_climax};
use crate::error::Result;
use crate::harmony::{HarmonicFunction, progression};
use crate::meter::{Meter, MetricWeight, Ticks};
use crate::motif::{Motif, Variation, apply_variation, create_base_motif, select_variation};
use crate::period::{
    CadenceType, Decision, Measure, NoteEvent, NoteRole, Period, PeriodMeta, Phrase, PhraseRole,
    PhraseSpan, plan_layout,
};
use crate::probability::TransitionModel;
use crate::rhythm::{RhythmBuilder, RhythmicPattern, traditional_patterns};
use crate::scorer::{Choice, MelodicScorer, MelodicState, SlotContext};
use crate::tonal::{ScalePitch, TonalContext, Tonality};
use cantabile_prng::SeededRng;
use std::ops::RangeInclusive;
use tracing::debug;

/// Length range of a seed motif, in notes.
const MOTIF_LENGTH: RangeInclusive<usize> = 2..=5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CadenceSlot {
    Penultimate,
    Final,
}

/// Rhythm and motif material for one measure, before pitches.
#[derive(Debug, Clone)]
struct MeasurePlan {
    pattern: RhythmicPattern,
    hints: Vec<Option<u8>>,
    rests: Vec<bool>,
    motif: Option<String>,
}

impl MeasurePlan {
    fn plain(pattern: RhythmicPattern) -> Self {
        let n = pattern.len();
        MeasurePlan {
            pattern,
            hints: vec![None; n],
            rests: vec![false; n],
            motif: None,
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    phrase: usize,
    measure: usize,
    onset: Ticks,
    duration: Ticks,
    weight: MetricWeight,
    harmony: HarmonicFunction,
    hint: Option<u8>,
    rest: bool,
    cadence: Option<CadenceSlot>,
}

/// Build a complete period.
///
/// `model` is consulted only if given; the caller decides whether the
/// probability layer is enabled. `seed` is recorded in the metadata and
/// is not used to reseed `rng`.
pub fn assemble_period(
    params: &GenerationParams,
    tonality: &Tonality,
    meter: &Meter,
    model: Option<&TransitionModel>,
    seed: u64,
    rng: &mut SeededRng,
) -> Result<Period> {
    let layout = plan_layout(params.measures)?;
    let harmonies = progression(&layout);
    let blend = if model.is_some() {
        params.probability.weight
    } else {
        0.0
    };
    let builder = RhythmBuilder::new(meter, params.rhythmic_complexity).with_model(model, blend);

    let (low, high) = tonality.ambitus();
    let base = RangeWindow::new(low, high);
    let plan = plan_climax(
        params.climax_position,
        params.climax_intensity,
        &harmonies,
        tonality,
        base,
    );
    let mut climax = ClimaxState::new(plan, base);

    let measures: Vec<MeasurePlan> = match params.strategy {
        GenerationStrategy::Traditional => {
            traditional_patterns(&builder, &layout, params.rhythm_variation_fraction, rng)
                .into_iter()
                .map(MeasurePlan::plain)
                .collect()
        }
        GenerationStrategy::Hierarchical => {
            hierarchical_measures(&builder, &layout, &harmonies, params, plan.measure, rng)
        }
    };

    let mut slots = flatten(&layout, &harmonies, &measures);
    mark_cadences(&mut slots, layout.len());
    let climax_slot = slots
        .iter()
        .position(|s| s.measure == plan.measure && s.onset == 0)
        .filter(|&i| slots[i].cadence.is_none());
    climax.set_slot(climax_slot);
    place_rests(&mut slots, &layout, params, climax_slot, meter, rng);

    let targets = contour_targets(&slots, &layout, &climax, tonality);
    let distances = climax_distances(&slots, climax_slot);

    let scorer = MelodicScorer::new(tonality, params.max_interval)
        .with_model(model, blend)
        .with_infractions(params.infraction_rate)
        .with_tenoris(params.use_tenoris.then_some(params.tenoris_probability))
        .with_emphasis(
            params.tonic_emphasis,
            params
                .emphasize_modal_degrees
                .then(|| params.mode.characteristic_degree()),
        );

    let mut state = MelodicState::new();
    let mut choices: Vec<Option<Choice>> = Vec::with_capacity(slots.len());
    for (i, slot) in slots.iter().enumerate() {
        if slot.rest {
            choices.push(None);
            continue;
        }
        let window = climax.window(i, slot.measure, distances[i], params.max_interval);
        let choice = if climax.is_climax_slot(i) {
            scorer.force(plan.pitch, Decision::Climax)
        } else if let Some(position) = slot.cadence {
            let degree = cadence_degree(
                layout[slot.phrase].cadence,
                position,
                slot.weight,
                slot.harmony,
            );
            scorer.place_degree(&state, window, degree, Decision::Cadence, NoteRole::Structural)
        } else {
            let ctx = SlotContext {
                harmony: slot.harmony,
                weight: slot.weight,
                window,
                target: targets[i],
                hint: slot.hint,
            };
            scorer.choose(&state, &ctx, rng)
        };
        climax.record(i, choice.midi);
        state.commit(&choice);
        choices.push(Some(choice));
    }

    let phrases = build_phrases(&layout, &harmonies, &measures, &slots, &choices);
    for (p, phrase) in phrases.iter().enumerate() {
        let events = || phrase.measures.iter().flat_map(|m| m.events.iter());
        debug!(
            phrase = p,
            role = ?phrase.role,
            cadence = ?phrase.cadence,
            sounding = events().filter(|e| !e.is_rest()).count(),
            infractions = events().filter(|e| e.infraction).count(),
            fallbacks = events().filter(|e| e.decision == Decision::Fallback).count(),
            "phrase assembled"
        );
    }

    let meta = PeriodMeta {
        tonic: tonality.tonic_name().to_string(),
        mode: tonality.mode,
        meter: meter.clone(),
        measures: params.measures,
        strategy: params.strategy,
        seed,
    };
    Ok(Period::from_phrases(meta, phrases, Some(climax.summary())))
}

// ── Hierarchical rhythm ──

/// Motif statements and variants, two measures per unit.
///
/// Statement variations by unit position within a sub-period run identity,
/// selected, identity, selected. With `use_variations` an identity
/// statement is itself varied with `variation_probability`. The second
/// measure of every unit is always a variant of the statement.
fn hierarchical_measures(
    builder: &RhythmBuilder<'_>,
    layout: &[PhraseSpan],
    harmonies: &[HarmonicFunction],
    params: &GenerationParams,
    climax_measure: usize,
    rng: &mut SeededRng,
) -> Vec<MeasurePlan> {
    let meter = builder.meter();
    let freedom = params.variation_freedom;
    let mut plans = Vec::with_capacity(layout.last().map_or(0, |s| s.end()));
    let mut current: Option<Motif> = None;
    let mut units_before = 0;

    for span in layout {
        let seed = match (&current, span.role) {
            (Some(motif), PhraseRole::Consequent | PhraseRole::Extension) => motif.clone(),
            _ => {
                units_before = 0;
                create_base_motif(
                    MOTIF_LENGTH,
                    harmonies[span.start],
                    params.impulse,
                    params.rhythmic_complexity,
                    meter,
                    rng,
                )
            }
        };
        if span.role == PhraseRole::Extension {
            units_before = 0;
        }

        for k in (0..span.len).step_by(2) {
            let unit = units_before + k / 2;
            let m = span.start + k;

            let mut variation = if unit % 2 == 1 {
                select_variation(freedom, m, Some(climax_measure), rng)
            } else {
                Variation::Identity
            };
            if params.use_variations
                && variation == Variation::Identity
                && rng.random_bool(params.variation_probability)
            {
                variation = select_variation(freedom, m, Some(climax_measure), rng);
            }
            let statement = if variation == Variation::Identity {
                seed.clone()
            } else {
                apply_variation(&seed, variation)
            };
            plans.push(lay_out_motif(builder, &statement, m + 1 == span.end(), rng));

            if k + 1 < span.len {
                let answer = select_variation(freedom, m + 1, Some(climax_measure), rng);
                let variant = apply_variation(&statement, answer);
                plans.push(lay_out_motif(builder, &variant, m + 2 == span.end(), rng));
            }
        }
        units_before += span.len.div_ceil(2);
        current = Some(seed);
    }
    plans
}

/// Place a motif from the downbeat, clipping notes at beat-group ends, and
/// pad the measure. Phrase-final measures stop at the last group start so
/// the cadential close keeps the whole last group.
fn lay_out_motif(
    builder: &RhythmBuilder<'_>,
    motif: &Motif,
    phrase_final: bool,
    rng: &mut SeededRng,
) -> MeasurePlan {
    let meter = builder.meter();
    let limit = if phrase_final {
        meter.group_starts().last().copied().unwrap_or(0)
    } else {
        meter.measure_ticks()
    };

    let mut prefix = Vec::new();
    let mut hints = Vec::new();
    let mut rests = Vec::new();
    let mut at: Ticks = 0;
    for (i, note) in motif.notes.iter().enumerate() {
        if at >= limit {
            break;
        }
        let (_, group_end) = meter.group_containing(at);
        let d = note.duration.min(group_end.min(limit) - at);
        if d == 0 {
            break;
        }
        prefix.push(d);
        hints.push(motif.degree_at(i));
        rests.push(note.offset.is_none());
        at += d;
    }

    let mut pattern = builder.complete_measure(&prefix, rng);
    if phrase_final {
        pattern = pattern.cadential(meter);
    }
    hints.resize(pattern.len(), None);
    rests.resize(pattern.len(), false);
    MeasurePlan {
        pattern,
        hints,
        rests,
        motif: Some(motif.label()),
    }
}

// ── Slots ──

fn flatten(layout: &[PhraseSpan], harmonies: &[HarmonicFunction], measures: &[MeasurePlan]) -> Vec<Slot> {
    let mut slots = Vec::new();
    for (p, span) in layout.iter().enumerate() {
        for m in span.start..span.end() {
            let plan = &measures[m];
            let onsets = plan.pattern.onsets();
            for (k, onset) in onsets.into_iter().enumerate() {
                slots.push(Slot {
                    phrase: p,
                    measure: m,
                    onset,
                    duration: plan.pattern.durations[k],
                    weight: plan.pattern.weights[k],
                    harmony: harmonies[m],
                    hint: plan.hints.get(k).copied().flatten(),
                    rest: plan.rests.get(k).copied().unwrap_or(false),
                    cadence: None,
                });
            }
        }
    }
    slots
}

/// The last two slots of every phrase carry the cadence.
fn mark_cadences(slots: &mut [Slot], phrases: usize) {
    for p in 0..phrases {
        let indices: Vec<usize> = slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.phrase == p)
            .map(|(i, _)| i)
            .collect();
        if let [.., penultimate, last] = indices[..] {
            slots[penultimate].cadence = Some(CadenceSlot::Penultimate);
            slots[last].cadence = Some(CadenceSlot::Final);
        } else if let [last] = indices[..] {
            slots[last].cadence = Some(CadenceSlot::Final);
        }
    }
}

fn cadence_degree(
    cadence: CadenceType,
    position: CadenceSlot,
    weight: MetricWeight,
    harmony: HarmonicFunction,
) -> u8 {
    let first_chord_tone = |options: &[u8]| {
        options
            .iter()
            .copied()
            .find(|&d| harmony.contains(d))
            .unwrap_or(harmony.root())
    };
    let strong = weight == MetricWeight::Strong;
    match (cadence, position) {
        (CadenceType::Half, CadenceSlot::Final) => 5,
        (CadenceType::Authentic, CadenceSlot::Final) => 1,
        (CadenceType::Half, CadenceSlot::Penultimate) if strong => first_chord_tone(&[4, 6, 2, 1]),
        (CadenceType::Half, CadenceSlot::Penultimate) => 4,
        (CadenceType::Authentic, CadenceSlot::Penultimate) if strong => first_chord_tone(&[5, 7, 2]),
        (CadenceType::Authentic, CadenceSlot::Penultimate) => 7,
    }
}

// ── Rests ──

/// Decide every rest before pitches are chosen.
///
/// Cadence and climax slots always sound. The impulse's opening rest goes
/// into the first measure regardless of `use_rests`. Motif rests that would
/// sit right after another rest across a barline are dropped, and the
/// probabilistic rests never touch an existing rest.
fn place_rests(
    slots: &mut [Slot],
    layout: &[PhraseSpan],
    params: &GenerationParams,
    climax_slot: Option<usize>,
    meter: &Meter,
    rng: &mut SeededRng,
) {
    let protected: Vec<bool> = slots
        .iter()
        .enumerate()
        .map(|(i, s)| s.cadence.is_some() || climax_slot == Some(i))
        .collect();

    for (slot, &keep) in slots.iter_mut().zip(&protected) {
        if keep {
            slot.rest = false;
        }
    }

    // Opening rest.
    let in_measure = slots.iter().take_while(|s| s.measure == 0).count();
    if in_measure >= 2 {
        let first_group_end = meter
            .group_ticks()
            .first()
            .copied()
            .unwrap_or(meter.measure_ticks());
        let opening: Vec<usize> = match params.impulse {
            ImpulseType::Tetic => Vec::new(),
            ImpulseType::Acephalous => vec![0],
            ImpulseType::Anacrustic => {
                let in_group = slots[..in_measure]
                    .iter()
                    .take_while(|s| s.onset < first_group_end)
                    .count();
                if in_group >= 2 {
                    (0..in_group - 1).collect()
                } else {
                    vec![0]
                }
            }
        };
        for i in opening {
            if !protected[i] {
                slots[i].rest = true;
            }
        }
    }

    for i in 1..slots.len() {
        if slots[i].rest && slots[i - 1].rest && slots[i].measure != slots[i - 1].measure {
            slots[i].rest = false;
        }
    }

    if !params.use_rests || params.rest_probability <= 0.0 {
        return;
    }
    let p = params.rest_probability;
    for i in 0..slots.len() {
        if protected[i] || slots[i].rest {
            continue;
        }
        let prev_rest = i > 0 && slots[i - 1].rest;
        let next_rest = slots.get(i + 1).is_some_and(|s| s.rest);
        if prev_rest || next_rest {
            continue;
        }

        let slot = &slots[i];
        let span = &layout[slot.phrase];
        let last_in_measure = slots.get(i + 1).is_none_or(|s| s.measure != slot.measure);
        let unit_end = (slot.measure - span.start) % 2 == 1 && slot.measure + 1 != span.end();
        let prob = if last_in_measure && unit_end {
            2.0 * p
        } else if slot.onset == 0 && slot.measure == span.start {
            match params.impulse {
                ImpulseType::Anacrustic => 1.5 * p,
                ImpulseType::Acephalous => 1.2 * p,
                ImpulseType::Tetic => 0.0,
            }
        } else if slot.weight == MetricWeight::Weak {
            0.5 * p
        } else {
            0.0
        };
        if prob > 0.0 && rng.random_bool(prob.min(1.0)) {
            slots[i].rest = true;
        }
    }
}

// ── Contour and climax bookkeeping ──

fn contour_targets(
    slots: &[Slot],
    layout: &[PhraseSpan],
    climax: &ClimaxState,
    tonal: &dyn TonalContext,
) -> Vec<Option<ScalePitch>> {
    let mut targets = vec![None; slots.len()];
    let plan = climax.plan();
    for (p, span) in layout.iter().enumerate() {
        let indices: Vec<usize> = (0..slots.len()).filter(|&i| slots[i].phrase == p).collect();
        let n = indices.len();
        let mut contour = PhraseContour::for_role(span.role);
        if span.contains(plan.measure)
            && let Some(pitch) = tonal.pitch_to_degree(plan.pitch)
        {
            let by_slot = climax
                .slot()
                .and_then(|c| indices.iter().position(|&i| i == c))
                .filter(|_| n > 1)
                .map(|k| k as f64 / (n - 1) as f64);
            let by_measure = (plan.measure - span.start) as f64 / span.len as f64;
            contour = contour.with_climax(by_slot.unwrap_or(by_measure), pitch);
        }
        for (&i, target) in indices.iter().zip(contour.plan_targets(n)) {
            targets[i] = Some(target);
        }
    }
    targets
}

/// Sounding slots from each slot up to and including the climax slot.
fn climax_distances(slots: &[Slot], climax_slot: Option<usize>) -> Vec<Option<usize>> {
    let mut out = vec![None; slots.len()];
    let Some(c) = climax_slot else {
        return out;
    };
    let mut d = 0;
    for i in (0..c).rev() {
        if !slots[i + 1].rest {
            d += 1;
        }
        out[i] = Some(d);
    }
    out
}

// ── Output ──

/// Group placed slots into measures and phrases. Adjacent rest slots in
/// one measure become a single rest.
fn build_phrases(
    layout: &[PhraseSpan],
    harmonies: &[HarmonicFunction],
    measures: &[MeasurePlan],
    slots: &[Slot],
    choices: &[Option<Choice>],
) -> Vec<Phrase> {
    let mut phrases = Vec::with_capacity(layout.len());
    let mut i = 0;
    for span in layout {
        let mut out = Vec::with_capacity(span.len);
        for m in span.start..span.end() {
            let mut events: Vec<NoteEvent> = Vec::new();
            while i < slots.len() && slots[i].measure == m {
                let slot = &slots[i];
                match choices[i] {
                    Some(c) => events.push(NoteEvent {
                        pitch: Some(c.pitch),
                        duration: slot.duration,
                        onset: slot.onset,
                        weight: slot.weight,
                        role: c.role,
                        infraction: c.infraction,
                        decision: c.decision,
                    }),
                    None => match events.last_mut() {
                        Some(prev) if prev.is_rest() => prev.duration += slot.duration,
                        _ => events.push(NoteEvent::rest(slot.onset, slot.duration, slot.weight)),
                    },
                }
                i += 1;
            }
            out.push(Measure {
                index: m,
                harmony: harmonies[m],
                events,
                motif: measures[m].motif.clone(),
            });
        }
        phrases.push(Phrase {
            role: span.role,
            cadence: span.cadence,
            measures: out,
        });
    }
    phrases
}
