// Motifs and their variations.
//
// A motif is a short cell of (scale-step offset, duration) pairs measured
// from an anchor degree; a `None` offset is a rest. The hierarchical
// assembler states a seed motif and then varies it. Every variation is a
// pure function returning a new motif with the transform appended to its
// provenance, so a stated form can always be traced back to its seed.
//
// Variations change pitch order, direction, level or durations but never
// the number of elements.
//
// Used by assembler.rs. The offsets become degree hints for the scorer, so
// the notes that actually sound still pass through the hard constraints.

use crate::config::ImpulseType;
use crate::harmony::HarmonicFunction;
use crate::meter::{Meter, Ticks};
use cantabile_prng::SeededRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Largest transposition, in diatonic steps.
const MAX_TRANSPOSITION: i8 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotifNote {
    /// Diatonic steps from the anchor, or `None` for a rest.
    pub offset: Option<i8>,
    pub duration: Ticks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContourShape {
    Ascending,
    Descending,
    Arch,
    InvertedArch,
}

impl ContourShape {
    pub const ALL: [ContourShape; 4] = [
        ContourShape::Ascending,
        ContourShape::Descending,
        ContourShape::Arch,
        ContourShape::InvertedArch,
    ];
}

/// A transform applied to a motif.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variation {
    Identity,
    /// Pitch order reversed; durations stay where they were.
    Retrograde,
    /// Offsets mirrored around the first sounding note.
    Inversion,
    /// Offsets shifted, clamped to a seventh either way.
    Transposition { steps: i8 },
    /// Durations doubled.
    Augmentation,
    /// Durations halved, never below one tick.
    Diminution,
    RetrogradeInversion,
    /// The whole cell restated from a new degree, contour intact.
    Sequence { steps: i8 },
}

impl fmt::Display for Variation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variation::Identity => f.write_str("identity"),
            Variation::Retrograde => f.write_str("retrograde"),
            Variation::Inversion => f.write_str("inversion"),
            Variation::Transposition { steps } => write!(f, "transposition({steps:+})"),
            Variation::Augmentation => f.write_str("augmentation"),
            Variation::Diminution => f.write_str("diminution"),
            Variation::RetrogradeInversion => f.write_str("retrograde-inversion"),
            Variation::Sequence { steps } => write!(f, "sequence({steps:+})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Motif {
    pub notes: Vec<MotifNote>,
    /// Scale degree (1-7) the offsets are measured from.
    pub anchor: u8,
    pub shape: ContourShape,
    /// Transforms applied to the seed, oldest first.
    pub provenance: Vec<Variation>,
}

impl Motif {
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn total_ticks(&self) -> Ticks {
        self.notes.iter().map(|n| n.duration).sum()
    }

    pub fn durations(&self) -> Vec<Ticks> {
        self.notes.iter().map(|n| n.duration).collect()
    }

    pub fn offsets(&self) -> Vec<Option<i8>> {
        self.notes.iter().map(|n| n.offset).collect()
    }

    /// Scale degree of element `i`, or `None` for a rest.
    pub fn degree_at(&self, i: usize) -> Option<u8> {
        let offset = self.notes.get(i)?.offset? as i32;
        Some(((self.anchor as i32 - 1 + offset).rem_euclid(7) + 1) as u8)
    }

    /// "seed", or the provenance chain, e.g. "retrograde+transposition(+2)".
    pub fn label(&self) -> String {
        if self.provenance.is_empty() {
            return "seed".to_string();
        }
        self.provenance
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("+")
    }

    fn first_sounding(&self) -> Option<i8> {
        self.notes.iter().find_map(|n| n.offset)
    }
}

/// Build a seed motif over `harmony`.
pub fn create_base_motif(
    length_range: RangeInclusive<usize>,
    harmony: HarmonicFunction,
    impulse: ImpulseType,
    complexity: u8,
    meter: &Meter,
    rng: &mut SeededRng,
) -> Motif {
    let (lo, hi) = (*length_range.start(), *length_range.end());
    let len = rng.range_usize_inclusive(lo.max(2), hi.max(lo.max(2)));
    let shape = rng
        .choose(&ContourShape::ALL)
        .copied()
        .unwrap_or(ContourShape::Arch);

    let tones = harmony.chord_tones();
    let anchor = if rng.random_bool(0.6) {
        tones[0]
    } else {
        rng.choose(&tones[1..]).copied().unwrap_or(tones[0])
    };

    let offsets = contour_offsets(shape, len, rng);
    let unit = meter.unit_ticks();
    let mut notes: Vec<MotifNote> = offsets
        .into_iter()
        .map(|offset| MotifNote {
            offset: Some(offset),
            duration: motif_duration(unit, complexity, rng),
        })
        .collect();

    match impulse {
        ImpulseType::Tetic => {}
        ImpulseType::Anacrustic => {
            if let Some(first) = notes.first_mut() {
                first.duration = if unit % 2 == 0 { unit / 2 } else { unit };
            }
        }
        ImpulseType::Acephalous => {
            if let Some(first) = notes.first_mut() {
                first.offset = None;
            }
        }
    }

    Motif {
        notes,
        anchor,
        shape,
        provenance: Vec::new(),
    }
}

/// Step offsets tracing a shape, starting at 0. Steps are mostly seconds
/// with an occasional third.
fn contour_offsets(shape: ContourShape, len: usize, rng: &mut SeededRng) -> Vec<i8> {
    let peak = len / 2;
    let mut offsets = Vec::with_capacity(len);
    let mut at: i8 = 0;
    offsets.push(at);
    for i in 1..len {
        let size = if rng.random_bool(0.25) { 2 } else { 1 };
        let up = match shape {
            ContourShape::Ascending => true,
            ContourShape::Descending => false,
            ContourShape::Arch => i <= peak,
            ContourShape::InvertedArch => i > peak,
        };
        at += if up { size } else { -size };
        offsets.push(at);
    }
    offsets
}

fn motif_duration(unit: Ticks, complexity: u8, rng: &mut SeededRng) -> Ticks {
    let options = [unit / 2, unit, unit * 2];
    let mut weights = match complexity {
        0 | 1 => [0.0, 0.7, 0.3],
        2 => [0.2, 0.6, 0.2],
        3 => [0.4, 0.5, 0.1],
        4 => [0.5, 0.45, 0.05],
        _ => [0.6, 0.4, 0.0],
    };
    if unit % 2 != 0 {
        weights[0] = 0.0;
    }
    rng.weighted_index(&weights)
        .map(|i| options[i])
        .unwrap_or(unit)
}

/// Apply one transform, returning a new motif.
pub fn apply_variation(motif: &Motif, variation: Variation) -> Motif {
    let mut out = motif.clone();
    match variation {
        Variation::Identity => {}
        Variation::Retrograde => {
            let reversed: Vec<Option<i8>> = motif.offsets().into_iter().rev().collect();
            for (note, offset) in out.notes.iter_mut().zip(reversed) {
                note.offset = offset;
            }
        }
        Variation::Inversion => {
            if let Some(pivot) = motif.first_sounding() {
                for note in &mut out.notes {
                    note.offset = note
                        .offset
                        .map(|o| clamp_offset(2 * pivot as i32 - o as i32));
                }
            }
        }
        Variation::Transposition { steps } => {
            let steps = steps.clamp(-MAX_TRANSPOSITION, MAX_TRANSPOSITION);
            shift(&mut out, steps as i32);
        }
        Variation::Augmentation => {
            for note in &mut out.notes {
                note.duration = note.duration.saturating_mul(2);
            }
        }
        Variation::Diminution => {
            for note in &mut out.notes {
                note.duration = (note.duration / 2).max(1);
            }
        }
        Variation::RetrogradeInversion => {
            let retro = apply_variation(motif, Variation::Retrograde);
            let mut ri = apply_variation(&retro, Variation::Inversion);
            ri.provenance.truncate(motif.provenance.len());
            out = ri;
        }
        Variation::Sequence { steps } => shift(&mut out, steps as i32),
    }
    out.provenance.push(variation);
    out
}

fn shift(motif: &mut Motif, steps: i32) {
    for note in &mut motif.notes {
        note.offset = note.offset.map(|o| clamp_offset(o as i32 + steps));
    }
}

fn clamp_offset(value: i32) -> i8 {
    value.clamp(i8::MIN as i32, i8::MAX as i32) as i8
}

/// Pick a transform for the variant at `measure`.
///
/// Freedom 1 allows identity, retrograde and transposition; freedom 2 adds
/// inversion and the duration transforms; freedom 3 allows everything and,
/// within one measure of the climax, favors the contrasting forms.
pub fn select_variation(
    freedom: u8,
    measure: usize,
    climax_measure: Option<usize>,
    rng: &mut SeededRng,
) -> Variation {
    // Identity, Retrograde, Inversion, Transposition, Augmentation,
    // Diminution, RetrogradeInversion, Sequence.
    let near_climax = climax_measure.is_some_and(|c| measure.abs_diff(c) <= 1);
    let weights: [f64; 8] = match freedom {
        0 | 1 => [0.4, 0.3, 0.0, 0.3, 0.0, 0.0, 0.0, 0.0],
        2 => [0.2, 0.2, 0.2, 0.2, 0.1, 0.1, 0.0, 0.0],
        _ if near_climax => [0.0, 1.0, 2.0, 1.0, 2.0, 1.0, 2.0, 2.0],
        _ => [1.0; 8],
    };
    match rng.weighted_index(&weights) {
        Some(1) => Variation::Retrograde,
        Some(2) => Variation::Inversion,
        Some(3) => Variation::Transposition {
            steps: pick_steps(&[-3, -2, -1, 1, 2, 3], rng),
        },
        Some(4) => Variation::Augmentation,
        Some(5) => Variation::Diminution,
        Some(6) => Variation::RetrogradeInversion,
        Some(7) => Variation::Sequence {
            steps: pick_steps(&[-2, -1, 1, 2], rng),
        },
        _ => Variation::Identity,
    }
}

fn pick_steps(options: &[i8], rng: &mut SeededRng) -> i8 {
    rng.choose(options).copied().unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meter::MeterSpec;

    fn four_four() -> Meter {
        Meter::from_spec(&MeterSpec::default()).unwrap()
    }

    fn sample() -> Motif {
        Motif {
            notes: vec![
                MotifNote { offset: Some(0), duration: 4 },
                MotifNote { offset: Some(2), duration: 4 },
                MotifNote { offset: None, duration: 8 },
                MotifNote { offset: Some(-1), duration: 16 },
            ],
            anchor: 1,
            shape: ContourShape::Arch,
            provenance: Vec::new(),
        }
    }

    #[test]
    fn test_retrograde_is_an_involution() {
        let m = sample();
        let r = apply_variation(&m, Variation::Retrograde);
        assert_eq!(r.offsets(), vec![Some(-1), None, Some(2), Some(0)]);
        assert_eq!(r.durations(), m.durations(), "durations keep their positions");
        let rr = apply_variation(&r, Variation::Retrograde);
        assert_eq!(rr.notes, m.notes);
        assert_eq!(rr.provenance, vec![Variation::Retrograde, Variation::Retrograde]);
    }

    #[test]
    fn test_diminution_undoes_augmentation() {
        let m = sample();
        let back = apply_variation(
            &apply_variation(&m, Variation::Augmentation),
            Variation::Diminution,
        );
        assert_eq!(back.durations(), m.durations());
    }

    #[test]
    fn test_diminution_floor() {
        let mut m = sample();
        m.notes[0].duration = 1;
        let d = apply_variation(&m, Variation::Diminution);
        assert_eq!(d.notes[0].duration, 1);
    }

    #[test]
    fn test_inversion_mirrors_around_first_note() {
        let mut m = sample();
        m.notes[0].offset = Some(1);
        let inv = apply_variation(&m, Variation::Inversion);
        assert_eq!(inv.offsets(), vec![Some(1), Some(0), None, Some(3)]);
    }

    #[test]
    fn test_transposition_clamps_sequence_does_not() {
        let m = sample();
        let t = apply_variation(&m, Variation::Transposition { steps: 12 });
        assert_eq!(t.offsets()[0], Some(7));
        let s = apply_variation(&m, Variation::Sequence { steps: 12 });
        assert_eq!(s.offsets()[0], Some(12));
        assert_eq!(s.offsets()[3], Some(11));
    }

    #[test]
    fn test_retrograde_inversion_composes() {
        let m = sample();
        let ri = apply_variation(&m, Variation::RetrogradeInversion);
        let manual = apply_variation(
            &apply_variation(&m, Variation::Retrograde),
            Variation::Inversion,
        );
        assert_eq!(ri.notes, manual.notes);
        assert_eq!(ri.provenance, vec![Variation::RetrogradeInversion]);
        assert_eq!(ri.label(), "retrograde-inversion");
    }

    #[test]
    fn test_variations_preserve_note_count() {
        let m = sample();
        let all = [
            Variation::Identity,
            Variation::Retrograde,
            Variation::Inversion,
            Variation::Transposition { steps: -3 },
            Variation::Augmentation,
            Variation::Diminution,
            Variation::RetrogradeInversion,
            Variation::Sequence { steps: 2 },
        ];
        for v in all {
            let out = apply_variation(&m, v);
            assert_eq!(out.len(), m.len(), "{v} changed the note count");
            assert_eq!(
                out.offsets().iter().filter(|o| o.is_none()).count(),
                1,
                "{v} changed the rest count"
            );
        }
    }

    #[test]
    fn test_base_motif_shapes_and_impulses() {
        let meter = four_four();
        for seed in 0..40 {
            let mut rng = SeededRng::new(seed);
            let m = create_base_motif(
                2..=5,
                HarmonicFunction::I,
                ImpulseType::Tetic,
                3,
                &meter,
                &mut rng,
            );
            assert!((2..=5).contains(&m.len()));
            assert_eq!(m.notes[0].offset, Some(0));
            assert!(HarmonicFunction::I.contains(m.anchor));
            assert!(m.notes.iter().all(|n| n.duration > 0));

            let mut rng = SeededRng::new(seed);
            let a = create_base_motif(
                2..=4,
                HarmonicFunction::V,
                ImpulseType::Anacrustic,
                3,
                &meter,
                &mut rng,
            );
            assert_eq!(a.notes[0].duration, 4, "pickup is half a beat");

            let mut rng = SeededRng::new(seed);
            let c = create_base_motif(
                2..=4,
                HarmonicFunction::IV,
                ImpulseType::Acephalous,
                3,
                &meter,
                &mut rng,
            );
            assert_eq!(c.notes[0].offset, None);
            assert!(c.degree_at(1).is_some());
        }
    }

    #[test]
    fn test_degree_at_wraps() {
        let mut m = sample();
        m.anchor = 5;
        assert_eq!(m.degree_at(0), Some(5));
        assert_eq!(m.degree_at(1), Some(7));
        assert_eq!(m.degree_at(2), None);
        assert_eq!(m.degree_at(3), Some(4));
        m.anchor = 6;
        m.notes[1].offset = Some(3);
        assert_eq!(m.degree_at(1), Some(2));
    }

    #[test]
    fn test_selection_respects_freedom() {
        let mut rng = SeededRng::new(11);
        for _ in 0..200 {
            let v = select_variation(1, 2, Some(6), &mut rng);
            assert!(
                matches!(
                    v,
                    Variation::Identity | Variation::Retrograde | Variation::Transposition { .. }
                ),
                "freedom 1 produced {v}"
            );
            let v = select_variation(2, 2, Some(6), &mut rng);
            assert!(!matches!(
                v,
                Variation::RetrogradeInversion | Variation::Sequence { .. }
            ));
            let v = select_variation(3, 5, Some(6), &mut rng);
            assert_ne!(v, Variation::Identity, "no identity next to the climax");
        }
    }
}
