// Rhythmic pattern builder: one measure of durations at a time.
//
// A measure is filled beat group by beat group, so no duration ever crosses
// a group boundary. Each group picks a fill shape (one sustained note,
// split into units, long-short, short-long, dotted) and every unit of a
// split group picks a beat figure (single, pair, dotted pair, four even
// subdivisions). The complexity level (1-5) moves weight from the plain
// options toward the busy ones. When a probability model is active, each
// option is re-weighted by how likely its first duration is after the
// durations placed so far.
//
// The traditional strategy reuses a single base pattern across the period,
// swapping in its group-wise retrograde on some interior measures. The last
// group of every phrase-final measure is merged into one note so cadences
// land on a strong position. The hierarchical strategy lays a motif down
// first and asks `complete_measure` to pad the rest.
//
// Used by assembler.rs. Depends on meter.rs for group layout and weights.

use crate::meter::{Meter, MetricWeight, Ticks};
use crate::period::{PhraseRole, PhraseSpan};
use crate::probability::TransitionModel;
use cantabile_prng::SeededRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Durations covering exactly one measure, each tagged with the metric
/// weight of its onset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RhythmicPattern {
    pub durations: Vec<Ticks>,
    pub weights: Vec<MetricWeight>,
}

impl RhythmicPattern {
    pub fn from_durations(meter: &Meter, durations: Vec<Ticks>) -> Self {
        let weights = onsets_of(&durations)
            .into_iter()
            .map(|onset| meter.weight_at(onset))
            .collect();
        RhythmicPattern { durations, weights }
    }

    pub fn onsets(&self) -> Vec<Ticks> {
        onsets_of(&self.durations)
    }

    pub fn total_ticks(&self) -> Ticks {
        self.durations.iter().sum()
    }

    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    /// Slot indices that fall on a beat-group start.
    pub fn strong_slots(&self) -> Vec<usize> {
        self.weights
            .iter()
            .enumerate()
            .filter(|(_, w)| **w == MetricWeight::Strong)
            .map(|(i, _)| i)
            .collect()
    }

    /// Reverse the durations inside each beat group. Group boundaries stay
    /// where they were, so applying it twice gives back the original.
    pub fn retrograde(&self, meter: &Meter) -> Self {
        let durations = split_by_group(meter, &self.durations)
            .into_iter()
            .flat_map(|group| group.into_iter().rev())
            .collect();
        RhythmicPattern::from_durations(meter, durations)
    }

    /// Merge the last beat group into one sustained note.
    pub fn cadential(&self, meter: &Meter) -> Self {
        let starts = meter.group_starts();
        let last_start = starts.last().copied().unwrap_or(0);
        let mut durations: Vec<Ticks> = self
            .durations
            .iter()
            .zip(self.onsets())
            .filter(|&(_, onset)| onset < last_start)
            .map(|(&d, _)| d)
            .collect();
        durations.push(meter.measure_ticks() - last_start);
        RhythmicPattern::from_durations(meter, durations)
    }
}

fn onsets_of(durations: &[Ticks]) -> Vec<Ticks> {
    let mut at = 0;
    durations
        .iter()
        .map(|&d| {
            let onset = at;
            at += d;
            onset
        })
        .collect()
}

/// Chunk a measure's durations by beat group.
fn split_by_group(meter: &Meter, durations: &[Ticks]) -> Vec<Vec<Ticks>> {
    let mut iter = durations.iter().copied();
    let mut chunks = Vec::with_capacity(meter.groups.len());
    for group in meter.group_ticks() {
        let mut chunk = Vec::new();
        let mut filled = 0;
        while filled < group {
            match iter.next() {
                Some(d) => {
                    filled += d;
                    chunk.push(d);
                }
                None => break,
            }
        }
        chunks.push(chunk);
    }
    chunks
}

/// Onsets of the meter's beat groups: the strong positions of every
/// pattern built for it.
pub fn strong_positions(meter: &Meter) -> Vec<Ticks> {
    meter.group_starts()
}

// ── Fill options ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupShape {
    Whole,
    Split,
    LongShort,
    ShortLong,
    Dotted,
}

impl GroupShape {
    const ALL: [GroupShape; 5] = [
        GroupShape::Whole,
        GroupShape::Split,
        GroupShape::LongShort,
        GroupShape::ShortLong,
        GroupShape::Dotted,
    ];

    /// Fixed durations for a group of `units` units of `unit` ticks, or
    /// `None` if the shape does not fit. `Split` returns an empty list; its
    /// units are filled with beat figures.
    fn durations(self, units: Ticks, unit: Ticks) -> Option<Vec<Ticks>> {
        let span = units * unit;
        match self {
            GroupShape::Whole => Some(vec![span]),
            GroupShape::Split => Some(Vec::new()),
            GroupShape::LongShort if units >= 3 => Some(vec![span - unit, unit]),
            GroupShape::LongShort => (unit % 2 == 0).then(|| vec![unit, unit / 2, unit / 2]),
            GroupShape::ShortLong if units >= 3 => Some(vec![unit, span - unit]),
            GroupShape::ShortLong => (unit % 2 == 0).then(|| vec![unit / 2, unit / 2, unit]),
            GroupShape::Dotted => (span % 4 == 0).then(|| vec![span * 3 / 4, span / 4]),
        }
    }

    fn weights(complexity: u8) -> [f64; 5] {
        match complexity {
            0 | 1 => [0.35, 0.35, 0.2, 0.1, 0.0],
            2 => [0.25, 0.4, 0.15, 0.1, 0.1],
            3 => [0.15, 0.45, 0.15, 0.1, 0.15],
            4 => [0.1, 0.5, 0.1, 0.1, 0.2],
            _ => [0.05, 0.55, 0.1, 0.1, 0.2],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BeatFigure {
    Single,
    Pair,
    DottedPair,
    FourEven,
}

impl BeatFigure {
    const ALL: [BeatFigure; 4] = [
        BeatFigure::Single,
        BeatFigure::Pair,
        BeatFigure::DottedPair,
        BeatFigure::FourEven,
    ];

    fn durations(self, unit: Ticks) -> Option<Vec<Ticks>> {
        match self {
            BeatFigure::Single => Some(vec![unit]),
            BeatFigure::Pair => (unit % 2 == 0).then(|| vec![unit / 2; 2]),
            BeatFigure::DottedPair => (unit % 4 == 0).then(|| vec![unit * 3 / 4, unit / 4]),
            BeatFigure::FourEven => (unit % 4 == 0).then(|| vec![unit / 4; 4]),
        }
    }

    fn weights(complexity: u8) -> [f64; 4] {
        match complexity {
            0 | 1 => [0.7, 0.3, 0.0, 0.0],
            2 => [0.45, 0.4, 0.15, 0.0],
            3 => [0.3, 0.4, 0.2, 0.1],
            4 => [0.2, 0.35, 0.25, 0.2],
            _ => [0.1, 0.3, 0.3, 0.3],
        }
    }
}

// ── Builder ──

/// Fills measures for one meter at one complexity level.
#[derive(Debug, Clone, Copy)]
pub struct RhythmBuilder<'a> {
    meter: &'a Meter,
    complexity: u8,
    model: Option<&'a TransitionModel>,
    blend: f64,
}

impl<'a> RhythmBuilder<'a> {
    pub fn new(meter: &'a Meter, complexity: u8) -> Self {
        RhythmBuilder {
            meter,
            complexity: complexity.clamp(1, 5),
            model: None,
            blend: 0.0,
        }
    }

    /// Re-weight options by the model's duration distribution.
    pub fn with_model(mut self, model: Option<&'a TransitionModel>, blend: f64) -> Self {
        self.model = model;
        self.blend = blend.clamp(0.0, 1.0);
        self
    }

    pub fn meter(&self) -> &'a Meter {
        self.meter
    }

    pub fn complexity(&self) -> u8 {
        self.complexity
    }

    /// One full measure, group by group.
    pub fn build_base_pattern(&self, rng: &mut SeededRng) -> RhythmicPattern {
        let mut durations = Vec::new();
        for &units in &self.meter.groups {
            let fill = self.fill_group(units as Ticks, &durations, rng);
            durations.extend(fill);
        }
        RhythmicPattern::from_durations(self.meter, durations)
    }

    /// Pad a partial measure (a laid-out motif) to a full pattern. The
    /// prefix must not cross a group boundary or overrun the measure.
    pub fn complete_measure(&self, prefix: &[Ticks], rng: &mut SeededRng) -> RhythmicPattern {
        let unit = self.meter.unit_ticks();
        let measure = self.meter.measure_ticks();
        let group_ticks = self.meter.group_ticks();
        let mut durations = prefix.to_vec();
        let mut at: Ticks = durations.iter().sum();

        while at < measure {
            let (gi, group_end) = self.meter.group_containing(at);
            let group_start = group_end - group_ticks[gi];
            if at == group_start {
                let fill = self.fill_group(self.meter.groups[gi] as Ticks, &durations, rng);
                at += fill.iter().sum::<Ticks>();
                durations.extend(fill);
            } else if at % unit != 0 {
                let next_unit = (at / unit + 1) * unit;
                let d = next_unit.min(group_end) - at;
                durations.push(d);
                at += d;
            } else {
                let fill = self.fill_unit(unit, &durations, rng);
                at += fill.iter().sum::<Ticks>();
                durations.extend(fill);
            }
        }
        RhythmicPattern::from_durations(self.meter, durations)
    }

    fn fill_group(&self, units: Ticks, history: &[Ticks], rng: &mut SeededRng) -> Vec<Ticks> {
        let unit = self.meter.unit_ticks();
        if units <= 1 {
            return self.fill_unit(unit, history, rng);
        }

        let table = self.duration_table(history);
        let base = GroupShape::weights(self.complexity);
        let options: Vec<(Vec<Ticks>, f64)> = GroupShape::ALL
            .iter()
            .zip(base)
            .filter_map(|(shape, w)| {
                let durations = shape.durations(units, unit)?;
                let first = durations.first().copied().unwrap_or(unit);
                Some((durations, w * self.model_factor(table.as_ref(), first)))
            })
            .collect();

        let weights: Vec<f64> = options.iter().map(|(_, w)| *w).collect();
        let chosen = rng
            .weighted_index(&weights)
            .and_then(|i| options.get(i))
            .map(|(d, _)| d.clone())
            .unwrap_or_default();

        if chosen.is_empty() {
            let mut fill = Vec::new();
            for _ in 0..units {
                let mut context = history.to_vec();
                context.extend(&fill);
                let figure = self.fill_unit(unit, &context, rng);
                fill.extend(figure);
            }
            fill
        } else {
            chosen
        }
    }

    fn fill_unit(&self, unit: Ticks, history: &[Ticks], rng: &mut SeededRng) -> Vec<Ticks> {
        let table = self.duration_table(history);
        let base = BeatFigure::weights(self.complexity);
        let options: Vec<(Vec<Ticks>, f64)> = BeatFigure::ALL
            .iter()
            .zip(base)
            .filter_map(|(figure, w)| {
                let durations = figure.durations(unit)?;
                let first = durations[0];
                Some((durations, w * self.model_factor(table.as_ref(), first)))
            })
            .collect();
        let weights: Vec<f64> = options.iter().map(|(_, w)| *w).collect();
        rng.weighted_index(&weights)
            .and_then(|i| options.get(i))
            .map(|(d, _)| d.clone())
            .unwrap_or_else(|| vec![unit])
    }

    fn duration_table(&self, history: &[Ticks]) -> Option<BTreeMap<Ticks, f64>> {
        if self.blend <= 0.0 {
            return None;
        }
        self.model.map(|m| m.score_duration(history))
    }

    /// Multiplier in [1 - blend, 1]: options the model finds likely keep
    /// their full weight.
    fn model_factor(&self, table: Option<&BTreeMap<Ticks, f64>>, first: Ticks) -> f64 {
        let Some(table) = table else {
            return 1.0;
        };
        let max = table.values().copied().fold(0.0, f64::max);
        let relative = if max > 0.0 {
            table.get(&first).copied().unwrap_or(0.0) / max
        } else {
            0.5
        };
        (1.0 - self.blend) + self.blend * relative
    }
}

/// Per-measure patterns for the traditional strategy.
///
/// One base pattern is built and reused. Interior measures take its
/// retrograde with probability `variation_fraction`; the first two, the
/// last two and every antecedent's final measure keep the base. Every
/// phrase-final measure then gets the cadential close.
pub fn traditional_patterns(
    builder: &RhythmBuilder<'_>,
    layout: &[PhraseSpan],
    variation_fraction: f64,
    rng: &mut SeededRng,
) -> Vec<RhythmicPattern> {
    let meter = builder.meter();
    let n = layout.last().map(|s| s.end()).unwrap_or(0);
    let base = builder.build_base_pattern(rng);
    let retro = base.retrograde(meter);

    let antecedent_ends: Vec<usize> = layout
        .iter()
        .filter(|s| s.role == PhraseRole::Antecedent)
        .map(|s| s.end() - 1)
        .collect();
    let phrase_ends: Vec<usize> = layout.iter().map(|s| s.end() - 1).collect();

    (0..n)
        .map(|i| {
            let protected = i < 2 || i + 2 >= n || antecedent_ends.contains(&i);
            let pattern = if !protected && rng.random_bool(variation_fraction) {
                retro.clone()
            } else {
                base.clone()
            };
            if phrase_ends.contains(&i) {
                pattern.cadential(meter)
            } else {
                pattern
            }
        })
        .collect()
}
