// Period data model and formal layout.
//
// A `Period` is the unit the engine hands back: one or more sub-periods
// (antecedent + consequent) followed by an optional extension phrase, each
// phrase an ordered list of measures, each measure an ordered list of
// `NoteEvent`s whose durations sum to exactly one measure.
//
// Events are immutable once placed and record which decision placed them
// (scored candidate, motif hint, cadence override, ...) so finished output
// can be traced back to the mechanism responsible.
//
// `plan_layout` turns a measure count into phrase spans using the fractal
// rule: whole 8-measure sub-periods first, any even remainder as an
// extension phrase. harmony.rs and assembler.rs both consume the layout.

use crate::config::GenerationStrategy;
use crate::error::{MelodyError, Result};
use crate::harmony::HarmonicFunction;
use crate::meter::{Meter, MetricWeight, Ticks};
use crate::tonal::{Mode, ScalePitch};
use serde::{Deserialize, Serialize};

/// Measures in one full sub-period.
pub const SUB_PERIOD_MEASURES: usize = 8;

/// Largest measure count accepted.
pub const MAX_MEASURES: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhraseRole {
    Antecedent,
    Consequent,
    Extension,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CadenceType {
    /// Pause on the dominant.
    Half,
    /// Resolution to the tonic.
    Authentic,
}

/// A phrase's place in the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseSpan {
    pub sub_period: usize,
    pub role: PhraseRole,
    /// Index of the phrase's first measure in the period.
    pub start: usize,
    pub len: usize,
    pub cadence: CadenceType,
}

impl PhraseSpan {
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn contains(&self, measure: usize) -> bool {
        (self.start..self.end()).contains(&measure)
    }
}

/// Split `measures` into phrase spans.
///
/// Up to 8 measures (even, at least 2) form one period split in half.
/// Beyond that, whole 8-measure sub-periods come first and an even
/// remainder becomes an extension phrase with an authentic cadence.
pub fn plan_layout(measures: usize) -> Result<Vec<PhraseSpan>> {
    let fail = |reason: &str| MelodyError::MeasureCount {
        count: measures,
        reason: reason.to_string(),
    };
    if measures < 2 {
        return Err(fail("a period needs at least two measures"));
    }
    if measures > MAX_MEASURES {
        return Err(fail("too many measures"));
    }
    if measures % 2 != 0 {
        return Err(fail("antecedent and consequent need an even measure count"));
    }

    let mut spans = Vec::new();
    let push_period = |spans: &mut Vec<PhraseSpan>, sub_period: usize, start: usize, len: usize| {
        let half = len / 2;
        spans.push(PhraseSpan {
            sub_period,
            role: PhraseRole::Antecedent,
            start,
            len: half,
            cadence: CadenceType::Half,
        });
        spans.push(PhraseSpan {
            sub_period,
            role: PhraseRole::Consequent,
            start: start + half,
            len: half,
            cadence: CadenceType::Authentic,
        });
    };

    if measures <= SUB_PERIOD_MEASURES {
        push_period(&mut spans, 0, 0, measures);
        return Ok(spans);
    }

    let whole = measures / SUB_PERIOD_MEASURES;
    for sp in 0..whole {
        push_period(&mut spans, sp, sp * SUB_PERIOD_MEASURES, SUB_PERIOD_MEASURES);
    }
    let remainder = measures % SUB_PERIOD_MEASURES;
    if remainder > 0 {
        spans.push(PhraseSpan {
            sub_period: whole - 1,
            role: PhraseRole::Extension,
            start: whole * SUB_PERIOD_MEASURES,
            len: remainder,
            cadence: CadenceType::Authentic,
        });
    }
    Ok(spans)
}

/// Melodic function of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteRole {
    Structural,
    Passing,
    Neighbor,
    Appoggiatura,
    Tenoris,
    Rest,
}

/// What placed an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Best candidate by weighted score.
    Scored,
    /// Candidate matching the motif's degree hint.
    Motif,
    /// Cadence override on a phrase's final slots.
    Cadence,
    /// Planned climax pitch.
    Climax,
    /// Forced reciting tone.
    Tenoris,
    /// Controlled chromatic violation.
    Infraction,
    /// Forced resolution after an infraction.
    Compensation,
    /// Nearest chord tone when no candidate survived.
    Fallback,
    /// Rest placement policy.
    Rest,
}

impl Decision {
    /// True for decisions that bypass the scorer's ranking.
    pub fn is_override(self) -> bool {
        matches!(
            self,
            Decision::Cadence
                | Decision::Climax
                | Decision::Tenoris
                | Decision::Compensation
                | Decision::Fallback
        )
    }
}

/// One note or rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// `None` for rests.
    pub pitch: Option<ScalePitch>,
    pub duration: Ticks,
    /// Onset within the measure.
    pub onset: Ticks,
    pub weight: MetricWeight,
    pub role: NoteRole,
    pub infraction: bool,
    pub decision: Decision,
}

impl NoteEvent {
    pub fn rest(onset: Ticks, duration: Ticks, weight: MetricWeight) -> Self {
        NoteEvent {
            pitch: None,
            duration,
            onset,
            weight,
            role: NoteRole::Rest,
            infraction: false,
            decision: Decision::Rest,
        }
    }

    pub fn is_rest(&self) -> bool {
        self.pitch.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measure {
    pub index: usize,
    pub harmony: HarmonicFunction,
    pub events: Vec<NoteEvent>,
    /// Provenance label of the motif form stated here, if any.
    pub motif: Option<String>,
}

impl Measure {
    pub fn total_ticks(&self) -> Ticks {
        self.events.iter().map(|e| e.duration).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phrase {
    pub role: PhraseRole,
    pub cadence: CadenceType,
    pub measures: Vec<Measure>,
}

impl Phrase {
    pub fn last_sounding(&self) -> Option<&NoteEvent> {
        self.measures
            .iter()
            .flat_map(|m| m.events.iter())
            .rev()
            .find(|e| !e.is_rest())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubPeriod {
    pub antecedent: Phrase,
    pub consequent: Phrase,
}

/// Request metadata carried with the output for serializers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodMeta {
    pub tonic: String,
    pub mode: Mode,
    pub meter: Meter,
    pub measures: usize,
    pub strategy: GenerationStrategy,
    pub seed: u64,
}

/// Where the climax was planned and whether it sounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClimaxSummary {
    pub measure: usize,
    pub pitch: u8,
    pub reached: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub meta: PeriodMeta,
    pub sub_periods: Vec<SubPeriod>,
    pub extension: Option<Phrase>,
    pub climax: Option<ClimaxSummary>,
}

impl Period {
    /// Assemble from phrases in layout order.
    pub fn from_phrases(
        meta: PeriodMeta,
        phrases: Vec<Phrase>,
        climax: Option<ClimaxSummary>,
    ) -> Self {
        let mut sub_periods = Vec::new();
        let mut extension = None;
        let mut pending: Option<Phrase> = None;
        for phrase in phrases {
            match phrase.role {
                PhraseRole::Antecedent => pending = Some(phrase),
                PhraseRole::Consequent => {
                    if let Some(antecedent) = pending.take() {
                        sub_periods.push(SubPeriod {
                            antecedent,
                            consequent: phrase,
                        });
                    }
                }
                PhraseRole::Extension => extension = Some(phrase),
            }
        }
        Period {
            meta,
            sub_periods,
            extension,
            climax,
        }
    }

    /// Phrases in playing order.
    pub fn phrases(&self) -> impl Iterator<Item = &Phrase> {
        self.sub_periods
            .iter()
            .flat_map(|sp| [&sp.antecedent, &sp.consequent])
            .chain(self.extension.iter())
    }

    pub fn measures(&self) -> impl Iterator<Item = &Measure> {
        self.phrases().flat_map(|p| p.measures.iter())
    }

    pub fn events(&self) -> impl Iterator<Item = &NoteEvent> {
        self.measures().flat_map(|m| m.events.iter())
    }

    pub fn total_ticks(&self) -> Ticks {
        self.measures().map(|m| m.total_ticks()).sum()
    }
}
