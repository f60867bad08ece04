// Validation of a finished period against what was asked for.
//
// Four dimensions, each scored in [0, 1]:
//
// - key: Krumhansl-Schmuckler key finding on a duration-weighted
//   pitch-class histogram, compared with the requested tonic and
//   major/minor family, plus the share of diatonic ticks;
// - meter: every measure's durations sum to the measure length;
// - range: total span within a singable ceiling;
// - mode: the mode's characteristic degree actually sounds.
//
// The overall score is a fixed weighting of the four. A report is valid
// when every dimension is valid and the overall score meets the tolerance.
// Alongside the scores the validator lists concrete issues (leaps, runs,
// unresolved leading tones, ...) and the corrector's parameter deltas.
//
// `GeneratedPeriod` and `ValidatedPeriod` form a two-state typestate: the
// only way to a report is `GeneratedPeriod::validate`, which consumes the
// unchecked value.

use crate::config::GenerationParams;
use crate::correct::{ParameterDelta, suggest_deltas};
use crate::meter::Ticks;
use crate::period::{CadenceType, Period};
use crate::tonal::{KeyFamily, ScalePitch, TonalContext, Tonality, pitch_class_name};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Krumhansl-Kessler major key profile.
const MAJOR_PROFILE: [f64; 12] = [6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88];

/// Krumhansl-Kessler minor key profile.
const MINOR_PROFILE: [f64; 12] = [6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17];

pub const MIN_KEY_CORRELATION: f64 = 0.6;
pub const MIN_DIATONIC: f64 = 0.75;
/// Largest singable span, in semitones.
pub const SINGABLE_SPAN: u8 = 24;
/// Spans below this are flagged as too narrow.
pub const NARROW_SPAN: u8 = 7;
pub const LARGE_LEAP: u8 = 12;
/// Identical consecutive pitches that count as excessive repetition.
pub const REPETITION_RUN: usize = 4;

const KEY_WEIGHT: f64 = 0.4;
const METER_WEIGHT: f64 = 0.3;
const RANGE_WEIGHT: f64 = 0.15;
const MODE_WEIGHT: f64 = 0.15;

// ── Typestate ──

/// A period straight out of the assembler, not yet checked.
#[derive(Debug, Clone)]
pub struct GeneratedPeriod {
    period: Period,
    params: GenerationParams,
    tonality: Tonality,
}

impl GeneratedPeriod {
    pub(crate) fn new(period: Period, params: GenerationParams, tonality: Tonality) -> Self {
        GeneratedPeriod {
            period,
            params,
            tonality,
        }
    }

    pub fn period(&self) -> &Period {
        &self.period
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    pub fn validate(self) -> ValidatedPeriod {
        let report = validate_period(&self.period, &self.tonality, self.params.validation_tolerance);
        ValidatedPeriod {
            period: self.period,
            params: self.params,
            report,
        }
    }
}

/// A period with its validation report. Terminal for one attempt.
#[derive(Debug, Clone)]
pub struct ValidatedPeriod {
    period: Period,
    params: GenerationParams,
    report: ValidationReport,
}

impl ValidatedPeriod {
    pub fn period(&self) -> &Period {
        &self.period
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    pub fn report(&self) -> &ValidationReport {
        &self.report
    }

    pub fn is_valid(&self) -> bool {
        self.report.valid
    }

    pub fn into_parts(self) -> (Period, ValidationReport) {
        (self.period, self.report)
    }
}

// ── Report ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
    Suggestion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    OutOfKey,
    LargeLeap,
    UnresolvedTendency,
    MeterError,
    RangeExceeded,
    RangeTooNarrow,
    WeakCadence,
    RepetitionExcess,
}

impl IssueKind {
    pub fn severity(self) -> Severity {
        match self {
            IssueKind::OutOfKey | IssueKind::MeterError => Severity::Critical,
            IssueKind::LargeLeap | IssueKind::RangeExceeded | IssueKind::WeakCadence => {
                Severity::Warning
            }
            IssueKind::UnresolvedTendency
            | IssueKind::RangeTooNarrow
            | IssueKind::RepetitionExcess => Severity::Suggestion,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub severity: Severity,
    /// Measure index, when the issue is local.
    pub measure: Option<usize>,
    pub message: String,
}

impl ValidationIssue {
    fn new(kind: IssueKind, measure: Option<usize>, message: String) -> Self {
        ValidationIssue {
            kind,
            severity: kind.severity(),
            measure,
            message,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.measure {
            Some(m) => write!(f, "[{:?}] m.{}: {}", self.severity, m + 1, self.message),
            None => write!(f, "[{:?}] {}", self.severity, self.message),
        }
    }
}

/// Best-fitting key among the 24 major and minor keys.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyDetection {
    pub tonic_pc: u8,
    pub family: KeyFamily,
    pub correlation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValidation {
    pub detected: KeyDetection,
    /// Correlation of the histogram with the requested key's profile.
    pub expected_correlation: f64,
    /// Share of sounding ticks on diatonic pitches.
    pub diatonic: f64,
    pub matches: bool,
    pub score: f64,
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterValidation {
    pub valid_measures: usize,
    pub total_measures: usize,
    pub score: f64,
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeValidation {
    pub lowest: Option<u8>,
    pub highest: Option<u8>,
    pub span: u8,
    pub score: f64,
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeValidation {
    pub characteristic_degree: u8,
    pub present: bool,
    pub score: f64,
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub key: KeyValidation,
    pub meter: MeterValidation,
    pub range: RangeValidation,
    pub mode: ModeValidation,
    pub overall: f64,
    pub tolerance: f64,
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
    /// Corrections to try next, most important first.
    pub deltas: Vec<ParameterDelta>,
}

impl ValidationReport {
    pub fn issues_with(&self, severity: Severity) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.severity == severity)
    }

    pub fn issues_in_measure(&self, measure: usize) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.measure == Some(measure))
    }

    /// Multi-line summary for the CLI.
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!(
                "key:   {:.2} (detected {} {:?}, r = {:.2}, diatonic {:.0}%)",
                self.key.score,
                pitch_class_name(self.key.detected.tonic_pc),
                self.key.detected.family,
                self.key.detected.correlation,
                self.key.diatonic * 100.0
            ),
            format!(
                "meter: {:.2} ({}/{} measures)",
                self.meter.score, self.meter.valid_measures, self.meter.total_measures
            ),
            format!("range: {:.2} ({} semitones)", self.range.score, self.range.span),
            format!(
                "mode:  {:.2} (degree {} {})",
                self.mode.score,
                self.mode.characteristic_degree,
                if self.mode.present { "present" } else { "missing" }
            ),
            format!(
                "overall {:.2} / tolerance {:.2}: {}",
                self.overall,
                self.tolerance,
                if self.valid { "valid" } else { "invalid" }
            ),
        ];
        for severity in [Severity::Critical, Severity::Warning, Severity::Suggestion] {
            let n = self.issues_with(severity).count();
            if n > 0 {
                lines.push(format!("  {n} {severity:?} issue(s)"));
            }
        }
        lines.join("\n")
    }
}

// ── Validation ──

/// One sounding note, flattened out of the period.
struct Sounding {
    measure: usize,
    pitch: ScalePitch,
    midi: u8,
    duration: Ticks,
}

fn sounding_notes(period: &Period, tonality: &Tonality) -> Vec<Sounding> {
    period
        .measures()
        .flat_map(|m| {
            m.events.iter().filter_map(move |e| {
                let pitch = e.pitch?;
                Some(Sounding {
                    measure: m.index,
                    pitch,
                    midi: tonality.pitch_of(pitch),
                    duration: e.duration,
                })
            })
        })
        .collect()
}

/// Score a period against the requested tonality and meter.
pub fn validate_period(period: &Period, tonality: &Tonality, tolerance: f64) -> ValidationReport {
    let notes = sounding_notes(period, tonality);
    let key = validate_key(&notes, tonality);
    let meter = validate_meter(period);
    let range = validate_range(&notes);
    let mode = validate_mode(&notes, tonality);

    let overall = KEY_WEIGHT * key.score
        + METER_WEIGHT * meter.score
        + RANGE_WEIGHT * range.score
        + MODE_WEIGHT * mode.score;
    let valid = key.valid && meter.valid && range.valid && mode.valid && overall >= tolerance;

    let issues = detect_issues(period, &notes, tonality, &range);
    let deltas = suggest_deltas(&key, &meter, &range, &mode);

    ValidationReport {
        key,
        meter,
        range,
        mode,
        overall,
        tolerance,
        valid,
        issues,
        deltas,
    }
}

fn histogram(notes: &[Sounding]) -> [f64; 12] {
    let mut hist = [0.0; 12];
    for note in notes {
        hist[(note.midi % 12) as usize] += note.duration.max(1) as f64;
    }
    let total: f64 = hist.iter().sum();
    if total > 0.0 {
        for h in &mut hist {
            *h /= total;
        }
    }
    hist
}

/// Correlation of a histogram with one key's profile.
fn key_correlation(hist: &[f64; 12], tonic_pc: u8, family: KeyFamily) -> f64 {
    let mut rotated = [0.0; 12];
    for (i, r) in rotated.iter_mut().enumerate() {
        *r = hist[(i + tonic_pc as usize) % 12];
    }
    let profile = match family {
        KeyFamily::Major => &MAJOR_PROFILE,
        KeyFamily::Minor => &MINOR_PROFILE,
    };
    pearson(&rotated, profile)
}

/// Krumhansl-Schmuckler: the best of 24 profile correlations.
pub fn detect_key(hist: &[f64; 12]) -> KeyDetection {
    let mut best = KeyDetection {
        tonic_pc: 0,
        family: KeyFamily::Major,
        correlation: -1.0,
    };
    for tonic_pc in 0..12u8 {
        for family in [KeyFamily::Major, KeyFamily::Minor] {
            let correlation = key_correlation(hist, tonic_pc, family);
            if correlation > best.correlation {
                best = KeyDetection {
                    tonic_pc,
                    family,
                    correlation,
                };
            }
        }
    }
    best
}

/// Pearson correlation coefficient between two 12-element arrays.
fn pearson(x: &[f64; 12], y: &[f64; 12]) -> f64 {
    let x_mean: f64 = x.iter().sum::<f64>() / 12.0;
    let y_mean: f64 = y.iter().sum::<f64>() / 12.0;

    let mut num = 0.0;
    let mut x_sq = 0.0;
    let mut y_sq = 0.0;
    for (a, b) in x.iter().zip(y) {
        let xd = a - x_mean;
        let yd = b - y_mean;
        num += xd * yd;
        x_sq += xd * xd;
        y_sq += yd * yd;
    }

    let denom = (x_sq * y_sq).sqrt();
    if denom < 1e-10 {
        return 0.0;
    }
    num / denom
}

fn validate_key(notes: &[Sounding], tonality: &Tonality) -> KeyValidation {
    let hist = histogram(notes);
    let detected = detect_key(&hist);
    let family = tonality.mode.family();
    let expected_correlation = key_correlation(&hist, tonality.tonic_pc, family);

    let total: Ticks = notes.iter().map(|n| n.duration).sum();
    let diatonic_ticks: Ticks = notes
        .iter()
        .filter(|n| tonality.is_diatonic(n.midi))
        .map(|n| n.duration)
        .sum();
    let diatonic = if total > 0 {
        diatonic_ticks as f64 / total as f64
    } else {
        0.0
    };

    let matches = !notes.is_empty()
        && detected.tonic_pc == tonality.tonic_pc
        && detected.family == family;
    let score = if matches { 1.0 } else { 0.3 } * expected_correlation.max(0.0);
    let valid = matches && expected_correlation >= MIN_KEY_CORRELATION && diatonic >= MIN_DIATONIC;

    KeyValidation {
        detected,
        expected_correlation,
        diatonic,
        matches,
        score,
        valid,
    }
}

fn validate_meter(period: &Period) -> MeterValidation {
    let expected = period.meta.meter.measure_ticks();
    let total_measures = period.measures().count();
    let valid_measures = period
        .measures()
        .filter(|m| m.total_ticks() == expected)
        .count();
    let score = if total_measures > 0 {
        valid_measures as f64 / total_measures as f64
    } else {
        0.0
    };
    MeterValidation {
        valid_measures,
        total_measures,
        score,
        valid: total_measures > 0 && valid_measures == total_measures,
    }
}

fn validate_range(notes: &[Sounding]) -> RangeValidation {
    let lowest = notes.iter().map(|n| n.midi).min();
    let highest = notes.iter().map(|n| n.midi).max();
    let span = match (lowest, highest) {
        (Some(lo), Some(hi)) => hi - lo,
        _ => 0,
    };
    let valid = span <= SINGABLE_SPAN;
    RangeValidation {
        lowest,
        highest,
        span,
        score: if valid { 1.0 } else { 0.7 },
        valid,
    }
}

fn validate_mode(notes: &[Sounding], tonality: &Tonality) -> ModeValidation {
    let characteristic_degree = tonality.mode.characteristic_degree();
    let present = notes
        .iter()
        .any(|n| n.pitch.degree == characteristic_degree && !n.pitch.is_altered());
    let score = if present { 1.0 } else { 0.4 };
    ModeValidation {
        characteristic_degree,
        present,
        score,
        valid: score >= 0.6,
    }
}

// ── Issues ──

fn detect_issues(
    period: &Period,
    notes: &[Sounding],
    tonality: &Tonality,
    range: &RangeValidation,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let expected = period.meta.meter.measure_ticks();
    for m in period.measures() {
        let total = m.total_ticks();
        if total != expected {
            issues.push(ValidationIssue::new(
                IssueKind::MeterError,
                Some(m.index),
                format!("measure lasts {total} ticks, expected {expected}"),
            ));
        }
    }

    for n in notes.iter().filter(|n| !tonality.is_diatonic(n.midi)) {
        issues.push(ValidationIssue::new(
            IssueKind::OutOfKey,
            Some(n.measure),
            format!("pitch {} is outside {} {}", n.midi, tonality.tonic_name(), tonality.mode),
        ));
    }

    // A leading tone only pulls when it sits a semitone under the tonic.
    let leading_tone = tonality.mode.intervals()[6] == 11;
    for pair in notes.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let leap = a.midi.abs_diff(b.midi);
        if leap > LARGE_LEAP {
            issues.push(ValidationIssue::new(
                IssueKind::LargeLeap,
                Some(b.measure),
                format!("leap of {leap} semitones"),
            ));
        }
        if leading_tone
            && a.pitch.degree == 7
            && !a.pitch.is_altered()
            && !(b.pitch.degree == 1 && b.midi.abs_diff(a.midi) == 1)
        {
            issues.push(ValidationIssue::new(
                IssueKind::UnresolvedTendency,
                Some(a.measure),
                "leading tone does not resolve up to the tonic".to_string(),
            ));
        }
    }

    let mut run = 1;
    for (i, pair) in notes.windows(2).enumerate() {
        if pair[0].midi == pair[1].midi {
            run += 1;
            if run == REPETITION_RUN {
                issues.push(ValidationIssue::new(
                    IssueKind::RepetitionExcess,
                    Some(notes[i + 1].measure),
                    format!("pitch {} repeated {REPETITION_RUN} times", pair[1].midi),
                ));
            }
        } else {
            run = 1;
        }
    }

    if range.span > SINGABLE_SPAN {
        issues.push(ValidationIssue::new(
            IssueKind::RangeExceeded,
            None,
            format!("span of {} semitones exceeds {SINGABLE_SPAN}", range.span),
        ));
    } else if !notes.is_empty() && range.span < NARROW_SPAN {
        issues.push(ValidationIssue::new(
            IssueKind::RangeTooNarrow,
            None,
            format!("span of {} semitones is under {NARROW_SPAN}", range.span),
        ));
    }

    for phrase in period.phrases() {
        if phrase.cadence != CadenceType::Authentic {
            continue;
        }
        let last = phrase.last_sounding().and_then(|e| e.pitch);
        if last.is_none_or(|p| p.degree != 1) {
            let measure = phrase.measures.last().map(|m| m.index);
            issues.push(ValidationIssue::new(
                IssueKind::WeakCadence,
                measure,
                "authentic cadence does not land on the tonic".to_string(),
            ));
        }
    }

    issues
}
