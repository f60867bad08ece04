// Parameter corrections derived from a validation report.
//
// Each failed dimension maps to one adjustment of the generation
// parameters. The mapping is fixed and ordered by importance:
//
//   key mismatch or low diatonic share  -> halve the infraction rate
//   key mismatch or low correlation     -> raise the tonic emphasis
//   meter errors                        -> lower rhythmic complexity
//   range exceeded                      -> cap the melodic interval
//   characteristic degree missing       -> emphasize the modal degree
//
// A too-narrow range gets no correction; widening would fight the interval
// cap. The retry loop in main.rs applies `propose_correction` and generates
// again with a new seed.

use crate::config::{GenerationParams, MAX_TONIC_EMPHASIS};
use crate::validate::{
    KeyValidation, MIN_DIATONIC, MIN_KEY_CORRELATION, MeterValidation, ModeValidation,
    RangeValidation, ValidationReport,
};
use serde::{Deserialize, Serialize};
use std::fmt;

const INFRACTION_FACTOR: f64 = 0.5;
const CAPPED_INTERVAL: u8 = 4;
const TONIC_FACTOR: f64 = 1.5;

/// One suggested change to the generation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParameterDelta {
    /// Multiply `infraction_rate` by `factor`.
    ScaleInfractionRate { factor: f64 },
    /// Multiply `tonic_emphasis` by `factor`, up to its ceiling.
    ScaleTonicEmphasis { factor: f64 },
    /// Reduce `rhythmic_complexity` by `by`, never below 1.
    LowerComplexity { by: u8 },
    /// Limit `max_interval` to at most `semitones`.
    CapMaxInterval { semitones: u8 },
    /// Turn on `emphasize_modal_degrees`.
    EmphasizeModalDegrees,
}

impl fmt::Display for ParameterDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterDelta::ScaleInfractionRate { factor } => {
                write!(f, "infraction_rate x {factor}")
            }
            ParameterDelta::ScaleTonicEmphasis { factor } => {
                write!(f, "tonic_emphasis x {factor}")
            }
            ParameterDelta::LowerComplexity { by } => write!(f, "complexity - {by}"),
            ParameterDelta::CapMaxInterval { semitones } => {
                write!(f, "max_interval <= {semitones}")
            }
            ParameterDelta::EmphasizeModalDegrees => f.write_str("emphasize_modal_degrees"),
        }
    }
}

/// Deltas for the failed dimensions, most important first.
pub fn suggest_deltas(
    key: &KeyValidation,
    meter: &MeterValidation,
    range: &RangeValidation,
    mode: &ModeValidation,
) -> Vec<ParameterDelta> {
    let mut deltas = Vec::new();
    if !key.matches || key.diatonic < MIN_DIATONIC {
        deltas.push(ParameterDelta::ScaleInfractionRate {
            factor: INFRACTION_FACTOR,
        });
    }
    if !key.matches || key.expected_correlation < MIN_KEY_CORRELATION {
        deltas.push(ParameterDelta::ScaleTonicEmphasis {
            factor: TONIC_FACTOR,
        });
    }
    if !meter.valid {
        deltas.push(ParameterDelta::LowerComplexity { by: 1 });
    }
    if !range.valid {
        deltas.push(ParameterDelta::CapMaxInterval {
            semitones: CAPPED_INTERVAL,
        });
    }
    if !mode.valid {
        deltas.push(ParameterDelta::EmphasizeModalDegrees);
    }
    deltas
}

pub fn apply_delta(params: &mut GenerationParams, delta: ParameterDelta) {
    match delta {
        ParameterDelta::ScaleInfractionRate { factor } => {
            params.infraction_rate = (params.infraction_rate * factor).clamp(0.0, 1.0);
        }
        ParameterDelta::ScaleTonicEmphasis { factor } => {
            params.tonic_emphasis = (params.tonic_emphasis * factor).clamp(1.0, MAX_TONIC_EMPHASIS);
        }
        ParameterDelta::LowerComplexity { by } => {
            params.rhythmic_complexity = params.rhythmic_complexity.saturating_sub(by).max(1);
        }
        ParameterDelta::CapMaxInterval { semitones } => {
            params.max_interval = params.max_interval.min(semitones);
        }
        ParameterDelta::EmphasizeModalDegrees => params.emphasize_modal_degrees = true,
    }
}

/// Parameters for the next attempt: `params` with every delta of the report
/// applied. Returns an unchanged copy when the report has none.
pub fn propose_correction(report: &ValidationReport, params: &GenerationParams) -> GenerationParams {
    let mut next = params.clone();
    for &delta in &report.deltas {
        apply_delta(&mut next, delta);
    }
    next
}
