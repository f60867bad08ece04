// Harmonic context: one harmonic function per measure.
//
// The assigner is a deterministic lookup. Each phrase of the period layout
// gets its measures from a fixed template: antecedents close on V (half
// cadence) and consequents/extensions close on I through IV (authentic
// cadence). An 8-measure period reads I-I-IV-V-I-I-IV-I; longer periods
// are tiled by the fractal layout in period.rs, so the same templates apply
// to each sub-period.
//
// The scorer reads chord-tone sets from here through `TonalContext`.

use crate::period::{PhraseRole, PhraseSpan};
use serde::{Deserialize, Serialize};

/// Diatonic triads by root degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HarmonicFunction {
    I,
    II,
    III,
    IV,
    V,
    VI,
    VII,
}

/// Tonal family of a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionFamily {
    Tonic,
    Subdominant,
    Dominant,
}

impl HarmonicFunction {
    pub fn from_root(root: u8) -> Self {
        match (root.max(1) - 1) % 7 {
            0 => HarmonicFunction::I,
            1 => HarmonicFunction::II,
            2 => HarmonicFunction::III,
            3 => HarmonicFunction::IV,
            4 => HarmonicFunction::V,
            5 => HarmonicFunction::VI,
            _ => HarmonicFunction::VII,
        }
    }

    /// Root scale degree (1-7).
    pub fn root(self) -> u8 {
        self as u8 + 1
    }

    /// Root, third and fifth as scale degrees. I gives {1,3,5}, IV gives
    /// {4,6,1}, V gives {5,7,2}.
    pub fn chord_tones(self) -> [u8; 3] {
        let r = self.root();
        [r, wrap_degree(r + 2), wrap_degree(r + 4)]
    }

    pub fn contains(self, degree: u8) -> bool {
        self.chord_tones().contains(&degree)
    }

    pub fn family(self) -> FunctionFamily {
        match self {
            HarmonicFunction::I | HarmonicFunction::III | HarmonicFunction::VI => {
                FunctionFamily::Tonic
            }
            HarmonicFunction::II | HarmonicFunction::IV => FunctionFamily::Subdominant,
            HarmonicFunction::V | HarmonicFunction::VII => FunctionFamily::Dominant,
        }
    }

    /// Harmonic tension, 0.0 (rest) to 0.9 (leading-tone chord).
    pub fn tension(self) -> f64 {
        match self {
            HarmonicFunction::I => 0.0,
            HarmonicFunction::II => 0.4,
            HarmonicFunction::III => 0.3,
            HarmonicFunction::IV => 0.5,
            HarmonicFunction::V => 0.8,
            HarmonicFunction::VI => 0.3,
            HarmonicFunction::VII => 0.9,
        }
    }

    /// Roman numeral label.
    pub fn numeral(self) -> &'static str {
        match self {
            HarmonicFunction::I => "I",
            HarmonicFunction::II => "II",
            HarmonicFunction::III => "III",
            HarmonicFunction::IV => "IV",
            HarmonicFunction::V => "V",
            HarmonicFunction::VI => "VI",
            HarmonicFunction::VII => "VII",
        }
    }
}

/// Map any positive degree offset back into 1-7.
pub fn wrap_degree(degree: u8) -> u8 {
    (degree.max(1) - 1) % 7 + 1
}

/// Harmonic function for measure `i` of a phrase of `len` measures.
pub fn phrase_function(role: PhraseRole, i: usize, len: usize) -> HarmonicFunction {
    use HarmonicFunction::{I, IV, V};
    match role {
        PhraseRole::Antecedent => {
            if i + 1 == len {
                V
            } else {
                [I, I, IV][i % 3]
            }
        }
        PhraseRole::Consequent | PhraseRole::Extension => {
            if i + 1 == len {
                I
            } else if len >= 3 && i + 2 == len {
                IV
            } else {
                I
            }
        }
    }
}

/// One function per measure across the whole layout.
pub fn progression(layout: &[PhraseSpan]) -> Vec<HarmonicFunction> {
    layout
        .iter()
        .flat_map(|span| (0..span.len).map(move |i| phrase_function(span.role, i, span.len)))
        .collect()
}
