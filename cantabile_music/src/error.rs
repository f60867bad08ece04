// Error taxonomy for the melody engine.
//
// Only configuration problems and I/O-side failures are errors. A slot where
// no candidate survives the hard constraints is handled inside the scorer by
// the nearest-chord-tone fallback, and a failed validation is an ordinary
// `ValidationReport`, so neither appears here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MelodyError {
    #[error("invalid meter {numerator}/{denominator}: {reason}")]
    InvalidMeter {
        numerator: u8,
        denominator: u8,
        reason: String,
    },
    #[error("parameter `{name}` out of range: {reason}")]
    OutOfRange { name: &'static str, reason: String },
    #[error("measure count {count} does not fit the period layout: {reason}")]
    MeasureCount { count: usize, reason: String },
    #[error("unknown tonic `{0}`")]
    UnknownTonic(String),
    #[error("unknown composer `{0}`")]
    UnknownComposer(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("MIDI error: {0}")]
    Midi(String),
}

impl MelodyError {
    /// True for errors raised while checking parameters, before any
    /// generation work starts.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            MelodyError::InvalidMeter { .. }
                | MelodyError::OutOfRange { .. }
                | MelodyError::MeasureCount { .. }
                | MelodyError::UnknownTonic(_)
                | MelodyError::UnknownComposer(_)
        )
    }

    pub(crate) fn out_of_range(name: &'static str, reason: impl Into<String>) -> Self {
        MelodyError::OutOfRange {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MelodyError>;
