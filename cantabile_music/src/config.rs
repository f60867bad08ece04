// Generation parameters.
//
// Every tunable the engine reads lives in `GenerationParams`. It can be
// built in code, loaded from a JSON file, or adjusted field by field by the
// CLI or by `correct::propose_correction`. Missing JSON fields take their
// defaults (`#[serde(default)]`), so a config file only needs the values it
// changes.
//
// `validate()` is the single gate for configuration errors: meter shape,
// measure count against the period layout, tonic name and every numeric
// range. The engine calls it before generating anything.

use crate::error::{MelodyError, Result};
use crate::meter::{Meter, MeterSpec};
use crate::period::plan_layout;
use crate::tonal::{Mode, Tonality};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Ceiling for `tonic_emphasis`.
pub const MAX_TONIC_EMPHASIS: f64 = 3.0;

/// How the assembler turns harmony and rhythm into a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStrategy {
    /// One rhythmic pattern reused across the period, pitches chosen slot
    /// by slot.
    Traditional,
    /// A seed motif stated and varied in 2-measure units.
    Hierarchical,
}

/// How the melody meets the first downbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpulseType {
    /// On the beat.
    Tetic,
    /// Lead-in before the downbeat.
    Anacrustic,
    /// Silent downbeat.
    Acephalous,
}

/// Reference composer for the probability model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Composer {
    Bach,
    Mozart,
    Beethoven,
    Combined,
}

impl Composer {
    pub const ALL: [Composer; 4] = [
        Composer::Bach,
        Composer::Mozart,
        Composer::Beethoven,
        Composer::Combined,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Composer::Bach => "bach",
            Composer::Mozart => "mozart",
            Composer::Beethoven => "beethoven",
            Composer::Combined => "combined",
        }
    }

    pub fn from_name(name: &str) -> Result<Composer> {
        Composer::ALL
            .into_iter()
            .find(|c| c.name() == name.trim().to_lowercase())
            .ok_or_else(|| MelodyError::UnknownComposer(name.to_string()))
    }
}

impl fmt::Display for Composer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Probability model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbabilityParams {
    pub enabled: bool,
    pub composer: Composer,
    /// Blend weight of the model's score (0 = ignored, 1 = dominant).
    pub weight: f64,
    /// Context length, 1 to 3.
    pub order: usize,
}

impl Default for ProbabilityParams {
    fn default() -> Self {
        ProbabilityParams {
            enabled: false,
            composer: Composer::Bach,
            weight: 0.3,
            order: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    // ------------------------------------------------------------------
    // Tonal and metric frame
    // ------------------------------------------------------------------
    /// Tonic name, e.g. "C", "F#", "Bb".
    pub tonic: String,
    pub mode: Mode,
    pub meter: MeterSpec,
    /// Period length. Even, 2 to 256; above 8 the fractal layout applies.
    pub measures: usize,
    pub strategy: GenerationStrategy,
    pub impulse: ImpulseType,

    // ------------------------------------------------------------------
    // Rhythm
    // ------------------------------------------------------------------
    /// 1 (plain) to 5 (busy). Higher levels subdivide beats more often.
    pub rhythmic_complexity: u8,
    /// Fraction of interior measures that take the retrograde rhythm in the
    /// traditional strategy.
    pub rhythm_variation_fraction: f64,
    pub use_rests: bool,
    pub rest_probability: f64,

    // ------------------------------------------------------------------
    // Pitch
    // ------------------------------------------------------------------
    /// Probability that a strong slot takes a chromatic infraction.
    pub infraction_rate: f64,
    /// Largest melodic interval in semitones outside the climax.
    pub max_interval: u8,
    /// Climax location as a fraction of the period (0-1).
    pub climax_position: f64,
    /// Register expansion toward the climax (1-2).
    pub climax_intensity: f64,
    pub use_tenoris: bool,
    pub tenoris_probability: f64,
    /// Score multiplier for the tonic degree (1 = neutral). Raised by the
    /// corrector when the key does not come through.
    pub tonic_emphasis: f64,
    /// Favor the mode's characteristic degree. Set by the corrector when
    /// that degree never sounds.
    pub emphasize_modal_degrees: bool,

    // ------------------------------------------------------------------
    // Motif variation (hierarchical strategy)
    // ------------------------------------------------------------------
    pub use_variations: bool,
    pub variation_probability: f64,
    /// 1 = strict, 2 = moderate, 3 = free.
    pub variation_freedom: u8,

    // ------------------------------------------------------------------
    // Probability model and validation
    // ------------------------------------------------------------------
    pub probability: ProbabilityParams,
    /// Overall validation score required to accept a period.
    pub validation_tolerance: f64,
}

impl Default for GenerationParams {
    fn default() -> Self {
        GenerationParams {
            tonic: "C".to_string(),
            mode: Mode::Major,
            meter: MeterSpec::default(),
            measures: 8,
            strategy: GenerationStrategy::Traditional,
            impulse: ImpulseType::Tetic,
            rhythmic_complexity: 3,
            rhythm_variation_fraction: 0.3,
            use_rests: true,
            rest_probability: 0.15,
            infraction_rate: 0.1,
            max_interval: 6,
            climax_position: 0.75,
            climax_intensity: 1.5,
            use_tenoris: false,
            tenoris_probability: 0.2,
            tonic_emphasis: 1.0,
            emphasize_modal_degrees: false,
            use_variations: true,
            variation_probability: 0.4,
            variation_freedom: 2,
            probability: ProbabilityParams::default(),
            validation_tolerance: 0.65,
        }
    }
}

impl GenerationParams {
    /// Load parameters from a JSON file and validate them.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let params: GenerationParams = serde_json::from_str(&data)?;
        params.validate()?;
        Ok(params)
    }

    /// Resolve the tonic and mode.
    pub fn tonality(&self) -> Result<Tonality> {
        Tonality::from_names(&self.tonic, self.mode)
    }

    /// Resolve the meter.
    pub fn resolved_meter(&self) -> Result<Meter> {
        Meter::from_spec(&self.meter)
    }

    /// Check every parameter. Returns the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.tonality()?;
        self.resolved_meter()?;
        plan_layout(self.measures)?;

        unit_interval("infraction_rate", self.infraction_rate)?;
        unit_interval("rest_probability", self.rest_probability)?;
        unit_interval("rhythm_variation_fraction", self.rhythm_variation_fraction)?;
        unit_interval("variation_probability", self.variation_probability)?;
        unit_interval("tenoris_probability", self.tenoris_probability)?;
        unit_interval("climax_position", self.climax_position)?;
        unit_interval("probability.weight", self.probability.weight)?;
        unit_interval("validation_tolerance", self.validation_tolerance)?;

        if !(1..=5).contains(&self.rhythmic_complexity) {
            return Err(MelodyError::out_of_range(
                "rhythmic_complexity",
                format!("{} is not in 1..=5", self.rhythmic_complexity),
            ));
        }
        if !(1..=3).contains(&self.variation_freedom) {
            return Err(MelodyError::out_of_range(
                "variation_freedom",
                format!("{} is not in 1..=3", self.variation_freedom),
            ));
        }
        if !(1..=12).contains(&self.max_interval) {
            return Err(MelodyError::out_of_range(
                "max_interval",
                format!("{} semitones is not in 1..=12", self.max_interval),
            ));
        }
        if !(1.0..=2.0).contains(&self.climax_intensity) {
            return Err(MelodyError::out_of_range(
                "climax_intensity",
                format!("{} is not in 1.0..=2.0", self.climax_intensity),
            ));
        }
        if !(1.0..=MAX_TONIC_EMPHASIS).contains(&self.tonic_emphasis) {
            return Err(MelodyError::out_of_range(
                "tonic_emphasis",
                format!("{} is not in 1.0..={MAX_TONIC_EMPHASIS}", self.tonic_emphasis),
            ));
        }
        if !(1..=3).contains(&self.probability.order) {
            return Err(MelodyError::out_of_range(
                "probability.order",
                format!("{} is not in 1..=3", self.probability.order),
            ));
        }
        Ok(())
    }
}

fn unit_interval(name: &'static str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(MelodyError::out_of_range(name, format!("{value} is not in 0.0..=1.0")))
    }
}
