// Pipeline entry points.
//
// `generate` checks the parameters, resolves tonality and meter, seeds the
// RNG and runs the assembler. `attempt` adds validation. Neither loops:
// retrying with corrected parameters is the caller's business (the CLI's
// `--retries`, or a test).
//
// The probability model is passed in rather than loaded here so the engine
// does no I/O. It is ignored unless `params.probability.enabled` is set.

use crate::assembler::assemble_period;
use crate::config::GenerationParams;
use crate::error::Result;
use crate::probability::TransitionModel;
use crate::validate::{GeneratedPeriod, ValidatedPeriod};
use cantabile_prng::SeededRng;
use tracing::{debug, info};

/// Generate one period without validating it.
pub fn generate(
    params: &GenerationParams,
    seed: u64,
    model: Option<&TransitionModel>,
) -> Result<GeneratedPeriod> {
    params.validate()?;
    let tonality = params.tonality()?;
    let meter = params.resolved_meter()?;
    let model = model.filter(|_| params.probability.enabled);
    debug!(
        seed,
        tonic = tonality.tonic_name(),
        mode = %tonality.mode,
        measures = params.measures,
        model = model.is_some(),
        "generating period"
    );

    let mut rng = SeededRng::new(seed);
    let period = assemble_period(params, &tonality, &meter, model, seed, &mut rng)?;
    Ok(GeneratedPeriod::new(period, params.clone(), tonality))
}

/// Generate and validate one period.
pub fn attempt(
    params: &GenerationParams,
    seed: u64,
    model: Option<&TransitionModel>,
) -> Result<ValidatedPeriod> {
    let validated = generate(params, seed, model)?.validate();
    let report = validated.report();
    info!(
        seed,
        overall = report.overall,
        valid = report.valid,
        issues = report.issues.len(),
        deltas = report.deltas.len(),
        "attempt finished"
    );
    Ok(validated)
}
