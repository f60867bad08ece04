// Cantabile melody generator: CLI entry point.
//
// Generates a classical-style period (antecedent + consequent phrases),
// validates it, retries with corrected parameters if asked, and writes MIDI
// plus an optional JSON dump.
// The pipeline: parameters → model → generation/validation loop → output.
//
// Usage:
//   cargo run -p cantabile_music --bin generate -- [output.mid] [--config FILE]
//     [--seed N] [--measures N] [--tonic NAME] [--mode MODE]
//     [--meter N/D] [--subdivisions A,B,C] [--strategy traditional|hierarchical]
//     [--impulse tetic|anacrustic|acephalous] [--complexity 1-5]
//     [--infraction-rate P] [--probability] [--composer NAME] [--model FILE]
//     [--retries N] [--tempo BPM] [--json FILE]
//
// Modes: major, minor, dorian, phrygian, lydian, mixolydian, locrian,
//        harmonic_minor, melodic_minor, the harmonic-minor rotations
//        (locrian_nat6, ionian_aug5, dorian_sharp4, phrygian_dominant,
//        lydian_sharp2, superlocrian_bb7) and the melodic-minor rotations
//        (dorian_flat2, lydian_augmented, lydian_dominant, mixolydian_flat6,
//        locrian_nat2, altered)
//
// Logging goes through `tracing`; set RUST_LOG=debug for per-phrase detail.

use cantabile_music::config::{Composer, GenerationParams, GenerationStrategy, ImpulseType};
use cantabile_music::correct::propose_correction;
use cantabile_music::engine::attempt;
use cantabile_music::meter::MeterSpec;
use cantabile_music::midi::{DEFAULT_TEMPO_BPM, write_midi};
use cantabile_music::probability::ModelLibrary;
use cantabile_music::tonal::Mode;
use cantabile_music::validate::ValidatedPeriod;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    // Parse arguments
    let output_path = args
        .get(1)
        .filter(|s| !s.starts_with("--"))
        .map(|s| s.as_str())
        .unwrap_or("melody.mid");
    let seed: u64 = parse_flag(&args, "--seed").unwrap_or_else(clock_seed);
    let retries: usize = parse_flag(&args, "--retries").unwrap_or(0);
    let tempo: u16 = parse_flag(&args, "--tempo").unwrap_or(DEFAULT_TEMPO_BPM);
    let json_path: Option<String> = parse_flag(&args, "--json");
    let model_path: Option<String> = parse_flag(&args, "--model");

    let params = match build_params(&args) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    println!("=== Cantabile Melody Generator ===");
    println!("Output: {}", output_path);
    println!("Key: {} {}", params.tonic, params.mode);
    println!(
        "Meter: {}/{} ({} measures, {:?}, {:?})",
        params.meter.numerator,
        params.meter.denominator,
        params.measures,
        params.strategy,
        params.impulse
    );
    println!("Seed: {}", seed);
    println!();

    // Load models
    println!("[1/4] Loading probability model...");
    let library = if !params.probability.enabled {
        println!("  Disabled.");
        None
    } else if let Some(path) = &model_path {
        println!("  Loading {}...", path);
        match ModelLibrary::load(Path::new(path)) {
            Ok(l) => {
                println!("  Loaded {} models.", l.models.len());
                Some(l)
            }
            Err(e) => {
                eprintln!("  Failed to load: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        println!(
            "  Training built-in models (order {})...",
            params.probability.order
        );
        Some(ModelLibrary::builtin(params.probability.order))
    };
    let model = match &library {
        Some(l) => match l.get(params.probability.composer) {
            Ok(m) => {
                println!("  Using {} model.", params.probability.composer);
                Some(m)
            }
            Err(e) => {
                eprintln!("  {}", e);
                std::process::exit(1);
            }
        },
        None => None,
    };

    // Generate and validate, correcting parameters between attempts
    println!("[2/4] Generating (up to {} attempts)...", retries + 1);
    let mut current = params.clone();
    let mut result: Option<ValidatedPeriod> = None;
    for n in 0..=retries {
        let attempt_seed = seed.wrapping_add(n as u64);
        let validated = match attempt(&current, attempt_seed, model) {
            Ok(v) => v,
            Err(e) => {
                eprintln!("  Error: {}", e);
                std::process::exit(1);
            }
        };
        let report = validated.report();
        println!(
            "  Attempt {} (seed {}): overall {:.2}, {}",
            n + 1,
            attempt_seed,
            report.overall,
            if report.valid { "valid" } else { "invalid" }
        );
        let done = report.valid || n == retries;
        if !done {
            for delta in &report.deltas {
                println!("    correction: {}", delta);
            }
            current = propose_correction(report, &current);
        }
        result = Some(validated);
        if done {
            break;
        }
    }
    let Some(validated) = result else {
        eprintln!("  No attempt was made.");
        std::process::exit(1);
    };

    // Report
    println!("[3/4] Validation report:");
    for line in validated.report().summary().lines() {
        println!("  {}", line);
    }
    for issue in &validated.report().issues {
        println!("    {}", issue);
    }
    let period = validated.period();
    for (i, phrase) in period.phrases().enumerate() {
        let notes = phrase
            .measures
            .iter()
            .flat_map(|m| m.events.iter())
            .filter(|e| !e.is_rest())
            .count();
        println!(
            "  Phrase {}: {:?}, {} measures, {} notes, {:?} cadence",
            i + 1,
            phrase.role,
            phrase.measures.len(),
            notes,
            phrase.cadence
        );
    }
    if let Some(climax) = &period.climax {
        println!(
            "  Climax: measure {}, pitch {} ({})",
            climax.measure + 1,
            climax.pitch,
            if climax.reached { "reached" } else { "missed" }
        );
    }

    // Write output
    println!("[4/4] Writing MIDI to {}...", output_path);
    let tonality = match validated.params().tonality() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("  Error: {}", e);
            std::process::exit(1);
        }
    };
    match write_midi(period, &tonality, tempo, Path::new(output_path)) {
        Ok(()) => {
            let quarters = period.total_ticks() as f64 / 8.0;
            println!(
                "  Done! Duration: {:.0}s ({} measures)",
                quarters * 60.0 / tempo.max(1) as f64,
                period.measures().count()
            );
        }
        Err(e) => {
            eprintln!("  Error writing MIDI: {}", e);
            std::process::exit(1);
        }
    }
    if let Some(path) = &json_path {
        let written = serde_json::to_string_pretty(period)
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(path, json).map_err(|e| e.to_string()));
        match written {
            Ok(()) => println!("  Wrote JSON to {}.", path),
            Err(e) => {
                eprintln!("  Error writing JSON: {}", e);
                std::process::exit(1);
            }
        }
    }

    if !validated.is_valid() {
        println!();
        println!("Warning: the period did not pass validation.");
    }
    println!();
    println!("Play with: timidity {} (or any MIDI player)", output_path);
}

/// Start from `--config` (or defaults) and apply flag overrides.
fn build_params(args: &[String]) -> Result<GenerationParams, String> {
    let mut params = match parse_flag::<String>(args, "--config") {
        Some(path) => GenerationParams::load(Path::new(&path)).map_err(|e| e.to_string())?,
        None => GenerationParams::default(),
    };

    if let Some(n) = parse_flag(args, "--measures") {
        params.measures = n;
    }
    if let Some(tonic) = parse_flag(args, "--tonic") {
        params.tonic = tonic;
    }
    if let Some(name) = parse_flag::<String>(args, "--mode") {
        params.mode = Mode::from_name(&name).ok_or_else(|| format!("unknown mode '{}'", name))?;
    }
    if let Some(meter) = parse_flag::<String>(args, "--meter") {
        params.meter = parse_meter(&meter)?;
    }
    if let Some(groups) = parse_flag::<String>(args, "--subdivisions") {
        let groups = groups
            .split(',')
            .map(|g| g.trim().parse::<u8>())
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|_| format!("bad subdivision list '{}'", groups))?;
        params.meter = params.meter.with_subdivisions(groups);
    }
    if let Some(name) = parse_flag::<String>(args, "--strategy") {
        params.strategy = parse_strategy(&name)?;
    }
    if let Some(name) = parse_flag::<String>(args, "--impulse") {
        params.impulse = parse_impulse(&name)?;
    }
    if let Some(c) = parse_flag(args, "--complexity") {
        params.rhythmic_complexity = c;
    }
    if let Some(rate) = parse_flag(args, "--infraction-rate") {
        params.infraction_rate = rate;
    }
    if args.iter().any(|a| a == "--probability") {
        params.probability.enabled = true;
    }
    if let Some(name) = parse_flag::<String>(args, "--composer") {
        params.probability.composer = Composer::from_name(&name).map_err(|e| e.to_string())?;
        params.probability.enabled = true;
    }

    params.validate().map_err(|e| e.to_string())?;
    Ok(params)
}

fn parse_meter(text: &str) -> Result<MeterSpec, String> {
    let (n, d) = text
        .split_once('/')
        .ok_or_else(|| format!("meter '{}' is not N/D", text))?;
    let n = n.trim().parse().map_err(|_| format!("bad numerator in '{}'", text))?;
    let d = d.trim().parse().map_err(|_| format!("bad denominator in '{}'", text))?;
    Ok(MeterSpec::new(n, d))
}

fn parse_strategy(name: &str) -> Result<GenerationStrategy, String> {
    match name.to_lowercase().as_str() {
        "traditional" => Ok(GenerationStrategy::Traditional),
        "hierarchical" => Ok(GenerationStrategy::Hierarchical),
        _ => Err(format!("unknown strategy '{}'", name)),
    }
}

fn parse_impulse(name: &str) -> Result<ImpulseType, String> {
    match name.to_lowercase().as_str() {
        "tetic" => Ok(ImpulseType::Tetic),
        "anacrustic" => Ok(ImpulseType::Anacrustic),
        "acephalous" => Ok(ImpulseType::Acephalous),
        _ => Err(format!("unknown impulse '{}'", name)),
    }
}

/// Seed from the wall clock when none is given.
fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}
