// Property tests for generated periods.
//
// Each test drives the public pipeline (`engine::generate` / `attempt`) over
// a handful of seeds and checks a structural property of the result:
// measure totals, harmonic fit on strong beats, leap recovery, cadence
// degrees, climax placement, determinism, and the validator's reaction to a
// deliberately chromatic configuration. The rhythm and motif transforms are
// checked directly.
//
// The last tests cover the validate/correct loop: every mode generates, and
// an invalid report always yields parameters that differ from the input.

use cantabile_music::config::{GenerationParams, GenerationStrategy};
use cantabile_music::correct::{ParameterDelta, propose_correction};
use cantabile_music::engine::{attempt, generate};
use cantabile_music::meter::{Meter, MeterSpec, MetricWeight};
use cantabile_music::motif::{Variation, apply_variation, create_base_motif};
use cantabile_music::period::{CadenceType, NoteEvent, Period, PhraseRole};
use cantabile_music::rhythm::{RhythmBuilder, strong_positions};
use cantabile_music::tonal::{Mode, TonalContext};
use cantabile_prng::SeededRng;

const SEEDS: std::ops::Range<u64> = 0..8;

fn period(params: &GenerationParams, seed: u64) -> Period {
    generate(params, seed, None).unwrap().period().clone()
}

fn both_strategies() -> [GenerationStrategy; 2] {
    [GenerationStrategy::Traditional, GenerationStrategy::Hierarchical]
}

fn sounding(period: &Period) -> Vec<&NoteEvent> {
    period.events().filter(|e| !e.is_rest()).collect()
}

#[test]
fn total_duration_is_measures_times_measure_length() {
    for strategy in both_strategies() {
        for measures in [2, 4, 8, 16, 24] {
            let params = GenerationParams {
                strategy,
                measures,
                ..Default::default()
            };
            let p = period(&params, 7);
            let per_measure = p.meta.meter.measure_ticks();
            assert_eq!(p.total_ticks(), measures as u32 * per_measure, "{strategy:?}, {measures}");
            assert_eq!(p.measures().count(), measures);
        }
    }
}

#[test]
fn strong_non_infraction_events_are_chord_tones() {
    for strategy in both_strategies() {
        for seed in SEEDS {
            let params = GenerationParams {
                strategy,
                use_tenoris: true,
                ..Default::default()
            };
            let p = period(&params, seed);
            for m in p.measures() {
                for e in &m.events {
                    let Some(pitch) = e.pitch else { continue };
                    if e.weight != MetricWeight::Strong || e.infraction {
                        continue;
                    }
                    assert!(
                        !pitch.is_altered() && m.harmony.contains(pitch.degree),
                        "measure {} ({}): degree {} at {} is not a chord tone ({:?})",
                        m.index,
                        m.harmony.numeral(),
                        pitch.degree,
                        e.onset,
                        e.decision
                    );
                }
            }
        }
    }
}

#[test]
fn leaps_recover_by_step() {
    for strategy in both_strategies() {
        for seed in SEEDS {
            let params = GenerationParams {
                strategy,
                ..Default::default()
            };
            let generated = generate(&params, seed, None).unwrap();
            let tonality = params.tonality().unwrap();
            let notes = sounding(generated.period());
            let midi: Vec<i32> = notes
                .iter()
                .map(|e| tonality.pitch_of(e.pitch.unwrap()) as i32)
                .collect();

            for i in 0..midi.len().saturating_sub(3) {
                let leap = midi[i + 1] - midi[i];
                if leap.abs() <= 4 {
                    continue;
                }
                let (n1, n2) = (notes[i + 2], notes[i + 3]);
                if n1.decision.is_override() || n2.decision.is_override() {
                    continue;
                }
                let against = |d: i32| (1..=2).contains(&d.abs()) && d.signum() == -leap.signum();
                let first = midi[i + 2] - midi[i + 1];
                let second = midi[i + 3] - midi[i + 2];
                assert!(
                    against(first) || (first.abs() <= 4 && first.signum() != leap.signum() && against(second)),
                    "seed {seed}: leap {leap} at note {} followed by {first}, {second}",
                    i + 1
                );
            }
        }
    }
}

#[test]
fn retrograde_is_an_involution() {
    let specs = [
        MeterSpec::new(4, 4),
        MeterSpec::new(3, 4),
        MeterSpec::new(6, 8),
        MeterSpec::new(7, 8).with_subdivisions(vec![2, 2, 3]),
    ];
    for spec in specs {
        let meter = Meter::from_spec(&spec).unwrap();
        for complexity in 1..=5 {
            let builder = RhythmBuilder::new(&meter, complexity);
            let mut rng = SeededRng::new(complexity as u64);
            let pattern = builder.build_base_pattern(&mut rng);
            assert_eq!(pattern.retrograde(&meter).retrograde(&meter), pattern);
        }
    }
}

#[test]
fn diminution_undoes_augmentation() {
    let meter = Meter::from_spec(&MeterSpec::default()).unwrap();
    let mut rng = SeededRng::new(5);
    for _ in 0..20 {
        let motif = create_base_motif(
            2..=5,
            cantabile_music::harmony::HarmonicFunction::I,
            cantabile_music::config::ImpulseType::Tetic,
            3,
            &meter,
            &mut rng,
        );
        let back = apply_variation(&apply_variation(&motif, Variation::Augmentation), Variation::Diminution);
        assert_eq!(back.durations(), motif.durations());
        assert_eq!(back.offsets(), motif.offsets());
        assert_eq!(back.provenance, vec![Variation::Augmentation, Variation::Diminution]);
    }
}

#[test]
fn same_seed_same_period() {
    for strategy in both_strategies() {
        let params = GenerationParams {
            strategy,
            measures: 16,
            ..Default::default()
        };
        let a = serde_json::to_string(&period(&params, 1234)).unwrap();
        let b = serde_json::to_string(&period(&params, 1234)).unwrap();
        assert_eq!(a, b);
        let c = serde_json::to_string(&period(&params, 1235)).unwrap();
        assert_ne!(a, c, "different seeds should differ");
    }
}

#[test]
fn c_major_cadences() {
    let params = GenerationParams {
        infraction_rate: 0.0,
        ..Default::default()
    };
    let final_strong = *strong_positions(&params.resolved_meter().unwrap())
        .last()
        .unwrap();
    for seed in SEEDS {
        let p = period(&params, seed);
        let phrases: Vec<_> = p.phrases().collect();
        assert_eq!(phrases.len(), 2);

        let antecedent = phrases[0];
        assert_eq!(antecedent.role, PhraseRole::Antecedent);
        assert_eq!(antecedent.cadence, CadenceType::Half);
        let last = antecedent.measures.last().unwrap().events.last().unwrap();
        assert_eq!(last.pitch.unwrap().degree, 5, "seed {seed}");
        assert_eq!(last.onset, final_strong);
        assert_eq!(last.weight, MetricWeight::Strong);

        let consequent = phrases[1];
        assert_eq!(consequent.cadence, CadenceType::Authentic);
        assert_eq!(consequent.last_sounding().unwrap().pitch.unwrap().degree, 1, "seed {seed}");
    }
}

#[test]
fn seven_eight_strong_positions() {
    let spec = MeterSpec::new(7, 8).with_subdivisions(vec![2, 2, 3]);
    let meter = Meter::from_spec(&spec).unwrap();
    let eighth = meter.unit_ticks();
    assert_eq!(strong_positions(&meter), vec![0, 2 * eighth, 4 * eighth]);

    let params = GenerationParams {
        meter: spec,
        ..Default::default()
    };
    for seed in SEEDS {
        let p = period(&params, seed);
        for m in p.measures() {
            let strong: Vec<u32> = m
                .events
                .iter()
                .filter(|e| e.weight == MetricWeight::Strong)
                .map(|e| e.onset)
                .collect();
            assert_eq!(strong, vec![0, 8, 16], "measure {}", m.index);
        }
    }
}

#[test]
fn climax_lands_near_three_quarters() {
    let params = GenerationParams {
        climax_position: 0.75,
        climax_intensity: 1.5,
        measures: 8,
        ..Default::default()
    };
    for seed in SEEDS {
        let p = period(&params, seed);
        let tonality = params.tonality().unwrap();
        let notes: Vec<(usize, &NoteEvent)> = p
            .measures()
            .flat_map(|m| m.events.iter().filter(|e| !e.is_rest()).map(move |e| (m.index, e)))
            .collect();
        let (peak_idx, &(peak_measure, peak)) = notes
            .iter()
            .enumerate()
            .max_by_key(|(_, (_, e))| tonality.pitch_of(e.pitch.unwrap()))
            .unwrap();
        assert!(peak_measure.abs_diff(6) <= 1, "seed {seed}: peak in measure {peak_measure}");

        let others: Vec<f64> = notes
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != peak_idx)
            .map(|(_, (_, e))| e.pitch.unwrap().octave as f64)
            .collect();
        let average = others.iter().sum::<f64>() / others.len() as f64;
        assert!(
            peak.pitch.unwrap().octave as f64 > average,
            "seed {seed}: peak octave {} vs average {average:.2}",
            peak.pitch.unwrap().octave
        );
    }
}

#[test]
fn heavy_infractions_fail_validation_and_get_corrected() {
    let params = GenerationParams {
        infraction_rate: 0.9,
        rhythmic_complexity: 1,
        ..Default::default()
    };
    for seed in 0..3 {
        let validated = attempt(&params, seed, None).unwrap();
        let report = validated.report();
        assert!(!validated.is_valid(), "seed {seed}: {}", report.summary());
        assert!(
            report
                .deltas
                .iter()
                .any(|d| matches!(d, ParameterDelta::ScaleInfractionRate { .. })),
            "seed {seed}: deltas {:?}",
            report.deltas
        );
        let next = propose_correction(report, &params);
        assert!(next.infraction_rate < params.infraction_rate);
        assert_eq!(next.rhythmic_complexity, 1);
    }
}

#[test]
fn every_mode_generates_in_scale() {
    for mode in Mode::ALL {
        let params = GenerationParams {
            tonic: "D".into(),
            mode,
            infraction_rate: 0.0,
            ..Default::default()
        };
        let tonality = params.tonality().unwrap();
        let p = period(&params, 3);
        assert_eq!(p.measures().count(), 8, "{mode}");
        for e in sounding(&p) {
            let midi = tonality.pitch_of(e.pitch.unwrap());
            assert!(tonality.is_diatonic(midi), "{mode}: {midi} at {}", e.onset);
        }
    }
}

#[test]
fn invalid_reports_always_change_the_parameters() {
    let params = GenerationParams {
        tonic: "D".into(),
        mode: Mode::Locrian,
        infraction_rate: 0.0,
        ..Default::default()
    };
    let mut invalid = 0;
    for seed in 0..20 {
        let validated = attempt(&params, seed, None).unwrap();
        let report = validated.report();
        if report.valid {
            continue;
        }
        invalid += 1;
        assert!(!report.deltas.is_empty(), "seed {seed}: {}", report.summary());
        let next = propose_correction(report, &params);
        assert_ne!(next, params, "seed {seed}: {:?}", report.deltas);
        next.validate().unwrap();
        if !report.key.valid && report.key.matches {
            assert!(next.tonic_emphasis > params.tonic_emphasis, "seed {seed}");
        }
    }
    assert!(invalid > 0, "locrian should trip the key check on some seed");
}
