// Cantabile Melody Generator
//
// Generates single-line melodies in the classical period form: antecedent
// and consequent phrases closing on half and authentic cadences, grouped
// fractally for long periods. Rhythm, harmony and register are planned
// first; pitches are then chosen note by note by a weighted scorer under
// hard voice-leading constraints, optionally steered by composer transition
// models. Every result is validated (key, meter, range, mode) and the
// validator proposes parameter corrections for a retry.
//
// Architecture:
// - error.rs: MelodyError taxonomy (configuration vs. I/O-side failures)
// - config.rs: GenerationParams and friends, JSON loading, validation
// - tonal.rs: Modes, scale pitches, the TonalContext trait and Tonality
// - meter.rs: Meters, beat groups and metric weights on a 32nd-note tick grid
// - period.rs: Output model (Period/Phrase/Measure/NoteEvent) and layout
// - harmony.rs: Harmonic functions and the per-measure progression
// - rhythm.rs: Beat-group rhythm builder, retrograde and cadential patterns
// - motif.rs: Seed motifs and the closed set of variations
// - contour.rs: Phrase contour targets and climax planning/state
// - scoring.rs: The individual melodic scoring criteria
// - scorer.rs: Candidate generation, hard constraints and selection
// - corpus.rs: Built-in themes for the probability models
// - probability.rs: Katz-backoff degree/duration transition models
// - assembler.rs: Period assembly (traditional and hierarchical strategies)
// - validate.rs: Validation report and the Generated/Validated typestate
// - correct.rs: Parameter deltas proposed from a report
// - engine.rs: generate/attempt entry points
// - midi.rs: MIDI file output from completed periods
//
// The generator is deterministic given a seed, supporting reproducible output.

pub mod assembler;
pub mod config;
pub mod contour;
pub mod corpus;
pub mod correct;
pub mod engine;
pub mod error;
pub mod harmony;
pub mod meter;
pub mod midi;
pub mod motif;
pub mod period;
pub mod probability;
pub mod rhythm;
pub mod scorer;
pub mod scoring;
pub mod tonal;
pub mod validate;
