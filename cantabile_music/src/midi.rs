// MIDI output from a generated period.
//
// Converts a Period into a Standard MIDI File (SMF) for audition. Track 0
// carries tempo and time signature; track 1 carries the melody. Engine
// ticks (8 per quarter) scale to MIDI ticks at 480 per quarter. Rests only
// advance time.
//
// Uses the `midly` crate for MIDI writing. Output is SMF Format 1 (multi-track).

use crate::error::{MelodyError, Result};
use crate::meter::{TICKS_PER_WHOLE, Ticks};
use crate::period::Period;
use crate::tonal::TonalContext;
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::path::Path;

/// Ticks per quarter note in MIDI output.
const TICKS_PER_QUARTER: u16 = 480;

/// MIDI ticks per engine tick.
const MIDI_PER_TICK: u32 = TICKS_PER_QUARTER as u32 * 4 / TICKS_PER_WHOLE;

/// Flute.
const MELODY_PROGRAM: u8 = 73;

const VELOCITY: u8 = 80;

pub const DEFAULT_TEMPO_BPM: u16 = 96;

/// Convert a Period to MIDI and write it to a file.
pub fn write_midi(
    period: &Period,
    tonal: &dyn TonalContext,
    tempo_bpm: u16,
    path: &Path,
) -> Result<()> {
    let smf = period_to_smf(period, tonal, tempo_bpm);
    let mut buf = Vec::new();
    smf.write(&mut buf)
        .map_err(|e| MelodyError::Midi(e.to_string()))?;
    std::fs::write(path, &buf)?;
    Ok(())
}

/// Convert a Period to an in-memory SMF.
fn period_to_smf(period: &Period, tonal: &dyn TonalContext, tempo_bpm: u16) -> Smf<'static> {
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));

    // Track 0: tempo and meter
    let mut tempo_track: Track<'static> = Vec::new();
    let tempo_microseconds = 60_000_000 / tempo_bpm.max(1) as u32;
    tempo_track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(tempo_microseconds))),
    });
    let meter = &period.meta.meter;
    tempo_track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::TimeSignature(
            meter.numerator,
            meter.denominator.trailing_zeros() as u8,
            24,
            8,
        )),
    });
    tempo_track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    smf.tracks.push(tempo_track);

    // Track 1: melody
    let channel = u4::new(0);
    let mut track: Track<'static> = Vec::new();
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(b"Melody")),
    });
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Midi {
            channel,
            message: MidiMessage::ProgramChange {
                program: u7::new(MELODY_PROGRAM),
            },
        },
    });

    // Ticks since the last emitted event; rests accumulate here.
    let mut pending: u32 = 0;
    for event in period.events() {
        let length = midi_ticks(event.duration);
        let Some(pitch) = event.pitch else {
            pending += length;
            continue;
        };
        let key = u7::new(tonal.pitch_of(pitch).min(127));
        track.push(TrackEvent {
            delta: u28::new(pending),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn {
                    key,
                    vel: u7::new(VELOCITY),
                },
            },
        });
        track.push(TrackEvent {
            delta: u28::new(length),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOff {
                    key,
                    vel: u7::new(0),
                },
            },
        });
        pending = 0;
    }

    track.push(TrackEvent {
        delta: u28::new(pending),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    smf.tracks.push(track);

    smf
}

fn midi_ticks(duration: Ticks) -> u32 {
    duration * MIDI_PER_TICK
}
