// Tonal context: modes, scale degrees, and the degree <-> pitch mapping.
//
// The engine reasons only in scale degrees (1-7 plus an octave). Concrete
// MIDI pitches appear at two edges: when the scorer measures interval sizes
// and range, and when the validator and MIDI writer look at the finished
// melody. Everything that needs those facts goes through the `TonalContext`
// trait, so changing mode or tonic never touches generation logic.
//
// `Tonality` is the built-in provider: a `Mode` (interval pattern) plus a
// tonic pitch class, parsed from names like "D" or "Bb".
//
// Used by scorer.rs (candidate pitches, range window), contour.rs (climax
// pitch), validate.rs (diatonic check, characteristic degree) and midi.rs.

use crate::error::{MelodyError, Result};
use crate::harmony::HarmonicFunction;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scale modes available to the generator, each defined by its semitone
/// pattern above the tonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Ionian: C D E F G A B.
    Major,
    /// Natural minor with raised 6th.
    Dorian,
    /// Natural minor with lowered 2nd.
    Phrygian,
    /// Major with raised 4th.
    Lydian,
    /// Major with lowered 7th.
    Mixolydian,
    /// Aeolian / natural minor.
    Minor,
    /// Diminished 5th above the tonic.
    Locrian,
    /// Natural minor with raised 7th.
    HarmonicMinor,
    /// Ascending melodic minor: raised 6th and 7th.
    MelodicMinor,

    // Rotations of harmonic minor, modes 2-7.
    /// Locrian with a natural 6th.
    LocrianNat6,
    /// Major with a raised 5th.
    IonianAug5,
    /// Dorian with a raised 4th.
    DorianSharp4,
    /// Phrygian with a major 3rd.
    PhrygianDominant,
    /// Lydian with a raised 2nd.
    LydianSharp2,
    /// Locrian with a lowered 4th and doubly lowered 7th.
    SuperlocrianBb7,

    // Rotations of melodic minor, modes 2-7.
    /// Dorian with a lowered 2nd.
    DorianFlat2,
    /// Lydian with a raised 5th.
    LydianAugmented,
    /// Lydian with a lowered 7th.
    LydianDominant,
    /// Mixolydian with a lowered 6th.
    MixolydianFlat6,
    /// Locrian with a natural 2nd.
    LocrianNat2,
    /// Superlocrian: every degree above the tonic lowered.
    Altered,
}

/// Major/minor family, used when comparing against key-finding profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyFamily {
    Major,
    Minor,
}

impl Mode {
    pub const ALL: [Mode; 21] = [
        Mode::Major,
        Mode::Dorian,
        Mode::Phrygian,
        Mode::Lydian,
        Mode::Mixolydian,
        Mode::Minor,
        Mode::Locrian,
        Mode::HarmonicMinor,
        Mode::MelodicMinor,
        Mode::LocrianNat6,
        Mode::IonianAug5,
        Mode::DorianSharp4,
        Mode::PhrygianDominant,
        Mode::LydianSharp2,
        Mode::SuperlocrianBb7,
        Mode::DorianFlat2,
        Mode::LydianAugmented,
        Mode::LydianDominant,
        Mode::MixolydianFlat6,
        Mode::LocrianNat2,
        Mode::Altered,
    ];

    /// Semitone offsets from the tonic for degrees 1-7.
    pub fn intervals(self) -> [u8; 7] {
        match self {
            Mode::Major => [0, 2, 4, 5, 7, 9, 11],
            Mode::Dorian => [0, 2, 3, 5, 7, 9, 10],
            Mode::Phrygian => [0, 1, 3, 5, 7, 8, 10],
            Mode::Lydian => [0, 2, 4, 6, 7, 9, 11],
            Mode::Mixolydian => [0, 2, 4, 5, 7, 9, 10],
            Mode::Minor => [0, 2, 3, 5, 7, 8, 10],
            Mode::Locrian => [0, 1, 3, 5, 6, 8, 10],
            Mode::HarmonicMinor => [0, 2, 3, 5, 7, 8, 11],
            Mode::MelodicMinor => [0, 2, 3, 5, 7, 9, 11],
            Mode::LocrianNat6 => [0, 1, 3, 5, 6, 9, 10],
            Mode::IonianAug5 => [0, 2, 4, 5, 8, 9, 11],
            Mode::DorianSharp4 => [0, 2, 3, 6, 7, 9, 10],
            Mode::PhrygianDominant => [0, 1, 4, 5, 7, 8, 10],
            Mode::LydianSharp2 => [0, 3, 4, 6, 7, 9, 11],
            Mode::SuperlocrianBb7 => [0, 1, 3, 4, 6, 8, 9],
            Mode::DorianFlat2 => [0, 1, 3, 5, 7, 9, 10],
            Mode::LydianAugmented => [0, 2, 4, 6, 8, 9, 11],
            Mode::LydianDominant => [0, 2, 4, 6, 7, 9, 10],
            Mode::MixolydianFlat6 => [0, 2, 4, 5, 7, 8, 10],
            Mode::LocrianNat2 => [0, 2, 3, 5, 6, 8, 10],
            Mode::Altered => [0, 1, 3, 4, 6, 8, 10],
        }
    }

    /// Parent scale and mode number (2-7) for the rotations of harmonic and
    /// melodic minor. `None` for the diatonic modes and the two minor
    /// scales themselves.
    pub fn parent(self) -> Option<(Mode, u8)> {
        let parent = match self {
            Mode::LocrianNat6 => (Mode::HarmonicMinor, 2),
            Mode::IonianAug5 => (Mode::HarmonicMinor, 3),
            Mode::DorianSharp4 => (Mode::HarmonicMinor, 4),
            Mode::PhrygianDominant => (Mode::HarmonicMinor, 5),
            Mode::LydianSharp2 => (Mode::HarmonicMinor, 6),
            Mode::SuperlocrianBb7 => (Mode::HarmonicMinor, 7),
            Mode::DorianFlat2 => (Mode::MelodicMinor, 2),
            Mode::LydianAugmented => (Mode::MelodicMinor, 3),
            Mode::LydianDominant => (Mode::MelodicMinor, 4),
            Mode::MixolydianFlat6 => (Mode::MelodicMinor, 5),
            Mode::LocrianNat2 => (Mode::MelodicMinor, 6),
            Mode::Altered => (Mode::MelodicMinor, 7),
            _ => return None,
        };
        Some(parent)
    }

    /// Major-third modes compare against the major profile, the rest
    /// against the minor one.
    pub fn family(self) -> KeyFamily {
        if self.intervals()[2] == 4 {
            KeyFamily::Major
        } else {
            KeyFamily::Minor
        }
    }

    /// The scale degree that distinguishes this mode from its neighbors.
    pub fn characteristic_degree(self) -> u8 {
        match self {
            Mode::Major => 1,
            Mode::Minor => 3,
            Mode::Dorian => 6,
            Mode::Phrygian => 2,
            Mode::Lydian => 4,
            Mode::Mixolydian => 7,
            Mode::Locrian => 5,
            Mode::HarmonicMinor => 7,
            Mode::MelodicMinor => 6,
            Mode::LocrianNat6 => 6,
            Mode::IonianAug5 => 5,
            Mode::DorianSharp4 => 4,
            Mode::PhrygianDominant => 3,
            Mode::LydianSharp2 => 2,
            Mode::SuperlocrianBb7 => 7,
            Mode::DorianFlat2 => 2,
            Mode::LydianAugmented => 5,
            Mode::LydianDominant => 4,
            Mode::MixolydianFlat6 => 6,
            Mode::LocrianNat2 => 2,
            Mode::Altered => 4,
        }
    }

    /// Parse a mode name. Accepts the church-mode aliases "ionian" and
    /// "aeolian" and a few common names for the minor-scale rotations.
    pub fn from_name(name: &str) -> Option<Mode> {
        let mode = match name.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "major" | "ionian" => Mode::Major,
            "dorian" => Mode::Dorian,
            "phrygian" => Mode::Phrygian,
            "lydian" => Mode::Lydian,
            "mixolydian" => Mode::Mixolydian,
            "minor" | "aeolian" | "natural_minor" => Mode::Minor,
            "locrian" => Mode::Locrian,
            "harmonic_minor" => Mode::HarmonicMinor,
            "melodic_minor" => Mode::MelodicMinor,
            "locrian_nat6" => Mode::LocrianNat6,
            "ionian_aug5" => Mode::IonianAug5,
            "dorian_sharp4" | "ukrainian_dorian" => Mode::DorianSharp4,
            "phrygian_dominant" => Mode::PhrygianDominant,
            "lydian_sharp2" => Mode::LydianSharp2,
            "superlocrian_bb7" | "ultralocrian" => Mode::SuperlocrianBb7,
            "dorian_flat2" => Mode::DorianFlat2,
            "lydian_augmented" => Mode::LydianAugmented,
            "lydian_dominant" | "acoustic" => Mode::LydianDominant,
            "mixolydian_flat6" => Mode::MixolydianFlat6,
            "locrian_nat2" => Mode::LocrianNat2,
            "altered" | "superlocrian" => Mode::Altered,
            _ => return None,
        };
        Some(mode)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Major => "major",
            Mode::Dorian => "dorian",
            Mode::Phrygian => "phrygian",
            Mode::Lydian => "lydian",
            Mode::Mixolydian => "mixolydian",
            Mode::Minor => "minor",
            Mode::Locrian => "locrian",
            Mode::HarmonicMinor => "harmonic minor",
            Mode::MelodicMinor => "melodic minor",
            Mode::LocrianNat6 => "locrian nat6",
            Mode::IonianAug5 => "ionian aug5",
            Mode::DorianSharp4 => "dorian sharp4",
            Mode::PhrygianDominant => "phrygian dominant",
            Mode::LydianSharp2 => "lydian sharp2",
            Mode::SuperlocrianBb7 => "superlocrian bb7",
            Mode::DorianFlat2 => "dorian flat2",
            Mode::LydianAugmented => "lydian augmented",
            Mode::LydianDominant => "lydian dominant",
            Mode::MixolydianFlat6 => "mixolydian flat6",
            Mode::LocrianNat2 => "locrian nat2",
            Mode::Altered => "altered",
        };
        f.write_str(name)
    }
}

/// A scale degree placed in a register.
///
/// `octave` is the register of the tonic the degree is built above, so in
/// any key degree 1 octave 4 is the tonic nearest middle C and degree 7
/// octave 4 is the leading tone just under the next tonic. `alteration` is
/// a chromatic inflection in semitones; the generator only sets it on
/// infraction notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScalePitch {
    pub degree: u8,
    pub octave: i8,
    pub alteration: i8,
}

impl ScalePitch {
    pub fn new(degree: u8, octave: i8) -> Self {
        ScalePitch {
            degree,
            octave,
            alteration: 0,
        }
    }

    /// Diatonic step index: seven steps per octave, degree 1 at a multiple
    /// of seven. Used for contour distances and motif offsets.
    pub fn step(&self) -> i32 {
        self.octave as i32 * 7 + (self.degree as i32 - 1)
    }

    /// Inverse of [`ScalePitch::step`].
    pub fn from_step(step: i32) -> Self {
        ScalePitch::new(
            (step.rem_euclid(7) + 1) as u8,
            step.div_euclid(7) as i8,
        )
    }

    pub fn is_altered(&self) -> bool {
        self.alteration != 0
    }
}

/// The tonal queries the engine needs. The engine never inspects a mode or
/// tonic directly.
pub trait TonalContext {
    /// MIDI pitch of `degree` (1-7) in `octave`.
    fn degree_to_pitch(&self, degree: u8, octave: i8) -> u8;

    /// Degree and octave of a MIDI pitch, or `None` if it is chromatic.
    fn pitch_to_degree(&self, pitch: u8) -> Option<ScalePitch>;

    /// Chord-tone degrees of a harmonic function, root first.
    fn chord_tones(&self, function: HarmonicFunction) -> [u8; 3];

    /// True if the pitch class belongs to the scale.
    fn is_diatonic(&self, pitch: u8) -> bool;

    /// MIDI pitch of a `ScalePitch`, alteration included.
    fn pitch_of(&self, sp: ScalePitch) -> u8 {
        let base = self.degree_to_pitch(sp.degree, sp.octave) as i32;
        (base + sp.alteration as i32).clamp(0, 127) as u8
    }
}

/// Triad quality on a given degree, derived from the mode's intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChordQuality {
    Major,
    Minor,
    Diminished,
    Augmented,
}

/// A mode rooted on a concrete tonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tonality {
    pub mode: Mode,
    /// Pitch class of the tonic (0 = C, 2 = D, ...).
    pub tonic_pc: u8,
}

impl Tonality {
    pub fn new(mode: Mode, tonic_pc: u8) -> Self {
        Tonality {
            mode,
            tonic_pc: tonic_pc % 12,
        }
    }

    /// Build from a tonic name such as "C", "F#" or "Bb".
    pub fn from_names(tonic: &str, mode: Mode) -> Result<Self> {
        Ok(Tonality::new(mode, parse_tonic(tonic)?))
    }

    /// MIDI pitch of the tonic in a scale octave.
    pub fn tonic_pitch(&self, octave: i8) -> u8 {
        self.degree_to_pitch(1, octave)
    }

    /// Default melodic ambitus: a fourth below the tonic in octave 4 up to a
    /// fourth above the tonic in octave 5.
    pub fn ambitus(&self) -> (u8, u8) {
        let low = self.tonic_pitch(4).saturating_sub(5);
        let high = self.tonic_pitch(5).saturating_add(5).min(127);
        (low, high)
    }

    /// Quality of the triad built on `function`'s root in this mode.
    pub fn chord_quality(&self, function: HarmonicFunction) -> ChordQuality {
        let iv = self.mode.intervals();
        let root = function.root() as usize - 1;
        let third = (iv[(root + 2) % 7] + 12 - iv[root]) % 12;
        let fifth = (iv[(root + 4) % 7] + 12 - iv[root]) % 12;
        match (third, fifth) {
            (4, 8) => ChordQuality::Augmented,
            (4, _) => ChordQuality::Major,
            (3, 6) => ChordQuality::Diminished,
            _ => ChordQuality::Minor,
        }
    }

    /// All in-scale MIDI pitches in `[low, high]`.
    pub fn pitches_in_range(&self, low: u8, high: u8) -> Vec<u8> {
        (low..=high).filter(|&p| self.is_diatonic(p)).collect()
    }

    /// Display name of the tonic, e.g. "Eb".
    pub fn tonic_name(&self) -> &'static str {
        pitch_class_name(self.tonic_pc)
    }
}

impl TonalContext for Tonality {
    fn degree_to_pitch(&self, degree: u8, octave: i8) -> u8 {
        let d = (degree.clamp(1, 7) - 1) as usize;
        let pitch = (octave as i32 + 1) * 12 + self.tonic_pc as i32 + self.mode.intervals()[d] as i32;
        pitch.clamp(0, 127) as u8
    }

    fn pitch_to_degree(&self, pitch: u8) -> Option<ScalePitch> {
        let rel = pitch as i32 - (self.tonic_pc as i32 + 12);
        let octave = rel.div_euclid(12);
        let offset = rel.rem_euclid(12) as u8;
        self.mode
            .intervals()
            .iter()
            .position(|&iv| iv == offset)
            .map(|d| ScalePitch::new(d as u8 + 1, octave as i8))
    }

    fn chord_tones(&self, function: HarmonicFunction) -> [u8; 3] {
        function.chord_tones()
    }

    fn is_diatonic(&self, pitch: u8) -> bool {
        let pc = (pitch as i32 - self.tonic_pc as i32).rem_euclid(12) as u8;
        self.mode.intervals().contains(&pc)
    }
}

/// Parse a tonic name ("C", "c#", "Db", "B♭") into a pitch class.
pub fn parse_tonic(name: &str) -> Result<u8> {
    let trimmed = name.trim();
    let mut chars = trimmed.chars();
    let letter = chars
        .next()
        .ok_or_else(|| MelodyError::UnknownTonic(name.to_string()))?;
    let base: i32 = match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return Err(MelodyError::UnknownTonic(name.to_string())),
    };
    let mut shift = 0i32;
    for c in chars {
        match c {
            '#' | '♯' => shift += 1,
            'b' | '♭' => shift -= 1,
            _ => return Err(MelodyError::UnknownTonic(name.to_string())),
        }
    }
    if shift.abs() > 1 {
        return Err(MelodyError::UnknownTonic(name.to_string()));
    }
    Ok((base + shift).rem_euclid(12) as u8)
}

/// Conventional name of a pitch class.
pub fn pitch_class_name(pc: u8) -> &'static str {
    match pc % 12 {
        0 => "C",
        1 => "C#",
        2 => "D",
        3 => "Eb",
        4 => "E",
        5 => "F",
        6 => "F#",
        7 => "G",
        8 => "Ab",
        9 => "A",
        10 => "Bb",
        _ => "B",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c_major() -> Tonality {
        Tonality::new(Mode::Major, 0)
    }

    #[test]
    fn test_degree_to_pitch_c_major() {
        let t = c_major();
        assert_eq!(t.degree_to_pitch(1, 4), 60);
        assert_eq!(t.degree_to_pitch(5, 4), 67);
        assert_eq!(t.degree_to_pitch(7, 3), 59);
        assert_eq!(t.degree_to_pitch(1, 5), 72);
    }

    #[test]
    fn test_pitch_to_degree_roundtrips_diatonic() {
        let t = Tonality::new(Mode::Dorian, 2);
        for pitch in t.pitches_in_range(50, 80) {
            let sp = t.pitch_to_degree(pitch).unwrap();
            assert_eq!(t.pitch_of(sp), pitch, "degree {sp:?} should map back to {pitch}");
        }
        // Eb is not in D dorian.
        assert_eq!(t.pitch_to_degree(63), None);
    }

    #[test]
    fn test_octave_follows_tonic_register() {
        // In B major, the leading tone A#5 still belongs to scale octave 4.
        let t = Tonality::new(Mode::Major, 11);
        let sp = t.pitch_to_degree(82).unwrap();
        assert_eq!(sp, ScalePitch::new(7, 4));
    }

    #[test]
    fn test_step_roundtrip() {
        for step in -10..40 {
            assert_eq!(ScalePitch::from_step(step).step(), step);
        }
        assert_eq!(ScalePitch::new(1, 4).step(), 28);
        assert_eq!(ScalePitch::from_step(27), ScalePitch::new(7, 3));
    }

    #[test]
    fn test_is_diatonic() {
        let t = c_major();
        assert!(t.is_diatonic(60));
        assert!(t.is_diatonic(71));
        assert!(!t.is_diatonic(61));
        assert!(!t.is_diatonic(70));
    }

    #[test]
    fn test_ambitus_is_tonic_octave_plus_minus_fourth() {
        assert_eq!(c_major().ambitus(), (55, 77));
    }

    #[test]
    fn test_chord_quality_by_mode() {
        let major = c_major();
        assert_eq!(major.chord_quality(HarmonicFunction::I), ChordQuality::Major);
        assert_eq!(major.chord_quality(HarmonicFunction::II), ChordQuality::Minor);
        assert_eq!(major.chord_quality(HarmonicFunction::VII), ChordQuality::Diminished);

        let harmonic = Tonality::new(Mode::HarmonicMinor, 9);
        assert_eq!(harmonic.chord_quality(HarmonicFunction::V), ChordQuality::Major);
        assert_eq!(harmonic.chord_quality(HarmonicFunction::III), ChordQuality::Augmented);

        let spanish = Tonality::new(Mode::PhrygianDominant, 4);
        assert_eq!(spanish.chord_quality(HarmonicFunction::I), ChordQuality::Major);
        assert_eq!(spanish.chord_quality(HarmonicFunction::II), ChordQuality::Major);
        assert_eq!(spanish.chord_quality(HarmonicFunction::V), ChordQuality::Diminished);

        let augmented = Tonality::new(Mode::LydianAugmented, 0);
        assert_eq!(augmented.chord_quality(HarmonicFunction::I), ChordQuality::Augmented);
        assert_eq!(augmented.chord_quality(HarmonicFunction::II), ChordQuality::Major);

        let altered = Tonality::new(Mode::Altered, 11);
        assert_eq!(altered.chord_quality(HarmonicFunction::I), ChordQuality::Diminished);
        assert_eq!(altered.chord_quality(HarmonicFunction::II), ChordQuality::Minor);

        let ultralocrian = Tonality::new(Mode::SuperlocrianBb7, 0);
        assert_eq!(ultralocrian.chord_quality(HarmonicFunction::I), ChordQuality::Diminished);
        assert_eq!(ultralocrian.chord_quality(HarmonicFunction::II), ChordQuality::Minor);
        assert_eq!(ultralocrian.chord_quality(HarmonicFunction::III), ChordQuality::Diminished);
    }

    #[test]
    fn test_parse_tonic() {
        assert_eq!(parse_tonic("C").unwrap(), 0);
        assert_eq!(parse_tonic("f#").unwrap(), 6);
        assert_eq!(parse_tonic("Bb").unwrap(), 10);
        assert_eq!(parse_tonic("Cb").unwrap(), 11);
        assert!(parse_tonic("H").is_err());
        assert!(parse_tonic("C##").is_err());
        assert!(parse_tonic("").is_err());
    }

    #[test]
    fn test_mode_names_and_families() {
        assert_eq!(Mode::from_name("Aeolian"), Some(Mode::Minor));
        assert_eq!(Mode::from_name("harmonic-minor"), Some(Mode::HarmonicMinor));
        assert_eq!(Mode::from_name("bebop"), None);
        assert_eq!(Mode::Mixolydian.family(), KeyFamily::Major);
        assert_eq!(Mode::Dorian.family(), KeyFamily::Minor);

        assert_eq!(Mode::ALL.len(), 21);
        for mode in Mode::ALL {
            assert_eq!(Mode::from_name(&mode.to_string()), Some(mode), "{mode}");
        }
        assert_eq!(Mode::from_name("phrygian-dominant"), Some(Mode::PhrygianDominant));
        assert_eq!(Mode::from_name("superlocrian"), Some(Mode::Altered));

        let major: Vec<Mode> = Mode::ALL
            .into_iter()
            .skip(9)
            .filter(|m| m.family() == KeyFamily::Major)
            .collect();
        assert_eq!(
            major,
            vec![
                Mode::IonianAug5,
                Mode::PhrygianDominant,
                Mode::LydianSharp2,
                Mode::LydianAugmented,
                Mode::LydianDominant,
                Mode::MixolydianFlat6,
            ]
        );
        assert_eq!(Mode::PhrygianDominant.characteristic_degree(), 3);
        assert_eq!(Mode::LydianDominant.characteristic_degree(), 4);
        assert_eq!(Mode::Altered.characteristic_degree(), 4);
    }

    #[test]
    fn test_rotations_match_their_parent_scale() {
        for mode in Mode::ALL {
            let Some((parent, number)) = mode.parent() else {
                continue;
            };
            let base = parent.intervals();
            let r = number as usize - 1;
            let rotated: Vec<u8> = (0..7)
                .map(|i| (base[(r + i) % 7] + 12 - base[r]) % 12)
                .collect();
            assert_eq!(rotated, mode.intervals().to_vec(), "{mode}");
        }
        assert_eq!(Mode::Dorian.parent(), None);
        assert_eq!(Mode::ALL.iter().filter(|m| m.parent().is_some()).count(), 12);
    }
}
