// Pitch arithmetic and note naming.
//
// Pitches are MIDI-style integers: `(octave + 1) * 12 + pitch_class`, so C4
// ("middle C") is 60. The engine only ever produces pitches on an 88-key
// keyboard (A0..=C8); `sanitize_octave` is the one place that clamps octaves
// into that range.
//
// Note naming lives here too. A `NoteLabel` is a letter plus an accidental
// (single sharps/flats only). Each pitch class has one or two legal labels,
// listed in `labels_for_pitch_class` in a fixed preference order whose first
// entry is the spelling of last resort (see spelling.rs).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// MIDI-style pitch number. C4 = 60.
pub type Pitch = u8;

/// Chroma within an octave, 0 = C through 11 = B.
pub type PitchClass = u8;

/// Keyboard octave, 0..=8. Octave 0 holds only A/A♯/B, octave 8 only C.
pub type Octave = u8;

/// Lowest key on an 88-key keyboard (A0).
pub const LOWEST_PITCH: Pitch = 21;

/// Highest key on an 88-key keyboard (C8).
pub const HIGHEST_PITCH: Pitch = 108;

/// Build a pitch from an octave and pitch class.
pub const fn to_pitch(octave: Octave, pitch_class: PitchClass) -> Pitch {
    (octave + 1) * 12 + pitch_class
}

pub const fn pitch_class_of(pitch: Pitch) -> PitchClass {
    pitch % 12
}

pub const fn octave_of(pitch: Pitch) -> Octave {
    (pitch / 12).saturating_sub(1)
}

/// Clamp an octave into 0..=8, respecting the 88-key edges: octave 0 exists
/// only for A, A♯ and B, octave 8 only for C.
pub fn sanitize_octave(pitch_class: PitchClass, octave: i32) -> Octave {
    let mut octave = octave.clamp(0, 8) as Octave;
    if octave == 0 && pitch_class < 9 {
        octave = 1;
    } else if octave == 8 && pitch_class != 0 {
        octave = 7;
    }
    octave
}

/// Move a pitch by a signed number of half steps, clamping the resulting
/// octave into the keyboard range.
pub fn step_pitch(pitch: Pitch, half_steps: i32) -> Pitch {
    let raw = pitch as i32 + half_steps;
    let pitch_class = raw.rem_euclid(12) as PitchClass;
    let octave = sanitize_octave(pitch_class, raw.div_euclid(12) - 1);
    to_pitch(octave, pitch_class)
}

/// Compact name for debugging output, using the fallback spelling.
pub fn pitch_name(pitch: Pitch) -> String {
    let label = labels_for_pitch_class(pitch_class_of(pitch))[0];
    format!("{}{}", label, octave_of(pitch))
}

// ---------------------------------------------------------------------------
// Letters and accidentals
// ---------------------------------------------------------------------------

/// The seven base letters, in alphabetical order (A first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Letter {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
}

impl Letter {
    pub const ALL: [Letter; 7] = [
        Letter::A,
        Letter::B,
        Letter::C,
        Letter::D,
        Letter::E,
        Letter::F,
        Letter::G,
    ];

    /// Alphabetical index, A = 0 through G = 6.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The letter `steps` places later in the cycle A..G (wrapping).
    pub fn offset(self, steps: usize) -> Letter {
        Letter::ALL[(self.index() + steps) % 7]
    }

    /// Pitch class of the natural (white-key) note with this letter.
    pub fn natural_pitch_class(self) -> PitchClass {
        match self {
            Letter::C => 0,
            Letter::D => 2,
            Letter::E => 4,
            Letter::F => 5,
            Letter::G => 7,
            Letter::A => 9,
            Letter::B => 11,
        }
    }

    fn as_char(self) -> char {
        match self {
            Letter::A => 'A',
            Letter::B => 'B',
            Letter::C => 'C',
            Letter::D => 'D',
            Letter::E => 'E',
            Letter::F => 'F',
            Letter::G => 'G',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Accidental {
    Flat,
    Natural,
    Sharp,
}

impl Accidental {
    /// Semitone adjustment applied to the natural letter.
    pub fn semitones(self) -> i8 {
        match self {
            Accidental::Flat => -1,
            Accidental::Natural => 0,
            Accidental::Sharp => 1,
        }
    }

    /// Engraving symbol. Naturals print as nothing in a label.
    pub fn symbol(self) -> &'static str {
        match self {
            Accidental::Flat => "♭",
            Accidental::Natural => "",
            Accidental::Sharp => "♯",
        }
    }
}

// ---------------------------------------------------------------------------
// Note labels
// ---------------------------------------------------------------------------

/// A spelled note name: letter plus accidental.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteLabel {
    pub letter: Letter,
    pub accidental: Accidental,
}

impl NoteLabel {
    pub const fn new(letter: Letter, accidental: Accidental) -> Self {
        NoteLabel { letter, accidental }
    }

    /// The pitch class this spelling denotes.
    pub fn pitch_class(self) -> PitchClass {
        (self.letter.natural_pitch_class() as i8 + self.accidental.semitones()).rem_euclid(12)
            as PitchClass
    }

    /// Generic interval between the two letters: 1 = same letter, 3 = a
    /// third apart, and so on. Letters are compared by alphabetical index,
    /// so the result ranges over 1..=7.
    pub fn letter_interval(self, other: NoteLabel) -> u8 {
        (self.letter.index() as i32 - other.letter.index() as i32).unsigned_abs() as u8 + 1
    }
}

impl fmt::Display for NoteLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.letter.as_char(), self.accidental.symbol())
    }
}

/// Error returned when a string is not a recognizable note name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a note name: {0:?}")]
pub struct ParseNoteLabelError(pub String);

impl FromStr for NoteLabel {
    type Err = ParseNoteLabelError;

    /// Accepts `C`, `F♯`/`F#`, `B♭`/`Bb`, and `E♮`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseNoteLabelError(s.to_string());
        let mut chars = s.trim().chars();
        let letter = match chars.next().map(|c| c.to_ascii_uppercase()) {
            Some('A') => Letter::A,
            Some('B') => Letter::B,
            Some('C') => Letter::C,
            Some('D') => Letter::D,
            Some('E') => Letter::E,
            Some('F') => Letter::F,
            Some('G') => Letter::G,
            _ => return Err(err()),
        };
        let accidental = match chars.next() {
            None | Some('♮') => Accidental::Natural,
            Some('♯') | Some('#') => Accidental::Sharp,
            Some('♭') | Some('b') => Accidental::Flat,
            Some(_) => return Err(err()),
        };
        if chars.next().is_some() {
            return Err(err());
        }
        Ok(NoteLabel::new(letter, accidental))
    }
}

pub const C_FLAT: NoteLabel = NoteLabel::new(Letter::C, Accidental::Flat);
pub const C: NoteLabel = NoteLabel::new(Letter::C, Accidental::Natural);
pub const C_SHARP: NoteLabel = NoteLabel::new(Letter::C, Accidental::Sharp);
pub const D_FLAT: NoteLabel = NoteLabel::new(Letter::D, Accidental::Flat);
pub const D: NoteLabel = NoteLabel::new(Letter::D, Accidental::Natural);
pub const D_SHARP: NoteLabel = NoteLabel::new(Letter::D, Accidental::Sharp);
pub const E_FLAT: NoteLabel = NoteLabel::new(Letter::E, Accidental::Flat);
pub const E: NoteLabel = NoteLabel::new(Letter::E, Accidental::Natural);
pub const E_SHARP: NoteLabel = NoteLabel::new(Letter::E, Accidental::Sharp);
pub const F_FLAT: NoteLabel = NoteLabel::new(Letter::F, Accidental::Flat);
pub const F: NoteLabel = NoteLabel::new(Letter::F, Accidental::Natural);
pub const F_SHARP: NoteLabel = NoteLabel::new(Letter::F, Accidental::Sharp);
pub const G_FLAT: NoteLabel = NoteLabel::new(Letter::G, Accidental::Flat);
pub const G: NoteLabel = NoteLabel::new(Letter::G, Accidental::Natural);
pub const G_SHARP: NoteLabel = NoteLabel::new(Letter::G, Accidental::Sharp);
pub const A_FLAT: NoteLabel = NoteLabel::new(Letter::A, Accidental::Flat);
pub const A: NoteLabel = NoteLabel::new(Letter::A, Accidental::Natural);
pub const A_SHARP: NoteLabel = NoteLabel::new(Letter::A, Accidental::Sharp);
pub const B_FLAT: NoteLabel = NoteLabel::new(Letter::B, Accidental::Flat);
pub const B: NoteLabel = NoteLabel::new(Letter::B, Accidental::Natural);
pub const B_SHARP: NoteLabel = NoteLabel::new(Letter::B, Accidental::Sharp);

/// Every label the engine can produce (no double accidentals).
pub const NOTE_LABELS: [NoteLabel; 21] = [
    C_FLAT, C, C_SHARP, D_FLAT, D, D_SHARP, E_FLAT, E, E_SHARP, F_FLAT, F, F_SHARP, G_FLAT, G,
    G_SHARP, A_FLAT, A, A_SHARP, B_FLAT, B, B_SHARP,
];

/// Legal spellings per pitch class. The first entry of each row is the
/// fallback spelling.
static ENHARMONIC_TABLE: [&[NoteLabel]; 12] = [
    &[C, B_SHARP],
    &[C_SHARP, D_FLAT],
    &[D],
    &[E_FLAT, D_SHARP],
    &[E, F_FLAT],
    &[F, E_SHARP],
    &[F_SHARP, G_FLAT],
    &[G],
    &[A_FLAT, G_SHARP],
    &[A],
    &[B_FLAT, A_SHARP],
    &[B, C_FLAT],
];

/// The one or two legal spellings of a pitch class, fallback first.
pub fn labels_for_pitch_class(pitch_class: PitchClass) -> &'static [NoteLabel] {
    ENHARMONIC_TABLE[(pitch_class % 12) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_round_trip_through_octave_and_class() {
        let c4 = to_pitch(4, 0);
        assert_eq!(c4, 60);
        assert_eq!(pitch_class_of(c4), 0);
        assert_eq!(octave_of(c4), 4);
        assert_eq!(to_pitch(5, 9), 81); // A5
        assert_eq!(to_pitch(2, 4), 40); // E2
    }

    #[test]
    fn test_sanitize_octave_respects_keyboard_edges() {
        assert_eq!(sanitize_octave(9, 0), 0); // A0 exists
        assert_eq!(sanitize_octave(11, -3), 0); // B0 exists
        assert_eq!(sanitize_octave(0, 0), 1); // no C0 on the keyboard
        assert_eq!(sanitize_octave(0, 9), 8); // C8 exists
        assert_eq!(sanitize_octave(2, 8), 7); // no D8
        assert_eq!(sanitize_octave(5, 4), 4);
    }

    #[test]
    fn test_step_pitch_clamps_to_keyboard() {
        assert_eq!(step_pitch(60, 12), 72);
        assert_eq!(step_pitch(60, -3), 57);
        assert_eq!(step_pitch(HIGHEST_PITCH, 12), HIGHEST_PITCH);
        assert_eq!(step_pitch(LOWEST_PITCH, -12), LOWEST_PITCH);
        // D1 down two octaves would be D-1; clamps to D1.
        assert_eq!(step_pitch(to_pitch(1, 2), -24), to_pitch(1, 2));
    }

    #[test]
    fn test_label_pitch_classes() {
        assert_eq!(C.pitch_class(), 0);
        assert_eq!(B_SHARP.pitch_class(), 0);
        assert_eq!(C_FLAT.pitch_class(), 11);
        assert_eq!(E_SHARP.pitch_class(), 5);
        assert_eq!(F_FLAT.pitch_class(), 4);
        assert_eq!(G_SHARP.pitch_class(), A_FLAT.pitch_class());
    }

    #[test]
    fn test_enharmonic_table_is_consistent() {
        for pc in 0..12u8 {
            let labels = labels_for_pitch_class(pc);
            assert!(!labels.is_empty() && labels.len() <= 2);
            for label in labels {
                assert_eq!(label.pitch_class(), pc, "{label} listed under {pc}");
            }
        }
        for label in NOTE_LABELS {
            assert!(
                labels_for_pitch_class(label.pitch_class()).contains(&label),
                "{label} missing from table"
            );
        }
        let single: Vec<u8> = (0..12).filter(|&pc| labels_for_pitch_class(pc).len() == 1).collect();
        assert_eq!(single, vec![2, 7, 9]); // D, G, A
    }

    #[test]
    fn test_letter_interval() {
        assert_eq!(C.letter_interval(C_SHARP), 1);
        assert_eq!(C.letter_interval(E), 3);
        assert_eq!(E.letter_interval(C), 3);
        assert_eq!(C.letter_interval(G), 5);
        assert_eq!(A.letter_interval(G), 7);
    }

    #[test]
    fn test_label_display_and_parse() {
        assert_eq!(F_SHARP.to_string(), "F♯");
        assert_eq!(B_FLAT.to_string(), "B♭");
        assert_eq!(D.to_string(), "D");
        assert_eq!("F#".parse::<NoteLabel>(), Ok(F_SHARP));
        assert_eq!("Bb".parse::<NoteLabel>(), Ok(B_FLAT));
        assert_eq!("e♮".parse::<NoteLabel>(), Ok(E));
        assert!("H".parse::<NoteLabel>().is_err());
        assert!("C##".parse::<NoteLabel>().is_err());
    }

    #[test]
    fn test_pitch_name() {
        assert_eq!(pitch_name(60), "C4");
        assert_eq!(pitch_name(70), "B♭4");
    }
}
