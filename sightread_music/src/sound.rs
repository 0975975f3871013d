// Notes, chords and the sounds the generators emit.
//
// A `Sound` is a single `Note`, a `Chord`, or a `BassFigure` (the open
// octave voicings of the bass patterns); the stream buffers sounds and hands
// them out a measure at a time. Chords are stored as a root note plus a
// quality and inversion and only expanded to concrete notes on demand
// (`Chord::notes`). After a measure is pulled, each sound is
// flattened into a `NoteGroup` (the simultaneous notes it produced) for the
// spelling engine and the rendering side.
//
// Also home to the two staff-level types the generators need: `Clef` and
// its pitch `Bounds`.

use crate::error::MusicError;
use crate::key::Key;
use crate::pitch::{
    NoteLabel, Octave, Pitch, PitchClass, labels_for_pitch_class, octave_of, pitch_class_of,
    pitch_name, step_pitch, to_pitch,
};
use crate::rhythm::{Beats, RhythmicValue, TimeSignature, duration_beats};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Clefs and bounds
// ---------------------------------------------------------------------------

/// Inclusive pitch range a clef may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub lower: Pitch,
    pub upper: Pitch,
}

impl Bounds {
    pub fn contains(self, pitch: Pitch) -> bool {
        self.lower <= pitch && pitch <= self.upper
    }
}

/// C4 ("middle C") through A5.
pub const TREBLE_BOUNDS: Bounds = Bounds {
    lower: to_pitch(4, 0),
    upper: to_pitch(5, 9),
};

/// E2 through B3 (just below middle C).
pub const BASS_BOUNDS: Bounds = Bounds {
    lower: to_pitch(2, 4),
    upper: to_pitch(3, 11),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Clef {
    Treble,
    Bass,
}

impl Clef {
    pub const ALL: [Clef; 2] = [Clef::Treble, Clef::Bass];

    pub fn other(self) -> Clef {
        match self {
            Clef::Treble => Clef::Bass,
            Clef::Bass => Clef::Treble,
        }
    }

    pub fn bounds(self) -> Bounds {
        match self {
            Clef::Treble => TREBLE_BOUNDS,
            Clef::Bass => BASS_BOUNDS,
        }
    }
}

impl fmt::Display for Clef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Clef::Treble => "treble",
            Clef::Bass => "bass",
        })
    }
}

// ---------------------------------------------------------------------------
// Notes
// ---------------------------------------------------------------------------

/// A single pitched note. `label` starts empty for generated notes and is
/// committed once by the spelling engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub pitch: Pitch,
    pub rhythmic_value: RhythmicValue,
    pub dotted: bool,
    pub label: Option<NoteLabel>,
}

impl Note {
    /// An undotted, unlabeled note.
    pub fn new(pitch: Pitch, rhythmic_value: RhythmicValue) -> Self {
        Note {
            pitch,
            rhythmic_value,
            dotted: false,
            label: None,
        }
    }

    pub fn pitch_class(&self) -> PitchClass {
        pitch_class_of(self.pitch)
    }

    pub fn octave(&self) -> Octave {
        octave_of(self.pitch)
    }

    pub fn has_label(&self) -> bool {
        self.label.is_some()
    }

    /// Same pitch with a different rhythmic value.
    pub fn with_rhythm(self, rhythmic_value: RhythmicValue) -> Self {
        Note {
            rhythmic_value,
            ..self
        }
    }

    /// A copy moved by `half_steps`, octave clamped to the keyboard. Any
    /// label is dropped since it would no longer match the pitch.
    pub fn step_up(&self, half_steps: i32) -> Note {
        Note {
            pitch: step_pitch(self.pitch, half_steps),
            label: None,
            ..*self
        }
    }

    pub fn beat_count(&self, time_signature: TimeSignature) -> Beats {
        duration_beats(time_signature, self.rhythmic_value, self.dotted)
    }

    /// The label to display: the committed label if any, else the key's
    /// spelling, else the first legal spelling of the pitch class.
    pub fn label_or_default(&self, key: Option<&Key>) -> NoteLabel {
        if let Some(label) = self.label {
            return label;
        }
        if let Some(in_key) = key.and_then(|k| k.label_in_key(self.pitch_class())) {
            return in_key;
        }
        labels_for_pitch_class(self.pitch_class())[0]
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.label {
            Some(label) => write!(f, "{}{}", label, self.octave()),
            None => f.write_str(&pitch_name(self.pitch)),
        }
    }
}

// ---------------------------------------------------------------------------
// Chord qualities
// ---------------------------------------------------------------------------

/// A named interval stack above a root: the four triads and seven sevenths
/// the chord filter selects from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChordQuality {
    Major,
    Minor,
    Diminished,
    Augmented,
    Major7,
    Minor7,
    Dominant7,
    HalfDiminished7,
    Diminished7,
    MinorMajor7,
    AugmentedMajor7,
}

impl ChordQuality {
    pub const TRIADS: [ChordQuality; 4] = [
        ChordQuality::Major,
        ChordQuality::Minor,
        ChordQuality::Diminished,
        ChordQuality::Augmented,
    ];

    pub const SEVENTHS: [ChordQuality; 7] = [
        ChordQuality::Major7,
        ChordQuality::Minor7,
        ChordQuality::Dominant7,
        ChordQuality::HalfDiminished7,
        ChordQuality::Diminished7,
        ChordQuality::MinorMajor7,
        ChordQuality::AugmentedMajor7,
    ];

    /// Semitone offsets from the root, root included.
    pub fn intervals(self) -> &'static [u8] {
        match self {
            ChordQuality::Major => &[0, 4, 7],
            ChordQuality::Minor => &[0, 3, 7],
            ChordQuality::Diminished => &[0, 3, 6],
            ChordQuality::Augmented => &[0, 4, 8],
            ChordQuality::Major7 => &[0, 4, 7, 11],
            ChordQuality::Minor7 => &[0, 3, 7, 10],
            ChordQuality::Dominant7 => &[0, 4, 7, 10],
            ChordQuality::HalfDiminished7 => &[0, 3, 6, 10],
            ChordQuality::Diminished7 => &[0, 3, 6, 9],
            ChordQuality::MinorMajor7 => &[0, 3, 7, 11],
            ChordQuality::AugmentedMajor7 => &[0, 4, 8, 11],
        }
    }

    pub fn is_triad(self) -> bool {
        ChordQuality::TRIADS.contains(&self)
    }

    pub fn is_seventh(self) -> bool {
        ChordQuality::SEVENTHS.contains(&self)
    }

    /// Whether the quality occurs among a major key's diatonic chords.
    /// The rest only appear when no key is pinned.
    pub fn is_diatonic_to_major(self) -> bool {
        !matches!(
            self,
            ChordQuality::Augmented
                | ChordQuality::Diminished7
                | ChordQuality::MinorMajor7
                | ChordQuality::AugmentedMajor7
        )
    }

    /// Highest inversion the chord-choosing code will request: one less
    /// than the number of notes in the stack.
    pub fn max_inversion(self) -> u8 {
        self.intervals().len() as u8 - 1
    }

    /// Chord-symbol suffix, in the plain-text form of the conventional
    /// first spelling (superscripts flattened).
    pub fn notation(self) -> &'static str {
        match self {
            ChordQuality::Major => "maj",
            ChordQuality::Minor => "min",
            ChordQuality::Diminished => "dim",
            ChordQuality::Augmented => "aug",
            ChordQuality::Major7 => "Maj7",
            ChordQuality::Minor7 => "m7",
            ChordQuality::Dominant7 => "7",
            ChordQuality::HalfDiminished7 => "∅7",
            ChordQuality::Diminished7 => "○7",
            ChordQuality::MinorMajor7 => "minMaj7",
            ChordQuality::AugmentedMajor7 => "augMaj7",
        }
    }
}

// ---------------------------------------------------------------------------
// Chords
// ---------------------------------------------------------------------------

/// A chord: root note, quality, and inversion (0 = root position).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chord {
    pub root: Note,
    pub quality: ChordQuality,
    inversion: u8,
}

impl Chord {
    /// Build a chord, rejecting negative inversions and inversions too
    /// large to store.
    pub fn new(root: Note, quality: ChordQuality, inversion: i32) -> Result<Chord, MusicError> {
        if inversion < 0 {
            return Err(MusicError::NegativeInversion(inversion));
        }
        let inversion =
            u8::try_from(inversion).map_err(|_| MusicError::InversionTooLarge(inversion))?;
        Ok(Chord {
            root,
            quality,
            inversion,
        })
    }

    pub fn root_position(root: Note, quality: ChordQuality) -> Chord {
        Chord {
            root,
            quality,
            inversion: 0,
        }
    }

    pub fn inversion(&self) -> u8 {
        self.inversion
    }

    pub fn rhythmic_value(&self) -> RhythmicValue {
        self.root.rhythmic_value
    }

    pub fn with_rhythm(self, rhythmic_value: RhythmicValue) -> Chord {
        Chord {
            root: self.root.with_rhythm(rhythmic_value),
            ..self
        }
    }

    pub fn with_inversion(self, inversion: u8) -> Chord {
        Chord { inversion, ..self }
    }

    /// The same chord moved by `half_steps`.
    pub fn transposed(self, half_steps: i32) -> Chord {
        Chord {
            root: self.root.step_up(half_steps),
            ..self
        }
    }

    /// Concrete notes, in interval-stack order. Each inversion step raises
    /// the next note of the stack (cycling) by an octave, so inversion 1 of
    /// C-E-G sounds E-G-C.
    pub fn notes(&self) -> Vec<Note> {
        let mut notes: Vec<Note> = self
            .quality
            .intervals()
            .iter()
            .map(|&iv| self.root.step_up(iv as i32))
            .collect();
        let len = notes.len();
        for step in 0..self.inversion as usize {
            let note = &mut notes[step % len];
            note.pitch = step_pitch(note.pitch, 12);
        }
        notes
    }

    /// Chord symbol such as `Dmin` or `G7`.
    pub fn symbol(&self, key: Option<&Key>) -> String {
        format!("{}{}", self.root.label_or_default(key), self.quality.notation())
    }
}

// ---------------------------------------------------------------------------
// Bass figures
// ---------------------------------------------------------------------------

/// Open voicings played by the bass octave patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FigureKind {
    /// A note and the note an octave above.
    Octave,
    /// A note, its fifth, and its octave.
    OctaveFifth,
}

impl FigureKind {
    pub fn intervals(self) -> &'static [u8] {
        match self {
            FigureKind::Octave => &[0, 12],
            FigureKind::OctaveFifth => &[0, 7, 12],
        }
    }
}

/// A bass figure built up from its lowest note. Figures are never inverted
/// and are not chord qualities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BassFigure {
    pub low: Note,
    pub kind: FigureKind,
}

impl BassFigure {
    pub fn new(low: Note, kind: FigureKind) -> Self {
        BassFigure { low, kind }
    }

    /// The upper octave, which the bass line continues from.
    pub fn top_pitch(&self) -> Pitch {
        step_pitch(self.low.pitch, 12)
    }

    pub fn notes(&self) -> Vec<Note> {
        self.kind
            .intervals()
            .iter()
            .map(|&iv| self.low.step_up(iv as i32))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Sounds
// ---------------------------------------------------------------------------

/// One generated event: a single note, a chord, or a bass figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sound {
    Note(Note),
    Chord(Chord),
    Figure(BassFigure),
}

impl Sound {
    /// The notes this sound plays together.
    pub fn notes(&self) -> Vec<Note> {
        match self {
            Sound::Note(note) => vec![*note],
            Sound::Chord(chord) => chord.notes(),
            Sound::Figure(figure) => figure.notes(),
        }
    }

    pub fn rhythmic_value(&self) -> RhythmicValue {
        match self {
            Sound::Note(note) => note.rhythmic_value,
            Sound::Chord(chord) => chord.rhythmic_value(),
            Sound::Figure(figure) => figure.low.rhythmic_value,
        }
    }

    pub fn with_rhythm(self, rhythmic_value: RhythmicValue) -> Sound {
        match self {
            Sound::Note(note) => Sound::Note(note.with_rhythm(rhythmic_value)),
            Sound::Chord(chord) => Sound::Chord(chord.with_rhythm(rhythmic_value)),
            Sound::Figure(figure) => Sound::Figure(BassFigure {
                low: figure.low.with_rhythm(rhythmic_value),
                ..figure
            }),
        }
    }

    pub fn beat_count(&self, time_signature: TimeSignature) -> Beats {
        match self {
            Sound::Note(note) => note.beat_count(time_signature),
            Sound::Chord(chord) => chord.root.beat_count(time_signature),
            Sound::Figure(figure) => figure.low.beat_count(time_signature),
        }
    }

    /// The pitch melodic continuity is measured from: the top note in the
    /// treble, the bottom note in the bass.
    pub fn anchor_pitch(&self, clef: Clef) -> Pitch {
        let pitches = self.notes().into_iter().map(|n| n.pitch);
        let anchor = match clef {
            Clef::Treble => pitches.max(),
            Clef::Bass => pitches.min(),
        };
        anchor.unwrap_or_default()
    }
}

impl From<Note> for Sound {
    fn from(note: Note) -> Self {
        Sound::Note(note)
    }
}

impl From<Chord> for Sound {
    fn from(chord: Chord) -> Self {
        Sound::Chord(chord)
    }
}

impl From<BassFigure> for Sound {
    fn from(figure: BassFigure) -> Self {
        Sound::Figure(figure)
    }
}

/// The simultaneous notes produced by one sound, in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteGroup {
    pub notes: Vec<Note>,
}

impl NoteGroup {
    pub fn from_sound(sound: &Sound) -> Self {
        NoteGroup {
            notes: sound.notes(),
        }
    }

    pub fn is_fully_labeled(&self) -> bool {
        self.notes.iter().all(Note::has_label)
    }

    /// `(pitch class, octave)` pairs, the form a performed chord is matched
    /// against. Labels are irrelevant here.
    pub fn performed_pitches(&self) -> Vec<(PitchClass, Octave)> {
        let mut pairs: Vec<_> = self
            .notes
            .iter()
            .map(|n| (n.pitch_class(), n.octave()))
            .collect();
        pairs.sort_unstable_by_key(|&(pc, octave)| (octave, pc));
        pairs.dedup();
        pairs
    }
}

impl fmt::Display for NoteGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.notes.len() == 1 {
            return write!(f, "{}", self.notes[0]);
        }
        f.write_str("[")?;
        for (i, note) in self.notes.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{note}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::{C, E, G};

    fn quarter(pitch: Pitch) -> Note {
        Note::new(pitch, RhythmicValue::Quarter)
    }

    #[test]
    fn test_note_pitch_class_and_octave() {
        let note = quarter(61);
        assert_eq!(note.pitch_class(), 1);
        assert_eq!(note.octave(), 4);
    }

    #[test]
    fn test_note_equality_includes_label() {
        let a = quarter(60);
        let mut b = quarter(60);
        assert_eq!(a, b);
        b.label = Some(C);
        assert_ne!(a, b);
        assert_ne!(a, a.with_rhythm(RhythmicValue::Half));
    }

    #[test]
    fn test_step_up_drops_label() {
        let mut note = quarter(60);
        note.label = Some(C);
        let up = note.step_up(4);
        assert_eq!(up.pitch, 64);
        assert_eq!(up.label, None);
    }

    #[test]
    fn test_c_major_first_inversion() {
        let chord = Chord::new(quarter(60), ChordQuality::Major, 1).unwrap();
        let mut pitches: Vec<Pitch> = chord.notes().iter().map(|n| n.pitch).collect();
        pitches.sort_unstable();
        assert_eq!(pitches, vec![64, 67, 72]); // E4 G4 C5
    }

    #[test]
    fn test_inversions_cycle_through_stack() {
        let chord = Chord::root_position(quarter(60), ChordQuality::Dominant7);
        let pitches = |inv: u8| -> Vec<Pitch> {
            chord.with_inversion(inv).notes().iter().map(|n| n.pitch).collect()
        };
        assert_eq!(pitches(0), vec![60, 64, 67, 70]);
        assert_eq!(pitches(3), vec![72, 76, 79, 70]);
        // Four steps on a four-note chord raise everything an octave.
        assert_eq!(pitches(4), vec![72, 76, 79, 82]);
        // A fifth step starts raising the root a second time.
        assert_eq!(pitches(5)[0], 84);
    }

    #[test]
    fn test_negative_inversion_is_rejected() {
        let err = Chord::new(quarter(60), ChordQuality::Minor, -1).unwrap_err();
        assert!(matches!(err, MusicError::NegativeInversion(-1)));
    }

    #[test]
    fn test_oversized_inversion_is_rejected() {
        let chord = Chord::new(quarter(60), ChordQuality::Minor, 255).unwrap();
        assert_eq!(chord.inversion(), 255);
        let err = Chord::new(quarter(60), ChordQuality::Minor, 256).unwrap_err();
        assert!(matches!(err, MusicError::InversionTooLarge(256)));
    }

    #[test]
    fn test_sound_beats_and_notes() {
        let ts = TimeSignature::COMMON;
        let figure = BassFigure::new(Note::new(48, RhythmicValue::Half), FigureKind::Octave);
        assert_eq!(figure.top_pitch(), 60);
        let sound = Sound::from(figure);
        assert_eq!(sound.rhythmic_value(), RhythmicValue::Half);
        assert_eq!(sound.beat_count(ts), 2.0);
        assert_eq!(sound.notes().len(), 2);
        assert_eq!(sound.anchor_pitch(Clef::Bass), 48);
        assert_eq!(sound.anchor_pitch(Clef::Treble), 60);
        let quarter_figure = sound.with_rhythm(RhythmicValue::Quarter);
        assert_eq!(quarter_figure.beat_count(ts), 1.0);

        let open = BassFigure::new(Note::new(43, RhythmicValue::Whole), FigureKind::OctaveFifth);
        let pitches: Vec<Pitch> = open.notes().iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![43, 50, 55]);

        let note = Sound::from(quarter(67));
        assert_eq!(note.notes(), vec![quarter(67)]);
        assert_eq!(note.beat_count(ts), 1.0);
    }

    #[test]
    fn test_quality_catalog() {
        assert!(ChordQuality::TRIADS.iter().all(|q| q.intervals().len() == 3));
        assert!(ChordQuality::SEVENTHS.iter().all(|q| q.intervals().len() == 4));
        assert!(!ChordQuality::Augmented.is_diatonic_to_major());
        assert!(ChordQuality::HalfDiminished7.is_diatonic_to_major());
        assert_eq!(ChordQuality::Major.max_inversion(), 2);
        assert_eq!(ChordQuality::Diminished7.max_inversion(), 3);
    }

    #[test]
    fn test_chord_symbol_and_default_labels() {
        let chord = Chord::root_position(quarter(62), ChordQuality::Minor);
        assert_eq!(chord.symbol(None), "Dmin");
        let seventh = Chord::root_position(quarter(60), ChordQuality::Major7);
        assert_eq!(seventh.symbol(None), "CMaj7");
        let minor_major = Chord::root_position(quarter(69), ChordQuality::MinorMajor7);
        assert_eq!(minor_major.symbol(Some(&Key::C_MAJOR)), "AminMaj7");
        let mut note = quarter(64);
        assert_eq!(note.label_or_default(None), E);
        note.label = Some(crate::pitch::F_FLAT);
        assert_eq!(note.label_or_default(None), crate::pitch::F_FLAT);
        assert_eq!(quarter(67).label_or_default(Some(&Key::C_MAJOR)), G);
    }

    #[test]
    fn test_bounds() {
        assert!(TREBLE_BOUNDS.contains(60) && TREBLE_BOUNDS.contains(81));
        assert!(!TREBLE_BOUNDS.contains(59) && !TREBLE_BOUNDS.contains(82));
        assert_eq!(BASS_BOUNDS, Bounds { lower: 40, upper: 59 });
    }

    #[test]
    fn test_performed_pitches_ignore_labels_and_order() {
        let mut a = quarter(64);
        a.label = Some(E);
        let group = NoteGroup {
            notes: vec![quarter(67), a, quarter(60)],
        };
        assert_eq!(group.performed_pitches(), vec![(0, 4), (4, 4), (7, 4)]);
    }
}
