// Major keys: scales, diatonic chords, and in-key spelling.
//
// A `Key` knows which seven pitch classes belong to it, which triads and
// sevenths are built on each degree, and how each diatonic pitch class is
// spelled (walking the scale and handing out successive letters from the
// root's letter, so D major spells pitch class 1 as C♯, never D♭).
//
// It also provides the range helpers the generators walk on: every in-key
// pitch inside a clef's bounds, and snapping an arbitrary pitch onto that
// list. When no key is pinned the same helpers fall back to the chromatic
// scale (`scale_pitches`).
//
// Only major keys exist. The 15 keys from C♭ to C♯ are the ones whose
// scales can be spelled with single accidentals; `Key::major` rejects any
// other root.

use crate::error::MusicError;
use crate::pitch::{
    self, Letter, NoteLabel, Pitch, PitchClass, labels_for_pitch_class, pitch_class_of, to_pitch,
};
use crate::rhythm::RhythmicValue;
use crate::sound::{Bounds, Chord, ChordQuality, Note};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Semitone offsets of the major scale from its root.
const MAJOR_SCALE: [u8; 7] = [0, 2, 4, 5, 7, 9, 11];

/// Triad quality on each major-scale degree (I ii iii IV V vi vii°).
const MAJOR_TRIADS: [ChordQuality; 7] = [
    ChordQuality::Major,
    ChordQuality::Minor,
    ChordQuality::Minor,
    ChordQuality::Major,
    ChordQuality::Major,
    ChordQuality::Minor,
    ChordQuality::Diminished,
];

/// Seventh quality on each major-scale degree (Imaj7 ii7 iii7 IVmaj7 V7 vi7 viiø7).
const MAJOR_SEVENTHS: [ChordQuality; 7] = [
    ChordQuality::Major7,
    ChordQuality::Minor7,
    ChordQuality::Minor7,
    ChordQuality::Major7,
    ChordQuality::Dominant7,
    ChordQuality::Minor7,
    ChordQuality::HalfDiminished7,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    Major,
}

/// A pinned key. Serialized as its name, e.g. `"E♭ Major"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Key {
    root: NoteLabel,
    key_type: KeyType,
}

impl Key {
    pub const C_FLAT_MAJOR: Key = Key::unchecked(pitch::C_FLAT);
    pub const C_MAJOR: Key = Key::unchecked(pitch::C);
    pub const C_SHARP_MAJOR: Key = Key::unchecked(pitch::C_SHARP);
    pub const D_FLAT_MAJOR: Key = Key::unchecked(pitch::D_FLAT);
    pub const D_MAJOR: Key = Key::unchecked(pitch::D);
    pub const E_FLAT_MAJOR: Key = Key::unchecked(pitch::E_FLAT);
    pub const E_MAJOR: Key = Key::unchecked(pitch::E);
    pub const F_MAJOR: Key = Key::unchecked(pitch::F);
    pub const F_SHARP_MAJOR: Key = Key::unchecked(pitch::F_SHARP);
    pub const G_FLAT_MAJOR: Key = Key::unchecked(pitch::G_FLAT);
    pub const G_MAJOR: Key = Key::unchecked(pitch::G);
    pub const A_FLAT_MAJOR: Key = Key::unchecked(pitch::A_FLAT);
    pub const A_MAJOR: Key = Key::unchecked(pitch::A);
    pub const B_FLAT_MAJOR: Key = Key::unchecked(pitch::B_FLAT);
    pub const B_MAJOR: Key = Key::unchecked(pitch::B);

    const ALL_MAJOR: [Key; 15] = [
        Key::C_FLAT_MAJOR,
        Key::C_MAJOR,
        Key::C_SHARP_MAJOR,
        Key::D_FLAT_MAJOR,
        Key::D_MAJOR,
        Key::E_FLAT_MAJOR,
        Key::E_MAJOR,
        Key::F_MAJOR,
        Key::F_SHARP_MAJOR,
        Key::G_FLAT_MAJOR,
        Key::G_MAJOR,
        Key::A_FLAT_MAJOR,
        Key::A_MAJOR,
        Key::B_FLAT_MAJOR,
        Key::B_MAJOR,
    ];

    const fn unchecked(root: NoteLabel) -> Key {
        Key {
            root,
            key_type: KeyType::Major,
        }
    }

    /// The major key on `root`, if its scale can be spelled with single
    /// accidentals.
    pub fn major(root: NoteLabel) -> Result<Key, MusicError> {
        let key = Key::unchecked(root);
        if key.note_labels_in_key().iter().flatten().count() == MAJOR_SCALE.len() {
            Ok(key)
        } else {
            Err(MusicError::UnsupportedKey(root))
        }
    }

    /// The 15 standard major keys, C♭ through B.
    pub fn all_major() -> &'static [Key] {
        &Key::ALL_MAJOR
    }

    pub fn root(&self) -> NoteLabel {
        self.root
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// The seven diatonic pitch classes, starting from the root.
    pub fn scale(&self) -> [PitchClass; 7] {
        let root = self.root.pitch_class();
        match self.key_type {
            KeyType::Major => MAJOR_SCALE.map(|iv| (root + iv) % 12),
        }
    }

    pub fn contains(&self, pitch_class: PitchClass) -> bool {
        self.scale().contains(&(pitch_class % 12))
    }

    /// The seven diatonic triads followed by the seven diatonic sevenths,
    /// rooted in octave 4, root position, quarter notes.
    pub fn chords(&self) -> Vec<Chord> {
        let scale = self.scale();
        let (triads, sevenths) = match self.key_type {
            KeyType::Major => (MAJOR_TRIADS, MAJOR_SEVENTHS),
        };
        let build = |degree: usize, quality: ChordQuality| {
            Chord::root_position(
                Note::new(to_pitch(4, scale[degree]), RhythmicValue::Quarter),
                quality,
            )
        };
        let mut chords: Vec<Chord> = triads.iter().enumerate().map(|(d, &q)| build(d, q)).collect();
        chords.extend(sevenths.iter().enumerate().map(|(d, &q)| build(d, q)));
        chords
    }

    /// For each of the 12 pitch classes, the key's spelling of it, or
    /// `None` when the pitch class is outside the key.
    ///
    /// C major: `[C, -, D, -, E, F, -, G, -, A, -, B]`.
    /// D major: `[-, C♯, D, -, E, -, F♯, G, -, A, -, B]`.
    pub fn note_labels_in_key(&self) -> [Option<NoteLabel>; 12] {
        let mut labels = [None; 12];
        for (degree, pc) in self.scale().into_iter().enumerate() {
            let letter: Letter = self.root.letter.offset(degree);
            labels[pc as usize] = labels_for_pitch_class(pc)
                .iter()
                .copied()
                .find(|label| label.letter == letter);
        }
        labels
    }

    /// The key's spelling of one pitch class.
    pub fn label_in_key(&self, pitch_class: PitchClass) -> Option<NoteLabel> {
        self.note_labels_in_key()[(pitch_class % 12) as usize]
    }

    /// All in-key pitches within `bounds`, ascending.
    pub fn pitches_in_range(&self, bounds: Bounds) -> Vec<Pitch> {
        (bounds.lower..=bounds.upper)
            .filter(|&p| self.contains(pitch_class_of(p)))
            .collect()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key_type {
            KeyType::Major => write!(f, "{} Major", self.root),
        }
    }
}

impl From<Key> for String {
    fn from(key: Key) -> String {
        key.to_string()
    }
}

impl TryFrom<String> for Key {
    type Error = String;

    /// Parses names like `"D Major"`, `"F# major"` or just `"B♭"`.
    fn try_from(name: String) -> Result<Self, Self::Error> {
        let mut parts = name.split_whitespace();
        let root: NoteLabel = parts
            .next()
            .ok_or_else(|| "empty key name".to_string())?
            .parse()
            .map_err(|e: pitch::ParseNoteLabelError| e.to_string())?;
        match parts.next().map(str::to_ascii_lowercase).as_deref() {
            None | Some("major") => {}
            Some(other) => return Err(format!("unsupported key type {other:?}")),
        }
        Key::major(root).map_err(|e| e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Scale walking helpers
// ---------------------------------------------------------------------------

/// The pitches a generator may step between: in-key pitches within bounds,
/// or every pitch within bounds when no key is pinned.
pub fn scale_pitches(key: Option<&Key>, bounds: Bounds) -> Vec<Pitch> {
    match key {
        Some(key) => key.pitches_in_range(bounds),
        None => (bounds.lower..=bounds.upper).collect(),
    }
}

/// Index of the entry in `pitches` (ascending, non-empty) closest to
/// `pitch`. Ties go to the lower pitch.
pub fn nearest_index(pitches: &[Pitch], pitch: Pitch) -> usize {
    let mut best = 0;
    let mut best_distance = u8::MAX;
    for (i, &p) in pitches.iter().enumerate() {
        let distance = p.abs_diff(pitch);
        if distance < best_distance {
            best = i;
            best_distance = distance;
        }
    }
    best
}
