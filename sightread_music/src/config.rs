// Practice configuration.
//
// Everything the engine needs to know about an exercise lives in
// `PracticeConfig`: which key to use, which clefs take part, the time
// signature, the difficulty ("adjacent note distance", the largest melodic
// move in scale steps), and which kinds of material to generate. The config
// is plain data, loaded from JSON (`from_json`/`load`) or built from the
// difficulty ladder (`for_difficulty`), and checked once by `validate`
// before a stream is created.
//
// Key selection has three states that must stay distinct: a pinned key,
// "random key" (resolved once to a concrete key before generation starts),
// and "any key" (no key at all: chromatic generation, no in-key spelling).
//
// `allowed_chord_qualities` turns the per-quality toggles into the list the
// chord generators draw from, dropping non-diatonic qualities whenever a key
// is pinned.

use crate::error::MusicError;
use crate::key::Key;
use crate::rhythm::TimeSignature;
use crate::sound::{ChordQuality, Clef};
use serde::{Deserialize, Serialize};
use sightread_prng::PracticeRng;
use std::path::Path;

/// Highest level accepted by `PracticeConfig::for_difficulty`.
pub const MAX_DIFFICULTY: u32 = 10;

/// How the exercise's key is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySelection {
    /// No key: chromatic material, spelled from context alone.
    AnyKey,
    /// A concrete key picked at random when the session starts.
    RandomKey,
    /// A specific key.
    Key(Key),
}

impl KeySelection {
    /// The key the session runs in. `AnyKey` resolves to `None`; the other
    /// two always produce a concrete key.
    pub fn resolve(&self, rng: &mut PracticeRng) -> Option<Key> {
        match self {
            KeySelection::AnyKey => None,
            KeySelection::RandomKey => rng.choose(Key::all_major()).copied(),
            KeySelection::Key(key) => Some(*key),
        }
    }
}

/// Which chord qualities may be generated. The group toggles
/// (`include_triads`, `include_sevenths`) gate their members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChordSelection {
    pub include_triads: bool,
    pub include_maj3: bool,
    pub include_min3: bool,
    pub include_dim3: bool,
    pub include_aug3: bool,

    pub include_sevenths: bool,
    pub include_maj7: bool,
    pub include_min7: bool,
    pub include_dom7: bool,
    pub include_half_dim7: bool,
    pub include_dim7: bool,
    pub include_min_maj7: bool,
    pub include_aug_maj7: bool,
}

impl Default for ChordSelection {
    fn default() -> Self {
        ChordSelection {
            include_triads: true,
            include_maj3: true,
            include_min3: true,
            include_dim3: true,
            include_aug3: false,

            include_sevenths: false,
            include_maj7: true,
            include_min7: true,
            include_dom7: true,
            include_half_dim7: true,
            include_dim7: false,
            include_min_maj7: false,
            include_aug_maj7: false,
        }
    }
}

impl ChordSelection {
    /// A selection enabling exactly the given qualities.
    pub fn only(qualities: &[ChordQuality]) -> Self {
        let has = |q: ChordQuality| qualities.contains(&q);
        ChordSelection {
            include_triads: qualities.iter().any(|q| q.is_triad()),
            include_maj3: has(ChordQuality::Major),
            include_min3: has(ChordQuality::Minor),
            include_dim3: has(ChordQuality::Diminished),
            include_aug3: has(ChordQuality::Augmented),

            include_sevenths: qualities.iter().any(|q| q.is_seventh()),
            include_maj7: has(ChordQuality::Major7),
            include_min7: has(ChordQuality::Minor7),
            include_dom7: has(ChordQuality::Dominant7),
            include_half_dim7: has(ChordQuality::HalfDiminished7),
            include_dim7: has(ChordQuality::Diminished7),
            include_min_maj7: has(ChordQuality::MinorMajor7),
            include_aug_maj7: has(ChordQuality::AugmentedMajor7),
        }
    }

    /// Whether a quality's own toggle and its group toggle are both on.
    pub fn includes(&self, quality: ChordQuality) -> bool {
        match quality {
            ChordQuality::Major => self.include_triads && self.include_maj3,
            ChordQuality::Minor => self.include_triads && self.include_min3,
            ChordQuality::Diminished => self.include_triads && self.include_dim3,
            ChordQuality::Augmented => self.include_triads && self.include_aug3,
            ChordQuality::Major7 => self.include_sevenths && self.include_maj7,
            ChordQuality::Minor7 => self.include_sevenths && self.include_min7,
            ChordQuality::Dominant7 => self.include_sevenths && self.include_dom7,
            ChordQuality::HalfDiminished7 => self.include_sevenths && self.include_half_dim7,
            ChordQuality::Diminished7 => self.include_sevenths && self.include_dim7,
            ChordQuality::MinorMajor7 => self.include_sevenths && self.include_min_maj7,
            ChordQuality::AugmentedMajor7 => self.include_sevenths && self.include_aug_maj7,
        }
    }
}

/// Chord qualities the generators may use, triads first then sevenths.
///
/// Qualities that never occur diatonically in a major key are only offered
/// when no key is pinned.
pub fn allowed_chord_qualities(key: Option<&Key>, selection: &ChordSelection) -> Vec<ChordQuality> {
    ChordQuality::TRIADS
        .iter()
        .chain(ChordQuality::SEVENTHS.iter())
        .copied()
        .filter(|&q| selection.includes(q))
        .filter(|&q| key.is_none() || q.is_diatonic_to_major())
        .collect()
}

/// A complete exercise configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PracticeConfig {
    pub key: KeySelection,
    pub include_treble_clef: bool,
    pub include_bass_clef: bool,
    pub time_signature: TimeSignature,
    /// Beats per minute. Only playback and export read this.
    pub tempo: u32,
    /// Largest melodic move, in scale steps. Also unlocks bass patterns.
    pub adjacent_note_distance: u32,
    /// Vary note lengths instead of generating only quarter notes.
    pub allow_rhythmic_values: bool,

    pub practice_single_notes: bool,
    pub practice_chords: bool,
    pub include_broken_chords: bool,
    pub include_inverted_chords: bool,
    pub chord_selection: ChordSelection,
}

impl Default for PracticeConfig {
    /// The level-1 exercise: treble-only stepwise single notes.
    fn default() -> Self {
        PracticeConfig {
            key: KeySelection::RandomKey,
            include_treble_clef: true,
            include_bass_clef: false,
            time_signature: TimeSignature::COMMON,
            tempo: 20,
            adjacent_note_distance: 1,
            allow_rhythmic_values: false,

            practice_single_notes: true,
            practice_chords: false,
            include_broken_chords: false,
            include_inverted_chords: false,
            chord_selection: ChordSelection::default(),
        }
    }
}

impl PracticeConfig {
    /// The preset for a difficulty level in `1..=10`. Each level keeps
    /// everything below it and adds one kind of material.
    pub fn for_difficulty(level: u32) -> Result<Self, MusicError> {
        if !(1..=MAX_DIFFICULTY).contains(&level) {
            return Err(MusicError::InvalidDifficulty(level));
        }
        let mut config = PracticeConfig {
            adjacent_note_distance: level,
            ..PracticeConfig::default()
        };
        if level >= 2 {
            config.include_bass_clef = true;
        }
        if level >= 3 {
            config.practice_chords = true;
        }
        if level >= 4 {
            config.include_broken_chords = true;
        }
        if level >= 5 {
            config.allow_rhythmic_values = true;
        }
        if level >= 6 {
            config.include_inverted_chords = true;
        }
        if level >= 7 {
            config.chord_selection.include_sevenths = true;
        }
        if level >= 9 {
            config.chord_selection.include_aug3 = true;
        }
        if level >= 10 {
            config.chord_selection.include_dim7 = true;
            config.chord_selection.include_min_maj7 = true;
            config.chord_selection.include_aug_maj7 = true;
        }
        Ok(config)
    }

    /// Parse and validate a configuration from JSON. Missing fields take
    /// their level-1 defaults.
    pub fn from_json(json: &str) -> Result<Self, MusicError> {
        let config: PracticeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self, MusicError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, MusicError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject configurations the generators cannot honor.
    pub fn validate(&self) -> Result<(), MusicError> {
        let ts = self.time_signature;
        if ts.top == 0 || !matches!(ts.bottom, 2 | 4 | 8) {
            return Err(MusicError::InvalidTimeSignature(ts));
        }
        if self.adjacent_note_distance == 0 {
            return Err(MusicError::InvalidAdjacentNoteDistance(
                self.adjacent_note_distance,
            ));
        }
        if self.include_treble_clef && !self.practice_single_notes && !self.practice_chords {
            return Err(MusicError::NoPatternAvailable(Clef::Treble));
        }
        Ok(())
    }

    pub fn includes_clef(&self, clef: Clef) -> bool {
        match clef {
            Clef::Treble => self.include_treble_clef,
            Clef::Bass => self.include_bass_clef,
        }
    }
}
