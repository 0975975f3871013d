// The music stream: endless measures of generated material.
//
// A `MusicStream` owns one lookahead buffer per clef. Before a measure is
// handed out, every enabled clef's buffer is topped up to at least two
// measures of beats by running randomly chosen eligible patterns; then
// exactly one measure's worth of sounds is pulled off the front of each.
// Because generators fit every rhythm to the barline, the front of a buffer
// always sits on a barline and a measure can be cut without splitting a
// sound.
//
// The treble buffer is filled first so that the bass `SingleNote` pattern
// can look up the treble sound it plays under. Disabled clefs are never
// generated and yield empty measures.
//
// The stream holds the only random source (`PracticeRng`), so a stream
// built from the same config and seed replays the same music.

use crate::config::{PracticeConfig, allowed_chord_qualities};
use crate::error::MusicError;
use crate::generators::{self, GenerationContext, Pattern, chords_available};
use crate::key::Key;
use crate::pitch::Pitch;
use crate::rhythm::{Beats, TimeSignature};
use crate::sound::{ChordQuality, Clef, NoteGroup, Sound};
use crate::spelling;
use log::debug;
use serde::{Deserialize, Serialize};
use sightread_prng::PracticeRng;
use std::collections::VecDeque;

/// Lookahead kept in each clef buffer, in measures.
const LOOKAHEAD_MEASURES: f64 = 2.0;

/// One measure of raw generated sounds per clef.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Music {
    pub treble_clef: Vec<Sound>,
    pub bass_clef: Vec<Sound>,
}

impl Music {
    pub fn clef(&self, clef: Clef) -> &[Sound] {
        match clef {
            Clef::Treble => &self.treble_clef,
            Clef::Bass => &self.bass_clef,
        }
    }
}

/// One measure of spelled note groups per clef, in emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledMusic {
    pub treble_clef: Vec<NoteGroup>,
    pub bass_clef: Vec<NoteGroup>,
}

impl LabeledMusic {
    /// Note groups for `music`, with no labels committed yet.
    pub fn unlabeled(music: &Music) -> Self {
        LabeledMusic {
            treble_clef: music.treble_clef.iter().map(NoteGroup::from_sound).collect(),
            bass_clef: music.bass_clef.iter().map(NoteGroup::from_sound).collect(),
        }
    }

    pub fn clef(&self, clef: Clef) -> &[NoteGroup] {
        match clef {
            Clef::Treble => &self.treble_clef,
            Clef::Bass => &self.bass_clef,
        }
    }

    pub fn clef_mut(&mut self, clef: Clef) -> &mut Vec<NoteGroup> {
        match clef {
            Clef::Treble => &mut self.treble_clef,
            Clef::Bass => &mut self.bass_clef,
        }
    }
}

/// Generated sounds waiting to be pulled, with their total beats.
#[derive(Debug, Clone, Default)]
pub struct ClefBuffer {
    sounds: VecDeque<Sound>,
    beat_count: Beats,
    last_pitch: Option<Pitch>,
}

impl ClefBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn beat_count(&self) -> Beats {
        self.beat_count
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }

    /// Where the most recent run left its walk. Survives pulling, so
    /// melodies continue across measures.
    pub fn last_pitch(&self) -> Option<Pitch> {
        self.last_pitch
    }

    pub fn add_run(&mut self, run: generators::Run, clef: Clef) {
        let anchor = run.sounds.last().map(|last| last.anchor_pitch(clef));
        if let Some(pitch) = run.continue_from.or(anchor) {
            self.last_pitch = Some(pitch);
        }
        self.beat_count += run.beat_count;
        self.sounds.extend(run.sounds);
    }

    /// The sound sounding `offset` beats after the front of the buffer.
    pub fn sound_at(&self, offset: Beats, time_signature: TimeSignature) -> Option<Sound> {
        let mut start = 0.0;
        for sound in &self.sounds {
            let end = start + sound.beat_count(time_signature);
            if offset < end {
                return Some(*sound);
            }
            start = end;
        }
        None
    }

    /// Remove exactly one measure of sounds from the front.
    pub fn pull_off_measure(&mut self, time_signature: TimeSignature) -> Vec<Sound> {
        let measure = time_signature.measure_beats();
        let mut taken = 0.0;
        let mut sounds = Vec::new();
        while taken < measure {
            let Some(sound) = self.sounds.pop_front() else {
                break;
            };
            taken += sound.beat_count(time_signature);
            sounds.push(sound);
        }
        self.beat_count -= taken;
        sounds
    }
}

pub struct MusicStream {
    config: PracticeConfig,
    key: Option<Key>,
    rng: PracticeRng,
    chord_qualities: Vec<ChordQuality>,
    treble_patterns: Vec<Pattern>,
    bass_patterns: Vec<Pattern>,
    treble: ClefBuffer,
    bass: ClefBuffer,
    measures_generated: u64,
}

impl MusicStream {
    /// Build a stream, resolving the config's key selection with `rng`.
    pub fn new(config: PracticeConfig, mut rng: PracticeRng) -> Result<Self, MusicError> {
        let key = config.key.resolve(&mut rng);
        Self::with_key(config, key, rng)
    }

    /// Build a stream for an already-resolved key (`None` for no key).
    pub fn with_key(
        config: PracticeConfig,
        key: Option<Key>,
        rng: PracticeRng,
    ) -> Result<Self, MusicError> {
        config.validate()?;
        let chord_qualities = allowed_chord_qualities(key.as_ref(), &config.chord_selection);
        let has_chords = chords_available(key.as_ref(), &chord_qualities);
        let treble_patterns = Pattern::eligible(Clef::Treble, &config, has_chords);
        let bass_patterns = Pattern::eligible(Clef::Bass, &config, has_chords);
        for (clef, patterns) in [(Clef::Treble, &treble_patterns), (Clef::Bass, &bass_patterns)] {
            if config.includes_clef(clef) && patterns.is_empty() {
                return Err(MusicError::NoPatternAvailable(clef));
            }
        }
        debug!(
            "stream in {} with treble patterns {treble_patterns:?} and bass patterns {bass_patterns:?}",
            key.map_or_else(|| "no key".to_string(), |k| k.to_string())
        );
        Ok(MusicStream {
            config,
            key,
            rng,
            chord_qualities,
            treble_patterns,
            bass_patterns,
            treble: ClefBuffer::new(),
            bass: ClefBuffer::new(),
            measures_generated: 0,
        })
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn config(&self) -> &PracticeConfig {
        &self.config
    }

    pub fn measures_generated(&self) -> u64 {
        self.measures_generated
    }

    pub fn buffer(&self, clef: Clef) -> &ClefBuffer {
        match clef {
            Clef::Treble => &self.treble,
            Clef::Bass => &self.bass,
        }
    }

    /// Pull the next measure for every enabled clef.
    pub fn next_measure(&mut self) -> Music {
        let ts = self.config.time_signature;
        let mut music = Music::default();
        // Both buffers start on the same barline, so fill both before
        // pulling either.
        if self.config.include_treble_clef {
            self.top_up(Clef::Treble);
        }
        if self.config.include_bass_clef {
            self.top_up(Clef::Bass);
        }
        if self.config.include_treble_clef {
            music.treble_clef = self.treble.pull_off_measure(ts);
        }
        if self.config.include_bass_clef {
            music.bass_clef = self.bass.pull_off_measure(ts);
        }
        self.measures_generated += 1;
        debug!(
            "measure {}: {} treble and {} bass sounds",
            self.measures_generated,
            music.treble_clef.len(),
            music.bass_clef.len()
        );
        music
    }

    /// Pull the next measure and spell every note in it.
    pub fn next_labeled_measure(&mut self) -> LabeledMusic {
        let music = self.next_measure();
        spelling::label_music(&music, self.key.as_ref())
    }

    /// Generate into `clef`'s buffer until it holds the lookahead margin.
    fn top_up(&mut self, clef: Clef) {
        let ts = self.config.time_signature;
        let target = LOOKAHEAD_MEASURES * ts.measure_beats();
        // The bass is topped up after the treble, which by then holds at
        // least as many beats as the bass is about to need.
        let treble_enabled = self.config.include_treble_clef;
        loop {
            let buffer = match clef {
                Clef::Treble => &self.treble,
                Clef::Bass => &self.bass,
            };
            if buffer.beat_count() >= target {
                break;
            }
            let patterns = match clef {
                Clef::Treble => &self.treble_patterns,
                Clef::Bass => &self.bass_patterns,
            };
            let Some(&pattern) = self.rng.choose(patterns) else {
                break;
            };
            let accompaniment = match clef {
                Clef::Bass if treble_enabled => self.treble.sound_at(self.bass.beat_count(), ts),
                _ => None,
            };
            let ctx = GenerationContext {
                key: self.key.as_ref(),
                config: &self.config,
                clef,
                bounds: clef.bounds(),
                chord_qualities: &self.chord_qualities,
                beats_so_far: buffer.beat_count(),
                last_pitch: buffer.last_pitch(),
                accompaniment,
            };
            let run = generators::generate(pattern, &ctx, &mut self.rng);
            debug!(
                "{clef} pattern {pattern:?} produced {} sounds ({} beats)",
                run.sounds.len(),
                run.beat_count
            );
            if run.is_empty() {
                continue;
            }
            match clef {
                Clef::Treble => self.treble.add_run(run, clef),
                Clef::Bass => self.bass.add_run(run, clef),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeySelection;
    use crate::rhythm::RhythmicValue;
    use crate::sound::Note;

    fn total_beats(sounds: &[Sound], ts: TimeSignature) -> Beats {
        sounds.iter().map(|s| s.beat_count(ts)).sum()
    }

    #[test]
    fn test_pull_off_measure_takes_exactly_one_measure() {
        let ts = TimeSignature::COMMON;
        let mut buffer = ClefBuffer::new();
        let run = generators::Run {
            sounds: vec![
                Sound::Note(Note::new(60, RhythmicValue::Half)),
                Sound::Note(Note::new(62, RhythmicValue::Quarter)),
                Sound::Note(Note::new(64, RhythmicValue::Quarter)),
                Sound::Note(Note::new(65, RhythmicValue::Whole)),
            ],
            beat_count: 8.0,
            continue_from: None,
        };
        buffer.add_run(run, Clef::Treble);
        assert_eq!(buffer.last_pitch(), Some(65));
        assert_eq!(buffer.sound_at(2.5, ts).map(|s| s.notes()[0].pitch), Some(62));
        assert_eq!(buffer.sound_at(3.0, ts).map(|s| s.notes()[0].pitch), Some(64));
        assert_eq!(buffer.sound_at(8.0, ts), None);

        let measure = buffer.pull_off_measure(ts);
        assert_eq!(measure.len(), 3);
        assert_eq!(buffer.beat_count(), 4.0);
        assert_eq!(buffer.sound_at(0.0, ts).map(|s| s.notes()[0].pitch), Some(65));
        assert_eq!(buffer.sound_at(4.0, ts), None);
        assert_eq!(buffer.last_pitch(), Some(65));
    }

    #[test]
    fn test_measures_have_exact_beats() {
        let config = PracticeConfig::for_difficulty(10).unwrap();
        let mut stream = MusicStream::new(config, PracticeRng::new(77)).unwrap();
        for _ in 0..200 {
            let music = stream.next_measure();
            assert_eq!(total_beats(&music.treble_clef, TimeSignature::COMMON), 4.0);
            assert_eq!(total_beats(&music.bass_clef, TimeSignature::COMMON), 4.0);
            for clef in Clef::ALL {
                assert!(stream.buffer(clef).beat_count() >= 4.0);
            }
        }
        assert_eq!(stream.measures_generated(), 200);
    }

    #[test]
    fn test_disabled_clef_yields_empty_measures() {
        let config = PracticeConfig::default();
        let mut stream = MusicStream::new(config, PracticeRng::new(2)).unwrap();
        let music = stream.next_measure();
        assert!(!music.treble_clef.is_empty());
        assert!(music.bass_clef.is_empty());
        assert!(stream.buffer(Clef::Bass).is_empty());
    }

    #[test]
    fn test_bass_only_stream() {
        let mut config = PracticeConfig::for_difficulty(8).unwrap();
        config.include_treble_clef = false;
        config.practice_single_notes = false;
        config.practice_chords = false;
        let mut stream = MusicStream::new(config, PracticeRng::new(6)).unwrap();
        for _ in 0..50 {
            let music = stream.next_measure();
            assert!(music.treble_clef.is_empty());
            assert_eq!(total_beats(&music.bass_clef, TimeSignature::COMMON), 4.0);
        }
    }

    #[test]
    fn test_same_seed_replays_same_music() {
        let config = PracticeConfig::for_difficulty(6).unwrap();
        let mut a = MusicStream::new(config.clone(), PracticeRng::new(123)).unwrap();
        let mut b = MusicStream::new(config, PracticeRng::new(123)).unwrap();
        assert_eq!(a.key(), b.key());
        for _ in 0..20 {
            assert_eq!(a.next_measure(), b.next_measure());
        }
    }

    #[test]
    fn test_bass_figures_survive_across_runs() {
        let config = PracticeConfig::for_difficulty(7).unwrap();
        let mut stream = MusicStream::new(config, PracticeRng::new(12)).unwrap();
        let (mut figures, mut notes) = (0, 0);
        for _ in 0..200 {
            for sound in stream.next_measure().bass_clef {
                match sound {
                    Sound::Figure(_) => figures += 1,
                    _ => notes += 1,
                }
            }
        }
        // Three of the five bass patterns open with a figure.
        assert!(figures * 4 > notes, "{figures} figures, {notes} notes");
    }

    #[test]
    fn test_chords_only_without_eligible_chords_is_rejected() {
        let mut config = PracticeConfig::default();
        config.key = KeySelection::Key(Key::C_MAJOR);
        config.practice_single_notes = false;
        config.practice_chords = true;
        config.chord_selection = crate::config::ChordSelection::only(&[ChordQuality::Augmented]);
        let result = MusicStream::new(config.clone(), PracticeRng::new(1));
        assert!(matches!(result, Err(MusicError::NoPatternAvailable(Clef::Treble))));

        // The same filter is fine when no key is pinned.
        config.key = KeySelection::AnyKey;
        let mut stream = MusicStream::new(config, PracticeRng::new(1)).unwrap();
        assert_eq!(stream.key(), None);
        let music = stream.next_measure();
        assert!(music.treble_clef.iter().all(|s| matches!(
            s,
            Sound::Chord(c) if c.quality == ChordQuality::Augmented
        ) || matches!(s, Sound::Note(_))));
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let mut config = PracticeConfig::default();
        config.adjacent_note_distance = 0;
        assert!(matches!(
            MusicStream::new(config, PracticeRng::new(1)),
            Err(MusicError::InvalidAdjacentNoteDistance(0))
        ));
    }

    #[test]
    fn test_labeled_measure_is_fully_spelled() {
        let config = PracticeConfig::for_difficulty(9).unwrap();
        let mut stream = MusicStream::new(config, PracticeRng::new(31)).unwrap();
        for _ in 0..30 {
            let labeled = stream.next_labeled_measure();
            for clef in Clef::ALL {
                assert!(labeled.clef(clef).iter().all(NoteGroup::is_fully_labeled));
            }
        }
    }
}
