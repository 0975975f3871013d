// Sight-reading exercise engine.
//
// Procedurally generates endless measures of practice music for one or two
// clefs and names every note with a letter and accidental. Generation is
// key-aware, stays inside each clef's range, and always fills measures
// exactly; spelling resolves enharmonic choices from the key and the
// surrounding notes.
//
// Architecture:
// - pitch.rs: Pitches, pitch classes, letters, accidentals, note labels and
//   the enharmonic table
// - rhythm.rs: Rhythmic values, time signatures, beat arithmetic and
//   fitting rhythms to the barline
// - sound.rs: Notes, chord qualities, chords, sounds, note groups, clefs
//   and their pitch bounds
// - key.rs: Major keys (scale, diatonic chords, in-key spelling) and the
//   scale ladders generators walk on
// - config.rs: Practice configuration, difficulty presets, chord filtering
// - generators.rs: The pattern catalog and eligibility rules
// - stream.rs: Per-clef lookahead buffers and measure slicing
// - spelling.rs: The multi-pass spelling engine
// - midi.rs: MIDI file output of generated measures
// - error.rs: The crate error type
//
// All randomness comes from an injected `PracticeRng`, so a stream is
// deterministic given a seed.

pub mod config;
pub mod error;
pub mod generators;
pub mod key;
pub mod midi;
pub mod pitch;
pub mod rhythm;
pub mod sound;
pub mod spelling;
pub mod stream;
