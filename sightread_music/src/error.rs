// Error type for the exercise engine.
//
// Only caller mistakes surface here: bad configuration, impossible keys,
// negative chord inversions, and I/O around config files and MIDI export.
// Situations the generators are expected to absorb (no eligible chord for a
// step, a figure that cannot fit in range, an ambiguous spelling) are
// handled in place and never become errors.

use crate::pitch::NoteLabel;
use crate::rhythm::TimeSignature;
use crate::sound::Clef;

#[derive(Debug, thiserror::Error)]
pub enum MusicError {
    #[error("chord inversion cannot be negative (got {0})")]
    NegativeInversion(i32),

    #[error("chord inversion {0} is too large")]
    InversionTooLarge(i32),

    #[error("{0} major cannot be spelled without double accidentals")]
    UnsupportedKey(NoteLabel),

    #[error("unsupported time signature {0}: top must be at least 1 and bottom one of 2, 4, 8")]
    InvalidTimeSignature(TimeSignature),

    #[error("adjacent note distance must be at least 1 (got {0})")]
    InvalidAdjacentNoteDistance(u32),

    #[error("difficulty must be between 1 and 10 (got {0})")]
    InvalidDifficulty(u32),

    #[error("no generation pattern is available for the {0} clef with this configuration")]
    NoPatternAvailable(Clef),

    #[error("could not parse practice configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
