// MIDI export of generated measures.
//
// Writes a sequence of measures as a Standard MIDI File (SMF Format 1): a
// conductor track carrying tempo and time signature, then one track per
// enabled clef (treble on channel 0, bass on channel 1). Sounds are laid end
// to end; every note of a chord starts and stops together.
//
// Uses the `midly` crate for MIDI writing.

use crate::config::PracticeConfig;
use crate::error::MusicError;
use crate::rhythm::{RhythmicValue, TimeSignature};
use crate::sound::{Clef, Sound};
use crate::stream::Music;
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::path::Path;

/// Ticks per quarter note in MIDI output.
const TICKS_PER_QUARTER: u16 = 480;

/// Ticks per whole note.
const TICKS_PER_WHOLE: u32 = TICKS_PER_QUARTER as u32 * 4;

/// Largest value a tempo meta event can hold.
const MAX_TEMPO_MICROSECONDS: u32 = 0x00FF_FFFF;

const NOTE_VELOCITY: u8 = 80;

/// Acoustic grand piano.
const PIANO_PROGRAM: u8 = 0;

/// Convert measures to MIDI and write them to a file.
pub fn write_midi(
    measures: &[Music],
    config: &PracticeConfig,
    path: &Path,
) -> Result<(), MusicError> {
    let smf = measures_to_smf(measures, config);
    let mut buf = Vec::new();
    smf.write_std(&mut buf)?;
    std::fs::write(path, &buf)?;
    Ok(())
}

/// Length of one sound in ticks.
pub fn duration_ticks(rhythmic_value: RhythmicValue, dotted: bool) -> u32 {
    let base = TICKS_PER_WHOLE / rhythmic_value.divisor();
    if dotted { base + base / 2 } else { base }
}

fn sound_ticks(sound: &Sound) -> u32 {
    match sound {
        Sound::Note(note) => duration_ticks(note.rhythmic_value, note.dotted),
        Sound::Chord(chord) => duration_ticks(chord.rhythmic_value(), chord.root.dotted),
        Sound::Figure(figure) => duration_ticks(figure.low.rhythmic_value, figure.low.dotted),
    }
}

/// Microseconds per quarter note for `tempo` beats per minute, where a beat
/// is the time signature's bottom value.
fn tempo_microseconds(tempo: u32, time_signature: TimeSignature) -> u32 {
    let per_beat = 60_000_000u64 / tempo.max(1) as u64;
    let per_quarter = per_beat * time_signature.bottom as u64 / 4;
    per_quarter.min(MAX_TEMPO_MICROSECONDS as u64) as u32
}

fn meta(kind: MetaMessage<'static>) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(kind),
    }
}

/// Convert measures to an in-memory SMF.
pub fn measures_to_smf(measures: &[Music], config: &PracticeConfig) -> Smf<'static> {
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));

    // Track 0: tempo and time signature
    let ts = config.time_signature;
    let conductor: Track<'static> = vec![
        meta(MetaMessage::Tempo(u24::new(tempo_microseconds(config.tempo, ts)))),
        meta(MetaMessage::TimeSignature(
            ts.top.min(u8::MAX as u32) as u8,
            ts.bottom.trailing_zeros() as u8,
            24,
            8,
        )),
        meta(MetaMessage::EndOfTrack),
    ];
    smf.tracks.push(conductor);

    let clefs: [(Clef, &'static [u8], u8); 2] =
        [(Clef::Treble, &b"Treble"[..], 0), (Clef::Bass, &b"Bass"[..], 1)];
    for (clef, name, channel) in clefs {
        if config.includes_clef(clef) {
            let sounds = measures.iter().flat_map(|m| m.clef(clef).iter());
            smf.tracks.push(clef_track(sounds, name, u4::new(channel)));
        }
    }

    smf
}

fn clef_track<'s>(
    sounds: impl Iterator<Item = &'s Sound>,
    name: &'static [u8],
    channel: u4,
) -> Track<'static> {
    let mut track: Track<'static> = vec![
        meta(MetaMessage::TrackName(name)),
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange {
                    program: u7::new(PIANO_PROGRAM),
                },
            },
        },
    ];

    // Absolute-time events; note-offs sort before note-ons at the same tick.
    let mut events: Vec<(u32, bool, u8)> = Vec::new();
    let mut tick = 0;
    for sound in sounds {
        let end = tick + sound_ticks(sound);
        for note in sound.notes() {
            events.push((tick, true, note.pitch));
            events.push((end, false, note.pitch));
        }
        tick = end;
    }
    events.sort_by_key(|&(at, on, pitch)| (at, on, pitch));

    let mut last_tick = 0;
    for (at, on, pitch) in events {
        let message = if on {
            MidiMessage::NoteOn {
                key: u7::new(pitch),
                vel: u7::new(NOTE_VELOCITY),
            }
        } else {
            MidiMessage::NoteOff {
                key: u7::new(pitch),
                vel: u7::new(0),
            }
        };
        track.push(TrackEvent {
            delta: u28::new(at - last_tick),
            kind: TrackEventKind::Midi { channel, message },
        });
        last_tick = at;
    }

    track.push(meta(MetaMessage::EndOfTrack));
    track
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::{BassFigure, FigureKind, Note};

    fn note_ons(track: &Track<'_>) -> usize {
        track
            .iter()
            .filter(|e| {
                matches!(
                    e.kind,
                    TrackEventKind::Midi {
                        message: MidiMessage::NoteOn { .. },
                        ..
                    }
                )
            })
            .count()
    }

    #[test]
    fn test_duration_ticks() {
        assert_eq!(duration_ticks(RhythmicValue::Quarter, false), 480);
        assert_eq!(duration_ticks(RhythmicValue::Whole, false), 1920);
        assert_eq!(duration_ticks(RhythmicValue::Eighth, false), 240);
        assert_eq!(duration_ticks(RhythmicValue::Half, true), 1440);
    }

    #[test]
    fn test_tempo_conversion() {
        assert_eq!(tempo_microseconds(120, TimeSignature::COMMON), 500_000);
        // In 6/8 a beat is an eighth, so a quarter lasts two beats.
        assert_eq!(tempo_microseconds(120, TimeSignature::new(6, 8)), 1_000_000);
        assert_eq!(tempo_microseconds(0, TimeSignature::new(6, 8)), MAX_TEMPO_MICROSECONDS);
    }

    #[test]
    fn test_measures_to_smf_tracks() {
        let config = PracticeConfig {
            include_bass_clef: true,
            ..PracticeConfig::default()
        };
        let figure = BassFigure::new(Note::new(48, RhythmicValue::Whole), FigureKind::Octave);
        let music = Music {
            treble_clef: vec![
                Sound::Note(Note::new(60, RhythmicValue::Half)),
                Sound::Note(Note::new(62, RhythmicValue::Half)),
            ],
            bass_clef: vec![Sound::Figure(figure)],
        };
        let smf = measures_to_smf(&[music.clone(), music], &config);
        // Conductor + treble + bass
        assert_eq!(smf.tracks.len(), 3);
        assert_eq!(note_ons(&smf.tracks[1]), 4);
        assert_eq!(note_ons(&smf.tracks[2]), 4);

        // Deltas add up to two whole notes.
        let total: u32 = smf.tracks[2].iter().map(|e| e.delta.as_int()).sum();
        assert_eq!(total, 2 * TICKS_PER_WHOLE);
    }

    #[test]
    fn test_disabled_clef_has_no_track() {
        let config = PracticeConfig::default();
        let smf = measures_to_smf(&[Music::default()], &config);
        assert_eq!(smf.tracks.len(), 2);
    }

    #[test]
    fn test_write_midi_to_file() {
        let config = PracticeConfig::default();
        let music = Music {
            treble_clef: vec![Sound::Note(Note::new(60, RhythmicValue::Whole))],
            bass_clef: vec![],
        };
        let path = std::env::temp_dir().join("sightread_music_write_test.mid");
        write_midi(&[music], &config, &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..4], b"MThd");
        let _ = std::fs::remove_file(&path);
    }
}
