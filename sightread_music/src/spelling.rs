// Spelling engine: choosing a letter and accidental for every note.
//
// Every pitch class has one or two legal spellings (C♯/D♭, E/F♭, ...). A
// pulled measure is spelled by four passes, run in order, each touching only
// notes that are still unlabeled:
//
// 1. Boundary: a note sitting exactly on its clef's lowest or highest pitch
//    takes the spelling that stays on the inside of the staff range (the
//    alphabetically later letter at the bottom, the earlier one at the top).
//    Pitch classes belonging to a pinned key are left to the in-key pass.
// 2. In-key: pitch classes in the pinned key take the key's spelling.
//    Skipped when no key is pinned.
// 3. Context score: each candidate spelling is scored by its letter
//    intervals to the labeled notes around it. Unisons, thirds, fifths and
//    sevenths contribute 4, 3, 2 and 1, multiplied by a proximity weight
//    (`max(1, 5 - group distance)` within the clef, 1 across clefs). A
//    strictly best positive score commits; anything else is left for the
//    fallback. Labels are committed one note at a time, treble first, so
//    later notes see earlier decisions. Notes whose pitch class has only one
//    spelling count as labeled context even before they are committed.
// 4. Fallback: the first spelling in the enharmonic table.
//
// Labels already present are never changed, so spelling a spelled measure
// again is a no-op.

use crate::key::Key;
use crate::pitch::{NoteLabel, labels_for_pitch_class};
use crate::sound::{Bounds, Clef, Note, NoteGroup};
use crate::stream::{LabeledMusic, Music};
use log::trace;

/// Largest same-clef proximity weight (notes in the same group).
const NEAR_WEIGHT: i32 = 5;

/// Proximity weight for notes in the other clef.
const CROSS_CLEF_WEIGHT: i32 = 1;

/// Spell one raw measure.
pub fn label_music(music: &Music, key: Option<&Key>) -> LabeledMusic {
    let mut measure = LabeledMusic::unlabeled(music);
    label_measure(&mut measure, key);
    measure
}

/// Run all four passes over a measure, leaving every note labeled.
pub fn label_measure(measure: &mut LabeledMusic, key: Option<&Key>) {
    for clef in Clef::ALL {
        boundary_pass(measure.clef_mut(clef), clef, key);
    }
    if let Some(key) = key {
        for clef in Clef::ALL {
            in_key_pass(measure.clef_mut(clef), clef, key);
        }
    }
    for clef in Clef::ALL {
        score_pass(measure, clef);
    }
    for clef in Clef::ALL {
        fallback_pass(measure.clef_mut(clef), clef);
    }
}

fn unlabeled_notes_mut(groups: &mut [NoteGroup]) -> impl Iterator<Item = (usize, &mut Note)> {
    groups.iter_mut().enumerate().flat_map(|(index, group)| {
        group
            .notes
            .iter_mut()
            .filter(|n| !n.has_label())
            .map(move |n| (index, n))
    })
}

fn commit(note: &mut Note, label: NoteLabel, clef: Clef, group: usize, pass: &str) {
    trace!("{clef} group {group}: {} spelled {label} ({pass})", note.pitch);
    note.label = Some(label);
}

/// The spelling a boundary note should take, if it is on a boundary and
/// has a choice.
fn boundary_label(note: &Note, bounds: Bounds, key: Option<&Key>) -> Option<NoteLabel> {
    let pitch_class = note.pitch_class();
    if key.is_some_and(|k| k.contains(pitch_class)) {
        return None;
    }
    let candidates = labels_for_pitch_class(pitch_class);
    if candidates.len() != 2 {
        return None;
    }
    let by_letter = candidates.iter().copied();
    if note.pitch == bounds.lower {
        by_letter.max_by_key(|l| l.letter)
    } else if note.pitch == bounds.upper {
        by_letter.min_by_key(|l| l.letter)
    } else {
        None
    }
}

fn boundary_pass(groups: &mut [NoteGroup], clef: Clef, key: Option<&Key>) {
    let bounds = clef.bounds();
    for (group, note) in unlabeled_notes_mut(groups) {
        if let Some(label) = boundary_label(note, bounds, key) {
            commit(note, label, clef, group, "boundary");
        }
    }
}

fn in_key_pass(groups: &mut [NoteGroup], clef: Clef, key: &Key) {
    for (group, note) in unlabeled_notes_mut(groups) {
        if let Some(label) = key.label_in_key(note.pitch_class()) {
            commit(note, label, clef, group, "in key");
        }
    }
}

/// Points for a letter interval: root, third, fifth and seventh
/// relationships only.
fn interval_points(candidate: NoteLabel, other: NoteLabel) -> i32 {
    let interval = candidate.letter_interval(other) as i32;
    match interval {
        1 | 3 | 5 | 7 => 4 - (interval - 1) / 2,
        _ => 0,
    }
}

/// The label a note contributes as context: its own, or its only possible
/// spelling.
fn context_label(note: &Note) -> Option<NoteLabel> {
    note.label.or_else(|| match labels_for_pitch_class(note.pitch_class()) {
        [only] => Some(*only),
        _ => None,
    })
}

/// Context score of spelling a note in group `group` of `clef` as
/// `candidate`.
pub fn candidate_score(
    candidate: NoteLabel,
    group: usize,
    clef: Clef,
    measure: &LabeledMusic,
) -> i32 {
    let same: i32 = measure
        .clef(clef)
        .iter()
        .enumerate()
        .flat_map(|(index, g)| g.notes.iter().map(move |n| (index, n)))
        .filter_map(|(index, n)| Some((index, context_label(n)?)))
        .map(|(index, label)| {
            let weight = (NEAR_WEIGHT - index.abs_diff(group) as i32).max(1);
            interval_points(candidate, label) * weight
        })
        .sum();
    let cross: i32 = measure
        .clef(clef.other())
        .iter()
        .flat_map(|g| g.notes.iter())
        .filter_map(context_label)
        .map(|label| interval_points(candidate, label) * CROSS_CLEF_WEIGHT)
        .sum();
    same + cross
}

/// The strictly best-scoring spelling, if its score is positive.
fn best_candidate(note: &Note, group: usize, clef: Clef, measure: &LabeledMusic) -> Option<NoteLabel> {
    let mut best: Option<(NoteLabel, i32)> = None;
    let mut tied = false;
    for &candidate in labels_for_pitch_class(note.pitch_class()) {
        let score = candidate_score(candidate, group, clef, measure);
        match best {
            Some((_, top)) if score == top => tied = true,
            Some((_, top)) if score < top => {}
            _ => {
                best = Some((candidate, score));
                tied = false;
            }
        }
    }
    match best {
        Some((label, score)) if score > 0 && !tied => Some(label),
        _ => None,
    }
}

fn score_pass(measure: &mut LabeledMusic, clef: Clef) {
    for group in 0..measure.clef(clef).len() {
        for index in 0..measure.clef(clef)[group].notes.len() {
            let note = measure.clef(clef)[group].notes[index];
            if note.has_label() {
                continue;
            }
            if let Some(label) = best_candidate(&note, group, clef, measure) {
                let slot = &mut measure.clef_mut(clef)[group].notes[index];
                commit(slot, label, clef, group, "context");
            }
        }
    }
}

fn fallback_pass(groups: &mut [NoteGroup], clef: Clef) {
    for (group, note) in unlabeled_notes_mut(groups) {
        let label = labels_for_pitch_class(note.pitch_class())[0];
        commit(note, label, clef, group, "fallback");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::*;
    use crate::rhythm::RhythmicValue;
    use crate::sound::{Chord, ChordQuality, Sound};

    fn note(pitch: Pitch) -> Sound {
        Sound::Note(crate::sound::Note::new(pitch, RhythmicValue::Quarter))
    }

    fn labels(groups: &[NoteGroup]) -> Vec<NoteLabel> {
        groups
            .iter()
            .flat_map(|g| g.notes.iter())
            .map(|n| n.label.unwrap())
            .collect()
    }

    fn spell(treble: Vec<Sound>, bass: Vec<Sound>, key: Option<&Key>) -> LabeledMusic {
        let music = Music {
            treble_clef: treble,
            bass_clef: bass,
        };
        label_music(&music, key)
    }

    #[test]
    fn test_interval_points() {
        assert_eq!(interval_points(C, C_SHARP), 4);
        assert_eq!(interval_points(C, E_FLAT), 3);
        assert_eq!(interval_points(C, G), 2);
        assert_eq!(interval_points(A, G), 1);
        assert_eq!(interval_points(C, D), 0);
        assert_eq!(interval_points(C, F), 0);
    }

    #[test]
    fn test_boundary_pass_without_key() {
        // Treble floor C4 stays C; bass floor E2 becomes F♭; bass ceiling B3 stays B.
        let measure = spell(vec![note(60)], vec![note(40), note(59)], None);
        assert_eq!(labels(&measure.treble_clef), vec![C]);
        assert_eq!(labels(&measure.bass_clef), vec![F_FLAT, B]);
    }

    #[test]
    fn test_boundary_pass_defers_to_pinned_key() {
        let measure = spell(vec![note(60)], vec![note(40)], Some(&Key::C_MAJOR));
        assert_eq!(labels(&measure.treble_clef), vec![C]);
        assert_eq!(labels(&measure.bass_clef), vec![E]);
        // In C♯ major the floor C4 is B♯.
        let measure = spell(vec![note(60)], vec![], Some(&Key::C_SHARP_MAJOR));
        assert_eq!(labels(&measure.treble_clef), vec![B_SHARP]);
    }

    #[test]
    fn test_in_key_spelling() {
        let measure = spell(vec![note(66), note(61), note(70)], vec![], Some(&Key::D_MAJOR));
        // F♯ and C♯ are in D major; pitch class 10 is not and falls through.
        let spelled = labels(&measure.treble_clef);
        assert_eq!(&spelled[..2], &[F_SHARP, C_SHARP]);
        assert_eq!(spelled[2].pitch_class(), 10);
    }

    #[test]
    fn test_context_prefers_unison_letter_nearby() {
        // D then pitch class 3: D♯ shares D's letter, E♭ is a second away.
        let measure = spell(vec![note(62), note(63)], vec![], None);
        assert_eq!(labels(&measure.treble_clef), vec![D, D_SHARP]);
    }

    #[test]
    fn test_context_across_clefs() {
        // Treble B4 against a bass G2: C♭ is a fifth from G, B a sixth.
        let measure = spell(vec![note(71)], vec![note(43)], None);
        assert_eq!(labels(&measure.treble_clef), vec![C_FLAT]);
        assert_eq!(labels(&measure.bass_clef), vec![G]);
    }

    #[test]
    fn test_ties_fall_back_to_table_order() {
        let measure = spell(vec![note(61)], vec![], None);
        assert_eq!(labels(&measure.treble_clef), vec![C_SHARP]);
        let mut group = LabeledMusic::unlabeled(&Music {
            treble_clef: vec![note(61)],
            bass_clef: vec![],
        });
        assert_eq!(
            candidate_score(C_SHARP, 0, Clef::Treble, &group),
            candidate_score(D_FLAT, 0, Clef::Treble, &group)
        );
        label_measure(&mut group, None);
        assert!(group.treble_clef[0].is_fully_labeled());
    }

    #[test]
    fn test_chord_notes_spell_each_other() {
        // A♭ major triad with no key: every chord tone gets a legal spelling.
        let root = crate::sound::Note::new(68, RhythmicValue::Half);
        let chord = Sound::Chord(Chord::root_position(root, ChordQuality::Major));
        let measure = spell(vec![chord], vec![], None);
        let spelled = labels(&measure.treble_clef);
        assert_eq!(spelled.len(), 3);
        for (label, n) in spelled.iter().zip(&measure.treble_clef[0].notes) {
            assert_eq!(label.pitch_class(), n.pitch_class());
        }
    }

    #[test]
    fn test_spelling_is_idempotent() {
        let root = crate::sound::Note::new(66, RhythmicValue::Quarter);
        let chord = Sound::Chord(Chord::root_position(root, ChordQuality::Dominant7));
        let mut measure = spell(
            vec![note(60), chord, note(70), note(81)],
            vec![note(40), note(44), note(59)],
            None,
        );
        let first = measure.clone();
        label_measure(&mut measure, None);
        assert_eq!(measure, first);
        label_measure(&mut measure, Some(&Key::B_FLAT_MAJOR));
        assert_eq!(measure, first);
    }
}
