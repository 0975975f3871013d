// Pattern generators: short runs of notes and chords for one clef.
//
// The stream asks for more material one pattern at a time. Each pattern is a
// small figure (a stepwise run, a repeated chord, an octave in the bass) that
// continues from the last pitch the clef emitted and stays inside the clef's
// bounds. Every sound's rhythm is passed through `fit_rhythmic_value` with the
// running beat count, so no sound ever crosses a barline.
//
// Melodic movement happens on a scale ladder: the in-key pitches within the
// clef's bounds (every semitone when no key is pinned). A move is a random
// non-zero number of ladder steps no larger than the configured adjacent note
// distance. Moves that would leave the ladder are reflected back, then
// clamped.
//
// Which patterns a clef may use is decided once per stream by `eligible`,
// from the config flags (treble) or the adjacent note distance (bass). A
// chord pattern that finds no chord to play returns an empty run and the
// stream simply picks again.

use crate::config::PracticeConfig;
use crate::key::{Key, nearest_index, scale_pitches};
use crate::pitch::{Pitch, PitchClass, step_pitch, to_pitch};
use crate::rhythm::{Beats, RhythmicValue, fit_rhythmic_value};
use crate::sound::{BassFigure, Bounds, Chord, ChordQuality, Clef, FigureKind, Note, Sound};
use log::warn;
use sightread_prng::PracticeRng;

/// Retries before a scale walk gives up on random steps.
const MAX_STEP_ATTEMPTS: usize = 16;

/// Rhythm palette for melodic runs when varied rhythms are allowed.
const RUN_RHYTHMS: [(RhythmicValue, u32); 3] = [
    (RhythmicValue::Half, 1),
    (RhythmicValue::Quarter, 3),
    (RhythmicValue::Eighth, 2),
];

/// Rhythm palette for chords and bass figures.
const HELD_RHYTHMS: [(RhythmicValue, u32); 3] = [
    (RhythmicValue::Whole, 1),
    (RhythmicValue::Half, 2),
    (RhythmicValue::Quarter, 2),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pattern {
    // Treble.
    NoteFlurry,
    MirroredNoteFlurry,
    RepeatedNoteFlurry,
    RepeatedChord,
    ChordThenBroken,
    BrokenThenChord,
    // Bass.
    SingleNote,
    Octave,
    OctaveWithFifth,
    OctaveWithDelayedFifth,
    RootWithDelayedFifthEighth,
}

impl Pattern {
    pub fn clef(self) -> Clef {
        match self {
            Pattern::NoteFlurry
            | Pattern::MirroredNoteFlurry
            | Pattern::RepeatedNoteFlurry
            | Pattern::RepeatedChord
            | Pattern::ChordThenBroken
            | Pattern::BrokenThenChord => Clef::Treble,
            Pattern::SingleNote
            | Pattern::Octave
            | Pattern::OctaveWithFifth
            | Pattern::OctaveWithDelayedFifth
            | Pattern::RootWithDelayedFifthEighth => Clef::Bass,
        }
    }

    pub fn uses_chords(self) -> bool {
        matches!(
            self,
            Pattern::RepeatedChord | Pattern::ChordThenBroken | Pattern::BrokenThenChord
        )
    }

    /// The patterns a clef may draw from. `chords_available` is false when
    /// the key and chord filter leave nothing to play, which removes the
    /// chord patterns altogether.
    pub fn eligible(clef: Clef, config: &PracticeConfig, chords_available: bool) -> Vec<Pattern> {
        let mut patterns = Vec::new();
        match clef {
            Clef::Treble => {
                if config.practice_single_notes {
                    patterns.extend([
                        Pattern::NoteFlurry,
                        Pattern::MirroredNoteFlurry,
                        Pattern::RepeatedNoteFlurry,
                    ]);
                }
                if config.practice_chords {
                    patterns.push(Pattern::RepeatedChord);
                    if config.include_broken_chords {
                        patterns.extend([Pattern::ChordThenBroken, Pattern::BrokenThenChord]);
                    }
                }
            }
            Clef::Bass => {
                let distance = config.adjacent_note_distance;
                patterns.push(Pattern::SingleNote);
                if distance >= 3 {
                    patterns.push(Pattern::Octave);
                }
                if distance >= 5 {
                    patterns.push(Pattern::OctaveWithFifth);
                }
                if distance >= 7 {
                    patterns.extend([
                        Pattern::OctaveWithDelayedFifth,
                        Pattern::RootWithDelayedFifthEighth,
                    ]);
                }
            }
        }
        if !chords_available {
            patterns.retain(|p| !p.uses_chords());
        }
        patterns
    }
}

/// What a generator knows about the clef it is extending.
#[derive(Debug, Clone, Copy)]
pub struct GenerationContext<'a> {
    pub key: Option<&'a Key>,
    pub config: &'a PracticeConfig,
    pub clef: Clef,
    pub bounds: Bounds,
    /// Qualities from `allowed_chord_qualities` for this key and config.
    pub chord_qualities: &'a [ChordQuality],
    /// Beats already buffered for this clef, counted from a barline.
    pub beats_so_far: Beats,
    /// Continuity anchor of the last sound emitted in this clef.
    pub last_pitch: Option<Pitch>,
    /// The treble sound sounding where this run starts (bass only).
    pub accompaniment: Option<Sound>,
}

/// A generated run and the beats it occupies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Run {
    pub sounds: Vec<Sound>,
    pub beat_count: Beats,
    /// Where the next run of this clef continues its walk. Usually the
    /// last sound's anchor; an octave figure continues from its upper note.
    pub continue_from: Option<Pitch>,
}

impl Run {
    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }
}

/// Generate one run of `pattern`. The run is empty only when a chord
/// pattern could not find an eligible chord.
pub fn generate(pattern: Pattern, ctx: &GenerationContext<'_>, rng: &mut PracticeRng) -> Run {
    let mut builder = RunBuilder::new(ctx, rng);
    match pattern {
        Pattern::NoteFlurry => builder.note_flurry(),
        Pattern::MirroredNoteFlurry => builder.mirrored_note_flurry(),
        Pattern::RepeatedNoteFlurry => builder.repeated_note_flurry(),
        Pattern::RepeatedChord => builder.repeated_chord(),
        Pattern::ChordThenBroken => builder.chord_and_broken(true),
        Pattern::BrokenThenChord => builder.chord_and_broken(false),
        Pattern::SingleNote => builder.single_note(),
        Pattern::Octave => builder.octave(FigureKind::Octave),
        Pattern::OctaveWithFifth => builder.octave(FigureKind::OctaveFifth),
        Pattern::OctaveWithDelayedFifth => builder.octave_with_delayed_fifth(),
        Pattern::RootWithDelayedFifthEighth => builder.root_with_delayed_fifth_eighth(),
    }
    builder.finish()
}

/// Pick a chord for the current key and filter, or `None` when nothing is
/// eligible. With a key pinned the chord is one of the key's diatonic
/// chords; otherwise any root with any allowed quality.
pub fn random_chord(
    key: Option<&Key>,
    qualities: &[ChordQuality],
    include_inversions: bool,
    rng: &mut PracticeRng,
) -> Option<Chord> {
    let chord = match key {
        Some(key) => {
            let chords: Vec<Chord> = key
                .chords()
                .into_iter()
                .filter(|c| qualities.contains(&c.quality))
                .collect();
            *rng.choose(&chords)?
        }
        None => {
            let quality = *rng.choose(qualities)?;
            let root_class = rng.range_usize(0, 12) as PitchClass;
            Chord::root_position(
                Note::new(to_pitch(4, root_class), RhythmicValue::Quarter),
                quality,
            )
        }
    };
    if include_inversions {
        let inversion = rng.range_usize_inclusive(0, chord.quality.max_inversion() as usize);
        Some(chord.with_inversion(inversion as u8))
    } else {
        Some(chord)
    }
}

/// Whether `random_chord` can ever return a chord for this key and filter.
pub fn chords_available(key: Option<&Key>, qualities: &[ChordQuality]) -> bool {
    match key {
        Some(key) => key.chords().iter().any(|c| qualities.contains(&c.quality)),
        None => !qualities.is_empty(),
    }
}

/// One walk step along `ladder` from the rung nearest `cursor` (a random
/// rung when there is no cursor): a non-zero move of at most `distance`
/// rungs. `None` only for an empty ladder.
fn step_along(
    ladder: &[Pitch],
    cursor: Option<Pitch>,
    distance: u32,
    rng: &mut PracticeRng,
) -> Option<Pitch> {
    let from = match cursor {
        Some(pitch) => nearest_index(ladder, pitch),
        None => rng.range_usize(0, ladder.len().max(1)),
    };
    if ladder.len() <= 1 {
        return ladder.first().copied();
    }
    let distance = distance.max(1) as i32;
    for _ in 0..MAX_STEP_ATTEMPTS {
        let mut steps = rng.range_i32_inclusive(1, distance);
        if rng.random_bool(0.5) {
            steps = -steps;
        }
        let to = reflect_step(ladder.len(), from, steps);
        if to != from {
            return Some(ladder[to]);
        }
    }
    let to = if from + 1 < ladder.len() { from + 1 } else { from - 1 };
    Some(ladder[to])
}

/// Move `steps` along `ladder` from index `from`, reflecting off the ends
/// and clamping if the reflection also leaves the ladder.
fn reflect_step(ladder_len: usize, from: usize, steps: i32) -> usize {
    let last = ladder_len as i64 - 1;
    let forward = from as i64 + steps as i64;
    let target = if (0..=last).contains(&forward) {
        forward
    } else {
        from as i64 - steps as i64
    };
    target.clamp(0, last) as usize
}

/// Accumulates sounds for one run, tracking beats and the melodic cursor.
struct RunBuilder<'c, 'a, 'r> {
    ctx: &'c GenerationContext<'a>,
    rng: &'r mut PracticeRng,
    ladder: Vec<Pitch>,
    cursor: Option<Pitch>,
    run: Run,
}

impl<'c, 'a, 'r> RunBuilder<'c, 'a, 'r> {
    fn new(ctx: &'c GenerationContext<'a>, rng: &'r mut PracticeRng) -> Self {
        let ladder = scale_pitches(ctx.key, ctx.bounds);
        RunBuilder {
            ctx,
            rng,
            ladder,
            cursor: ctx.last_pitch,
            run: Run::default(),
        }
    }

    fn finish(mut self) -> Run {
        self.run.continue_from = self.cursor;
        self.run
    }

    fn beats_so_far(&self) -> Beats {
        self.ctx.beats_so_far + self.run.beat_count
    }

    /// The value to ask for: a quarter unless varied rhythms are on.
    fn desired_rhythm(&mut self, palette: &[(RhythmicValue, u32)]) -> RhythmicValue {
        if !self.ctx.config.allow_rhythmic_values {
            return RhythmicValue::Quarter;
        }
        self.rng
            .choose_weighted(palette)
            .copied()
            .unwrap_or(RhythmicValue::Quarter)
    }

    fn fitted(&self, desired: RhythmicValue) -> RhythmicValue {
        fit_rhythmic_value(desired, self.beats_so_far(), self.ctx.config.time_signature)
    }

    fn push(&mut self, sound: Sound) {
        let ts = self.ctx.config.time_signature;
        self.run.beat_count += sound.beat_count(ts);
        self.cursor = Some(sound.anchor_pitch(self.ctx.clef));
        self.run.sounds.push(sound);
    }

    fn push_note(&mut self, pitch: Pitch, desired: RhythmicValue) {
        let rhythm = self.fitted(desired);
        self.push(Sound::Note(Note::new(pitch, rhythm)));
    }

    fn push_sound(&mut self, sound: Sound, desired: RhythmicValue) {
        let rhythm = self.fitted(desired);
        self.push(sound.with_rhythm(rhythm));
    }

    // -- Scale walking ------------------------------------------------------

    /// The next pitch of a continuous walk: a non-zero move of at most the
    /// adjacent note distance along the ladder.
    fn step(&mut self) -> Pitch {
        let distance = self.ctx.config.adjacent_note_distance;
        step_along(&self.ladder, self.cursor, distance, self.rng)
            .unwrap_or(self.ctx.bounds.lower)
    }

    /// Walk `count` pitches from the cursor. Only the cursor moves; nothing
    /// is pushed.
    fn walk(&mut self, count: usize) -> Vec<Pitch> {
        let saved = self.cursor;
        let mut pitches = Vec::with_capacity(count);
        for _ in 0..count {
            let pitch = self.step();
            self.cursor = Some(pitch);
            pitches.push(pitch);
        }
        self.cursor = saved;
        pitches
    }

    fn ladder_distance(&self, a: Pitch, b: Pitch) -> usize {
        nearest_index(&self.ladder, a).abs_diff(nearest_index(&self.ladder, b))
    }

    fn push_run(&mut self, pitches: &[Pitch]) {
        for &pitch in pitches {
            let desired = self.desired_rhythm(&RUN_RHYTHMS);
            self.push_note(pitch, desired);
        }
    }

    // -- Treble patterns ----------------------------------------------------

    fn note_flurry(&mut self) {
        let count = self.rng.range_usize_inclusive(2, 8);
        let pitches = self.walk(count);
        self.push_run(&pitches);
    }

    /// A flurry and then its reverse, without repeating the turning note.
    fn mirrored_note_flurry(&mut self) {
        let count = self.rng.range_usize_inclusive(2, 5);
        let mut pitches = self.walk(count);
        let back: Vec<Pitch> = pitches.iter().rev().skip(1).copied().collect();
        pitches.extend(back);
        self.push_run(&pitches);
    }

    /// A flurry played twice. The flurry is cut to the longest prefix whose
    /// last note can step back to its first within the allowed distance, so
    /// the repeat is as smooth as the rest of the walk.
    fn repeated_note_flurry(&mut self) {
        let count = self.rng.range_usize_inclusive(2, 4);
        let mut pitches = self.walk(count);
        let distance = self.ctx.config.adjacent_note_distance.max(1) as usize;
        let first = pitches[0];
        let len = (2..=pitches.len())
            .rev()
            .find(|&len| {
                let d = self.ladder_distance(pitches[len - 1], first);
                (1..=distance).contains(&d)
            })
            .unwrap_or(1);
        pitches.truncate(len);
        let repeat = pitches.clone();
        pitches.extend(repeat);
        self.push_run(&pitches);
    }

    /// A freshly chosen chord placed near the cursor, repeated 1-4 times.
    fn repeated_chord(&mut self) {
        let Some(chord) = self.placed_chord() else {
            return;
        };
        let repeats = self.rng.range_usize_inclusive(1, 4);
        let desired = self.desired_rhythm(&HELD_RHYTHMS);
        for _ in 0..repeats {
            self.push_sound(chord, desired);
        }
    }

    /// A chord with its notes also played one at a time, lowest first,
    /// either after the chord or leading into it.
    fn chord_and_broken(&mut self, chord_first: bool) {
        let Some(chord) = self.placed_chord() else {
            return;
        };
        let mut broken: Vec<Pitch> = chord.notes().iter().map(|n| n.pitch).collect();
        broken.sort_unstable();
        let held = self.desired_rhythm(&HELD_RHYTHMS);
        if chord_first {
            self.push_sound(chord, held);
            self.push_run(&broken);
        } else {
            self.push_run(&broken);
            self.push_sound(chord, held);
        }
    }

    /// Choose a chord and voice it inside the bounds, as close to the cursor
    /// as possible.
    fn placed_chord(&mut self) -> Option<Sound> {
        let chord = random_chord(
            self.ctx.key,
            self.ctx.chord_qualities,
            self.ctx.config.include_inverted_chords,
            self.rng,
        )?;
        let target = match self.cursor {
            Some(pitch) => pitch,
            None => self.step(),
        };
        Some(place_chord(chord, self.ctx.clef, self.ctx.bounds, target))
    }

    // -- Bass patterns ------------------------------------------------------

    /// The simultaneous treble pitch class, brought down into the bass range
    /// near the previous bass note.
    fn single_note(&mut self) {
        let desired = match self.ctx.accompaniment {
            Some(sound) if self.ctx.config.allow_rhythmic_values => sound.rhythmic_value(),
            _ => self.desired_rhythm(&HELD_RHYTHMS),
        };
        let pitch = match self.ctx.accompaniment {
            Some(sound) => {
                let target = self.cursor.unwrap_or(self.ctx.bounds.upper);
                let class = sound.anchor_pitch(Clef::Bass) % 12;
                nearest_in_bounds(class, self.ctx.bounds, target)
                    .unwrap_or_else(|| self.step())
            }
            None => self.step(),
        };
        self.push_note(pitch, desired);
    }

    /// The walk's next root with the note an octave below (and the fifth
    /// above that, for `OctaveFifth`). Collapses to the root alone when the
    /// lower octave is out of range.
    fn octave(&mut self, kind: FigureKind) {
        let root = self.octave_root();
        let desired = self.desired_rhythm(&HELD_RHYTHMS);
        self.push_octave(root, kind, desired);
    }

    /// The next root for an octave figure. The walk runs over the rungs
    /// whose lower octave is also in bounds, and only falls back to the
    /// whole ladder when there are none.
    fn octave_root(&mut self) -> Pitch {
        let bounds = self.ctx.bounds;
        let upper = Bounds {
            lower: bounds.lower.saturating_add(12),
            upper: bounds.upper,
        };
        let ladder = if upper.lower <= upper.upper {
            scale_pitches(self.ctx.key, upper)
        } else {
            Vec::new()
        };
        let distance = self.ctx.config.adjacent_note_distance;
        match step_along(&ladder, self.cursor, distance, self.rng) {
            Some(root) => root,
            None => self.step(),
        }
    }

    /// Push the figure under `root`, then keep walking from `root` so the
    /// next figure has room below it.
    fn push_octave(&mut self, root: Pitch, kind: FigureKind, desired: RhythmicValue) {
        match self.low_octave(root) {
            Some(low) => {
                let figure = BassFigure::new(Note::new(low, desired), kind);
                self.push_sound(Sound::Figure(figure), desired);
            }
            None => self.push_note(root, desired),
        }
        self.cursor = Some(root);
    }

    fn low_octave(&self, root: Pitch) -> Option<Pitch> {
        let low = root.checked_sub(12)?;
        self.ctx.bounds.contains(low).then_some(low)
    }

    /// Octave held for a half note, then its fifth.
    fn octave_with_delayed_fifth(&mut self) {
        let root = self.octave_root();
        let (held, after) = if self.ctx.config.allow_rhythmic_values {
            (RhythmicValue::Half, RhythmicValue::Half)
        } else {
            (RhythmicValue::Quarter, RhythmicValue::Quarter)
        };
        let base = self.low_octave(root).unwrap_or(root);
        self.push_octave(root, FigureKind::Octave, held);
        let fifth = fifth_in_bounds(base, self.ctx.bounds);
        self.push_note(fifth, after);
        self.cursor = Some(root);
    }

    /// Root and fifth alternating in eighths.
    fn root_with_delayed_fifth_eighth(&mut self) {
        let root = self.step();
        let base = self.low_octave(root).unwrap_or(root);
        let fifth = fifth_in_bounds(base, self.ctx.bounds);
        let desired = if self.ctx.config.allow_rhythmic_values {
            RhythmicValue::Eighth
        } else {
            RhythmicValue::Quarter
        };
        for pitch in [base, fifth, base, fifth] {
            self.push_note(pitch, desired);
        }
    }
}

/// The pitch of class `class` inside `bounds` closest to `target`.
fn nearest_in_bounds(class: PitchClass, bounds: Bounds, target: Pitch) -> Option<Pitch> {
    (bounds.lower..=bounds.upper)
        .filter(|p| p % 12 == class % 12)
        .min_by_key(|p| p.abs_diff(target))
}

/// A perfect fifth above `base`, or below if above is out of range, or
/// `base` itself if neither fits.
fn fifth_in_bounds(base: Pitch, bounds: Bounds) -> Pitch {
    [step_pitch(base, 7), step_pitch(base, -5)]
        .into_iter()
        .find(|&p| bounds.contains(p))
        .unwrap_or(base)
}

/// Voice `chord` inside `bounds`, moving it by octaves and trying other
/// inversions if needed, preferring the voicing whose anchor is nearest
/// `target`. As a last resort the chord is reduced to its root, folded
/// into range.
pub fn place_chord(chord: Chord, clef: Clef, bounds: Bounds, target: Pitch) -> Sound {
    let max_inversion = chord.quality.max_inversion();
    let inversions = std::iter::once(chord.inversion())
        .chain((0..=max_inversion).filter(|&i| i != chord.inversion()));
    for inversion in inversions {
        let voiced = chord.with_inversion(inversion);
        let best = (-4..=4)
            .map(|octaves| Sound::Chord(voiced.transposed(octaves * 12)))
            .filter(|s| s.notes().iter().all(|n| bounds.contains(n.pitch)))
            .min_by_key(|s| s.anchor_pitch(clef).abs_diff(target));
        if let Some(sound) = best {
            return sound;
        }
    }
    warn!(
        "chord {} does not fit in the {clef} clef, keeping only its root",
        chord.symbol(None)
    );
    let root = nearest_in_bounds(chord.root.pitch_class(), bounds, target).unwrap_or(bounds.lower);
    Sound::Note(Note::new(root, chord.rhythmic_value()))
}
