// Rhythmic values and beat arithmetic.
//
// A beat is one unit of the time signature's denominator, so the same
// rhythmic value is worth a different number of beats in 4/4 than in 6/8
// (a quarter note is 1 beat in 4/4 and 2 beats in 6/8). Beat counts are
// `f64`, but only dyadic fractions ever occur (denominators 2, 4 and 8 divided
// by powers of two), so sums and remainders are exact.
//
// `fit_rhythmic_value` is what keeps every generated sound inside its
// measure: generators ask for a value, and get back the largest value that
// still fits in what is left of the current measure.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A count of time-signature beats.
pub type Beats = f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RhythmicValue {
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
}

impl RhythmicValue {
    /// Order tried when the requested value does not fit.
    const FALLBACK_ORDER: [RhythmicValue; 4] = [
        RhythmicValue::Whole,
        RhythmicValue::Half,
        RhythmicValue::Quarter,
        RhythmicValue::Eighth,
    ];

    /// How many of this value make a whole note.
    pub fn divisor(self) -> u32 {
        match self {
            RhythmicValue::Whole => 1,
            RhythmicValue::Half => 2,
            RhythmicValue::Quarter => 4,
            RhythmicValue::Eighth => 8,
            RhythmicValue::Sixteenth => 16,
        }
    }
}

/// Time signature as written: `top` beats per measure, `bottom` is the
/// value that gets one beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSignature {
    pub top: u32,
    pub bottom: u32,
}

impl TimeSignature {
    pub const COMMON: TimeSignature = TimeSignature { top: 4, bottom: 4 };

    pub const fn new(top: u32, bottom: u32) -> Self {
        TimeSignature { top, bottom }
    }

    /// Beats in one measure.
    pub fn measure_beats(self) -> Beats {
        self.top as Beats
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        TimeSignature::COMMON
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.top, self.bottom)
    }
}

/// Beats occupied by one undotted `value` in `time_signature`.
pub fn beat_count(time_signature: TimeSignature, value: RhythmicValue) -> Beats {
    time_signature.bottom as Beats / value.divisor() as Beats
}

/// Beats occupied by a possibly dotted value. A dot adds half again.
pub fn duration_beats(time_signature: TimeSignature, value: RhythmicValue, dotted: bool) -> Beats {
    let base = beat_count(time_signature, value);
    if dotted { base * 1.5 } else { base }
}

/// Choose the rhythmic value to emit given what has already been generated.
///
/// Returns `desired` if it fits in the beats left in the current measure;
/// otherwise the first of whole, half, quarter, eighth that fits, and eighth
/// if nothing does.
pub fn fit_rhythmic_value(
    desired: RhythmicValue,
    beats_so_far: Beats,
    time_signature: TimeSignature,
) -> RhythmicValue {
    let measure = time_signature.measure_beats();
    let remaining = measure - beats_so_far.rem_euclid(measure);
    if beat_count(time_signature, desired) <= remaining {
        return desired;
    }
    RhythmicValue::FALLBACK_ORDER
        .into_iter()
        .find(|&value| beat_count(time_signature, value) <= remaining)
        .unwrap_or(RhythmicValue::Eighth)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beat_counts_in_common_time() {
        let ts = TimeSignature::COMMON;
        assert_eq!(beat_count(ts, RhythmicValue::Whole), 4.0);
        assert_eq!(beat_count(ts, RhythmicValue::Half), 2.0);
        assert_eq!(beat_count(ts, RhythmicValue::Quarter), 1.0);
        assert_eq!(beat_count(ts, RhythmicValue::Eighth), 0.5);
        assert_eq!(beat_count(ts, RhythmicValue::Sixteenth), 0.25);
    }

    #[test]
    fn test_beat_counts_in_compound_time() {
        let ts = TimeSignature::new(6, 8);
        assert_eq!(beat_count(ts, RhythmicValue::Quarter), 2.0);
        assert_eq!(beat_count(ts, RhythmicValue::Eighth), 1.0);
        assert_eq!(duration_beats(ts, RhythmicValue::Quarter, true), 3.0);
    }

    #[test]
    fn test_fit_whole_with_one_beat_left() {
        let ts = TimeSignature::COMMON;
        assert_eq!(fit_rhythmic_value(RhythmicValue::Whole, 3.0, ts), RhythmicValue::Quarter);
    }

    #[test]
    fn test_fit_keeps_desired_when_it_fits() {
        let ts = TimeSignature::COMMON;
        assert_eq!(fit_rhythmic_value(RhythmicValue::Half, 0.0, ts), RhythmicValue::Half);
        assert_eq!(fit_rhythmic_value(RhythmicValue::Half, 2.0, ts), RhythmicValue::Half);
        // Exactly at a barline the whole next measure is available.
        assert_eq!(fit_rhythmic_value(RhythmicValue::Whole, 8.0, ts), RhythmicValue::Whole);
    }

    #[test]
    fn test_fit_falls_back_to_largest_fitting_value() {
        let ts = TimeSignature::COMMON;
        assert_eq!(fit_rhythmic_value(RhythmicValue::Whole, 1.0, ts), RhythmicValue::Half);
        assert_eq!(fit_rhythmic_value(RhythmicValue::Quarter, 3.5, ts), RhythmicValue::Eighth);
        let waltz = TimeSignature::new(3, 4);
        assert_eq!(fit_rhythmic_value(RhythmicValue::Whole, 0.0, waltz), RhythmicValue::Half);
    }

    #[test]
    fn test_fit_nothing_fits_returns_eighth() {
        let ts = TimeSignature::COMMON;
        assert_eq!(fit_rhythmic_value(RhythmicValue::Quarter, 3.75, ts), RhythmicValue::Eighth);
    }
}
