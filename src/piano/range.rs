// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Note range math for the sampled components.

use super::component::Component;

/// The lowest key of an 88-key piano (A0).
pub const LOWEST_NOTE: u8 = 21;

/// The highest key of an 88-key piano (C8).
pub const HIGHEST_NOTE: u8 = 108;

/// Notes with a strings recording: A0, A#0, B0, then every minor third from C1 to C8.
const STRINGS_ANCHORS: [u8; 30] = [
    21, 24, 27, 30, 33, 36, 39, 42, 45, 48, 51, 54, 57, 60, 63, 66, 69, 72, 75, 78, 81, 84, 87, 90,
    93, 96, 99, 102, 105, 108,
];

/// Notes with a harmonics recording. A subset of the strings anchors up to D#6.
const HARMONICS_ANCHORS: [u8; 23] = [
    21, 24, 27, 30, 33, 36, 39, 42, 45, 48, 51, 54, 57, 60, 63, 66, 69, 72, 75, 78, 81, 84, 87,
];

/// An inclusive range of MIDI notes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoteRange {
    min: u8,
    max: u8,
}

impl NoteRange {
    /// The full 88-key range.
    pub const PIANO: NoteRange = NoteRange {
        min: LOWEST_NOTE,
        max: HIGHEST_NOTE,
    };

    /// Creates a note range. Returns None if min > max or max is not a MIDI note.
    pub fn new(min: u8, max: u8) -> Option<NoteRange> {
        (min <= max && max <= 127).then_some(NoteRange { min, max })
    }

    /// Returns the range spanning the given octaves of a keyboard whose octaves start on C.
    ///
    /// `from` must be 0-7 and `to` 1-8. Octave 0 starts at A0, the lowest piano key.
    pub fn for_octaves(from: u8, to: u8) -> Option<NoteRange> {
        if from > 7 || !(1..=8).contains(&to) {
            return None;
        }
        let (min, max) = min_max_notes_for_octaves(from, to);
        NoteRange::new(min, max)
    }

    pub fn min(&self) -> u8 {
        self.min
    }

    pub fn max(&self) -> u8 {
        self.max
    }

    /// Returns true if the note is inside the range.
    pub fn contains(&self, note: u8) -> bool {
        self.min <= note && note <= self.max
    }
}

/// Converts an octave span into its (min, max) notes.
pub fn min_max_notes_for_octaves(from: u8, to: u8) -> (u8, u8) {
    let min = if from == 0 {
        LOWEST_NOTE
    } else {
        (from + 1) * 12
    };
    (min, (to + 1) * 12)
}

/// Returns the recorded notes for a component. Pedal noise and keybed clicks have no anchor list.
pub fn anchors(component: Component) -> &'static [u8] {
    match component {
        Component::Strings => &STRINGS_ANCHORS,
        Component::Harmonics => &HARMONICS_ANCHORS,
        Component::KeybedClick | Component::PedalNoise => &[],
    }
}

/// Returns true if the library holds a recording of this exact note for the component.
pub fn is_sampled(component: Component, note: u8) -> bool {
    match component {
        Component::KeybedClick => (LOWEST_NOTE..=HIGHEST_NOTE).contains(&note),
        Component::PedalNoise => false,
        _ => anchors(component).binary_search(&note).is_ok(),
    }
}

/// Returns the recorded notes of a component within the range, ascending.
pub fn notes_in_range(component: Component, range: NoteRange) -> Vec<u8> {
    match component {
        Component::KeybedClick => {
            let min = range.min().max(LOWEST_NOTE);
            let max = range.max().min(HIGHEST_NOTE);
            (min..=max).collect()
        }
        _ => anchors(component)
            .iter()
            .copied()
            .filter(|note| range.contains(*note))
            .collect(),
    }
}

/// Coarse check for whether a note lies between the lowest and highest harmonics recordings.
pub fn is_within_harmonics_range(note: u8) -> bool {
    HARMONICS_ANCHORS[0] <= note && note <= HARMONICS_ANCHORS[HARMONICS_ANCHORS.len() - 1]
}

/// Returns the candidate closest to the note, preferring the lower candidate on a tie.
pub fn nearest_note(candidates: &[u8], note: u8) -> Option<u8> {
    candidates
        .iter()
        .copied()
        .min_by_key(|candidate| (candidate.abs_diff(note), *candidate))
}

/// The playback rate that shifts a recording at `anchor` to sound at `note`.
pub fn pitch_ratio(note: u8, anchor: u8) -> f32 {
    2f32.powf((note as f32 - anchor as f32) / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_octave_span() {
        assert_eq!(min_max_notes_for_octaves(4, 5), (60, 72));
        assert_eq!(min_max_notes_for_octaves(0, 8), (21, 108));
        assert_eq!(NoteRange::for_octaves(4, 5), NoteRange::new(60, 72));
        assert_eq!(NoteRange::for_octaves(0, 8), Some(NoteRange::PIANO));
        assert_eq!(NoteRange::for_octaves(8, 8), None);
        assert_eq!(NoteRange::for_octaves(0, 0), None);
        assert_eq!(NoteRange::for_octaves(0, 9), None);
        // Spans that collapse below their minimum are rejected.
        assert_eq!(NoteRange::for_octaves(7, 1), None);
    }

    #[test]
    fn test_octave_span_monotonic() {
        for from in 0..=7 {
            let mut last_max = 0;
            for to in 1..=8 {
                let (min, max) = min_max_notes_for_octaves(from, to);
                assert!(max >= last_max, "max decreased at from={} to={}", from, to);
                last_max = max;
                if from == 0 {
                    assert_eq!(min, 21);
                }
            }
        }
    }

    #[test]
    fn test_notes_in_range() {
        let range = NoteRange::new(60, 72).unwrap();
        assert_eq!(
            notes_in_range(Component::Strings, range),
            vec![60, 63, 66, 69, 72]
        );
        assert_eq!(
            notes_in_range(Component::Harmonics, NoteRange::new(80, 100).unwrap()),
            vec![81, 84, 87]
        );
        assert_eq!(
            notes_in_range(Component::KeybedClick, NoteRange::new(0, 23).unwrap()),
            vec![21, 22, 23]
        );
        assert!(notes_in_range(Component::PedalNoise, NoteRange::PIANO).is_empty());
        assert!(notes_in_range(Component::Strings, NoteRange::new(61, 62).unwrap()).is_empty());
    }

    #[test]
    fn test_notes_in_range_is_ascending_subset() {
        for component in [Component::Strings, Component::Harmonics] {
            for min in (0..=127).step_by(7) {
                for max in (min..=127).step_by(5) {
                    let notes = notes_in_range(component, NoteRange::new(min, max).unwrap());
                    assert!(notes.windows(2).all(|w| w[0] < w[1]));
                    assert!(notes.iter().all(|note| anchors(component).contains(note)));
                }
            }
        }
    }

    #[test]
    fn test_harmonics_range_is_coarse() {
        assert!(is_within_harmonics_range(21));
        // Not an anchor, but inside the range.
        assert!(is_within_harmonics_range(22));
        assert!(is_within_harmonics_range(87));
        assert!(!is_within_harmonics_range(88));
        assert!(!is_within_harmonics_range(20));
    }

    #[test]
    fn test_nearest_note() {
        let anchors = [60, 63, 66];
        assert_eq!(nearest_note(&anchors, 60), Some(60));
        assert_eq!(nearest_note(&anchors, 62), Some(63));
        assert_eq!(nearest_note(&anchors, 61), Some(60));
        assert_eq!(nearest_note(&anchors, 90), Some(66));
        assert_eq!(nearest_note(&[], 60), None);
        // Equidistant between 60 and 64.
        assert_eq!(nearest_note(&[60, 64], 62), Some(60));
    }

    #[test]
    fn test_pitch_ratio() {
        assert_eq!(pitch_ratio(60, 60), 1.0);
        assert!((pitch_ratio(72, 60) - 2.0).abs() < 1e-6);
        assert!((pitch_ratio(59, 60) - 0.943_874_3).abs() < 1e-5);
    }
}
