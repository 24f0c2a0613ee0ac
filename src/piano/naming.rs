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

//! Salamander sample naming.
//!
//! The sample library is a fixed, pre-recorded set of files, so every name built here must match
//! the library byte for byte.

use std::fmt;

use super::component::Component;
use super::range;
use super::velocity::VelocityLayer;

/// The extension shared by every file in the sample library.
pub const AUDIO_EXTENSION: &str = ".mp3";

/// The largest number of velocity layers the library was recorded with.
pub const MAX_VELOCITIES: u8 = 16;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// The recorded Salamander velocities (1-16 scale) used for each configured layer count.
const VELOCITIES_MAP: [&[u8]; MAX_VELOCITIES as usize] = [
    &[8],
    &[6, 12],
    &[1, 7, 15],
    &[1, 5, 10, 15],
    &[1, 4, 8, 12, 16],
    &[1, 3, 7, 10, 13, 16],
    &[1, 3, 6, 9, 11, 13, 16],
    &[1, 3, 5, 7, 9, 11, 13, 16],
    &[1, 3, 5, 7, 9, 11, 13, 15, 16],
    &[1, 2, 3, 5, 7, 9, 11, 13, 15, 16],
    &[1, 2, 3, 5, 7, 9, 11, 13, 14, 15, 16],
    &[1, 2, 3, 4, 5, 7, 9, 11, 13, 14, 15, 16],
    &[1, 2, 3, 4, 5, 7, 9, 11, 12, 13, 14, 15, 16],
    &[1, 2, 3, 4, 5, 6, 7, 9, 11, 12, 13, 14, 15, 16],
    &[1, 2, 3, 4, 5, 6, 7, 9, 10, 11, 12, 13, 14, 15, 16],
    &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16],
];

/// Pedal noise recorded while pressing the pedal.
pub const PEDAL_DOWN_SAMPLES: [&str; 2] = ["pedalD1", "pedalD2"];

/// Pedal noise recorded while lifting the pedal.
pub const PEDAL_UP_SAMPLES: [&str; 2] = ["pedalU1", "pedalU2"];

/// Returns the physical velocities recorded for the given layer count, or None if the count is
/// outside 1-16.
pub fn physical_velocities(count: u8) -> Option<&'static [u8]> {
    if count == 0 {
        return None;
    }
    VELOCITIES_MAP.get(count as usize - 1).copied()
}

/// Identifies one recording in the sample library. The identifier is the file stem.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SampleId(String);

impl SampleId {
    /// Creates a sample identifier from a raw file stem.
    pub fn new(id: impl Into<String>) -> SampleId {
        SampleId(id.into())
    }

    /// Returns the identifier as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the file name of this sample within the library.
    pub fn file_name(&self) -> String {
        format!("{}{}", self.0, AUDIO_EXTENSION)
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Renders a MIDI note as a chromatic pitch name with octave, e.g. 61 -> "C#4".
pub fn note_name(note: u8) -> String {
    let octave = note as i32 / 12 - 1;
    format!("{}{}", NOTE_NAMES[(note % 12) as usize], octave)
}

/// Parses a chromatic pitch name ("C4", "C#4", "Cs4", "Db4", "C-1") into a MIDI note.
pub fn parse_note_name(name: &str) -> Option<u8> {
    let mut chars = name.trim().chars();
    let base: i32 = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let rest = chars.as_str();
    let (accidental, octave) = if let Some(octave) = rest
        .strip_prefix('#')
        .or_else(|| rest.strip_prefix('s'))
    {
        (1, octave)
    } else if let Some(octave) = rest.strip_prefix('b') {
        (-1, octave)
    } else {
        (0, rest)
    };

    let octave: i32 = octave.parse().ok()?;
    let note = (octave + 1) * 12 + base + accidental;
    u8::try_from(note).ok().filter(|note| *note <= 127)
}

/// The pitch name of a note with sharps rendered as "s".
fn safe_note_name(note: u8) -> String {
    note_name(note).replace('#', "s")
}

/// Returns the sample identifier for a note of the given component.
///
/// Strings require a velocity layer; the other components are not velocity layered and ignore
/// it. Returns None when the library has no recording for the note, including every request for
/// pedal noise, which has no note dimension (see [`pedal_samples`]).
pub fn name_for(note: u8, component: Component, layer: Option<VelocityLayer>) -> Option<SampleId> {
    match component {
        Component::Strings => {
            if !range::is_sampled(component, note) {
                return None;
            }
            let layer = layer?;
            Some(SampleId(format!(
                "{}v{}",
                safe_note_name(note),
                layer.physical()
            )))
        }
        Component::Harmonics => range::is_sampled(component, note)
            .then(|| SampleId(format!("harmS{}", safe_note_name(note)))),
        Component::KeybedClick => range::is_sampled(component, note)
            .then(|| SampleId(format!("rel{}", note - range::LOWEST_NOTE + 1))),
        Component::PedalNoise => None,
    }
}

/// Returns the pedal noise samples for pressing (true) or lifting (false) the pedal.
pub fn pedal_samples(down: bool) -> Vec<SampleId> {
    let names = if down {
        PEDAL_DOWN_SAMPLES
    } else {
        PEDAL_UP_SAMPLES
    };
    names.iter().map(|name| SampleId::new(*name)).collect()
}
