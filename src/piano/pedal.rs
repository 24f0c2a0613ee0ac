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

//! Sustain pedal state.

use std::time::Duration;

/// The MIDI controller number of the sustain pedal.
pub const SUSTAIN_CONTROLLER: u8 = 64;

/// Normalized pedal values at or above this engage the pedal.
pub const ENGAGE_THRESHOLD: f32 = 0.5;

/// The effect of a pedal write on the engaged flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PedalTransition {
    /// The pedal went down.
    Engaged,
    /// The pedal came up.
    Released,
    /// The engaged flag did not change.
    Unchanged,
}

/// Tracks the continuous sustain pedal value and whether it is engaged.
#[derive(Clone, Debug, Default)]
pub struct PedalController {
    value: u8,
    engaged: bool,
    changed_at: Duration,
}

impl PedalController {
    /// Creates a disengaged pedal.
    pub fn new() -> PedalController {
        PedalController::default()
    }

    /// Stores a raw controller value (0-127) and reports the engaged edge, if any.
    pub fn set_value(&mut self, raw: u8, time: Duration) -> PedalTransition {
        self.value = raw.min(127);
        let engaged = self.normalized() >= ENGAGE_THRESHOLD;
        if engaged == self.engaged {
            return PedalTransition::Unchanged;
        }

        self.engaged = engaged;
        self.changed_at = time;
        if engaged {
            PedalTransition::Engaged
        } else {
            PedalTransition::Released
        }
    }

    /// The raw value (0-127).
    pub fn value(&self) -> u8 {
        self.value
    }

    /// The value normalized to 0.0-1.0.
    pub fn normalized(&self) -> f32 {
        self.value as f32 / 127.0
    }

    /// Returns true while the pedal is held down.
    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    /// When the engaged flag last changed.
    pub fn changed_at(&self) -> Duration {
        self.changed_at
    }

    /// Returns the pedal to its disengaged resting state.
    pub fn reset(&mut self) {
        *self = PedalController::default();
    }
}
