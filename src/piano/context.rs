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
use std::time::Duration;

use super::pedal::PedalController;
use super::voice::VoiceManager;

/// The mutable state of one performance: held voices, the sustain pedal and the transport
/// position. A timeline owns one for its lifetime; live previews keep their own.
#[derive(Debug, Default)]
pub struct PlaybackContext {
    voices: VoiceManager,
    pedal: PedalController,
    position: Duration,
}

impl PlaybackContext {
    /// Creates an idle context at position zero.
    pub fn new() -> PlaybackContext {
        PlaybackContext::default()
    }

    pub fn voices(&self) -> &VoiceManager {
        &self.voices
    }

    pub fn voices_mut(&mut self) -> &mut VoiceManager {
        &mut self.voices
    }

    pub fn pedal(&self) -> &PedalController {
        &self.pedal
    }

    pub fn pedal_mut(&mut self) -> &mut PedalController {
        &mut self.pedal
    }

    /// The transport position reached so far.
    pub fn position(&self) -> Duration {
        self.position
    }

    /// Moves the transport position forward. It never moves backwards.
    pub fn advance_to(&mut self, position: Duration) {
        self.position = self.position.max(position);
    }

    /// Drops all voices, lifts the pedal and rewinds the transport.
    pub fn reset(&mut self) {
        self.voices.clear();
        self.pedal.reset();
        self.position = Duration::ZERO;
    }
}
