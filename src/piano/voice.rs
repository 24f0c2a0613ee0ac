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

//! Voice management for struck keys.
//!
//! Every key-down spawns a new voice, so repeated strikes of one note overlap the way they do on
//! an acoustic piano. Key-up matches the most recently struck voice of that note that is still
//! held down.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::debug;

use super::naming::SampleId;
use crate::audio::SourceId;

/// Global voice ID counter.
static NEXT_VOICE_ID: AtomicU64 = AtomicU64::new(1);

/// Where a voice is in its lifecycle. Idle voices do not exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceState {
    /// The key is held down.
    Down,
    /// The key is up but the sustain pedal holds the note.
    Sustained,
    /// Release has been triggered. Voices leave the manager in this state.
    Releasing,
}

/// One strike of a key.
#[derive(Clone, Debug)]
pub struct Voice {
    /// Unique ID for this voice.
    id: u64,
    /// The MIDI note that was struck.
    note: u8,
    /// When the key went down.
    start_time: Duration,
    /// The velocity of the strike (0.0-1.0).
    velocity: f32,
    /// The main strings sample and its playing source, if one could be started.
    main: Option<(SampleId, SourceId)>,
    /// One-shot sources started alongside the main sample (harmonics, keybed click).
    one_shots: Vec<SourceId>,
    /// The lifecycle state.
    state: VoiceState,
}

impl Voice {
    /// Creates a new voice for a key that just went down.
    pub fn new(
        note: u8,
        start_time: Duration,
        velocity: f32,
        main: Option<(SampleId, SourceId)>,
        one_shots: Vec<SourceId>,
    ) -> Self {
        Self {
            id: NEXT_VOICE_ID.fetch_add(1, Ordering::SeqCst),
            note,
            start_time,
            velocity,
            main,
            one_shots,
            state: VoiceState::Down,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn start_time(&self) -> Duration {
        self.start_time
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    /// The sample the main source is playing.
    pub fn sample(&self) -> Option<&SampleId> {
        self.main.as_ref().map(|(sample, _)| sample)
    }

    /// The source to release when this voice ends.
    pub fn main_source(&self) -> Option<SourceId> {
        self.main.as_ref().map(|(_, source)| *source)
    }

    /// Marks the voice as releasing and returns it.
    fn into_releasing(mut self) -> Voice {
        self.state = VoiceState::Releasing;
        self
    }
}

/// The outcome of a key-up.
#[derive(Debug)]
pub enum KeyUp {
    /// The voice must be released now.
    Release(Voice),
    /// The pedal is holding the voice.
    Sustained,
    /// No held voice matches the note.
    NoVoice,
}

/// Tracks the voices of one performance, oldest first.
#[derive(Default)]
pub struct VoiceManager {
    voices: Vec<Voice>,
}

impl VoiceManager {
    /// Creates a new voice manager.
    pub fn new() -> Self {
        Self { voices: Vec::new() }
    }

    /// Adds a freshly struck voice.
    pub fn add_voice(&mut self, voice: Voice) {
        debug!(
            note = voice.note,
            id = voice.id,
            one_shots = voice.one_shots.len(),
            "Voice started"
        );
        self.voices.push(voice);
    }

    /// Handles a key-up for the note. With the pedal engaged the most recent held voice becomes
    /// sustained; otherwise it is removed and handed back for release.
    pub fn key_up(&mut self, note: u8, pedal_engaged: bool) -> KeyUp {
        let Some(index) = self
            .voices
            .iter()
            .rposition(|v| v.note == note && v.state == VoiceState::Down)
        else {
            return KeyUp::NoVoice;
        };

        if pedal_engaged {
            self.voices[index].state = VoiceState::Sustained;
            KeyUp::Sustained
        } else {
            KeyUp::Release(self.voices.remove(index).into_releasing())
        }
    }

    /// Removes every sustained voice so they can be released together.
    pub fn release_sustained(&mut self) -> Vec<Voice> {
        let (sustained, held): (Vec<Voice>, Vec<Voice>) = self
            .voices
            .drain(..)
            .partition(|v| v.state == VoiceState::Sustained);
        self.voices = held;
        sustained.into_iter().map(Voice::into_releasing).collect()
    }

    /// Returns the current number of voices that have not been released.
    pub fn active_count(&self) -> usize {
        self.voices.len()
    }

    /// Returns the number of voices held only by the pedal.
    pub fn sustained_count(&self) -> usize {
        self.voices
            .iter()
            .filter(|v| v.state == VoiceState::Sustained)
            .count()
    }

    /// Clears all voices, returning them so their sources can be stopped.
    pub fn clear(&mut self) -> Vec<Voice> {
        self.voices
            .drain(..)
            .map(Voice::into_releasing)
            .collect()
    }
}

impl std::fmt::Debug for VoiceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceManager")
            .field("active_voices", &self.voices.len())
            .field("sustained_voices", &self.sustained_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_voice(note: u8, source: SourceId) -> Voice {
        Voice::new(
            note,
            Duration::from_millis(source),
            0.8,
            Some((SampleId::new(format!("note{}", note)), source)),
            Vec::new(),
        )
    }

    #[test]
    fn test_key_up_without_pedal_releases() {
        let mut manager = VoiceManager::new();
        manager.add_voice(make_voice(60, 1));
        manager.add_voice(make_voice(64, 2));

        match manager.key_up(60, false) {
            KeyUp::Release(voice) => {
                assert_eq!(voice.note(), 60);
                assert_eq!(voice.main_source(), Some(1));
                assert_eq!(voice.state(), VoiceState::Releasing);
            }
            other => panic!("expected release, got {:?}", other),
        }
        assert_eq!(manager.active_count(), 1);
    }

    #[test]
    fn test_key_up_with_pedal_sustains() {
        let mut manager = VoiceManager::new();
        manager.add_voice(make_voice(60, 1));

        assert!(matches!(manager.key_up(60, true), KeyUp::Sustained));
        assert_eq!(manager.active_count(), 1);
        assert_eq!(manager.sustained_count(), 1);

        // The sustained voice is no longer held, so a second key-up finds nothing.
        assert!(matches!(manager.key_up(60, true), KeyUp::NoVoice));

        let released = manager.release_sustained();
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].state(), VoiceState::Releasing);
        assert_eq!(manager.active_count(), 0);
    }

    #[test]
    fn test_retrigger_matches_most_recent() {
        let mut manager = VoiceManager::new();
        manager.add_voice(make_voice(60, 1));
        manager.add_voice(make_voice(60, 2));
        assert_eq!(manager.active_count(), 2);

        match manager.key_up(60, false) {
            KeyUp::Release(voice) => assert_eq!(voice.main_source(), Some(2)),
            other => panic!("expected release, got {:?}", other),
        }
        match manager.key_up(60, false) {
            KeyUp::Release(voice) => assert_eq!(voice.main_source(), Some(1)),
            other => panic!("expected release, got {:?}", other),
        }
        assert!(matches!(manager.key_up(60, false), KeyUp::NoVoice));
    }

    #[test]
    fn test_strike_while_sustained() {
        let mut manager = VoiceManager::new();
        manager.add_voice(make_voice(60, 1));
        assert!(matches!(manager.key_up(60, true), KeyUp::Sustained));
        manager.add_voice(make_voice(60, 2));

        // Releasing the pedal only frees the sustained strike.
        let released = manager.release_sustained();
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].main_source(), Some(1));
        assert_eq!(manager.active_count(), 1);
        match manager.key_up(60, false) {
            KeyUp::Release(voice) => assert_eq!(voice.main_source(), Some(2)),
            other => panic!("expected release, got {:?}", other),
        }
    }

    #[test]
    fn test_clear() {
        let mut manager = VoiceManager::new();
        manager.add_voice(make_voice(60, 1));
        manager.add_voice(make_voice(62, 2));
        assert_eq!(manager.clear().len(), 2);
        assert_eq!(manager.active_count(), 0);
    }
}
