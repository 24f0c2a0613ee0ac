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

//! The sampled piano: which recording plays for a key, pedal and voice bookkeeping, and the
//! aggregate that drives an audio backend.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, span, warn, Level};

use crate::audio::{AudioBackend, SourceId, Trigger};
use crate::config::{ConfigError, PianoConfig};
use crate::samples::{BufferStore, FileDecoder, SampleDecoder, SampleError};

mod component;
mod context;
mod naming;
mod pedal;
mod random;
mod range;
mod velocity;
mod voice;

pub use self::component::{
    Component, Harmonics, Keybed, Loadable, PedalNoise, Strike, Strings, Triggerable,
};
pub use self::context::PlaybackContext;
pub use self::naming::{
    name_for, note_name, parse_note_name, pedal_samples, physical_velocities, SampleId,
    AUDIO_EXTENSION, MAX_VELOCITIES,
};
pub use self::pedal::{PedalController, PedalTransition, SUSTAIN_CONTROLLER};
pub use self::random::{FixedRandomizer, Randomizer, SeededRandomizer};
pub use self::range::{
    is_within_harmonics_range, min_max_notes_for_octaves, notes_in_range, NoteRange,
    HIGHEST_NOTE, LOWEST_NOTE,
};
pub use self::velocity::{VelocityLayer, VelocitySelector};
pub use self::voice::{KeyUp, Voice, VoiceManager, VoiceState};

/// The whole instrument. Every component is loaded from one sample library and plays through one
/// backend. Voice and pedal state lives in a [`PlaybackContext`] supplied by the caller.
pub struct Piano {
    strings: Strings,
    harmonics: Harmonics,
    keybed: Keybed,
    pedal: PedalNoise,
    range: NoteRange,
    store: BufferStore,
    decoder: Arc<dyn SampleDecoder>,
    samples: PathBuf,
    backend: Box<dyn AudioBackend>,
    randomizer: Box<dyn Randomizer>,
}

impl Piano {
    /// Builds a piano from a configuration. The configuration is validated before anything else
    /// happens; nothing is loaded yet.
    pub fn new(
        config: &PianoConfig,
        decoder: Arc<dyn SampleDecoder>,
        backend: Box<dyn AudioBackend>,
        randomizer: Box<dyn Randomizer>,
    ) -> Result<Piano, ConfigError> {
        config.validate()?;
        let range = config.note_range()?;
        let selector = VelocitySelector::new(config.velocities()).ok_or_else(|| {
            ConfigError::Invalid(format!("unsupported velocities {}", config.velocities()))
        })?;

        let mut strings = Strings::new(range, selector, config.gain(Component::Strings));
        let mut harmonics = Harmonics::new(range, config.gain(Component::Harmonics));
        let mut keybed = Keybed::new(range, config.gain(Component::KeybedClick));
        let mut pedal = PedalNoise::new(config.gain(Component::PedalNoise));
        strings.set_enabled(config.is_enabled(Component::Strings));
        harmonics.set_enabled(config.is_enabled(Component::Harmonics));
        keybed.set_enabled(config.is_enabled(Component::KeybedClick));
        pedal.set_enabled(config.is_enabled(Component::PedalNoise));

        Ok(Piano {
            strings,
            harmonics,
            keybed,
            pedal,
            range,
            store: BufferStore::new(),
            decoder,
            samples: config.samples(),
            backend,
            randomizer,
        })
    }

    /// Builds a piano that decodes files from disk and jitters with the configured seed.
    pub fn from_config(
        config: &PianoConfig,
        backend: Box<dyn AudioBackend>,
    ) -> Result<Piano, ConfigError> {
        Piano::new(
            config,
            Arc::new(FileDecoder),
            backend,
            Box::new(SeededRandomizer::new(config.seed())),
        )
    }

    /// The playable note range.
    pub fn range(&self) -> NoteRange {
        self.range
    }

    /// Every recording the enabled components need.
    pub fn sample_ids(&self) -> BTreeSet<SampleId> {
        let components: [&dyn Loadable; 4] =
            [&self.strings, &self.harmonics, &self.keybed, &self.pedal];
        components
            .iter()
            .flat_map(|component| component.sample_ids())
            .collect()
    }

    /// Loads every needed recording. Either all of them load or the piano stays unplayable and
    /// the error names the recording that failed.
    pub fn load(&mut self) -> Result<usize, SampleError> {
        let span = span!(Level::INFO, "load samples");
        let _enter = span.enter();

        let ids = self.sample_ids();
        let loaded = self
            .store
            .load(&ids, &self.samples, self.decoder.as_ref())?;
        info!(
            needed = ids.len(),
            loaded,
            path = ?self.samples,
            "Piano ready"
        );
        Ok(loaded)
    }

    /// Returns true once every needed recording is loaded.
    pub fn is_loaded(&self) -> bool {
        self.store.contains_all(self.sample_ids().iter())
    }

    /// Strikes a key. The strings sound with the velocity layer nearest the velocity; harmonics
    /// and the keybed click sound alongside when enabled. Recordings that are not loaded are
    /// skipped silently.
    pub fn key_down(&mut self, ctx: &mut PlaybackContext, note: u8, velocity: f32, time: Duration) {
        if !velocity.is_finite() {
            warn!(note, velocity, "Ignoring key down with an invalid velocity");
            return;
        }
        ctx.advance_to(time);

        let strike = Strike {
            note,
            velocity: velocity.clamp(0.0, 1.0),
            time,
        };
        let randomizer = self.randomizer.as_mut();
        let main = self.strings.strike(&strike, randomizer);
        let harmonics = self.harmonics.strike(&strike, randomizer);
        let keybed = self.keybed.strike(&strike, randomizer);

        let main = main.and_then(|trigger| {
            let source = self.fire(&trigger)?;
            Some((trigger.sample, source))
        });
        let one_shots = [harmonics, keybed]
            .into_iter()
            .flatten()
            .filter_map(|trigger| self.fire(&trigger))
            .collect();

        ctx.voices_mut()
            .add_voice(Voice::new(note, time, strike.velocity, main, one_shots));
    }

    /// Lifts a key. With the pedal down the note keeps sounding until the pedal lifts.
    pub fn key_up(&mut self, ctx: &mut PlaybackContext, note: u8, time: Duration) {
        ctx.advance_to(time);
        let engaged = ctx.pedal().is_engaged();
        match ctx.voices_mut().key_up(note, engaged) {
            KeyUp::Release(voice) => self.release(&voice, time),
            KeyUp::Sustained => debug!(note, "Note held by the sustain pedal"),
            KeyUp::NoVoice => debug!(note, "Key up without a held key"),
        }
    }

    /// Applies a sustain pedal value (0-127). Lifting the pedal releases every note it held.
    pub fn pedal_change(
        &mut self,
        ctx: &mut PlaybackContext,
        value: u8,
        time: Duration,
    ) -> PedalTransition {
        ctx.advance_to(time);
        let down_since = ctx.pedal().changed_at();
        let transition = ctx.pedal_mut().set_value(value, time);
        match transition {
            PedalTransition::Engaged => self.pedal_noise(true, time),
            PedalTransition::Released => {
                let released = ctx.voices_mut().release_sustained();
                debug!(
                    count = released.len(),
                    held_ms = time.saturating_sub(down_since).as_millis(),
                    "Pedal lifted, releasing notes"
                );
                for voice in &released {
                    self.release(voice, time);
                }
                self.pedal_noise(false, time);
            }
            PedalTransition::Unchanged => {}
        }
        transition
    }

    /// Presses the sustain pedal all the way.
    pub fn pedal_down(&mut self, ctx: &mut PlaybackContext, time: Duration) -> PedalTransition {
        self.pedal_change(ctx, 127, time)
    }

    /// Lifts the sustain pedal.
    pub fn pedal_up(&mut self, ctx: &mut PlaybackContext, time: Duration) -> PedalTransition {
        self.pedal_change(ctx, 0, time)
    }

    /// Silences everything and returns the context to idle.
    pub fn stop_all(&mut self, ctx: &mut PlaybackContext, time: Duration) {
        debug!(
            voices = ctx.voices().active_count(),
            time_ms = time.as_millis(),
            "Stopping all voices"
        );
        ctx.reset();
        self.backend.stop_all(time);
    }

    fn release(&mut self, voice: &Voice, time: Duration) {
        if let Some(source) = voice.main_source() {
            self.backend.release(source, time);
        }
    }

    fn pedal_noise(&mut self, down: bool, time: Duration) {
        if let Some(trigger) = self.pedal.edge(down, time, self.randomizer.as_mut()) {
            self.fire(&trigger);
        }
    }

    /// Starts a trigger if its recording is loaded.
    fn fire(&mut self, trigger: &Trigger) -> Option<SourceId> {
        match self.store.get(&trigger.sample) {
            Some(buffer) => Some(self.backend.start(buffer, trigger)),
            None => {
                debug!(
                    sample = %trigger.sample,
                    component = %trigger.component,
                    "Sample not loaded, skipping"
                );
                None
            }
        }
    }
}

impl std::fmt::Debug for Piano {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Piano")
            .field("range", &self.range)
            .field("samples", &self.samples)
            .field("loaded", &self.store.len())
            .finish()
    }
}
