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
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, File};
use duration_string::DurationString;
use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use crate::piano::{Component, NoteRange, HIGHEST_NOTE, LOWEST_NOTE, MAX_VELOCITIES};
use crate::util::db_to_gain;

/// Default lookahead for real-time playback.
pub const DEFAULT_LOOKAHEAD: Duration = Duration::from_millis(50);

fn default_velocities() -> u8 {
    1
}

fn default_enabled() -> bool {
    true
}

/// The span of keyboard octaves to load, e.g. `{ from: 4, to: 5 }` is middle C up to the next C.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq)]
pub struct Octaves {
    pub from: u8,
    pub to: u8,
}

/// Per-component output levels in decibels.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct Volume {
    #[serde(default)]
    strings: f32,
    #[serde(default)]
    harmonics: f32,
    #[serde(default)]
    pedal: f32,
    #[serde(default)]
    keybed: f32,
}

impl Volume {
    fn db(&self, component: Component) -> f32 {
        match component {
            Component::Strings => self.strings,
            Component::Harmonics => self.harmonics,
            Component::PedalNoise => self.pedal,
            Component::KeybedClick => self.keybed,
        }
    }

    fn db_mut(&mut self, component: Component) -> &mut f32 {
        match component {
            Component::Strings => &mut self.strings,
            Component::Harmonics => &mut self.harmonics,
            Component::PedalNoise => &mut self.pedal,
            Component::KeybedClick => &mut self.keybed,
        }
    }
}

/// A YAML representation of the piano.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct PianoConfig {
    /// Directory holding the sample library.
    samples: String,

    /// Number of velocity layers to load (1-16).
    #[serde(default = "default_velocities")]
    velocities: u8,

    /// Whether pedal noise samples are played.
    #[serde(default = "default_enabled")]
    pedal: bool,

    /// Whether keybed clicks are played.
    #[serde(default = "default_enabled")]
    keybed: bool,

    /// Whether sympathetic resonance samples are played.
    #[serde(default = "default_enabled")]
    harmonics: bool,

    /// The octave span to load. Mutually exclusive with min_note/max_note.
    octaves: Option<Octaves>,
    min_note: Option<u8>,
    max_note: Option<u8>,

    #[serde(default)]
    volume: Volume,

    /// How far ahead of the clock real-time playback dispatches, e.g. "50ms".
    lookahead: Option<String>,

    /// Makes the playback jitter reproducible.
    seed: Option<u64>,
}

impl PianoConfig {
    /// Creates a configuration for the full keyboard with every component enabled.
    pub fn new(samples: impl Into<String>) -> PianoConfig {
        PianoConfig {
            samples: samples.into(),
            velocities: default_velocities(),
            pedal: true,
            keybed: true,
            harmonics: true,
            octaves: None,
            min_note: None,
            max_note: None,
            volume: Volume::default(),
            lookahead: None,
            seed: None,
        }
    }

    /// Deserializes a file from the path into a validated piano configuration.
    pub fn deserialize(path: &Path) -> Result<PianoConfig, ConfigError> {
        let config: PianoConfig = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_velocities(mut self, velocities: u8) -> PianoConfig {
        self.velocities = velocities;
        self
    }

    pub fn with_octaves(mut self, from: u8, to: u8) -> PianoConfig {
        self.octaves = Some(Octaves { from, to });
        self.min_note = None;
        self.max_note = None;
        self
    }

    pub fn with_note_range(mut self, min: u8, max: u8) -> PianoConfig {
        self.octaves = None;
        self.min_note = Some(min);
        self.max_note = Some(max);
        self
    }

    /// Enables or disables an optional component. The strings are always enabled.
    pub fn with_component(mut self, component: Component, enabled: bool) -> PianoConfig {
        match component {
            Component::Strings => {}
            Component::Harmonics => self.harmonics = enabled,
            Component::PedalNoise => self.pedal = enabled,
            Component::KeybedClick => self.keybed = enabled,
        }
        self
    }

    pub fn with_volume(mut self, component: Component, db: f32) -> PianoConfig {
        *self.volume.db_mut(component) = db;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> PianoConfig {
        self.seed = Some(seed);
        self
    }

    pub fn with_lookahead(mut self, lookahead: impl Into<String>) -> PianoConfig {
        self.lookahead = Some(lookahead.into());
        self
    }

    /// Checks the configuration. Nothing should be loaded from a configuration that fails this.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_VELOCITIES).contains(&self.velocities) {
            return Err(ConfigError::Invalid(format!(
                "velocities must be between 1 and {}, got {}",
                MAX_VELOCITIES, self.velocities
            )));
        }
        self.note_range()?;
        self.lookahead()?;
        for component in Component::ALL {
            let db = self.volume.db(component);
            if !db.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "volume for {} must be a finite number of decibels",
                    component
                )));
            }
        }
        Ok(())
    }

    /// The range of notes to load and play.
    pub fn note_range(&self) -> Result<NoteRange, ConfigError> {
        if let Some(octaves) = self.octaves {
            if self.min_note.is_some() || self.max_note.is_some() {
                return Err(ConfigError::Invalid(
                    "octaves cannot be combined with min_note/max_note".into(),
                ));
            }
            return NoteRange::for_octaves(octaves.from, octaves.to).ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "octaves must run from 0-7 to 1-8 with from <= to, got {} to {}",
                    octaves.from, octaves.to
                ))
            });
        }

        let min = self.min_note.unwrap_or(LOWEST_NOTE);
        let max = self.max_note.unwrap_or(HIGHEST_NOTE);
        NoteRange::new(min, max).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "note range must satisfy min <= max <= 127, got {} to {}",
                min, max
            ))
        })
    }

    /// The sample library directory.
    pub fn samples(&self) -> PathBuf {
        PathBuf::from(&self.samples)
    }

    pub fn velocities(&self) -> u8 {
        self.velocities
    }

    /// Whether a component is enabled.
    pub fn is_enabled(&self, component: Component) -> bool {
        match component {
            Component::Strings => true,
            Component::Harmonics => self.harmonics,
            Component::PedalNoise => self.pedal,
            Component::KeybedClick => self.keybed,
        }
    }

    /// The linear output gain of a component.
    pub fn gain(&self, component: Component) -> f32 {
        db_to_gain(self.volume.db(component))
    }

    /// Gets the lookahead for real-time playback.
    pub fn lookahead(&self) -> Result<Duration, ConfigError> {
        match &self.lookahead {
            Some(lookahead) => Ok(DurationString::from_string(lookahead.clone())
                .map_err(|e| {
                    ConfigError::Invalid(format!("invalid lookahead '{}': {}", lookahead, e))
                })?
                .into()),
            None => Ok(DEFAULT_LOOKAHEAD),
        }
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
}
