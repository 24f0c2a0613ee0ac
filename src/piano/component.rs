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

//! The instrument components: strings, harmonics, pedal noise and keybed clicks.
//!
//! Each component knows which recordings it needs ([`Loadable`]) and, for the note-driven ones,
//! how a key strike maps onto one of them ([`Triggerable`]). The [`super::Piano`] composes them.

use std::fmt;
use std::time::Duration;

use super::naming::{name_for, pedal_samples, SampleId};
use super::random::Randomizer;
use super::range::{self, nearest_note, notes_in_range, pitch_ratio, NoteRange};
use super::velocity::VelocitySelector;
use crate::audio::Trigger;

/// Random gain factor applied to strings strikes.
pub const STRINGS_JITTER: (f32, f32) = (0.9, 1.0);

/// The fixed gain of the sympathetic resonance played under each strike.
pub const HARMONICS_GAIN: f32 = 0.3;

/// The gain of a keybed click at full velocity, before jitter.
pub const KEYBED_GAIN: f32 = 0.015;

/// The gain of pedal noise, before jitter.
pub const PEDAL_GAIN: f32 = 0.2;

/// Random gain factor applied to keybed clicks and pedal noise.
pub const MECHANICAL_JITTER: (f32, f32) = (0.5, 1.0);

/// The kinds of recordings in the library.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Component {
    Strings,
    Harmonics,
    PedalNoise,
    KeybedClick,
}

impl Component {
    /// Every component.
    pub const ALL: [Component; 4] = [
        Component::Strings,
        Component::Harmonics,
        Component::PedalNoise,
        Component::KeybedClick,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Component::Strings => "strings",
            Component::Harmonics => "harmonics",
            Component::PedalNoise => "pedal",
            Component::KeybedClick => "keybed",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A key strike as seen by the components.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Strike {
    pub note: u8,
    /// 0.0-1.0.
    pub velocity: f32,
    pub time: Duration,
}

/// A component whose recordings must be loaded before it can play.
pub trait Loadable {
    /// Which component this is.
    fn component(&self) -> Component;

    fn is_enabled(&self) -> bool;

    fn set_enabled(&mut self, enabled: bool);

    /// Every recording the component can play. Empty while disabled.
    fn sample_ids(&self) -> Vec<SampleId>;
}

/// A component that sounds when a key is struck.
pub trait Triggerable: Loadable {
    /// Chooses the recording and playback parameters for a strike. None means stay silent.
    fn strike(&self, strike: &Strike, randomizer: &mut dyn Randomizer) -> Option<Trigger>;
}

/// The main tone of the piano.
#[derive(Clone, Debug)]
pub struct Strings {
    range: NoteRange,
    selector: VelocitySelector,
    anchors: Vec<u8>,
    gain: f32,
    enabled: bool,
}

impl Strings {
    pub fn new(range: NoteRange, selector: VelocitySelector, gain: f32) -> Strings {
        Strings {
            range,
            selector,
            anchors: notes_in_range(Component::Strings, range),
            gain,
            enabled: true,
        }
    }
}

impl Loadable for Strings {
    fn component(&self) -> Component {
        Component::Strings
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn sample_ids(&self) -> Vec<SampleId> {
        if !self.enabled {
            return Vec::new();
        }
        self.anchors
            .iter()
            .flat_map(|note| {
                self.selector
                    .layers()
                    .filter_map(move |layer| name_for(*note, Component::Strings, Some(layer)))
            })
            .collect()
    }
}

impl Triggerable for Strings {
    fn strike(&self, strike: &Strike, randomizer: &mut dyn Randomizer) -> Option<Trigger> {
        if !self.enabled || !self.range.contains(strike.note) {
            return None;
        }
        let anchor = nearest_note(&self.anchors, strike.note)?;
        let layer = self.selector.select(strike.velocity)?;
        let sample = name_for(anchor, Component::Strings, Some(layer))?;
        let (low, high) = STRINGS_JITTER;
        Some(Trigger {
            component: Component::Strings,
            sample,
            time: strike.time,
            gain: self.gain * randomizer.jittered_gain(strike.velocity, low, high),
            rate: pitch_ratio(strike.note, anchor),
        })
    }
}

/// Sympathetic resonance of the undamped strings.
#[derive(Clone, Debug)]
pub struct Harmonics {
    range: NoteRange,
    anchors: Vec<u8>,
    gain: f32,
    enabled: bool,
}

impl Harmonics {
    pub fn new(range: NoteRange, gain: f32) -> Harmonics {
        Harmonics {
            range,
            anchors: notes_in_range(Component::Harmonics, range),
            gain,
            enabled: true,
        }
    }
}

impl Loadable for Harmonics {
    fn component(&self) -> Component {
        Component::Harmonics
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn sample_ids(&self) -> Vec<SampleId> {
        if !self.enabled {
            return Vec::new();
        }
        self.anchors
            .iter()
            .filter_map(|note| name_for(*note, Component::Harmonics, None))
            .collect()
    }
}

impl Triggerable for Harmonics {
    fn strike(&self, strike: &Strike, _: &mut dyn Randomizer) -> Option<Trigger> {
        if !self.enabled
            || !self.range.contains(strike.note)
            || !range::is_within_harmonics_range(strike.note)
        {
            return None;
        }
        let anchor = nearest_note(&self.anchors, strike.note)?;
        Some(Trigger {
            component: Component::Harmonics,
            sample: name_for(anchor, Component::Harmonics, None)?,
            time: strike.time,
            gain: self.gain * HARMONICS_GAIN,
            rate: pitch_ratio(strike.note, anchor),
        })
    }
}

/// The mechanical click of the key action.
#[derive(Clone, Debug)]
pub struct Keybed {
    range: NoteRange,
    gain: f32,
    enabled: bool,
}

impl Keybed {
    pub fn new(range: NoteRange, gain: f32) -> Keybed {
        Keybed {
            range,
            gain,
            enabled: true,
        }
    }
}

impl Loadable for Keybed {
    fn component(&self) -> Component {
        Component::KeybedClick
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn sample_ids(&self) -> Vec<SampleId> {
        if !self.enabled {
            return Vec::new();
        }
        notes_in_range(Component::KeybedClick, self.range)
            .into_iter()
            .filter_map(|note| name_for(note, Component::KeybedClick, None))
            .collect()
    }
}

impl Triggerable for Keybed {
    fn strike(&self, strike: &Strike, randomizer: &mut dyn Randomizer) -> Option<Trigger> {
        if !self.enabled || !self.range.contains(strike.note) {
            return None;
        }
        let (low, high) = MECHANICAL_JITTER;
        Some(Trigger {
            component: Component::KeybedClick,
            sample: name_for(strike.note, Component::KeybedClick, None)?,
            time: strike.time,
            gain: self.gain * randomizer.jittered_gain(KEYBED_GAIN * strike.velocity, low, high),
            rate: 1.0,
        })
    }
}

/// The thump and squeak of the sustain pedal mechanism.
#[derive(Clone, Debug)]
pub struct PedalNoise {
    gain: f32,
    enabled: bool,
}

impl PedalNoise {
    pub fn new(gain: f32) -> PedalNoise {
        PedalNoise {
            gain,
            enabled: true,
        }
    }

    /// Chooses the noise for the pedal going down (true) or coming up (false).
    pub fn edge(
        &self,
        down: bool,
        time: Duration,
        randomizer: &mut dyn Randomizer,
    ) -> Option<Trigger> {
        if !self.enabled {
            return None;
        }
        let mut samples = pedal_samples(down);
        if samples.is_empty() {
            return None;
        }
        let index = randomizer.pick(samples.len());
        let (low, high) = MECHANICAL_JITTER;
        Some(Trigger {
            component: Component::PedalNoise,
            sample: samples.swap_remove(index),
            time,
            gain: self.gain * randomizer.jittered_gain(PEDAL_GAIN, low, high),
            rate: 1.0,
        })
    }
}

impl Loadable for PedalNoise {
    fn component(&self) -> Component {
        Component::PedalNoise
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn sample_ids(&self) -> Vec<SampleId> {
        if !self.enabled {
            return Vec::new();
        }
        let mut ids = pedal_samples(true);
        ids.extend(pedal_samples(false));
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piano::random::FixedRandomizer;

    fn strike(note: u8, velocity: f32) -> Strike {
        Strike {
            note,
            velocity,
            time: Duration::from_millis(250),
        }
    }

    #[test]
    fn test_strings_sample_ids() {
        let strings = Strings::new(
            NoteRange::new(60, 72).unwrap(),
            VelocitySelector::new(3).unwrap(),
            1.0,
        );
        let ids = strings.sample_ids();
        assert_eq!(ids.len(), 5 * 3);
        assert!(ids.contains(&SampleId::new("C4v1")));
        assert!(ids.contains(&SampleId::new("Fs4v7")));
        assert!(ids.contains(&SampleId::new("C5v15")));
    }

    #[test]
    fn test_strings_strike_repitches() {
        let strings = Strings::new(
            NoteRange::new(60, 72).unwrap(),
            VelocitySelector::new(3).unwrap(),
            1.0,
        );
        let mut randomizer = FixedRandomizer::new(1.0);

        let trigger = strings.strike(&strike(60, 0.8), &mut randomizer).unwrap();
        assert_eq!(trigger.sample, SampleId::new("C4v15"));
        assert_eq!(trigger.rate, 1.0);
        assert_eq!(trigger.gain, 0.8);
        assert_eq!(trigger.time, Duration::from_millis(250));

        let trigger = strings.strike(&strike(62, 0.5), &mut randomizer).unwrap();
        assert_eq!(trigger.sample, SampleId::new("Ds4v7"));
        assert!(trigger.rate < 1.0);

        assert!(strings.strike(&strike(59, 0.5), &mut randomizer).is_none());
        assert!(strings.strike(&strike(60, f32::NAN), &mut randomizer).is_none());
    }

    #[test]
    fn test_harmonics_fixed_gain() {
        let harmonics = Harmonics::new(NoteRange::PIANO, 1.0);
        let mut randomizer = FixedRandomizer::new(0.0);
        let soft = harmonics.strike(&strike(60, 0.1), &mut randomizer).unwrap();
        let loud = harmonics.strike(&strike(60, 1.0), &mut randomizer).unwrap();
        assert_eq!(soft.gain, HARMONICS_GAIN);
        assert_eq!(soft.gain, loud.gain);
        assert_eq!(soft.sample, SampleId::new("harmSC4"));
        assert!(harmonics.strike(&strike(90, 1.0), &mut randomizer).is_none());
        assert_eq!(harmonics.sample_ids().len(), 23);
    }

    #[test]
    fn test_keybed_jitter() {
        let keybed = Keybed::new(NoteRange::PIANO, 1.0);
        let trigger = keybed
            .strike(&strike(40, 1.0), &mut FixedRandomizer::new(0.0))
            .unwrap();
        assert_eq!(trigger.sample, SampleId::new("rel20"));
        assert_eq!(trigger.gain, KEYBED_GAIN * 0.5);
        assert_eq!(keybed.sample_ids().len(), 88);
    }

    #[test]
    fn test_pedal_noise() {
        let pedal = PedalNoise::new(1.0);
        let mut randomizer = FixedRandomizer::new(0.0);
        let down = pedal.edge(true, Duration::ZERO, &mut randomizer).unwrap();
        assert_eq!(down.sample, SampleId::new("pedalD1"));
        let up = pedal
            .edge(false, Duration::ZERO, &mut FixedRandomizer::new(1.0))
            .unwrap();
        assert_eq!(up.sample, SampleId::new("pedalU2"));
        assert_eq!(pedal.sample_ids().len(), 4);
    }

    #[test]
    fn test_disabled_components_are_silent() {
        let mut keybed = Keybed::new(NoteRange::PIANO, 1.0);
        keybed.set_enabled(false);
        assert!(keybed.sample_ids().is_empty());
        assert!(keybed
            .strike(&strike(60, 1.0), &mut FixedRandomizer::new(0.0))
            .is_none());

        let mut pedal = PedalNoise::new(1.0);
        pedal.set_enabled(false);
        assert!(pedal.sample_ids().is_empty());
        assert!(pedal
            .edge(true, Duration::ZERO, &mut FixedRandomizer::new(0.0))
            .is_none());
    }
}
