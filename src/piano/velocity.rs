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

//! Velocity layer selection.

use super::naming::{physical_velocities, MAX_VELOCITIES};

/// One of the discretely recorded dynamic levels for a layer count. Always valid for its count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VelocityLayer {
    index: u8,
    count: u8,
}

impl VelocityLayer {
    /// Creates a layer. Returns None if the count is outside 1-16 or the index is not below it.
    pub fn new(index: u8, count: u8) -> Option<VelocityLayer> {
        (count >= 1 && count <= MAX_VELOCITIES && index < count)
            .then_some(VelocityLayer { index, count })
    }

    /// The 0-based index of the layer.
    pub fn index(&self) -> u8 {
        self.index
    }

    /// The number of layers this layer was chosen from.
    pub fn count(&self) -> u8 {
        self.count
    }

    /// The recorded velocity (1-16 scale) of this layer.
    pub fn physical(&self) -> u8 {
        physical_velocities(self.count)
            .and_then(|velocities| velocities.get(self.index as usize).copied())
            .unwrap_or(1)
    }
}

/// Maps a continuous velocity onto the configured layers. Layers are never blended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VelocitySelector {
    count: u8,
}

impl VelocitySelector {
    /// Creates a selector over the given number of layers. Returns None outside 1-16.
    pub fn new(count: u8) -> Option<VelocitySelector> {
        (1..=MAX_VELOCITIES)
            .contains(&count)
            .then_some(VelocitySelector { count })
    }

    /// The number of layers.
    pub fn count(&self) -> u8 {
        self.count
    }

    /// Selects the layer nearest to the velocity (0.0-1.0). NaN has no layer.
    pub fn select(&self, velocity: f32) -> Option<VelocityLayer> {
        if velocity.is_nan() {
            return None;
        }
        let top = self.count - 1;
        let index = if velocity <= 0.0 {
            0
        } else if velocity >= 1.0 {
            top
        } else {
            (velocity * top as f32).round() as u8
        };
        VelocityLayer::new(index.min(top), self.count)
    }

    /// All layers, softest first.
    pub fn layers(&self) -> impl Iterator<Item = VelocityLayer> + '_ {
        (0..self.count).filter_map(|index| VelocityLayer::new(index, self.count))
    }
}
