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

//! The seam to the audio output. The engine decides what plays and when; a backend turns those
//! decisions into sound.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::piano::{Component, SampleId};
use crate::samples::LoadedSample;

pub mod log;
pub mod mock;

/// Identifies one playing instance of a sample within a backend.
pub type SourceId = u64;

/// Global source ID counter.
static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Returns a source ID that has not been handed out before.
pub fn next_source_id() -> SourceId {
    NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed)
}

/// A request to play one sample.
#[derive(Clone, Debug, PartialEq)]
pub struct Trigger {
    /// The component the sample belongs to.
    pub component: Component,
    /// The recording to play.
    pub sample: SampleId,
    /// When to start, on the clock of the stream that produced the trigger.
    pub time: Duration,
    /// Linear output gain.
    pub gain: f32,
    /// Playback rate. 1.0 plays the recording at its recorded pitch.
    pub rate: f32,
}

/// An audio output that plays loaded samples at scheduled times.
///
/// Times come from two independent clocks. Score playback uses the score position, which
/// restarts at zero on every play. Previewed notes use the time since the player was created.
/// Times never go backwards within one play or across previews, so a backend should schedule
/// each call relative to the latest time seen from the same stream and never compare times
/// across streams.
pub trait AudioBackend: Send {
    /// Starts playing the buffer as described by the trigger.
    fn start(&mut self, buffer: &LoadedSample, trigger: &Trigger) -> SourceId;

    /// Begins the release of a playing source at the given time. The source fades out naturally.
    fn release(&mut self, source: SourceId, time: Duration);

    /// Stops every source at the given time.
    fn stop_all(&mut self, time: Duration);
}
