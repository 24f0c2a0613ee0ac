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

use tracing::info;

use super::{next_source_id, AudioBackend, SourceId, Trigger};
use crate::samples::LoadedSample;

/// A backend that reports every call through tracing instead of producing sound.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingBackend;

impl AudioBackend for TracingBackend {
    fn start(&mut self, buffer: &LoadedSample, trigger: &Trigger) -> SourceId {
        let source = next_source_id();
        info!(
            source,
            component = %trigger.component,
            sample = %trigger.sample,
            time = ?trigger.time,
            gain = trigger.gain,
            rate = trigger.rate,
            duration_ms = buffer.duration().as_millis(),
            "Start"
        );
        source
    }

    fn release(&mut self, source: SourceId, time: Duration) {
        info!(source, time = ?time, "Release");
    }

    fn stop_all(&mut self, time: Duration) {
        info!(time = ?time, "Stop all");
    }
}
