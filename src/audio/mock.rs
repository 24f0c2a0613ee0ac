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
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::{next_source_id, AudioBackend, SourceId, Trigger};
use crate::samples::LoadedSample;

/// A call received by the recording backend.
#[derive(Clone, Debug, PartialEq)]
pub enum BackendCall {
    Start { source: SourceId, trigger: Trigger },
    Release { source: SourceId, time: Duration },
    StopAll { time: Duration },
}

/// A backend that plays nothing and records every call. Clones share the same record, so a
/// clone kept outside the piano can inspect what the piano did.
#[derive(Clone, Default)]
pub struct RecordingBackend {
    calls: Arc<Mutex<Vec<BackendCall>>>,
}

impl RecordingBackend {
    /// Creates a new recording backend.
    pub fn new() -> RecordingBackend {
        RecordingBackend::default()
    }

    /// Returns every call so far, in order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    /// Returns the triggers that were started, in order.
    pub fn starts(&self) -> Vec<(SourceId, Trigger)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                BackendCall::Start { source, trigger } => Some((*source, trigger.clone())),
                _ => None,
            })
            .collect()
    }

    /// Returns the releases, in order.
    pub fn releases(&self) -> Vec<(SourceId, Duration)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                BackendCall::Release { source, time } => Some((*source, *time)),
                _ => None,
            })
            .collect()
    }
}

impl AudioBackend for RecordingBackend {
    fn start(&mut self, _: &LoadedSample, trigger: &Trigger) -> SourceId {
        let source = next_source_id();
        self.calls.lock().push(BackendCall::Start {
            source,
            trigger: trigger.clone(),
        });
        source
    }

    fn release(&mut self, source: SourceId, time: Duration) {
        self.calls
            .lock()
            .push(BackendCall::Release { source, time });
    }

    fn stop_all(&mut self, time: Duration) {
        self.calls.lock().push(BackendCall::StopAll { time });
    }
}
