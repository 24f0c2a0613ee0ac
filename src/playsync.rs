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
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Represents the current cancel state.
#[derive(PartialEq)]
enum CancelState {
    Untouched,
    Cancelled,
}

/// A cancel handle is passed to the transport during a play operation. It's the transport's
/// responsibility to check it between dispatches.
#[derive(Clone)]
pub struct CancelHandle {
    cancelled: Arc<Mutex<CancelState>>,
    /// Wakes sleepers when the handle is cancelled.
    condvar: Arc<Condvar>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        CancelHandle::new()
    }
}

impl CancelHandle {
    /// Creates a new cancel handle.
    pub fn new() -> CancelHandle {
        CancelHandle {
            cancelled: Arc::new(Mutex::new(CancelState::Untouched)),
            condvar: Arc::new(Condvar::new()),
        }
    }

    /// Returns true if the playback has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.lock().expect("Error getting lock") == CancelState::Cancelled
    }

    /// Sleeps for up to the given duration, returning early if the handle is cancelled.
    /// Returns true if the handle was cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (state, _) = self
            .condvar
            .wait_timeout_while(
                self.cancelled.lock().expect("Error getting lock"),
                timeout,
                |cancelled| *cancelled == CancelState::Untouched,
            )
            .expect("Error getting lock");
        *state == CancelState::Cancelled
    }

    /// Returns true if both handles belong to the same playback.
    pub fn same_as(&self, other: &CancelHandle) -> bool {
        Arc::ptr_eq(&self.cancelled, &other.cancelled)
    }

    /// Cancel the playback.
    pub fn cancel(&self) {
        let mut cancel_state = self.cancelled.lock().expect("Error getting lock");
        if *cancel_state == CancelState::Untouched {
            *cancel_state = CancelState::Cancelled;
            self.condvar.notify_all();
        }
    }
}
