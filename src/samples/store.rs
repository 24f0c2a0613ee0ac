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
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::error::SampleError;
use super::loader::{LoadedSample, SampleDecoder};
use crate::piano::SampleId;

/// Holds every decoded recording, keyed by its identifier.
#[derive(Debug, Default)]
pub struct BufferStore {
    buffers: HashMap<SampleId, LoadedSample>,
}

impl BufferStore {
    pub fn new() -> BufferStore {
        BufferStore::default()
    }

    /// Loads every identifier not already held. Recordings are decoded in parallel. The load is
    /// all or nothing: if any recording fails, nothing from this call is kept and the error
    /// names the failing identifier. Returns the number of newly loaded recordings.
    pub fn load(
        &mut self,
        ids: &BTreeSet<SampleId>,
        base: &Path,
        decoder: &dyn SampleDecoder,
    ) -> Result<usize, SampleError> {
        let pending: Vec<&SampleId> = ids
            .iter()
            .filter(|id| !self.buffers.contains_key(*id))
            .collect();
        if pending.is_empty() {
            debug!(requested = ids.len(), "All samples already loaded");
            return Ok(0);
        }

        info!(
            count = pending.len(),
            base = ?base,
            "Loading samples"
        );

        let decoded = pending
            .into_par_iter()
            .map(|id| {
                let path = base.join(id.file_name());
                decoder
                    .decode(&path)
                    .map(|sample| (id.clone(), sample))
                    .map_err(|e| SampleError::LoadFailure {
                        id: id.clone(),
                        source: Box::new(e),
                    })
            })
            .collect::<Result<Vec<_>, SampleError>>();

        let decoded = match decoded {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(error = %e, "Sample loading failed");
                return Err(e);
            }
        };

        let loaded = decoded.len();
        self.buffers.extend(decoded);
        info!(
            loaded,
            total = self.buffers.len(),
            memory_mb = self.memory_usage() / (1024 * 1024),
            "Samples loaded"
        );
        Ok(loaded)
    }

    /// Returns the buffer for an identifier. None when it was never loaded.
    pub fn get(&self, id: &SampleId) -> Option<&LoadedSample> {
        self.buffers.get(id)
    }

    /// Whether every one of the identifiers is held.
    pub fn contains_all<'a>(&self, mut ids: impl Iterator<Item = &'a SampleId>) -> bool {
        ids.all(|id| self.buffers.contains_key(id))
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Total bytes held by all buffers.
    pub fn memory_usage(&self) -> usize {
        self.buffers.values().map(LoadedSample::memory_size).sum()
    }
}
