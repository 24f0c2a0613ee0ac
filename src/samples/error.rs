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
use crate::piano::SampleId;

/// Error types for sample loading.
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("Audio file error: {0}")]
    Audio(#[from] symphonia::core::errors::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode failed for {0}")]
    Decode(String),

    /// A bulk load stopped because one recording could not be loaded.
    #[error("Failed to load sample {id}: {source}")]
    LoadFailure {
        id: SampleId,
        #[source]
        source: Box<SampleError>,
    },
}
