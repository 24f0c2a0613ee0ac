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

//! Decoding of recordings into memory.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, warn};

use super::error::SampleError;

/// A decoded recording that can be played back.
/// The sample data is stored in an Arc for efficient sharing between voices.
#[derive(Clone, Debug)]
pub struct LoadedSample {
    /// The sample data as f32 samples (interleaved if multi-channel).
    data: Arc<Vec<f32>>,
    /// Number of channels in the sample.
    channel_count: u16,
    /// Sample rate of the audio data.
    sample_rate: u32,
}

impl LoadedSample {
    /// Creates a loaded sample from interleaved data.
    pub fn new(data: Vec<f32>, channel_count: u16, sample_rate: u32) -> LoadedSample {
        LoadedSample {
            data: Arc::new(data),
            channel_count: channel_count.max(1),
            sample_rate,
        }
    }

    /// Creates a silent sample of the given length.
    pub fn silent(channel_count: u16, sample_rate: u32, frames: usize) -> LoadedSample {
        LoadedSample::new(
            vec![0.0; frames * channel_count.max(1) as usize],
            channel_count,
            sample_rate,
        )
    }

    /// The interleaved sample data.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.data.len() / self.channel_count as usize
    }

    /// The playing time at the recorded rate.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

/// Turns a recording at a location into playable samples.
pub trait SampleDecoder: Send + Sync {
    fn decode(&self, location: &Path) -> Result<LoadedSample, SampleError>;
}

/// Decodes files on disk (WAV, MP3, FLAC and the other formats symphonia supports).
#[derive(Clone, Copy, Debug, Default)]
pub struct FileDecoder;

impl SampleDecoder for FileDecoder {
    fn decode(&self, location: &Path) -> Result<LoadedSample, SampleError> {
        // Include the path in the error so the user sees which file failed.
        let file = File::open(location).map_err(|e| {
            SampleError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", location.display(), e),
            ))
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = location.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let probed = get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| SampleError::Decode(format!("'{}': {}", location.display(), e)))?;
        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| {
                SampleError::Decode(format!("'{}': no audio track found", location.display()))
            })?;
        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate;
        let mut channel_count = track.codec_params.channels.map(|c| c.count() as u16);

        let mut decoder = get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| SampleError::Decode(format!("'{}': {}", location.display(), e)))?;

        let mut data = Vec::new();
        loop {
            let packet = match format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break
                }
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    // Corrupt packets are dropped; the rest of the file still decodes.
                    warn!(path = ?location, error = e, "Skipping undecodable packet");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let spec = *decoded.spec();
            sample_rate.get_or_insert(spec.rate);
            channel_count.get_or_insert(spec.channels.count() as u16);

            let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            buffer.copy_interleaved_ref(decoded);
            data.extend_from_slice(buffer.samples());
        }

        let (Some(sample_rate), Some(channel_count)) = (sample_rate, channel_count) else {
            return Err(SampleError::Decode(format!(
                "'{}': sample rate or channel count not specified",
                location.display()
            )));
        };

        let loaded = LoadedSample::new(data, channel_count, sample_rate);
        debug!(
            path = ?location,
            channels = channel_count,
            sample_rate,
            duration_ms = loaded.duration().as_millis(),
            "Sample decoded"
        );
        Ok(loaded)
    }
}

/// A decoder that produces short silent samples, fails for chosen file names and counts calls.
#[cfg(test)]
#[derive(Default)]
pub struct StubDecoder {
    failures: std::collections::HashSet<String>,
    decoded: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl StubDecoder {
    pub fn new() -> StubDecoder {
        StubDecoder::default()
    }

    /// A decoder that fails for the given file names.
    pub fn failing(file_names: &[&str]) -> StubDecoder {
        StubDecoder {
            failures: file_names.iter().map(|name| name.to_string()).collect(),
            decoded: Default::default(),
        }
    }

    /// How many decodes have been attempted.
    pub fn decode_count(&self) -> usize {
        self.decoded.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl SampleDecoder for StubDecoder {
    fn decode(&self, location: &Path) -> Result<LoadedSample, SampleError> {
        self.decoded
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let name = location
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or_default();
        if self.failures.contains(name) {
            return Err(SampleError::Decode(name.to_string()));
        }
        Ok(LoadedSample::silent(1, 44100, 64))
    }
}
