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
use std::collections::{HashMap, VecDeque};
use std::path::Path;

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use tracing::debug;

use super::error::ScoreError;
use super::{Score, ScoreNote, SustainChange};
use crate::piano::{note_name, SUSTAIN_CONTROLLER};

/// Microseconds per beat when a file has no tempo marking (120 bpm).
const DEFAULT_TEMPO: u32 = 500_000;

/// Converts ticks to seconds.
enum Clock {
    Metrical {
        ticks_per_beat: f64,
        /// (tick, microseconds per beat), ascending.
        tempo_changes: Vec<(u64, u32)>,
    },
    Timecode {
        ticks_per_second: f64,
    },
}

impl Clock {
    fn new(smf: &Smf) -> Clock {
        match smf.header.timing {
            Timing::Metrical(ticks_per_beat) => {
                let mut tempo_changes: Vec<(u64, u32)> = smf
                    .tracks
                    .iter()
                    .flat_map(|track| {
                        absolute(track).filter_map(|(tick, event)| match event.kind {
                            TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                                Some((tick, tempo.as_int()))
                            }
                            _ => None,
                        })
                    })
                    .collect();
                tempo_changes.sort_by_key(|(tick, _)| *tick);
                Clock::Metrical {
                    ticks_per_beat: f64::from(ticks_per_beat.as_int().max(1)),
                    tempo_changes,
                }
            }
            Timing::Timecode(fps, subframes) => Clock::Timecode {
                ticks_per_second: (f64::from(fps.as_f32()) * f64::from(subframes)).max(1.0),
            },
        }
    }

    /// Beats per minute of the first tempo marking.
    fn first_tempo(&self) -> Option<f64> {
        match self {
            Clock::Metrical { tempo_changes, .. } => tempo_changes
                .first()
                .filter(|(_, tempo)| *tempo > 0)
                .map(|(_, tempo)| 60_000_000.0 / f64::from(*tempo)),
            Clock::Timecode { .. } => None,
        }
    }

    fn seconds(&self, tick: u64) -> f64 {
        match self {
            Clock::Timecode { ticks_per_second } => tick as f64 / ticks_per_second,
            Clock::Metrical {
                ticks_per_beat,
                tempo_changes,
            } => {
                let mut seconds = 0.0;
                let mut last_tick = 0;
                let mut tempo = DEFAULT_TEMPO;
                for &(at, next_tempo) in tempo_changes {
                    if at >= tick {
                        break;
                    }
                    seconds += (at - last_tick) as f64 * f64::from(tempo) / 1e6 / ticks_per_beat;
                    last_tick = at;
                    tempo = next_tempo;
                }
                seconds + (tick - last_tick) as f64 * f64::from(tempo) / 1e6 / ticks_per_beat
            }
        }
    }
}

/// Pairs each event with its absolute tick.
fn absolute<'a, 'b>(
    track: &'b [TrackEvent<'a>],
) -> impl Iterator<Item = (u64, &'b TrackEvent<'a>)> {
    track.iter().scan(0u64, |tick, event| {
        *tick += u64::from(event.delta.as_int());
        Some((*tick, event))
    })
}

fn has_notes(track: &[TrackEvent]) -> bool {
    track.iter().any(|event| {
        matches!(
            event.kind,
            TrackEventKind::Midi {
                message: MidiMessage::NoteOn { vel, .. },
                ..
            } if vel.as_int() > 0
        )
    })
}

/// Reads a Standard MIDI File from disk.
pub(super) fn read(path: &Path) -> Result<Score, ScoreError> {
    let bytes = std::fs::read(path)?;
    parse(&bytes)
}

/// Decodes the first track that holds notes, along with its sustain pedal changes.
pub(super) fn parse(bytes: &[u8]) -> Result<Score, ScoreError> {
    let smf = Smf::parse(bytes)?;
    let clock = Clock::new(&smf);

    let Some((index, track)) = smf
        .tracks
        .iter()
        .enumerate()
        .find(|(_, track)| has_notes(track))
    else {
        return Err(ScoreError::Malformed("no track contains notes".into()));
    };

    let mut open: HashMap<u8, VecDeque<(u64, u8)>> = HashMap::new();
    let mut spans: Vec<(u8, u8, u64, u64)> = Vec::new();
    let mut sustain = Vec::new();
    let mut last_tick = 0;

    for (tick, event) in absolute(track) {
        last_tick = tick;
        let TrackEventKind::Midi { message, .. } = event.kind else {
            continue;
        };
        match message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                open.entry(key.as_int())
                    .or_default()
                    .push_back((tick, vel.as_int()));
            }
            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                let key = key.as_int();
                if let Some((start, vel)) = open.get_mut(&key).and_then(VecDeque::pop_front) {
                    spans.push((key, vel, start, tick));
                }
            }
            MidiMessage::Controller { controller, value }
                if controller.as_int() == SUSTAIN_CONTROLLER =>
            {
                sustain.push(SustainChange {
                    value: value.as_int(),
                    time: clock.seconds(tick),
                });
            }
            _ => {}
        }
    }

    // Notes still held when the track ends stop at its last event.
    for (key, starts) in open {
        for (start, vel) in starts {
            spans.push((key, vel, start, last_tick));
        }
    }

    let mut notes: Vec<ScoreNote> = spans
        .into_iter()
        .map(|(key, vel, start, end)| {
            let time = clock.seconds(start);
            ScoreNote {
                name: note_name(key),
                velocity: f32::from(vel) / 127.0,
                time,
                duration: clock.seconds(end) - time,
            }
        })
        .collect();
    notes.sort_by(|a, b| a.time.total_cmp(&b.time));

    debug!(
        track = index,
        notes = notes.len(),
        pedal_changes = sustain.len(),
        "MIDI file decoded"
    );
    Ok(Score::new(notes, sustain, clock.first_tempo()))
}
