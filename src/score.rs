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

//! Scores: notes with pitch names and times in seconds, plus sustain pedal changes.

use std::path::Path;

use crate::piano::parse_note_name;
use crate::timeline::TimelineEvent;
use crate::util::seconds;

mod error;
mod midi_file;

pub use self::error::ScoreError;

/// A note of a score.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreNote {
    /// Pitch name with octave, e.g. "C#4".
    pub name: String,
    /// 0.0-1.0.
    pub velocity: f32,
    /// Start, in seconds.
    pub time: f64,
    /// Length, in seconds.
    pub duration: f64,
}

/// A sustain pedal (controller 64) change.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SustainChange {
    /// 0-127.
    pub value: u8,
    pub time: f64,
}

/// A performance to be played by a timeline.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Score {
    pub notes: Vec<ScoreNote>,
    pub sustain: Vec<SustainChange>,
    /// Beats per minute from the first tempo marking, if any.
    pub tempo: Option<f64>,
    /// Total length in seconds.
    pub duration: f64,
}

impl Score {
    /// Creates a score. The duration is the end of the last note or pedal change.
    pub fn new(notes: Vec<ScoreNote>, sustain: Vec<SustainChange>, tempo: Option<f64>) -> Score {
        let note_end = notes
            .iter()
            .map(|n| n.time + n.duration)
            .fold(0.0, f64::max);
        let sustain_end = sustain.iter().map(|s| s.time).fold(0.0, f64::max);
        Score {
            notes,
            sustain,
            tempo,
            duration: note_end.max(sustain_end),
        }
    }

    /// Reads a Standard MIDI File.
    pub fn from_midi_file(path: &Path) -> Result<Score, ScoreError> {
        midi_file::read(path)
    }

    /// Parses Standard MIDI File contents.
    pub fn from_smf_bytes(bytes: &[u8]) -> Result<Score, ScoreError> {
        midi_file::parse(bytes)
    }

    /// Converts the score into time-ordered timeline events. A score without notes, or with a
    /// pitch or time that cannot be played, is malformed.
    pub fn to_events(&self) -> Result<Vec<TimelineEvent>, ScoreError> {
        if self.notes.is_empty() {
            return Err(ScoreError::Malformed("no notes found".into()));
        }

        // Sort keys are (time, rank, note index, step). At equal times pedal changes come
        // first, then releases of earlier notes, then strikes, so a repeated note is let go
        // before it is struck again. A note of zero length keeps its release right behind its
        // own strike.
        let mut keyed = Vec::with_capacity(self.notes.len() * 2 + self.sustain.len());
        for (index, note) in self.notes.iter().enumerate() {
            let key = parse_note_name(&note.name).ok_or_else(|| {
                ScoreError::Malformed(format!("unknown pitch '{}'", note.name))
            })?;
            if !note.velocity.is_finite() {
                return Err(ScoreError::Malformed(format!(
                    "note {} at {}s has an invalid velocity",
                    note.name, note.time
                )));
            }
            let (Some(start), Some(end)) = (
                seconds(note.time),
                seconds(note.time + note.duration).filter(|_| note.duration >= 0.0),
            ) else {
                return Err(ScoreError::Malformed(format!(
                    "note {} has an invalid time {}s or duration {}s",
                    note.name, note.time, note.duration
                )));
            };

            keyed.push((
                (start, 2, index, 0),
                TimelineEvent::NoteOn {
                    note: key,
                    velocity: note.velocity.clamp(0.0, 1.0),
                    time: start,
                },
            ));
            let off_rank = if end > start { 1 } else { 2 };
            keyed.push((
                (end, off_rank, index, 1),
                TimelineEvent::NoteOff {
                    note: key,
                    time: end,
                },
            ));
        }

        for change in &self.sustain {
            let time = seconds(change.time).ok_or_else(|| {
                ScoreError::Malformed(format!("pedal change at invalid time {}s", change.time))
            })?;
            keyed.push((
                (time, 0, 0, 0),
                TimelineEvent::PedalChange {
                    value: change.value.min(127),
                    time,
                },
            ));
        }

        keyed.sort_by_key(|(key, _)| *key);
        Ok(keyed.into_iter().map(|(_, event)| event).collect())
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    fn note(name: &str, time: f64, duration: f64) -> ScoreNote {
        ScoreNote {
            name: name.to_string(),
            velocity: 0.8,
            time,
            duration,
        }
    }

    #[test]
    fn test_to_events() {
        let score = Score::new(
            vec![note("C4", 0.0, 1.0), note("C4", 1.0, 0.5), note("F#3", 0.25, 0.25)],
            vec![SustainChange {
                value: 100,
                time: 1.0,
            }],
            Some(96.0),
        );
        assert_eq!(score.duration, 1.5);

        let events = score.to_events().unwrap();
        assert_eq!(
            events,
            vec![
                TimelineEvent::NoteOn {
                    note: 60,
                    velocity: 0.8,
                    time: Duration::ZERO
                },
                TimelineEvent::NoteOn {
                    note: 54,
                    velocity: 0.8,
                    time: Duration::from_millis(250)
                },
                TimelineEvent::NoteOff {
                    note: 54,
                    time: Duration::from_millis(500)
                },
                TimelineEvent::PedalChange {
                    value: 100,
                    time: Duration::from_secs(1)
                },
                TimelineEvent::NoteOff {
                    note: 60,
                    time: Duration::from_secs(1)
                },
                TimelineEvent::NoteOn {
                    note: 60,
                    velocity: 0.8,
                    time: Duration::from_secs(1)
                },
                TimelineEvent::NoteOff {
                    note: 60,
                    time: Duration::from_millis(1500)
                },
            ]
        );
    }

    #[test]
    fn test_malformed_scores() {
        let empty = Score::new(Vec::new(), Vec::new(), None);
        assert!(matches!(empty.to_events(), Err(ScoreError::Malformed(_))));

        let bad_pitch = Score::new(vec![note("H2", 0.0, 1.0)], Vec::new(), None);
        assert!(matches!(bad_pitch.to_events(), Err(ScoreError::Malformed(_))));

        let bad_time = Score::new(vec![note("C4", -1.0, 1.0)], Vec::new(), None);
        assert!(matches!(bad_time.to_events(), Err(ScoreError::Malformed(_))));

        let bad_duration = Score::new(vec![note("C4", 1.0, -0.5)], Vec::new(), None);
        assert!(matches!(
            bad_duration.to_events(),
            Err(ScoreError::Malformed(_))
        ));

        let too_late = Score::new(vec![note("C4", 1e20, 1.0)], Vec::new(), None);
        assert!(matches!(too_late.to_events(), Err(ScoreError::Malformed(_))));

        let too_long = Score::new(vec![note("C4", 0.0, 1e20)], Vec::new(), None);
        assert!(matches!(too_long.to_events(), Err(ScoreError::Malformed(_))));

        let late_pedal = Score::new(
            vec![note("C4", 0.0, 1.0)],
            vec![SustainChange {
                value: 127,
                time: 1e20,
            }],
            None,
        );
        assert!(matches!(late_pedal.to_events(), Err(ScoreError::Malformed(_))));
    }

    #[test]
    fn test_zero_length_note_releases_after_strike() {
        let score = Score::new(
            vec![note("C4", 0.0, 0.5), note("C4", 0.5, 0.0), note("C4", 0.5, 1.0)],
            Vec::new(),
            None,
        );
        let at = Duration::from_millis(500);
        assert_eq!(
            score.to_events().unwrap(),
            vec![
                TimelineEvent::NoteOn {
                    note: 60,
                    velocity: 0.8,
                    time: Duration::ZERO
                },
                TimelineEvent::NoteOff { note: 60, time: at },
                TimelineEvent::NoteOn {
                    note: 60,
                    velocity: 0.8,
                    time: at
                },
                TimelineEvent::NoteOff { note: 60, time: at },
                TimelineEvent::NoteOn {
                    note: 60,
                    velocity: 0.8,
                    time: at
                },
                TimelineEvent::NoteOff {
                    note: 60,
                    time: Duration::from_millis(1500)
                },
            ]
        );
    }
}
