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

//! Time-ordered dispatch of a performance into the piano.

use std::time::Duration;

use tracing::{debug, info};

use crate::piano::{Piano, PlaybackContext};

/// How long after the last event the timeline stops itself.
pub const AUTO_STOP_DELAY: Duration = Duration::from_millis(100);

/// One musical event at an absolute time from the start of playback.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TimelineEvent {
    NoteOn { note: u8, velocity: f32, time: Duration },
    NoteOff { note: u8, time: Duration },
    /// A sustain pedal value, 0-127.
    PedalChange { value: u8, time: Duration },
}

impl TimelineEvent {
    pub fn time(&self) -> Duration {
        match self {
            TimelineEvent::NoteOn { time, .. }
            | TimelineEvent::NoteOff { time, .. }
            | TimelineEvent::PedalChange { time, .. } => *time,
        }
    }

    /// Pedal changes sort ahead of note events at the same time so the pedal is current when
    /// the key events are handled.
    fn rank(&self) -> u8 {
        match self {
            TimelineEvent::PedalChange { .. } => 0,
            _ => 1,
        }
    }
}

/// Rejected event sequences.
#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    #[error("event {index} at {time:?} is earlier than the event before it")]
    OutOfOrder { index: usize, time: Duration },

    #[error("event {index} has an invalid velocity {velocity}")]
    InvalidVelocity { index: usize, velocity: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Command {
    Event(TimelineEvent),
    AutoStop,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct ScheduledCommand {
    time: Duration,
    command: Command,
}

/// Whether the timeline has more to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimelineStatus {
    Running,
    Stopped,
}

/// Scheduled commands for one performance, dispatched in time order as the clock advances.
/// Playback is a single pass; there is no looping.
#[derive(Debug, Default)]
pub struct Timeline {
    /// Commands sorted by time. The auto-stop is always last.
    commands: Vec<ScheduledCommand>,
    /// Index of the next command to dispatch.
    next_command: usize,
    duration: Duration,
    /// Beats per minute, from the score's first tempo marking.
    tempo: Option<f64>,
    context: PlaybackContext,
}

impl Timeline {
    /// Creates an empty timeline.
    pub fn new() -> Timeline {
        Timeline::default()
    }

    /// Replaces everything scheduled with the events. The events must be in ascending time
    /// order; at equal times pedal changes are moved ahead of note events. A rejected sequence
    /// leaves the current schedule untouched.
    pub fn schedule(&mut self, events: Vec<TimelineEvent>) -> Result<(), TimelineError> {
        let mut last = Duration::ZERO;
        for (index, event) in events.iter().enumerate() {
            let time = event.time();
            if time < last {
                return Err(TimelineError::OutOfOrder { index, time });
            }
            if let TimelineEvent::NoteOn { velocity, .. } = event {
                if !velocity.is_finite() {
                    return Err(TimelineError::InvalidVelocity {
                        index,
                        velocity: *velocity,
                    });
                }
            }
            last = time;
        }

        let mut events = events;
        events.sort_by_key(|event| (event.time(), event.rank()));

        self.cancel();
        self.duration = last;
        self.commands = events
            .into_iter()
            .map(|event| ScheduledCommand {
                time: event.time(),
                command: Command::Event(event),
            })
            .collect();
        self.commands.push(ScheduledCommand {
            time: last.saturating_add(AUTO_STOP_DELAY),
            command: Command::AutoStop,
        });

        info!(
            events = self.commands.len() - 1,
            duration_ms = self.duration.as_millis(),
            "Timeline scheduled"
        );
        Ok(())
    }

    /// Lengthens the timeline, e.g. to let the tail of the last note ring out. Moves the
    /// auto-stop along with it.
    pub fn extend_duration(&mut self, duration: Duration) {
        if duration <= self.duration {
            return;
        }
        self.duration = duration;
        if let Some(last) = self.commands.last_mut() {
            if last.command == Command::AutoStop {
                last.time = duration.saturating_add(AUTO_STOP_DELAY);
            }
        }
    }

    pub fn set_tempo(&mut self, tempo: Option<f64>) {
        self.tempo = tempo;
    }

    pub fn tempo(&self) -> Option<f64> {
        self.tempo
    }

    /// The time of the last event.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Number of commands not yet dispatched, including the auto-stop.
    pub fn pending(&self) -> usize {
        self.commands.len() - self.next_command
    }

    /// When the next command is due.
    pub fn next_time(&self) -> Option<Duration> {
        self.commands.get(self.next_command).map(|c| c.time)
    }

    pub fn is_finished(&self) -> bool {
        self.next_command >= self.commands.len()
    }

    pub fn context(&self) -> &PlaybackContext {
        &self.context
    }

    /// Dispatches every command due at or before `until`.
    pub fn advance(&mut self, until: Duration, piano: &mut Piano) -> TimelineStatus {
        while let Some(scheduled) = self.commands.get(self.next_command).copied() {
            if scheduled.time > until {
                return TimelineStatus::Running;
            }
            self.next_command += 1;

            match scheduled.command {
                Command::Event(event) => self.dispatch(event, piano),
                Command::AutoStop => {
                    debug!(time_ms = scheduled.time.as_millis(), "Timeline auto-stop");
                    piano.stop_all(&mut self.context, scheduled.time);
                    // Single pass: anything left behind the auto-stop never plays.
                    self.next_command = self.commands.len();
                    return TimelineStatus::Stopped;
                }
            }
        }
        TimelineStatus::Stopped
    }

    /// Dispatches everything at once. Used for offline rendering.
    pub fn run_to_end(&mut self, piano: &mut Piano) {
        while self.advance(Duration::MAX, piano) == TimelineStatus::Running {}
    }

    /// Drops every pending command and returns voice and pedal state to idle. Sounding voices
    /// are not touched; see [`Timeline::stop`].
    pub fn cancel(&mut self) {
        if self.pending() > 0 {
            debug!(pending = self.pending(), "Cancelling timeline");
        }
        self.commands.clear();
        self.next_command = 0;
        self.duration = Duration::ZERO;
        self.context.reset();
    }

    /// Silences the piano and rewinds to the start so the same schedule can be played again.
    pub fn stop(&mut self, piano: &mut Piano, time: Duration) {
        piano.stop_all(&mut self.context, time);
        self.rewind();
    }

    /// Rewinds to the start without touching the piano.
    pub fn rewind(&mut self) {
        self.next_command = 0;
        self.context.reset();
    }

    fn dispatch(&mut self, event: TimelineEvent, piano: &mut Piano) {
        match event {
            TimelineEvent::NoteOn {
                note,
                velocity,
                time,
            } => piano.key_down(&mut self.context, note, velocity, time),
            TimelineEvent::NoteOff { note, time } => piano.key_up(&mut self.context, note, time),
            TimelineEvent::PedalChange { value, time } => {
                piano.pedal_change(&mut self.context, value, time);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::audio::mock::{BackendCall, RecordingBackend};
    use crate::piano::test::{build, octave};
    use crate::piano::Component;
    use crate::score::{Score, ScoreNote};

    fn secs(secs: f64) -> Duration {
        Duration::from_secs_f64(secs)
    }

    fn note_on(note: u8, velocity: f32, time: f64) -> TimelineEvent {
        TimelineEvent::NoteOn {
            note,
            velocity,
            time: secs(time),
        }
    }

    fn note_off(note: u8, time: f64) -> TimelineEvent {
        TimelineEvent::NoteOff {
            note,
            time: secs(time),
        }
    }

    fn pedal(value: u8, time: f64) -> TimelineEvent {
        TimelineEvent::PedalChange {
            value,
            time: secs(time),
        }
    }

    #[test]
    fn test_single_note() {
        let (mut piano, backend) = build(octave(), true);
        let mut timeline = Timeline::new();
        timeline
            .schedule(vec![note_on(60, 0.8, 0.0), note_off(60, 1.0)])
            .unwrap();
        timeline.run_to_end(&mut piano);

        let starts = backend.starts();
        let strings: Vec<_> = starts
            .iter()
            .filter(|(_, t)| t.component == Component::Strings)
            .collect();
        assert_eq!(strings.len(), 1);
        assert_eq!(backend.releases(), vec![(strings[0].0, secs(1.0))]);
        assert_eq!(
            backend.calls().last(),
            Some(&BackendCall::StopAll {
                time: Duration::from_millis(1100)
            })
        );
        assert!(timeline.is_finished());
    }

    #[test]
    fn test_pedal_defers_release() {
        let (mut piano, backend) = build(octave(), true);
        let mut timeline = Timeline::new();
        timeline
            .schedule(vec![
                note_on(60, 0.8, 0.0),
                pedal(100, 0.5),
                note_off(60, 1.0),
                pedal(0, 2.0),
            ])
            .unwrap();
        timeline.run_to_end(&mut piano);

        let releases = backend.releases();
        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].1, secs(2.0));
        assert_eq!(timeline.duration(), secs(2.0));
    }

    #[test]
    fn test_pedal_first_at_equal_times() {
        let (mut piano, backend) = build(octave(), true);
        let mut timeline = Timeline::new();
        // The pedal goes down at the same instant the key comes up, so the note is held.
        timeline
            .schedule(vec![note_on(60, 0.8, 0.0), note_off(60, 1.0), pedal(127, 1.0)])
            .unwrap();

        assert_eq!(timeline.advance(secs(1.0), &mut piano), TimelineStatus::Running);
        assert!(backend.releases().is_empty());
        assert_eq!(timeline.context().voices().sustained_count(), 1);

        timeline.run_to_end(&mut piano);
        assert!(backend.releases().is_empty());
        assert_eq!(timeline.context().voices().active_count(), 0);
    }

    #[test]
    fn test_incremental_advance() {
        let (mut piano, backend) = build(octave(), true);
        let mut timeline = Timeline::new();
        timeline
            .schedule(vec![note_on(60, 0.8, 0.0), note_off(60, 1.0)])
            .unwrap();
        assert_eq!(timeline.pending(), 3);
        assert_eq!(timeline.next_time(), Some(Duration::ZERO));

        assert_eq!(timeline.advance(secs(0.5), &mut piano), TimelineStatus::Running);
        assert_eq!(timeline.pending(), 2);
        assert_eq!(timeline.context().position(), Duration::ZERO);
        assert!(backend.releases().is_empty());

        assert_eq!(timeline.advance(secs(1.05), &mut piano), TimelineStatus::Running);
        assert_eq!(backend.releases().len(), 1);
        assert_eq!(timeline.next_time(), Some(Duration::from_millis(1100)));

        assert_eq!(timeline.advance(secs(2.0), &mut piano), TimelineStatus::Stopped);
        assert_eq!(timeline.context().position(), Duration::ZERO);
    }

    #[test]
    fn test_rejected_schedule_keeps_current() {
        let mut timeline = Timeline::new();
        timeline
            .schedule(vec![note_on(60, 0.8, 0.0), note_off(60, 1.0)])
            .unwrap();

        let result = timeline.schedule(vec![note_on(60, 0.8, 1.0), note_off(60, 0.5)]);
        assert!(matches!(
            result,
            Err(TimelineError::OutOfOrder { index: 1, .. })
        ));
        let result = timeline.schedule(vec![note_on(60, f32::NAN, 0.0)]);
        assert!(matches!(
            result,
            Err(TimelineError::InvalidVelocity { index: 0, .. })
        ));

        assert_eq!(timeline.pending(), 3);
        assert_eq!(timeline.duration(), secs(1.0));
    }

    #[test]
    fn test_cancel_drops_pending() {
        let (mut piano, backend) = build(octave(), true);
        let mut timeline = Timeline::new();
        timeline
            .schedule(vec![
                pedal(127, 0.0),
                note_on(60, 0.8, 0.0),
                note_off(60, 1.0),
                note_on(62, 0.8, 2.0),
            ])
            .unwrap();
        timeline.advance(secs(1.0), &mut piano);
        assert!(timeline.context().pedal().is_engaged());
        let started = backend.starts().len();

        timeline.cancel();
        assert_eq!(timeline.pending(), 0);
        assert!(timeline.is_finished());
        assert!(!timeline.context().pedal().is_engaged());
        assert_eq!(timeline.context().voices().active_count(), 0);

        assert_eq!(timeline.advance(secs(10.0), &mut piano), TimelineStatus::Stopped);
        assert_eq!(backend.starts().len(), started);
    }

    #[test]
    fn test_stop_rewinds() {
        let (mut piano, backend) = build(octave(), true);
        let mut timeline = Timeline::new();
        timeline.set_tempo(Some(120.0));
        timeline
            .schedule(vec![note_on(60, 0.8, 0.0), note_off(60, 1.0)])
            .unwrap();
        timeline.advance(secs(0.5), &mut piano);

        timeline.stop(&mut piano, secs(0.5));
        assert!(matches!(
            backend.calls().last(),
            Some(BackendCall::StopAll { .. })
        ));
        assert_eq!(timeline.pending(), 3);
        assert_eq!(timeline.tempo(), Some(120.0));
    }

    fn strings_starts(backend: &RecordingBackend) -> Vec<u64> {
        backend
            .starts()
            .into_iter()
            .filter(|(_, t)| t.component == Component::Strings)
            .map(|(source, _)| source)
            .collect()
    }

    #[test]
    fn test_zero_length_score_note_is_released() {
        let (mut piano, backend) = build(octave(), true);
        let score = Score::new(
            vec![ScoreNote {
                name: "C4".to_string(),
                velocity: 0.8,
                time: 0.5,
                duration: 0.0,
            }],
            Vec::new(),
            None,
        );
        let mut timeline = Timeline::new();
        timeline.schedule(score.to_events().unwrap()).unwrap();

        assert_eq!(timeline.advance(secs(0.5), &mut piano), TimelineStatus::Running);
        let strings = strings_starts(&backend);
        assert_eq!(strings.len(), 1);
        assert_eq!(backend.releases(), vec![(strings[0], secs(0.5))]);
        assert_eq!(timeline.context().voices().active_count(), 0);
    }

    #[test]
    fn test_zero_length_midi_notes_are_released() {
        use midly::num::{u15, u28, u4, u7};
        use midly::{Format, Header, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

        let note_on = |delta: u32, key: u8, vel: u8| TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::NoteOn {
                    key: u7::new(key),
                    vel: u7::new(vel),
                },
            },
        };
        // E4 starts and stops on the same tick; G4 is never released and is the last event.
        let mut smf = Smf::new(Header::new(
            Format::SingleTrack,
            Timing::Metrical(u15::new(480)),
        ));
        smf.tracks = vec![vec![
            note_on(0, 60, 100),
            note_on(480, 60, 0),
            note_on(0, 64, 100),
            note_on(0, 64, 0),
            note_on(480, 67, 100),
        ]];
        let mut bytes = Vec::new();
        smf.write_std(&mut bytes).unwrap();

        let (mut piano, backend) = build(octave(), true);
        let mut timeline = Timeline::new();
        let score = Score::from_smf_bytes(&bytes).unwrap();
        timeline.schedule(score.to_events().unwrap()).unwrap();
        timeline.advance(secs(1.0), &mut piano);

        let strings = strings_starts(&backend);
        assert_eq!(strings.len(), 3);
        let mut released: Vec<u64> = backend.releases().into_iter().map(|(s, _)| s).collect();
        released.sort_unstable();
        assert_eq!(released, strings);
        assert_eq!(timeline.context().voices().active_count(), 0);
    }

    #[test]
    fn test_far_future_schedule() {
        let mut timeline = Timeline::new();
        timeline
            .schedule(vec![
                note_on(60, 0.8, 0.0),
                TimelineEvent::NoteOff {
                    note: 60,
                    time: Duration::MAX,
                },
            ])
            .unwrap();
        assert_eq!(timeline.duration(), Duration::MAX);
        timeline.extend_duration(Duration::MAX);

        let (mut piano, _) = build(octave(), true);
        timeline.advance(secs(1.0), &mut piano);
        assert_eq!(timeline.next_time(), Some(Duration::MAX));
    }

    #[test]
    fn test_extend_duration_moves_auto_stop() {
        let mut timeline = Timeline::new();
        timeline
            .schedule(vec![note_on(60, 0.8, 0.0), note_off(60, 1.0)])
            .unwrap();
        timeline.extend_duration(secs(3.0));
        timeline.extend_duration(secs(2.0));
        assert_eq!(timeline.duration(), secs(3.0));

        let (mut piano, _) = build(octave(), true);
        assert_eq!(timeline.advance(secs(3.0), &mut piano), TimelineStatus::Running);
        assert_eq!(timeline.next_time(), Some(Duration::from_millis(3100)));
    }
}
