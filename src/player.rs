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
use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex as SyncMutex;
use tokio::{
    sync::{oneshot, Mutex},
    task::JoinHandle,
};
use tracing::{error, info, span, Level, Span};

use crate::piano::{Piano, PlaybackContext};
use crate::playsync::CancelHandle;
use crate::score::Score;
use crate::timeline::{Timeline, TimelineStatus};
use crate::util::{duration_minutes_seconds, seconds};

/// Velocity of a previewed note.
pub const PREVIEW_VELOCITY: f32 = 0.85;

/// How long a previewed note is held.
pub const PREVIEW_HOLD: Duration = Duration::from_millis(600);

/// Waits shorter than this are spun rather than slept so dispatch stays on time.
const SPIN_THRESHOLD: Duration = Duration::from_millis(2);

struct PlayHandles {
    join: JoinHandle<()>,
    cancel: CancelHandle,
}

/// Plays scores through the piano in real time, and single notes on request.
pub struct Player {
    piano: Arc<SyncMutex<Piano>>,
    /// The loaded score. Locked before the piano whenever both are needed.
    timeline: Arc<SyncMutex<Timeline>>,
    /// Voice and pedal state of previewed notes, separate from the timeline's.
    preview: SyncMutex<PlaybackContext>,
    /// Clock for previewed notes. Independent of the score position used by the transport.
    epoch: Instant,
    /// How far ahead of the clock commands are dispatched.
    lookahead: Duration,
    /// Keeps track of the transport. There should only be one task on here at a time.
    join: Arc<Mutex<Option<PlayHandles>>>,
    /// The logging span.
    span: Span,
}

impl Player {
    /// Creates a new player.
    pub fn new(piano: Piano, lookahead: Duration) -> Player {
        Player {
            piano: Arc::new(SyncMutex::new(piano)),
            timeline: Arc::new(SyncMutex::new(Timeline::new())),
            preview: SyncMutex::new(PlaybackContext::new()),
            epoch: Instant::now(),
            lookahead,
            join: Arc::new(Mutex::new(None)),
            span: span!(Level::INFO, "player"),
        }
    }

    /// Loads every sample the piano needs. Decoding runs on the blocking pool.
    pub async fn load_samples(&self) -> Result<usize, Box<dyn Error>> {
        let piano = self.piano.clone();
        let loaded = tokio::task::spawn_blocking(move || {
            let mut piano = piano.lock();
            piano.load()
        })
        .await??;
        Ok(loaded)
    }

    /// Replaces the loaded score. The new score is checked completely before anything changes,
    /// so a malformed score leaves the current one in place. Playback of the current score is
    /// stopped first.
    pub async fn load_score(&self, score: &Score) -> Result<(), Box<dyn Error>> {
        let events = score.to_events()?;
        let mut timeline = Timeline::new();
        timeline.schedule(events)?;
        timeline.set_tempo(score.tempo);
        if let Some(duration) = seconds(score.duration) {
            timeline.extend_duration(duration);
        }

        self.stop().await?;
        self.wait().await?;

        self.span.in_scope(|| {
            info!(
                notes = score.notes.len(),
                duration = duration_minutes_seconds(timeline.duration()),
                tempo = ?score.tempo,
                "Score loaded"
            )
        });
        *self.timeline.lock() = timeline;
        Ok(())
    }

    /// Starts playing the loaded score from the beginning.
    pub async fn play(&self) -> Result<(), Box<dyn Error>> {
        let mut join = self.join.lock().await;
        if join.is_some() {
            self.span
                .in_scope(|| info!("Player is already playing a score."));
            return Ok(());
        }

        if !self.piano.lock().is_loaded() {
            return Err("samples are not loaded".into());
        }
        {
            let mut timeline = self.timeline.lock();
            timeline.rewind();
            if timeline.pending() == 0 {
                return Err("no score loaded".into());
            }
        }

        let cancel_handle = CancelHandle::new();
        let (play_tx, play_rx) = oneshot::channel::<()>();

        let join_handle = {
            let piano = self.piano.clone();
            let timeline = self.timeline.clone();
            let cancel_handle = cancel_handle.clone();
            let lookahead = self.lookahead;
            tokio::task::spawn_blocking(move || {
                Player::transport(piano, timeline, lookahead, cancel_handle, play_tx);
            })
        };
        *join = Some(PlayHandles {
            join: join_handle,
            cancel: cancel_handle.clone(),
        });

        let join_mutex = self.join.clone();
        tokio::spawn(async move {
            if let Err(e) = play_rx.await {
                error!(err = e.to_string(), "Error receiving signal");
                return;
            }
            Player::finished(&mut *join_mutex.lock().await, &cancel_handle);
        });

        Ok(())
    }

    /// Runs the loaded timeline against the wall clock until the auto-stop or a cancel.
    fn transport(
        piano: Arc<SyncMutex<Piano>>,
        timeline: Arc<SyncMutex<Timeline>>,
        lookahead: Duration,
        cancel_handle: CancelHandle,
        play_tx: oneshot::Sender<()>,
    ) {
        let span = span!(Level::INFO, "transport");
        let _enter = span.enter();

        let start = Instant::now();
        let tempo = timeline.lock().tempo();
        info!(
            lookahead_ms = lookahead.as_millis(),
            tempo = ?tempo,
            "Starting playback"
        );

        loop {
            if cancel_handle.is_cancelled() {
                let elapsed = start.elapsed();
                let mut timeline = timeline.lock();
                timeline.stop(&mut piano.lock(), elapsed);
                info!(
                    position = duration_minutes_seconds(elapsed),
                    "Playback stopped"
                );
                break;
            }

            let next = {
                let mut timeline = timeline.lock();
                let status = timeline.advance(start.elapsed() + lookahead, &mut piano.lock());
                match status {
                    TimelineStatus::Running => timeline.next_time(),
                    TimelineStatus::Stopped => None,
                }
            };
            let Some(next) = next else {
                info!("Playback finished");
                break;
            };

            let wait = next.saturating_sub(start.elapsed() + lookahead);
            if wait > SPIN_THRESHOLD {
                cancel_handle.wait_timeout(wait - SPIN_THRESHOLD);
            } else {
                spin_sleep::sleep(wait);
            }
        }

        if play_tx.send(()).is_err() {
            error!("Error while sending to finish channel (receiver dropped)")
        }
    }

    /// Stops playback if a score is playing.
    pub async fn stop(&self) -> Result<(), Box<dyn Error>> {
        let join = self.join.lock().await;
        match join.as_ref() {
            Some(join) => {
                self.span.in_scope(|| info!("Stopping playback."));
                join.cancel.cancel();
            }
            None => self
                .span
                .in_scope(|| info!("Player is not active, nothing to stop.")),
        }
        Ok(())
    }

    /// Waits for the current playback to end. Returns true if there was one to wait for. The
    /// finished transport is cleared here, so waiting again returns false.
    pub async fn wait(&self) -> Result<bool, Box<dyn Error>> {
        let mut join = self.join.lock().await;
        let Some(handles) = join.as_mut() else {
            return Ok(false);
        };
        let cancel = handles.cancel.clone();
        let result = (&mut handles.join).await;
        Player::finished(&mut join, &cancel);
        result?;
        Ok(true)
    }

    /// Clears the transport slot once the transport owning `cancel` has ended. A slot already
    /// taken by a newer playback is left alone.
    fn finished(join: &mut Option<PlayHandles>, cancel: &CancelHandle) {
        if !join
            .as_ref()
            .is_some_and(|handles| handles.cancel.same_as(cancel))
        {
            return;
        }
        info!(cancelled = cancel.is_cancelled(), "Score finished playing.");
        *join = None;
    }

    /// Returns true while a score is playing.
    pub async fn is_playing(&self) -> bool {
        self.join.lock().await.is_some()
    }

    /// Plays one note outside the score: key down now, key up after `hold`.
    pub async fn preview(&self, note: u8, velocity: f32, hold: Duration) {
        {
            let mut context = self.preview.lock();
            let time = self.epoch.elapsed();
            self.piano.lock().key_down(&mut context, note, velocity, time);
        }
        tokio::time::sleep(hold).await;
        {
            let mut context = self.preview.lock();
            let time = self.epoch.elapsed();
            self.piano.lock().key_up(&mut context, note, time);
        }
    }

    /// Dispatches the whole loaded score at once, without waiting on the clock.
    pub async fn render(&self) -> Result<(), Box<dyn Error>> {
        if self.is_playing().await {
            return Err("cannot render while playing".into());
        }
        if !self.piano.lock().is_loaded() {
            return Err("samples are not loaded".into());
        }

        let mut timeline = self.timeline.lock();
        timeline.rewind();
        if timeline.pending() == 0 {
            return Err("no score loaded".into());
        }
        timeline.run_to_end(&mut self.piano.lock());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::audio::mock::{BackendCall, RecordingBackend};
    use crate::piano::test::{build, octave};
    use crate::piano::Component;
    use crate::score::{ScoreNote, SustainChange};

    fn new_player(load: bool) -> (Player, RecordingBackend) {
        let (piano, backend) = build(octave(), load);
        (Player::new(piano, Duration::from_millis(5)), backend)
    }

    fn score(length: f64) -> Score {
        Score::new(
            vec![ScoreNote {
                name: "C4".to_string(),
                velocity: 0.8,
                time: 0.0,
                duration: length,
            }],
            vec![SustainChange {
                value: 0,
                time: 0.0,
            }],
            Some(120.0),
        )
    }

    fn stop_time(backend: &RecordingBackend) -> Option<Duration> {
        backend.calls().iter().find_map(|call| match call {
            BackendCall::StopAll { time } => Some(*time),
            _ => None,
        })
    }

    #[tokio::test]
    async fn test_play_requires_samples_and_score() {
        let (player, _) = new_player(false);
        player.load_score(&score(0.1)).await.unwrap();
        assert!(player.play().await.is_err());

        let (player, _) = new_player(true);
        assert!(player.play().await.is_err());
        assert!(player.render().await.is_err());
    }

    #[tokio::test]
    async fn test_load_samples() {
        let (player, _) = new_player(false);
        assert_eq!(player.load_samples().await.unwrap(), 27);
        assert_eq!(player.load_samples().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_render() {
        let (player, backend) = new_player(true);
        player.load_score(&score(1.0)).await.unwrap();
        player.render().await.unwrap();

        let strings: Vec<_> = backend
            .starts()
            .into_iter()
            .filter(|(_, t)| t.component == Component::Strings)
            .collect();
        assert_eq!(strings.len(), 1);
        assert_eq!(backend.releases(), vec![(strings[0].0, Duration::from_secs(1))]);
        assert_eq!(stop_time(&backend), Some(Duration::from_millis(1100)));
    }

    #[tokio::test]
    async fn test_malformed_score_keeps_current() {
        let (player, backend) = new_player(true);
        player.load_score(&score(1.0)).await.unwrap();
        assert!(player
            .load_score(&Score::new(Vec::new(), Vec::new(), None))
            .await
            .is_err());

        player.render().await.unwrap();
        assert_eq!(backend.releases().len(), 1);
    }

    #[tokio::test]
    async fn test_play_to_auto_stop() {
        let (player, backend) = new_player(true);
        player.load_score(&score(0.05)).await.unwrap();
        player.play().await.unwrap();
        assert!(player.wait().await.unwrap());

        assert_eq!(backend.releases().len(), 1);
        assert_eq!(stop_time(&backend), Some(Duration::from_millis(150)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_wait_twice_then_replay() {
        let (player, backend) = new_player(true);
        player.load_score(&score(0.02)).await.unwrap();

        for _ in 0..5 {
            player.play().await.unwrap();
            assert!(player.wait().await.unwrap());
            assert!(!player.wait().await.unwrap());
            assert!(!player.is_playing().await);
        }
        assert_eq!(backend.releases().len(), 5);
    }

    #[tokio::test]
    async fn test_stop_cancels_playback() {
        let (player, backend) = new_player(true);
        player.load_score(&score(30.0)).await.unwrap();

        let start = Instant::now();
        player.play().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        player.stop().await.unwrap();
        assert!(player.wait().await.unwrap());

        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(backend.releases().is_empty());
        let stopped = stop_time(&backend).unwrap();
        assert!(stopped < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_preview_uses_player_clock() {
        let (player, backend) = new_player(true);
        player.load_score(&score(0.02)).await.unwrap();
        player.render().await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        player
            .preview(60, PREVIEW_VELOCITY, Duration::from_millis(1))
            .await;
        let preview = backend.starts().last().unwrap().1.time;
        assert!(preview >= Duration::from_millis(30));
        // The rendered score started from its own zero.
        assert_eq!(backend.starts()[0].1.time, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_preview() {
        let (player, backend) = new_player(true);
        player
            .preview(64, PREVIEW_VELOCITY, Duration::from_millis(10))
            .await;

        let starts = backend.starts();
        assert_eq!(starts[0].1.sample.as_str(), "Ds4v8");
        let releases = backend.releases();
        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].0, starts[0].0);
        assert!(releases[0].1 >= starts[0].1.time + Duration::from_millis(10));
    }
}
