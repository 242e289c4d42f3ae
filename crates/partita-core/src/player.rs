//! Partition playback.
//!
//! [`PartitionPlayer::play`] fans a partition out into one task per track.
//! All tracks share a lead-in and are joined at the end; there is no
//! synchronization between them in between.

use crate::config::PlayerConfig;
use crate::error::{Error, Result};
use crate::instrument::InstrumentSelection;
use crate::keyboard::Keyboard;
use crate::partition::Partition;
use crate::scheduler::{PlaybackContext, TrackOutcome, TrackReport, TrackScheduler};
use crate::voice::{AudioSink, StopSignal};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Summary of one playback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaybackReport {
    /// One report per track, in partition order.
    pub tracks: Vec<TrackReport>,
    /// Wall-clock time from `play` to the last track finishing.
    pub elapsed: Duration,
}

impl PlaybackReport {
    /// Whether every track ran to its end.
    pub fn is_complete(&self) -> bool {
        self.tracks.iter().all(|t| t.outcome == TrackOutcome::Completed)
    }
}

/// Resets the player flags on every exit path. Cancels the playback's
/// tasks when `play` is abandoned before the join completes.
struct PlayingGuard<'a> {
    playing: &'a AtomicBool,
    interactable: &'a AtomicBool,
    signal: StopSignal,
    joined: bool,
}

impl Drop for PlayingGuard<'_> {
    fn drop(&mut self) {
        if !self.joined {
            self.signal.stop();
        }
        self.playing.store(false, Ordering::SeqCst);
        self.interactable.store(true, Ordering::SeqCst);
    }
}

/// Plays partitions through an audio sink and a keyboard.
pub struct PartitionPlayer {
    config: PlayerConfig,
    sink: Arc<dyn AudioSink>,
    keyboard: Arc<dyn Keyboard>,
    selection: Mutex<InstrumentSelection>,
    playing: AtomicBool,
    interactable: AtomicBool,
    signal: Mutex<Option<StopSignal>>,
}

impl PartitionPlayer {
    pub fn new(
        config: PlayerConfig,
        selection: InstrumentSelection,
        sink: Arc<dyn AudioSink>,
        keyboard: Arc<dyn Keyboard>,
    ) -> Self {
        Self {
            config: config.normalized(),
            sink,
            keyboard,
            selection: Mutex::new(selection),
            playing: AtomicBool::new(false),
            interactable: AtomicBool::new(true),
            signal: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Access the instrument selection.
    ///
    /// Changes affect the next playback only; a running one keeps its snapshot.
    pub fn selection(&self) -> MutexGuard<'_, InstrumentSelection> {
        self.selection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    /// Whether the play control should accept input.
    pub fn is_interactable(&self) -> bool {
        self.interactable.load(Ordering::SeqCst)
    }

    /// Decode and play a partition document.
    pub async fn play_json(&self, json: &str) -> Result<PlaybackReport> {
        let partition = Partition::from_json(json)?;
        self.play(&partition).await
    }

    /// Extract a partition from a text-generation response and play it.
    pub async fn play_completion(&self, raw: &str) -> Result<PlaybackReport> {
        let partition = Partition::from_completion(raw)?;
        self.play(&partition).await
    }

    /// Play every track of `partition` and wait for all of them.
    pub async fn play(&self, partition: &Partition) -> Result<PlaybackReport> {
        if self
            .playing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::AlreadyPlaying);
        }
        self.interactable.store(false, Ordering::SeqCst);

        let signal = StopSignal::new();
        let mut guard = PlayingGuard {
            playing: &self.playing,
            interactable: &self.interactable,
            signal: signal.clone(),
            joined: false,
        };
        *self.signal.lock().unwrap_or_else(PoisonError::into_inner) = Some(signal.clone());

        let roster = Arc::new(self.selection().snapshot()?);
        if (partition.max_track_number() as usize) > roster.len() {
            log::warn!(
                "Partition has tracks up to {} but only {} instrument(s) are selected",
                partition.max_track_number(),
                roster.len()
            );
        }

        let ctx = PlaybackContext {
            roster,
            sink: Arc::clone(&self.sink),
            keyboard: Arc::clone(&self.keyboard),
            tempo: self.config.tempo,
            base_octave: self.config.base_octave,
            octave_shift: self.config.octave_shift,
            sustain: self.config.sustain(),
        };
        let lead_in = self.config.lead_in();
        log::info!(
            "Playing {} track(s), {:.1}s at {} bpm",
            partition.tracks.len(),
            partition.seconds(self.config.tempo),
            self.config.tempo
        );

        let started = Instant::now();
        let handles: Vec<_> = partition
            .tracks
            .iter()
            .cloned()
            .map(|track| {
                let ctx = ctx.clone();
                let mut listener = signal.listener();
                tokio::spawn(async move {
                    if !listener.sleep(lead_in).await {
                        return TrackReport::cancelled(track.track_number);
                    }
                    TrackScheduler::new(ctx).run(&track, listener).await
                })
            })
            .collect();

        let mut tracks = Vec::with_capacity(handles.len());
        for (handle, track) in handles.into_iter().zip(&partition.tracks) {
            match handle.await {
                Ok(report) => tracks.push(report),
                Err(e) => {
                    log::error!("Track {} task failed: {}", track.track_number, e);
                    tracks.push(TrackReport::cancelled(track.track_number));
                }
            }
        }
        guard.joined = true;

        let report = PlaybackReport {
            tracks,
            elapsed: started.elapsed(),
        };
        if report.is_complete() {
            log::info!("Playback finished in {:.2}s", report.elapsed.as_secs_f64());
        } else {
            log::info!("Playback stopped after {:.2}s", report.elapsed.as_secs_f64());
        }
        Ok(report)
    }

    /// Cancel the current playback, including voices still ringing.
    pub fn stop(&self) {
        if let Some(signal) = self
            .signal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            log::info!("Stopping playback");
            signal.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::Instrument;
    use crate::keyboard::NullKeyboard;
    use crate::voice::NullSink;

    fn player() -> Arc<PartitionPlayer> {
        let instruments = vec![Arc::new(Instrument::with_placeholder_bank("piano", Duration::from_secs(1)))];
        Arc::new(PartitionPlayer::new(
            PlayerConfig::default(),
            InstrumentSelection::new(instruments),
            Arc::new(NullSink),
            Arc::new(NullKeyboard),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_flags_during_and_after_playback() {
        let player = player();
        assert!(!player.is_playing());
        assert!(player.is_interactable());

        let p = Arc::clone(&player);
        let task = tokio::spawn(async move {
            p.play_json(r#"{"tracks":[{"trackNumber":1,"blocks":[{"type":"note","value":"C5","duration":"whole"}]}]}"#)
                .await
        });
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(player.is_playing());
        assert!(!player.is_interactable());

        let second = player.play(&Partition::default()).await;
        assert!(matches!(second, Err(Error::AlreadyPlaying)));
        // A rejected call must not clear the running playback's flags
        assert!(player.is_playing());

        let report = task.await.unwrap().unwrap();
        assert!(report.is_complete());
        assert_eq!(report.elapsed, Duration::from_secs(3));
        assert!(!player.is_playing());
        assert!(player.is_interactable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_document_never_starts() {
        let player = player();
        let result = player.play_json(r#"{"tracks":"nope"}"#).await;
        assert!(matches!(result, Err(Error::InvalidPartition(_))));
        assert!(!player.is_playing());
        assert!(player.is_interactable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_play_future_resets_flags() {
        let player = player();
        let partition = Partition::from_json(
            r#"{"tracks":[{"trackNumber":1,"blocks":[{"type":"note","value":"C5","duration":"whole"}]}]}"#,
        )
        .unwrap();
        let result = tokio::time::timeout(Duration::from_millis(1500), player.play(&partition)).await;
        assert!(result.is_err());
        assert!(!player.is_playing());
        assert!(player.is_interactable());
    }
}
