//! Per-track scheduling.
//!
//! A [`TrackScheduler`] walks one track's blocks in order. Sounding blocks
//! spawn their voices and return immediately; the cadence comes only from
//! the resolved block durations, so a voice may ring past its slot or stop
//! short of it.

use crate::duration::secs;
use crate::instrument::{Instrument, InstrumentRoster};
use crate::keyboard::Keyboard;
use crate::note::resolve_compound;
use crate::partition::{BlockKind, Track};
use crate::voice::{AudioSink, NoteVoice, StopListener};
use std::sync::Arc;
use std::time::Duration;

/// Everything a running track needs, shared by all tracks of one playback.
#[derive(Clone)]
pub struct PlaybackContext {
    pub roster: Arc<InstrumentRoster>,
    pub sink: Arc<dyn AudioSink>,
    pub keyboard: Arc<dyn Keyboard>,
    pub tempo: f64,
    pub base_octave: i32,
    pub octave_shift: i32,
    pub sustain: Duration,
}

impl PlaybackContext {
    /// Resolve `value` and start one voice per token on `instrument`.
    ///
    /// Returns the number of voices started; tokens that fail to resolve are
    /// logged and skipped.
    pub fn trigger(
        &self,
        instrument: &Instrument,
        value: &str,
        slot: Duration,
        octave_shift: i32,
        listener: &StopListener,
    ) -> usize {
        let compound = resolve_compound(value, self.base_octave, octave_shift);
        for (token, err) in &compound.rejected {
            log::warn!("Skipping note '{}': {}", token, err);
        }

        let mut started = 0;
        for note in compound.notes {
            let Some(sample) = instrument.sample_for(note.sample_index) else {
                log::warn!("Instrument '{}' has no sample for {}", instrument.name, note);
                continue;
            };
            log::debug!("Trigger {} on '{}' (x{:.3})", note, instrument.name, note.pitch_factor);
            let voice = NoteVoice {
                note,
                sample: sample.clone(),
                volume: instrument.volume,
                slot,
                sustain: self.sustain,
            };
            tokio::spawn(voice.ring(Arc::clone(&self.sink), listener.clone()));
            self.keyboard.highlight(&note.label(), slot, instrument.color);
            started += 1;
        }
        started
    }
}

impl std::fmt::Debug for PlaybackContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackContext")
            .field("instruments", &self.roster.len())
            .field("tempo", &self.tempo)
            .field("base_octave", &self.base_octave)
            .field("octave_shift", &self.octave_shift)
            .field("sustain", &self.sustain)
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackState {
    Idle,
    Running,
    /// Every block was scheduled.
    Completed,
    /// The stop signal fired before the last block ended.
    Cancelled,
}

/// How a track run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackOutcome {
    Completed,
    Cancelled,
}

/// Summary of one track run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackReport {
    pub track_number: u32,
    /// Blocks that started at least one voice.
    pub blocks_played: usize,
    /// Rests plus blocks that could not be sounded.
    pub blocks_silenced: usize,
    pub outcome: TrackOutcome,
}

impl TrackReport {
    /// Report for a track cancelled before its first block.
    pub fn cancelled(track_number: u32) -> Self {
        Self {
            track_number,
            blocks_played: 0,
            blocks_silenced: 0,
            outcome: TrackOutcome::Cancelled,
        }
    }
}

/// Plays one track.
#[derive(Debug)]
pub struct TrackScheduler {
    ctx: PlaybackContext,
    state: TrackState,
}

impl TrackScheduler {
    pub fn new(ctx: PlaybackContext) -> Self {
        Self {
            ctx,
            state: TrackState::Idle,
        }
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    /// Play every block of `track` in order, or until `listener` fires.
    pub async fn run(&mut self, track: &Track, mut listener: StopListener) -> TrackReport {
        self.state = TrackState::Running;
        let mut report = TrackReport {
            track_number: track.track_number,
            blocks_played: 0,
            blocks_silenced: 0,
            outcome: TrackOutcome::Completed,
        };

        let instrument = self.ctx.roster.instrument_for(track.track_number).cloned();
        if instrument.is_none() && !track.blocks.is_empty() {
            log::warn!(
                "No instrument selected for track {}, its blocks will be silent",
                track.track_number
            );
        }
        log::debug!("Track {} started ({} blocks)", track.track_number, track.blocks.len());

        for (index, block) in track.blocks.iter().enumerate() {
            let slot = secs(block.seconds(self.ctx.tempo));
            log::trace!(
                "Track {} block {}: {} '{}' for {:?}",
                track.track_number,
                index,
                block.kind,
                block.value,
                slot
            );

            let sounded = match (block.block_kind(), &instrument) {
                (BlockKind::Rest, _) => false,
                _ if block.is_rest() => false,
                (BlockKind::Unknown, _) => {
                    log::warn!(
                        "Track {} block {}: unknown block type '{}', resting",
                        track.track_number,
                        index,
                        block.kind
                    );
                    false
                }
                (BlockKind::Note | BlockKind::Chord, None) => false,
                (BlockKind::Note | BlockKind::Chord, Some(instrument)) => {
                    let started = self.ctx.trigger(
                        instrument,
                        &block.value,
                        slot,
                        self.ctx.octave_shift,
                        &listener,
                    );
                    if started == 0 {
                        log::warn!(
                            "Track {} block {}: nothing playable in '{}', resting",
                            track.track_number,
                            index,
                            block.value
                        );
                    }
                    started > 0
                }
            };
            if sounded {
                report.blocks_played += 1;
            } else {
                report.blocks_silenced += 1;
            }

            if !listener.sleep(slot).await {
                log::debug!("Track {} cancelled at block {}", track.track_number, index);
                report.outcome = TrackOutcome::Cancelled;
                break;
            }
        }

        self.state = match report.outcome {
            TrackOutcome::Completed => TrackState::Completed,
            TrackOutcome::Cancelled => TrackState::Cancelled,
        };
        log::debug!("Track {} finished: {:?}", track.track_number, report.outcome);
        report
    }
}
