//! Sound output port, voice ownership and cancellation.
//!
//! Every sounded note owns a [`VoiceHandle`]; dropping the handle stops the
//! sink voice, so a note task that finishes, or is cancelled, always
//! releases what it started.

use crate::instrument::Sample;
use crate::note::ResolvedNote;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Identifier a sink assigns to a started voice.
pub type VoiceId = u64;

/// Sound output.
///
/// Implementations must return quickly; long work belongs on the audio
/// thread behind the sink.
pub trait AudioSink: Send + Sync {
    /// Start playing `sample` at `pitch_factor` times its recorded rate.
    fn start(&self, sample: &Sample, pitch_factor: f32, volume: f32) -> VoiceId;

    /// Fade a voice to silence over `duration`.
    fn fade_out(&self, voice: VoiceId, duration: Duration);

    /// Stop a voice immediately and release it.
    fn stop(&self, voice: VoiceId);
}

/// Sink that plays nothing.
#[derive(Debug, Default)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn start(&self, _sample: &Sample, _pitch_factor: f32, _volume: f32) -> VoiceId {
        0
    }

    fn fade_out(&self, _voice: VoiceId, _duration: Duration) {}

    fn stop(&self, _voice: VoiceId) {}
}

/// Owner of one playing voice. Stops it on drop.
pub struct VoiceHandle {
    sink: Arc<dyn AudioSink>,
    id: VoiceId,
}

impl VoiceHandle {
    pub fn start(sink: Arc<dyn AudioSink>, sample: &Sample, pitch_factor: f32, volume: f32) -> Self {
        let id = sink.start(sample, pitch_factor, volume);
        Self { sink, id }
    }

    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn fade_out(&self, duration: Duration) {
        self.sink.fade_out(self.id, duration);
    }
}

impl Drop for VoiceHandle {
    fn drop(&mut self) {
        self.sink.stop(self.id);
    }
}

impl std::fmt::Debug for VoiceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceHandle").field("id", &self.id).finish()
    }
}

/// Cancellation source shared by everything one playback spawns.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn listener(&self) -> StopListener {
        StopListener {
            rx: self.tx.subscribe(),
        }
    }

    /// Cancel every listener. Idempotent.
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of a [`StopSignal`].
#[derive(Debug, Clone)]
pub struct StopListener {
    rx: watch::Receiver<bool>,
}

impl StopListener {
    /// A listener that is never cancelled.
    pub fn never() -> Self {
        StopSignal::new().listener()
    }

    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the signal fires.
    pub async fn stopped(&mut self) {
        let fired = self.rx.wait_for(|stopped| *stopped).await.is_ok();
        if !fired {
            // Signal dropped without firing
            std::future::pending::<()>().await;
        }
    }

    /// Sleep for `duration` unless cancelled first.
    ///
    /// Returns `true` when the full duration elapsed.
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        if self.is_stopped() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.stopped() => false,
        }
    }
}

/// One note from trigger to release.
///
/// The voice holds for its slot, then fades over `sustain`. A sample that
/// ends before the slot does is released when it ends.
#[derive(Debug, Clone)]
pub struct NoteVoice {
    pub note: ResolvedNote,
    pub sample: Sample,
    pub volume: f32,
    pub slot: Duration,
    pub sustain: Duration,
}

impl NoteVoice {
    /// How long the voice stays allocated if not cancelled.
    pub fn lifetime(&self) -> Duration {
        let ring = self.sample.length_at(self.note.pitch_factor);
        if ring <= self.slot {
            ring
        } else {
            self.slot + (ring - self.slot).min(self.sustain)
        }
    }

    /// Play the voice to completion or until `listener` fires.
    pub async fn ring(self, sink: Arc<dyn AudioSink>, mut listener: StopListener) {
        let handle = VoiceHandle::start(sink, &self.sample, self.note.pitch_factor, self.volume);
        log::debug!("Voice {} started for {}", handle.id(), self.note);

        let ring = self.sample.length_at(self.note.pitch_factor);
        if ring <= self.slot {
            if !listener.sleep(ring).await {
                log::trace!("Voice {} cancelled", handle.id());
            }
            return;
        }

        if !listener.sleep(self.slot).await {
            log::trace!("Voice {} cancelled", handle.id());
            return;
        }
        handle.fade_out(self.sustain);
        if !listener.sleep((ring - self.slot).min(self.sustain)).await {
            log::trace!("Voice {} cancelled during fade", handle.id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::resolve_note;
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Start(VoiceId),
        Fade(VoiceId, Duration),
        Stop(VoiceId),
    }

    #[derive(Default)]
    struct Recorder {
        next: Mutex<VoiceId>,
        events: Mutex<Vec<(Instant, Event)>>,
    }

    impl Recorder {
        fn events(&self) -> Vec<(Instant, Event)> {
            self.events.lock().unwrap().clone()
        }
    }

    impl AudioSink for Recorder {
        fn start(&self, _sample: &Sample, _pitch_factor: f32, _volume: f32) -> VoiceId {
            let mut next = self.next.lock().unwrap();
            *next += 1;
            self.events.lock().unwrap().push((Instant::now(), Event::Start(*next)));
            *next
        }

        fn fade_out(&self, voice: VoiceId, duration: Duration) {
            self.events.lock().unwrap().push((Instant::now(), Event::Fade(voice, duration)));
        }

        fn stop(&self, voice: VoiceId) {
            self.events.lock().unwrap().push((Instant::now(), Event::Stop(voice)));
        }
    }

    fn voice(sample_len_ms: u64, slot_ms: u64) -> NoteVoice {
        NoteVoice {
            note: resolve_note("C5", 5, 0).unwrap(),
            sample: Sample::placeholder("C", Duration::from_millis(sample_len_ms)),
            volume: 1.0,
            slot: Duration::from_millis(slot_ms),
            sustain: Duration::from_millis(500),
        }
    }

    #[test]
    fn test_handle_stops_on_drop() {
        let sink = Arc::new(Recorder::default());
        let handle = VoiceHandle::start(sink.clone(), &Sample::placeholder("C", Duration::ZERO), 1.0, 1.0);
        assert_eq!(handle.id(), 1);
        drop(handle);
        let events: Vec<Event> = sink.events().into_iter().map(|(_, e)| e).collect();
        assert_eq!(events, vec![Event::Start(1), Event::Stop(1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_sample_fades_after_slot() {
        let sink = Arc::new(Recorder::default());
        let start = Instant::now();
        let v = voice(3_000, 1_000);
        assert_eq!(v.lifetime(), Duration::from_millis(1_500));
        v.ring(sink.clone(), StopListener::never()).await;

        let events = sink.events();
        assert_eq!(events[1].1, Event::Fade(1, Duration::from_millis(500)));
        assert_eq!(events[1].0 - start, Duration::from_millis(1_000));
        assert_eq!(events[2].1, Event::Stop(1));
        assert_eq!(events[2].0 - start, Duration::from_millis(1_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_sample_released_when_it_ends() {
        let sink = Arc::new(Recorder::default());
        let start = Instant::now();
        voice(200, 1_000).ring(sink.clone(), StopListener::never()).await;

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].1, Event::Stop(1));
        assert_eq!(events[1].0 - start, Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_releases_immediately() {
        let sink = Arc::new(Recorder::default());
        let signal = StopSignal::new();
        let task = tokio::spawn(voice(3_000, 1_000).ring(sink.clone(), signal.listener()));

        tokio::time::sleep(Duration::from_millis(300)).await;
        let stopped_at = Instant::now();
        signal.stop();
        task.await.unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], (stopped_at, Event::Stop(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_listener_sleep() {
        let signal = StopSignal::new();
        let mut listener = signal.listener();
        assert!(listener.sleep(Duration::from_millis(10)).await);
        signal.stop();
        assert!(signal.is_stopped());
        assert!(!listener.sleep(Duration::from_secs(60)).await);
        // Listeners created after the stop see it too
        assert!(signal.listener().is_stopped());
    }
}
