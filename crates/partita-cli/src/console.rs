//! Console stand-ins for the audio output and the keyboard display.

use crossbeam_channel::{Receiver, RecvTimeoutError};
use partita_core::{AudioSink, KeyPress, Sample, Scale, VirtualKeyboard, VoiceId};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Audio sink that logs voices instead of playing them.
#[derive(Debug, Default)]
pub struct LogSink {
    next_id: AtomicU64,
}

impl AudioSink for LogSink {
    fn start(&self, sample: &Sample, pitch_factor: f32, volume: f32) -> VoiceId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        log::debug!(
            "voice {} start: sample '{}' x{:.3} vol {:.2}",
            id,
            sample.name,
            pitch_factor,
            volume
        );
        id
    }

    fn fade_out(&self, voice: VoiceId, duration: Duration) {
        log::trace!("voice {} fade over {:?}", voice, duration);
    }

    fn stop(&self, voice: VoiceId) {
        log::trace!("voice {} released", voice);
    }
}

const TICK: Duration = Duration::from_millis(50);

/// Print the lit keys whenever they change, until the sender side is dropped.
pub fn spawn_key_printer(
    rx: Receiver<KeyPress>,
    min_octave: i32,
    max_octave: i32,
    scale: Option<Scale>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut keyboard = VirtualKeyboard::new(min_octave, max_octave);
        if let Some(scale) = scale {
            keyboard.set_scale(scale);
        }
        let mut last_line = String::new();

        loop {
            match rx.recv_timeout(TICK) {
                Ok(press) => {
                    if !keyboard.apply(&press, Instant::now()) {
                        log::debug!("Key {} is outside the displayed range", press.note);
                    }
                    // Drain whatever else arrived at the same instant
                    while let Ok(press) = rx.try_recv() {
                        keyboard.apply(&press, Instant::now());
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            keyboard.release_expired(Instant::now());

            let line = render(&keyboard);
            if line != last_line {
                println!("{}", line);
                let _ = std::io::stdout().flush();
                last_line = line;
            }
        }
    })
}

fn render(keyboard: &VirtualKeyboard) -> String {
    let lit = keyboard.lit_tiles();
    if lit.is_empty() {
        return "♪".to_string();
    }
    let keys: Vec<String> = lit
        .iter()
        .map(|tile| {
            let marker = if keyboard.is_in_scale(tile) { "" } else { "*" };
            match keyboard.lit_color(tile) {
                Some(color) => format!("{}{} {}", tile.note(), marker, color),
                None => format!("{}{}", tile.note(), marker),
            }
        })
        .collect();
    format!("♪ {}", keys.join("  "))
}
