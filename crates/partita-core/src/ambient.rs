//! Endless ambient generation.
//!
//! Two lanes run side by side until cancelled: a chord lane and a melody
//! lane. Both draw a random note value each iteration and rest some of the
//! time. The chord lane picks qualities from a small seeded palette so one
//! session keeps a coherent color; the melody lane stays on the tonic,
//! mediant and dominant.

use crate::config::PlayerConfig;
use crate::duration::{secs, NoteValue};
use crate::instrument::Instrument;
use crate::scheduler::PlaybackContext;
use crate::theory::{ChordQuality, Scale};
use crate::voice::StopListener;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Number of rotation steps that make up a palette.
pub const PALETTE_SIZE: usize = 4;

/// Scale degrees (0-based) the melody lane draws from: I, III and V.
pub const MELODY_DEGREES: [usize; 3] = [0, 2, 4];

/// Seeded source of chord qualities.
#[derive(Debug, Clone)]
pub struct ChordPalette {
    pool: Vec<ChordQuality>,
    rng: StdRng,
}

impl ChordPalette {
    /// Pool of `ROTATION[(seed + i) % 7]` for `i < PALETTE_SIZE`.
    pub fn new(seed: u64) -> Self {
        let len = ChordQuality::ROTATION.len() as u64;
        let mut pool = Vec::with_capacity(PALETTE_SIZE);
        for i in 0..PALETTE_SIZE as u64 {
            let quality = ChordQuality::ROTATION[((seed % len + i) % len) as usize];
            if !pool.contains(&quality) {
                pool.push(quality);
            }
        }
        Self {
            pool,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn pool(&self) -> &[ChordQuality] {
        &self.pool
    }

    /// Draw the next quality uniformly from the pool.
    pub fn next_quality(&mut self) -> ChordQuality {
        self.pool[self.rng.random_range(0..self.pool.len())]
    }
}

/// What the lanes produced before being cancelled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmbientReport {
    pub chords_played: usize,
    pub notes_played: usize,
    pub rests: usize,
    /// Every quality drawn by the chord lane, rested iterations included.
    pub qualities: Vec<ChordQuality>,
}

/// Settings both lanes read.
#[derive(Debug, Clone, Copy)]
struct LaneSettings {
    scale: Scale,
    rest_probability: f64,
    min_octave: i32,
    max_octave: i32,
}

impl LaneSettings {
    /// Draw a note value and decide whether this iteration rests.
    fn draw_slot(&self, rng: &mut StdRng) -> (NoteValue, bool) {
        let value = NoteValue::ALL[rng.random_range(0..NoteValue::ALL.len())];
        let rest = rng.random_bool(self.rest_probability);
        (value, rest)
    }

    fn draw_octave(&self, rng: &mut StdRng) -> i32 {
        rng.random_range(self.min_octave..=self.max_octave)
    }
}

/// Generates and plays ambient music until cancelled.
#[derive(Debug)]
pub struct AmbientGenerator {
    ctx: PlaybackContext,
    settings: LaneSettings,
    lead_in: std::time::Duration,
    palette: ChordPalette,
    timing_seed: Option<u64>,
}

impl AmbientGenerator {
    /// Build a generator from the ambient part of `config`.
    ///
    /// The palette is seeded from `config.random_seed`. Note values and rests
    /// come from entropy unless [`with_timing_seed`](Self::with_timing_seed)
    /// is used.
    pub fn new(config: &PlayerConfig, ctx: PlaybackContext) -> Self {
        let config = config.clone().normalized();
        Self {
            ctx,
            settings: LaneSettings {
                scale: config.scale(),
                rest_probability: config.rest_probability,
                min_octave: config.min_octave,
                max_octave: config.max_octave,
            },
            lead_in: config.ambient_lead_in(),
            palette: ChordPalette::new(config.random_seed),
            timing_seed: None,
        }
    }

    pub fn with_timing_seed(mut self, seed: u64) -> Self {
        self.timing_seed = Some(seed);
        self
    }

    pub fn scale(&self) -> Scale {
        self.settings.scale
    }

    pub fn palette(&self) -> &ChordPalette {
        &self.palette
    }

    fn timing_rngs(&self) -> (StdRng, StdRng) {
        match self.timing_seed {
            Some(seed) => (
                StdRng::seed_from_u64(seed),
                StdRng::seed_from_u64(seed.wrapping_add(1)),
            ),
            None => (StdRng::from_os_rng(), StdRng::from_os_rng()),
        }
    }

    /// Run both lanes until `listener` fires.
    pub async fn run(&mut self, listener: StopListener) -> AmbientReport {
        let mut lead = listener.clone();
        let mut report = AmbientReport::default();

        let chord_instrument = self.ctx.roster.instrument_for(1).cloned();
        let melody_instrument = self
            .ctx
            .roster
            .instrument_for(2)
            .or_else(|| self.ctx.roster.instrument_for(1))
            .cloned();
        if chord_instrument.is_none() {
            log::warn!("No instrument selected, ambient mode will be silent");
        }

        log::info!(
            "Ambient mode in {} with palette {:?}",
            self.settings.scale,
            self.palette.pool()
        );
        if !lead.sleep(self.lead_in).await {
            return report;
        }

        let (chord_rng, melody_rng) = self.timing_rngs();
        let chords = chord_lane(
            &self.ctx,
            self.settings,
            &mut self.palette,
            chord_instrument,
            chord_rng,
            listener.clone(),
        );
        let melody = melody_lane(&self.ctx, self.settings, melody_instrument, melody_rng, listener);
        let (chord_report, melody_report) = tokio::join!(chords, melody);

        report.chords_played = chord_report.chords_played;
        report.qualities = chord_report.qualities;
        report.notes_played = melody_report.notes_played;
        report.rests = chord_report.rests + melody_report.rests;
        log::info!(
            "Ambient mode stopped: {} chords, {} notes, {} rests",
            report.chords_played,
            report.notes_played,
            report.rests
        );
        report
    }
}

async fn chord_lane(
    ctx: &PlaybackContext,
    settings: LaneSettings,
    palette: &mut ChordPalette,
    instrument: Option<Arc<Instrument>>,
    mut rng: StdRng,
    mut listener: StopListener,
) -> AmbientReport {
    let mut report = AmbientReport::default();
    loop {
        // Drawn before the rest decision so the sequence depends on the seed alone
        let quality = palette.next_quality();
        report.qualities.push(quality);

        let (value, rest) = settings.draw_slot(&mut rng);
        let slot = secs(value.seconds(ctx.tempo));
        match instrument.as_deref() {
            Some(instrument) if !rest => {
                let degree = rng.random_range(0..7);
                let octave = settings.draw_octave(&mut rng);
                let chord = settings.scale.chord(degree, quality);
                let tokens: String = chord
                    .iter()
                    .map(|t| format!("|{}{}", t.name(), octave))
                    .collect::<String>()
                    + "|";
                log::debug!("Ambient chord {}{} {}", settings.scale.degree(degree), quality, tokens);
                if ctx.trigger(instrument, &tokens, slot, 0, &listener) > 0 {
                    report.chords_played += 1;
                }
            }
            _ => report.rests += 1,
        }

        if !listener.sleep(slot).await {
            return report;
        }
    }
}

async fn melody_lane(
    ctx: &PlaybackContext,
    settings: LaneSettings,
    instrument: Option<Arc<Instrument>>,
    mut rng: StdRng,
    mut listener: StopListener,
) -> AmbientReport {
    let mut report = AmbientReport::default();
    loop {
        let (value, rest) = settings.draw_slot(&mut rng);
        let slot = secs(value.seconds(ctx.tempo));
        match instrument.as_deref() {
            Some(instrument) if !rest => {
                let degree = MELODY_DEGREES[rng.random_range(0..MELODY_DEGREES.len())];
                let octave = settings.draw_octave(&mut rng);
                let token = format!("{}{}", settings.scale.degree(degree).name(), octave);
                if ctx.trigger(instrument, &token, slot, 0, &listener) > 0 {
                    report.notes_played += 1;
                }
            }
            _ => report.rests += 1,
        }

        if !listener.sleep(slot).await {
            return report;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_rotation() {
        use ChordQuality::*;
        assert_eq!(ChordPalette::new(0).pool(), &[Major, Minor, Dominant7, Major7]);
        assert_eq!(ChordPalette::new(5).pool(), &[Dominant9, Minor9, Major, Minor]);
        assert_eq!(ChordPalette::new(u64::MAX).pool().len(), PALETTE_SIZE);
    }

    #[test]
    fn test_palette_is_deterministic() {
        let mut a = ChordPalette::new(42);
        let mut b = ChordPalette::new(42);
        let seq_a: Vec<_> = (0..32).map(|_| a.next_quality()).collect();
        let seq_b: Vec<_> = (0..32).map(|_| b.next_quality()).collect();
        assert_eq!(seq_a, seq_b);
        assert!(seq_a.iter().all(|q| a.pool().contains(q)));
    }

    #[test]
    fn test_rest_probability_extremes() {
        let settings = LaneSettings {
            scale: Scale::new(crate::theory::Tonality::C, crate::theory::Mode::Ionian),
            rest_probability: 1.0,
            min_octave: 3,
            max_octave: 3,
        };
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            assert!(settings.draw_slot(&mut rng).1);
            assert_eq!(settings.draw_octave(&mut rng), 3);
        }
        let never = LaneSettings {
            rest_probability: 0.0,
            ..settings
        };
        assert!((0..50).all(|_| !never.draw_slot(&mut rng).1));
    }
}
