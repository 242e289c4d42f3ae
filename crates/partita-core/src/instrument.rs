//! Instruments, sample banks and the track → instrument mapping.
//!
//! An [`Instrument`] owns one sample per chromatic pitch class, recorded at
//! the base octave, plus a volume and a display color. Other octaves are
//! reached by changing the playback rate (see [`crate::note`]).
//!
//! The user-facing [`InstrumentSelection`] is mutable between playbacks;
//! [`InstrumentSelection::snapshot`] freezes it into an [`InstrumentRoster`]
//! that a playback reads for its whole lifetime.

use crate::error::{Error, Result};
use crate::theory::{Tonality, CHROMATIC};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Display color used for keyboard feedback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb`.
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.trim();
        let hex = s.strip_prefix('#')?;
        if hex.len() != 6 {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self::rgb(r, g, b))
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// One recorded sample.
#[derive(Clone, Debug)]
pub struct Sample {
    pub name: String,
    pub sample_rate: u32,
    pub channels: u16,
    /// Interleaved frames normalized to -1.0..=1.0. Empty for placeholders.
    pub data: Arc<[f32]>,
    length: Duration,
}

impl Sample {
    /// A sample with a length but no audio data.
    ///
    /// Used for console playback and tests where only timing matters.
    pub fn placeholder(name: impl Into<String>, length: Duration) -> Self {
        Self {
            name: name.into(),
            sample_rate: 44_100,
            channels: 1,
            data: Arc::from(Vec::new()),
            length,
        }
    }

    /// Decode a WAV file.
    pub fn from_wav(path: &Path) -> Result<Self> {
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        let data: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
            hound::SampleFormat::Int => {
                let scale = (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<std::result::Result<_, _>>()?
            }
        };
        let channels = spec.channels.max(1);
        let frames = data.len() / channels as usize;
        let length = Duration::from_secs_f64(frames as f64 / spec.sample_rate.max(1) as f64);
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            name,
            sample_rate: spec.sample_rate,
            channels,
            data: Arc::from(data),
            length,
        })
    }

    /// Length when played at the recorded rate.
    pub fn length(&self) -> Duration {
        self.length
    }

    /// Length when played at `pitch_factor` times the recorded rate.
    ///
    /// Saturates at `Duration::MAX` for factors too small to represent.
    pub fn length_at(&self, pitch_factor: f32) -> Duration {
        if pitch_factor > 0.0 && pitch_factor.is_finite() {
            Duration::try_from_secs_f64(self.length.as_secs_f64() / pitch_factor as f64)
                .unwrap_or(Duration::MAX)
        } else {
            self.length
        }
    }
}

/// A sample bank with one slot per pitch class, plus volume and color.
#[derive(Clone, Debug)]
pub struct Instrument {
    pub name: String,
    pub volume: f32,
    pub color: Color,
    samples: [Option<Sample>; 12],
}

impl Instrument {
    /// Create an instrument with an empty bank.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            volume: 1.0,
            color: Color::default(),
            samples: Default::default(),
        }
    }

    /// Create an instrument whose 12 slots are placeholders of `length`.
    pub fn with_placeholder_bank(name: impl Into<String>, length: Duration) -> Self {
        let mut instrument = Self::new(name);
        for tonality in CHROMATIC {
            instrument.set_sample(tonality, Sample::placeholder(tonality.name(), length));
        }
        instrument
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume.clamp(0.0, 1.0);
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn set_sample(&mut self, tonality: Tonality, sample: Sample) {
        self.samples[tonality.index()] = Some(sample);
    }

    /// Number of filled slots.
    pub fn sample_count(&self) -> usize {
        self.samples.iter().filter(|s| s.is_some()).count()
    }

    /// Sample for a pitch-class slot.
    ///
    /// An empty slot borrows the nearest filled neighbour, looking below
    /// first, so a partial bank still sounds every note.
    pub fn sample_for(&self, index: usize) -> Option<&Sample> {
        let index = index % 12;
        if let Some(sample) = &self.samples[index] {
            return Some(sample);
        }
        (1..=6).find_map(|distance| {
            let below = (index + 12 - distance) % 12;
            let above = (index + distance) % 12;
            self.samples[below].as_ref().or(self.samples[above].as_ref())
        })
    }

    /// Load a bank from a directory of WAV files named by pitch class.
    ///
    /// Each slot looks for `C.wav`, `C#.wav` or `CSharp.wav` (and so on).
    /// Missing slots stay empty; a directory with no matching file is an error.
    pub fn load_dir(name: impl Into<String>, dir: &Path) -> Result<Self> {
        let mut instrument = Self::new(name);
        for tonality in CHROMATIC {
            let candidates = [
                tonality.name().to_string(),
                format!("{:?}", tonality),
            ];
            for stem in candidates.iter() {
                let path = dir.join(format!("{}.wav", stem));
                if path.is_file() {
                    log::debug!("Loading sample {} for {}", path.display(), tonality);
                    instrument.set_sample(tonality, Sample::from_wav(&path)?);
                    break;
                }
            }
        }
        if instrument.sample_count() == 0 {
            return Err(Error::Config(format!(
                "No samples found in {}",
                dir.display()
            )));
        }
        log::info!(
            "Loaded instrument '{}' with {}/12 samples",
            instrument.name,
            instrument.sample_count()
        );
        Ok(instrument)
    }
}

/// Immutable mapping from track number to instrument for one playback.
#[derive(Clone, Debug, Default)]
pub struct InstrumentRoster {
    by_track: BTreeMap<u32, Arc<Instrument>>,
}

impl InstrumentRoster {
    /// Assign instruments to tracks 1..=N in order.
    pub fn from_instruments(instruments: impl IntoIterator<Item = Arc<Instrument>>) -> Self {
        let by_track = instruments
            .into_iter()
            .enumerate()
            .map(|(i, inst)| (i as u32 + 1, inst))
            .collect();
        Self { by_track }
    }

    /// Instrument for a track, `None` when the track has no assignment.
    pub fn instrument_for(&self, track_number: u32) -> Option<&Arc<Instrument>> {
        self.by_track.get(&track_number)
    }

    pub fn len(&self) -> usize {
        self.by_track.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_track.is_empty()
    }
}

/// Ordered, user-controlled list of selected instruments.
///
/// Selecting appends, deselecting removes, and the list is never left
/// empty: removing the last entry re-selects the first available
/// instrument.
#[derive(Clone, Debug)]
pub struct InstrumentSelection {
    available: Vec<Arc<Instrument>>,
    selected: Vec<usize>,
}

impl InstrumentSelection {
    /// Start with the first available instrument selected.
    pub fn new(available: Vec<Arc<Instrument>>) -> Self {
        let selected = if available.is_empty() { Vec::new() } else { vec![0] };
        Self {
            available,
            selected,
        }
    }

    pub fn available(&self) -> &[Arc<Instrument>] {
        &self.available
    }

    /// Indices into `available`, in track order.
    pub fn selected(&self) -> &[usize] {
        &self.selected
    }

    /// Select or deselect an available instrument. Out-of-range indices are ignored.
    pub fn set_selected(&mut self, index: usize, on: bool) {
        if index >= self.available.len() {
            log::warn!("Ignoring selection of unknown instrument #{}", index);
            return;
        }
        if on {
            if !self.selected.contains(&index) {
                self.selected.push(index);
            }
        } else {
            self.selected.retain(|&i| i != index);
            if self.selected.is_empty() {
                self.selected.push(0);
            }
        }
    }

    /// Whether the toggle for `index` must be locked (it is the only selection).
    pub fn is_locked(&self, index: usize) -> bool {
        self.selected.len() == 1 && self.selected[0] == index
    }

    /// 1-based track number an instrument currently plays, if selected.
    pub fn track_of(&self, index: usize) -> Option<u32> {
        self.selected
            .iter()
            .position(|&i| i == index)
            .map(|p| p as u32 + 1)
    }

    /// Freeze the current selection for one playback.
    pub fn snapshot(&self) -> Result<InstrumentRoster> {
        if self.selected.is_empty() {
            return Err(Error::EmptySelection);
        }
        Ok(InstrumentRoster::from_instruments(
            self.selected.iter().map(|&i| Arc::clone(&self.available[i])),
        ))
    }
}
