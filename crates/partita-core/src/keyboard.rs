//! Keyboard feedback.
//!
//! The scheduler only needs a fire-and-forget [`Keyboard::highlight`] call
//! per sounded note. [`ChannelKeyboard`] forwards those calls over a
//! crossbeam channel so a UI thread can consume them, and
//! [`VirtualKeyboard`] is the state a UI keeps: which keys exist, which are
//! in the current scale, and which are lit until when.

use crate::instrument::Color;
use crate::note::NoteToken;
use crate::theory::{Scale, Tonality, CHROMATIC};
use crossbeam_channel::{Receiver, Sender};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Visual highlight target.
pub trait Keyboard: Send + Sync {
    /// Light the key for `note` (e.g. `C#4`) for `duration` in `color`.
    ///
    /// Must not block; the scheduler does not wait for it.
    fn highlight(&self, note: &str, duration: Duration, color: Color);
}

/// Keyboard that ignores every highlight.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullKeyboard;

impl Keyboard for NullKeyboard {
    fn highlight(&self, _note: &str, _duration: Duration, _color: Color) {}
}

/// A highlight request.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPress {
    pub note: String,
    pub duration: Duration,
    pub color: Color,
}

/// Keyboard that sends every highlight down a channel.
#[derive(Debug, Clone)]
pub struct ChannelKeyboard {
    tx: Sender<KeyPress>,
}

impl ChannelKeyboard {
    /// Create the keyboard and the receiving end for the UI.
    pub fn new() -> (Self, Receiver<KeyPress>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }
}

impl Keyboard for ChannelKeyboard {
    fn highlight(&self, note: &str, duration: Duration, color: Color) {
        let press = KeyPress {
            note: note.to_string(),
            duration,
            color,
        };
        if self.tx.send(press).is_err() {
            log::trace!("Keyboard receiver dropped, highlight for {} discarded", note);
        }
    }
}

/// One key of the virtual keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tile {
    pub tonality: Tonality,
    pub octave: i32,
}

impl Tile {
    /// Note token this key plays, e.g. `F#4`.
    pub fn note(&self) -> String {
        format!("{}{}", self.tonality.name(), self.octave)
    }
}

/// Keyboard state: tiles over an octave range, scale membership and lit keys.
#[derive(Debug, Clone)]
pub struct VirtualKeyboard {
    tiles: Vec<Tile>,
    scale: Option<Scale>,
    lit: HashMap<Tile, (Instant, Color)>,
}

impl VirtualKeyboard {
    /// Keyboard covering `min_octave..=max_octave`.
    pub fn new(min_octave: i32, max_octave: i32) -> Self {
        let tiles = (min_octave..=max_octave)
            .flat_map(|octave| CHROMATIC.into_iter().map(move |tonality| Tile { tonality, octave }))
            .collect();
        Self {
            tiles,
            scale: None,
            lit: HashMap::new(),
        }
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Mark the keys belonging to `scale`.
    pub fn set_scale(&mut self, scale: Scale) {
        self.scale = Some(scale);
    }

    /// Whether a tile's pitch class is in the current scale.
    pub fn is_in_scale(&self, tile: &Tile) -> bool {
        self.scale.is_some_and(|s| s.contains(tile.tonality))
    }

    /// Light a key until `now + duration`. Returns false when the note is
    /// not on this keyboard.
    pub fn press(&mut self, note: &str, duration: Duration, color: Color, now: Instant) -> bool {
        let Ok(token) = NoteToken::parse(note) else {
            return false;
        };
        let Some(octave) = token.octave else {
            return false;
        };
        let tile = Tile {
            tonality: token.pitch_class,
            octave,
        };
        if !self.tiles.contains(&tile) {
            return false;
        }
        self.lit.insert(tile, (now + duration, color));
        true
    }

    /// Apply a highlight request received from a [`ChannelKeyboard`].
    pub fn apply(&mut self, press: &KeyPress, now: Instant) -> bool {
        self.press(&press.note, press.duration, press.color, now)
    }

    /// Release keys whose highlight has run out; returns their notes.
    pub fn release_expired(&mut self, now: Instant) -> Vec<String> {
        let expired: Vec<Tile> = self
            .lit
            .iter()
            .filter(|(_, (until, _))| *until <= now)
            .map(|(tile, _)| *tile)
            .collect();
        for tile in &expired {
            self.lit.remove(tile);
        }
        expired.iter().map(Tile::note).collect()
    }

    /// Color a key is lit with, if it is lit.
    pub fn lit_color(&self, tile: &Tile) -> Option<Color> {
        self.lit.get(tile).map(|(_, color)| *color)
    }

    /// Lit keys in keyboard order.
    pub fn lit_tiles(&self) -> Vec<Tile> {
        self.tiles
            .iter()
            .filter(|t| self.lit.contains_key(t))
            .copied()
            .collect()
    }
}
