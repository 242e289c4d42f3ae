//! Note token parsing and resolution.
//!
//! A token is `<PitchClass><Accidental?><Octave?>`, e.g. `C`, `F#4`,
//! `ASharp3`, `Eb5`. Resolution maps it to the sample slot for its pitch
//! class and a pitch factor of `2^(octave - base_octave)`; different pitches
//! inside one octave come from different samples, never from bending.
//!
//! Compound values layer several tokens at the same instant: chords are
//! written `|C4|E4|G4|` and simultaneous notes `C4;E4;G4`.

use crate::error::NoteError;
use crate::theory::Tonality;
use std::fmt;

/// Value used in partition documents to mark an explicit rest.
pub const REST_SENTINEL: &str = "X";

/// Octaves a token may name explicitly.
pub const OCTAVE_RANGE: std::ops::RangeInclusive<i32> = -1..=10;

/// Largest octave distance from the base octave a note may resolve to.
pub const MAX_OCTAVE_DISTANCE: u32 = 12;

/// A parsed but unresolved note token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoteToken {
    pub pitch_class: Tonality,
    /// Explicit octave, `None` when the token carried no digits.
    pub octave: Option<i32>,
}

impl NoteToken {
    /// Parse a single token.
    pub fn parse(token: &str) -> Result<Self, NoteError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(NoteError::Empty);
        }

        // The octave starts at the first digit, or at a '-' directly before one
        let bytes = token.as_bytes();
        let split = token
            .char_indices()
            .find(|&(i, c)| {
                c.is_ascii_digit()
                    || (c == '-' && bytes.get(i + 1).is_some_and(|b| b.is_ascii_digit()))
            })
            .map(|(i, _)| i)
            .unwrap_or(token.len());

        let (name, octave_str) = token.split_at(split);
        let pitch_class = Tonality::from_name(name)
            .ok_or_else(|| NoteError::UnknownPitchClass(token.to_string()))?;

        let octave = if octave_str.is_empty() {
            None
        } else {
            let octave = octave_str
                .parse::<i32>()
                .map_err(|_| NoteError::MalformedOctave(token.to_string()))?;
            if !OCTAVE_RANGE.contains(&octave) {
                return Err(NoteError::OctaveOutOfRange(token.to_string()));
            }
            Some(octave)
        };

        Ok(Self {
            pitch_class,
            octave,
        })
    }

    /// Resolve against a base octave and a global octave shift.
    ///
    /// Fails when the shifted octave lies more than [`MAX_OCTAVE_DISTANCE`]
    /// octaves from `base_octave`.
    pub fn resolve(self, base_octave: i32, octave_shift: i32) -> Result<ResolvedNote, NoteError> {
        let out_of_range = || NoteError::OctaveOutOfRange(self.to_string());
        let octave = self
            .octave
            .unwrap_or(base_octave)
            .checked_add(octave_shift)
            .ok_or_else(out_of_range)?;
        let distance = octave.checked_sub(base_octave).ok_or_else(out_of_range)?;
        if distance.unsigned_abs() > MAX_OCTAVE_DISTANCE {
            return Err(out_of_range());
        }
        Ok(ResolvedNote {
            pitch_class: self.pitch_class,
            octave,
            sample_index: self.pitch_class.index(),
            pitch_factor: 2.0_f32.powi(distance),
        })
    }
}

impl fmt::Display for NoteToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.octave {
            Some(octave) => write!(f, "{}{}", self.pitch_class.name(), octave),
            None => f.write_str(self.pitch_class.name()),
        }
    }
}

/// A note ready to be sounded: which sample to play and how fast.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedNote {
    pub pitch_class: Tonality,
    pub octave: i32,
    /// Index into the instrument's 12-slot sample bank.
    pub sample_index: usize,
    /// Playback-rate multiplier, `2^(octave - base_octave)`.
    pub pitch_factor: f32,
}

impl ResolvedNote {
    /// Canonical label used for keyboard feedback, e.g. `C#4`.
    pub fn label(&self) -> String {
        format!("{}{}", self.pitch_class.name(), self.octave)
    }
}

impl fmt::Display for ResolvedNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class.name(), self.octave)
    }
}

/// Resolve one token to a sample index and pitch factor.
pub fn resolve_note(token: &str, base_octave: i32, octave_shift: i32) -> Result<ResolvedNote, NoteError> {
    NoteToken::parse(token)?.resolve(base_octave, octave_shift)
}

/// Whether a block value is the explicit rest sentinel.
pub fn is_rest(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case(REST_SENTINEL)
}

/// Split a `|`-delimited chord value into its tokens.
pub fn split_chord(value: &str) -> impl Iterator<Item = &str> {
    value.split('|').map(str::trim).filter(|s| !s.is_empty())
}

/// Split a `;`-delimited list of simultaneous notes into its tokens.
pub fn split_simultaneous(value: &str) -> impl Iterator<Item = &str> {
    value.split(';').map(str::trim).filter(|s| !s.is_empty())
}

/// Result of resolving a compound value.
#[derive(Debug, Default, Clone)]
pub struct CompoundNotes {
    pub notes: Vec<ResolvedNote>,
    /// Tokens that failed, with the reason.
    pub rejected: Vec<(String, NoteError)>,
}

/// Resolve every token in a note or chord value.
///
/// Both `|` and `;` separate tokens; each one resolves independently so a
/// single bad token does not silence the rest of the chord.
pub fn resolve_compound(value: &str, base_octave: i32, octave_shift: i32) -> CompoundNotes {
    let mut out = CompoundNotes::default();
    for part in split_chord(value) {
        for token in split_simultaneous(part) {
            match resolve_note(token, base_octave, octave_shift) {
                Ok(note) => out.notes.push(note),
                Err(e) => out.rejected.push((token.to_string(), e)),
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_octave_gives_unit_factor() {
        let note = resolve_note("C5", 5, 0).unwrap();
        assert_eq!(note.sample_index, 0);
        assert_eq!(note.octave, 5);
        assert_eq!(note.pitch_factor, 1.0);
    }

    #[test]
    fn test_octave_doubling() {
        assert_eq!(resolve_note("A6", 5, 0).unwrap().pitch_factor, 2.0);
        assert_eq!(resolve_note("A3", 5, 0).unwrap().pitch_factor, 0.25);
        assert_eq!(resolve_note("A3", 5, 0).unwrap().sample_index, 9);
    }

    #[test]
    fn test_missing_octave_uses_base() {
        let note = resolve_note("G", 4, 0).unwrap();
        assert_eq!(note.octave, 4);
        assert_eq!(note.pitch_factor, 1.0);
    }

    #[test]
    fn test_octave_shift_is_added() {
        let note = resolve_note("E4", 4, 1).unwrap();
        assert_eq!(note.octave, 5);
        assert_eq!(note.pitch_factor, 2.0);

        let note = resolve_note("E", 4, -2).unwrap();
        assert_eq!(note.octave, 2);
        assert_eq!(note.pitch_factor, 0.25);
    }

    #[test]
    fn test_accidental_forms() {
        assert_eq!(resolve_note("C#4", 4, 0).unwrap().sample_index, 1);
        assert_eq!(resolve_note("CSharp4", 4, 0).unwrap().sample_index, 1);
        assert_eq!(resolve_note("Db4", 4, 0).unwrap().sample_index, 1);
        assert_eq!(resolve_note("f#", 4, 0).unwrap().pitch_class, Tonality::FSharp);
        assert_eq!(resolve_note("C-1", 4, 0).unwrap().octave, -1);
    }

    #[test]
    fn test_rejections() {
        assert_eq!(resolve_note("", 4, 0), Err(NoteError::Empty));
        assert!(matches!(resolve_note("H4", 4, 0), Err(NoteError::UnknownPitchClass(_))));
        assert!(matches!(resolve_note("C4x", 4, 0), Err(NoteError::MalformedOctave(_))));
        assert!(matches!(resolve_note("Cmaj7", 4, 0), Err(NoteError::UnknownPitchClass(_))));
    }

    #[test]
    fn test_extreme_octaves_rejected() {
        assert!(matches!(resolve_note("C-2147483648", 5, 0), Err(NoteError::OctaveOutOfRange(_))));
        assert!(matches!(resolve_note("C-60", 5, 0), Err(NoteError::OctaveOutOfRange(_))));
        assert!(matches!(resolve_note("C11", 5, 0), Err(NoteError::OctaveOutOfRange(_))));
        assert!(matches!(resolve_note("C99999999999", 5, 0), Err(NoteError::MalformedOctave(_))));
        assert_eq!(resolve_note("C10", 5, 0).unwrap().pitch_factor, 32.0);

        // A base octave far from the token overflows or exceeds the distance bound
        assert!(matches!(resolve_note("C-1", i32::MAX, 0), Err(NoteError::OctaveOutOfRange(_))));
        assert!(matches!(resolve_note("C", i32::MAX, 2), Err(NoteError::OctaveOutOfRange(_))));
        assert!(matches!(resolve_note("C4", 40, 0), Err(NoteError::OctaveOutOfRange(_))));
    }

    #[test]
    fn test_compound_values() {
        let chord = resolve_compound("|C4|E4|G4|", 4, 0);
        assert_eq!(chord.notes.len(), 3);
        assert!(chord.rejected.is_empty());

        let layered = resolve_compound("C4; E4 ;G4", 4, 0);
        let labels: Vec<String> = layered.notes.iter().map(|n| n.label()).collect();
        assert_eq!(labels, vec!["C4", "E4", "G4"]);

        let partial = resolve_compound("|C4|Q9|G4|", 4, 0);
        assert_eq!(partial.notes.len(), 2);
        assert_eq!(partial.rejected.len(), 1);
        assert_eq!(partial.rejected[0].0, "Q9");
    }

    #[test]
    fn test_rest_sentinel() {
        assert!(is_rest("X"));
        assert!(is_rest(" x "));
        assert!(!is_rest("C4"));
    }
}
