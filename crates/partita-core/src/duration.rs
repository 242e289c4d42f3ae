//! Symbolic note durations and their wall-clock length.
//!
//! A duration name ("quarter", "eighth", ...) maps to a number of beats; the
//! tempo turns beats into seconds. Unknown names never fail: they resolve
//! to [`DEFAULT_DURATION_SECS`] and log a warning so playback can continue.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Fallback length for an unrecognized duration name.
pub const DEFAULT_DURATION_SECS: f64 = 1.0;

/// Symbolic note value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NoteValue {
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
    SixtyFourth,
}

impl NoteValue {
    /// All note values, longest first.
    pub const ALL: [NoteValue; 7] = [
        NoteValue::Whole,
        NoteValue::Half,
        NoteValue::Quarter,
        NoteValue::Eighth,
        NoteValue::Sixteenth,
        NoteValue::ThirtySecond,
        NoteValue::SixtyFourth,
    ];

    /// Length in quarter-note beats.
    pub const fn beats(self) -> f64 {
        match self {
            NoteValue::Whole => 4.0,
            NoteValue::Half => 2.0,
            NoteValue::Quarter => 1.0,
            NoteValue::Eighth => 0.5,
            NoteValue::Sixteenth => 0.25,
            NoteValue::ThirtySecond => 0.125,
            NoteValue::SixtyFourth => 0.0625,
        }
    }

    /// Canonical name as written in partition documents.
    pub const fn name(self) -> &'static str {
        match self {
            NoteValue::Whole => "whole",
            NoteValue::Half => "half",
            NoteValue::Quarter => "quarter",
            NoteValue::Eighth => "eighth",
            NoteValue::Sixteenth => "sixteenth",
            NoteValue::ThirtySecond => "thirtysecond",
            NoteValue::SixtyFourth => "sixtyfourth",
        }
    }

    /// Length in seconds at `tempo_bpm` (one beat = one quarter note).
    pub fn seconds(self, tempo_bpm: f64) -> f64 {
        self.beats() * 60.0 / tempo_bpm
    }
}

impl fmt::Display for NoteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NoteValue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_' && *c != ' ')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "whole" | "ronde" => Ok(NoteValue::Whole),
            "half" | "blanche" => Ok(NoteValue::Half),
            "quarter" | "noire" => Ok(NoteValue::Quarter),
            "eighth" | "croche" => Ok(NoteValue::Eighth),
            "sixteenth" | "doublecroche" => Ok(NoteValue::Sixteenth),
            "thirtysecond" | "triplecroche" => Ok(NoteValue::ThirtySecond),
            "sixtyfourth" | "quadruplecroche" => Ok(NoteValue::SixtyFourth),
            _ => Err(format!("unknown duration '{}'", s)),
        }
    }
}

/// Resolve a duration name at a tempo to seconds.
///
/// Unknown names and non-positive tempos resolve to
/// [`DEFAULT_DURATION_SECS`] and are reported through `log::warn!`.
pub fn resolve_duration(name: &str, tempo_bpm: f64) -> f64 {
    if !(tempo_bpm.is_finite() && tempo_bpm > 0.0) {
        log::warn!(
            "Invalid tempo {} for duration '{}', using {}s",
            tempo_bpm,
            name,
            DEFAULT_DURATION_SECS
        );
        return DEFAULT_DURATION_SECS;
    }
    match name.parse::<NoteValue>() {
        Ok(value) => value.seconds(tempo_bpm),
        Err(_) => {
            log::warn!(
                "Unrecognized duration '{}', using {}s",
                name,
                DEFAULT_DURATION_SECS
            );
            DEFAULT_DURATION_SECS
        }
    }
}

/// Convert seconds to a `Duration`, clamping negatives and NaN to zero and
/// values past the representable range to `Duration::MAX`.
pub fn secs(seconds: f64) -> Duration {
    if seconds.is_nan() || seconds <= 0.0 {
        Duration::ZERO
    } else {
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_durations() {
        assert!((resolve_duration("quarter", 120.0) - 0.5).abs() < 1e-12);
        assert!((resolve_duration("whole", 60.0) - 4.0).abs() < 1e-12);
        assert!((resolve_duration("half", 120.0) - 1.0).abs() < 1e-12);
        assert!((resolve_duration("sixtyfourth", 60.0) - 0.0625).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_duration_falls_back() {
        assert_eq!(resolve_duration("dotted-breve", 120.0), DEFAULT_DURATION_SECS);
        assert_eq!(resolve_duration("", 120.0), DEFAULT_DURATION_SECS);
        assert_eq!(resolve_duration("quarter", 0.0), DEFAULT_DURATION_SECS);
    }

    #[test]
    fn test_name_variants() {
        assert_eq!("Thirty-Second".parse::<NoteValue>(), Ok(NoteValue::ThirtySecond));
        assert_eq!("sixty_fourth".parse::<NoteValue>(), Ok(NoteValue::SixtyFourth));
        assert_eq!("croche".parse::<NoteValue>(), Ok(NoteValue::Eighth));
        assert_eq!("QUARTER".parse::<NoteValue>(), Ok(NoteValue::Quarter));
    }

    #[test]
    fn test_secs_clamps() {
        assert_eq!(secs(-1.0), Duration::ZERO);
        assert_eq!(secs(f64::NAN), Duration::ZERO);
        assert_eq!(secs(0.5), Duration::from_millis(500));
        assert_eq!(secs(f64::INFINITY), Duration::MAX);
        assert_eq!(secs(NoteValue::Whole.seconds(1e-300)), Duration::MAX);
    }
}
