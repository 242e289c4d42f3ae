//! Music theory tables: pitch classes, diatonic modes, scales and chords.
//!
//! Everything here is pure lookup over `const` tables:
//!
//! - [`Tonality`] - the 12 chromatic pitch classes
//! - [`Mode`] - the 7 diatonic modes and their interval patterns
//! - [`Scale`] - a tonality + mode, resolved to 7 pitch classes
//! - [`ChordQuality`] - scale-relative chord shapes
//!
//! Chord offsets are counted in scale degrees (modulo the 7-note scale),
//! not in semitones, so every chord stays inside the active mode.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the 12 chromatic pitch classes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tonality {
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C#")]
    CSharp,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "D#")]
    DSharp,
    #[serde(rename = "E")]
    E,
    #[serde(rename = "F")]
    F,
    #[serde(rename = "F#")]
    FSharp,
    #[serde(rename = "G")]
    G,
    #[serde(rename = "G#")]
    GSharp,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A#")]
    ASharp,
    #[serde(rename = "B")]
    B,
}

/// Chromatic note index map, ordered by semitone from C.
pub const CHROMATIC: [Tonality; 12] = [
    Tonality::C,
    Tonality::CSharp,
    Tonality::D,
    Tonality::DSharp,
    Tonality::E,
    Tonality::F,
    Tonality::FSharp,
    Tonality::G,
    Tonality::GSharp,
    Tonality::A,
    Tonality::ASharp,
    Tonality::B,
];

impl Tonality {
    /// Semitone index from C (0-11).
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Pitch class for a semitone index, wrapping modulo 12.
    pub const fn from_index(index: usize) -> Self {
        CHROMATIC[index % 12]
    }

    /// Canonical display name (`C`, `C#`, ...).
    pub const fn name(self) -> &'static str {
        match self {
            Tonality::C => "C",
            Tonality::CSharp => "C#",
            Tonality::D => "D",
            Tonality::DSharp => "D#",
            Tonality::E => "E",
            Tonality::F => "F",
            Tonality::FSharp => "F#",
            Tonality::G => "G",
            Tonality::GSharp => "G#",
            Tonality::A => "A",
            Tonality::ASharp => "A#",
            Tonality::B => "B",
        }
    }

    /// Whether this pitch class sits on a black key.
    pub const fn is_sharp(self) -> bool {
        matches!(
            self,
            Tonality::CSharp | Tonality::DSharp | Tonality::FSharp | Tonality::GSharp | Tonality::ASharp
        )
    }

    /// Transposition factor relative to C within one octave, `2^(index/12)`.
    ///
    /// Used to retune a drone sample recorded on C to the selected key.
    pub fn pitch_adjustment(self) -> f32 {
        2.0_f32.powf(self.index() as f32 / 12.0)
    }

    /// Parse a pitch class name: a letter followed by an optional accidental.
    ///
    /// Accepts `#`, `♯`, `Sharp` for sharps and `b`, `♭`, `Flat` for flats.
    /// Flats resolve to the enharmonic sharp. Returns `None` for anything else.
    pub fn from_name(name: &str) -> Option<Self> {
        let mut chars = name.chars();
        let base: i32 = match chars.next()?.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return None,
        };
        let accidental = chars.as_str();
        let shift = match accidental {
            "" => 0,
            "#" | "♯" => 1,
            "b" | "♭" => -1,
            s if s.eq_ignore_ascii_case("sharp") => 1,
            s if s.eq_ignore_ascii_case("flat") => -1,
            _ => return None,
        };
        Some(Self::from_index((base + shift).rem_euclid(12) as usize))
    }
}

impl fmt::Display for Tonality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tonality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tonality::from_name(s.trim()).ok_or_else(|| format!("unknown tonality '{}'", s))
    }
}

/// One of the 7 diatonic modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Ionian,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Aeolian,
    Locrian,
}

/// Interval patterns in semitones, indexed by `Mode as usize`. Each row sums to 12.
const MODE_INTERVALS: [[u8; 7]; 7] = [
    [2, 2, 1, 2, 2, 2, 1], // Ionian
    [2, 1, 2, 2, 2, 1, 2], // Dorian
    [1, 2, 2, 2, 1, 2, 2], // Phrygian
    [2, 2, 2, 1, 2, 2, 1], // Lydian
    [2, 2, 1, 2, 2, 1, 2], // Mixolydian
    [2, 1, 2, 2, 1, 2, 2], // Aeolian
    [1, 2, 2, 1, 2, 2, 2], // Locrian
];

impl Mode {
    /// All modes in table order.
    pub const ALL: [Mode; 7] = [
        Mode::Ionian,
        Mode::Dorian,
        Mode::Phrygian,
        Mode::Lydian,
        Mode::Mixolydian,
        Mode::Aeolian,
        Mode::Locrian,
    ];

    /// Whole/half step pattern for this mode.
    pub const fn intervals(self) -> [u8; 7] {
        MODE_INTERVALS[self as usize]
    }

    pub const fn name(self) -> &'static str {
        match self {
            Mode::Ionian => "ionian",
            Mode::Dorian => "dorian",
            Mode::Phrygian => "phrygian",
            Mode::Lydian => "lydian",
            Mode::Mixolydian => "mixolydian",
            Mode::Aeolian => "aeolian",
            Mode::Locrian => "locrian",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ionian" | "ionien" | "major" => Ok(Mode::Ionian),
            "dorian" | "dorien" => Ok(Mode::Dorian),
            "phrygian" | "phrygien" => Ok(Mode::Phrygian),
            "lydian" | "lydien" => Ok(Mode::Lydian),
            "mixolydian" | "mixolydien" => Ok(Mode::Mixolydian),
            "aeolian" | "aeolien" | "minor" => Ok(Mode::Aeolian),
            "locrian" | "locrien" => Ok(Mode::Locrian),
            other => Err(format!("unknown mode '{}'", other)),
        }
    }
}

/// Accidentals shown for each key, indexed by `Tonality::index()`.
const KEY_ACCIDENTALS: [&[Tonality]; 12] = [
    &[],
    &[Tonality::CSharp, Tonality::FSharp, Tonality::GSharp],
    &[Tonality::FSharp],
    &[Tonality::CSharp, Tonality::FSharp, Tonality::GSharp],
    &[Tonality::FSharp, Tonality::CSharp],
    &[],
    &[Tonality::FSharp],
    &[Tonality::FSharp],
    &[Tonality::FSharp, Tonality::CSharp],
    &[Tonality::FSharp, Tonality::CSharp],
    &[Tonality::FSharp, Tonality::CSharp, Tonality::GSharp],
    &[Tonality::FSharp, Tonality::CSharp, Tonality::GSharp, Tonality::DSharp],
];

/// Key-accidental table lookup.
pub fn key_accidentals(tonality: Tonality) -> &'static [Tonality] {
    KEY_ACCIDENTALS[tonality.index()]
}

/// Chord shape, expressed as scale-degree offsets from the chord root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChordQuality {
    Major,
    Minor,
    Dominant7,
    Major7,
    Minor7,
    Dominant9,
    Minor9,
    Diminished,
}

impl ChordQuality {
    /// The rotation order used by the ambient palette.
    pub const ROTATION: [ChordQuality; 7] = [
        ChordQuality::Major,
        ChordQuality::Minor,
        ChordQuality::Dominant7,
        ChordQuality::Major7,
        ChordQuality::Minor7,
        ChordQuality::Dominant9,
        ChordQuality::Minor9,
    ];

    /// Scale-degree offsets, taken modulo 7 when applied.
    pub const fn offsets(self) -> &'static [usize] {
        match self {
            ChordQuality::Major => &[0, 4, 7],
            ChordQuality::Minor => &[0, 3, 7],
            ChordQuality::Dominant7 => &[0, 4, 7, 10],
            ChordQuality::Major7 => &[0, 4, 7, 11],
            ChordQuality::Minor7 => &[0, 3, 7, 10],
            ChordQuality::Dominant9 => &[0, 4, 7, 10, 2],
            ChordQuality::Minor9 => &[0, 3, 7, 10, 2],
            ChordQuality::Diminished => &[0, 3, 6],
        }
    }

    /// Short chord symbol (`maj`, `m7`, ...).
    pub const fn symbol(self) -> &'static str {
        match self {
            ChordQuality::Major => "maj",
            ChordQuality::Minor => "m",
            ChordQuality::Dominant7 => "7",
            ChordQuality::Major7 => "maj7",
            ChordQuality::Minor7 => "m7",
            ChordQuality::Dominant9 => "9",
            ChordQuality::Minor9 => "m9",
            ChordQuality::Diminished => "dim",
        }
    }
}

impl fmt::Display for ChordQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A diatonic scale: 7 pitch classes derived from a tonality and a mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scale {
    pub tonality: Tonality,
    pub mode: Mode,
    notes: [Tonality; 7],
}

impl Scale {
    /// Build the scale by cumulative-summing the mode intervals from the root.
    pub fn new(tonality: Tonality, mode: Mode) -> Self {
        let intervals = mode.intervals();
        let mut notes = [tonality; 7];
        let mut index = tonality.index();
        for (slot, step) in notes.iter_mut().skip(1).zip(intervals.iter()) {
            index = (index + *step as usize) % 12;
            *slot = Tonality::from_index(index);
        }
        Self {
            tonality,
            mode,
            notes,
        }
    }

    /// The 7 scale degrees, root first.
    pub fn notes(&self) -> &[Tonality; 7] {
        &self.notes
    }

    /// The 8-note form with the root repeated at the octave.
    pub fn with_octave(&self) -> [Tonality; 8] {
        let mut out = [self.tonality; 8];
        out[..7].copy_from_slice(&self.notes);
        out
    }

    /// Pitch class at a 0-based degree, wrapping around the scale.
    pub fn degree(&self, degree: usize) -> Tonality {
        self.notes[degree % 7]
    }

    pub fn contains(&self, tonality: Tonality) -> bool {
        self.notes.contains(&tonality)
    }

    /// Build a chord rooted on `degree`.
    ///
    /// Offsets are applied in scale degrees modulo 7, duplicates are dropped
    /// and the root comes first. In Locrian the plain triads use the
    /// diminished shape (minor third + flat fifth).
    pub fn chord(&self, degree: usize, quality: ChordQuality) -> Vec<Tonality> {
        let quality = match (self.mode, quality) {
            (Mode::Locrian, ChordQuality::Major | ChordQuality::Minor) => ChordQuality::Diminished,
            (_, q) => q,
        };
        let mut notes = Vec::with_capacity(quality.offsets().len());
        for offset in quality.offsets() {
            let note = self.degree(degree + offset);
            if !notes.contains(&note) {
                notes.push(note);
            }
        }
        notes
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.notes.iter().map(|n| n.name()).collect();
        write!(f, "{} {}: {}", self.tonality, self.mode, names.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_scale_starts_on_root_and_closes_the_octave() {
        for tonality in CHROMATIC {
            for mode in Mode::ALL {
                let scale = Scale::new(tonality, mode);
                assert_eq!(scale.notes()[0], tonality);
                assert_eq!(scale.notes().len(), 7);

                let total: u32 = mode.intervals().iter().map(|&i| i as u32).sum();
                assert_eq!(total, 12, "{} intervals", mode);

                // Walking the last interval from the 7th degree lands back on the root
                let last = scale.notes()[6].index() + mode.intervals()[6] as usize;
                assert_eq!(Tonality::from_index(last), tonality);
            }
        }
    }

    #[test]
    fn test_c_ionian_and_a_aeolian() {
        use Tonality::*;
        assert_eq!(Scale::new(C, Mode::Ionian).notes(), &[C, D, E, F, G, A, B]);
        assert_eq!(Scale::new(A, Mode::Aeolian).notes(), &[A, B, C, D, E, F, G]);
        assert_eq!(Scale::new(D, Mode::Dorian).notes(), &[D, E, F, G, A, B, C]);
        assert_eq!(
            Scale::new(FSharp, Mode::Ionian).notes(),
            &[FSharp, GSharp, ASharp, B, CSharp, DSharp, F]
        );
    }

    #[test]
    fn test_with_octave_repeats_root() {
        let scale = Scale::new(Tonality::G, Mode::Mixolydian);
        let full = scale.with_octave();
        assert_eq!(full[0], Tonality::G);
        assert_eq!(full[7], Tonality::G);
    }

    #[test]
    fn test_chords_use_scale_relative_offsets() {
        use Tonality::*;
        let scale = Scale::new(C, Mode::Ionian);
        // degrees 0, 4, 7%7=0 -> root and fifth
        assert_eq!(scale.chord(0, ChordQuality::Major), vec![C, G]);
        assert_eq!(scale.chord(0, ChordQuality::Minor), vec![C, F]);
        assert_eq!(scale.chord(0, ChordQuality::Dominant7), vec![C, G, F]);
        assert_eq!(scale.chord(0, ChordQuality::Major7), vec![C, G]);
        assert_eq!(scale.chord(0, ChordQuality::Dominant9), vec![C, G, F, E]);
        assert_eq!(scale.chord(1, ChordQuality::Minor9), vec![D, G, F]);
    }

    #[test]
    fn test_locrian_triads_are_diminished() {
        use Tonality::*;
        let scale = Scale::new(B, Mode::Locrian);
        assert_eq!(scale.notes(), &[B, C, D, E, F, G, A]);
        let major = scale.chord(0, ChordQuality::Major);
        assert_eq!(major, scale.chord(0, ChordQuality::Diminished));
        assert_eq!(major, vec![B, E, A]);
        // Seventh chords keep their own shape
        assert_eq!(scale.chord(0, ChordQuality::Major7), vec![B, F]);
    }

    #[test]
    fn test_tonality_names_and_parsing() {
        assert_eq!(Tonality::from_name("C"), Some(Tonality::C));
        assert_eq!(Tonality::from_name("c#"), Some(Tonality::CSharp));
        assert_eq!(Tonality::from_name("FSharp"), Some(Tonality::FSharp));
        assert_eq!(Tonality::from_name("Db"), Some(Tonality::CSharp));
        assert_eq!(Tonality::from_name("Cb"), Some(Tonality::B));
        assert_eq!(Tonality::from_name("H"), None);
        assert_eq!(Tonality::from_name("C##"), None);
        assert_eq!("A#".parse::<Tonality>().unwrap(), Tonality::ASharp);
        assert_eq!(Tonality::GSharp.to_string(), "G#");
    }

    #[test]
    fn test_mode_parsing_accepts_french_names() {
        assert_eq!("Locrien".parse::<Mode>().unwrap(), Mode::Locrian);
        assert_eq!("dorian".parse::<Mode>().unwrap(), Mode::Dorian);
        assert!("blues".parse::<Mode>().is_err());
    }

    #[test]
    fn test_key_accidentals_table() {
        assert!(key_accidentals(Tonality::C).is_empty());
        assert_eq!(key_accidentals(Tonality::D), &[Tonality::FSharp]);
        assert_eq!(key_accidentals(Tonality::B).len(), 4);
    }

    #[test]
    fn test_pitch_adjustment() {
        assert!((Tonality::C.pitch_adjustment() - 1.0).abs() < 1e-6);
        assert!((Tonality::FSharp.pitch_adjustment() - 2.0_f32.sqrt()).abs() < 1e-5);
    }
}
