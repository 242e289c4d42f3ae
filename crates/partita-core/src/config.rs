//! Configuration file support.
//!
//! Configuration is stored in TOML format at:
//! - Linux: `~/.config/partita/config.toml`
//! - macOS: `~/Library/Application Support/partita/config.toml`
//! - Windows: `%APPDATA%\partita\config.toml`

use crate::duration::secs;
use crate::error::{Error, Result};
use crate::theory::{Mode, Scale, Tonality};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Allowed range of the global octave shift.
pub const OCTAVE_SHIFT_RANGE: std::ops::RangeInclusive<i32> = -2..=2;

/// Playback and ambient-generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Beats per minute; one beat is a quarter note
    pub tempo: f64,
    /// Fade-out length in seconds once a note's slot ends
    pub sustain: f64,
    /// Octave the sample banks were recorded at
    pub base_octave: i32,
    /// Lowest octave the ambient generator picks
    pub min_octave: i32,
    /// Highest octave the ambient generator picks
    pub max_octave: i32,
    /// Octaves added to every partition note, -2..=2
    pub octave_shift: i32,
    /// Delay before partition tracks start
    pub lead_in_ms: u64,
    /// Delay before the ambient lanes start
    pub ambient_lead_in_ms: u64,
    /// Seed of the ambient chord palette
    pub random_seed: u64,
    /// Chance an ambient iteration rests
    pub rest_probability: f64,
    /// Ambient key
    pub tonality: Tonality,
    /// Ambient mode
    pub mode: Mode,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            tempo: 120.0,
            sustain: 0.5,
            base_octave: 5,
            min_octave: 3,
            max_octave: 6,
            octave_shift: 0,
            lead_in_ms: 1000,
            ambient_lead_in_ms: 2000,
            random_seed: 0,
            rest_probability: 0.2,
            tonality: Tonality::C,
            mode: Mode::Ionian,
        }
    }
}

impl PlayerConfig {
    /// Load configuration from the default config file location
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::from_file(&path)
        } else {
            Err(Error::Config(format!("Config file not found at {:?}", path)))
        }
    }

    /// Load configuration or return default if not found
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(Error::Config(msg)) => {
                log::debug!("{}, using defaults", msg);
                Self::default()
            }
            Err(e) => {
                log::warn!("Ignoring unreadable config: {}", e);
                Self::default()
            }
        }
    }

    /// Load configuration from an explicit path
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: PlayerConfig = toml::from_str(&content)?;
        Ok(config.normalized())
    }

    /// Save configuration to the default config file location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = ProjectDirs::from("", "", "partita") {
            Ok(proj_dirs.config_dir().join("config.toml"))
        } else {
            Err(Error::Config("Could not determine config directory".to_string()))
        }
    }

    /// Create a default config file with comments
    pub fn create_default_config_file() -> Result<PathBuf> {
        let path = Self::config_path()?;
        Self::write_default_config(&path)?;
        Ok(path)
    }

    pub fn write_default_config(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = r#"# partita configuration file

# Beats per minute (one beat = one quarter note)
tempo = 120.0

# Fade-out in seconds applied when a note outlasts its slot
sustain = 0.5

# Octave the sample banks were recorded at
base_octave = 5

# Octave range for ambient mode
min_octave = 3
max_octave = 6

# Octaves added to every partition note (-2 to 2)
octave_shift = 0

# Lead-in before playback starts, in milliseconds
lead_in_ms = 1000
ambient_lead_in_ms = 2000

# Ambient mode: chord palette seed, rest chance, key and mode
random_seed = 0
rest_probability = 0.2
tonality = "C"
mode = "ionian"
"#;

        fs::write(path, content)?;
        Ok(())
    }

    /// Clamp out-of-range values into their valid ranges.
    pub fn normalized(mut self) -> Self {
        if !(self.tempo.is_finite() && self.tempo > 0.0) {
            let tempo = PlayerConfig::default().tempo;
            log::warn!("tempo {} is not a positive number, using {}", self.tempo, tempo);
            self.tempo = tempo;
        }
        let shift = self
            .octave_shift
            .clamp(*OCTAVE_SHIFT_RANGE.start(), *OCTAVE_SHIFT_RANGE.end());
        if shift != self.octave_shift {
            log::warn!("octave_shift {} out of range, using {}", self.octave_shift, shift);
            self.octave_shift = shift;
        }
        if self.min_octave > self.max_octave {
            log::warn!(
                "min_octave {} above max_octave {}, swapping",
                self.min_octave,
                self.max_octave
            );
            std::mem::swap(&mut self.min_octave, &mut self.max_octave);
        }
        self.rest_probability = if self.rest_probability.is_finite() {
            self.rest_probability.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    pub fn with_octave_shift(mut self, shift: i32) -> Self {
        self.octave_shift = shift;
        self.normalized()
    }

    pub fn lead_in(&self) -> Duration {
        Duration::from_millis(self.lead_in_ms)
    }

    pub fn ambient_lead_in(&self) -> Duration {
        Duration::from_millis(self.ambient_lead_in_ms)
    }

    pub fn sustain(&self) -> Duration {
        secs(self.sustain)
    }

    /// The ambient scale.
    pub fn scale(&self) -> Scale {
        Scale::new(self.tonality, self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlayerConfig::default();
        assert_eq!(config.tempo, 120.0);
        assert_eq!(config.base_octave, 5);
        assert_eq!(config.lead_in(), Duration::from_secs(1));
        assert_eq!(config.ambient_lead_in(), Duration::from_secs(2));
        assert_eq!(config.sustain(), Duration::from_millis(500));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = PlayerConfig {
            tonality: Tonality::FSharp,
            mode: Mode::Dorian,
            ..PlayerConfig::default()
        };
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("tonality = \"F#\""));
        let parsed: PlayerConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_template_parses_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        PlayerConfig::write_default_config(&path).unwrap();
        assert_eq!(PlayerConfig::from_file(&path).unwrap(), PlayerConfig::default());
    }

    #[test]
    fn test_partial_file_and_normalization() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "tempo = 90.0\noctave_shift = 5\nmin_octave = 7\nmax_octave = 2\n").unwrap();
        let config = PlayerConfig::from_file(&path).unwrap();
        assert_eq!(config.tempo, 90.0);
        assert_eq!(config.octave_shift, 2);
        assert_eq!((config.min_octave, config.max_octave), (2, 7));
        assert_eq!(config.sustain, 0.5);

        fs::write(&path, "tempo = -4.0\nsustain = 1e300\n").unwrap();
        let config = PlayerConfig::from_file(&path).unwrap();
        assert_eq!(config.tempo, 120.0);
        assert_eq!(config.sustain(), Duration::MAX);

        fs::write(&path, "tempo = \"fast\"").unwrap();
        assert!(matches!(PlayerConfig::from_file(&path), Err(Error::TomlParse(_))));
    }

    #[test]
    fn test_save_to() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.toml");
        let config = PlayerConfig::default().with_octave_shift(-3);
        assert_eq!(config.octave_shift, -2);
        config.save_to(&path).unwrap();
        assert_eq!(PlayerConfig::from_file(&path).unwrap(), config);
    }
}
