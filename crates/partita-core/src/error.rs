//! Error types for partita-core

use thiserror::Error;

/// Result type alias for partita-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in partita-core
///
/// Only structural failures end up here. Anomalies inside a running
/// playback (bad notes, unknown durations, missing instruments) are logged
/// and degrade to rests instead.
#[derive(Debug, Error)]
pub enum Error {
    /// The partition document could not be decoded
    #[error("Invalid partition document: {0}")]
    InvalidPartition(#[from] serde_json::Error),

    /// A text-generation response did not contain a usable partition
    #[error("Completion error: {0}")]
    Completion(String),

    /// A playback is already in progress on this player
    #[error("A partition is already playing")]
    AlreadyPlaying,

    /// No instrument is available to build a selection from
    #[error("Instrument selection is empty")]
    EmptySelection,

    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// WAV decoding error
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Reasons a single note token is rejected by the resolver
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NoteError {
    /// Token was empty after trimming
    #[error("empty note token")]
    Empty,

    /// Pitch class letter/accidental is not one of the 12 chromatic names
    #[error("unknown pitch class in '{0}'")]
    UnknownPitchClass(String),

    /// Characters after the pitch class that are not an octave number
    #[error("malformed octave in '{0}'")]
    MalformedOctave(String),

    /// Octave outside the playable range, before or after shifting
    #[error("octave out of range in '{0}'")]
    OctaveOutOfRange(String),
}
