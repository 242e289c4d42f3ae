//! partita-core - Partition playback scheduler
//!
//! Plays partitions: documents of parallel tracks, each an ordered list of
//! note, chord and rest blocks with symbolic durations. Features include:
//!
//! - Constant music theory tables (chromatic names, 7 modes, key accidentals)
//! - Duration and note-token resolution to sample slots and pitch factors
//! - Scale and chord generation with scale-relative chord shapes
//! - One tokio task per track, joined at the end, cancellable at any sleep
//! - RAII voices with sustain fade-out and keyboard highlight feedback
//! - An endless two-lane ambient generator with a seeded chord palette
//! - TOML configuration
//!
//! # Usage as a Library
//!
//! ```no_run
//! use partita_core::{
//!     Instrument, InstrumentSelection, NullKeyboard, NullSink, PartitionPlayer, PlayerConfig,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn demo() -> partita_core::Result<()> {
//! let piano = Arc::new(Instrument::with_placeholder_bank("piano", Duration::from_secs(2)));
//! let player = PartitionPlayer::new(
//!     PlayerConfig::load_or_default(),
//!     InstrumentSelection::new(vec![piano]),
//!     Arc::new(NullSink),
//!     Arc::new(NullKeyboard),
//! );
//!
//! let report = player
//!     .play_json(r#"{"tracks":[{"trackNumber":1,"blocks":[
//!         {"type":"note","value":"C4","duration":"quarter"},
//!         {"type":"chord","value":"|C4|E4|G4|","duration":"half"}]}]}"#)
//!     .await?;
//! assert!(report.is_complete());
//! # Ok(())
//! # }
//! ```

pub mod ambient;
pub mod config;
pub mod duration;
pub mod error;
pub mod instrument;
pub mod keyboard;
pub mod note;
pub mod partition;
pub mod player;
pub mod scheduler;
pub mod theory;
pub mod voice;

// Re-export main types
pub use ambient::{AmbientGenerator, AmbientReport, ChordPalette};
pub use config::PlayerConfig;
pub use duration::{resolve_duration, NoteValue, DEFAULT_DURATION_SECS};
pub use error::{Error, NoteError, Result};
pub use instrument::{Color, Instrument, InstrumentRoster, InstrumentSelection, Sample};
pub use keyboard::{ChannelKeyboard, KeyPress, Keyboard, NullKeyboard, VirtualKeyboard};
pub use note::{resolve_compound, resolve_note, NoteToken, ResolvedNote};
pub use partition::{extract_from_completion, BlockKind, MusicBlock, Partition, Track};
pub use player::{PartitionPlayer, PlaybackReport};
pub use scheduler::{PlaybackContext, TrackOutcome, TrackReport, TrackScheduler, TrackState};
pub use theory::{key_accidentals, ChordQuality, Mode, Scale, Tonality};
pub use voice::{AudioSink, NoteVoice, NullSink, StopListener, StopSignal, VoiceHandle, VoiceId};
