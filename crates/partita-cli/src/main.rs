//! partita - play partitions and ambient scales from the terminal
//!
//! Plays partition documents (or text-generation responses containing one)
//! through a console audio sink, or runs the endless ambient generator.

mod console;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use partita_core::{
    key_accidentals, AmbientGenerator, ChannelKeyboard, ChordQuality, Color, Instrument,
    InstrumentSelection, Mode, Partition, PartitionPlayer, PlaybackContext, PlayerConfig, Scale,
    StopSignal, Tonality,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::console::{spawn_key_printer, LogSink};

/// Track colors, assigned to instruments in selection order.
const TRACK_COLORS: [Color; 4] = [
    Color::rgb(0x4f, 0xc3, 0xf7),
    Color::rgb(0xff, 0xb7, 0x4d),
    Color::rgb(0xae, 0xd5, 0x81),
    Color::rgb(0xf0, 0x62, 0x92),
];

#[derive(Parser)]
#[command(name = "partita")]
#[command(author, version, about = "Partition playback scheduler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (default: ~/.config/partita/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a partition file
    Play {
        /// Partition JSON file
        file: PathBuf,

        /// Tempo in beats per minute
        #[arg(short, long)]
        tempo: Option<f64>,

        /// Octaves added to every note (-2 to 2)
        #[arg(short, long, allow_hyphen_values = true)]
        octave_shift: Option<i32>,

        /// Directory of C.wav .. B.wav samples; repeat for tracks 2, 3, ...
        #[arg(short, long)]
        samples: Vec<PathBuf>,

        /// Treat the file as a raw text-generation response
        #[arg(long)]
        completion: bool,
    },
    /// Generate ambient chords and melody until interrupted
    Ambient {
        /// Chord palette seed
        #[arg(long)]
        seed: Option<u64>,

        /// Key, e.g. C, F#, Bb
        #[arg(long)]
        tonality: Option<Tonality>,

        /// Mode, e.g. ionian, dorian, aeolian
        #[arg(long)]
        mode: Option<Mode>,

        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<u64>,

        /// Directory of samples; the second one plays the melody
        #[arg(short, long)]
        samples: Vec<PathBuf>,
    },
    /// Print a scale, its chords and the key accidentals
    Scale {
        tonality: Tonality,
        mode: Mode,
    },
    /// Create a default configuration file
    Init,
    /// Show the configuration file path
    ConfigPath,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            let path = PlayerConfig::create_default_config_file()?;
            println!("Created default config at: {}", path.display());
            Ok(())
        }
        Commands::ConfigPath => {
            let path = PlayerConfig::config_path()?;
            println!("{}", path.display());
            Ok(())
        }
        Commands::Scale { tonality, mode } => {
            print_scale(Scale::new(tonality, mode));
            Ok(())
        }
        Commands::Play {
            file,
            tempo,
            octave_shift,
            samples,
            completion,
        } => {
            let mut config = load_config(cli.config)?;
            if let Some(tempo) = tempo {
                config.tempo = tempo;
            }
            if let Some(shift) = octave_shift {
                config = config.with_octave_shift(shift);
            }
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(play(config, file, samples, completion))
        }
        Commands::Ambient {
            seed,
            tonality,
            mode,
            seconds,
            samples,
        } => {
            let mut config = load_config(cli.config)?;
            if let Some(seed) = seed {
                config.random_seed = seed;
            }
            if let Some(tonality) = tonality {
                config.tonality = tonality;
            }
            if let Some(mode) = mode {
                config.mode = mode;
            }
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(ambient(config, samples, seconds.map(Duration::from_secs)))
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<PlayerConfig> {
    match path {
        Some(path) => PlayerConfig::from_file(&path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(PlayerConfig::load_or_default()),
    }
}

/// Load one instrument per sample directory, or a silent placeholder bank.
fn load_instruments(dirs: &[PathBuf]) -> Result<Vec<Arc<Instrument>>> {
    if dirs.is_empty() {
        log::info!("No sample directories given, using a silent placeholder bank");
        let placeholder = Instrument::with_placeholder_bank("console", Duration::from_secs(2))
            .with_color(TRACK_COLORS[0]);
        return Ok(vec![Arc::new(placeholder)]);
    }

    dirs.iter()
        .enumerate()
        .map(|(i, dir)| {
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("instrument{}", i + 1));
            let instrument = Instrument::load_dir(name, dir)
                .with_context(|| format!("Failed to load samples from {}", dir.display()))?
                .with_color(TRACK_COLORS[i % TRACK_COLORS.len()]);
            Ok(Arc::new(instrument))
        })
        .collect()
}

fn select_all(instruments: Vec<Arc<Instrument>>) -> InstrumentSelection {
    let count = instruments.len();
    let mut selection = InstrumentSelection::new(instruments);
    for i in 1..count {
        selection.set_selected(i, true);
    }
    selection
}

async fn play(config: PlayerConfig, file: PathBuf, samples: Vec<PathBuf>, completion: bool) -> Result<()> {
    let text = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let partition = if completion {
        Partition::from_completion(&text)?
    } else {
        Partition::from_json(&text)?
    };

    let selection = select_all(load_instruments(&samples)?);
    let (keyboard, key_rx) = ChannelKeyboard::new();
    let printer = spawn_key_printer(key_rx, config.min_octave - 2, config.max_octave + 2, None);

    let player = PartitionPlayer::new(config, selection, Arc::new(LogSink::default()), Arc::new(keyboard));
    let report = {
        let playback = player.play(&partition);
        tokio::pin!(playback);
        tokio::select! {
            report = &mut playback => report?,
            _ = tokio::signal::ctrl_c() => {
                player.stop();
                playback.await?
            }
        }
    };

    for track in &report.tracks {
        log::info!(
            "Track {}: {} played, {} silent ({:?})",
            track.track_number,
            track.blocks_played,
            track.blocks_silenced,
            track.outcome
        );
    }

    // Dropping the player closes the keyboard channel and ends the printer
    drop(player);
    let _ = printer.join();
    Ok(())
}

async fn ambient(config: PlayerConfig, samples: Vec<PathBuf>, limit: Option<Duration>) -> Result<()> {
    let config = config.normalized();
    let roster = select_all(load_instruments(&samples)?).snapshot()?;
    let (keyboard, key_rx) = ChannelKeyboard::new();
    let printer = spawn_key_printer(key_rx, config.min_octave, config.max_octave, Some(config.scale()));

    let ctx = PlaybackContext {
        roster: Arc::new(roster),
        sink: Arc::new(LogSink::default()),
        keyboard: Arc::new(keyboard),
        tempo: config.tempo,
        base_octave: config.base_octave,
        octave_shift: 0,
        sustain: config.sustain(),
    };
    let mut generator = AmbientGenerator::new(&config, ctx);
    let signal = StopSignal::new();
    let listener = signal.listener();
    let task = tokio::spawn(async move { generator.run(listener).await });

    match limit {
        Some(limit) => {
            tokio::select! {
                _ = tokio::time::sleep(limit) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        None => {
            tokio::signal::ctrl_c().await?;
        }
    }
    signal.stop();
    let report = task.await?;
    log::info!(
        "Played {} chords and {} notes ({} rests)",
        report.chords_played,
        report.notes_played,
        report.rests
    );

    let _ = printer.join();
    Ok(())
}

fn print_scale(scale: Scale) {
    println!("{}", scale);
    println!();
    for (degree, root) in scale.notes().iter().enumerate() {
        let chords: Vec<String> = ChordQuality::ROTATION
            .iter()
            .map(|quality| {
                let notes: Vec<&str> = scale.chord(degree, *quality).iter().map(|n| n.name()).collect();
                format!("{}{}=[{}]", root, quality, notes.join(" "))
            })
            .collect();
        println!("{:>3}  {}", degree + 1, chords.join("  "));
    }
    println!();

    let accidentals: Vec<&str> = key_accidentals(scale.tonality).iter().map(|n| n.name()).collect();
    if accidentals.is_empty() {
        println!("Key of {}: no accidentals", scale.tonality);
    } else {
        println!("Key of {}: {}", scale.tonality, accidentals.join(" "));
    }
}
