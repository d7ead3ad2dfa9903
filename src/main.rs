//! Command line front end: inspect, render to WAV, or play chiptune files.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use squarewave::export::render_to_wav;
use squarewave::{EngineConfig, PlaybackEngine, TrackInfo};

#[derive(Parser)]
#[command(name = "squarewave")]
#[command(about = "Play, inspect and render YM/AY chiptunes", version)]
struct Cli {
    /// JSON engine configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print metadata of every track as JSON
    Info {
        /// Chiptune file
        file: PathBuf,

        /// Pretty print JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Render one track to a WAV file
    Render {
        /// Chiptune file
        file: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// Maximum length in seconds (defaults to the track's play length)
        #[arg(long)]
        seconds: Option<f64>,

        #[command(flatten)]
        transport: TransportArgs,
    },
    /// Play through the default audio device
    #[cfg(feature = "streaming")]
    Play {
        /// Chiptune file
        file: PathBuf,

        /// Output volume (1.0 = unity)
        #[arg(long, default_value_t = 1.0)]
        volume: f32,

        #[command(flatten)]
        transport: TransportArgs,
    },
}

#[derive(Args)]
struct TransportArgs {
    /// 0-based track index
    #[arg(short, long, default_value_t = 0)]
    track: usize,

    /// Playback speed multiplier (0.02 to 4.0)
    #[arg(long, default_value_t = 1.0)]
    tempo: f64,

    /// Voice mute bitmask (bit 0 = first voice)
    #[arg(long, default_value_t = 0)]
    mute: u32,

    /// Fade out over this many milliseconds from the start
    #[arg(long)]
    fade: Option<u32>,

    /// Fade out when the track reaches its play length
    #[arg(long)]
    auto_fade: bool,

    /// Keep playing through long silences
    #[arg(long)]
    ignore_silence: bool,
}

impl TransportArgs {
    fn apply(&self, engine: &PlaybackEngine) -> Result<()> {
        engine.set_mute_voices(self.mute);
        engine.set_tempo(self.tempo)?;
        engine.ignore_silence(self.ignore_silence);
        if let Some(ms) = self.fade {
            engine.set_fade_time(ms);
        }
        if self.auto_fade {
            engine.fade_out_at_play_length();
        }
        engine
            .set_track(self.track)
            .with_context(|| format!("cannot select track {}", self.track))?;
        Ok(())
    }
}

#[derive(Serialize)]
struct FileReport {
    path: String,
    format: String,
    voices: Vec<String>,
    tracks: Vec<TrackInfo>,
}

fn open_engine(config: Option<&Path>, file: &Path) -> Result<PlaybackEngine> {
    let config = match config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let engine = PlaybackEngine::with_config(config)?;
    engine
        .set_file(file)
        .with_context(|| format!("failed to open {}", file.display()))?;
    Ok(engine)
}

fn info(engine: &PlaybackEngine, file: &Path, pretty: bool) -> Result<()> {
    let voices = (0..engine.voice_count()?)
        .map(|i| engine.voice_name(i))
        .collect::<squarewave::Result<Vec<_>>>()?;
    let mut tracks = Vec::new();
    for track in 0..engine.track_count()? {
        tracks.push(engine.probe_track_info(file, track)?);
    }
    let report = FileReport {
        path: file.display().to_string(),
        format: engine.format_name()?.to_string(),
        voices,
        tracks,
    };
    let json = if pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", json);
    Ok(())
}

fn render(
    engine: &PlaybackEngine,
    output: &Path,
    seconds: Option<f64>,
    transport: &TransportArgs,
) -> Result<()> {
    transport.apply(engine)?;
    let seconds = match seconds {
        Some(s) if s.is_finite() && s > 0.0 => s,
        Some(s) => bail!("--seconds must be positive, got {}", s),
        None => engine.current_track_info()?.play_length_ms as f64 / 1000.0,
    };
    let frames = render_to_wav(engine, output, seconds)?;
    println!(
        "Rendered {:.1}s to {}",
        frames as f64 / engine.sample_rate() as f64,
        output.display()
    );
    Ok(())
}

#[cfg(feature = "streaming")]
fn play(engine: &PlaybackEngine, volume: f32, transport: &TransportArgs) -> Result<()> {
    use std::time::Duration;

    use squarewave::{Advance, AudioDevice};

    transport.apply(engine)?;
    let device = AudioDevice::start(engine.renderer())?;
    device.set_volume(volume);
    engine.play()?;

    let mut shown = usize::MAX;
    loop {
        let track = engine.current_track();
        if track != shown {
            let info = engine.current_track_info()?;
            println!(
                "[{}/{}] {} - {} ({}s)",
                track + 1,
                engine.track_count()?,
                info.artist,
                info.title,
                info.play_length_ms / 1000
            );
            shown = track;
        }
        match engine.advance_on_end()? {
            Advance::Finished => break,
            Advance::Continuing | Advance::NextTrack(_) => {}
        }
        std::thread::sleep(Duration::from_millis(500));
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match &cli.command {
        Command::Info { file, pretty } => {
            let engine = open_engine(cli.config.as_deref(), file)?;
            info(&engine, file, *pretty)
        }
        Command::Render {
            file,
            output,
            seconds,
            transport,
        } => {
            let engine = open_engine(cli.config.as_deref(), file)?;
            render(&engine, output, *seconds, transport)
        }
        #[cfg(feature = "streaming")]
        Command::Play {
            file,
            volume,
            transport,
        } => {
            let engine = open_engine(cli.config.as_deref(), file)?;
            play(&engine, *volume, transport)
        }
    }
}
