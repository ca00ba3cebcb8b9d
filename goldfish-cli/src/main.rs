//! goldfish: play or render the goldfish quiz soundtrack from a terminal.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context as _};
use clap::{Parser, Subcommand};
use crossbeam_channel::{unbounded, RecvTimeoutError};

use goldfish_engine::{
    list_output_devices, AudioBackend, AudioEngine, AudioResult, CpalBackend, Drive, EngineConfig, JsonFileStore,
    MemoryStore, MuteStore, OfflineBackend,
};

#[derive(Parser)]
#[command(name = "goldfish")]
#[command(about = "Procedural soundtrack and game sounds of the goldfish quiz")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Soundtrack tempo in BPM.
    #[arg(long, global = true)]
    tempo: Option<f64>,

    /// JSON engine config; missing fields keep their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Settings file holding the mute flag. `render` starts unmuted without one.
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Seed for every random choice.
    #[arg(long, global = true)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Command {
    /// Play live and trigger game events from the keyboard.
    Play {
        /// Output device name (see `devices`).
        #[arg(long)]
        device: Option<String>,
        /// Quit after this many seconds.
        #[arg(long)]
        duration: Option<u64>,
    },
    /// Render the soundtrack offline into a 16-bit stereo WAV file.
    Render {
        #[arg(short, long)]
        out: PathBuf,
        #[arg(short, long, default_value_t = 10.0)]
        seconds: f64,
        /// Game event at a time, e.g. `2.5=correct`. Repeatable.
        #[arg(long = "sfx", value_name = "TIME=KIND")]
        events: Vec<Cue>,
    },
    /// List output devices.
    Devices,
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Event {
    Click,
    Correct,
    Incorrect,
    GameStart,
    GameEnd,
    ToggleMute,
    StartBgm,
    StopBgm,
}

impl Event {
    fn from_key(c: char) -> Option<Self> {
        Some(match c {
            'c' => Event::Click,
            'y' => Event::Correct,
            'n' => Event::Incorrect,
            's' => Event::GameStart,
            'e' => Event::GameEnd,
            'm' => Event::ToggleMute,
            'b' => Event::StartBgm,
            'x' => Event::StopBgm,
            _ => return None,
        })
    }

    fn apply<B: AudioBackend, S: MuteStore>(self, engine: &mut AudioEngine<B, S>) {
        match self {
            Event::Click => engine.play_click(),
            Event::Correct => engine.play_correct(),
            Event::Incorrect => engine.play_incorrect(),
            Event::GameStart => engine.play_game_start(),
            Event::GameEnd => engine.play_game_end(),
            Event::ToggleMute => {
                let muted = engine.toggle_mute();
                println!("muted: {muted}");
            }
            Event::StartBgm => engine.start_bgm(),
            Event::StopBgm => engine.stop_bgm(),
        }
    }
}

impl FromStr for Event {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "click" => Event::Click,
            "correct" => Event::Correct,
            "incorrect" => Event::Incorrect,
            "start" | "game-start" => Event::GameStart,
            "end" | "game-end" => Event::GameEnd,
            "mute" => Event::ToggleMute,
            "bgm" => Event::StartBgm,
            "stop" => Event::StopBgm,
            other => bail!("unknown event: {other}"),
        })
    }
}

/// `TIME=KIND` on the render command line.
#[derive(Copy, Clone, Debug, PartialEq)]
struct Cue {
    at: f64,
    event: Event,
}

impl FromStr for Cue {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (at, kind) = s.split_once('=').ok_or_else(|| anyhow!("expected TIME=KIND, got {s}"))?;
        let at: f64 = at.trim().parse().with_context(|| format!("bad time in {s}"))?;
        if !(at.is_finite() && at >= 0.0) {
            bail!("time must be non-negative: {s}");
        }
        Ok(Cue { at, event: kind.trim().parse()? })
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let mut cfg = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(tempo) = cli.tempo {
        cfg.tempo_bpm = tempo;
    }
    if let Some(seed) = cli.seed {
        cfg.seed = Some(seed);
    }
    cfg.validate()?;
    Ok(cfg)
}

fn print_devices() -> AudioResult<()> {
    println!("Available output devices:");
    for name in list_output_devices()? {
        println!("- {name}");
    }
    Ok(())
}

fn play(cfg: EngineConfig, store: JsonFileStore, device: Option<String>, duration: Option<u64>) -> anyhow::Result<()> {
    let backend = match device {
        Some(name) => CpalBackend::with_device(name),
        None => CpalBackend::new(),
    };
    let mut engine = AudioEngine::new(EngineConfig { drive: Drive::Threaded, ..cfg }, backend, store);
    engine.init_audio();
    if engine.is_unsupported() {
        bail!("no usable audio output");
    }

    println!("goldfish: live soundtrack\n");
    println!("keys: m mute | c click | y correct | n incorrect | s game start | e game end");
    println!("      b start music | x stop music | q quit  (then Enter)");
    println!("muted: {}", engine.get_mute_state());

    let (tx, rx) = unbounded::<char>();
    thread::Builder::new()
        .name("goldfish-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                for c in line.chars().filter(|c| !c.is_whitespace()) {
                    if tx.send(c).is_err() {
                        return;
                    }
                }
            }
        })?;

    let deadline = duration.map(|d| Instant::now() + Duration::from_secs(d));
    loop {
        let wait = match deadline {
            Some(end) => match end.checked_duration_since(Instant::now()) {
                Some(left) => left,
                None => break,
            },
            None => Duration::from_millis(500),
        };
        match rx.recv_timeout(wait) {
            Ok('q') => break,
            Ok(c) => match Event::from_key(c.to_ascii_lowercase()) {
                Some(ev) => ev.apply(&mut engine),
                None => log::warn!("unknown key: {c}"),
            },
            Err(RecvTimeoutError::Timeout) => {}
            // stdin closed: keep playing until the deadline, or stop now without one.
            Err(RecvTimeoutError::Disconnected) => match deadline {
                Some(end) => {
                    thread::sleep(end.saturating_duration_since(Instant::now()));
                    break;
                }
                None => break,
            },
        }
    }
    engine.stop_bgm();
    Ok(())
}

fn render(
    cfg: EngineConfig,
    store: Option<&Path>,
    out: &Path,
    seconds: f64,
    mut cues: Vec<Cue>,
) -> anyhow::Result<()> {
    let sample_rate = cfg.offline_sample_rate;
    let block = ((u64::from(sample_rate) * cfg.lookahead_ms) / 1000).max(1) as usize;
    let total = (f64::from(sample_rate) * seconds.max(0.0)) as usize;
    let cfg = EngineConfig { drive: Drive::Manual, ..cfg };

    let store: Box<dyn MuteStore> = match store {
        Some(path) => Box::new(JsonFileStore::new(path)),
        None => Box::new(MemoryStore::new(false)),
    };
    let mut engine = AudioEngine::new(cfg, OfflineBackend::new(sample_rate as f32), store);
    engine.init_audio();
    let ctx = engine.get_context().ok_or_else(|| anyhow!("offline context unavailable"))?;

    cues.sort_by(|a, b| a.at.total_cmp(&b.at));
    let mut cues = cues.into_iter().peekable();

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(out, spec)
        .with_context(|| format!("creating {}", out.display()))?;

    let mut buf = vec![0.0_f32; block * 2];
    let mut done = 0;
    while done < total {
        let now = ctx.current_time();
        while let Some(cue) = cues.next_if(|c| c.at <= now) {
            log::info!("{:?} at {:.3}s", cue.event, now);
            cue.event.apply(&mut engine);
        }
        let frames = block.min(total - done);
        let slice = &mut buf[..frames * 2];
        ctx.render(slice, 2);
        for &s in slice.iter() {
            writer.write_sample((s.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16)?;
        }
        engine.pump();
        done += frames;
    }
    writer.finalize()?;
    println!("wrote {} ({seconds:.1} s at {sample_rate} Hz)", out.display());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let cfg = load_config(&cli)?;

    match cli.command {
        Command::Devices => print_devices()?,
        Command::Play { device, duration } => {
            let store = JsonFileStore::new(cli.store.unwrap_or_else(JsonFileStore::default_location));
            log::info!("mute flag stored in {}", store.path().display());
            play(cfg, store, device, duration)?;
        }
        Command::Render { out, seconds, events } => render(cfg, cli.store.as_deref(), &out, seconds, events)?,
    }
    Ok(())
}
