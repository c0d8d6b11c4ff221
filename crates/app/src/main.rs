use std::{
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
    time::{Duration, Instant},
};

use clap::{Parser, Subcommand};
use scrub_core::{
    AppConfig, AssetStore, AudioTimeline, ComponentLogger, ManualClock, OutputClock,
    ScheduledEvent, Scheduler, ScrubError, ScrubSession, SessionAction, SystemClock,
};
use tracing_subscriber::EnvFilter;

/// Frames rendered per block in offline mode.
const BLOCK_FRAMES: usize = 512;

#[tokio::main(flavor = "current_thread")]
async fn main() -> scrub_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match cli.config.as_deref() {
        Some(path) => AppConfig::from_json_file(path)?,
        None => AppConfig::default(),
    };

    let store = AssetStore::new();
    match cli.command {
        Commands::Inspect { url } => run_inspect(&store, &url).await,
        Commands::Render {
            url,
            script,
            output,
            seconds,
        } => run_render(&store, &url, &script, &output, seconds, &config).await,
        Commands::Simulate {
            url,
            script,
            seconds,
            tick_ms,
        } => run_simulate(&store, &url, script.as_deref(), seconds, tick_ms, &config).await,
        #[cfg(feature = "playback")]
        Commands::Play {
            url,
            script,
            seconds,
            tick_ms,
        } => run_play(&store, &url, script.as_deref(), seconds, tick_ms, &config).await,
    }
}

async fn run_inspect(store: &AssetStore, url: &str) -> scrub_core::Result<()> {
    let asset = store.get_or_load(url).await?;
    tracing::info!(url, "inspected audio");
    println!("duration:    {:.3}s", asset.duration());
    println!("channels:    {}", asset.channel_count());
    println!("sample rate: {} Hz", asset.sample_rate());
    Ok(())
}

/// Renders a scripted session sample-accurately into a WAV file. The output
/// clock is advanced by each rendered block, so the result does not depend
/// on how fast the machine is.
async fn run_render(
    store: &AssetStore,
    url: &str,
    script: &Path,
    output: &Path,
    seconds: Option<f64>,
    config: &AppConfig,
) -> scrub_core::Result<()> {
    tracing::info!(url, ?script, ?output, "rendering scripted session");

    let mut scheduler = Scheduler::new();
    scheduler.set_events(read_script(script)?);

    let clock = ManualClock::new();
    let mut audio = build_engine(clock.clone(), config);
    audio.load_asset(store.get_or_load(url).await?);
    let channels = audio.asset().map(|a| a.channel_count()).unwrap_or(2);
    let length = seconds.unwrap_or_else(|| audio.duration());

    let sample_rate = config.engine.output_sample_rate;
    let spec = hound::WavSpec {
        channels: channels as u16,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(output, spec).map_err(wav_error)?;

    let mut session = ScrubSession::new(audio, config);
    let block_seconds = BLOCK_FRAMES as f64 / sample_rate as f64;
    let mut block = vec![0.0f32; BLOCK_FRAMES * channels];
    let blocks = (length / block_seconds).ceil() as usize;

    for index in 0..blocks {
        let now = index as f64 * block_seconds;
        for event in scheduler.tick(now) {
            session.apply(&event.action, now)?;
        }

        session.render(&mut block, channels);
        for sample in &block {
            writer.write_sample(*sample).map_err(wav_error)?;
        }

        clock.advance(block_seconds);
        let report = session.tick(now + block_seconds, block_seconds);
        if let Some(correction) = report.correction {
            tracing::info!(
                reference = correction.reference_time,
                audio = correction.audio_time,
                "resynced audio"
            );
        }
    }

    writer.finalize().map_err(wav_error)?;
    tracing::info!(?output, seconds = length, "render finished");
    Ok(())
}

/// Runs the session in real time against the system clock without any
/// output device and logs how the audio cursor tracks the reference clock.
async fn run_simulate(
    store: &AssetStore,
    url: &str,
    script: Option<&Path>,
    seconds: f64,
    tick_ms: u64,
    config: &AppConfig,
) -> scrub_core::Result<()> {
    let scheduler = build_scheduler(script)?;

    let mut audio = build_engine(SystemClock::new(), config);
    audio.load_asset(store.get_or_load(url).await?);
    let session = Mutex::new(ScrubSession::new(audio, config));

    drive(&session, scheduler, seconds, tick_ms).await
}

/// Plays the session through the default output device. The engine's clock
/// counts the frames the device has consumed, so drift correction measures
/// what is actually heard.
#[cfg(feature = "playback")]
async fn run_play(
    store: &AssetStore,
    url: &str,
    script: Option<&Path>,
    seconds: Option<f64>,
    tick_ms: u64,
    config: &AppConfig,
) -> scrub_core::Result<()> {
    use std::sync::Arc;

    use scrub_core::{DeviceOutput, FrameClock};

    let scheduler = build_scheduler(script)?;
    let device = DeviceOutput::open_default()?;

    let clock = FrameClock::new(device.sample_rate());
    let mut config = config.clone();
    config.engine.output_sample_rate = clock.sample_rate();

    let mut audio = build_engine(clock.clone(), &config);
    audio.load_asset(store.get_or_load(url).await?);
    let length = seconds.unwrap_or_else(|| audio.duration());

    let session = Arc::new(Mutex::new(ScrubSession::new(audio, &config)));
    let stream = device.start(Arc::clone(&session), clock)?;
    tracing::info!(
        url,
        sample_rate = stream.sample_rate(),
        channels = stream.channels(),
        "playing"
    );

    drive(&*session, scheduler, length, tick_ms).await?;
    lock_session(&*session)?.pause();
    Ok(())
}

/// Ticks a shared session on the wall clock for `seconds`, firing scripted
/// events as they come due.
async fn drive<C: OutputClock>(
    session: &Mutex<ScrubSession<C>>,
    mut scheduler: Scheduler,
    seconds: f64,
    tick_ms: u64,
) -> scrub_core::Result<()> {
    let started = Instant::now();
    let mut ticker = tokio::time::interval(Duration::from_millis(tick_ms.max(1)));
    let mut last = 0.0;
    let mut next_report = 0.0;

    loop {
        ticker.tick().await;
        let now = started.elapsed().as_secs_f64();
        if now > seconds {
            break;
        }

        let report = {
            let mut session = lock_session(session)?;
            for event in scheduler.tick(now) {
                session.apply(&event.action, now)?;
            }
            session.tick(now, now - last)
        };
        last = now;

        if let Some(correction) = report.correction {
            tracing::warn!(drift = correction.drift, "drift corrected");
        }
        if now >= next_report {
            next_report += 1.0;
            tracing::info!(
                reference = format_args!("{:.2}", report.reference_time),
                audio = format_args!("{:.2}", report.audio_time),
                speed = format_args!("{:.2}", report.speed),
                "position"
            );
        }
    }

    Ok(())
}

fn lock_session<C: OutputClock>(
    session: &Mutex<ScrubSession<C>>,
) -> scrub_core::Result<MutexGuard<'_, ScrubSession<C>>> {
    session
        .lock()
        .map_err(|_| ScrubError::msg("session lock has been poisoned"))
}

fn build_scheduler(script: Option<&Path>) -> scrub_core::Result<Scheduler> {
    let events = match script {
        Some(path) => read_script(path)?,
        None => default_script(),
    };
    let mut scheduler = Scheduler::new();
    scheduler.set_events(events);
    Ok(scheduler)
}

fn build_engine<C: OutputClock>(clock: C, config: &AppConfig) -> AudioTimeline<C> {
    let engine = AudioTimeline::new(clock, config.engine.clone());
    match config.verbose_logging {
        Some(verbose) => {
            engine.with_logger(ComponentLogger::with_verbosity("AudioTimeline", verbose))
        }
        None => engine,
    }
}

fn read_script(path: &Path) -> scrub_core::Result<Vec<ScheduledEvent>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// A short tour: wheel scrub forward, drag backwards, pause and resume.
fn default_script() -> Vec<ScheduledEvent> {
    vec![
        ScheduledEvent::new(0.0, SessionAction::Start),
        ScheduledEvent::new(2.0, SessionAction::Wheel { delta_y: 150.0 }),
        ScheduledEvent::new(4.0, SessionAction::Press { y: 400.0 }),
        ScheduledEvent::new(4.1, SessionAction::Drag { y: 410.0 }),
        ScheduledEvent::new(4.3, SessionAction::Release),
        ScheduledEvent::new(6.0, SessionAction::Pause),
        ScheduledEvent::new(7.0, SessionAction::Resume),
    ]
}

fn wav_error(err: hound::Error) -> ScrubError {
    ScrubError::msg(format!("failed to write wav output: {err}"))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Scroll-driven audio scrubber", long_about = None)]
struct Cli {
    /// Optional JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load an audio file or URL and print its properties.
    Inspect {
        /// Path or http(s) URL of the audio.
        url: String,
    },
    /// Render a scripted scrubbing session to a WAV file.
    Render {
        /// Path or http(s) URL of the audio.
        url: String,
        /// JSON list of timed session actions.
        #[arg(short, long)]
        script: PathBuf,
        /// Destination WAV file.
        #[arg(short, long)]
        output: PathBuf,
        /// Length of the render; defaults to the audio duration.
        #[arg(long)]
        seconds: Option<f64>,
    },
    /// Run a session in real time without sound and log how audio tracks
    /// the animation.
    Simulate {
        /// Path or http(s) URL of the audio.
        url: String,
        /// JSON list of timed session actions; a built-in tour otherwise.
        #[arg(short, long)]
        script: Option<PathBuf>,
        #[arg(long, default_value_t = 10.0)]
        seconds: f64,
        /// Interval between driver ticks.
        #[arg(long, default_value_t = 16)]
        tick_ms: u64,
    },
    /// Play a session through the default audio output device.
    #[cfg(feature = "playback")]
    Play {
        /// Path or http(s) URL of the audio.
        url: String,
        /// JSON list of timed session actions; a built-in tour otherwise.
        #[arg(short, long)]
        script: Option<PathBuf>,
        /// How long to play; defaults to the audio duration.
        #[arg(long)]
        seconds: Option<f64>,
        /// Interval between driver ticks.
        #[arg(long, default_value_t = 16)]
        tick_ms: u64,
    },
}
