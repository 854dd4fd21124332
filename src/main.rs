// Scripted voice memo session
//
// Records a sequence of capture passes (pausing between them), stops, and
// writes the merged preview artifact and its waveform:
// 1. Open the microphone (a WAV file replayed in real time, or a test tone)
// 2. start / pause / resume / pause ... / stop
// 3. Wait for the last preview run
// 4. Save the WAV artifact and optionally a PNG of the waveform
//
// Usage: cargo run -- --input memo.wav --segments 2.0,1.5 --output out.wav --waveform out.png

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use voice_memo::{
    AudioBackendConfig, CaptureController, ChannelObserver, Config, FileInput, ImageSurface,
    MediaDevices, RecordingState, SessionConfig, SessionEvent, SignalInput,
};

#[derive(Parser)]
#[command(name = "voice-memo")]
#[command(about = "Record a multi-segment voice memo and export the merged preview")]
struct Args {
    /// Configuration file (without extension)
    #[arg(short, long, default_value = "config/voice-memo")]
    config: String,

    /// WAV file to use as the microphone (a 440Hz tone if omitted)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Length of each capture pass in seconds
    #[arg(short, long, value_delimiter = ',', default_value = "2.0,1.5")]
    segments: Vec<f64>,

    /// Pause between passes in seconds
    #[arg(long, default_value = "0.5")]
    gap: f64,

    /// Where to write the merged recording
    #[arg(short, long, default_value = "voice-memo.wav")]
    output: PathBuf,

    /// Where to write the waveform image
    #[arg(short, long)]
    waveform: Option<PathBuf>,

    /// Print session statistics as JSON
    #[arg(long)]
    stats: bool,
}

fn seconds(value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value).with_context(|| format!("Invalid duration: {}", value))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    if args.segments.is_empty() {
        bail!("At least one segment is required");
    }

    let cfg = Config::load(&args.config)?;
    let session_config = SessionConfig::from(&cfg);

    info!("Voice Memo v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Timeslice {:?}, live sampling every {:?}",
        session_config.timeslice, session_config.sample_interval
    );

    let devices: Arc<dyn MediaDevices> = match &args.input {
        Some(path) => Arc::new(
            FileInput::open(path, cfg.capture.buffer_duration_ms)
                .with_context(|| format!("Failed to open input {}", path.display()))?,
        ),
        None => Arc::new(SignalInput::new(AudioBackendConfig::from(&cfg.capture)).with_tone(440.0, 0.6)),
    };
    info!("Microphone: {}", devices.name());

    let surface = ImageSurface::default().shared();
    let (observer, mut events) = ChannelObserver::new();

    let event_log = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::RecordReady(artifact) => info!(
                    "Preview ready: {} ({} bytes, {:.1}s)",
                    artifact.source_url,
                    artifact.len(),
                    artifact.duration_ms as f64 / 1000.0
                ),
                SessionEvent::Elapsed(elapsed) => info!("Recording... {:.1}s", elapsed.as_secs_f64()),
                SessionEvent::Error(e) => error!("Session error: {}", e),
                SessionEvent::Deleted => info!("Recording deleted"),
            }
        }
    });

    let mut controller = CaptureController::builder(devices, Arc::new(observer))
        .surface(surface.clone())
        .config(session_config)
        .build();

    let gap = seconds(args.gap)?;
    for (index, &length) in args.segments.iter().enumerate() {
        let length = seconds(length)?;

        if controller.state() == RecordingState::Paused {
            controller.resume().await?;
        } else {
            controller.start().await?;
        }

        info!("Pass {}: recording for {:?}", index + 1, length);
        sleep(length).await;

        controller.pause().await?;
        sleep(gap).await;
    }

    controller.stop().await?;

    // Wait for the last preview run
    for outcome in controller.settle().await {
        info!("Preview run {:?}", outcome);
    }

    let Some(artifact) = controller.published() else {
        warn!("No audio was captured, nothing to write");
        return Ok(());
    };

    tokio::fs::write(&args.output, &artifact.data[..])
        .await
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    info!(
        "Saved {} ({}, {:.1}s)",
        args.output.display(),
        artifact.mime_type,
        artifact.duration_ms as f64 / 1000.0
    );

    if let Some(path) = &args.waveform {
        surface
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .save_png(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Saved waveform to {}", path.display());
    }

    if args.stats {
        println!("{}", serde_json::to_string_pretty(&controller.stats())?);
    }

    // Releases the observer so the event log can finish
    drop(controller);
    event_log.await?;

    Ok(())
}
