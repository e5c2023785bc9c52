//! Depthcam Recorder binary

use anyhow::{bail, Context, Result};
use clap::Parser;
use depthcam_recorder::codec::FfmpegEncoderFactory;
use depthcam_recorder::config::{Settings, DEFAULT_CONFIG_PATH};
use depthcam_recorder::device::mock::SimulatedContext;
use depthcam_recorder::recorder::{RecordingSession, StopCondition, StopHandle};
use depthcam_recorder::trigger::{spawn_watchdog, SysfsTrigger, TriggerController};
use depthcam_recorder::utils::{ErrorResponse, RecorderError};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Global flag for graceful shutdown
static RUNNING: AtomicBool = AtomicBool::new(true);

/// Signal handler for SIGTERM and SIGINT
extern "C" fn signal_handler(_sig: libc::c_int) {
    RUNNING.store(false, Ordering::Relaxed);
}

/// Depthcam Recorder - record every sensor of a depth camera to disk
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the TOML config
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Session length in seconds, overriding the config; negative follows
    /// the trigger line
    #[arg(allow_negative_numbers = true)]
    duration: Option<f64>,

    /// Record while the trigger input is high
    #[arg(long)]
    triggered: bool,

    /// Override the save directory
    #[arg(long)]
    save_dir: Option<PathBuf>,
}

fn main() {
    if let Err(e) = run() {
        match e.downcast_ref::<RecorderError>() {
            Some(recorder_error) => {
                let response = ErrorResponse::from(recorder_error);
                tracing::error!(code = %response.code, "{}", response.message);
            }
            None => tracing::error!("{:#}", e),
        }
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load_or_default(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    if let Some(length) = args.duration {
        settings.video_length = length;
    }
    if let Some(dir) = args.save_dir {
        settings.save_dir = dir;
    }
    settings.validate()?;

    depthcam_recorder::init_tracing(&settings.log_level);
    tracing::info!("Starting Depthcam Recorder v{}", env!("CARGO_PKG_VERSION"));

    unsafe {
        libc::signal(libc::SIGTERM, signal_handler as libc::sighandler_t);
        libc::signal(libc::SIGINT, signal_handler as libc::sighandler_t);
    }
    let shutdown = StopHandle::new();
    spawn_signal_forwarder(shutdown.clone())?;

    if settings.device.backend != "simulated" {
        bail!(
            "Unsupported device backend '{}' (available: simulated)",
            settings.device.backend
        );
    }
    let context = SimulatedContext::new(settings.device.simulated.clone());
    let encoders = Arc::new(FfmpegEncoderFactory::new());
    if !encoders.is_available() {
        tracing::warn!("ffmpeg not found, videos will not be written");
    }

    let watchdog = if settings.watchdog.enabled {
        Some(spawn_watchdog(settings.watchdog.clone(), shutdown.clone())?)
    } else {
        None
    };

    let triggered = args.triggered || settings.stop_condition() == StopCondition::External;
    let result = if triggered {
        let trigger = SysfsTrigger::new(
            settings.trigger.input_path.clone(),
            settings.trigger.output_path.clone(),
        );
        let mut controller = TriggerController::new(
            trigger,
            settings.trigger.debounce_reads,
            settings.trigger.poll_interval(),
        );
        controller
            .run(&shutdown, |record_count| {
                RecordingSession::from_context(
                    &context,
                    encoders.clone(),
                    settings.session_options(record_count),
                )
            })
            .map(|records| tracing::info!("Recorded {} sessions", records))
    } else {
        RecordingSession::from_context(&context, encoders.clone(), settings.session_options(0))
            .and_then(|session| session.with_stop_handle(shutdown.clone()).record())
            .map(|summary| {
                tracing::info!(
                    "Session {} written to {:?}: {} framesets in {} ms",
                    summary.session_id,
                    summary.dir,
                    summary.framesets_dispatched,
                    summary.elapsed_ms
                );
                for stream in &summary.streams {
                    tracing::info!(
                        "  {}: {} ({} frames)",
                        stream.name,
                        if stream.enabled { "ok" } else { "disabled" },
                        stream.frames_written
                    );
                }
            })
    };

    shutdown.request_stop();
    if let Some(handle) = watchdog {
        if let Ok(Err(e)) = handle.join() {
            tracing::warn!("Watchdog: {}", e);
        }
    }
    result?;
    Ok(())
}

/// Copy the signal flag into the shutdown handle
fn spawn_signal_forwarder(shutdown: StopHandle) -> Result<()> {
    std::thread::Builder::new()
        .name("depthcam-signals".into())
        .spawn(move || {
            while RUNNING.load(Ordering::Relaxed) && !shutdown.is_stop_requested() {
                std::thread::sleep(Duration::from_millis(50));
            }
            if !RUNNING.load(Ordering::Relaxed) {
                tracing::info!("Received shutdown signal");
            }
            shutdown.request_stop();
        })?;
    Ok(())
}
