//! Depthcam Recorder - unattended multi-sensor depth camera recording.
//!
//! Records color, depth, and both infrared streams to video, timecode, and
//! still-image files, and gyro/accelerometer samples to CSV, for one device
//! per session. Sessions run for a fixed length or follow a digital trigger
//! line.

pub mod codec;
pub mod config;
pub mod device;
pub mod recorder;
pub mod stream;
pub mod trigger;
pub mod utils;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging. `RUST_LOG` wins over `default_directive`.
pub fn init_tracing(default_directive: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
