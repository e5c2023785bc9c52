//! Device collaborator interface
//!
//! The depth camera SDK is reached only through these traits:
//! - `DeviceContext` enumerates attached devices
//! - `Device` exposes sensors, stream enablement, the polled frameset
//!   pipeline, and asynchronous sensor callbacks
//!
//! A simulated backend lives in [`mock`].

pub mod mock;
pub mod types;

pub use types::*;

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by the device collaborator
#[derive(Error, Debug, Clone)]
pub enum DeviceError {
    #[error("Sensor {0} is not available")]
    SensorUnavailable(SensorKind),

    #[error("Profile is not a {expected} profile")]
    ProfileMismatch { expected: &'static str },

    #[error("Extrinsic from {from} to {to} is unavailable")]
    ExtrinsicUnavailable { from: SensorKind, to: SensorKind },

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Sensor {0} is already started")]
    AlreadyStarted(SensorKind),
}

/// Callback invoked on a device-owned thread for every inertial sample
pub type ImuCallback = Box<dyn FnMut(ImuEvent) + Send + 'static>;

/// An opened depth camera
///
/// Methods take `&self`; implementations synchronize internally because
/// callback registration and polling happen from different threads.
pub trait Device: Send + Sync {
    /// Human-readable device name
    fn name(&self) -> &str;

    /// Look up a sensor; `None` when the device does not carry it
    fn sensor(&self, kind: SensorKind) -> Option<SensorInfo>;

    /// Pose of `from` expressed in the coordinate frame of `to`
    fn extrinsic_to(
        &self,
        from: &VideoProfile,
        to: &VideoProfile,
    ) -> Result<Extrinsics, DeviceError>;

    /// Add a video profile to the pipeline configuration
    fn enable_stream(&self, profile: &VideoProfile) -> Result<(), DeviceError>;

    /// Start delivering framesets for every enabled profile
    fn start_pipeline(&self) -> Result<(), DeviceError>;

    /// Block for the next synchronized frameset; `None` on timeout
    fn wait_for_frameset(&self, timeout: Duration) -> Option<FrameSet>;

    /// Stop the pipeline and every started sensor. On return no callback
    /// registered through [`Device::start_sensor`] is running or will run.
    fn stop_pipeline(&self);

    /// Start an inertial sensor, delivering samples to `callback`
    fn start_sensor(
        &self,
        profile: &ImuProfile,
        callback: ImuCallback,
    ) -> Result<(), DeviceError>;
}

/// Entry point of the device SDK
pub trait DeviceContext {
    fn query_devices(&self) -> Vec<Arc<dyn Device>>;
}

/// Open the single device the recorder works with.
///
/// Only one physical device is supported; extras are ignored.
pub fn open_first_device(context: &dyn DeviceContext) -> Option<Arc<dyn Device>> {
    let mut devices = context.query_devices();
    if devices.is_empty() {
        tracing::error!("No device found!");
        return None;
    }
    if devices.len() > 1 {
        tracing::warn!(
            "{} devices connected, recording from the first one only",
            devices.len()
        );
    }
    let device = devices.swap_remove(0);
    tracing::info!("Using device: {}", device.name());
    Some(device)
}
