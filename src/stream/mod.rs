//! Stream managers
//!
//! One manager per configured sensor substream, behind the [`StreamManager`]
//! trait:
//! - [`FrameStreamManager`]: color, depth and infrared frames pulled from the
//!   polled frameset (video, still images, timecode log)
//! - [`EventStreamManager`]: gyro and accelerometer samples pushed by a
//!   device callback (CSV log)
//!
//! Failures are local. A manager that cannot enable, or that hits a write
//! error, disables itself and keeps the reason for the metadata manifest.

pub mod calibration;
pub mod convert;
pub mod event;
pub mod frame;

pub use calibration::{CalibrationSnapshot, ExtrinsicSource};
pub use event::EventStreamManager;
pub use frame::FrameStreamManager;

use crate::codec::{CodecError, ImageFormat, StillOptions, VideoCodec, VideoContainer};
use crate::device::{DeviceError, FrameSet, PixelFormat, SensorKind};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Per-stream errors
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Sensor {0} not found on device")]
    SensorNotFound(SensorKind),

    #[error("Profile index {index} unsupported for {kind} ({available} profiles available)")]
    ProfileUnsupported {
        kind: SensorKind,
        index: usize,
        available: usize,
    },

    #[error("Filesystem error on {path:?}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported pixel format {0}")]
    UnsupportedFormat(PixelFormat),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Encoder error: {0}")]
    Encoder(#[from] CodecError),

    #[error("{kind} is not a {expected} stream")]
    WrongSensorKind {
        kind: SensorKind,
        expected: &'static str,
    },

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
}

impl StreamError {
    /// Stable code stored next to the message in the manifest
    pub fn code(&self) -> &'static str {
        match self {
            StreamError::SensorNotFound(_) => "SENSOR_NOT_FOUND",
            StreamError::ProfileUnsupported { .. } => "PROFILE_UNSUPPORTED",
            StreamError::Filesystem { .. } => "FILESYSTEM_ERROR",
            StreamError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            StreamError::InvalidFrame(_) => "INVALID_FRAME",
            StreamError::Encoder(_) => "ENCODER_ERROR",
            StreamError::WrongSensorKind { .. } => "WRONG_SENSOR_KIND",
            StreamError::Device(_) => "DEVICE_ERROR",
        }
    }

    /// Per-frame problems skip the frame; everything else disables the stream
    pub fn is_frame_local(&self) -> bool {
        matches!(
            self,
            StreamError::UnsupportedFormat(_) | StreamError::InvalidFrame(_)
        )
    }

    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StreamError::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Codec IO failures are filesystem failures
    pub(crate) fn from_codec(path: impl Into<PathBuf>, error: CodecError) -> Self {
        match error {
            CodecError::Io(source) => Self::filesystem(path, source),
            other => StreamError::Encoder(other),
        }
    }
}

/// Output options of one stream
#[derive(Debug, Clone, PartialEq)]
pub struct OutputOptions {
    pub save_video: bool,
    pub save_image: bool,
    pub container: VideoContainer,
    pub codec: VideoCodec,
    pub still: StillOptions,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            save_video: true,
            save_image: false,
            container: VideoContainer::Avi,
            codec: VideoCodec::Mjpeg,
            still: StillOptions::default(),
        }
    }
}

/// What to record from one sensor substream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub kind: SensorKind,
    /// Unique name; prefixes every output file of the stream
    pub name: String,
    pub profile_index: usize,
    pub output: OutputOptions,
}

impl StreamRequest {
    pub fn new(kind: SensorKind) -> Self {
        Self {
            kind,
            name: kind.default_stream_name().to_string(),
            profile_index: 0,
            output: OutputOptions::default(),
        }
    }

    pub fn with_output(mut self, output: OutputOptions) -> Self {
        self.output = output;
        self
    }
}

/// Uniform lifecycle of a recorded substream
pub trait StreamManager: Send {
    fn name(&self) -> &str;

    fn kind(&self) -> SensorKind;

    fn is_enabled(&self) -> bool;

    /// Handle one polled frameset. A frameset without this stream's frame,
    /// a disabled manager, or a closed manager is a no-op.
    fn process_frameset(&mut self, frameset: &FrameSet);

    /// Snapshot for the manifest; valid in any state
    fn metadata(&self) -> StreamMetadata;

    /// Flush and release every owned handle. Idempotent.
    fn close(&mut self);

    /// Frames (or events) fully written
    fn frames_written(&self) -> u64;
}

/// Enabled flag plus the append-only error history of one stream
#[derive(Debug, Default, Clone)]
pub(crate) struct StreamStatus {
    enabled: bool,
    errors: Vec<String>,
    code: Option<&'static str>,
}

impl StreamStatus {
    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn enable(&mut self) {
        self.enabled = true;
    }

    pub(crate) fn disable(&mut self, error: &StreamError) {
        self.enabled = false;
        self.note(error);
    }

    /// Record a problem without disabling the stream
    pub(crate) fn note(&mut self, error: &StreamError) {
        self.errors.push(error.to_string());
        self.code.get_or_insert(error.code());
    }

    pub(crate) fn message(&self) -> String {
        self.errors.join("; ")
    }

    pub(crate) fn code(&self) -> Option<&'static str> {
        self.code
    }
}

/// One stream's entry in `metadata.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamMetadata {
    pub stream_name: String,
    pub sensor_type: SensorKind,
    pub profile_idx: usize,
    pub is_enable: bool,
    pub error_msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub frame_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_save_video: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_save_image: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_format: Option<VideoContainer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec: Option<VideoCodec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_format: Option<ImageFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_params: Option<StillOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timecode_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imu_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate_hz: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calibration: Option<CalibrationSnapshot>,
}

impl StreamMetadata {
    pub(crate) fn new(request: &StreamRequest, status: &StreamStatus, frame_count: u64) -> Self {
        Self {
            stream_name: request.name.clone(),
            sensor_type: request.kind,
            profile_idx: request.profile_index,
            is_enable: status.is_enabled(),
            error_msg: status.message(),
            error_code: status.code().map(str::to_string),
            frame_count,
            is_save_video: None,
            is_save_image: None,
            container_format: None,
            codec: None,
            image_format: None,
            compression_params: None,
            video_name: None,
            timecode_name: None,
            image_dir: None,
            imu_name: None,
            sample_rate_hz: None,
            calibration: None,
        }
    }
}

/// File name component of `path`, for the manifest
pub(crate) fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_errors_are_append_only() {
        let mut status = StreamStatus::default();
        status.enable();
        status.note(&StreamError::InvalidFrame("first".into()));
        assert!(status.is_enabled());
        status.disable(&StreamError::SensorNotFound(SensorKind::Depth));

        assert!(!status.is_enabled());
        assert_eq!(
            status.message(),
            "Invalid frame: first; Sensor depth not found on device"
        );
        // The first code sticks
        assert_eq!(status.code(), Some("INVALID_FRAME"));
    }

    #[test]
    fn test_frame_local_errors() {
        assert!(StreamError::UnsupportedFormat(PixelFormat::Nv12).is_frame_local());
        assert!(!StreamError::filesystem("/x", std::io::ErrorKind::Other.into()).is_frame_local());
    }

    #[test]
    fn test_codec_io_maps_to_filesystem() {
        let err = StreamError::from_codec(
            "/x.png",
            CodecError::Io(std::io::ErrorKind::NotFound.into()),
        );
        assert_eq!(err.code(), "FILESYSTEM_ERROR");
        let err = StreamError::from_codec("/x.avi", CodecError::Finished);
        assert_eq!(err.code(), "ENCODER_ERROR");
    }

    #[test]
    fn test_metadata_keys() {
        let request = StreamRequest::new(SensorKind::IrLeft);
        let status = StreamStatus::default();
        let json = serde_json::to_value(StreamMetadata::new(&request, &status, 0)).unwrap();
        assert_eq!(json["streamName"], "ir_left");
        assert_eq!(json["sensorType"], "ir_left");
        assert_eq!(json["isEnable"], false);
        assert_eq!(json["errorMsg"], "");
        assert!(json.get("calibration").is_none());
    }
}
