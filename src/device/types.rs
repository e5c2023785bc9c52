//! Device value types
//!
//! Sensor kinds, stream profiles, and the frame/event payloads delivered by
//! the device collaborator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One substream of the depth camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Color,
    Depth,
    IrLeft,
    IrRight,
    Gyro,
    Accel,
}

impl SensorKind {
    pub const ALL: [SensorKind; 6] = [
        SensorKind::Color,
        SensorKind::Depth,
        SensorKind::IrLeft,
        SensorKind::IrRight,
        SensorKind::Gyro,
        SensorKind::Accel,
    ];

    /// Delivered through the polled frameset
    pub fn is_frame_stream(&self) -> bool {
        matches!(
            self,
            SensorKind::Color | SensorKind::Depth | SensorKind::IrLeft | SensorKind::IrRight
        )
    }

    /// Delivered through an asynchronous sensor callback
    pub fn is_event_stream(&self) -> bool {
        matches!(self, SensorKind::Gyro | SensorKind::Accel)
    }

    pub fn default_stream_name(&self) -> &'static str {
        match self {
            SensorKind::Color => "color",
            SensorKind::Depth => "depth",
            SensorKind::IrLeft => "ir_left",
            SensorKind::IrRight => "ir_right",
            SensorKind::Gyro => "gyro",
            SensorKind::Accel => "accel",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_stream_name())
    }
}

/// Pixel layout of a frame payload as reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Rgb,
    Bgr,
    Mjpeg,
    Yuyv,
    Uyvy,
    Nv12,
    /// 8-bit single channel
    Y8,
    /// 16-bit single channel, little-endian
    Y16,
    Unknown(u32),
}

impl PixelFormat {
    /// Bytes per pixel for uncompressed formats
    pub fn bytes_per_pixel(&self) -> Option<usize> {
        match self {
            PixelFormat::Rgb | PixelFormat::Bgr => Some(3),
            PixelFormat::Yuyv | PixelFormat::Uyvy | PixelFormat::Y16 => Some(2),
            PixelFormat::Y8 => Some(1),
            PixelFormat::Mjpeg | PixelFormat::Nv12 | PixelFormat::Unknown(_) => None,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelFormat::Unknown(code) => write!(f, "unknown(0x{code:08x})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Pinhole camera intrinsics
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

/// Brown-Conrady distortion coefficients
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Distortion {
    pub k1: f32,
    pub k2: f32,
    pub k3: f32,
    pub k4: f32,
    pub k5: f32,
    pub k6: f32,
    pub p1: f32,
    pub p2: f32,
}

/// Rigid transform between two stream coordinate frames
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extrinsics {
    /// 3x3 row-major rotation
    pub rotation: [f32; 9],
    /// Translation in millimeters
    pub translation: [f32; 3],
}

impl Extrinsics {
    pub const IDENTITY: Extrinsics = Extrinsics {
        rotation: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        translation: [0.0, 0.0, 0.0],
    };
}

/// Video stream profile (color, depth, infrared)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoProfile {
    pub kind: SensorKind,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub format: PixelFormat,
    pub intrinsics: Intrinsics,
    pub distortion: Distortion,
}

/// Inertial stream profile (gyro, accel)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImuProfile {
    pub kind: SensorKind,
    /// Sample rate in Hz
    pub rate_hz: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamProfile {
    Video(VideoProfile),
    Imu(ImuProfile),
}

impl StreamProfile {
    pub fn as_video(&self) -> Option<&VideoProfile> {
        match self {
            StreamProfile::Video(p) => Some(p),
            StreamProfile::Imu(_) => None,
        }
    }

    pub fn as_imu(&self) -> Option<&ImuProfile> {
        match self {
            StreamProfile::Imu(p) => Some(p),
            StreamProfile::Video(_) => None,
        }
    }
}

/// A sensor present on the device and the profiles it offers
#[derive(Debug, Clone)]
pub struct SensorInfo {
    pub kind: SensorKind,
    pub profiles: Vec<StreamProfile>,
}

impl SensorInfo {
    pub fn profile(&self, index: usize) -> Option<&StreamProfile> {
        self.profiles.get(index)
    }
}

/// One image from a frame stream
#[derive(Debug, Clone)]
pub struct Frame {
    pub kind: SensorKind,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Device timestamp in milliseconds
    pub timestamp_ms: u64,
    /// Depth unit in millimeters per stored value; 1.0 for other kinds
    pub value_scale: f32,
    pub data: Vec<u8>,
}

/// Synchronized bundle of at most one frame per frame-stream kind
#[derive(Debug, Clone, Default)]
pub struct FrameSet {
    frames: Vec<Frame>,
}

impl FrameSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a frame, replacing any frame of the same kind
    pub fn insert(&mut self, frame: Frame) {
        self.frames.retain(|f| f.kind != frame.kind);
        self.frames.push(frame);
    }

    pub fn with(mut self, frame: Frame) -> Self {
        self.insert(frame);
        self
    }

    pub fn frame(&self, kind: SensorKind) -> Option<&Frame> {
        self.frames.iter().find(|f| f.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// One inertial sample delivered by a sensor callback
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuEvent {
    pub kind: SensorKind,
    /// Device timestamp in milliseconds
    pub timestamp_ms: u64,
    /// Sensor temperature in degrees Celsius
    pub temperature: f32,
    /// rad/s for gyro, m/s^2 for accel
    pub value: [f32; 3],
}
