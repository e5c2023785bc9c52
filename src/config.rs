//! Configuration for the recorder
//!
//! Loaded from a TOML file. Every field has a default, so a missing file
//! (or an empty one) records every stream of the first device for three
//! seconds.
//!
//! ```toml
//! save_dir = "/mnt/ssd"
//! video_length = -1        # negative: record while the trigger is high
//!
//! [[streams]]
//! kind = "color"
//! save_image = true
//! image_format = "jpeg"
//!
//! [[streams]]
//! kind = "depth"
//! name = "depth_raw"
//! ```

use crate::codec::{ImageFormat, StillOptions, VideoCodec, VideoContainer};
use crate::device::mock::SimulatedDeviceConfig;
use crate::device::SensorKind;
use crate::recorder::manifest::RESERVED_KEYS;
use crate::recorder::{MetadataTiming, SessionOptions, StopCondition};
use crate::stream::{OutputOptions, StreamRequest};
use crate::trigger::WatchdogSettings;
use crate::utils::{RecorderError, RecorderResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/depthcam-recorder.toml";

const MAX_WARMUP_FRAMES: u32 = 1000;
/// One year
const MAX_VIDEO_LENGTH_SECS: f64 = 31_536_000.0;

/// Top-level settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Sessions are written under `<save_dir>/data/`
    pub save_dir: PathBuf,
    /// Seconds per session; negative records until stopped externally
    pub video_length: f64,
    /// Framesets discarded before recording
    pub warmup_frames: u32,
    /// Bound on one frameset wait
    pub wait_timeout_ms: u64,
    pub metadata_timing: MetadataTiming,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,
    pub device: DeviceSettings,
    pub streams: Vec<StreamSettings>,
    pub trigger: TriggerSettings,
    pub watchdog: WatchdogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from("."),
            video_length: 3.0,
            warmup_frames: 10,
            wait_timeout_ms: 100,
            metadata_timing: MetadataTiming::Auto,
            log_level: "depthcam_recorder=info".to_string(),
            device: DeviceSettings::default(),
            streams: SensorKind::ALL.into_iter().map(StreamSettings::new).collect(),
            trigger: TriggerSettings::default(),
            watchdog: WatchdogSettings::default(),
        }
    }
}

/// Device backend selection
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// Only `simulated` is built in
    pub backend: String,
    pub simulated: SimulatedDeviceConfig,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            backend: "simulated".to_string(),
            simulated: SimulatedDeviceConfig::default(),
        }
    }
}

/// One `[[streams]]` entry
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamSettings {
    pub kind: SensorKind,
    /// Defaults to the kind's name (`color`, `ir_left`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub profile_index: usize,
    #[serde(default = "default_true")]
    pub save_video: bool,
    #[serde(default)]
    pub save_image: bool,
    #[serde(default = "default_container")]
    pub container: VideoContainer,
    #[serde(default = "default_codec")]
    pub codec: VideoCodec,
    #[serde(default = "default_image_format")]
    pub image_format: ImageFormat,
    /// 0 (fastest) to 9 (smallest)
    #[serde(default = "default_png_compression")]
    pub png_compression: u8,
    /// 1 to 100
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_true() -> bool {
    true
}

fn default_container() -> VideoContainer {
    VideoContainer::Avi
}

fn default_codec() -> VideoCodec {
    VideoCodec::Mjpeg
}

fn default_image_format() -> ImageFormat {
    ImageFormat::Png
}

fn default_png_compression() -> u8 {
    3
}

fn default_jpeg_quality() -> u8 {
    95
}

impl StreamSettings {
    pub fn new(kind: SensorKind) -> Self {
        Self {
            kind,
            name: None,
            profile_index: 0,
            save_video: true,
            save_image: false,
            container: default_container(),
            codec: default_codec(),
            image_format: default_image_format(),
            png_compression: default_png_compression(),
            jpeg_quality: default_jpeg_quality(),
        }
    }

    pub fn name(&self) -> &str {
        self.name
            .as_deref()
            .unwrap_or_else(|| self.kind.default_stream_name())
    }

    pub fn to_request(&self) -> StreamRequest {
        StreamRequest {
            kind: self.kind,
            name: self.name().to_string(),
            profile_index: self.profile_index,
            output: OutputOptions {
                save_video: self.save_video,
                save_image: self.save_image,
                container: self.container,
                codec: self.codec,
                still: StillOptions {
                    format: self.image_format,
                    png_compression: self.png_compression,
                    jpeg_quality: self.jpeg_quality,
                },
            },
        }
    }
}

/// Trigger input and status output lines
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TriggerSettings {
    pub input_path: PathBuf,
    /// Driven high while a session records
    pub output_path: Option<PathBuf>,
    /// Consecutive equal reads before a level change counts
    pub debounce_reads: u32,
    pub poll_interval_ms: u64,
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("/sys/class/gpio/gpio113/value"),
            output_path: Some(PathBuf::from("/sys/class/gpio/gpio111/value")),
            debounce_reads: 10,
            poll_interval_ms: 20,
        }
    }
}

impl TriggerSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Settings {
    /// Load and validate settings from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> RecorderResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            RecorderError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    /// Like [`Settings::from_file`], but a missing file yields defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> RecorderResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn from_toml(contents: &str) -> RecorderResult<Self> {
        let settings: Settings =
            toml::from_str(contents).map_err(|e| RecorderError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> RecorderResult<()> {
        if self.streams.is_empty() {
            return Err(RecorderError::Config("no streams configured".into()));
        }

        let mut names = HashSet::new();
        for stream in &self.streams {
            let name = stream.name();
            if name.trim().is_empty() {
                return Err(RecorderError::Config(format!(
                    "{} stream has an empty name",
                    stream.kind
                )));
            }
            if RESERVED_KEYS.contains(&name) {
                return Err(RecorderError::Config(format!(
                    "stream name '{name}' is reserved"
                )));
            }
            if !names.insert(name) {
                return Err(RecorderError::Config(format!(
                    "duplicate stream name '{name}'"
                )));
            }
            if stream.png_compression > 9 {
                return Err(RecorderError::Config(format!(
                    "stream '{name}': png_compression must be 0-9"
                )));
            }
            if !(1..=100).contains(&stream.jpeg_quality) {
                return Err(RecorderError::Config(format!(
                    "stream '{name}': jpeg_quality must be 1-100"
                )));
            }
        }

        if self.warmup_frames > MAX_WARMUP_FRAMES {
            return Err(RecorderError::Config(format!(
                "warmup_frames must be at most {MAX_WARMUP_FRAMES}"
            )));
        }
        if self.wait_timeout_ms == 0 {
            return Err(RecorderError::Config("wait_timeout_ms must be non-zero".into()));
        }
        if self.trigger.poll_interval_ms == 0 {
            return Err(RecorderError::Config(
                "trigger.poll_interval_ms must be non-zero".into(),
            ));
        }
        if !self.video_length.is_finite() || self.video_length > MAX_VIDEO_LENGTH_SECS {
            return Err(RecorderError::Config(format!(
                "video_length must be at most {MAX_VIDEO_LENGTH_SECS} seconds"
            )));
        }
        Ok(())
    }

    pub fn stop_condition(&self) -> StopCondition {
        StopCondition::from_video_length(self.video_length)
    }

    /// Session options for record number `record_count`
    pub fn session_options(&self, record_count: u32) -> SessionOptions {
        SessionOptions {
            save_root: self.save_dir.clone(),
            stop: self.stop_condition(),
            warmup_frames: self.warmup_frames,
            wait_timeout: Duration::from_millis(self.wait_timeout_ms),
            metadata_timing: self.metadata_timing,
            record_count,
            streams: self.streams.iter().map(StreamSettings::to_request).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_file_is_default() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.video_length, 3.0);
        assert_eq!(settings.warmup_frames, 10);
        assert_eq!(settings.streams.len(), 6);
        assert_eq!(settings.device.backend, "simulated");
        assert_eq!(settings.trigger.debounce_reads, 10);
    }

    #[test]
    fn test_streams_parse() {
        let settings = Settings::from_toml(
            r#"
            save_dir = "/mnt/ssd"
            video_length = -1
            metadata_timing = "end"

            [[streams]]
            kind = "color"
            profile_index = 1
            save_image = true
            image_format = "jpeg"
            jpeg_quality = 80

            [[streams]]
            kind = "depth"
            name = "depth_raw"
            container = "mp4"
            codec = "h264"

            [[streams]]
            kind = "gyro"
            "#,
        )
        .unwrap();

        assert_eq!(settings.stop_condition(), StopCondition::External);
        let options = settings.session_options(4);
        assert_eq!(options.record_count, 4);
        assert_eq!(options.metadata_timing, MetadataTiming::End);
        assert_eq!(options.save_root, PathBuf::from("/mnt/ssd"));

        let color = &options.streams[0];
        assert_eq!(color.name, "color");
        assert_eq!(color.profile_index, 1);
        assert!(color.output.save_image);
        assert!(color.output.save_video);
        assert_eq!(color.output.still.format, ImageFormat::Jpeg);
        assert_eq!(color.output.still.jpeg_quality, 80);

        let depth = &options.streams[1];
        assert_eq!(depth.name, "depth_raw");
        assert_eq!(depth.output.container, VideoContainer::Mp4);
        assert_eq!(depth.output.codec, VideoCodec::H264);

        assert_eq!(options.streams[2].kind, SensorKind::Gyro);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = Settings::from_toml(
            r#"
            [[streams]]
            kind = "ir_left"
            name = "ir"

            [[streams]]
            kind = "ir_right"
            name = "ir"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate stream name 'ir'"));
        assert!(err.is_setup_fatal());
    }

    #[test]
    fn test_reserved_and_empty_names_rejected() {
        assert!(Settings::from_toml("[[streams]]\nkind = \"color\"\nname = \"videoLength\"\n").is_err());
        assert!(Settings::from_toml("[[streams]]\nkind = \"color\"\nname = \" \"\n").is_err());
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        assert!(Settings::from_toml("wait_timeout_ms = 0").is_err());
        assert!(Settings::from_toml("video_length = 1e20").is_err());
        assert!(Settings::from_toml("video_length = 86400").is_ok());
        assert!(Settings::from_toml("warmup_frames = 5000").is_err());
        assert!(Settings::from_toml("[[streams]]\nkind = \"color\"\npng_compression = 12\n").is_err());
        assert!(Settings::from_toml("[[streams]]\nkind = \"sonar\"\n").is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings.streams.len(), 6);

        let path = dir.path().join("recorder.toml");
        fs::write(&path, "video_length = 10\n").unwrap();
        assert_eq!(Settings::load_or_default(&path).unwrap().video_length, 10.0);
    }
}
