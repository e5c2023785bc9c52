//! Simulated depth camera
//!
//! Hardware-free stand-in for the camera SDK, used by tests and by the
//! `simulated` device backend. It behaves like the real pipeline:
//!
//! | Stream | Simulation |
//! |--------|------------|
//! | Color | Moving RGB gradient, encoded into the configured pixel format |
//! | Depth | 16-bit ramp in millimeters |
//! | IR | 8-bit checker pattern |
//! | Gyro/Accel | Slow sinusoids on a per-sensor callback thread |
//!
//! Framesets are produced on a `depthcam-pipeline` thread at the highest
//! enabled frame rate and handed over through a bounded channel; when the
//! consumer falls behind, framesets are dropped like a real device would.

use super::types::*;
use super::{Device, DeviceContext, DeviceError, ImuCallback};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const PIPELINE_QUEUE_DEPTH: usize = 4;

/// Parameters of the simulated device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedDeviceConfig {
    pub name: String,
    /// Sensors the device carries; missing kinds report as unavailable
    pub sensors: Vec<SensorKind>,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Native color format of profile 0
    pub color_format: PixelFormat,
    pub imu_rate_hz: u32,
    /// When false, every extrinsic query fails
    pub extrinsics_available: bool,
}

impl Default for SimulatedDeviceConfig {
    fn default() -> Self {
        Self {
            name: "Simulated Depth Camera".to_string(),
            sensors: SensorKind::ALL.to_vec(),
            width: 64,
            height: 48,
            fps: 30,
            color_format: PixelFormat::Mjpeg,
            imu_rate_hz: 200,
            extrinsics_available: true,
        }
    }
}

/// Context that reports a single simulated device (or none)
pub struct SimulatedContext {
    config: Option<SimulatedDeviceConfig>,
    queries: AtomicUsize,
}

impl SimulatedContext {
    pub fn new(config: SimulatedDeviceConfig) -> Self {
        Self {
            config: Some(config),
            queries: AtomicUsize::new(0),
        }
    }

    /// A context with nothing attached
    pub fn empty() -> Self {
        Self {
            config: None,
            queries: AtomicUsize::new(0),
        }
    }

    /// Number of `query_devices` calls so far
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl DeviceContext for SimulatedContext {
    fn query_devices(&self) -> Vec<Arc<dyn Device>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        match &self.config {
            Some(config) => vec![Arc::new(SimulatedDevice::new(config.clone())) as Arc<dyn Device>],
            None => Vec::new(),
        }
    }
}

struct Pipeline {
    receiver: Receiver<FrameSet>,
    thread: Option<JoinHandle<()>>,
}

/// Simulated device handle
pub struct SimulatedDevice {
    config: SimulatedDeviceConfig,
    enabled: Mutex<Vec<VideoProfile>>,
    pipeline: Mutex<Option<Pipeline>>,
    sensor_threads: Mutex<Vec<(SensorKind, JoinHandle<()>)>>,
    stop_flag: Arc<AtomicBool>,
    framesets_produced: Arc<AtomicU64>,
}

impl SimulatedDevice {
    pub fn new(config: SimulatedDeviceConfig) -> Self {
        Self {
            config,
            enabled: Mutex::new(Vec::new()),
            pipeline: Mutex::new(None),
            sensor_threads: Mutex::new(Vec::new()),
            stop_flag: Arc::new(AtomicBool::new(false)),
            framesets_produced: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Profiles added through `enable_stream`
    pub fn enabled_profiles(&self) -> Vec<VideoProfile> {
        self.enabled.lock().clone()
    }

    pub fn framesets_produced(&self) -> u64 {
        self.framesets_produced.load(Ordering::SeqCst)
    }

    /// Whether any pipeline or sensor thread is currently running
    pub fn is_streaming(&self) -> bool {
        self.pipeline.lock().is_some() || !self.sensor_threads.lock().is_empty()
    }

    fn has(&self, kind: SensorKind) -> bool {
        self.config.sensors.contains(&kind)
    }

    fn video_profiles(&self, kind: SensorKind) -> Vec<StreamProfile> {
        let native = match kind {
            SensorKind::Color => self.config.color_format,
            SensorKind::Depth => PixelFormat::Y16,
            _ => PixelFormat::Y8,
        };
        let full = (self.config.width, self.config.height, native);
        let half_format = if kind == SensorKind::Color {
            PixelFormat::Rgb
        } else {
            native
        };
        let half = (
            (self.config.width / 2).max(2),
            (self.config.height / 2).max(2),
            half_format,
        );

        [full, half]
            .into_iter()
            .map(|(width, height, format)| {
                let focal = width as f32 * 0.9;
                StreamProfile::Video(VideoProfile {
                    kind,
                    width,
                    height,
                    fps: self.config.fps,
                    format,
                    intrinsics: Intrinsics {
                        fx: focal,
                        fy: focal,
                        cx: width as f32 / 2.0,
                        cy: height as f32 / 2.0,
                    },
                    distortion: Distortion {
                        k1: 0.01,
                        k2: -0.002,
                        ..Distortion::default()
                    },
                })
            })
            .collect()
    }

    fn imu_profiles(&self, kind: SensorKind) -> Vec<StreamProfile> {
        let rate = self.config.imu_rate_hz.max(1);
        [rate, (rate / 2).max(1)]
            .into_iter()
            .map(|rate_hz| StreamProfile::Imu(ImuProfile { kind, rate_hz }))
            .collect()
    }
}

impl Device for SimulatedDevice {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn sensor(&self, kind: SensorKind) -> Option<SensorInfo> {
        if !self.has(kind) {
            return None;
        }
        let profiles = if kind.is_frame_stream() {
            self.video_profiles(kind)
        } else {
            self.imu_profiles(kind)
        };
        Some(SensorInfo { kind, profiles })
    }

    fn extrinsic_to(
        &self,
        from: &VideoProfile,
        to: &VideoProfile,
    ) -> Result<Extrinsics, DeviceError> {
        if !self.config.extrinsics_available {
            return Err(DeviceError::ExtrinsicUnavailable {
                from: from.kind,
                to: to.kind,
            });
        }
        let baseline = |kind: SensorKind| match kind {
            SensorKind::Color => 0.0,
            SensorKind::Depth | SensorKind::IrLeft => -25.0,
            SensorKind::IrRight => -75.0,
            _ => 0.0,
        };
        let mut extrinsics = Extrinsics::IDENTITY;
        extrinsics.translation[0] = baseline(from.kind) - baseline(to.kind);
        Ok(extrinsics)
    }

    fn enable_stream(&self, profile: &VideoProfile) -> Result<(), DeviceError> {
        if !self.has(profile.kind) {
            return Err(DeviceError::SensorUnavailable(profile.kind));
        }
        let mut enabled = self.enabled.lock();
        enabled.retain(|p| p.kind != profile.kind);
        enabled.push(profile.clone());
        Ok(())
    }

    fn start_pipeline(&self) -> Result<(), DeviceError> {
        let mut pipeline = self.pipeline.lock();
        if pipeline.is_some() {
            return Err(DeviceError::Pipeline("pipeline already started".into()));
        }

        let profiles = self.enabled.lock().clone();
        let fps = profiles.iter().map(|p| p.fps).max().unwrap_or(self.config.fps).max(1);
        let (sender, receiver) = crossbeam_channel::bounded(PIPELINE_QUEUE_DEPTH);
        self.stop_flag.store(false, Ordering::SeqCst);
        let stop = self.stop_flag.clone();
        let produced = self.framesets_produced.clone();

        let thread = std::thread::Builder::new()
            .name("depthcam-pipeline".into())
            .spawn(move || pipeline_loop(profiles, fps, sender, stop, produced))
            .map_err(|e| DeviceError::Pipeline(format!("Failed to spawn pipeline thread: {e}")))?;

        tracing::info!("Simulated pipeline started at {} fps", fps);
        *pipeline = Some(Pipeline {
            receiver,
            thread: Some(thread),
        });
        Ok(())
    }

    fn wait_for_frameset(&self, timeout: Duration) -> Option<FrameSet> {
        let receiver = self.pipeline.lock().as_ref().map(|p| p.receiver.clone());
        match receiver {
            Some(receiver) => receiver.recv_timeout(timeout).ok(),
            None => {
                std::thread::sleep(timeout);
                None
            }
        }
    }

    fn stop_pipeline(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);

        let pipeline = self.pipeline.lock().take();
        if let Some(mut pipeline) = pipeline {
            if let Some(thread) = pipeline.thread.take() {
                let _ = thread.join();
            }
            tracing::info!("Simulated pipeline stopped");
        }

        let threads: Vec<_> = self.sensor_threads.lock().drain(..).collect();
        for (kind, thread) in threads {
            let _ = thread.join();
            tracing::debug!("Simulated {} sensor stopped", kind);
        }
    }

    fn start_sensor(
        &self,
        profile: &ImuProfile,
        callback: ImuCallback,
    ) -> Result<(), DeviceError> {
        if !self.has(profile.kind) || !profile.kind.is_event_stream() {
            return Err(DeviceError::SensorUnavailable(profile.kind));
        }
        let mut threads = self.sensor_threads.lock();
        if threads.iter().any(|(kind, _)| *kind == profile.kind) {
            return Err(DeviceError::AlreadyStarted(profile.kind));
        }

        self.stop_flag.store(false, Ordering::SeqCst);
        let stop = self.stop_flag.clone();
        let profile = profile.clone();
        let kind = profile.kind;
        let thread = std::thread::Builder::new()
            .name(format!("depthcam-{kind}"))
            .spawn(move || sensor_loop(profile, callback, stop))
            .map_err(|e| DeviceError::Pipeline(format!("Failed to spawn {kind} thread: {e}")))?;
        threads.push((kind, thread));
        Ok(())
    }
}

impl Drop for SimulatedDevice {
    fn drop(&mut self) {
        self.stop_pipeline();
    }
}

/// Offset of tick `ticks` from the epoch; saturates instead of wrapping
fn tick_offset(period: Duration, ticks: u64) -> Duration {
    let nanos = period.as_nanos().saturating_mul(ticks as u128);
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

fn pipeline_loop(
    profiles: Vec<VideoProfile>,
    fps: u32,
    sender: Sender<FrameSet>,
    stop: Arc<AtomicBool>,
    produced: Arc<AtomicU64>,
) {
    let period = Duration::from_secs_f64(1.0 / fps as f64);
    let epoch = Instant::now();
    let mut index: u64 = 0;

    while !stop.load(Ordering::SeqCst) {
        let deadline = epoch + tick_offset(period, index + 1);
        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }

        let timestamp_ms = epoch.elapsed().as_millis() as u64;
        let mut frameset = FrameSet::new();
        for profile in &profiles {
            frameset.insert(synthesize_frame(profile, index, timestamp_ms));
        }
        index += 1;

        match sender.try_send(frameset) {
            Ok(()) => {
                produced.fetch_add(1, Ordering::SeqCst);
            }
            Err(crossbeam_channel::TrySendError::Full(_)) => {
                tracing::trace!("Frameset queue full, dropping frameset");
            }
            Err(crossbeam_channel::TrySendError::Disconnected(_)) => break,
        }
    }
}

fn sensor_loop(profile: ImuProfile, mut callback: ImuCallback, stop: Arc<AtomicBool>) {
    let period = Duration::from_secs_f64(1.0 / profile.rate_hz.max(1) as f64);
    let epoch = Instant::now();
    let mut index: u64 = 0;

    while !stop.load(Ordering::SeqCst) {
        let t = epoch.elapsed().as_secs_f32();
        let value = match profile.kind {
            SensorKind::Accel => [0.1 * t.sin(), 9.81, 0.1 * t.cos()],
            _ => [0.01 * t.cos(), 0.02 * t.sin(), 0.005],
        };
        callback(ImuEvent {
            kind: profile.kind,
            timestamp_ms: epoch.elapsed().as_millis() as u64,
            temperature: 36.5,
            value,
        });
        index += 1;

        let deadline = epoch + tick_offset(period, index);
        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
    }
}

/// Build one synthetic frame for `profile`
pub fn synthesize_frame(profile: &VideoProfile, index: u64, timestamp_ms: u64) -> Frame {
    let (w, h) = (profile.width as usize, profile.height as usize);
    let shift = index as usize;

    let data = match profile.kind {
        SensorKind::Depth => {
            let mut data = Vec::with_capacity(w * h * 2);
            for y in 0..h {
                for x in 0..w {
                    let mm = 300 + ((x * 7 + y * 5 + shift) % 4000) as u16;
                    data.extend_from_slice(&mm.to_le_bytes());
                }
            }
            data
        }
        SensorKind::IrLeft | SensorKind::IrRight => (0..h)
            .flat_map(|y| (0..w).map(move |x| if (x / 4 + y / 4 + shift) % 2 == 0 { 40 } else { 200 }))
            .collect(),
        _ => {
            let mut rgb = Vec::with_capacity(w * h * 3);
            for y in 0..h {
                for x in 0..w {
                    rgb.push(((x + shift) * 255 / w.max(1)) as u8);
                    rgb.push((y * 255 / h.max(1)) as u8);
                    rgb.push((shift * 8 % 256) as u8);
                }
            }
            encode_color(&rgb, profile.width, profile.height, profile.format)
        }
    };

    Frame {
        kind: profile.kind,
        format: profile.format,
        width: profile.width,
        height: profile.height,
        timestamp_ms,
        value_scale: 1.0,
        data,
    }
}

fn encode_color(rgb: &[u8], width: u32, height: u32, format: PixelFormat) -> Vec<u8> {
    match format {
        PixelFormat::Rgb => rgb.to_vec(),
        PixelFormat::Bgr => rgb.chunks_exact(3).flat_map(|p| [p[2], p[1], p[0]]).collect(),
        PixelFormat::Yuyv | PixelFormat::Uyvy => {
            let mut packed = Vec::with_capacity(rgb.len() / 3 * 2);
            for pair in rgb.chunks_exact(6) {
                let (y0, u0, v0) = rgb_to_yuv(pair[0], pair[1], pair[2]);
                let (y1, u1, v1) = rgb_to_yuv(pair[3], pair[4], pair[5]);
                let u = ((u0 as u16 + u1 as u16) / 2) as u8;
                let v = ((v0 as u16 + v1 as u16) / 2) as u8;
                if format == PixelFormat::Yuyv {
                    packed.extend_from_slice(&[y0, u, y1, v]);
                } else {
                    packed.extend_from_slice(&[u, y0, v, y1]);
                }
            }
            packed
        }
        PixelFormat::Mjpeg => {
            let mut jpeg = Vec::new();
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, 90);
            if let Err(e) = encoder.encode(rgb, width, height, image::ExtendedColorType::Rgb8) {
                tracing::warn!("Simulated MJPEG encode failed: {}", e);
            }
            jpeg
        }
        // Formats the recorder cannot normalize still get a plausible payload
        _ => vec![128; (width * height * 3 / 2) as usize],
    }
}

fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    let y = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
    let u = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
    let v = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
    (
        y.clamp(0, 255) as u8,
        u.clamp(0, 255) as u8,
        v.clamp(0, 255) as u8,
    )
}
