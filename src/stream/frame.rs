//! Frame stream manager (color, depth, infrared)
//!
//! Per processed frame, in order: normalize the payload, write the still
//! image, append to the video, then append the timecode line. The frame
//! only counts once its timecode line is written, so the timecode log
//! never runs ahead of or behind the frame counter.

use super::convert;
use super::{
    file_name, CalibrationSnapshot, StreamError, StreamManager, StreamMetadata, StreamRequest,
    StreamStatus,
};
use crate::codec::{
    write_still_image, ChannelLayout, CodecError, StillImage, StillPixels, VideoEncoder, VideoEncoderFactory,
    VideoSpec,
};
use crate::device::{Device, Frame, FrameSet, SensorKind, VideoProfile};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const TIMECODE_HEADER: &str = "timestamp [ms]";
const DEPTH_TIMECODE_HEADER: &str = "timestamp [ms],value scale";

/// A frame payload ready for storage
enum Normalized<'a> {
    Color(Vec<u8>),
    Depth(Vec<u16>),
    Infrared(&'a [u8]),
}

struct Timecode {
    writer: BufWriter<File>,
    path: PathBuf,
}

/// Records one polled frame stream
pub struct FrameStreamManager {
    request: StreamRequest,
    status: StreamStatus,
    profile: Option<VideoProfile>,
    calibration: Option<CalibrationSnapshot>,
    timecode: Option<Timecode>,
    video: Option<Box<dyn VideoEncoder>>,
    video_path: Option<PathBuf>,
    timecode_path: Option<PathBuf>,
    image_dir: Option<PathBuf>,
    frame_count: u64,
    skipped: u64,
    closed: bool,
}

impl FrameStreamManager {
    /// Look up the sensor, enable its profile, capture calibration and open
    /// every output under `dir`.
    ///
    /// Always returns a manager. On failure it is disabled and carries the
    /// reason. `color` is the profile other streams are posed against.
    pub fn enable(
        device: &dyn Device,
        request: StreamRequest,
        dir: &Path,
        color: Option<&VideoProfile>,
        encoders: &dyn VideoEncoderFactory,
    ) -> Self {
        let mut manager = Self {
            request,
            status: StreamStatus::default(),
            profile: None,
            calibration: None,
            timecode: None,
            video: None,
            video_path: None,
            timecode_path: None,
            image_dir: None,
            frame_count: 0,
            skipped: 0,
            closed: false,
        };

        match manager.open(device, dir, color, encoders) {
            Ok(()) => {
                manager.status.enable();
                tracing::info!(
                    "Enabled {} stream '{}' (profile {})",
                    manager.request.kind,
                    manager.request.name,
                    manager.request.profile_index
                );
            }
            Err(e) => {
                tracing::warn!("Stream '{}' disabled: {}", manager.request.name, e);
                manager.release();
                manager.remove_outputs();
                manager.status.disable(&e);
            }
        }
        manager
    }

    fn open(
        &mut self,
        device: &dyn Device,
        dir: &Path,
        color: Option<&VideoProfile>,
        encoders: &dyn VideoEncoderFactory,
    ) -> Result<(), StreamError> {
        let kind = self.request.kind;
        if !kind.is_frame_stream() {
            return Err(StreamError::WrongSensorKind {
                kind,
                expected: "frame",
            });
        }

        let sensor = device.sensor(kind).ok_or(StreamError::SensorNotFound(kind))?;
        let index = self.request.profile_index;
        let profile = sensor
            .profile(index)
            .and_then(|p| p.as_video())
            .cloned()
            .ok_or(StreamError::ProfileUnsupported {
                kind,
                index,
                available: sensor.profiles.len(),
            })?;

        device.enable_stream(&profile)?;
        self.calibration = Some(CalibrationSnapshot::capture(device, &profile, color));

        let name = self.request.name.clone();
        let timecode_path = dir.join(format!("{name}_timecode.txt"));
        let file =
            File::create(&timecode_path).map_err(|e| StreamError::filesystem(&timecode_path, e))?;
        let mut writer = BufWriter::new(file);
        let header = if kind == SensorKind::Depth {
            DEPTH_TIMECODE_HEADER
        } else {
            TIMECODE_HEADER
        };
        writeln!(writer, "{header}").map_err(|e| StreamError::filesystem(&timecode_path, e))?;
        self.timecode = Some(Timecode {
            writer,
            path: timecode_path.clone(),
        });
        self.timecode_path = Some(timecode_path);

        let output = &self.request.output;
        if output.save_image {
            let image_dir = dir.join(&name);
            fs::create_dir_all(&image_dir).map_err(|e| StreamError::filesystem(&image_dir, e))?;
            self.image_dir = Some(image_dir);
        }

        if output.save_video {
            let video_path = dir.join(format!("{name}.{}", output.container.extension()));
            let spec = VideoSpec {
                width: profile.width,
                height: profile.height,
                fps: profile.fps,
                layout: if kind == SensorKind::Color {
                    ChannelLayout::Bgr24
                } else {
                    ChannelLayout::Gray8
                },
                container: output.container,
                codec: output.codec,
            };
            match encoders.open(&video_path, spec) {
                Ok(encoder) => {
                    self.video = Some(encoder);
                    self.video_path = Some(video_path);
                }
                // Images and timecodes are still worth keeping
                Err(e) => {
                    let e = StreamError::Encoder(e);
                    tracing::warn!("Stream '{}' records without video: {}", name, e);
                    self.status.note(&e);
                }
            }
        }

        self.profile = Some(profile);
        Ok(())
    }

    fn normalize<'a>(&self, frame: &'a Frame) -> Result<Normalized<'a>, StreamError> {
        if let Some(profile) = &self.profile {
            if (frame.width, frame.height) != (profile.width, profile.height) {
                return Err(StreamError::InvalidFrame(format!(
                    "frame is {}x{}, stream is {}x{}",
                    frame.width, frame.height, profile.width, profile.height
                )));
            }
        }

        match frame.kind {
            SensorKind::Color => convert::to_rgb(frame).map(Normalized::Color),
            SensorKind::Depth => convert::depth_values(frame).map(Normalized::Depth),
            _ => convert::gray8(frame).map(Normalized::Infrared),
        }
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<(), StreamError> {
        let normalized = self.normalize(frame)?;

        let mut still_path = None;
        if let Some(image_dir) = &self.image_dir {
            let pixels = match &normalized {
                Normalized::Color(rgb) => StillPixels::Rgb8(rgb.clone()),
                Normalized::Depth(values) => StillPixels::Gray16(values.clone()),
                Normalized::Infrared(gray) => StillPixels::Gray8(gray.to_vec()),
            };
            let options = &self.request.output.still;
            let path = image_dir.join(format!(
                "{}_{}ms.{}",
                self.frame_count,
                frame.timestamp_ms,
                options.format_for(&pixels).extension()
            ));
            let image = StillImage {
                width: frame.width,
                height: frame.height,
                pixels,
            };
            write_still_image(&path, &image, options)
                .map_err(|e| StreamError::from_codec(&path, e))?;
            still_path = Some(path);
        }

        let video = match self.video.as_mut() {
            Some(video) => {
                let data = match &normalized {
                    Normalized::Color(rgb) => convert::swap_red_blue(rgb),
                    Normalized::Depth(values) => convert::stretch_to_u8(values),
                    Normalized::Infrared(gray) => gray.to_vec(),
                };
                video.write_frame(&data)
            }
            None => Ok(()),
        };
        if let Err(e) = video {
            self.abandon_video(e);
        }

        if let Some(timecode) = self.timecode.as_mut() {
            let line = if frame.kind == SensorKind::Depth {
                writeln!(timecode.writer, "{},{}", frame.timestamp_ms, frame.value_scale)
            } else {
                writeln!(timecode.writer, "{}", frame.timestamp_ms)
            };
            if let Err(e) = line {
                // An image without a timecode line would break the pairing
                if let Some(path) = &still_path {
                    if let Err(e) = fs::remove_file(path) {
                        tracing::warn!("Remove orphaned image {:?} failed: {}", path, e);
                    }
                }
                return Err(StreamError::filesystem(&timecode.path, e));
            }
        }

        Ok(())
    }

    /// Stop encoding video after a failed write; stills and timecodes go on
    fn abandon_video(&mut self, error: CodecError) {
        let error = StreamError::Encoder(error);
        tracing::warn!(
            "Stream '{}' continues without video: {}",
            self.request.name,
            error
        );
        self.status.note(&error);
        if let Some(mut video) = self.video.take() {
            if let Err(e) = video.finish() {
                tracing::debug!("Stream '{}' video finish after failure: {}", self.request.name, e);
            }
        }
    }

    /// Delete what a failed enable already created
    fn remove_outputs(&mut self) {
        for path in [self.timecode_path.take(), self.video_path.take()]
            .into_iter()
            .flatten()
        {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Remove {:?} failed: {}", path, e),
            }
        }
        if let Some(image_dir) = self.image_dir.take() {
            if let Err(e) = fs::remove_dir_all(&image_dir) {
                tracing::warn!("Remove {:?} failed: {}", image_dir, e);
            }
        }
    }

    /// Finish the video and flush the timecode log
    fn release(&mut self) {
        if let Some(mut video) = self.video.take() {
            if let Err(e) = video.finish() {
                tracing::warn!("Stream '{}' video did not finish: {}", self.request.name, e);
                self.status.note(&StreamError::Encoder(e));
            }
        }
        if let Some(mut timecode) = self.timecode.take() {
            if let Err(e) = timecode.writer.flush() {
                tracing::warn!("Stream '{}' timecode flush failed: {}", self.request.name, e);
                self.status.note(&StreamError::filesystem(&timecode.path, e));
            }
        }
    }

    /// Frames dropped by per-frame errors
    pub fn frames_skipped(&self) -> u64 {
        self.skipped
    }

    pub fn calibration(&self) -> Option<&CalibrationSnapshot> {
        self.calibration.as_ref()
    }

    /// The profile enabled on the device
    pub fn profile(&self) -> Option<&VideoProfile> {
        self.profile.as_ref()
    }
}

impl StreamManager for FrameStreamManager {
    fn name(&self) -> &str {
        &self.request.name
    }

    fn kind(&self) -> SensorKind {
        self.request.kind
    }

    fn is_enabled(&self) -> bool {
        self.status.is_enabled()
    }

    fn process_frameset(&mut self, frameset: &FrameSet) {
        if self.closed || !self.status.is_enabled() {
            return;
        }
        let Some(frame) = frameset.frame(self.request.kind) else {
            return;
        };

        match self.write_frame(frame) {
            Ok(()) => self.frame_count += 1,
            Err(e) if e.is_frame_local() => {
                self.skipped += 1;
                tracing::warn!(
                    "Stream '{}' skipped frame at {} ms: {}",
                    self.request.name,
                    frame.timestamp_ms,
                    e
                );
            }
            Err(e) => {
                tracing::error!("Stream '{}' disabled: {}", self.request.name, e);
                self.release();
                self.status.disable(&e);
            }
        }
    }

    fn metadata(&self) -> StreamMetadata {
        let output = &self.request.output;
        let mut metadata = StreamMetadata::new(&self.request, &self.status, self.frame_count);
        metadata.is_save_video = Some(output.save_video);
        metadata.is_save_image = Some(output.save_image);
        metadata.container_format = Some(output.container);
        metadata.codec = Some(output.codec);
        metadata.image_format = Some(output.still.format);
        metadata.compression_params = Some(output.still);
        metadata.video_name = self.video_path.as_deref().map(file_name);
        metadata.timecode_name = self.timecode_path.as_deref().map(file_name);
        metadata.image_dir = self.image_dir.as_deref().map(file_name);
        metadata.calibration = self.calibration.clone();
        metadata
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.release();
        if self.status.is_enabled() {
            tracing::info!(
                "Closed stream '{}': {} frames written, {} skipped",
                self.request.name,
                self.frame_count,
                self.skipped
            );
        }
    }

    fn frames_written(&self) -> u64 {
        self.frame_count
    }
}

impl Drop for FrameStreamManager {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::testing::MemoryEncoderFactory;
    use crate::codec::ImageFormat;
    use crate::device::mock::{synthesize_frame, SimulatedDevice, SimulatedDeviceConfig};
    use crate::device::PixelFormat;
    use crate::stream::OutputOptions;
    use tempfile::tempdir;

    fn device(sensors: Vec<SensorKind>) -> SimulatedDevice {
        SimulatedDevice::new(SimulatedDeviceConfig {
            sensors,
            width: 16,
            height: 8,
            ..SimulatedDeviceConfig::default()
        })
    }

    fn request(kind: SensorKind, save_image: bool) -> StreamRequest {
        StreamRequest::new(kind).with_output(OutputOptions {
            save_image,
            ..OutputOptions::default()
        })
    }

    fn timecode_lines(dir: &Path, name: &str) -> Vec<String> {
        fs::read_to_string(dir.join(format!("{name}_timecode.txt")))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn frameset(manager: &FrameStreamManager, index: u64) -> FrameSet {
        let frame = synthesize_frame(manager.profile().unwrap(), index, 1000 + index * 33);
        FrameSet::new().with(frame)
    }

    fn image_count(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_missing_sensor_disables_stream() {
        let dir = tempdir().unwrap();
        let device = device(vec![SensorKind::Color]);
        let encoders = MemoryEncoderFactory::default();

        let mut manager = FrameStreamManager::enable(
            &device,
            request(SensorKind::Depth, true),
            dir.path(),
            None,
            &encoders,
        );

        assert!(!manager.is_enabled());
        let metadata = manager.metadata();
        assert!(!metadata.is_enable);
        assert!(!metadata.error_msg.is_empty());
        assert_eq!(metadata.error_code.as_deref(), Some("SENSOR_NOT_FOUND"));
        assert!(metadata.calibration.is_none());
        assert!(!dir.path().join("depth_timecode.txt").exists());
        assert!(encoders.videos.lock().is_empty());

        manager.process_frameset(&FrameSet::new());
        assert_eq!(manager.frames_written(), 0);
    }

    #[test]
    fn test_profile_index_out_of_range() {
        let dir = tempdir().unwrap();
        let device = device(vec![SensorKind::Color]);
        let mut req = request(SensorKind::Color, false);
        req.profile_index = 7;

        let manager = FrameStreamManager::enable(
            &device,
            req,
            dir.path(),
            None,
            &MemoryEncoderFactory::default(),
        );

        assert!(!manager.is_enabled());
        assert_eq!(
            manager.metadata().error_code.as_deref(),
            Some("PROFILE_UNSUPPORTED")
        );
    }

    #[test]
    fn test_event_kind_rejected() {
        let dir = tempdir().unwrap();
        let device = device(SensorKind::ALL.to_vec());
        let manager = FrameStreamManager::enable(
            &device,
            request(SensorKind::Gyro, false),
            dir.path(),
            None,
            &MemoryEncoderFactory::default(),
        );
        assert_eq!(
            manager.metadata().error_code.as_deref(),
            Some("WRONG_SENSOR_KIND")
        );
    }

    #[test]
    fn test_color_frames_written_everywhere() {
        let dir = tempdir().unwrap();
        let device = device(vec![SensorKind::Color]);
        let encoders = MemoryEncoderFactory::default();
        let mut manager = FrameStreamManager::enable(
            &device,
            request(SensorKind::Color, true),
            dir.path(),
            None,
            &encoders,
        );
        assert!(manager.is_enabled());
        assert_eq!(device.enabled_profiles().len(), 1);

        for i in 0..3 {
            let set = frameset(&manager, i);
            manager.process_frameset(&set);
        }
        // A frameset without a color frame is skipped silently
        manager.process_frameset(&FrameSet::new());
        manager.close();

        assert_eq!(manager.frames_written(), 3);
        let lines = timecode_lines(dir.path(), "color");
        assert_eq!(lines, vec!["timestamp [ms]", "1000", "1033", "1066"]);
        assert_eq!(image_count(&dir.path().join("color")), 3);
        assert!(dir.path().join("color").join("2_1066ms.png").exists());

        let video = encoders.video("color").unwrap();
        assert_eq!(video.frames.len(), 3);
        assert_eq!(video.frames[0].len(), 16 * 8 * 3);
        assert!(video.finished);
    }

    #[test]
    fn test_depth_still_is_raw_and_video_is_stretched() {
        let dir = tempdir().unwrap();
        let device = device(vec![SensorKind::Depth]);
        let encoders = MemoryEncoderFactory::default();
        let mut manager = FrameStreamManager::enable(
            &device,
            request(SensorKind::Depth, true),
            dir.path(),
            None,
            &encoders,
        );

        let set = frameset(&manager, 0);
        let source = convert::depth_values(set.frame(SensorKind::Depth).unwrap()).unwrap();
        manager.process_frameset(&set);
        manager.close();

        let lines = timecode_lines(dir.path(), "depth");
        assert_eq!(lines, vec!["timestamp [ms],value scale", "1000,1"]);

        let file = File::open(dir.path().join("depth").join("0_1000ms.png")).unwrap();
        let mut reader = png::Decoder::new(file).read_info().unwrap();
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).unwrap();
        let stored: Vec<u16> = buf[..info.buffer_size()]
            .chunks_exact(2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(stored, source);

        let video = encoders.video("depth").unwrap();
        assert_eq!(video.frames[0], convert::stretch_to_u8(&source));
    }

    #[test]
    fn test_ir_jpeg_still() {
        let dir = tempdir().unwrap();
        let device = device(vec![SensorKind::IrLeft]);
        let mut req = request(SensorKind::IrLeft, true);
        req.output.still.format = ImageFormat::Jpeg;
        let mut manager = FrameStreamManager::enable(
            &device,
            req,
            dir.path(),
            None,
            &MemoryEncoderFactory::default(),
        );

        let set = frameset(&manager, 0);
        manager.process_frameset(&set);
        manager.close();

        assert!(dir.path().join("ir_left").join("0_1000ms.jpg").exists());
    }

    #[test]
    fn test_unsupported_format_skips_one_frame() {
        let dir = tempdir().unwrap();
        let device = device(vec![SensorKind::Color]);
        let encoders = MemoryEncoderFactory::default();
        let mut manager = FrameStreamManager::enable(
            &device,
            request(SensorKind::Color, true),
            dir.path(),
            None,
            &encoders,
        );

        let first = frameset(&manager, 0);
        manager.process_frameset(&first);

        let mut odd = synthesize_frame(manager.profile().unwrap(), 1, 1033);
        odd.format = PixelFormat::Nv12;
        manager.process_frameset(&FrameSet::new().with(odd));

        let third = frameset(&manager, 2);
        manager.process_frameset(&third);
        manager.close();

        assert!(manager.is_enabled());
        assert_eq!(manager.frames_written(), 2);
        assert_eq!(manager.frames_skipped(), 1);
        assert_eq!(
            timecode_lines(dir.path(), "color"),
            vec!["timestamp [ms]", "1000", "1066"]
        );
        assert_eq!(image_count(&dir.path().join("color")), 2);
        assert_eq!(encoders.video("color").unwrap().frames.len(), 2);
    }

    #[test]
    fn test_filesystem_error_disables_stream() {
        let dir = tempdir().unwrap();
        let device = device(vec![SensorKind::IrRight]);
        let encoders = MemoryEncoderFactory::default();
        let mut manager = FrameStreamManager::enable(
            &device,
            request(SensorKind::IrRight, true),
            dir.path(),
            None,
            &encoders,
        );

        let first = frameset(&manager, 0);
        manager.process_frameset(&first);
        fs::remove_dir_all(dir.path().join("ir_right")).unwrap();
        let second = frameset(&manager, 1);
        manager.process_frameset(&second);
        let third = frameset(&manager, 2);
        manager.process_frameset(&third);

        assert!(!manager.is_enabled());
        assert_eq!(manager.frames_written(), 1);
        assert_eq!(
            manager.metadata().error_code.as_deref(),
            Some("FILESYSTEM_ERROR")
        );
        // Handles were released when the stream was disabled
        assert!(encoders.video("ir_right").unwrap().finished);
        assert_eq!(timecode_lines(dir.path(), "ir_right").len(), 2);
    }

    #[test]
    fn test_video_open_failure_keeps_stream() {
        let dir = tempdir().unwrap();
        let device = device(vec![SensorKind::Color]);
        let encoders = MemoryEncoderFactory {
            fail_open: true,
            ..MemoryEncoderFactory::default()
        };
        let mut manager = FrameStreamManager::enable(
            &device,
            request(SensorKind::Color, false),
            dir.path(),
            None,
            &encoders,
        );

        assert!(manager.is_enabled());
        let set = frameset(&manager, 0);
        manager.process_frameset(&set);
        assert_eq!(manager.frames_written(), 1);

        let metadata = manager.metadata();
        assert!(metadata.video_name.is_none());
        assert_eq!(metadata.error_code.as_deref(), Some("ENCODER_ERROR"));
    }

    #[test]
    fn test_video_write_failure_keeps_images_and_timecodes_paired() {
        let dir = tempdir().unwrap();
        let device = device(vec![SensorKind::Color]);
        let encoders = MemoryEncoderFactory {
            fail_after: Some(1),
            ..MemoryEncoderFactory::default()
        };
        let mut manager = FrameStreamManager::enable(
            &device,
            request(SensorKind::Color, true),
            dir.path(),
            None,
            &encoders,
        );

        for index in 0..3 {
            let set = frameset(&manager, index);
            manager.process_frameset(&set);
        }

        assert!(manager.is_enabled());
        assert_eq!(manager.frames_written(), 3);
        assert_eq!(image_count(&dir.path().join("color")), 3);
        assert_eq!(timecode_lines(dir.path(), "color").len(), 4);

        let video = encoders.video("color").unwrap();
        assert_eq!(video.frames.len(), 1);
        assert!(video.finished);
        assert_eq!(
            manager.metadata().error_code.as_deref(),
            Some("ENCODER_ERROR")
        );
    }

    #[test]
    fn test_failed_enable_leaves_no_timecode_file() {
        let dir = tempdir().unwrap();
        // A plain file where the image directory should go
        fs::write(dir.path().join("color"), b"").unwrap();
        let device = device(vec![SensorKind::Color]);
        let encoders = MemoryEncoderFactory::default();

        let manager = FrameStreamManager::enable(
            &device,
            request(SensorKind::Color, true),
            dir.path(),
            None,
            &encoders,
        );

        assert!(!manager.is_enabled());
        assert_eq!(
            manager.metadata().error_code.as_deref(),
            Some("FILESYSTEM_ERROR")
        );
        assert!(!dir.path().join("color_timecode.txt").exists());
        assert!(manager.metadata().timecode_name.is_none());
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempdir().unwrap();
        let device = device(vec![SensorKind::Color]);
        let encoders = MemoryEncoderFactory::default();
        let mut manager = FrameStreamManager::enable(
            &device,
            request(SensorKind::Color, false),
            dir.path(),
            None,
            &encoders,
        );
        let set = frameset(&manager, 0);
        manager.process_frameset(&set);

        manager.close();
        let after_first = fs::read_to_string(dir.path().join("color_timecode.txt")).unwrap();
        manager.close();
        manager.process_frameset(&set);
        drop(manager);

        let after_second = fs::read_to_string(dir.path().join("color_timecode.txt")).unwrap();
        assert_eq!(after_first, after_second);
        assert_eq!(encoders.video("color").unwrap().finish_calls, 1);
    }

    #[test]
    fn test_metadata_carries_calibration_and_names() {
        let dir = tempdir().unwrap();
        let device = device(vec![SensorKind::Color, SensorKind::Depth]);
        let encoders = MemoryEncoderFactory::default();
        let color = FrameStreamManager::enable(
            &device,
            request(SensorKind::Color, false),
            dir.path(),
            None,
            &encoders,
        );
        let color_profile = color.profile().cloned();
        let depth = FrameStreamManager::enable(
            &device,
            request(SensorKind::Depth, true),
            dir.path(),
            color_profile.as_ref(),
            &encoders,
        );

        let metadata = depth.metadata();
        assert!(metadata.is_enable);
        assert_eq!(metadata.video_name.as_deref(), Some("depth.avi"));
        assert_eq!(metadata.timecode_name.as_deref(), Some("depth_timecode.txt"));
        assert_eq!(metadata.image_dir.as_deref(), Some("depth"));
        let calibration = metadata.calibration.unwrap();
        assert_eq!(calibration.t[0], -25.0);
    }
}
