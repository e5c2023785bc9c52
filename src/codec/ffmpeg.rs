//! FFmpeg video encoder
//!
//! Raw frames are piped into an `ffmpeg` child process over stdin; FFmpeg
//! does the compression and muxing.

use super::{ChannelLayout, CodecError, VideoCodec, VideoEncoder, VideoEncoderFactory, VideoSpec};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;

/// Spawns one FFmpeg process per video output
pub struct FfmpegEncoderFactory {
    binary: PathBuf,
    available: OnceLock<bool>,
}

impl FfmpegEncoderFactory {
    pub fn new() -> Self {
        Self::with_binary("ffmpeg")
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            available: OnceLock::new(),
        }
    }

    /// Whether the FFmpeg binary can be executed (checked once)
    pub fn is_available(&self) -> bool {
        *self.available.get_or_init(|| {
            let ok = Command::new(&self.binary)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|s| s.success())
                .unwrap_or(false);
            if !ok {
                tracing::warn!("FFmpeg not found at {:?}; video outputs are disabled", self.binary);
            }
            ok
        })
    }

    fn args(spec: &VideoSpec, output: &Path) -> Vec<String> {
        let pixel_format = match spec.layout {
            ChannelLayout::Bgr24 => "bgr24",
            ChannelLayout::Gray8 => "gray",
        };
        let mut args: Vec<String> = [
            "-y",
            "-loglevel",
            "error",
            "-nostats",
            "-f",
            "rawvideo",
            "-pixel_format",
            pixel_format,
            "-video_size",
            &format!("{}x{}", spec.width, spec.height),
            "-framerate",
            &spec.fps.to_string(),
            "-i",
            "-",
            "-c:v",
            spec.codec.ffmpeg_encoder(),
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        match spec.codec {
            VideoCodec::Mjpeg => {
                args.extend(["-q:v", "3", "-pix_fmt", "yuvj420p"].map(String::from));
            }
            VideoCodec::H264 => {
                args.extend(
                    [
                        "-preset",
                        "veryfast",
                        "-pix_fmt",
                        "yuv420p",
                        "-crf",
                        "18",
                        "-g",
                        &(spec.fps * 2).to_string(),
                        "-movflags",
                        "+faststart",
                    ]
                    .map(String::from),
                );
            }
        }

        args.push(output.to_string_lossy().to_string());
        args
    }
}

impl Default for FfmpegEncoderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoEncoderFactory for FfmpegEncoderFactory {
    fn open(&self, path: &Path, spec: VideoSpec) -> Result<Box<dyn VideoEncoder>, CodecError> {
        if !self.is_available() {
            return Err(CodecError::Ffmpeg(
                "FFmpeg not found. Please install FFmpeg and add it to PATH.".to_string(),
            ));
        }

        let process = Command::new(&self.binary)
            .args(Self::args(&spec, path))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CodecError::Ffmpeg(format!("Failed to start FFmpeg: {e}")))?;

        tracing::info!(
            "Started FFmpeg encoder: {}x{} @ {}fps {:?}/{:?}, output: {:?}",
            spec.width,
            spec.height,
            spec.fps,
            spec.layout,
            spec.codec,
            path
        );

        Ok(Box::new(FfmpegEncoder {
            process: Some(process),
            spec,
            output: path.to_path_buf(),
            frame_count: 0,
        }))
    }
}

/// FFmpeg encoder for one video file
struct FfmpegEncoder {
    process: Option<Child>,
    spec: VideoSpec,
    output: PathBuf,
    frame_count: u64,
}

impl VideoEncoder for FfmpegEncoder {
    fn write_frame(&mut self, data: &[u8]) -> Result<(), CodecError> {
        let expected = self.spec.frame_bytes();
        if data.len() != expected {
            return Err(CodecError::FrameSize {
                expected,
                got: data.len(),
            });
        }

        let stdin = self
            .process
            .as_mut()
            .and_then(|p| p.stdin.as_mut())
            .ok_or(CodecError::Finished)?;
        stdin.write_all(data)?;
        self.frame_count += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), CodecError> {
        let Some(mut process) = self.process.take() else {
            return Ok(());
        };

        // Closing stdin signals EOF
        drop(process.stdin.take());
        let output = process.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!("FFmpeg exited with status {}: {}", output.status, stderr);
            return Err(CodecError::Ffmpeg(format!(
                "exited with status {}",
                output.status
            )));
        }

        tracing::info!(
            "FFmpeg finished: {} frames, output: {:?}",
            self.frame_count,
            self.output
        );
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frame_count
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if self.process.is_some() {
            if let Err(e) = self.finish() {
                tracing::warn!("FFmpeg encoder for {:?} did not finish cleanly: {}", self.output, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::VideoContainer;

    fn spec(layout: ChannelLayout, codec: VideoCodec) -> VideoSpec {
        VideoSpec {
            width: 640,
            height: 480,
            fps: 30,
            layout,
            container: VideoContainer::Avi,
            codec,
        }
    }

    #[test]
    fn test_mjpeg_args() {
        let args = FfmpegEncoderFactory::args(
            &spec(ChannelLayout::Bgr24, VideoCodec::Mjpeg),
            Path::new("/tmp/color.avi"),
        );
        let joined = args.join(" ");
        assert!(joined.contains("-pixel_format bgr24"));
        assert!(joined.contains("-video_size 640x480"));
        assert!(joined.contains("-c:v mjpeg"));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/color.avi"));
    }

    #[test]
    fn test_gray_h264_args() {
        let args = FfmpegEncoderFactory::args(
            &spec(ChannelLayout::Gray8, VideoCodec::H264),
            Path::new("/tmp/depth.mp4"),
        );
        let joined = args.join(" ");
        assert!(joined.contains("-pixel_format gray"));
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-g 60"));
    }

    #[test]
    fn test_missing_binary_fails_open() {
        let factory = FfmpegEncoderFactory::with_binary("/nonexistent/ffmpeg-binary");
        assert!(!factory.is_available());
        let result = factory.open(
            Path::new("/tmp/never.avi"),
            spec(ChannelLayout::Gray8, VideoCodec::Mjpeg),
        );
        assert!(matches!(result, Err(CodecError::Ffmpeg(_))));
    }
}
