//! Codec collaborator
//!
//! - `VideoEncoderFactory` / `VideoEncoder`: append raw frames to one
//!   ongoing video per stream (FFmpeg-backed in [`ffmpeg`])
//! - [`still`]: PNG/JPEG still images, including 16-bit depth

pub mod ffmpeg;
pub mod still;

pub use ffmpeg::FfmpegEncoderFactory;
pub use still::{write_still_image, ImageFormat, StillImage, StillOptions, StillPixels};

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Codec-related errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PNG encoding error: {0}")]
    Png(#[from] png::EncodingError),

    #[error("JPEG encoding error: {0}")]
    Jpeg(#[from] image::ImageError),

    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    #[error("Frame is {got} bytes, encoder expects {expected}")]
    FrameSize { expected: usize, got: usize },

    #[error("Encoder already finished")]
    Finished,
}

/// Container for video output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoContainer {
    Avi,
    Mp4,
}

impl VideoContainer {
    pub fn extension(&self) -> &'static str {
        match self {
            VideoContainer::Avi => "avi",
            VideoContainer::Mp4 => "mp4",
        }
    }
}

/// Video compression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    Mjpeg,
    H264,
}

impl VideoCodec {
    /// FFmpeg encoder name
    pub fn ffmpeg_encoder(&self) -> &'static str {
        match self {
            VideoCodec::Mjpeg => "mjpeg",
            VideoCodec::H264 => "libx264",
        }
    }
}

/// Raw pixel layout handed to a video encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelLayout {
    /// 3 channels, blue first
    Bgr24,
    /// 1 channel
    Gray8,
}

impl ChannelLayout {
    pub fn channels(&self) -> usize {
        match self {
            ChannelLayout::Bgr24 => 3,
            ChannelLayout::Gray8 => 1,
        }
    }
}

/// Fixed parameters of one video output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoSpec {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub layout: ChannelLayout,
    pub container: VideoContainer,
    pub codec: VideoCodec,
}

impl VideoSpec {
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * self.layout.channels()
    }
}

/// One ongoing video encoding
pub trait VideoEncoder: Send {
    /// Append one frame laid out per the [`VideoSpec`] layout
    fn write_frame(&mut self, data: &[u8]) -> Result<(), CodecError>;

    /// Flush and release the encoder; later calls are no-ops
    fn finish(&mut self) -> Result<(), CodecError>;

    fn frames_written(&self) -> u64;
}

/// Opens video encoders
pub trait VideoEncoderFactory: Send + Sync {
    fn open(&self, path: &Path, spec: VideoSpec) -> Result<Box<dyn VideoEncoder>, CodecError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory encoder factory so tests never need an ffmpeg binary

    use super::*;
    use parking_lot::Mutex;
    use std::path::PathBuf;
    use std::sync::Arc;

    #[derive(Debug, Default, Clone)]
    pub struct EncodedVideo {
        pub path: PathBuf,
        pub frames: Vec<Vec<u8>>,
        pub finished: bool,
        pub finish_calls: usize,
    }

    /// Records every frame written through encoders it opened
    #[derive(Default, Clone)]
    pub struct MemoryEncoderFactory {
        pub videos: Arc<Mutex<Vec<EncodedVideo>>>,
        pub fail_open: bool,
        /// Writes fail once this many frames are stored
        pub fail_after: Option<usize>,
    }

    impl MemoryEncoderFactory {
        pub fn video(&self, name: &str) -> Option<EncodedVideo> {
            self.videos
                .lock()
                .iter()
                .find(|v| v.path.file_stem().and_then(|s| s.to_str()) == Some(name))
                .cloned()
        }
    }

    struct MemoryEncoder {
        slot: usize,
        spec: VideoSpec,
        videos: Arc<Mutex<Vec<EncodedVideo>>>,
        fail_after: Option<usize>,
    }

    impl VideoEncoder for MemoryEncoder {
        fn write_frame(&mut self, data: &[u8]) -> Result<(), CodecError> {
            if data.len() != self.spec.frame_bytes() {
                return Err(CodecError::FrameSize {
                    expected: self.spec.frame_bytes(),
                    got: data.len(),
                });
            }
            let mut videos = self.videos.lock();
            if videos[self.slot].finished {
                return Err(CodecError::Finished);
            }
            if self.fail_after == Some(videos[self.slot].frames.len()) {
                return Err(CodecError::Ffmpeg("pipe closed".into()));
            }
            videos[self.slot].frames.push(data.to_vec());
            Ok(())
        }

        fn finish(&mut self) -> Result<(), CodecError> {
            let mut videos = self.videos.lock();
            videos[self.slot].finished = true;
            videos[self.slot].finish_calls += 1;
            Ok(())
        }

        fn frames_written(&self) -> u64 {
            self.videos.lock()[self.slot].frames.len() as u64
        }
    }

    impl VideoEncoderFactory for MemoryEncoderFactory {
        fn open(&self, path: &Path, spec: VideoSpec) -> Result<Box<dyn VideoEncoder>, CodecError> {
            if self.fail_open {
                return Err(CodecError::Ffmpeg("FFmpeg not found".into()));
            }
            let mut videos = self.videos.lock();
            videos.push(EncodedVideo {
                path: path.to_path_buf(),
                ..EncodedVideo::default()
            });
            Ok(Box::new(MemoryEncoder {
                slot: videos.len() - 1,
                spec,
                videos: self.videos.clone(),
                fail_after: self.fail_after,
            }))
        }
    }
}
