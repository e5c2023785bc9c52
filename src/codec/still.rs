//! Still image writer
//!
//! PNG through `png`, JPEG through `image`. 16-bit depth is always PNG so
//! raw values survive bit-for-bit.

use super::CodecError;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Still image file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }
}

/// Still image options of one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StillOptions {
    pub format: ImageFormat,
    /// 0 (fastest) to 9 (smallest)
    pub png_compression: u8,
    /// 1 to 100
    pub jpeg_quality: u8,
}

impl Default for StillOptions {
    fn default() -> Self {
        Self {
            format: ImageFormat::Png,
            png_compression: 3,
            jpeg_quality: 95,
        }
    }
}

impl StillOptions {
    /// Format actually written for `pixels`
    pub fn format_for(&self, pixels: &StillPixels) -> ImageFormat {
        match pixels {
            StillPixels::Gray16(_) => ImageFormat::Png,
            _ => self.format,
        }
    }

    fn png_compression(&self) -> png::Compression {
        match self.png_compression {
            0..=2 => png::Compression::Fast,
            3..=6 => png::Compression::Default,
            _ => png::Compression::Best,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StillPixels {
    Rgb8(Vec<u8>),
    Gray8(Vec<u8>),
    Gray16(Vec<u16>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StillImage {
    pub width: u32,
    pub height: u32,
    pub pixels: StillPixels,
}

impl StillImage {
    fn expected_samples(&self) -> usize {
        let pixels = self.width as usize * self.height as usize;
        match self.pixels {
            StillPixels::Rgb8(_) => pixels * 3,
            StillPixels::Gray8(_) | StillPixels::Gray16(_) => pixels,
        }
    }

    fn samples(&self) -> usize {
        match &self.pixels {
            StillPixels::Rgb8(d) | StillPixels::Gray8(d) => d.len(),
            StillPixels::Gray16(d) => d.len(),
        }
    }
}

/// Write one still image to `path`
pub fn write_still_image(
    path: &Path,
    image: &StillImage,
    options: &StillOptions,
) -> Result<(), CodecError> {
    if image.samples() != image.expected_samples() {
        return Err(CodecError::FrameSize {
            expected: image.expected_samples(),
            got: image.samples(),
        });
    }

    match options.format_for(&image.pixels) {
        ImageFormat::Png => write_png(path, image, options.png_compression()),
        ImageFormat::Jpeg => write_jpeg(path, image, options.jpeg_quality.clamp(1, 100)),
    }
}

fn write_png(path: &Path, image: &StillImage, compression: png::Compression) -> Result<(), CodecError> {
    let file = File::create(path)?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), image.width, image.height);
    encoder.set_compression(compression);

    let data = match &image.pixels {
        StillPixels::Rgb8(data) => {
            encoder.set_color(png::ColorType::Rgb);
            encoder.set_depth(png::BitDepth::Eight);
            data.clone()
        }
        StillPixels::Gray8(data) => {
            encoder.set_color(png::ColorType::Grayscale);
            encoder.set_depth(png::BitDepth::Eight);
            data.clone()
        }
        StillPixels::Gray16(values) => {
            encoder.set_color(png::ColorType::Grayscale);
            encoder.set_depth(png::BitDepth::Sixteen);
            // PNG stores 16-bit samples big-endian
            values.iter().flat_map(|v| v.to_be_bytes()).collect()
        }
    };

    let mut writer = encoder.write_header()?;
    writer.write_image_data(&data)?;
    writer.finish()?;
    Ok(())
}

fn write_jpeg(path: &Path, image: &StillImage, quality: u8) -> Result<(), CodecError> {
    let (data, color) = match &image.pixels {
        StillPixels::Rgb8(data) => (data, ExtendedColorType::Rgb8),
        StillPixels::Gray8(data) => (data, ExtendedColorType::L8),
        StillPixels::Gray16(_) => return write_png(path, image, png::Compression::Default),
    };

    let mut out = BufWriter::new(File::create(path)?);
    JpegEncoder::new_with_quality(&mut out, quality).encode(data, image.width, image.height, color)?;
    Ok(())
}
