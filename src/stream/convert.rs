//! Pixel format normalization
//!
//! Color payloads are brought to packed 8-bit RGB, then swapped into the
//! encoder's channel order. Depth stays 16-bit for stills and is stretched
//! to 8-bit per frame for video.

use super::StreamError;
use crate::device::{Frame, PixelFormat};

/// Normalize a color frame to packed RGB8
pub fn to_rgb(frame: &Frame) -> Result<Vec<u8>, StreamError> {
    let pixels = frame.width as usize * frame.height as usize;

    match frame.format {
        PixelFormat::Rgb => {
            check_len(frame, pixels * 3)?;
            Ok(frame.data.clone())
        }
        PixelFormat::Bgr => {
            check_len(frame, pixels * 3)?;
            Ok(swap_red_blue(&frame.data))
        }
        PixelFormat::Yuyv => {
            check_len(frame, pixels * 2)?;
            Ok(packed_yuv422_to_rgb(&frame.data, 0, 1, 2, 3))
        }
        PixelFormat::Uyvy => {
            check_len(frame, pixels * 2)?;
            Ok(packed_yuv422_to_rgb(&frame.data, 1, 0, 3, 2))
        }
        PixelFormat::Mjpeg => decode_mjpeg(frame),
        other => Err(StreamError::UnsupportedFormat(other)),
    }
}

/// RGB8 to BGR8 (and back)
pub fn swap_red_blue(data: &[u8]) -> Vec<u8> {
    data.chunks_exact(3).flat_map(|p| [p[2], p[1], p[0]]).collect()
}

/// Little-endian 16-bit depth payload to values
pub fn depth_values(frame: &Frame) -> Result<Vec<u16>, StreamError> {
    if frame.format != PixelFormat::Y16 {
        return Err(StreamError::UnsupportedFormat(frame.format));
    }
    check_len(frame, frame.width as usize * frame.height as usize * 2)?;
    Ok(frame
        .data
        .chunks_exact(2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .collect())
}

/// Linear stretch of one depth frame to 8 bits: `255 * (v - min) / (max - min)`.
///
/// Uses this frame's own min/max, so brightness is not comparable across
/// frames. A flat frame maps to all zeros.
pub fn stretch_to_u8(values: &[u16]) -> Vec<u8> {
    let (min, max) = values
        .iter()
        .fold((u16::MAX, u16::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if values.is_empty() || max <= min {
        return vec![0; values.len()];
    }
    let range = (max - min) as f32;
    values
        .iter()
        .map(|&v| (255.0 * (v - min) as f32 / range).round() as u8)
        .collect()
}

/// Single 8-bit channel payload (infrared)
pub fn gray8(frame: &Frame) -> Result<&[u8], StreamError> {
    if frame.format != PixelFormat::Y8 {
        return Err(StreamError::UnsupportedFormat(frame.format));
    }
    check_len(frame, frame.width as usize * frame.height as usize)?;
    Ok(&frame.data)
}

fn check_len(frame: &Frame, expected: usize) -> Result<(), StreamError> {
    if frame.data.len() != expected {
        return Err(StreamError::InvalidFrame(format!(
            "{} {}x{} {} frame has {} bytes, expected {}",
            frame.kind,
            frame.width,
            frame.height,
            frame.format,
            frame.data.len(),
            expected
        )));
    }
    Ok(())
}

/// Packed 4:2:2 to RGB; offsets locate Y0, U, Y1, V inside each 4-byte group
fn packed_yuv422_to_rgb(data: &[u8], y0: usize, u: usize, y1: usize, v: usize) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(data.len() / 2 * 3);
    for group in data.chunks_exact(4) {
        let (cu, cv) = (group[u], group[v]);
        rgb.extend_from_slice(&yuv_to_rgb(group[y0], cu, cv));
        rgb.extend_from_slice(&yuv_to_rgb(group[y1], cu, cv));
    }
    rgb
}

/// BT.601 limited range
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let r = (298 * c + 409 * e + 128) >> 8;
    let g = (298 * c - 100 * d - 208 * e + 128) >> 8;
    let b = (298 * c + 516 * d + 128) >> 8;
    [
        r.clamp(0, 255) as u8,
        g.clamp(0, 255) as u8,
        b.clamp(0, 255) as u8,
    ]
}

fn decode_mjpeg(frame: &Frame) -> Result<Vec<u8>, StreamError> {
    let decoded = image::load_from_memory_with_format(&frame.data, image::ImageFormat::Jpeg)
        .map_err(|e| StreamError::InvalidFrame(format!("MJPEG decode failed: {e}")))?
        .into_rgb8();
    if decoded.dimensions() != (frame.width, frame.height) {
        return Err(StreamError::InvalidFrame(format!(
            "MJPEG frame is {}x{}, expected {}x{}",
            decoded.width(),
            decoded.height(),
            frame.width,
            frame.height
        )));
    }
    Ok(decoded.into_raw())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::synthesize_frame;
    use crate::device::{Distortion, Intrinsics, SensorKind, VideoProfile};

    fn color_frame(format: PixelFormat, data: Vec<u8>, width: u32, height: u32) -> Frame {
        Frame {
            kind: SensorKind::Color,
            format,
            width,
            height,
            timestamp_ms: 0,
            value_scale: 1.0,
            data,
        }
    }

    fn color_profile(format: PixelFormat) -> VideoProfile {
        VideoProfile {
            kind: SensorKind::Color,
            width: 16,
            height: 8,
            fps: 30,
            format,
            intrinsics: Intrinsics::default(),
            distortion: Distortion::default(),
        }
    }

    #[test]
    fn test_bgr_swapped_to_rgb() {
        let frame = color_frame(PixelFormat::Bgr, vec![1, 2, 3, 4, 5, 6], 2, 1);
        assert_eq!(to_rgb(&frame).unwrap(), vec![3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn test_yuyv_gray_decodes_to_gray() {
        // Y=126 with neutral chroma is mid gray
        let frame = color_frame(PixelFormat::Yuyv, vec![126, 128, 126, 128], 2, 1);
        let rgb = to_rgb(&frame).unwrap();
        assert_eq!(rgb.len(), 6);
        assert!(rgb.iter().all(|&c| (127..=129).contains(&c)), "{rgb:?}");
    }

    #[test]
    fn test_uyvy_matches_yuyv() {
        let yuyv = color_frame(PixelFormat::Yuyv, vec![81, 90, 145, 240], 2, 1);
        let uyvy = color_frame(PixelFormat::Uyvy, vec![90, 81, 240, 145], 2, 1);
        assert_eq!(to_rgb(&yuyv).unwrap(), to_rgb(&uyvy).unwrap());
    }

    #[test]
    fn test_mjpeg_decodes_to_frame_size() {
        let frame = synthesize_frame(&color_profile(PixelFormat::Mjpeg), 0, 0);
        let rgb = to_rgb(&frame).unwrap();
        assert_eq!(rgb.len(), 16 * 8 * 3);
    }

    #[test]
    fn test_unsupported_format() {
        let frame = synthesize_frame(&color_profile(PixelFormat::Nv12), 0, 0);
        assert!(matches!(
            to_rgb(&frame),
            Err(StreamError::UnsupportedFormat(PixelFormat::Nv12))
        ));
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let frame = color_frame(PixelFormat::Rgb, vec![0; 5], 2, 1);
        assert!(matches!(to_rgb(&frame), Err(StreamError::InvalidFrame(_))));
    }

    #[test]
    fn test_stretch_uses_frame_min_max() {
        assert_eq!(stretch_to_u8(&[1000, 1500, 2000]), vec![0, 128, 255]);
        // Same shape at a different depth maps to the same brightness
        assert_eq!(stretch_to_u8(&[3000, 3500, 4000]), vec![0, 128, 255]);
    }

    #[test]
    fn test_stretch_flat_frame() {
        assert_eq!(stretch_to_u8(&[700, 700]), vec![0, 0]);
        assert!(stretch_to_u8(&[]).is_empty());
    }
}
