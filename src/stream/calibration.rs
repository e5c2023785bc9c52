//! Per-stream camera model captured when a frame stream is enabled.

use crate::device::{Device, Extrinsics, PixelFormat, SensorKind, VideoProfile};
use serde::{Deserialize, Serialize};

/// Where the extrinsic pose came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtrinsicSource {
    /// The stream is the color reference itself
    Reference,
    /// Reported by the device
    Device,
    /// Device query failed; identity was substituted
    Fallback,
}

/// Immutable camera model of one frame stream.
///
/// Rotation and translation are relative to the color stream; for the color
/// stream itself they are identity and zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationSnapshot {
    pub sensor_type: SensorKind,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    pub k1: f32,
    pub k2: f32,
    pub k3: f32,
    pub k4: f32,
    pub k5: f32,
    pub k6: f32,
    pub p1: f32,
    pub p2: f32,
    pub r: [f32; 9],
    pub t: [f32; 3],
    pub extrinsic_source: ExtrinsicSource,
}

impl CalibrationSnapshot {
    /// Capture the camera model of `profile`, posed against `color`.
    ///
    /// A failed extrinsic query is logged and falls back to identity.
    pub fn capture(
        device: &dyn Device,
        profile: &VideoProfile,
        color: Option<&VideoProfile>,
    ) -> Self {
        let (extrinsics, source) = if profile.kind == SensorKind::Color {
            (Extrinsics::IDENTITY, ExtrinsicSource::Reference)
        } else {
            match color.map(|color| device.extrinsic_to(profile, color)) {
                Some(Ok(extrinsics)) => (extrinsics, ExtrinsicSource::Device),
                Some(Err(e)) => {
                    tracing::warn!("{} extrinsic unavailable, using identity: {}", profile.kind, e);
                    (Extrinsics::IDENTITY, ExtrinsicSource::Fallback)
                }
                None => {
                    tracing::warn!("No color profile to pose {} against, using identity", profile.kind);
                    (Extrinsics::IDENTITY, ExtrinsicSource::Fallback)
                }
            }
        };

        Self::from_parts(profile, extrinsics, source)
    }

    fn from_parts(profile: &VideoProfile, extrinsics: Extrinsics, source: ExtrinsicSource) -> Self {
        let i = &profile.intrinsics;
        let d = &profile.distortion;
        Self {
            sensor_type: profile.kind,
            fps: profile.fps,
            width: profile.width,
            height: profile.height,
            format: profile.format,
            fx: i.fx,
            fy: i.fy,
            cx: i.cx,
            cy: i.cy,
            k1: d.k1,
            k2: d.k2,
            k3: d.k3,
            k4: d.k4,
            k5: d.k5,
            k6: d.k6,
            p1: d.p1,
            p2: d.p2,
            r: extrinsics.rotation,
            t: extrinsics.translation,
            extrinsic_source: source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::{SimulatedDevice, SimulatedDeviceConfig};

    fn profile(device: &SimulatedDevice, kind: SensorKind) -> VideoProfile {
        device
            .sensor(kind)
            .and_then(|s| s.profile(0).and_then(|p| p.as_video()).cloned())
            .unwrap()
    }

    #[test]
    fn test_color_is_reference_frame() {
        let device = SimulatedDevice::new(SimulatedDeviceConfig::default());
        let color = profile(&device, SensorKind::Color);
        let snapshot = CalibrationSnapshot::capture(&device, &color, Some(&color));
        assert_eq!(snapshot.r, Extrinsics::IDENTITY.rotation);
        assert_eq!(snapshot.t, [0.0; 3]);
        assert_eq!(snapshot.extrinsic_source, ExtrinsicSource::Reference);
    }

    #[test]
    fn test_depth_posed_against_color() {
        let device = SimulatedDevice::new(SimulatedDeviceConfig::default());
        let color = profile(&device, SensorKind::Color);
        let depth = profile(&device, SensorKind::Depth);
        let snapshot = CalibrationSnapshot::capture(&device, &depth, Some(&color));
        assert_eq!(snapshot.extrinsic_source, ExtrinsicSource::Device);
        assert_eq!(snapshot.t[0], -25.0);
        assert_eq!(snapshot.fx, depth.intrinsics.fx);
        assert_eq!(snapshot.width, depth.width);
    }

    #[test]
    fn test_fallback_without_color() {
        let device = SimulatedDevice::new(SimulatedDeviceConfig::default());
        let ir = profile(&device, SensorKind::IrRight);
        let snapshot = CalibrationSnapshot::capture(&device, &ir, None);
        assert_eq!(snapshot.extrinsic_source, ExtrinsicSource::Fallback);
        assert_eq!(snapshot.r, Extrinsics::IDENTITY.rotation);
    }
}
