use std::path::{Path, PathBuf};
use std::time::Duration;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::display::DisplayPlane;
use crate::error::ConfigError;
use crate::io::object_from_json;
use crate::mounting::MountingCorrection;
use crate::transform::CameraOffset;
use crate::types::RvecTvec;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Display center in the observer camera frame, meters.
    pub center: [f64; 3],
    /// Active area in meters.
    pub width: f64,
    pub height: f64,
    /// Addressable pixels. The panel has 64 rows but the bottom ones sit
    /// outside the transparent window.
    pub resolution: [u32; 2],
    pub dot_radius: u32,
    pub brightness: f32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            center: [-0.005, 0.0, 0.0383],
            width: 0.04204,
            height: 0.02722,
            resolution: [128, 56],
            dot_radius: 1,
            brightness: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub enabled: bool,
    pub command: Vec<String>,
    pub poll_interval_ms: u64,
    pub grace_period_ms: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: ["rpicam-hello", "--camera", "1", "--vflip", "--timeout", "0"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            poll_interval_ms: 200,
            grace_period_ms: 3000,
        }
    }
}

impl PreviewConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

/// Deployment description of one headset assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub calibration_path: PathBuf,
    /// Printed marker side length, meters.
    pub marker_length: f64,
    /// Observer camera pose in the forward-facing camera frame.
    pub observer_from_forward: RvecTvec,
    pub display: DisplayConfig,
    pub mounting: MountingCorrection,
    /// The forward camera is mounted upside-down on the reference headset.
    pub rotate_capture_180: bool,
    pub preview: PreviewConfig,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            calibration_path: PathBuf::from("calibration/camera_calibration.yaml"),
            marker_length: 0.1,
            observer_from_forward: RvecTvec::from_translation([0.0383, 0.0, 0.0436]),
            display: DisplayConfig::default(),
            mounting: MountingCorrection::mirrored_horizontally(),
            rotate_capture_180: true,
            preview: PreviewConfig::default(),
        }
    }
}

impl OverlayConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<OverlayConfig, ConfigError> {
        let config: OverlayConfig = object_from_json(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.marker_length > 0.0) {
            return Err(ConfigError::NonPositiveMarkerLength(self.marker_length));
        }
        if !self.observer_from_forward.is_finite() {
            return Err(ConfigError::NonFinite("observer_from_forward"));
        }
        if !(0.0..=1.0).contains(&self.display.brightness) {
            return Err(ConfigError::OutOfUnitRange(
                "brightness",
                self.display.brightness as f64,
            ));
        }
        self.display_plane().map(|_| ())
    }

    pub fn display_plane(&self) -> Result<DisplayPlane, ConfigError> {
        let d = &self.display;
        DisplayPlane::new(
            DVec3::from_array(d.center),
            d.width,
            d.height,
            (d.resolution[0], d.resolution[1]),
        )
    }

    pub fn camera_offset(&self) -> CameraOffset {
        CameraOffset::from_rvec_tvec(&self.observer_from_forward)
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.display.resolution[0], self.display.resolution[1])
    }
}
