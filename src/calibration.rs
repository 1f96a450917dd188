//! Intrinsic calibration of the forward-facing camera.
//!
//! Two on-disk forms are accepted:
//! - JSON with the fields `camera_matrix` (3x3, row major), `distortion_coefficients`
//!   and optionally `reprojection_error`.
//! - OpenCV FileStorage YAML as written by `cv::FileStorage`, where the matrices are
//!   `!!opencv-matrix` nodes. The format is regular enough to read line by line.

use std::path::Path;

use glam::DVec2;
use nalgebra as na;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const UNDISTORT_ITERS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub camera_matrix: [[f64; 3]; 3],
    /// OpenCV order: k1, k2, p1, p2, k3. Shorter vectors are zero padded.
    pub distortion_coefficients: Vec<f64>,
    #[serde(default)]
    pub reprojection_error: Option<f64>,
}

impl Calibration {
    pub fn pinhole(fx: f64, fy: f64, cx: f64, cy: f64) -> Calibration {
        Calibration {
            camera_matrix: [[fx, 0.0, cx], [0.0, fy, cy], [0.0, 0.0, 1.0]],
            distortion_coefficients: Vec::new(),
            reprojection_error: None,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Calibration, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let calib = if is_yaml {
            Self::from_opencv_yaml(&contents)?
        } else {
            serde_json::from_str(&contents).map_err(|e| ConfigError::Malformed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        };
        calib.validate()?;
        log::info!(
            "loaded calibration from {} (fx {:.2}, fy {:.2})",
            path.display(),
            calib.fx(),
            calib.fy()
        );
        Ok(calib)
    }

    pub fn from_opencv_yaml(content: &str) -> Result<Calibration, ConfigError> {
        let k = parse_opencv_matrix(content, "camera_matrix")
            .ok_or(ConfigError::MissingField("camera_matrix"))?;
        if k.len() != 9 {
            return Err(ConfigError::MissingField("camera_matrix"));
        }
        let distortion_coefficients = parse_opencv_matrix(content, "distortion_coefficients")
            .ok_or(ConfigError::MissingField("distortion_coefficients"))?;
        let reprojection_error = parse_scalar(content, "reprojection_error");
        Ok(Calibration {
            camera_matrix: [[k[0], k[1], k[2]], [k[3], k[4], k[5]], [k[6], k[7], k[8]]],
            distortion_coefficients,
            reprojection_error,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.camera_matrix.iter().flatten().all(|v| v.is_finite())
            || !self.distortion_coefficients.iter().all(|v| v.is_finite())
        {
            return Err(ConfigError::NonFinite("calibration"));
        }
        if !(self.fx() > 0.0 && self.fy() > 0.0) {
            return Err(ConfigError::NonPositiveExtent("focal length", self.fx().min(self.fy())));
        }
        Ok(())
    }

    pub fn fx(&self) -> f64 {
        self.camera_matrix[0][0]
    }
    pub fn fy(&self) -> f64 {
        self.camera_matrix[1][1]
    }
    pub fn cx(&self) -> f64 {
        self.camera_matrix[0][2]
    }
    pub fn cy(&self) -> f64 {
        self.camera_matrix[1][2]
    }

    pub fn na_camera_matrix(&self) -> na::Matrix3<f64> {
        let k = &self.camera_matrix;
        na::Matrix3::new(
            k[0][0], k[0][1], k[0][2], k[1][0], k[1][1], k[1][2], k[2][0], k[2][1], k[2][2],
        )
    }

    fn coeff(&self, i: usize) -> f64 {
        self.distortion_coefficients.get(i).copied().unwrap_or(0.0)
    }

    /// Pixel to normalized image coordinates, no undistortion.
    pub fn normalize(&self, p: DVec2) -> DVec2 {
        DVec2::new((p.x - self.cx()) / self.fx(), (p.y - self.cy()) / self.fy())
    }

    /// Apply the radial-tangential model to a normalized point.
    pub fn distort_normalized(&self, p: DVec2) -> DVec2 {
        let (k1, k2, p1, p2, k3) = (
            self.coeff(0),
            self.coeff(1),
            self.coeff(2),
            self.coeff(3),
            self.coeff(4),
        );
        let (x, y) = (p.x, p.y);
        let r2 = x * x + y * y;
        let radial = 1.0 + r2 * (k1 + r2 * (k2 + r2 * k3));
        DVec2::new(
            x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x),
            y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y,
        )
    }

    /// Pixel to undistorted normalized coordinates by fixed-point iteration on
    /// the forward model.
    pub fn undistort_normalize(&self, p: DVec2) -> DVec2 {
        let d = self.normalize(p);
        if self.distortion_coefficients.iter().all(|c| *c == 0.0) {
            return d;
        }
        let (k1, k2, p1, p2, k3) = (
            self.coeff(0),
            self.coeff(1),
            self.coeff(2),
            self.coeff(3),
            self.coeff(4),
        );
        let mut x = d.x;
        let mut y = d.y;
        for _ in 0..UNDISTORT_ITERS {
            let r2 = x * x + y * y;
            let radial = 1.0 + r2 * (k1 + r2 * (k2 + r2 * k3));
            let dx = 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
            let dy = p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
            x = (d.x - dx) / radial;
            y = (d.y - dy) / radial;
        }
        DVec2::new(x, y)
    }

    /// Project a point in the camera frame to distorted pixel coordinates.
    pub fn project(&self, p: glam::DVec3) -> Option<DVec2> {
        if p.z <= 0.0 {
            return None;
        }
        let d = self.distort_normalized(DVec2::new(p.x / p.z, p.y / p.z));
        Some(DVec2::new(
            d.x * self.fx() + self.cx(),
            d.y * self.fy() + self.cy(),
        ))
    }
}

/// Values of the `data: [...]` list of an `!!opencv-matrix` node named `key`.
fn parse_opencv_matrix(content: &str, key: &str) -> Option<Vec<f64>> {
    let prefix = format!("{}:", key);
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.iter().position(|l| l.trim_start().starts_with(&prefix))?;
    // inline form: `key: [1, 2, 3]`
    if let Some(open) = lines[start].find('[') {
        return parse_bracket_list(&lines[start][open..], &mut lines[start + 1..].iter().copied());
    }
    for (i, line) in lines.iter().enumerate().skip(start + 1) {
        if !line.starts_with(char::is_whitespace) {
            break;
        }
        if let Some(rest) = line.trim().strip_prefix("data:") {
            return parse_bracket_list(rest, &mut lines[i + 1..].iter().copied());
        }
    }
    None
}

/// Parse `[a, b, ...]` starting in `first`, continuing onto following lines
/// until the closing bracket.
fn parse_bracket_list<'a>(
    first: &str,
    rest: &mut impl Iterator<Item = &'a str>,
) -> Option<Vec<f64>> {
    let mut text = first.trim().strip_prefix('[')?.to_string();
    while !text.contains(']') {
        text.push(' ');
        text.push_str(rest.next()?.trim());
    }
    let inner = &text[..text.find(']')?];
    inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().ok())
        .collect()
}

fn parse_scalar(content: &str, key: &str) -> Option<f64> {
    let prefix = format!("{}:", key);
    content.lines().find_map(|l| {
        l.trim()
            .strip_prefix(&prefix)
            .and_then(|v| v.trim().parse::<f64>().ok())
    })
}
