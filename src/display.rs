//! Ray/plane intersection against the virtual near-eye display surface.
//!
//! The plane lives in the observer camera frame and is assumed to face the
//! origin: its normal is the unit vector from the observer to the plane center.
//! Rays always start at the observer origin.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const PARALLEL_EPS: f64 = 1e-6;

/// Integer display coordinate, row 0 at the top. Always inside the grid it was
/// produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pixel {
    pub x: u32,
    pub y: u32,
}

impl Pixel {
    pub fn new(x: u32, y: u32) -> Pixel {
        Pixel { x, y }
    }
}

/// Why a ray produced no pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Miss {
    /// `|n · d| < 1e-6`.
    Parallel,
    /// The intersection parameter `t` is not positive.
    BehindOrigin,
    /// The hit lies off the active area.
    OutsideExtent,
}

impl std::fmt::Display for Miss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Miss::Parallel => "ray parallel to display plane",
            Miss::BehindOrigin => "intersection behind observer",
            Miss::OutsideExtent => "outside display extent",
        };
        f.write_str(s)
    }
}

/// Geometry and pixel grid of the display surface.
///
/// Only constructible through [`DisplayPlane::new`], which rejects degenerate
/// planes, so the normal and in-plane basis are computed once and always valid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayPlane {
    center: DVec3,
    width: f64,
    height: f64,
    resolution: (u32, u32),
    normal: DVec3,
    u: DVec3,
    v: DVec3,
}

impl DisplayPlane {
    pub fn new(
        center: DVec3,
        width: f64,
        height: f64,
        resolution: (u32, u32),
    ) -> Result<DisplayPlane, ConfigError> {
        if !center.is_finite() {
            return Err(ConfigError::NonFinite("display center"));
        }
        let len = center.length();
        if len == 0.0 {
            return Err(ConfigError::ZeroPlaneCenter);
        }
        if !(width > 0.0) {
            return Err(ConfigError::NonPositiveExtent("width", width));
        }
        if !(height > 0.0) {
            return Err(ConfigError::NonPositiveExtent("height", height));
        }
        if resolution.0 == 0 || resolution.1 == 0 {
            return Err(ConfigError::ZeroResolution(resolution.0, resolution.1));
        }
        let normal = center / len;
        let (u, v) = plane_basis(normal);
        Ok(DisplayPlane {
            center,
            width,
            height,
            resolution,
            normal,
            u,
            v,
        })
    }

    pub fn center(&self) -> DVec3 {
        self.center
    }
    pub fn width(&self) -> f64 {
        self.width
    }
    pub fn height(&self) -> f64 {
        self.height
    }
    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }
    pub fn normal(&self) -> DVec3 {
        self.normal
    }
    /// In-plane unit axes: `u` grows to the right, `v` grows up.
    pub fn basis(&self) -> (DVec3, DVec3) {
        (self.u, self.v)
    }

    /// Intersect the ray `origin + t * direction` with the plane and return its
    /// local `(x, y)` offset from the plane center in plane units.
    pub fn intersect_local(&self, direction: DVec3) -> Result<(f64, f64), Miss> {
        let denom = self.normal.dot(direction);
        if denom.abs() < PARALLEL_EPS {
            return Err(Miss::Parallel);
        }
        let t = self.normal.dot(self.center) / denom;
        if t <= 0.0 {
            return Err(Miss::BehindOrigin);
        }
        let hit = t * direction;
        let local = hit - self.center;
        Ok((local.dot(self.u), local.dot(self.v)))
    }

    /// Map a local plane offset to a pixel.
    ///
    /// The extent test is strict (`> width / 2`). A point exactly on the right or
    /// bottom edge lands on index == resolution and is rejected by the grid check.
    pub fn local_to_pixel(&self, x_local: f64, y_local: f64) -> Result<Pixel, Miss> {
        let half_w = self.width / 2.0;
        let half_h = self.height / 2.0;
        if x_local.abs() > half_w || y_local.abs() > half_h {
            return Err(Miss::OutsideExtent);
        }
        let x_norm = (x_local + half_w) / self.width;
        let y_norm = (y_local + half_h) / self.height;

        let (res_w, res_h) = self.resolution;
        // row 0 is the top of the display, local v grows up
        let px = (x_norm * res_w as f64).floor();
        let py = ((1.0 - y_norm) * res_h as f64).floor();
        if px < 0.0 || py < 0.0 || px >= res_w as f64 || py >= res_h as f64 {
            return Err(Miss::OutsideExtent);
        }
        Ok(Pixel::new(px as u32, py as u32))
    }

    /// Pixel hit by a ray from the observer origin along `direction`.
    pub fn intersect(&self, direction: DVec3) -> Result<Pixel, Miss> {
        let (x_local, y_local) = self.intersect_local(direction)?;
        self.local_to_pixel(x_local, y_local)
    }

    /// Local plane offset of the center of `pixel`.
    pub fn pixel_to_local(&self, pixel: Pixel) -> (f64, f64) {
        let (res_w, res_h) = self.resolution;
        let x_norm = (pixel.x as f64 + 0.5) / res_w as f64;
        let y_norm = 1.0 - (pixel.y as f64 + 0.5) / res_h as f64;
        (
            x_norm * self.width - self.width / 2.0,
            y_norm * self.height - self.height / 2.0,
        )
    }

    /// Direction from the observer origin through the center of `pixel`.
    pub fn pixel_ray(&self, pixel: Pixel) -> DVec3 {
        let (x_local, y_local) = self.pixel_to_local(pixel);
        self.center + x_local * self.u + y_local * self.v
    }
}

/// Orthonormal `(u, v)` spanning the plane with normal `n`.
///
/// The reference up axis switches to +x when `n` is close to vertical so the
/// cross product never degenerates.
fn plane_basis(n: DVec3) -> (DVec3, DVec3) {
    let up = if n.y.abs() < 0.9 { DVec3::Y } else { DVec3::X };
    let u = up.cross(n).normalize();
    let v = n.cross(u);
    (u, v)
}
