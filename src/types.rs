use glam::{DVec2, DVec3};
use nalgebra as na;
use serde::{Deserialize, Serialize};

/// Rodrigues rotation vector plus translation, as produced by PnP solvers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RvecTvec {
    pub rvec: [f64; 3],
    pub tvec: [f64; 3],
}

impl RvecTvec {
    pub fn new(rvec: [f64; 3], tvec: [f64; 3]) -> RvecTvec {
        RvecTvec { rvec, tvec }
    }
    pub fn from_translation(tvec: [f64; 3]) -> RvecTvec {
        RvecTvec {
            rvec: [0.0; 3],
            tvec,
        }
    }
    pub fn na_rotation(&self) -> na::Rotation3<f64> {
        na::Rotation3::from_scaled_axis(na::Vector3::from(self.rvec))
    }
    pub fn translation(&self) -> DVec3 {
        DVec3::from_array(self.tvec)
    }
    pub fn is_finite(&self) -> bool {
        self.rvec.iter().chain(self.tvec.iter()).all(|v| v.is_finite())
    }
}

impl Default for RvecTvec {
    fn default() -> Self {
        RvecTvec::from_translation([0.0; 3])
    }
}

/// One marker seen in one frame, in the forward-facing camera's optical frame.
///
/// Lives only for the frame it was detected in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerObservation {
    pub id: u32,
    /// Marker center in meters.
    pub translation: DVec3,
    /// Marker orientation as a Rodrigues vector. Carried for diagnostics only.
    #[serde(default)]
    pub rvec: DVec3,
    /// Pixel footprint in the captured image, detector corner order.
    #[serde(default)]
    pub corners: [DVec2; 4],
}

impl MarkerObservation {
    pub fn new(id: u32, translation: DVec3) -> MarkerObservation {
        MarkerObservation {
            id,
            translation,
            rvec: DVec3::ZERO,
            corners: [DVec2::ZERO; 4],
        }
    }
    pub fn footprint_center(&self) -> DVec2 {
        self.corners.iter().copied().sum::<DVec2>() / 4.0
    }
}

/// Outcome of asking a capture source for its next frame.
#[derive(Debug)]
pub enum Capture<F> {
    Frame(F),
    /// No frame this tick; the loop renders a clear-only frame and carries on.
    Dropped,
    /// The source has nothing more to give. Treated like a stop request.
    EndOfStream,
}
