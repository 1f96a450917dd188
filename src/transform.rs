use glam::DVec3;
use nalgebra as na;

use crate::types::RvecTvec;

/// Rigid pose of the observer camera expressed in the forward-facing camera frame.
///
/// `rotation` maps observer-frame directions into the forward frame. It is the
/// identity for parallel-mounted cameras, which reduces the rebase to a plain
/// subtraction of `translation`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraOffset {
    pub translation: DVec3,
    pub rotation: na::Rotation3<f64>,
}

impl CameraOffset {
    pub fn from_translation(translation: DVec3) -> CameraOffset {
        CameraOffset {
            translation,
            rotation: na::Rotation3::identity(),
        }
    }

    pub fn from_rvec_tvec(rt: &RvecTvec) -> CameraOffset {
        CameraOffset {
            translation: rt.translation(),
            rotation: rt.na_rotation(),
        }
    }

    /// Rebase a point from the forward-facing camera frame into the observer frame.
    ///
    /// `marker` must be finite.
    pub fn to_observer(&self, marker: DVec3) -> DVec3 {
        debug_assert!(marker.is_finite(), "non-finite marker translation");
        let d = marker - self.translation;
        let p = self.rotation.inverse_transform_vector(&na::Vector3::new(d.x, d.y, d.z));
        DVec3::new(p.x, p.y, p.z)
    }
}

impl Default for CameraOffset {
    fn default() -> Self {
        CameraOffset::from_translation(DVec3::ZERO)
    }
}
