use aprilgrid::TagFamily;
use aprilgrid::detector::TagDetector;
use glam::{DVec2, DVec3};
use image::DynamicImage;
use sqpnp_simple::sqpnp_solve_glam;

use crate::calibration::Calibration;
use crate::types::MarkerObservation;

/// Finds markers in a frame and recovers their pose in the capturing camera frame.
pub trait MarkerDetector<F> {
    /// Zero or more observations. Markers whose pose cannot be recovered are
    /// left out.
    fn detect_markers(&mut self, frame: &F) -> Vec<MarkerObservation>;
}

/// Corners of a square marker of side `length` centred on the origin, in the
/// detector's corner order (top left, top right, bottom right, bottom left).
pub fn marker_object_points(length: f64) -> [glam::Vec3; 4] {
    let h = (length / 2.0) as f32;
    [
        glam::Vec3::new(-h, h, 0.0),
        glam::Vec3::new(h, h, 0.0),
        glam::Vec3::new(h, -h, 0.0),
        glam::Vec3::new(-h, -h, 0.0),
    ]
}

/// Estimate a single marker pose from its four image corners.
pub fn estimate_pose(
    corners: &[DVec2; 4],
    marker_length: f64,
    calibration: &Calibration,
) -> Option<(DVec3, DVec3)> {
    let p3ds = marker_object_points(marker_length);
    let p2ds_z: Vec<glam::Vec2> = corners
        .iter()
        .map(|c| calibration.undistort_normalize(*c).as_vec2())
        .collect();
    let (r, t) = sqpnp_solve_glam(&p3ds, &p2ds_z)?;
    let rvec = DVec3::new(r.0, r.1, r.2);
    let tvec = DVec3::new(t.0, t.1, t.2);
    if !rvec.is_finite() || !tvec.is_finite() || tvec.z <= 0.0 {
        return None;
    }
    Some((rvec, tvec))
}

/// AprilTag detector followed by a per-marker PnP solve.
pub struct AprilTagDetector {
    detector: TagDetector,
    calibration: Calibration,
    marker_length: f64,
}

impl AprilTagDetector {
    pub fn new(calibration: Calibration, marker_length: f64) -> AprilTagDetector {
        AprilTagDetector {
            detector: TagDetector::new(&TagFamily::T36H11, None),
            calibration,
            marker_length,
        }
    }
}

impl MarkerDetector<DynamicImage> for AprilTagDetector {
    fn detect_markers(&mut self, frame: &DynamicImage) -> Vec<MarkerObservation> {
        let detected_tag = self.detector.detect(frame);
        let mut observations: Vec<MarkerObservation> = detected_tag
            .iter()
            .filter_map(|(id, pts)| {
                let mut corners = [DVec2::ZERO; 4];
                for (c, p) in corners.iter_mut().zip(pts.iter()) {
                    *c = DVec2::new(p.0 as f64, p.1 as f64);
                }
                match estimate_pose(&corners, self.marker_length, &self.calibration) {
                    Some((rvec, translation)) => Some(MarkerObservation {
                        id: *id,
                        translation,
                        rvec,
                        corners,
                    }),
                    None => {
                        log::debug!("marker {}: pose estimate failed", id);
                        None
                    }
                }
            })
            .collect();
        observations.sort_by_key(|o| o.id);
        observations
    }
}
