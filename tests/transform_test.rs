use glam::DVec3;
use marker_overlay::transform::CameraOffset;
use marker_overlay::types::RvecTvec;

#[test]
fn test_marker_at_observer_cancels_exactly() {
    let t = DVec3::new(0.0383, 0.0, 0.0436);
    let offset = CameraOffset::from_translation(t);
    assert_eq!(offset.to_observer(t), DVec3::ZERO);
}

#[test]
fn test_identity_rotation_is_plain_subtraction() {
    let t = DVec3::new(0.0383, 0.0, 0.0436);
    let offset = CameraOffset::from_translation(t);
    for p in [
        DVec3::new(0.5, -0.2, 1.0),
        DVec3::new(-3.0, 7.25, 0.001),
        DVec3::new(0.0383, 0.0, 0.5436),
    ] {
        assert_eq!(offset.to_observer(p), p - t);
    }
    assert_eq!(
        offset.to_observer(DVec3::new(0.0383, 0.0, 0.5436)),
        DVec3::new(0.0, 0.0, 0.5436 - 0.0436)
    );
}

#[test]
fn test_default_offset_is_identity() {
    let p = DVec3::new(0.1, 0.2, 0.3);
    assert_eq!(CameraOffset::default().to_observer(p), p);
}

#[test]
fn test_rotated_observer() {
    // observer yawed 90 degrees about y: its +x axis points along forward -z
    let rt = RvecTvec::new([0.0, std::f64::consts::FRAC_PI_2, 0.0], [0.0; 3]);
    let offset = CameraOffset::from_rvec_tvec(&rt);
    let p = offset.to_observer(DVec3::Z);
    assert!((p - DVec3::new(-1.0, 0.0, 0.0)).length() < 1e-12, "{:?}", p);
    let p = offset.to_observer(DVec3::Y);
    assert!((p - DVec3::Y).length() < 1e-12, "{:?}", p);
}

#[test]
fn test_translation_applied_before_rotation() {
    let rt = RvecTvec::new([0.0, 0.0, std::f64::consts::PI], [1.0, 0.0, 0.0]);
    let offset = CameraOffset::from_rvec_tvec(&rt);
    // 180 degrees about z flips x and y of the rebased point
    let p = offset.to_observer(DVec3::new(2.0, 1.0, 0.5));
    assert!((p - DVec3::new(-1.0, -1.0, 0.5)).length() < 1e-12, "{:?}", p);
}
