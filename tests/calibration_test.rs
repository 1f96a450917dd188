use glam::{DVec2, DVec3};
use marker_overlay::calibration::Calibration;
use marker_overlay::error::ConfigError;

const OPENCV_YAML: &str = "%YAML:1.0
---
calibration_time: \"Tue 14 May 2024 10:12:01\"
camera_matrix: !!opencv-matrix
   rows: 3
   cols: 3
   dt: d
   data: [ 6.0123e+02, 0., 3.1955e+02, 0., 6.0281e+02,
       2.4210e+02, 0., 0., 1. ]
distortion_coefficients: !!opencv-matrix
   rows: 1
   cols: 5
   dt: d
   data: [ 1.2e-01, -2.5e-01, 1.0e-03, -2.0e-03, 9.0e-02 ]
reprojection_error: 0.3471
";

fn temp_path(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("marker_overlay_calib_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

#[test]
fn test_parse_opencv_yaml() {
    let calib = Calibration::from_opencv_yaml(OPENCV_YAML).unwrap();
    assert_eq!(calib.fx(), 601.23);
    assert_eq!(calib.fy(), 602.81);
    assert_eq!(calib.cx(), 319.55);
    assert_eq!(calib.cy(), 242.10);
    assert_eq!(calib.camera_matrix[2], [0.0, 0.0, 1.0]);
    assert_eq!(calib.distortion_coefficients, vec![0.12, -0.25, 0.001, -0.002, 0.09]);
    assert_eq!(calib.reprojection_error, Some(0.3471));
    let k = calib.na_camera_matrix();
    assert_eq!(k[(0, 2)], 319.55);
    assert_eq!(k[(1, 1)], 602.81);
}

#[test]
fn test_missing_matrix_is_reported() {
    let no_dist = OPENCV_YAML
        .lines()
        .take_while(|l| !l.starts_with("distortion_coefficients"))
        .collect::<Vec<_>>()
        .join("\n");
    assert!(matches!(
        Calibration::from_opencv_yaml(&no_dist),
        Err(ConfigError::MissingField("distortion_coefficients"))
    ));
    assert!(matches!(
        Calibration::from_opencv_yaml("%YAML:1.0\n---\n"),
        Err(ConfigError::MissingField("camera_matrix"))
    ));
}

#[test]
fn test_load_yaml_and_json() {
    let yaml_path = temp_path("camera_calibration.yaml");
    std::fs::write(&yaml_path, OPENCV_YAML).unwrap();
    let from_yaml = Calibration::load(&yaml_path).unwrap();

    let json_path = temp_path("camera_calibration.json");
    std::fs::write(&json_path, serde_json::to_string(&from_yaml).unwrap()).unwrap();
    let from_json = Calibration::load(&json_path).unwrap();
    assert_eq!(from_yaml, from_json);
}

#[test]
fn test_load_rejects_bad_files() {
    assert!(matches!(
        Calibration::load(temp_path("does_not_exist.yaml")),
        Err(ConfigError::Unreadable { .. })
    ));
    let broken = temp_path("broken.json");
    std::fs::write(&broken, "{ \"camera_matrix\": ").unwrap();
    assert!(matches!(Calibration::load(&broken), Err(ConfigError::Malformed { .. })));

    let zero_focal = temp_path("zero_focal.json");
    let calib = Calibration::pinhole(0.0, 600.0, 320.0, 240.0);
    std::fs::write(&zero_focal, serde_json::to_string(&calib).unwrap()).unwrap();
    assert!(matches!(
        Calibration::load(&zero_focal),
        Err(ConfigError::NonPositiveExtent(_, _))
    ));
}

#[test]
fn test_undistort_inverts_distortion() {
    let calib = Calibration::from_opencv_yaml(OPENCV_YAML).unwrap();
    for p in [
        DVec2::new(0.0, 0.0),
        DVec2::new(0.2, -0.1),
        DVec2::new(-0.3, 0.25),
        DVec2::new(0.35, 0.3),
    ] {
        let pixel = calib.project(p.extend(1.0)).unwrap();
        let back = calib.undistort_normalize(pixel);
        assert!((back - p).length() < 1e-9, "{:?} -> {:?}", p, back);
    }
}

#[test]
fn test_pinhole_projection() {
    let calib = Calibration::pinhole(600.0, 600.0, 320.0, 240.0);
    let px = calib.project(DVec3::new(0.1, -0.05, 0.5)).unwrap();
    assert!((px - DVec2::new(440.0, 180.0)).length() < 1e-9);
    assert_eq!(calib.normalize(DVec2::new(320.0, 240.0)), DVec2::ZERO);
    assert_eq!(calib.undistort_normalize(px), calib.normalize(px));
    assert!(calib.project(DVec3::new(0.0, 0.0, -1.0)).is_none());
}
