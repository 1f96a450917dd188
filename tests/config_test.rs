use std::path::PathBuf;

use glam::DVec3;
use marker_overlay::config::OverlayConfig;
use marker_overlay::display::Pixel;
use marker_overlay::error::ConfigError;
use marker_overlay::io::{object_to_json, write_session_report};
use marker_overlay::pipeline::{Projector, RunSummary};

fn temp_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("marker_overlay_config_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

#[test]
fn test_default_config_matches_reference_headset() {
    let config = OverlayConfig::default();
    config.validate().unwrap();
    assert_eq!(config.observer_from_forward.tvec, [0.0383, 0.0, 0.0436]);
    assert_eq!(config.display.center, [-0.005, 0.0, 0.0383]);
    assert_eq!(config.resolution(), (128, 56));
    assert_eq!(config.marker_length, 0.1);
    assert!(config.mounting.mirror_x);
    assert!(!config.mounting.mirror_y);
    assert!(!config.preview.enabled);
    assert_eq!(config.preview.command[0], "rpicam-hello");
    assert_eq!(config.preview.grace_period().as_millis(), 3000);

    let plane = config.display_plane().unwrap();
    assert_eq!(plane.center(), DVec3::new(-0.005, 0.0, 0.0383));
    assert_eq!(config.camera_offset().translation, DVec3::new(0.0383, 0.0, 0.0436));
}

#[test]
fn test_default_projector_maps_straight_ahead_near_center() {
    let projector = Projector::from_config(&OverlayConfig::default()).unwrap();
    // a marker straight ahead of the observer, far away
    let pixel = projector.project(DVec3::new(0.0383, 0.0, 10.0)).unwrap();
    // the display center sits 5 mm left of the observer axis, so the hit is
    // right of center before mirroring and left of it after
    assert!(pixel.x < 64, "{:?}", pixel);
    assert!((27..=28).contains(&pixel.y), "{:?}", pixel);
    assert_ne!(pixel, Pixel::new(64, 28));
}

#[test]
fn test_save_and_load() {
    let path = temp_path("overlay.json");
    let mut config = OverlayConfig::default();
    config.marker_length = 0.05;
    config.display.resolution = [96, 48];
    object_to_json(&path, &config).unwrap();
    let loaded = OverlayConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_partial_file_uses_defaults() {
    let path = temp_path("partial.json");
    std::fs::write(&path, r#"{ "marker_length": 0.05, "display": { "dot_radius": 0 } }"#).unwrap();
    let loaded = OverlayConfig::load(&path).unwrap();
    assert_eq!(loaded.marker_length, 0.05);
    assert_eq!(loaded.display.dot_radius, 0);
    assert_eq!(loaded.display.resolution, [128, 56]);
    assert_eq!(loaded.observer_from_forward, OverlayConfig::default().observer_from_forward);
}

#[test]
fn test_invalid_configs_are_rejected() {
    let mut config = OverlayConfig::default();
    config.display.center = [0.0; 3];
    assert!(matches!(config.validate(), Err(ConfigError::ZeroPlaneCenter)));
    assert!(Projector::from_config(&config).is_err());

    let mut config = OverlayConfig::default();
    config.display.height = -0.01;
    assert!(matches!(config.validate(), Err(ConfigError::NonPositiveExtent("height", _))));

    let mut config = OverlayConfig::default();
    config.display.resolution = [128, 0];
    assert!(matches!(config.validate(), Err(ConfigError::ZeroResolution(128, 0))));

    let mut config = OverlayConfig::default();
    config.marker_length = 0.0;
    assert!(matches!(config.validate(), Err(ConfigError::NonPositiveMarkerLength(_))));

    let mut config = OverlayConfig::default();
    config.observer_from_forward.tvec[1] = f64::NAN;
    assert!(matches!(config.validate(), Err(ConfigError::NonFinite(_))));

    let mut config = OverlayConfig::default();
    config.display.brightness = 1.5;
    assert!(matches!(config.validate(), Err(ConfigError::OutOfUnitRange("brightness", _))));
}

#[test]
fn test_load_errors() {
    assert!(matches!(
        OverlayConfig::load(temp_path("missing.json")),
        Err(ConfigError::Unreadable { .. })
    ));
    let path = temp_path("not_json.json");
    std::fs::write(&path, "marker_length = 3").unwrap();
    assert!(matches!(OverlayConfig::load(&path), Err(ConfigError::Malformed { .. })));
    let path = temp_path("zero_center.json");
    std::fs::write(&path, r#"{ "display": { "center": [0, 0, 0] } }"#).unwrap();
    assert!(matches!(OverlayConfig::load(&path), Err(ConfigError::ZeroPlaneCenter)));
}

#[test]
fn test_session_report() {
    let path = temp_path("report.json");
    let summary = RunSummary {
        frames: 10,
        observations: 4,
        hits: 3,
        outside_extent_misses: 1,
        ..Default::default()
    };
    write_session_report(&path, &summary).unwrap();
    let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["frames"], 10);
    assert_eq!(value["hits"], 3);
    assert_eq!(value["hit_rate"], 0.75);
    assert!(value["timestamp"].is_string());
}
