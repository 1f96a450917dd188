use glam::DVec3;
use marker_overlay::config::OverlayConfig;
use marker_overlay::display::Miss;
use marker_overlay::io::{object_from_json, object_to_json};
use marker_overlay::pipeline::Projector;
use marker_overlay::replay::{PoseLog, replay};
use marker_overlay::types::MarkerObservation;

fn observer_point(id: u32, p: DVec3) -> MarkerObservation {
    MarkerObservation::new(id, p + DVec3::new(0.0383, 0.0, 0.0436))
}

fn sample_log() -> PoseLog {
    let frames = (0..40)
        .map(|i| {
            let x = (i as f64 - 20.0) * 0.02;
            vec![
                observer_point(0, DVec3::new(x, 0.0, 0.5)),
                observer_point(1, DVec3::new(0.0, 0.0, -0.5)),
            ]
        })
        .collect();
    PoseLog { frames }
}

#[test]
fn test_replay_keeps_frame_order() {
    let projector = Projector::from_config(&OverlayConfig::default()).unwrap();
    let log = sample_log();
    let result = replay(&projector, &log, false);
    assert_eq!(result.frames.len(), log.frames.len());
    for (frame, observations) in result.frames.iter().zip(&log.frames) {
        let expected = projector.project(observations[0].translation);
        match expected {
            Ok(pixel) => assert_eq!(frame.hits, vec![(0, pixel)]),
            Err(miss) => assert!(frame.misses.contains(&(0, miss))),
        }
        assert!(frame.misses.contains(&(1, Miss::BehindOrigin)));
    }
    let summary = &result.summary;
    assert_eq!(summary.frames, 40);
    assert_eq!(summary.observations, 80);
    assert_eq!(summary.behind_origin_misses, 40);
    assert!(summary.hits > 0);
    assert!(summary.outside_extent_misses > 0);
}

#[test]
fn test_pose_log_from_file() {
    let path = std::env::temp_dir().join(format!("marker_overlay_poses_{}.json", std::process::id()));
    let log = sample_log();
    object_to_json(&path, &log).unwrap();
    let loaded: PoseLog = object_from_json(&path).unwrap();
    let projector = Projector::from_config(&OverlayConfig::default()).unwrap();
    assert_eq!(
        replay(&projector, &loaded, false).summary,
        replay(&projector, &log, false).summary
    );

    // recorded logs may carry translations only
    let minimal = r#"{ "frames": [[{ "id": 3, "translation": [0.0383, 0.0, 1.0] }], []] }"#;
    let parsed: PoseLog = serde_json::from_str(minimal).unwrap();
    let result = replay(&projector, &parsed, false);
    assert_eq!(result.summary.frames, 2);
    assert_eq!(result.summary.hits, 1);
}
