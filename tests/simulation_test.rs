use marker_overlay::config::OverlayConfig;
use marker_overlay::pipeline::{OverlayPipeline, Projector, StopFlag};
use marker_overlay::render::FrameBuffer;
use marker_overlay::simulation::{GroundTruthDetector, SyntheticConfig, SyntheticPoseSource};
use marker_overlay::source::FrameSource;
use marker_overlay::types::Capture;

fn collect(source: &mut SyntheticPoseSource) -> Vec<Option<Vec<[f64; 3]>>> {
    let mut out = Vec::new();
    loop {
        match source.capture_frame() {
            Capture::Frame(f) => out.push(Some(
                f.observations.iter().map(|o| o.translation.to_array()).collect(),
            )),
            Capture::Dropped => out.push(None),
            Capture::EndOfStream => return out,
        }
    }
}

#[test]
fn test_same_seed_same_trajectory() {
    let config = SyntheticConfig {
        seed: 7,
        frames: 50,
        markers: 3,
        drop_rate: 0.2,
        ..Default::default()
    };
    let a = collect(&mut SyntheticPoseSource::new(config.clone(), 0.0383));
    let b = collect(&mut SyntheticPoseSource::new(config.clone(), 0.0383));
    assert_eq!(a.len(), 50);
    assert_eq!(a, b);
    assert!(a.iter().flatten().all(|markers| markers.len() == 3));

    let c = collect(&mut SyntheticPoseSource::new(SyntheticConfig { seed: 8, ..config }, 0.0383));
    assert_ne!(a, c);
}

#[test]
fn test_drop_rate_extremes() {
    let all_dropped = SyntheticConfig {
        frames: 20,
        drop_rate: 1.0,
        ..Default::default()
    };
    let frames = collect(&mut SyntheticPoseSource::new(all_dropped, 0.0));
    assert_eq!(frames.len(), 20);
    assert!(frames.iter().all(|f| f.is_none()));

    let none_dropped = SyntheticConfig {
        frames: 20,
        ..Default::default()
    };
    let frames = collect(&mut SyntheticPoseSource::new(none_dropped, 0.0));
    assert!(frames.iter().all(|f| f.is_some()));
}

#[test]
fn test_stopped_source_ends_stream() {
    let mut source = SyntheticPoseSource::new(SyntheticConfig::default(), 0.0);
    assert!(matches!(source.capture_frame(), Capture::Frame(_)));
    source.stop().unwrap();
    assert!(matches!(source.capture_frame(), Capture::EndOfStream));
}

#[test]
fn test_simulated_session() {
    let config = OverlayConfig::default();
    let synthetic = SyntheticConfig {
        frames: 120,
        markers: 2,
        ..Default::default()
    };
    let source = SyntheticPoseSource::new(synthetic, config.observer_from_forward.tvec[0]);
    let mut pipeline = OverlayPipeline::new(
        Projector::from_config(&config).unwrap(),
        source,
        GroundTruthDetector,
        FrameBuffer::new(config.resolution(), config.display.dot_radius),
    );
    let summary = pipeline.run(&StopFlag::new()).unwrap();
    assert_eq!(summary.frames, 120);
    assert_eq!(summary.observations, 240);
    assert!(summary.hits > 0);
    assert_eq!(summary.hits + summary.misses() + summary.rejected_poses, summary.observations);
    assert_eq!(summary.behind_origin_misses, 0);
    // one flush per frame plus the teardown blanking
    assert_eq!(pipeline.sink().flush_count(), 121);
    assert!(pipeline.sink().lit_pixels().is_empty());
}
