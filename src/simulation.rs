use glam::DVec3;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::detector::MarkerDetector;
use crate::error::SourceError;
use crate::source::FrameSource;
use crate::types::{Capture, MarkerObservation};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub seed: u64,
    pub frames: usize,
    pub markers: u32,
    /// Mean marker distance in front of the forward camera, meters.
    pub depth: f64,
    /// Half extent of the Lissajous path in x and y, meters.
    pub amplitude: [f64; 2],
    /// Uniform per-axis pose noise, meters.
    pub jitter: f64,
    /// Probability of a frame being dropped by the "camera".
    pub drop_rate: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            frames: 300,
            markers: 1,
            depth: 0.5,
            amplitude: [0.25, 0.15],
            jitter: 0.002,
            drop_rate: 0.0,
        }
    }
}

/// Frame produced by [`SyntheticPoseSource`]: the ground-truth observations stand
/// in for the image.
#[derive(Debug, Clone)]
pub struct SyntheticFrame {
    pub index: usize,
    pub observations: Vec<MarkerObservation>,
}

/// Markers sweeping a Lissajous path in front of the forward camera.
/// Deterministic for a given seed.
pub struct SyntheticPoseSource {
    config: SyntheticConfig,
    center_x: f64,
    rng: ChaCha8Rng,
    index: usize,
    stopped: bool,
}

impl SyntheticPoseSource {
    /// `center_x` shifts the path sideways, typically to the observer camera.
    pub fn new(config: SyntheticConfig, center_x: f64) -> SyntheticPoseSource {
        SyntheticPoseSource {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            center_x,
            index: 0,
            stopped: false,
        }
    }

    fn marker_translation(&mut self, marker: u32, t: f64) -> DVec3 {
        let phase = marker as f64 * std::f64::consts::FRAC_PI_3;
        let [ax, ay] = self.config.amplitude;
        let mut p = DVec3::new(
            self.center_x + ax * (1.3 * t + phase).sin(),
            ay * (0.7 * t + 2.0 * phase).sin(),
            self.config.depth + 0.1 * (0.3 * t + phase).cos(),
        );
        if self.config.jitter > 0.0 {
            let j = self.config.jitter;
            p += DVec3::new(
                self.rng.random_range(-j..j),
                self.rng.random_range(-j..j),
                self.rng.random_range(-j..j),
            );
        }
        p
    }
}

impl FrameSource for SyntheticPoseSource {
    type Frame = SyntheticFrame;

    fn capture_frame(&mut self) -> Capture<SyntheticFrame> {
        if self.stopped || self.index >= self.config.frames {
            return Capture::EndOfStream;
        }
        let index = self.index;
        self.index += 1;
        if self.config.drop_rate > 0.0 && self.rng.random_bool(self.config.drop_rate.min(1.0)) {
            return Capture::Dropped;
        }
        let t = index as f64 / 30.0;
        let observations = (0..self.config.markers)
            .map(|id| MarkerObservation::new(id, self.marker_translation(id, t)))
            .collect();
        Capture::Frame(SyntheticFrame {
            index,
            observations,
        })
    }

    fn stop(&mut self) -> Result<(), SourceError> {
        self.stopped = true;
        Ok(())
    }
}

/// Hands back the observations carried by a [`SyntheticFrame`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GroundTruthDetector;

impl MarkerDetector<SyntheticFrame> for GroundTruthDetector {
    fn detect_markers(&mut self, frame: &SyntheticFrame) -> Vec<MarkerObservation> {
        frame.observations.clone()
    }
}
