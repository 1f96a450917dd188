//! Per-frame orchestration: capture, detect, project every marker, render.
//!
//! The loop is strictly sequential. A stop request is honoured between frames,
//! never in the middle of one. All hits of a frame are accumulated in the sink
//! and flushed once, so every detected marker stays visible.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::config::OverlayConfig;
use crate::detector::MarkerDetector;
use crate::display::{DisplayPlane, Miss, Pixel};
use crate::error::{ConfigError, OverlayError, SinkError};
use crate::mounting::MountingCorrection;
use crate::preview::PreviewProcess;
use crate::render::RenderSink;
use crate::source::FrameSource;
use crate::transform::CameraOffset;
use crate::types::{Capture, MarkerObservation};

/// Marker translation to display pixel: rebase, intersect, mounting correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projector {
    offset: CameraOffset,
    plane: DisplayPlane,
    mounting: MountingCorrection,
}

impl Projector {
    pub fn new(offset: CameraOffset, plane: DisplayPlane, mounting: MountingCorrection) -> Projector {
        Projector {
            offset,
            plane,
            mounting,
        }
    }

    pub fn from_config(config: &OverlayConfig) -> Result<Projector, ConfigError> {
        config.validate()?;
        Ok(Projector::new(
            config.camera_offset(),
            config.display_plane()?,
            config.mounting,
        ))
    }

    pub fn plane(&self) -> &DisplayPlane {
        &self.plane
    }

    /// `translation` is the marker center in the forward camera frame and must be finite.
    pub fn project(&self, translation: DVec3) -> Result<Pixel, Miss> {
        let direction = self.offset.to_observer(translation);
        let pixel = self.plane.intersect(direction)?;
        Ok(self.mounting.apply(pixel, self.plane.resolution()))
    }
}

/// Cooperative stop request shared with whoever decides the session is over.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> StopFlag {
        StopFlag::default()
    }
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Release);
    }
    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Capturing,
    Detecting,
    Rendering,
    Stopped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub frames: usize,
    pub dropped_frames: usize,
    pub observations: usize,
    pub hits: usize,
    pub parallel_misses: usize,
    pub behind_origin_misses: usize,
    pub outside_extent_misses: usize,
    pub rejected_poses: usize,
}

impl RunSummary {
    pub fn record_miss(&mut self, miss: Miss) {
        match miss {
            Miss::Parallel => self.parallel_misses += 1,
            Miss::BehindOrigin => self.behind_origin_misses += 1,
            Miss::OutsideExtent => self.outside_extent_misses += 1,
        }
    }

    pub fn misses(&self) -> usize {
        self.parallel_misses + self.behind_origin_misses + self.outside_extent_misses
    }

    pub fn hit_rate(&self) -> f64 {
        if self.observations == 0 {
            0.0
        } else {
            self.hits as f64 / self.observations as f64
        }
    }
}

/// What happened to each marker of one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub hits: Vec<(u32, Pixel)>,
    pub misses: Vec<(u32, Miss)>,
    pub rejected: Vec<u32>,
}

impl FrameReport {
    /// Add this frame's counts to `summary`. Frame counters are left alone.
    pub fn tally(&self, summary: &mut RunSummary) {
        summary.observations += self.hits.len() + self.misses.len() + self.rejected.len();
        summary.hits += self.hits.len();
        summary.rejected_poses += self.rejected.len();
        for (_, miss) in &self.misses {
            summary.record_miss(*miss);
        }
    }
}

/// Project every observation of a frame without touching any sink.
pub fn project_frame(projector: &Projector, observations: &[MarkerObservation]) -> FrameReport {
    let mut report = FrameReport::default();
    for obs in observations {
        if !obs.translation.is_finite() {
            log::warn!("marker {}: non-finite pose rejected", obs.id);
            report.rejected.push(obs.id);
            continue;
        }
        match projector.project(obs.translation) {
            Ok(pixel) => {
                log::debug!("marker {} -> pixel ({}, {})", obs.id, pixel.x, pixel.y);
                report.hits.push((obs.id, pixel));
            }
            Err(miss) => {
                log::debug!("marker {}: {}", obs.id, miss);
                report.misses.push((obs.id, miss));
            }
        }
    }
    report
}

/// Failures met while releasing resources. Never fatal.
#[derive(Debug, Clone, Default)]
pub struct TeardownReport {
    pub failures: Vec<String>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

type FrameHook = Box<dyn FnMut(usize, &[MarkerObservation], &FrameReport)>;

/// Owns the capture source, detector, display sink and optional preview for
/// one session. Resources are released in a fixed order (display, capture,
/// preview) by [`OverlayPipeline::shutdown`], which also runs on drop.
pub struct OverlayPipeline<S, D, R>
where
    S: FrameSource,
    D: MarkerDetector<S::Frame>,
    R: RenderSink,
{
    projector: Projector,
    source: S,
    detector: D,
    sink: R,
    preview: Option<PreviewProcess>,
    brightness: f32,
    max_frames: Option<usize>,
    on_frame: Option<FrameHook>,
    state: LoopState,
    summary: RunSummary,
    torn_down: bool,
}

impl<S, D, R> OverlayPipeline<S, D, R>
where
    S: FrameSource,
    D: MarkerDetector<S::Frame>,
    R: RenderSink,
{
    pub fn new(projector: Projector, source: S, detector: D, sink: R) -> Self {
        OverlayPipeline {
            projector,
            source,
            detector,
            sink,
            preview: None,
            brightness: 1.0,
            max_frames: None,
            on_frame: None,
            state: LoopState::Idle,
            summary: RunSummary::default(),
            torn_down: false,
        }
    }

    pub fn with_preview(mut self, preview: PreviewProcess) -> Self {
        self.preview = Some(preview);
        self
    }

    pub fn with_brightness(mut self, brightness: f32) -> Self {
        self.brightness = brightness.clamp(0.0, 1.0);
        self
    }

    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = Some(max_frames);
        self
    }

    /// Called after every rendered frame with the frame index, its observations
    /// and their projection results.
    pub fn with_frame_hook(
        mut self,
        hook: impl FnMut(usize, &[MarkerObservation], &FrameReport) + 'static,
    ) -> Self {
        self.on_frame = Some(Box::new(hook));
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn sink(&self) -> &R {
        &self.sink
    }

    fn transition(&mut self, next: LoopState) {
        log::trace!("{:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Clear, plot every hit, flush. Exactly one clear and one flush per call.
    pub fn render_observations(
        &mut self,
        observations: &[MarkerObservation],
    ) -> Result<FrameReport, SinkError> {
        let report = project_frame(&self.projector, observations);
        self.sink.clear()?;
        for (_, pixel) in &report.hits {
            self.sink.plot_point(*pixel, self.brightness)?;
        }
        self.sink.flush()?;
        report.tally(&mut self.summary);
        Ok(report)
    }

    /// Process one frame. Returns `false` once the source is exhausted.
    pub fn step(&mut self) -> Result<bool, OverlayError> {
        self.transition(LoopState::Capturing);
        let frame = match self.source.capture_frame() {
            Capture::Frame(f) => Some(f),
            Capture::Dropped => {
                self.summary.dropped_frames += 1;
                None
            }
            Capture::EndOfStream => {
                log::info!("capture source exhausted");
                return Ok(false);
            }
        };
        let frame_idx = self.summary.frames;
        self.summary.frames += 1;

        let observations = match &frame {
            Some(f) => {
                self.transition(LoopState::Detecting);
                self.detector.detect_markers(f)
            }
            None => Vec::new(),
        };

        self.transition(LoopState::Rendering);
        let report = self.render_observations(&observations)?;
        if let Some(hook) = self.on_frame.as_mut() {
            hook(frame_idx, &observations, &report);
        }
        Ok(true)
    }

    fn run_frames(&mut self, stop: &StopFlag) -> Result<(), OverlayError> {
        loop {
            if stop.is_stop_requested() {
                log::info!("stop requested after {} frames", self.summary.frames);
                return Ok(());
            }
            if self.max_frames.is_some_and(|max| self.summary.frames >= max) {
                return Ok(());
            }
            if !self.step()? {
                return Ok(());
            }
        }
    }

    /// Run until `stop` is raised, the source ends or `max_frames` is reached,
    /// then tear down. Teardown also happens when a frame fails.
    pub fn run(&mut self, stop: &StopFlag) -> Result<RunSummary, OverlayError> {
        let outcome = self.run_frames(stop);
        if let Err(e) = &outcome {
            log::error!("frame loop failed: {}", e);
        }
        let teardown = self.shutdown();
        if !teardown.is_clean() {
            log::warn!("teardown finished with {} failures", teardown.failures.len());
        }
        outcome.map(|_| self.summary.clone())
    }

    /// Blank the display, stop capture, stop the preview. Each step is attempted
    /// regardless of the others; failures are logged and reported, not raised.
    /// Only the first call does any work.
    pub fn shutdown(&mut self) -> TeardownReport {
        let mut report = TeardownReport::default();
        if self.torn_down {
            return report;
        }
        self.torn_down = true;

        if let Err(e) = self.sink.clear().and_then(|_| self.sink.flush()) {
            log::warn!("display clear on exit failed: {}", e);
            report.failures.push(format!("display: {}", e));
        }
        if let Err(e) = self.source.stop() {
            log::warn!("capture stop failed: {}", e);
            report.failures.push(format!("capture: {}", e));
        }
        if let Some(mut preview) = self.preview.take() {
            if let Err(e) = preview.stop() {
                log::warn!("preview stop failed: {}", e);
                report.failures.push(format!("preview: {}", e));
            }
        }
        self.transition(LoopState::Stopped);
        log::info!(
            "session over: {} frames, {} hits / {} markers",
            self.summary.frames,
            self.summary.hits,
            self.summary.observations
        );
        report
    }
}

impl<S, D, R> Drop for OverlayPipeline<S, D, R>
where
    S: FrameSource,
    D: MarkerDetector<S::Frame>,
    R: RenderSink,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}
