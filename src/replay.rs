use indicatif::ParallelProgressIterator;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::pipeline::{FrameReport, Projector, RunSummary, project_frame};
use crate::types::MarkerObservation;

/// Recorded detector output, one entry per captured frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseLog {
    pub frames: Vec<Vec<MarkerObservation>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayResult {
    pub frames: Vec<FrameReport>,
    pub summary: RunSummary,
}

/// Project every frame of `log` offline. Frames are independent so they are
/// processed in parallel; output keeps the log order.
pub fn replay(projector: &Projector, log: &PoseLog, show_progress: bool) -> ReplayResult {
    let project = |obs: &Vec<MarkerObservation>| project_frame(projector, obs);
    let frames: Vec<FrameReport> = if show_progress {
        log.frames
            .par_iter()
            .progress_count(log.frames.len() as u64)
            .map(project)
            .collect()
    } else {
        log.frames.par_iter().map(project).collect()
    };

    let mut summary = RunSummary {
        frames: frames.len(),
        ..Default::default()
    };
    for f in &frames {
        f.tally(&mut summary);
    }
    log::info!(
        "replayed {} frames: {} hits, {} misses",
        summary.frames,
        summary.hits,
        summary.misses()
    );
    ReplayResult { frames, summary }
}
