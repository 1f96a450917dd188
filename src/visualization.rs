use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rerun::{RecordingStream, TimeCell};

use crate::display::Pixel;
use crate::error::SinkError;
use crate::render::{FrameBuffer, RenderSink};
use crate::types::MarkerObservation;

/// Depth at which footprint colours saturate, meters.
const MAX_MARKER_DEPTH: f64 = 3.0;

pub fn id_to_color(id: usize) -> (u8, u8, u8, u8) {
    let mut rng = ChaCha8Rng::seed_from_u64(id as u64);
    let color_num = rng.random_range(0..2u32.pow(24));
    (
        ((color_num >> 16) % 256) as u8,
        ((color_num >> 8) % 256) as u8,
        (color_num % 256) as u8,
        255,
    )
}

/// Colour for a marker at `depth` meters, saturating at `max_depth`.
pub fn depth_to_color(depth: f64, max_depth: f64) -> (u8, u8, u8, u8) {
    let t = if max_depth > 0.0 {
        (depth / max_depth).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let c = colorous::TURBO.eval_continuous(t);
    (c.r, c.g, c.b, 255)
}

/// rerun use top left corner as (0, 0)
pub fn rerun_shift(pixels: &[Pixel]) -> Vec<(f32, f32)> {
    pixels
        .iter()
        .map(|p| (p.x as f32 + 0.5, p.y as f32 + 0.5))
        .collect()
}

fn viewer_err(e: rerun::RecordingStreamError) -> SinkError {
    SinkError::Viewer(e.to_string())
}

/// Log the forward-camera marker positions of one frame as 3D points, and
/// their image footprints coloured by depth.
pub fn log_markers(
    recording: &RecordingStream,
    frame_idx: i64,
    observations: &[MarkerObservation],
) -> Result<(), SinkError> {
    recording.set_time("frame", TimeCell::from_sequence(frame_idx));
    let (pts, colors_labels): (Vec<_>, Vec<_>) = observations
        .iter()
        .map(|o| {
            let t = o.translation.as_vec3();
            (
                (t.x, t.y, t.z),
                (id_to_color(o.id as usize), format!("id {}", o.id)),
            )
        })
        .unzip();
    let (colors, labels): (Vec<_>, Vec<_>) = colors_labels.into_iter().unzip();
    recording
        .log(
            "forward_cam/markers",
            &rerun::Points3D::new(pts)
                .with_colors(colors)
                .with_labels(labels)
                .with_radii([rerun::Radius::new_ui_points(6.0)]),
        )
        .map_err(viewer_err)?;

    let (centers, depth_colors): (Vec<_>, Vec<_>) = observations
        .iter()
        .map(|o| {
            let c = o.footprint_center();
            (
                (c.x as f32, c.y as f32),
                depth_to_color(o.translation.z, MAX_MARKER_DEPTH),
            )
        })
        .unzip();
    recording
        .log(
            "forward_cam/image/markers",
            &rerun::Points2D::new(centers)
                .with_colors(depth_colors)
                .with_radii([rerun::Radius::new_ui_points(4.0)]),
        )
        .map_err(viewer_err)
}

/// Mirrors the display into a rerun viewer, one logged frame per flush.
pub struct RerunSink {
    recording: RecordingStream,
    buffer: FrameBuffer,
    frame_idx: i64,
}

impl RerunSink {
    pub fn new(recording: RecordingStream, resolution: (u32, u32), dot_radius: u32) -> RerunSink {
        RerunSink {
            recording,
            buffer: FrameBuffer::new(resolution, dot_radius),
            frame_idx: 0,
        }
    }
}

impl RenderSink for RerunSink {
    fn clear(&mut self) -> Result<(), SinkError> {
        self.buffer.clear()
    }

    fn plot_point(&mut self, pixel: Pixel, brightness: f32) -> Result<(), SinkError> {
        self.buffer.plot_point(pixel, brightness)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.buffer.flush()?;
        let lit = self.buffer.lit_pixels();
        let colors: Vec<_> = lit
            .iter()
            .map(|p| {
                let v = self.buffer.luma(p.x, p.y).unwrap_or(0);
                (v, v, v, 255)
            })
            .collect();
        self.recording
            .set_time("frame", TimeCell::from_sequence(self.frame_idx));
        self.recording
            .log(
                "display/pixels",
                &rerun::Points2D::new(rerun_shift(&lit))
                    .with_colors(colors)
                    .with_radii([rerun::Radius::new_ui_points(3.0)]),
            )
            .map_err(viewer_err)?;
        self.frame_idx += 1;
        Ok(())
    }
}
