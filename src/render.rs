use std::path::{Path, PathBuf};

use image::{GrayImage, Luma};

use crate::display::Pixel;
use crate::error::SinkError;

/// Pixel-addressable monochrome surface.
///
/// Within a frame callers issue `clear`, then any number of `plot_point`, then
/// one `flush`. Nothing reaches the hardware before `flush`.
pub trait RenderSink {
    fn clear(&mut self) -> Result<(), SinkError>;
    /// `brightness` is clamped to `0.0..=1.0`.
    fn plot_point(&mut self, pixel: Pixel, brightness: f32) -> Result<(), SinkError>;
    fn flush(&mut self) -> Result<(), SinkError>;
}

impl<R: RenderSink + ?Sized> RenderSink for Box<R> {
    fn clear(&mut self) -> Result<(), SinkError> {
        (**self).clear()
    }
    fn plot_point(&mut self, pixel: Pixel, brightness: f32) -> Result<(), SinkError> {
        (**self).plot_point(pixel, brightness)
    }
    fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush()
    }
}

/// Fan a frame out to several sinks, in order.
impl<R: RenderSink> RenderSink for Vec<R> {
    fn clear(&mut self) -> Result<(), SinkError> {
        self.iter_mut().try_for_each(|s| s.clear())
    }
    fn plot_point(&mut self, pixel: Pixel, brightness: f32) -> Result<(), SinkError> {
        self.iter_mut().try_for_each(|s| s.plot_point(pixel, brightness))
    }
    fn flush(&mut self) -> Result<(), SinkError> {
        self.iter_mut().try_for_each(|s| s.flush())
    }
}

fn brightness_to_luma(brightness: f32) -> u8 {
    (brightness.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// In-memory accumulation buffer for one display frame.
///
/// Each plotted point is drawn as a filled dot of `dot_radius` pixels, clipped
/// to the grid. Overlapping dots keep the brighter value.
pub struct FrameBuffer {
    image: GrayImage,
    dot_radius: u32,
    flushes: usize,
}

impl FrameBuffer {
    pub fn new(resolution: (u32, u32), dot_radius: u32) -> FrameBuffer {
        FrameBuffer {
            image: GrayImage::new(resolution.0, resolution.1),
            dot_radius,
            flushes: 0,
        }
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    pub fn luma(&self, x: u32, y: u32) -> Option<u8> {
        self.image.get_pixel_checked(x, y).map(|p| p.0[0])
    }

    pub fn lit_pixels(&self) -> Vec<Pixel> {
        self.image
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[0] > 0)
            .map(|(x, y, _)| Pixel::new(x, y))
            .collect()
    }

    pub fn flush_count(&self) -> usize {
        self.flushes
    }
}

impl RenderSink for FrameBuffer {
    fn clear(&mut self) -> Result<(), SinkError> {
        self.image.fill(0);
        Ok(())
    }

    fn plot_point(&mut self, pixel: Pixel, brightness: f32) -> Result<(), SinkError> {
        let value = brightness_to_luma(brightness);
        let (w, h) = self.image.dimensions();
        let r = self.dot_radius as i64;
        let (cx, cy) = (pixel.x as i64, pixel.y as i64);
        for y in (cy - r).max(0)..=(cy + r).min(h as i64 - 1) {
            for x in (cx - r).max(0)..=(cx + r).min(w as i64 - 1) {
                let (dx, dy) = (x - cx, y - cy);
                if dx * dx + dy * dy > r * r {
                    continue;
                }
                let p = self.image.get_pixel_mut(x as u32, y as u32);
                if p.0[0] < value {
                    *p = Luma([value]);
                }
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.flushes += 1;
        Ok(())
    }
}

/// Writes every flushed frame as a numbered PNG, standing in for the physical panel.
pub struct PngSink {
    buffer: FrameBuffer,
    output_dir: PathBuf,
    frame_idx: usize,
}

impl PngSink {
    pub fn new(
        output_dir: impl AsRef<Path>,
        resolution: (u32, u32),
        dot_radius: u32,
    ) -> Result<PngSink, SinkError> {
        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir)?;
        Ok(PngSink {
            buffer: FrameBuffer::new(resolution, dot_radius),
            output_dir,
            frame_idx: 0,
        })
    }

    pub fn frames_written(&self) -> usize {
        self.frame_idx
    }
}

impl RenderSink for PngSink {
    fn clear(&mut self) -> Result<(), SinkError> {
        self.buffer.clear()
    }
    fn plot_point(&mut self, pixel: Pixel, brightness: f32) -> Result<(), SinkError> {
        self.buffer.plot_point(pixel, brightness)
    }
    fn flush(&mut self) -> Result<(), SinkError> {
        self.buffer.flush()?;
        let path = self.output_dir.join(format!("{:06}.png", self.frame_idx));
        self.buffer.image().save(&path)?;
        log::trace!("wrote {}", path.display());
        self.frame_idx += 1;
        Ok(())
    }
}
