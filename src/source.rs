use std::path::{Path, PathBuf};

use glob::glob;
use image::{DynamicImage, ImageReader};

use crate::error::SourceError;
use crate::types::Capture;

/// Supplier of captured frames. Capturing is the only call allowed to block.
pub trait FrameSource {
    type Frame;
    fn capture_frame(&mut self) -> Capture<Self::Frame>;
    /// Release the capture device. Called once during teardown.
    fn stop(&mut self) -> Result<(), SourceError>;
}

fn img_filter(rp: glob::GlobResult) -> Option<PathBuf> {
    if let Ok(p) = rp {
        for ext in &[".png", ".jpg", ".jpeg"] {
            if p.as_os_str().to_string_lossy().to_lowercase().ends_with(ext) {
                return Some(p);
            }
        }
    }
    None
}

/// Replays a folder of still images as a camera stream, in file name order.
pub struct ImageFolderSource {
    paths: Vec<PathBuf>,
    next: usize,
    rotate_180: bool,
    stopped: bool,
}

impl ImageFolderSource {
    pub fn new(root_folder: impl AsRef<Path>, rotate_180: bool) -> Result<ImageFolderSource, SourceError> {
        Self::with_stride(root_folder, rotate_180, 0, 1)
    }

    pub fn with_stride(
        root_folder: impl AsRef<Path>,
        rotate_180: bool,
        start_idx: usize,
        step: usize,
    ) -> Result<ImageFolderSource, SourceError> {
        let root = root_folder.as_ref();
        let pattern = format!("{}/**/*", root.display());
        let mut sorted_path: Vec<PathBuf> = glob(&pattern)?.filter_map(img_filter).collect();
        sorted_path.sort();
        let paths: Vec<PathBuf> = sorted_path
            .into_iter()
            .skip(start_idx)
            .step_by(step.max(1))
            .collect();
        if paths.is_empty() {
            return Err(SourceError::Empty(root.to_path_buf()));
        }
        log::info!("capturing {} frames from {}", paths.len(), root.display());
        Ok(ImageFolderSource {
            paths,
            next: 0,
            rotate_180,
            stopped: false,
        })
    }
}

impl FrameSource for ImageFolderSource {
    type Frame = DynamicImage;

    fn capture_frame(&mut self) -> Capture<DynamicImage> {
        if self.stopped {
            return Capture::EndOfStream;
        }
        let Some(path) = self.paths.get(self.next) else {
            return Capture::EndOfStream;
        };
        self.next += 1;
        let img = match ImageReader::open(path).map_err(image::ImageError::from).and_then(|r| r.decode()) {
            Ok(img) => img,
            Err(e) => {
                log::warn!("dropping frame {}: {}", path.display(), e);
                return Capture::Dropped;
            }
        };
        let gray = DynamicImage::ImageLuma8(img.to_luma8());
        if self.rotate_180 {
            Capture::Frame(gray.rotate180())
        } else {
            Capture::Frame(gray)
        }
    }

    fn stop(&mut self) -> Result<(), SourceError> {
        self.stopped = true;
        Ok(())
    }
}
