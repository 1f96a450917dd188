use serde::{Deserialize, Serialize};

use crate::display::Pixel;

/// Axis flips that depend on how the display is physically assembled in front of
/// the observer, not on the projection geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MountingCorrection {
    #[serde(default)]
    pub mirror_x: bool,
    #[serde(default)]
    pub mirror_y: bool,
}

impl MountingCorrection {
    pub fn identity() -> MountingCorrection {
        MountingCorrection::default()
    }

    pub fn mirrored_horizontally() -> MountingCorrection {
        MountingCorrection {
            mirror_x: true,
            mirror_y: false,
        }
    }

    /// Apply the flips on a `resolution` grid. Mirrored pixels stay on the grid:
    /// `x' = width - 1 - x`.
    pub fn apply(&self, pixel: Pixel, resolution: (u32, u32)) -> Pixel {
        let (res_w, res_h) = resolution;
        let x = if self.mirror_x {
            res_w.saturating_sub(1).saturating_sub(pixel.x)
        } else {
            pixel.x
        };
        let y = if self.mirror_y {
            res_h.saturating_sub(1).saturating_sub(pixel.y)
        } else {
            pixel.y
        };
        Pixel::new(x, y)
    }
}
