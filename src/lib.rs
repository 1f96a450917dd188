pub mod calibration;
pub mod config;
pub mod detector;
pub mod display;
pub mod error;
pub mod io;
pub mod mounting;
pub mod pipeline;
pub mod preview;
pub mod render;
pub mod replay;
pub mod simulation;
pub mod source;
pub mod transform;
pub mod types;
pub mod visualization;

pub use display::{DisplayPlane, Miss, Pixel};
pub use error::{ConfigError, OverlayError};
pub use pipeline::{OverlayPipeline, Projector, RunSummary, StopFlag};
pub use transform::CameraOffset;
pub use types::MarkerObservation;
