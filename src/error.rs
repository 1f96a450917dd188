use std::path::PathBuf;

use thiserror::Error;

/// Fatal problems found before the pipeline is allowed to start.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
    #[error("calibration field `{0}` is missing")]
    MissingField(&'static str),
    #[error("display plane center has zero length, the plane normal is undefined")]
    ZeroPlaneCenter,
    #[error("display {0} must be strictly positive, got {1}")]
    NonPositiveExtent(&'static str, f64),
    #[error("display resolution must be non-zero, got {0}x{1}")]
    ZeroResolution(u32, u32),
    #[error("marker length must be strictly positive, got {0}")]
    NonPositiveMarkerLength(f64),
    #[error("{0} must lie in 0..=1, got {1}")]
    OutOfUnitRange(&'static str, f64),
    #[error("{0} contains a non-finite value")]
    NonFinite(&'static str),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("display write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("viewer stream failed: {0}")]
    Viewer(String),
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no frames found under {0}")]
    Empty(PathBuf),
    #[error("invalid capture pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error("capture device failed: {0}")]
    Device(String),
}

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("preview command is empty")]
    EmptyCommand,
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("preview process did not exit: {0}")]
    Kill(#[source] std::io::Error),
    #[error("preview supervisor did not finish within the grace period")]
    SupervisorStuck,
}

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Preview(#[from] PreviewError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
