use thiserror::Error;

/// Failures of a single detection call or of loading its configuration.
///
/// "Nothing detected" is never an error: it is `FrameState::None`.
#[derive(Error, Debug)]
pub enum DetectError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("empty frame ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, DetectError>;
