use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub mod blend;
pub mod data;
pub mod interp;
pub mod mode;
pub mod model;
pub mod motion;
pub mod pipeline;
pub mod preprocess;
pub mod presets;
pub mod prompt;
pub mod util;
pub mod video;
pub mod warp;

pub use mode::Mode;

// One erring to rule them all...
#[derive(Error, Debug)]
pub enum InterpError {
    #[error("Model checkpoint not found: {0}")]
    CheckpointNotFound(PathBuf),
    #[error("Model config not found: {0}")]
    ConfigNotFound(PathBuf),
    #[error("Sampler `{program}` unavailable ({hint})")]
    SamplerUnavailable { program: String, hint: String },
    #[error("Mode {0} is not supported by this pipeline")]
    UnsupportedMode(Mode),
    #[error("Invalid mode `{0}`; expected basic|hybrid|steerable|dynamicrafter")]
    InvalidMode(String),
    #[error("Unknown preset `{0}`; see --list")]
    InvalidPreset(String),
    #[error("Invalid frame count {0}")]
    InvalidFrameCount(usize),
    #[error("Frame dimensions differ: {width_a}x{height_a} vs {width_b}x{height_b}")]
    DimensionMismatch {
        width_a: u32,
        height_a: u32,
        width_b: u32,
        height_b: u32,
    },
    #[error("Refusing to write a video with no frames")]
    EmptyFrames,
    #[error("Sample buffer holds {actual} values, expected {expected}")]
    SampleShapeMismatch { expected: usize, actual: usize },
    #[error("Model invocation `{program}` failed (code {code:?}): {stderr}")]
    ModelInvocation {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("Encoder {codec} failed (code {code:?}): {stderr}")]
    EncoderFailed {
        codec: &'static str,
        code: Option<i32>,
        stderr: String,
    },
    #[error("Queue Full")]
    QueueFull,
    #[error("Job ID Not Found")]
    JobNotFound,
    #[error("Job dispatcher is not running")]
    DispatcherGone,
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error("Cancelled")]
    Cancelled,
    #[error("IO error: {0}")]
    IoErr(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonErr(#[from] serde_json::Error),
    #[error("Image error: {0}")]
    ImageErr(#[from] image::ImageError),
}

impl InterpError {
    // Extra line printed under the error by the CLIs
    pub fn hint(&self) -> Option<&str> {
        match self {
            InterpError::SamplerUnavailable { hint, .. } => Some(hint.as_str()),
            InterpError::CheckpointNotFound(_) | InterpError::ConfigNotFound(_) => {
                Some("pass --model-path / --config-path or run from the model repository root")
            }
            _ => None,
        }
    }
}

pub type InterpResult<T> = Result<T, InterpError>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn io_errors_keep_their_cause() {
        let err = InterpError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "a.png: missing"));
        assert_eq!(err.to_string(), "IO error: a.png: missing");
        assert!(err.hint().is_none());
    }
}
