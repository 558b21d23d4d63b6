use std::path::PathBuf;

pub mod audio;
pub mod config;
pub mod data;
pub mod engine;
pub mod motion;
pub mod presence;
pub mod progress;
pub mod scene;
pub mod score;
pub mod select;
pub mod shot;
pub mod store;
pub mod util;

pub use config::EngineConfig;
pub use engine::{Engine, Summary};
pub use select::{Highlight, Selection};
pub use shot::{ScoredShot, Shot, UnscoredShot};
pub use store::{AudioBuffer, Frame, FrameStore};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid boundary {boundary} at position {index}: {reason}")]
    InvalidBoundary {
        index: usize,
        boundary: usize,
        reason: &'static str,
    },
    #[error("failed to read frame {path:?}: {reason}")]
    FrameRead { path: PathBuf, reason: String },
    #[error("invalid audio data: {0}")]
    InvalidAudio(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("analysis data not found at: {0:?}")]
    AnalysisDataNotFound(PathBuf),
    #[error("analysis data at {0:?} does not match the audio file or settings")]
    StaleAnalysisData(PathBuf),
    #[error("run was cancelled")]
    Cancelled,
    #[cfg(feature = "ffmpeg")]
    #[error("FFmpeg error: {0}")]
    FFmpegError(#[from] ffmpeg_next::Error),
    #[error("WAV error: {0}")]
    WavError(#[from] hound::Error),
    #[error("bincode error: {0}")]
    BincodeError(#[from] bincode::Error),
    #[error("serde_json error: {0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Degenerate outcomes that do not abort a run.
///
/// These are attached to the [Selection] returned by the engine so callers can tell a short
/// (or empty) summary apart from a successful one.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub enum Warning {
    /// No frames, or no audio samples, were available to analyze.
    EmptyInput { frames: usize, audio_samples: usize },
    /// The selected highlights never reached the requested duration.
    InsufficientSelection { selected: usize, target: usize },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::EmptyInput {
                frames,
                audio_samples,
            } => write!(
                f,
                "empty input: {} frames, {} audio samples",
                frames, audio_samples
            ),
            Warning::InsufficientSelection { selected, target } => write!(
                f,
                "selected {} frames, short of the {} frame target",
                selected, target
            ),
        }
    }
}
