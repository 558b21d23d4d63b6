use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{CutConfig, FrameLayout, MotionConfig};
use crate::engine::{Engine, Summary};
use crate::shot::UnscoredShot;
use crate::store::{self, FrameStore};
use crate::{Error, Result, Warning};

/// Extension of the analysis data file written next to the audio file.
pub const ANALYSIS_DATA_FILE_EXT: &str = "shotsum.bin";

/// Extension of the selection file written next to the audio file.
pub const SELECTION_FILE_EXT: &str = "shotsum.json";

/// Everything that determines the outcome of an analysis.
///
/// Stored analysis data is only reused when all of these match the current run.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct AnalysisParams {
    /// md5 of the audio file header.
    pub md5: String,
    pub frame_count: usize,
    pub fps: u32,
    pub layout: FrameLayout,
    /// Shot boundaries given by the caller, or `None` if they were detected.
    pub boundaries: Option<Vec<usize>>,
    pub cut: CutConfig,
    pub motion: MotionConfig,
    pub presence_sample_ratio: f32,
    pub presence_seed: u64,
}

impl AnalysisParams {
    fn new(engine: &Engine, md5: String, frame_count: usize, boundaries: Option<&[usize]>) -> Self {
        let config = engine.config();
        Self {
            md5,
            frame_count,
            fps: config.fps,
            layout: config.layout,
            boundaries: boundaries.map(|b| b.to_vec()),
            cut: config.cut.clone(),
            motion: config.motion.clone(),
            presence_sample_ratio: config.presence.sample_ratio,
            presence_seed: config.presence.seed,
        }
    }
}

/// Analyzed (but not yet scored) shots of a single video.
///
/// Analysis is the expensive part of a run. Persisting it allows scoring and selection settings
/// to be tuned without touching the frames again. The [AnalysisParams] of the run are stored
/// along with the shots to detect stale data.
#[derive(Debug, Deserialize, Serialize)]
pub struct Analysis {
    pub(crate) params: AnalysisParams,
    pub(crate) audio_samples: usize,
    pub(crate) shots: Vec<UnscoredShot>,
}

impl Analysis {
    /// Location of the analysis data for the given audio file.
    pub fn path_for(audio: impl AsRef<Path>) -> PathBuf {
        audio.as_ref().with_extension(ANALYSIS_DATA_FILE_EXT)
    }

    /// Load analysis data from a path.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::AnalysisDataNotFound(path.to_owned()));
        }
        let f = std::fs::File::open(path)?;
        Ok(bincode::deserialize_from(&f)?)
    }

    /// Load the analysis data stored alongside an audio file, without any checks.
    pub fn from_audio(audio: impl AsRef<Path>) -> Result<Self> {
        Self::from_path(Self::path_for(audio))
    }

    /// Load the analysis data stored alongside an audio file for use with `engine`.
    ///
    /// Fails with [Error::StaleAnalysisData] if the audio file changed since the analysis, or if
    /// the analysis was done at a different frame rate.
    pub fn load(engine: &Engine, audio: impl AsRef<Path>) -> Result<Self> {
        let audio = audio.as_ref();
        let data = Self::from_audio(audio)?;
        let md5 = crate::util::compute_header_md5sum(audio)?;
        if data.params.md5 != md5 || data.params.fps != engine.config().fps {
            return Err(Error::StaleAnalysisData(Self::path_for(audio)));
        }
        Ok(data)
    }

    /// Analyzes the frames in `frames_dir` together with the audio file at `audio`.
    ///
    /// Existing data next to the audio file is reused if it was produced from the same inputs
    /// and settings, unless `force` is set. Fresh results are written next to the audio file
    /// when `persist` is set.
    pub fn run(
        engine: &Engine,
        frames_dir: impl AsRef<Path>,
        audio: impl AsRef<Path>,
        boundaries: Option<&[usize]>,
        force: bool,
        persist: bool,
    ) -> Result<Self> {
        let span = tracing::span!(tracing::Level::TRACE, "analysis");
        let _enter = span.enter();

        engine.config().validate()?;
        let (frames_dir, audio) = (frames_dir.as_ref(), audio.as_ref());

        // Check if we've already analyzed this video by comparing MD5 hashes and settings.
        let md5 = crate::util::compute_header_md5sum(audio)?;
        let frame_count = store::list_frame_files(frames_dir)?.len();
        let params = AnalysisParams::new(engine, md5, frame_count, boundaries);
        if !force {
            if let Ok(data) = Self::from_audio(audio) {
                if data.params == params {
                    tracing::info!("skipping analysis for {}", audio.display());
                    return Ok(data);
                }
                tracing::debug!("stale analysis data for {}", audio.display());
            }
        }

        let store = FrameStore::load(frames_dir, audio, params.layout)?;
        let shots = engine.segment(&store, boundaries)?;
        let shots = engine.analyze(&store, &shots)?;

        let data = Self {
            params: AnalysisParams {
                frame_count: store.len(),
                ..params
            },
            audio_samples: store.audio().samples().len(),
            shots,
        };
        if persist {
            data.write(Self::path_for(audio))?;
        }
        Ok(data)
    }

    /// Writes the analysis data to `path` with bincode.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let f = std::fs::File::create(path)?;
        bincode::serialize_into(&f, self)?;
        tracing::debug!(num_shots = self.shots.len(), "wrote {}", path.display());
        Ok(())
    }

    pub fn params(&self) -> &AnalysisParams {
        &self.params
    }

    pub fn md5(&self) -> &str {
        &self.params.md5
    }

    pub fn frame_count(&self) -> usize {
        self.params.frame_count
    }

    pub fn shots(&self) -> &[UnscoredShot] {
        &self.shots
    }

    /// Scores the analyzed shots and selects highlights with the given engine's settings.
    pub fn summarize(self, engine: &Engine) -> Summary {
        let (frames, audio_samples) = (self.params.frame_count, self.audio_samples);
        let mut summary = engine.summarize(self.shots);
        if frames == 0 || audio_samples == 0 {
            tracing::warn!(frames, audio_samples, "empty input");
            summary.selection.warnings.insert(
                0,
                Warning::EmptyInput {
                    frames,
                    audio_samples,
                },
            );
        }
        summary
    }
}
