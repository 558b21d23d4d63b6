use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default frame width, in pixels.
pub const DEFAULT_FRAME_WIDTH: u32 = 320;

/// Default frame height, in pixels.
pub const DEFAULT_FRAME_HEIGHT: u32 = 180;

/// Default video frame rate.
pub const DEFAULT_FPS: u32 = 30;

/// Default scene cut threshold.
///
/// Two consecutive frames whose perceptual hashes differ by more than this many bits (out of 144)
/// are treated as a cut.
pub const DEFAULT_CUT_THRESHOLD: u32 = 40;

/// Default minimum scene length (frames).
///
/// A cut is only accepted if at least this many frames have passed since the previous one.
pub const DEFAULT_MIN_SCENE_LEN: usize = 7;

/// Default learning rate of the running background model.
pub const DEFAULT_BACKGROUND_ALPHA: f32 = 0.01;

/// Default working resolution for motion analysis.
pub const DEFAULT_MOTION_WIDTH: u32 = 160;
pub const DEFAULT_MOTION_HEIGHT: u32 = 90;

/// Default block size (pixels) used for block matching.
pub const DEFAULT_BLOCK_SIZE: u32 = 4;

/// Default search radius (pixels) used for block matching.
pub const DEFAULT_SEARCH_RADIUS: u32 = 4;

/// Default minimum foreground energy of a block.
///
/// This is the mean per-pixel foreground intensity below which a block is considered static and is
/// not matched at all.
pub const DEFAULT_BLOCK_ENERGY_FLOOR: f32 = 8.0;

/// Default maximum distance (pixels) between the displacements of two adjacent blocks for them to
/// be placed in the same cluster.
pub const DEFAULT_CLUSTER_TOLERANCE: f32 = 1.5;

/// Default minimum number of blocks in a cluster. Smaller clusters are treated as noise.
pub const DEFAULT_MIN_CLUSTER_SIZE: usize = 2;

/// Default fraction of a shot's frames sampled for the presence signal.
pub const DEFAULT_PRESENCE_SAMPLE_RATIO: f32 = 0.2;

/// Default multiplier applied to the score of shots with presence.
pub const DEFAULT_PRESENCE_BONUS: f64 = 1.1;

/// Default seed used for presence sampling.
pub const DEFAULT_SEED: u64 = 0x5eed;

/// Default minimum highlight length (frames).
///
/// Shots shorter than this look abrupt and are never selected.
pub const DEFAULT_MIN_HIGHLIGHT_LEN: usize = 45;

/// Default maximum length (frames) of a shot that is selected as a whole.
pub const DEFAULT_MAX_SINGLE_HIGHLIGHT: usize = 300;

/// Default maximum span (frames) of a highlight trimmed out of a longer shot.
pub const DEFAULT_HIGHLIGHT_SPAN_CAP: usize = 270;

/// Default fraction of the shot score below which a frame pair stops extending a highlight.
pub const DEFAULT_ABSORB_FRACTION: f64 = 0.3;

/// Default summary length (seconds).
pub const DEFAULT_TARGET_SECONDS: u32 = 85;

/// Layout of a raw frame on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FrameLayout {
    pub width: u32,
    pub height: u32,
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self {
            width: DEFAULT_FRAME_WIDTH,
            height: DEFAULT_FRAME_HEIGHT,
        }
    }
}

impl FrameLayout {
    /// Size of a single color plane.
    pub fn plane_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Size of a full frame file: three planes.
    pub fn frame_len(&self) -> usize {
        self.plane_len() * 3
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CutConfig {
    pub threshold: u32,
    pub min_scene_len: usize,
}

impl Default for CutConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_CUT_THRESHOLD,
            min_scene_len: DEFAULT_MIN_SCENE_LEN,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MotionConfig {
    pub alpha: f32,
    pub width: u32,
    pub height: u32,
    pub block_size: u32,
    pub search_radius: u32,
    pub block_energy_floor: f32,
    pub cluster_tolerance: f32,
    pub min_cluster_size: usize,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_BACKGROUND_ALPHA,
            width: DEFAULT_MOTION_WIDTH,
            height: DEFAULT_MOTION_HEIGHT,
            block_size: DEFAULT_BLOCK_SIZE,
            search_radius: DEFAULT_SEARCH_RADIUS,
            block_energy_floor: DEFAULT_BLOCK_ENERGY_FLOOR,
            cluster_tolerance: DEFAULT_CLUSTER_TOLERANCE,
            min_cluster_size: DEFAULT_MIN_CLUSTER_SIZE,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PresenceConfig {
    pub sample_ratio: f32,
    pub bonus: f64,
    pub seed: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            sample_ratio: DEFAULT_PRESENCE_SAMPLE_RATIO,
            bonus: DEFAULT_PRESENCE_BONUS,
            seed: DEFAULT_SEED,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub min_highlight_len: usize,
    pub max_single_highlight: usize,
    pub highlight_span_cap: usize,
    pub absorb_fraction: f64,
    pub target_seconds: u32,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            min_highlight_len: DEFAULT_MIN_HIGHLIGHT_LEN,
            max_single_highlight: DEFAULT_MAX_SINGLE_HIGHLIGHT,
            highlight_span_cap: DEFAULT_HIGHLIGHT_SPAN_CAP,
            absorb_fraction: DEFAULT_ABSORB_FRACTION,
            target_seconds: DEFAULT_TARGET_SECONDS,
        }
    }
}

/// All tunables of a single engine run.
///
/// Every field has a default (see the `DEFAULT_*` constants in this module). A config can be
/// loaded from a JSON file in which any subset of the fields is present.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub layout: FrameLayout,
    pub fps: u32,
    pub cut: CutConfig,
    pub motion: MotionConfig,
    pub presence: PresenceConfig,
    pub selector: SelectorConfig,
    pub threading: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            layout: FrameLayout::default(),
            fps: DEFAULT_FPS,
            cut: CutConfig::default(),
            motion: MotionConfig::default(),
            presence: PresenceConfig::default(),
            selector: SelectorConfig::default(),
            threading: true,
        }
    }
}

impl EngineConfig {
    /// Loads a config from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let f = std::fs::File::open(path.as_ref())?;
        Ok(serde_json::from_reader(f)?)
    }

    /// Checks that the settings can produce a meaningful run.
    ///
    /// Settings loaded from a file bypass the command line checks, so the engine validates its
    /// config before every run.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Err(Error::InvalidConfig(reason.to_owned()));

        if self.fps == 0 {
            return invalid("fps must be a positive number");
        }
        if self.layout.width == 0 || self.layout.height == 0 {
            return invalid("frame width and height must be positive numbers");
        }
        if self.motion.width == 0 || self.motion.height == 0 {
            return invalid("motion width and height must be positive numbers");
        }
        if self.motion.block_size == 0 {
            return invalid("block_size must be a positive number");
        }
        if !(self.motion.alpha > 0.0 && self.motion.alpha <= 1.0) {
            return invalid("alpha must be in (0, 1]");
        }
        if !(0.0..=1.0).contains(&self.presence.sample_ratio) {
            return invalid("presence sample_ratio must be in [0, 1]");
        }
        if !(self.presence.bonus > 0.0) {
            return invalid("presence bonus must be a positive number");
        }
        if self.selector.target_seconds == 0 {
            return invalid("target_seconds must be a positive number");
        }
        if self.selector.min_highlight_len > self.selector.max_single_highlight {
            return invalid("min_highlight_len cannot be larger than max_single_highlight");
        }
        if !(0.0..=1.0).contains(&self.selector.absorb_fraction) {
            return invalid("absorb_fraction must be in [0, 1]");
        }
        Ok(())
    }

    /// Number of frames the summary should reach.
    pub fn target_frames(&self) -> usize {
        self.fps as usize * self.selector.target_seconds as usize
    }

    /// Returns a new [EngineConfig] with the provided frame `layout`.
    pub fn with_layout(mut self, layout: FrameLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Returns a new [EngineConfig] with the provided `fps`.
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Returns a new [EngineConfig] with the provided `target_seconds`.
    pub fn with_target_seconds(mut self, target_seconds: u32) -> Self {
        self.selector.target_seconds = target_seconds;
        self
    }

    /// Returns a new [EngineConfig] with the provided highlight length limits.
    pub fn with_highlight_limits(mut self, min_len: usize, max_single: usize) -> Self {
        self.selector.min_highlight_len = min_len;
        self.selector.max_single_highlight = max_single;
        self
    }

    /// Returns a new [EngineConfig] with the provided `presence_bonus`.
    pub fn with_presence_bonus(mut self, presence_bonus: f64) -> Self {
        self.presence.bonus = presence_bonus;
        self
    }

    /// Returns a new [EngineConfig] with `threading` set to the provided value.
    pub fn with_threading(mut self, threading: bool) -> Self {
        self.threading = threading;
        self
    }
}
