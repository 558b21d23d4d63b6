use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A maximal run of frames between two content boundaries. `end` is exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Shot {
    pub num: usize,
    pub start: usize,
    pub end: usize,
}

impl Shot {
    /// Number of frames in this shot.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Two adjacent frames, by absolute index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FramePair {
    pub prev: usize,
    pub curr: usize,
}

impl Display for FramePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.prev, self.curr)
    }
}

/// Motion magnitude of every adjacent frame pair of a shot.
///
/// Pairs are dense within a shot, so the scores are kept in a `Vec` where entry `i` belongs to the
/// pair `(start + i, start + i + 1)`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct MotionProfile {
    start: usize,
    scores: Vec<f64>,
}

impl MotionProfile {
    pub fn new(start: usize, scores: Vec<f64>) -> Self {
        Self { start, scores }
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn get(&self, pair: FramePair) -> Option<f64> {
        if pair.curr != pair.prev + 1 || pair.prev < self.start {
            return None;
        }
        self.scores.get(pair.prev - self.start).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FramePair, f64)> + '_ {
        self.scores.iter().enumerate().map(move |(i, score)| {
            let prev = self.start + i;
            (FramePair { prev, curr: prev + 1 }, *score)
        })
    }

    /// Arithmetic mean of all pair scores, or 0 if there are no pairs.
    pub fn mean(&self) -> f64 {
        if self.scores.is_empty() {
            return 0.0;
        }
        self.scores.iter().sum::<f64>() / self.scores.len() as f64
    }
}

/// A shot with all of its per-shot signals attached, but not yet scored.
///
/// The audio score of a shot can only be normalized against every other shot of the same video,
/// so scoring happens in a separate pass (see [crate::score]) that turns these into
/// [ScoredShot]s.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct UnscoredShot {
    pub(crate) shot: Shot,
    pub(crate) motion: MotionProfile,
    pub(crate) motion_score: f64,
    pub(crate) raw_audio_score: f64,
    pub(crate) presence: bool,
}

impl UnscoredShot {
    pub fn new(shot: Shot, motion: MotionProfile, raw_audio_score: f64, presence: bool) -> Self {
        let motion_score = motion.mean();
        Self {
            shot,
            motion,
            motion_score,
            raw_audio_score,
            presence,
        }
    }

    pub fn shot(&self) -> &Shot {
        &self.shot
    }

    pub fn motion(&self) -> &MotionProfile {
        &self.motion
    }

    pub fn motion_score(&self) -> f64 {
        self.motion_score
    }

    /// Mean audio amplitude of the shot, before normalization.
    pub fn raw_audio_score(&self) -> f64 {
        self.raw_audio_score
    }

    pub fn presence(&self) -> bool {
        self.presence
    }
}

/// A shot with its final composite score. Only produced by [crate::score::score_shots].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoredShot {
    shot: Shot,
    motion: MotionProfile,
    motion_score: f64,
    audio_score: f64,
    presence: bool,
    score: f64,
}

impl ScoredShot {
    pub(crate) fn new(unscored: UnscoredShot, audio_score: f64, score: f64) -> Self {
        Self {
            shot: unscored.shot,
            motion: unscored.motion,
            motion_score: unscored.motion_score,
            audio_score,
            presence: unscored.presence,
            score,
        }
    }

    pub fn shot(&self) -> &Shot {
        &self.shot
    }

    pub fn motion(&self) -> &MotionProfile {
        &self.motion
    }

    pub fn motion_score(&self) -> f64 {
        self.motion_score
    }

    /// Audio score, normalized across all shots of the run.
    pub fn audio_score(&self) -> f64 {
        self.audio_score
    }

    pub fn presence(&self) -> bool {
        self.presence
    }

    pub fn score(&self) -> f64 {
        self.score
    }
}

/// Partitions `[0, total)` into shots using a list of boundaries.
///
/// Each boundary ends one shot and starts the next. If the last boundary falls short of `total`,
/// a trailing shot is added to cover the remaining frames. Boundaries must be strictly ascending,
/// non-zero and no larger than `total`.
pub fn segment(total: usize, boundaries: &[usize]) -> Result<Vec<Shot>> {
    let mut shots = Vec::with_capacity(boundaries.len() + 1);
    let mut start = 0;

    for (index, &boundary) in boundaries.iter().enumerate() {
        if boundary > total {
            return Err(Error::InvalidBoundary {
                index,
                boundary,
                reason: "boundary exceeds the frame count",
            });
        }
        if boundary <= start {
            return Err(Error::InvalidBoundary {
                index,
                boundary,
                reason: "boundaries must be strictly ascending and non-zero",
            });
        }
        shots.push(Shot {
            num: shots.len(),
            start,
            end: boundary,
        });
        start = boundary;
    }

    if start < total {
        shots.push(Shot {
            num: shots.len(),
            start,
            end: total,
        });
    }

    Ok(shots)
}
