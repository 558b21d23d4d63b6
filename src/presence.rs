use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;

use crate::store::Frame;

/// A rectangular region of a frame, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Detects "notable content" (e.g., faces) in a single frame.
///
/// Only whether any region is returned matters to the engine. Implementations are shared across
/// analysis threads.
pub trait PresenceDetector: Send + Sync {
    fn detect(&self, frame: &Frame) -> Vec<Region>;
}

impl<F> PresenceDetector for F
where
    F: Fn(&Frame) -> Vec<Region> + Send + Sync,
{
    fn detect(&self, frame: &Frame) -> Vec<Region> {
        self(frame)
    }
}

/// Detector that never finds anything. Used when no presence signal is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPresence;

impl PresenceDetector for NoPresence {
    fn detect(&self, _frame: &Frame) -> Vec<Region> {
        Vec::new()
    }
}

/// Checks a random subsample of a shot's frames for presence.
///
/// `floor(len * ratio)` frames are drawn without replacement from an RNG seeded with `seed` and
/// the shot number, so the result does not depend on which thread analyzes the shot. Returns
/// `false` if there is nothing to sample.
pub fn detect_in_shot(
    detector: &dyn PresenceDetector,
    frames: &[Frame],
    ratio: f32,
    seed: u64,
    shot_num: usize,
) -> bool {
    let amount = ((frames.len() as f64) * ratio.clamp(0.0, 1.0) as f64) as usize;
    if amount == 0 {
        return false;
    }

    let mut rng = StdRng::seed_from_u64(seed ^ (shot_num as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    index::sample(&mut rng, frames.len(), amount)
        .into_iter()
        .any(|i| !detector.detect(&frames[i]).is_empty())
}
