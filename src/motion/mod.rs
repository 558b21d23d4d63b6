mod background;
mod block;
mod cluster;

pub use background::BackgroundSubtractor;
pub use block::{BlockMatcher, BlockMotion};
pub use cluster::{cluster, Cluster};

use image::GrayImage;

use crate::config::MotionConfig;
use crate::shot::MotionProfile;
use crate::store::Frame;

/// Estimates how much coherent motion happens within a shot.
///
/// For every shot, the analyzer:
///
/// 1. Converts each frame to luma at the working resolution
/// 2. Subtracts a running-average background seeded from the first frame of the shot
/// 3. Block-matches every consecutive pair of foreground images
/// 4. Clusters the block displacements to keep only coherent moving regions
/// 5. Scores the pair as the mean magnitude of the cluster displacements
#[derive(Clone, Debug)]
pub struct MotionAnalyzer {
    config: MotionConfig,
    matcher: BlockMatcher,
}

impl Default for MotionAnalyzer {
    fn default() -> Self {
        Self::new(MotionConfig::default())
    }
}

impl MotionAnalyzer {
    pub fn new(config: MotionConfig) -> Self {
        let matcher = BlockMatcher::new(
            config.block_size,
            config.search_radius,
            config.block_energy_floor,
        );
        Self { config, matcher }
    }

    /// Scores the motion between two consecutive foreground images.
    pub fn score_pair(&self, prev: &GrayImage, curr: &GrayImage) -> f64 {
        let motions = self.matcher.match_blocks(prev, curr);
        let clusters = cluster(
            &motions,
            self.config.cluster_tolerance,
            self.config.min_cluster_size,
        );
        if clusters.is_empty() {
            return 0.0;
        }
        clusters.iter().map(Cluster::magnitude).sum::<f64>() / clusters.len() as f64
    }

    /// Computes the motion profile of a shot whose first frame has absolute index `start`.
    ///
    /// Shots with fewer than two frames have no pairs and get an empty profile.
    pub fn analyze(&self, frames: &[Frame], start: usize) -> MotionProfile {
        let (width, height) = (self.config.width, self.config.height);
        let mut luma = frames.iter().map(|f| f.luma(width, height));

        let first = match luma.next() {
            Some(first) => first,
            None => return MotionProfile::new(start, Vec::new()),
        };
        let mut background = BackgroundSubtractor::new(self.config.alpha, &first);
        let mut prev = background.foreground(&first);

        let mut scores = Vec::with_capacity(frames.len().saturating_sub(1));
        for frame in luma {
            let curr = background.foreground(&frame);
            scores.push(self.score_pair(&prev, &curr));
            prev = curr;
        }

        MotionProfile::new(start, scores)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const W: u32 = 64;
    const H: u32 = 36;

    fn config() -> MotionConfig {
        MotionConfig {
            width: W,
            height: H,
            ..Default::default()
        }
    }

    // A textured 12x12 square on a black background, moving right by 2 pixels per frame.
    fn moving_square(n: usize) -> Vec<Frame> {
        (0..n)
            .map(|i| {
                let x0 = 8 + 2 * i as u32;
                let img = image::RgbImage::from_fn(W, H, |x, y| {
                    if (x0..x0 + 12).contains(&x) && (12..24).contains(&y) {
                        let (u, v) = (x - x0, y - 12);
                        let p = (60 + (u * u * 7 + v * v * 13 + u * v * 5) % 170) as u8;
                        image::Rgb([p, p, p])
                    } else {
                        image::Rgb([0, 0, 0])
                    }
                });
                Frame::from_rgb(W, H, img.into_raw()).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_moving_square() {
        let analyzer = MotionAnalyzer::new(config());
        let profile = analyzer.analyze(&moving_square(6), 100);
        assert_eq!(profile.len(), 5);
        assert!(profile.mean() > 0.0);
        let (first_pair, _) = profile.iter().next().unwrap();
        assert_eq!(first_pair.to_string(), "100_101");
    }

    #[test]
    fn test_static_shot_has_no_motion() {
        let frames = vec![moving_square(1)[0].clone(); 5];
        let profile = MotionAnalyzer::new(config()).analyze(&frames, 0);
        assert_eq!(profile.len(), 4);
        assert_eq!(profile.mean(), 0.0);
    }

    #[test]
    fn test_short_shot() {
        let analyzer = MotionAnalyzer::new(config());
        assert!(analyzer.analyze(&moving_square(1), 7).is_empty());
        assert!(analyzer.analyze(&[], 7).is_empty());
        assert_eq!(analyzer.analyze(&[], 7).mean(), 0.0);
    }
}
