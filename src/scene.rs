extern crate blockhash;

use crate::config::CutConfig;
use crate::store::Frame;

/// Finds shot boundaries in a stream of frames.
///
/// A boundary is the index of the first frame of a new shot. Frames are fed in order, and
/// boundaries must be reported in strictly increasing order.
pub trait CutDetector {
    /// Processes the frame at `index` and returns any boundaries that are now known.
    fn process_frame(&mut self, index: usize, frame: &Frame) -> Vec<usize>;

    /// Returns any remaining boundaries once all `total` frames have been processed.
    fn finish(&mut self, total: usize) -> Vec<usize>;
}

// Wraps an RGB frame to implement [blockhash::Image].
struct FrameView<'a>(&'a Frame);

impl<'a> blockhash::Image for FrameView<'a> {
    #[inline(always)]
    fn dimensions(&self) -> (u32, u32) {
        (self.0.width(), self.0.height())
    }

    #[inline(always)]
    fn get_pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let [r, g, b] = self.0.image().get_pixel(x, y).0;
        [r, g, b, 0xFF]
    }
}

/// Returns the perceptual hash of the given frame.
#[inline(always)]
fn hash_frame(frame: &Frame) -> blockhash::Blockhash144 {
    blockhash::blockhash144(&FrameView(frame))
}

/// Cut detector that compares perceptual hashes of consecutive frames.
///
/// A cut is reported when the Hamming distance between the hashes of two consecutive frames
/// exceeds `threshold`, unless the previous cut was fewer than `min_scene_len` frames ago.
pub struct HashCutDetector {
    threshold: u32,
    min_scene_len: usize,
    last_hash: Option<blockhash::Blockhash144>,
    last_cut: usize,
}

impl Default for HashCutDetector {
    fn default() -> Self {
        Self::new(CutConfig::default())
    }
}

impl HashCutDetector {
    pub fn new(config: CutConfig) -> Self {
        Self {
            threshold: config.threshold,
            min_scene_len: config.min_scene_len,
            last_hash: None,
            last_cut: 0,
        }
    }
}

impl CutDetector for HashCutDetector {
    fn process_frame(&mut self, index: usize, frame: &Frame) -> Vec<usize> {
        let hash = hash_frame(frame);
        let cut = match &self.last_hash {
            Some(last) if index > 0 => {
                let distance = last.distance(&hash);
                tracing::trace!(index, distance, "frame hash distance");
                distance > self.threshold && index - self.last_cut >= self.min_scene_len
            }
            _ => false,
        };
        self.last_hash = Some(hash);

        if cut {
            tracing::debug!(index, "detected cut");
            self.last_cut = index;
            vec![index]
        } else {
            Vec::new()
        }
    }

    fn finish(&mut self, _total: usize) -> Vec<usize> {
        self.last_hash = None;
        self.last_cut = 0;
        Vec::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    // Left half dark/right half bright, or the other way around.
    fn split_frame(bright_left: bool) -> Frame {
        let img = image::RgbImage::from_fn(64, 36, |x, _| {
            if (x < 32) == bright_left {
                image::Rgb([240, 240, 240])
            } else {
                image::Rgb([10, 10, 10])
            }
        });
        Frame::from_rgb(64, 36, img.into_raw()).unwrap()
    }

    fn run(detector: &mut impl CutDetector, frames: &[Frame]) -> Vec<usize> {
        let mut cuts = Vec::new();
        for (i, f) in frames.iter().enumerate() {
            cuts.extend(detector.process_frame(i, f));
        }
        cuts.extend(detector.finish(frames.len()));
        cuts
    }

    #[test]
    fn test_detects_cuts() {
        let mut frames = vec![split_frame(true); 10];
        frames.extend(vec![split_frame(false); 10]);
        frames.extend(vec![split_frame(true); 10]);

        let mut detector = HashCutDetector::default();
        assert_eq!(run(&mut detector, &frames), vec![10, 20]);
    }

    #[test]
    fn test_min_scene_len() {
        let mut frames = vec![split_frame(true); 10];
        frames.extend(vec![split_frame(false); 3]);
        frames.extend(vec![split_frame(true); 10]);

        let mut detector = HashCutDetector::new(CutConfig {
            threshold: 40,
            min_scene_len: 7,
        });
        // The flash back at frame 13 comes too soon after the cut at frame 10.
        assert_eq!(run(&mut detector, &frames), vec![10]);
    }

    #[test]
    fn test_static_video_has_no_cuts() {
        let frames = vec![split_frame(true); 20];
        assert!(run(&mut HashCutDetector::default(), &frames).is_empty());
    }
}
