#[cfg(feature = "rayon")]
extern crate rayon;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::config::EngineConfig;
use crate::motion::MotionAnalyzer;
use crate::presence::{self, NoPresence, PresenceDetector};
use crate::progress::{NoProgress, ProgressSink};
use crate::scene::{CutDetector, HashCutDetector};
use crate::score;
use crate::select::{FrameSelector, Selection};
use crate::shot::{self, ScoredShot, Shot, UnscoredShot};
use crate::store::FrameStore;
use crate::{audio, Error, Result, Warning};

/// Frames between progress reports during cut detection.
const PROGRESS_FRAME_INTERVAL: usize = 1000;

/// Shots between progress reports during analysis.
const PROGRESS_SHOT_INTERVAL: usize = 10;

/// Result of a full engine run.
#[derive(Clone, Debug)]
pub struct Summary {
    /// Every shot of the video, in order.
    pub shots: Vec<ScoredShot>,
    pub selection: Selection,
}

/// Turns a [FrameStore] into a [Selection] of highlights.
///
/// A run goes through four strictly ordered phases:
///
/// 1. Segment the frames into shots, either from known boundaries or with a [CutDetector]
/// 2. Analyze every shot for motion, audio energy and presence (in parallel when enabled)
/// 3. Score all shots; audio scores are normalized across the whole video
/// 4. Greedily select highlights from the best shots until the target duration is covered
///
/// # Example
///
/// ```
/// use shotsum::{Engine, EngineConfig, FrameStore};
/// use shotsum::config::FrameLayout;
///
/// let store = FrameStore::load("frames/", "audio.wav", FrameLayout::default()).unwrap();
/// let engine = Engine::new(EngineConfig::default());
/// let summary = engine.run(&store, None).unwrap();
/// for highlight in &summary.selection.highlights {
///     println!("{}..{}", highlight.start, highlight.end);
/// }
/// ```
pub struct Engine {
    config: EngineConfig,
    motion: MotionAnalyzer,
    selector: FrameSelector,
    presence: Box<dyn PresenceDetector>,
    progress: Box<dyn ProgressSink>,
    cancel: Arc<AtomicBool>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            motion: MotionAnalyzer::new(config.motion.clone()),
            selector: FrameSelector::new(config.selector.clone()),
            config,
            presence: Box::new(NoPresence),
            progress: Box::new(NoProgress),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns a new [Engine] that uses `detector` for the presence signal.
    pub fn with_presence_detector(mut self, detector: impl PresenceDetector + 'static) -> Self {
        self.presence = Box::new(detector);
        self
    }

    /// Returns a new [Engine] that sends progress updates to `sink`.
    pub fn with_progress(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.progress = Box::new(sink);
        self
    }

    /// Returns a new [Engine] that stops when `flag` is set.
    ///
    /// The flag is checked between shots (and between frames during cut detection); a cancelled
    /// run returns [Error::Cancelled].
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    /// Returns the flag that cancels this engine's runs when set.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    /// Runs `detector` over every frame of the store and collects its boundaries.
    pub fn detect_boundaries(
        &self,
        store: &FrameStore,
        detector: &mut dyn CutDetector,
    ) -> Result<Vec<usize>> {
        let span = tracing::span!(tracing::Level::TRACE, "detect_boundaries");
        let _enter = span.enter();

        let total = store.len();
        let mut boundaries = Vec::new();
        for (index, frame) in store.frames().iter().enumerate() {
            self.check_cancelled()?;
            boundaries.extend(detector.process_frame(index, frame));

            let done = index + 1;
            if done % PROGRESS_FRAME_INTERVAL == 0 {
                self.progress.report(
                    &format!(
                        "Detecting and segmenting shots... {}/{} frames evaluated.",
                        done, total
                    ),
                    done as f32 / total as f32,
                );
            }
        }
        boundaries.extend(detector.finish(total));

        Ok(boundaries)
    }

    /// Splits the store into shots.
    ///
    /// If `boundaries` is `None`, they are found with a [HashCutDetector] built from the config.
    pub fn segment(&self, store: &FrameStore, boundaries: Option<&[usize]>) -> Result<Vec<Shot>> {
        let shots = match boundaries {
            Some(boundaries) => shot::segment(store.len(), boundaries)?,
            None => {
                let mut detector = HashCutDetector::new(self.config.cut.clone());
                let boundaries = self.detect_boundaries(store, &mut detector)?;
                shot::segment(store.len(), &boundaries)?
            }
        };
        tracing::info!(num_shots = shots.len(), "segmented {} frames", store.len());
        Ok(shots)
    }

    /// Attaches the motion, audio and presence signals to a single shot.
    pub fn analyze_shot(&self, store: &FrameStore, shot: &Shot) -> UnscoredShot {
        let frames = store.shot_frames(shot);
        let motion = self.motion.analyze(frames, shot.start);
        let raw_audio_score = audio::raw_score(store.audio(), shot, self.config.fps);
        let presence = presence::detect_in_shot(
            self.presence.as_ref(),
            frames,
            self.config.presence.sample_ratio,
            self.config.presence.seed,
            shot.num,
        );

        let analyzed = UnscoredShot::new(*shot, motion, raw_audio_score, presence);
        tracing::debug!(
            num = shot.num,
            start = shot.start,
            end = shot.end,
            motion = analyzed.motion_score(),
            audio = raw_audio_score,
            presence,
            "analyzed shot"
        );
        analyzed
    }

    /// Analyzes every shot. Shots are independent, so they are spread across threads when the
    /// `rayon` feature and the `threading` option are both enabled.
    pub fn analyze(&self, store: &FrameStore, shots: &[Shot]) -> Result<Vec<UnscoredShot>> {
        let span = tracing::span!(tracing::Level::TRACE, "analyze");
        let _enter = span.enter();

        let total = shots.len();
        let done = AtomicUsize::new(0);
        let analyze_one = |shot: &Shot| -> Result<UnscoredShot> {
            self.check_cancelled()?;
            let analyzed = self.analyze_shot(store, shot);

            let done = done.fetch_add(1, Ordering::Relaxed) + 1;
            if done % PROGRESS_SHOT_INTERVAL == 0 {
                self.progress.report(
                    &format!(
                        "Evaluating shots and calculating scores... {}/{} shots evaluated.",
                        done, total
                    ),
                    done as f32 / total as f32,
                );
            }
            Ok(analyzed)
        };

        if cfg!(feature = "rayon") && self.config.threading {
            #[cfg(feature = "rayon")]
            {
                return shots.par_iter().map(&analyze_one).collect();
            }
        }

        shots.iter().map(&analyze_one).collect()
    }

    /// Scores analyzed shots and selects highlights from them.
    ///
    /// This is the cheap half of a run; it can be repeated with different scoring and selection
    /// settings on the same analysis.
    pub fn summarize(&self, analyzed: Vec<UnscoredShot>) -> Summary {
        let total = analyzed.len();
        let shots = score::score_shots(analyzed, self.config.presence.bonus);
        self.progress.report(
            &format!(
                "Evaluating shots and calculating scores... {}/{} shots evaluated.",
                total, total
            ),
            1.0,
        );

        let selection = self.selector.select(&shots, self.config.target_frames());
        tracing::info!(
            highlights = selection.highlights.len(),
            selected_frames = selection.selected_frames,
            target_frames = selection.target_frames,
            "selection completed"
        );

        Summary { shots, selection }
    }

    /// Runs the whole pipeline over `store`.
    ///
    /// Malformed `boundaries` or an invalid config abort the run. Missing frames or audio do not: the run completes
    /// with an empty selection and a [Warning::EmptyInput].
    pub fn run(&self, store: &FrameStore, boundaries: Option<&[usize]>) -> Result<Summary> {
        let span = tracing::span!(tracing::Level::TRACE, "run");
        let _enter = span.enter();

        self.config.validate()?;

        let empty_input = store.is_empty() || store.audio().is_empty();
        if empty_input {
            tracing::warn!(
                frames = store.len(),
                audio_samples = store.audio().samples().len(),
                "empty input"
            );
        }

        let shots = self.segment(store, boundaries)?;
        let analyzed = self.analyze(store, &shots)?;
        let mut summary = self.summarize(analyzed);

        if empty_input {
            summary.selection.warnings.insert(
                0,
                Warning::EmptyInput {
                    frames: store.len(),
                    audio_samples: store.audio().samples().len(),
                },
            );
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use super::*;
    use crate::config::MotionConfig;
    use crate::presence::Region;
    use crate::store::{AudioBuffer, Frame};

    const W: u32 = 64;
    const H: u32 = 36;

    fn config() -> EngineConfig {
        EngineConfig {
            motion: MotionConfig {
                width: W,
                height: H,
                ..Default::default()
            },
            ..Default::default()
        }
        .with_target_seconds(2)
    }

    // A textured square on a black background. `None` draws an empty frame.
    fn square_frame(x0: Option<u32>) -> Frame {
        let img = image::RgbImage::from_fn(W, H, |x, y| match x0 {
            Some(x0) if (x0..x0 + 12).contains(&x) && (12..24).contains(&y) => {
                let (u, v) = (x - x0, y - 12);
                let p = (60 + (u * u * 7 + v * v * 13 + u * v * 5) % 170) as u8;
                image::Rgb([p, p, p])
            }
            _ => image::Rgb([0, 0, 0]),
        });
        Frame::from_rgb(W, H, img.into_raw()).unwrap()
    }

    // 60 static frames, then 60 frames of a moving square, then 10 more moving frames.
    fn store(audio_amplitude: i32) -> FrameStore {
        let mut frames = vec![square_frame(Some(20)); 60];
        frames.extend((0..70).map(|i| square_frame(Some(8 + 2 * (i % 10)))));
        // Mono, 10 samples per frame at 30 fps.
        let audio = AudioBuffer::new(vec![audio_amplitude; 130 * 10], 1, 300, 2);
        FrameStore::new(frames, audio)
    }

    fn always_present(_: &Frame) -> Vec<Region> {
        vec![Region {
            x: 0,
            y: 0,
            width: 1,
            height: 1,
        }]
    }

    #[test]
    fn test_run() {
        let engine = Engine::new(config());
        let summary = engine.run(&store(1000), Some(&[60, 120])).unwrap();

        assert_eq!(summary.shots.len(), 3);
        assert_eq!(summary.shots[0].score(), 0.0);
        assert!(summary.shots[1].score() > 0.0);
        insta::assert_debug_snapshot!(summary.selection.ranges(), @r###"
        [
            (
                60,
                120,
            ),
        ]
        "###);
        assert!(summary.selection.is_complete());
    }

    #[test]
    fn test_threading_does_not_change_result() {
        let store = store(1000);
        let threaded = Engine::new(config().with_threading(true))
            .run(&store, Some(&[60, 120]))
            .unwrap();
        let sequential = Engine::new(config().with_threading(false))
            .run(&store, Some(&[60, 120]))
            .unwrap();
        assert_eq!(threaded.shots, sequential.shots);
        assert_eq!(threaded.selection, sequential.selection);
    }

    #[test]
    fn test_presence_bonus() {
        let store = store(1000);
        let plain = Engine::new(config()).run(&store, Some(&[60, 120])).unwrap();
        let present = Engine::new(config())
            .with_presence_detector(always_present)
            .run(&store, Some(&[60, 120]))
            .unwrap();
        assert!(present.shots[1].presence());
        let ratio = present.shots[1].score() / plain.shots[1].score();
        assert!((ratio - 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_silent_audio() {
        let summary = Engine::new(config())
            .run(&store(0), Some(&[60, 120]))
            .unwrap();
        assert!(summary.selection.highlights.is_empty());
        assert_eq!(
            summary.selection.warnings,
            vec![Warning::InsufficientSelection {
                selected: 0,
                target: 60
            }]
        );
    }

    #[test]
    fn test_empty_input() {
        let summary = Engine::new(config())
            .run(&FrameStore::default(), None)
            .unwrap();
        assert!(summary.shots.is_empty());
        assert!(summary.selection.highlights.is_empty());
        assert_eq!(
            summary.selection.warnings[0],
            Warning::EmptyInput {
                frames: 0,
                audio_samples: 0
            }
        );
    }

    #[test]
    fn test_invalid_boundaries() {
        let result = Engine::new(config()).run(&store(1000), Some(&[60, 500]));
        assert!(matches!(result, Err(Error::InvalidBoundary { index: 1, .. })));
    }

    #[test]
    fn test_cancelled() {
        let engine = Engine::new(config());
        engine.cancel_flag().store(true, Ordering::Relaxed);
        assert!(matches!(
            engine.run(&store(1000), Some(&[60, 120])),
            Err(Error::Cancelled)
        ));
    }

    #[test]
    fn test_progress_reports() {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let reports = Arc::clone(&reports);
            move |message: &str, fraction: f32| {
                reports.lock().unwrap().push((message.to_owned(), fraction));
            }
        };
        let boundaries: Vec<usize> = (1..25).map(|i| i * 5).collect();
        Engine::new(config())
            .with_progress(sink)
            .run(&store(1000), Some(&boundaries))
            .unwrap();

        let reports = reports.lock().unwrap();
        // 25 shots: reports after 10 and 20 shots, plus the final one.
        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|(_, f)| (0.0..=1.0).contains(f)));
        assert_eq!(reports.last().unwrap().1, 1.0);
    }

    #[test]
    fn test_detected_boundaries() {
        // Left half bright, then right half bright.
        let split = |bright_left: bool| {
            let img = image::RgbImage::from_fn(W, H, |x, _| {
                if (x < W / 2) == bright_left {
                    image::Rgb([240, 240, 240])
                } else {
                    image::Rgb([10, 10, 10])
                }
            });
            Frame::from_rgb(W, H, img.into_raw()).unwrap()
        };
        let mut frames = vec![split(true); 20];
        frames.extend(vec![split(false); 20]);
        let store = FrameStore::new(frames, AudioBuffer::new(vec![1; 400], 1, 300, 2));

        let shots = Engine::new(config()).segment(&store, None).unwrap();
        let spans: Vec<_> = shots.iter().map(|s| (s.start, s.end)).collect();
        assert_eq!(spans, vec![(0, 20), (20, 40)]);
    }

    // Never reports a cut; counts the frames it sees and optionally raises a flag at one frame.
    struct CountingDetector {
        seen: usize,
        cancel_at: Option<(usize, Arc<AtomicBool>)>,
    }

    impl CutDetector for CountingDetector {
        fn process_frame(&mut self, index: usize, _frame: &Frame) -> Vec<usize> {
            self.seen += 1;
            if let Some((at, flag)) = &self.cancel_at {
                if index == *at {
                    flag.store(true, Ordering::Relaxed);
                }
            }
            Vec::new()
        }

        fn finish(&mut self, _total: usize) -> Vec<usize> {
            Vec::new()
        }
    }

    fn tiny_store(n: usize) -> FrameStore {
        let frame = Frame::from_rgb(2, 2, vec![0; 12]).unwrap();
        FrameStore::new(vec![frame; n], AudioBuffer::default())
    }

    #[test]
    fn test_cut_detection_progress() {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let reports = Arc::clone(&reports);
            move |_: &str, fraction: f32| reports.lock().unwrap().push(fraction)
        };
        let engine = Engine::new(config()).with_progress(sink);
        let mut detector = CountingDetector {
            seen: 0,
            cancel_at: None,
        };

        let boundaries = engine
            .detect_boundaries(&tiny_store(2500), &mut detector)
            .unwrap();
        assert!(boundaries.is_empty());
        assert_eq!(detector.seen, 2500);
        // One report per 1000 frames.
        assert_eq!(*reports.lock().unwrap(), vec![0.4, 0.8]);
    }

    #[test]
    fn test_cancelled_during_cut_detection() {
        let engine = Engine::new(config());
        let mut detector = CountingDetector {
            seen: 0,
            cancel_at: Some((5, engine.cancel_flag())),
        };

        let result = engine.detect_boundaries(&tiny_store(100), &mut detector);
        assert!(matches!(result, Err(Error::Cancelled)));
        // The flag is seen right before the next frame.
        assert_eq!(detector.seen, 6);
    }

    #[test]
    fn test_invalid_config() {
        let engine = Engine::new(config().with_fps(0));
        assert!(matches!(
            engine.run(&store(1000), Some(&[60, 120])),
            Err(Error::InvalidConfig(_))
        ));
    }
}
