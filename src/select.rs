use serde::{Deserialize, Serialize};

use crate::config::SelectorConfig;
use crate::shot::ScoredShot;
use crate::Warning;

/// A selected range of frames, `end` exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
pub struct Highlight {
    pub start: usize,
    pub end: usize,
}

impl Highlight {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// The outcome of frame selection: highlights in presentation order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Selection {
    pub highlights: Vec<Highlight>,
    /// Total number of selected frames.
    pub selected_frames: usize,
    /// Number of frames the selection was supposed to reach.
    pub target_frames: usize,
    pub warnings: Vec<Warning>,
}

impl Selection {
    /// Returns `true` if the selection reached its target without any warnings.
    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty()
    }

    /// The highlights as plain `(start, end)` pairs.
    pub fn ranges(&self) -> Vec<(usize, usize)> {
        self.highlights.iter().map(|h| (h.start, h.end)).collect()
    }
}

/// Picks highlights out of a set of scored shots.
#[derive(Clone, Debug, Default)]
pub struct FrameSelector {
    config: SelectorConfig,
}

impl FrameSelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    /// Finds the most interesting window of a shot, if the shot is worth including at all.
    ///
    /// Zero-scored shots and shots shorter than the minimum highlight length are skipped. Shots no
    /// longer than the maximum single highlight are used whole. Longer shots are trimmed by
    /// collecting their highest-motion frame pairs, in order of decreasing score, until the
    /// collected frames span the span cap or the pair scores drop to the absorb fraction of the
    /// shot score.
    ///
    /// The collected frames `[min, max]` include both ends, so a trimmed window is returned as
    /// `(min, max + 1)` to keep the exclusive end used for whole shots. It covers one frame more
    /// than an inclusive `(min, max)` pair would suggest.
    pub fn highlight_window(&self, shot: &ScoredShot) -> Option<Highlight> {
        let s = shot.shot();
        let len = s.len();

        if shot.score() == 0.0 {
            return None;
        }
        if len < self.config.min_highlight_len {
            tracing::trace!(num = s.num, len, "skipping short shot");
            return None;
        }
        if len <= self.config.max_single_highlight {
            return Some(Highlight {
                start: s.start,
                end: s.end,
            });
        }

        let mut pairs: Vec<_> = shot.motion().iter().collect();
        // Stable sort: equal scores keep their frame order.
        pairs.sort_by(|a, b| b.1.total_cmp(&a.1));

        let cutoff = self.config.absorb_fraction * shot.score();
        let mut bounds: Option<(usize, usize)> = None;
        for (pair, score) in pairs {
            if let Some((lo, hi)) = bounds {
                if hi - lo >= self.config.highlight_span_cap {
                    break;
                }
            }
            if score <= cutoff {
                break;
            }
            bounds = Some(match bounds {
                None => (pair.prev, pair.curr),
                Some((lo, hi)) => (lo.min(pair.prev), hi.max(pair.curr)),
            });
        }

        bounds.map(|(lo, hi)| Highlight {
            start: lo,
            end: hi + 1,
        })
    }

    /// Greedily selects highlights from the best shots until `target_frames` are covered.
    ///
    /// Shots are visited in order of decreasing score (ties go to the earlier shot). The result
    /// is sorted by position. If the target is never reached, the partial selection is returned
    /// with an [Warning::InsufficientSelection].
    pub fn select(&self, shots: &[ScoredShot], target_frames: usize) -> Selection {
        let span = tracing::span!(tracing::Level::TRACE, "select");
        let _enter = span.enter();

        let mut ranked: Vec<&ScoredShot> = shots.iter().collect();
        ranked.sort_by(|a, b| {
            b.score()
                .total_cmp(&a.score())
                .then(a.shot().num.cmp(&b.shot().num))
        });

        let mut highlights = Vec::new();
        let mut selected_frames = 0;
        for shot in ranked {
            if selected_frames >= target_frames {
                break;
            }
            if let Some(highlight) = self.highlight_window(shot) {
                tracing::debug!(
                    num = shot.shot().num,
                    start = highlight.start,
                    end = highlight.end,
                    score = shot.score(),
                    "selected highlight"
                );
                selected_frames += highlight.len();
                highlights.push(highlight);
            }
        }
        highlights.sort();

        let mut warnings = Vec::new();
        if selected_frames < target_frames {
            tracing::warn!(
                selected_frames,
                target_frames,
                "selection is shorter than requested"
            );
            warnings.push(Warning::InsufficientSelection {
                selected: selected_frames,
                target: target_frames,
            });
        }

        Selection {
            highlights,
            selected_frames,
            target_frames,
            warnings,
        }
    }
}
