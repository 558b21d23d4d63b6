use crate::audio;
use crate::shot::{ScoredShot, UnscoredShot};

/// Composite interest score of a single shot.
///
/// The score is multiplicative so that a silent or motionless shot always scores zero, no matter
/// how strong its other signal is.
pub fn composite(motion_score: f64, audio_score: f64, presence: bool, presence_bonus: f64) -> f64 {
    let bonus = if presence { presence_bonus } else { 1.0 };
    motion_score * audio_score * bonus
}

/// Scores every analyzed shot of a run.
///
/// Audio scores are first normalized across all of the given shots, which is why this takes the
/// whole set at once.
pub fn score_shots(shots: Vec<UnscoredShot>, presence_bonus: f64) -> Vec<ScoredShot> {
    let span = tracing::span!(tracing::Level::TRACE, "score_shots");
    let _enter = span.enter();

    let raw: Vec<f64> = shots.iter().map(|s| s.raw_audio_score).collect();
    let normalized = audio::normalize(&raw);

    shots
        .into_iter()
        .zip(normalized)
        .map(|(shot, audio_score)| {
            let score = composite(shot.motion_score, audio_score, shot.presence, presence_bonus);
            tracing::debug!(
                num = shot.shot.num,
                motion = shot.motion_score,
                audio = audio_score,
                presence = shot.presence,
                score,
                "scored shot"
            );
            ScoredShot::new(shot, audio_score, score)
        })
        .collect()
}
