use crate::shot::Shot;
use crate::store::AudioBuffer;

/// Mean absolute amplitude of the audio that plays during `shot`.
///
/// Frames past the end of the audio track contribute nothing; a shot with no audio at all scores
/// 0.
pub fn raw_score(audio: &AudioBuffer, shot: &Shot, fps: u32) -> f64 {
    let samples = audio.frame_slice(shot.start, shot.end, fps);
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|s| (*s as f64).abs()).sum();
    sum / samples.len() as f64
}

/// Divides every score by the L2 norm of all scores, making them comparable across one run.
///
/// If the norm is zero (silent or missing audio), every normalized score is zero.
pub fn normalize(scores: &[f64]) -> Vec<f64> {
    let norm = scores.iter().map(|s| s * s).sum::<f64>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        tracing::debug!("degenerate audio normalization, using zero scores");
        return vec![0.0; scores.len()];
    }
    scores.iter().map(|s| s / norm).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn shot(num: usize, start: usize, end: usize) -> Shot {
        Shot { num, start, end }
    }

    #[test]
    fn test_raw_score() {
        // Mono, 10 samples per frame at 30 fps.
        let samples = (0..40).map(|i| if i < 20 { -4 } else { 8 }).collect();
        let audio = AudioBuffer::new(samples, 1, 300, 2);
        assert_eq!(raw_score(&audio, &shot(0, 0, 2), 30), 4.0);
        assert_eq!(raw_score(&audio, &shot(1, 2, 4), 30), 8.0);
        assert_eq!(raw_score(&audio, &shot(2, 1, 3), 30), 6.0);
        // Past the end of the audio track.
        assert_eq!(raw_score(&audio, &shot(3, 4, 9), 30), 0.0);
    }

    #[test]
    fn test_normalize_unit_norm() {
        for scores in [vec![3.0, 4.0], vec![1.0, 1.0, 1.0, 1.0], vec![0.0, 0.5, 12.0]] {
            let normalized = normalize(&scores);
            let sum: f64 = normalized.iter().map(|s| s * s).sum();
            assert!((sum - 1.0).abs() < 1e-9);
        }
        assert_eq!(normalize(&[3.0, 4.0]), vec![0.6, 0.8]);
    }

    #[test]
    fn test_normalize_degenerate() {
        assert_eq!(normalize(&[0.0, 0.0, 0.0]), vec![0.0; 3]);
        assert!(normalize(&[]).is_empty());
    }
}
