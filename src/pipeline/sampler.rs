use crate::models::Screenshot;

pub const DEFAULT_SAMPLE_TARGET: usize = 15;

/// Thin a capture window by keeping every `n / target`-th screenshot.
///
/// Output is strictly ascending by capture time and always starts with the
/// earliest capture. Batches smaller than twice `target` keep every frame, so
/// the result can hold up to `2 * target - 1` screenshots.
pub fn sample_screenshots(mut screenshots: Vec<Screenshot>, target: usize) -> Vec<Screenshot> {
    screenshots.sort_by_key(|shot| shot.captured_at);
    screenshots.dedup_by_key(|shot| shot.captured_at);

    let stride = (screenshots.len() / target.max(1)).max(1);
    screenshots.into_iter().step_by(stride).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shots(times: &[i64]) -> Vec<Screenshot> {
        times
            .iter()
            .map(|&t| Screenshot::new(t, format!("/captures/{t}.jpg")))
            .collect()
    }

    fn times(sampled: &[Screenshot]) -> Vec<i64> {
        sampled.iter().map(|s| s.captured_at).collect()
    }

    #[test]
    fn small_batch_keeps_every_frame_sorted() {
        let sampled = sample_screenshots(shots(&[30, 10, 20]), DEFAULT_SAMPLE_TARGET);
        assert_eq!(times(&sampled), vec![10, 20, 30]);
    }

    #[test]
    fn large_batch_uses_floor_stride() {
        let input: Vec<i64> = (0..200).map(|i| 1_000 + i * 10).rev().collect();
        let sampled = sample_screenshots(shots(&input), 15);

        // Stride 200 / 15 = 13.
        assert_eq!(sampled.len(), 16);
        assert_eq!(times(&sampled)[..2], [1_000, 1_130]);
        assert!(times(&sampled).windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn twenty_frames_against_fifteen_keeps_every_frame() {
        let input: Vec<i64> = (0..20).map(|i| i * 30).collect();
        let sampled = sample_screenshots(shots(&input), 15);
        assert_eq!(times(&sampled), input);
    }

    #[test]
    fn thirty_frames_against_fifteen_uses_stride_two() {
        let input: Vec<i64> = (0..30).map(|i| i * 30).collect();
        let sampled = sample_screenshots(shots(&input), 15);
        assert_eq!(sampled.len(), 15);
        assert_eq!(times(&sampled)[..3], [0, 60, 120]);
    }

    #[test]
    fn duplicate_timestamps_collapse() {
        let sampled = sample_screenshots(shots(&[5, 5, 6]), 15);
        assert_eq!(times(&sampled), vec![5, 6]);
    }

    #[test]
    fn empty_and_zero_target_are_safe() {
        assert!(sample_screenshots(Vec::new(), 15).is_empty());
        let sampled = sample_screenshots(shots(&[3, 1, 2]), 0);
        assert_eq!(times(&sampled), vec![1]);
    }

    #[test]
    fn properties_hold_across_sizes_and_targets() {
        for n in 0..60usize {
            for target in 1..20usize {
                // Interleave so input is unsorted.
                let input: Vec<i64> = (0..n as i64).map(|i| (i * 7919) % 104_729).collect();
                let earliest = input.iter().min().copied();
                let sampled = sample_screenshots(shots(&input), target);

                assert!(sampled.len() <= n);
                assert!(sampled.len() < 2 * target);
                assert!(times(&sampled).windows(2).all(|w| w[0] < w[1]));
                assert_eq!(sampled.first().map(|s| s.captured_at), earliest);
            }
        }
    }
}
