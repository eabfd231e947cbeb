//! Recency features from sentence gaps.

use crate::config::DistanceFeature;

/// Upper bounds (inclusive) of the recency buckets; gaps past the last bound
/// share the final bucket.
const BUCKET_BOUNDS: [usize; 8] = [0, 1, 2, 3, 4, 7, 15, 31];

/// Map a sentence gap to a scalar recency feature.
///
/// Every shape is monotonically non-decreasing in `gap` and finite for any
/// `usize` input.
#[must_use]
pub fn distance_value(kind: DistanceFeature, gap: usize) -> f32 {
    match kind {
        DistanceFeature::Log => (gap as f64).ln_1p() as f32,
        DistanceFeature::Linear => gap as f32,
        DistanceFeature::Bucketed => bucket(gap) as f32,
    }
}

/// Bucket index for a gap.
#[must_use]
pub fn bucket(gap: usize) -> usize {
    BUCKET_BOUNDS
        .iter()
        .position(|&bound| gap <= bound)
        .unwrap_or(BUCKET_BOUNDS.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_sentence_is_zero() {
        for kind in [
            DistanceFeature::Log,
            DistanceFeature::Linear,
            DistanceFeature::Bucketed,
        ] {
            assert_eq!(distance_value(kind, 0), 0.0);
        }
    }

    #[test]
    fn test_buckets() {
        assert_eq!(bucket(0), 0);
        assert_eq!(bucket(4), 4);
        assert_eq!(bucket(5), 5);
        assert_eq!(bucket(7), 5);
        assert_eq!(bucket(8), 6);
        assert_eq!(bucket(31), 7);
        assert_eq!(bucket(32), 8);
        assert_eq!(bucket(usize::MAX), 8);
    }

    #[test]
    fn test_huge_gap_is_finite() {
        assert!(distance_value(DistanceFeature::Log, usize::MAX).is_finite());
        assert!(distance_value(DistanceFeature::Linear, usize::MAX).is_finite());
    }

    #[test]
    fn test_log_gap_four() {
        let v = distance_value(DistanceFeature::Log, 4);
        assert!((v - 5f32.ln()).abs() < 1e-6);
    }
}
