use super::SegmentAssignment;

/// Confidence in the chosen segment: the share of total centroid distance
/// NOT taken up by the winner, as a percentage. A zero distance sum means
/// the vector coincides with every centroid (K = 1 or duplicated
/// centroids); that case is defined as full confidence instead of a
/// division by zero. Clamped to [0, 100].
pub(crate) fn score(assignment: &SegmentAssignment) -> f64 {
    let total: f64 = assignment.distances.iter().sum();
    if total == 0.0 {
        return 100.0;
    }

    let raw = (1.0 - assignment.distances[assignment.segment_id] / total) * 100.0;
    raw.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(segment_id: usize, distances: Vec<f64>) -> SegmentAssignment {
        SegmentAssignment {
            segment_id,
            distances,
        }
    }

    #[test]
    fn matches_the_share_formula_exactly() {
        let value = score(&assignment(0, vec![1.0, 3.0]));
        assert_eq!(value, (1.0 - 1.0 / 4.0) * 100.0);
    }

    #[test]
    fn exact_centroid_hit_scores_one_hundred() {
        let value = score(&assignment(1, vec![5.0, 0.0, 2.0]));
        assert_eq!(value, 100.0);
    }

    #[test]
    fn coincident_centroids_default_to_full_confidence() {
        assert_eq!(score(&assignment(0, vec![0.0])), 100.0);
        assert_eq!(score(&assignment(0, vec![0.0, 0.0, 0.0])), 100.0);
    }

    #[test]
    fn single_centroid_at_distance_scores_zero() {
        // K = 1 with a non-zero distance: the winner takes the whole sum.
        assert_eq!(score(&assignment(0, vec![7.5])), 0.0);
    }

    #[test]
    fn stays_within_bounds_for_distinct_centroids() {
        for distances in [
            vec![0.1, 0.2, 0.3],
            vec![10.0, 10.0, 10.0],
            vec![1e-9, 1.0, 2.0],
        ] {
            let value = score(&assignment(0, distances));
            assert!((0.0..=100.0).contains(&value));
        }
    }
}
