use super::FEATURE_COUNT;
use crate::model::CentroidSet;
use serde::Serialize;

/// Nearest-centroid assignment plus the full distance vector the
/// confidence scorer needs. Produced fresh per request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentAssignment {
    pub segment_id: usize,
    pub distances: Vec<f64>,
}

/// Euclidean distance to every centroid; the arg-min wins and ties
/// resolve to the lowest index. The centroid set is validated non-empty
/// at load time.
pub(crate) fn assign(
    normalized: &[f64; FEATURE_COUNT],
    centroids: &CentroidSet,
) -> SegmentAssignment {
    let mut distances = Vec::with_capacity(centroids.len());
    for centroid in &centroids.centroids {
        let squared: f64 = centroid
            .iter()
            .zip(normalized.iter())
            .map(|(coordinate, value)| (value - coordinate) * (value - coordinate))
            .sum();
        distances.push(squared.sqrt());
    }

    let mut segment_id = 0;
    for (index, distance) in distances.iter().enumerate() {
        if *distance < distances[segment_id] {
            segment_id = index;
        }
    }

    SegmentAssignment {
        segment_id,
        distances,
    }
}
