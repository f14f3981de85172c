use super::{FeatureVector, FEATURE_COUNT};
use crate::model::NormalizationParams;

/// Applies the fixed center/scale transform learned at training time.
/// Zero scales are rejected when the params are loaded, so the division
/// here is always defined.
pub(crate) fn normalize(
    features: &FeatureVector,
    params: &NormalizationParams,
) -> [f64; FEATURE_COUNT] {
    let raw = features.as_array();
    let mut normalized = [0.0; FEATURE_COUNT];
    for index in 0..FEATURE_COUNT {
        normalized[index] = (raw[index] - params.center[index]) / params.scale[index];
    }
    normalized
}
