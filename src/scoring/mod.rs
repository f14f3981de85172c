mod assignment;
mod batch;
mod confidence;
mod normalizer;
mod persona;

pub use assignment::SegmentAssignment;
pub use batch::{BatchError, BatchReport, BatchScorer, RowError, ScoredRow};
pub use persona::{
    FeatureField, InsightRule, PersonaCatalog, PersonaDescription, PersonaProfile,
    ThresholdCondition,
};

use crate::model::{CentroidSet, ModelArtifacts, ModelError, NormalizationParams};
use serde::{Deserialize, Serialize};

pub const FEATURE_COUNT: usize = 6;

/// Canonical column names, in fixed order, shared by the log store and the
/// batch tables.
pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] = [
    "Monthly_Revenue",
    "Total_Revenue",
    "Tenure_Months",
    "Avg_Monthly_Usage",
    "Support_Tickets",
    "Last_Active_Days",
];

pub const PREDICTED_CLUSTER_COLUMN: &str = "Predicted_Cluster";
pub const CONFIDENCE_COLUMN: &str = "Confidence";

/// One customer's raw feature values. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    #[serde(rename = "Monthly_Revenue")]
    pub monthly_revenue: f64,
    #[serde(rename = "Total_Revenue")]
    pub total_revenue: f64,
    #[serde(rename = "Tenure_Months")]
    pub tenure_months: u32,
    #[serde(rename = "Avg_Monthly_Usage")]
    pub avg_monthly_usage: f64,
    #[serde(rename = "Support_Tickets")]
    pub support_tickets: u32,
    #[serde(rename = "Last_Active_Days")]
    pub last_active_days: u32,
}

impl FeatureVector {
    /// The example customer shipped with the original application.
    pub fn sample() -> Self {
        Self {
            monthly_revenue: 2350.50,
            total_revenue: 18890.00,
            tenure_months: 26,
            avg_monthly_usage: 15.4,
            support_tickets: 1,
            last_active_days: 10,
        }
    }

    pub fn as_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.monthly_revenue,
            self.total_revenue,
            self.tenure_months as f64,
            self.avg_monthly_usage,
            self.support_tickets as f64,
            self.last_active_days as f64,
        ]
    }

    /// Float fields must be finite and non-negative; integer fields are
    /// non-negative by construction.
    pub fn validate(&self) -> Result<(), ScoringError> {
        let mut fields = Vec::new();
        for (column, value) in [
            (FEATURE_COLUMNS[0], self.monthly_revenue),
            (FEATURE_COLUMNS[1], self.total_revenue),
            (FEATURE_COLUMNS[3], self.avg_monthly_usage),
        ] {
            if !value.is_finite() || value < 0.0 {
                fields.push(column);
            }
        }

        if fields.is_empty() {
            Ok(())
        } else {
            Err(ScoringError::InvalidFeatures { fields })
        }
    }
}

/// Malformed input for a single scoring request. Recoverable; the request
/// is rejected without side effects.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("invalid feature values for {}", fields.join(", "))]
    InvalidFeatures { fields: Vec<&'static str> },
    #[error("assigned segment {segment_id} has no persona entry")]
    UnknownSegment { segment_id: usize },
}

/// Fully-scored single request: assignment, confidence, and persona.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredPrediction {
    pub features: FeatureVector,
    pub assignment: SegmentAssignment,
    pub confidence: f64,
    pub persona: PersonaDescription,
}

impl ScoredPrediction {
    pub fn segment_id(&self) -> usize {
        self.assignment.segment_id
    }

    /// Confidence as persisted and displayed, rounded to 2 decimal places.
    pub fn rounded_confidence(&self) -> f64 {
        (self.confidence * 100.0).round() / 100.0
    }
}

/// Stateless scorer owning the validated model artifacts for the process
/// lifetime. Pure per request; safe to share across requests.
#[derive(Debug)]
pub struct ScoringEngine {
    params: NormalizationParams,
    centroids: CentroidSet,
    catalog: PersonaCatalog,
}

impl ScoringEngine {
    pub fn new(artifacts: ModelArtifacts) -> Result<Self, ModelError> {
        artifacts.params.validate()?;
        artifacts.centroids.validate()?;
        artifacts.catalog.validate_covers(artifacts.centroids.len())?;

        Ok(Self {
            params: artifacts.params,
            centroids: artifacts.centroids,
            catalog: artifacts.catalog,
        })
    }

    pub fn segment_count(&self) -> usize {
        self.centroids.len()
    }

    pub fn score(&self, features: &FeatureVector) -> Result<ScoredPrediction, ScoringError> {
        features.validate()?;

        let normalized = normalizer::normalize(features, &self.params);
        let assignment = assignment::assign(&normalized, &self.centroids);
        let confidence = confidence::score(&assignment);
        let persona = self
            .catalog
            .describe(assignment.segment_id, features)
            .ok_or(ScoringError::UnknownSegment {
                segment_id: assignment.segment_id,
            })?;

        Ok(ScoredPrediction {
            features: features.clone(),
            assignment,
            confidence,
            persona,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_artifacts(centroids: Vec<Vec<f64>>) -> ModelArtifacts {
        ModelArtifacts {
            params: NormalizationParams {
                center: vec![0.0; FEATURE_COUNT],
                scale: vec![1.0; FEATURE_COUNT],
            },
            centroids: CentroidSet { centroids },
            catalog: PersonaCatalog::standard(),
        }
    }

    #[test]
    fn engine_rejects_catalog_gaps() {
        let artifacts = identity_artifacts(vec![vec![0.0; FEATURE_COUNT]; 4]);
        let error = ScoringEngine::new(artifacts).expect_err("four centroids, three personas");
        assert!(matches!(
            error,
            ModelError::MissingPersona { segment_id: 3 }
        ));
    }

    #[test]
    fn negative_float_features_are_named() {
        let mut features = FeatureVector::sample();
        features.monthly_revenue = -1.0;
        features.avg_monthly_usage = f64::NAN;
        let error = features.validate().expect_err("invalid features");
        match error {
            ScoringError::InvalidFeatures { fields } => {
                assert_eq!(fields, vec!["Monthly_Revenue", "Avg_Monthly_Usage"]);
            }
            other => panic!("expected invalid features, got {other:?}"),
        }
    }

    #[test]
    fn score_rejects_invalid_input_before_any_work() {
        let engine = ScoringEngine::new(ModelArtifacts::standard()).expect("engine builds");
        let mut features = FeatureVector::sample();
        features.total_revenue = f64::INFINITY;
        assert!(matches!(
            engine.score(&features),
            Err(ScoringError::InvalidFeatures { .. })
        ));
    }

    #[test]
    fn standard_model_scores_the_sample_customer() {
        let engine = ScoringEngine::new(ModelArtifacts::standard()).expect("engine builds");
        let prediction = engine.score(&FeatureVector::sample()).expect("scores");

        assert!(prediction.segment_id() < engine.segment_count());
        assert!(prediction.confidence >= 0.0 && prediction.confidence <= 100.0);
        assert_eq!(prediction.assignment.distances.len(), 3);
        assert!(!prediction.persona.label.is_empty());
    }

    #[test]
    fn rounded_confidence_keeps_two_decimals() {
        let engine = ScoringEngine::new(ModelArtifacts::standard()).expect("engine builds");
        let prediction = engine.score(&FeatureVector::sample()).expect("scores");
        let rounded = prediction.rounded_confidence();
        assert_eq!(rounded, (rounded * 100.0).round() / 100.0);
        assert!((rounded - prediction.confidence).abs() < 0.005 + f64::EPSILON);
    }
}
