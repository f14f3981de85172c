use super::FeatureVector;
use crate::model::ModelError;
use serde::{Deserialize, Serialize};

/// Base persona for one segment: label, retention recommendation, and the
/// color tag the presentation layer renders with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaProfile {
    pub segment_id: usize,
    pub label: String,
    pub recommendation: String,
    pub color_tag: String,
}

/// Feature a rule reads. Keeps insight rules data, not code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureField {
    MonthlyRevenue,
    TotalRevenue,
    TenureMonths,
    AvgMonthlyUsage,
    SupportTickets,
    LastActiveDays,
}

impl FeatureField {
    pub fn value(&self, features: &FeatureVector) -> f64 {
        match self {
            FeatureField::MonthlyRevenue => features.monthly_revenue,
            FeatureField::TotalRevenue => features.total_revenue,
            FeatureField::TenureMonths => features.tenure_months as f64,
            FeatureField::AvgMonthlyUsage => features.avg_monthly_usage,
            FeatureField::SupportTickets => features.support_tickets as f64,
            FeatureField::LastActiveDays => features.last_active_days as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdCondition {
    Above,
    Below,
}

/// Conditional micro-insight layered on top of the base persona. Rules are
/// evaluated independently of each other; thresholds are configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightRule {
    pub segment_id: usize,
    pub field: FeatureField,
    pub condition: ThresholdCondition,
    pub threshold: f64,
    pub message: String,
}

impl InsightRule {
    fn matches(&self, segment_id: usize, features: &FeatureVector) -> bool {
        if self.segment_id != segment_id {
            return false;
        }

        let value = self.field.value(features);
        match self.condition {
            ThresholdCondition::Above => value > self.threshold,
            ThresholdCondition::Below => value < self.threshold,
        }
    }
}

/// What the caller renders for one scored request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonaDescription {
    pub label: String,
    pub recommendation: String,
    pub color_tag: String,
    pub insights: Vec<String>,
}

/// Data-driven mapping from segment id to persona plus the insight rules.
/// Adding a segment is a catalog change, never a code change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaCatalog {
    pub personas: Vec<PersonaProfile>,
    #[serde(default)]
    pub insight_rules: Vec<InsightRule>,
}

impl PersonaCatalog {
    /// The three personas observed in production, with their retention
    /// strategies and insight thresholds.
    pub fn standard() -> Self {
        Self {
            personas: vec![
                PersonaProfile {
                    segment_id: 0,
                    label: "Loyal Premium Customer".to_string(),
                    recommendation:
                        "Offer loyalty rewards, personalized premium benefits & upsell."
                            .to_string(),
                    color_tag: "#2ecc71".to_string(),
                },
                PersonaProfile {
                    segment_id: 1,
                    label: "High Churn Risk Customer".to_string(),
                    recommendation: "Provide discounts, priority support & retention call."
                        .to_string(),
                    color_tag: "#f1c40f".to_string(),
                },
                PersonaProfile {
                    segment_id: 2,
                    label: "Low Usage / Low Value Customer".to_string(),
                    recommendation:
                        "Educate via onboarding tutorials & increase product awareness."
                            .to_string(),
                    color_tag: "#e74c3c".to_string(),
                },
            ],
            insight_rules: vec![
                InsightRule {
                    segment_id: 0,
                    field: FeatureField::SupportTickets,
                    condition: ThresholdCondition::Above,
                    threshold: 3.0,
                    message: "High-value but frustrated customer, fix support urgently."
                        .to_string(),
                },
                InsightRule {
                    segment_id: 1,
                    field: FeatureField::TotalRevenue,
                    condition: ThresholdCondition::Above,
                    threshold: 15000.0,
                    message: "Recoverable churn risk, valuable customer worth retaining."
                        .to_string(),
                },
                InsightRule {
                    segment_id: 2,
                    field: FeatureField::TenureMonths,
                    condition: ThresholdCondition::Below,
                    threshold: 6.0,
                    message: "Onboarding gap, new customer may not understand the product yet."
                        .to_string(),
                },
            ],
        }
    }

    /// The catalog must name every segment the centroid set can produce.
    pub fn validate_covers(&self, segment_count: usize) -> Result<(), ModelError> {
        for segment_id in 0..segment_count {
            if !self
                .personas
                .iter()
                .any(|persona| persona.segment_id == segment_id)
            {
                return Err(ModelError::MissingPersona { segment_id });
            }
        }
        Ok(())
    }

    pub(crate) fn describe(
        &self,
        segment_id: usize,
        features: &FeatureVector,
    ) -> Option<PersonaDescription> {
        let persona = self
            .personas
            .iter()
            .find(|persona| persona.segment_id == segment_id)?;

        let insights = self
            .insight_rules
            .iter()
            .filter(|rule| rule.matches(segment_id, features))
            .map(|rule| rule.message.clone())
            .collect();

        Some(PersonaDescription {
            label: persona.label.clone(),
            recommendation: persona.recommendation.clone(),
            color_tag: persona.color_tag.clone(),
            insights,
        })
    }
}
