use crate::error::AppError;
use crate::history::{PredictionLog, PredictionRecord};
use crate::scoring::{
    BatchScorer, FeatureVector, PersonaDescription, RowError, ScoringEngine,
};
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared handles the segment endpoints operate on. The engine is pure
/// and lock-free; the log serializes its own appends.
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<ScoringEngine>,
    pub history: Arc<PredictionLog>,
}

/// Router exposing scoring, history, and batch endpoints.
pub fn segment_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/segment/score", post(score_handler))
        .route("/api/v1/segment/history", get(history_handler))
        .route("/api/v1/segment/batch", post(batch_handler))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    #[serde(default)]
    pub features: Option<FeatureVector>,
    /// Explicit request for the built-in example customer.
    #[serde(default)]
    pub sample: bool,
    #[serde(default = "default_log")]
    pub log: bool,
}

fn default_log() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub segment_id: usize,
    pub confidence: f64,
    pub distances: Vec<f64>,
    pub persona: PersonaDescription,
    pub scored_at: DateTime<Utc>,
    pub logged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub csv: String,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub csv: String,
    pub rows_scored: usize,
    pub row_errors: Vec<RowError>,
}

pub(crate) async fn score_handler(
    State(state): State<ApiState>,
    Json(payload): Json<ScoreRequest>,
) -> Result<Json<ScoreResponse>, AppError> {
    let features = if payload.sample {
        FeatureVector::sample()
    } else {
        payload.features.ok_or_else(|| {
            AppError::InvalidArguments(
                "provide a features object or set sample to true".to_string(),
            )
        })?
    };

    let prediction = state.engine.score(&features)?;
    info!(
        segment_id = prediction.segment_id(),
        confidence = prediction.rounded_confidence(),
        "scored customer"
    );

    // A failed append must never hide the prediction from the caller,
    // only mark it as unrecorded.
    let (logged, log_error) = if payload.log {
        match state.history.append(&PredictionRecord::from(&prediction)) {
            Ok(()) => (true, None),
            Err(error) => {
                warn!(%error, "prediction computed but not recorded");
                (false, Some(error.to_string()))
            }
        }
    } else {
        (false, None)
    };

    Ok(Json(ScoreResponse {
        segment_id: prediction.segment_id(),
        confidence: prediction.rounded_confidence(),
        distances: prediction.assignment.distances.clone(),
        persona: prediction.persona,
        scored_at: Utc::now(),
        logged,
        log_error,
    }))
}

pub(crate) async fn history_handler(
    State(state): State<ApiState>,
) -> Result<Json<Vec<PredictionRecord>>, AppError> {
    let records = state.history.read()?;
    Ok(Json(records))
}

pub(crate) async fn batch_handler(
    State(state): State<ApiState>,
    Json(payload): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, AppError> {
    let scorer = BatchScorer::new(&state.engine);
    let report = scorer.from_reader(payload.csv.as_bytes())?;

    info!(
        rows_scored = report.rows.len(),
        row_errors = report.failures.len(),
        "batch scored"
    );

    Ok(Json(BatchResponse {
        csv: report.to_csv_string()?,
        rows_scored: report.rows.len(),
        row_errors: report.failures,
    }))
}
