use crate::scoring::{FeatureVector, ScoredPrediction, FEATURE_COLUMNS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Column set of the log store, in fixed order. Any divergence in an
/// existing store is a schema mismatch, never silently merged.
pub const LOG_COLUMNS: [&str; 8] = [
    FEATURE_COLUMNS[0],
    FEATURE_COLUMNS[1],
    FEATURE_COLUMNS[2],
    FEATURE_COLUMNS[3],
    FEATURE_COLUMNS[4],
    FEATURE_COLUMNS[5],
    "Predicted_Cluster",
    "Confidence",
];

/// One scored request as persisted: the raw inputs plus the outputs.
/// Never mutated or deleted once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
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
    #[serde(rename = "Predicted_Cluster")]
    pub predicted_cluster: usize,
    #[serde(rename = "Confidence")]
    pub confidence: f64,
}

impl PredictionRecord {
    pub fn new(features: &FeatureVector, predicted_cluster: usize, confidence: f64) -> Self {
        Self {
            monthly_revenue: features.monthly_revenue,
            total_revenue: features.total_revenue,
            tenure_months: features.tenure_months,
            avg_monthly_usage: features.avg_monthly_usage,
            support_tickets: features.support_tickets,
            last_active_days: features.last_active_days,
            predicted_cluster,
            confidence: (confidence * 100.0).round() / 100.0,
        }
    }
}

impl From<&ScoredPrediction> for PredictionRecord {
    fn from(prediction: &ScoredPrediction) -> Self {
        Self::new(
            &prediction.features,
            prediction.segment_id(),
            prediction.confidence,
        )
    }
}

/// Log store failures. A missing store is not an error; a corrupt or
/// unwritable one is.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("prediction log {path} is unreadable or unwritable: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("prediction log {path} is corrupt: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("prediction log {path} has columns [{}], expected [{}]", found.join(", "), expected.join(", "))]
    SchemaMismatch {
        path: PathBuf,
        found: Vec<String>,
        expected: Vec<&'static str>,
    },
}

/// Append-only CSV store of every scored request. The read-append-rewrite
/// sequence is a lost-update race under concurrency, so the whole append
/// runs inside one exclusive critical section, and the rewrite goes to a
/// temporary file renamed over the store so a failure mid-write cannot
/// truncate existing history.
pub struct PredictionLog {
    path: PathBuf,
    guard: Mutex<()>,
}

impl PredictionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durably appends one record, creating the store if absent.
    pub fn append(&self, record: &PredictionRecord) -> Result<(), HistoryError> {
        let _lock = self.guard.lock().unwrap_or_else(PoisonError::into_inner);

        if self.path.exists() {
            let mut records = self.read_records()?;
            records.push(record.clone());
            self.rewrite(&records)
        } else {
            self.rewrite(std::slice::from_ref(record))
        }
    }

    /// All records in append order. An absent store reads as empty.
    pub fn read(&self) -> Result<Vec<PredictionRecord>, HistoryError> {
        let _lock = self.guard.lock().unwrap_or_else(PoisonError::into_inner);

        if !self.path.exists() {
            return Ok(Vec::new());
        }
        self.read_records()
    }

    fn read_records(&self) -> Result<Vec<PredictionRecord>, HistoryError> {
        let file = std::fs::File::open(&self.path).map_err(|source| HistoryError::Io {
            path: self.path.clone(),
            source,
        })?;
        let mut reader = csv::Reader::from_reader(file);

        let headers = reader.headers().map_err(|source| HistoryError::Malformed {
            path: self.path.clone(),
            source,
        })?;
        if headers.len() != LOG_COLUMNS.len()
            || headers.iter().zip(LOG_COLUMNS.iter()).any(|(h, c)| h != *c)
        {
            return Err(HistoryError::SchemaMismatch {
                path: self.path.clone(),
                found: headers.iter().map(str::to_string).collect(),
                expected: LOG_COLUMNS.to_vec(),
            });
        }

        let mut records = Vec::new();
        for row in reader.deserialize::<PredictionRecord>() {
            records.push(row.map_err(|source| HistoryError::Malformed {
                path: self.path.clone(),
                source,
            })?);
        }
        Ok(records)
    }

    fn rewrite(&self, records: &[PredictionRecord]) -> Result<(), HistoryError> {
        let temp_path = self.path.with_extension("csv.tmp");

        {
            let mut writer =
                csv::Writer::from_path(&temp_path).map_err(|source| self.write_error(source))?;
            for record in records {
                writer
                    .serialize(record)
                    .map_err(|source| self.write_error(source))?;
            }
            writer.flush().map_err(|source| HistoryError::Io {
                path: self.path.clone(),
                source,
            })?;
        }

        std::fs::rename(&temp_path, &self.path).map_err(|source| HistoryError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn write_error(&self, source: csv::Error) -> HistoryError {
        HistoryError::Io {
            path: self.path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::Other, source),
        }
    }
}
