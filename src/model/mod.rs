use crate::config::ModelConfig;
use crate::scoring::{PersonaCatalog, FEATURE_COLUMNS, FEATURE_COUNT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Per-feature center/scale pairs produced by the training subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParams {
    pub center: Vec<f64>,
    pub scale: Vec<f64>,
}

impl NormalizationParams {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.center.len() != FEATURE_COUNT {
            return Err(ModelError::WrongArity {
                what: "scaler center",
                expected: FEATURE_COUNT,
                found: self.center.len(),
            });
        }
        if self.scale.len() != FEATURE_COUNT {
            return Err(ModelError::WrongArity {
                what: "scaler scale",
                expected: FEATURE_COUNT,
                found: self.scale.len(),
            });
        }

        for (index, value) in self.center.iter().chain(self.scale.iter()).enumerate() {
            if !value.is_finite() {
                return Err(ModelError::NonFiniteValue {
                    what: "scaler",
                    field: FEATURE_COLUMNS[index % FEATURE_COUNT],
                });
            }
        }

        for (index, scale) in self.scale.iter().enumerate() {
            if *scale == 0.0 {
                return Err(ModelError::DegenerateScale {
                    field: FEATURE_COLUMNS[index],
                });
            }
        }

        Ok(())
    }
}

/// Ordered list of K centroids in normalized feature space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidSet {
    pub centroids: Vec<Vec<f64>>,
}

impl CentroidSet {
    pub fn len(&self) -> usize {
        self.centroids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.centroids.is_empty() {
            return Err(ModelError::EmptyCentroidSet);
        }

        for (index, centroid) in self.centroids.iter().enumerate() {
            if centroid.len() != FEATURE_COUNT {
                return Err(ModelError::CentroidArity {
                    index,
                    expected: FEATURE_COUNT,
                    found: centroid.len(),
                });
            }
            if centroid.iter().any(|value| !value.is_finite()) {
                return Err(ModelError::NonFiniteCentroid { index });
            }
        }

        Ok(())
    }
}

/// The trio of read-only artifacts the engine scores against.
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    pub params: NormalizationParams,
    pub centroids: CentroidSet,
    pub catalog: PersonaCatalog,
}

impl ModelArtifacts {
    /// Built-in model matching the observed three-segment configuration, so
    /// the CLI and server work without external artifact files.
    pub fn standard() -> Self {
        Self {
            params: NormalizationParams {
                center: vec![1800.0, 14000.0, 18.0, 12.5, 2.0, 21.0],
                scale: vec![950.0, 9500.0, 11.0, 6.8, 2.5, 17.0],
            },
            centroids: CentroidSet {
                centroids: vec![
                    vec![1.1, 1.2, 0.9, 0.8, -0.3, -0.7],
                    vec![0.2, 0.4, 0.1, -0.6, 1.0, 1.3],
                    vec![-0.9, -0.8, -0.6, -0.5, -0.2, 0.1],
                ],
            },
            catalog: PersonaCatalog::standard(),
        }
    }

    /// Loads artifacts from the configured paths, falling back to the
    /// standard model for any path left unset. All parts are validated;
    /// a degenerate model aborts startup rather than serving requests.
    pub fn load(config: &ModelConfig) -> Result<Self, ModelError> {
        let standard = Self::standard();

        let params = match &config.scaler_path {
            Some(path) => load_json::<NormalizationParams>(path)?,
            None => standard.params,
        };
        let centroids = match &config.centroids_path {
            Some(path) => load_json::<CentroidSet>(path)?,
            None => standard.centroids,
        };
        let catalog = match &config.catalog_path {
            Some(path) => load_json::<PersonaCatalog>(path)?,
            None => standard.catalog,
        };

        params.validate()?;
        centroids.validate()?;
        catalog.validate_covers(centroids.len())?;

        Ok(Self {
            params,
            centroids,
            catalog,
        })
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, ModelError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ModelError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Malformed or degenerate model artifacts. Fatal at load time.
#[derive(Debug)]
pub enum ModelError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    WrongArity {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    NonFiniteValue {
        what: &'static str,
        field: &'static str,
    },
    DegenerateScale {
        field: &'static str,
    },
    EmptyCentroidSet,
    CentroidArity {
        index: usize,
        expected: usize,
        found: usize,
    },
    NonFiniteCentroid {
        index: usize,
    },
    MissingPersona {
        segment_id: usize,
    },
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::Io { path, source } => {
                write!(f, "failed to read model artifact {}: {}", path.display(), source)
            }
            ModelError::Parse { path, source } => {
                write!(f, "invalid model artifact {}: {}", path.display(), source)
            }
            ModelError::WrongArity {
                what,
                expected,
                found,
            } => write!(f, "{what} must have {expected} entries, found {found}"),
            ModelError::NonFiniteValue { what, field } => {
                write!(f, "{what} entry for {field} is not a finite number")
            }
            ModelError::DegenerateScale { field } => {
                write!(f, "scaler scale for {field} is zero; training data was degenerate")
            }
            ModelError::EmptyCentroidSet => write!(f, "centroid set is empty"),
            ModelError::CentroidArity {
                index,
                expected,
                found,
            } => write!(
                f,
                "centroid {index} must have {expected} coordinates, found {found}"
            ),
            ModelError::NonFiniteCentroid { index } => {
                write!(f, "centroid {index} contains a non-finite coordinate")
            }
            ModelError::MissingPersona { segment_id } => {
                write!(f, "persona catalog has no entry for segment {segment_id}")
            }
        }
    }
}

impl std::error::Error for ModelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ModelError::Io { source, .. } => Some(source),
            ModelError::Parse { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn standard_model_validates() {
        let artifacts = ModelArtifacts::standard();
        artifacts.params.validate().expect("scaler valid");
        artifacts.centroids.validate().expect("centroids valid");
        artifacts
            .catalog
            .validate_covers(artifacts.centroids.len())
            .expect("catalog covers all segments");
    }

    #[test]
    fn zero_scale_is_rejected() {
        let params = NormalizationParams {
            center: vec![0.0; FEATURE_COUNT],
            scale: vec![1.0, 1.0, 0.0, 1.0, 1.0, 1.0],
        };
        let error = params.validate().expect_err("zero scale must fail");
        match error {
            ModelError::DegenerateScale { field } => assert_eq!(field, "Tenure_Months"),
            other => panic!("expected degenerate scale, got {other:?}"),
        }
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let params = NormalizationParams {
            center: vec![0.0; 4],
            scale: vec![1.0; FEATURE_COUNT],
        };
        assert!(matches!(
            params.validate(),
            Err(ModelError::WrongArity { found: 4, .. })
        ));
    }

    #[test]
    fn empty_centroid_set_is_rejected() {
        let centroids = CentroidSet {
            centroids: Vec::new(),
        };
        assert!(matches!(
            centroids.validate(),
            Err(ModelError::EmptyCentroidSet)
        ));
    }

    #[test]
    fn ragged_centroid_is_rejected() {
        let centroids = CentroidSet {
            centroids: vec![vec![0.0; FEATURE_COUNT], vec![0.0; 3]],
        };
        assert!(matches!(
            centroids.validate(),
            Err(ModelError::CentroidArity { index: 1, .. })
        ));
    }

    #[test]
    fn load_reads_artifact_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let centroids_path = dir.path().join("centroids.json");
        let mut file = std::fs::File::create(&centroids_path).expect("create file");
        write!(
            file,
            "{}",
            serde_json::json!({ "centroids": [[0.0, 0.0, 0.0, 0.0, 0.0, 0.0]] })
        )
        .expect("write centroids");

        let config = ModelConfig {
            centroids_path: Some(centroids_path),
            ..ModelConfig::default()
        };
        let artifacts = ModelArtifacts::load(&config).expect("artifacts load");
        assert_eq!(artifacts.centroids.len(), 1);
        // Standard catalog still covers segment 0.
        assert_eq!(artifacts.params, ModelArtifacts::standard().params);
    }

    #[test]
    fn load_surfaces_missing_files() {
        let config = ModelConfig {
            scaler_path: Some(PathBuf::from("./does-not-exist.json")),
            ..ModelConfig::default()
        };
        assert!(matches!(
            ModelArtifacts::load(&config),
            Err(ModelError::Io { .. })
        ));
    }
}
