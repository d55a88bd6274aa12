//! Inference entry point for serving layers
//!
//! [`GenreService::predict_genre`] never fails and never panics: every
//! problem, including a panic inside the numeric backend, is reported as a
//! typed error in the response.

use super::classifier::GenreClassifier;
use crate::error::{ErrorKind, GenreError, Result};
use crate::types::GenrePrediction;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Structured failure returned across the service boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&GenreError> for ServiceError {
    fn from(err: &GenreError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Response of a genre prediction request
///
/// Serializes as `{"genre": .., "confidence": ..}` or `{"error": {"kind": .., "message": ..}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GenreResponse {
    Predicted { genre: String, confidence: f32 },
    Failed { error: ServiceError },
}

impl GenreResponse {
    pub fn is_ok(&self) -> bool {
        matches!(self, GenreResponse::Predicted { .. })
    }

    pub fn error(&self) -> Option<&ServiceError> {
        match self {
            GenreResponse::Failed { error } => Some(error),
            GenreResponse::Predicted { .. } => None,
        }
    }
}

impl From<Result<GenrePrediction>> for GenreResponse {
    fn from(result: Result<GenrePrediction>) -> Self {
        match result {
            Ok(prediction) => GenreResponse::Predicted {
                genre: prediction.genre,
                confidence: prediction.confidence,
            },
            Err(e) => GenreResponse::Failed {
                error: ServiceError::from(&e),
            },
        }
    }
}

/// Genre prediction service with a load-once classifier
///
/// The artifact is loaded on first use (or eagerly via [`GenreService::warm_up`]).
/// Concurrent first requests block on a single load; afterwards all requests
/// share the same classifier. A failed load is not cached, so a later
/// request retries.
#[derive(Debug)]
pub struct GenreService {
    artifact_dir: PathBuf,
    classifier: OnceCell<Arc<GenreClassifier>>,
}

impl GenreService {
    pub fn new(artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            artifact_dir: artifact_dir.into(),
            classifier: OnceCell::new(),
        }
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    /// Shared classifier, loading it on first call
    pub fn classifier(&self) -> Result<Arc<GenreClassifier>> {
        self.classifier
            .get_or_try_init(|| {
                info!("Loading genre model from {}", self.artifact_dir.display());
                GenreClassifier::load(&self.artifact_dir).map(Arc::new)
            })
            .cloned()
    }

    /// Load the classifier now, failing fast on a bad artifact
    pub fn warm_up(&self) -> Result<()> {
        self.classifier().map(|_| ())
    }

    /// Predict the genre of an audio file, propagating errors
    pub fn try_predict(&self, path: &Path) -> Result<GenrePrediction> {
        self.classifier()?.predict_path(path)
    }

    /// Predict the genre of an audio file
    pub fn predict_genre(&self, path: &Path) -> GenreResponse {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.try_predict(path)));
        match outcome {
            Ok(result) => {
                if let Err(ref e) = result {
                    warn!("Prediction failed for {}: {}", path.display(), e);
                }
                GenreResponse::from(result)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("Prediction panicked for {}: {}", path.display(), message);
                GenreResponse::Failed {
                    error: ServiceError {
                        kind: ErrorKind::Internal,
                        message: format!("prediction panicked: {}", message),
                    },
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureConfig;
    use crate::model::artifact;
    use crate::model::{EpochMetrics, GenreCnnConfig, InferenceBackend, LabelCodec, TrainedModel, TrainingConfig};

    fn saved_artifact(dir: &Path) -> PathBuf {
        let model_config = GenreCnnConfig::new(2)
            .with_mel_bands(32)
            .with_time_frames(32)
            .with_hidden_units(8);
        let device = Default::default();
        let trained = TrainedModel {
            model: model_config.init::<InferenceBackend>(&device).unwrap(),
            model_config,
            codec: LabelCodec::fit(["Jazz", "Rock"]),
            history: Vec::<EpochMetrics>::new(),
            train_examples: 2,
            validation_examples: 2,
        };
        let features = FeatureConfig {
            mel_bands: 32,
            time_frames: 32,
            duration_secs: 1.0,
            ..FeatureConfig::default()
        };
        let dest = dir.join("genre");
        artifact::save(&trained, &features, &TrainingConfig::new(), &dest).unwrap();
        dest
    }

    #[test]
    fn test_missing_audio_is_structured_error() {
        let dir = tempfile::tempdir().unwrap();
        let service = GenreService::new(saved_artifact(dir.path()));
        let response = service.predict_genre(Path::new("/no/such/song.mp3"));
        assert!(!response.is_ok());
        assert_eq!(response.error().unwrap().kind, ErrorKind::FileNotFound);
    }

    #[test]
    fn test_missing_artifact_is_structured_error() {
        let dir = tempfile::tempdir().unwrap();
        let service = GenreService::new(dir.path().join("absent"));
        let response = service.predict_genre(Path::new("/no/such/song.mp3"));
        assert_eq!(response.error().unwrap().kind, ErrorKind::ArtifactLoad);
        assert!(service.warm_up().is_err());
    }

    #[test]
    fn test_concurrent_first_requests_share_one_classifier() {
        let dir = tempfile::tempdir().unwrap();
        let service = GenreService::new(saved_artifact(dir.path()));

        let loaded: Vec<Arc<GenreClassifier>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4).map(|_| scope.spawn(|| service.classifier().unwrap())).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(loaded.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_response_json_shape() {
        let ok = GenreResponse::Predicted {
            genre: "Rock".to_string(),
            confidence: 0.5,
        };
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            serde_json::json!({"genre": "Rock", "confidence": 0.5})
        );

        let failed = GenreResponse::from(Err(GenreError::UnknownLabel("Polka".to_string())));
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value["error"]["kind"], "unknown_label");
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload = panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom");
    }
}
