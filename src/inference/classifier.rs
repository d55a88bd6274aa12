//! Loaded genre classifier

use crate::error::{GenreError, Result};
use crate::features::{self, FeatureConfig, SpectralFeature};
use crate::model::artifact::{self, Manifest};
use crate::model::cnn::{feature_batch, tensor_rows, GenreCnn, InferenceBackend};
use crate::model::trainer::argmax;
use crate::model::LabelCodec;
use crate::types::GenrePrediction;
use burn::tensor::backend::Backend;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// A model/codec pair from one artifact, ready for prediction
///
/// Feature extraction always uses the configuration recorded in the
/// artifact, never a caller-supplied one.
#[derive(Debug)]
pub struct GenreClassifier {
    model: Mutex<GenreCnn<InferenceBackend>>,
    codec: LabelCodec,
    manifest: Manifest,
}

impl GenreClassifier {
    /// Load and verify the artifact in `dir`
    pub fn load(dir: &Path) -> Result<Self> {
        let artifact = artifact::load(dir)?;
        Ok(Self::from_artifact(artifact))
    }

    pub fn from_artifact(artifact: artifact::Artifact) -> Self {
        Self {
            model: Mutex::new(artifact.model),
            codec: artifact.codec,
            manifest: artifact.manifest,
        }
    }

    pub fn codec(&self) -> &LabelCodec {
        &self.codec
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn feature_config(&self) -> &FeatureConfig {
        &self.manifest.features
    }

    /// Extract features from an audio file and predict its genre
    pub fn predict_path(&self, path: &Path) -> Result<GenrePrediction> {
        let feature = features::extract(path, &self.manifest.features)?;
        debug!("Extracted features for {}", path.display());
        self.predict_feature(&feature)
    }

    /// Predict the most likely genre for an already-extracted feature
    pub fn predict_feature(&self, feature: &SpectralFeature) -> Result<GenrePrediction> {
        let probabilities = self.probabilities(feature)?;
        let index = argmax(&probabilities)
            .ok_or_else(|| GenreError::InferenceError("model produced no outputs".to_string()))?;
        Ok(GenrePrediction {
            genre: self.codec.decode(index)?.to_string(),
            confidence: probabilities[index],
        })
    }

    /// Probability for every class, in codec order
    pub fn probabilities(&self, feature: &SpectralFeature) -> Result<Vec<f32>> {
        let [mel_bands, time_frames, _] = self.manifest.features.input_shape();
        let expected = (mel_bands, time_frames);
        if feature.shape() != expected {
            return Err(GenreError::InferenceError(format!(
                "feature shape {:?} does not match the model input {:?}",
                feature.shape(),
                expected
            )));
        }

        // Weights are reference counted, so the clone is cheap and the lock
        // is not held during the forward pass
        let model = self
            .model
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        let device = <InferenceBackend as Backend>::Device::default();
        let batch = feature_batch::<InferenceBackend>(&[feature], &device)?;
        let mut rows = tensor_rows(model.predict(batch))?;
        let probabilities = rows.pop().unwrap_or_default();

        if probabilities.len() != self.codec.len() {
            return Err(GenreError::ArtifactMismatch {
                reason: format!(
                    "model produced {} outputs for a codec with {} classes",
                    probabilities.len(),
                    self.codec.len()
                ),
            });
        }
        Ok(probabilities)
    }
}
