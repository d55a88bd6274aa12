//! Classifier training loop
//!
//! Fits the label codec over the whole dataset, splits it stratified by
//! class, then runs a fixed number of Adam epochs on the training side,
//! evaluating on the validation side after each one. The weights after the
//! final epoch are kept; there is no best-epoch selection.

use super::cnn::{feature_batch, tensor_rows, GenreCnn, GenreCnnConfig, InferenceBackend, TrainingBackend};
use super::codec::LabelCodec;
use super::split::stratified_split;
use crate::dataset::Dataset;
use crate::error::{GenreError, Result};
use crate::features::SpectralFeature;
use burn::config::Config;
use burn::module::AutodiffModule;
use burn::nn::loss::CrossEntropyLossConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

const ADAM_EPSILON: f32 = 1e-7;

#[derive(Config, Debug)]
pub struct TrainingConfig {
    #[config(default = 20)]
    pub epochs: usize,
    #[config(default = 64)]
    pub batch_size: usize,
    #[config(default = 1.0e-3)]
    pub learning_rate: f64,
    #[config(default = 0.2)]
    pub validation_fraction: f64,
    /// Seeds weight init, the split and batch shuffling
    #[config(default = 42)]
    pub seed: u64,
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 || self.batch_size == 0 {
            return Err(GenreError::ConfigError(
                "epochs and batch size must be positive".to_string(),
            ));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(GenreError::ConfigError(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

/// Loss and accuracy after one epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// 1-based epoch number
    pub epoch: usize,
    pub train_loss: f32,
    pub train_accuracy: f32,
    pub validation_loss: f32,
    pub validation_accuracy: f32,
}

/// Outcome of a training run: a model and the codec that interprets it
#[derive(Debug)]
pub struct TrainedModel {
    pub model: GenreCnn<InferenceBackend>,
    pub model_config: GenreCnnConfig,
    pub codec: LabelCodec,
    pub history: Vec<EpochMetrics>,
    pub train_examples: usize,
    pub validation_examples: usize,
}

/// Train a classifier on `dataset`
pub fn train(dataset: &Dataset, config: &TrainingConfig) -> Result<TrainedModel> {
    config.validate()?;
    if dataset.is_empty() {
        return Err(GenreError::TrainingError("dataset is empty".to_string()));
    }

    let codec = LabelCodec::fit(dataset.labels());
    let targets: Vec<usize> = dataset
        .labels()
        .map(|label| codec.encode(label))
        .collect::<Result<_>>()?;
    info!("Fitted label codec with {} classes: {}", codec.len(), codec.classes().join(", "));

    let split = stratified_split(&targets, config.validation_fraction, config.seed)?;
    info!(
        "Split {} examples into {} train / {} validation",
        dataset.len(),
        split.train.len(),
        split.validation.len()
    );

    let features: Vec<&SpectralFeature> = dataset.examples().iter().map(|e| &e.feature).collect();
    let (mel_bands, time_frames) = features[0].shape();
    let model_config = GenreCnnConfig::new(codec.len())
        .with_mel_bands(mel_bands)
        .with_time_frames(time_frames);

    let device = <TrainingBackend as Backend>::Device::default();
    TrainingBackend::seed(config.seed);
    let mut model = model_config.init::<TrainingBackend>(&device)?;
    let mut optimizer = AdamConfig::new().with_epsilon(ADAM_EPSILON).init();
    let loss_fn = CrossEntropyLossConfig::new().init::<TrainingBackend>(&device);

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut train_order = split.train.clone();
    let mut history = Vec::with_capacity(config.epochs);

    for epoch in 1..=config.epochs {
        let epoch_start = Instant::now();
        train_order.shuffle(&mut rng);

        let mut loss_sum = 0.0f64;
        let mut correct = 0usize;

        for batch in train_order.chunks(config.batch_size) {
            let batch_features: Vec<&SpectralFeature> = batch.iter().map(|&i| features[i]).collect();
            let batch_targets: Vec<usize> = batch.iter().map(|&i| targets[i]).collect();

            let input = feature_batch::<TrainingBackend>(&batch_features, &device)?;
            let labels = target_tensor::<TrainingBackend>(&batch_targets, &device);

            let logits = model.forward(input);
            correct += count_correct(logits.clone(), &batch_targets)?;
            let loss = loss_fn.forward(logits, labels);

            let batch_loss: f32 = loss.clone().into_scalar();
            if !batch_loss.is_finite() {
                return Err(GenreError::TrainingError(format!(
                    "loss diverged in epoch {}",
                    epoch
                )));
            }
            loss_sum += batch_loss as f64 * batch.len() as f64;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(config.learning_rate, model, grads);
        }

        let (validation_loss, validation_accuracy) =
            evaluate(&model.valid(), &features, &targets, &split.validation, config.batch_size)?;

        let metrics = EpochMetrics {
            epoch,
            train_loss: (loss_sum / train_order.len() as f64) as f32,
            train_accuracy: correct as f32 / train_order.len() as f32,
            validation_loss,
            validation_accuracy,
        };
        info!(
            "Epoch {}/{}: loss {:.4}, acc {:.1}%, val loss {:.4}, val acc {:.1}% ({:.1}s)",
            epoch,
            config.epochs,
            metrics.train_loss,
            metrics.train_accuracy * 100.0,
            metrics.validation_loss,
            metrics.validation_accuracy * 100.0,
            epoch_start.elapsed().as_secs_f64()
        );
        history.push(metrics);
    }

    Ok(TrainedModel {
        model: model.valid(),
        model_config,
        codec,
        history,
        train_examples: split.train.len(),
        validation_examples: split.validation.len(),
    })
}

/// Mean cross-entropy and accuracy over `indices`
fn evaluate(
    model: &GenreCnn<InferenceBackend>,
    features: &[&SpectralFeature],
    targets: &[usize],
    indices: &[usize],
    batch_size: usize,
) -> Result<(f32, f32)> {
    let device = <InferenceBackend as Backend>::Device::default();
    let loss_fn = CrossEntropyLossConfig::new().init::<InferenceBackend>(&device);

    let mut loss_sum = 0.0f64;
    let mut correct = 0usize;
    for batch in indices.chunks(batch_size) {
        let batch_features: Vec<&SpectralFeature> = batch.iter().map(|&i| features[i]).collect();
        let batch_targets: Vec<usize> = batch.iter().map(|&i| targets[i]).collect();

        let logits = model.forward(feature_batch::<InferenceBackend>(&batch_features, &device)?);
        correct += count_correct(logits.clone(), &batch_targets)?;
        let loss: f32 = loss_fn
            .forward(logits, target_tensor::<InferenceBackend>(&batch_targets, &device))
            .into_scalar();
        loss_sum += loss as f64 * batch.len() as f64;
    }

    let n = indices.len().max(1) as f64;
    debug!("Evaluated {} examples", indices.len());
    Ok(((loss_sum / n) as f32, (correct as f64 / n) as f32))
}

fn target_tensor<B: Backend>(targets: &[usize], device: &B::Device) -> Tensor<B, 1, Int> {
    let data: Vec<i64> = targets.iter().map(|&t| t as i64).collect();
    Tensor::from_data(TensorData::new(data, [targets.len()]), device)
}

fn count_correct<B: Backend>(logits: Tensor<B, 2>, targets: &[usize]) -> Result<usize> {
    let rows = tensor_rows(logits)?;
    Ok(rows
        .iter()
        .zip(targets)
        .filter(|(row, target)| argmax(row) == Some(**target))
        .count())
}

/// Index of the largest value; first one wins on ties
pub(crate) fn argmax(values: &[f32]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}
