//! Convolutional genre classifier
//!
//! Three `conv 3x3 -> ReLU -> max-pool 2x2` stages (32, 64, 128 channels),
//! a 256-unit dense layer with dropout, and a dense output layer with one
//! logit per genre. Input batches are `[batch, mel_bands, time_frames, 1]`.

use crate::error::{GenreError, Result};
use crate::features::SpectralFeature;
use burn::backend::{Autodiff, NdArray};
use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{Dropout, DropoutConfig, Initializer, Linear, LinearConfig};
use burn::tensor::activation::{relu, softmax};
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};

/// CPU backend used for inference and evaluation
pub type InferenceBackend = NdArray<f32>;
/// CPU backend with gradient tracking, used for training
pub type TrainingBackend = Autodiff<InferenceBackend>;

const CONV_CHANNELS: [usize; 3] = [32, 64, 128];
const KERNEL: usize = 3;
const POOL: usize = 2;

#[derive(Config, Debug)]
pub struct GenreCnnConfig {
    /// Number of genre classes (size of the output layer)
    pub num_classes: usize,
    /// Input height
    #[config(default = 128)]
    pub mel_bands: usize,
    /// Input width
    #[config(default = 128)]
    pub time_frames: usize,
    #[config(default = 256)]
    pub hidden_units: usize,
    #[config(default = 0.4)]
    pub dropout: f64,
}

impl GenreCnnConfig {
    /// Spatial size `(height, width)` after the last pooling stage
    pub fn final_feature_map(&self) -> Option<(usize, usize)> {
        let shrink = |mut d: usize| {
            for _ in CONV_CHANNELS {
                d = d.checked_sub(KERNEL - 1)? / POOL;
                if d == 0 {
                    return None;
                }
            }
            Some(d)
        };
        Some((shrink(self.mel_bands)?, shrink(self.time_frames)?))
    }

    /// Length of the flattened vector fed to the dense layers
    pub fn flattened_len(&self) -> Option<usize> {
        self.final_feature_map()
            .map(|(h, w)| CONV_CHANNELS[CONV_CHANNELS.len() - 1] * h * w)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_classes == 0 {
            return Err(GenreError::ConfigError(
                "classifier needs at least one class".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(GenreError::ConfigError(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if self.flattened_len().is_none() {
            return Err(GenreError::ConfigError(format!(
                "input {}x{} is too small for three conv/pool stages",
                self.mel_bands, self.time_frames
            )));
        }
        Ok(())
    }

    /// Build a freshly initialized model
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<GenreCnn<B>> {
        self.validate()?;
        let flattened = self.flattened_len().unwrap_or_default();

        let conv = |channels: [usize; 2]| {
            Conv2dConfig::new(channels, [KERNEL, KERNEL])
                .with_initializer(Initializer::XavierUniform { gain: 1.0 })
                .init::<B>(device)
        };
        let dense = |d_in: usize, d_out: usize| {
            LinearConfig::new(d_in, d_out)
                .with_initializer(Initializer::XavierUniform { gain: 1.0 })
                .init::<B>(device)
        };

        Ok(GenreCnn {
            conv1: conv([1, CONV_CHANNELS[0]]),
            conv2: conv([CONV_CHANNELS[0], CONV_CHANNELS[1]]),
            conv3: conv([CONV_CHANNELS[1], CONV_CHANNELS[2]]),
            pool: MaxPool2dConfig::new([POOL, POOL]).with_strides([POOL, POOL]).init(),
            fc1: dense(flattened, self.hidden_units),
            dropout: DropoutConfig::new(self.dropout).init(),
            fc2: dense(self.hidden_units, self.num_classes),
        })
    }
}

#[derive(Module, Debug)]
pub struct GenreCnn<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    conv3: Conv2d<B>,
    pool: MaxPool2d,
    fc1: Linear<B>,
    dropout: Dropout,
    fc2: Linear<B>,
}

impl<B: Backend> GenreCnn<B> {
    /// Class logits `[batch, num_classes]`
    ///
    /// Dropout is only active on autodiff backends.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        // [batch, height, width, channel] -> [batch, channel, height, width]
        let x = input.permute([0, 3, 1, 2]);

        let x = self.pool.forward(relu(self.conv1.forward(x)));
        let x = self.pool.forward(relu(self.conv2.forward(x)));
        let x = self.pool.forward(relu(self.conv3.forward(x)));

        let x: Tensor<B, 2> = x.flatten(1, 3);
        let x = relu(self.fc1.forward(x));
        let x = self.dropout.forward(x);
        self.fc2.forward(x)
    }

    /// Class probabilities `[batch, num_classes]`; each row sums to 1
    pub fn predict(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(input), 1)
    }
}

/// Stack features into a `[batch, mel_bands, time_frames, 1]` tensor
pub fn feature_batch<B: Backend>(
    features: &[&SpectralFeature],
    device: &B::Device,
) -> Result<Tensor<B, 4>> {
    let (height, width) = match features.first() {
        Some(first) => first.shape(),
        None => return Err(GenreError::InferenceError("empty feature batch".to_string())),
    };

    let mut data = Vec::with_capacity(features.len() * height * width);
    for feature in features {
        if feature.shape() != (height, width) {
            return Err(GenreError::InferenceError(format!(
                "feature shape {:?} does not match batch shape {:?}",
                feature.shape(),
                (height, width)
            )));
        }
        data.extend_from_slice(feature.as_slice());
    }

    Ok(Tensor::from_data(
        TensorData::new(data, [features.len(), height, width, 1]),
        device,
    ))
}

/// Copy a `[batch, classes]` tensor into row vectors
pub fn tensor_rows<B: Backend>(tensor: Tensor<B, 2>) -> Result<Vec<Vec<f32>>> {
    let [_, cols] = tensor.dims();
    let values = tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| GenreError::InferenceError(format!("cannot read model output: {:?}", e)))?;
    Ok(values.chunks(cols.max(1)).map(<[f32]>::to_vec).collect())
}
