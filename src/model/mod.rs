//! Genre classifier: label codec, network, training and persistence

pub mod artifact;
pub mod cnn;
pub mod codec;
pub mod split;
pub mod trainer;

pub use artifact::{find_artifact_dir, Artifact, Manifest};
pub use cnn::{GenreCnn, GenreCnnConfig, InferenceBackend, TrainingBackend};
pub use codec::LabelCodec;
pub use split::{stratified_split, Split};
pub use trainer::{train, EpochMetrics, TrainedModel, TrainingConfig};
