//! Training and analysis runs

pub mod orchestrator;

pub use orchestrator::{predict, train, PredictSummary, TrainSummary};
