//! Configuration and CLI handling

pub mod cli;
pub mod settings;

pub use cli::{Cli, Command, PredictArgs, TrainArgs};
pub use settings::{default_threads, PredictSettings, TrainSettings};
