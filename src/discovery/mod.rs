//! Locating audio: the training catalog and prediction input scanning

pub mod catalog;
pub mod scanner;

pub use catalog::{audio_path, Catalog};
pub use scanner::{scan, DiscoveredFile};
