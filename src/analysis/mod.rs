//! Composite track analysis
//!
//! Combines the genre classifier with pluggable collaborators (track
//! recognition, community tags, tempo, instrument tagging). The trait
//! abstraction allows swapping backends without changing pipeline code.

pub mod mood;
pub mod report;
pub mod tempo;
pub mod traits;

pub use mood::{mood_from_tags, Mood};
pub use report::{AnalysisReport, Analyzer, DEFAULT_INSTRUMENT_COUNT};
pub use tempo::StratumTempoEstimator;
pub use traits::{InstrumentTagger, TagSource, TempoEstimator, TrackRecognizer};
