//! Composite analysis report
//!
//! [`Analyzer`] runs the genre classifier and any configured collaborators
//! on one file. Collaborators are optional and independent: a failure in one
//! is logged and leaves its field empty without affecting the others.

use super::mood::{mood_from_tags, Mood};
use super::traits::{InstrumentTagger, TagSource, TempoEstimator, TrackRecognizer};
use crate::audio;
use crate::inference::{GenreResponse, GenreService};
use crate::types::TrackIdentity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Number of instrument classes requested from the tagger
pub const DEFAULT_INSTRUMENT_COUNT: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<GenreResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<TrackIdentity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood: Option<Mood>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tempo_bpm: Option<f64>,
    #[serde(default)]
    pub instruments: Vec<String>,
    pub analyzed_at: DateTime<Utc>,
}

/// Runs every configured analysis on a file
#[derive(Default, Clone)]
pub struct Analyzer {
    genre: Option<Arc<GenreService>>,
    recognizer: Option<Arc<dyn TrackRecognizer>>,
    tags: Option<Arc<dyn TagSource>>,
    tempo: Option<Arc<dyn TempoEstimator>>,
    instruments: Option<Arc<dyn InstrumentTagger>>,
    instrument_count: usize,
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            instrument_count: DEFAULT_INSTRUMENT_COUNT,
            ..Self::default()
        }
    }

    pub fn with_genre_service(mut self, service: Arc<GenreService>) -> Self {
        self.genre = Some(service);
        self
    }

    pub fn with_recognizer(mut self, recognizer: Arc<dyn TrackRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn with_tag_source(mut self, tags: Arc<dyn TagSource>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn with_tempo_estimator(mut self, tempo: Arc<dyn TempoEstimator>) -> Self {
        self.tempo = Some(tempo);
        self
    }

    pub fn with_instrument_tagger(mut self, tagger: Arc<dyn InstrumentTagger>, count: usize) -> Self {
        self.instruments = Some(tagger);
        self.instrument_count = count;
        self
    }

    /// Analyze one file. Never fails; missing results are left empty.
    pub fn analyze(&self, path: &Path) -> AnalysisReport {
        let genre = self.genre.as_ref().map(|service| service.predict_genre(path));

        let identity = self.recognizer.as_ref().and_then(|recognizer| {
            match recognizer.recognize(path) {
                Ok(identity) => identity,
                Err(e) => {
                    warn!("{} failed for {}: {}", recognizer.name(), path.display(), e);
                    None
                }
            }
        });

        // Tags are keyed by artist and title, so they need a recognized track
        let tags = match (&self.tags, &identity) {
            (Some(source), Some(id)) => source.top_tags(&id.artist, &id.title).unwrap_or_else(|e| {
                warn!("{} failed for {} - {}: {}", source.name(), id.artist, id.title, e);
                Vec::new()
            }),
            _ => Vec::new(),
        };
        let mood = identity.as_ref().map(|_| mood_from_tags(&tags));

        let tempo_bpm = self.tempo.as_ref().and_then(|estimator| {
            let estimate = audio::decode(path, estimator.sample_rate(), None)
                .and_then(|buffer| estimator.estimate(&buffer));
            match estimate {
                Ok(bpm) if bpm.is_finite() && bpm > 0.0 => Some(bpm),
                Ok(bpm) => {
                    warn!("{} returned invalid tempo {} for {}", estimator.name(), bpm, path.display());
                    None
                }
                Err(e) => {
                    warn!("{} failed for {}: {}", estimator.name(), path.display(), e);
                    None
                }
            }
        });

        let instruments = match &self.instruments {
            Some(tagger) => tagger
                .top_classes(path, self.instrument_count)
                .map(|mut classes| {
                    classes.truncate(self.instrument_count);
                    classes
                })
                .unwrap_or_else(|e| {
                    warn!("{} failed for {}: {}", tagger.name(), path.display(), e);
                    Vec::new()
                }),
            None => Vec::new(),
        };

        debug!("Analyzed {}", path.display());

        AnalysisReport {
            path: path.to_path_buf(),
            genre,
            identity,
            mood,
            tags,
            tempo_bpm,
            instruments,
            analyzed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GenreError, Result};
    use crate::types::AudioBuffer;

    struct FixedRecognizer(Option<TrackIdentity>);

    impl TrackRecognizer for FixedRecognizer {
        fn recognize(&self, _path: &Path) -> Result<Option<TrackIdentity>> {
            Ok(self.0.clone())
        }
        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    struct FailingRecognizer;

    impl TrackRecognizer for FailingRecognizer {
        fn recognize(&self, _path: &Path) -> Result<Option<TrackIdentity>> {
            Err(GenreError::InferenceError("service unavailable".to_string()))
        }
        fn name(&self) -> &'static str {
            "failing"
        }
    }

    struct StaticTags(Vec<&'static str>);

    impl TagSource for StaticTags {
        fn top_tags(&self, _artist: &str, _title: &str) -> Result<Vec<String>> {
            Ok(self.0.iter().map(|t| t.to_string()).collect())
        }
        fn name(&self) -> &'static str {
            "static"
        }
    }

    struct ConstantTempo;

    impl TempoEstimator for ConstantTempo {
        fn estimate(&self, _buffer: &AudioBuffer) -> Result<f64> {
            Ok(120.0)
        }
        fn name(&self) -> &'static str {
            "constant"
        }
    }

    struct ManyClasses;

    impl InstrumentTagger for ManyClasses {
        fn top_classes(&self, _path: &Path, _n: usize) -> Result<Vec<String>> {
            Ok(["Music", "Guitar", "Drum", "Bass", "Piano", "Singing", "Organ"]
                .iter()
                .map(|c| c.to_string())
                .collect())
        }
        fn name(&self) -> &'static str {
            "many"
        }
    }

    fn identity() -> TrackIdentity {
        TrackIdentity {
            title: "Song".to_string(),
            artist: "Band".to_string(),
            spotify_id: None,
        }
    }

    #[test]
    fn test_recognized_track_gets_tags_and_mood() {
        let analyzer = Analyzer::new()
            .with_recognizer(Arc::new(FixedRecognizer(Some(identity()))))
            .with_tag_source(Arc::new(StaticTags(vec!["indie", "Dance"])));
        let report = analyzer.analyze(Path::new("song.mp3"));
        assert_eq!(report.identity, Some(identity()));
        assert_eq!(report.tags, vec!["indie", "Dance"]);
        assert_eq!(report.mood, Some(Mood::Energetic));
        assert!(report.genre.is_none());
    }

    #[test]
    fn test_unrecognized_track_skips_tag_lookup() {
        let analyzer = Analyzer::new()
            .with_recognizer(Arc::new(FixedRecognizer(None)))
            .with_tag_source(Arc::new(StaticTags(vec!["sad"])));
        let report = analyzer.analyze(Path::new("song.mp3"));
        assert!(report.tags.is_empty());
        assert_eq!(report.mood, None);
    }

    #[test]
    fn test_collaborator_failures_leave_fields_empty() {
        let analyzer = Analyzer::new()
            .with_recognizer(Arc::new(FailingRecognizer))
            .with_tempo_estimator(Arc::new(ConstantTempo));
        // Tempo needs decodable audio; a missing file yields no tempo
        let report = analyzer.analyze(Path::new("/no/such/song.mp3"));
        assert_eq!(report.identity, None);
        assert_eq!(report.tempo_bpm, None);
    }

    #[test]
    fn test_instruments_truncated_to_requested_count() {
        let analyzer = Analyzer::new().with_instrument_tagger(Arc::new(ManyClasses), DEFAULT_INSTRUMENT_COUNT);
        let report = analyzer.analyze(Path::new("song.mp3"));
        assert_eq!(report.instruments, vec!["Music", "Guitar", "Drum", "Bass", "Piano"]);
    }

    #[test]
    fn test_genre_failure_is_embedded() {
        let dir = tempfile::tempdir().unwrap();
        let service = Arc::new(GenreService::new(dir.path().join("missing-model")));
        let report = Analyzer::new()
            .with_genre_service(service)
            .analyze(Path::new("song.mp3"));
        let genre = report.genre.unwrap();
        assert!(!genre.is_ok());
    }
}
