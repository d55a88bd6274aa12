//! Pipeline orchestration
//!
//! Coordinates the two top-level runs: building a dataset and training a
//! model from a catalog, and analyzing audio files with a trained model.

use crate::analysis::{AnalysisReport, Analyzer, StratumTempoEstimator};
use crate::config::{PredictSettings, TrainSettings};
use crate::dataset;
use crate::discovery::{self, Catalog};
use crate::error::{GenreError, Result};
use crate::export;
use crate::inference::GenreService;
use crate::model::{self, artifact, EpochMetrics};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Outcome of a training run
#[derive(Debug)]
pub struct TrainSummary {
    /// Tracks drawn from the catalog
    pub selected: usize,
    /// Examples that survived extraction and genre filtering
    pub examples: usize,
    pub skipped: usize,
    pub genres: Vec<String>,
    pub final_epoch: Option<EpochMetrics>,
    pub run_id: String,
    pub artifact_dir: PathBuf,
}

/// Outcome of an analysis run
#[derive(Debug)]
pub struct PredictSummary {
    pub total_files: usize,
    /// Files with a genre prediction
    pub successful: usize,
    /// Files whose report carries a genre error
    pub failed: usize,
    pub reports: Vec<AnalysisReport>,
}

/// Build a dataset from the catalog, train, and persist the artifact
///
/// Nothing is written unless training succeeds.
pub fn train(settings: &TrainSettings) -> Result<TrainSummary> {
    let pipeline_start = Instant::now();

    configure_thread_pool(settings.threads)?;
    settings.training.validate()?;

    // Phase 1: Catalog
    let catalog = Catalog::from_csv_path(&settings.catalog)?;

    // Phase 2: Dataset
    let build_start = Instant::now();
    let build = dataset::build(&catalog, &settings.audio_root, &settings.build)?;
    info!(
        "Built dataset of {} examples ({} genres, {} skipped) in {:.2}s",
        build.dataset.len(),
        build.retained_labels.len(),
        build.skipped.len(),
        build_start.elapsed().as_secs_f64()
    );

    // Phase 3: Training
    let train_start = Instant::now();
    let trained = model::train(&build.dataset, &settings.training)?;
    info!("Training completed in {:.2}s", train_start.elapsed().as_secs_f64());

    // Phase 4: Persist
    let manifest = artifact::save(&trained, settings.features(), &settings.training, &settings.output)?;
    info!("Saved model {} to {}", manifest.run_id, settings.output.display());

    info!("Total pipeline time: {:.2}s", pipeline_start.elapsed().as_secs_f64());

    Ok(TrainSummary {
        selected: build.selected,
        examples: build.dataset.len(),
        skipped: build.skipped.len(),
        genres: trained.codec.classes().to_vec(),
        final_epoch: trained.history.last().cloned(),
        run_id: manifest.run_id,
        artifact_dir: settings.output.clone(),
    })
}

/// Analyze every audio file under the input path
///
/// The model is loaded before any file is touched, so a missing or
/// inconsistent artifact aborts the run. Per-file failures are carried in
/// the individual reports.
pub fn predict(settings: &PredictSettings) -> Result<PredictSummary> {
    let pipeline_start = Instant::now();

    configure_thread_pool(settings.threads)?;

    let artifact_dir = match &settings.model {
        Some(dir) => dir.clone(),
        None => artifact::find_artifact_dir()?,
    };
    let service = Arc::new(GenreService::new(artifact_dir));
    service.warm_up()?;
    let classifier = service.classifier()?;
    let run_id = classifier.manifest().run_id.clone();
    info!(
        "Using model {} ({} genres: {})",
        run_id,
        classifier.codec().len(),
        classifier.codec().classes().join(", ")
    );

    // Phase 1: Discovery
    let discovery_start = Instant::now();
    info!("Scanning for audio files...");
    let files = discovery::scan(&settings.input, settings.recursive)?;
    info!(
        "Found {} audio files in {:.2}s",
        files.len(),
        discovery_start.elapsed().as_secs_f64()
    );

    // Phase 2: Analysis
    let analysis_start = Instant::now();
    let analyzer = Analyzer::new()
        .with_genre_service(service)
        .with_tempo_estimator(Arc::new(StratumTempoEstimator::new()));

    let progress_bar = if settings.show_progress && !files.is_empty() {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Some(pb)
    } else {
        None
    };

    let reports: Vec<AnalysisReport> = files
        .par_iter()
        .map(|file| {
            debug!("Analyzing {}", file.path.display());
            let report = analyzer.analyze(&file.path);
            if let Some(ref pb) = progress_bar {
                pb.inc(1);
                pb.set_message(file.path.file_name().unwrap_or_default().to_string_lossy().to_string());
            }
            report
        })
        .collect();

    if let Some(pb) = progress_bar {
        pb.finish_with_message("Analysis complete");
    }

    let successful = reports
        .iter()
        .filter(|r| r.genre.as_ref().is_some_and(|g| g.is_ok()))
        .count();
    let elapsed = analysis_start.elapsed().as_secs_f64();
    let tracks_per_sec = if elapsed > 0.0 { reports.len() as f64 / elapsed } else { 0.0 };
    info!("Analysis completed in {:.2}s ({:.1} tracks/sec)", elapsed, tracks_per_sec);

    // Phase 3: Export
    match &settings.output {
        Some(path) => export::write_reports(&reports, Some(run_id), path)?,
        None => println!("{}", export::render_reports(&reports, Some(run_id))?),
    }

    info!("Total pipeline time: {:.2}s", pipeline_start.elapsed().as_secs_f64());

    Ok(PredictSummary {
        total_files: files.len(),
        successful,
        failed: reports.len() - successful,
        reports,
    })
}

/// Configure the Rayon thread pool
fn configure_thread_pool(num_threads: usize) -> Result<()> {
    match rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
    {
        Ok(()) => {
            debug!("Configured thread pool with {} threads", num_threads);
        }
        Err(e) => {
            // Already initialized by an earlier run in this process
            if e.to_string().contains("already been initialized") {
                debug!("Thread pool already initialized, using existing pool");
            } else {
                return Err(GenreError::ConfigError(format!(
                    "Failed to configure thread pool: {}",
                    e
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_pool_configures_twice() {
        configure_thread_pool(2).unwrap();
        configure_thread_pool(3).unwrap();
    }

    #[test]
    fn test_predict_without_model_fails_before_scanning() {
        let dir = tempfile::tempdir().unwrap();
        let settings = PredictSettings {
            input: dir.path().join("does-not-exist"),
            model: Some(dir.path().join("no-model")),
            show_progress: false,
            ..PredictSettings::default()
        };
        let err = predict(&settings).unwrap_err();
        assert!(matches!(err, GenreError::ArtifactLoad { .. }));
    }

    #[test]
    fn test_train_with_missing_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let settings = TrainSettings {
            catalog: dir.path().join("tracks.csv"),
            audio_root: dir.path().to_path_buf(),
            output: dir.path().join("model"),
            ..TrainSettings::default()
        };
        let err = train(&settings).unwrap_err();
        assert!(matches!(err, GenreError::FileNotFound(_)));
        assert!(!dir.path().join("model").exists());
    }
}
