//! Model artifact persistence
//!
//! A trained model is stored as a directory holding three files that always
//! travel together:
//!
//! - `model.mpk`: network weights
//! - `codec.json`: the label codec, tagged with the training run id
//! - `manifest.json`: run id, weight checksum, model/feature/training
//!   configuration and per-epoch metrics
//!
//! Saving writes everything into a staging directory next to the
//! destination and then swaps it into place, so a reader never observes a
//! model from one run paired with a codec from another. Loading verifies
//! that the run ids agree and that the weights match the recorded checksum.

use super::cnn::{GenreCnn, GenreCnnConfig, InferenceBackend};
use super::codec::LabelCodec;
use super::trainer::{EpochMetrics, TrainedModel, TrainingConfig};
use crate::error::{GenreError, Result};
use crate::features::FeatureConfig;
use burn::module::Module;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::backend::Backend;
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Current manifest layout
pub const FORMAT_VERSION: u32 = 1;

/// Weights file stem; the recorder appends `.mpk`
const MODEL_STEM: &str = "model";
pub const MODEL_FILE: &str = "model.mpk";
pub const CODEC_FILE: &str = "codec.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Environment variable overriding the artifact location
pub const MODEL_DIR_ENV: &str = "GENREKIT_MODEL_DIR";

type Recorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// Metadata describing one training run's artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub run_id: String,
    pub trained_at: DateTime<Utc>,
    /// SHA-256 of `model.mpk`, hex encoded
    pub model_sha256: String,
    pub model: GenreCnnConfig,
    pub features: FeatureConfig,
    pub training: TrainingConfig,
    pub history: Vec<EpochMetrics>,
    pub train_examples: usize,
    pub validation_examples: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct CodecFile {
    run_id: String,
    classes: LabelCodec,
}

/// A loaded, verified model/codec pair
#[derive(Debug)]
pub struct Artifact {
    pub model: GenreCnn<InferenceBackend>,
    pub codec: LabelCodec,
    pub manifest: Manifest,
}

/// Persist a trained model and its codec into `dest`
///
/// Any existing artifact at `dest` is replaced only once the new one has
/// been written completely. On failure the previous artifact is left (or put
/// back) in place and the staging directory is removed.
pub fn save(
    trained: &TrainedModel,
    features: &FeatureConfig,
    training: &TrainingConfig,
    dest: &Path,
) -> Result<Manifest> {
    let run_id = new_run_id();
    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| GenreError::output_error(&parent, e))?;

    let staging = sibling(dest, &format!("staging-{}", run_id));
    if staging.exists() {
        fs::remove_dir_all(&staging).map_err(|e| GenreError::output_error(&staging, e))?;
    }
    fs::create_dir(&staging).map_err(|e| GenreError::output_error(&staging, e))?;

    let manifest = match write_contents(trained, features, training, &run_id, &staging) {
        Ok(manifest) => manifest,
        Err(e) => {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }
    };

    swap_into_place(&staging, dest, &run_id)?;
    info!(
        "Saved model artifact {} ({} classes) to {}",
        run_id,
        trained.codec.len(),
        dest.display()
    );
    Ok(manifest)
}

fn write_contents(
    trained: &TrainedModel,
    features: &FeatureConfig,
    training: &TrainingConfig,
    run_id: &str,
    dir: &Path,
) -> Result<Manifest> {
    trained
        .model
        .clone()
        .save_file(dir.join(MODEL_STEM), &Recorder::new())
        .map_err(|e| GenreError::OutputError {
            path: dir.join(MODEL_FILE),
            reason: format!("Failed to write model weights: {:?}", e),
        })?;
    let model_sha256 = sha256_file(&dir.join(MODEL_FILE))
        .map_err(|e| GenreError::output_error(dir.join(MODEL_FILE), e))?;

    write_json(
        &dir.join(CODEC_FILE),
        &CodecFile {
            run_id: run_id.to_string(),
            classes: trained.codec.clone(),
        },
    )?;

    let manifest = Manifest {
        format_version: FORMAT_VERSION,
        run_id: run_id.to_string(),
        trained_at: Utc::now(),
        model_sha256,
        model: trained.model_config.clone(),
        features: *features,
        training: training.clone(),
        history: trained.history.clone(),
        train_examples: trained.train_examples,
        validation_examples: trained.validation_examples,
    };
    write_json(&dir.join(MANIFEST_FILE), &manifest)?;

    Ok(manifest)
}

/// Replace `dest` with `staging`, keeping the old directory until the new one is in place
fn swap_into_place(staging: &Path, dest: &Path, run_id: &str) -> Result<()> {
    let previous = if dest.exists() {
        let previous = sibling(dest, &format!("previous-{}", run_id));
        fs::rename(dest, &previous).map_err(|e| {
            let _ = fs::remove_dir_all(staging);
            GenreError::output_error(dest, e)
        })?;
        Some(previous)
    } else {
        None
    };

    if let Err(e) = fs::rename(staging, dest) {
        let _ = fs::remove_dir_all(staging);
        if let Some(ref previous) = previous {
            if let Err(restore) = fs::rename(previous, dest) {
                warn!(
                    "Could not restore previous artifact from {}: {}",
                    previous.display(),
                    restore
                );
            }
        }
        return Err(GenreError::output_error(dest, e));
    }

    if let Some(previous) = previous {
        if let Err(e) = fs::remove_dir_all(&previous) {
            warn!("Could not remove old artifact {}: {}", previous.display(), e);
        }
    }
    Ok(())
}

/// Load and verify the artifact stored in `dir`
pub fn load(dir: &Path) -> Result<Artifact> {
    if !dir.is_dir() {
        return Err(GenreError::artifact_load(dir, "directory not found"));
    }

    let manifest: Manifest = read_json(&dir.join(MANIFEST_FILE))?;
    if manifest.format_version != FORMAT_VERSION {
        return Err(GenreError::artifact_load(
            dir.join(MANIFEST_FILE),
            format!(
                "unsupported format version {} (expected {})",
                manifest.format_version, FORMAT_VERSION
            ),
        ));
    }

    let codec_file: CodecFile = read_json(&dir.join(CODEC_FILE))?;
    if codec_file.run_id != manifest.run_id {
        return Err(GenreError::ArtifactMismatch {
            reason: format!(
                "codec belongs to run {} but the manifest describes run {}",
                codec_file.run_id, manifest.run_id
            ),
        });
    }
    if codec_file.classes.len() != manifest.model.num_classes {
        return Err(GenreError::ArtifactMismatch {
            reason: format!(
                "codec has {} classes but the model outputs {}",
                codec_file.classes.len(),
                manifest.model.num_classes
            ),
        });
    }

    let model_path = dir.join(MODEL_FILE);
    let actual_sha256 =
        sha256_file(&model_path).map_err(|e| GenreError::artifact_load(&model_path, e))?;
    if actual_sha256 != manifest.model_sha256 {
        return Err(GenreError::ArtifactMismatch {
            reason: format!(
                "model weights do not match run {} (expected sha256 {}, got {})",
                manifest.run_id, manifest.model_sha256, actual_sha256
            ),
        });
    }

    manifest
        .features
        .validate()
        .map_err(|e| GenreError::artifact_load(dir.join(MANIFEST_FILE), e))?;

    let device = <InferenceBackend as Backend>::Device::default();
    let model = manifest
        .model
        .init::<InferenceBackend>(&device)
        .map_err(|e| GenreError::artifact_load(dir.join(MANIFEST_FILE), e))?
        .load_file(dir.join(MODEL_STEM), &Recorder::new(), &device)
        .map_err(|e| GenreError::artifact_load(&model_path, format!("{:?}", e)))?;

    debug!(
        "Loaded artifact {} with classes: {}",
        manifest.run_id,
        codec_file.classes.classes().join(", ")
    );

    Ok(Artifact {
        model,
        codec: codec_file.classes,
        manifest,
    })
}

/// Locate an artifact directory when none was given explicitly
///
/// Search order:
/// 1. `GENREKIT_MODEL_DIR` environment variable
/// 2. Platform data directory (`~/.local/share/genrekit/models/genre` on Linux)
/// 3. `./models/genre`
pub fn find_artifact_dir() -> Result<PathBuf> {
    let mut checked: Vec<String> = Vec::new();

    if let Ok(env_dir) = std::env::var(MODEL_DIR_ENV) {
        let path = PathBuf::from(env_dir);
        if path.join(MANIFEST_FILE).is_file() {
            return Ok(path);
        }
        checked.push(format!("{}={}", MODEL_DIR_ENV, path.display()));
    }

    if let Some(data_dir) = default_data_dir() {
        if data_dir.join(MANIFEST_FILE).is_file() {
            return Ok(data_dir);
        }
        checked.push(data_dir.display().to_string());
    }

    let cwd_dir = PathBuf::from("./models/genre");
    if cwd_dir.join(MANIFEST_FILE).is_file() {
        return Ok(cwd_dir);
    }
    checked.push(cwd_dir.display().to_string());

    let locations = checked
        .iter()
        .map(|loc| format!("  - {}", loc))
        .collect::<Vec<_>>()
        .join("\n");
    Err(GenreError::artifact_load(
        &cwd_dir,
        format!("no trained model found. Locations checked:\n{}", locations),
    ))
}

/// Per-user location for the default artifact
pub fn default_data_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "genrekit", "genrekit")
        .map(|dirs| dirs.data_dir().join("models").join("genre"))
}

/// `<parent>/.<name>.<suffix>` next to `dest`
fn sibling(dest: &Path, suffix: &str) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    dest.with_file_name(format!(".{}.{}", name, suffix))
}

fn new_run_id() -> String {
    let now = Utc::now();
    let mut hasher = Sha256::new();
    hasher.update(now.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}-{}", now.format("%Y%m%dT%H%M%SZ"), &digest[..8])
}

fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Serialize `value` to `path`, flushed and synced before returning
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = fs::File::create(path).map_err(|e| GenreError::output_error(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|e| GenreError::OutputError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let file = writer
        .into_inner()
        .map_err(|e| GenreError::output_error(path, e.into_error()))?;
    file.sync_all().map_err(|e| GenreError::output_error(path, e))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let file = fs::File::open(path).map_err(|e| GenreError::artifact_load(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| GenreError::artifact_load(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::SpectralFeature;
    use crate::model::cnn::{feature_batch, tensor_rows};

    fn untrained(classes: &[&str]) -> TrainedModel {
        let model_config = GenreCnnConfig::new(classes.len())
            .with_mel_bands(32)
            .with_time_frames(32)
            .with_hidden_units(8);
        let device = Default::default();
        TrainedModel {
            model: model_config.init::<InferenceBackend>(&device).unwrap(),
            model_config,
            codec: LabelCodec::fit(classes.iter().copied()),
            history: vec![EpochMetrics {
                epoch: 1,
                train_loss: 1.2,
                train_accuracy: 0.5,
                validation_loss: 1.3,
                validation_accuracy: 0.4,
            }],
            train_examples: 8,
            validation_examples: 2,
        }
    }

    fn feature_config() -> FeatureConfig {
        FeatureConfig {
            mel_bands: 32,
            time_frames: 32,
            duration_secs: 2.0,
            ..FeatureConfig::default()
        }
    }

    fn probe() -> SpectralFeature {
        let data = (0..32 * 32).map(|i| -((i % 97) as f32)).collect();
        SpectralFeature::from_vec(32, 32, data).unwrap()
    }

    fn predict(model: &GenreCnn<InferenceBackend>) -> Vec<f32> {
        let device = Default::default();
        let feature = probe();
        let batch = feature_batch::<InferenceBackend>(&[&feature], &device).unwrap();
        tensor_rows(model.predict(batch)).unwrap().remove(0)
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("genre");
        let trained = untrained(&["Rock", "Folk", "Jazz"]);

        let manifest = save(&trained, &feature_config(), &TrainingConfig::new(), &dest).unwrap();
        assert!(dest.join(MODEL_FILE).is_file());
        assert!(dest.join(CODEC_FILE).is_file());

        let artifact = load(&dest).unwrap();
        assert_eq!(artifact.manifest.run_id, manifest.run_id);
        assert_eq!(artifact.manifest.features, feature_config());
        assert_eq!(artifact.manifest.history, trained.history);
        assert_eq!(artifact.codec, trained.codec);

        let before = predict(&trained.model);
        let after = predict(&artifact.model);
        for (a, b) in before.iter().zip(&after) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_save_replaces_previous_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("genre");

        save(&untrained(&["a", "b"]), &feature_config(), &TrainingConfig::new(), &dest).unwrap();
        let second =
            save(&untrained(&["x", "y", "z"]), &feature_config(), &TrainingConfig::new(), &dest).unwrap();

        let artifact = load(&dest).unwrap();
        assert_eq!(artifact.manifest.run_id, second.run_id);
        assert_eq!(artifact.codec.classes(), &["x", "y", "z"]);

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("genre")]);
    }

    #[test]
    fn test_codec_from_other_run_is_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("genre");
        save(&untrained(&["a", "b"]), &feature_config(), &TrainingConfig::new(), &dest).unwrap();

        let codec_path = dest.join(CODEC_FILE);
        let mut codec: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&codec_path).unwrap()).unwrap();
        codec["run_id"] = serde_json::Value::String("19700101T000000Z-deadbeef".to_string());
        fs::write(&codec_path, codec.to_string()).unwrap();

        assert!(matches!(load(&dest), Err(GenreError::ArtifactMismatch { .. })));
    }

    #[test]
    fn test_modified_weights_are_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("genre");
        save(&untrained(&["a", "b"]), &feature_config(), &TrainingConfig::new(), &dest).unwrap();

        let model_path = dest.join(MODEL_FILE);
        let mut bytes = fs::read(&model_path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fs::write(&model_path, bytes).unwrap();

        assert!(matches!(load(&dest), Err(GenreError::ArtifactMismatch { .. })));
    }

    #[test]
    fn test_missing_artifact_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load(&dir.path().join("nothing")),
            Err(GenreError::ArtifactLoad { .. })
        ));

        fs::create_dir(dir.path().join("empty")).unwrap();
        assert!(matches!(
            load(&dir.path().join("empty")),
            Err(GenreError::ArtifactLoad { .. })
        ));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_write_json_reports_failed_flush() {
        // Writes to /dev/full succeed into the buffer and fail with ENOSPC on flush
        let err = write_json(Path::new("/dev/full"), &vec!["Rock".to_string(); 10]).unwrap_err();
        assert!(matches!(err, GenreError::OutputError { .. }));
    }

    #[test]
    fn test_run_ids_are_distinct() {
        let a = new_run_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert_ne!(a, new_run_id());
    }
}
