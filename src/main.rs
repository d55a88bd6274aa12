//! genrekit CLI entry point

use clap::Parser;
use genrekit::config::{Cli, Command, PredictSettings, TrainSettings};
use genrekit::pipeline;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(&cli);

    if let Err(e) = validate_inputs(&cli) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let show_progress = !cli.quiet;
    match &cli.command {
        Command::Train(args) => {
            let settings = TrainSettings::from_args(args, cli.threads, show_progress);
            match pipeline::train(&settings) {
                Ok(summary) => {
                    eprintln!();
                    eprintln!(
                        "Summary: trained on {} examples across {} genres ({} of {} tracks skipped)",
                        summary.examples,
                        summary.genres.len(),
                        summary.skipped,
                        summary.selected
                    );
                    if let Some(last) = &summary.final_epoch {
                        eprintln!(
                            "  Final epoch {}: validation accuracy {:.1}%, loss {:.4}",
                            last.epoch,
                            last.validation_accuracy * 100.0,
                            last.validation_loss
                        );
                    }
                    eprintln!("  Model {} saved to {}", summary.run_id, summary.artifact_dir.display());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("Fatal error: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Command::Predict(args) => {
            let settings = PredictSettings::from_args(args, cli.threads, show_progress);
            match pipeline::predict(&settings) {
                Ok(result) => {
                    // Reports may be on stdout, so the summary goes to stderr
                    eprintln!(
                        "Summary: {} predicted, {} failed (of {} files)",
                        result.successful, result.failed, result.total_files
                    );
                    if result.failed > 0 {
                        ExitCode::from(1)
                    } else {
                        ExitCode::SUCCESS
                    }
                }
                Err(e) => {
                    eprintln!("Fatal error: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}

fn init_logging(cli: &Cli) {
    let level = cli.log_level();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str())),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn validate_inputs(cli: &Cli) -> Result<(), String> {
    match &cli.command {
        Command::Train(args) => {
            if !args.catalog.exists() {
                return Err(format!(
                    "Catalog does not exist: {}\n\n  Tip: Pass the tracks CSV of your dataset.\n  Example:\n    genrekit train --catalog fma_metadata/tracks.csv --audio-root fma_large --output ./models/genre",
                    args.catalog.display()
                ));
            }
            if !args.audio_root.is_dir() {
                return Err(format!(
                    "Audio root is not a directory: {}",
                    args.audio_root.display()
                ));
            }
        }
        Command::Predict(args) => {
            if !args.input.exists() {
                return Err(format!(
                    "Input path does not exist: {}\n\n  Tip: Check the path is correct and accessible.\n  Examples:\n    genrekit predict -i ~/Music/album\n    genrekit predict -i ./track.mp3 -o reports.json",
                    args.input.display()
                ));
            }
            if let Some(parent) = args.output.as_ref().and_then(|o| o.parent()) {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(format!(
                        "Output directory does not exist: {}\n\n  Example: mkdir -p {}",
                        parent.display(),
                        parent.display()
                    ));
                }
            }
        }
    }
    Ok(())
}
