// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// DiagramLens command line.
//
// Entry point. Initialises logging, loads the configuration, and dispatches
// to analysis, preprocessing, or the health check. Reports go to stdout as
// JSON; logs go to stderr.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use diagramlens_core::config::{AnalysisConfig, PreprocessStep};
use diagramlens_core::error::{DiagramLensError, Result};
use diagramlens_vision::{Analyzer, DiagramPreprocessor};
use serde::Serialize;

/// Environment variable naming a JSON configuration file.
const CONFIG_ENV: &str = "DIAGRAMLENS_CONFIG";

#[derive(Parser, Debug)]
#[command(name = "diagramlens", version, about = "Diagram image analysis")]
struct Cli {
    /// JSON configuration file (falls back to $DIAGRAMLENS_CONFIG).
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    /// Skip every OCR stage.
    #[arg(long = "no-ocr", global = true)]
    no_ocr: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyse one image and print the JSON report.
    Analyze {
        file: PathBuf,
        /// Single-line JSON instead of pretty-printed.
        #[arg(long)]
        compact: bool,
    },
    /// Run preprocessing steps; the output format follows its extension.
    Preprocess {
        input: PathBuf,
        output: PathBuf,
        /// Comma-separated steps, e.g. `denoise,sharpen`. Defaults to the
        /// configured pipeline.
        #[arg(long, value_delimiter = ',')]
        steps: Vec<String>,
    },
    /// Report OCR backend and imaging status.
    Health,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %err, "diagramlens failed");
            eprintln!("error: {}", err);
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = load_config(cli.config.as_deref())?;
    if cli.no_ocr {
        config = AnalysisConfig {
            preprocess_steps: config.preprocess_steps,
            analyze_colors: config.analyze_colors,
            classify_diagrams: config.classify_diagrams,
            ..AnalysisConfig::without_ocr()
        };
    }

    match cli.command {
        Command::Analyze { file, compact } => {
            let analyzer = Analyzer::new(config);
            match analyzer.analyze_path(&file) {
                Ok(report) => {
                    print_json(&report, compact)?;
                    Ok(ExitCode::SUCCESS)
                }
                Err(failure) => {
                    tracing::warn!(file = %file.display(), error = %failure.error, "Analysis failed");
                    print_json(&failure.report, compact)?;
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Preprocess {
            input,
            output,
            steps,
        } => {
            let steps = if steps.is_empty() {
                config.preprocess_steps.clone()
            } else {
                parse_steps(&steps)?
            };
            let processor = DiagramPreprocessor::open(&input)?.run(&steps);
            processor.save(&output)?;
            tracing::info!(
                input = %input.display(),
                output = %output.display(),
                steps = ?steps,
                "Preprocessed image written"
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Health => {
            let report = Analyzer::new(config).health_check();
            print_json(&report, false)?;
            Ok(if report.is_healthy() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

/// Explicit path, then `$DIAGRAMLENS_CONFIG`, then defaults.
fn load_config(explicit: Option<&Path>) -> Result<AnalysisConfig> {
    let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    match explicit.map(Path::to_path_buf).or(from_env) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "Loading configuration");
            AnalysisConfig::load(&path)
        }
        None => Ok(AnalysisConfig::default()),
    }
}

fn parse_steps(names: &[String]) -> Result<Vec<PreprocessStep>> {
    names
        .iter()
        .filter(|name| !name.trim().is_empty())
        .map(|name| {
            PreprocessStep::from_name(name).ok_or_else(|| {
                DiagramLensError::Config(format!("unknown preprocessing step: {}", name))
            })
        })
        .collect()
}

fn print_json(value: &impl Serialize, compact: bool) -> Result<()> {
    let json = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_step_lists() {
        let cli = Cli::parse_from([
            "diagramlens",
            "preprocess",
            "in.png",
            "out.png",
            "--steps",
            "denoise,clean-background",
        ]);
        let Command::Preprocess { steps, .. } = cli.command else {
            panic!("expected preprocess");
        };
        assert_eq!(
            parse_steps(&steps).unwrap(),
            vec![PreprocessStep::Denoise, PreprocessStep::CleanBackground]
        );
    }

    #[test]
    fn unknown_step_is_a_config_error() {
        let err = parse_steps(&["blur".to_string()]).unwrap_err();
        assert!(matches!(err, DiagramLensError::Config(_)));
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::parse_from(["diagramlens", "analyze", "chart.png", "--no-ocr", "--compact"]);
        assert!(cli.no_ocr);
        assert!(matches!(cli.command, Command::Analyze { compact: true, .. }));
    }

    #[test]
    fn explicit_config_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"analyze_colors": false}"#).unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert!(!config.analyze_colors);
        assert!(config.classify_diagrams);
    }
}
