// voicecmd - Spoken command classifier
// Module declarations and CLI entry point

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

pub mod audio;
pub mod commands;
pub mod config;
pub mod engine;
pub mod features;
pub mod model;
pub mod pipeline;

use crate::config::AppConfig;
use crate::engine::Engine;

#[derive(Debug, Parser)]
#[command(name = "voicecmd", version, about = "Classify short spoken commands")]
struct Cli {
    /// Settings file (defaults to ./voicecmd.json, then the user config dir)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Append a JSONL trace of every pipeline stage to this file
    #[arg(long, global = true, value_name = "PATH")]
    trace: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Classify one or more .wav/.mp3 files
    Classify {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print one JSON object per file instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the feature vector of a clip as JSON
    Features { file: PathBuf },

    /// Print the loaded artifact summary
    Inspect,

    /// Record from the default input device until Enter, then classify
    #[cfg(feature = "mic")]
    Record {
        /// Also save the captured WAV here
        #[arg(long, value_name = "PATH")]
        save: Option<PathBuf>,
    },
}

pub fn run() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let engine = match load_engine(&cli) {
        Ok(engine) => engine,
        Err(e) => {
            log::error!("Startup failed: {}", e);
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Classify { files, json } => classify_files(&engine, &files, json),
        Command::Features { file } => print_features(&engine, &file),
        Command::Inspect => print_json(&commands::describe_engine(&engine)),
        #[cfg(feature = "mic")]
        Command::Record { save } => record_and_classify(&engine, save),
    }
}

fn load_engine(cli: &Cli) -> Result<Engine, engine::StartupError> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(ref trace) = cli.trace {
        config.trace_path = Some(trace.clone());
    }
    Engine::load(&config)
}

fn classify_files(engine: &Engine, files: &[PathBuf], json: bool) -> ExitCode {
    let mut failures = 0;

    for path in files {
        match commands::classify_file(engine, path) {
            Ok(output) => {
                if json {
                    match serde_json::to_string(&output) {
                        Ok(line) => println!("{}", line),
                        Err(e) => log::error!("Failed to serialize result: {}", e),
                    }
                } else {
                    if let Some(ref advisory) = output.advisory {
                        println!("{}: {}", path.display(), advisory);
                    }
                    println!(
                        "{}: {} ({})",
                        path.display(),
                        output.display_label,
                        output.confidence_display
                    );
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("{}: {}", path.display(), e);
            }
        }
    }

    if failures > 0 {
        log::warn!("{} of {} files failed", failures, files.len());
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn print_features(engine: &Engine, path: &Path) -> ExitCode {
    match commands::extract_file_features(engine, path) {
        Ok(report) => print_json(&report),
        Err(e) => {
            eprintln!("{}: {}", path.display(), e);
            ExitCode::FAILURE
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(feature = "mic")]
fn record_and_classify(engine: &Engine, save: Option<PathBuf>) -> ExitCode {
    let recorder = audio::recording::Recorder::new();

    if let Err(e) = recorder.start() {
        eprintln!("Failed to start recording: {}", e);
        return ExitCode::FAILURE;
    }
    println!("Recording... press Enter to stop");

    let mut line = String::new();
    if let Err(e) = std::io::stdin().read_line(&mut line) {
        log::warn!("Failed to read stdin: {}", e);
    }

    let data = match recorder.stop() {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Failed to stop recording: {}", e);
            return ExitCode::FAILURE;
        }
    };
    log::info!(
        "Recording stopped: {} samples, {} ms",
        data.samples.len(),
        data.duration_ms()
    );

    let wav = match data.to_wav() {
        Ok(wav) => wav,
        Err(e) => {
            eprintln!("Failed to convert to WAV: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(path) = save {
        if let Err(e) = std::fs::write(&path, &wav) {
            log::warn!("Failed to save recording to {}: {}", path.display(), e);
        }
    }

    let input = commands::ClassifyInput {
        audio_data: wav,
        mime_type: Some("audio/wav".to_string()),
    };
    match commands::classify_audio(engine, input) {
        Ok(output) => {
            if let Some(advisory) = output.advisory {
                println!("{}", advisory);
            }
            println!("{} ({})", output.display_label, output.confidence_display);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "voicecmd",
            "classify",
            "a.wav",
            "b.mp3",
            "--trace",
            "trace.jsonl",
        ])
        .unwrap();

        assert_eq!(cli.trace, Some(PathBuf::from("trace.jsonl")));
        match cli.command {
            Command::Classify { files, json } => {
                assert_eq!(files.len(), 2);
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_classify_requires_files() {
        assert!(Cli::try_parse_from(["voicecmd", "classify"]).is_err());
    }
}
