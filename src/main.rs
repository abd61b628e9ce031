use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;
use walkdir::WalkDir;

use filigrane::{
    Config, ExportOutcome, RawFile, Session, WatermarkMode, WatermarkSettings,
    export::sinks::DirectorySink,
    registry::NameSanitizer,
    startup_checks,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Global options that apply to all commands
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Overrides `app.log_level` from the configuration
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watermark images and write them to the output directory
    Export {
        /// Image files or directories to add to the batch
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[arg(short, long, value_enum)]
        mode: Option<WatermarkMode>,

        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write one JPEG per image instead of a single archive
        #[arg(long)]
        single: bool,

        /// Rename an image before export, as POSITION=NAME (1-based)
        #[arg(long, value_parser = parse_rename)]
        rename: Vec<(usize, String)>,

        /// Clear the batch once the export is done
        #[arg(long)]
        clear: bool,

        /// Answer yes to confirmation prompts
        #[arg(short, long)]
        yes: bool,

        /// Print the export report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the display names images would get
    Names {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Run startup checks against the configuration and exit
    Check,
}

fn parse_rename(value: &str) -> Result<(usize, String), String> {
    let (position, name) = value
        .split_once('=')
        .ok_or_else(|| format!("expected POSITION=NAME, got '{}'", value))?;
    let position = position
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("invalid position '{}': {}", position, e))?;
    Ok((position, name.to_string()))
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// `--log-level` when given, otherwise `app.log_level` from the config.
fn log_level(cli: &Cli, config: &Config) -> Level {
    parse_level(
        cli.log_level
            .as_deref()
            .unwrap_or(config.app.log_level.as_str()),
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;

    // Set up logging before any work is done
    let level = log_level(&cli, &config);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Configuration loaded from: {:?}", cli.config);

    match cli.command {
        Commands::Export {
            inputs,
            mode,
            output,
            single,
            rename,
            clear,
            yes,
            json,
        } => {
            let mut config = config;
            if let Some(mode) = mode {
                config.watermark.mode = mode;
            }
            if let Some(output) = output {
                config.export.output_directory = output;
            }

            run_checks(&config).await?;

            let options = ExportRun {
                single,
                rename,
                clear,
                yes,
                json,
            };
            run_export(config, &inputs, options).await
        }
        Commands::Names { inputs } => {
            let sanitizer = NameSanitizer::from_config(&config.naming)?;
            for path in collect_inputs(&inputs) {
                let file_name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                println!("{} -> {}", path.display(), sanitizer.sanitize(&file_name));
            }
            Ok(())
        }
        Commands::Check => run_checks(&config).await,
    }
}

async fn run_checks(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    match startup_checks::perform_startup_checks(config).await {
        Ok(()) => Ok(()),
        Err(errors) => {
            for error in &errors {
                tracing::error!("Startup check failed: {}", error);
            }

            if errors.iter().any(|e| e.is_critical()) {
                tracing::error!("Critical startup check failed, exiting");
                Err("Critical startup check failed".into())
            } else {
                warn!("Non-critical startup checks failed, continuing");
                Ok(())
            }
        }
    }
}

struct ExportRun {
    single: bool,
    rename: Vec<(usize, String)>,
    clear: bool,
    yes: bool,
    json: bool,
}

async fn run_export(
    config: Config,
    inputs: &[PathBuf],
    run: ExportRun,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting {} export", config.app.name);
    info!("Watermark mode: {}", config.watermark.mode);
    info!("Output directory: {:?}", config.export.output_directory);

    let settings = WatermarkSettings::load(&config).await?;
    let sink = Arc::new(DirectorySink::new(config.export.output_directory.clone()));
    let session = Session::from_config(&config, settings, sink)?;

    let mut files = Vec::new();
    for path in collect_inputs(inputs) {
        match RawFile::read(&path).await {
            Ok(file) => files.push(file),
            Err(e) => warn!("Failed to read {:?}: {}", path, e),
        }
    }

    let mut state = session.add_images(files).await;
    if state.is_empty && run.single {
        println!("No images to export");
        return Ok(());
    }

    for (position, name) in &run.rename {
        let target = position
            .checked_sub(1)
            .and_then(|index| state.entries.get(index))
            .map(|entry| entry.id);
        match target {
            Some(id) => state = session.rename(id, name).await?,
            None => warn!("No image at position {}, ignoring rename", position),
        }
    }

    if run.single {
        let exports = session.export_each().await?;
        if run.json {
            println!("{}", serde_json::to_string_pretty(&exports)?);
        } else {
            for outcome in &exports.outcomes {
                print_outcome(outcome);
            }
            for skipped in &exports.skipped {
                println!("Skipped {}: {}", skipped.display_name, skipped.reason);
            }
        }
    } else {
        let outcome = session.export_all().await?;
        if run.json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        } else {
            print_outcome(&outcome);
        }
    }

    if run.clear {
        let confirm = |prompt: &str| run.yes || ask(prompt);
        let state = session.remove_all(&confirm).await;
        if state.is_empty {
            info!("Batch cleared");
        }
    }

    Ok(())
}

fn print_outcome(outcome: &ExportOutcome) {
    match outcome {
        ExportOutcome::Completed(report) => {
            println!(
                "Wrote {} ({} image(s))",
                report.file_name,
                report.exported.len()
            );
            for skipped in &report.skipped {
                println!("  skipped {}: {}", skipped.display_name, skipped.reason);
            }
        }
        ExportOutcome::AlreadyRunning => println!("Export already running"),
    }
}

fn ask(prompt: &str) -> bool {
    print!("{} [y/N] ", prompt);
    if std::io::stdout().flush().is_err() {
        return false;
    }

    let mut answer = String::new();
    match std::io::stdin().lock().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}

/// Expand directories into the files beneath them, sorted by path.
fn collect_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .collect();
            found.sort();
            files.extend(found);
        } else if input.is_file() {
            files.push(input.clone());
        } else {
            warn!("Input {:?} does not exist, skipping", input);
        }
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_flag_overrides_config() {
        let cli = Cli::parse_from(["filigrane", "--log-level", "debug", "check"]);
        let mut config = Config::default();
        config.app.log_level = "warn".to_string();

        assert_eq!(log_level(&cli, &config), Level::DEBUG);
    }

    #[test]
    fn test_log_level_falls_back_to_config() {
        let cli = Cli::parse_from(["filigrane", "check"]);
        assert!(cli.log_level.is_none());

        let mut config = Config::default();
        config.app.log_level = "WARN".to_string();
        assert_eq!(log_level(&cli, &config), Level::WARN);
        assert_eq!(parse_level("verbose"), Level::INFO);
    }
}
