//! CLI for driving and inspecting tracked generations.

use crate::client::GenerationClient;
use crate::config::{Config, gentrack_config_dir};
use crate::error::Error;
use crate::flow::{self, GenerateOutcome, GenerationInput};
use crate::tracker::{GenerationTracker, JobKind, UploadedFile};
use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Client-side tracking for long-running generation jobs
#[derive(Parser, Debug)]
#[command(name = "gentrack", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a generation and wait for the backend
    Generate(GenerateArgs),
    /// Show the tracked generation record
    Status(StatusArgs),
    /// Reset the tracked generation record
    Clear(ClearArgs),
    /// View or modify configuration
    Config(ConfigArgs),
}

/// Job kind to track
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum KindArg {
    #[default]
    Podcast,
    Conversation,
}

impl From<KindArg> for JobKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Podcast => Self::Podcast,
            KindArg::Conversation => Self::Conversation,
        }
    }
}

#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Job kind to track
    #[arg(short, long, value_enum, default_value = "podcast")]
    pub kind: KindArg,

    /// Text content to generate from (use "-" to read from stdin)
    #[arg(short, long, conflicts_with = "files")]
    pub text: Option<String>,

    /// File to generate from (repeatable)
    #[arg(short = 'f', long = "file")]
    pub files: Vec<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Job kind to inspect
    #[arg(short, long, value_enum, default_value = "podcast")]
    pub kind: KindArg,
}

#[derive(Parser, Debug)]
pub struct ClearArgs {
    /// Job kind to reset
    #[arg(short, long, value_enum, default_value = "podcast")]
    pub kind: KindArg,
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Set a configuration value
    Set {
        /// Key to set (base-url, podcast-timeout-mins, conversation-timeout-mins,
        /// request-timeout-secs)
        key: String,
        /// Value to set
        value: String,
    },
    /// Show config file path
    Path,
}

fn open_tracker(config: &Config, kind: JobKind) -> Result<GenerationTracker> {
    Ok(GenerationTracker::open(
        kind,
        &config.data_dir,
        config.timeout_for(kind),
    )?)
}

/// Run the generate command.
pub async fn generate(args: GenerateArgs) -> ExitCode {
    match generate_inner(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

async fn generate_inner(args: GenerateArgs) -> Result<ExitCode> {
    if args.verbose || std::env::var("GENTRACK_LOG").is_ok() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }

    let config = Config::load()?;
    let kind: JobKind = args.kind.into();
    let mut tracker = open_tracker(&config, kind)?;

    // Mount-time check: a restored record past its threshold is abandoned.
    if let Some(stale) = flow::startup_check(&mut tracker) {
        eprintln!(
            "Warning: a previous {kind} job was abandoned after {} minutes; its outcome is unknown.",
            stale.elapsed_minutes
        );
    }

    let input = read_input(&args)?;
    let client = GenerationClient::new(config.base_url.clone(), config.request_timeout());

    // Ctrl-C is a soft cancel: local bookkeeping only.
    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling locally (the backend may keep processing)...");
            ctrl_c_cancel.cancel();
        }
    });

    let tracker = Mutex::new(tracker);
    match flow::run_generation(&tracker, &client, input, &cancel).await {
        Ok(GenerateOutcome::Completed(response)) => {
            println!("{}", response.message);
            if let Some(secs) = response.processing_time {
                println!("Processing time: {secs:.1}s");
            }
            Ok(if response.success {
                ExitCode::from(0)
            } else {
                ExitCode::from(1)
            })
        }
        Ok(GenerateOutcome::Stale) => Ok(ExitCode::from(0)),
        Err(Error::Client(e)) => {
            eprintln!("Generation failed: {e}");
            Ok(ExitCode::from(1))
        }
        Err(e) => Err(e.into()),
    }
}

fn read_input(args: &GenerateArgs) -> Result<GenerationInput> {
    if !args.files.is_empty() {
        let files = args
            .files
            .iter()
            .map(|p| UploadedFile::from_path(p.as_path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        return Ok(GenerationInput::Documents(files));
    }

    let text = match args.text.as_deref() {
        Some("-") => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer.trim().to_string()
        }
        Some(text) => text.to_string(),
        None => anyhow::bail!("provide --text or at least one --file"),
    };
    Ok(GenerationInput::Text(text))
}

/// Run the status command.
#[must_use]
pub fn status(args: StatusArgs) -> ExitCode {
    match status_inner(&args) {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

fn status_inner(args: &StatusArgs) -> Result<()> {
    let config = Config::load()?;
    let kind: JobKind = args.kind.into();
    let tracker = open_tracker(&config, kind)?;
    let state = tracker.state();

    if state.is_generating {
        println!(
            "{kind}: generating for {} min ({:?} mode)",
            tracker.elapsed_minutes(),
            state.mode
        );
        if tracker.is_timed_out() {
            println!(
                "  exceeded the {} min threshold; outcome unknown (run `gentrack clear`)",
                config.timeout_for(kind).as_secs() / 60
            );
        }
    } else {
        println!("{kind}: idle");
    }

    if !state.custom_text.is_empty() {
        println!(
            "  retained text: {} chars",
            state.custom_text.chars().count()
        );
    }
    if !state.uploaded_file_metadata.is_empty() {
        println!("  {} file(s) selected:", state.uploaded_file_metadata.len());
        for meta in &state.uploaded_file_metadata {
            println!("    {} ({} bytes, {})", meta.name, meta.size, meta.mime_type);
        }
        if tracker.files().is_empty() {
            println!("  files must be re-attached before resubmitting");
        }
    }
    Ok(())
}

/// Run the clear command.
#[must_use]
pub fn clear(args: ClearArgs) -> ExitCode {
    match clear_inner(&args) {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

fn clear_inner(args: &ClearArgs) -> Result<()> {
    let config = Config::load()?;
    let kind: JobKind = args.kind.into();
    let mut tracker = open_tracker(&config, kind)?;
    tracker.clear_generation();
    println!("Cleared {kind} generation record");
    Ok(())
}

/// Run the config command.
#[must_use]
pub fn config(args: ConfigArgs) -> ExitCode {
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            return ExitCode::from(1);
        }
    };

    match args.action {
        None => {
            println!("base-url: {}", config.base_url);
            println!("data-dir: {}", config.data_dir.display());
            println!("podcast-timeout-mins: {}", config.podcast_timeout_mins);
            println!(
                "conversation-timeout-mins: {}",
                config.conversation_timeout_mins
            );
            println!("request-timeout-secs: {}", config.request_timeout_secs);
            ExitCode::from(0)
        }
        Some(ConfigAction::Path) => {
            println!("{}", gentrack_config_dir().join("config.toml").display());
            ExitCode::from(0)
        }
        Some(ConfigAction::Set { key, value }) => {
            let mut config = config;
            match key.as_str() {
                "base-url" => config.base_url = value,
                "podcast-timeout-mins" => match value.parse() {
                    Ok(v) => config.podcast_timeout_mins = v,
                    Err(_) => {
                        eprintln!("Invalid value for {key}: {value}");
                        return ExitCode::from(1);
                    }
                },
                "conversation-timeout-mins" => match value.parse() {
                    Ok(v) => config.conversation_timeout_mins = v,
                    Err(_) => {
                        eprintln!("Invalid value for {key}: {value}");
                        return ExitCode::from(1);
                    }
                },
                "request-timeout-secs" => match value.parse() {
                    Ok(v) => config.request_timeout_secs = v,
                    Err(_) => {
                        eprintln!("Invalid value for {key}: {value}");
                        return ExitCode::from(1);
                    }
                },
                _ => {
                    eprintln!(
                        "Unknown key: {key}. Valid keys: base-url, podcast-timeout-mins, conversation-timeout-mins, request-timeout-secs"
                    );
                    return ExitCode::from(1);
                }
            }
            if let Err(e) = config.save() {
                eprintln!("Failed to save config: {e}");
                return ExitCode::from(1);
            }
            println!("Updated {key}");
            ExitCode::from(0)
        }
    }
}
