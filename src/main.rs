//! CTA Sensor Agent CLI
//!
//! Watches workstation activity and asks contextual task-analysis questions.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use cta_sensor_agent::{
    build_producers,
    collector::{check_permission, HAS_NATIVE_HOOK},
    config::{Config, ModelConfig, SourceConfig},
    interaction::{ConsolePrompter, HintQuestionGenerator, InteractionController, QaLog},
    transparency::create_shared_log_with_persistence,
    Session, TelemetryBuffer, CAPTURE_NOTICE, VERSION,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cta-sensor")]
#[command(version = VERSION)]
#[command(about = "Live cognitive task analysis sensor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a monitoring session (Ctrl+C to stop)
    Start {
        /// Producers to run (window, input, files, or all)
        #[arg(long)]
        sources: Option<String>,

        /// Root directory for the filesystem watch
        #[arg(long)]
        watch: Option<PathBuf>,

        /// Collect typed answers instead of recording speech
        #[arg(long)]
        no_audio: bool,
    },

    /// Show configuration and cumulative statistics
    Status,

    /// Print the most recent question/answer records
    History {
        /// Number of records to show
        #[arg(long, short = 'n', default_value = "10")]
        count: usize,
    },

    /// Display what the agent captures
    Notice,

    /// Show configuration
    Config {
        /// Write the effective configuration to the config file for editing
        #[arg(long)]
        write: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            sources,
            watch,
            no_audio,
        } => cmd_start(sources.as_deref(), watch, no_audio),
        Commands::Status => cmd_status(),
        Commands::History { count } => cmd_history(count),
        Commands::Notice => {
            println!("{CAPTURE_NOTICE}");
            Ok(())
        }
        Commands::Config { write } => cmd_config(write),
    }
}

fn cmd_start(sources: Option<&str>, watch: Option<PathBuf>, no_audio: bool) -> anyhow::Result<()> {
    let mut config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "could not load config, using defaults");
        Config::default()
    });
    if let Some(sources) = sources {
        config.sources = SourceConfig::from_csv(sources);
    }
    if watch.is_some() {
        config.watch_root = watch;
    }
    if no_audio {
        config.interaction.record_audio = false;
    }

    if !config.sources.any_enabled() {
        bail!("At least one source must be enabled (window, input or files)");
    }
    config
        .ensure_directories()
        .context("could not create data directory")?;

    println!("CTA Sensor Agent v{VERSION}");
    println!("{CAPTURE_NOTICE}");

    let permitted = HAS_NATIVE_HOOK && check_permission();
    let input_available = config.sources.input && permitted;
    if config.sources.input && !HAS_NATIVE_HOOK {
        eprintln!("Warning: keys and clicks cannot be captured on this platform.");
        eprintln!(
            "Without input events every quiet {}s counts as an idle pause.",
            config.trigger.idle_cooldown.as_secs()
        );
        eprintln!("Consider: cta-sensor start --sources window,files");
    } else if config.sources.input && !permitted {
        eprintln!("Warning: Input Monitoring permission not granted; keys and clicks will not be captured.");
        eprintln!("Grant it under System Settings > Privacy & Security > Input Monitoring.");
    }

    println!("Starting session...");
    println!("  Window titles: {}", enabled(config.sources.window));
    println!(
        "  Keys and clicks: {}",
        match (config.sources.input, input_available) {
            (false, _) => "disabled",
            (true, true) => "enabled",
            (true, false) => "unavailable",
        }
    );
    println!(
        "  File changes: {} ({})",
        enabled(config.sources.files),
        config.resolved_watch_root().display()
    );
    println!("  Data directory: {}", config.data_path.display());

    let controller = build_controller(&config);

    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("could not set Ctrl+C handler")?;

    let stats = create_shared_log_with_persistence(config.stats_path());
    let buffer = Arc::new(TelemetryBuffer::new(config.buffer_capacity));
    let mut session = Session::new(config.clone(), buffer, stats.clone());
    session.start(build_producers(&config), controller)?;

    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(200));
    }

    println!();
    println!("Stopping session...");
    let log_path = session.stop()?;
    println!("Session log: {}", log_path.display());
    println!("QA log: {}", config.qa_log_path().display());
    println!();
    println!("{}", stats.summary());
    Ok(())
}

fn enabled(on: bool) -> &'static str {
    if on {
        "enabled"
    } else {
        "disabled"
    }
}

/// Controller wired to the language model when an API key is available,
/// otherwise to the built-in hints with typed answers.
fn build_controller(config: &Config) -> InteractionController {
    let log = QaLog::new(config.qa_log_path());
    let prompter = Box::new(ConsolePrompter::stdio());

    #[cfg(feature = "openai")]
    if config.model.api_key().is_some() {
        match openai_client(config) {
            Ok(client) => {
                println!("  Questions: {}", config.model.question_model);
                let controller = InteractionController::new(
                    config.interaction.clone(),
                    Box::new(client),
                    prompter,
                    log,
                );
                return with_audio(controller, config);
            }
            Err(e) => eprintln!("Warning: {e}; falling back to built-in questions"),
        }
    }

    println!(
        "  Questions: built-in (set {} to use a language model)",
        ModelConfig::API_KEY_ENV
    );
    println!("  Answers: typed");
    InteractionController::new(
        config.interaction.clone(),
        Box::new(HintQuestionGenerator),
        prompter,
        log,
    )
}

#[cfg(feature = "openai")]
fn openai_client(
    config: &Config,
) -> Result<cta_sensor_agent::BlockingOpenAiClient, cta_sensor_agent::interaction::ModelError> {
    let inner = cta_sensor_agent::OpenAiClient::from_env(config.model.clone())?
        .with_context_window_secs(config.context_window.as_secs());
    cta_sensor_agent::BlockingOpenAiClient::new(inner)
}

#[cfg(feature = "openai")]
fn with_audio(controller: InteractionController, config: &Config) -> InteractionController {
    use cta_sensor_agent::interaction::CommandRecorder;

    if !config.interaction.record_audio {
        println!("  Answers: typed");
        return controller;
    }

    match openai_client(config) {
        Ok(transcriber) => {
            println!(
                "  Answers: spoken, {}s via `{}`",
                config.interaction.record_duration.as_secs(),
                config.interaction.record_command.join(" ")
            );
            let recorder = CommandRecorder::new(
                config.interaction.record_command.clone(),
                config.interaction.sample_rate,
            );
            controller.with_audio(Box::new(recorder), Box::new(transcriber))
        }
        Err(e) => {
            eprintln!("Warning: transcription unavailable ({e}); answers will be typed");
            controller
        }
    }
}

fn cmd_status() -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("CTA Sensor Agent Status");
    println!("=======================");
    println!();

    println!(
        "Native input hook: {}",
        if HAS_NATIVE_HOOK {
            "available"
        } else {
            "unavailable"
        }
    );
    println!(
        "Input Monitoring Permission: {}",
        if check_permission() {
            "Granted ✓"
        } else {
            "Not Granted ✗"
        }
    );
    println!(
        "Language model key ({}): {}",
        ModelConfig::API_KEY_ENV,
        if config.model.api_key().is_some() {
            "set"
        } else {
            "not set"
        }
    );
    println!();

    println!("Configuration:");
    println!("  Window titles: {}", enabled(config.sources.window));
    println!("  Keys and clicks: {}", enabled(config.sources.input));
    println!("  File changes: {}", enabled(config.sources.files));
    println!("  Watch root: {}", config.resolved_watch_root().display());
    println!("  Spoken answers: {}", enabled(config.interaction.record_audio));
    println!("  Data directory: {}", config.data_path.display());
    println!();

    let stats_path = config.stats_path();
    if !stats_path.exists() {
        println!("No previous session data found.");
        return Ok(());
    }

    let content = std::fs::read_to_string(&stats_path)
        .with_context(|| format!("could not read {}", stats_path.display()))?;
    let stats: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("could not parse {}", stats_path.display()))?;

    println!("Cumulative Statistics:");
    for (key, label) in [
        ("sessions", "Sessions"),
        ("events_observed", "Events observed"),
        ("triggers_fired", "Triggers fired"),
        ("questions_asked", "Questions asked"),
        ("answers_recorded", "Answers recorded"),
        ("answers_missing", "Declined or unanswered"),
        ("model_failures", "Question generation failures"),
    ] {
        if let Some(value) = stats.get(key) {
            println!("  {label}: {value}");
        }
    }
    Ok(())
}

fn cmd_history(count: usize) -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();
    let log = QaLog::new(config.qa_log_path());

    if !log.path().exists() {
        println!("No questions recorded yet in {}", log.path().display());
        return Ok(());
    }

    let records = log
        .read_recent(count)
        .with_context(|| format!("could not read {}", log.path().display()))?;

    for record in records {
        println!("[{}]", record.ts);
        println!("  Q: {}", record.question);
        match record.answer {
            Some(answer) => println!("  A: {answer}"),
            None => println!("  A: (none)"),
        }
        println!("  Context: {} line(s)", record.context.len());
        println!();
    }
    Ok(())
}

fn cmd_config(write: bool) -> anyhow::Result<()> {
    let config = Config::load().context("could not load config")?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);

    if write {
        config.save().context("could not write config")?;
        println!();
        println!("Written to {:?}", Config::config_path());
    }
    Ok(())
}
