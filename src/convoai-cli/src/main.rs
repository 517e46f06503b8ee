//! ConvoAI CLI - AI Conversation Tool
//!
//! A command-line tool for listening to two AI participants talk a topic through.

mod setup;

use std::env;
use std::io;
use std::path::PathBuf;
use std::process::{self, ExitCode};

use clap::{Parser, ValueEnum};
use colored::Colorize;
use convoai_core::config::{self, DEFAULT_VOICE_PAIR};
use convoai_core::orchestrator::{ConversationCallback, DEFAULT_MAX_TURNS};
use convoai_core::{
    Backend, Config, ConversationError, ConversationEvent, Generator, KokoroSynthesizer,
    OllamaGenerator, OpenAiGenerator, Participant, RodioEngine, SpeechSynchronizer, TextNarrator,
    TurnOrchestrator,
};
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "convoai",
    version,
    about = "AI Conversation Tool - Listen to two AIs talk a topic through",
    long_about = "A CLI tool that runs a spoken conversation between two AI participants, using a local Ollama model or an OpenAI-compatible API and kokoro text-to-speech."
)]
struct Cli {
    /// The topic to discuss (prompted for when omitted)
    #[arg(value_name = "TOPIC")]
    topic: Option<String>,

    /// Use one of the built-in topics instead of typing one
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u8).range(1..=5), conflicts_with = "topic")]
    suggested: Option<u8>,

    /// Number of conversation turns
    #[arg(short, long, default_value_t = DEFAULT_MAX_TURNS, value_name = "TURNS")]
    turns: usize,

    /// Voice pair: 1 Adam & Sarah, 2 Michael & Nicole, 3 Eric & Sky, 4 George & Emma
    #[arg(short, long, default_value_t = DEFAULT_VOICE_PAIR, value_parser = clap::value_parser!(u8).range(1..=4), value_name = "PAIR")]
    voices: u8,

    /// Generation backend (overrides the config file)
    #[arg(long, value_enum, value_name = "BACKEND")]
    backend: Option<BackendArg>,

    /// Model name (overrides the config file)
    #[arg(short, long, value_name = "MODEL")]
    model: Option<String>,

    /// Path to a TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print replies without speech
    #[arg(long)]
    no_audio: bool,

    /// Exit after one conversation instead of offering another
    #[arg(long)]
    once: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Ollama,
    Openai,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Ollama => Backend::Ollama,
            BackendArg::Openai => Backend::OpenAI,
        }
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    watch_interrupt(tokio::signal::ctrl_c(), || {
        println!("\n\n{}", "👋 Conversation interrupted. Goodbye!".yellow());
        process::exit(1);
    });

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\n{} {}", "❌ Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// Call `on_interrupt` once `signal` resolves.
///
/// The watch runs on its own runtime task, so it fires even while the
/// conversation holds the main thread in a stdin read or in synthesis.
fn watch_interrupt<S, F>(signal: S, on_interrupt: F) -> JoinHandle<()>
where
    S: Future<Output = io::Result<()>> + Send + 'static,
    F: FnOnce() + Send + 'static,
{
    tokio::spawn(async move {
        match signal.await {
            Ok(()) => on_interrupt(),
            Err(e) => tracing::warn!(error = %e, "could not listen for Ctrl-C"),
        }
    })
}

/// Diagnostics go to stderr so they never interleave with narrated text.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => config::default_config(),
    };
    if let Some(backend) = cli.backend {
        config.generation.backend = backend.into();
    }
    if let Some(model) = &cli.model {
        config.generation.model = model.clone();
    }

    let mut topic = match (&cli.topic, cli.suggested) {
        (Some(topic), _) => topic.clone(),
        (None, Some(n)) => config::suggested_topic(n as usize).to_string(),
        (None, None) => setup::choose_topic().await?,
    };

    let voices = config::voice_pair(cli.voices as usize);
    let generator = build_generator(&config)?;

    // Speech backends are created once and lent to every session
    let mut speech = if cli.no_audio {
        None
    } else {
        init_speech(voices).await?
    };

    let mut orchestrator =
        TurnOrchestrator::new(config.participants(voices), generator, &topic, cli.turns)
            .with_sampling(config.sampling)
            .with_prompts(config.prompts.clone())
            .with_callback(create_console_callback());

    loop {
        print_header(&config, orchestrator.participants(), cli.turns, speech.is_some());

        match speech.as_mut() {
            Some((synthesizer, engine)) => {
                let mut narrator =
                    SpeechSynchronizer::new(synthesizer, engine, config.speech, io::stdout());
                orchestrator.run(&mut narrator).await?;
            }
            None => {
                let mut narrator = TextNarrator::new(io::stdout());
                orchestrator.run(&mut narrator).await?;
            }
        }

        println!();
        println!("{}", "✅ Conversation completed!".bright_green().bold());

        if cli.once || !setup::confirm("\nStart another conversation? (y/n): ").await? {
            break;
        }

        topic = setup::choose_topic().await?;
        orchestrator.restart(&topic, cli.turns);
    }

    Ok(())
}

/// Create the generation backend named in the config.
fn build_generator(config: &Config) -> Result<Box<dyn Generator>, ConversationError> {
    let generation = &config.generation;

    match generation.backend {
        Backend::Ollama => {
            let host = env::var("OLLAMA_HOST").unwrap_or_else(|_| "localhost:11434".to_string());
            let host = if host.starts_with("http://") || host.starts_with("https://") {
                host
            } else {
                format!("http://{host}")
            };
            Ok(Box::new(OllamaGenerator::new(
                host,
                &generation.model,
                generation.retries,
            )?))
        }
        Backend::OpenAI => {
            let api_base = env::var("OPENAI_API_BASE")
                .or_else(|_| env::var("OPENAI_BASE_URL"))
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

            let api_key = env::var("OPENAI_API_KEY").unwrap_or_else(|_| {
                eprintln!(
                    "{}",
                    "Warning: OPENAI_API_KEY not set. API calls may fail.".yellow()
                );
                String::new()
            });

            Ok(Box::new(OpenAiGenerator::new(
                &api_base,
                &api_key,
                &generation.model,
                generation.retries,
            )?))
        }
    }
}

/// Load the TTS model and open the audio device.
///
/// An unknown voice is fatal. Anything else falls back to text-only
/// narration with a warning.
async fn init_speech(
    voices: (&str, &str),
) -> Result<Option<(KokoroSynthesizer, RodioEngine)>, ConversationError> {
    println!("\n{}", "🚀 Initializing speech...".bright_blue());

    let synthesizer = match KokoroSynthesizer::new().await {
        Ok(synthesizer) => synthesizer,
        Err(e) => {
            warn_text_only(&e);
            return Ok(None);
        }
    };
    synthesizer.validate_voice(voices.0)?;
    synthesizer.validate_voice(voices.1)?;

    match RodioEngine::open_default() {
        Ok(engine) => Ok(Some((synthesizer, engine))),
        Err(e) => {
            warn_text_only(&e);
            Ok(None)
        }
    }
}

fn warn_text_only(error: &ConversationError) {
    tracing::warn!(%error, "speech unavailable");
    eprintln!(
        "{}",
        format!("⚠️ Speech unavailable ({error}). Continuing with text only.").yellow()
    );
}

fn print_header(config: &Config, participants: &[Participant; 2], turns: usize, speech: bool) {
    println!();
    println!("{}", "═".repeat(60).bright_blue());
    println!("{}", format!("  {}", "ConvoAI".bold()).bright_blue().bold());
    println!("{}", "═".repeat(60).bright_blue());
    println!();
    println!("{}", "Participants:".bold());
    for (i, p) in participants.iter().enumerate() {
        let voice = if speech { p.voice_id.as_str() } else { "text only" };
        println!(
            "  {}. {} - voice {}",
            i + 1,
            p.name.bright_cyan(),
            voice.yellow()
        );
    }
    println!(
        "{} {} ({} turns)",
        "Model:".bold(),
        config.generation.model.dimmed(),
        turns
    );
}

/// Create a callback that prints conversation events to the console.
fn create_console_callback() -> ConversationCallback {
    Box::new(move |event| match event {
        ConversationEvent::ConversationStart { topic } => {
            println!();
            println!("{}", "═".repeat(60).bright_magenta());
            println!(
                "{}",
                format!("CONVERSATION START: {}", topic).bright_magenta().bold()
            );
            println!("{}", "═".repeat(60).bright_magenta());
        }
        ConversationEvent::NewAngle { prompt } => {
            println!("\n{} {}", "💡 New angle:".bright_yellow(), prompt);
        }
        ConversationEvent::Thinking { name, elapsed } => {
            println!();
            println!(
                "{}",
                format!("⏱️  {} thought for {:.2} seconds", name, elapsed.as_secs_f64()).dimmed()
            );
        }
        ConversationEvent::Rejected { name, .. } => {
            println!(
                "{}",
                format!("⚠️ {} had nothing to say, trying to restart...", name).yellow()
            );
        }
        ConversationEvent::Rescue { .. } => {
            println!(
                "{}",
                "💡 Introducing a new angle to the conversation...".bright_yellow()
            );
        }
        ConversationEvent::TurnRecorded { turn, utterance } => {
            tracing::debug!(turn, speaker = %utterance.speaker, "turn recorded");
        }
        ConversationEvent::ConversationEnd => {
            println!();
            println!("{}", "═".repeat(60).bright_magenta());
            println!("{}", "CONVERSATION END".bright_magenta().bold());
            println!("{}", "═".repeat(60).bright_magenta());
        }
    })
}
