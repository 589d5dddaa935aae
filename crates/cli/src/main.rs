//! Mindloop CLI — the main entry point.
//!
//! Commands:
//! - `chat`   — Interactive chat or single-message mode (offline providers)
//! - `status` — Show the assembled runtime's configuration

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use mindloop_config::AppConfig;
use mindloop_core::message::{FinalOutput, UserMessage};
use mindloop_core::tool::ToolRegistry;
use mindloop_memory::InMemoryVectorStore;
use mindloop_pipeline::Runtime;

mod offline;

use offline::{ClockTool, DeclarativeIngestor, EchoAgent, HashEmbedder, OfflineModel};

#[derive(Parser)]
#[command(
    name = "mindloop",
    about = "Mindloop — conversational assistant runtime",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the offline assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// The user id to chat as
        #[arg(short, long, default_value = "user")]
        user: String,
    },

    /// Show runtime configuration and component status
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Chat { message, user } => chat(message, user).await?,
        Commands::Status => status().await?,
    }

    Ok(())
}

fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os("MINDLOOP_CONFIG") {
        return PathBuf::from(path);
    }
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(".mindloop")
        .join("config.toml")
}

/// Assemble the runtime with offline providers: everything runs locally,
/// no credentials needed.
async fn build_runtime() -> anyhow::Result<Runtime> {
    let config = AppConfig::load(config_path())?;

    let embedder = Arc::new(HashEmbedder::new(config.embedder.dimension));
    let vectors = Arc::new(InMemoryVectorStore::new(embedder.clone()));
    let ingestion = Arc::new(DeclarativeIngestor::new(vectors.clone()));

    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(ClockTool));

    let runtime = Runtime::builder()
        .config(config)
        .model(Arc::new(OfflineModel))
        .embedder(embedder)
        .vectors(vectors)
        .ingestion(ingestion)
        .agent(Arc::new(EchoAgent))
        .tools(tools)
        .bootstrap()
        .await?;
    Ok(runtime)
}

async fn chat(message: Option<String>, user: String) -> anyhow::Result<()> {
    let runtime = build_runtime().await?;

    if let Some(text) = message {
        let output = runtime.handle(UserMessage::for_user(&user, text)).await?;
        print_output(&output);
        return Ok(());
    }

    println!("mindloop offline chat — empty line or Ctrl-D to quit");
    let stdin = std::io::stdin();
    loop {
        print!("{user}> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let text = line.trim();
        if text.is_empty() {
            break;
        }

        let output = runtime.handle(UserMessage::for_user(&user, text)).await?;
        print_output(&output);
    }

    runtime.shutdown();
    Ok(())
}

fn print_output(output: &FinalOutput) {
    match output {
        FinalOutput::Chat { content, why, .. } => {
            println!("{content}");
            let recalled = why.memory.episodic.len()
                + why.memory.declarative.len()
                + why.memory.procedural.len();
            if recalled > 0 {
                println!(
                    "  (recalled {} memories: {} episodic / {} declarative / {} procedural)",
                    recalled,
                    why.memory.episodic.len(),
                    why.memory.declarative.len(),
                    why.memory.procedural.len()
                );
            }
        }
        FinalOutput::Error { name, description } => {
            eprintln!("{name}: {description}");
        }
    }
}

async fn status() -> anyhow::Result<()> {
    let runtime = build_runtime().await?;

    println!("config:   {:#?}", runtime.config());
    println!("tools:    {}", runtime.tools().len());
    println!("sessions: {}", runtime.sessions().user_count().await);
    Ok(())
}
