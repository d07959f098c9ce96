use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;

use streamchat::app::App;
use streamchat::config::{Config, ModelSource};
use streamchat::controller::{CycleOutcome, IngestionController, SubmitOutcome};
use streamchat::export::ExportAdapter;
use streamchat::logging::{self, LogTarget};
use streamchat::models::ModelRegistry;
use streamchat::transcript::TranscriptEvent;
use streamchat::transport::{ChatTransport, HttpTransport};
use streamchat::ui;

#[derive(Parser)]
#[command(name = "streamchat")]
#[command(version)]
#[command(about = "Chat with a local inference server, streaming replies as they arrive", long_about = None)]
struct Cli {
    /// Config file (default: ~/.streamchat/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Server origin, e.g. http://localhost:8000
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Preferred model identifier
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive chat (default)
    Chat,
    /// List the models offered by the server
    Models,
    /// Send one message and print the streamed reply
    Ask {
        message: String,
        /// Export the conversation after the reply completes
        #[arg(long)]
        export: bool,
    },
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(model) = &cli.model {
        config.models.default_model = Some(model.clone());
    }
    config.validate()?;
    Ok(config)
}

async fn build_registry<T: ChatTransport>(config: &Config, transport: &T) -> Result<ModelRegistry> {
    if config.models.source == ModelSource::Fixed {
        let model = config
            .models
            .default_model
            .clone()
            .context("models.default_model is required for a fixed model source")?;
        return Ok(ModelRegistry::fixed(model));
    }

    let mut registry = ModelRegistry::new();
    registry
        .fetch_models(transport)
        .await
        .context("Failed to fetch models")?;
    if let Some(preferred) = config.models.default_model.as_deref() {
        registry.prefer(preferred);
    }
    Ok(registry)
}

async fn list_models(config: &Config) -> Result<()> {
    let transport = HttpTransport::new(config.base_url.clone())?;
    let registry = build_registry(config, &transport).await?;

    if registry.models().is_empty() {
        println!("📭 No models found at {}", transport.base_url());
        return Ok(());
    }

    println!("📋 Models at {}:\n", transport.base_url());
    for model in registry.models() {
        let marker = if registry.selection() == Some(model.as_str()) { "*" } else { " " };
        println!("  {} {}", marker, model);
    }
    Ok(())
}

async fn ask(config: &Config, message: &str, export: bool) -> Result<()> {
    let transport = HttpTransport::new(config.base_url.clone())?;
    let registry = build_registry(config, &transport).await?;

    let mut controller = IngestionController::new(transport, config.stream_format);
    let mut events = controller.subscribe();

    if let SubmitOutcome::Rejected(reason) = controller.submit(message, registry.selection()) {
        anyhow::bail!("Message not sent: {reason}");
    }

    let mut stdout = io::stdout();
    while controller.is_busy() {
        controller.advance().await;
        while let Ok(event) = events.try_recv() {
            match event {
                TranscriptEvent::FragmentAppended { index, len } => {
                    if let Some(turn) = controller.transcript().get(index) {
                        let content = turn.content();
                        write!(stdout, "{}", &content[content.len() - len..])?;
                        stdout.flush()?;
                    }
                }
                TranscriptEvent::Replaced { index } => {
                    if let Some(turn) = controller.transcript().get(index) {
                        eprintln!("\n{}", turn.content());
                    }
                }
                _ => {}
            }
        }
    }
    writeln!(stdout)?;

    if export {
        let adapter = ExportAdapter::new(config.export.enabled, config.export_dir());
        let path = adapter
            .export_to_file(controller.transport(), controller.transcript())
            .await
            .context("Failed to export chat history")?;
        eprintln!("💾 Exported to {}", path.display());
    }

    if controller.last_outcome() == Some(CycleOutcome::Failed) {
        anyhow::bail!("Request failed");
    }
    Ok(())
}

async fn run_chat(config: &Config) -> Result<()> {
    let app = App::from_config(config)?;

    let mut terminal = ui::init_terminal()?;
    let result = app.run(&mut terminal).await;
    ui::restore_terminal(&mut terminal)?;

    result
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        None | Some(Commands::Chat) => {
            let log_file = config.log_file();
            logging::init(LogTarget::File(&log_file), &config.logging.level)?;
            run_chat(&config).await
        }
        Some(Commands::Models) => {
            logging::init(LogTarget::Stderr, &config.logging.level)?;
            list_models(&config).await
        }
        Some(Commands::Ask { message, export }) => {
            logging::init(LogTarget::Stderr, &config.logging.level)?;
            ask(&config, &message, export).await
        }
    }
}
