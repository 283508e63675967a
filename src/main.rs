use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use birdbot::app::App;
use birdbot::tui::{self, EventHandler, TICK_RATE};
use birdbot::{
    handler, markdown, ui, ChatController, Config, FileSelection, HttpBackend, Persona, Sender,
    TextInput, Transcript,
};

#[derive(Parser)]
#[command(name = "birdbot")]
#[command(version, about = "Chat with BirdBot: ask about birds or send a photo to identify one")]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Origin of the chat server serving the LLM routes
    #[arg(long, global = true)]
    server: Option<String>,

    /// Full URL of the classification endpoint
    #[arg(long, global = true)]
    classifier: Option<String>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question and print the conversation
    Ask {
        /// Your question
        text: String,
    },
    /// Identify the bird in an image and print the conversation
    Identify {
        /// Path to the image
        path: PathBuf,
    },
    /// Print the effective configuration
    Config {
        /// Also write it to the config file, so CLI overrides stick
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The TUI owns the terminal, so it logs to a file.
    init_logging(cli.verbose, cli.command.is_none())?;

    let config = load_config(&cli)?;
    let endpoints = config.endpoints()?;
    let persona = Persona::from_config(&config, &endpoints);
    tracing::info!(
        classifier = %endpoints.classifier,
        general = %endpoints.general,
        enrich = %endpoints.enrich,
        "endpoints resolved"
    );

    let transcript = Transcript::new();
    let text_input = TextInput::new();
    let file_input = FileSelection::new();
    let controller = ChatController::new(
        Arc::new(HttpBackend::new(endpoints.clone())),
        transcript.clone(),
        text_input.clone(),
        file_input.clone(),
        persona,
    );

    match cli.command {
        None => {
            let app = App::new(controller, transcript, text_input, file_input);
            run_tui(app).await?
        }
        Some(Commands::Ask { text }) => {
            text_input.set(text);
            if let Some(handle) = controller.submit_text() {
                handle.await?;
            }
            print_transcript(&controller);
        }
        Some(Commands::Identify { path }) => {
            file_input.select(path);
            if let Some(handle) = controller.submit_image() {
                handle.await?;
            }
            print_transcript(&controller);
        }
        Some(Commands::Config { save }) => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            if save {
                let path = match &cli.config {
                    Some(path) => path.clone(),
                    None => Config::get_config_path()?,
                };
                config.save_to(&path)?;
                tracing::info!(path = %path.display(), "configuration saved");
            }
            println!("classifier: {}", endpoints.classifier);
            println!("general:    {}", endpoints.general);
            println!("enrich:     {}", endpoints.enrich);
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let file_config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not load config, using defaults");
            Config::new()
        }),
    };

    let overrides = Config {
        server_url: cli.server.clone(),
        classifier_url: cli.classifier.clone(),
        ..Config::new()
    };

    Ok(file_config.merge(overrides))
}

fn init_logging(verbose: bool, to_file: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "birdbot=debug" } else { "birdbot=info" })
    });
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if to_file {
        let log_path = log_file_path()?;
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("opening log file {}", log_path.display()))?;
        builder
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init()
            .map_err(|e| anyhow!(e))
    } else {
        builder
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| anyhow!(e))
    }
}

fn log_file_path() -> Result<PathBuf> {
    let data_dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow!("Could not determine data directory"))?;
    Ok(data_dir.join("birdbot").join("birdbot.log"))
}

fn print_transcript(controller: &ChatController<HttpBackend>) {
    let assistant = &controller.persona().assistant_name;
    for msg in controller.transcript().snapshot() {
        let who = match msg.sender {
            Sender::User => "You",
            Sender::Bot => assistant.as_str(),
        };
        println!("{}: {}", who, markdown::to_plain(&msg.text));
        if let Some(name) = msg.image.as_deref().and_then(birdbot::preview::filename_from_url) {
            println!("  [image: {}]", name);
        }
    }
}

async fn run_tui(mut app: App<HttpBackend>) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new(TICK_RATE);

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event)?,
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    if !app.pending.is_empty() {
        tracing::info!(pending = app.pending.len(), "quitting with requests in flight");
    }
    result
}
