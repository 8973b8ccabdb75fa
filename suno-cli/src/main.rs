//! CLI entry point for suno

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use suno_agent::{Conversation, ReplySource};
use suno_core::config::{Config, ConfigLoader, LoggingConfig};
use suno_core::logging::init_logging;
use suno_core::session::SessionManager;
use suno_core::utils::expand_home;
use suno_manager::Manager;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{error, info};

const DEFAULT_CLI_SESSION: &str = "cli:direct";

#[derive(Parser)]
#[command(name = "suno")]
#[command(about = "Conversational assistant backend with voice and story generation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Override the configured bind host
        #[arg(long)]
        host: Option<String>,
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Chat from the terminal
    Chat {
        /// Send one message and exit; omit for an interactive session
        #[arg(short, long)]
        message: Option<String>,
        /// Session key for conversation continuity
        #[arg(short, long)]
        session: Option<String>,
    },
    /// Inspect stored sessions
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// List known sessions
    List,
    /// Clear one session's history
    Clear { key: String },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration with secrets masked
    Show,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let config_loader = if let Some(dir) = cli.config_dir {
        ConfigLoader::with_dir(dir)
    } else {
        ConfigLoader::new()
    };

    match cli.command {
        Commands::Serve { host, port } => run_serve(&config_loader, host, port).await?,
        Commands::Chat { message, session } => {
            run_chat(&config_loader, message, session).await?
        }
        Commands::Sessions { command } => match command {
            SessionCommands::List => run_sessions_list(&config_loader)?,
            SessionCommands::Clear { key } => run_sessions_clear(&config_loader, &key).await?,
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show => run_config_show(&config_loader)?,
            ConfigCommands::Init { force } => run_config_init(&config_loader, force)?,
        },
    }

    Ok(())
}

fn logging_config(config: &Config) -> LoggingConfig {
    let mut logging = config.logging.clone();
    logging.dir = expand_home(&logging.dir).to_string_lossy().to_string();
    logging
}

/// Run the HTTP server until Ctrl+C
async fn run_serve(loader: &ConfigLoader, host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = loader.load()?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    let _guard = init_logging(&logging_config(&config));

    println!("{}", style("Starting SunoAI server...").bold().cyan());
    println!("Model: {}", config.assistant.model);
    println!("Sessions: {:?}", config.sessions.backend);

    let manager = Manager::from_config(config)?;
    let addr = manager.addr()?;
    println!(
        "\n{}",
        style(format!("Listening on http://{}. Press Ctrl+C to stop.", addr)).green()
    );

    let (shutdown_tx, _) = broadcast::channel(1);
    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        let _ = signal_tx.send(());
    });

    manager.run(shutdown_tx).await?;
    println!("{}", style("Server stopped.").green());
    Ok(())
}

/// Chat from the terminal, either one message or a read-eval loop
async fn run_chat(
    loader: &ConfigLoader,
    message: Option<String>,
    session: Option<String>,
) -> Result<()> {
    let config = loader.load()?;
    let _guard = init_logging(&logging_config(&config));

    let conversation = Manager::from_config(config)?.state().conversation;
    let session_key = session.unwrap_or_else(|| DEFAULT_CLI_SESSION.to_string());

    if let Some(message) = message {
        return send_turn(&conversation, &session_key, &message).await;
    }

    println!("{}", style("SunoAI chat").bold().cyan());
    println!("Session: {}", session_key);
    println!(
        "Commands: {}, {}, {}\n",
        style("/reset").cyan(),
        style("/history").cyan(),
        style("/exit").cyan()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            "/exit" | "/quit" => break,
            "/reset" => {
                conversation.reset_session(&session_key).await?;
                println!("{}", style("History cleared.").yellow());
            }
            "/history" => {
                for msg in conversation.history(&session_key).await? {
                    println!("{} {}", style(format!("[{}]", msg.role)).dim(), msg.content);
                }
            }
            _ => send_turn(&conversation, &session_key, line).await?,
        }
    }

    Ok(())
}

async fn send_turn(conversation: &Arc<Conversation>, session_key: &str, text: &str) -> Result<()> {
    match conversation.handle_turn(session_key, text).await {
        Ok(reply) => {
            let label = match reply.source {
                ReplySource::Fallback => style("SunoAi (offline):").red().bold(),
                _ => style("SunoAi:").bold(),
            };
            println!("{} {}\n", label, reply.text);
            Ok(())
        }
        Err(e) => {
            error!("Error processing message: {}", e);
            anyhow::bail!("Failed to process message: {}", e);
        }
    }
}

fn run_sessions_list(loader: &ConfigLoader) -> Result<()> {
    let config = loader.load()?;
    let sessions = SessionManager::from_config(&config.sessions)?;
    let infos = sessions.list()?;

    println!("{}", style("Sessions").bold().cyan());
    if infos.is_empty() {
        println!("  (none stored in the {} backend)", sessions.backend_name());
        return Ok(());
    }
    for info in infos {
        let updated = info
            .updated_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {}  {} messages  {}",
            style(&info.key).bold(),
            info.message_count,
            style(updated).dim()
        );
    }
    Ok(())
}

async fn run_sessions_clear(loader: &ConfigLoader, key: &str) -> Result<()> {
    let config = loader.load()?;
    let sessions = SessionManager::from_config(&config.sessions)?;
    sessions.reset(key).await?;
    info!("Cleared session {}", key);
    println!("{} {}", style("Cleared").green(), key);
    Ok(())
}

fn run_config_show(loader: &ConfigLoader) -> Result<()> {
    let config = loader.load()?;
    let mut value = serde_json::to_value(&config)?;
    mask_secrets(&mut value);
    println!("{}", style(loader.config_path().display()).dim());
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn run_config_init(loader: &ConfigLoader, force: bool) -> Result<()> {
    let path = loader.config_path();
    if path.exists() && !force {
        println!(
            "Configuration already exists at {} (use --force to overwrite)",
            path.display()
        );
        return Ok(());
    }
    loader.save(&Config::default())?;
    println!(
        "{} {}",
        style("Configuration saved to").green().bold(),
        path.display()
    );
    println!("\nSet your keys in the file or via GROQ_API_KEY / ELEVENLABS_API_KEY.");
    Ok(())
}

/// Replace every non-empty `*api_key` value with a mask
fn mask_secrets(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if key.ends_with("api_key") {
                    if let Value::String(s) = v {
                        if !s.is_empty() {
                            *s = "********".to_string();
                        }
                    }
                } else {
                    mask_secrets(v);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(mask_secrets),
        _ => {}
    }
}
