//! Parley - a conversational response engine that learns from its conversations
//!
//! Runs the HTTP gateway, an interactive terminal chat, or one-off operator
//! commands against the persisted knowledge base.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use parley::{
    config::{KvConfig, ParleyConfig, PostgresConfig},
    engine::ResponseEngine,
    gateway,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "parley")]
#[command(version)]
#[command(about = "Conversational response engine that learns request/reply pairs")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "PARLEY_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "PARLEY_LOG_JSON")]
    log_json: bool,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

/// Environment and flag overrides applied on top of the config file
#[derive(Args)]
struct Overrides {
    /// Primary snapshot path
    #[arg(long, env = "PARLEY_MEMORY_PATH", global = true)]
    memory_path: Option<PathBuf>,

    /// Durable mirror path
    #[arg(long, env = "PARLEY_DURABLE_PATH", global = true)]
    durable_path: Option<PathBuf>,

    /// Periodic save interval in seconds
    #[arg(long, env = "PARLEY_SAVE_INTERVAL_SECS", global = true)]
    save_interval_secs: Option<u64>,

    /// Number of backup copies to keep
    #[arg(long, env = "PARLEY_BACKUP_RETENTION", global = true)]
    backup_retention: Option<usize>,

    /// Write the snapshot synchronously after every learning event
    #[arg(long, env = "PARLEY_SYNC_SAVE", global = true)]
    sync_save: bool,

    /// Key-value backend base URL
    #[arg(long, env = "PARLEY_KV_URL", global = true)]
    kv_url: Option<String>,

    /// Key-value backend bearer token
    #[arg(long, env = "PARLEY_KV_TOKEN", global = true, hide_env_values = true)]
    kv_token: Option<String>,

    /// Postgres connection URL
    #[arg(long, env = "PARLEY_DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,
}

impl Overrides {
    fn apply(self, config: &mut ParleyConfig) {
        let storage = &mut config.storage;
        if let Some(path) = self.memory_path {
            storage.primary_path = path;
        }
        if let Some(path) = self.durable_path {
            storage.durable_path = Some(path);
        }
        if let Some(secs) = self.save_interval_secs {
            storage.save_interval_secs = secs;
        }
        if let Some(retention) = self.backup_retention {
            storage.backup_retention = retention;
        }
        if self.sync_save {
            storage.sync_after_learn = true;
        }

        if let Some(url) = self.kv_url {
            let kv = config.remote.kv.get_or_insert_with(|| KvConfig {
                url: String::new(),
                key: "parley-memory".to_string(),
                token: None,
            });
            kv.url = url;
        }
        if let Some(token) = self.kv_token {
            if let Some(kv) = config.remote.kv.as_mut() {
                kv.token = Some(token);
            }
        }
        if let Some(url) = self.database_url {
            let pg = config.remote.postgres.get_or_insert_with(|| PostgresConfig {
                url: String::new(),
                table: "parley_memory".to_string(),
                id: "parley-memory".to_string(),
            });
            pg.url = url;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },

    /// Chat interactively in the terminal
    Chat,

    /// Send a single message and print the reply
    Ask {
        /// Message text
        message: String,
    },

    /// Teach one input/response pair
    Learn {
        /// Prompt text
        input: String,

        /// Reply to learn
        response: String,

        /// Quality score (0-100); scored automatically when omitted
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=100))]
        quality: Option<u8>,
    },

    /// Import a JSON array of {input, response, quality?} records
    Import {
        /// Training data file
        path: PathBuf,
    },

    /// Show knowledge base statistics
    Stats,

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("parley={},tower_http=debug", log_level).into()),
        )
        .with(
            cli.log_json
                .then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)),
        )
        .with(
            (!cli.log_json)
                .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
        )
        .init();

    let mut config = match &cli.config {
        Some(path) => ParleyConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ParleyConfig::default(),
    };
    cli.overrides.apply(&mut config);

    if let Commands::Config { default } = cli.command {
        let shown = if default { ParleyConfig::default() } else { config };
        println!("{}", toml::to_string_pretty(&shown)?);
        return Ok(());
    }

    let engine = Arc::new(ResponseEngine::open(config).await?);
    let result = run(Arc::clone(&engine), cli.command).await;

    engine.shutdown().await?;
    result
}

async fn run(engine: Arc<ResponseEngine>, command: Commands) -> Result<()> {
    match command {
        Commands::Serve { host, port } => {
            let server = &engine.config().server;
            let host = host.unwrap_or_else(|| server.host.clone());
            let port = port.unwrap_or(server.port);
            gateway::serve(Arc::clone(&engine), &host, port, shutdown_signal()).await?;
            tracing::info!("Shutting down...");
        }
        Commands::Chat => run_chat(&engine).await?,
        Commands::Ask { message } => {
            let conversation = engine.begin_conversation().await;
            let reply = engine.respond(&conversation, &message).await?;
            println!("{}", reply.text);
        }
        Commands::Learn {
            input,
            response,
            quality,
        } => {
            let outcome = engine.teach(&input, &response, quality).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Import { path } => {
            let summary = engine
                .import(&path)
                .await
                .with_context(|| format!("Failed to import {}", path.display()))?;
            println!(
                "Imported {} records ({} rejected)",
                summary.accepted, summary.rejected
            );
        }
        Commands::Stats => {
            println!("{}", serde_json::to_string_pretty(&engine.status().await)?);
        }
        Commands::Config { .. } => {}
    }
    Ok(())
}

async fn run_chat(engine: &ResponseEngine) -> Result<()> {
    let conversation = engine.begin_conversation().await;
    println!("Parley is listening. Type a message, or Ctrl+D to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = shutdown_signal() => None,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        match engine.respond(&conversation, &line).await {
            Ok(reply) => println!("parley> {}", reply.text),
            Err(e) => println!("parley> ({})", e),
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
