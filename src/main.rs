use anyhow::Result;
use cbchat::config::{Config, ConfigOverrides};
use cbchat::session::SessionInitializer;
use cbchat::transport;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cbchat")]
#[command(author, version, about = "cbchat - ask questions about your database in plain language", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Model backend: openai, claude or ollama
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Model name for the selected backend
    #[arg(long, global = true)]
    model: Option<String>,

    /// MCP server SSE endpoint (overrides MCP_SERVER_URL)
    #[arg(long, global = true)]
    mcp_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat,

    /// Ask a single question and exit
    Ask {
        /// The question to ask
        question: String,
    },

    /// List the tools exposed by the MCP server
    Tools,

    /// Start the HTTP chat API
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "cbchat=debug"
    } else {
        "cbchat=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.apply_overrides(&ConfigOverrides {
        provider: cli.provider,
        model: cli.model,
        mcp_url: cli.mcp_url,
    });

    match cli.command {
        Commands::Chat => {
            transport::cli::run_chat(SessionInitializer::new(config)).await?;
        }
        Commands::Ask { question } => {
            transport::cli::run_ask(SessionInitializer::new(config), &question).await?;
        }
        Commands::Tools => {
            transport::cli::run_tools(&config).await?;
        }
        Commands::Serve { port, host } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            tracing::info!("Starting HTTP server on {}:{}", host, port);
            transport::http::run_http_server(&host, port, SessionInitializer::new(config)).await?;
        }
    }

    Ok(())
}
