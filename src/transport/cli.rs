//! Terminal front end

use crate::config::Config;
use crate::session::{
    ChatMessage, McpConnector, MessageKind, MessageSink, SessionError, SessionInitializer,
};
use anyhow::Result;
use async_trait::async_trait;
use colored::Colorize;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Prints chat messages to stdout
pub struct TerminalSink;

#[async_trait]
impl MessageSink for TerminalSink {
    async fn send(&self, message: ChatMessage) {
        let text = match message.kind {
            MessageKind::Ready => message.content.green().to_string(),
            MessageKind::QueryIdentified => message.content.cyan().to_string(),
            MessageKind::Answer => message.content,
            MessageKind::Error => message.content.red().to_string(),
        };
        println!("{}\n", text);
    }
}

/// Interactive chat: one session for the life of the process
pub async fn run_chat(initializer: SessionInitializer) -> Result<()> {
    let session = initializer.start().await?;
    let sink = TerminalSink;

    sink.send(ChatMessage::ready()).await;
    println!("{}", "Type 'exit' or 'quit' to leave.\n".dimmed());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let input = line.trim();

        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "exit" | "quit") {
            println!("Goodbye!");
            break;
        }

        session.handle_message(input, &sink).await;
    }

    tracing::info!(session = %session.id(), "Chat session ended");
    Ok(())
}

/// Answer a single question and exit
pub async fn run_ask(initializer: SessionInitializer, question: &str) -> Result<()> {
    let session = initializer.start().await?;

    match session.handle_message(question, &TerminalSink).await {
        Some(_) => Ok(()),
        None => anyhow::bail!("The question could not be answered"),
    }
}

/// Connect to the MCP endpoint and list its tools
pub async fn run_tools(config: &Config) -> Result<()> {
    let url = config
        .mcp_server_url()
        .ok_or(SessionError::EndpointNotConfigured)?;

    let client = McpConnector::from_config(&config.mcp)
        .connect_client(url)
        .await
        .map_err(SessionError::Connection)?;

    let info = client.server_info();
    println!(
        "{} {} {}",
        "Connected to".green(),
        info.name.bold(),
        info.version.dimmed()
    );
    println!();

    if client.tools().is_empty() {
        println!("{}", "The server exposes no tools.".yellow());
        return Ok(());
    }

    for tool in client.tools() {
        let summary = tool.description.lines().next().unwrap_or_default();
        println!("  {}  {}", tool.name.cyan(), summary);
    }

    Ok(())
}
