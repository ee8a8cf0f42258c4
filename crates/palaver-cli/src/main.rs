//! Palaver CLI - interactive console adapter for the session gateway
//!
//! Thin adapter over palaver-core: loads configuration, constructs the
//! pooled upstream client and session store, spawns the expiry sweeper,
//! and drives a session through a line-oriented console loop.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use palaver_core::{
    spawn_sweeper, Agent, ChatAgent, Config, ConsoleProgress, ProgressHandler, SessionStore,
    UpstreamClient,
};

const INSTRUCTIONS: &str =
    "You are a helpful assistant. Answer concisely and do not invent facts.";

#[derive(Parser)]
#[command(name = "palaver")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Session gateway console for a pooled model upstream", long_about = None)]
struct Cli {
    /// Configuration file (TOML); defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model override (defaults to the configured model)
    #[arg(short, long)]
    model: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(model) = cli.model {
        config.upstream.model = model;
    }
    config.validate().context("invalid configuration")?;

    let upstream = Arc::new(
        UpstreamClient::new(config.upstream.clone())
            .context("failed to construct upstream client")?,
    );
    upstream
        .initialize()
        .await
        .context("failed to initialize connection pool")?;

    let store = Arc::new(SessionStore::new(Duration::from_secs(
        config.session.ttl_secs,
    )));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = spawn_sweeper(
        Arc::clone(&store),
        Duration::from_secs(config.session.sweep_interval_secs),
        shutdown_rx,
    );

    let progress: Arc<dyn ProgressHandler> = Arc::new(ConsoleProgress);
    let mut session_id = store.create_session(Arc::clone(&progress));
    println!("session {session_id} ready");
    println!("commands: /new, /clear, /results, /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line {
            "/quit" => break,
            "/new" => {
                store.delete_session(&session_id);
                session_id = store.create_session(Arc::clone(&progress));
                println!("started session {session_id}");
                continue;
            }
            "/clear" => {
                match store.get_session(&session_id) {
                    Some(session) => {
                        session.clear_conversation();
                        println!("conversation cleared");
                    }
                    None => println!("session expired; send a message or /new to start one"),
                }
                continue;
            }
            "/results" => {
                match store.get_session(&session_id) {
                    Some(session) => match session.get_result(ChatAgent::KIND) {
                        Some(stored) => println!("{}", serde_json::to_string_pretty(&stored)?),
                        None => println!("no stored result"),
                    },
                    None => println!("session expired; send a message or /new to start one"),
                }
                continue;
            }
            _ => {}
        }

        // The sweep may have evicted an idle session; start a fresh one
        // transparently rather than failing the request.
        let session = match store.get_session(&session_id) {
            Some(session) => session,
            None => {
                session_id = store.create_session(Arc::clone(&progress));
                info!(%session_id, "previous session expired, started a new one");
                store
                    .get_session(&session_id)
                    .context("freshly created session missing")?
            }
        };

        let upstream = Arc::clone(&upstream);
        let agent = session.use_agent(ChatAgent::KIND, move |progress| {
            Ok(Arc::new(ChatAgent::new(upstream, progress, INSTRUCTIONS)) as Arc<dyn Agent>)
        })?;
        session.update_last_active(ChatAgent::KIND);

        match agent.process(line).await {
            Ok(text) => {
                println!("{text}");
                session.store_result(ChatAgent::KIND, serde_json::json!(text), HashMap::new());
            }
            Err(e) => eprintln!("error: {e}"),
        }
    }

    info!("shutting down");
    let _ = shutdown_tx.send(true);
    let _ = sweeper.await;
    upstream.close().await;
    Ok(())
}

fn print_prompt() {
    use std::io::Write;
    print!("> ");
    let _ = std::io::stdout().flush();
}
