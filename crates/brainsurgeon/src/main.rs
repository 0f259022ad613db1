// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! BrainSurgeon - durable message bus and maintenance worker for OpenClaw
//! sessions.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod pending;
mod request;
mod serve;
mod status;
mod trash;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use brainsurgeon_config::BrainsurgeonConfig;

/// BrainSurgeon - durable message bus for OpenClaw session maintenance.
#[derive(Parser, Debug)]
#[command(name = "brainsurgeon", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the API worker until SIGINT/SIGTERM.
    Serve,
    /// Ask the worker to externalize old tool outputs from a session.
    Prune {
        #[arg(long)]
        agent: String,
        #[arg(long)]
        session: String,
        /// Number of most recent tool outputs to keep inline.
        #[arg(long)]
        threshold: Option<u32>,
        /// Wait up to this many seconds for the response.
        #[arg(long, value_name = "SECS")]
        wait: Option<u64>,
    },
    /// Ask the worker to bring one externalized tool output back.
    Restore {
        #[arg(long)]
        agent: String,
        #[arg(long)]
        session: String,
        #[arg(long)]
        tool_call: String,
        /// Wait up to this many seconds for the response.
        #[arg(long, value_name = "SECS")]
        wait: Option<u64>,
    },
    /// List unprocessed messages.
    Pending {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Delete processed messages older than the given age.
    Purge {
        #[arg(long, value_name = "DAYS")]
        older_than_days: u32,
    },
    /// Inspect and manage trashed extracted payloads.
    Trash {
        #[command(subcommand)]
        action: TrashCommand,
    },
    /// Show store health and backlog.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
}

#[derive(Subcommand, Debug)]
enum TrashCommand {
    /// List trashed sessions, newest first.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Move a session's payloads back out of the trash.
    Restore {
        #[arg(long)]
        agent: String,
        #[arg(long)]
        session: String,
    },
    /// Permanently delete a session's trashed payloads.
    Delete {
        #[arg(long)]
        agent: String,
        #[arg(long)]
        session: String,
    },
    /// Delete every entry past its retention.
    Cleanup,
}

fn load_config(path: Option<&PathBuf>) -> BrainsurgeonConfig {
    let loaded = match path {
        Some(p) => brainsurgeon_config::load_and_validate_path(p),
        None => brainsurgeon_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            brainsurgeon_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("brainsurgeon={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("brainsurgeon: use --help for available commands");
        return;
    };

    let config = load_config(cli.config.as_ref());
    init_tracing(&config.logging.log_level);

    let result = match command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Prune {
            agent,
            session,
            threshold,
            wait,
        } => request::run_prune(&config, agent, session, threshold, wait).await,
        Commands::Restore {
            agent,
            session,
            tool_call,
            wait,
        } => request::run_restore(&config, agent, session, tool_call, wait).await,
        Commands::Pending { json } => pending::run_pending(&config, json).await,
        Commands::Purge { older_than_days } => pending::run_purge(&config, older_than_days).await,
        Commands::Trash { action } => match action {
            TrashCommand::List { json } => trash::run_list(&config, json).await,
            TrashCommand::Restore { agent, session } => {
                trash::run_restore(&config, &agent, &session).await
            }
            TrashCommand::Delete { agent, session } => {
                trash::run_delete(&config, &agent, &session).await
            }
            TrashCommand::Cleanup => trash::run_cleanup(&config).await,
        },
        Commands::Status { json, plain } => status::run_status(&config, json, plain).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
