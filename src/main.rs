//! Messenger CLI - one-to-one chat in the terminal
//!
//! Account onboarding, a live conversation list and live threads backed by
//! a document store with subscriptions.

mod api;
mod auth;
mod config;
mod error;
mod models;
mod store;
mod sync;
mod tui;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "messenger")]
#[command(about = "Terminal messenger for one-to-one chats", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and sign in
    Signup {
        email: String,

        /// At least 6 characters
        password: String,

        /// Profile image to upload
        #[arg(short, long)]
        image: Option<PathBuf>,
    },

    /// Sign in to an existing account
    Login { email: String, password: String },

    /// Sign out
    Logout,

    /// Show the current session
    Status,

    /// List users you can message
    Users,

    /// List recent chats
    Chats {
        /// Maximum number of chats to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Read the conversation with a user
    Read {
        /// User id or email (from `users` output)
        with: String,

        /// Maximum number of messages to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Send a message
    Send {
        /// User id or email (from `users` output)
        #[arg(short, long)]
        to: String,

        /// Message content
        message: String,
    },

    /// Launch the terminal user interface
    Tui,
}

/// Log to stderr, or to a file while the TUI owns the terminal.
fn init_logging(verbose: bool, to_file: bool) -> Result<()> {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if to_file {
        let dir = config::Config::data_dir()?;
        std::fs::create_dir_all(&dir).context("Failed to create data directory")?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("messenger.log"))
            .context("Failed to open log file")?;
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, matches!(cli.command, Commands::Tui))?;

    match cli.command {
        Commands::Signup {
            email,
            password,
            image,
        } => {
            tracing::info!("Creating account...");
            auth::signup(&email, &password, image.as_deref()).await?;
        }
        Commands::Login { email, password } => {
            tracing::info!("Signing in...");
            auth::login(&email, &password).await?;
        }
        Commands::Logout => {
            auth::logout().await?;
        }
        Commands::Status => {
            auth::status().await?;
        }
        Commands::Users => {
            api::list_users().await?;
        }
        Commands::Chats { limit } => {
            api::list_chats(limit).await?;
        }
        Commands::Read { with, limit } => {
            api::read_messages(&with, limit).await?;
        }
        Commands::Send { to, message } => {
            tracing::info!("Sending message...");
            api::send_message(&to, &message).await?;
        }
        Commands::Tui => {
            tui::run().await?;
        }
    }

    Ok(())
}
