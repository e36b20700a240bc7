//! # DevStack Main Entry Point
//!
//! File: cli/src/main.rs
//! Repository: https://github.com/devstack-cli/devstack
//!
//! **NOTE:** DevStack manages disposable local development services. It is
//! not a deployment tool and must never be pointed at production data.
//!
//! ## Overview
//!
//! This file serves as the main entry point for the DevStack CLI application.
//! It handles:
//! - Command-line argument parsing using Clap
//! - Setting up the logging system based on verbosity flags
//! - Routing execution to appropriate command handlers
//!
//! ## Architecture
//!
//! The application follows a modular command structure:
//! - Each command (`up`, `attach`, `down`, `rm`) is defined as a variant in the `Commands` enum
//! - Commands are mapped to handler functions in their respective modules
//! - All errors are propagated to this level for consistent handling
//!
//! ## Examples
//!
//! Basic DevStack usage:
//!
//! ```bash
//! # Get help
//! devstack --help
//!
//! # Run a command with increased verbosity
//! devstack -vv up
//! ```
//!
//! Command processing flow:
//! 1. Parse command-line args via Clap
//! 2. Configure logging based on verbosity level
//! 3. Route to appropriate command handler
//! 4. Format and display any errors that occur
//!
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

// Declare the top-level modules of the CLI crate.
mod commands; // Handles specific command logic (up, attach, down, rm).
mod common; // Contains shared utilities (docker, registry).
mod core; // Core infrastructure (errors, config, resolution).

/// Defines the top-level command-line arguments structure using Clap's derive macros.
#[derive(Parser, Debug)]
#[command(
    name = "devstack",
    about = "DevStack: local development services, declared and reconciled",
    long_about = "Manage auxiliary development services (databases, brokers, caches) as\n\
                  Docker containers declared in configuration. Brings declared state and\n\
                  running state together instead of replaying start scripts.",
    propagate_version = true,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

/// Enum defining all available commands.
#[derive(Parser, Debug)]
enum Commands {
    #[command(alias = "u")]
    Up(commands::up::UpArgs),
    #[command(alias = "a")]
    Attach(commands::attach::AttachArgs),
    #[command(alias = "d")]
    Down(commands::down::DownArgs),
    Rm(commands::rm::RmArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Use anyhow::Result directly
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    tracing::debug!("Parsed CLI arguments: {:?}", cli);

    let command_result = match cli.command {
        Commands::Up(args) => commands::up::handle_up(args).await,
        Commands::Attach(args) => commands::attach::handle_attach(args).await,
        Commands::Down(args) => commands::down::handle_down(args).await,
        Commands::Rm(args) => commands::rm::handle_rm(args).await,
    };

    if let Err(e) = command_result {
        tracing::error!("Command execution failed: {:?}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
