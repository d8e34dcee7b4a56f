//! Binary entry point for enrolla.
//!
//! Serves the HTTP API and offers a few operator commands.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// CLI output goes to stdout/stderr directly
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use enrolla::config::EnrollaConfig;
use enrolla::observability::{self, InitOptions};
use enrolla::services::{AppContext, ContextAssembler, SUMMARY_LOG_LIMIT, StatisticsEngine};
use enrolla::storage::Database;
use enrolla::{StudentId, http};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// Enrolla - applicant CRM backend for admissions teams.
#[derive(Parser)]
#[command(name = "enrolla")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "ENROLLA_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API.
    Serve {
        /// Bind address (overrides config).
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides config).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print cohort statistics as JSON.
    Stats,

    /// Print the AI summary for a student.
    Summary {
        /// Student identifier.
        id: String,

        /// Print the assembled dossier instead of calling the backend.
        #[arg(long)]
        context_only: bool,
    },

    /// Manage configuration.
    Config {
        /// Show current configuration (secrets redacted).
        #[arg(long)]
        show: bool,
    },

    /// Apply schema migrations.
    Migrate,
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Main entry point.
fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match EnrollaConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let _observability = match observability::init(
        &config,
        InitOptions {
            verbose: cli.verbose,
            metrics: matches!(cli.command, Commands::Serve { .. }),
        },
    ) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize observability: {e}");
            return ExitCode::FAILURE;
        },
    };

    match run_command(cli.command, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(command: Commands, config: EnrollaConfig) -> CliResult {
    match command {
        Commands::Serve { host, port } => cmd_serve(config, host, port),
        Commands::Stats => cmd_stats(&config),
        Commands::Summary { id, context_only } => cmd_summary(&config, &id, context_only),
        Commands::Config { show } => cmd_config(&config, show),
        Commands::Migrate => cmd_migrate(&config),
    }
}

fn open_database(config: &EnrollaConfig) -> enrolla::Result<Database> {
    Database::open(
        &config.database.path,
        Duration::from_millis(config.database.timeout_ms),
    )
}

/// Serve command.
fn cmd_serve(mut config: EnrollaConfig, host: Option<String>, port: Option<u16>) -> CliResult {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    // Built before the runtime: the LLM client is blocking.
    let ctx = AppContext::from_config(&config)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(http::serve(ctx.clone(), addr))?;
    drop(runtime);
    Ok(())
}

/// Stats command.
fn cmd_stats(config: &EnrollaConfig) -> CliResult {
    let db = open_database(config)?;
    let stats = StatisticsEngine::compute(&db)?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

/// Summary command.
fn cmd_summary(config: &EnrollaConfig, id: &str, context_only: bool) -> CliResult {
    let id = StudentId::parse(id)?;
    let ctx = AppContext::from_config(config)?;
    let (student, logs) = ctx
        .students()
        .with_history(&id, Some(SUMMARY_LOG_LIMIT))?;
    if context_only {
        println!("{}", ContextAssembler::assemble(&student, &logs));
    } else {
        println!("{}", ctx.summaries().generate(&student, &logs));
    }
    Ok(())
}

/// Config command.
fn cmd_config(config: &EnrollaConfig, show: bool) -> CliResult {
    if show {
        print!("{}", config.to_redacted_toml()?);
    } else {
        println!("Use --show to display configuration");
    }
    Ok(())
}

/// Migrate command.
fn cmd_migrate(config: &EnrollaConfig) -> CliResult {
    let db = open_database(config)?;
    println!(
        "Database {} at schema version {}",
        config.database.path.display(),
        db.schema_version()?
    );
    Ok(())
}
