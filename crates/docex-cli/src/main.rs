//! CLI application for template-driven threat-intelligence document extraction.

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{batch, config, formats, process, templates};

/// docex - Classify threat-intel documents and extract their fields
#[derive(Parser)]
#[command(name = "docex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a single document
    Process(process::ProcessArgs),

    /// Process many documents concurrently
    Batch(batch::BatchArgs),

    /// Inspect and test templates
    Templates(templates::TemplatesArgs),

    /// List supported document formats
    Formats,

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Process(args) => process::run(args, config_path).await,
        Commands::Batch(args) => batch::run(args, config_path).await,
        Commands::Templates(args) => templates::run(args, config_path).await,
        Commands::Formats => formats::run(config_path).await,
        Commands::Config(args) => config::run(args, config_path).await,
    }
}
