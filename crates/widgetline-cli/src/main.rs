use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod fixtures;

#[derive(Parser)]
#[command(name = "widgetline-cli", version, about = "Widgetline CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a widget timeline and print it as JSON
    Timeline(commands::timeline::TimelineArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Inspect the persisted location
    Location {
        #[command(subcommand)]
        action: commands::location::LocationAction,
    },
    /// Settings shared with the widgets
    Settings {
        #[command(subcommand)]
        action: commands::settings::SettingsAction,
    },
}

#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout carries command output.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("widgetline_core=info,widgetline_cli=info")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Timeline(args) => commands::timeline::run(args).await,
        Commands::Config { action } => commands::config::run(action),
        Commands::Location { action } => commands::location::run(action),
        Commands::Settings { action } => commands::settings::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
