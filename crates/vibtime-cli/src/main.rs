use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "vibtime-cli", version, about = "Vibtime CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a time as a vibration pattern
    Pattern(commands::pattern::PatternArgs),
    /// Run recorded sensor samples through the detection pipeline
    Replay(commands::replay::ReplayArgs),
    /// Run the service live on samples read from stdin
    Listen(commands::listen::ListenArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Safety limits and persisted runtime state
    Safety {
        #[command(subcommand)]
        action: commands::safety::SafetyAction,
    },
    /// Print watch-mode, safety and usage state as JSON
    Status,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Pattern(args) => commands::pattern::run(args),
        Commands::Replay(args) => commands::replay::run(args),
        Commands::Listen(args) => commands::listen::run(args),
        Commands::Config { action } => commands::config::run(action),
        Commands::Safety { action } => commands::safety::run(action),
        Commands::Status => commands::status::run(),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
