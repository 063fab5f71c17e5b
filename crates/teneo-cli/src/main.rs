use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "teneo-cli", version, about = "Teneo community node client")]
struct Cli {
    /// State file (default: ~/.config/teneo-node/localStorage.json)
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,

    /// Config file (default: ~/.config/teneo-node/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Without a subcommand an interactive menu is shown
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the node with the stored identity or a given user id
    Run {
        /// User id to run as; stored for later runs
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Log in with email and password, then run the node
    Login {
        /// Account email; prompted for when omitted
        #[arg(long)]
        email: Option<String>,
    },
    /// Forget the stored identity and account tokens
    Logout,
    /// Show the persisted node state and a fresh reward estimate
    Status,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let ctx = commands::Context {
        state_file: cli.state_file,
        config_file: cli.config,
    };
    let result = match cli.command {
        None => commands::run::interactive(&ctx).await,
        Some(Commands::Run { user_id }) => commands::run::run(&ctx, user_id).await,
        Some(Commands::Login { email }) => commands::run::login(&ctx, email).await,
        Some(Commands::Logout) => commands::logout::run(&ctx),
        Some(Commands::Status) => commands::status::run(&ctx),
        Some(Commands::Config { action }) => commands::config::run(&ctx, action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
