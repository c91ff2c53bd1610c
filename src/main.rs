use anyhow::{Context, Result};
use clap::Parser;

use gator::commands::{Command, Registry, State};
use gator::config::Config;
use gator::feed::build_client;
use gator::storage::Database;

#[derive(Parser, Debug)]
#[command(
    name = "gator",
    about = "Command-line RSS aggregator",
    disable_help_subcommand = true
)]
struct Args {
    /// Command to run (`help` lists them)
    command: String,

    /// Arguments passed to the command
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

async fn run(args: Args) -> Result<()> {
    let config_path = Config::default_path().context("Failed to locate config file")?;
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from '{}'", config_path.display()))?;

    let db_url = config.resolved_db_url()?;
    let db = Database::open(&db_url)
        .await
        .with_context(|| format!("Failed to open database '{}'", db_url))?;
    let client = build_client().context("Failed to build HTTP client")?;

    let registry = Registry::with_default_commands();
    let mut state = State::new(config, db, client);
    let command = Command::new(args.command, args.args);

    registry.run(&mut state, &command).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so command output on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gator=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
