use clap::Parser;
use tracing_subscriber::EnvFilter;

use signalpipe::cli::commands::{Cli, Commands};
use signalpipe::SignalPipe;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let db_path = std::env::var("SIGNALPIPE_DB").unwrap_or_else(|_| "./signalpipe.db".into());

    let pipe = match SignalPipe::new(&db_path) {
        Ok(pipe) => pipe,
        Err(e) => {
            eprintln!("Error initializing signalpipe: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run_command(pipe, cli.command).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run_command(pipe: SignalPipe, cmd: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        Commands::Run { symbols } => {
            let run = pipe.run(&symbols).await?;
            println!("{}", serde_json::to_string_pretty(&run)?);
        }
        Commands::Decisions { symbol, limit } => {
            let decisions = pipe.decisions(symbol.as_deref(), limit)?;
            println!("{}", serde_json::to_string_pretty(&decisions)?);
        }
        Commands::Runs { limit } => {
            let runs = pipe.runs(limit)?;
            println!("{}", serde_json::to_string_pretty(&runs)?);
        }
        Commands::Stats => {
            let stats = pipe.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Reindex => {
            let count = pipe.reindex().await?;
            println!("Reindexed {count} observations");
        }
    }
    Ok(())
}
