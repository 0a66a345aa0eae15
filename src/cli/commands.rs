use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "signalpipe", about = "Market signal aggregation and decision pipeline")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute one pipeline run over a set of symbols
    Run {
        /// Symbols to process (e.g. AAPL MSFT NVDA)
        #[arg(required = true)]
        symbols: Vec<String>,
    },
    /// List persisted decisions
    Decisions {
        /// Filter by symbol
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// List past runs with their reports
    Runs {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Show store statistics
    Stats,
    /// Re-embed observations missing vector entries
    Reindex,
}
