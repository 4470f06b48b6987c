use std::path::PathBuf;

use clap::Parser;

/// Flowlens — conversational analysis over pipeline flow data.
#[derive(Parser, Debug)]
#[command(name = "flowlens", version, about)]
pub struct Args {
    /// Ask a single question and exit instead of starting the REPL.
    #[arg(short = 'q', long)]
    pub question: Option<String>,

    /// Config file path override.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Stream tool progress and answer text as it arrives.
    #[arg(long)]
    pub stream: bool,

    /// CSV file to load into the SQLite database when the configured
    /// table does not exist yet (sqlite backend only).
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Log level override (debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

pub fn parse() -> Args {
    Args::parse()
}
