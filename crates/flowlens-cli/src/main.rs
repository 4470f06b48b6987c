mod cli;
mod repl;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use flowlens_agent::{build_oracle, AnalysisEngine};
use flowlens_common::AgentError;
use flowlens_config::{DataBackend, DataConfig};
use flowlens_data::{DatasetSource, MemorySource, QueryLimits, SqliteSource};
use flowlens_tools::builtin_registry;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Load KEY=VALUE lines from a .env file in the current directory.
/// Existing environment variables win.
fn load_dotenv() {
    let Ok(contents) = std::fs::read_to_string(".env") else {
        return;
    };
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if std::env::var(key).is_err() {
                std::env::set_var(key, value);
            }
        }
    }
}

fn build_source(
    config: &DataConfig,
    csv_override: Option<&Path>,
) -> Result<Arc<dyn DatasetSource>, AgentError> {
    let limits = QueryLimits {
        row_cap: config.row_cap,
        timeout: Duration::from_millis(config.query_timeout_ms),
    };
    let path = Path::new(&config.path);

    let source: Arc<dyn DatasetSource> = match config.backend {
        DataBackend::Memory => {
            Arc::new(MemorySource::load_csv(path, &config.table, limits)?)
        }
        DataBackend::Sqlite => match csv_override {
            Some(csv) => Arc::new(SqliteSource::bootstrap_from_csv(
                path,
                csv,
                &config.table,
                limits,
            )?),
            None => Arc::new(SqliteSource::open(path, &config.table, limits)?),
        },
    };
    Ok(source)
}

#[tokio::main]
async fn main() {
    load_dotenv();
    let args = cli::parse();

    let log_directive = args.log_level.as_deref().unwrap_or("flowlens=info");
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                log_directive
                    .parse()
                    .unwrap_or_else(|_| "flowlens=info".parse().unwrap()),
            ),
        )
        .init();

    if let Err(err) = run(args).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run(args: cli::Args) -> Result<(), AgentError> {
    let config = flowlens_config::load_config(args.config.as_deref())?;
    let source = build_source(&config.data, args.csv.as_deref())?;
    let oracle = build_oracle(&config.oracle)?;
    let engine = AnalysisEngine::new(oracle, source, builtin_registry(), &config.agent)?;
    info!(backend = ?config.data.backend, provider = ?config.oracle.provider, "engine ready");

    match args.question {
        Some(question) => repl::one_shot(&engine, &question, args.stream).await,
        None => repl::run(&engine, args.stream).await,
    }
}
