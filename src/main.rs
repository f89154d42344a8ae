use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use opforge::config::Config;
use opforge::oracle::FsOracle;
use opforge::pipeline::Pipeline;

/// Parse a captured model response into a reviewable file-operation batch.
#[derive(Parser, Debug)]
#[command(name = "opforge", version, about)]
struct Cli {
    /// Response file to parse (stdin if omitted)
    input: Option<String>,

    /// Workspace root the operations target (overrides config)
    #[arg(short, long)]
    workspace: Option<String>,

    /// Config file path
    #[arg(short, long, default_value = "")]
    config: String,

    /// Compact JSON output instead of pretty-printed
    #[arg(long)]
    compact: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // 1. Load and validate config
    let mut config = Config::load(&cli.config)?;
    if let Some(root) = cli.workspace {
        config.workspace_root = root;
    }
    config.validate()?;

    // 2. Read the response
    let response = match &cli.input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read response file: {path}"))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read response from stdin")?;
            buf
        }
    };

    // 3. Run the pipeline against the workspace
    let oracle = Arc::new(FsOracle::new(config.workspace_root.clone()));
    let mut pipeline = Pipeline::new(&config, oracle)?;
    let batch = pipeline
        .process_response(&response)
        .await
        .context("pipeline aborted")?;

    // 4. Emit the batch for the host/reviewer
    let out = if cli.compact {
        serde_json::to_string(&batch)?
    } else {
        serde_json::to_string_pretty(&batch)?
    };
    println!("{out}");
    Ok(())
}
