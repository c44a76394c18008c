use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use mindscope_cli::{Cli, MindscopeConfig};
use mindscope_telemetry::SharedTraceStorage;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = MindscopeConfig::load(cli.config.as_deref())?;

    let traces = cli.trace_dump.then(|| Arc::new(SharedTraceStorage::new()));
    match &traces {
        Some(storage) => mindscope_telemetry::init_with_storage(&config.telemetry, storage.clone())?,
        None => mindscope_telemetry::init_telemetry(&config.telemetry)?,
    }

    let result = mindscope_cli::run(cli.command, &config).await;
    if let Some(storage) = traces {
        eprintln!("{}", mindscope_cli::render_traces(&storage)?);
    }
    result
}
