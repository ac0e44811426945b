use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Parser;

use fluxgate_core::client::InfluxHttpClient;
use fluxgate_core::config;
use fluxgate_core::control::ActiveQueries;
use fluxgate_core::gateway::QueryGateway;
use fluxgate_core::ledger::{AttemptSink, ResultsLedger};
use fluxgate_core::logging::{self, LogBuffer};
use fluxgate_core::retry::{Backoff, RetryExecutor};

mod cli;
mod routes;

use crate::cli::Cli;

fn main() {
    let cli = Cli::parse();

    // Initialize logging as early as possible; fall back to stderr if the
    // state dir is unwritable.
    let logs = Arc::new(LogBuffer::default());
    if logging::init_logging(Arc::clone(&logs)).is_err() {
        logging::init_logging_stderr(Arc::clone(&logs));
    }

    if let Err(err) = run(cli, logs) {
        eprintln!("fluxgate error: {:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli, logs: Arc<LogBuffer>) -> Result<()> {
    let cfg = match &cli.config {
        Some(path) => config::load_from(path)?,
        None => config::load_or_init()?,
    };
    tracing::debug!("loaded config: {:?}", cfg);
    let bind = cli.bind.unwrap_or_else(|| cfg.server.bind.clone());

    let backoff = Backoff::new(
        Duration::from_millis(cfg.retry.initial_interval_ms),
        cfg.retry.multiplier,
        Duration::from_millis(cfg.retry.max_interval_ms),
    )?;
    let ledger = Arc::new(ResultsLedger::default());
    let executor = RetryExecutor::new(
        backoff,
        cfg.retry.max_attempts,
        Arc::clone(&ledger) as Arc<dyn AttemptSink>,
    );
    let client = Arc::new(InfluxHttpClient::new(&cfg.influx)?);
    let gateway = QueryGateway::new(client, executor);

    let state = Arc::new(routes::AppState {
        gateway,
        ledger,
        logs,
        active: Arc::new(ActiveQueries::new()),
        shutdown_mode: cfg.server.shutdown.clone(),
    });

    let server =
        tiny_http::Server::http(&bind).map_err(|e| anyhow!("binding {}: {}", bind, e))?;
    tracing::info!("fluxgate listening on {}", bind);
    routes::serve(server, cfg.server.workers, state);
    tracing::info!("fluxgate stopped");
    Ok(())
}
