mod app;
mod command;
mod config;
mod error;
mod error_log;
mod gateway;
mod model;
mod notify;
mod poller;
mod runtime;
mod selection;
mod session;
mod tui;
mod view;

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, anyhow};
use clap::Parser;
use tokio::sync::{broadcast, mpsc};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::app::DeskState;
use crate::command::Command;
use crate::error_log::ErrorLogStore;
use crate::gateway::HttpGateway;
use crate::runtime::EffectRunner;
use crate::tui::TuiApp;

fn init_logging(path: &Path) -> Result<(), anyhow::Error> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|err| anyhow!("failed to install log subscriber: {err}"))
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let param = config::CliParams::parse();
    init_logging(&param.log_file)?;
    info!(api = %param.api_url, poll = ?param.poll_interval(), "starting trade-watch");

    let gateway = Arc::new(HttpGateway::new(&param.api_url)?);
    let (tx, mut rx) = broadcast::channel::<Command>(64);
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
    let runner = EffectRunner::new(
        gateway,
        tx.clone(),
        reply_tx,
        param.poll_interval(),
        ErrorLogStore::new(param.error_log.clone()),
    );

    let mut app = TuiApp::new(DeskState::new(param.interval), runner);
    let app_result = tokio::select! {
        result = app.run(&mut rx, &mut reply_rx) => result,
        _ = tokio::signal::ctrl_c() => Ok(()),
    };
    let _ = tx.send(Command::Exit);
    app.dispose();
    info!("trade-watch stopped");
    app_result.map_err(|err| anyhow!(err.to_string()))?;
    Ok(())
}
