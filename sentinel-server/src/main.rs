//! Scheduler daemon: loads a config file into an `ObjectGraph`, restores
//! retained status from the previous run, and drives `scheduler::tick` in a
//! loop until asked to stop (spec.md §2, §5, §9).

mod commands;
mod fifo;
mod pidfile;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sentinel_core::executor::{ConnectorClient, Dispatch};
use sentinel_core::{retention, scheduler, EngineContext};
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Command line arguments for the sentinel scheduler daemon.
#[derive(Parser, Debug)]
#[command(name = "sentinel-server")]
#[command(about = "Host and service monitoring scheduler")]
struct Args {
    /// Path to the TOML object configuration file.
    config: PathBuf,

    /// Parse and validate the config, then exit without starting the loop.
    #[arg(short = 'v', long)]
    verify_config: bool,

    /// Write a pid file to the given path.
    #[arg(short = 'p', long)]
    pid_file: Option<PathBuf>,

    /// Tracing filter, e.g. `sentinel_core=debug,sentinel_server=info`.
    #[arg(long, env = "SENTINEL_LOG")]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                args.log_filter
                    .clone()
                    .unwrap_or_else(|| "sentinel_server=info,sentinel_core=info".into())
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let loaded = sentinel_config::load_file(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;
    info!(
        hosts = loaded.graph.hosts.len(),
        services = loaded.graph.services.len(),
        "config loaded"
    );

    if args.verify_config {
        info!("config verified OK");
        return Ok(());
    }

    if let Some(pid_file) = &args.pid_file {
        pidfile::write(pid_file)?;
    }

    let mut connectors = HashMap::with_capacity(loaded.connectors.len());
    for (name, helper_path) in &loaded.connectors {
        connectors.insert(name.clone(), Arc::new(ConnectorClient::new(helper_path.clone())));
    }
    let dispatch = Dispatch::new(connectors);

    let retention_file = loaded.retention_file.clone();
    let status_file = loaded.status_file.clone();
    let command_file = loaded.command_file.clone().unwrap_or_else(|| PathBuf::from("/var/run/sentinel/sentinel.cmd"));

    let mut ctx = EngineContext::new(loaded.graph, dispatch, loaded.engine.clone());
    ctx.enable_notifications = loaded.enable_notifications;

    if let Some(path) = &retention_file {
        match retention::load_from_file(path) {
            Ok(snapshot) => {
                retention::restore(&mut ctx, snapshot);
                info!(path = %path.display(), "restored retained status");
            }
            Err(e) => warn!(path = %path.display(), error = %e, "no retention snapshot restored"),
        }
    }

    scheduler::spread_initial_checks(&mut ctx);

    let mut command_rx = fifo::spawn_reader(command_file.clone());
    install_signal_handlers(ctx.signals.clone());

    let mut retention_interval = tokio::time::interval(to_std(ctx.config.retention_save_interval));
    let mut status_interval = tokio::time::interval(to_std(ctx.config.status_save_interval));
    retention_interval.tick().await;
    status_interval.tick().await;

    info!("entering scheduler loop");
    loop {
        tokio::select! {
            _ = scheduler::tick(&mut ctx) => {}
            Some(line) = command_rx.recv() => {
                match commands::resolve_line(&ctx.graph, &line) {
                    Ok(cmd) => ctx.command_queue.push(cmd),
                    Err(e) => warn!(line = %line, error = %e, "dropping external command"),
                }
            }
            _ = retention_interval.tick() => {
                if let Some(path) = &retention_file {
                    save_retention(&ctx, path);
                }
            }
            _ = status_interval.tick() => {
                if let Some(path) = &status_file {
                    save_status(&ctx, path);
                }
            }
        }

        if ctx.signals.shutdown_requested() {
            info!("shutdown requested, saving state and exiting");
            if let Some(path) = &retention_file {
                save_retention(&ctx, path);
            }
            break;
        }
        if ctx.signals.restart_requested() {
            info!("restart requested, reloading config");
            match sentinel_config::load_file(&args.config) {
                Ok(reloaded) => {
                    if let Some(path) = &retention_file {
                        save_retention(&ctx, path);
                    }
                    let snapshot = retention::snapshot(&ctx);
                    let mut new_ctx = EngineContext::new(reloaded.graph, ctx.dispatch.clone(), reloaded.engine);
                    new_ctx.enable_notifications = reloaded.enable_notifications;
                    retention::restore(&mut new_ctx, snapshot);
                    scheduler::spread_initial_checks(&mut new_ctx);
                    ctx = new_ctx;
                }
                Err(e) => error!(error = %e, "restart requested but reload failed, continuing with current config"),
            }
        }
    }

    if let Some(pid_file) = &args.pid_file {
        pidfile::remove(pid_file);
    }
    Ok(())
}

fn save_retention(ctx: &EngineContext, path: &std::path::Path) {
    let snapshot = retention::snapshot(ctx);
    if let Err(e) = retention::save_to_file(&snapshot, path) {
        error!(path = %path.display(), error = %e, "failed to save retention snapshot");
    }
}

fn save_status(ctx: &EngineContext, path: &std::path::Path) {
    let snapshot = retention::snapshot(ctx);
    match serde_json::to_vec_pretty(&snapshot) {
        Ok(bytes) => {
            let tmp = path.with_extension("tmp");
            if std::fs::write(&tmp, bytes).and_then(|_| std::fs::rename(&tmp, path)).is_err() {
                error!(path = %path.display(), "failed to write status file");
            }
        }
        Err(e) => error!(error = %e, "failed to serialize status snapshot"),
    }
}

fn to_std(d: chrono::Duration) -> std::time::Duration {
    d.to_std().unwrap_or(std::time::Duration::from_secs(1))
}

fn install_signal_handlers(signals: sentinel_core::SignalFlags) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let term_signals = signals.clone();
        tokio::spawn(async move {
            let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
            let mut int = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
            loop {
                tokio::select! {
                    _ = term.recv() => term_signals.request_shutdown(),
                    _ = int.recv() => term_signals.request_shutdown(),
                }
            }
        });
        let hup_signals = signals;
        tokio::spawn(async move {
            let mut hup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");
            loop {
                hup.recv().await;
                hup_signals.request_restart();
            }
        });
    }
    #[cfg(not(unix))]
    {
        let _ = signals;
    }
}
