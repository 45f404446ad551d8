// SPDX-License-Identifier: AGPL-3.0-or-later

use std::sync::Arc;

use anyhow::{Context, Result};
use metricsrelayd::{
    admin,
    cfg::{cli::resolve_config_path, config::Config, logger::init_logger},
    dispatch,
    ingress,
    routing::RoutingTable,
};
use tokio::sync::mpsc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "metricsrelayd.yaml".to_string());

    let cfg = resolve_config_path(&config_path)
        .and_then(Config::load_from_file)
        .context("failed to resolve or load config")?;

    let _logger_guard = init_logger(&cfg.telemetry)?;

    let table = Arc::new(RoutingTable::new(
        &cfg.spool_dir,
        cfg.routing.channel_capacity,
        cfg.first_only,
    ));

    for route in &cfg.routes {
        table
            .add(route.key.clone(), route.pattern.clone(), route.addr.clone(), route.spool)
            .await
            .with_context(|| format!("failed to start configured route {:?}", route.key))?;
    }
    info!(routes = cfg.routes.len(), "routing table initialized");

    let (ingress_tx, ingress_rx) = mpsc::channel(cfg.routing.channel_capacity);
    let dispatcher = tokio::spawn(dispatch::run(table.clone(), ingress_rx));

    // Listener tasks report a fatal exit (bind failure, accept-loop I/O
    // error) on this channel instead of just logging and going silent, so
    // the process shuts down instead of limping along with one surface
    // dead.
    let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel::<&'static str>();

    let ingress_listen_addr = cfg.listen_addr.clone();
    let max_line_bytes = cfg.ingress.max_line_bytes;
    let ingress_fatal_tx = fatal_tx.clone();
    let ingress_task = tokio::spawn(async move {
        if let Err(e) = ingress::listen(&ingress_listen_addr, max_line_bytes, ingress_tx).await {
            tracing::error!(error = %e, "ingress listener exited");
            let _ = ingress_fatal_tx.send("ingress listener exited");
        }
    });

    let admin_listen_addr = cfg.admin_addr.clone();
    let admin_table = table.clone();
    let admin_fatal_tx = fatal_tx.clone();
    let admin_task = tokio::spawn(async move {
        if let Err(e) = admin::listen(&admin_listen_addr, admin_table).await {
            tracing::error!(error = %e, "admin listener exited");
            let _ = admin_fatal_tx.send("admin listener exited");
        }
    });
    drop(fatal_tx);

    tokio::select! {
        () = wait_for_shutdown_signal() => info!("shutdown signal received, draining routes"),
        reason = fatal_rx.recv() => {
            tracing::error!(reason = ?reason, "a listener task exited, shutting down");
        },
    }

    ingress_task.abort();
    admin_task.abort();
    table.shutdown_all().await;
    dispatcher.abort();

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigterm.recv() => {},
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
