//! Multi-room Telnet Chat Server - Entry Point
//!
//! Loads configuration, starts the ChatServer actor and the accept loop,
//! and flushes every room log when a termination signal arrives.

use std::env;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use telnet_chat::{transport, ChatServer, ServerCommand, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=telnet_chat=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("telnet_chat=info")),
        )
        .init();

    let mut config = ServerConfig::load()?;

    // Bind address from the command line wins over config
    if let Some(addr) = env::args().nth(1) {
        config.bind_addr = addr;
    }

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!(
        "Chat server listening on {} ({:?})",
        config.bind_addr, config.transport
    );

    // Create ChatServer actor channel and start
    let (cmd_tx, cmd_rx) = mpsc::channel(config.channel_buffer);
    let server = ChatServer::new(&config, cmd_rx);
    let server_task = tokio::spawn(server.run());

    info!("ChatServer actor started");

    tokio::select! {
        _ = transport::serve(listener, cmd_tx.clone(), Arc::new(config)) => {}
        _ = shutdown_signal() => {}
    }

    // Drain room logs before exiting
    let (done_tx, done_rx) = oneshot::channel();
    if cmd_tx
        .send(ServerCommand::Shutdown { done: done_tx })
        .await
        .is_err()
    {
        error!("ChatServer already stopped; room logs may be incomplete");
        return Ok(());
    }
    match done_rx.await {
        Ok(flushed) => info!("Flushed {} room log(s)", flushed.len()),
        Err(_) => error!("ChatServer stopped before confirming log flush"),
    }
    let _ = server_task.await;

    Ok(())
}

/// Resolve on SIGINT (ctrl-c) or, on unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT - flushing room logs"),
        _ = terminate => info!("Received SIGTERM - flushing room logs"),
    }
}
