// Signal handling module
//
// SIGTERM and SIGINT both request a graceful stop of the accept loop.

use std::sync::Arc;
use tokio::sync::Notify;

/// Shared shutdown notifier the accept loop waits on
pub struct SignalHandler {
    pub shutdown: Arc<Notify>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self {
            shutdown: Arc::new(Notify::new()),
        }
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn the task that turns termination signals into shutdown notifications.
#[cfg(unix)]
pub fn start_signal_handler(handler: Arc<SignalHandler>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut sigterm =
            signal(SignalKind::terminate()).expect("Failed to register SIGTERM handler");
        let mut sigint =
            signal(SignalKind::interrupt()).expect("Failed to register SIGINT handler");

        let received = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        println!("\n[SIGNAL] {received} received, initiating graceful shutdown");

        handler.shutdown.notify_waiters();
    });
}

/// Fallback for platforms without Unix signals - only handles Ctrl+C
#[cfg(not(unix))]
pub fn start_signal_handler(handler: Arc<SignalHandler>) {
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            println!("\n[SIGNAL] Ctrl+C received, initiating graceful shutdown");
            handler.shutdown.notify_waiters();
        }
    });
}
