// Server loop module
// Accepts connections until a shutdown signal arrives

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;

use super::connection::accept_connection;
use super::signal::SignalHandler;
use crate::config::AppState;
use crate::logger;

/// Run the accept loop until shutdown is requested.
///
/// Each accepted connection is served on its own local task; the loop itself
/// only accepts and hands off.
#[allow(clippy::ignored_unit_patterns)]
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    signals: Arc<SignalHandler>,
) {
    let active_connections = Arc::new(AtomicUsize::new(0));

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &active_connections);
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            _ = signals.shutdown.notified() => {
                logger::log_shutdown(active_connections.load(Ordering::SeqCst));
                return;
            }
        }
    }
}
