//! Logger module
//!
//! Server lifecycle, error, and access logging. Output goes to the targets
//! configured in `[logging]` (stdout/stderr by default); the access log is
//! formatted per `access_log_format`. Before `init` runs, messages fall back
//! to the standard streams so early failures still show up.

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use crate::config::{Config, StorageKind};
use std::net::SocketAddr;

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> std::io::Result<()> {
    writer::init(
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
    )
}

fn write_info(message: &str) {
    match writer::get() {
        Some(writer) => writer.write_info(message),
        None => println!("{message}"),
    }
}

fn write_error(message: &str) {
    match writer::get() {
        Some(writer) => writer.write_error(message),
        None => eprintln!("{message}"),
    }
}

fn write_access(message: &str) {
    match writer::get() {
        Some(writer) => writer.write_access(message),
        None => println!("{message}"),
    }
}

/// Startup banner: address, backend, worker count, log destinations
pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    write_info("======================================");
    write_info("Pack store gateway started");
    write_info(&format!("Listening on: http://{addr}"));
    match config.storage.backend {
        StorageKind::Fs => write_info(&format!("Storage backend: fs ({})", config.storage.root)),
        StorageKind::Memory => write_info("Storage backend: memory"),
    }
    if let Some(workers) = config.server.workers {
        write_info(&format!("Worker threads: {workers}"));
    }
    if let Some(ref path) = config.logging.access_log_file {
        write_info(&format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        write_info(&format!("Error log: {path}"));
    }
    write_info("======================================\n");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    write_info(&format!("[Connection] Accepted from: {peer_addr}"));
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    write_error(&format!("[ERROR] Failed to serve connection: {err:?}"));
}

pub fn log_error(message: &str) {
    write_error(&format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    write_error(&format!("[WARN] {message}"));
}

/// Emit one formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    write_access(&entry.format(format));
}

pub fn log_shutdown(active_connections: usize) {
    write_info(&format!(
        "\n[Shutdown] Stopping accept loop ({active_connections} connections active)"
    ));
}
