// Server module entry point
// Listener setup, connection handling, signals, and the accept loop

pub mod connection;
pub mod listener;
pub mod signal;

// Rust does not allow `loop` as a module name (keyword), so alias the file
#[path = "loop.rs"]
pub mod server_loop;

// Re-export commonly used types
pub use listener::create_listener;
pub use server_loop::start_server_loop;
pub use signal::{start_signal_handler, SignalHandler};
