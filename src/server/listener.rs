// Listener setup module
// Binds the serving socket with the reuse options the gateway relies on

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;

/// Create a `TcpListener` with `SO_REUSEADDR` enabled.
///
/// Reusing the address lets a restarted gateway rebind immediately while the
/// previous socket is still in TIME_WAIT.
pub fn create_listener(addr: std::net::SocketAddr) -> std::io::Result<TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    socket.set_reuse_address(true)?;

    // Tokio needs the socket nonblocking before it will adopt it
    socket.set_nonblocking(true)?;

    socket.bind(&addr.into())?;
    socket.listen(128)?;

    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener)
}
