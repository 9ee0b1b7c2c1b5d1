//! TCP endpoint setup: listening and connected sockets in non-blocking
//! mode, ready for registration with a [`Poller`](crate::runtime::Poller).

use mio::net::TcpStream;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::SocketAddr;

const BACKLOG: i32 = 1024;

/// Create a non-blocking listener bound to `addr` with SO_REUSEADDR.
pub fn bind_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = Socket::new(
        match addr {
            SocketAddr::V4(_) => Domain::IPV4,
            SocketAddr::V6(_) => Domain::IPV6,
        },
        Type::STREAM,
        Some(Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;

    Ok(socket.into())
}

/// Connect to `addr`, blocking until established, then switch the stream
/// to non-blocking for poller use. Nagle is disabled: a 16-byte
/// request/response cycle would otherwise be held back behind delayed
/// ACKs.
pub fn connect_stream(addr: SocketAddr) -> io::Result<TcpStream> {
    let stream = std::net::TcpStream::connect(addr)?;
    stream.set_nodelay(true)?;
    stream.set_nonblocking(true)?;
    Ok(TcpStream::from_std(stream))
}
