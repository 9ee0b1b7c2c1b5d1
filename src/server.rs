//! Event-driven echo server.
//!
//! Single-threaded, readiness-based: one poll instance multiplexes the
//! listener and every accepted connection. Whatever a connection
//! delivers, up to the fixed payload size per read, is written back
//! verbatim. There is no connection limit and no write retry; a short
//! or failed echo write is logged and the response dropped.

use crate::protocol::MESSAGE_SIZE;
use crate::runtime::{socket, Poller};
use mio::net::{TcpListener, TcpStream};
use mio::Token;
use slab::Slab;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use tracing::{debug, error, info, warn};

const LISTENER_TOKEN: Token = Token(usize::MAX);

/// One accepted client connection.
struct EchoConn {
    stream: TcpStream,
    peer: SocketAddr,
}

/// The echo server: listener, poll instance, and connection registry.
pub struct EchoServer {
    listener: TcpListener,
    poller: Poller,
    connections: Slab<EchoConn>,
    local_addr: SocketAddr,
}

impl EchoServer {
    /// Bind to `addr` and set up the poll instance. Any failure here is
    /// fatal to the process: a server that cannot establish its basic
    /// resources must not run.
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let std_listener = socket::bind_listener(addr)?;
        let mut listener = TcpListener::from_std(std_listener);
        let local_addr = listener.local_addr()?;

        let poller = Poller::new()?;
        poller.register(&mut listener, LISTENER_TOKEN)?;

        Ok(Self {
            listener,
            poller,
            connections: Slab::new(),
            local_addr,
        })
    }

    /// Address the listener actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run the event loop. Never returns under normal operation; an
    /// `Err` means the poll instance itself failed.
    pub fn run(&mut self) -> io::Result<()> {
        info!(addr = %self.local_addr, "echo server listening");

        loop {
            let events = self.poller.wait(None)?;

            for event in events {
                match event.token {
                    LISTENER_TOKEN => self.accept_pending(),
                    Token(conn_id) => {
                        if !event.readable {
                            continue;
                        }
                        if let Err(e) = self.handle_readable(conn_id) {
                            debug!(conn_id, error = %e, "connection error");
                            self.close_connection(conn_id);
                        }
                    }
                }
            }
        }
    }

    /// Accept every pending connection on the listener. A failed accept
    /// is logged and skipped; the loop continues.
    fn accept_pending(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(peer = %peer, error = %e, "set_nodelay failed");
                    }

                    let entry = self.connections.vacant_entry();
                    let conn_id = entry.key();

                    if let Err(e) = self.poller.register(&mut stream, Token(conn_id)) {
                        error!(peer = %peer, error = %e, "failed to register connection");
                        continue;
                    }

                    entry.insert(EchoConn { stream, peer });
                    debug!(conn_id, peer = %peer, "accepted connection");
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    error!(error = %e, "accept failed");
                    break;
                }
            }
        }
    }

    /// Drain a ready connection: read up to `MESSAGE_SIZE` bytes at a
    /// time and echo back exactly what was read. Returns `Err` when the
    /// peer closed or the stream failed, in which case the caller closes
    /// the connection.
    fn handle_readable(&mut self, conn_id: usize) -> io::Result<()> {
        // The connection may have been closed earlier in this batch.
        let conn = match self.connections.get_mut(conn_id) {
            Some(conn) => conn,
            None => return Ok(()),
        };

        let mut buf = [0u8; MESSAGE_SIZE];

        loop {
            let n = match conn.stream.read(&mut buf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::ConnectionReset,
                        "peer closed",
                    ))
                }
                Ok(n) => n,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(e),
            };

            match conn.stream.write(&buf[..n]) {
                Ok(written) if written < n => {
                    warn!(conn_id, n, written, "short echo write, response truncated");
                }
                Ok(_) => {}
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    warn!(conn_id, "send buffer full, response dropped");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Deregister and drop a connection. Removal from the poll set
    /// happens before the socket is closed.
    fn close_connection(&mut self, conn_id: usize) {
        if let Some(mut conn) = self.connections.try_remove(conn_id) {
            let _ = self.poller.deregister(&mut conn.stream);
            debug!(conn_id, peer = %conn.peer, "connection closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PAYLOAD;
    use std::io::{Read, Write};
    use std::thread;

    fn spawn_server() -> SocketAddr {
        let mut server = EchoServer::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = server.local_addr();
        thread::spawn(move || {
            let _ = server.run();
        });
        addr
    }

    fn read_exactly(stream: &mut std::net::TcpStream, len: usize) -> Vec<u8> {
        let mut out = vec![0u8; len];
        stream.read_exact(&mut out).unwrap();
        out
    }

    #[test]
    fn test_echoes_full_payload() {
        let addr = spawn_server();
        let mut stream = std::net::TcpStream::connect(addr).unwrap();

        stream.write_all(&PAYLOAD).unwrap();
        assert_eq!(read_exactly(&mut stream, MESSAGE_SIZE), PAYLOAD);
    }

    #[test]
    fn test_echoes_short_payload_unpadded() {
        let addr = spawn_server();
        let mut stream = std::net::TcpStream::connect(addr).unwrap();

        stream.write_all(b"hello").unwrap();
        assert_eq!(read_exactly(&mut stream, 5), b"hello");
    }

    #[test]
    fn test_echo_is_identity_over_many_requests() {
        let addr = spawn_server();
        let mut stream = std::net::TcpStream::connect(addr).unwrap();

        for i in 0..32u8 {
            let request = [i; MESSAGE_SIZE];
            stream.write_all(&request).unwrap();
            assert_eq!(read_exactly(&mut stream, MESSAGE_SIZE), request);
        }
    }

    #[test]
    fn test_serves_concurrent_connections() {
        let addr = spawn_server();
        let mut first = std::net::TcpStream::connect(addr).unwrap();
        let mut second = std::net::TcpStream::connect(addr).unwrap();

        first.write_all(b"first-conn-data!").unwrap();
        second.write_all(b"second-conn-data").unwrap();

        assert_eq!(read_exactly(&mut second, MESSAGE_SIZE), *b"second-conn-data");
        assert_eq!(read_exactly(&mut first, MESSAGE_SIZE), *b"first-conn-data!");
    }

    #[test]
    fn test_survives_client_disconnect() {
        let addr = spawn_server();

        {
            let mut doomed = std::net::TcpStream::connect(addr).unwrap();
            doomed.write_all(&PAYLOAD).unwrap();
            let _ = read_exactly(&mut doomed, MESSAGE_SIZE);
        }

        // The server keeps servicing other connections after a peer
        // disappears.
        let mut stream = std::net::TcpStream::connect(addr).unwrap();
        stream.write_all(&PAYLOAD).unwrap();
        assert_eq!(read_exactly(&mut stream, MESSAGE_SIZE), PAYLOAD);
    }
}
