//! One benchmark worker: a single connection driven through a
//! closed-loop request cycle.
//!
//! Each request is strictly serialized: send the fixed payload, wait on
//! the worker's private poll instance, read the reply, record the round
//! trip. One request in flight at a time, so per-connection RTT is
//! measured without queueing effects; throughput comes from running many
//! workers in parallel.

use crate::bench::WorkerStats;
use crate::protocol::{MESSAGE_SIZE, PAYLOAD};
use crate::runtime::{socket, Poller};
use mio::net::TcpStream;
use mio::Token;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const CONN_TOKEN: Token = Token(0);

/// A worker and its private connection, poll instance, and settings.
pub struct Worker {
    id: usize,
    stream: TcpStream,
    poller: Poller,
    requests: u64,
    wait_timeout: Option<Duration>,
}

impl Worker {
    /// Connect to the server and register the stream with a fresh poll
    /// instance. A failure here is fatal to the whole benchmark run: an
    /// experiment with fewer connections than configured is not the
    /// configured experiment.
    pub fn connect(
        id: usize,
        addr: SocketAddr,
        requests: u64,
        wait_timeout: Option<Duration>,
    ) -> io::Result<Self> {
        let mut stream = socket::connect_stream(addr)?;
        let poller = Poller::new()?;
        poller.register(&mut stream, CONN_TOKEN)?;

        Ok(Self {
            id,
            stream,
            poller,
            requests,
            wait_timeout,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Run the closed-loop cycle `requests` times or until the first
    /// failure. Failures end the loop early; the statistics gathered so
    /// far are still returned.
    pub fn run(mut self) -> WorkerStats {
        let mut stats = WorkerStats::default();
        let mut reply = [0u8; MESSAGE_SIZE];

        let started = Instant::now();

        for _ in 0..self.requests {
            let start = Instant::now();

            match self.stream.write(&PAYLOAD) {
                Ok(n) if n == MESSAGE_SIZE => {}
                Ok(n) => {
                    warn!(worker = self.id, sent = n, "short send, stopping");
                    break;
                }
                Err(e) => {
                    warn!(worker = self.id, error = %e, "send failed, stopping");
                    break;
                }
            }

            match self.recv_reply(&mut reply) {
                Ok(0) => {
                    debug!(worker = self.id, "server closed connection, stopping");
                    break;
                }
                Ok(_) => stats.record(start.elapsed()),
                Err(e) => {
                    warn!(worker = self.id, error = %e, "receive failed, stopping");
                    break;
                }
            }
        }

        stats.finalize(started.elapsed());

        let _ = self.poller.deregister(&mut self.stream);
        stats
    }

    /// Wait for read-readiness, then read one reply of up to
    /// `MESSAGE_SIZE` bytes. A spurious wakeup re-enters the wait; an
    /// expired bounded wait is a `TimedOut` error.
    fn recv_reply(&mut self, reply: &mut [u8]) -> io::Result<usize> {
        loop {
            let events = self.poller.wait(self.wait_timeout)?;
            if events.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "timed out waiting for reply",
                ));
            }

            match self.stream.read(reply) {
                Ok(n) => return Ok(n),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::EchoServer;
    use std::io::{Read, Write};
    use std::thread;

    const TEST_WAIT: Option<Duration> = Some(Duration::from_secs(5));

    fn spawn_echo_server() -> SocketAddr {
        let mut server = EchoServer::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = server.local_addr();
        thread::spawn(move || {
            let _ = server.run();
        });
        addr
    }

    /// Echo peer that answers `limit` requests, then drops the stream.
    fn spawn_dropping_server(limit: usize) -> SocketAddr {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; MESSAGE_SIZE];
            for _ in 0..limit {
                stream.read_exact(&mut buf).unwrap();
                stream.write_all(&buf).unwrap();
            }
        });
        addr
    }

    #[test]
    fn test_clean_run_completes_all_requests() {
        let addr = spawn_echo_server();

        let worker = Worker::connect(0, addr, 5, TEST_WAIT).unwrap();
        let stats = worker.run();

        assert_eq!(stats.messages, 5);
        assert!(stats.request_rate > 0.0);
    }

    #[test]
    fn test_zero_requests_is_defined() {
        let addr = spawn_echo_server();

        let worker = Worker::connect(0, addr, 0, TEST_WAIT).unwrap();
        let stats = worker.run();

        assert_eq!(stats.messages, 0);
        assert_eq!(stats.total_rtt_us, 0);
        assert_eq!(stats.request_rate, 0.0);
    }

    #[test]
    fn test_stops_after_peer_drops_connection() {
        let addr = spawn_dropping_server(3);

        let worker = Worker::connect(0, addr, 100, TEST_WAIT).unwrap();
        let stats = worker.run();

        assert_eq!(stats.messages, 3);
    }

    #[test]
    fn test_connect_failure_is_fatal() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert!(Worker::connect(0, addr, 1, TEST_WAIT).is_err());
    }
}
