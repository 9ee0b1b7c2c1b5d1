//! Readiness multiplexer over a single mio `Poll` instance.
//!
//! One `Poller` lets one thread wait on any number of registered sockets
//! and learn which are ready for reading. The server loop registers the
//! listener plus every accepted connection; each client worker registers
//! exactly one connection.

use mio::event::Source;
use mio::{Events, Interest, Poll, Token};
use std::io;
use std::time::Duration;

/// Maximum number of ready sockets reported by one `wait` call.
pub const MAX_EVENTS: usize = 64;

/// One ready socket reported by [`Poller::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyEvent {
    pub token: Token,
    pub readable: bool,
}

/// Wraps one polling instance and the registrations made against it.
///
/// Registrations are read-readiness only. A socket must be deregistered
/// before it is closed; it may be registered in at most one `Poller` at
/// a time.
pub struct Poller {
    poll: Poll,
    events: Events,
}

impl Poller {
    pub fn new() -> io::Result<Self> {
        Self::with_capacity(MAX_EVENTS)
    }

    pub fn with_capacity(capacity: usize) -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(capacity),
        })
    }

    /// Register a socket for read-readiness under `token`.
    pub fn register<S>(&self, source: &mut S, token: Token) -> io::Result<()>
    where
        S: Source + ?Sized,
    {
        self.poll.registry().register(source, token, Interest::READABLE)
    }

    /// Remove a socket from the poll set.
    pub fn deregister<S>(&self, source: &mut S) -> io::Result<()>
    where
        S: Source + ?Sized,
    {
        self.poll.registry().deregister(source)
    }

    /// Block until at least one registered socket is ready or `timeout`
    /// expires. `None` waits without bound; an expired timeout yields an
    /// empty batch.
    pub fn wait(&mut self, timeout: Option<Duration>) -> io::Result<Vec<ReadyEvent>> {
        self.poll.poll(&mut self.events, timeout)?;
        Ok(self
            .events
            .iter()
            .map(|event| ReadyEvent {
                token: event.token(),
                readable: event.is_readable(),
            })
            .collect())
    }
}
