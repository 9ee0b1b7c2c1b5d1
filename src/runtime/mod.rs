//! Readiness-driven I/O runtime shared by the echo server and the
//! client workers.
//!
//! Built on mio (epoll on Linux, kqueue on macOS). One [`Poller`]
//! multiplexes any number of registered sockets behind a small
//! register/deregister/wait surface; [`socket`] produces the
//! non-blocking endpoints that get registered with it.

mod poller;
pub mod socket;

pub use poller::{Poller, ReadyEvent};
