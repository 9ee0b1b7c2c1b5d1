//! Benchmark coordinator: connect N workers, run them concurrently,
//! aggregate their statistics.

mod stats;
mod worker;

pub use stats::{AggregateReport, WorkerStats};
pub use worker::Worker;

use crate::config::Config;
use std::io;
use std::thread;
use tracing::{info, warn};

/// Run the configured benchmark and return the aggregate report.
///
/// Setup is sequential: every connection must be established before any
/// worker starts, and a single connect failure aborts the run. Workers
/// then execute concurrently with no shared mutable state; statistics
/// are read only after every thread has been joined.
pub fn run(config: &Config) -> io::Result<AggregateReport> {
    let addr = config.socket_addr()?;

    let mut workers = Vec::with_capacity(config.workers);
    for id in 0..config.workers {
        workers.push(Worker::connect(id, addr, config.requests, config.wait_timeout)?);
    }

    info!(
        addr = %addr,
        workers = config.workers,
        requests = config.requests,
        "starting benchmark"
    );

    let mut handles = Vec::with_capacity(workers.len());
    for worker in workers {
        let id = worker.id();
        let handle = thread::Builder::new()
            .name(format!("worker-{id}"))
            .spawn(move || worker.run())?;
        handles.push(handle);
    }

    let mut completed = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.join() {
            Ok(stats) => completed.push(stats),
            Err(_) => warn!("worker thread panicked"),
        }
    }

    Ok(AggregateReport::from_workers(&completed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Mode};
    use crate::server::EchoServer;
    use std::net::SocketAddr;
    use std::thread;
    use std::time::Duration;

    fn spawn_echo_server() -> SocketAddr {
        let mut server = EchoServer::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = server.local_addr();
        thread::spawn(move || {
            let _ = server.run();
        });
        addr
    }

    fn bench_config(addr: SocketAddr, workers: usize, requests: u64) -> Config {
        Config {
            mode: Some(Mode::Client),
            host: addr.ip().to_string(),
            port: addr.port(),
            workers,
            requests,
            wait_timeout: Some(Duration::from_secs(5)),
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn test_aggregate_totals_are_workers_times_requests() {
        let addr = spawn_echo_server();

        let report = run(&bench_config(addr, 4, 100)).unwrap();

        assert_eq!(report.total_messages, 400);
        assert!(report.total_request_rate > 0.0);
    }

    #[test]
    fn test_single_worker_mean_rtt() {
        let addr = spawn_echo_server();

        let report = run(&bench_config(addr, 1, 5)).unwrap();

        assert_eq!(report.total_messages, 5);
        assert_eq!(report.mean_rtt_us(), report.total_rtt_us / 5);
    }

    #[test]
    fn test_connect_failure_aborts_run() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert!(run(&bench_config(addr, 2, 10)).is_err());
    }
}
