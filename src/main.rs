//! echo-bench: a TCP echo round-trip benchmark.
//!
//! One binary, two modes:
//! - `server`: single-threaded, readiness-driven echo server that
//!   multiplexes every connection over one poll instance.
//! - `client`: N worker threads, each driving a private connection
//!   through a closed-loop send/wait/receive cycle; per-worker latency
//!   and throughput statistics are aggregated into one final report.

mod bench;
mod config;
mod protocol;
mod runtime;
mod server;

use config::{Config, Mode};
use server::EchoServer;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match config.mode {
        Some(Mode::Server) => run_server(&config),
        Some(Mode::Client) => run_client(&config),
        None => {
            config::print_usage();
            Ok(())
        }
    }
}

/// Bind and run the echo server; returns only on unrecoverable failure.
fn run_server(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.socket_addr()?;
    let mut server = EchoServer::bind(addr)?;
    server.run()?;
    Ok(())
}

/// Run the benchmark and print the final report.
fn run_client(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let report = bench::run(config)?;

    info!(
        total_messages = report.total_messages,
        "benchmark complete"
    );

    println!("Average RTT: {} us", report.mean_rtt_us());
    println!("Total request rate: {:.2} messages/s", report.total_request_rate);
    Ok(())
}
