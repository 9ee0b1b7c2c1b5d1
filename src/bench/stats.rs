//! Per-worker latency accumulation and the final aggregate report.

use std::time::Duration;

/// Statistics accumulated by one worker over its run.
///
/// Mutated only by the owning worker thread; the coordinator reads it
/// once, after the thread has been joined.
#[derive(Debug, Clone, Default)]
pub struct WorkerStats {
    /// Completed request/response pairs.
    pub messages: u64,
    /// Summed round-trip time across all completed pairs, microseconds.
    pub total_rtt_us: u64,
    /// Completed requests per second over the worker's whole run.
    pub request_rate: f64,
}

impl WorkerStats {
    /// Fold one completed round trip into the running totals.
    pub fn record(&mut self, rtt: Duration) {
        self.total_rtt_us += rtt.as_micros() as u64;
        self.messages += 1;
    }

    /// Derive the request rate from the worker's elapsed wall time.
    /// A zero elapsed time yields a rate of 0.
    pub fn finalize(&mut self, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        self.request_rate = if secs > 0.0 {
            self.messages as f64 / secs
        } else {
            0.0
        };
    }
}

/// The benchmark's final summary across all workers.
///
/// `total_request_rate` is the sum of the independent per-worker rates,
/// not total messages over the run's wall-clock span. This is a known
/// measurement approximation, kept for comparability with the reference
/// results.
#[derive(Debug, Clone, Default)]
pub struct AggregateReport {
    pub total_messages: u64,
    pub total_rtt_us: u64,
    pub total_request_rate: f64,
}

impl AggregateReport {
    /// Sum the finalized statistics of every worker.
    pub fn from_workers(workers: &[WorkerStats]) -> Self {
        let mut report = Self::default();
        for stats in workers {
            report.total_messages += stats.messages;
            report.total_rtt_us += stats.total_rtt_us;
            report.total_request_rate += stats.request_rate;
        }
        report
    }

    /// Mean round-trip time in microseconds, 0 when nothing completed.
    pub fn mean_rtt_us(&self) -> u64 {
        if self.total_messages == 0 {
            0
        } else {
            self.total_rtt_us / self.total_messages
        }
    }
}
