//! Stress tests for recstore.
//!
//! These helpers drive a [`RecordManager`] from several threads and report
//! throughput and failures.

use recstore_core::{Recid, RecordManager};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Operations per thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Payload size in bytes.
    pub payload_size: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 1_000,
            threads: 4,
            payload_size: 128,
        }
    }
}

/// Payload written by `thread` for its `op`-th record.
///
/// The first bytes identify the writer so readers can check ownership.
pub fn stress_payload(thread: usize, op: usize, size: usize) -> Vec<u8> {
    let mut data = vec![(op % 251) as u8; size.max(16)];
    data[..8].copy_from_slice(&(thread as u64).to_le_bytes());
    data[8..16].copy_from_slice(&(op as u64).to_le_bytes());
    data
}

/// Runs concurrent put/update/get rounds on a shared manager.
///
/// Each thread puts a record, reads it back, updates it and reads it again.
/// Returns the result and every recid written, grouped by thread.
pub fn stress_concurrent_writes<R: RecordManager + 'static>(
    manager: Arc<R>,
    config: &StressConfig,
) -> (StressTestResult, Vec<Vec<(Recid, Vec<u8>)>>) {
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let manager = Arc::clone(&manager);
            let config = config.clone();
            thread::spawn(move || {
                let mut successful = 0usize;
                let mut failed = 0usize;
                let mut written = Vec::with_capacity(config.operations);
                for op in 0..config.operations {
                    let first = stress_payload(t, op, config.payload_size / 2);
                    let second = stress_payload(t, op, config.payload_size);
                    let round = manager.put(&first).and_then(|recid| {
                        let read = manager.get(recid)?;
                        manager.update(recid, &second)?;
                        let reread = manager.get(recid)?;
                        Ok((recid, read == Some(first) && reread.as_ref() == Some(&second)))
                    });
                    match round {
                        Ok((recid, true)) => {
                            successful += 1;
                            written.push((recid, second));
                        }
                        Ok((_, false)) | Err(_) => failed += 1,
                    }
                }
                (successful, failed, written)
            })
        })
        .collect();

    let mut successful = 0;
    let mut failed = 0;
    let mut written = Vec::with_capacity(config.threads);
    for handle in handles {
        let (s, f, w) = handle.join().expect("Stress thread panicked");
        successful += s;
        failed += f;
        written.push(w);
    }

    (
        StressTestResult::new(successful, failed, start.elapsed()),
        written,
    )
}
