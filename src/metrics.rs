use crate::buffer::BufferStats;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Number of latency samples kept per task
const LATENCY_WINDOW: usize = 1000;

/// A sliding window of latency measurements
#[derive(Debug, Clone)]
pub struct PercentileTracker {
    measurements: Arc<Mutex<VecDeque<Duration>>>,
    window_size: usize,
}

impl PercentileTracker {
    /// Create a new tracker keeping the last `window_size` measurements
    pub fn new(window_size: usize) -> Self {
        Self {
            measurements: Arc::new(Mutex::new(VecDeque::with_capacity(window_size))),
            window_size,
        }
    }

    /// Record a measurement
    pub fn record(&self, elapsed: Duration) {
        let mut measurements = self.measurements.lock();
        if measurements.len() >= self.window_size {
            measurements.pop_front();
        }
        measurements.push_back(elapsed);
    }

    /// Latency at quantile `p` (0.0..=1.0), zero when nothing was recorded
    pub fn percentile(&self, p: f64) -> Duration {
        let measurements = self.measurements.lock();
        if measurements.is_empty() {
            return Duration::ZERO;
        }

        let mut sorted: Vec<_> = measurements.iter().copied().collect();
        sorted.sort_unstable();

        let idx = ((sorted.len() as f64 * p).ceil() as usize)
            .saturating_sub(1)
            .min(sorted.len() - 1);
        sorted[idx]
    }

    /// Get the count of recorded measurements
    pub fn count(&self) -> usize {
        self.measurements.lock().len()
    }
}

/// Counters for one pipeline task
///
/// Clones share the same counters, so a task can record while the
/// orchestrator keeps a handle for reporting.
#[derive(Debug, Clone)]
pub struct StageMetrics {
    name: Arc<str>,
    /// Values taken from upstream
    received: Arc<AtomicU64>,
    /// Values handed downstream
    emitted: Arc<AtomicU64>,
    /// Values filtered out
    rejected: Arc<AtomicU64>,
    /// Older unread values displaced from the ring buffer
    evicted: Arc<AtomicU64>,
    latency: PercentileTracker,
    start_time: Instant,
}

impl StageMetrics {
    /// Create a new metrics collector for a task
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            received: Arc::new(AtomicU64::new(0)),
            emitted: Arc::new(AtomicU64::new(0)),
            rejected: Arc::new(AtomicU64::new(0)),
            evicted: Arc::new(AtomicU64::new(0)),
            latency: PercentileTracker::new(LATENCY_WINDOW),
            start_time: Instant::now(),
        }
    }

    /// Get the task name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record a value taken from upstream
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a value handed downstream
    pub fn record_emitted(&self) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a value filtered out
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an older value overwritten by this task's push
    pub fn record_evicted(&self) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a latency measurement
    pub fn record_latency(&self, elapsed: Duration) {
        self.latency.record(elapsed);
    }

    /// Get the total number of values received
    pub fn total_received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Get the total number of values emitted
    pub fn total_emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Get the total number of values rejected
    pub fn total_rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Get the total number of values evicted
    pub fn total_evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            name: self.name.to_string(),
            received: self.total_received(),
            emitted: self.total_emitted(),
            rejected: self.total_rejected(),
            evicted: self.total_evicted(),
            latency_p50: self.latency.percentile(0.50),
            latency_p99: self.latency.percentile(0.99),
            elapsed: self.start_time.elapsed(),
        }
    }
}

/// A snapshot of one task's metrics
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub name: String,
    pub received: u64,
    pub emitted: u64,
    pub rejected: u64,
    pub evicted: u64,
    pub latency_p50: Duration,
    pub latency_p99: Duration,
    pub elapsed: Duration,
}

impl MetricsSnapshot {
    /// Format metrics as a human-readable string
    pub fn format(&self) -> String {
        format!(
            "{}: Received: {}, Emitted: {}, Rejected: {}, Evicted: {}, \
             Latency P50: {:.2}µs, P99: {:.2}µs",
            self.name,
            self.received,
            self.emitted,
            self.rejected,
            self.evicted,
            self.latency_p50.as_secs_f64() * 1e6,
            self.latency_p99.as_secs_f64() * 1e6,
        )
    }
}

/// Summary of a finished pipeline run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Filter stages, writer and reader, in pipeline order
    pub tasks: Vec<MetricsSnapshot>,
    pub buffer: BufferStats,
    /// Values the reader handed to the output sink
    pub delivered: u64,
    pub elapsed: Duration,
}

impl PipelineReport {
    /// Get the snapshot of the task called `name`
    pub fn task(&self, name: &str) -> Option<&MetricsSnapshot> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Format the report as a human-readable summary
    pub fn format(&self) -> String {
        let mut summary = String::from("Pipeline Report:\n");
        for task in &self.tasks {
            summary.push_str(&format!("  {}\n", task.format()));
        }
        summary.push_str(&format!("  buffer: {}\n", self.buffer.format()));
        summary.push_str(&format!(
            "  delivered {} value(s) in {:.3}s",
            self.delivered,
            self.elapsed.as_secs_f64()
        ));
        summary
    }
}
