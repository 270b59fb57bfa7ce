//! Observability and Metrics
//!
//! Process-wide counters for RCON and Server List Ping activity.
//!
//! Uses atomic counters for thread-safe metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Global metrics collector for client operations
#[derive(Debug)]
pub struct Metrics {
    /// TCP connections established
    pub connections_total: AtomicU64,
    /// Connect attempts or in-flight operations that failed at the transport level
    pub connection_errors: AtomicU64,
    /// RCON logins rejected by the server
    pub logins_failed: AtomicU64,
    /// RCON commands sent
    pub commands_sent: AtomicU64,
    /// RCON clients evicted from a pool
    pub evictions: AtomicU64,
    /// SLP status queries completed
    pub status_queries: AtomicU64,
    /// SLP pings completed
    pub pings: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            logins_failed: AtomicU64::new(0),
            commands_sent: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            status_queries: AtomicU64::new(0),
            pings: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn connection_established(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_error(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn login_failed(&self) {
        self.logins_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_sent(&self) {
        self.commands_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn client_evicted(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn status_query(&self) {
        self.status_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ping(&self) {
        self.pings.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            logins_failed: self.logins_failed.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            status_queries: self.status_queries.load(Ordering::Relaxed),
            pings: self.pings.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_summary(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_total = snapshot.connections_total,
            connection_errors = snapshot.connection_errors,
            logins_failed = snapshot.logins_failed,
            commands_sent = snapshot.commands_sent,
            evictions = snapshot.evictions,
            status_queries = snapshot.status_queries,
            pings = snapshot.pings,
            uptime_seconds = snapshot.uptime_seconds,
            "Client metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connection_errors: u64,
    pub logins_failed: u64,
    pub commands_sent: u64,
    pub evictions: u64,
    pub status_queries: u64,
    pub pings: u64,
    pub uptime_seconds: u64,
}

static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(Metrics::new);

/// Get the global metrics instance
pub fn global() -> &'static Metrics {
    &METRICS
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
    }
}
