//! Server connection metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the export server
#[derive(Debug, Default)]
pub struct ServerMetrics {
    /// Connections currently open
    pub connections_active: AtomicU64,

    /// Connections accepted since start
    pub connections_total: AtomicU64,

    /// Export streams opened
    pub streams_started: AtomicU64,

    /// Status queries served
    pub status_queries: AtomicU64,

    /// Connection-level errors
    pub errors: AtomicU64,
}

impl ServerMetrics {
    /// Create new metrics instance
    pub const fn new() -> Self {
        Self {
            connections_active: AtomicU64::new(0),
            connections_total: AtomicU64::new(0),
            streams_started: AtomicU64::new(0),
            status_queries: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn connection_opened(&self) {
        self.connections_active.fetch_add(1, Ordering::Relaxed);
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn stream_started(&self) {
        self.streams_started.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn status_query(&self) {
        self.status_queries.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> ServerMetricsSnapshot {
        ServerMetricsSnapshot {
            connections_active: self.connections_active.load(Ordering::Relaxed),
            connections_total: self.connections_total.load(Ordering::Relaxed),
            streams_started: self.streams_started.load(Ordering::Relaxed),
            status_queries: self.status_queries.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of server metrics
#[derive(Debug, Clone, Copy)]
pub struct ServerMetricsSnapshot {
    pub connections_active: u64,
    pub connections_total: u64,
    pub streams_started: u64,
    pub status_queries: u64,
    pub errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_accounting() {
        let metrics = ServerMetrics::new();
        metrics.connection_opened();
        metrics.connection_opened();
        metrics.connection_closed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.connections_active, 1);
        assert_eq!(snapshot.connections_total, 2);
    }
}
