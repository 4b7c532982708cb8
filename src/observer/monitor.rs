use std::sync::Mutex;
use std::time::Duration;

use tracing::{info, warn};

use crate::models::Collection;
use crate::observer::traits::Operation;

/// Timing of one pipeline execution
#[derive(Debug, Clone, PartialEq)]
pub struct QueryReport {
    pub collection: Collection,
    pub operation: Operation,
    pub duration: Duration,
    pub success: bool,
    /// 0 for caller-issued operations, >0 for operations issued by observers
    pub depth: usize,
}

impl QueryReport {
    pub fn duration_ms(&self) -> f64 {
        self.duration.as_secs_f64() * 1000.0
    }
}

/// Sink for query timings. Called exactly once per pipeline execution,
/// failed and nested executions included.
pub trait QueryMonitor: Send + Sync {
    fn record(&self, report: &QueryReport);
}

/// Logs every report; reports above the threshold are logged at warn.
#[derive(Debug, Clone, Default)]
pub struct TracingMonitor {
    slow_query_threshold: Option<Duration>,
}

impl TracingMonitor {
    pub fn new(slow_query_threshold: Option<Duration>) -> Self {
        Self { slow_query_threshold }
    }
}

impl QueryMonitor for TracingMonitor {
    fn record(&self, report: &QueryReport) {
        match self.slow_query_threshold {
            Some(threshold) if report.duration > threshold => warn!(
                collection = %report.collection,
                operation = %report.operation,
                "slow query {} on {} took {:.3}ms",
                report.operation,
                report.collection,
                report.duration_ms()
            ),
            _ => info!(
                "query {} on {} completed in {:.3}ms",
                report.operation,
                report.collection,
                report.duration_ms()
            ),
        }
    }
}

/// Keeps every report in memory.
#[derive(Debug, Default)]
pub struct MemoryMonitor {
    reports: Mutex<Vec<QueryReport>>,
}

impl MemoryMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<QueryReport> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn count_for(&self, collection: Collection, operation: Operation) -> usize {
        self.lock()
            .iter()
            .filter(|r| r.collection == collection && r.operation == operation)
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<QueryReport>> {
        match self.reports.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl QueryMonitor for MemoryMonitor {
    fn record(&self, report: &QueryReport) {
        self.lock().push(report.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(collection: Collection, operation: Operation) -> QueryReport {
        QueryReport {
            collection,
            operation,
            duration: Duration::from_micros(1500),
            success: true,
            depth: 0,
        }
    }

    #[test]
    fn memory_monitor_counts_by_kind() {
        let monitor = MemoryMonitor::new();
        monitor.record(&report(Collection::Posts, Operation::Find));
        monitor.record(&report(Collection::Posts, Operation::Find));
        monitor.record(&report(Collection::Users, Operation::Delete));
        assert_eq!(monitor.len(), 3);
        assert_eq!(monitor.count_for(Collection::Posts, Operation::Find), 2);
        monitor.clear();
        assert!(monitor.is_empty());
    }

    #[test]
    fn duration_in_millis() {
        assert!((report(Collection::Posts, Operation::Find).duration_ms() - 1.5).abs() < 1e-9);
    }
}
