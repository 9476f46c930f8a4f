//! Request metrics aggregation
//!
//! A [`Metrics`] registry keeps one [`MetricsEntry`] per `(endpoint, method)`
//! pair plus a global `total` entry. Virtual users write to it concurrently
//! while the reporting task takes [`Snapshot`]s.
//!
//! Response times are bucketed by whole milliseconds, so percentiles have a
//! resolution of 1 ms.

use std::collections::BTreeMap;

use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Registry key: `(endpoint, method)`
pub type EntryKey = (String, String);

/// Two decimals, ties to even
fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Counters and response-time histogram for one endpoint (or for all of them)
#[derive(Debug, Clone)]
pub struct MetricsEntry {
    endpoint: Option<String>,
    method: Option<String>,
    num_requests: u64,
    num_failures: u64,
    total_response_time: f64,
    min_response_time: Option<f64>,
    max_response_time: f64,
    /// Rounded milliseconds -> number of responses
    response_times: BTreeMap<u64, u64>,
    start_time: Instant,
    last_request_timestamp: Option<Instant>,
}

impl MetricsEntry {
    pub fn new(endpoint: Option<String>, method: Option<String>) -> Self {
        Self {
            endpoint,
            method,
            num_requests: 0,
            num_failures: 0,
            total_response_time: 0.0,
            min_response_time: None,
            max_response_time: 0.0,
            response_times: BTreeMap::new(),
            start_time: Instant::now(),
            last_request_timestamp: None,
        }
    }

    /// Record a successful request that took `response_time` milliseconds
    pub fn log(&mut self, response_time: f64) {
        self.num_requests += 1;
        self.total_response_time += response_time;

        self.min_response_time = Some(match self.min_response_time {
            Some(min) => min.min(response_time),
            None => response_time,
        });
        self.max_response_time = self.max_response_time.max(response_time);

        *self
            .response_times
            .entry(response_time.round_ties_even() as u64)
            .or_insert(0) += 1;

        // Taken while the entry is exclusively borrowed, so it never goes back
        self.last_request_timestamp = Some(Instant::now());
    }

    /// Record a failed request
    pub fn log_error(&mut self) {
        self.num_failures += 1;
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    pub fn num_requests(&self) -> u64 {
        self.num_requests
    }

    pub fn num_failures(&self) -> u64 {
        self.num_failures
    }

    pub fn min_response_time(&self) -> Option<f64> {
        self.min_response_time
    }

    pub fn max_response_time(&self) -> f64 {
        self.max_response_time
    }

    pub fn response_times(&self) -> &BTreeMap<u64, u64> {
        &self.response_times
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    pub fn last_request_timestamp(&self) -> Option<Instant> {
        self.last_request_timestamp
    }

    /// Mean response time in ms, `0.0` before the first success
    pub fn avg_response_time(&self) -> f64 {
        if self.num_requests == 0 {
            return 0.0;
        }
        round2(self.total_response_time / self.num_requests as f64)
    }

    /// Cumulative requests per second over the window `[start, last]`.
    ///
    /// Callers pass the global window of the registry, not this entry's own.
    pub fn rps(&self, start: Instant, last: Option<Instant>) -> f64 {
        let Some(last) = last else {
            return 0.0;
        };
        let elapsed = last.saturating_duration_since(start).as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        round2(self.num_requests as f64 / elapsed)
    }

    /// Nearest-rank percentile over the rounded histogram
    pub fn percentile(&self, percentile: f64) -> Option<u64> {
        if self.num_requests == 0 {
            return None;
        }

        let threshold = self.num_requests as f64 * (percentile / 100.0);
        let mut cumulative = 0u64;

        for (&response_time, &count) in &self.response_times {
            cumulative += count;
            if cumulative as f64 >= threshold {
                return Some(response_time);
            }
        }

        None
    }

    fn row(&self, start: Instant, last: Option<Instant>) -> SnapshotRow {
        SnapshotRow {
            method: self.method.clone(),
            endpoint: self.endpoint.clone(),
            rps: self.rps(start, last),
            median: self.percentile(50.0),
            average: self.avg_response_time(),
            min: self.min_response_time.map(round2),
            max: round2(self.max_response_time),
            failures: self.num_failures,
            requests: self.num_requests,
        }
    }
}

/// Concurrent registry of per-endpoint and aggregate metrics
pub struct Metrics {
    entries: DashMap<EntryKey, MetricsEntry>,
    total: Mutex<MetricsEntry>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            total: Mutex::new(MetricsEntry::new(None, None)),
        }
    }

    /// Record a successful request
    pub fn log_request(&self, method: &str, endpoint: &str, response_time: f64) {
        self.total.lock().log(response_time);
        self.entry(endpoint, method).log(response_time);
    }

    /// Record a failed request
    pub fn log_error(&self, method: &str, endpoint: &str) {
        self.total.lock().log_error();
        self.entry(endpoint, method).log_error();
    }

    /// Look up the entry for a key, inserting an empty one on first use
    fn entry(&self, endpoint: &str, method: &str) -> RefMut<'_, EntryKey, MetricsEntry> {
        self.entries
            .entry((endpoint.to_string(), method.to_string()))
            .or_insert_with(|| {
                MetricsEntry::new(Some(endpoint.to_string()), Some(method.to_string()))
            })
    }

    /// Copy of the aggregate entry
    pub fn total(&self) -> MetricsEntry {
        self.total.lock().clone()
    }

    /// Copy of one endpoint's entry, if it has been observed
    pub fn get(&self, endpoint: &str, method: &str) -> Option<MetricsEntry> {
        self.entries
            .get(&(endpoint.to_string(), method.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Number of distinct `(endpoint, method)` pairs observed so far
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Point-in-time table of every entry plus the aggregate row
    pub fn snapshot(&self) -> Snapshot {
        let (start, last, total) = {
            let total = self.total.lock();
            let (start, last) = (total.start_time, total.last_request_timestamp);
            (start, last, total.row(start, last))
        };

        let mut entries: Vec<(EntryKey, SnapshotRow)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().row(start, last)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        Snapshot {
            entries: entries.into_iter().map(|(_, row)| row).collect(),
            total,
        }
    }
}

/// One rendered line of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRow {
    /// `None` on the aggregate row
    pub method: Option<String>,
    /// `None` on the aggregate row
    pub endpoint: Option<String>,
    pub rps: f64,
    pub median: Option<u64>,
    pub average: f64,
    pub min: Option<f64>,
    pub max: f64,
    pub failures: u64,
    pub requests: u64,
}

/// Metrics table at one point in time, sorted by `(endpoint, method)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub entries: Vec<SnapshotRow>,
    pub total: SnapshotRow,
}

impl Snapshot {
    /// Row for one endpoint, if present
    pub fn row(&self, endpoint: &str, method: &str) -> Option<&SnapshotRow> {
        self.entries.iter().find(|row| {
            row.endpoint.as_deref() == Some(endpoint) && row.method.as_deref() == Some(method)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_average_without_requests() {
        let entry = MetricsEntry::new(None, None);
        assert_eq!(entry.avg_response_time(), 0.0);
        assert_eq!(entry.percentile(50.0), None);
        assert_eq!(entry.min_response_time(), None);
    }

    #[test]
    fn test_log_updates_latency_fields() {
        let mut entry = MetricsEntry::new(Some("/x".into()), Some("GET".into()));
        entry.log(12.4);
        entry.log(3.333);
        entry.log(7.5);

        assert_eq!(entry.num_requests(), 3);
        assert_eq!(entry.min_response_time(), Some(3.333));
        assert_eq!(entry.max_response_time(), 12.4);
        assert_eq!(entry.avg_response_time(), 7.74);
        assert!(entry.last_request_timestamp().is_some());

        let buckets: Vec<_> = entry.response_times().iter().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(buckets, vec![(3, 1), (8, 1), (12, 1)]);
    }

    #[test]
    fn test_half_milliseconds_round_to_even_bucket() {
        let mut entry = MetricsEntry::new(None, None);
        for ms in [10.5, 12.5, 0.5] {
            entry.log(ms);
        }

        let buckets: Vec<u64> = entry.response_times().keys().copied().collect();
        assert_eq!(buckets, vec![0, 10, 12]);
        assert_eq!(entry.percentile(50.0), Some(10));
    }

    #[test]
    fn test_two_decimal_ties_round_to_even() {
        assert_eq!(round2(0.125), 0.12);
        assert_eq!(round2(0.375), 0.38);

        let mut entry = MetricsEntry::new(None, None);
        entry.log(0.125);
        let row = entry.row(entry.start_time(), None);
        assert_eq!(row.min, Some(0.12));
        assert_eq!(row.max, 0.12);
        assert_eq!(row.average, 0.12);
    }

    #[test]
    fn test_errors_leave_latency_untouched() {
        let mut entry = MetricsEntry::new(None, None);
        entry.log_error();
        entry.log_error();

        assert_eq!(entry.num_failures(), 2);
        assert_eq!(entry.num_requests(), 0);
        assert!(entry.response_times().is_empty());
        assert!(entry.last_request_timestamp().is_none());
    }

    #[test]
    fn test_median() {
        let mut entry = MetricsEntry::new(None, None);
        for ms in [10.0, 10.0, 20.0, 20.0, 20.0] {
            entry.log(ms);
        }
        assert_eq!(entry.percentile(50.0), Some(20));
        assert_eq!(entry.percentile(40.0), Some(10));
        assert_eq!(entry.percentile(100.0), Some(20));
    }

    #[test]
    fn test_rps_edge_cases() {
        let entry = MetricsEntry::new(None, None);
        let start = entry.start_time();
        assert_eq!(entry.rps(start, None), 0.0);
        assert_eq!(entry.rps(start, Some(start)), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rps_uses_global_window() {
        let metrics = Metrics::new();
        tokio::time::advance(Duration::from_secs(2)).await;

        for _ in 0..4 {
            metrics.log_request("GET", "/a", 5.0);
        }
        metrics.log_request("GET", "/b", 5.0);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total.rps, 2.5);
        assert_eq!(snapshot.row("/a", "GET").unwrap().rps, 2.0);
        assert_eq!(snapshot.row("/b", "GET").unwrap().rps, 0.5);
    }

    #[test]
    fn test_entries_created_on_first_use() {
        let metrics = Metrics::new();
        assert!(metrics.is_empty());

        metrics.log_error("POST", "/upload");
        metrics.log_request("GET", "/hello", 1.0);
        metrics.log_request("GET", "/hello", 2.0);

        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics.get("/upload", "POST").unwrap().num_failures(), 1);
        assert_eq!(metrics.get("/hello", "GET").unwrap().num_requests(), 2);
        assert!(metrics.get("/hello", "POST").is_none());

        let total = metrics.total();
        assert_eq!(total.num_requests(), 2);
        assert_eq!(total.num_failures(), 1);
    }

    #[test]
    fn test_snapshot_sorted_by_endpoint_then_method() {
        let metrics = Metrics::new();
        metrics.log_request("POST", "/b", 1.0);
        metrics.log_request("GET", "/b", 1.0);
        metrics.log_request("GET", "/a", 1.0);

        let snapshot = metrics.snapshot();
        let keys: Vec<_> = snapshot
            .entries
            .iter()
            .map(|row| (row.endpoint.clone().unwrap(), row.method.clone().unwrap()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("/a".to_string(), "GET".to_string()),
                ("/b".to_string(), "GET".to_string()),
                ("/b".to_string(), "POST".to_string()),
            ]
        );
        assert_eq!(snapshot.total.method, None);
        assert_eq!(snapshot.total.requests, 3);
    }

    #[test]
    fn test_snapshot_rounds_latencies() {
        let metrics = Metrics::new();
        metrics.log_request("GET", "/x", 1.23456);
        metrics.log_request("GET", "/x", 9.87654);

        let row = metrics.snapshot().row("/x", "GET").cloned().unwrap();
        assert_eq!(row.min, Some(1.23));
        assert_eq!(row.max, 9.88);
        assert_eq!(row.average, 5.56);
        assert_eq!(row.median, Some(1));
    }

    #[test]
    fn test_concurrent_ingestion() {
        let metrics = Arc::new(Metrics::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let metrics = metrics.clone();
                std::thread::spawn(move || {
                    let endpoint = format!("/e{}", i % 3);
                    for n in 0..500 {
                        if n % 5 == 0 {
                            metrics.log_error("GET", &endpoint);
                        } else {
                            metrics.log_request("GET", &endpoint, n as f64);
                        }
                        if n % 100 == 0 {
                            let _ = metrics.snapshot();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total.requests, 8 * 400);
        assert_eq!(snapshot.total.failures, 8 * 100);
        let sum: u64 = snapshot.entries.iter().map(|row| row.requests).sum();
        assert_eq!(sum, snapshot.total.requests);
    }

    proptest! {
        #[test]
        fn prop_total_is_sum_of_entries(
            ops in prop::collection::vec((0usize..4, any::<bool>(), 0.0f64..5_000.0), 0..200)
        ) {
            let endpoints = ["/a", "/b", "/c", "/d"];
            let metrics = Metrics::new();

            for (idx, success, latency) in &ops {
                if *success {
                    metrics.log_request("GET", endpoints[*idx], *latency);
                } else {
                    metrics.log_error("GET", endpoints[*idx]);
                }
            }

            let snapshot = metrics.snapshot();
            let requests: u64 = snapshot.entries.iter().map(|r| r.requests).sum();
            let failures: u64 = snapshot.entries.iter().map(|r| r.failures).sum();
            prop_assert_eq!(requests, snapshot.total.requests);
            prop_assert_eq!(failures, snapshot.total.failures);

            let total = metrics.total();
            let bucketed: u64 = total.response_times().values().sum();
            prop_assert_eq!(bucketed, total.num_requests());
            if let Some(min) = total.min_response_time() {
                prop_assert!(min <= total.max_response_time());
            }
        }
    }
}
