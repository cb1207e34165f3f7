use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Default)]
struct TypeStat {
    commits: AtomicU64,
    aborts: AtomicU64,
    latencies_us: Mutex<Vec<f64>>,
}

impl TypeStat {
    fn abort_percentage(&self) -> f64 {
        let commits = self.commits.load(Ordering::Relaxed);
        let aborts = self.aborts.load(Ordering::Relaxed);
        let total = commits + aborts;
        if total == 0 {
            return 0.0;
        }
        100.0 * aborts as f64 / total as f64
    }
}

/// Per-transaction-type commit/abort counters and latency recording.
///
/// Counters are atomic; each type's latency vector sits behind its own mutex
/// and the map of types behind a top-level one, taken only to add or look up
/// an entry. Nothing is streamed: the report is derived once at end of run.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    stats: Mutex<HashMap<String, Arc<TypeStat>>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn stat(&self, type_name: &str) -> Arc<TypeStat> {
        let mut stats = self.stats.lock();
        stats.entry(type_name.to_string()).or_default().clone()
    }

    /// Latency is end-to-end for the logical transaction, including every
    /// retry and backoff sleep.
    pub fn record_commit(&self, type_name: &str, latency_us: f64) {
        let stat = self.stat(type_name);
        stat.commits.fetch_add(1, Ordering::Relaxed);
        stat.latencies_us.lock().push(latency_us);
    }

    pub fn record_abort(&self, type_name: &str) {
        let stat = self.stat(type_name);
        stat.aborts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_commits(&self) -> u64 {
        let stats = self.stats.lock();
        stats
            .values()
            .map(|s| s.commits.load(Ordering::Relaxed))
            .sum()
    }

    pub fn total_aborts(&self) -> u64 {
        let stats = self.stats.lock();
        stats
            .values()
            .map(|s| s.aborts.load(Ordering::Relaxed))
            .sum()
    }

    pub fn abort_percentage(&self, type_name: &str) -> f64 {
        self.stat(type_name).abort_percentage()
    }

    pub fn throughput(&self, elapsed_s: f64) -> f64 {
        if elapsed_s <= 0.0 {
            return 0.0;
        }
        self.total_commits() as f64 / elapsed_s
    }

    /// Derive the end-of-run report.
    pub fn report(&self, elapsed_s: f64) -> MetricsReport {
        let stats = self.stats.lock();

        let mut per_type = BTreeMap::new();
        for (type_name, stat) in stats.iter() {
            let latencies = stat.latencies_us.lock();
            per_type.insert(
                type_name.clone(),
                TypeReport {
                    commits: stat.commits.load(Ordering::Relaxed),
                    aborts: stat.aborts.load(Ordering::Relaxed),
                    abort_pct: stat.abort_percentage(),
                    avg_latency_us: mean(&latencies),
                    p50_latency_us: percentile(&latencies, 50.0),
                    p90_latency_us: percentile(&latencies, 90.0),
                    p99_latency_us: percentile(&latencies, 99.0),
                },
            );
        }

        let total_commits: u64 = per_type.values().map(|t| t.commits).sum();
        let total_aborts: u64 = per_type.values().map(|t| t.aborts).sum();
        let throughput = if elapsed_s > 0.0 {
            total_commits as f64 / elapsed_s
        } else {
            0.0
        };

        MetricsReport {
            elapsed_s,
            total_commits,
            total_aborts,
            throughput,
            per_type,
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Linear interpolation on the sorted sample, `p` in percent.
fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let index = (p / 100.0) * (sorted.len() - 1) as f64;
    let lo = index.floor() as usize;
    let hi = index.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = index - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

#[derive(Debug, Clone, Serialize)]
pub struct TypeReport {
    pub commits: u64,
    pub aborts: u64,
    pub abort_pct: f64,
    pub avg_latency_us: f64,
    pub p50_latency_us: f64,
    pub p90_latency_us: f64,
    pub p99_latency_us: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub elapsed_s: f64,
    pub total_commits: u64,
    pub total_aborts: u64,
    pub throughput: f64,
    pub per_type: BTreeMap<String, TypeReport>,
}

impl fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "========== Performance Report ==========")?;
        writeln!(f, "Elapsed time:    {:.2} s", self.elapsed_s)?;
        writeln!(f, "Total commits:   {}", self.total_commits)?;
        writeln!(f, "Total aborts:    {}", self.total_aborts)?;
        writeln!(f, "Throughput:      {:.2} txn/s", self.throughput)?;
        let total = self.total_commits + self.total_aborts;
        if total > 0 {
            writeln!(
                f,
                "Overall abort %: {:.2}%",
                100.0 * self.total_aborts as f64 / total as f64
            )?;
        }
        for (type_name, t) in &self.per_type {
            writeln!(f)?;
            writeln!(f, "  [{type_name}]")?;
            writeln!(f, "    Commits:       {}", t.commits)?;
            writeln!(f, "    Aborts:        {}", t.aborts)?;
            writeln!(f, "    Abort %:       {:.2}%", t.abort_pct)?;
            writeln!(f, "    Avg latency:   {:.2} us", t.avg_latency_us)?;
            writeln!(f, "    P50 latency:   {:.2} us", t.p50_latency_us)?;
            writeln!(f, "    P90 latency:   {:.2} us", t.p90_latency_us)?;
            writeln!(f, "    P99 latency:   {:.2} us", t.p99_latency_us)?;
        }
        write!(f, "========================================")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_commits_and_aborts_per_type() {
        let metrics = MetricsCollector::new();
        metrics.record_commit("transfer", 100.0);
        metrics.record_commit("transfer", 200.0);
        metrics.record_abort("transfer");
        metrics.record_commit("balance_check", 50.0);

        assert_eq!(metrics.total_commits(), 3);
        assert_eq!(metrics.total_aborts(), 1);
        assert!((metrics.abort_percentage("transfer") - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(metrics.abort_percentage("balance_check"), 0.0);
    }

    #[test]
    fn percentiles_interpolate_linearly() {
        let values = vec![10.0, 20.0, 30.0, 40.0];
        assert_eq!(percentile(&values, 0.0), 10.0);
        assert_eq!(percentile(&values, 100.0), 40.0);
        // index 1.5 -> halfway between 20 and 30
        assert!((percentile(&values, 50.0) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn empty_collector_produces_zero_row_report() {
        let metrics = MetricsCollector::new();
        let report = metrics.report(1.0);
        assert_eq!(report.total_commits, 0);
        assert_eq!(report.total_aborts, 0);
        assert_eq!(report.throughput, 0.0);
        assert!(report.per_type.is_empty());
    }

    #[test]
    fn report_aggregates_and_serializes() {
        let metrics = MetricsCollector::new();
        for latency in [100.0, 300.0, 200.0] {
            metrics.record_commit("transfer", latency);
        }
        metrics.record_abort("transfer");

        let report = metrics.report(2.0);
        assert_eq!(report.total_commits, 3);
        assert_eq!(report.throughput, 1.5);

        let t = &report.per_type["transfer"];
        assert_eq!(t.commits, 3);
        assert_eq!(t.aborts, 1);
        assert!((t.avg_latency_us - 200.0).abs() < 1e-9);
        assert_eq!(t.p50_latency_us, 200.0);

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"transfer\""));
    }

    #[test]
    fn zero_elapsed_yields_zero_throughput() {
        let metrics = MetricsCollector::new();
        metrics.record_commit("transfer", 1.0);
        assert_eq!(metrics.throughput(0.0), 0.0);
    }
}
