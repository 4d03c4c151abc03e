//! Per-operation latency and outcome collection.
//!
//! Every dispatched operation is reported twice: once with its elapsed time through
//! [`Measurements::measure`], and once with its outcome through
//! [`Measurements::report_status`]. Operations that were never dispatched (no key could be
//! resolved) only report a status.
//!
//! ## Output Format
//!
//! After a phase, each label gets one line:
//!
//! ```txt
//! phase run op READ total 950 ok 948 failed 2 min_us 0.05 max_us 100.00 avg_us 50.00 p50_us 50.00 p95_us 95.00 p99_us 99.00 p999_us 100.00 NOT_FOUND 2
//! ```
//!
//! Failures are broken down by status after the latency metrics. When `cdf` is enabled, the
//! latency CDF follows at the end of the line as `cdf_us percentile <us> <percentile> ...`, in
//! the same format as the phase summary.

use crate::Status;
use hashbrown::HashMap;
use hdrhistogram::Histogram;
use log::warn;
use std::fmt::Write;
use std::time::Duration;

/// A sink for operation timings and outcomes.
pub trait Measurements {
    /// Record the latency of one operation under `label`.
    fn measure(&mut self, label: &'static str, elapsed: Duration);

    /// Record the outcome of one operation under `label`.
    fn report_status(&mut self, label: &'static str, status: Status);
}

/// Latency and outcome counters of a single label.
pub struct OpStats {
    /// Latency histogram in ns
    hdr: Histogram<u64>,
    statuses: HashMap<Status, u64>,
}

impl OpStats {
    fn new() -> Self {
        // auto-resizing, so every value can be recorded
        let hdr = Histogram::new(3).expect("3 significant figures is a valid precision");
        Self {
            hdr,
            statuses: HashMap::new(),
        }
    }

    /// Operations reported with any status.
    pub fn total(&self) -> u64 {
        self.statuses.values().sum()
    }

    pub fn ok(&self) -> u64 {
        self.count(Status::Ok)
    }

    pub fn failed(&self) -> u64 {
        self.total() - self.ok()
    }

    pub fn count(&self, status: Status) -> u64 {
        self.statuses.get(&status).copied().unwrap_or(0)
    }

    /// Operations that were timed.
    pub fn timed(&self) -> u64 {
        self.hdr.len()
    }

    pub fn latency(&self) -> &Histogram<u64> {
        &self.hdr
    }

    fn merge(&mut self, other: &OpStats) {
        if let Err(e) = self.hdr.add(&other.hdr) {
            warn!("Failed to merge latency histograms: {}", e);
        }
        for (status, count) in other.statuses.iter() {
            *self.statuses.entry(*status).or_default() += count;
        }
    }

    fn line(&self, phase: &str, label: &str, cdf: bool) -> String {
        let hdr = &self.hdr;
        let mut line = format!(
            "phase {} op {} total {} ok {} failed {} \
             min_us {:.2} max_us {:.2} avg_us {:.2} \
             p50_us {:.2} p95_us {:.2} p99_us {:.2} p999_us {:.2}",
            phase,
            label,
            self.total(),
            self.ok(),
            self.failed(),
            hdr.min() as f64 / 1000.0,
            hdr.max() as f64 / 1000.0,
            hdr.mean() / 1000.0,
            hdr.value_at_quantile(0.50) as f64 / 1000.0,
            hdr.value_at_quantile(0.95) as f64 / 1000.0,
            hdr.value_at_quantile(0.99) as f64 / 1000.0,
            hdr.value_at_quantile(0.999) as f64 / 1000.0,
        );

        let mut failures: Vec<(String, u64)> = self
            .statuses
            .iter()
            .filter(|(s, _)| !s.is_ok())
            .map(|(s, c)| (s.to_string(), *c))
            .collect();
        failures.sort();
        for (status, count) in failures {
            let _ = write!(line, " {} {}", status, count);
        }

        if cdf && hdr.len() > 0 {
            line.push_str(" cdf_us percentile ");
            let total = hdr.len();
            let mut acc = 0;
            for v in hdr.iter_linear(1000) {
                let ns = v.value_iterated_to();
                let us = (ns + 1) / 1000;
                acc += v.count_since_last_iteration();
                let _ = write!(line, "{} {:.2}", us, acc as f64 * 100.0 / total as f64);
                if ns >= hdr.max() {
                    break;
                }
                line.push(' ');
            }
        }
        line
    }
}

/// The built-in [`Measurements`]: one [`OpStats`] per label.
///
/// Each worker owns one and the runner merges them after the phase, so recording never
/// contends.
#[derive(Default)]
pub struct OpMeasurement {
    ops: HashMap<&'static str, OpStats>,
}

impl OpMeasurement {
    pub fn new() -> Self {
        Self::default()
    }

    fn stats(&mut self, label: &'static str) -> &mut OpStats {
        self.ops.entry(label).or_insert_with(OpStats::new)
    }

    pub fn get(&self, label: &str) -> Option<&OpStats> {
        self.ops.get(label)
    }

    /// All labels seen so far, sorted.
    pub fn labels(&self) -> Vec<&'static str> {
        let mut labels: Vec<&'static str> = self.ops.keys().copied().collect();
        labels.sort_unstable();
        labels
    }

    /// Operations reported with any status, over all labels.
    pub fn total(&self) -> u64 {
        self.ops.values().map(|s| s.total()).sum()
    }

    pub fn merge(&mut self, other: &OpMeasurement) {
        for (label, stats) in other.ops.iter() {
            self.stats(*label).merge(stats);
        }
    }

    /// The report lines of all labels, in label order.
    pub fn lines(&self, phase: &str, cdf: bool) -> Vec<String> {
        self.labels()
            .into_iter()
            .filter_map(|label| self.ops.get(label).map(|s| s.line(phase, label, cdf)))
            .collect()
    }
}

impl Measurements for OpMeasurement {
    fn measure(&mut self, label: &'static str, elapsed: Duration) {
        let ns = elapsed.as_nanos().try_into().unwrap_or(u64::MAX);
        self.stats(label).hdr.saturating_record(ns);
    }

    fn report_status(&mut self, label: &'static str, status: Status) {
        *self.stats(label).statuses.entry(status).or_default() += 1;
    }
}
