//! The core benchmark functionality.
//!
//! A benchmark runs up to two **phases** against one store, sequentially: the load phase that
//! populates the store, and the run phase that issues the operation mix. Each phase is executed
//! by a pool of worker threads that start at the same time and each own a store handle, a
//! [`Worker`](crate::workload::Worker) and a measurement. The measurements are merged and printed
//! after the phase.
//!
//! ## Configuration Format
//!
//! A benchmark configuration file is formatted in TOML. It consists of three sections: `[map]`
//! that selects the store (see [`mod@crate::stores`]), the optional `[benchmark]` section that
//! controls the runner, and `[workload]` that defines the workload itself:
//!
//! ```toml
//! [map]
//! name = "rwlock_btreemap"
//!
//! [benchmark]
//! threads = 4
//! report = "all"
//! cdf = false
//!
//! [workload]
//! recordcount = 1000
//! operationcount = 1000
//! ```
//!
//! Available options and their usage can be found in [`BenchmarkOpt`] and
//! [`WorkloadOpt`](crate::workload::WorkloadOpt).
//!
//! Any option can be overwritten via environment variables without changing the content in the
//! TOML file. For example, setting the environment variable `workload.recordcount` overrides
//! `recordcount` in the `[workload]` section.
//!
//! ## Output Format
//!
//! Currently, all outputs are in plain text format. This makes the output easy to process using
//! shell scripts and tools including gnuplot. If there are new data added to the output, it
//! will be appended at the end of existing entries (but before `cdf` if it exists) to make sure
//! outputs from old versions can still be processed without changes.
//!
//! After each phase, a summary line is printed:
//!
//! ```txt
//! phase run finish . duration 1.00 elapsed 2.00 total 1000 ops 1000.00
//! ```
//!
//! Where:
//!
//! - `phase`: `load` or `run`.
//! - `duration`: the duration of the phase, in seconds.
//! - `elapsed`: the total elapsed seconds since the start of the first phase.
//! - `total`: the number of operations reported by all worker threads in the phase, including
//! failed ones.
//! - `ops`: the throughput in operations per second.
//!
//! With `report = "all"`, the summary is followed by one line per operation label, in the format
//! described in [`mod@crate::measurement`].

use crate::measurement::OpMeasurement;
use crate::stores::{new_store, KVStoreOpt};
use crate::thread::{JoinHandle, Thread};
use crate::workload::{Phase, Workload, WorkloadOpt};
use crate::*;
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use quanta::Instant;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

// {{{ benchmark

/// How the results are printed out.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportMode {
    /// No results.
    Hidden,
    /// Only the summary line of each phase.
    Finish,
    /// The summary line and the per-label lines.
    #[default]
    All,
}

/// The `[benchmark]` section.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BenchmarkOpt {
    /// Number of threads that run each phase.
    ///
    /// Default: 1.
    pub threads: usize,

    /// Report mode: "hidden", "finish" or "all".
    ///
    /// Default: "all".
    pub report: ReportMode,

    /// Whether or not to print out the latency CDF of each operation label.
    ///
    /// Default: false.
    pub cdf: bool,
}

impl Default for BenchmarkOpt {
    fn default() -> Self {
        Self {
            threads: 1,
            report: ReportMode::default(),
            cdf: false,
        }
    }
}

/// The validated runner configuration.
#[derive(Debug, PartialEq)]
pub struct Benchmark {
    threads: usize,
    report: ReportMode,
    cdf: bool,
}

impl Benchmark {
    pub fn new(opt: &BenchmarkOpt) -> Result<Self> {
        if opt.threads == 0 {
            return Err(Error::InvalidOption {
                name: "threads",
                detail: "should be positive".to_string(),
            });
        }
        Ok(Self {
            threads: opt.threads,
            report: opt.report,
            cdf: opt.cdf,
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }
}

/// The whole configuration document.
#[derive(Deserialize, Clone, Debug)]
struct BenchOpt {
    map: KVStoreOpt,

    #[serde(default)]
    benchmark: BenchmarkOpt,

    #[serde(default)]
    workload: WorkloadOpt,
}

// }}} benchmark

// {{{ bencher

/// Parse a configuration document and build everything a benchmark needs.
///
/// Configuration problems of any of the three sections are reported here, before any traffic.
pub fn init(text: &str) -> Result<(Arc<dyn KVStore>, Benchmark, Arc<Workload>)> {
    let opt: BenchOpt = Figment::new()
        .merge(Toml::string(text))
        .merge(Env::raw())
        .extract()?;
    debug!("Creating benchmark with the following configurations: {:?}", opt);
    let benchmark = Benchmark::new(&opt.benchmark)?;
    // the store instance is never used directly, only its handles are
    let store = new_store(&opt.map)?;
    let workload = Arc::new(Workload::new(&opt.workload)?);
    Ok((store, benchmark, workload))
}

/// The results of one phase, merged over all workers.
pub struct PhaseReport {
    pub phase: Phase,
    pub duration: Duration,
    pub measurement: OpMeasurement,
}

impl PhaseReport {
    /// Operations reported with any status.
    pub fn total(&self) -> u64 {
        self.measurement.total()
    }

    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.total() as f64 / secs
        } else {
            0.0
        }
    }
}

/// The share of `quota` issued by worker `id`. The remainder goes to the lowest ids.
pub fn split_quota(quota: u64, threads: usize, id: usize) -> u64 {
    let threads = threads as u64;
    let id = id as u64;
    quota / threads + u64::from(id < quota % threads)
}

struct WorkerContext {
    phase: Phase,

    /// Operations this worker issues unless stopped
    quota: u64,

    /// Barrier that syncs all workers and the coordinator at the start of the phase
    barrier: Arc<Barrier>,

    /// Set when the benchmark should end early
    stop: Arc<AtomicBool>,

    /// The measurement of this worker. It is locked by the worker for the whole phase and only
    /// read by the coordinator after joining.
    measurement: Arc<Mutex<OpMeasurement>>,

    id: usize,
}

fn bench_worker(
    store: Arc<dyn KVStore>,
    workload: Arc<Workload>,
    context: WorkerContext,
    thread: Arc<dyn Thread>,
) {
    let WorkerContext {
        phase,
        quota,
        barrier,
        stop,
        measurement,
        id,
    } = context;

    thread.pin(id);

    let mut measurement = measurement.lock();
    let handle = store.handle();
    let mut worker = workload.worker();

    // start the phase at roughly the same time, even if this worker can't do anything
    barrier.wait();

    let mut handle = match handle {
        Ok(h) => h,
        Err(e) => {
            error!("Worker {} can't create a store handle: {}", id, e);
            return;
        }
    };

    for _ in 0..quota {
        if stop.load(Ordering::Relaxed) {
            debug!("Worker {} stopped", id);
            break;
        }
        worker.do_operation(phase, handle.as_mut(), &mut *measurement);
    }
}

fn bench_phase(
    store: &Arc<dyn KVStore>,
    benchmark: &Benchmark,
    workload: &Arc<Workload>,
    phase: Phase,
    stop: &Arc<AtomicBool>,
) -> PhaseReport {
    let threads = benchmark.threads;
    let quota = workload.quota(phase);
    info!(
        "Starting {} phase: {} operations on {} threads",
        phase, quota, threads
    );

    let thread = store.thread();
    // the coordinator joins the barrier to take the start time
    let barrier = Arc::new(Barrier::new(threads + 1));
    let measurements: Vec<Arc<Mutex<OpMeasurement>>> = (0..threads)
        .map(|_| Arc::new(Mutex::new(OpMeasurement::new())))
        .collect();
    let mut handles: Vec<Box<dyn JoinHandle>> = Vec::with_capacity(threads);
    for id in 0..threads {
        let context = WorkerContext {
            phase,
            quota: split_quota(quota, threads, id),
            barrier: barrier.clone(),
            stop: stop.clone(),
            measurement: measurements[id].clone(),
            id,
        };
        let store = store.clone();
        let workload = workload.clone();
        let worker_thread = thread.clone();
        let handle = thread.spawn(Box::new(move || {
            bench_worker(store, workload, context, worker_thread);
        }));
        handles.push(handle);
    }

    barrier.wait();
    let start = Instant::now();
    for handle in handles {
        handle.join();
    }
    let duration = start.elapsed();

    let mut measurement = OpMeasurement::new();
    for m in measurements.iter() {
        measurement.merge(&m.lock());
    }
    info!("Finished {} phase in {:.2} seconds", phase, duration.as_secs_f64());

    PhaseReport {
        phase,
        duration,
        measurement,
    }
}

fn bench_stat_final(benchmark: &Benchmark, report: &PhaseReport, elapsed: Duration) {
    if benchmark.report == ReportMode::Hidden {
        return;
    }
    println!(
        "phase {} finish . duration {:.2} elapsed {:.2} total {} ops {:.2}",
        report.phase,
        report.duration.as_secs_f64(),
        elapsed.as_secs_f64(),
        report.total(),
        report.throughput(),
    );
    if benchmark.report == ReportMode::All {
        let phase = report.phase.to_string();
        for line in report.measurement.lines(&phase, benchmark.cdf) {
            println!("{}", line);
        }
    }
}

/// Run the given phases in order, then clean up and tear the workload down.
///
/// Once `stop` is set, workers finish their current operation and the remaining phases are
/// skipped. Cleanup and teardown still happen.
pub fn bench(
    store: &Arc<dyn KVStore>,
    benchmark: &Benchmark,
    workload: &Arc<Workload>,
    phases: &[Phase],
    stop: &Arc<AtomicBool>,
) -> Vec<PhaseReport> {
    debug!("Running bencher with phases {:?}", phases);
    let since = Instant::now();
    let mut reports = Vec::with_capacity(phases.len());
    for phase in phases.iter() {
        if stop.load(Ordering::Relaxed) {
            warn!("Benchmark interrupted, skipping {} phase", phase);
            break;
        }
        let report = bench_phase(store, benchmark, workload, *phase, stop);
        bench_stat_final(benchmark, &report, since.elapsed());
        reports.push(report);
    }
    if reports.iter().any(|r| r.phase == Phase::Run) {
        workload.cleanup(store.as_ref());
    }
    workload.teardown();
    reports
}

// }}} bencher

// {{{ tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::btreemap::RwLockBTreeMap;

    const NULL: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/presets/stores/null.toml"
    ));

    const MUTEX_BTREEMAP: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/presets/stores/mutex_btreemap.toml"
    ));

    const RWLOCK_BTREEMAP: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/presets/stores/rwlock_btreemap.toml"
    ));

    const MUTEX_HASHMAP: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/presets/stores/mutex_hashmap.toml"
    ));

    const RWLOCK_HASHMAP: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/presets/stores/rwlock_hashmap.toml"
    ));

    macro_rules! workload_preset {
        ($name:literal) => {
            include_str!(concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/presets/workloads/",
                $name,
                ".toml"
            ))
        };
    }

    fn example(store_opt: &str, workload_opt: &str) -> (Arc<Workload>, Vec<PhaseReport>) {
        let _ = env_logger::try_init();
        let opt = store_opt.to_string() + "\n" + workload_opt;
        let (store, benchmark, workload) = init(&opt).unwrap();
        let stop = Arc::new(AtomicBool::new(false));
        let reports = bench(
            &store,
            &benchmark,
            &workload,
            &[Phase::Load, Phase::Run],
            &stop,
        );
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].phase, Phase::Load);
        assert_eq!(reports[0].total(), workload.quota(Phase::Load));
        assert_eq!(reports[1].phase, Phase::Run);
        assert_eq!(reports[1].total(), workload.quota(Phase::Run));
        assert!(!workload.is_sliding());
        (workload, reports)
    }

    fn assert_no_failures(report: &PhaseReport) {
        for label in report.measurement.labels() {
            let stats = report.measurement.get(label).unwrap();
            assert_eq!(stats.failed(), 0, "{} has failures", label);
        }
    }

    #[test]
    fn benchmark_defaults() {
        let opt = r#"
            [map]
            name = "null"

            [workload]
            recordcount = 10
        "#;
        let (_, benchmark, workload) = init(opt).unwrap();
        assert_eq!(
            benchmark,
            Benchmark {
                threads: 1,
                report: ReportMode::All,
                cdf: false,
            }
        );
        assert_eq!(workload.quota(Phase::Load), 10);
        assert_eq!(workload.quota(Phase::Run), 0);
    }

    #[test]
    fn benchmark_options() {
        let opt = r#"
            [map]
            name = "null"

            [benchmark]
            threads = 8
            report = "finish"
            cdf = true

            [workload]
            recordcount = 100
            operationcount = 200
        "#;
        let (_, benchmark, workload) = init(opt).unwrap();
        assert_eq!(
            benchmark,
            Benchmark {
                threads: 8,
                report: ReportMode::Finish,
                cdf: true,
            }
        );
        assert_eq!(workload.quota(Phase::Load), 100);
        assert_eq!(workload.quota(Phase::Run), 200);
    }

    #[test]
    fn invalid_configurations() {
        let opt = r#"
            [map]
            name = "null"
            [benchmark]
            threads = 0
        "#;
        assert!(matches!(
            init(opt),
            Err(Error::InvalidOption { name: "threads", .. })
        ));

        let opt = r#"
            [map]
            name = "null"
            [benchmark]
            report = "repeat"
        "#;
        assert!(matches!(init(opt), Err(Error::Config(_))));

        let opt = r#"
            [benchmark]
            threads = 1
        "#;
        assert!(matches!(init(opt), Err(Error::Config(_))));

        let opt = r#"
            [map]
            name = "nosuchstore"
        "#;
        assert!(matches!(init(opt), Err(Error::UnknownStore(_))));

        let opt = r#"
            [map]
            name = "null"
            [workload]
            requestdistribution = "gaussian"
        "#;
        assert!(matches!(init(opt), Err(Error::UnknownDistribution { .. })));
    }

    #[test]
    fn quota_is_split_evenly() {
        let shares: Vec<u64> = (0..4).map(|id| split_quota(10, 4, id)).collect();
        assert_eq!(shares, vec![3, 3, 2, 2]);
        assert_eq!((0..3).map(|id| split_quota(3, 3, id)).sum::<u64>(), 3);
        assert_eq!((0..8).map(|id| split_quota(5, 8, id)).sum::<u64>(), 5);
        assert_eq!(split_quota(0, 2, 0), 0);
    }

    #[test]
    fn stop_skips_everything() {
        let opt = RWLOCK_BTREEMAP.to_string() + "\n" + workload_preset!("workloada");
        let (store, benchmark, workload) = init(&opt).unwrap();
        let stop = Arc::new(AtomicBool::new(true));
        let reports = bench(&store, &benchmark, &workload, &[Phase::Load], &stop);
        assert!(reports.is_empty());
    }

    #[test]
    fn load_fills_the_store() {
        let opt = r#"
            [map]
            name = "null"
            [benchmark]
            threads = 3
            report = "hidden"
            [workload]
            recordcount = 1000
            insertstart = 100
            insertcount = 500
        "#;
        let (_, benchmark, workload) = init(opt).unwrap();
        let store = RwLockBTreeMap::new();
        let shared: Arc<dyn KVStore> = Arc::new(store.clone());
        let stop = Arc::new(AtomicBool::new(false));
        let reports = bench(&shared, &benchmark, &workload, &[Phase::Load], &stop);
        assert_eq!(reports[0].total(), 500);
        assert_eq!(reports[0].measurement.get("INSERT").unwrap().ok(), 500);
        assert_eq!(store.len("usertable"), 500);
        assert_eq!(workload.keyspace(Phase::Load).boundary(), 600);
    }

    #[test]
    fn concurrent_inserts_keep_the_key_space_dense() {
        let opt = r#"
            [map]
            name = "null"
            [benchmark]
            threads = 4
            report = "hidden"
            [workload]
            recordcount = 1000
            operationcount = 4000
            readproportion = 0.5
            updateproportion = 0.0
            insertproportion = 0.5
            requestdistribution = "latest"
            insertorder = "ordered"
        "#;
        let (_, benchmark, workload) = init(opt).unwrap();
        let store = RwLockBTreeMap::new();
        let shared: Arc<dyn KVStore> = Arc::new(store.clone());
        let stop = Arc::new(AtomicBool::new(false));
        let reports = bench(
            &shared,
            &benchmark,
            &workload,
            &[Phase::Load, Phase::Run],
            &stop,
        );
        let run = &reports[1];
        let inserts = run.measurement.get("INSERT").unwrap().total();
        assert_eq!(run.total(), 4000);
        assert_eq!(
            workload.keyspace(Phase::Run).boundary(),
            1000 + inserts,
            "every claimed ordinal is accounted for"
        );
        // every ordinal below the boundary was inserted exactly once
        assert_eq!(store.len("usertable") as u64, 1000 + inserts);
    }

    #[test]
    fn example_workloads_null() {
        for w in [
            workload_preset!("workloada"),
            workload_preset!("workloadb"),
            workload_preset!("workloadc"),
            workload_preset!("workloadd"),
            workload_preset!("workloade"),
            workload_preset!("workloadf"),
        ] {
            let (_, reports) = example(NULL, w);
            assert_no_failures(&reports[1]);
        }
    }

    #[test]
    fn example_workloada_mutex_btreemap() {
        let (_, reports) = example(MUTEX_BTREEMAP, workload_preset!("workloada"));
        assert_no_failures(&reports[0]);
        assert_no_failures(&reports[1]);
    }

    #[test]
    fn workloada_hot_records_are_scattered() {
        let opt = NULL.to_string() + "\n" + workload_preset!("workloada");
        let (_, _, workload) = init(&opt).unwrap();
        let mut worker = workload.worker();
        let mut counts = vec![0u64; 1000];
        for _ in 0..200_000 {
            counts[worker.next_transaction_ordinal().unwrap() as usize] += 1;
        }
        let top = (0..1000).max_by_key(|i| counts[*i]).unwrap();
        assert_ne!(top, 0);
        assert!(counts[top] > 10 * counts[0], "{} vs {}", counts[top], counts[0]);
        workload.teardown();
    }

    #[test]
    fn example_workloadc_rwlock_btreemap() {
        let (_, reports) = example(RWLOCK_BTREEMAP, workload_preset!("workloadc"));
        assert_no_failures(&reports[1]);
        let read = reports[1].measurement.get("READ").unwrap();
        assert_eq!(read.ok(), reports[1].total());
    }

    #[test]
    fn example_workloade_rwlock_btreemap() {
        let (_, reports) = example(RWLOCK_BTREEMAP, workload_preset!("workloade"));
        let scan = reports[1].measurement.get("SCAN").unwrap();
        assert!(scan.total() > 0);
        assert_eq!(scan.failed(), 0);
    }

    #[test]
    fn example_workloadf_mutex_hashmap() {
        let (_, reports) = example(MUTEX_HASHMAP, workload_preset!("workloadf"));
        assert_no_failures(&reports[1]);
        assert!(reports[1].measurement.get("READ-MODIFY-WRITE").is_some());
    }

    #[test]
    fn example_workloade_rwlock_hashmap() {
        let (_, reports) = example(RWLOCK_HASHMAP, workload_preset!("workloade"));
        let scan = reports[1].measurement.get("SCAN").unwrap();
        assert_eq!(scan.count(Status::NotImplemented), scan.total());
    }

    #[test]
    fn example_slidinghotspot() {
        let (workload, reports) = example(RWLOCK_HASHMAP, workload_preset!("slidinghotspot"));
        assert!(!workload.is_sliding());
        assert_no_failures(&reports[1]);
    }

    #[test]
    fn example_rangescan() {
        let (_, reports) = example(MUTEX_BTREEMAP, workload_preset!("rangescan"));
        let scan = reports[1].measurement.get("RANGE-SCAN").unwrap();
        assert!(scan.total() > 0);
        assert_eq!(scan.failed(), 0);
    }

    #[test]
    fn example_occupancy() {
        let (workload, reports) = example(RWLOCK_BTREEMAP, workload_preset!("occupancy"));
        let counts = workload.counts();
        assert!(counts.record_count > 0);
        assert_eq!(reports[1].total(), counts.operation_count);
    }

    #[test]
    #[cfg(feature = "dashmap")]
    fn example_workloada_dashmap() {
        const OPT: &str = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/presets/stores/dashmap.toml"
        ));
        let (_, reports) = example(OPT, workload_preset!("workloada"));
        assert_no_failures(&reports[1]);
    }
}

// }}} tests
