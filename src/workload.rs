//! The workload orchestrator.
//!
//! A [`Workload`] is built once from a [`WorkloadOpt`] and shared by all worker threads of a
//! benchmark. It owns everything that must be consistent across workers: the operation mix, the
//! key spaces of both phases, the templates of all generators and the sliding hotspot task.
//! Each worker thread then asks for its own [`Worker`], which carries private clones of the
//! generators and its own RNG, so that drawing a key never takes a lock.
//!
//! ## Configuration Format
//!
//! The options live in the `[workload]` section and follow the YCSB core workload property
//! names:
//!
//! ```toml
//! [workload]
//! recordcount = 1000
//! operationcount = 1000
//! readproportion = 0.5
//! updateproportion = 0.5
//! requestdistribution = "zipfian"
//! exponential.percentile = 95
//! ```
//!
//! All options are described in [`WorkloadOpt`].

use crate::chooser::{OperationChooser, OperationKind};
use crate::fields::FieldSynthesizer;
use crate::generator::*;
use crate::keyspace::{build_key, InsertOrder, KeySpace};
use crate::measurement::Measurements;
use crate::slider::SlidingHotspotController;
use crate::*;
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use hashbrown::HashSet;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use quanta::Instant;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// Inserted keys are deleted in batches of this size during cleanup.
pub const CLEANUP_BATCH_SIZE: usize = 1000;

// {{{ options

/// The two phases of a benchmark.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Populate the store with `insertcount` records.
    Load,
    /// Issue `operationcount` operations following the mix.
    Run,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Load => write!(f, "load"),
            Phase::Run => write!(f, "run"),
        }
    }
}

/// How the record and operation counts are determined.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sizing {
    /// `recordcount` and `operationcount` are taken as given.
    #[default]
    Explicit,
    /// The counts are derived from `disksize`, `occupancy` and `storageages`.
    Occupancy,
}

/// How scans are issued to the store.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// `scan(start, count)`, measured as `SCAN`.
    #[default]
    Count,
    /// `range_scan(start, end, limit)`, measured as `RANGE-SCAN`.
    Range,
}

impl ScanMode {
    fn label(&self) -> &'static str {
        match self {
            ScanMode::Count => OperationKind::Scan.label(),
            ScanMode::Range => "RANGE-SCAN",
        }
    }
}

/// Options of the exponential request distribution, written as `exponential.percentile` and
/// `exponential.frac`.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ExponentialOpt {
    /// Percentage of draws that land within `frac * recordcount` of the latest record.
    ///
    /// Default: 95.
    pub percentile: f64,

    /// Share of `recordcount` the percentile refers to.
    ///
    /// Default: 0.8571428571.
    pub frac: f64,
}

impl Default for ExponentialOpt {
    fn default() -> Self {
        Self {
            percentile: EXPONENTIAL_PERCENTILE_DEFAULT,
            frac: EXPONENTIAL_FRAC_DEFAULT,
        }
    }
}

/// A structure that can be deserialized from a TOML string. This struct is used for interacting
/// with workload configuration files and also create new [`Workload`] instances.
///
/// Every option has a default, so an empty section is a valid (if not very useful) workload.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct WorkloadOpt {
    /// Table name passed to every store operation.
    ///
    /// Default: "usertable".
    pub table: String,

    /// Number of records in the store after the load phase. Ignored with occupancy sizing.
    ///
    /// Default: 0.
    pub recordcount: Option<u64>,

    /// Number of operations of the run phase. Ignored with occupancy sizing.
    ///
    /// Default: 0.
    pub operationcount: Option<u64>,

    /// First ordinal inserted by the load phase. Separate loaders can fill disjoint slices.
    ///
    /// Default: 0.
    pub insertstart: u64,

    /// Number of records inserted by the load phase.
    ///
    /// Default: `recordcount - insertstart`.
    pub insertcount: Option<u64>,

    /// Number of fields per record.
    ///
    /// Default: 10.
    pub fieldcount: u64,

    /// Maximum (or constant) payload length of a field.
    ///
    /// Default: 100.
    pub fieldlength: u64,

    /// "constant", "uniform" (over `[1, fieldlength]`), "zipfian" (favoring short payloads)
    /// or "histogram".
    ///
    /// Default: "constant".
    pub fieldlengthdistribution: String,

    /// Histogram file used with the "histogram" field length distribution.
    ///
    /// Default: "hist.txt".
    pub fieldlengthhistogram: String,

    /// Read all fields of a record, or a single random one.
    ///
    /// Default: true.
    pub readallfields: bool,

    /// Update all fields of a record, or a single random one.
    ///
    /// Default: false.
    pub writeallfields: bool,

    /// Operation mix. The proportions must not sum to more than 1.
    ///
    /// Default: 0.95 reads and 0.05 updates.
    pub readproportion: f64,
    pub updateproportion: f64,
    pub insertproportion: f64,
    pub scanproportion: f64,
    pub readmodifywriteproportion: f64,

    /// "uniform", "zipfian", "scrambledzipfian", "latest", "hotspot", "slidinghotspot" or
    /// "exponential". Dashes and underscores are ignored. "zipfian" and "scrambledzipfian" are the
    /// same hashed Zipfian, so ordinal 0 is not the hottest record.
    ///
    /// Default: "uniform".
    pub requestdistribution: String,

    /// Skew of all Zipfian-family generators, in `(0, 1)`.
    ///
    /// Default: 0.99.
    pub zipfianconstant: f64,

    /// Maximum number of records a scan asks for.
    ///
    /// Default: 1000.
    pub maxscanlength: u64,

    /// "uniform" or "zipfian", over `[1, maxscanlength]`.
    ///
    /// Default: "uniform".
    pub scanlengthdistribution: String,

    /// "count" or "range".
    ///
    /// Default: "count".
    pub scanmode: ScanMode,

    /// "ordered" or "hashed".
    ///
    /// Default: "hashed".
    pub insertorder: InsertOrder,

    /// Share of the records in the hot set of the hotspot distributions.
    ///
    /// Default: 0.2.
    pub hotspotdatafraction: f64,

    /// Share of the operations that go to the hot set.
    ///
    /// Default: 0.8.
    pub hotspotoperationfraction: f64,

    /// Ordinals the sliding hotspot moves by every second.
    ///
    /// Default: 10.
    pub hotspotslidingspeed: u64,

    pub exponential: ExponentialOpt,

    /// "explicit" or "occupancy".
    ///
    /// Default: "explicit".
    pub sizing: Sizing,

    /// Occupancy sizing: the byte capacity of the store.
    ///
    /// Default: 100000000.
    pub disksize: u64,

    /// Occupancy sizing: the share of `disksize` the records fill.
    ///
    /// Default: 0.9.
    pub occupancy: f64,

    /// Occupancy sizing: how many times the store is overwritten during the run phase.
    ///
    /// Default: 10.
    pub storageages: u64,

    /// Delete the records inserted during the run phase after it.
    ///
    /// Default: false.
    pub cleanupinsertedkeys: bool,

    /// Give up resolving a transaction key after this many rejected draws. The operation is
    /// then reported as [`Status::Unavailable`] and not dispatched. Required when keyed
    /// operations run against an empty store.
    ///
    /// Default: unbounded.
    pub maxkeyretries: Option<u64>,
}

impl Default for WorkloadOpt {
    fn default() -> Self {
        Self {
            table: "usertable".to_string(),
            recordcount: None,
            operationcount: None,
            insertstart: 0,
            insertcount: None,
            fieldcount: 10,
            fieldlength: 100,
            fieldlengthdistribution: "constant".to_string(),
            fieldlengthhistogram: "hist.txt".to_string(),
            readallfields: true,
            writeallfields: false,
            readproportion: 0.95,
            updateproportion: 0.05,
            insertproportion: 0.0,
            scanproportion: 0.0,
            readmodifywriteproportion: 0.0,
            requestdistribution: "uniform".to_string(),
            zipfianconstant: ZIPFIAN_CONSTANT,
            maxscanlength: 1000,
            scanlengthdistribution: "uniform".to_string(),
            scanmode: ScanMode::default(),
            insertorder: InsertOrder::default(),
            hotspotdatafraction: 0.2,
            hotspotoperationfraction: 0.8,
            hotspotslidingspeed: 10,
            exponential: ExponentialOpt::default(),
            sizing: Sizing::default(),
            disksize: 100_000_000,
            occupancy: 0.9,
            storageages: 10,
            cleanupinsertedkeys: false,
            maxkeyretries: None,
        }
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(|c| c.to_lowercase())
        .collect()
}

// }}} options

// {{{ strategies

/// The resolved sizes of both phases.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Counts {
    pub record_count: u64,
    pub operation_count: u64,
    pub insert_start: u64,
    pub insert_count: u64,
}

impl Sizing {
    fn counts(&self, opt: &WorkloadOpt, mean_length: f64) -> Result<Counts> {
        match self {
            Sizing::Explicit => {
                let record_count = opt.recordcount.unwrap_or(0);
                let insert_count = opt
                    .insertcount
                    .unwrap_or_else(|| record_count.saturating_sub(opt.insertstart));
                Ok(Counts {
                    record_count,
                    operation_count: opt.operationcount.unwrap_or(0),
                    insert_start: opt.insertstart,
                    insert_count,
                })
            }
            Sizing::Occupancy => {
                if !(opt.occupancy > 0.0 && opt.occupancy <= 1.0) {
                    return Err(Error::InvalidOption {
                        name: "occupancy",
                        detail: format!("{} is not in (0, 1]", opt.occupancy),
                    });
                }
                let record_size = mean_length * opt.fieldcount as f64;
                if !(record_size.is_finite() && record_size > 0.0) {
                    return Err(Error::InvalidOption {
                        name: "fieldlength",
                        detail: format!("mean record size {} is not positive", record_size),
                    });
                }
                let objects = (opt.occupancy * opt.disksize as f64 / record_size) as u64;
                if objects == 0 {
                    return Err(Error::ZeroObjectCount {
                        disk_size: opt.disksize,
                    });
                }
                let operation_count = opt
                    .storageages
                    .checked_mul(objects)
                    .ok_or_else(|| Error::InvalidOption {
                        name: "storageages",
                        detail: format!(
                            "{} ages of {} objects overflow the operation count",
                            opt.storageages, objects
                        ),
                    })?;
                for (name, given) in [
                    ("recordcount", opt.recordcount),
                    ("operationcount", opt.operationcount),
                    ("insertcount", opt.insertcount),
                ] {
                    if given.is_some() {
                        warn!("Occupancy sizing overrides the given {}", name);
                    }
                }
                Ok(Counts {
                    record_count: objects,
                    operation_count,
                    insert_start: 0,
                    insert_count: objects,
                })
            }
        }
    }
}

/// How a raw draw of the request generator turns into an ordinal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum KeyRule {
    /// The draw is the ordinal.
    Ordinal,
    /// The draw is a distance back from the most recent ordinal.
    FromLatest,
}

fn field_length_generator(opt: &WorkloadOpt) -> Result<Generator> {
    let len = opt.fieldlength;
    match normalize(&opt.fieldlengthdistribution).as_str() {
        "constant" => Ok(Generator::Constant(ConstantGenerator::new(len))),
        "uniform" => Ok(Generator::Uniform(UniformGenerator::new(1, len)?)),
        "zipfian" => Ok(Generator::Zipfian(ZipfianGenerator::with_theta(
            1,
            len,
            opt.zipfianconstant,
        )?)),
        "histogram" => Ok(Generator::Histogram(HistogramGenerator::from_file(
            &opt.fieldlengthhistogram,
        )?)),
        _ => Err(Error::UnknownDistribution {
            what: "field length",
            name: opt.fieldlengthdistribution.clone(),
        }),
    }
}

fn scan_length_generator(opt: &WorkloadOpt) -> Result<Generator> {
    let len = opt.maxscanlength;
    match normalize(&opt.scanlengthdistribution).as_str() {
        "uniform" => Ok(Generator::Uniform(UniformGenerator::new(1, len)?)),
        "zipfian" => Ok(Generator::Zipfian(ZipfianGenerator::with_theta(
            1,
            len,
            opt.zipfianconstant,
        )?)),
        _ => Err(Error::UnknownDistribution {
            what: "scan length",
            name: opt.scanlengthdistribution.clone(),
        }),
    }
}

/// The request generator, how its draws are read, and the slide state to drive if any.
fn request_generator(
    opt: &WorkloadOpt,
    counts: &Counts,
    run_keys: &KeySpace,
) -> Result<(Generator, KeyRule, Option<Arc<SlideState>>)> {
    let records = counts.record_count;
    let last_record = || {
        records.checked_sub(1).ok_or_else(|| Error::InvalidOption {
            name: "recordcount",
            detail: format!(
                "request distribution {} needs at least one record",
                opt.requestdistribution
            ),
        })
    };
    let theta = opt.zipfianconstant;
    let name = normalize(&opt.requestdistribution);
    let gen = match name.as_str() {
        "uniform" => Generator::Uniform(UniformGenerator::new(0, last_record()?)?),
        "zipfian" | "scrambledzipfian" => {
            // leave room for the keys the run phase is expected to insert, so that the
            // popular items do not move as the key space grows
            let expected = (opt.insertproportion * counts.operation_count as f64 * 2.0) as u64;
            let hi = (records + expected).checked_sub(1).ok_or(Error::EmptyRange {
                lo: 0,
                hi: 0,
            })?;
            // ranks are scrambled so the hottest records are spread over the key space
            Generator::ScrambledZipfian(ScrambledZipfianGenerator::with_theta(0, hi, theta)?)
        }
        "latest" => Generator::Latest(SkewedLatestGenerator::new(run_keys.clone(), theta)?),
        "hotspot" => Generator::Hotspot(HotspotGenerator::new(
            0,
            last_record()?,
            opt.hotspotdatafraction,
            opt.hotspotoperationfraction,
        )?),
        "slidinghotspot" => {
            let g = SlidingHotspotGenerator::new(
                0,
                last_record()?,
                opt.hotspotdatafraction,
                opt.hotspotoperationfraction,
                opt.hotspotslidingspeed,
            )?;
            let state = g.state();
            return Ok((Generator::SlidingHotspot(g), KeyRule::Ordinal, Some(state)));
        }
        "exponential" => {
            let range = records as f64 * opt.exponential.frac;
            let g = ExponentialGenerator::new(opt.exponential.percentile, range)?;
            return Ok((Generator::Exponential(g), KeyRule::FromLatest, None));
        }
        _ => {
            return Err(Error::UnknownDistribution {
                what: "request",
                name: opt.requestdistribution.clone(),
            })
        }
    };
    Ok((gen, KeyRule::Ordinal, None))
}

// }}} strategies

// {{{ workload

/// The shared state of a benchmark's workload. See the module documentation.
pub struct Workload {
    table: String,
    counts: Counts,
    read_all_fields: bool,
    write_all_fields: bool,
    insert_order: InsertOrder,
    max_retries: Option<u64>,
    chooser: OperationChooser,
    key_rule: KeyRule,
    scan_mode: ScanMode,
    /// Generator templates, cloned into each worker
    fields: FieldSynthesizer,
    request: Generator,
    scan_length: Generator,
    load_keys: KeySpace,
    run_keys: KeySpace,
    /// Keys inserted by the run phase, only when cleanup is enabled
    inserted: Option<Mutex<Vec<String>>>,
    slider: Option<Mutex<SlidingHotspotController>>,
}

impl Workload {
    pub fn new(opt: &WorkloadOpt) -> Result<Self> {
        let chooser = OperationChooser::new(
            opt.readproportion,
            opt.updateproportion,
            opt.insertproportion,
            opt.scanproportion,
            opt.readmodifywriteproportion,
        )?;
        let fields = FieldSynthesizer::new(opt.fieldcount, field_length_generator(opt)?)?;
        let counts = opt.sizing.counts(opt, fields.mean_length())?;
        debug!("Workload counts: {:?}", counts);

        let load_keys = KeySpace::new(counts.insert_start);
        let run_keys = KeySpace::new(counts.record_count);

        let needs_keys = [
            OperationKind::Read,
            OperationKind::Update,
            OperationKind::Scan,
            OperationKind::ReadModifyWrite,
        ]
        .into_iter()
        .any(|k| chooser.contains(k));
        if needs_keys && counts.record_count == 0 && opt.maxkeyretries.is_none() {
            // every worker could block on its first draw before any insert lands
            return Err(Error::InvalidOption {
                name: "recordcount",
                detail: "keyed operations on an empty store need maxkeyretries".to_string(),
            });
        }
        let (request, key_rule, slide) = if needs_keys {
            request_generator(opt, &counts, &run_keys)?
        } else {
            // insert-only workloads never draw a key
            (
                Generator::Constant(ConstantGenerator::new(0)),
                KeyRule::Ordinal,
                None,
            )
        };
        let scan_length = scan_length_generator(opt)?;

        let inserted = opt.cleanupinsertedkeys.then(|| {
            let capacity = (opt.insertproportion * counts.operation_count as f64 * 2.0) as usize;
            Mutex::new(Vec::with_capacity(capacity))
        });

        let slider = match slide {
            Some(state) => {
                let mut controller = SlidingHotspotController::new(state);
                controller.start()?;
                info!("Sliding hotspot started");
                Some(Mutex::new(controller))
            }
            None => None,
        };

        Ok(Self {
            table: opt.table.clone(),
            counts,
            read_all_fields: opt.readallfields,
            write_all_fields: opt.writeallfields,
            insert_order: opt.insertorder,
            max_retries: opt.maxkeyretries,
            chooser,
            key_rule,
            scan_mode: opt.scanmode,
            fields,
            request,
            scan_length,
            load_keys,
            run_keys,
            inserted,
            slider,
        })
    }

    pub fn new_from_toml_str(text: &str) -> Result<Self> {
        let opt: WorkloadOpt = Figment::new()
            .merge(Toml::string(text))
            .merge(Env::raw())
            .extract()?;
        Self::new(&opt)
    }

    pub fn counts(&self) -> &Counts {
        &self.counts
    }

    /// The number of operations the given phase issues in total.
    pub fn quota(&self, phase: Phase) -> u64 {
        match phase {
            Phase::Load => self.counts.insert_count,
            Phase::Run => self.counts.operation_count,
        }
    }

    /// The key space the given phase inserts into.
    pub fn keyspace(&self, phase: Phase) -> &KeySpace {
        match phase {
            Phase::Load => &self.load_keys,
            Phase::Run => &self.run_keys,
        }
    }

    pub fn build_key(&self, ordinal: u64) -> String {
        build_key(ordinal, self.insert_order)
    }

    /// Create the per-thread part of the workload.
    pub fn worker(self: &Arc<Self>) -> Worker {
        Worker {
            workload: self.clone(),
            rng: SmallRng::from_rng(&mut rand::rng()),
            fields: self.fields.clone(),
            request: self.request.clone(),
            scan_length: self.scan_length.clone(),
        }
    }

    /// Delete the keys inserted by the run phase, in batches, through a fresh handle.
    ///
    /// Returns the number of delete calls issued. A store that cannot hand out a handle only
    /// gets the failure logged.
    pub fn cleanup(&self, store: &dyn KVStore) -> usize {
        let Some(inserted) = self.inserted.as_ref() else {
            return 0;
        };
        info!("Cleaning up inserted keys");
        let mut handle = match store.handle() {
            Ok(h) => h,
            Err(e) => {
                error!("Store handle can't be created for cleanup: {}", e);
                return 0;
            }
        };
        let keys = std::mem::take(&mut *inserted.lock());
        let mut deleted = 0;
        for batch in keys.chunks(CLEANUP_BATCH_SIZE) {
            let unique: HashSet<&str> = batch.iter().map(|k| k.as_str()).collect();
            for key in unique {
                let status = handle.delete(&self.table, key);
                if !status.is_ok() {
                    debug!("Cleanup delete of {} returned {}", key, status);
                }
                deleted += 1;
            }
        }
        info!("Cleaned up {} inserted keys", deleted);
        deleted
    }

    /// Stop background activity. Safe to call more than once.
    pub fn teardown(&self) {
        if let Some(slider) = self.slider.as_ref() {
            let mut slider = slider.lock();
            if slider.is_running() {
                slider.stop();
                info!("Sliding hotspot stopped");
            }
        }
    }

    pub fn is_sliding(&self) -> bool {
        self.slider
            .as_ref()
            .map(|s| s.lock().is_running())
            .unwrap_or(false)
    }
}

impl Drop for Workload {
    fn drop(&mut self) {
        self.teardown();
    }
}

// }}} workload

// {{{ worker

/// Time one store call and report it.
fn timed<M: Measurements + ?Sized>(
    measurements: &mut M,
    label: &'static str,
    f: impl FnOnce() -> Status,
) -> Status {
    let start = Instant::now();
    let status = f();
    measurements.measure(label, start.elapsed());
    measurements.report_status(label, status);
    status
}

/// The per-thread view of a [`Workload`].
pub struct Worker {
    workload: Arc<Workload>,
    rng: SmallRng,
    fields: FieldSynthesizer,
    request: Generator,
    scan_length: Generator,
}

impl Worker {
    /// One operation of the given phase.
    pub fn do_operation<M: Measurements + ?Sized>(
        &mut self,
        phase: Phase,
        handle: &mut dyn KVStoreHandle,
        measurements: &mut M,
    ) -> Status {
        match phase {
            Phase::Load => self.do_insert(handle, measurements),
            Phase::Run => self.do_transaction(handle, measurements),
        }
    }

    /// Insert the next record of the load phase.
    pub fn do_insert<M: Measurements + ?Sized>(
        &mut self,
        handle: &mut dyn KVStoreHandle,
        measurements: &mut M,
    ) -> Status {
        let ordinal = self.workload.load_keys.next_insert_ordinal();
        let key = self.workload.build_key(ordinal);
        let record = self.fields.build_record(&mut self.rng);
        let table = self.workload.table.as_str();
        timed(measurements, OperationKind::Insert.label(), || {
            handle.insert(table, &key, &record)
        })
    }

    /// Issue one operation of the run phase.
    pub fn do_transaction<M: Measurements + ?Sized>(
        &mut self,
        handle: &mut dyn KVStoreHandle,
        measurements: &mut M,
    ) -> Status {
        match self.workload.chooser.choose(&mut self.rng) {
            OperationKind::Read => self.do_read(handle, measurements),
            OperationKind::Update => self.do_update(handle, measurements),
            OperationKind::Insert => self.do_transaction_insert(handle, measurements),
            OperationKind::Scan => self.do_scan(handle, measurements),
            OperationKind::ReadModifyWrite => self.do_read_modify_write(handle, measurements),
        }
    }

    /// Draw an ordinal that has already been handed out to an insert.
    pub fn next_transaction_ordinal(&mut self) -> Option<u64> {
        let from_latest = self.workload.key_rule == KeyRule::FromLatest;
        self.workload.run_keys.draw_ordinal(
            &mut self.request,
            &mut self.rng,
            from_latest,
            self.workload.max_retries,
        )
    }

    fn read_fields(&mut self) -> Option<Vec<String>> {
        if self.workload.read_all_fields {
            None
        } else {
            Some(vec![self.fields.choose_field(&mut self.rng)])
        }
    }

    fn write_fields(&mut self) -> FieldMap {
        if self.workload.write_all_fields {
            self.fields.build_record(&mut self.rng)
        } else {
            self.fields.build_partial_update(&mut self.rng)
        }
    }

    fn unavailable<M: Measurements + ?Sized>(measurements: &mut M, label: &'static str) -> Status {
        measurements.report_status(label, Status::Unavailable);
        Status::Unavailable
    }

    fn do_read<M: Measurements + ?Sized>(
        &mut self,
        handle: &mut dyn KVStoreHandle,
        measurements: &mut M,
    ) -> Status {
        let label = OperationKind::Read.label();
        let Some(ordinal) = self.next_transaction_ordinal() else {
            return Self::unavailable(measurements, label);
        };
        let key = self.workload.build_key(ordinal);
        let fields = self.read_fields();
        let table = self.workload.table.as_str();
        timed(measurements, label, || {
            handle.read(table, &key, fields.as_deref())
        })
    }

    fn do_update<M: Measurements + ?Sized>(
        &mut self,
        handle: &mut dyn KVStoreHandle,
        measurements: &mut M,
    ) -> Status {
        let label = OperationKind::Update.label();
        let Some(ordinal) = self.next_transaction_ordinal() else {
            return Self::unavailable(measurements, label);
        };
        let key = self.workload.build_key(ordinal);
        let values = self.write_fields();
        let table = self.workload.table.as_str();
        timed(measurements, label, || handle.update(table, &key, &values))
    }

    fn do_transaction_insert<M: Measurements + ?Sized>(
        &mut self,
        handle: &mut dyn KVStoreHandle,
        measurements: &mut M,
    ) -> Status {
        let ordinal = self.workload.run_keys.next_insert_ordinal();
        let key = self.workload.build_key(ordinal);
        let record = self.fields.build_record(&mut self.rng);
        let table = self.workload.table.as_str();
        let status = timed(measurements, OperationKind::Insert.label(), || {
            handle.insert(table, &key, &record)
        });
        if let Some(inserted) = self.workload.inserted.as_ref() {
            inserted.lock().push(key);
        }
        status
    }

    fn do_scan<M: Measurements + ?Sized>(
        &mut self,
        handle: &mut dyn KVStoreHandle,
        measurements: &mut M,
    ) -> Status {
        let mode = self.workload.scan_mode;
        let label = mode.label();
        let Some(start) = self.next_transaction_ordinal() else {
            return Self::unavailable(measurements, label);
        };
        let length = self.scan_length.next(&mut self.rng);
        let start_key = self.workload.build_key(start);
        let fields = self.read_fields();
        let table = self.workload.table.as_str();
        match mode {
            ScanMode::Count => timed(measurements, label, || {
                handle.scan(table, &start_key, length as usize, fields.as_deref())
            }),
            ScanMode::Range => {
                let end_key = self.workload.build_key(start.saturating_add(length));
                timed(measurements, label, || {
                    handle.range_scan(
                        table,
                        &start_key,
                        &end_key,
                        length as usize,
                        fields.as_deref(),
                    )
                })
            }
        }
    }

    fn do_read_modify_write<M: Measurements + ?Sized>(
        &mut self,
        handle: &mut dyn KVStoreHandle,
        measurements: &mut M,
    ) -> Status {
        let label = OperationKind::ReadModifyWrite.label();
        let Some(ordinal) = self.next_transaction_ordinal() else {
            return Self::unavailable(measurements, label);
        };
        let key = self.workload.build_key(ordinal);
        let fields = self.read_fields();
        let values = self.write_fields();
        let table = self.workload.table.as_str();
        timed(measurements, label, || {
            let read = handle.read(table, &key, fields.as_deref());
            let update = handle.update(table, &key, &values);
            read.and(update)
        })
    }
}

// }}} worker

// {{{ tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::OpMeasurement;
    use hashbrown::HashMap;

    /// Records every call as `(operation, key)` and answers `Ok`.
    #[derive(Clone, Default)]
    struct RecordingStore {
        log: Arc<Mutex<Vec<(&'static str, String)>>>,
    }

    impl KVStore for RecordingStore {
        fn handle(&self) -> Result<Box<dyn KVStoreHandle>> {
            Ok(Box::new(self.clone()))
        }
    }

    impl KVStoreHandle for RecordingStore {
        fn insert(&mut self, _table: &str, key: &str, _fields: &FieldMap) -> Status {
            self.log.lock().push(("insert", key.to_string()));
            Status::Ok
        }

        fn update(&mut self, _table: &str, key: &str, _fields: &FieldMap) -> Status {
            self.log.lock().push(("update", key.to_string()));
            Status::Ok
        }

        fn read(&mut self, _table: &str, key: &str, _fields: Option<&[String]>) -> Status {
            self.log.lock().push(("read", key.to_string()));
            Status::Ok
        }

        fn scan(
            &mut self,
            _table: &str,
            start: &str,
            _count: usize,
            _fields: Option<&[String]>,
        ) -> Status {
            self.log.lock().push(("scan", start.to_string()));
            Status::Ok
        }

        fn delete(&mut self, _table: &str, key: &str) -> Status {
            self.log.lock().push(("delete", key.to_string()));
            Status::Ok
        }
    }

    fn ordinal_of(key: &str) -> u64 {
        key.strip_prefix("user").unwrap().parse().unwrap()
    }

    fn workload(text: &str) -> Arc<Workload> {
        Arc::new(Workload::new_from_toml_str(text).unwrap())
    }

    #[test]
    fn workloadopt_defaults() {
        let opt = WorkloadOpt::default();
        assert_eq!(opt.table, "usertable");
        assert_eq!(opt.fieldcount, 10);
        assert_eq!(opt.readproportion, 0.95);
        assert_eq!(opt.insertorder, InsertOrder::Hashed);
        assert_eq!(opt.exponential.percentile, 95.0);

        let opt: WorkloadOpt = Figment::new()
            .merge(Toml::string(
                r#"recordcount = 10
                   exponential.percentile = 90
                   scanmode = "range"
                   insertorder = "ordered""#,
            ))
            .extract()
            .unwrap();
        assert_eq!(opt.recordcount, Some(10));
        assert_eq!(opt.exponential.percentile, 90.0);
        assert_eq!(opt.exponential.frac, EXPONENTIAL_FRAC_DEFAULT);
        assert_eq!(opt.scanmode, ScanMode::Range);
        assert_eq!(opt.insertorder, InsertOrder::Ordered);
    }

    #[test]
    fn reads_stay_within_loaded_records() {
        let w = workload(
            r#"recordcount = 1000
               operationcount = 100
               readproportion = 1.0
               updateproportion = 0.0
               insertorder = "ordered""#,
        );
        let store = RecordingStore::default();
        let mut handle = store.handle().unwrap();
        let mut m = OpMeasurement::new();
        let mut worker = w.worker();
        for _ in 0..100 {
            assert!(worker.do_transaction(handle.as_mut(), &mut m).is_ok());
        }
        let log = store.log.lock();
        assert_eq!(log.len(), 100);
        for (op, key) in log.iter() {
            assert_eq!(*op, "read");
            assert!(ordinal_of(key) < 1000);
        }
        assert_eq!(m.get("READ").unwrap().total(), 100);
    }

    #[test]
    fn load_inserts_the_configured_slice() {
        let w = workload(
            r#"recordcount = 100
               insertstart = 40
               insertcount = 20
               insertorder = "ordered""#,
        );
        assert_eq!(w.quota(Phase::Load), 20);
        let store = RecordingStore::default();
        let mut handle = store.handle().unwrap();
        let mut m = OpMeasurement::new();
        let mut worker = w.worker();
        for _ in 0..w.quota(Phase::Load) {
            worker.do_operation(Phase::Load, handle.as_mut(), &mut m);
        }
        let ordinals: Vec<u64> = store.log.lock().iter().map(|(_, k)| ordinal_of(k)).collect();
        assert_eq!(ordinals, (40..60).collect::<Vec<_>>());
        assert_eq!(w.keyspace(Phase::Run).boundary(), 100);
    }

    #[test]
    fn run_inserts_extend_the_key_space() {
        let w = workload(
            r#"recordcount = 10
               operationcount = 1000
               readproportion = 0.5
               updateproportion = 0.0
               insertproportion = 0.5
               requestdistribution = "latest"
               insertorder = "ordered""#,
        );
        let store = RecordingStore::default();
        let mut handle = store.handle().unwrap();
        let mut m = OpMeasurement::new();
        let mut worker = w.worker();
        for _ in 0..1000 {
            worker.do_transaction(handle.as_mut(), &mut m);
        }
        let inserts = m.get("INSERT").map(|s| s.total()).unwrap_or(0);
        assert_eq!(w.keyspace(Phase::Run).boundary(), 10 + inserts);
        // every read targets a key that was inserted before it
        let mut boundary = 10;
        for (op, key) in store.log.lock().iter() {
            let ordinal = ordinal_of(key);
            match *op {
                "insert" => {
                    assert_eq!(ordinal, boundary);
                    boundary += 1;
                }
                "read" => assert!(ordinal < boundary),
                _ => unreachable!(),
            }
        }
    }

    #[test]
    fn exponential_reads_favor_recent_records() {
        let w = workload(
            r#"recordcount = 1000
               readproportion = 1.0
               updateproportion = 0.0
               requestdistribution = "exponential"
               insertorder = "ordered""#,
        );
        let mut worker = w.worker();
        let mut recent = 0;
        for _ in 0..10000 {
            let ordinal = worker.next_transaction_ordinal().unwrap();
            assert!(ordinal < 1000);
            if ordinal >= 1000 - 857 {
                recent += 1;
            }
        }
        assert!(recent > 9300, "{} recent", recent);
    }

    #[test]
    fn read_modify_write_is_one_composite_measurement() {
        let w = workload(
            r#"recordcount = 10
               readproportion = 0.0
               updateproportion = 0.0
               readmodifywriteproportion = 1.0
               readallfields = false"#,
        );
        let store = RecordingStore::default();
        let mut handle = store.handle().unwrap();
        let mut m = OpMeasurement::new();
        let mut worker = w.worker();
        for _ in 0..10 {
            worker.do_transaction(handle.as_mut(), &mut m);
        }
        assert_eq!(m.labels(), vec!["READ-MODIFY-WRITE"]);
        assert_eq!(m.get("READ-MODIFY-WRITE").unwrap().timed(), 10);
        let ops: Vec<&str> = store.log.lock().iter().map(|(op, _)| *op).collect();
        assert_eq!(ops.len(), 20);
        assert!(ops.chunks(2).all(|c| c == ["read", "update"]));
    }

    #[test]
    fn range_scans_fall_back_to_not_implemented() {
        let w = workload(
            r#"recordcount = 10
               readproportion = 0.0
               updateproportion = 0.0
               scanproportion = 1.0
               scanmode = "range""#,
        );
        let store = RecordingStore::default();
        let mut handle = store.handle().unwrap();
        let mut m = OpMeasurement::new();
        let mut worker = w.worker();
        assert_eq!(
            worker.do_transaction(handle.as_mut(), &mut m),
            Status::NotImplemented
        );
        assert_eq!(m.get("RANGE-SCAN").unwrap().failed(), 1);
        assert!(store.log.lock().is_empty());
    }

    #[test]
    fn exhausted_retries_are_unavailable() {
        // nothing is loaded, so no key can ever be resolved
        let w = workload(
            r#"recordcount = 0
               operationcount = 100
               readproportion = 1.0
               updateproportion = 0.0
               requestdistribution = "latest"
               maxkeyretries = 3"#,
        );
        let store = RecordingStore::default();
        let mut handle = store.handle().unwrap();
        let mut m = OpMeasurement::new();
        let mut worker = w.worker();
        assert_eq!(
            worker.do_transaction(handle.as_mut(), &mut m),
            Status::Unavailable
        );
        let read = m.get("READ").unwrap();
        assert_eq!(read.count(Status::Unavailable), 1);
        assert_eq!(read.timed(), 0);
        assert!(store.log.lock().is_empty());
    }

    #[test]
    fn empty_keyspace_needs_a_retry_cap() {
        let e = Workload::new_from_toml_str(
            r#"recordcount = 0
               readproportion = 1.0
               updateproportion = 0.0
               requestdistribution = "latest""#,
        );
        assert!(matches!(
            e,
            Err(Error::InvalidOption {
                name: "recordcount",
                ..
            })
        ));
        let e = Workload::new_from_toml_str(
            r#"recordcount = 0
               readproportion = 0.5
               updateproportion = 0.0
               insertproportion = 0.5
               requestdistribution = "latest""#,
        );
        assert!(e.is_err());
        let w = workload(
            r#"recordcount = 0
               readproportion = 0.5
               updateproportion = 0.0
               insertproportion = 0.5
               requestdistribution = "latest"
               maxkeyretries = 10"#,
        );
        assert_eq!(w.keyspace(Phase::Run).boundary(), 0);
    }

    #[test]
    fn cleanup_deletes_run_inserts_once() {
        let w = workload(
            r#"recordcount = 0
               operationcount = 2500
               readproportion = 0.0
               updateproportion = 0.0
               insertproportion = 1.0
               cleanupinsertedkeys = true"#,
        );
        let store = RecordingStore::default();
        let mut handle = store.handle().unwrap();
        let mut m = OpMeasurement::new();
        let mut worker = w.worker();
        for _ in 0..2500 {
            worker.do_transaction(handle.as_mut(), &mut m);
        }
        assert_eq!(w.cleanup(&store), 2500);
        {
            let log = store.log.lock();
            let inserted: HashSet<&String> = log
                .iter()
                .filter(|(op, _)| *op == "insert")
                .map(|(_, k)| k)
                .collect();
            let deleted: Vec<&String> = log
                .iter()
                .filter(|(op, _)| *op == "delete")
                .map(|(_, k)| k)
                .collect();
            assert_eq!(deleted.len(), 2500);
            assert!(deleted.iter().all(|k| inserted.contains(k)));
        }
        // the tracked keys are consumed
        assert_eq!(w.cleanup(&store), 0);
    }

    #[test]
    fn cleanup_survives_handle_failure() {
        struct Unreachable;
        impl KVStore for Unreachable {
            fn handle(&self) -> Result<Box<dyn KVStoreHandle>> {
                Err(Error::Store("connection refused".to_string()))
            }
        }
        let w = workload(
            r#"recordcount = 10
               cleanupinsertedkeys = true"#,
        );
        assert_eq!(w.cleanup(&Unreachable), 0);
    }

    #[test]
    fn occupancy_sizing() {
        let w = workload(
            r#"sizing = "occupancy"
               disksize = 100000
               occupancy = 0.5
               storageages = 3
               fieldcount = 10
               fieldlength = 100
               recordcount = 5"#,
        );
        assert_eq!(
            *w.counts(),
            Counts {
                record_count: 50,
                operation_count: 150,
                insert_start: 0,
                insert_count: 50,
            }
        );

        let e = Workload::new_from_toml_str(
            r#"sizing = "occupancy"
               disksize = 10"#,
        );
        assert!(matches!(e, Err(Error::ZeroObjectCount { disk_size: 10 })));
    }

    #[test]
    fn occupancy_sizing_rejects_degenerate_records() {
        let e = Workload::new_from_toml_str(
            r#"sizing = "occupancy"
               fieldlength = 0
               fieldlengthdistribution = "constant""#,
        );
        assert!(matches!(
            e,
            Err(Error::InvalidOption {
                name: "fieldlength",
                ..
            })
        ));

        let e = Workload::new_from_toml_str(
            r#"sizing = "occupancy"
               disksize = 1000000
               occupancy = 1.0
               fieldcount = 1
               fieldlength = 1
               fieldlengthdistribution = "constant"
               storageages = 9223372036854775807"#,
        );
        assert!(matches!(
            e,
            Err(Error::InvalidOption {
                name: "storageages",
                ..
            })
        ));
    }

    #[test]
    fn sliding_hotspot_runs_until_teardown() {
        let w = workload(
            r#"recordcount = 100
               requestdistribution = "sliding-hotspot""#,
        );
        assert!(w.is_sliding());
        w.teardown();
        assert!(!w.is_sliding());
        w.teardown();
    }

    #[test]
    fn distributions_by_name() {
        let mut counts: HashMap<String, u64> = HashMap::new();
        for name in [
            "uniform",
            "zipfian",
            "scrambled_zipfian",
            "latest",
            "hotspot",
            "exponential",
        ] {
            let w = workload(&format!(
                r#"recordcount = 100
                   operationcount = 100
                   requestdistribution = "{}""#,
                name
            ));
            let mut worker = w.worker();
            for _ in 0..1000 {
                let ordinal = worker.next_transaction_ordinal().unwrap();
                assert!(ordinal < 100, "{} drew {}", name, ordinal);
            }
            *counts.entry(name.to_string()).or_default() += 1;
        }
        assert_eq!(counts.len(), 6);
    }

    #[test]
    fn configuration_errors() {
        assert!(matches!(
            Workload::new_from_toml_str(r#"requestdistribution = "gaussian""#),
            Err(Error::UnknownDistribution { what: "request", .. })
        ));
        assert!(matches!(
            Workload::new_from_toml_str(
                r#"recordcount = 10
                   fieldlengthdistribution = "pareto""#
            ),
            Err(Error::UnknownDistribution {
                what: "field length",
                ..
            })
        ));
        assert!(matches!(
            Workload::new_from_toml_str(
                r#"recordcount = 10
                   scanlengthdistribution = "latest""#
            ),
            Err(Error::UnknownDistribution {
                what: "scan length",
                ..
            })
        ));
        assert!(matches!(
            Workload::new_from_toml_str(
                r#"recordcount = 10
                   readproportion = 0.0
                   updateproportion = 0.0"#
            ),
            Err(Error::ZeroProportions)
        ));
        assert!(matches!(
            Workload::new_from_toml_str(
                r#"recordcount = 10
                   fieldlengthdistribution = "histogram"
                   fieldlengthhistogram = "/nonexistent/hist.txt""#
            ),
            Err(Error::HistogramFile { .. })
        ));
        // reads need records to draw from
        assert!(matches!(
            Workload::new_from_toml_str(r#"recordcount = 0"#),
            Err(Error::InvalidOption {
                name: "recordcount",
                ..
            })
        ));
        assert!(matches!(
            Workload::new_from_toml_str(r#"recordcount = "many""#),
            Err(Error::Config(_))
        ));
    }
}

// }}} tests
