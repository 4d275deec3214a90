//! Measurement sources.
//!
//! The scheduler only needs "a fresh number for a named gauge"; [`Sampler`]
//! is that seam. [`ProcessSampler`] is the production source: a fixed table
//! from metric name to sampling function over the current process and host.

use std::fs;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A source of gauge samples.
pub trait Sampler: Send {
    /// Names of the gauges this sampler produces, in a stable order.
    fn tracked(&self) -> Vec<&'static str>;

    /// Takes a fresh sample of `name`. `None` when the value is unavailable
    /// on this platform or the name is unknown.
    fn sample(&mut self, name: &str) -> Option<f64>;
}

type SampleFn = fn(&mut ProcessSampler) -> Option<f64>;

/// Name-to-function table backing [`ProcessSampler`].
const PROCESS_GAUGES: &[(&str, SampleFn)] = &[
    ("RandomValue", |s| Some(s.rng.gen::<f64>())),
    ("ResidentMemory", |_| proc_status_bytes("VmRSS:")),
    ("VirtualMemory", |_| proc_status_bytes("VmSize:")),
    ("NumCpus", |_| {
        std::thread::available_parallelism()
            .ok()
            .map(|n| n.get() as f64)
    }),
    ("LoadAverage1", |_| load_average(0)),
    ("LoadAverage5", |_| load_average(1)),
    ("LoadAverage15", |_| load_average(2)),
    ("Uptime", |s| Some(s.started.elapsed().as_secs_f64())),
];

/// Samples the running process and its host.
pub struct ProcessSampler {
    rng: StdRng,
    started: Instant,
}

impl ProcessSampler {
    pub fn new() -> Self {
        ProcessSampler {
            rng: StdRng::from_entropy(),
            started: Instant::now(),
        }
    }

    /// Deterministic `RandomValue` sequence (for testing).
    pub fn with_seed(seed: u64) -> Self {
        ProcessSampler {
            rng: StdRng::seed_from_u64(seed),
            started: Instant::now(),
        }
    }
}

impl Default for ProcessSampler {
    fn default() -> Self {
        ProcessSampler::new()
    }
}

impl Sampler for ProcessSampler {
    fn tracked(&self) -> Vec<&'static str> {
        PROCESS_GAUGES.iter().map(|(name, _)| *name).collect()
    }

    fn sample(&mut self, name: &str) -> Option<f64> {
        let (_, sample) = PROCESS_GAUGES.iter().find(|(n, _)| *n == name)?;
        sample(self)
    }
}

/// Reads a `kB` line from `/proc/self/status` and returns bytes.
fn proc_status_bytes(field: &str) -> Option<f64> {
    let status = fs::read_to_string("/proc/self/status").ok()?;
    parse_status_kb(&status, field).map(|kb| kb * 1024.0)
}

fn parse_status_kb(status: &str, field: &str) -> Option<f64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix(field))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse().ok())
}

/// Field `index` (0, 1, 2 for 1/5/15 minutes) of `/proc/loadavg`.
fn load_average(index: usize) -> Option<f64> {
    let text = fs::read_to_string("/proc/loadavg").ok()?;
    text.split_whitespace().nth(index)?.parse().ok()
}
