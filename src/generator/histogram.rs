use super::IntegerGenerator;
use crate::{Error, Result};
use log::debug;
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;
use std::fs;
use std::path::{Path, PathBuf};

/// Draws by an empirical table of bucket counts.
///
/// Bucket `i` covers the value `i * block_size` and is drawn with probability
/// `count[i] / sum(count)`. The table is loaded once; the file format is an optional
/// `BlockSize <n>` line followed by `<bucket> <count>` lines, separated by whitespace.
#[derive(Clone, Debug)]
pub struct HistogramGenerator {
    block_size: u64,
    buckets: Vec<u64>,
    dist: WeightedIndex<u64>,
    last: u64,
}

impl HistogramGenerator {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| Error::HistogramFile {
            path: path.to_path_buf(),
            source,
        })?;
        let (block_size, buckets) = parse(path, &text)?;
        debug!(
            "Loaded histogram {:?}: block size {}, {} buckets",
            path,
            block_size,
            buckets.len()
        );
        Self::build(path.to_path_buf(), block_size, buckets)
    }

    pub fn from_buckets(block_size: u64, buckets: Vec<u64>) -> Result<Self> {
        Self::build(PathBuf::from("<memory>"), block_size, buckets)
    }

    fn build(path: PathBuf, block_size: u64, buckets: Vec<u64>) -> Result<Self> {
        let dist = WeightedIndex::new(&buckets).map_err(|e| Error::MalformedHistogram {
            path,
            detail: e.to_string(),
        })?;
        Ok(Self {
            block_size,
            buckets,
            dist,
            last: 0,
        })
    }
}

fn parse(path: &Path, text: &str) -> Result<(u64, Vec<u64>)> {
    let malformed = |line: usize, detail: &str| Error::MalformedHistogram {
        path: path.to_path_buf(),
        detail: format!("line {}: {}", line + 1, detail),
    };

    let mut block_size = 1;
    let mut buckets: Vec<u64> = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let mut tokens = line.split_whitespace();
        let (Some(first), Some(second)) = (tokens.next(), tokens.next()) else {
            if line.trim().is_empty() {
                continue;
            }
            return Err(malformed(n, "expected two columns"));
        };
        let value: u64 = second
            .parse()
            .map_err(|_| malformed(n, "second column is not an integer"))?;
        if first.eq_ignore_ascii_case("blocksize") {
            if n != 0 {
                return Err(malformed(n, "BlockSize must be on the first line"));
            }
            block_size = value;
            continue;
        }
        let bucket: usize = first
            .parse()
            .map_err(|_| malformed(n, "bucket is not an integer"))?;
        if buckets.len() <= bucket {
            buckets.resize(bucket + 1, 0);
        }
        buckets[bucket] = value;
    }
    Ok((block_size, buckets))
}

impl IntegerGenerator for HistogramGenerator {
    fn next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> u64 {
        self.last = self.dist.sample(rng) as u64 * self.block_size;
        self.last
    }

    fn last(&self) -> u64 {
        self.last
    }

    fn mean(&self) -> f64 {
        let area: u64 = self.buckets.iter().sum();
        let weighted: f64 = self
            .buckets
            .iter()
            .enumerate()
            .map(|(i, c)| i as f64 * *c as f64)
            .sum();
        weighted * self.block_size as f64 / area as f64
    }
}
