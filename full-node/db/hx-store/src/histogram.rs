//! Per-predicate histograms with deferred bucket generation.
//!
//! A histogram buffers its first `training_size` observations, then
//! generates bucket edges with the configured strategy, replays the buffer,
//! and discards it. From then on observations land in buckets by binary
//! search: under-range goes to bucket 0, over-range to the last bucket.

use hx_interface::HistogramSnapshot;
use serde::Deserialize;
use tracing::warn;

/// How bucket edges are generated once training completes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BucketStrategy {
    /// `n` buckets spanning the training window, each twice as wide as the
    /// previous one.
    UniformLog2 {
        /// Bucket count.
        n: usize,
    },
    /// `n` equal-width buckets over `[min, max)`; the training window only
    /// delays finalization.
    UniformLinear {
        /// Bucket count.
        n: usize,
        /// Lower edge of the first bucket.
        min: f64,
        /// Upper bound of the covered span.
        max: f64,
    },
    /// Caller-supplied edges.
    Custom {
        /// Lower bucket edges; sorted and deduplicated at finalization.
        edges: Vec<f64>,
    },
}

/// Registration-time parameters of one named histogram.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistogramConfig {
    /// The predicate name whose PUT objects feed this histogram.
    pub name: String,
    /// Edge-generation strategy.
    pub strategy: BucketStrategy,
    /// Observations buffered before edges are generated.
    #[serde(default)]
    pub training_size: usize,
    /// When set, overrides the strategy: the first `n` distinct training
    /// observations, sorted, become the edges.
    #[serde(default)]
    pub first_n_edges: Option<usize>,
}

#[derive(Debug)]
enum Phase {
    Collecting(Vec<f64>),
    Finalized { buckets: Vec<f64>, counts: Vec<u64> },
}

/// One histogram, owned by a datastore for its lifetime.
#[derive(Debug)]
pub struct Histogram {
    config: HistogramConfig,
    phase: Phase,
}

impl Histogram {
    /// A fresh histogram in its collecting phase.
    pub fn new(config: HistogramConfig) -> Self {
        let phase = if config.training_size == 0 {
            Phase::Finalized {
                buckets: generate_edges(&config, &[]),
                counts: Vec::new(),
            }
        } else {
            Phase::Collecting(Vec::with_capacity(config.training_size))
        };
        let mut hist = Histogram { config, phase };
        if let Phase::Finalized { buckets, counts } = &mut hist.phase {
            counts.resize(buckets.len(), 0);
        }
        hist
    }

    /// The registered name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Feeds one observation.
    pub fn observe(&mut self, value: f64) {
        match &mut self.phase {
            Phase::Collecting(buffer) => {
                buffer.push(value);
                if buffer.len() >= self.config.training_size {
                    self.finalize();
                }
            }
            Phase::Finalized { buckets, counts } => place(buckets, counts, value),
        }
    }

    /// A deep copy of the current state. Still-collecting histograms
    /// snapshot as empty vectors.
    pub fn snapshot(&self) -> HistogramSnapshot {
        match &self.phase {
            Phase::Collecting(_) => HistogramSnapshot::default(),
            Phase::Finalized { buckets, counts } => HistogramSnapshot {
                buckets: buckets.clone(),
                counts: counts.clone(),
            },
        }
    }

    fn finalize(&mut self) {
        let training = match std::mem::replace(&mut self.phase, Phase::Collecting(Vec::new())) {
            Phase::Collecting(buffer) => buffer,
            Phase::Finalized { .. } => return,
        };
        let buckets = generate_edges(&self.config, &training);
        let counts = vec![0; buckets.len()];
        self.phase = Phase::Finalized { buckets, counts };
        if let Phase::Finalized { buckets, counts } = &mut self.phase {
            for value in training {
                place(buckets, counts, value);
            }
        }
    }
}

fn place(buckets: &[f64], counts: &mut [u64], value: f64) {
    if buckets.is_empty() {
        return;
    }
    let idx = buckets.partition_point(|edge| *edge <= value);
    let bucket = idx.saturating_sub(1);
    counts[bucket] += 1;
}

fn generate_edges(config: &HistogramConfig, training: &[f64]) -> Vec<f64> {
    let edges = if let Some(n) = config.first_n_edges {
        let mut distinct: Vec<f64> = training.to_vec();
        distinct.sort_by(|a, b| a.partial_cmp(b).expect("training values are not NaN"));
        distinct.dedup();
        distinct.truncate(n);
        distinct
    } else {
        match &config.strategy {
            BucketStrategy::UniformLog2 { n } => log2_edges(*n, training),
            BucketStrategy::UniformLinear { n, min, max } => linear_edges(*n, *min, *max),
            BucketStrategy::Custom { edges } => {
                let mut edges = edges.clone();
                edges.sort_by(|a, b| a.partial_cmp(b).expect("custom edges are not NaN"));
                edges.dedup();
                edges
            }
        }
    };
    if edges.is_empty() {
        warn!(
            histogram = %config.name,
            "edge generation produced no buckets, falling back to a single bucket at 0"
        );
        return vec![0.0];
    }
    edges
}

fn linear_edges(n: usize, min: f64, max: f64) -> Vec<f64> {
    if n == 0 || !(max > min) {
        return Vec::new();
    }
    let width = (max - min) / n as f64;
    (0..n).map(|i| min + i as f64 * width).collect()
}

fn log2_edges(n: usize, training: &[f64]) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    let min = training.iter().copied().fold(f64::INFINITY, f64::min);
    let max = training.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (min, max) = if min.is_finite() && max.is_finite() {
        (min, max)
    } else {
        (0.0, 1.0)
    };
    if max <= min {
        return vec![min];
    }
    // Doubling widths: edge i sits at min + span * (2^i - 1) / (2^n - 1).
    let span = max - min;
    let denom = (2f64.powi(n as i32)) - 1.0;
    (0..n)
        .map(|i| min + span * ((2f64.powi(i as i32)) - 1.0) / denom)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_config(training_size: usize) -> HistogramConfig {
        HistogramConfig {
            name: "latency".to_string(),
            strategy: BucketStrategy::UniformLinear {
                n: 4,
                min: 0.0,
                max: 100.0,
            },
            training_size,
            first_n_edges: None,
        }
    }

    #[test]
    fn training_replays_into_buckets() {
        let mut hist = Histogram::new(linear_config(3));
        for value in [10.0, 55.0, 90.0, 40.0] {
            hist.observe(value);
        }
        let snap = hist.snapshot();
        assert_eq!(snap.buckets, vec![0.0, 25.0, 50.0, 75.0]);
        assert_eq!(snap.counts, vec![1, 1, 1, 1]);
    }

    #[test]
    fn collecting_snapshot_is_empty() {
        let mut hist = Histogram::new(linear_config(3));
        hist.observe(10.0);
        let snap = hist.snapshot();
        assert!(snap.buckets.is_empty());
        assert!(snap.counts.is_empty());
    }

    #[test]
    fn out_of_range_observations_clamp() {
        let mut hist = Histogram::new(linear_config(0));
        hist.observe(-5.0);
        hist.observe(1000.0);
        let snap = hist.snapshot();
        assert_eq!(snap.counts, vec![1, 0, 0, 1]);
    }

    #[test]
    fn zero_observations_after_training_is_an_empty_count_snapshot() {
        let hist = Histogram::new(linear_config(0));
        let snap = hist.snapshot();
        assert_eq!(snap.buckets.len(), 4);
        assert_eq!(snap.total(), 0);
    }

    #[test]
    fn first_n_edges_overrides_the_strategy() {
        let mut config = linear_config(4);
        config.first_n_edges = Some(3);
        let mut hist = Histogram::new(config);
        for value in [7.0, 3.0, 7.0, 5.0] {
            hist.observe(value);
        }
        assert_eq!(hist.snapshot().buckets, vec![3.0, 5.0, 7.0]);
    }

    #[test]
    fn log2_edges_double_in_width() {
        let edges = log2_edges(3, &[0.0, 7.0]);
        assert_eq!(edges, vec![0.0, 1.0, 3.0]);
    }

    #[test]
    fn custom_edges_are_sorted_and_deduplicated() {
        let mut hist = Histogram::new(HistogramConfig {
            name: "h".to_string(),
            strategy: BucketStrategy::Custom {
                edges: vec![10.0, 0.0, 10.0],
            },
            training_size: 0,
            first_n_edges: None,
        });
        hist.observe(4.0);
        let snap = hist.snapshot();
        assert_eq!(snap.buckets, vec![0.0, 10.0]);
        assert_eq!(snap.counts, vec![1, 0]);
    }
}
