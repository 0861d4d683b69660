//! Node configuration.
//!
//! Everything tunable arrives through [`NodeConfig`]; no environment
//! variables are consumed. Configurations deserialize from TOML via
//! [`from_toml_path`].

use std::path::{Path, PathBuf};

use hx_store::{EngineKind, HistogramConfig};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::router::HashKind;
use crate::transport::TransportKind;

/// Configuration of one node instance.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NodeConfig {
    /// Directory holding one subdirectory per local datastore.
    #[serde(default = "default_store_root")]
    pub store_root: PathBuf,
    /// Datastores hosted by each rank. The global datastore space is
    /// `world_size * datastores_per_rank`.
    #[serde(default = "default_datastores_per_rank")]
    pub datastores_per_rank: u32,
    /// Subject placement hash.
    #[serde(default)]
    pub hash: HashKind,
    /// Queue depth at which a per-destination queue is promoted to an
    /// in-flight bulk message.
    #[serde(default = "default_max_ops_per_bulk")]
    pub max_ops_per_bulk: usize,
    /// Cap on in-flight bulk messages; promotions past it wait for
    /// responses.
    #[serde(default = "default_max_bulk_ops")]
    pub max_bulk_ops: usize,
    /// Threads blocked on transport receive.
    #[serde(default = "default_listener_threads")]
    pub listener_threads: usize,
    /// Threads running the datastore executor for inbound requests.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// Engine behind each local datastore.
    #[serde(default)]
    pub engine: EngineKind,
    /// Histogram registrations, shared by every local datastore.
    #[serde(default)]
    pub histograms: Vec<HistogramConfig>,
    /// Built-in transport selection; ignored when a transport is injected.
    #[serde(default)]
    pub transport: TransportKind,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            store_root: default_store_root(),
            datastores_per_rank: default_datastores_per_rank(),
            hash: HashKind::default(),
            max_ops_per_bulk: default_max_ops_per_bulk(),
            max_bulk_ops: default_max_bulk_ops(),
            listener_threads: default_listener_threads(),
            worker_threads: default_worker_threads(),
            engine: EngineKind::default(),
            histograms: Vec::new(),
            transport: TransportKind::default(),
        }
    }
}

fn default_store_root() -> PathBuf {
    PathBuf::from("hx-data")
}

fn default_datastores_per_rank() -> u32 {
    1
}

fn default_max_ops_per_bulk() -> usize {
    64
}

fn default_max_bulk_ops() -> usize {
    128
}

fn default_listener_threads() -> usize {
    1
}

fn default_worker_threads() -> usize {
    2
}

/// Reads a TOML file into any deserializable configuration type.
pub fn from_toml_path<P: AsRef<Path>, R: DeserializeOwned>(path: P) -> anyhow::Result<R> {
    let contents = std::fs::read_to_string(path)?;
    let result: R = toml::from_str(&contents)?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use hx_store::BucketStrategy;
    use tempfile::NamedTempFile;

    use super::*;

    fn create_config_from(content: &str) -> NamedTempFile {
        let mut config_file = NamedTempFile::new().unwrap();
        config_file.write_all(content.as_bytes()).unwrap();
        config_file
    }

    #[test]
    fn test_correct_config() {
        let config = r#"
            store_root = "/tmp/hx"
            datastores_per_rank = 4
            hash = "sum"
            max_ops_per_bulk = 8
            engine = "in_memory"

            [[histograms]]
            name = "latency"
            training_size = 3

            [histograms.strategy]
            kind = "uniform_linear"
            n = 4
            min = 0.0
            max = 100.0
        "#;

        let config_file = create_config_from(config);

        let config: NodeConfig = from_toml_path(config_file.path()).unwrap();
        let expected = NodeConfig {
            store_root: PathBuf::from("/tmp/hx"),
            datastores_per_rank: 4,
            hash: HashKind::Sum,
            max_ops_per_bulk: 8,
            engine: EngineKind::InMemory,
            histograms: vec![HistogramConfig {
                name: "latency".to_string(),
                strategy: BucketStrategy::UniformLinear {
                    n: 4,
                    min: 0.0,
                    max: 100.0,
                },
                training_size: 3,
                first_n_edges: None,
            }],
            ..Default::default()
        };
        assert_eq!(config, expected);
    }

    #[test]
    fn test_defaults_fill_in() {
        let config_file = create_config_from("");
        let config: NodeConfig = from_toml_path(config_file.path()).unwrap();
        assert_eq!(config, NodeConfig::default());
        assert_eq!(config.max_ops_per_bulk, 64);
    }
}
