use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use hoard_types::HashAlgorithm;

use crate::error::{StoreError, StoreResult};

/// Storage engine configuration.
///
/// Created once at process start and immutable for the lifetime of the
/// store. Every field has a default, so a partial `[store]` table in a
/// config file is enough.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory of the store. Created on open if absent.
    pub root: PathBuf,
    /// Number of leading hash characters used as the shard directory name.
    pub shard_len: usize,
    /// Digest algorithm for content hashes.
    pub algorithm: HashAlgorithm,
    /// Delete leftovers of interrupted uploads from the staging directory
    /// when the store is opened.
    pub sweep_staging_on_open: bool,
    /// `fsync` each object before it becomes visible.
    pub fsync: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("store"),
            shard_len: 2,
            algorithm: HashAlgorithm::default(),
            sweep_staging_on_open: true,
            fsync: true,
        }
    }
}

impl StoreConfig {
    /// Default configuration rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn with_shard_len(mut self, shard_len: usize) -> Self {
        self.shard_len = shard_len;
        self
    }

    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_fsync(mut self, fsync: bool) -> Self {
        self.fsync = fsync;
        self
    }

    /// Check that the shard prefix fits the configured digest.
    ///
    /// A zero-length prefix would make the store root its own shard
    /// directory, and a prefix longer than the digest could never be
    /// satisfied.
    pub fn validate(&self) -> StoreResult<()> {
        if self.shard_len == 0 {
            return Err(StoreError::Config("shard_len must be at least 1".into()));
        }
        let hex_len = self.algorithm.hex_len();
        if self.shard_len > hex_len {
            return Err(StoreError::Config(format!(
                "shard_len {} exceeds {} digest length {}",
                self.shard_len, self.algorithm, hex_len
            )));
        }
        if self.root.as_os_str().is_empty() {
            return Err(StoreError::Config("root must not be empty".into()));
        }
        Ok(())
    }
}
