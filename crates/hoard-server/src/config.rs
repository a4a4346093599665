use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use hoard_store::StoreConfig;

use crate::error::{ServerError, ServerResult};

/// Path prefix under which the API is mounted in addition to `/`.
pub const DEFAULT_MOUNT_PREFIX: &str = "/file-storage-http-api";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Largest accepted request body, in bytes.
    pub max_upload_size: usize,
    /// Extra mount point for every route. Empty disables it.
    pub mount_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            max_upload_size: 1024 * 1024 * 1024,
            mount_prefix: DEFAULT_MOUNT_PREFIX.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> ServerResult<()> {
        let prefix = &self.mount_prefix;
        if !prefix.is_empty() && (!prefix.starts_with('/') || prefix == "/" || prefix.ends_with('/')) {
            return Err(ServerError::Config(format!(
                "mount_prefix must look like \"/name\", got {prefix:?}"
            )));
        }
        if self.max_upload_size == 0 {
            return Err(ServerError::Config("max_upload_size must be positive".into()));
        }
        Ok(())
    }
}

/// Full process configuration: one `[server]` and one `[store]` table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoardConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
}

impl HoardConfig {
    pub fn from_toml_str(s: &str) -> ServerResult<Self> {
        toml::from_str(s).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("cannot read {}: {e}", path.display())))?;
        tracing::debug!("loaded config from {:?}", path);
        Self::from_toml_str(&contents)
    }

    /// Apply `HOARD_ROOT` and `HOARD_BIND` from the process environment.
    pub fn apply_env_overrides(&mut self) -> ServerResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ServerResult<()> {
        if let Some(root) = lookup("HOARD_ROOT") {
            self.store.root = PathBuf::from(root);
        }
        if let Some(bind) = lookup("HOARD_BIND") {
            self.server.bind_addr = bind
                .parse()
                .map_err(|e| ServerError::Config(format!("HOARD_BIND {bind:?}: {e}")))?;
        }
        Ok(())
    }
}
