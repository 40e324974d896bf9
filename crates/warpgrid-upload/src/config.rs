//! upload.toml configuration parser.

use std::path::Path;

use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::body::{DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};
use crate::sink::PartialPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub upload: UploadSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    /// Bytes per chunk when the upload is read from a reader.
    pub chunk_size: usize,
    /// What happens to partial output when an upload fails.
    pub on_failure: PartialPolicy,
    /// fsync file sinks before reporting success.
    pub sync_on_commit: bool,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            on_failure: PartialPolicy::Delete,
            sync_on_commit: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directives, used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,warpgrid_upload=debug".to_string(),
        }
    }
}

impl UploadConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: UploadConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.upload.chunk_size == 0 {
            bail!("upload.chunk_size must be greater than zero");
        }
        if self.upload.chunk_size > MAX_CHUNK_SIZE {
            bail!(
                "upload.chunk_size {} exceeds the maximum of {MAX_CHUNK_SIZE} bytes",
                self.upload.chunk_size
            );
        }
        Ok(())
    }
}
