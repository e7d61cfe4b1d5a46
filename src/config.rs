use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::seed::DEFAULT_RNG_SEED;

pub const CONFIG_ENV: &str = "SINA_CONFIG";
pub const WORKSPACE_ENV: &str = "SINA_WORKSPACE";
pub const DEFAULT_CONFIG_PATH: &str = "sina.toml";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Configuration {
    /// Workspace opened at startup. Without one the sidecar runs in memory.
    pub workspace: Option<PathBuf>,
    pub log_level: String,
    pub seed: SeedConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SeedConfig {
    pub rng_seed: u64,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            workspace: None,
            log_level: "info".to_string(),
            seed: SeedConfig::default(),
        }
    }
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            rng_seed: DEFAULT_RNG_SEED,
        }
    }
}

impl Configuration {
    /// A missing file yields defaults; a malformed one is an error.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.to_string_lossy()))?;
        let cfg: Self = toml::from_str(&text)
            .with_context(|| format!("failed to parse {}", path.to_string_lossy()))?;
        Ok(cfg)
    }

    /// Reads the file named by `SINA_CONFIG` (or `sina.toml`) and applies
    /// `SINA_WORKSPACE`.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut cfg = Self::load_from(&path)?;
        if let Some(ws) = std::env::var_os(WORKSPACE_ENV).filter(|v| !v.is_empty()) {
            cfg.workspace = Some(PathBuf::from(ws));
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = Configuration::load_from(&dir.path().join("absent.toml")).expect("load");
        assert_eq!(cfg, Configuration::default());
        assert_eq!(cfg.seed.rng_seed, DEFAULT_RNG_SEED);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sina.toml");
        std::fs::write(&path, "log_level = \"debug\"\n[seed]\nrng_seed = 7\n").expect("write");
        let cfg = Configuration::load_from(&path).expect("load");
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.seed.rng_seed, 7);
        assert_eq!(cfg.workspace, None);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sina.toml");
        std::fs::write(&path, "log_level = [").expect("write");
        assert!(Configuration::load_from(&path).is_err());
    }
}
