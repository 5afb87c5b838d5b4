use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HiveError, Result};

fn default_loop_safety_cap() -> usize {
    1000
}

fn default_retry_delay_ms() -> u64 {
    200
}

fn default_step_timeout_secs() -> u64 {
    120
}

/// Engine-wide execution limits and defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Hard ceiling on loop iterations, applied at every loop level.
    #[serde(default = "default_loop_safety_cap")]
    pub loop_safety_cap: usize,
    /// Delay between retry attempts, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Default deadline for timeout-modified steps, in seconds.
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            loop_safety_cap: default_loop_safety_cap(),
            retry_delay_ms: default_retry_delay_ms(),
            step_timeout_secs: default_step_timeout_secs(),
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(HiveError::ConfigNotFound(path.display().to_string()));
        }
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&raw)?;
        debug!(path = %path.display(), "Loaded engine config");
        Ok(config)
    }

    /// Parse from a TOML string.
    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.loop_safety_cap, 1000);
        assert_eq!(config.retry_delay(), Duration::from_millis(200));
        assert_eq!(config.step_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config = EngineConfig::from_toml("loop_safety_cap = 50").unwrap();
        assert_eq!(config.loop_safety_cap, 50);
        assert_eq!(config.retry_delay_ms, 200);
        assert_eq!(config.step_timeout_secs, 120);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "retry_delay_ms = 10\nstep_timeout_secs = 5").unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.retry_delay_ms, 10);
        assert_eq!(config.step_timeout_secs, 5);
        assert_eq!(config.loop_safety_cap, 1000);
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::load(Path::new("/nonexistent/hive.toml")).unwrap_err();
        assert!(matches!(err, HiveError::ConfigNotFound(_)));
    }

    #[test]
    fn test_invalid_toml() {
        let err = EngineConfig::from_toml("loop_safety_cap = \"many\"").unwrap_err();
        assert!(matches!(err, HiveError::Toml(_)));
    }
}
