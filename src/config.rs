use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Method;
use serde::Deserialize;

use crate::error::{BypassError, Result};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Verbs retried on the untouched URL once the catalog is exhausted. GET is
/// absent on purpose: the catalog's plain-path technique already covers it.
pub const DEFAULT_FALLBACK_METHODS: [&str; 6] = ["POST", "PUT", "PATCH", "DELETE", "OPTIONS", "TRACE"];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Targets probed at the same time
    pub concurrency: usize,
    pub timeout_secs: u64,
    /// Pause between two probes of the same target
    pub technique_delay_ms: u64,
    pub fallback_methods: Vec<String>,
    pub user_agent: String,
    /// Upper bound on body bytes read for classification
    pub max_body_bytes: usize,
    /// JSON technique list replacing the built-in catalog
    pub catalog_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: 10,
            timeout_secs: 10,
            technique_delay_ms: 50,
            fallback_methods: DEFAULT_FALLBACK_METHODS.iter().map(|m| m.to_string()).collect(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_body_bytes: 5 * 1024 * 1024,
            catalog_path: None,
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_json::from_str(&data)
            .map_err(|e| BypassError::config(format!("{}: {}", path.display(), e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(BypassError::config("concurrency must be at least 1"));
        }
        if self.timeout_secs == 0 {
            return Err(BypassError::config("timeout_secs must be at least 1"));
        }
        if self.max_body_bytes == 0 {
            return Err(BypassError::config("max_body_bytes must be at least 1"));
        }
        self.methods().map(|_| ())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn technique_delay(&self) -> Duration {
        Duration::from_millis(self.technique_delay_ms)
    }

    /// Parsed fallback verbs, in configured order.
    pub fn methods(&self) -> Result<Vec<Method>> {
        self.fallback_methods
            .iter()
            .map(|m| {
                let upper = m.trim().to_ascii_uppercase();
                Method::from_bytes(upper.as_bytes())
                    .map_err(|_| BypassError::config(format!("invalid HTTP method {:?}", m)))
            })
            .collect()
    }
}
