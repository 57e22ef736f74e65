//! Load: engine config loading from file and environment variables.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::model::EngineConfig;
use crate::error::{EngineError, Result};

const CONFIG_FILE_ENV: &str = "GCSCOPE_ENGINE_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "/etc/gcscope/engine.toml";

impl EngineConfig {
    /// Load configuration from file or environment variables
    /// Priority: Environment Variables > Config File > Defaults
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let mut config = if Path::new(&config_path).exists() {
            tracing::info!("Loading engine configuration from: {}", config_path);
            Self::from_file(&config_path)?
        } else {
            tracing::debug!("Engine config file not found at {}, using defaults", config_path);
            Self::default()
        };

        config.apply_env_overrides();
        config.validate().map_err(EngineError::Config)?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)
            .map_err(|e| EngineError::from(e).with_context(format!("opening {}", path.display())))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        toml::from_str(&contents)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Environment variables override file config for tunables
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parse("GCSCOPE_CPU_COUNT") {
            self.cpu_count = v;
        }
        if let Some(v) = env_parse("GCSCOPE_CONCURRENT_THREADS") {
            self.concurrent_threads = v;
        }
        if let Some(v) = env_parse("GCSCOPE_SOURCE_GAP_SECS") {
            self.source_gap_secs = v;
        }
        if let Some(v) = env_parse("GCSCOPE_MIN_SOURCE_GAP_SECS") {
            self.min_source_gap_secs = v;
        }
        if let Some(v) = env_parse("GCSCOPE_RETAIN_SAMPLES") {
            self.retain_samples = v;
        }
        if let Some(v) = env_parse("GCSCOPE_COMPACTION_PHASES") {
            self.compaction_phases = v;
        }
        if let Some(v) = env_parse("GCSCOPE_REPLAY_SPEED") {
            self.replay.speed_percent = v;
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
