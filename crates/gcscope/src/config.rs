use anyhow::{Context, Result};
use engine::EngineConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConsoleConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Reports go to stdout, so logs never do.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    Stderr,
    File { path: String },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Print reports as JSON instead of text tables.
    pub json: bool,
    /// Log replay progress every this many emitted activities.
    pub progress_every: u64,
    /// Channels narrower than this many samples are left out of text reports.
    pub min_samples: u64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            logging: LoggingConfig {
                level: "engine=info,gcscope=info".to_string(),
                format: LogFormat::Pretty,
                output: LogOutput::Stderr,
            },
            output: OutputConfig {
                json: false,
                progress_every: 100,
                min_samples: 1,
            },
        }
    }
}

impl ConsoleConfig {
    /// Layered load: defaults, then config files, then `GCSCOPE__*`
    /// environment variables (`GCSCOPE__ENGINE__CPU_COUNT=8`).
    pub fn load(explicit: Option<&str>) -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let mut builder = Self::defaults_builder()?;

        let config_paths = ["/etc/gcscope/gcscope", "gcscope", "config/gcscope"];
        for path in config_paths {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        if let Some(path) = explicit {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("GCSCOPE")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: Self = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.engine.apply_env_overrides();
        Ok(config)
    }

    /// Defaults overlaid with one TOML document.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        Self::defaults_builder()?
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    fn defaults_builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let defaults = config::Config::try_from(&ConsoleConfig::default())
            .context("Failed to serialize default configuration")?;
        Ok(config::Config::builder().add_source(defaults))
    }

    pub fn validate(&self) -> Result<()> {
        self.engine
            .validate()
            .map_err(|e| anyhow::anyhow!(e))
            .context("Invalid engine configuration")?;
        if self.logging.level.trim().is_empty() {
            anyhow::bail!("logging.level must not be empty");
        }
        if self.output.progress_every == 0 {
            anyhow::bail!("output.progress_every must be > 0");
        }
        Ok(())
    }
}
