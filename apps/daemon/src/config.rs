use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use cloudinfo_engine::EngineConfig;

/// Daemon configuration, read from `CLOUDINFO_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding one catalog JSON file per provider.
    pub catalog_dir: PathBuf,
    /// Optional engine configuration file (JSON).
    pub engine_config: Option<PathBuf>,
    pub renewal_interval: Option<Duration>,
    pub spot_renewal_interval: Option<Duration>,
    pub price_batch_size: Option<usize>,
    /// Renew once, print a summary and exit.
    pub run_once: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_dir: PathBuf::from("catalogs"),
            engine_config: None,
            renewal_interval: None,
            spot_renewal_interval: None,
            price_batch_size: None,
            run_once: false,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> anyhow::Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid {}: {}", name, e)),
        Err(_) => Ok(None),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Ok(Self {
            catalog_dir: std::env::var("CLOUDINFO_CATALOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.catalog_dir),
            engine_config: std::env::var("CLOUDINFO_CONFIG_FILE").ok().map(PathBuf::from),
            renewal_interval: parse_var::<u64>("CLOUDINFO_RENEWAL_INTERVAL_SECS")?
                .map(Duration::from_secs),
            spot_renewal_interval: parse_var::<u64>("CLOUDINFO_SPOT_RENEWAL_INTERVAL_SECS")?
                .map(Duration::from_secs),
            price_batch_size: parse_var("CLOUDINFO_PRICE_BATCH_SIZE")?,
            run_once: parse_var("CLOUDINFO_RUN_ONCE")?.unwrap_or(false),
        })
    }

    /// Engine configuration: the config file if any, then env overrides.
    pub fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let mut engine_config = match &self.engine_config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("Failed to parse {}", path.display()))?
            }
            None => EngineConfig::default(),
        };

        if let Some(interval) = self.renewal_interval {
            engine_config.renewal_interval = interval;
        }
        if let Some(interval) = self.spot_renewal_interval {
            engine_config.spot_renewal_interval = interval;
        }
        if let Some(batch_size) = self.price_batch_size {
            engine_config.price_batch_size = batch_size;
        }

        engine_config.validate()?;
        Ok(engine_config)
    }
}
