use anyhow::{Context, Result};
use config::{Config, File, FileFormat};
use serde::Deserialize;
use std::env;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Quoter {
    /// Pools considered per batch request; extra candidates are dropped.
    #[serde(default = "default_max_candidate_pools")]
    pub max_candidate_pools: usize,
    /// Timestamp quotes are evaluated at. 0 = wall clock.
    #[serde(default)]
    pub block_timestamp: u32,
    /// Below this many candidates a batch is quoted sequentially.
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,
}

fn default_max_candidate_pools() -> usize {
    64
}
fn default_parallel_threshold() -> usize {
    4
}

impl Default for Quoter {
    fn default() -> Self {
        Self {
            max_candidate_pools: default_max_candidate_pools(),
            block_timestamp: 0,
            parallel_threshold: default_parallel_threshold(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheSettings {
    #[serde(default = "default_max_pools")]
    pub max_pools: usize,
}

fn default_max_pools() -> usize {
    1000
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { max_pools: default_max_pools() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Logging {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// JSON log lines (needs the `observability` feature).
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Logging {
    fn default() -> Self {
        Self { level: default_log_level(), json: false }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub quoter: Quoter,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub logging: Logging,
}

impl Settings {
    /// Load `Config.toml` from the working directory if present, then apply `BUNNI_SDK_*` overrides.
    pub fn new() -> Result<Self> {
        let s = Config::builder()
            .add_source(File::with_name("Config.toml").format(FileFormat::Toml).required(false))
            .build()
            .context("building configuration")?;
        let mut settings: Self = s.try_deserialize().context("deserializing Config.toml")?;
        settings.apply_env_overrides()?;
        Ok(settings)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let s = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml))
            .build()
            .with_context(|| format!("reading settings from {}", path.display()))?;
        let mut settings: Self = s.try_deserialize().with_context(|| format!("parsing {}", path.display()))?;
        settings.apply_env_overrides()?;
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_override("BUNNI_SDK_QUOTER_MAX_CANDIDATE_POOLS")? {
            self.quoter.max_candidate_pools = v;
        }
        if let Some(v) = env_override("BUNNI_SDK_QUOTER_BLOCK_TIMESTAMP")? {
            self.quoter.block_timestamp = v;
        }
        if let Some(v) = env_override("BUNNI_SDK_QUOTER_PARALLEL_THRESHOLD")? {
            self.quoter.parallel_threshold = v;
        }
        if let Some(v) = env_override("BUNNI_SDK_CACHE_MAX_POOLS")? {
            self.cache.max_pools = v;
        }
        if let Ok(level) = env::var("BUNNI_SDK_LOGGING_LEVEL") {
            let trimmed = level.trim();
            if !trimmed.is_empty() {
                self.logging.level = trimmed.to_string();
            }
        }
        if let Some(v) = env_override("BUNNI_SDK_LOGGING_JSON")? {
            self.logging.json = v;
        }
        Ok(())
    }
}

fn env_override<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            let value = raw.trim().parse::<T>().with_context(|| format!("invalid value for {}: {:?}", key, raw))?;
            Ok(Some(value))
        }
        _ => Ok(None),
    }
}
