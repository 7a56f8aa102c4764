use std::path::PathBuf;

use ::config::builder::DefaultState;
use ::config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiConfig {
    /// Ask before deleting buckets or files and before submitting files for
    /// processing.
    pub confirm_destructive: bool,
    pub download_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    pub file_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub ui: UiConfig,
    pub logging: LoggingConfig,
}

const DEFAULTS: &str = include_str!("../config/default.toml");

/// Builder seeded with the compiled-in `config/default.toml`.
fn with_defaults() -> ConfigBuilder<DefaultState> {
    Config::builder().add_source(File::from_str(DEFAULTS, FileFormat::Toml))
}

impl Default for AppConfig {
    fn default() -> Self {
        with_defaults()
            .build()
            .and_then(|cfg| cfg.try_deserialize())
            .unwrap_or_else(|e| panic!("embedded config/default.toml is invalid: {}", e))
    }
}

/// Reads `.env`, then layers `bucketdeck.toml`, the file named by
/// `BUCKETDECK_CONFIG` and `BUCKETDECK__SECTION__KEY` variables over the
/// defaults, later sources winning.
pub fn load() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let mut builder = with_defaults().add_source(File::with_name("bucketdeck").required(false));
    if let Ok(path) = std::env::var("BUCKETDECK_CONFIG") {
        builder = builder.add_source(File::with_name(&path).required(false));
    }
    let app_cfg: AppConfig = builder
        .add_source(Environment::with_prefix("BUCKETDECK").separator("__"))
        .build()?
        .try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    let url = Url::parse(&cfg.backend.base_url)
        .map_err(|e| anyhow::anyhow!("invalid backend.base_url {:?}: {}", cfg.backend.base_url, e))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(anyhow::anyhow!(
            "invalid backend.base_url: scheme must be http or https, got {}",
            url.scheme()
        ));
    }
    if cfg.backend.timeout_secs == 0 || cfg.backend.timeout_secs > 600 {
        return Err(anyhow::anyhow!("backend.timeout_secs must be in 1..=600"));
    }

    if cfg.logging.file_prefix.trim().is_empty() {
        return Err(anyhow::anyhow!("logging.file_prefix must not be empty"));
    }

    Ok(())
}
