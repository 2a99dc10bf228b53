mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./segline.toml",
        "~/.config/segline/config.toml",
        "/etc/segline/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    let timeline = &config.timeline;
    if timeline.presentation_delay < 0.0 || !timeline.presentation_delay.is_finite() {
        anyhow::bail!(
            "Presentation delay must be a non-negative number of seconds, got {}",
            timeline.presentation_delay
        );
    }
    if !timeline.clock_offset_ms.is_finite() {
        anyhow::bail!("Clock offset must be finite");
    }
    if timeline.availability_time_offset < 0.0 || timeline.availability_time_offset.is_nan() {
        anyhow::bail!(
            "Availability time offset cannot be negative, got {}",
            timeline.availability_time_offset
        );
    }

    let index = &config.index;
    if index.gap_tolerance <= 0.0 || index.gap_tolerance.is_nan() {
        anyhow::bail!("Gap tolerance must be positive, got {}", index.gap_tolerance);
    }
    if index.low_latency_update_interval <= 0.0 || !index.low_latency_update_interval.is_finite() {
        anyhow::bail!(
            "Low-latency update interval must be a positive number of seconds, got {}",
            index.low_latency_update_interval
        );
    }

    if config.inspect.media_uri.is_empty() {
        tracing::warn!("Inspect media URI is empty; references will have no URI");
    }

    Ok(())
}
