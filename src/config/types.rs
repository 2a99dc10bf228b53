use segline_media::{IndexConfig, TimelineConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub timeline: TimelineSettings,

    #[serde(default)]
    pub index: IndexSettings,

    #[serde(default)]
    pub inspect: InspectSettings,
}

/// Presentation timeline settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimelineSettings {
    /// Re-anchor the live edge on observed segments
    #[serde(default = "default_auto_correct_drift")]
    pub auto_correct_drift: bool,

    /// Seconds kept between the seek range end and the live edge
    #[serde(default)]
    pub presentation_delay: f64,

    /// Server clock offset in milliseconds
    #[serde(default)]
    pub clock_offset_ms: f64,

    /// Seconds of availability granted ahead of the live edge
    #[serde(default)]
    pub availability_time_offset: f64,
}

fn default_auto_correct_drift() -> bool {
    true
}

impl Default for TimelineSettings {
    fn default() -> Self {
        Self {
            auto_correct_drift: default_auto_correct_drift(),
            presentation_delay: 0.0,
            clock_offset_ms: 0.0,
            availability_time_offset: 0.0,
        }
    }
}

impl From<&TimelineSettings> for TimelineConfig {
    fn from(settings: &TimelineSettings) -> Self {
        TimelineConfig {
            auto_correct_drift: settings.auto_correct_drift,
            presentation_delay: settings.presentation_delay,
            clock_offset_ms: settings.clock_offset_ms,
            availability_time_offset: settings.availability_time_offset,
        }
    }
}

/// Segment index settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexSettings {
    /// Timeline gaps or overlaps (seconds) at least this large are logged
    #[serde(default = "default_gap_tolerance")]
    pub gap_tolerance: f64,

    /// Update interval (seconds) for low-latency duration templates
    #[serde(default = "default_low_latency_update_interval")]
    pub low_latency_update_interval: f64,
}

fn default_gap_tolerance() -> f64 {
    IndexConfig::default().gap_tolerance
}

fn default_low_latency_update_interval() -> f64 {
    IndexConfig::default().low_latency_update_interval
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            gap_tolerance: default_gap_tolerance(),
            low_latency_update_interval: default_low_latency_update_interval(),
        }
    }
}

impl From<&IndexSettings> for IndexConfig {
    fn from(settings: &IndexSettings) -> Self {
        IndexConfig {
            gap_tolerance: settings.gap_tolerance,
            low_latency_update_interval: settings.low_latency_update_interval,
        }
    }
}

/// Defaults for the inspection commands.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InspectSettings {
    /// Media URI reported for references read from local index files
    #[serde(default = "default_media_uri")]
    pub media_uri: String,

    /// Maximum number of references printed in text output (0 = all)
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

fn default_media_uri() -> String {
    "media".to_string()
}

fn default_max_rows() -> usize {
    50
}

impl Default for InspectSettings {
    fn default() -> Self {
        Self {
            media_uri: default_media_uri(),
            max_rows: default_max_rows(),
        }
    }
}
