use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Identifies this tool to the statistics backend.
pub const PLUGIN_GUID: &str = "3f79485f-0722-46c3-9d26-e728ffae80ae";

/// Settings as the client sends them, nested under this key.
pub const SETTINGS_SECTION: &str = "code_call_lens";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LensSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default = "default_number_of_days")]
    pub number_of_days: u32,
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default)]
    pub sparkline: SparklineSettings,
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparklineSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_number_of_bars")]
    pub number_of_bars: u32,
}

fn default_enabled() -> bool {
    true
}

fn default_number_of_days() -> u32 {
    30
}

fn default_topic() -> String {
    "99f66761-d6c6-4100-840a-5ffa91c54349".to_string()
}

fn default_number_of_bars() -> u32 {
    15
}

fn default_max_concurrent_requests() -> usize {
    8
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for SparklineSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            number_of_bars: default_number_of_bars(),
        }
    }
}

impl Default for LensSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            hostname: None,
            number_of_days: default_number_of_days(),
            topic: default_topic(),
            sparkline: SparklineSettings::default(),
            max_concurrent_requests: default_max_concurrent_requests(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl LensSettings {
    /// Reads settings from a JSON value, accepting them either bare or
    /// nested under [`SETTINGS_SECTION`].
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        let value = match value {
            serde_json::Value::Object(mut map) if map.contains_key(SETTINGS_SECTION) => {
                map.remove(SETTINGS_SECTION).unwrap_or_default()
            }
            other => other,
        };
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value)
    }

    /// Number of history samples to request: never more than the reporting
    /// window has days, and none at all when sparklines are off.
    pub fn number_of_bars(&self) -> u32 {
        if !self.sparkline.enabled {
            return 0;
        }
        self.sparkline.number_of_bars.min(self.number_of_days)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
