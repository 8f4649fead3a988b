use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top level time configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimeConfig {
    /// Setting `realtime: true` makes the handle a passthrough to the system clock.
    /// Only if it is set to `false` will the [`ManualConfig`] take effect.
    pub realtime: bool,
    /// Configuration of the manually triggered clock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual: Option<ManualConfig>,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            realtime: true,
            manual: None,
        }
    }
}

/// Configuration of the manually triggered clock.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ManualConfig {
    /// What time the clock starts at (truncated to millisecond precision).
    #[serde(default = "Utc::now")]
    pub start_at: DateTime<Utc>,
}

impl Default for ManualConfig {
    fn default() -> Self {
        Self {
            start_at: Utc::now(),
        }
    }
}

/// Truncate a DateTime to millisecond precision.
/// Keeps stamped timestamps consistent with millisecond-based arithmetic.
pub(crate) fn truncate_to_millis(time: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(time.timestamp_millis()).expect("valid timestamp")
}
