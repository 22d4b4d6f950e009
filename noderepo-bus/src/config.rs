use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Notification bus tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Ping the connection after this long without any event.
    #[serde(with = "secs")]
    pub idle_timeout: Duration,
    /// Delay between pings while the connection is down.
    #[serde(with = "secs")]
    pub retry_delay: Duration,
    /// Capacity of the subscriber's command channel.
    pub command_buffer: usize,
    /// Per-listener backlog of the in-process hub before it reports a lag.
    pub hub_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(20),
            retry_delay: Duration::from_secs(1),
            command_buffer: 32,
            hub_capacity: 256,
        }
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
