//! Serde adapter storing durations as humantime strings (`"30s"`, `"1m 30s"`)

use serde::{de, Deserialize, Deserializer, Serializer};
use std::time::Duration;

pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(de::Error::custom)
}
