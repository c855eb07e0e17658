//! Serde adapters for `Duration` configuration fields
//!
//! A duration may be given as a number of seconds (`3`, `0.5`) or as a
//! humantime string (`"800ms"`, `"1m30s"`). It is always written back as a
//! humantime string, which keeps `--print-config` output readable.
//!
//! ```toml
//! [probe]
//! timeout = "800ms"
//! pipeline_timeout = 120
//! ```

use std::fmt;
use std::time::Duration;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serializer};

fn to_human(duration: &Duration) -> String {
    humantime::format_duration(*duration).to_string()
}

struct SecondsOrHuman;

impl Visitor<'_> for SecondsOrHuman {
    type Value = Duration;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("seconds as a number, or a duration string such as \"800ms\" or \"2s\"")
    }

    fn visit_u64<E: de::Error>(self, seconds: u64) -> Result<Duration, E> {
        Ok(Duration::from_secs(seconds))
    }

    fn visit_i64<E: de::Error>(self, seconds: i64) -> Result<Duration, E> {
        let seconds = u64::try_from(seconds)
            .map_err(|_| E::custom(format!("duration cannot be negative: {seconds}")))?;
        self.visit_u64(seconds)
    }

    fn visit_f64<E: de::Error>(self, seconds: f64) -> Result<Duration, E> {
        Duration::try_from_secs_f64(seconds)
            .map_err(|e| E::custom(format!("invalid duration {seconds}: {e}")))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Duration, E> {
        humantime::parse_duration(value.trim())
            .map_err(|e| E::custom(format!("invalid duration '{value}': {e}")))
    }
}

/// `#[serde(with = "duration_serde::duration")]`
pub mod duration {
    use super::*;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&to_human(duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        deserializer.deserialize_any(SecondsOrHuman)
    }
}

/// `#[serde(with = "duration_serde::option_duration")]`; absent or null means `None`
pub mod option_duration {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapped(#[serde(with = "super::duration")] Duration);

    pub fn serialize<S: Serializer>(
        duration: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match duration {
            Some(d) => serializer.serialize_some(&to_human(d)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<Wrapped>::deserialize(deserializer)?.map(|Wrapped(d)| d))
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Probe {
        #[serde(with = "super::duration")]
        timeout: Duration,
        #[serde(
            default,
            with = "super::option_duration",
            skip_serializing_if = "Option::is_none"
        )]
        deadline: Option<Duration>,
    }

    #[test]
    fn test_human_readable_durations() {
        let probe: Probe = toml::from_str("timeout = \"800ms\"\ndeadline = \"2m\"").unwrap();
        assert_eq!(probe.timeout, Duration::from_millis(800));
        assert_eq!(probe.deadline, Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_numeric_seconds() {
        let probe: Probe = toml::from_str("timeout = 3").unwrap();
        assert_eq!(probe.timeout, Duration::from_secs(3));
        assert_eq!(probe.deadline, None);
    }

    #[test]
    fn test_fractional_and_negative_seconds() {
        let probe: Probe = toml::from_str("timeout = 0.25").unwrap();
        assert_eq!(probe.timeout, Duration::from_millis(250));
        assert!(toml::from_str::<Probe>("timeout = -1").is_err());
    }

    #[test]
    fn test_invalid_duration_rejected() {
        let result: Result<Probe, _> = toml::from_str("timeout = \"soon\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_round_trips_as_string() {
        let probe = Probe {
            timeout: Duration::from_millis(1500),
            deadline: None,
        };
        let text = toml::to_string(&probe).unwrap();
        assert!(text.contains("timeout = \"1s 500ms\""));
        assert!(!text.contains("deadline"));
    }
}
