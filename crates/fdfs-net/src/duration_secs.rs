//! Serde helper for durations written as (fractional) seconds.
//!
//! Use with `#[serde(with = "fdfs_net::duration_secs")]`.

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Timeouts {
        #[serde(with = "crate::duration_secs")]
        after: Duration,
    }

    #[test]
    fn test_fractional_seconds() {
        let t: Timeouts = serde_json::from_str(r#"{"after": 1.5}"#).unwrap();
        assert_eq!(t.after, Duration::from_millis(1500));
        assert_eq!(serde_json::to_string(&t).unwrap(), r#"{"after":1.5}"#);
    }

    #[test]
    fn test_rejects_negative() {
        assert!(serde_json::from_str::<Timeouts>(r#"{"after": -1.0}"#).is_err());
    }
}
