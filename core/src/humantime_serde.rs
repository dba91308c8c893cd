//! Serde helpers for durations written as humantime strings (`"5s"`, `"1m 30s"`).

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*duration).to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
}

/// The same for `Option<Duration>`; null and blank strings are `None`.
pub mod option {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => super::serialize(d, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(s) if !s.trim().is_empty() => humantime::parse_duration(s.trim())
                .map(Some)
                .map_err(serde::de::Error::custom),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Limits {
        #[serde(with = "crate::humantime_serde")]
        startup: Duration,
        #[serde(default, with = "crate::humantime_serde::option")]
        lookup: Option<Duration>,
    }

    #[test]
    fn test_humanized_durations() {
        let limits: Limits = serde_json::from_str(r#"{"startup": " 1m 30s", "lookup": ""}"#).unwrap();
        assert_eq!(limits.startup, Duration::from_secs(90));
        assert_eq!(limits.lookup, None);

        let json = serde_json::to_value(Limits {
            startup: Duration::from_millis(1500),
            lookup: Some(Duration::from_secs(4)),
        })
        .unwrap();
        assert_eq!(json["startup"], "1s 500ms");
        assert_eq!(json["lookup"], "4s");
    }

    #[test]
    fn test_bad_duration_is_rejected() {
        assert!(serde_json::from_str::<Limits>(r#"{"startup": "soon"}"#).is_err());
    }
}
