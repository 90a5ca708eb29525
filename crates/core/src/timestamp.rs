//! Lenient timestamp deserialization.
//!
//! Stored messages may carry `createdAt` as an RFC 3339 string or as epoch
//! milliseconds. Both are coerced into `DateTime<Utc>`.

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(i64),
    Fractional(f64),
    Text(String),
}

impl RawTimestamp {
    fn into_datetime(self) -> Result<DateTime<Utc>, String> {
        match self {
            Self::Millis(ms) => {
                DateTime::from_timestamp_millis(ms).ok_or_else(|| format!("timestamp {ms} is out of range"))
            }
            Self::Fractional(ms) => DateTime::from_timestamp_millis(ms as i64)
                .ok_or_else(|| format!("timestamp {ms} is out of range")),
            Self::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| format!("invalid timestamp '{text}': {e}")),
        }
    }
}

/// Deserialize a required timestamp.
pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    RawTimestamp::deserialize(deserializer)?
        .into_datetime()
        .map_err(D::Error::custom)
}

/// Deserialize an optional timestamp (`null` or absent → `None`).
pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawTimestamp>::deserialize(deserializer)?
        .map(RawTimestamp::into_datetime)
        .transpose()
        .map_err(D::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        #[serde(deserialize_with = "deserialize")]
        at: DateTime<Utc>,
    }

    #[test]
    fn parses_rfc3339_and_millis() {
        let a: Wrapper = serde_json::from_str(r#"{"at": "2024-05-01T10:00:00Z"}"#).unwrap();
        let b: Wrapper = serde_json::from_str(&format!(r#"{{"at": {}}}"#, a.at.timestamp_millis())).unwrap();
        assert_eq!(a.at, b.at);
    }

    #[test]
    fn rejects_garbage() {
        let result: Result<Wrapper, _> = serde_json::from_str(r#"{"at": "yesterday"}"#);
        assert!(result.is_err());
    }
}
