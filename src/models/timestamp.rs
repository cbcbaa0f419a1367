use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// A store-assigned instant, normalised to epoch milliseconds.
///
/// Documents arrive with `createdAt`/`updatedAt` in one of three encodings:
/// integer epoch millis, an ISO-8601 string, or `{seconds, nanoseconds}`.
/// Anything else coerces to epoch 0 so sorting never fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const EPOCH: Timestamp = Timestamp(0);

    pub fn from_millis(millis: i64) -> Self {
        Timestamp(millis)
    }

    pub fn now() -> Self {
        Timestamp(Utc::now().timestamp_millis())
    }

    pub fn millis(&self) -> i64 {
        self.0
    }

    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(Timestamp)
                .unwrap_or_default(),
            Some(Value::String(s)) => Self::parse_iso(s).unwrap_or_default(),
            Some(Value::Object(map)) => {
                let seconds = map.get("seconds").and_then(Value::as_i64);
                let nanos = map.get("nanoseconds").and_then(Value::as_i64).unwrap_or(0);
                seconds
                    .map(|s| Timestamp(s * 1000 + nanos / 1_000_000))
                    .unwrap_or_default()
            }
            _ => Timestamp::EPOCH,
        }
    }

    fn parse_iso(s: &str) -> Option<Self> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(Timestamp(dt.timestamp_millis()));
        }
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
            .ok()
            .map(|dt| Timestamp(dt.and_utc().timestamp_millis()))
    }

    pub fn to_rfc3339(&self) -> String {
        DateTime::<Utc>::from_timestamp_millis(self.0)
            .unwrap_or_default()
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Timestamp::from_value(Some(&value)))
    }
}
