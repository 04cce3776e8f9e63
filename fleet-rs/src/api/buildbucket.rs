//! Wire types of the build service's `Builds` pRPC API.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use std::time::Duration;

pub const BUILDS_SERVICE: &str = "buildbucket.v2.Builds";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderId {
    pub project: String,
    pub bucket: String,
    pub builder: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringPair {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedDimension {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleBuildRequest {
    /// Deduplication key; a retried request with the same ID yields the same
    /// build.
    pub request_id: String,
    pub builder: BuilderId,
    pub properties: serde_json::Map<String, serde_json::Value>,
    pub tags: Vec<StringPair>,
    pub dimensions: Vec<RequestedDimension>,
    pub priority: i32,
    #[serde(with = "proto_duration")]
    pub scheduling_timeout: Duration,
    #[serde(with = "proto_duration")]
    pub execution_timeout: Duration,
}

/// The subset of a `Build` message that callers look at.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    /// int64 values are transported as JSON strings.
    #[serde_as(as = "DisplayFromStr")]
    pub id: i64,
    #[serde(default)]
    pub status: Option<String>,
}

/// `google.protobuf.Duration` in its JSON form, e.g. `"18000s"`.
pub mod proto_duration {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        let secs = s
            .strip_suffix('s')
            .ok_or_else(|| de::Error::custom(format!("duration {s:?} lacks the `s` suffix")))?;
        let secs: f64 = secs.parse().map_err(de::Error::custom)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(de::Error::custom(format!("invalid duration {s:?}")));
        }
        Ok(Duration::from_secs_f64(secs))
    }
}
