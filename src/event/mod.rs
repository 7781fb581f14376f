use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

mod records;
mod validation;
#[cfg(test)]
mod tests;

pub use records::{
    BoundingBox, FireRecord, FloodRecord, Location, TrafficRecord, UserReportRecord, WeatherRecord,
};
pub use validation::{validate_delta, ValidationError};

/// Data category carried on the live channel.
///
/// Wire names are camelCase (`weather`, `fire`, `flood`, `traffic`, `userReport`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Domain {
    Weather,
    Fire,
    Flood,
    Traffic,
    UserReport,
}

impl Domain {
    /// Every domain, in collection order.
    pub const ALL: [Domain; 5] = [
        Domain::Weather,
        Domain::Fire,
        Domain::Flood,
        Domain::Traffic,
        Domain::UserReport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Weather => "weather",
            Domain::Fire => "fire",
            Domain::Flood => "flood",
            Domain::Traffic => "traffic",
            Domain::UserReport => "userReport",
        }
    }

    /// REST resource segment used by the bulk fetch endpoints.
    pub fn resource_path(&self) -> &'static str {
        match self {
            Domain::Weather => "weather",
            Domain::Fire => "fires",
            Domain::Flood => "floods",
            Domain::Traffic => "traffic",
            Domain::UserReport => "reports",
        }
    }

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Domain::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Kind of change a delta carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaAction {
    Create,
    Update,
    Delete,
}

impl fmt::Display for DeltaAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeltaAction::Create => "create",
            DeltaAction::Update => "update",
            DeltaAction::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// A wire tag that is either one of ours or something a newer server sent.
///
/// Decoding never fails on an unrecognized tag; the dispatcher decides what to do.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Tag<T> {
    Known(T),
    Unrecognized(String),
}

impl<T> From<T> for Tag<T> {
    fn from(value: T) -> Self {
        Tag::Known(value)
    }
}

/// A single domain record.
///
/// Opaque beyond `id`: every other field is kept as-is so that records
/// round-trip to consumers unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainRecord {
    pub id: String,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl DomainRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style field setter, mostly for tests and fixtures.
    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Decode into one of the typed record views.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(serde_json::to_value(self)?)
    }
}

/// LiveDelta is the unit of state change transmitted over the live channel.
///
/// Wire shape:
/// `{"type":"weather","action":"create","data":{...},"timestamp":"<ISO-8601>"}`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LiveDelta {
    /// Target domain (wire field `type`)
    #[serde(rename = "type")]
    pub domain: Tag<Domain>,

    pub action: Tag<DeltaAction>,

    /// The record; for deletes only `id` is required
    pub data: DomainRecord,

    /// Sender-assigned emission time. Informational only, so a value that
    /// cannot be read is dropped rather than failing the delta.
    #[serde(
        rename = "timestamp",
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub emitted_at: Option<DateTime<Utc>>,
}

impl LiveDelta {
    pub fn new(domain: Domain, action: DeltaAction, data: DomainRecord) -> Self {
        Self {
            domain: Tag::Known(domain),
            action: Tag::Known(action),
            data,
            emitted_at: Some(Utc::now()),
        }
    }
}

/// Accepts RFC 3339, offset-less ISO-8601 (taken as UTC) and epoch
/// milliseconds. Anything else becomes `None`.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    let parsed = match &raw {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) => parse_timestamp_str(s),
        Some(Value::Number(n)) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
        Some(_) => None,
    };

    if parsed.is_none() {
        debug!(timestamp = ?raw, "Ignoring unreadable delta timestamp");
    }
    Ok(parsed)
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}
