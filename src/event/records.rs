//! Typed views over domain records.
//!
//! The stores never look past `id`; these exist for consumers that want
//! the fields the upstream feeds publish.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

/// Map viewport used to scope bulk fetches
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherRecord {
    pub id: String,
    pub location: Location,
    pub temperature: f64,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub wind_speed: Option<f64>,
    #[serde(default)]
    pub wind_direction: Option<f64>,
    #[serde(default)]
    pub pressure: Option<f64>,
    #[serde(default)]
    pub visibility: Option<f64>,
    #[serde(default)]
    pub conditions: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// bom | metservice | user | sensor
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FireRecord {
    pub id: String,
    pub location: Location,
    /// low | moderate | high | extreme
    pub severity: String,
    /// Burnt area in hectares
    #[serde(default)]
    pub size: Option<f64>,
    /// active | contained | controlled | out
    pub status: String,
    #[serde(default)]
    pub description: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloodRecord {
    pub id: String,
    pub location: Location,
    /// minor | moderate | major | extreme
    pub severity: String,
    #[serde(default)]
    pub water_level: Option<f64>,
    /// rising | falling | stable
    #[serde(default)]
    pub trend: Option<String>,
    #[serde(default)]
    pub description: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub affected_areas: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficRecord {
    pub id: String,
    pub location: Location,
    pub road_name: String,
    /// accident | roadwork | congestion | closure
    pub incident_type: String,
    pub severity: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub estimated_clear_time: Option<DateTime<Utc>>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserReportRecord {
    pub id: String,
    pub user_id: String,
    pub location: Location,
    /// weather | fire | flood | traffic | other
    #[serde(rename = "type")]
    pub report_type: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub severity: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub verified: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub votes: i64,
}
