//! GeoJSON feature collections for the anomaly source.
//!
//! Every zone becomes a point feature whose properties carry what the map
//! layers style on (`severity`, `color`) plus the full zone serialized as a
//! string under `zone`, which is how a clicked feature is turned back into a
//! [`Zone`].

use std::fmt;

use catalog::{City, Zone};
use foundation::geo::LngLat;
use serde::{Deserialize, Serialize};

/// Property key holding the serialized zone payload.
pub const ZONE_PROPERTY: &str = "zone";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        // Every field is a plain number, string or array; serialization cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct Feature {
    pub geometry: Geometry,
    pub properties: FeatureProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: LngLat },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureProperties {
    /// Severity normalized to `0.0..=1.0`.
    pub severity: f64,
    pub color: String,
    pub zone: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    MissingZonePayload,
    MalformedZonePayload(String),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::MissingZonePayload => write!(f, "feature has no zone payload"),
            FormatError::MalformedZonePayload(msg) => write!(f, "zone payload malformed: {msg}"),
        }
    }
}

impl std::error::Error for FormatError {}

/// Builds the anomaly feature collection for `city`.
///
/// Pure: the same city always yields a structurally identical collection,
/// in zone order.
pub fn build_feature_collection(city: &City) -> FeatureCollection {
    FeatureCollection {
        features: city.zones.iter().map(zone_feature).collect(),
    }
}

fn zone_feature(zone: &Zone) -> Feature {
    Feature {
        geometry: Geometry::Point {
            coordinates: zone.coords,
        },
        properties: FeatureProperties {
            severity: normalize_severity(zone.severity),
            color: zone.severity_class().hex().to_string(),
            zone: encode_zone(zone),
        },
    }
}

/// Maps a 0..=100 score onto 0..=1. Non-finite scores map to 0.
pub fn normalize_severity(score: f64) -> f64 {
    if !score.is_finite() {
        return 0.0;
    }
    (score / 100.0).clamp(0.0, 1.0)
}

fn encode_zone(zone: &Zone) -> String {
    serde_json::to_string(zone).unwrap_or_default()
}

/// Decodes the zone payload from a feature's property bag as reported by the
/// rendering engine (an arbitrary JSON object).
pub fn decode_zone_property(properties: &serde_json::Value) -> Result<Zone, FormatError> {
    let raw = properties
        .get(ZONE_PROPERTY)
        .and_then(serde_json::Value::as_str)
        .ok_or(FormatError::MissingZonePayload)?;
    serde_json::from_str(raw).map_err(|e| FormatError::MalformedZonePayload(e.to_string()))
}
