use std::collections::BTreeMap;

use foundation::geo::LngLat;
use serde::{Deserialize, Serialize};

/// Identifier of a city in the directory (`"mumbai"`, `"delhi"`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CityId(pub String);

impl CityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Severity band of an anomaly score.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityClass {
    Moderate,
    High,
    Severe,
    Critical,
}

impl SeverityClass {
    /// Thresholds: >=85 critical, >=70 severe, >=50 high, otherwise moderate.
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            SeverityClass::Critical
        } else if score >= 70.0 {
            SeverityClass::Severe
        } else if score >= 50.0 {
            SeverityClass::High
        } else {
            SeverityClass::Moderate
        }
    }

    pub fn hex(self) -> &'static str {
        match self {
            SeverityClass::Critical => "#ff3b3b",
            SeverityClass::Severe => "#ff8c00",
            SeverityClass::High => "#ffd32a",
            SeverityClass::Moderate => "#1dd1a1",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SeverityClass::Critical => "CRITICAL",
            SeverityClass::Severe => "SEVERE",
            SeverityClass::High => "HIGH",
            SeverityClass::Moderate => "MODERATE",
        }
    }
}

/// One monitored anomaly site inside a city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    #[serde(rename = "type")]
    pub category: SeverityClass,
    /// Composite anomaly score, 0..=100.
    pub severity: f64,
    pub air: f64,
    pub water: f64,
    pub land: f64,
    pub coords: LngLat,
}

impl Zone {
    pub fn severity_class(&self) -> SeverityClass {
        SeverityClass::from_score(self.severity)
    }

    /// Checks the score and coordinate invariants.
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("severity", self.severity),
            ("air", self.air),
            ("water", self.water),
            ("land", self.land),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(format!("{field} score {value} outside 0..=100"));
            }
        }
        if !self.coords.is_valid() {
            return Err(format!(
                "coords [{}, {}] are not a valid position",
                self.coords.lng, self.coords.lat
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    /// Filled from the directory key when omitted in the source document.
    #[serde(default)]
    pub id: CityId,
    pub label: String,
    pub center: LngLat,
    /// Preferred focus zoom; the engine applies its configured default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom: Option<f64>,
    pub zones: Vec<Zone>,
}

impl City {
    pub fn validate(&self) -> Result<(), CatalogError> {
        if !self.center.is_valid() {
            return Err(CatalogError::InvalidCity {
                city: self.id.clone(),
                reason: "center is not a valid position".to_string(),
            });
        }
        if let Some(zoom) = self.zoom
            && !(0.0..=24.0).contains(&zoom)
        {
            return Err(CatalogError::InvalidCity {
                city: self.id.clone(),
                reason: format!("zoom {zoom} outside 0..=24"),
            });
        }
        for zone in &self.zones {
            zone.validate().map_err(|reason| CatalogError::InvalidZone {
                city: self.id.clone(),
                zone: zone.name.clone(),
                reason,
            })?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    Parse(String),
    InvalidCity {
        city: CityId,
        reason: String,
    },
    InvalidZone {
        city: CityId,
        zone: String,
        reason: String,
    },
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::Parse(msg) => write!(f, "city directory is not valid JSON: {msg}"),
            CatalogError::InvalidCity { city, reason } => {
                write!(f, "city {city} rejected: {reason}")
            }
            CatalogError::InvalidZone { city, zone, reason } => {
                write!(f, "zone {zone:?} of city {city} rejected: {reason}")
            }
        }
    }
}

impl std::error::Error for CatalogError {}

/// Immutable directory of cities, keyed by id.
///
/// Backed by a `BTreeMap` so listing order is stable.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CityDirectory {
    cities: BTreeMap<CityId, City>,
}

impl CityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `{ "<id>": { label, center, zoom?, zones }, ... }`.
    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let parsed: BTreeMap<CityId, City> =
            serde_json::from_str(raw).map_err(|e| CatalogError::Parse(e.to_string()))?;

        let mut dir = Self::new();
        for (id, mut city) in parsed {
            city.id = id;
            dir.insert(city)?;
        }
        Ok(dir)
    }

    /// Adds or replaces a city after validating it.
    pub fn insert(&mut self, city: City) -> Result<(), CatalogError> {
        city.validate()?;
        self.cities.insert(city.id.clone(), city);
        Ok(())
    }

    pub fn get(&self, id: &CityId) -> Option<&City> {
        self.cities.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &CityId> {
        self.cities.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &City> {
        self.cities.values()
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }
}
