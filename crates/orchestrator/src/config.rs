//! Engine tuning. Every number here is a product choice tuned for visual
//! feel; the defaults reproduce the shipped dashboard.

use std::fmt;

use catalog::CityId;
use serde::{Deserialize, Serialize};

use crate::surface::Viewport;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub surface: SurfaceConfig,
    pub spin: SpinConfig,
    pub focus: FocusConfig,
    pub zone_focus: ZoneFocusConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    /// Host element the surface renders into.
    pub container: String,
    pub style: String,
    pub viewport: Viewport,
    /// City whose zones seed the anomaly source when the surface loads.
    pub initial_city: Option<CityId>,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            container: "map".to_string(),
            style: "mapbox://styles/mapbox/satellite-streets-v12".to_string(),
            viewport: Viewport::default(),
            initial_city: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpinConfig {
    pub tick_interval_ms: u64,
    /// Degrees subtracted from the bearing on every tick.
    pub bearing_step_deg: f64,
    /// Spin only while zoomed out further than this.
    pub max_zoom: f64,
}

impl Default for SpinConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            bearing_step_deg: 0.15,
            max_zoom: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusConfig {
    pub retry_interval_ms: u64,
    pub max_attempts: u32,
    /// Used for cities without their own zoom.
    pub default_zoom: f64,
    pub duration_ms: u64,
    pub curve: f64,
    pub speed: f64,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: 200,
            max_attempts: 20,
            default_zoom: 11.0,
            duration_ms: 2200,
            curve: 1.8,
            speed: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneFocusConfig {
    pub zoom: f64,
    pub duration_ms: u64,
}

impl Default for ZoneFocusConfig {
    fn default() -> Self {
        Self {
            zoom: 12.5,
            duration_ms: 900,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Parse(String),
    Invalid { field: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse(msg) => write!(f, "engine config is not valid JSON: {msg}"),
            ConfigError::Invalid { field, reason } => write!(f, "{field}: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl EngineConfig {
    /// Parses and validates a JSON document; absent fields keep their defaults.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig =
            serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> Result<(), ConfigError> {
            Err(ConfigError::Invalid {
                field,
                reason: reason.into(),
            })
        }

        if self.surface.container.trim().is_empty() {
            return invalid("surface.container", "must not be empty");
        }
        if !self.surface.viewport.center.is_valid() {
            return invalid("surface.viewport.center", "not a valid position");
        }
        if self.spin.tick_interval_ms == 0 {
            return invalid("spin.tick_interval_ms", "must be positive");
        }
        if !self.spin.bearing_step_deg.is_finite() {
            return invalid("spin.bearing_step_deg", "must be finite");
        }
        if self.focus.retry_interval_ms == 0 {
            return invalid("focus.retry_interval_ms", "must be positive");
        }
        if self.focus.max_attempts == 0 {
            return invalid("focus.max_attempts", "must allow at least one attempt");
        }
        for (field, zoom) in [
            ("focus.default_zoom", self.focus.default_zoom),
            ("zone_focus.zoom", self.zone_focus.zoom),
            ("spin.max_zoom", self.spin.max_zoom),
        ] {
            if !(0.0..=24.0).contains(&zoom) {
                return invalid(field, format!("zoom {zoom} outside 0..=24"));
            }
        }
        if self.focus.curve <= 0.0 || self.focus.speed <= 0.0 {
            return invalid("focus", "curve and speed must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_dashboard_tuning() {
        let c = EngineConfig::default();
        assert_eq!(c.spin.tick_interval_ms, 100);
        assert_eq!(c.spin.bearing_step_deg, 0.15);
        assert_eq!(c.spin.max_zoom, 5.0);
        assert_eq!(c.focus.retry_interval_ms, 200);
        assert_eq!(c.focus.max_attempts, 20);
        assert_eq!(c.focus.duration_ms, 2200);
        assert_eq!(c.zone_focus.duration_ms, 900);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let c = EngineConfig::from_json(
            r#"{ "focus": { "max_attempts": 5 }, "surface": { "initial_city": "mumbai" } }"#,
        )
        .unwrap();
        assert_eq!(c.focus.max_attempts, 5);
        assert_eq!(c.focus.retry_interval_ms, 200);
        assert_eq!(c.surface.initial_city, Some(CityId::new("mumbai")));
        assert_eq!(c.surface.viewport.zoom, 2.0);
    }

    #[test]
    fn rejects_zero_attempts() {
        let err = EngineConfig::from_json(r#"{ "focus": { "max_attempts": 0 } }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "focus.max_attempts",
                ..
            }
        ));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            EngineConfig::from_json("[1, 2"),
            Err(ConfigError::Parse(_))
        ));
    }
}
