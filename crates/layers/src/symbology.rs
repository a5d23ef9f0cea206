use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::expression::Expression;
use crate::layer::LayerKind;

/// One `(density stop, color)` pair of a heat color ramp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, String)", into = "(f64, String)")]
pub struct RampStop {
    /// Position on the density axis, `0.0..=1.0`.
    pub stop: f64,
    pub color: String,
}

impl RampStop {
    pub fn new(stop: f64, color: impl Into<String>) -> Self {
        Self {
            stop,
            color: color.into(),
        }
    }
}

impl From<(f64, String)> for RampStop {
    fn from((stop, color): (f64, String)) -> Self {
        Self { stop, color }
    }
}

impl From<RampStop> for (f64, String) {
    fn from(s: RampStop) -> Self {
        (s.stop, s.color)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorRamp {
    stops: Vec<RampStop>,
}

impl ColorRamp {
    /// Validates and sorts `stops` by position.
    pub fn new(stops: Vec<RampStop>) -> Result<Self, String> {
        if stops.is_empty() {
            return Err("color ramp has no stops".to_string());
        }
        if let Some(bad) = stops
            .iter()
            .find(|s| !s.stop.is_finite() || !(0.0..=1.0).contains(&s.stop))
        {
            return Err(format!("ramp stop {} outside 0..=1", bad.stop));
        }
        let mut stops = stops;
        stops.sort_by(|a, b| a.stop.total_cmp(&b.stop));
        if stops.windows(2).any(|w| w[0].stop == w[1].stop) {
            return Err("color ramp has duplicate stops".to_string());
        }
        Ok(Self { stops })
    }

    fn from_static(stops: &[(f64, &str)]) -> Self {
        Self {
            stops: stops.iter().map(|&(s, c)| RampStop::new(s, c)).collect(),
        }
    }

    pub fn stops(&self) -> &[RampStop] {
        &self.stops
    }

    /// `["interpolate", ["linear"], ["heatmap-density"], stop, color, ...]`
    pub fn heat_expression(&self) -> Expression {
        Expression::interpolate(
            Expression::HeatmapDensity,
            self.stops
                .iter()
                .map(|s| (s.stop, Expression::Text(s.color.clone())))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerConfig {
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub color_ramp_stops: ColorRamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerConfigError {
    Parse(String),
    MissingComposite,
    InvalidRamp { layer: LayerKind, reason: String },
}

impl std::fmt::Display for LayerConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayerConfigError::Parse(msg) => write!(f, "layer directory is not valid JSON: {msg}"),
            LayerConfigError::MissingComposite => {
                write!(f, "layer directory must define the \"all\" layer")
            }
            LayerConfigError::InvalidRamp { layer, reason } => {
                write!(f, "layer {layer} has an invalid color ramp: {reason}")
            }
        }
    }
}

impl std::error::Error for LayerConfigError {}

/// Per-layer configuration, always holding the composite ("all") entry so
/// ramp lookups cannot miss.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerDirectory {
    composite: LayerConfig,
    layers: BTreeMap<LayerKind, LayerConfig>,
}

impl Default for LayerDirectory {
    fn default() -> Self {
        Self::builtin()
    }
}

impl LayerDirectory {
    pub fn new(
        mut layers: BTreeMap<LayerKind, LayerConfig>,
    ) -> Result<Self, LayerConfigError> {
        for (kind, config) in layers.iter_mut() {
            let stops = std::mem::take(&mut config.color_ramp_stops).stops;
            config.color_ramp_stops =
                ColorRamp::new(stops).map_err(|reason| LayerConfigError::InvalidRamp {
                    layer: *kind,
                    reason,
                })?;
        }
        let composite = layers
            .remove(&LayerKind::All)
            .ok_or(LayerConfigError::MissingComposite)?;
        Ok(Self { composite, layers })
    }

    /// Parses `{ "<layer id>": { label, description, colorRampStops }, ... }`.
    pub fn from_json(raw: &str) -> Result<Self, LayerConfigError> {
        let layers: BTreeMap<LayerKind, LayerConfig> =
            serde_json::from_str(raw).map_err(|e| LayerConfigError::Parse(e.to_string()))?;
        Self::new(layers)
    }

    /// The dashboard's stock ramps.
    pub fn builtin() -> Self {
        let layer = |label: &str, description: &str, stops: &[(f64, &str)]| LayerConfig {
            label: label.to_string(),
            description: description.to_string(),
            color_ramp_stops: ColorRamp::from_static(stops),
        };

        let mut layers = BTreeMap::new();
        layers.insert(
            LayerKind::Air,
            layer(
                "Air",
                "AQI & particulate density",
                &[
                    (0.0, "rgba(0,0,0,0)"),
                    (0.15, "rgba(29,209,161,0.6)"),
                    (0.4, "rgba(255,211,42,0.75)"),
                    (0.7, "rgba(255,140,0,0.85)"),
                    (1.0, "rgba(255,59,59,0.95)"),
                ],
            ),
        );
        layers.insert(
            LayerKind::Water,
            layer(
                "Water",
                "Contamination risk index",
                &[
                    (0.0, "rgba(0,0,0,0)"),
                    (0.2, "rgba(0,119,182,0.55)"),
                    (0.5, "rgba(0,180,216,0.75)"),
                    (0.8, "rgba(72,202,228,0.85)"),
                    (1.0, "rgba(255,59,59,0.9)"),
                ],
            ),
        );
        layers.insert(
            LayerKind::Land,
            layer(
                "Land",
                "Degradation & soil stress",
                &[
                    (0.0, "rgba(0,0,0,0)"),
                    (0.2, "rgba(45,106,79,0.6)"),
                    (0.5, "rgba(116,198,157,0.75)"),
                    (0.8, "rgba(212,160,23,0.85)"),
                    (1.0, "rgba(196,18,31,0.95)"),
                ],
            ),
        );

        Self {
            composite: layer(
                "All Layers",
                "Composite anomaly index",
                &[
                    (0.0, "rgba(0,0,0,0)"),
                    (0.15, "rgba(29,209,161,0.6)"),
                    (0.35, "rgba(255,211,42,0.75)"),
                    (0.6, "rgba(255,140,0,0.85)"),
                    (0.85, "rgba(255,59,59,0.95)"),
                    (1.0, "rgba(255,255,255,0.9)"),
                ],
            ),
            layers,
        }
    }

    /// Config for `kind`, or the composite config when `kind` is not defined.
    pub fn get(&self, kind: LayerKind) -> &LayerConfig {
        if kind == LayerKind::All {
            return &self.composite;
        }
        self.layers.get(&kind).unwrap_or(&self.composite)
    }

    pub fn contains(&self, kind: LayerKind) -> bool {
        kind == LayerKind::All || self.layers.contains_key(&kind)
    }

    pub fn ramp(&self, kind: LayerKind) -> &ColorRamp {
        &self.get(kind).color_ramp_stops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builtin_covers_every_layer() {
        let dir = LayerDirectory::builtin();
        for kind in LayerKind::PRIORITY {
            assert!(dir.contains(kind), "{kind}");
        }
        assert_eq!(dir.ramp(LayerKind::All).stops().len(), 6);
        assert_eq!(dir.get(LayerKind::Water).label, "Water");
    }

    #[test]
    fn from_json_sorts_stops_and_falls_back_to_composite() {
        let dir = LayerDirectory::from_json(
            r#"{
                "all": { "label": "All", "colorRampStops": [[1.0, "white"], [0.0, "clear"]] },
                "air": { "label": "Air", "colorRampStops": [[0.0, "clear"], [1.0, "red"]] }
            }"#,
        )
        .unwrap();

        let stops: Vec<_> = dir
            .ramp(LayerKind::All)
            .stops()
            .iter()
            .map(|s| (s.stop, s.color.as_str()))
            .collect();
        assert_eq!(stops, vec![(0.0, "clear"), (1.0, "white")]);
        assert!(!dir.contains(LayerKind::Land));
        assert_eq!(dir.ramp(LayerKind::Land), dir.ramp(LayerKind::All));
    }

    #[test]
    fn rejects_directory_without_composite() {
        let err = LayerDirectory::from_json(
            r#"{ "air": { "label": "Air", "colorRampStops": [[0.0, "clear"]] } }"#,
        )
        .unwrap_err();
        assert_eq!(err, LayerConfigError::MissingComposite);
    }

    #[test]
    fn rejects_stops_outside_unit_range() {
        let err = LayerDirectory::from_json(
            r#"{ "all": { "label": "All", "colorRampStops": [[1.5, "red"]] } }"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            LayerConfigError::InvalidRamp {
                layer: LayerKind::All,
                ..
            }
        ));
    }

    #[test]
    fn heat_expression_lists_stops_in_order() {
        let ramp = ColorRamp::new(vec![
            RampStop::new(0.5, "mid"),
            RampStop::new(0.0, "lo"),
        ])
        .unwrap();
        assert_eq!(
            ramp.heat_expression().to_json(),
            serde_json::json!(["interpolate", ["linear"], ["heatmap-density"], 0.0, "lo", 0.5, "mid"])
        );
    }
}
