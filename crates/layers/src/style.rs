//! Map-side style objects installed once the surface is ready: the anomaly
//! source, the heat and circle layers drawn from it, and the atmosphere.

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::expression::Expression;

pub const ANOMALY_SOURCE_ID: &str = "env-anomalies";
pub const HEAT_LAYER_ID: &str = "env-heat";
pub const CIRCLE_LAYER_ID: &str = "env-circles";
pub const HEAT_COLOR_PROPERTY: &str = "heatmap-color";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerType {
    Heatmap,
    Circle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    pub id: &'static str,
    pub layer_type: LayerType,
    pub source: &'static str,
    pub min_zoom: Option<f64>,
    pub max_zoom: Option<f64>,
    pub paint: Vec<(&'static str, Expression)>,
}

impl LayerSpec {
    pub fn paint_value(&self, property: &str) -> Option<&Expression> {
        self.paint
            .iter()
            .find(|(p, _)| *p == property)
            .map(|(_, v)| v)
    }

    pub fn to_json(&self) -> Value {
        let mut paint = Map::new();
        for (property, value) in &self.paint {
            paint.insert((*property).to_string(), value.to_json());
        }
        let mut out = json!({
            "id": self.id,
            "type": self.layer_type,
            "source": self.source,
            "paint": paint,
        });
        if let Some(min) = self.min_zoom {
            out["minzoom"] = json!(min);
        }
        if let Some(max) = self.max_zoom {
            out["maxzoom"] = json!(max);
        }
        out
    }
}

/// Heat-intensity layer; `color` is the ramp for the current layer selection.
pub fn heat_layer_spec(color: Expression) -> LayerSpec {
    LayerSpec {
        id: HEAT_LAYER_ID,
        layer_type: LayerType::Heatmap,
        source: ANOMALY_SOURCE_ID,
        min_zoom: None,
        max_zoom: Some(18.0),
        paint: vec![
            (
                "heatmap-weight",
                Expression::interpolate_numbers(Expression::get("severity"), &[(0.0, 0.0), (1.0, 1.0)]),
            ),
            (
                "heatmap-intensity",
                Expression::interpolate_numbers(Expression::Zoom, &[(4.0, 0.7), (12.0, 2.4)]),
            ),
            (
                "heatmap-radius",
                Expression::interpolate_numbers(Expression::Zoom, &[(4.0, 26.0), (12.0, 72.0)]),
            ),
            (
                "heatmap-opacity",
                Expression::interpolate_numbers(Expression::Zoom, &[(7.0, 0.9), (16.0, 0.45)]),
            ),
            (HEAT_COLOR_PROPERTY, color),
        ],
    }
}

/// Clickable per-zone markers, shown from zoom 8.
pub fn circle_layer_spec() -> LayerSpec {
    LayerSpec {
        id: CIRCLE_LAYER_ID,
        layer_type: LayerType::Circle,
        source: ANOMALY_SOURCE_ID,
        min_zoom: Some(8.0),
        max_zoom: None,
        paint: vec![
            (
                "circle-radius",
                Expression::interpolate_numbers(Expression::Zoom, &[(8.0, 5.0), (14.0, 18.0)]),
            ),
            ("circle-color", Expression::get("color")),
            ("circle-opacity", Expression::Number(0.25)),
            ("circle-stroke-width", Expression::Number(1.3)),
            ("circle-stroke-color", Expression::get("color")),
            ("circle-stroke-opacity", Expression::Number(0.9)),
            ("circle-blur", Expression::Number(0.3)),
        ],
    }
}

/// Atmospheric glow and star field behind the globe.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct FogSpec {
    pub color: String,
    pub high_color: String,
    pub horizon_blend: f64,
    pub space_color: String,
    pub star_intensity: f64,
}

impl Default for FogSpec {
    fn default() -> Self {
        Self {
            color: "rgb(100, 175, 240)".to_string(),
            high_color: "rgb(20, 80, 180)".to_string(),
            horizon_blend: 0.06,
            space_color: "rgb(5, 5, 18)".to_string(),
            star_intensity: 0.9,
        }
    }
}
