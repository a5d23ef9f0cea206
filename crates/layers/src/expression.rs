use serde::{Serialize, Serializer};
use serde_json::{Value, json};

/// The subset of the rendering engine's style-expression language the
/// dashboard emits.
///
/// Serializes to the engine's array form, e.g.
/// `["interpolate", ["linear"], ["heatmap-density"], 0, "rgba(0,0,0,0)", ...]`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Number(f64),
    Text(String),
    /// `["get", key]`: a feature property.
    Get(String),
    /// `["zoom"]`
    Zoom,
    /// `["heatmap-density"]`
    HeatmapDensity,
    /// Piecewise-linear interpolation of `input` over ascending stops.
    Interpolate {
        input: Box<Expression>,
        stops: Vec<(f64, Expression)>,
    },
}

impl Expression {
    pub fn get(key: impl Into<String>) -> Self {
        Expression::Get(key.into())
    }

    pub fn interpolate(input: Expression, stops: Vec<(f64, Expression)>) -> Self {
        Expression::Interpolate {
            input: Box::new(input),
            stops,
        }
    }

    /// Shorthand for numeric stop tables such as `zoom 4 -> 0.7, zoom 12 -> 2.4`.
    pub fn interpolate_numbers(input: Expression, stops: &[(f64, f64)]) -> Self {
        Self::interpolate(
            input,
            stops
                .iter()
                .map(|&(stop, v)| (stop, Expression::Number(v)))
                .collect(),
        )
    }

    pub fn to_json(&self) -> Value {
        match self {
            Expression::Number(n) => json!(n),
            Expression::Text(s) => json!(s),
            Expression::Get(key) => json!(["get", key]),
            Expression::Zoom => json!(["zoom"]),
            Expression::HeatmapDensity => json!(["heatmap-density"]),
            Expression::Interpolate { input, stops } => {
                let mut out = vec![json!("interpolate"), json!(["linear"]), input.to_json()];
                for (stop, value) in stops {
                    out.push(json!(stop));
                    out.push(value.to_json());
                }
                Value::Array(out)
            }
        }
    }
}

impl From<f64> for Expression {
    fn from(n: f64) -> Self {
        Expression::Number(n)
    }
}

impl From<&str> for Expression {
    fn from(s: &str) -> Self {
        Expression::Text(s.to_string())
    }
}

impl Serialize for Expression {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
