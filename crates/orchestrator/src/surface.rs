//! The rendering engine, seen from the orchestrator: an opaque map surface
//! that accepts a handful of mutation calls once its style has loaded.

use std::fmt;

use formats::FeatureCollection;
use foundation::geo::LngLat;
use layers::{Expression, FogSpec, LayerSpec};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Projection {
    #[default]
    Globe,
    Mercator,
}

/// Camera placement used when the surface is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Viewport {
    pub center: LngLat,
    pub zoom: f64,
    pub pitch: f64,
    pub bearing: f64,
    pub projection: Projection,
}

impl Default for Viewport {
    /// Whole-globe view centred on the Indian subcontinent.
    fn default() -> Self {
        Self {
            center: LngLat::new(78.9629, 20.5937),
            zoom: 2.0,
            pitch: 0.0,
            bearing: 0.0,
            projection: Projection::Globe,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlyToOptions {
    pub center: LngLat,
    pub zoom: f64,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub curve: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Run even when the user prefers reduced motion.
    pub essential: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Easing {
    Linear,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RotateOptions {
    pub duration_ms: u64,
    pub easing: Easing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// The surface was torn down or never created.
    Gone,
    MissingSource(String),
    MissingLayer(String),
    /// Anything the rendering engine itself reported.
    Engine(String),
}

impl fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceError::Gone => write!(f, "surface is not available"),
            SurfaceError::MissingSource(id) => write!(f, "source {id:?} does not exist"),
            SurfaceError::MissingLayer(id) => write!(f, "layer {id:?} does not exist"),
            SurfaceError::Engine(msg) => write!(f, "rendering engine error: {msg}"),
        }
    }
}

impl std::error::Error for SurfaceError {}

/// A live map instance.
///
/// Only [`crate::MapSurfaceController`] creates and destroys surfaces; every
/// other component reaches the surface through it.
pub trait Surface {
    fn add_source(&mut self, id: &str, data: &FeatureCollection) -> Result<(), SurfaceError>;
    /// Replaces the data of an existing GeoJSON source.
    fn set_source(&mut self, id: &str, data: &FeatureCollection) -> Result<(), SurfaceError>;
    fn add_layer(&mut self, spec: &LayerSpec) -> Result<(), SurfaceError>;
    fn has_layer(&self, id: &str) -> bool;
    fn set_paint(
        &mut self,
        layer_id: &str,
        property: &str,
        value: &Expression,
    ) -> Result<(), SurfaceError>;
    fn set_fog(&mut self, fog: &FogSpec) -> Result<(), SurfaceError>;
    fn fly_to(&mut self, options: &FlyToOptions) -> Result<(), SurfaceError>;
    fn rotate_to(&mut self, bearing_deg: f64, options: &RotateOptions) -> Result<(), SurfaceError>;
    fn bearing(&self) -> f64;
    fn zoom(&self) -> f64;
    /// True once the style and its assets finished loading.
    fn is_ready(&self) -> bool;
    /// Releases the instance. Must tolerate repeated calls.
    fn destroy(&mut self);
}

pub trait SurfaceFactory {
    type Surface: Surface;

    fn create_surface(
        &mut self,
        container: &str,
        style: &str,
        viewport: &Viewport,
    ) -> Result<Self::Surface, SurfaceError>;
}
