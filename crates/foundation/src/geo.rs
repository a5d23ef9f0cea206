use serde::{Deserialize, Serialize};

/// Longitude/latitude pair in degrees.
///
/// Serialized as a `[lng, lat]` array, the GeoJSON position order.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    pub fn as_array(self) -> [f64; 2] {
        [self.lng, self.lat]
    }

    pub fn is_valid(self) -> bool {
        self.lng.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lng)
            && (-90.0..=90.0).contains(&self.lat)
    }
}

impl From<[f64; 2]> for LngLat {
    fn from(v: [f64; 2]) -> Self {
        Self::new(v[0], v[1])
    }
}

impl From<LngLat> for [f64; 2] {
    fn from(p: LngLat) -> Self {
        p.as_array()
    }
}

/// Wraps a bearing in degrees into `(-180, 180]`.
pub fn wrap_bearing_deg(bearing: f64) -> f64 {
    if !bearing.is_finite() {
        return 0.0;
    }
    let wrapped = bearing.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}
