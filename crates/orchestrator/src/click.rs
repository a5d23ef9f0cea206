use catalog::Zone;
use formats::{FormatError, decode_zone_property};
use foundation::geo::LngLat;
use layers::CIRCLE_LAYER_ID;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::ZoneFocusConfig;
use crate::controller::MapSurfaceController;
use crate::surface::{FlyToOptions, Surface};

/// A rendered feature under the pointer, as the rendering engine reports it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClickedFeature {
    pub coordinates: LngLat,
    /// Property bag; values may arrive as strings regardless of their
    /// original type.
    #[serde(default)]
    pub properties: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    OtherLayer,
    NoFeature,
    Payload(FormatError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    Selected(Zone),
    Ignored(IgnoreReason),
}

pub type ZoneCallback = Box<dyn FnMut(&Zone)>;

/// Turns a click on a zone marker into a selection and a short close-up
/// flight. Leaves city focus state alone.
pub struct ClickBridge {
    config: ZoneFocusConfig,
    on_zone: Option<ZoneCallback>,
}

impl std::fmt::Debug for ClickBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClickBridge")
            .field("config", &self.config)
            .field("has_callback", &self.on_zone.is_some())
            .finish()
    }
}

impl ClickBridge {
    pub fn new(config: ZoneFocusConfig) -> Self {
        Self {
            config,
            on_zone: None,
        }
    }

    pub fn set_callback(&mut self, callback: ZoneCallback) {
        self.on_zone = Some(callback);
    }

    pub fn on_click<S: Surface>(
        &mut self,
        layer_id: &str,
        features: &[ClickedFeature],
        ctl: &mut MapSurfaceController<S>,
    ) -> ClickOutcome {
        if layer_id != CIRCLE_LAYER_ID {
            return ClickOutcome::Ignored(IgnoreReason::OtherLayer);
        }
        let Some(feature) = features.first() else {
            return ClickOutcome::Ignored(IgnoreReason::NoFeature);
        };
        let zone = match decode_zone_property(&feature.properties) {
            Ok(zone) => zone,
            Err(err) => {
                warn!(error = %err, "ignoring click on zone with unreadable payload");
                return ClickOutcome::Ignored(IgnoreReason::Payload(err));
            }
        };

        if let Some(callback) = self.on_zone.as_mut() {
            callback(&zone);
        }

        let options = FlyToOptions {
            center: feature.coordinates,
            zoom: self.config.zoom,
            duration_ms: self.config.duration_ms,
            curve: None,
            speed: None,
            essential: true,
        };
        if let Err(err) = ctl.with_surface(|s| s.fly_to(&options)) {
            debug!(zone = %zone.name, error = %err, "zone close-up not flown");
        }
        ClickOutcome::Selected(zone)
    }
}
