use crate::expression::Expression;
use crate::layer::{ActiveLayerSet, LayerKind};
use crate::symbology::LayerDirectory;
use crate::style::{HEAT_COLOR_PROPERTY, HEAT_LAYER_ID};

/// A paint property assignment to push to the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct PaintUpdate {
    /// Data layer whose ramp was selected.
    pub source_layer: LayerKind,
    pub layer_id: &'static str,
    pub property: &'static str,
    pub value: Expression,
}

/// First active layer in priority order; the composite layer when none is on.
pub fn primary_layer(active: &ActiveLayerSet) -> LayerKind {
    active.active().next().unwrap_or(LayerKind::All)
}

/// Heat color ramp for the current layer selection. Never fails: unknown or
/// missing selections resolve to the composite ramp.
pub fn heat_color_update(active: &ActiveLayerSet, directory: &LayerDirectory) -> PaintUpdate {
    let source_layer = primary_layer(active);
    PaintUpdate {
        source_layer,
        layer_id: HEAT_LAYER_ID,
        property: HEAT_COLOR_PROPERTY,
        value: directory.ramp(source_layer).heat_expression(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_first_active_layer_by_priority() {
        let mut active = ActiveLayerSet::none();
        active.set(LayerKind::Land, true);
        active.set(LayerKind::Water, true);
        assert_eq!(primary_layer(&active), LayerKind::Water);
    }

    #[test]
    fn all_off_falls_back_to_composite_ramp() {
        let dir = LayerDirectory::builtin();
        let a = heat_color_update(&ActiveLayerSet::none(), &dir);
        let b = heat_color_update(&ActiveLayerSet::none(), &dir);
        assert_eq!(a.source_layer, LayerKind::All);
        assert_eq!(a.value, dir.ramp(LayerKind::All).heat_expression());
        assert_eq!(a, b);
    }

    #[test]
    fn targets_heat_layer_color() {
        let update = heat_color_update(&ActiveLayerSet::default(), &LayerDirectory::builtin());
        assert_eq!(update.layer_id, "env-heat");
        assert_eq!(update.property, "heatmap-color");
        assert_eq!(update.source_layer, LayerKind::Air);
        let json = update.value.to_json();
        assert_eq!(json[2], serde_json::json!(["heatmap-density"]));
        assert_eq!(json[4], serde_json::json!("rgba(0,0,0,0)"));
    }
}
