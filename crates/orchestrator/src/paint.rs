use layers::{ActiveLayerSet, LayerDirectory, LayerKind, heat_color_update};
use tracing::debug;

use crate::controller::MapSurfaceController;
use crate::surface::{Surface, SurfaceError};

/// Result of pushing the heat ramp. Misses are reported, never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaintOutcome {
    Applied(LayerKind),
    SurfaceNotReady,
    LayerMissing,
    Failed(SurfaceError),
}

/// Recolors the heat layer after the ramp of the first active data layer.
pub fn update_layer_paint<S: Surface>(
    active: &ActiveLayerSet,
    directory: &LayerDirectory,
    ctl: &mut MapSurfaceController<S>,
) -> PaintOutcome {
    if !ctl.is_ready() {
        return PaintOutcome::SurfaceNotReady;
    }
    let update = heat_color_update(active, directory);
    if !ctl.surface().is_some_and(|s| s.has_layer(update.layer_id)) {
        debug!(layer = update.layer_id, "paint skipped, layer not installed");
        return PaintOutcome::LayerMissing;
    }
    match ctl.with_surface(|s| s.set_paint(update.layer_id, update.property, &update.value)) {
        Ok(()) => PaintOutcome::Applied(update.source_layer),
        Err(err) => PaintOutcome::Failed(err),
    }
}
