use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A toggleable data layer.
///
/// Declaration order is the selection priority: when several layers are
/// active the first one in this order drives the heat color ramp.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Air,
    Water,
    Land,
    /// Composite anomaly index; also the fallback ramp.
    All,
}

impl LayerKind {
    pub const PRIORITY: [LayerKind; 4] = [
        LayerKind::Air,
        LayerKind::Water,
        LayerKind::Land,
        LayerKind::All,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LayerKind::Air => "air",
            LayerKind::Water => "water",
            LayerKind::Land => "land",
            LayerKind::All => "all",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::PRIORITY.into_iter().find(|k| k.as_str() == s)
    }
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which data layers are switched on.
///
/// The UI keeps at least one layer on (see [`ActiveLayerSet::toggle`]), but
/// consumers must still cope with an all-off set built through
/// [`ActiveLayerSet::set`] or deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActiveLayerSet(BTreeMap<LayerKind, bool>);

impl Default for ActiveLayerSet {
    /// Air only, the dashboard's opening state.
    fn default() -> Self {
        Self::only(LayerKind::Air)
    }
}

impl ActiveLayerSet {
    pub fn only(kind: LayerKind) -> Self {
        Self(
            LayerKind::PRIORITY
                .into_iter()
                .map(|k| (k, k == kind))
                .collect(),
        )
    }

    pub fn none() -> Self {
        Self(LayerKind::PRIORITY.into_iter().map(|k| (k, false)).collect())
    }

    pub fn is_active(&self, kind: LayerKind) -> bool {
        self.0.get(&kind).copied().unwrap_or(false)
    }

    pub fn any_active(&self) -> bool {
        self.0.values().any(|on| *on)
    }

    /// Active layers in priority order.
    pub fn active(&self) -> impl Iterator<Item = LayerKind> + '_ {
        LayerKind::PRIORITY
            .into_iter()
            .filter(|k| self.is_active(*k))
    }

    /// Sets a layer without enforcing the at-least-one rule.
    pub fn set(&mut self, kind: LayerKind, on: bool) {
        self.0.insert(kind, on);
    }

    /// Flips `kind`, refusing to switch off the last active layer.
    ///
    /// Returns `true` if the set changed.
    pub fn toggle(&mut self, kind: LayerKind) -> bool {
        let next = !self.is_active(kind);
        if !next && self.active().all(|k| k == kind) {
            return false;
        }
        self.0.insert(kind, next);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{ActiveLayerSet, LayerKind};

    #[test]
    fn default_is_air_only() {
        let set = ActiveLayerSet::default();
        assert_eq!(set.active().collect::<Vec<_>>(), vec![LayerKind::Air]);
    }

    #[test]
    fn toggle_keeps_one_layer_on() {
        let mut set = ActiveLayerSet::default();
        assert!(!set.toggle(LayerKind::Air));
        assert!(set.is_active(LayerKind::Air));

        assert!(set.toggle(LayerKind::Land));
        assert!(set.toggle(LayerKind::Air));
        assert_eq!(set.active().collect::<Vec<_>>(), vec![LayerKind::Land]);
    }

    #[test]
    fn active_iterates_in_priority_order() {
        let mut set = ActiveLayerSet::none();
        set.set(LayerKind::All, true);
        set.set(LayerKind::Water, true);
        assert_eq!(
            set.active().collect::<Vec<_>>(),
            vec![LayerKind::Water, LayerKind::All]
        );
    }

    #[test]
    fn deserializes_from_id_map() {
        let set: ActiveLayerSet =
            serde_json::from_str(r#"{"air":false,"water":true,"land":false,"all":false}"#).unwrap();
        assert!(set.is_active(LayerKind::Water));
        assert!(!set.is_active(LayerKind::Air));
        assert_eq!(LayerKind::parse("land"), Some(LayerKind::Land));
        assert_eq!(LayerKind::parse("soil"), None);
    }
}
