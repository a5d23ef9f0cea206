//! The map engine: one surface controller plus the components that drive it,
//! pumped by an explicit clock.
//!
//! Everything runs on the caller's thread. Time only moves inside
//! [`MapEngine::advance_to`], which fires due timers one at a time in
//! deadline order, so a session replays identically for the same inputs.

use std::fmt;

use catalog::{City, CityDirectory, CityId, Zone};
use formats::{FeatureCollection, build_feature_collection};
use foundation::time::Millis;
use layers::{
    ANOMALY_SOURCE_ID, ActiveLayerSet, FogSpec, LayerDirectory, LayerKind, circle_layer_spec,
    heat_color_update, heat_layer_spec,
};
use runtime::{EventBus, Fired};
use tracing::{debug, info, warn};

use crate::click::{ClickBridge, ClickOutcome, ClickedFeature, ZoneCallback};
use crate::config::EngineConfig;
use crate::controller::{MapState, MapSurfaceController, TimerKind};
use crate::focus::{CityFocusCoordinator, FocusOutcome, RetryOutcome, SessionPhase};
use crate::paint::{PaintOutcome, update_layer_paint};
use crate::spin::{SpinScheduler, SpinTick};
use crate::surface::{Surface, SurfaceError, SurfaceFactory};

/// Input reported by the rendering engine.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    /// Style and assets finished loading.
    Loaded,
    PointerDown,
    PointerUp,
    TouchStart,
    TouchEnd,
    DragEnd,
    Click {
        layer_id: String,
        features: Vec<ClickedFeature>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    UnknownCity(CityId),
    Surface(SurfaceError),
    /// The engine was torn down.
    Destroyed,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::UnknownCity(id) => write!(f, "unknown city {id:?}"),
            EngineError::Surface(err) => write!(f, "surface: {err}"),
            EngineError::Destroyed => write!(f, "map engine was torn down"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Surface(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SurfaceError> for EngineError {
    fn from(err: SurfaceError) -> Self {
        EngineError::Surface(err)
    }
}

pub type ReadyCallback = Box<dyn FnMut(Millis)>;

pub struct MapEngine<F: SurfaceFactory> {
    config: EngineConfig,
    factory: F,
    controller: MapSurfaceController<F::Surface>,
    spin: SpinScheduler,
    focus: CityFocusCoordinator,
    click: ClickBridge,
    cities: CityDirectory,
    layers: LayerDirectory,
    active: ActiveLayerSet,
    now: Millis,
    trace: EventBus,
    on_ready: Option<ReadyCallback>,
}

impl<F: SurfaceFactory> fmt::Debug for MapEngine<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapEngine")
            .field("now", &self.now)
            .field("state", &self.controller.state())
            .field("focus", &self.focus.state())
            .field("phase", &self.focus.phase())
            .field("active", &self.active)
            .finish()
    }
}

impl<F: SurfaceFactory> MapEngine<F> {
    pub fn new(
        config: EngineConfig,
        factory: F,
        cities: CityDirectory,
        layers: LayerDirectory,
    ) -> Self {
        Self {
            spin: SpinScheduler::new(config.spin.clone()),
            focus: CityFocusCoordinator::new(config.focus.clone()),
            click: ClickBridge::new(config.zone_focus.clone()),
            config,
            factory,
            controller: MapSurfaceController::new(),
            cities,
            layers,
            active: ActiveLayerSet::default(),
            now: Millis::ZERO,
            trace: EventBus::new(),
            on_ready: None,
        }
    }

    /// Creates the surface and, unless a city was already requested, arms
    /// the idle spin.
    ///
    /// `Ok(false)` when a surface already exists or the engine was torn down.
    pub fn mount(&mut self) -> Result<bool, EngineError> {
        let created = self
            .controller
            .initialize(&mut self.factory, &self.config.surface)?;
        if !created {
            return Ok(false);
        }
        self.trace.emit(self.now, "surface.created", self.config.surface.container.clone());
        if self.focus.phase() == SessionPhase::Exploring {
            self.spin.start(self.now, &mut self.controller);
        }
        // Some engines finish loading synchronously.
        self.observe_readiness(true);
        Ok(true)
    }

    pub fn now(&self) -> Millis {
        self.now
    }

    pub fn advance(&mut self, ms: u64) {
        self.advance_to(self.now + ms);
    }

    /// Fires every timer due at or before `until`, then parks the clock there.
    pub fn advance_to(&mut self, until: Millis) {
        while let Some(fired) = self.controller.pop_due(until) {
            self.now = self.now.max(fired.at);
            self.dispatch(fired);
        }
        self.now = self.now.max(until);
    }

    fn dispatch(&mut self, fired: Fired<TimerKind>) {
        match fired.payload {
            TimerKind::SpinTick => {
                let phase = self.focus.phase();
                let tick = self.spin.on_tick(phase, &mut self.controller);
                if let SpinTick::Rotated { bearing } = tick {
                    self.trace.emit(self.now, "spin.rotate", format!("{bearing:.2}"));
                }
            }
            TimerKind::FocusRetry => {
                // The poll doubles as the readiness observer. The tick below
                // consumes its attempt and applies, so no flush here.
                self.observe_readiness(false);
                let outcome = self.focus.on_retry_tick(self.now, fired.id, &mut self.controller);
                self.trace_retry(&outcome);
            }
            TimerKind::FlightComplete => {
                if self.focus.on_flight_complete(fired.id) {
                    let city = self.focus.target().map(|c| c.to_string()).unwrap_or_default();
                    self.trace.emit(self.now, "focus.settled", city);
                }
            }
        }
    }

    fn trace_retry(&mut self, outcome: &RetryOutcome) {
        match outcome {
            RetryOutcome::Waiting {
                attempt,
                max_attempts,
            } => self
                .trace
                .emit(self.now, "focus.retry", format!("{attempt}/{max_attempts}")),
            RetryOutcome::Applied { city, attempt } => self
                .trace
                .emit(self.now, "focus.applied", format!("{city} after {attempt}")),
            RetryOutcome::Abandoned { city, attempts } => self
                .trace
                .emit(self.now, "focus.abandoned", format!("{city} after {attempts}")),
            RetryOutcome::Stale => {}
        }
    }

    /// Reacts to the first observation of readiness: installs the scene and,
    /// when `flush_pending`, applies the parked focus request right away.
    fn observe_readiness(&mut self, flush_pending: bool) {
        if !self.controller.observe_readiness(self.now) {
            return;
        }
        self.trace.emit(self.now, "surface.ready", "");
        self.install_scene();
        if flush_pending
            && let Some(city) = self.focus.on_surface_ready(self.now, &mut self.controller)
        {
            self.trace.emit(self.now, "focus.applied", format!("{city} on ready"));
        }
        if let Some(callback) = self.on_ready.as_mut() {
            callback(self.now);
        }
    }

    fn install_scene(&mut self) {
        let initial = self
            .config
            .surface
            .initial_city
            .as_ref()
            .and_then(|id| self.cities.get(id))
            .map(build_feature_collection)
            .unwrap_or_else(FeatureCollection::empty);
        let fog = FogSpec::default();
        let heat = heat_layer_spec(heat_color_update(&self.active, &self.layers).value);
        let circles = circle_layer_spec();

        let ctl = &mut self.controller;
        let results = [
            ("fog", ctl.with_surface(|s| s.set_fog(&fog))),
            ("source", ctl.with_surface(|s| s.add_source(ANOMALY_SOURCE_ID, &initial))),
            ("heat layer", ctl.with_surface(|s| s.add_layer(&heat))),
            ("circle layer", ctl.with_surface(|s| s.add_layer(&circles))),
        ];
        for (step, result) in results {
            if let Err(err) = result {
                warn!(step, error = %err, "scene install step failed");
            }
        }
        info!(zones = initial.len(), "scene installed");
    }

    /// Feeds one rendering-engine event. Returns `false` if it was ignored
    /// because the engine stopped listening.
    pub fn handle_event(&mut self, event: SurfaceEvent) -> bool {
        if !self.controller.is_listening() {
            debug!(?event, "event after teardown ignored");
            return false;
        }
        match event {
            SurfaceEvent::Loaded => self.observe_readiness(true),
            SurfaceEvent::PointerDown | SurfaceEvent::TouchStart => self.spin.set_interacting(true),
            SurfaceEvent::PointerUp | SurfaceEvent::TouchEnd | SurfaceEvent::DragEnd => {
                self.spin.set_interacting(false)
            }
            SurfaceEvent::Click { layer_id, features } => {
                match self.click.on_click(&layer_id, &features, &mut self.controller) {
                    ClickOutcome::Selected(zone) => {
                        self.trace.emit(self.now, "zone.selected", zone.name)
                    }
                    ClickOutcome::Ignored(reason) => {
                        self.trace.emit(self.now, "zone.ignored", format!("{reason:?}"))
                    }
                }
            }
        }
        true
    }

    pub fn select_city(&mut self, id: &CityId) -> Result<FocusOutcome, EngineError> {
        let city = self
            .cities
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownCity(id.clone()))?;
        self.request_focus(city)
    }

    /// Focuses `city`; the latest request always wins.
    pub fn request_focus(&mut self, city: City) -> Result<FocusOutcome, EngineError> {
        if self.controller.state() == MapState::Destroyed {
            return Err(EngineError::Destroyed);
        }
        // A load that completed since the last poll counts, but a parked
        // request is about to be replaced and must not be flushed.
        self.observe_readiness(false);
        let outcome = self.focus.request_focus(self.now, city, &mut self.controller);
        self.spin.stop(&mut self.controller);

        let superseded = match &outcome {
            FocusOutcome::Flying { city, superseded } => {
                self.trace.emit(self.now, "focus.applied", city.to_string());
                superseded.clone()
            }
            FocusOutcome::Deferred { city, superseded } => {
                self.trace.emit(self.now, "focus.deferred", city.to_string());
                superseded.clone()
            }
        };
        if let Some(old) = superseded {
            self.trace.emit(self.now, "focus.superseded", old.to_string());
        }
        Ok(outcome)
    }

    pub fn set_active_layers(&mut self, active: ActiveLayerSet) -> PaintOutcome {
        self.active = active;
        self.repaint()
    }

    /// Flips one data layer. `None` if the toggle was refused because it
    /// would leave no layer active.
    pub fn toggle_layer(&mut self, kind: LayerKind) -> Option<PaintOutcome> {
        if !self.active.toggle(kind) {
            debug!(layer = %kind, "refusing to disable the last active layer");
            return None;
        }
        Some(self.repaint())
    }

    fn repaint(&mut self) -> PaintOutcome {
        let outcome = update_layer_paint(&self.active, &self.layers, &mut self.controller);
        match &outcome {
            PaintOutcome::Applied(kind) => self.trace.emit(self.now, "paint.applied", kind.as_str()),
            other => self.trace.emit(self.now, "paint.skipped", format!("{other:?}")),
        }
        outcome
    }

    pub fn on_zone_selected(&mut self, callback: impl FnMut(&Zone) + 'static) {
        let callback: ZoneCallback = Box::new(callback);
        self.click.set_callback(callback);
    }

    pub fn on_ready(&mut self, callback: impl FnMut(Millis) + 'static) {
        self.on_ready = Some(Box::new(callback));
    }

    /// Stops everything and releases the surface. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        self.focus.teardown(&mut self.controller);
        self.spin.on_teardown();
        if self.controller.teardown() {
            self.trace.emit(self.now, "surface.destroyed", "");
        }
    }

    pub fn is_ready(&self) -> bool {
        self.controller.is_ready()
    }

    pub fn state(&self) -> MapState {
        self.controller.state()
    }

    pub fn controller(&self) -> &MapSurfaceController<F::Surface> {
        &self.controller
    }

    pub fn focus(&self) -> &CityFocusCoordinator {
        &self.focus
    }

    pub fn spin(&self) -> &SpinScheduler {
        &self.spin
    }

    pub fn active_layers(&self) -> &ActiveLayerSet {
        &self.active
    }

    pub fn cities(&self) -> &CityDirectory {
        &self.cities
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn trace(&self) -> &EventBus {
        &self.trace
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::focus::FocusState;
    use crate::headless::{HeadlessFactory, HeadlessProbe, SurfaceCall};
    use catalog::SeverityClass;
    use foundation::geo::LngLat;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn zone(name: &str, severity: f64, lng: f64, lat: f64) -> Zone {
        Zone {
            name: name.to_string(),
            category: SeverityClass::from_score(severity),
            severity,
            air: severity,
            water: 30.0,
            land: 20.0,
            coords: LngLat::new(lng, lat),
        }
    }

    fn cities() -> CityDirectory {
        let mut dir = CityDirectory::new();
        dir.insert(City {
            id: CityId::new("mumbai"),
            label: "Mumbai".to_string(),
            center: LngLat::new(72.8777, 19.076),
            zoom: Some(10.5),
            zones: vec![zone("Mahul", 91.0, 72.89, 19.01), zone("Dharavi", 63.0, 72.85, 19.04)],
        })
        .unwrap();
        dir.insert(City {
            id: CityId::new("delhi"),
            label: "Delhi".to_string(),
            center: LngLat::new(77.209, 28.6139),
            zoom: None,
            zones: vec![zone("Okhla", 78.0, 77.27, 28.53)],
        })
        .unwrap();
        dir
    }

    fn engine() -> (HeadlessProbe, MapEngine<HeadlessFactory>) {
        let probe = HeadlessProbe::new();
        let engine = MapEngine::new(
            EngineConfig::default(),
            HeadlessFactory::new(probe.clone()),
            cities(),
            LayerDirectory::builtin(),
        );
        (probe, engine)
    }

    fn flights(probe: &HeadlessProbe) -> Vec<crate::surface::FlyToOptions> {
        probe
            .calls_named("fly_to")
            .into_iter()
            .filter_map(|c| match c {
                SurfaceCall::FlyTo(opts) => Some(opts),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn load_event_installs_scene_once() {
        let (probe, mut engine) = engine();
        let readies = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&readies);
        engine.on_ready(move |_| *counter.borrow_mut() += 1);

        assert_eq!(engine.mount(), Ok(true));
        assert_eq!(engine.mount(), Ok(false));
        assert!(!engine.is_ready());

        probe.set_ready(true);
        engine.handle_event(SurfaceEvent::Loaded);
        engine.handle_event(SurfaceEvent::Loaded);
        assert!(engine.is_ready());
        assert_eq!(*readies.borrow(), 1);

        let names: Vec<_> = probe.calls().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["create", "set_fog", "add_source", "add_layer", "add_layer"]);
        assert!(probe.has_layer("env-heat"));
        assert!(probe.has_layer("env-circles"));
        assert_eq!(engine.trace().count("surface.ready"), 1);
        assert_eq!(probe.count("create"), 1);
    }

    #[test]
    fn ready_on_fifth_poll_applies_city_once() {
        let (probe, mut engine) = engine();
        engine.mount().unwrap();
        let outcome = engine.select_city(&CityId::new("mumbai")).unwrap();
        assert!(matches!(outcome, FocusOutcome::Deferred { .. }));

        engine.advance_to(Millis(900));
        assert_eq!(engine.focus().pending_attempts(), Some(4));
        probe.set_ready(true);
        engine.advance_to(Millis(1000));

        assert_eq!(probe.count("set_source"), 1);
        let flown = flights(&probe);
        assert_eq!(flown.len(), 1);
        assert_eq!(flown[0].center, LngLat::new(72.8777, 19.076));
        assert_eq!(flown[0].zoom, 10.5);
        assert_eq!(engine.focus().state(), FocusState::Flying);

        engine.advance_to(Millis(10_000));
        assert_eq!(engine.focus().state(), FocusState::Idle);
        assert_eq!(probe.count("set_source"), 1);
        assert_eq!(engine.trace().count("focus.settled"), 1);
        assert_eq!(engine.controller().pending_timers(), 0);
    }

    #[test]
    fn only_last_premature_request_is_applied() {
        let (probe, mut engine) = engine();
        engine.mount().unwrap();
        engine.select_city(&CityId::new("mumbai")).unwrap();
        engine.advance(300);
        engine.select_city(&CityId::new("delhi")).unwrap();
        assert_eq!(engine.trace().count("focus.superseded"), 1);

        engine.advance(100);
        probe.set_ready(true);
        engine.handle_event(SurfaceEvent::Loaded);

        let flown = flights(&probe);
        assert_eq!(flown.len(), 1);
        assert_eq!(flown[0].center, LngLat::new(77.209, 28.6139));
        assert_eq!(flown[0].zoom, 11.0);
        engine.advance_to(Millis(20_000));
        assert_eq!(flights(&probe).len(), 1);
        assert_eq!(probe.count("set_source"), 1);
    }

    #[test]
    fn never_ready_goes_quiet_after_four_seconds() {
        let (probe, mut engine) = engine();
        engine.mount().unwrap();
        engine.select_city(&CityId::new("mumbai")).unwrap();

        engine.advance_to(Millis(3_999));
        assert_eq!(engine.focus().state(), FocusState::AwaitingReady);
        engine.advance_to(Millis(4_000));
        assert_eq!(engine.focus().state(), FocusState::Idle);
        assert_eq!(engine.trace().count("focus.retry"), 19);
        assert_eq!(engine.trace().count("focus.abandoned"), 1);
        assert_eq!(engine.controller().pending_timers(), 0);

        engine.advance_to(Millis(60_000));
        assert_eq!(probe.count("set_source") + probe.count("fly_to"), 0);
    }

    #[test]
    fn spin_stops_for_good_after_focus() {
        let (probe, mut engine) = engine();
        engine.mount().unwrap();
        probe.set_ready(true);
        engine.handle_event(SurfaceEvent::Loaded);

        engine.advance(500);
        assert_eq!(probe.count("rotate_to"), 5);

        engine.handle_event(SurfaceEvent::PointerDown);
        engine.advance(300);
        assert_eq!(probe.count("rotate_to"), 5);
        engine.handle_event(SurfaceEvent::DragEnd);
        engine.advance(100);
        assert_eq!(probe.count("rotate_to"), 6);

        engine.select_city(&CityId::new("delhi")).unwrap();
        assert_eq!(engine.focus().phase(), SessionPhase::Focused);
        assert!(!engine.spin().is_running());
        // Fly back out below the spin threshold: still no rotation.
        probe.set_zoom(2.0);
        engine.advance(5_000);
        assert_eq!(probe.count("rotate_to"), 6);
    }

    #[test]
    fn focus_flies_even_when_scene_install_failed() {
        let (probe, mut engine) = engine();
        engine.mount().unwrap();
        probe.set_ready(true);
        probe.fail_next_mutations(2);
        engine.handle_event(SurfaceEvent::Loaded);
        assert!(engine.is_ready());
        assert!(!probe.has_layer("env-heat"));

        let outcome = engine.select_city(&CityId::new("delhi")).unwrap();
        assert!(matches!(outcome, FocusOutcome::Flying { .. }));
        engine.advance_to(Millis(10_000));

        let flown = flights(&probe);
        assert_eq!(flown.len(), 1);
        assert_eq!(flown[0].center, LngLat::new(77.209, 28.6139));
        assert_eq!(engine.trace().count("focus.abandoned"), 0);
        assert_eq!(engine.trace().count("focus.settled"), 1);
    }

    #[test]
    fn focus_before_mount_never_spins() {
        let (probe, mut engine) = engine();
        engine.select_city(&CityId::new("mumbai")).unwrap();
        engine.mount().unwrap();
        assert!(!engine.spin().is_running());
        assert_eq!(engine.controller().pending_timers(), 1);

        engine.advance(150);
        probe.set_ready(true);
        engine.handle_event(SurfaceEvent::Loaded);
        engine.advance_to(Millis(5_000));
        assert_eq!(probe.count("rotate_to"), 0);
        assert_eq!(flights(&probe).len(), 1);
        assert_eq!(engine.trace().count("spin.rotate"), 0);
    }

    #[test]
    fn teardown_mid_retry_leaves_nothing_behind() {
        let (probe, mut engine) = engine();
        engine.mount().unwrap();
        engine.select_city(&CityId::new("mumbai")).unwrap();
        engine.advance(600);

        engine.teardown();
        engine.teardown();
        assert_eq!(engine.state(), MapState::Destroyed);
        assert_eq!(engine.controller().pending_timers(), 0);
        assert_eq!(engine.focus().pending_city(), None);

        probe.clear_calls();
        probe.set_ready(true);
        assert!(!engine.handle_event(SurfaceEvent::Loaded));
        engine.advance(10_000);
        assert!(probe.calls().is_empty());
        assert_eq!(
            engine.select_city(&CityId::new("delhi")),
            Err(EngineError::Destroyed)
        );
        assert_eq!(engine.mount(), Ok(false));
    }

    #[test]
    fn unknown_city_is_an_error() {
        let (_probe, mut engine) = engine();
        engine.mount().unwrap();
        assert_eq!(
            engine.select_city(&CityId::new("atlantis")),
            Err(EngineError::UnknownCity(CityId::new("atlantis")))
        );
        assert_eq!(engine.focus().phase(), SessionPhase::Exploring);
    }

    #[test]
    fn layer_toggles_repaint_heat_ramp() {
        let (probe, mut engine) = engine();
        assert_eq!(
            engine.toggle_layer(LayerKind::Water),
            Some(PaintOutcome::SurfaceNotReady)
        );
        engine.mount().unwrap();
        probe.set_ready(true);
        engine.handle_event(SurfaceEvent::Loaded);

        assert_eq!(
            engine.toggle_layer(LayerKind::Air),
            Some(PaintOutcome::Applied(LayerKind::Water))
        );
        assert_eq!(engine.toggle_layer(LayerKind::Water), None);
        assert_eq!(
            engine.set_active_layers(ActiveLayerSet::none()),
            PaintOutcome::Applied(LayerKind::All)
        );
        assert_eq!(probe.count("set_paint"), 2);
    }

    #[test]
    fn zone_click_leaves_focus_untouched() {
        let (probe, mut engine) = engine();
        let picked = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&picked);
        engine.on_zone_selected(move |z| *sink.borrow_mut() = Some(z.name.clone()));
        engine.mount().unwrap();
        engine.select_city(&CityId::new("mumbai")).unwrap();

        let fc = build_feature_collection(engine.cities().get(&CityId::new("mumbai")).unwrap());
        let features: Vec<_> = fc
            .features
            .iter()
            .map(|f| ClickedFeature {
                coordinates: match f.geometry {
                    formats::Geometry::Point { coordinates } => coordinates,
                },
                properties: serde_json::to_value(&f.properties).unwrap(),
            })
            .collect();
        engine.handle_event(SurfaceEvent::Click {
            layer_id: layers::CIRCLE_LAYER_ID.to_string(),
            features,
        });

        assert_eq!(picked.borrow().as_deref(), Some("Mahul"));
        let flown = flights(&probe);
        assert_eq!(flown.len(), 1);
        assert_eq!(flown[0].zoom, 12.5);
        assert_eq!(engine.focus().state(), FocusState::AwaitingReady);
        assert_eq!(engine.focus().pending_city(), Some(&CityId::new("mumbai")));
        assert_eq!(engine.focus().pending_attempts(), Some(0));
    }
}
