use foundation::time::Millis;
use runtime::{Fired, OnceSignal, TimerId, TimerQueue};
use tracing::{debug, info};

use crate::config::SurfaceConfig;
use crate::surface::{Surface, SurfaceError, SurfaceFactory};

/// Lifecycle of the map surface.
///
/// Moves forward only; [`MapSurfaceController::teardown`] jumps to
/// `Destroyed` from anywhere and nothing leaves `Destroyed`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapState {
    Uninitialized,
    Loading,
    Ready,
    Destroyed,
}

/// Which engine component a timer belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TimerKind {
    SpinTick,
    FocusRetry,
    FlightComplete,
}

/// Sole owner of the surface and of every timer scheduled against it.
///
/// Other components borrow the surface through [`Self::with_surface`] for the
/// length of one mutation and never keep it.
#[derive(Debug)]
pub struct MapSurfaceController<S> {
    state: MapState,
    surface: Option<S>,
    timers: TimerQueue<TimerKind>,
    ready: OnceSignal,
    listening: bool,
}

impl<S: Surface> Default for MapSurfaceController<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Surface> MapSurfaceController<S> {
    pub fn new() -> Self {
        Self {
            state: MapState::Uninitialized,
            surface: None,
            timers: TimerQueue::new(),
            ready: OnceSignal::new(),
            listening: false,
        }
    }

    /// Creates the surface and starts listening to its events.
    ///
    /// Returns `Ok(false)` without touching anything when a surface already
    /// exists or the controller was torn down.
    pub fn initialize<F>(
        &mut self,
        factory: &mut F,
        config: &SurfaceConfig,
    ) -> Result<bool, SurfaceError>
    where
        F: SurfaceFactory<Surface = S>,
    {
        if self.surface.is_some() || self.state != MapState::Uninitialized {
            debug!(state = ?self.state, "initialize ignored");
            return Ok(false);
        }

        let surface = factory.create_surface(&config.container, &config.style, &config.viewport)?;
        self.surface = Some(surface);
        self.state = MapState::Loading;
        self.listening = true;
        info!(container = %config.container, style = %config.style, "map surface created");
        Ok(true)
    }

    pub fn state(&self) -> MapState {
        self.state
    }

    /// A surface exists and has not been torn down.
    pub fn is_live(&self) -> bool {
        self.surface.is_some() && self.state != MapState::Destroyed
    }

    /// Safe to mutate: readiness was observed and the surface still says so.
    pub fn is_ready(&self) -> bool {
        self.state == MapState::Ready && self.surface.as_ref().is_some_and(|s| s.is_ready())
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn ready_at(&self) -> Option<Millis> {
        self.ready.fired_at()
    }

    /// Promotes `Loading` to `Ready` if the surface reports it finished loading.
    ///
    /// Returns `true` only for the single call that fired the readiness
    /// notification; the caller reacts to it (scene install, pending flush).
    pub fn observe_readiness(&mut self, now: Millis) -> bool {
        if self.state != MapState::Loading {
            return false;
        }
        if !self.surface.as_ref().is_some_and(|s| s.is_ready()) {
            return false;
        }
        self.state = MapState::Ready;
        let fired = self.ready.fire(now);
        if fired {
            info!(at = %now, "map surface ready");
        }
        fired
    }

    pub fn surface(&self) -> Option<&S> {
        if self.state == MapState::Destroyed {
            return None;
        }
        self.surface.as_ref()
    }

    /// Runs one mutation against the live surface.
    pub fn with_surface<R>(
        &mut self,
        f: impl FnOnce(&mut S) -> Result<R, SurfaceError>,
    ) -> Result<R, SurfaceError> {
        if self.state == MapState::Destroyed {
            return Err(SurfaceError::Gone);
        }
        match self.surface.as_mut() {
            Some(surface) => f(surface),
            None => Err(SurfaceError::Gone),
        }
    }

    /// Schedules a periodic timer. Refused (`None`) after teardown.
    pub fn schedule_every(
        &mut self,
        now: Millis,
        period_ms: u64,
        kind: TimerKind,
    ) -> Option<TimerId> {
        if self.state == MapState::Destroyed {
            return None;
        }
        Some(self.timers.schedule_every(now, period_ms, kind))
    }

    /// Schedules a one-shot timer. Refused (`None`) after teardown.
    pub fn schedule_once(
        &mut self,
        now: Millis,
        delay_ms: u64,
        kind: TimerKind,
    ) -> Option<TimerId> {
        if self.state == MapState::Destroyed {
            return None;
        }
        Some(self.timers.schedule_once(now, delay_ms, kind))
    }

    pub fn cancel_timer(&mut self, id: TimerId) -> bool {
        self.timers.cancel(id)
    }

    pub fn is_timer_scheduled(&self, id: TimerId) -> bool {
        self.timers.is_scheduled(id)
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn next_deadline(&self) -> Option<Millis> {
        self.timers.next_deadline()
    }

    pub fn pop_due(&mut self, now: Millis) -> Option<Fired<TimerKind>> {
        self.timers.pop_due(now)
    }

    /// Cancels every timer, stops listening, releases the surface.
    ///
    /// Idempotent and infallible; valid in any state. Returns `false` if the
    /// controller was already torn down.
    pub fn teardown(&mut self) -> bool {
        if self.state == MapState::Destroyed {
            return false;
        }
        let cancelled = self.timers.clear();
        self.listening = false;
        if let Some(mut surface) = self.surface.take() {
            surface.destroy();
        }
        self.state = MapState::Destroyed;
        info!(cancelled_timers = cancelled, "map surface torn down");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessFactory, HeadlessProbe, HeadlessSurface};

    fn controller() -> (HeadlessProbe, HeadlessFactory, MapSurfaceController<HeadlessSurface>) {
        let probe = HeadlessProbe::new();
        let factory = HeadlessFactory::new(probe.clone());
        (probe, factory, MapSurfaceController::new())
    }

    #[test]
    fn initialize_is_idempotent() {
        let (probe, mut factory, mut ctl) = controller();
        let config = SurfaceConfig::default();
        assert_eq!(ctl.initialize(&mut factory, &config), Ok(true));
        assert_eq!(ctl.initialize(&mut factory, &config), Ok(false));
        assert_eq!(probe.count("create"), 1);
        assert_eq!(ctl.state(), MapState::Loading);
        assert!(ctl.is_listening());
    }

    #[test]
    fn factory_failure_leaves_controller_uninitialized() {
        let (probe, mut factory, mut ctl) = controller();
        probe.fail_next_create();
        assert!(ctl.initialize(&mut factory, &SurfaceConfig::default()).is_err());
        assert_eq!(ctl.state(), MapState::Uninitialized);
        assert_eq!(ctl.initialize(&mut factory, &SurfaceConfig::default()), Ok(true));
    }

    #[test]
    fn readiness_fires_once() {
        let (probe, mut factory, mut ctl) = controller();
        ctl.initialize(&mut factory, &SurfaceConfig::default()).unwrap();
        assert!(!ctl.observe_readiness(Millis(100)));
        assert!(!ctl.is_ready());

        probe.set_ready(true);
        assert!(ctl.observe_readiness(Millis(300)));
        assert!(!ctl.observe_readiness(Millis(400)));
        assert!(ctl.is_ready());
        assert_eq!(ctl.state(), MapState::Ready);
        assert_eq!(ctl.ready_at(), Some(Millis(300)));
    }

    #[test]
    fn teardown_cancels_timers_and_is_terminal() {
        let (probe, mut factory, mut ctl) = controller();
        let config = SurfaceConfig::default();
        ctl.initialize(&mut factory, &config).unwrap();
        ctl.schedule_every(Millis(0), 100, TimerKind::SpinTick).unwrap();
        ctl.schedule_once(Millis(0), 50, TimerKind::FlightComplete).unwrap();

        assert!(ctl.teardown());
        assert!(!ctl.teardown());
        assert_eq!(ctl.pending_timers(), 0);
        assert!(ctl.pop_due(Millis(10_000)).is_none());
        assert!(!ctl.is_listening());
        assert!(probe.is_destroyed());
        assert_eq!(probe.count("destroy"), 1);

        assert_eq!(ctl.initialize(&mut factory, &config), Ok(false));
        assert_eq!(ctl.schedule_once(Millis(0), 10, TimerKind::FocusRetry), None);
        assert_eq!(ctl.with_surface(|_| Ok(())), Err(SurfaceError::Gone));
        assert!(!ctl.observe_readiness(Millis(1)));
    }

    #[test]
    fn teardown_before_initialize_is_safe() {
        let (probe, mut factory, mut ctl) = controller();
        assert!(ctl.teardown());
        assert_eq!(ctl.state(), MapState::Destroyed);
        assert_eq!(ctl.initialize(&mut factory, &SurfaceConfig::default()), Ok(false));
        assert!(probe.calls().is_empty());
    }
}
