//! City focus with a bounded wait for surface readiness.
//!
//! A request that arrives before the surface can take mutations is parked in
//! a single last-write-wins slot and polled every `retry_interval_ms` for at
//! most `max_attempts` ticks. A newer request replaces the parked one and
//! restarts the budget; an exhausted budget drops the request without error.

use catalog::{City, CityId};
use formats::build_feature_collection;
use foundation::time::Millis;
use runtime::{LatestRegister, RetryBudget, TimerId};
use tracing::{debug, info, warn};

use crate::config::FocusConfig;
use crate::controller::{MapSurfaceController, TimerKind};
use crate::surface::{FlyToOptions, Surface, SurfaceError};
use layers::ANOMALY_SOURCE_ID;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FocusState {
    Idle,
    AwaitingReady,
    Flying,
}

/// Exploring until the first focus request, Focused forever after.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Exploring,
    Focused,
}

#[derive(Debug, Clone)]
struct PendingFocus {
    city: City,
    budget: RetryBudget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusOutcome {
    /// Applied immediately.
    Flying {
        city: CityId,
        superseded: Option<CityId>,
    },
    /// Parked until the surface is ready.
    Deferred {
        city: CityId,
        superseded: Option<CityId>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    Waiting { attempt: u32, max_attempts: u32 },
    Applied { city: CityId, attempt: u32 },
    Abandoned { city: CityId, attempts: u32 },
    /// The tick belongs to a poll that was already cancelled or replaced.
    Stale,
}

#[derive(Debug)]
pub struct CityFocusCoordinator {
    config: FocusConfig,
    state: FocusState,
    phase: SessionPhase,
    pending: LatestRegister<PendingFocus>,
    retry_timer: Option<TimerId>,
    flight_timer: Option<TimerId>,
    target: Option<CityId>,
}

impl CityFocusCoordinator {
    pub fn new(config: FocusConfig) -> Self {
        Self {
            config,
            state: FocusState::Idle,
            phase: SessionPhase::Exploring,
            pending: LatestRegister::new(),
            retry_timer: None,
            flight_timer: None,
            target: None,
        }
    }

    pub fn state(&self) -> FocusState {
        self.state
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn pending_city(&self) -> Option<&CityId> {
        self.pending.get().map(|p| &p.city.id)
    }

    pub fn pending_attempts(&self) -> Option<u32> {
        self.pending.get().map(|p| p.budget.attempts())
    }

    /// City of the flight in progress, or of the last one that landed.
    pub fn target(&self) -> Option<&CityId> {
        self.target.as_ref()
    }

    pub fn request_focus<S: Surface>(
        &mut self,
        now: Millis,
        city: City,
        ctl: &mut MapSurfaceController<S>,
    ) -> FocusOutcome {
        self.phase = SessionPhase::Focused;
        self.cancel_timers(ctl);

        if ctl.is_ready() {
            match Self::apply(&self.config, &city, ctl) {
                Ok(()) => {
                    let superseded = self.pending.take().map(|p| p.city.id);
                    let id = city.id.clone();
                    self.start_flight(now, id.clone(), ctl);
                    info!(city = %id, "focus applied");
                    return FocusOutcome::Flying { city: id, superseded };
                }
                Err(err) => {
                    debug!(city = %city.id, error = %err, "immediate focus failed, deferring")
                }
            }
        }

        let id = city.id.clone();
        let budget = RetryBudget::new(self.config.max_attempts);
        let superseded = self
            .pending
            .replace(PendingFocus { city, budget })
            .map(|p| p.city.id);
        self.state = FocusState::AwaitingReady;
        self.retry_timer =
            ctl.schedule_every(now, self.config.retry_interval_ms, TimerKind::FocusRetry);
        debug!(city = %id, superseded = ?superseded, "focus deferred");
        FocusOutcome::Deferred { city: id, superseded }
    }

    /// One poll of the retry timer: consumes an attempt, applies the parked
    /// request if the surface takes it, abandons it once the budget is spent.
    pub fn on_retry_tick<S: Surface>(
        &mut self,
        now: Millis,
        timer: TimerId,
        ctl: &mut MapSurfaceController<S>,
    ) -> RetryOutcome {
        if self.retry_timer != Some(timer) {
            return RetryOutcome::Stale;
        }

        let (applied, attempt, max_attempts) = {
            let Some(pending) = self.pending.get_mut() else {
                self.cancel_retry(ctl);
                return RetryOutcome::Stale;
            };
            pending.budget.try_consume();
            let applied = ctl.is_ready() && Self::apply(&self.config, &pending.city, ctl).is_ok();
            (applied, pending.budget.attempts(), pending.budget.max_attempts())
        };

        if applied {
            self.cancel_retry(ctl);
            let Some(pending) = self.pending.take() else {
                return RetryOutcome::Stale;
            };
            let city = pending.city.id;
            self.start_flight(now, city.clone(), ctl);
            info!(city = %city, attempt, "focus applied after retry");
            return RetryOutcome::Applied { city, attempt };
        }

        if attempt >= max_attempts {
            self.cancel_retry(ctl);
            self.state = FocusState::Idle;
            let city = match self.pending.take() {
                Some(pending) => pending.city.id,
                None => return RetryOutcome::Stale,
            };
            debug!(city = %city, attempts = attempt, "surface never became ready, focus abandoned");
            return RetryOutcome::Abandoned {
                city,
                attempts: attempt,
            };
        }

        RetryOutcome::Waiting {
            attempt,
            max_attempts,
        }
    }

    /// Flushes the parked request as soon as readiness is announced.
    ///
    /// On failure the request stays parked and the poll keeps running.
    pub fn on_surface_ready<S: Surface>(
        &mut self,
        now: Millis,
        ctl: &mut MapSurfaceController<S>,
    ) -> Option<CityId> {
        let pending = self.pending.get()?;
        if let Err(err) = Self::apply(&self.config, &pending.city, ctl) {
            debug!(city = %pending.city.id, error = %err, "flush on ready failed, still polling");
            return None;
        }
        let city = self.pending.take()?.city.id;
        self.cancel_retry(ctl);
        self.start_flight(now, city.clone(), ctl);
        info!(city = %city, "focus applied on ready");
        Some(city)
    }

    /// Returns `true` if `timer` was the current flight's completion.
    pub fn on_flight_complete(&mut self, timer: TimerId) -> bool {
        if self.flight_timer != Some(timer) {
            return false;
        }
        self.flight_timer = None;
        if self.state == FocusState::Flying {
            self.state = FocusState::Idle;
        }
        true
    }

    pub fn teardown<S: Surface>(&mut self, ctl: &mut MapSurfaceController<S>) {
        self.cancel_timers(ctl);
        self.pending.take();
        self.state = FocusState::Idle;
    }

    /// Starts the flight, then pushes the city's zones into the anomaly source.
    ///
    /// Only the flight decides success. A rejected flight leaves the surface
    /// untouched; a source that cannot take the data (never installed, or
    /// rejected) is logged and the flight stands.
    pub fn apply<S: Surface>(
        config: &FocusConfig,
        city: &City,
        ctl: &mut MapSurfaceController<S>,
    ) -> Result<(), SurfaceError> {
        let data = build_feature_collection(city);
        let options = FlyToOptions {
            center: city.center,
            zoom: city.zoom.unwrap_or(config.default_zoom),
            duration_ms: config.duration_ms,
            curve: Some(config.curve),
            speed: Some(config.speed),
            essential: true,
        };
        ctl.with_surface(|s| {
            s.fly_to(&options)?;
            match s.set_source(ANOMALY_SOURCE_ID, &data) {
                Ok(()) => {}
                Err(SurfaceError::MissingSource(id)) => {
                    debug!(city = %city.id, source = %id, "no anomaly source, zones not shown")
                }
                Err(err) => warn!(city = %city.id, error = %err, "anomaly data update failed"),
            }
            Ok(())
        })
    }

    fn start_flight<S: Surface>(
        &mut self,
        now: Millis,
        city: CityId,
        ctl: &mut MapSurfaceController<S>,
    ) {
        self.state = FocusState::Flying;
        self.target = Some(city);
        self.flight_timer =
            ctl.schedule_once(now, self.config.duration_ms, TimerKind::FlightComplete);
    }

    fn cancel_retry<S: Surface>(&mut self, ctl: &mut MapSurfaceController<S>) {
        if let Some(id) = self.retry_timer.take() {
            ctl.cancel_timer(id);
        }
    }

    fn cancel_timers<S: Surface>(&mut self, ctl: &mut MapSurfaceController<S>) {
        self.cancel_retry(ctl);
        if let Some(id) = self.flight_timer.take() {
            ctl.cancel_timer(id);
        }
    }
}
