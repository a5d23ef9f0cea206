use foundation::geo::wrap_bearing_deg;
use foundation::time::Millis;
use runtime::TimerId;
use tracing::debug;

use crate::config::SpinConfig;
use crate::controller::{MapSurfaceController, TimerKind};
use crate::focus::SessionPhase;
use crate::surface::{Easing, RotateOptions, Surface, SurfaceError};

/// Why a spin tick left the camera alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpinSkip {
    /// The session left the exploring phase; the timer was cancelled.
    Disabled,
    Interacting,
    NotLive,
    ZoomedIn,
    MutationFailed(SurfaceError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpinTick {
    Rotated { bearing: f64 },
    Skipped(SpinSkip),
}

/// Idle rotation of the globe while the user is exploring.
#[derive(Debug, Clone)]
pub struct SpinScheduler {
    config: SpinConfig,
    timer: Option<TimerId>,
    interacting: bool,
}

impl SpinScheduler {
    pub fn new(config: SpinConfig) -> Self {
        Self {
            config,
            timer: None,
            interacting: false,
        }
    }

    /// Arms the periodic tick. Returns `false` if already running or the
    /// controller refused the timer.
    pub fn start<S: Surface>(&mut self, now: Millis, ctl: &mut MapSurfaceController<S>) -> bool {
        if self.timer.is_some() {
            return false;
        }
        self.timer = ctl.schedule_every(now, self.config.tick_interval_ms, TimerKind::SpinTick);
        self.timer.is_some()
    }

    pub fn stop<S: Surface>(&mut self, ctl: &mut MapSurfaceController<S>) -> bool {
        match self.timer.take() {
            Some(id) => {
                debug!("spin stopped");
                ctl.cancel_timer(id)
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    pub fn set_interacting(&mut self, interacting: bool) {
        self.interacting = interacting;
    }

    pub fn is_interacting(&self) -> bool {
        self.interacting
    }

    pub fn on_tick<S: Surface>(
        &mut self,
        phase: SessionPhase,
        ctl: &mut MapSurfaceController<S>,
    ) -> SpinTick {
        if phase == SessionPhase::Focused {
            self.stop(ctl);
            return SpinTick::Skipped(SpinSkip::Disabled);
        }
        if self.interacting {
            return SpinTick::Skipped(SpinSkip::Interacting);
        }
        let Some(surface) = ctl.surface() else {
            return SpinTick::Skipped(SpinSkip::NotLive);
        };
        if surface.zoom() >= self.config.max_zoom {
            return SpinTick::Skipped(SpinSkip::ZoomedIn);
        }

        let bearing = wrap_bearing_deg(surface.bearing() - self.config.bearing_step_deg);
        let options = RotateOptions {
            duration_ms: self.config.tick_interval_ms,
            easing: Easing::Linear,
        };
        match ctl.with_surface(|s| s.rotate_to(bearing, &options)) {
            Ok(()) => SpinTick::Rotated { bearing },
            Err(err) => {
                debug!(error = %err, "spin rotation rejected");
                SpinTick::Skipped(SpinSkip::MutationFailed(err))
            }
        }
    }

    /// Forgets the timer; the controller cancels it during its own teardown.
    pub fn on_teardown(&mut self) {
        self.timer = None;
        self.interacting = false;
    }
}
