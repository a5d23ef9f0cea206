//! Orchestrates a globe map surface for the anomaly dashboard: idle spin,
//! city focus that waits (boundedly) for the surface to load, heat-ramp
//! repaints and zone clicks.

pub mod click;
pub mod config;
pub mod controller;
pub mod engine;
pub mod focus;
pub mod headless;
pub mod paint;
pub mod spin;
pub mod surface;

pub use click::{ClickBridge, ClickOutcome, ClickedFeature, IgnoreReason};
pub use config::{ConfigError, EngineConfig, FocusConfig, SpinConfig, SurfaceConfig, ZoneFocusConfig};
pub use controller::{MapState, MapSurfaceController, TimerKind};
pub use engine::{EngineError, MapEngine, SurfaceEvent};
pub use focus::{CityFocusCoordinator, FocusOutcome, FocusState, RetryOutcome, SessionPhase};
pub use headless::{HeadlessFactory, HeadlessProbe, HeadlessSurface, SurfaceCall};
pub use paint::{PaintOutcome, update_layer_paint};
pub use spin::{SpinScheduler, SpinSkip, SpinTick};
pub use surface::{
    Easing, FlyToOptions, Projection, RotateOptions, Surface, SurfaceError, SurfaceFactory,
    Viewport,
};
