pub mod budget;
pub mod event_bus;
pub mod register;
pub mod signal;
pub mod timer;

pub use budget::*;
pub use event_bus::*;
pub use register::*;
pub use signal::*;
pub use timer::*;
