pub mod brightness;
pub mod clock;
pub mod config;
pub mod digits;
pub mod display;
pub mod error;
pub mod scheduler;
pub mod sync_gate;

#[cfg(test)]
mod testing;

pub use brightness::{AmbientSensor, BrightnessFilter, BrightnessMonitor, BrightnessState};
pub use clock::{LocalTime, SystemClock, WallClock};
pub use config::{
    BrightnessConfig, ClockConfig, DisplayHardwareConfig, NetworkConfig, RuntimeConfig,
};
pub use digits::{encode, SegmentFrame, TimeSample};
pub use display::{SegmentDisplay, SharedDisplay, MAX_BRIGHTNESS};
pub use error::{Error, Result};
pub use scheduler::{ClockScheduler, SchedulerConfig, SchedulerState};
pub use sync_gate::wait_until_synchronized;
