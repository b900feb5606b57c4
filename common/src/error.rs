use thiserror::Error;

use crate::brightness::MAX_RAW_SAMPLE;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("wall clock read failed: {0}")]
    Clock(String),
    #[error("display write failed: {0}")]
    Display(String),
    #[error("ambient sensor read failed: {0}")]
    Sensor(String),
    #[error("ambient sample {0} out of range (max {max})", max = MAX_RAW_SAMPLE)]
    SampleOutOfRange(u16),
    #[error("unknown timezone `{0}`")]
    UnknownTimezone(String),
    #[error("invalid time of day {hour:02}:{minute:02}:{second:02}")]
    InvalidTime { hour: u8, minute: u8, second: u8 },
}
