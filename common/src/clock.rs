use core::fmt;

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::{
    digits::TimeSample,
    error::{Error, Result},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTime {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// Offset into the current second, `0..=999_999`.
    pub micros: u32,
}

impl LocalTime {
    pub fn from_datetime<Z: TimeZone>(datetime: &DateTime<Z>) -> Self {
        // A leap second reports nanoseconds past 1e9; pin it to the end of the second.
        let micros = (datetime.nanosecond() / 1_000).min(999_999);

        Self {
            year: datetime.year(),
            month: datetime.month() as u8,
            day: datetime.day() as u8,
            hour: datetime.hour() as u8,
            minute: datetime.minute() as u8,
            second: datetime.second() as u8,
            micros,
        }
    }

    pub fn sample(&self) -> Result<TimeSample> {
        TimeSample::new(self.hour, self.minute, self.second)
    }
}

impl fmt::Display for LocalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:06}",
            self.year, self.month, self.day, self.hour, self.minute, self.second, self.micros
        )
    }
}

pub trait WallClock {
    fn now(&self) -> Result<LocalTime>;
}

impl<C: WallClock + ?Sized> WallClock for &C {
    fn now(&self) -> Result<LocalTime> {
        (**self).now()
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| Error::UnknownTimezone(name.to_string()))
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    timezone: Tz,
}

impl SystemClock {
    pub fn new(timezone: &str) -> Result<Self> {
        Ok(Self {
            timezone: parse_timezone(timezone)?,
        })
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }
}

impl WallClock for SystemClock {
    fn now(&self) -> Result<LocalTime> {
        let local = Utc::now().with_timezone(&self.timezone);
        Ok(LocalTime::from_datetime(&local))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn converts_utc_into_configured_zone() {
        let tz = parse_timezone("Europe/Amsterdam").unwrap();
        let utc = NaiveDate::from_ymd_opt(2026, 1, 15)
            .unwrap()
            .and_hms_micro_opt(22, 30, 5, 250_000)
            .unwrap()
            .and_utc();

        let local = LocalTime::from_datetime(&utc.with_timezone(&tz));

        assert_eq!(
            local,
            LocalTime {
                year: 2026,
                month: 1,
                day: 15,
                hour: 23,
                minute: 30,
                second: 5,
                micros: 250_000,
            }
        );
        assert_eq!(local.to_string(), "2026-01-15 23:30:05.250000");
    }

    #[test]
    fn rejects_unknown_timezone() {
        assert_eq!(
            SystemClock::new("Mars/Olympus_Mons").unwrap_err(),
            Error::UnknownTimezone("Mars/Olympus_Mons".to_string())
        );
    }

    #[test]
    fn system_clock_reads_plausible_time() {
        let clock = SystemClock::new("UTC").unwrap();
        let now = clock.now().unwrap();

        assert!(now.micros < 1_000_000);
        assert!(now.sample().is_ok());
    }
}
