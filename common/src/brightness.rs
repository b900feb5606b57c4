use core::{cmp::Ordering, fmt};
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::{
    display::{SegmentDisplay, SharedDisplay, MAX_BRIGHTNESS},
    error::{Error, Result},
    scheduler::sleep_until,
};

pub const MAX_RAW_SAMPLE: u16 = 1023;
pub const RAW_PER_LEVEL: u16 = 128;
pub const HYSTERESIS_RAW: u16 = RAW_PER_LEVEL / 4;
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(200);

pub trait AmbientSensor {
    type Error: fmt::Display;

    fn read_raw(&mut self) -> core::result::Result<u16, Self::Error>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrightnessState {
    last: Option<(u16, u8)>,
}

impl BrightnessState {
    pub fn last_value(&self) -> Option<u16> {
        self.last.map(|(raw, _)| raw)
    }

    pub fn last_level(&self) -> Option<u8> {
        self.last.map(|(_, level)| level)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BrightnessFilter {
    state: BrightnessState,
}

impl BrightnessFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BrightnessState {
        self.state
    }

    pub fn update(&mut self, raw: u16) -> Result<u8> {
        if raw > MAX_RAW_SAMPLE {
            return Err(Error::SampleOutOfRange(raw));
        }

        let level = match self.state.last {
            None => quantize(raw),
            Some((last_raw, last_level)) => match raw.cmp(&last_raw) {
                Ordering::Less => quantize(raw + HYSTERESIS_RAW).min(last_level),
                Ordering::Greater => quantize(raw.saturating_sub(HYSTERESIS_RAW)).max(last_level),
                // Equal samples hold the previous level.
                Ordering::Equal => last_level,
            },
        };

        self.state.last = Some((raw, level));
        Ok(level)
    }
}

/// Advances the cadence by one interval; once behind, restarts it from `now`.
pub fn next_sample_deadline(previous: Instant, now: Instant, interval: Duration) -> Instant {
    (previous + interval).max(now)
}

fn quantize(raw: u16) -> u8 {
    (raw / RAW_PER_LEVEL).min(u16::from(MAX_BRIGHTNESS)) as u8
}

pub struct BrightnessMonitor<S, D> {
    sensor: S,
    filter: BrightnessFilter,
    display: SharedDisplay<D>,
    interval: Duration,
}

impl<S: AmbientSensor, D: SegmentDisplay> BrightnessMonitor<S, D> {
    pub fn new(sensor: S, display: SharedDisplay<D>, interval: Duration) -> Self {
        Self {
            sensor,
            filter: BrightnessFilter::new(),
            display,
            interval,
        }
    }

    pub fn filter(&self) -> &BrightnessFilter {
        &self.filter
    }

    pub fn sample(&mut self) -> Result<u8> {
        let raw = self
            .sensor
            .read_raw()
            .map_err(|err| Error::Sensor(err.to_string()))?;
        let level = self.filter.update(raw)?;

        let changed = {
            let mut display = self.display.lock();
            let changed = display.brightness() != Some(level);
            if changed {
                display.set_brightness(level)?;
            }
            changed
        };

        if changed {
            info!(
                "ambient light {:.3} (raw={raw}), brightness={level}",
                f32::from(raw) / f32::from(MAX_RAW_SAMPLE)
            );
        }

        Ok(level)
    }

    pub fn run(mut self) -> ! {
        let mut next = Instant::now();

        loop {
            if let Err(err) = self.sample() {
                warn!("brightness cycle skipped: {err}");
            }

            next = next_sample_deadline(next, Instant::now(), self.interval);
            sleep_until(next);
        }
    }
}
