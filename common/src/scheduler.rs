use std::{
    thread,
    time::{Duration, Instant},
};

use log::{debug, info, warn};

use crate::{
    clock::{LocalTime, WallClock},
    config::ClockConfig,
    digits::{encode, SegmentFrame, TimeSample},
    display::{SegmentDisplay, SharedDisplay, MAX_BRIGHTNESS},
    error::Result,
    sync_gate::{wait_until_synchronized, SYNC_POLL_INTERVAL},
};

pub const MICROS_PER_SECOND: u32 = 1_000_000;
pub const DEFAULT_TICK: Duration = Duration::from_millis(10);
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Delay from `micros` into the current second until the next boundary,
/// rounded down to whole ticks plus one tick so the wake never lands early.
pub fn delay_until_next_second(micros: u32, tick: Duration) -> Duration {
    let tick_us = u64::try_from(tick.as_micros()).unwrap_or(u64::MAX).max(1);
    let remaining_us = u64::from(MICROS_PER_SECOND - micros.min(MICROS_PER_SECOND - 1));
    let ticks = remaining_us / tick_us + 1;

    Duration::from_micros(ticks.saturating_mul(tick_us))
}

/// A failed refresh is retried after `RETRY_DELAY` with a fresh clock read.
pub fn next_refresh_deadline(started: Instant, outcome: &Result<Refresh>) -> Instant {
    match outcome {
        Ok(refresh) => started + refresh.delay,
        Err(_) => started + RETRY_DELAY,
    }
}

pub fn sleep_until(deadline: Instant) {
    let now = Instant::now();
    if deadline > now {
        thread::sleep(deadline - now);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Initializing,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub tick: Duration,
    pub sync_poll_interval: Duration,
    pub initial_brightness: u8,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            sync_poll_interval: SYNC_POLL_INTERVAL,
            initial_brightness: MAX_BRIGHTNESS,
        }
    }
}

impl From<&ClockConfig> for SchedulerConfig {
    fn from(config: &ClockConfig) -> Self {
        Self {
            tick: Duration::from_millis(config.tick_ms),
            sync_poll_interval: Duration::from_millis(config.sync_poll_interval_ms),
            initial_brightness: config.initial_brightness,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Refresh {
    pub time: TimeSample,
    pub frame: SegmentFrame,
    pub delay: Duration,
}

pub struct ClockScheduler<C, D> {
    clock: C,
    display: SharedDisplay<D>,
    config: SchedulerConfig,
    state: SchedulerState,
}

impl<C: WallClock, D: SegmentDisplay> ClockScheduler<C, D> {
    pub fn new(clock: C, display: SharedDisplay<D>, config: SchedulerConfig) -> Self {
        Self {
            clock,
            display,
            config,
            state: SchedulerState::Initializing,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn initialize(&mut self) -> Result<LocalTime> {
        {
            let mut display = self.display.lock();
            display.set_brightness(self.config.initial_brightness)?;
            display.light_all_segments()?;
        }

        let synchronized = wait_until_synchronized(&self.clock, self.config.sync_poll_interval);
        info!("clock synchronized at {synchronized}, starting time display");

        self.state = SchedulerState::Running;
        Ok(synchronized)
    }

    pub fn refresh(&mut self) -> Result<Refresh> {
        let (now, time, frame) = {
            let mut display = self.display.lock();
            let now = self.clock.now()?;
            let time = now.sample()?;
            let frame = encode(time);
            display.write_frame(frame)?;
            (now, time, frame)
        };

        Ok(Refresh {
            time,
            frame,
            delay: delay_until_next_second(now.micros, self.config.tick),
        })
    }

    pub fn run(mut self) -> Result<()> {
        if self.state == SchedulerState::Initializing {
            self.initialize()?;
        }

        loop {
            let started = Instant::now();
            let outcome = self.refresh();
            match &outcome {
                Ok(refresh) => debug!(
                    "showing {} for {}, next refresh in {}us",
                    refresh.frame,
                    refresh.time,
                    refresh.delay.as_micros()
                ),
                Err(err) => warn!("display refresh failed: {err}"),
            }
            sleep_until(next_refresh_deadline(started, &outcome));
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        digits::{ALL_SEGMENTS, COLON_MASK, DIGIT_PATTERNS},
        error::Error,
        testing::{local_time, DisplayOp, FakeClock, RecordingDisplay},
    };

    fn config(tick: Duration) -> SchedulerConfig {
        SchedulerConfig {
            tick,
            sync_poll_interval: Duration::ZERO,
            initial_brightness: MAX_BRIGHTNESS,
        }
    }

    #[test]
    fn delay_near_rollover_is_a_single_tick() {
        assert_eq!(
            delay_until_next_second(999_900, Duration::from_millis(1)),
            Duration::from_millis(1)
        );
        assert_eq!(
            delay_until_next_second(999_900, DEFAULT_TICK),
            DEFAULT_TICK
        );
    }

    #[test]
    fn delay_lands_after_the_boundary() {
        let tick = Duration::from_millis(10);

        for micros in (0..MICROS_PER_SECOND).step_by(7_919) {
            let delay = delay_until_next_second(micros, tick);
            let remaining = Duration::from_micros(u64::from(MICROS_PER_SECOND - micros));

            assert!(delay >= remaining, "micros={micros}");
            assert!(delay <= remaining + tick, "micros={micros}");
        }
    }

    #[test]
    fn delay_from_start_of_second() {
        assert_eq!(
            delay_until_next_second(0, Duration::from_millis(10)),
            Duration::from_millis(1_010)
        );
        assert_eq!(
            delay_until_next_second(250_000, Duration::from_millis(10)),
            Duration::from_millis(760)
        );
    }

    #[test]
    fn delay_tolerates_out_of_range_offset() {
        assert_eq!(
            delay_until_next_second(5_000_000, Duration::from_millis(1)),
            Duration::from_millis(1)
        );
        assert_eq!(
            delay_until_next_second(0, Duration::ZERO),
            Duration::from_micros(1_000_001)
        );
    }

    #[test]
    fn initialization_lights_display_and_waits_for_sync() {
        let clock = FakeClock::new([
            Ok(local_time(1970, 0, 0, 3, 0)),
            Err(Error::Clock("rtc busy".to_string())),
            Ok(local_time(2026, 8, 15, 0, 0)),
        ]);
        let (driver, ops) = RecordingDisplay::new();
        let mut scheduler =
            ClockScheduler::new(&clock, SharedDisplay::new(driver), config(DEFAULT_TICK));

        assert_eq!(scheduler.state(), SchedulerState::Initializing);

        let synchronized = scheduler.initialize().unwrap();

        assert_eq!(synchronized.year, 2026);
        assert_eq!(scheduler.state(), SchedulerState::Running);
        assert_eq!(clock.reads(), 3);

        let mut expected = vec![DisplayOp::Brightness(MAX_BRIGHTNESS)];
        expected.extend(
            ALL_SEGMENTS
                .iter()
                .enumerate()
                .map(|(index, &pattern)| DisplayOp::Cell(index, pattern)),
        );
        assert_eq!(ops.take(), expected);
    }

    #[test]
    fn refresh_writes_frame_and_schedules_next_second() {
        let clock = FakeClock::new([Ok(local_time(2026, 9, 5, 30, 999_900))]);
        let (driver, ops) = RecordingDisplay::new();
        let display = SharedDisplay::new(driver);
        let mut scheduler =
            ClockScheduler::new(&clock, display.clone(), config(Duration::from_millis(1)));

        let refresh = scheduler.refresh().unwrap();

        assert_eq!(refresh.delay, Duration::from_millis(1));
        assert_eq!(refresh.frame.to_string(), "09:05");
        assert_eq!(
            ops.take(),
            vec![
                DisplayOp::Cell(0, DIGIT_PATTERNS[0]),
                DisplayOp::Cell(1, DIGIT_PATTERNS[9] | COLON_MASK),
                DisplayOp::Cell(2, DIGIT_PATTERNS[0]),
                DisplayOp::Cell(3, DIGIT_PATTERNS[5]),
            ]
        );
        assert_eq!(display.last_frame(), Some(refresh.frame));
    }

    #[test]
    fn failed_clock_read_writes_nothing() {
        let clock = FakeClock::new([Err(Error::Clock("rtc busy".to_string()))]);
        let (driver, ops) = RecordingDisplay::new();
        let mut scheduler =
            ClockScheduler::new(&clock, SharedDisplay::new(driver), config(DEFAULT_TICK));

        assert_eq!(
            scheduler.refresh(),
            Err(Error::Clock("rtc busy".to_string()))
        );
        assert!(ops.take().is_empty());
    }

    #[test]
    fn brightness_change_after_refresh_redraws_same_time() {
        let clock = FakeClock::new([Ok(local_time(2026, 23, 59, 1, 10))]);
        let (driver, ops) = RecordingDisplay::new();
        let display = SharedDisplay::new(driver);
        let mut scheduler = ClockScheduler::new(&clock, display.clone(), config(DEFAULT_TICK));

        let refresh = scheduler.refresh().unwrap();
        ops.clear();
        display.set_brightness(1).unwrap();

        let cells = refresh.frame.cells();
        assert_eq!(
            ops.take(),
            vec![
                DisplayOp::Brightness(1),
                DisplayOp::Cell(0, cells[0]),
                DisplayOp::Cell(1, cells[1]),
                DisplayOp::Cell(2, cells[2]),
                DisplayOp::Cell(3, cells[3]),
            ]
        );
        assert!(!refresh.frame.colon());
    }

    #[test]
    fn refresh_deadline_follows_computed_delay() {
        let clock = FakeClock::new([Ok(local_time(2026, 12, 0, 0, 250_000))]);
        let (driver, _ops) = RecordingDisplay::new();
        let mut scheduler =
            ClockScheduler::new(&clock, SharedDisplay::new(driver), config(DEFAULT_TICK));
        let started = Instant::now();

        let outcome = scheduler.refresh();

        assert_eq!(
            next_refresh_deadline(started, &outcome),
            started + Duration::from_millis(760)
        );
    }

    #[test]
    fn failed_refresh_retries_after_a_second() {
        let clock = FakeClock::new([
            Err(Error::Clock("rtc busy".to_string())),
            Ok(local_time(2026, 12, 0, 1, 0)),
        ]);
        let (driver, ops) = RecordingDisplay::new();
        let mut scheduler =
            ClockScheduler::new(&clock, SharedDisplay::new(driver), config(DEFAULT_TICK));
        let started = Instant::now();

        let outcome = scheduler.refresh();
        assert_eq!(
            next_refresh_deadline(started, &outcome),
            started + RETRY_DELAY
        );
        assert!(ops.take().is_empty());

        let retried = scheduler.refresh().unwrap();
        assert_eq!(retried.frame.to_string(), "12 00");
        assert_eq!(ops.take().len(), 4);
    }
}
