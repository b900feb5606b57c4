use std::{
    convert::Infallible,
    thread,
    time::{Duration, Instant},
};

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use netclock_common::{
    brightness::MAX_RAW_SAMPLE,
    digits::{decode_pattern, CELL_COUNT, COLON_CELL, COLON_MASK},
    wait_until_synchronized, BrightnessMonitor, ClockScheduler, LocalTime, RuntimeConfig,
    SegmentDisplay, SharedDisplay, SystemClock, WallClock,
};

const CONFIG_PATH_ENV: &str = "NETCLOCK_CONFIG";
const TIMEZONE_ENV: &str = "TZ_NAME";
const SYNC_DELAY_ENV: &str = "NETCLOCK_SYNC_DELAY_SECS";
const LIGHT_CYCLE: Duration = Duration::from_secs(60);
const LIGHT_JITTER: [i32; 6] = [0, 3, -2, 1, -3, 2];

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut runtime = load_runtime_config()?;
    if let Ok(timezone) = std::env::var(TIMEZONE_ENV) {
        runtime.timezone = timezone;
    }
    runtime.sanitize();

    info!("setting timezone `{}`", runtime.timezone);
    let system_clock = SystemClock::new(&runtime.timezone).context("failed to apply timezone")?;

    let sync_delay = std::env::var(SYNC_DELAY_ENV)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or_default();
    let clock = SimulatedSyncClock::new(system_clock, sync_delay);

    let display = SharedDisplay::new(ConsoleDisplay::default());

    let scheduler =
        ClockScheduler::new(clock.clone(), display.clone(), runtime.clock.scheduler());
    thread::Builder::new()
        .name("clock".into())
        .spawn(move || {
            if let Err(err) = scheduler.run() {
                error!("clock task stopped: {err:#}");
            }
        })
        .context("failed to spawn clock task")?;

    if runtime.brightness.enabled {
        let poll_interval = runtime.clock.scheduler().sync_poll_interval;
        let interval = Duration::from_millis(runtime.brightness.sample_interval_ms);
        let monitor = BrightnessMonitor::new(SimulatedLightSensor::new(), display, interval);

        thread::Builder::new()
            .name("brightness".into())
            .spawn(move || {
                wait_until_synchronized(&clock, poll_interval);
                monitor.run()
            })
            .context("failed to spawn brightness task")?;
    }

    info!("clock simulation running, press ctrl-c to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("shutting down");

    Ok(())
}

fn load_runtime_config() -> anyhow::Result<RuntimeConfig> {
    let Ok(path) = std::env::var(CONFIG_PATH_ENV) else {
        return Ok(RuntimeConfig::default());
    };

    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file `{path}`"))?;
    RuntimeConfig::from_json(&json).with_context(|| format!("invalid config file `{path}`"))
}

/// System clock that reports the power-on epoch until `sync_delay` has
/// passed, standing in for a device still waiting on network time.
#[derive(Debug, Clone)]
struct SimulatedSyncClock {
    inner: SystemClock,
    booted_at: Instant,
    sync_delay: Duration,
}

impl SimulatedSyncClock {
    fn new(inner: SystemClock, sync_delay: Duration) -> Self {
        Self {
            inner,
            booted_at: Instant::now(),
            sync_delay,
        }
    }
}

impl WallClock for SimulatedSyncClock {
    fn now(&self) -> netclock_common::Result<LocalTime> {
        let uptime = self.booted_at.elapsed();
        if uptime >= self.sync_delay {
            return self.inner.now();
        }

        let seconds = uptime.as_secs();
        Ok(LocalTime {
            year: 1970,
            month: 1,
            day: 1,
            hour: (seconds / 3_600 % 24) as u8,
            minute: (seconds / 60 % 60) as u8,
            second: (seconds % 60) as u8,
            micros: uptime.subsec_micros(),
        })
    }
}

#[derive(Debug, Default)]
struct ConsoleDisplay {
    cells: [u8; CELL_COUNT],
    brightness: u8,
}

impl ConsoleDisplay {
    fn render(&self) -> String {
        let mut text = String::with_capacity(CELL_COUNT + 1);
        for (index, cell) in self.cells.iter().enumerate() {
            if index == 2 {
                let colon = self.cells[COLON_CELL] & COLON_MASK != 0;
                text.push(if colon { ':' } else { ' ' });
            }
            text.push(match decode_pattern(cell & !COLON_MASK) {
                Some(digit) => char::from(b'0' + digit),
                None => '?',
            });
        }
        text
    }
}

impl SegmentDisplay for ConsoleDisplay {
    type Error = String;

    fn set_cell_raw(&mut self, index: usize, pattern: u8) -> Result<(), Self::Error> {
        let cell = self
            .cells
            .get_mut(index)
            .ok_or_else(|| format!("cell {index} out of range"))?;
        *cell = pattern;

        if index == CELL_COUNT - 1 {
            info!(target: "display", "[{}] brightness {}", self.render(), self.brightness);
        }
        Ok(())
    }

    fn set_brightness(&mut self, level: u8) -> Result<(), Self::Error> {
        self.brightness = level;
        Ok(())
    }
}

/// Slow triangle wave across the full sensor range with a little noise.
struct SimulatedLightSensor {
    started: Instant,
    reads: usize,
}

impl SimulatedLightSensor {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            reads: 0,
        }
    }
}

impl netclock_common::AmbientSensor for SimulatedLightSensor {
    type Error = Infallible;

    fn read_raw(&mut self) -> Result<u16, Self::Error> {
        let cycle_ms = LIGHT_CYCLE.as_millis();
        let phase = self.started.elapsed().as_millis() % cycle_ms;
        let half = cycle_ms / 2;
        let distance = if phase < half { phase } else { cycle_ms - phase };
        let base = (distance * u128::from(MAX_RAW_SAMPLE) / half) as i32;

        let jitter = LIGHT_JITTER[self.reads % LIGHT_JITTER.len()];
        self.reads = self.reads.wrapping_add(1);

        Ok((base + jitter).clamp(0, i32::from(MAX_RAW_SAMPLE)) as u16)
    }
}
