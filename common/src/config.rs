use serde::{Deserialize, Serialize};

use crate::{display::MAX_BRIGHTNESS, scheduler::SchedulerConfig};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    pub sync_poll_interval_ms: u64,
    /// Scheduler tick; matches the RTOS tick on the device.
    pub tick_ms: u64,
    pub initial_brightness: u8,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            sync_poll_interval_ms: 100,
            tick_ms: 10,
            initial_brightness: MAX_BRIGHTNESS,
        }
    }
}

impl ClockConfig {
    pub fn sanitize(&mut self) {
        self.sync_poll_interval_ms = self.sync_poll_interval_ms.clamp(10, 10_000);
        self.tick_ms = self.tick_ms.clamp(1, 100);
        self.initial_brightness = self.initial_brightness.min(MAX_BRIGHTNESS);
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig::from(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrightnessConfig {
    pub enabled: bool,
    pub sample_interval_ms: u64,
}

impl Default for BrightnessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_interval_ms: 200,
        }
    }
}

impl BrightnessConfig {
    pub fn sanitize(&mut self) {
        self.sample_interval_ms = self.sample_interval_ms.clamp(50, 10_000);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayHardwareConfig {
    pub clk_pin: i32,
    pub dio_pin: i32,
    pub bit_delay_us: u32,
}

impl Default for DisplayHardwareConfig {
    fn default() -> Self {
        Self {
            clk_pin: 18,
            dio_pin: 19,
            bit_delay_us: 5,
        }
    }
}

impl DisplayHardwareConfig {
    pub fn sanitize(&mut self) {
        let defaults = Self::default();

        if self.clk_pin < 0 || self.dio_pin < 0 || self.clk_pin == self.dio_pin {
            self.clk_pin = defaults.clk_pin;
            self.dio_pin = defaults.dio_pin;
        }

        self.bit_delay_us = self.bit_delay_us.clamp(1, 100);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub wifi_ssid: String,
    pub wifi_pass: String,
}

impl NetworkConfig {
    pub fn has_station_credentials(&self) -> bool {
        !self.wifi_ssid.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub clock: ClockConfig,
    pub brightness: BrightnessConfig,
    pub display: DisplayHardwareConfig,
    pub timezone: String,
    pub network: NetworkConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            clock: ClockConfig::default(),
            brightness: BrightnessConfig::default(),
            display: DisplayHardwareConfig::default(),
            timezone: "Etc/UTC".to_string(),
            network: NetworkConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let mut config: Self = serde_json::from_str(json)?;
        config.sanitize();
        Ok(config)
    }

    pub fn sanitize(&mut self) {
        self.clock.sanitize();
        self.brightness.sanitize();
        self.display.sanitize();

        let trimmed = self.timezone.trim();
        if trimmed.is_empty() {
            self.timezone = Self::default().timezone;
        } else if trimmed.len() != self.timezone.len() {
            self.timezone = trimmed.to_string();
        }
    }
}
