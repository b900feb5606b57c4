use std::{thread, time::Duration};

use anyhow::{anyhow, Context};
use embedded_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{
        adc::ADC1,
        gpio::{AnyIOPin, Gpio34},
        prelude::Peripherals,
    },
    log::EspLogger,
    nvs::{EspDefaultNvsPartition, EspNvs},
    sntp::EspSntp,
    wifi::{BlockingWifi, EspWifi},
};
use log::{error, info, warn};

use netclock_common::{
    config::{DisplayHardwareConfig, NetworkConfig},
    wait_until_synchronized, BrightnessMonitor, ClockScheduler, RuntimeConfig, SharedDisplay,
    SystemClock,
};

use crate::{light_sensor::AdcLightSensor, tm1637::Tm1637};

const NVS_NAMESPACE: &str = "netclock";
const NVS_RUNTIME_KEY: &str = "runtime_json";
const CLOCK_TASK_STACK: usize = 6 * 1024;
const BRIGHTNESS_TASK_STACK: usize = 6 * 1024;
const WIFI_CONNECT_ATTEMPTS: u32 = 5;
const WIFI_RETRY_DELAY_MS: u64 = 3_000;
const WIFI_CHECK_INTERVAL: Duration = Duration::from_secs(30);

pub fn run() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    let mut runtime = load_runtime_config(&nvs_partition).unwrap_or_else(|err| {
        warn!("failed to load runtime config from NVS: {err:#}");
        RuntimeConfig::default()
    });
    apply_build_time_credentials(&mut runtime.network);
    runtime.sanitize();

    info!(
        "config loaded: tz=`{}`, ssid=`{}`, tm1637 clk=GPIO{} dio=GPIO{}",
        runtime.timezone,
        runtime.network.wifi_ssid,
        runtime.display.clk_pin,
        runtime.display.dio_pin,
    );

    info!("setting timezone `{}`", runtime.timezone);
    let clock = SystemClock::new(&runtime.timezone).context("failed to apply timezone")?;

    let Peripherals {
        modem, adc1, pins, ..
    } = Peripherals::take()?;

    match init_display(&runtime.display) {
        Ok(display) => {
            let display = SharedDisplay::new(display);
            spawn_clock_task(clock, display.clone(), &runtime)?;
            if runtime.brightness.enabled {
                spawn_brightness_task(clock, display, adc1, pins.gpio34, &runtime)?;
            }
        }
        Err(err) => error!("display init failed, clock tasks not started: {err:#}"),
    }

    let mut wifi = BlockingWifi::wrap(
        EspWifi::new(modem, sys_loop.clone(), Some(nvs_partition))?,
        sys_loop,
    )?;

    if !runtime.network.has_station_credentials() {
        warn!("wifi credentials missing; clock will wait for network time indefinitely");
        loop {
            thread::sleep(Duration::from_secs(60));
        }
    }

    configure_station(&mut wifi, &runtime.network)?;
    connect_wifi(&mut wifi, &runtime.network.wifi_ssid);

    let _sntp = EspSntp::new_default().context("failed to start SNTP")?;
    info!("SNTP initialized");

    // Keep wifi and SNTP alive for the program lifetime.
    loop {
        thread::sleep(WIFI_CHECK_INTERVAL);
        if !wifi.is_connected().unwrap_or(false) {
            warn!("wifi connection lost, reconnecting");
            connect_wifi(&mut wifi, &runtime.network.wifi_ssid);
        }
    }
}

fn init_display(config: &DisplayHardwareConfig) -> anyhow::Result<Tm1637> {
    let clk = unsafe { AnyIOPin::new(config.clk_pin) };
    let dio = unsafe { AnyIOPin::new(config.dio_pin) };

    let display = Tm1637::new(clk, dio, config.bit_delay_us).with_context(|| {
        format!(
            "no TM1637 on clk=GPIO{} dio=GPIO{}",
            config.clk_pin, config.dio_pin
        )
    })?;
    info!("TM1637 initialized");
    Ok(display)
}

fn spawn_clock_task(
    clock: SystemClock,
    display: SharedDisplay<Tm1637>,
    runtime: &RuntimeConfig,
) -> anyhow::Result<()> {
    let scheduler = ClockScheduler::new(clock, display, runtime.clock.scheduler());

    thread::Builder::new()
        .name("clock".into())
        .stack_size(CLOCK_TASK_STACK)
        .spawn(move || {
            if let Err(err) = scheduler.run() {
                error!("clock task stopped: {err:#}");
            }
        })
        .context("failed to spawn clock task")?;
    Ok(())
}

fn spawn_brightness_task(
    clock: SystemClock,
    display: SharedDisplay<Tm1637>,
    adc: ADC1,
    pin: Gpio34,
    runtime: &RuntimeConfig,
) -> anyhow::Result<()> {
    let poll_interval = runtime.clock.scheduler().sync_poll_interval;
    let interval = Duration::from_millis(runtime.brightness.sample_interval_ms);

    thread::Builder::new()
        .name("brightness".into())
        .stack_size(BRIGHTNESS_TASK_STACK)
        .spawn(move || {
            info!("initializing ADC");
            let sensor = match AdcLightSensor::new(adc, pin) {
                Ok(sensor) => sensor,
                Err(err) => {
                    error!("failed to initialize ADC: {err}");
                    return;
                }
            };

            wait_until_synchronized(&clock, poll_interval);
            BrightnessMonitor::new(sensor, display, interval).run()
        })
        .context("failed to spawn brightness task")?;
    Ok(())
}

fn apply_build_time_credentials(network: &mut NetworkConfig) {
    if network.has_station_credentials() {
        return;
    }

    if let Some(ssid) = option_env!("WIFI_SSID") {
        network.wifi_ssid = ssid.to_string();
        network.wifi_pass = option_env!("WIFI_PASS").unwrap_or_default().to_string();
    }
}

fn configure_station(
    wifi: &mut BlockingWifi<EspWifi<'static>>,
    network: &NetworkConfig,
) -> anyhow::Result<()> {
    let auth_method = if network.wifi_pass.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPAWPA2Personal
    };

    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: network
            .wifi_ssid
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi ssid too long"))?,
        password: network
            .wifi_pass
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi password too long"))?,
        auth_method,
        ..Default::default()
    }))?;

    wifi.start()?;
    info!("wifi started, connecting to `{}`", network.wifi_ssid);
    Ok(())
}

/// Tries a few times; SNTP picks up the network whenever it comes up.
fn connect_wifi(wifi: &mut BlockingWifi<EspWifi<'static>>, ssid: &str) {
    for attempt in 1..=WIFI_CONNECT_ATTEMPTS {
        info!("wifi connect attempt {attempt}/{WIFI_CONNECT_ATTEMPTS}");
        let result = wifi.connect().and_then(|()| wifi.wait_netif_up());
        match result {
            Ok(()) => {
                info!("wifi connected to `{ssid}` on attempt {attempt}");
                return;
            }
            Err(err) => warn!("wifi connect failed on attempt {attempt}: {err:#}"),
        }

        if attempt < WIFI_CONNECT_ATTEMPTS {
            let _ = wifi.disconnect();
            thread::sleep(Duration::from_millis(WIFI_RETRY_DELAY_MS));
        }
    }

    warn!("all {WIFI_CONNECT_ATTEMPTS} wifi connect attempts failed, retrying later");
}

fn load_runtime_config(partition: &EspDefaultNvsPartition) -> anyhow::Result<RuntimeConfig> {
    let nvs = EspNvs::new(partition.clone(), NVS_NAMESPACE, true)?;
    let mut buffer = vec![0_u8; 2048];

    match nvs.get_str(NVS_RUNTIME_KEY, &mut buffer)? {
        Some(value) => Ok(RuntimeConfig::from_json(value)?),
        None => Ok(RuntimeConfig::default()),
    }
}
