use esp_idf_hal::{
    adc::{
        attenuation::DB_11,
        oneshot::{config::AdcChannelConfig, AdcChannelDriver, AdcDriver},
        ADC1,
    },
    gpio::Gpio34,
    sys::EspError,
};

use netclock_common::AmbientSensor;

/// 12-bit conversions down to the 10-bit range the brightness filter expects.
const RESOLUTION_SHIFT: u16 = 2;

/// Photoresistor divider on GPIO34 (ADC1 channel 6).
pub struct AdcLightSensor {
    channel: AdcChannelDriver<'static, Gpio34, AdcDriver<'static, ADC1>>,
}

impl AdcLightSensor {
    pub fn new(adc: ADC1, pin: Gpio34) -> Result<Self, EspError> {
        let driver = AdcDriver::new(adc)?;
        let config = AdcChannelConfig {
            attenuation: DB_11,
            ..Default::default()
        };
        let channel = AdcChannelDriver::new(driver, pin, &config)?;

        Ok(Self { channel })
    }
}

impl AmbientSensor for AdcLightSensor {
    type Error = EspError;

    fn read_raw(&mut self) -> Result<u16, Self::Error> {
        Ok(self.channel.read_raw()? >> RESOLUTION_SHIFT)
    }
}
