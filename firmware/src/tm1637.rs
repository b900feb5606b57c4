use esp_idf_hal::{
    delay::Ets,
    gpio::{AnyIOPin, InputOutput, PinDriver, Pull},
    sys::EspError,
};
use thiserror::Error;

use netclock_common::{SegmentDisplay, MAX_BRIGHTNESS};

const CMD_DATA_FIXED_ADDRESS: u8 = 0x44;
const CMD_ADDRESS: u8 = 0xC0;
const CMD_DISPLAY_ON: u8 = 0x88;
const CELL_COUNT: usize = 4;

#[derive(Debug, Error)]
pub enum Tm1637Error {
    #[error("gpio error: {0}")]
    Gpio(#[from] EspError),
    #[error("no acknowledge for byte {0:#04x}")]
    Nack(u8),
    #[error("cell {0} out of range")]
    CellOutOfRange(usize),
}

/// Bit-banged TM1637 on two open-drain lines with pull-ups.
pub struct Tm1637 {
    clk: PinDriver<'static, AnyIOPin, InputOutput>,
    dio: PinDriver<'static, AnyIOPin, InputOutput>,
    bit_delay_us: u32,
}

impl Tm1637 {
    /// Claims both lines and checks that a controller acknowledges.
    pub fn new(clk: AnyIOPin, dio: AnyIOPin, bit_delay_us: u32) -> Result<Self, Tm1637Error> {
        let mut clk = PinDriver::input_output_od(clk)?;
        clk.set_pull(Pull::Up)?;
        clk.set_high()?;

        let mut dio = PinDriver::input_output_od(dio)?;
        dio.set_pull(Pull::Up)?;
        dio.set_high()?;

        let mut display = Self {
            clk,
            dio,
            bit_delay_us,
        };
        display.command(CMD_DISPLAY_ON | MAX_BRIGHTNESS)?;
        Ok(display)
    }

    fn command(&mut self, byte: u8) -> Result<(), Tm1637Error> {
        self.start()?;
        let result = self.write_byte(byte);
        self.stop()?;
        result
    }

    fn start(&mut self) -> Result<(), Tm1637Error> {
        self.clk.set_high()?;
        self.dio.set_high()?;
        self.delay();
        self.dio.set_low()?;
        self.delay();
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Tm1637Error> {
        self.clk.set_low()?;
        self.dio.set_low()?;
        self.delay();
        self.clk.set_high()?;
        self.delay();
        self.dio.set_high()?;
        self.delay();
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), Tm1637Error> {
        // LSB first, data sampled on the rising clock edge.
        for bit in 0..8 {
            self.clk.set_low()?;
            if byte & (1 << bit) != 0 {
                self.dio.set_high()?;
            } else {
                self.dio.set_low()?;
            }
            self.delay();
            self.clk.set_high()?;
            self.delay();
        }

        self.clk.set_low()?;
        self.dio.set_high()?;
        self.delay();
        self.clk.set_high()?;
        self.delay();
        let acknowledged = self.dio.is_low();
        self.clk.set_low()?;
        self.delay();

        if acknowledged {
            Ok(())
        } else {
            Err(Tm1637Error::Nack(byte))
        }
    }

    fn delay(&self) {
        Ets::delay_us(self.bit_delay_us);
    }
}

impl SegmentDisplay for Tm1637 {
    type Error = Tm1637Error;

    fn set_cell_raw(&mut self, index: usize, pattern: u8) -> Result<(), Self::Error> {
        if index >= CELL_COUNT {
            return Err(Tm1637Error::CellOutOfRange(index));
        }

        self.command(CMD_DATA_FIXED_ADDRESS)?;

        self.start()?;
        let result = self
            .write_byte(CMD_ADDRESS | index as u8)
            .and_then(|()| self.write_byte(pattern));
        self.stop()?;
        result
    }

    fn set_brightness(&mut self, level: u8) -> Result<(), Self::Error> {
        self.command(CMD_DISPLAY_ON | level.min(MAX_BRIGHTNESS))
    }
}
