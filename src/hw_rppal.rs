//! rppal-backed pin and SPI implementations for the Waveshare HAT.
//!
//! CS is handled by the kernel SPI driver (CE0/CE1), so only DC, RST and
//! BUSY are claimed as GPIO lines. The UC8179 busy line is active low.

use anyhow::Context;
use rppal::gpio::{Gpio, InputPin, OutputPin as RppalOutputPin};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use statusboard_lib::config::HardwareConfig;
use statusboard_lib::display::DisplayError;
use statusboard_lib::epd7in5_v2::{BusyPin, DisplaySpi, Epd7in5V2, OutputPin};

const SPI_CLOCK_HZ: u32 = 4_000_000;

pub struct HwSpi(Spi);

impl DisplaySpi for HwSpi {
    fn write(&mut self, data: &[u8]) -> Result<(), DisplayError> {
        self.0
            .write(data)
            .map(|_| ())
            .map_err(|e| DisplayError::Bus(e.to_string()))
    }
}

pub struct HwOutput(RppalOutputPin);

impl OutputPin for HwOutput {
    fn set_high(&mut self) -> Result<(), DisplayError> {
        self.0.set_high();
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), DisplayError> {
        self.0.set_low();
        Ok(())
    }
}

pub struct HwBusy(InputPin);

impl BusyPin for HwBusy {
    fn is_busy(&self) -> Result<bool, DisplayError> {
        Ok(self.0.is_low())
    }
}

pub type HwDisplay = Epd7in5V2<HwSpi, HwOutput, HwOutput, HwBusy>;

/// Claim the configured SPI device and GPIO lines and wrap them in the
/// panel driver.
pub fn open(config: &HardwareConfig) -> anyhow::Result<HwDisplay> {
    let bus = match config.spi_bus {
        0 => Bus::Spi0,
        1 => Bus::Spi1,
        other => anyhow::bail!("unsupported SPI bus {other}"),
    };
    let slave = match config.spi_slave {
        0 => SlaveSelect::Ss0,
        1 => SlaveSelect::Ss1,
        other => anyhow::bail!("unsupported SPI slave select {other}"),
    };

    let spi = Spi::new(bus, slave, SPI_CLOCK_HZ, Mode::Mode0).context("open SPI device")?;
    let gpio = Gpio::new().context("open GPIO")?;
    let dc = gpio.get(config.dc_pin).context("claim DC pin")?.into_output();
    let rst = gpio.get(config.rst_pin).context("claim RST pin")?.into_output();
    let busy = gpio.get(config.busy_pin).context("claim BUSY pin")?.into_input();

    Ok(Epd7in5V2::new(
        HwSpi(spi),
        HwOutput(dc),
        HwOutput(rst),
        HwBusy(busy),
    ))
}
