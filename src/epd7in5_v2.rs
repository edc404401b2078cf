//! Waveshare 7.5" V2 (800x480, black/white) panel driver.
//!
//! Follows the vendor init/refresh sequences for the UC8179 controller.
//! The driver is generic over three narrow hardware traits so the same
//! code runs against real GPIO/SPI on the Pi and against recording fakes
//! in tests; the binary provides rppal-backed implementations behind the
//! `hardware` feature.
//!
//! Refresh model: a full push rewrites both controller RAM planes and
//! triggers the slow flicker-refresh that resets ghosting. A partial push
//! addresses a byte-aligned window and refreshes only that region with
//! the fast LUT, leaving residual ghosting elsewhere. Deep sleep parks
//! the panel safely; `wake` re-runs the init sequence.

use crate::display::{DisplayError, DisplaySurface};
use crate::frame::Frame;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use std::thread;
use std::time::Duration;

/// Native panel resolution
pub const EPD_WIDTH: u32 = 800;
pub const EPD_HEIGHT: u32 = 480;

// UC8179 command set (subset used here)
const CMD_PANEL_SETTING: u8 = 0x00;
const CMD_POWER_SETTING: u8 = 0x01;
const CMD_POWER_OFF: u8 = 0x02;
const CMD_POWER_ON: u8 = 0x04;
const CMD_DEEP_SLEEP: u8 = 0x07;
const CMD_DATA_OLD: u8 = 0x10;
const CMD_DISPLAY_REFRESH: u8 = 0x12;
const CMD_DATA_NEW: u8 = 0x13;
const CMD_DUAL_SPI: u8 = 0x15;
const CMD_VCOM_INTERVAL: u8 = 0x50;
const CMD_TCON: u8 = 0x60;
const CMD_RESOLUTION: u8 = 0x61;
const CMD_GET_STATUS: u8 = 0x71;
const CMD_PARTIAL_WINDOW: u8 = 0x90;
const CMD_PARTIAL_IN: u8 = 0x91;
const CMD_PARTIAL_OUT: u8 = 0x92;

#[cfg(not(test))]
const BUSY_POLL: Duration = Duration::from_millis(10);
#[cfg(not(test))]
const BUSY_TIMEOUT_POLLS: u32 = 3000; // 30 s; a full refresh takes ~5 s

// Tests exercise the timeout path; keep it fast there
#[cfg(test)]
const BUSY_POLL: Duration = Duration::from_millis(1);
#[cfg(test)]
const BUSY_TIMEOUT_POLLS: u32 = 20;

/// SPI write access to the controller.
pub trait DisplaySpi {
    fn write(&mut self, data: &[u8]) -> Result<(), DisplayError>;
}

/// Push-pull output pin (DC, RST).
pub trait OutputPin {
    fn set_high(&mut self) -> Result<(), DisplayError>;
    fn set_low(&mut self) -> Result<(), DisplayError>;
}

/// The controller's busy line.
pub trait BusyPin {
    /// True while the controller is refreshing and must not be driven.
    fn is_busy(&self) -> Result<bool, DisplayError>;
}

/// Driver state over generic pins.
pub struct Epd7in5V2<SPI, DC, RST, BUSY> {
    spi: SPI,
    dc: DC,
    rst: RST,
    busy: BUSY,
}

impl<SPI, DC, RST, BUSY> Epd7in5V2<SPI, DC, RST, BUSY>
where
    SPI: DisplaySpi,
    DC: OutputPin,
    RST: OutputPin,
    BUSY: BusyPin,
{
    pub fn new(spi: SPI, dc: DC, rst: RST, busy: BUSY) -> Self {
        Self { spi, dc, rst, busy }
    }

    fn reset(&mut self) -> Result<(), DisplayError> {
        self.rst.set_high()?;
        thread::sleep(Duration::from_millis(20));
        self.rst.set_low()?;
        thread::sleep(Duration::from_millis(2));
        self.rst.set_high()?;
        thread::sleep(Duration::from_millis(20));
        Ok(())
    }

    fn send_command(&mut self, command: u8) -> Result<(), DisplayError> {
        self.dc.set_low()?;
        self.spi.write(&[command])
    }

    fn send_data(&mut self, data: &[u8]) -> Result<(), DisplayError> {
        self.dc.set_high()?;
        // Kernel SPI transfers are limited to one page
        for chunk in data.chunks(4096) {
            self.spi.write(chunk)?;
        }
        Ok(())
    }

    /// Wait for the busy line to release; the line is polled rather than
    /// interrupt-driven, matching the vendor sequences.
    fn wait_idle(&mut self) -> Result<(), DisplayError> {
        for _ in 0..BUSY_TIMEOUT_POLLS {
            self.send_command(CMD_GET_STATUS)?;
            if !self.busy.is_busy()? {
                return Ok(());
            }
            thread::sleep(BUSY_POLL);
        }
        Err(DisplayError::BusyTimeout)
    }

    /// Power-on init with the full-refresh LUT.
    pub fn init(&mut self) -> Result<(), DisplayError> {
        self.reset()?;

        self.send_command(CMD_POWER_SETTING)?;
        self.send_data(&[0x07, 0x07, 0x3F, 0x3F])?;

        self.send_command(CMD_POWER_ON)?;
        thread::sleep(Duration::from_millis(100));
        self.wait_idle()?;

        self.send_command(CMD_PANEL_SETTING)?;
        self.send_data(&[0x1F])?;

        self.send_command(CMD_RESOLUTION)?;
        self.send_data(&[0x03, 0x20, 0x01, 0xE0])?;

        self.send_command(CMD_DUAL_SPI)?;
        self.send_data(&[0x00])?;

        self.send_command(CMD_VCOM_INTERVAL)?;
        self.send_data(&[0x10, 0x07])?;

        self.send_command(CMD_TCON)?;
        self.send_data(&[0x22])?;

        Ok(())
    }

    /// Switch the VCOM/border configuration for windowed refreshes.
    fn init_partial(&mut self) -> Result<(), DisplayError> {
        self.send_command(CMD_VCOM_INTERVAL)?;
        self.send_data(&[0xA9, 0x07])?;
        Ok(())
    }

    /// Invert a packed white=1 buffer into the 0x13 plane's black=1 form.
    fn new_plane(data: &[u8]) -> Vec<u8> {
        data.iter().map(|b| !b).collect()
    }

    fn refresh(&mut self) -> Result<(), DisplayError> {
        self.send_command(CMD_DISPLAY_REFRESH)?;
        thread::sleep(Duration::from_millis(100));
        self.wait_idle()
    }

    /// Full-frame upload and flicker refresh.
    pub fn display(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        let plane_len = (EPD_WIDTH / 8 * EPD_HEIGHT) as usize;

        // Restore the full-refresh border waveform after any partial work
        self.send_command(CMD_VCOM_INTERVAL)?;
        self.send_data(&[0x10, 0x07])?;

        self.send_command(CMD_DATA_OLD)?;
        self.send_data(&vec![0xFF; plane_len])?;

        self.send_command(CMD_DATA_NEW)?;
        self.send_data(&Self::new_plane(frame.data()))?;

        self.refresh()
    }

    /// Windowed upload and fast refresh of `region` only.
    pub fn display_partial(
        &mut self,
        frame: &Frame,
        region: Rectangle,
    ) -> Result<(), DisplayError> {
        let x = region.top_left.x as u32;
        let y = region.top_left.y as u32;
        let w = region.size.width;
        let h = region.size.height;

        self.init_partial()?;
        self.send_command(CMD_PARTIAL_IN)?;

        let x_end = x + w - 1;
        let y_end = y + h - 1;
        self.send_command(CMD_PARTIAL_WINDOW)?;
        self.send_data(&[
            (x >> 8) as u8,
            (x & 0xF8) as u8,
            (x_end >> 8) as u8,
            (x_end as u8) | 0x07,
            (y >> 8) as u8,
            (y & 0xFF) as u8,
            (y_end >> 8) as u8,
            (y_end & 0xFF) as u8,
            0x01,
        ])?;

        self.send_command(CMD_DATA_NEW)?;
        self.send_data(&Self::new_plane(frame.data()))?;

        self.refresh()?;
        self.send_command(CMD_PARTIAL_OUT)?;
        Ok(())
    }

    /// Blank the panel to white with a full refresh.
    pub fn clear(&mut self) -> Result<(), DisplayError> {
        let plane_len = (EPD_WIDTH / 8 * EPD_HEIGHT) as usize;
        self.send_command(CMD_DATA_OLD)?;
        self.send_data(&vec![0xFF; plane_len])?;
        self.send_command(CMD_DATA_NEW)?;
        self.send_data(&vec![0x00; plane_len])?;
        self.refresh()
    }

    /// Power off and enter deep sleep. Only a hardware reset (`init`)
    /// brings the controller back.
    pub fn deep_sleep(&mut self) -> Result<(), DisplayError> {
        self.send_command(CMD_POWER_OFF)?;
        self.wait_idle()?;
        self.send_command(CMD_DEEP_SLEEP)?;
        self.send_data(&[0xA5])?;
        Ok(())
    }

    fn check_full_frame(frame: &Frame) -> Result<(), DisplayError> {
        if frame.width() != EPD_WIDTH || frame.height() != EPD_HEIGHT {
            return Err(DisplayError::Bounds(format!(
                "frame {}x{} does not match panel {}x{}",
                frame.width(),
                frame.height(),
                EPD_WIDTH,
                EPD_HEIGHT
            )));
        }
        Ok(())
    }

    fn check_region(frame: &Frame, region: &Rectangle) -> Result<(), DisplayError> {
        let panel = Rectangle::new(Point::zero(), Size::new(EPD_WIDTH, EPD_HEIGHT));
        let inside = panel.intersection(region) == *region;
        if !inside || region.size.width == 0 || region.size.height == 0 {
            return Err(DisplayError::Bounds(format!(
                "region {region:?} outside panel"
            )));
        }
        if region.top_left.x % 8 != 0 || region.size.width % 8 != 0 {
            return Err(DisplayError::Bounds(format!(
                "region {region:?} not byte aligned"
            )));
        }
        if frame.width() != region.size.width || frame.height() != region.size.height {
            return Err(DisplayError::Bounds(format!(
                "frame {}x{} does not match region {:?}",
                frame.width(),
                frame.height(),
                region
            )));
        }
        Ok(())
    }
}

impl<SPI, DC, RST, BUSY> DisplaySurface for Epd7in5V2<SPI, DC, RST, BUSY>
where
    SPI: DisplaySpi,
    DC: OutputPin,
    RST: OutputPin,
    BUSY: BusyPin,
{
    fn push_full(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        Self::check_full_frame(frame)?;
        self.display(frame)
    }

    fn push_partial(&mut self, frame: &Frame, region: Rectangle) -> Result<(), DisplayError> {
        Self::check_region(frame, &region)?;
        self.display_partial(frame, region)
    }

    fn sleep(&mut self) -> Result<(), DisplayError> {
        self.deep_sleep()
    }

    fn wake(&mut self) -> Result<(), DisplayError> {
        self.init()?;
        self.clear()
    }
}
