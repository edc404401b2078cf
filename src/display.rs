//! # Display Surface Abstraction
//!
//! The scheduler talks to the physical panel through [`DisplaySurface`]:
//! full-frame pushes (slow, flickering, ghosting-resetting), partial
//! region pushes (fast, cumulative ghosting), and the sleep/wake pair used
//! around process shutdown. The Waveshare driver in
//! [`crate::epd7in5_v2`] implements it for real hardware; the
//! [`AsciiSurface`] here implements it for terminal development: run with
//! `--stdout` and watch frames go by as character grids.

use crate::frame::Frame;
use embedded_graphics::primitives::Rectangle;
use thiserror::Error;

/// Push-to-hardware failures. Recovered by retrying on a later tick; the
/// process never exits because of these (a wedged panel does not get
/// better by restarting the controller).
#[derive(Error, Debug)]
pub enum DisplayError {
    /// SPI/GPIO transfer failed
    #[error("display bus error: {0}")]
    Bus(String),

    /// The controller never released its busy line
    #[error("display busy-wait timed out")]
    BusyTimeout,

    /// A partial window that the controller cannot address
    #[error("bad partial region: {0}")]
    Bounds(String),
}

/// Capability surface of a bistable display.
pub trait DisplaySurface {
    /// Push a complete frame. Slow; visibly flickers; resets ghosting.
    fn push_full(&mut self, frame: &Frame) -> Result<(), DisplayError>;

    /// Push only `region` of the screen, using `frame` as the region's
    /// content. Fast and flicker-free, but ghosting accumulates.
    fn push_partial(&mut self, frame: &Frame, region: Rectangle) -> Result<(), DisplayError>;

    /// Put the panel into deep sleep. Call before process exit so the
    /// display is not left half-drawn and drawing power.
    fn sleep(&mut self) -> Result<(), DisplayError>;

    /// (Re-)initialize the panel out of deep sleep.
    fn wake(&mut self) -> Result<(), DisplayError>;
}

/// Terminal rendition of the panel for development without hardware.
///
/// Full frames are downsampled to a character grid; partial pushes print a
/// single line for the heartbeat strip so a 1 Hz run stays readable.
pub struct AsciiSurface {
    width: u32,
    height: u32,
    cell_w: u32,
    cell_h: u32,
}

impl AsciiSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cell_w: 8,
            cell_h: 16,
        }
    }

    /// Map a pixel block to one character: ink if the block is at least
    /// one-quarter dark.
    fn cell(&self, frame: &Frame, cx: u32, cy: u32, x0: u32, y0: u32) -> char {
        let mut dark = 0;
        for y in 0..self.cell_h {
            for x in 0..self.cell_w {
                if frame.pixel(x0 + cx * self.cell_w + x, y0 + cy * self.cell_h + y) {
                    dark += 1;
                }
            }
        }
        if dark * 4 >= self.cell_w * self.cell_h {
            '#'
        } else if dark > 0 {
            '.'
        } else {
            ' '
        }
    }

    fn print_grid(&self, frame: &Frame, x0: u32, y0: u32, w: u32, h: u32) {
        let cols = w / self.cell_w;
        let rows = h.div_ceil(self.cell_h);
        for cy in 0..rows {
            let line: String = (0..cols).map(|cx| self.cell(frame, cx, cy, x0, y0)).collect();
            println!("|{line}|");
        }
    }
}

impl DisplaySurface for AsciiSurface {
    fn push_full(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        println!("+{}+", "-".repeat((self.width / self.cell_w) as usize));
        self.print_grid(frame, 0, 0, self.width, self.height);
        println!("+{}+", "-".repeat((self.width / self.cell_w) as usize));
        Ok(())
    }

    fn push_partial(&mut self, frame: &Frame, region: Rectangle) -> Result<(), DisplayError> {
        if frame.width() != region.size.width || frame.height() != region.size.height {
            return Err(DisplayError::Bounds(format!(
                "frame {}x{} vs region {}x{}",
                frame.width(),
                frame.height(),
                region.size.width,
                region.size.height
            )));
        }
        // One line per partial push keeps a 1 Hz heartbeat readable
        let cols = (region.size.width / self.cell_w) as usize;
        let line: String = (0..cols)
            .map(|cx| self.cell(frame, cx as u32, 0, 0, 0))
            .collect();
        println!("[{line}]");
        Ok(())
    }

    fn sleep(&mut self) -> Result<(), DisplayError> {
        println!("(display sleeping)");
        Ok(())
    }

    fn wake(&mut self) -> Result<(), DisplayError> {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use embedded_graphics::prelude::*;

    /// Recording surface with injectable failures, shared by the
    /// scheduler tests and the end-to-end scenarios.
    #[derive(Default)]
    pub(crate) struct RecordingSurface {
        pub pushes: Vec<PushEvent>,
        pub sleeps: usize,
        pub wakes: usize,
        /// Fail the next N full pushes
        pub fail_full: usize,
        /// Fail the next N partial pushes
        pub fail_partial: usize,
    }

    #[derive(Clone, Debug, PartialEq)]
    pub(crate) enum PushEvent {
        Full,
        Partial(Rectangle),
    }

    impl RecordingSurface {
        pub fn full_count(&self) -> usize {
            self.pushes.iter().filter(|p| **p == PushEvent::Full).count()
        }

        pub fn partial_count(&self) -> usize {
            self.pushes.len() - self.full_count()
        }
    }

    impl DisplaySurface for RecordingSurface {
        fn push_full(&mut self, _frame: &Frame) -> Result<(), DisplayError> {
            if self.fail_full > 0 {
                self.fail_full -= 1;
                return Err(DisplayError::Bus("injected".into()));
            }
            self.pushes.push(PushEvent::Full);
            Ok(())
        }

        fn push_partial(
            &mut self,
            _frame: &Frame,
            region: Rectangle,
        ) -> Result<(), DisplayError> {
            if self.fail_partial > 0 {
                self.fail_partial -= 1;
                return Err(DisplayError::Bus("injected".into()));
            }
            self.pushes.push(PushEvent::Partial(region));
            Ok(())
        }

        fn sleep(&mut self) -> Result<(), DisplayError> {
            self.sleeps += 1;
            Ok(())
        }

        fn wake(&mut self) -> Result<(), DisplayError> {
            self.wakes += 1;
            Ok(())
        }
    }

    #[test]
    fn ascii_partial_rejects_mismatched_region() {
        let mut surface = AsciiSurface::new(800, 480);
        let frame = Frame::new(800, 12);
        let bad = Rectangle::new(Point::new(0, 468), Size::new(800, 10));
        assert!(matches!(
            surface.push_partial(&frame, bad),
            Err(DisplayError::Bounds(_))
        ));
    }

    #[test]
    fn ascii_full_push_accepts_any_frame() {
        let mut surface = AsciiSurface::new(64, 32);
        let frame = Frame::new(64, 32);
        assert!(surface.push_full(&frame).is_ok());
    }
}
