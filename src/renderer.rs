//! # Panel Rendering
//!
//! This module composes a [`Snapshot`] plus the heartbeat glyph into a
//! fixed-size monochrome [`Frame`] for the e-paper panel. It deliberately
//! knows nothing about time: the header shows the snapshot's own fetch
//! timestamp, never the wall clock, so the same snapshot and heartbeat
//! phase always produce bit-identical output. That determinism is what
//! makes the refresh scheduler testable without hardware.
//!
//! Two render paths exist, matching the two push paths of the display:
//! [`PanelRenderer::render_full`] lays out the whole panel, while
//! [`PanelRenderer::render_heartbeat_region`] draws only the small
//! bottom-edge liveness strip that is pushed as a partial update every
//! second.

use crate::frame::Frame;
use crate::Snapshot;
use embedded_graphics::{
    mono_font::{iso_8859_1::FONT_10X20, MonoTextStyle},
    pixelcolor::BinaryColor,
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle},
    text::Text,
};
use thiserror::Error;

/// Layout misconfiguration. Indicates a programming or configuration
/// defect, so it is treated as fatal at startup rather than recovered.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The configured geometry cannot hold the header, at least one
    /// content line, and the heartbeat strip
    #[error("display {width}x{height} is too small for the panel layout")]
    TooSmall { width: u32, height: u32 },

    /// Partial-refresh windows must be byte aligned on this controller
    #[error("display width {0} is not a multiple of 8")]
    Misaligned(u32),

    /// The heartbeat needs room to actually cycle
    #[error("heartbeat needs at least 2 slots, got {0}")]
    BadSlots(u32),
}

// Heartbeat strip geometry, bottom edge of the panel
const STRIP_HEIGHT: u32 = 12;
const SEGMENT_WIDTH: i32 = 10;
const SEGMENT_GAP: i32 = 6;
const BASE_THICKNESS: i32 = 1;
const FILL_THICKNESS: i32 = 3;

// Text layout
const MARGIN: i32 = 16;
const CHAR_WIDTH: i32 = 10; // FONT_10X20
const TITLE_BASELINE: i32 = 32;
const RULE_Y: i32 = 48;
const CONTENT_BASELINE: i32 = 88;
const LINE_STEP: i32 = 28;

/// Deterministic compositor for panel frames and the heartbeat region.
pub struct PanelRenderer {
    width: u32,
    height: u32,
    heartbeat_slots: u32,
}

impl PanelRenderer {
    /// Validate the layout against the configured geometry.
    pub fn new(width: u32, height: u32, heartbeat_slots: u32) -> Result<Self, RenderError> {
        if width % 8 != 0 {
            return Err(RenderError::Misaligned(width));
        }
        if heartbeat_slots < 2 {
            return Err(RenderError::BadSlots(heartbeat_slots));
        }
        let min_height = (CONTENT_BASELINE + LINE_STEP) as u32 + STRIP_HEIGHT;
        if width < (4 * MARGIN + 16 * CHAR_WIDTH) as u32 || height < min_height {
            return Err(RenderError::TooSmall { width, height });
        }
        Ok(Self {
            width,
            height,
            heartbeat_slots,
        })
    }

    /// Modulus for the heartbeat phase counter.
    pub fn heartbeat_slots(&self) -> u32 {
        self.heartbeat_slots
    }

    /// The fixed screen region the heartbeat strip occupies.
    pub fn heartbeat_bounds(&self) -> Rectangle {
        Rectangle::new(
            Point::new(0, (self.height - STRIP_HEIGHT) as i32),
            Size::new(self.width, STRIP_HEIGHT),
        )
    }

    /// Compose the complete panel: header, content lines, heartbeat strip.
    pub fn render_full(&self, snapshot: &Snapshot, heartbeat_phase: u32) -> Frame {
        let mut frame = Frame::new(self.width, self.height);
        let style = MonoTextStyle::new(&FONT_10X20, BinaryColor::On);

        // Header: panel title left, fetch stamp (and stale marker) right
        Text::new(snapshot.panel.title(), Point::new(MARGIN, TITLE_BASELINE), style)
            .draw(&mut frame)
            .ok();

        let mut stamp = format!("as of {}", snapshot.fetched_at.format("%H:%M"));
        if snapshot.stale {
            stamp = format!("! STALE {stamp}");
        }
        let stamp_x = self.width as i32 - MARGIN - stamp.chars().count() as i32 * CHAR_WIDTH;
        Text::new(&stamp, Point::new(stamp_x, TITLE_BASELINE), style)
            .draw(&mut frame)
            .ok();

        Line::new(
            Point::new(MARGIN, RULE_Y),
            Point::new(self.width as i32 - MARGIN, RULE_Y),
        )
        .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 2))
        .draw(&mut frame)
        .ok();

        // Content lines, truncated to the usable width and row count
        let max_chars = ((self.width as i32 - 2 * MARGIN) / CHAR_WIDTH) as usize;
        let last_baseline = (self.height - STRIP_HEIGHT) as i32 - 8;
        let mut baseline = CONTENT_BASELINE;
        for line in &snapshot.lines {
            if baseline > last_baseline {
                break;
            }
            let shown: String = line.chars().take(max_chars).collect();
            Text::new(&shown, Point::new(MARGIN, baseline), style)
                .draw(&mut frame)
                .ok();
            baseline += LINE_STEP;
        }

        self.draw_heartbeat(&mut frame, (self.height - STRIP_HEIGHT) as i32, heartbeat_phase);
        frame
    }

    /// Render only the heartbeat strip, plus the screen region it belongs
    /// to, for a partial push. Pure: depends only on the phase.
    pub fn render_heartbeat_region(&self, heartbeat_phase: u32) -> (Frame, Rectangle) {
        let mut strip = Frame::new(self.width, STRIP_HEIGHT);
        self.draw_heartbeat(&mut strip, 0, heartbeat_phase);
        (strip, self.heartbeat_bounds())
    }

    /// Segmented liveness bar: a thin base line of segments, with the
    /// leading `phase / slots` fraction drawn thick.
    fn draw_heartbeat(&self, frame: &mut Frame, top: i32, phase: u32) {
        let phase = phase % self.heartbeat_slots;
        let cy = top + STRIP_HEIGHT as i32 / 2;
        let step = SEGMENT_WIDTH + SEGMENT_GAP;
        let segments = (self.width as i32 / step).max(1);
        let fraction = (phase + 1) as f32 / self.heartbeat_slots as f32;
        let filled = (fraction * segments as f32).round() as i32;

        for i in 0..segments {
            let sx = i * step;
            let thickness = if i < filled {
                FILL_THICKNESS
            } else {
                BASE_THICKNESS
            };
            let rect = Rectangle::new(
                Point::new(sx, cy - thickness / 2),
                Size::new(SEGMENT_WIDTH as u32, thickness as u32 + 1),
            );
            rect.into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
                .draw(frame)
                .ok();
        }
    }
}
