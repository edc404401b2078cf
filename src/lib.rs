//! # Statusboard Core Library
//!
//! This library provides the data structures and scheduling logic for an
//! e-paper statusboard running on a Raspberry Pi. The board alternates
//! between two informational panels - local weather and public-transit
//! departures - and overlays a per-second heartbeat indicator so a glance
//! tells you the process is still alive.
//!
//! ## Design Philosophy
//!
//! ### Bistable-display discipline
//! E-paper is slow and ghost-prone. A full frame push is the only operation
//! that resets ghosting, but it takes seconds and visibly flickers; a
//! partial window push is fast and flicker-free but leaves residue when
//! overused. The [`scheduler::RefreshScheduler`] is the one place that
//! weighs these trade-offs: it decides each tick whether to rotate panels,
//! force a full redraw, or push only the small heartbeat region.
//!
//! ### Time handling
//! Scheduling decisions run on [`std::time::Instant`] values passed into
//! the tick function, so tests drive a virtual clock without wall-clock
//! waits. Wall-clock time (`chrono`) appears only in snapshot timestamps
//! and log output.
//!
//! ### Failure posture
//! Fetch failures are absorbed inside each data source: the display keeps
//! showing the last good snapshot, clearly marked stale, instead of
//! freezing or crashing. Display-IO failures make the affected tick a
//! retryable no-op. Only render/layout misconfiguration is fatal.
//!
//! ## Core Types
//!
//! - [`PanelKind`]: which informational panel a value belongs to
//! - [`Snapshot`]: an immutable, renderable capture of one panel's content

use chrono::{DateTime, Local};

// Module declarations
pub mod config;
pub mod display;
pub mod epd7in5_v2;
pub mod frame;
pub mod renderer;
pub mod scheduler;
pub mod source;
pub mod ticker;
pub mod transit;
pub mod weather;

/// The informational panels the board can show, in no particular order.
///
/// The actual rotation order comes from configuration; this enum only
/// identifies content so renderers and logs can label it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PanelKind {
    /// Current weather and short-term rain outlook
    Weather,
    /// Upcoming public-transit departures
    Transit,
}

impl PanelKind {
    /// Title drawn in the panel header.
    pub fn title(&self) -> &'static str {
        match self {
            PanelKind::Weather => "WEATHER",
            PanelKind::Transit => "DEPARTURES",
        }
    }

    /// Lower-case name used in configuration and logs.
    pub fn name(&self) -> &'static str {
        match self {
            PanelKind::Weather => "weather",
            PanelKind::Transit => "transit",
        }
    }
}

impl std::fmt::Display for PanelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An immutable capture of one panel's renderable content.
///
/// Produced by [`source::DataSource::get_current`], consumed by
/// [`renderer::PanelRenderer::render_full`]. A snapshot is a plain value:
/// rendering the same snapshot twice yields the same bitmap.
///
/// `generation` counts the owning source's successful fetches and is the
/// scheduler's change-detection key: a full redraw is due when the active
/// source's generation differs from the one last pushed to the display.
/// The never-succeeded placeholder carries generation 0.
///
/// # Example
/// ```
/// use statusboard_lib::{PanelKind, Snapshot};
///
/// let snap = Snapshot {
///     panel: PanelKind::Weather,
///     lines: vec!["Rain in 30 min".into(), "Overcast".into()],
///     fetched_at: chrono::Local::now(),
///     stale: false,
///     generation: 1,
/// };
/// assert!(!snap.stale);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    /// Which panel this content belongs to
    pub panel: PanelKind,
    /// Rendered text block, one entry per display line, top to bottom
    pub lines: Vec<String>,
    /// When the content was fetched; shown in the panel header
    pub fetched_at: DateTime<Local>,
    /// True when the last fetch attempt failed and this is a reused value
    pub stale: bool,
    /// Successful-fetch counter of the owning source (0 = placeholder)
    pub generation: u64,
}
