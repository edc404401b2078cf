//! # Refresh Scheduling
//!
//! The heart of the statusboard: a per-tick state machine that decides,
//! once a second, between three outcomes on a slow, ghost-prone display:
//!
//! 1. **Full redraw** - on panel rotation, on the periodic anti-ghosting
//!    interval, or when the active panel's content changed. Slow, visible
//!    flicker, resets ghosting.
//! 2. **Heartbeat push** - the steady state. Only the small bottom strip
//!    is re-pushed as a partial update, cheap and flicker-free, proving
//!    liveness every second.
//! 3. **No-op** - a push failed; nothing is committed so the next tick
//!    retries from unchanged state.
//!
//! Ordering rule: rotation and periodic checks are evaluated before the
//! heartbeat fallback, and at most one full redraw happens per tick
//! (rotation implies redraw, so the interval check is moot that tick).
//!
//! State commits follow the push: `panel_entered_at`,
//! `last_full_redraw_at`, `drawn_generation` and `heartbeat_phase` only
//! advance after the corresponding push succeeded. A failed full push is
//! therefore retried on the next tick with the same decision inputs.

use crate::display::DisplaySurface;
use crate::renderer::PanelRenderer;
use crate::source::DataSource;
use crate::PanelKind;
use std::time::{Duration, Instant};

/// Timing knobs of the rotation/redraw policy.
#[derive(Clone, Copy, Debug)]
pub struct SchedulerSettings {
    /// How long a panel stays active before rotating to the next one
    pub dwell: Duration,
    /// Forced full-redraw cadence, clearing accumulated ghosting
    pub full_redraw_interval: Duration,
}

/// What a tick did, for logs and tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickAction {
    /// A full frame was pushed for `panel`
    FullRedraw { panel: PanelKind },
    /// Only the heartbeat strip was pushed
    Heartbeat { phase: u32 },
    /// A push failed; state unchanged, retry next tick
    Noop,
}

/// The per-tick decision engine. Owns all mutable display-driving state
/// (the panel rotation position, redraw bookkeeping, heartbeat phase) and
/// the data sources it polls.
pub struct RefreshScheduler {
    settings: SchedulerSettings,
    sources: Vec<DataSource>,
    renderer: PanelRenderer,
    active: usize,
    panel_entered_at: Instant,
    last_full_redraw_at: Option<Instant>,
    drawn_generation: Option<u64>,
    heartbeat_phase: u32,
}

impl RefreshScheduler {
    /// Build a scheduler starting on the first source at `now`.
    ///
    /// `sources` is the round-robin rotation order; it must not be empty.
    pub fn new(
        settings: SchedulerSettings,
        sources: Vec<DataSource>,
        renderer: PanelRenderer,
        now: Instant,
    ) -> Self {
        assert!(!sources.is_empty(), "at least one panel source required");
        Self {
            settings,
            sources,
            renderer,
            active: 0,
            panel_entered_at: now,
            last_full_redraw_at: None,
            drawn_generation: None,
            heartbeat_phase: 0,
        }
    }

    /// The panel currently on screen.
    pub fn active_panel(&self) -> PanelKind {
        self.sources[self.active].panel()
    }

    /// Evaluate one tick at `now` and drive the display accordingly.
    pub fn tick(&mut self, now: Instant, display: &mut dyn DisplaySurface) -> TickAction {
        let rotation_due = now.duration_since(self.panel_entered_at) >= self.settings.dwell;
        let target = if rotation_due {
            (self.active + 1) % self.sources.len()
        } else {
            self.active
        };

        let interval_due = match self.last_full_redraw_at {
            // Nothing on screen yet: the first tick always paints
            None => true,
            Some(at) => now.duration_since(at) >= self.settings.full_redraw_interval,
        };

        // The heartbeat path must stay constant-time, so the source is
        // only consulted when a redraw needs a snapshot anyway or its own
        // fetch interval elapsed. A due fetch is the only way rule (c),
        // content changed, can observe a new generation.
        if rotation_due || interval_due || self.sources[target].fetch_due(now) {
            let snapshot = self.sources[target].get_current(now);
            let content_changed = self.drawn_generation != Some(snapshot.generation);

            if rotation_due || interval_due || content_changed {
                let frame = self.renderer.render_full(&snapshot, self.heartbeat_phase);
                match display.push_full(&frame) {
                    Ok(()) => {
                        if rotation_due {
                            log::info!(
                                "rotated to {} panel (gen {}, stale: {})",
                                snapshot.panel,
                                snapshot.generation,
                                snapshot.stale
                            );
                            self.active = target;
                            self.panel_entered_at = now;
                        } else {
                            log::debug!(
                                "full redraw of {} panel (gen {})",
                                snapshot.panel,
                                snapshot.generation
                            );
                        }
                        self.last_full_redraw_at = Some(now);
                        self.drawn_generation = Some(snapshot.generation);
                        return TickAction::FullRedraw {
                            panel: snapshot.panel,
                        };
                    }
                    Err(err) => {
                        log::warn!("full push failed, will retry next tick: {err}");
                        return TickAction::Noop;
                    }
                }
            }
            // A due fetch that changed nothing falls through to the
            // heartbeat so the second still gets its liveness pulse.
        }

        let next_phase = (self.heartbeat_phase + 1) % self.renderer.heartbeat_slots();
        let (strip, region) = self.renderer.render_heartbeat_region(next_phase);
        match display.push_partial(&strip, region) {
            Ok(()) => {
                self.heartbeat_phase = next_phase;
                TickAction::Heartbeat { phase: next_phase }
            }
            Err(err) => {
                log::warn!("heartbeat push failed: {err}");
                TickAction::Noop
            }
        }
    }

    /// Quiesce the device: put the display to sleep. Called on shutdown;
    /// no further pushes may follow until `wake`.
    pub fn quiesce(
        &self,
        display: &mut dyn DisplaySurface,
    ) -> Result<(), crate::display::DisplayError> {
        log::info!("quiescing display");
        display.sleep()
    }
}
